use anyhow::{anyhow, Result};
use log::{debug, info};
use loopcraft::audio_device::{get_input_devices, get_output_devices, host_id_from_name};
use loopcraft::audio_io::{resolve_devices, start_streams};
use loopcraft::settings::{load_settings, save_settings};
use loopcraft::{EngineSettings, LoopEngine, TrackId};
use std::io::{self, BufRead};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

const HELP: &str = "\
commands:
  add              add a track and select it
  del N            delete track N
  sel N            select track N
  rec              record into the selected track
  count            record after a count-in
  stop             finish the recording
  play             pause or resume
  halt             stop, rewind and discard any recording
  vol N V          set track N volume (0..1)
  master V         set master volume (0..1)
  tempo B          set tempo in BPM (40..240)
  metro            toggle the metronome
  undo | redo
  state            print the engine state
  devices          list audio devices
  quit";

enum Flow {
    Continue,
    Quit,
}

/// Tracks are addressed by their 1-based position in the track list.
fn track_at(engine: &LoopEngine, arg: Option<&str>) -> Result<TrackId> {
    let position: usize = arg
        .ok_or_else(|| anyhow!("missing track number"))?
        .parse()?;
    engine
        .tracks()
        .get(position.wrapping_sub(1))
        .map(|t| t.id)
        .ok_or_else(|| anyhow!("no track {}", position))
}

fn number(arg: Option<&str>) -> Result<f32> {
    Ok(arg.ok_or_else(|| anyhow!("missing value"))?.parse()?)
}

fn print_state(engine: &LoopEngine) {
    let snapshot = engine.snapshot();
    println!(
        "{:?} | loop {} frames @ {} | tempo {:.1} | metronome {} | master {:.2} | undo {} redo {} | xruns {} dropped {}",
        snapshot.state,
        snapshot.loop_length,
        snapshot.playhead,
        snapshot.tempo,
        if snapshot.metronome_enabled { "on" } else { "off" },
        snapshot.master_volume,
        snapshot.can_undo,
        snapshot.can_redo,
        snapshot.underruns,
        snapshot.capture_overruns,
    );
    for (n, track) in snapshot.tracks.iter().enumerate() {
        let marker = if snapshot.selected_track == Some(track.id) { '*' } else { ' ' };
        println!(
            "{} {:>2} {:<12} vol {:.2} {} level {:.2}",
            marker,
            n + 1,
            track.name,
            track.volume,
            if track.has_buffer { "rec'd" } else { "empty" },
            engine.track_level(track.id).unwrap_or(0.0),
        );
    }
}

fn print_devices(settings: &EngineSettings) -> Result<()> {
    let host_id = host_id_from_name(settings.host_name.as_deref());
    println!("host: {}", host_id.name());
    for (name, _) in get_input_devices(host_id)? {
        println!("  in:  {}", name);
    }
    for (name, _) in get_output_devices(host_id)? {
        println!("  out: {}", name);
    }
    Ok(())
}

fn run_command(engine: &mut LoopEngine, settings: &EngineSettings, line: &str) -> Result<Flow> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(Flow::Continue);
    };
    let first = words.next();
    let second = words.next();

    match command {
        "add" => {
            engine.add_track()?;
        }
        "del" => {
            let id = track_at(engine, first)?;
            engine.delete_track(id)?;
        }
        "sel" => {
            let id = track_at(engine, first)?;
            engine.select_track(id)?;
        }
        "rec" => engine.start_recording(engine.selected_track())?,
        "count" => {
            let beats = engine.count_in_beats();
            engine.record_with_count_in(engine.selected_track(), beats)?;
        }
        "stop" => engine.stop_recording()?,
        "play" => engine.toggle_playback()?,
        "halt" => engine.stop_playback()?,
        "vol" => {
            let id = track_at(engine, first)?;
            engine.set_track_volume(id, number(second)?)?;
        }
        "master" => engine.set_master_volume(number(first)?)?,
        "tempo" => engine.set_tempo(number(first)?)?,
        "metro" => {
            let enabled = engine.toggle_metronome()?;
            println!("metronome {}", if enabled { "on" } else { "off" });
        }
        "undo" => {
            engine.undo()?;
        }
        "redo" => {
            engine.redo()?;
        }
        "state" => print_state(engine),
        "devices" => print_devices(settings)?,
        "help" => println!("{}", HELP),
        "quit" | "exit" => return Ok(Flow::Quit),
        other => println!("unknown command `{}`, try `help`", other),
    }
    Ok(Flow::Continue)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = load_settings();
    let setup = resolve_devices(&settings)?;
    if !setup.has_input() {
        println!("no input device, recording is unavailable");
    }
    let (mut engine, audio, capture) =
        LoopEngine::new(&settings, setup.sample_rate(), setup.input_channels());
    let _streams = start_streams(setup, audio, capture, engine.shared().clone())?;
    let events = engine.subscribe();

    // stdin is read on its own thread so the engine keeps draining the
    // capture queue while the prompt waits.
    let (line_tx, line_rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        for line in io::stdin().lock().lines().map_while(|line| line.ok()) {
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });

    println!("loopcraft ready, type `help` for commands");
    loop {
        match line_rx.recv_timeout(POLL_INTERVAL) {
            Ok(line) => {
                engine.poll();
                match run_command(&mut engine, &settings, line.trim()) {
                    Ok(Flow::Quit) => break,
                    Ok(Flow::Continue) => {}
                    Err(e) => println!("error: {}", e),
                }
            }
            Err(RecvTimeoutError::Timeout) => engine.poll(),
            Err(RecvTimeoutError::Disconnected) => break,
        }
        for event in events.try_iter() {
            debug!("{:?}", event);
        }
    }

    engine.stop_playback()?;
    save_settings(&settings);
    info!("Shutting down");
    Ok(())
}
