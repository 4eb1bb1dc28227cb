// src/audio_io.rs

use crate::audio_device::{find_input_device, find_output_device, host_id_from_name};
use crate::audio_engine::AudioEngine;
use crate::capture::CaptureSink;
use crate::error::EngineError;
use crate::looper::SharedLooperState;
use crate::sample_buffer::StereoFrame;
use crate::settings::EngineSettings;
use anyhow::Result;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{
    BufferSize, Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig,
};
use log::{info, warn};
use std::sync::Arc;

/// Input samples are converted in chunks of this many frames.
const INPUT_CHUNK_FRAMES: usize = 512;

struct InputChoice {
    device: Device,
    config: StreamConfig,
    format: SampleFormat,
}

/// Devices and stream configs picked from the settings. The engine is
/// built from `sample_rate` and `input_channels` before streams start.
pub struct DeviceSetup {
    output_device: Device,
    output_config: StreamConfig,
    output_format: SampleFormat,
    input: Option<InputChoice>,
}

impl DeviceSetup {
    pub fn sample_rate(&self) -> u32 {
        self.output_config.sample_rate.0
    }

    /// Channel count of the capture stream; 1 when there is no input.
    pub fn input_channels(&self) -> u16 {
        self.input.as_ref().map_or(1, |input| input.config.channels)
    }

    pub fn has_input(&self) -> bool {
        self.input.is_some()
    }
}

/// Keeps the device streams alive. Dropping it stops audio.
pub struct ActiveStreams {
    _output: Stream,
    _input: Option<Stream>,
}

fn apply_overrides(config: &mut StreamConfig, settings: &EngineSettings) {
    if let Some(sr) = settings.sample_rate {
        config.sample_rate = cpal::SampleRate(sr);
    }
    if let Some(bs) = settings.buffer_size {
        config.buffer_size = BufferSize::Fixed(bs);
    }
}

fn unavailable(err: impl std::fmt::Display) -> EngineError {
    EngineError::DeviceUnavailable(err.to_string())
}

/// Picks the output device (required) and the input device (optional:
/// without one the engine runs but recording reports `DeviceUnavailable`).
pub fn resolve_devices(settings: &EngineSettings) -> Result<DeviceSetup> {
    let host_id = host_id_from_name(settings.host_name.as_deref());

    let output_device =
        find_output_device(host_id, settings.output_device.as_deref()).map_err(unavailable)?;
    let default_output_config = output_device.default_output_config().map_err(unavailable)?;
    let output_format = default_output_config.sample_format();
    let mut output_config: StreamConfig = default_output_config.into();
    apply_overrides(&mut output_config, settings);
    info!(
        "Using output device: {} ({} Hz, {} channel(s), {})",
        output_device.name().unwrap_or_default(),
        output_config.sample_rate.0,
        output_config.channels,
        output_format
    );

    let input = match find_input_device(host_id, settings.input_device.as_deref()) {
        Ok(device) => match device.default_input_config() {
            Ok(default_config) => {
                let format = default_config.sample_format();
                let mut config: StreamConfig = default_config.into();
                apply_overrides(&mut config, settings);
                // Takes are stored at the output rate.
                config.sample_rate = output_config.sample_rate;
                info!(
                    "Using input device: {} ({} channel(s), {})",
                    device.name().unwrap_or_default(),
                    config.channels,
                    format
                );
                Some(InputChoice {
                    device,
                    config,
                    format,
                })
            }
            Err(e) => {
                warn!("Input device has no usable config, recording disabled: {}", e);
                None
            }
        },
        Err(e) => {
            warn!("No input device, recording disabled: {}", e);
            None
        }
    };

    Ok(DeviceSetup {
        output_device,
        output_config,
        output_format,
        input,
    })
}

/// Starts the output stream around `engine` and, if an input device was
/// found, the capture stream around `sink`. A failing input stream is
/// logged and leaves capture disconnected.
pub fn start_streams(
    setup: DeviceSetup,
    engine: AudioEngine,
    sink: CaptureSink,
    shared: Arc<SharedLooperState>,
) -> Result<ActiveStreams> {
    let output = build_output(
        &setup.output_device,
        &setup.output_config,
        setup.output_format,
        engine,
        shared.clone(),
    )?;
    output.play().map_err(unavailable)?;

    let input = setup.input.and_then(|input| {
        let started = build_input(&input.device, &input.config, input.format, sink, shared.clone())
            .and_then(|stream| {
                stream.play().map_err(unavailable)?;
                Ok(stream)
            });
        match started {
            Ok(stream) => {
                shared.set_capture_connected(true);
                Some(stream)
            }
            Err(e) => {
                warn!("Failed to start the input stream, recording disabled: {}", e);
                None
            }
        }
    });

    match setup.output_config.buffer_size {
        BufferSize::Fixed(size) => info!(
            "Streams running at {} Hz, buffer size {} frames",
            setup.output_config.sample_rate.0, size
        ),
        BufferSize::Default => info!(
            "Streams running at {} Hz, default buffer size",
            setup.output_config.sample_rate.0
        ),
    }

    Ok(ActiveStreams {
        _output: output,
        _input: input,
    })
}

fn build_output(
    device: &Device,
    config: &StreamConfig,
    format: SampleFormat,
    engine: AudioEngine,
    shared: Arc<SharedLooperState>,
) -> Result<Stream> {
    match format {
        SampleFormat::F32 => build_output_stream::<f32>(device, config, engine, shared),
        SampleFormat::I16 => build_output_stream::<i16>(device, config, engine, shared),
        SampleFormat::U16 => build_output_stream::<u16>(device, config, engine, shared),
        format => Err(unavailable(format!("unsupported output sample format {}", format)).into()),
    }
}

fn build_input(
    device: &Device,
    config: &StreamConfig,
    format: SampleFormat,
    sink: CaptureSink,
    shared: Arc<SharedLooperState>,
) -> Result<Stream> {
    match format {
        SampleFormat::F32 => build_input_stream::<f32>(device, config, sink, shared),
        SampleFormat::I16 => build_input_stream::<i16>(device, config, sink, shared),
        SampleFormat::U16 => build_input_stream::<u16>(device, config, sink, shared),
        format => Err(unavailable(format!("unsupported input sample format {}", format)).into()),
    }
}

fn build_input_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut sink: CaptureSink,
    shared: Arc<SharedLooperState>,
) -> Result<Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let err_fn = move |err| {
        warn!("An error occurred on the input stream: {}", err);
        shared.record_underrun();
    };
    let channels = (config.channels as usize).max(1);
    let mut scratch = vec![0.0f32; INPUT_CHUNK_FRAMES * channels];

    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                for chunk in data.chunks(INPUT_CHUNK_FRAMES * channels) {
                    let samples = &mut scratch[..chunk.len()];
                    for (dst, src) in samples.iter_mut().zip(chunk) {
                        *dst = f32::from_sample(*src);
                    }
                    sink.push_interleaved(samples);
                }
            },
            err_fn,
            None,
        )
        .map_err(unavailable)?;
    Ok(stream)
}

fn build_output_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut engine: AudioEngine,
    shared: Arc<SharedLooperState>,
) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let err_fn = move |err| {
        warn!("An error occurred on the output stream: {}", err);
        shared.record_underrun();
    };
    let channels = (config.channels as usize).max(1);
    let max_frames = engine.max_block_frames();
    let mut frames = vec![StereoFrame::zero(); max_frames];

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let num_frames = data.len() / channels;
                if num_frames > max_frames {
                    engine.skip_block();
                    data.fill(T::EQUILIBRIUM);
                    return;
                }
                let block = &mut frames[..num_frames];
                engine.process_buffer(block);
                for (out, frame) in data.chunks_mut(channels).zip(block.iter()) {
                    match out {
                        [mono] => *mono = T::from_sample((frame.left + frame.right) * 0.5),
                        [left, right, rest @ ..] => {
                            *left = T::from_sample(frame.left);
                            *right = T::from_sample(frame.right);
                            rest.fill(T::EQUILIBRIUM);
                        }
                        [] => {}
                    }
                }
            },
            err_fn,
            None,
        )
        .map_err(unavailable)?;
    Ok(stream)
}
