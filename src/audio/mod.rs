//! Microphone capture via the cpal backend.
//!
//! # Design constraints
//!
//! The cpal input callback runs on an OS audio thread at elevated priority.
//! It **must not**:
//! - Allocate heap memory (steady state)
//! - Block on a mutex or condvar
//! - Perform I/O
//!
//! The callback therefore writes straight into an SPSC ring buffer producer
//! whose `push_slice` is lock-free and allocation-free. Downmix scratch
//! buffers are reused across invocations.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows, CoreAudio on
//! macOS). `MicCapture` must be created and dropped on the same thread; the
//! capture pipeline does both inside `tokio::task::spawn_blocking`.

pub mod resample;

#[cfg(feature = "audio-cpal")]
use cpal::{
    traits::{DeviceTrait, StreamTrait},
    SampleFormat, SampleRate, Stream, StreamConfig,
};

use crate::{
    buffering::{AudioProducer, Producer},
    error::{ColloquyError, Result},
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
#[cfg(feature = "audio-cpal")]
use tracing::{error, info, warn};

/// Average interleaved multi-channel frames down to mono.
#[cfg(feature = "audio-cpal")]
fn mix_to_mono(dst: &mut Vec<f32>, channels: usize, sample_count: usize, sample: impl Fn(usize) -> f32) {
    let frames = sample_count / channels;
    dst.resize(frames, 0.0);
    for (f, out) in dst.iter_mut().enumerate() {
        let base = f * channels;
        let mut sum = 0f32;
        for c in 0..channels {
            sum += sample(base + c);
        }
        *out = sum / channels as f32;
    }
}

#[cfg(feature = "audio-cpal")]
fn push_frames(producer: &mut AudioProducer, frames: &[f32]) {
    let written = producer.push_slice(frames);
    if written < frames.len() {
        warn!("capture ring full: dropped {} frames", frames.len() - written);
    }
}

/// Handle to an active microphone stream.
///
/// **Not `Send`** — bound to its creation thread (see module docs).
pub struct MicCapture {
    /// Kept alive so the stream is not dropped prematurely.
    #[cfg(feature = "audio-cpal")]
    _stream: Stream,
    /// Shared flag — set to `false` to make the callback a no-op.
    running: Arc<AtomicBool>,
    /// Actual capture sample rate reported by the device (Hz).
    pub sample_rate: u32,
}

impl MicCapture {
    /// Open an input device by preferred name, otherwise fall back to the
    /// default input device and then the first available device.
    ///
    /// # Errors
    /// `NoDefaultInputDevice` when no microphone exists (a capability
    /// failure — capture must not start), `AudioDevice`/`AudioStream` on
    /// device or stream errors.
    #[cfg(feature = "audio-cpal")]
    pub fn open_with_preference(
        mut producer: AudioProducer,
        running: Arc<AtomicBool>,
        preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        use cpal::traits::HostTrait;

        let host = cpal::default_host();
        let mut selected_device = None;

        if let Some(preferred) = preferred_device_name {
            match host.input_devices() {
                Ok(mut devices) => {
                    selected_device = devices
                        .find(|d| d.name().map(|n| n == preferred).unwrap_or(false));
                    if selected_device.is_none() {
                        warn!("preferred input device '{preferred}' not found, falling back");
                    }
                }
                Err(e) => {
                    warn!("failed to list input devices while resolving preference: {e}");
                }
            }
        }

        let device = if let Some(device) = selected_device {
            device
        } else if let Some(default) = host.default_input_device() {
            default
        } else {
            let mut devices = host
                .input_devices()
                .map_err(|e| ColloquyError::AudioDevice(e.to_string()))?;
            let fallback = devices.next().ok_or(ColloquyError::NoDefaultInputDevice)?;
            warn!("no default input device, falling back to first available input");
            fallback
        };

        info!(
            device = device.name().unwrap_or_default().as_str(),
            "opening input device"
        );

        let supported = device
            .default_input_config()
            .map_err(|e| ColloquyError::AudioDevice(e.to_string()))?;

        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();

        info!(sample_rate, channels, "capture config selected");

        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let ch = channels as usize;
        let running_cb = Arc::clone(&running);

        let stream = match supported.sample_format() {
            SampleFormat::F32 => {
                let mut mix_buf: Vec<f32> = Vec::new();
                device.build_input_stream(
                    &config,
                    move |data: &[f32], _info| {
                        if !running_cb.load(Ordering::Relaxed) {
                            return;
                        }
                        if ch == 1 {
                            push_frames(&mut producer, data);
                        } else {
                            mix_to_mono(&mut mix_buf, ch, data.len(), |i| data[i]);
                            push_frames(&mut producer, &mix_buf);
                        }
                    },
                    |err| error!("capture stream error: {err}"),
                    None,
                )
            }

            SampleFormat::I16 => {
                let mut mix_buf: Vec<f32> = Vec::new();
                device.build_input_stream(
                    &config,
                    move |data: &[i16], _info| {
                        if !running_cb.load(Ordering::Relaxed) {
                            return;
                        }
                        mix_to_mono(&mut mix_buf, ch, data.len(), |i| {
                            f32::from(data[i]) / 32_768.0
                        });
                        push_frames(&mut producer, &mix_buf);
                    },
                    |err| error!("capture stream error: {err}"),
                    None,
                )
            }

            fmt => {
                return Err(ColloquyError::AudioStream(format!(
                    "unsupported sample format: {fmt:?}"
                )))
            }
        }
        .map_err(|e| ColloquyError::AudioStream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| ColloquyError::AudioStream(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            running,
            sample_rate,
        })
    }

    /// Open the system default microphone.
    ///
    /// Must be called from the thread that will also drop this value.
    #[cfg(feature = "audio-cpal")]
    pub fn open_default(producer: AudioProducer, running: Arc<AtomicBool>) -> Result<Self> {
        Self::open_with_preference(producer, running, None)
    }

    /// Stop: signal the callback to no-op on its next invocation.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Stub when the `audio-cpal` feature is disabled.
#[cfg(not(feature = "audio-cpal"))]
impl MicCapture {
    pub fn open_with_preference(
        _producer: AudioProducer,
        _running: Arc<AtomicBool>,
        _preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        Err(ColloquyError::AudioStream(
            "compiled without audio-cpal feature".into(),
        ))
    }

    pub fn open_default(producer: AudioProducer, running: Arc<AtomicBool>) -> Result<Self> {
        Self::open_with_preference(producer, running, None)
    }
}
