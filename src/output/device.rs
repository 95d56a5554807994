//! cpal playback engine.
//!
//! # Design constraints
//!
//! The cpal output callback runs on an OS audio thread. It must not allocate
//! or block. The timeline is therefore guarded by a `parking_lot` mutex that
//! the callback only ever `try_lock`s — on the rare contended buffer it
//! writes silence instead of waiting.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows, CoreAudio on
//! macOS). The stream is therefore built and dropped on a dedicated thread
//! owned by `CpalOutput`; the handle the session holds only touches shared
//! atomics and the timeline.

use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{ColloquyError, Result};
use crate::output::{AudioOutput, OutputFactory};

/// One decoded chunk placed on the engine clock.
struct ScheduledItem {
    /// Absolute start position in frames on the engine clock.
    start: u64,
    samples: Vec<f32>,
}

struct Shared {
    /// Frames elapsed since the engine opened — advances every output frame,
    /// silence included. This is the playback clock.
    clock_frames: AtomicU64,
    /// Items awaiting playback, in non-decreasing `start` order.
    timeline: Mutex<VecDeque<ScheduledItem>>,
    /// Cleared to shut the device thread down.
    running: AtomicBool,
}

/// Fill one output buffer from the timeline. Pure over its inputs so the
/// silence-fill / mid-item-entry behavior is testable without a device.
fn fill_output(
    data: &mut [f32],
    channels: usize,
    clock: &AtomicU64,
    timeline: &mut VecDeque<ScheduledItem>,
) {
    for frame in data.chunks_mut(channels) {
        let t = clock.fetch_add(1, Ordering::Relaxed);

        while let Some(front) = timeline.front() {
            if front.start + front.samples.len() as u64 <= t {
                timeline.pop_front();
            } else {
                break;
            }
        }

        let sample = match timeline.front() {
            Some(front) if t >= front.start => front.samples[(t - front.start) as usize],
            _ => 0.0,
        };
        for out in frame.iter_mut() {
            *out = sample;
        }
    }
}

/// Playback engine backed by the default cpal output device.
pub struct CpalOutput {
    shared: Arc<Shared>,
    sample_rate: u32,
    device_thread: Option<std::thread::JoinHandle<()>>,
}

impl CpalOutput {
    /// Open the default output device at `sample_rate`, mono preferred,
    /// stereo fallback (the sample is duplicated across both channels).
    ///
    /// Blocks until the device is confirmed open or fails.
    #[cfg(feature = "audio-cpal")]
    pub fn open(sample_rate: u32) -> Result<Self> {
        use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
        use cpal::{SampleFormat, SampleRate, StreamConfig};

        let shared = Arc::new(Shared {
            clock_frames: AtomicU64::new(0),
            timeline: Mutex::new(VecDeque::new()),
            running: AtomicBool::new(true),
        });

        let thread_shared = Arc::clone(&shared);
        // Sync oneshot: the device thread reports open success/failure.
        let (open_tx, open_rx) = std::sync::mpsc::channel::<Result<()>>();

        let device_thread = std::thread::Builder::new()
            .name("colloquy-playback".into())
            .spawn(move || {
                let host = cpal::default_host();
                let Some(device) = host.default_output_device() else {
                    let _ = open_tx.send(Err(ColloquyError::NoOutputDevice));
                    return;
                };

                let find_channels = |want: u16| {
                    device.supported_output_configs().ok().and_then(|mut cfgs| {
                        cfgs.find(|c| {
                            c.channels() == want
                                && c.sample_format() == SampleFormat::F32
                                && c.min_sample_rate() <= SampleRate(sample_rate)
                                && c.max_sample_rate() >= SampleRate(sample_rate)
                        })
                    })
                };

                let Some(supported) = find_channels(1).or_else(|| find_channels(2)) else {
                    let _ = open_tx.send(Err(ColloquyError::AudioDevice(format!(
                        "no f32 output config at {sample_rate} Hz"
                    ))));
                    return;
                };

                let channels = supported.channels();
                let config = StreamConfig {
                    channels,
                    sample_rate: SampleRate(sample_rate),
                    buffer_size: cpal::BufferSize::Default,
                };

                info!(
                    device = device.name().unwrap_or_default().as_str(),
                    sample_rate,
                    channels,
                    "opening output device"
                );

                let cb_shared = Arc::clone(&thread_shared);
                let ch = channels as usize;
                let stream = device.build_output_stream(
                    &config,
                    move |data: &mut [f32], _info| {
                        match cb_shared.timeline.try_lock() {
                            Some(mut timeline) => {
                                fill_output(data, ch, &cb_shared.clock_frames, &mut timeline);
                            }
                            None => {
                                // Contended with an enqueue — emit silence but
                                // keep the clock honest.
                                data.fill(0.0);
                                cb_shared
                                    .clock_frames
                                    .fetch_add((data.len() / ch) as u64, Ordering::Relaxed);
                            }
                        }
                    },
                    |err| error!("output stream error: {err}"),
                    None,
                );

                let stream = match stream {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = open_tx.send(Err(ColloquyError::AudioStream(e.to_string())));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = open_tx.send(Err(ColloquyError::AudioStream(e.to_string())));
                    return;
                }
                let _ = open_tx.send(Ok(()));

                while thread_shared.running.load(Ordering::Relaxed) {
                    std::thread::sleep(Duration::from_millis(25));
                }
                // Stream drops here, on its creation thread.
                drop(stream);
                debug!("playback device thread exited");
            })
            .map_err(|e| ColloquyError::Engine(format!("spawn playback thread: {e}")))?;

        match open_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                shared,
                sample_rate,
                device_thread: Some(device_thread),
            }),
            Ok(Err(e)) => {
                let _ = device_thread.join();
                Err(e)
            }
            Err(_) => Err(ColloquyError::Engine(
                "playback thread died before confirming device open".into(),
            )),
        }
    }

    #[cfg(not(feature = "audio-cpal"))]
    pub fn open(_sample_rate: u32) -> Result<Self> {
        Err(ColloquyError::AudioStream(
            "compiled without audio-cpal feature".into(),
        ))
    }
}

impl AudioOutput for CpalOutput {
    fn now(&self) -> f64 {
        self.shared.clock_frames.load(Ordering::Relaxed) as f64 / self.sample_rate as f64
    }

    fn enqueue_at(&mut self, start: f64, samples: Vec<f32>) -> Result<()> {
        if samples.is_empty() {
            return Err(ColloquyError::EmptyPacket);
        }
        let start_frames = (start * self.sample_rate as f64).round() as u64;
        let mut timeline = self.shared.timeline.lock();
        if let Some(back) = timeline.back() {
            debug_assert!(
                start_frames >= back.start,
                "items must be enqueued in schedule order"
            );
        }
        timeline.push_back(ScheduledItem {
            start: start_frames,
            samples,
        });
        Ok(())
    }

    fn close(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        self.shared.timeline.lock().clear();
        if let Some(handle) = self.device_thread.take() {
            if handle.join().is_err() {
                warn!("playback device thread panicked during close");
            }
        }
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.close();
    }
}

/// Default factory: one cpal engine per open call.
#[derive(Debug, Default)]
pub struct CpalOutputFactory;

impl OutputFactory for CpalOutputFactory {
    fn open(&self, sample_rate: u32) -> Result<Box<dyn AudioOutput>> {
        Ok(Box::new(CpalOutput::open(sample_rate)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(start: u64, samples: Vec<f32>) -> ScheduledItem {
        ScheduledItem { start, samples }
    }

    #[test]
    fn fill_emits_silence_before_an_item_starts() {
        let clock = AtomicU64::new(0);
        let mut timeline = VecDeque::from([item(4, vec![0.5, 0.6])]);
        let mut data = [9.9f32; 8];

        fill_output(&mut data, 1, &clock, &mut timeline);

        assert_eq!(&data[..4], &[0.0; 4]);
        assert_eq!(data[4], 0.5);
        assert_eq!(data[5], 0.6);
        assert_eq!(&data[6..], &[0.0; 2]);
        assert_eq!(clock.load(Ordering::Relaxed), 8);
    }

    #[test]
    fn fill_plays_abutting_items_without_gap() {
        let clock = AtomicU64::new(0);
        let mut timeline =
            VecDeque::from([item(0, vec![0.1, 0.2]), item(2, vec![0.3, 0.4])]);
        let mut data = [9.9f32; 5];

        fill_output(&mut data, 1, &clock, &mut timeline);

        assert_eq!(data, [0.1, 0.2, 0.3, 0.4, 0.0]);
        assert!(timeline.is_empty());
    }

    #[test]
    fn fill_duplicates_mono_sample_across_stereo_frame() {
        let clock = AtomicU64::new(0);
        let mut timeline = VecDeque::from([item(0, vec![0.7, -0.7])]);
        let mut data = [0.0f32; 4];

        fill_output(&mut data, 2, &clock, &mut timeline);

        assert_eq!(data, [0.7, 0.7, -0.7, -0.7]);
        // Two stereo frames → clock advanced by two frames, not four.
        assert_eq!(clock.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn fill_enters_mid_item_when_clock_is_already_inside_it() {
        // Enqueue raced the clock by a frame: play the remainder, do not
        // restart the item.
        let clock = AtomicU64::new(1);
        let mut timeline = VecDeque::from([item(0, vec![0.1, 0.2, 0.3])]);
        let mut data = [0.0f32; 2];

        fill_output(&mut data, 1, &clock, &mut timeline);

        assert_eq!(data, [0.2, 0.3]);
    }

    #[test]
    fn fill_discards_fully_elapsed_items() {
        let clock = AtomicU64::new(10);
        let mut timeline =
            VecDeque::from([item(0, vec![0.1; 4]), item(10, vec![0.9, 0.8])]);
        let mut data = [0.0f32; 3];

        fill_output(&mut data, 1, &clock, &mut timeline);

        assert_eq!(data, [0.9, 0.8, 0.0]);
        assert!(timeline.is_empty());
    }
}
