//! Hardware audio sink backed by cpal
//!
//! Owns a dedicated audio thread so the `!Send` cpal stream never
//! crosses into the async runtime; the sink handle itself is `Send`.

use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use crate::audio::codec::OUTPUT_SAMPLE_RATE;
use crate::audio::AudioSink;
use crate::{Error, Result};

enum SinkCommand {
    Resume,
    Shutdown,
}

/// Audio sink writing to the default output device.
///
/// Samples are fed through a shared queue drained by the device
/// callback; `stop_all` clears the queue so playback halts at the next
/// callback quantum.
pub struct CpalSink {
    epoch: Instant,
    queue: Arc<Mutex<VecDeque<f32>>>,
    sample_rate: u32,
    ctrl: mpsc::Sender<SinkCommand>,
}

impl CpalSink {
    /// Open the default output device at 24 kHz.
    ///
    /// # Errors
    ///
    /// Returns `Error::Audio` if no suitable output device or stream
    /// configuration is available.
    pub fn new() -> Result<Self> {
        let queue: Arc<Mutex<VecDeque<f32>>> = Arc::new(Mutex::new(VecDeque::new()));
        let (ctrl_tx, ctrl_rx) = mpsc::channel::<SinkCommand>();
        let (ready_tx, ready_rx) = mpsc::channel::<std::result::Result<(), String>>();

        let thread_queue = Arc::clone(&queue);
        std::thread::Builder::new()
            .name("voxlink-audio".to_string())
            .spawn(move || audio_thread(&thread_queue, &ctrl_rx, &ready_tx))
            .map_err(|e| Error::Audio(format!("audio thread spawn failed: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(Error::Audio(e)),
            Err(_) => return Err(Error::Audio("audio thread exited early".to_string())),
        }

        Ok(Self {
            epoch: Instant::now(),
            queue,
            sample_rate: OUTPUT_SAMPLE_RATE,
            ctrl: ctrl_tx,
        })
    }
}

impl AudioSink for CpalSink {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    fn schedule(&mut self, samples: &[f32], sample_rate: u32, start: f64) -> Result<()> {
        // The device stream is opened at a fixed rate; the scheduler
        // always feeds that rate.
        if sample_rate != self.sample_rate {
            return Err(Error::Audio(format!(
                "sink runs at {} Hz, got a {sample_rate} Hz buffer",
                self.sample_rate
            )));
        }

        let mut queue = self
            .queue
            .lock()
            .map_err(|_| Error::Audio("audio queue poisoned".to_string()))?;

        // Pad with silence when the requested start is beyond the end
        // of what is already queued.
        #[allow(clippy::cast_precision_loss)]
        let queued_secs = queue.len() as f64 / f64::from(self.sample_rate);
        let gap = start - (self.now() + queued_secs);
        if gap > 0.001 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let pad = (gap * f64::from(self.sample_rate)) as usize;
            queue.extend(std::iter::repeat_n(0.0, pad));
        }
        queue.extend(samples.iter().copied());
        Ok(())
    }

    fn stop_all(&mut self) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.clear();
        }
    }

    fn resume(&mut self) -> Result<()> {
        self.ctrl
            .send(SinkCommand::Resume)
            .map_err(|_| Error::Audio("audio thread gone".to_string()))
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        let _ = self.ctrl.send(SinkCommand::Shutdown);
    }
}

/// Build the output stream and service control commands until shutdown.
fn audio_thread(
    queue: &Arc<Mutex<VecDeque<f32>>>,
    ctrl: &mpsc::Receiver<SinkCommand>,
    ready: &mpsc::Sender<std::result::Result<(), String>>,
) {
    let stream = match build_stream(queue) {
        Ok(s) => {
            let _ = ready.send(Ok(()));
            s
        }
        Err(e) => {
            let _ = ready.send(Err(e.to_string()));
            return;
        }
    };

    if let Err(e) = stream.play() {
        tracing::warn!(error = %e, "initial stream start failed; waiting for resume");
    }

    while let Ok(cmd) = ctrl.recv() {
        match cmd {
            SinkCommand::Resume => {
                if let Err(e) = stream.play() {
                    tracing::error!(error = %e, "audio stream resume failed");
                }
            }
            SinkCommand::Shutdown => break,
        }
    }
}

fn build_stream(queue: &Arc<Mutex<VecDeque<f32>>>) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

    let supported = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= SampleRate(OUTPUT_SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(OUTPUT_SAMPLE_RATE)
        })
        .or_else(|| {
            // Fallback: stereo, mono sample duplicated per frame
            device.supported_output_configs().ok()?.find(|c| {
                c.channels() == 2
                    && c.min_sample_rate() <= SampleRate(OUTPUT_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(OUTPUT_SAMPLE_RATE)
            })
        })
        .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

    let config: StreamConfig = supported.with_sample_rate(SampleRate(OUTPUT_SAMPLE_RATE)).config();
    let channels = config.channels as usize;

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate = OUTPUT_SAMPLE_RATE,
        channels = config.channels,
        "audio sink initialized"
    );

    let callback_queue = Arc::clone(queue);
    device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut queue = match callback_queue.lock() {
                    Ok(q) => q,
                    Err(_) => return,
                };
                for frame in data.chunks_mut(channels) {
                    let sample = queue.pop_front().unwrap_or(0.0);
                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                }
            },
            |err| {
                tracing::error!(error = %err, "audio output stream error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))
}

