//! Gapless playback scheduling
//!
//! [`PlaybackScheduler`] turns PCM16 frames arriving in bursts into
//! back-to-back scheduled buffers on an [`AudioSink`]. `stop()` is the
//! barge-in path: it halts everything scheduled and resets the cursor.

use crate::audio::codec;
use crate::Result;

/// Output clock and buffer scheduling capability.
///
/// Implemented by [`crate::audio::CpalSink`] for real hardware and by
/// fakes in tests. Times are in seconds on the sink's own clock.
pub trait AudioSink: Send {
    /// Current time on the sink clock
    fn now(&self) -> f64;

    /// Schedule `samples` to start playing at `start` (sink clock time)
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot accept the buffer.
    fn schedule(&mut self, samples: &[f32], sample_rate: u32, start: f64) -> Result<()>;

    /// Immediately halt every scheduled and playing buffer.
    ///
    /// Must not fail, including when nothing is scheduled or a buffer
    /// already finished naturally.
    fn stop_all(&mut self);

    /// Resume the output clock.
    ///
    /// Some runtimes suspend the output device until an explicit
    /// resume gesture; this is that gesture.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be resumed.
    fn resume(&mut self) -> Result<()>;
}

/// Schedules decoded frames back-to-back on an [`AudioSink`]
pub struct PlaybackScheduler<S: AudioSink> {
    sink: S,
    sample_rate: u32,
    /// Start time of the next buffer on the sink clock; 0.0 when idle
    next_start: f64,
}

impl<S: AudioSink> PlaybackScheduler<S> {
    /// Create a scheduler over `sink` at the default output rate
    pub fn new(sink: S) -> Self {
        Self::with_sample_rate(sink, codec::OUTPUT_SAMPLE_RATE)
    }

    /// Create a scheduler with an explicit sample rate
    pub fn with_sample_rate(sink: S, sample_rate: u32) -> Self {
        Self {
            sink,
            sample_rate,
            next_start: 0.0,
        }
    }

    /// Decode a raw PCM16 frame and schedule it after everything
    /// already queued.
    ///
    /// Frames play at `max(cursor, now)` so bursts queue gaplessly and
    /// a frame arriving after silence starts immediately.
    ///
    /// # Errors
    ///
    /// Returns `Error::Audio` if the frame is malformed or the sink
    /// rejects the buffer.
    pub fn enqueue(&mut self, frame: &[u8]) -> Result<()> {
        let samples = codec::pcm16_to_samples(frame)?;
        if samples.is_empty() {
            return Ok(());
        }
        let start = self.next_start.max(self.sink.now());
        self.sink.schedule(&samples, self.sample_rate, start)?;
        self.next_start = start + codec::duration_secs(samples.len(), self.sample_rate);
        tracing::trace!(
            samples = samples.len(),
            start,
            next = self.next_start,
            "scheduled audio frame"
        );
        Ok(())
    }

    /// Halt all playback immediately and reset the schedule (barge-in).
    ///
    /// Safe to call at any time, including before any audio has been
    /// scheduled; never errors.
    pub fn stop(&mut self) {
        self.sink.stop_all();
        self.next_start = 0.0;
        tracing::debug!("playback stopped, schedule cleared");
    }

    /// Resume the underlying output clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot be resumed.
    pub fn resume(&mut self) -> Result<()> {
        self.sink.resume()
    }

    /// Sink-clock time at which the last scheduled buffer ends;
    /// 0.0 when the schedule is empty.
    #[must_use]
    pub fn cursor(&self) -> f64 {
        self.next_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::codec::samples_to_pcm16;

    /// Records scheduled buffers; clock advanced manually.
    struct RecordingSink {
        now: f64,
        scheduled: Vec<(usize, f64)>,
        rates: Vec<u32>,
        stops: usize,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                now: 0.0,
                scheduled: Vec::new(),
                rates: Vec::new(),
                stops: 0,
            }
        }
    }

    impl AudioSink for RecordingSink {
        fn now(&self) -> f64 {
            self.now
        }

        fn schedule(&mut self, samples: &[f32], sample_rate: u32, start: f64) -> Result<()> {
            self.scheduled.push((samples.len(), start));
            self.rates.push(sample_rate);
            Ok(())
        }

        fn stop_all(&mut self) {
            self.stops += 1;
            self.scheduled.clear();
        }

        fn resume(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn frame_of(samples: usize) -> Vec<u8> {
        samples_to_pcm16(&vec![0.1; samples])
    }

    #[test]
    fn frames_schedule_back_to_back() {
        let mut scheduler = PlaybackScheduler::with_sample_rate(RecordingSink::new(), 24_000);
        // Two 0.5 s frames arriving in one burst
        scheduler.enqueue(&frame_of(12_000)).unwrap();
        scheduler.enqueue(&frame_of(12_000)).unwrap();

        let starts: Vec<f64> = scheduler.sink.scheduled.iter().map(|s| s.1).collect();
        assert!((starts[0] - 0.0).abs() < f64::EPSILON);
        assert!((starts[1] - 0.5).abs() < 1e-9);
        assert!((scheduler.cursor() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn late_frame_starts_at_now() {
        let mut scheduler = PlaybackScheduler::with_sample_rate(RecordingSink::new(), 24_000);
        scheduler.enqueue(&frame_of(2_400)).unwrap(); // 0.1 s
        // Clock moves well past the queued audio
        scheduler.sink.now = 5.0;
        scheduler.enqueue(&frame_of(2_400)).unwrap();

        let second_start = scheduler.sink.scheduled[1].1;
        assert!((second_start - 5.0).abs() < f64::EPSILON);
        assert!((scheduler.cursor() - 5.1).abs() < 1e-9);
    }

    #[test]
    fn stop_clears_schedule_and_resets_cursor() {
        let mut scheduler = PlaybackScheduler::with_sample_rate(RecordingSink::new(), 24_000);
        scheduler.enqueue(&frame_of(12_000)).unwrap();
        scheduler.enqueue(&frame_of(12_000)).unwrap();
        scheduler.enqueue(&frame_of(12_000)).unwrap();

        scheduler.stop();
        assert!(scheduler.sink.scheduled.is_empty());
        assert!(scheduler.cursor().abs() < f64::EPSILON);
    }

    #[test]
    fn stop_on_empty_schedule_is_harmless() {
        let mut scheduler = PlaybackScheduler::with_sample_rate(RecordingSink::new(), 24_000);
        scheduler.stop();
        scheduler.stop();
        assert_eq!(scheduler.sink.stops, 2);
        assert!(scheduler.cursor().abs() < f64::EPSILON);
    }

    #[test]
    fn default_scheduler_always_feeds_the_output_rate() {
        let mut scheduler = PlaybackScheduler::new(RecordingSink::new());
        scheduler.enqueue(&frame_of(240)).unwrap();
        scheduler.enqueue(&frame_of(480)).unwrap();
        assert_eq!(
            scheduler.sink.rates,
            vec![codec::OUTPUT_SAMPLE_RATE, codec::OUTPUT_SAMPLE_RATE]
        );
    }

    #[test]
    fn empty_frame_is_a_no_op() {
        let mut scheduler = PlaybackScheduler::with_sample_rate(RecordingSink::new(), 24_000);
        scheduler.enqueue(&[]).unwrap();
        assert!(scheduler.sink.scheduled.is_empty());
        assert!(scheduler.cursor().abs() < f64::EPSILON);
    }

    #[test]
    fn malformed_frame_is_an_error() {
        let mut scheduler = PlaybackScheduler::with_sample_rate(RecordingSink::new(), 24_000);
        assert!(scheduler.enqueue(&[0x01]).is_err());
    }
}
