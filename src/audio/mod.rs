//! Audio output pipeline
//!
//! Decodes inbound PCM16 frames and schedules them gaplessly on an
//! injected [`AudioSink`]; [`CpalSink`] is the hardware-backed sink.

mod codec;
mod playback;
mod sink;

pub use codec::{duration_secs, pcm16_to_samples, samples_to_pcm16, OUTPUT_SAMPLE_RATE};
pub use playback::{AudioSink, PlaybackScheduler};
pub use sink::CpalSink;
