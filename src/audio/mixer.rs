//! Voice mixer: sums scheduled mono voices into consecutive blocks of frames.
//!
//! Shared by the realtime callback and the offline bounce so both place voices
//! on the same frame grid.

use super::VoiceHandle;

/// One scheduled buffer and how much of it has been played.
#[derive(Debug, Clone)]
struct Voice {
    handle: VoiceHandle,
    start_frame: u64,
    samples: Vec<f32>,
    pos: usize,
}

/// Active voices, mixed block by block.
#[derive(Debug, Default)]
pub struct Mixer {
    voices: Vec<Voice>,
}

impl Mixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `samples` to start at `start_frame`.
    ///
    /// A voice whose start frame has already passed starts at the next block.
    pub fn add(&mut self, handle: VoiceHandle, start_frame: u64, samples: Vec<f32>) {
        if samples.is_empty() {
            return;
        }
        self.voices.push(Voice {
            handle,
            start_frame,
            samples,
            pos: 0,
        });
    }

    pub fn stop(&mut self, handle: VoiceHandle) {
        self.voices.retain(|v| v.handle != handle);
    }

    pub fn stop_all(&mut self) {
        self.voices.clear();
    }

    /// Number of voices still sounding or waiting to start.
    pub fn active(&self) -> usize {
        self.voices.len()
    }

    /// Add every voice's contribution to `out`, whose first frame is
    /// `block_start`. Finished voices are dropped.
    pub fn mix(&mut self, block_start: u64, out: &mut [f32]) {
        let block_end = block_start + out.len() as u64;
        for voice in &mut self.voices {
            if voice.start_frame >= block_end {
                continue;
            }
            let offset = voice.start_frame.saturating_sub(block_start) as usize;
            let remaining = &voice.samples[voice.pos..];
            let count = remaining.len().min(out.len() - offset);
            for (dst, &src) in out[offset..offset + count].iter_mut().zip(remaining) {
                *dst += src;
            }
            voice.pos += count;
        }
        self.voices.retain(|v| v.pos < v.samples.len());
    }
}
