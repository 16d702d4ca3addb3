//! Commands sent from the main thread to the audio thread via ring buffer.

use super::VoiceHandle;

/// Commands sent from the main thread to the audio thread via ring buffer.
#[derive(Debug)]
pub enum AudioCommand {
    /// Start a mono voice at an absolute frame of the audio clock.
    Play {
        voice: VoiceHandle,
        start_frame: u64,
        samples: Vec<f32>,
    },

    /// Silence one voice immediately.
    Stop(VoiceHandle),

    /// Silence every voice.
    StopAll,

    /// Set master volume (0.0 to 1.0).
    SetVolume(f32),
}
