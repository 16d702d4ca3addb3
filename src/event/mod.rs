//! Event engine: tempo map, note timeline and the lookahead transport.
//!
//! The [`Transport`] sits between the score and an [`AudioSink`](crate::audio::AudioSink).
//! It turns note cells into a [`Timeline`] of absolute-time events and
//! schedules them against the sink's clock ahead of time, so all scheduling
//! logic is testable with the offline [`Bounce`](crate::audio::Bounce) sink.

pub mod tempo;
pub mod timeline;
pub mod transport;
pub mod types;

pub use tempo::{duration_ms, TempoMap, DEFAULT_BPM};
pub use timeline::Timeline;
pub use transport::{note_params, PlayState, Transport, TransportStats};
pub use types::{note_span, Cell, NoteEvent, TrackId};
