//! Event data model: note cells and the timed note events built from them.

/// Cell value for a rest.
pub const REST: i32 = 0;

/// Cell value that extends the previous note by one step.
pub const TIE: i32 = -1;

/// Cell value that shortens the previous note by one step.
pub const SHORTEN: i32 = -2;

/// Highest pitch a note cell may hold.
pub const MAX_CELL: i32 = 98;

/// What a single note cell means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    /// Silence; ends any tie chain.
    Rest,
    /// Trigger a note at this scale-relative semitone.
    Note(i32),
    /// Extend the most recent sounding note.
    Tie,
    /// Shorten the most recent sounding note (never below one step).
    Shorten,
}

/// Bring a raw cell into the valid range: pitches above [`MAX_CELL`] become
/// [`MAX_CELL`] and anything below [`SHORTEN`] becomes a rest.
pub fn clamp_cell(cell: i32) -> i32 {
    if cell > MAX_CELL {
        MAX_CELL
    } else if cell < SHORTEN {
        REST
    } else {
        cell
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        match clamp_cell(value) {
            v if v > 0 => Cell::Note(v),
            TIE => Cell::Tie,
            SHORTEN => Cell::Shorten,
            _ => Cell::Rest,
        }
    }
}

/// Number of steps the note at `index` sounds for, or `None` if the cell is
/// not a note.
///
/// Counts the run of tie and shorten markers directly after the note.
pub fn note_span(notes: &[i32], index: usize) -> Option<u32> {
    let Some(&cell) = notes.get(index) else {
        return None;
    };
    if !matches!(Cell::from(cell), Cell::Note(_)) {
        return None;
    }
    let mut steps: u32 = 1;
    for &next in &notes[index + 1..] {
        match Cell::from(next) {
            Cell::Tie => steps += 1,
            Cell::Shorten => steps = steps.saturating_sub(1).max(1),
            _ => break,
        }
    }
    Some(steps)
}

/// Identifies a track in a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub usize);

/// A note with resolved timing.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteEvent {
    pub track: TrackId,
    /// Step where the note starts.
    pub step: usize,
    /// Number of steps it sounds for.
    pub steps: u32,
    /// Offset from the start of the score, in milliseconds.
    pub start_ms: f64,
    pub duration_ms: f64,
    /// Scale-relative pitch as written in the cell.
    pub cell: i32,
}

impl NoteEvent {
    pub fn end_ms(&self) -> f64 {
        self.start_ms + self.duration_ms
    }
}
