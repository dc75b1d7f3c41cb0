//! Fixed-length history used to debounce settle and arrival decisions.

/// Ring buffer holding the most recent `len` samples, oldest evicted first.
///
/// The window is always full: it starts out filled with a sentinel that is
/// never within tolerance, so a single good reading cannot settle it.
#[derive(Debug, Clone, PartialEq)]
pub struct SettleWindow {
    samples: Vec<f32>,
    head: usize,
}

impl SettleWindow {
    /// Sentinel for heading errors: facing exactly away.
    pub const HEADING_SENTINEL: f32 = 180.0;
    /// Sentinel for distances.
    pub const DISTANCE_SENTINEL: f32 = f32::INFINITY;

    /// A window of `len` samples (at least one) filled with `sentinel`.
    pub fn new(len: usize, sentinel: f32) -> Self {
        Self {
            samples: vec![sentinel; len.max(1)],
            head: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Never true; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Drop the oldest sample and append `sample`.
    pub fn push(&mut self, sample: f32) {
        self.samples[self.head] = sample;
        self.head = (self.head + 1) % self.samples.len();
    }

    /// Overwrite every slot with `sentinel`.
    pub fn fill(&mut self, sentinel: f32) {
        self.samples.fill(sentinel);
        self.head = 0;
    }

    /// True iff every held sample has magnitude within `tolerance`.
    pub fn is_within(&self, tolerance: f32) -> bool {
        self.samples.iter().all(|s| s.abs() <= tolerance)
    }

    /// Samples from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        let (newer, older) = self.samples.split_at(self.head);
        older.iter().chain(newer).copied()
    }
}
