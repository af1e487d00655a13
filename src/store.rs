//! Shared sample storage between the ingest and render contexts.
//!
//! The store is a single mutex-guarded sequence of samples. In unbounded mode it
//! is a plain growing vector; in rolling mode it is a fixed-size ring buffer that
//! overwrites the oldest sample once full, so eviction never shifts memory.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Smallest capacity accepted for a rolling buffer.
pub const MIN_CAPACITY: usize = 10;
/// Largest capacity accepted for a rolling buffer.
pub const MAX_CAPACITY: usize = 100_000;

/// One (x, y) data point parsed from the input stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub x: f64,
    pub y: f64,
}

impl Sample {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Retention policy, fixed for the lifetime of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferPolicy {
    /// Keep every sample ever appended.
    Unbounded,
    /// Keep only the most recent `capacity` samples.
    Rolling(usize),
}

impl BufferPolicy {
    /// Returns the capacity, or `None` when unbounded.
    pub fn capacity(&self) -> Option<usize> {
        match self {
            Self::Unbounded => None,
            Self::Rolling(capacity) => Some(*capacity),
        }
    }
}

impl std::fmt::Display for BufferPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unbounded => write!(f, "unbounded"),
            Self::Rolling(capacity) => write!(f, "rolling ({capacity} points)"),
        }
    }
}

#[derive(Debug)]
enum Samples {
    Growing(Vec<Sample>),
    Ring {
        slots: Vec<Sample>,
        /// Index of the oldest sample once the ring is full.
        head: usize,
        capacity: usize,
        evictions: u64,
    },
}

impl Samples {
    fn push(&mut self, sample: Sample) -> bool {
        match self {
            Self::Growing(samples) => {
                samples.push(sample);
                false
            }
            Self::Ring {
                slots,
                head,
                capacity,
                evictions,
            } => {
                if slots.len() < *capacity {
                    slots.push(sample);
                    false
                } else {
                    slots[*head] = sample;
                    *head = (*head + 1) % *capacity;
                    *evictions += 1;
                    true
                }
            }
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Growing(samples) => samples.len(),
            Self::Ring { slots, .. } => slots.len(),
        }
    }

    fn to_vec(&self) -> Vec<Sample> {
        match self {
            Self::Growing(samples) => samples.clone(),
            Self::Ring { slots, head, .. } => {
                let mut out = Vec::with_capacity(slots.len());
                out.extend_from_slice(&slots[*head..]);
                out.extend_from_slice(&slots[..*head]);
                out
            }
        }
    }

    fn evictions(&self) -> u64 {
        match self {
            Self::Growing(_) => 0,
            Self::Ring { evictions, .. } => *evictions,
        }
    }
}

/// Result of a single append, reported back to the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Whether the append evicted the oldest sample.
    pub evicted: bool,
    /// Total evictions so far, including this one.
    pub evictions: u64,
}

/// Thread-safe ordered sample container.
///
/// `append` and `snapshot` serialize on one mutex, so a snapshot taken after
/// `append` returns always contains that sample and never sees a partial write.
/// Both hold the lock only for a copy or a single slot write.
#[derive(Debug)]
pub struct SampleStore {
    policy: BufferPolicy,
    samples: Mutex<Samples>,
}

impl SampleStore {
    /// Creates an empty store with the given policy.
    ///
    /// Rolling capacities are validated by the configuration layer; a capacity of
    /// zero is treated as one so the ring arithmetic stays defined.
    pub fn new(policy: BufferPolicy) -> Self {
        let samples = match policy {
            BufferPolicy::Unbounded => Samples::Growing(Vec::new()),
            BufferPolicy::Rolling(capacity) => {
                let capacity = capacity.max(1);
                Samples::Ring {
                    slots: Vec::with_capacity(capacity),
                    head: 0,
                    capacity,
                    evictions: 0,
                }
            }
        };

        Self {
            policy,
            samples: Mutex::new(samples),
        }
    }

    #[cfg(test)]
    pub fn unbounded() -> Self {
        Self::new(BufferPolicy::Unbounded)
    }

    #[cfg(test)]
    pub fn rolling(capacity: usize) -> Self {
        Self::new(BufferPolicy::Rolling(capacity))
    }

    /// Appends a sample at the logical end, evicting the oldest one if the
    /// rolling buffer is full.
    pub fn append(&self, sample: Sample) -> AppendOutcome {
        let mut samples = self.lock();
        let evicted = samples.push(sample);
        AppendOutcome {
            evicted,
            evictions: samples.evictions(),
        }
    }

    /// Returns an independent copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.lock().to_vec()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the rolling capacity, or `None` for an unbounded store.
    pub fn capacity(&self) -> Option<usize> {
        self.policy.capacity()
    }

    /// Total number of samples evicted so far (always 0 when unbounded).
    pub fn eviction_count(&self) -> u64 {
        self.lock().evictions()
    }

    /// A panic on the other side cannot leave `Samples` half-updated, so a
    /// poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Samples> {
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
