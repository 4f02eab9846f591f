use super::error::EngineError;

/// Counter allocating invoice ids.
pub const PAYMENTS_COUNTER: &str = "payments";
/// Counter allocating job batch (schedule) ids.
pub const SCHEDULER_COUNTER: &str = "scheduler";
/// Counter allocating month-end closure batch ids.
pub const CLOSURES_COUNTER: &str = "closures";

/// Monotonic integer sequence for one named counter.
///
/// Values start at 1 and are never reused; a consumed value that ends up
/// unused leaves a gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sequence {
    next: u64,
}

impl Sequence {
    /// Create a new sequence starting at 1.
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Create a sequence continuing from a given value.
    pub fn starting_at(next: u64) -> Self {
        Self { next: next.max(1) }
    }

    /// Consume and return the next value.
    pub fn next_value(&mut self) -> Result<u64, EngineError> {
        let value = self.next;
        self.next = self.next.checked_add(1).ok_or_else(|| {
            EngineError::Validation("counter sequence exhausted".to_string())
        })?;
        Ok(value)
    }

    /// Value most recently issued, or 0 if none.
    pub fn current(&self) -> u64 {
        self.next - 1
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}
