use crate::error::{Error, Result};

/// Tracks how deeply nested the decoder currently is, so hostile input can't run it out of
/// stack.
#[derive(Clone, Debug)]
pub struct DepthTracker {
    depth: usize,
    limit: usize,
}

impl DepthTracker {
    /// Create a new depth tracker
    pub fn new(limit: usize) -> Self {
        Self { depth: 0, limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }

    /// Step into a sequence, map, or record body.
    pub fn enter(&mut self) -> Result<()> {
        if self.depth >= self.limit {
            return Err(Error::ParseLimit(format!(
                "Depth limit of {} exceeded",
                self.limit
            )));
        }
        self.depth += 1;
        Ok(())
    }

    /// Step back out of a container body.
    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Forget any nesting left over from a decode that was aborted partway through.
    pub fn reset(&mut self) {
        self.depth = 0;
    }
}
