//! Pipeline Latch Interface.
//!
//! Common behavior of the latches between stages, used by the flush and
//! stall logic.

/// Represents a pipeline latch (inter-stage buffer).
pub trait PipelineLatch {
    /// Replaces the content with a bubble.
    ///
    /// Called when a misprediction or trap squashes the instruction.
    fn flush(&mut self);

    /// Returns `true` if the latch holds a bubble.
    fn is_empty(&self) -> bool;
}
