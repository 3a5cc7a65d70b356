//! Progress callbacks
//!
//! These traits keep the sequencer free of any particular console or UI.

use crate::types::Phase;

/// Progress callback for sequence runs
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback {
    /// Called once before the first scriptlet runs
    fn on_sequence_start(&mut self, phase: Phase, count: usize);

    /// Called when a scriptlet is about to run
    fn on_scriptlet_start(&mut self, name: &str, phase: Phase);

    /// Called when a scriptlet returns
    fn on_scriptlet_complete(&mut self, name: &str, phase: Phase, success: bool);

    /// Called once after the run ends, successful or not
    fn on_sequence_complete(&mut self, phase: Phase, success: bool);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_sequence_start(&mut self, _phase: Phase, _count: usize) {}
    fn on_scriptlet_start(&mut self, _name: &str, _phase: Phase) {}
    fn on_scriptlet_complete(&mut self, _name: &str, _phase: Phase, _success: bool) {}
    fn on_sequence_complete(&mut self, _phase: Phase, _success: bool) {}
}
