//! Lifecycle sequencer - runs a configured scriptlet list in phase order
//!
//! Spawn and respawn walk the list forward; destroy walks it backward so that
//! children go before the parents they live in. The first failure stops the
//! run. Nothing is retried or rolled back: every scriptlet is idempotent, so
//! the remedy for a partial run is simply running again.

use crate::context::ProgressCallback;
use crate::error::{Error, Result};
use crate::scriptlet::BoxedScriptlet;
use crate::types::{Phase, SequenceReport, SequenceState};

/// Runs one phase over an ordered list of scriptlets
pub struct Sequencer<'a, C: ?Sized> {
    scriptlets: &'a [BoxedScriptlet<C>],
    state: SequenceState,
}

impl<'a, C: ?Sized> Sequencer<'a, C> {
    /// Create a sequencer over scriptlets in configured order
    pub fn new(scriptlets: &'a [BoxedScriptlet<C>]) -> Self {
        Self {
            scriptlets,
            state: SequenceState::NotStarted,
        }
    }

    /// Current state
    pub fn state(&self) -> SequenceState {
        self.state
    }

    /// Positions in execution order for `phase`
    fn order(&self, phase: Phase) -> Vec<usize> {
        let positions = 0..self.scriptlets.len();
        if phase.is_reversed() {
            positions.rev().collect()
        } else {
            positions.collect()
        }
    }

    /// Run `phase` over every scriptlet, stopping at the first failure
    pub fn run<P: ProgressCallback>(
        &mut self,
        phase: Phase,
        ctx: &C,
        progress: &mut P,
    ) -> Result<SequenceReport> {
        if self.scriptlets.is_empty() {
            return Err(Error::EmptySequence);
        }

        progress.on_sequence_start(phase, self.scriptlets.len());
        let mut completed = Vec::with_capacity(self.scriptlets.len());

        for position in self.order(phase) {
            let scriptlet = &self.scriptlets[position];
            let name = scriptlet.name();

            self.state = SequenceState::Running(position);
            log::debug!("{phase}: running scriptlet '{name}' (position {position})");
            progress.on_scriptlet_start(name, phase);

            if let Err(source) = scriptlet.run(phase, ctx) {
                self.state = SequenceState::Failed(position);
                log::error!("{phase}: scriptlet '{name}' failed: {source:#}");
                progress.on_scriptlet_complete(name, phase, false);
                progress.on_sequence_complete(phase, false);
                return Err(Error::ScriptletFailed {
                    phase,
                    name: name.to_string(),
                    position,
                    source,
                });
            }

            progress.on_scriptlet_complete(name, phase, true);
            completed.push(name.to_string());
        }

        self.state = SequenceState::Complete;
        progress.on_sequence_complete(phase, true);

        Ok(SequenceReport {
            phase,
            completed,
            state: self.state,
        })
    }
}

/// Run `phase` over `scriptlets` without keeping the sequencer around
pub fn run<C: ?Sized, P: ProgressCallback>(
    phase: Phase,
    scriptlets: &[BoxedScriptlet<C>],
    ctx: &C,
    progress: &mut P,
) -> Result<SequenceReport> {
    Sequencer::new(scriptlets).run(phase, ctx, progress)
}
