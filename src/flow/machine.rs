//! Step state machine.

use super::step::{Flow, Step};

/// A step transition that was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepChange {
    pub from: Step,
    pub to: Step,
}

/// Tracks the current step of one session.
///
/// The backend is authoritative: `advance` applies whatever step it names,
/// including moves backwards. The machine does not validate ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepMachine {
    flow: Flow,
    current: Step,
}

impl StepMachine {
    /// Machine for a new session, positioned at the flow's first step.
    pub fn new(flow: Flow) -> Self {
        Self {
            flow,
            current: flow.first(),
        }
    }

    /// Machine for a resumed session, positioned at its last persisted step.
    pub fn resume(flow: Flow, step: Step) -> Self {
        Self {
            flow,
            current: step,
        }
    }

    pub fn flow(&self) -> Flow {
        self.flow
    }

    pub fn current(&self) -> Step {
        self.current
    }

    /// Apply a `next_step` signal.
    ///
    /// Absent or equal to the current step is a no-op.
    pub fn advance(&mut self, next_step: Option<Step>) -> Option<StepChange> {
        let to = next_step?;
        if to == self.current {
            return None;
        }
        if !self.flow.contains(to) {
            tracing::warn!(
                flow = %self.flow,
                step = %to,
                "Applying step that belongs to another flow"
            );
        }
        let change = StepChange {
            from: self.current,
            to,
        };
        self.current = to;
        Some(change)
    }

    /// Move to `step` because of a local action rather than a server signal.
    pub fn realign(&mut self, step: Step) -> Option<StepChange> {
        self.advance(Some(step))
    }

    /// Zero-based position of the current step, for progress display.
    pub fn progress_index(&self) -> Option<usize> {
        self.flow.index_of(self.current)
    }

    pub fn step_count(&self) -> usize {
        self.flow.steps().len()
    }

    pub fn is_terminal(&self) -> bool {
        self.current == self.flow.terminal()
    }
}
