//! Flow and step enumerations.
//!
//! Each flow is a fixed, totally ordered sequence of steps. Step names on the
//! wire are the lowercase variant names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SOLVE_STEPS: [Step; 5] = [
    Step::Receive,
    Step::Clarify,
    Step::Reframe,
    Step::Options,
    Step::Commit,
];

const LEARN_STEPS: [Step; 4] = [Step::Start, Step::Explore, Step::Practice, Step::Plan];

/// Which guided dialogue a session follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    /// Structured reflection: receive, clarify, reframe, options, commit
    Solve,
    /// Learning: start, explore, practice, plan
    Learn,
}

impl Flow {
    /// Ordered steps of this flow.
    pub fn steps(&self) -> &'static [Step] {
        match self {
            Flow::Solve => &SOLVE_STEPS,
            Flow::Learn => &LEARN_STEPS,
        }
    }

    /// Step a new session starts at.
    pub fn first(&self) -> Step {
        self.steps()[0]
    }

    /// Last step of the flow. Passing it ends the session.
    pub fn terminal(&self) -> Step {
        self.steps()[self.steps().len() - 1]
    }

    /// Position of `step` in this flow, if it belongs to it.
    pub fn index_of(&self, step: Step) -> Option<usize> {
        self.steps().iter().position(|s| *s == step)
    }

    pub fn contains(&self, step: Step) -> bool {
        self.index_of(step).is_some()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Flow::Solve => "solve",
            Flow::Learn => "learn",
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Flow {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "solve" => Ok(Flow::Solve),
            "learn" => Ok(Flow::Learn),
            other => Err(UnknownName(other.to_string())),
        }
    }
}

/// A single step of either flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Receive,
    Clarify,
    Reframe,
    Options,
    Commit,
    Start,
    Explore,
    Practice,
    Plan,
}

impl Step {
    /// Flow this step belongs to.
    pub fn flow(&self) -> Flow {
        match self {
            Step::Receive | Step::Clarify | Step::Reframe | Step::Options | Step::Commit => {
                Flow::Solve
            }
            Step::Start | Step::Explore | Step::Practice | Step::Plan => Flow::Learn,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Receive => "receive",
            Step::Clarify => "clarify",
            Step::Reframe => "reframe",
            Step::Options => "options",
            Step::Commit => "commit",
            Step::Start => "start",
            Step::Explore => "explore",
            Step::Practice => "practice",
            Step::Plan => "plan",
        }
    }

    /// Whether this is the last step of its flow.
    pub fn is_terminal(&self) -> bool {
        self.flow().terminal() == *self
    }

    /// Key handed to the host's translation lookup for the step title.
    pub fn label_key(&self) -> String {
        format!("{}.steps.{}", self.flow().as_str(), self.as_str())
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Step {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        SOLVE_STEPS
            .iter()
            .chain(LEARN_STEPS.iter())
            .find(|step| step.as_str() == name)
            .copied()
            .ok_or(UnknownName(name))
    }
}

/// A flow or step name that is not part of the known enumeration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown flow or step name: {0:?}")]
pub struct UnknownName(pub String);
