//! Transaction flow logging.
//!
//! Each service records where a flow entered or left it, so one session can
//! be followed through the proxy by filtering on `target: "transaction"`.

use tracing::info;

use crate::host::StateBag;

/// Which way the flow crossed the service boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Entry,
    Exit,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Entry => write!(f, "entry"),
            Direction::Exit => write!(f, "exit"),
        }
    }
}

/// How the step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Cancel,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Success => write!(f, "success"),
            Outcome::Cancel => write!(f, "cancel"),
        }
    }
}

/// One step of a transaction flow.
#[derive(Debug, Clone)]
pub struct FlowEvent<'a> {
    /// Position of the step in the overall proxy flow.
    pub order: u32,
    pub component: &'a str,
    pub step: &'a str,
    pub direction: Direction,
    pub outcome: Outcome,
    pub message: &'a str,
    /// Who caused the step to end, e.g. `user`.
    pub actor: Option<&'a str>,
}

pub fn transaction_log(state: &StateBag, event: &FlowEvent<'_>) {
    info!(
        target: "transaction",
        session_id = %state.session_id,
        router = %state.router,
        order = event.order,
        component = event.component,
        step = event.step,
        direction = %event.direction,
        outcome = %event.outcome,
        actor = event.actor.unwrap_or(""),
        "{}",
        event.message
    );
}
