//! Debounced per-zone state machine.
//!
//! Suppresses detector flicker by requiring N consecutive same-class
//! observations before committing a state change, tracks how long a zone has
//! been open, and fires a one-shot left-open event per open episode.
//!
//! `unknown` observations are bookkeeping only: they update the candidate
//! tracking but never reset an in-progress `open`/`closed` run and never
//! cause a transition. An opposite-class observation does reset the run.

use std::fmt;

use crate::events::ZoneSpec;

const DEFAULT_OPEN_REQUIRED: u32 = 3;
const DEFAULT_CLOSED_REQUIRED: u32 = 3;

/// Reduced zone state for a single observation or the committed machine state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZoneState {
    Unknown,
    Open,
    Closed,
}

impl ZoneState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ZoneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events produced by a single `update` call. At most one of each.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StateOutput {
    pub transition_event: Option<&'static str>,
    pub left_open_event: Option<&'static str>,
}

pub struct DebouncedStateMachine {
    open_event: &'static str,
    close_event: &'static str,
    left_open_event: &'static str,
    left_open_seconds: f64,
    open_required: u32,
    closed_required: u32,

    state: ZoneState,
    candidate: Option<ZoneState>,
    candidate_count: u32,
    open_since: Option<f64>,
    left_open_emitted: bool,
}

impl DebouncedStateMachine {
    pub fn new(spec: &'static ZoneSpec, left_open_seconds: f64) -> Self {
        Self {
            open_event: spec.open_event,
            close_event: spec.close_event,
            left_open_event: spec.left_open_event,
            left_open_seconds,
            open_required: DEFAULT_OPEN_REQUIRED,
            closed_required: DEFAULT_CLOSED_REQUIRED,
            state: ZoneState::Unknown,
            candidate: None,
            candidate_count: 0,
            open_since: None,
            left_open_emitted: false,
        }
    }

    /// Override the consecutive-observation thresholds.
    pub fn with_required(mut self, open_required: u32, closed_required: u32) -> Self {
        self.open_required = open_required;
        self.closed_required = closed_required;
        self
    }

    /// Committed state (not the candidate under debounce).
    pub fn state(&self) -> ZoneState {
        self.state
    }

    /// Feed one observation taken at `ts` (epoch seconds).
    pub fn update(&mut self, observed: ZoneState, ts: f64) -> StateOutput {
        if observed == ZoneState::Unknown {
            if self.candidate == Some(ZoneState::Unknown) {
                self.candidate_count += 1;
            } else {
                self.candidate = Some(ZoneState::Unknown);
                self.candidate_count = 1;
            }
            return StateOutput {
                transition_event: None,
                left_open_event: self.check_left_open(ts),
            };
        }

        if self.candidate == Some(observed) {
            self.candidate_count += 1;
        } else {
            self.candidate = Some(observed);
            self.candidate_count = 1;
        }

        let required = if observed == ZoneState::Open {
            self.open_required
        } else {
            self.closed_required
        };

        let mut transition_event = None;
        if self.candidate_count >= required && self.state != observed {
            self.state = observed;
            match observed {
                ZoneState::Open => {
                    self.open_since = Some(ts);
                    self.left_open_emitted = false;
                    transition_event = Some(self.open_event);
                }
                ZoneState::Closed => {
                    self.open_since = None;
                    self.left_open_emitted = false;
                    transition_event = Some(self.close_event);
                }
                ZoneState::Unknown => unreachable!("unknown handled above"),
            }
        }

        StateOutput {
            transition_event,
            left_open_event: self.check_left_open(ts),
        }
    }

    fn check_left_open(&mut self, ts: f64) -> Option<&'static str> {
        if self.state != ZoneState::Open {
            return None;
        }
        let Some(open_since) = self.open_since else {
            self.open_since = Some(ts);
            return None;
        };
        if self.left_open_emitted {
            return None;
        }
        if ts - open_since >= self.left_open_seconds {
            self.left_open_emitted = true;
            return Some(self.left_open_event);
        }
        None
    }
}
