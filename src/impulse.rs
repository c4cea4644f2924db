//! Whether an impulse is waiting for its outcome.

use crate::event::{Event, EventKind, ImpulsePayload};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// How long the user sits with an impulse before recording an outcome.
pub const IMPULSE_WINDOW: TimeDelta = TimeDelta::minutes(20);

/// The most recent impulse, as recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpulseRecord {
    pub event_id: String,
    pub started_at: DateTime<Utc>,
    pub payload: ImpulsePayload,
}

/// Folded state of the `impulse` view: the latest impulse and the time of
/// the latest outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImpulseLedger {
    pub last_impulse: Option<ImpulseRecord>,
    pub last_outcome_at: Option<DateTime<Utc>>,
}

impl ImpulseLedger {
    /// Whether the latest impulse is still open.
    ///
    /// Only the latest outcome and the latest impulse are compared: the
    /// impulse is resolved iff that outcome is strictly newer.
    pub fn state(&self) -> ActiveImpulseState {
        let Some(impulse) = &self.last_impulse else {
            return ActiveImpulseState::Inactive;
        };
        match self.last_outcome_at {
            Some(outcome_at) if outcome_at > impulse.started_at => ActiveImpulseState::Inactive,
            _ => ActiveImpulseState::Active(ActiveImpulse {
                event_id: impulse.event_id.clone(),
                start_time: impulse.started_at,
                payload: impulse.payload.clone(),
            }),
        }
    }
}

/// Reducer for the `impulse` view.
///
/// Keeps the impulse and outcome with the greatest timestamp; on a tie the
/// later-appended event wins.
pub fn impulse_reducer(mut state: ImpulseLedger, event: &Event) -> ImpulseLedger {
    match &event.kind {
        EventKind::Impulse(payload) => {
            let newer = state
                .last_impulse
                .as_ref()
                .is_none_or(|last| event.timestamp >= last.started_at);
            if newer {
                state.last_impulse = Some(ImpulseRecord {
                    event_id: event.id.clone(),
                    started_at: event.timestamp,
                    payload: payload.clone(),
                });
            }
        }
        EventKind::Outcome(_) => {
            if state.last_outcome_at.is_none_or(|last| event.timestamp >= last) {
                state.last_outcome_at = Some(event.timestamp);
            }
        }
        _ => {}
    }
    state
}

/// An impulse awaiting its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveImpulse {
    pub event_id: String,
    pub start_time: DateTime<Utc>,
    pub payload: ImpulsePayload,
}

impl ActiveImpulse {
    /// Time left on the 20-minute countdown, never negative.
    pub fn remaining(&self, now: DateTime<Utc>) -> TimeDelta {
        let elapsed = now - self.start_time;
        (IMPULSE_WINDOW - elapsed).max(TimeDelta::zero())
    }

    /// The countdown has run out; the user may record an outcome.
    ///
    /// The impulse stays active past this point until an outcome is logged.
    pub fn ready_for_outcome(&self, now: DateTime<Utc>) -> bool {
        self.remaining(now).is_zero()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActiveImpulseState {
    Inactive,
    Active(ActiveImpulse),
}

impl ActiveImpulseState {
    pub fn is_active(&self) -> bool {
        matches!(self, ActiveImpulseState::Active(_))
    }

    pub fn active(&self) -> Option<&ActiveImpulse> {
        match self {
            ActiveImpulseState::Active(impulse) => Some(impulse),
            ActiveImpulseState::Inactive => None,
        }
    }
}
