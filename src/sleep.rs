//! Sleep and digital-detox mode.
//!
//! The cycle is `active → sleep → morning_lock → active`. `sunset_start` and
//! `wake_up` are explicit; the morning lock also ends on its own once
//! [`MORNING_LOCK`] has passed since waking, or early with `morning_lock_end`.

use crate::event::{Event, EventKind, SleepEvent};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

pub const MORNING_LOCK: TimeDelta = TimeDelta::minutes(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SleepMode {
    Active,
    Sleep,
    MorningLock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepState {
    pub mode: SleepMode,
    /// Milliseconds left in the morning lock; only set in `MorningLock`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_ms: Option<i64>,
}

impl SleepState {
    pub const ACTIVE: SleepState = SleepState {
        mode: SleepMode::Active,
        remaining_ms: None,
    };

    /// Normal screens are unreachable in this state.
    pub fn locks_app(&self) -> bool {
        self.mode != SleepMode::Active
    }

    pub fn remaining(&self) -> Option<TimeDelta> {
        self.remaining_ms.map(TimeDelta::milliseconds)
    }
}

impl Default for SleepState {
    fn default() -> Self {
        SleepState::ACTIVE
    }
}

/// The current mode, given the last sleep event and the time elapsed since.
pub fn sleep_transition(last: Option<SleepEvent>, elapsed: TimeDelta) -> SleepState {
    match last {
        Some(SleepEvent::SunsetStart) => SleepState {
            mode: SleepMode::Sleep,
            remaining_ms: None,
        },
        Some(SleepEvent::WakeUp) if elapsed < MORNING_LOCK => SleepState {
            mode: SleepMode::MorningLock,
            remaining_ms: Some((MORNING_LOCK - elapsed.max(TimeDelta::zero())).num_milliseconds()),
        },
        Some(SleepEvent::WakeUp) | Some(SleepEvent::MorningLockEnd) | None => SleepState::ACTIVE,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepMark {
    pub event: SleepEvent,
    pub at: DateTime<Utc>,
}

/// Folded state of the `sleep` view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepLedger {
    pub last: Option<SleepMark>,
}

impl SleepLedger {
    pub fn state(&self, now: DateTime<Utc>) -> SleepState {
        match self.last {
            Some(mark) => sleep_transition(Some(mark.event), now - mark.at),
            None => sleep_transition(None, TimeDelta::zero()),
        }
    }
}

pub fn sleep_reducer(mut state: SleepLedger, event: &Event) -> SleepLedger {
    if let EventKind::Sleep(sleep_event) = event.kind
        && state.last.is_none_or(|last| event.timestamp >= last.at)
    {
        state.last = Some(SleepMark {
            event: sleep_event,
            at: event.timestamp,
        });
    }
    state
}
