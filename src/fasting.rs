//! Fasting windows.
//!
//! A `window_end` event closes the eating window, so the user is fasting
//! until the next `window_start`.

use crate::event::{Event, EventKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fasts longer than this are treated as a forgotten toggle, not a fast.
const MAX_PLAUSIBLE_FAST_HOURS: f64 = 48.0;

/// The latest fasting-module event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FastingMark {
    pub fasting: bool,
    pub at: DateTime<Utc>,
}

/// Folded state of the `fasting` view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FastingLedger {
    pub last: Option<FastingMark>,
}

pub fn fasting_reducer(mut state: FastingLedger, event: &Event) -> FastingLedger {
    let fasting = match event.kind {
        EventKind::FastingWindowEnd => true,
        EventKind::FastingWindowStart => false,
        _ => return state,
    };
    if state.last.is_none_or(|last| event.timestamp >= last.at) {
        state.last = Some(FastingMark {
            fasting,
            at: event.timestamp,
        });
    }
    state
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FastingState {
    pub is_fasting: bool,
    pub last_event_time: Option<DateTime<Utc>>,
    /// Whole minutes since the last fasting event, never negative.
    pub duration_minutes: i64,
}

impl FastingLedger {
    pub fn state(&self, now: DateTime<Utc>) -> FastingState {
        match self.last {
            None => FastingState::default(),
            Some(mark) => FastingState {
                is_fasting: mark.fasting,
                last_event_time: Some(mark.at),
                duration_minutes: (now - mark.at).num_minutes().max(0),
            },
        }
    }

    /// The event a toggle appends: the opposite of the current window.
    pub fn toggle_kind(&self) -> EventKind {
        match self.last {
            Some(FastingMark { fasting: true, .. }) => EventKind::FastingWindowStart,
            _ => EventKind::FastingWindowEnd,
        }
    }
}

/// Mean length in hours of completed fasts, rounded to one decimal.
///
/// `events` must be in chronological order. A fast runs from a `window_end`
/// to the next `window_start`; fasts of zero length or of 48 hours and more
/// are ignored. Returns `0.0` when no fast qualifies.
pub fn average_fast_hours<'a>(events: impl IntoIterator<Item = &'a Event>) -> f64 {
    let mut total_hours = 0.0;
    let mut sessions = 0u32;
    let mut fast_start: Option<DateTime<Utc>> = None;

    for event in events {
        match event.kind {
            EventKind::FastingWindowEnd => fast_start = Some(event.timestamp),
            EventKind::FastingWindowStart => {
                if let Some(start) = fast_start.take() {
                    let hours = (event.timestamp - start).num_milliseconds() as f64 / 3_600_000.0;
                    if hours > 0.0 && hours < MAX_PLAUSIBLE_FAST_HOURS {
                        total_hours += hours;
                        sessions += 1;
                    }
                }
            }
            _ => {}
        }
    }

    if sessions == 0 {
        return 0.0;
    }
    (total_hours / f64::from(sessions) * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::fold_events;
    use chrono::{TimeDelta, TimeZone};

    fn at(hours: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap() + TimeDelta::hours(hours)
    }

    fn ev(kind: EventKind, hours: i64) -> Event {
        Event::new("u", kind, at(hours))
    }

    #[test]
    fn replay_ends_on_last_event() {
        let events = [
            ev(EventKind::FastingWindowEnd, 0),
            ev(EventKind::FastingWindowStart, 16),
            ev(EventKind::FastingWindowEnd, 24),
        ];
        let ledger = fold_events(fasting_reducer, &events);
        let state = ledger.state(at(26));
        assert!(state.is_fasting);
        assert_eq!(state.duration_minutes, 120);
        assert_eq!(ledger.toggle_kind(), EventKind::FastingWindowStart);
    }

    #[test]
    fn no_events_means_not_fasting() {
        let ledger = FastingLedger::default();
        assert_eq!(ledger.state(at(0)), FastingState::default());
        assert_eq!(ledger.toggle_kind(), EventKind::FastingWindowEnd);
    }

    #[test]
    fn clock_skew_never_yields_negative_duration() {
        let ledger = fold_events(fasting_reducer, &[ev(EventKind::FastingWindowEnd, 5)]);
        assert_eq!(ledger.state(at(4)).duration_minutes, 0);
    }

    #[test]
    fn average_skips_implausible_fasts() {
        let events = [
            ev(EventKind::FastingWindowEnd, 0),
            ev(EventKind::FastingWindowStart, 16),
            ev(EventKind::FastingWindowEnd, 20),
            ev(EventKind::FastingWindowStart, 34),
            ev(EventKind::FastingWindowEnd, 40),
            ev(EventKind::FastingWindowStart, 100),
        ];
        assert_eq!(average_fast_hours(&events), 15.0);
    }

    #[test]
    fn average_without_completed_fast_is_zero() {
        assert_eq!(average_fast_hours(&[ev(EventKind::FastingWindowEnd, 0)]), 0.0);
    }
}
