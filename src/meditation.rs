use crate::event::{Event, EventKind};
use chrono::{DateTime, Days, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Folded state of the `meditation` view: totals over the whole log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeditationTotals {
    pub sessions: u64,
    pub lifetime_minutes: u64,
}

pub fn meditation_reducer(mut state: MeditationTotals, event: &Event) -> MeditationTotals {
    if let EventKind::MeditationSession(session) = event.kind {
        state.sessions += 1;
        state.lifetime_minutes += u64::from(session.duration);
    }
    state
}

/// Minutes of meditation across `events`.
pub fn session_minutes<'a>(events: impl IntoIterator<Item = &'a Event>) -> u64 {
    events
        .into_iter()
        .filter_map(|event| match event.kind {
            EventKind::MeditationSession(session) => Some(u64::from(session.duration)),
            _ => None,
        })
        .sum()
}

/// Consecutive days with at least one session, counted back from the most
/// recent session day.
///
/// Days are calendar days in `now`'s time zone. The streak is 0 unless the
/// most recent session day is today or yesterday; sessions dated after today
/// are ignored.
pub fn meditation_streak<'a, Tz: TimeZone>(
    events: impl IntoIterator<Item = &'a Event>,
    now: &DateTime<Tz>,
) -> u32 {
    let tz = now.timezone();
    let today = now.date_naive();
    let days: BTreeSet<NaiveDate> = events
        .into_iter()
        .filter(|event| matches!(event.kind, EventKind::MeditationSession(_)))
        .map(|event| event.timestamp.with_timezone(&tz).date_naive())
        .filter(|day| *day <= today)
        .collect();

    let mut days = days.into_iter().rev();
    let Some(latest) = days.next() else {
        return 0;
    };
    if today.checked_sub_days(Days::new(1)).is_some_and(|yesterday| latest < yesterday) {
        return 0;
    }

    let mut streak = 1;
    let mut previous = latest;
    for day in days {
        if previous.pred_opt() != Some(day) {
            break;
        }
        streak += 1;
        previous = day;
    }
    streak
}
