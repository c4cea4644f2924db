use crate::event::{Event, EventKind};
use chrono::{DateTime, TimeZone};

/// Total minutes of exercise logged on `now`'s calendar day.
///
/// The day boundary is local midnight in `now`'s time zone. Logs without a
/// duration count as zero.
pub fn daily_exercise_minutes<'a, Tz: TimeZone>(
    events: impl IntoIterator<Item = &'a Event>,
    now: &DateTime<Tz>,
) -> u32 {
    let tz = now.timezone();
    let today = now.date_naive();
    events
        .into_iter()
        .filter_map(|event| match &event.kind {
            EventKind::Exercise(payload) => Some((event, payload)),
            _ => None,
        })
        .filter(|(event, _)| event.timestamp.with_timezone(&tz).date_naive() == today)
        .map(|(_, payload)| payload.duration.unwrap_or(0))
        .fold(0u32, u32::saturating_add)
}
