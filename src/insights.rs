//! Aggregates over the trailing insights window.
//!
//! Every metric is computed from one snapshot of the window's events so the
//! numbers agree with each other.

use crate::event::{Event, EventKind, ImpulsePayload, Outcome, TriggerCategory};
use crate::fasting::average_fast_hours;
use crate::meditation::{meditation_streak, session_minutes};
use chrono::{DateTime, TimeDelta, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const INSIGHTS_WINDOW: TimeDelta = TimeDelta::days(30);

const TOP_TRIGGER_LIMIT: usize = 5;

/// The text insight needs more impulses than this.
const MIN_IMPULSES_FOR_TEXT: usize = 5;

const HIGH_AGENCY: u8 = 70;

pub const NOT_ENOUGH_DATA: &str =
    "Not enough data yet. Keep logging your impulses to see your patterns emerge.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerCount {
    pub trigger: String,
    pub count: u32,
    pub category: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourCount {
    pub hour: u8,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: u32,
}

/// Meditation figures.
///
/// `window_minutes` covers the insights window only; `lifetime_minutes`
/// covers the whole log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeditationStats {
    pub window_minutes: u64,
    pub lifetime_minutes: u64,
    pub streak_days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightsSummary {
    /// At most five triggers, most frequent first.
    pub top_triggers: Vec<TriggerCount>,
    /// Exactly 24 buckets, hour 0 to 23 in local time.
    pub peak_hours: Vec<HourCount>,
    /// Enhancement then Avoidance.
    pub trigger_distribution: Vec<CategoryCount>,
    /// Percentage of outcomes that were resisted, 0 to 100.
    pub agency_score: u8,
    pub impulse_count: usize,
    pub fasting_average_hours: f64,
    pub meditation: MeditationStats,
    pub insight: String,
}

/// Aggregate one window snapshot.
///
/// `events` are the window's events in chronological order. Local hours and
/// days are taken in `now`'s time zone. `lifetime_meditation_minutes` comes
/// from the meditation view, which sees the whole log.
pub fn summarize<Tz: TimeZone>(
    events: &[Event],
    now: &DateTime<Tz>,
    lifetime_meditation_minutes: u64,
) -> InsightsSummary {
    let tz = now.timezone();
    let impulses: Vec<(&Event, &ImpulsePayload)> = events
        .iter()
        .filter_map(|event| match &event.kind {
            EventKind::Impulse(payload) => Some((event, payload)),
            _ => None,
        })
        .collect();

    let top_triggers = top_triggers(impulses.iter().rev().map(|(_, p)| *p));

    let mut hour_counts = [0u32; 24];
    for (event, _) in &impulses {
        hour_counts[event.timestamp.with_timezone(&tz).hour() as usize] += 1;
    }
    let peak_hours: Vec<HourCount> = hour_counts
        .iter()
        .enumerate()
        .map(|(hour, &count)| HourCount {
            hour: hour as u8,
            count,
        })
        .collect();

    let (mut enhancement, mut avoidance) = (0, 0);
    for (_, payload) in &impulses {
        match payload.category {
            Some(TriggerCategory::Enhancement) => enhancement += 1,
            Some(TriggerCategory::Avoidance) => avoidance += 1,
            _ => {}
        }
    }
    let trigger_distribution = vec![
        CategoryCount {
            category: "Enhancement".to_string(),
            count: enhancement,
        },
        CategoryCount {
            category: "Avoidance".to_string(),
            count: avoidance,
        },
    ];

    let agency_score = agency_score(events);

    let meditation = MeditationStats {
        window_minutes: session_minutes(events),
        lifetime_minutes: lifetime_meditation_minutes,
        streak_days: meditation_streak(events, now),
    };

    let insight = insight_text(agency_score, &top_triggers, &peak_hours, impulses.len());

    InsightsSummary {
        top_triggers,
        peak_hours,
        trigger_distribution,
        agency_score,
        impulse_count: impulses.len(),
        fasting_average_hours: average_fast_hours(events),
        meditation,
        insight,
    }
}

/// Group impulses by trigger and keep the most frequent.
///
/// Ties keep the order in which triggers were first seen; the category is
/// the one of that first sighting.
fn top_triggers<'a>(impulses: impl Iterator<Item = &'a ImpulsePayload>) -> Vec<TriggerCount> {
    let mut counts: Vec<TriggerCount> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for payload in impulses {
        let trigger = payload.trigger_label();
        match index.get(trigger) {
            Some(&i) => counts[i].count += 1,
            None => {
                index.insert(trigger.to_string(), counts.len());
                counts.push(TriggerCount {
                    trigger: trigger.to_string(),
                    count: 1,
                    category: payload.category_label().to_string(),
                });
            }
        }
    }

    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(TOP_TRIGGER_LIMIT);
    counts
}

/// `round(100 × resisted / outcomes)`, or 0 without outcomes.
pub fn agency_score(events: &[Event]) -> u8 {
    let (mut total, mut resisted) = (0u64, 0u64);
    for event in events {
        if let EventKind::Outcome(outcome) = &event.kind {
            total += 1;
            if outcome.outcome == Outcome::Resisted {
                resisted += 1;
            }
        }
    }
    if total == 0 {
        return 0;
    }
    (resisted as f64 * 100.0 / total as f64).round() as u8
}

/// A one-line reading of the numbers.
pub fn insight_text(
    agency_score: u8,
    top_triggers: &[TriggerCount],
    peak_hours: &[HourCount],
    impulse_count: usize,
) -> String {
    if impulse_count <= MIN_IMPULSES_FOR_TEXT {
        return NOT_ENOUGH_DATA.to_string();
    }

    // Earliest hour wins a tie.
    let peak = peak_hours
        .iter()
        .max_by(|a, b| a.count.cmp(&b.count).then(b.hour.cmp(&a.hour)))
        .map_or(0, |h| h.hour);

    if agency_score >= HIGH_AGENCY {
        return format!(
            "You resisted {agency_score}% of your impulses this month. The gap is getting wider."
        );
    }

    match top_triggers.first() {
        Some(top) if top.category == "avoidance" => format!(
            "\"{}\" is your most common trigger and it tends to be about escaping a feeling. \
             Impulses peak around {peak:02}:00, so plan a pause before then.",
            top.trigger
        ),
        Some(top) => format!(
            "\"{}\" is your most common trigger. Impulses peak around {peak:02}:00, \
             so plan a pause before then.",
            top.trigger
        ),
        None => format!("Impulses peak around {peak:02}:00, so plan a pause before then."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ImpulseKind, OutcomePayload};
    use chrono::Utc;

    fn impulse(trigger: &str, category: TriggerCategory, hour: u32) -> Event {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap();
        let payload = ImpulsePayload::new(ImpulseKind::Weed, category, trigger);
        Event::new("u", EventKind::Impulse(payload), ts)
    }

    fn outcome(outcome: Outcome) -> Event {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 23, 0, 0).unwrap();
        let payload = OutcomePayload {
            original_event_id: "x".to_string(),
            outcome,
            note: None,
        };
        Event::new("u", EventKind::Outcome(payload), ts)
    }

    #[test]
    fn ties_keep_most_recent_first() {
        let events = [
            impulse("Music", TriggerCategory::Enhancement, 8),
            impulse("Stress", TriggerCategory::Avoidance, 9),
            impulse("Music", TriggerCategory::Enhancement, 10),
            impulse("Stress", TriggerCategory::Avoidance, 11),
        ];
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        let summary = summarize(&events, &now, 0);
        let names: Vec<_> = summary.top_triggers.iter().map(|t| t.trigger.as_str()).collect();
        assert_eq!(names, ["Stress", "Music"]);
        assert_eq!(summary.top_triggers[0].category, "avoidance");
    }

    #[test]
    fn unknown_categories_only_leave_the_distribution() {
        let events = [
            impulse("Party", TriggerCategory::Other("social".to_string()), 22),
            impulse("Stress", TriggerCategory::Avoidance, 9),
        ];
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        let summary = summarize(&events, &now, 0);
        assert_eq!(summary.trigger_distribution[0].count, 0);
        assert_eq!(summary.trigger_distribution[1].count, 1);
        assert_eq!(summary.top_triggers.len(), 2);
        assert_eq!(summary.peak_hours[22].count, 1);
    }

    #[test]
    fn agency_rounds_half_up() {
        let events = [
            outcome(Outcome::Resisted),
            outcome(Outcome::Consumed),
            outcome(Outcome::Consumed),
            outcome(Outcome::Consumed),
            outcome(Outcome::Consumed),
            outcome(Outcome::Consumed),
            outcome(Outcome::Consumed),
            outcome(Outcome::Consumed),
        ];
        // 1 / 8 = 12.5%
        assert_eq!(agency_score(&events), 13);
        assert_eq!(agency_score(&[]), 0);
    }

    #[test]
    fn text_needs_more_than_five_impulses() {
        let hours = vec![HourCount { hour: 0, count: 0 }; 24];
        assert_eq!(insight_text(90, &[], &hours, 5), NOT_ENOUGH_DATA);
        assert!(insight_text(90, &[], &hours, 6).contains("90%"));
    }

    #[test]
    fn text_names_top_trigger_and_peak_hour() {
        let mut hours: Vec<HourCount> = (0..24).map(|h| HourCount { hour: h, count: 0 }).collect();
        hours[21].count = 4;
        hours[7].count = 4;
        let top = [TriggerCount {
            trigger: "Boredom".to_string(),
            count: 6,
            category: "avoidance".to_string(),
        }];
        let text = insight_text(20, &top, &hours, 8);
        assert!(text.contains("Boredom"));
        assert!(text.contains("07:00"));
    }
}
