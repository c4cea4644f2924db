#![allow(dead_code)]

use chrono::{DateTime, FixedOffset, TimeDelta, TimeZone, Utc};
use impulse_tracker::{
    Config, Event, EventKind, EventLog, ExercisePayload, ImpulseKind, ImpulsePayload, ManualClock,
    MeditationPayload, Outcome, OutcomePayload, SleepEvent, Tracker, TriggerCategory,
};
use std::path::Path;
use std::sync::Arc;

pub const USER: &str = "user-1";

/// 09:00 on a Monday, UTC.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap()
}

pub fn minutes(n: i64) -> DateTime<Utc> {
    t0() + TimeDelta::minutes(n)
}

pub fn local(ts: DateTime<Utc>) -> DateTime<FixedOffset> {
    ts.fixed_offset()
}

pub fn impulse_at(ts: DateTime<Utc>, trigger: &str, category: TriggerCategory) -> Event {
    let payload = ImpulsePayload::new(ImpulseKind::Weed, category, trigger);
    Event::new(USER, EventKind::Impulse(payload), ts)
}

pub fn outcome_at(ts: DateTime<Utc>, original: &str, outcome: Outcome) -> Event {
    let payload = OutcomePayload {
        original_event_id: original.to_string(),
        outcome,
        note: None,
    };
    Event::new(USER, EventKind::Outcome(payload), ts)
}

pub fn exercise_at(ts: DateTime<Utc>, duration: u32) -> Event {
    let payload = ExercisePayload {
        activity: "walk".to_string(),
        intensity: 2.0,
        duration: Some(duration),
    };
    Event::new(USER, EventKind::Exercise(payload), ts)
}

pub fn meditation_at(ts: DateTime<Utc>, duration: u32) -> Event {
    Event::new(
        USER,
        EventKind::MeditationSession(MeditationPayload { duration }),
        ts,
    )
}

pub fn sleep_at(ts: DateTime<Utc>, event: SleepEvent) -> Event {
    Event::new(USER, EventKind::Sleep(event), ts)
}

pub fn append_n(log: &mut EventLog, n: usize) {
    for i in 0..n {
        let event = meditation_at(minutes(i as i64), 10);
        log.append(&event).unwrap();
    }
}

pub fn session_counter(state: u64, event: &Event) -> u64 {
    match event.kind {
        EventKind::MeditationSession(_) => state + 1,
        _ => state,
    }
}

pub fn manual_clock(start: DateTime<Utc>) -> Arc<ManualClock> {
    Arc::new(ManualClock::new(local(start)))
}

pub fn open_tracker(dir: &Path, clock: &Arc<ManualClock>) -> Tracker {
    let config = Config::default().with_data_dir(dir);
    Tracker::open_with_clock(&config, Arc::clone(clock)).unwrap()
}

pub fn boredom() -> ImpulsePayload {
    ImpulsePayload::new(ImpulseKind::Food, TriggerCategory::Avoidance, "Boredom")
}
