//! One simulated day with the tracker.
//!
//! Drives a `Tracker` through a craving, a fast, some exercise, meditation
//! and a night of sleep on a manual clock, printing the derived state as it
//! goes. Pass a directory to keep the data; otherwise a temp dir is used.

use chrono::{TimeDelta, TimeZone, Utc};
use impulse_tracker::{
    Clock, Config, ExercisePayload, FoodDetails, ImpulseKind, ImpulsePayload, ManualClock, Outcome,
    SleepEvent, Tracker, TriggerCategory,
};
use std::path::PathBuf;
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempfile::tempdir()?;
    let dir = std::env::args()
        .nth(1)
        .map_or_else(|| temp.path().to_path_buf(), PathBuf::from);

    let morning = Utc.with_ymd_and_hms(2024, 6, 3, 7, 0, 0).single();
    let clock = Arc::new(ManualClock::new(
        morning.ok_or("invalid start time")?.fixed_offset(),
    ));
    let config = Config::default().with_data_dir(&dir);
    let mut tracker = Tracker::open_with_clock(&config, Arc::clone(&clock))?;
    println!("Data in {}", tracker.data_dir().display());

    // Wake up into the morning lock
    tracker.log_sleep_event(SleepEvent::WakeUp)?;
    clock.advance(TimeDelta::minutes(10));
    let sleep = tracker.sleep_state()?;
    println!(
        "07:10 sleep mode {:?}, {} min of lock left",
        sleep.mode,
        sleep.remaining().map_or(0, |r| r.num_minutes())
    );
    clock.advance(TimeDelta::minutes(25));
    println!("07:35 sleep mode {:?}", tracker.sleep_state()?.mode);

    // Break last night's fast
    let fasting = tracker.toggle_fasting_window()?;
    println!("07:35 fasting: {}", fasting.is_fasting);

    // A craving mid-morning
    clock.advance(TimeDelta::hours(3));
    let impulse = tracker.log_impulse(
        ImpulsePayload::new(ImpulseKind::Food, TriggerCategory::Avoidance, "Boredom")
            .with_food_details(FoodDetails {
                hunger_level: Some(3.0),
                description: Some("chips".to_string()),
            }),
    )?;
    println!("10:35 impulse logged: {}", impulse.id);

    clock.advance(TimeDelta::minutes(12));
    if let Some(active) = tracker.active_impulse_state()?.active() {
        let left = active.remaining(clock.now().with_timezone(&Utc));
        println!("10:47 waiting out the urge, {} min left", left.num_minutes());
    }

    clock.advance(TimeDelta::minutes(8));
    tracker.log_outcome(&impulse.id, Outcome::Resisted, Some("went for a walk".to_string()))?;
    println!(
        "10:55 resisted; active: {}",
        tracker.active_impulse_state()?.is_active()
    );

    // Exercise and meditation
    clock.advance(TimeDelta::minutes(5));
    tracker.log_exercise(ExercisePayload {
        activity: "walk".to_string(),
        intensity: 2.0,
        duration: Some(25),
    })?;
    clock.advance(TimeDelta::hours(6));
    tracker.log_exercise(ExercisePayload {
        activity: "yoga".to_string(),
        intensity: 3.0,
        duration: Some(40),
    })?;
    tracker.log_meditation_session(15)?;
    println!(
        "17:00 exercised {} min today",
        tracker.daily_exercise_minutes()?
    );

    // Evening: start the fast, then sleep
    clock.advance(TimeDelta::hours(2));
    let fasting = tracker.toggle_fasting_window()?;
    println!("19:00 fasting: {}", fasting.is_fasting);
    clock.advance(TimeDelta::hours(3));
    tracker.log_sleep_event(SleepEvent::SunsetStart)?;
    println!("22:00 sleep mode {:?}", tracker.sleep_state()?.mode);

    let level = tracker.level_info()?;
    println!(
        "\nLevel {} ({}), {} XP, {:.0}% to {}",
        level.level, level.title, level.current_xp, level.progress_percent, level.next_threshold
    );

    let insights = tracker.insights()?;
    println!("Agency score: {}%", insights.agency_score);
    for trigger in &insights.top_triggers {
        println!("  {} x{} ({})", trigger.trigger, trigger.count, trigger.category);
    }
    println!(
        "Meditation: {} min, {}-day streak",
        insights.meditation.lifetime_minutes, insights.meditation.streak_days
    );
    println!("{}", insights.insight);

    Ok(())
}
