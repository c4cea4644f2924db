mod archive;
mod clock;
mod config;
mod error;
mod event;
mod exercise;
mod fasting;
mod impulse;
mod insights;
mod level;
mod log;
mod meditation;
mod sleep;
pub mod snapshot;
mod tracker;
mod user;
mod view;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, Environment, StorageConfig, UserConfig, XpConfig};
pub use error::{Result, TrackerError};
pub use event::{
    Event, EventKind, ExercisePayload, FoodDetails, ImpulseKind, ImpulsePayload,
    MeditationPayload, Module, Outcome, OutcomePayload, SleepEvent, TriggerCategory,
};
pub use exercise::daily_exercise_minutes;
pub use fasting::{FastingLedger, FastingMark, FastingState, average_fast_hours, fasting_reducer};
pub use impulse::{
    ActiveImpulse, ActiveImpulseState, IMPULSE_WINDOW, ImpulseLedger, ImpulseRecord,
    impulse_reducer,
};
pub use insights::{
    CategoryCount, HourCount, INSIGHTS_WINDOW, InsightsSummary, MeditationStats, NOT_ENOUGH_DATA,
    TriggerCount, agency_score, insight_text, summarize,
};
pub use level::{LevelInfo, level_info};
pub use self::log::{EventLog, EventLogBuilder, EventReader, LockMode, line_hash};
pub use meditation::{MeditationTotals, meditation_reducer, meditation_streak, session_minutes};
pub use sleep::{
    MORNING_LOCK, SleepLedger, SleepMark, SleepMode, SleepState, sleep_reducer, sleep_transition,
};
pub use snapshot::Snapshot;
pub use tracker::{Tracker, UserExport};
pub use user::{DEMO_USER_EMAIL, DEMO_USER_ID, UserProfile, UserStore};
pub use view::{ReduceFn, View, ViewOps, fold_events};
