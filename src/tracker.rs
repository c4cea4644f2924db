use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{Result, TrackerError};
use crate::event::{
    Event, EventKind, ExercisePayload, ImpulsePayload, MeditationPayload, Outcome, OutcomePayload,
    SleepEvent,
};
use crate::exercise::daily_exercise_minutes;
use crate::fasting::{FastingLedger, FastingState, fasting_reducer};
use crate::impulse::{ActiveImpulseState, ImpulseLedger, impulse_reducer};
use crate::insights::{INSIGHTS_WINDOW, InsightsSummary, summarize};
use crate::level::{LevelInfo, level_info};
use crate::log::EventLog;
use crate::meditation::{MeditationTotals, meditation_reducer};
use crate::sleep::{SleepLedger, SleepState, sleep_reducer};
use crate::user::{UserProfile, UserStore};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

const IMPULSE_VIEW: &str = "impulse";
const FASTING_VIEW: &str = "fasting";
const SLEEP_VIEW: &str = "sleep";
const MEDITATION_VIEW: &str = "meditation";

/// Everything stored for the user, as returned by
/// [`Tracker::export_user_data`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserExport {
    pub user: UserProfile,
    pub events: Vec<Event>,
}

/// The tracker: logs events for the configured user and derives current
/// state from them.
///
/// Every getter folds whatever was appended since the previous call and then
/// derives its answer against the clock, so nothing ticks in the background;
/// callers poll. A `Tracker` is `Send`; share it behind a `Mutex`.
///
/// # Examples
///
/// ```no_run
/// use impulse_tracker::{Config, ImpulseKind, ImpulsePayload, Outcome, Tracker, TriggerCategory};
///
/// # fn main() -> impulse_tracker::Result<()> {
/// let mut tracker = Tracker::open(&Config::from_env()?)?;
///
/// let impulse = tracker.log_impulse(ImpulsePayload::new(
///     ImpulseKind::Food,
///     TriggerCategory::Avoidance,
///     "Boredom",
/// ))?;
/// assert!(tracker.active_impulse_state()?.is_active());
///
/// tracker.log_outcome(&impulse.id, Outcome::Resisted, None)?;
/// assert!(!tracker.active_impulse_state()?.is_active());
/// # Ok(())
/// # }
/// ```
pub struct Tracker {
    log: EventLog,
    users: UserStore,
    template: UserProfile,
    outcome_award: u64,
    clock: Box<dyn Clock>,
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("log", &self.log)
            .field("user", &self.template.id)
            .finish()
    }
}

impl Tracker {
    /// Open the tracker described by `config` on the system clock.
    pub fn open(config: &Config) -> Result<Self> {
        Self::open_with_clock(config, SystemClock)
    }

    /// Open the tracker with an explicit time source.
    pub fn open_with_clock(config: &Config, clock: impl Clock + 'static) -> Result<Self> {
        let dir = config.resolve_data_dir()?;
        let log = EventLog::builder(&dir)
            .max_log_size(config.storage.max_log_size)
            .lock_mode(config.storage.lock)
            .view::<ImpulseLedger>(IMPULSE_VIEW, impulse_reducer)
            .view::<FastingLedger>(FASTING_VIEW, fasting_reducer)
            .view::<SleepLedger>(SLEEP_VIEW, sleep_reducer)
            .view::<MeditationTotals>(MEDITATION_VIEW, meditation_reducer)
            .open()
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => TrackerError::LockHeld {
                    path: dir.join("app.jsonl"),
                },
                _ => TrackerError::Io(e),
            })?;

        let users = UserStore::new(&dir);
        let template = config.user_template();
        users.ensure(&template)?;

        log::info!("tracker for {} opened at {}", template.id, dir.display());
        Ok(Tracker {
            log,
            users,
            template,
            outcome_award: config.xp.outcome_award,
            clock: Box::new(clock),
        })
    }

    /// Directory holding the log, snapshots and profile.
    pub fn data_dir(&self) -> &Path {
        self.log.dir()
    }

    // ---- cravings ----

    /// Record an impulse; it stays active until an outcome is logged.
    pub fn log_impulse(&mut self, payload: ImpulsePayload) -> Result<Event> {
        self.record(EventKind::Impulse(payload))
    }

    /// Resolve the active impulse and award outcome XP.
    ///
    /// `original_event_id` must be the id of the active impulse and the clock
    /// must be past its start; otherwise nothing is written.
    pub fn log_outcome(
        &mut self,
        original_event_id: &str,
        outcome: Outcome,
        note: Option<String>,
    ) -> Result<Event> {
        let now = self.now_utc();
        match self.active_impulse_state()? {
            ActiveImpulseState::Inactive => {
                log::warn!("outcome for {original_event_id} with no active impulse");
                return Err(TrackerError::NoActiveImpulse);
            }
            ActiveImpulseState::Active(active) if active.event_id != original_event_id => {
                log::warn!(
                    "outcome for {original_event_id} while {} is active",
                    active.event_id
                );
                return Err(TrackerError::OutcomeMismatch {
                    active: active.event_id,
                    requested: original_event_id.to_string(),
                });
            }
            ActiveImpulseState::Active(active) if now <= active.start_time => {
                log::warn!(
                    "outcome for {original_event_id} at {now} does not follow its start {}",
                    active.start_time
                );
                return Err(TrackerError::OutcomeNotAfterImpulse {
                    impulse: active.event_id,
                    started: active.start_time,
                    at: now,
                });
            }
            ActiveImpulseState::Active(_) => {}
        }

        let kind = EventKind::Outcome(OutcomePayload {
            original_event_id: original_event_id.to_string(),
            outcome,
            note,
        });
        let event = self.record_at(kind, now)?;
        self.add_xp(self.outcome_award)?;
        Ok(event)
    }

    pub fn active_impulse_state(&mut self) -> Result<ActiveImpulseState> {
        Ok(self.view::<ImpulseLedger>(IMPULSE_VIEW)?.state())
    }

    // ---- fasting ----

    /// Flip between fasting and eating, returning the new state.
    pub fn toggle_fasting_window(&mut self) -> Result<FastingState> {
        let next = self.view::<FastingLedger>(FASTING_VIEW)?.toggle_kind();
        self.record(next)?;
        self.fasting_state()
    }

    pub fn fasting_state(&mut self) -> Result<FastingState> {
        let now = self.now_utc();
        Ok(self.view::<FastingLedger>(FASTING_VIEW)?.state(now))
    }

    // ---- exercise ----

    pub fn log_exercise(&mut self, payload: ExercisePayload) -> Result<Event> {
        if payload.activity.trim().is_empty() {
            return Err(TrackerError::InvalidPayload(
                "exercise type must not be empty".to_string(),
            ));
        }
        self.record(EventKind::Exercise(payload))
    }

    /// Minutes of exercise logged since local midnight.
    pub fn daily_exercise_minutes(&mut self) -> Result<u32> {
        let now = self.clock.now();
        let since = now.with_timezone(&Utc) - TimeDelta::days(1);
        let events = self.log.reader().events_since(since)?;
        Ok(daily_exercise_minutes(&events, &now))
    }

    // ---- sleep ----

    pub fn log_sleep_event(&mut self, event: SleepEvent) -> Result<Event> {
        self.record(EventKind::Sleep(event))
    }

    /// Force the app back to active from sleep or the morning lock.
    pub fn override_sleep_lock(&mut self) -> Result<SleepState> {
        self.record(EventKind::Sleep(SleepEvent::MorningLockEnd))?;
        self.sleep_state()
    }

    pub fn sleep_state(&mut self) -> Result<SleepState> {
        let now = self.now_utc();
        Ok(self.view::<SleepLedger>(SLEEP_VIEW)?.state(now))
    }

    // ---- meditation ----

    pub fn log_meditation_session(&mut self, minutes: u32) -> Result<Event> {
        if minutes == 0 {
            return Err(TrackerError::InvalidPayload(
                "meditation session must last at least a minute".to_string(),
            ));
        }
        self.record(EventKind::MeditationSession(MeditationPayload {
            duration: minutes,
        }))
    }

    // ---- insights ----

    /// Aggregates over the trailing 30 days, from a single read of the log.
    pub fn insights(&mut self) -> Result<InsightsSummary> {
        let now = self.clock.now();
        let lifetime = self
            .view::<MeditationTotals>(MEDITATION_VIEW)?
            .lifetime_minutes;
        let since = now.with_timezone(&Utc) - INSIGHTS_WINDOW;
        let events = self.log.reader().events_since(since)?;
        Ok(summarize(&events, &now, lifetime))
    }

    // ---- XP ----

    /// Add XP and return the new total.
    pub fn add_xp(&mut self, amount: u64) -> Result<u64> {
        let total = self.users.add_points(&self.template, amount)?;
        log::debug!("awarded {amount} XP, total {total}");
        Ok(total)
    }

    pub fn user_xp(&self) -> Result<u64> {
        Ok(self.user()?.agency_points)
    }

    pub fn level_info(&self) -> Result<LevelInfo> {
        Ok(level_info(self.user_xp()?))
    }

    /// The profile, created on first access.
    pub fn user(&self) -> Result<UserProfile> {
        Ok(self.users.ensure(&self.template)?)
    }

    // ---- settings ----

    pub fn export_user_data(&self) -> Result<UserExport> {
        let user = self.user()?;
        let events = self.log.reader().events()?;
        Ok(UserExport { user, events })
    }

    /// [`Tracker::export_user_data`] as pretty-printed JSON.
    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.export_user_data()?)?)
    }

    /// Delete every event and reset XP; afterwards every getter answers as
    /// for a brand-new user.
    pub fn clear_all_user_data(&mut self) -> Result<()> {
        self.log.clear()?;
        self.users.reset_points(&self.template)?;
        log::info!("cleared all data for {}", self.template.id);
        Ok(())
    }

    fn now_utc(&self) -> DateTime<Utc> {
        self.clock.now().with_timezone(&Utc)
    }

    fn record(&mut self, kind: EventKind) -> Result<Event> {
        let now = self.now_utc();
        self.record_at(kind, now)
    }

    fn record_at(&mut self, kind: EventKind, at: DateTime<Utc>) -> Result<Event> {
        self.users.ensure(&self.template)?;
        let event = Event::new(&self.template.id, kind, at);
        self.log.append(&event)?;
        Ok(event)
    }

    fn view<S: 'static>(&mut self, name: &str) -> Result<&S> {
        self.log.refresh_all()?;
        self.log.view::<S>(name).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => TrackerError::ViewNotFound(name.to_string()),
            io::ErrorKind::InvalidInput => TrackerError::ViewTypeMismatch(name.to_string()),
            _ => TrackerError::Io(e),
        })
    }
}
