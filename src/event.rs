use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// The tracker area an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Module {
    Cravings,
    Fasting,
    Exercise,
    Sleep,
    Meditation,
}

impl Module {
    pub fn as_str(&self) -> &'static str {
        match self {
            Module::Cravings => "cravings",
            Module::Fasting => "fasting",
            Module::Exercise => "exercise",
            Module::Sleep => "sleep",
            Module::Meditation => "meditation",
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the impulse was a craving for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpulseKind {
    Weed,
    Food,
}

/// Why the impulse showed up: to make a good moment better, or to get away
/// from a bad one.
///
/// Categories written by other clients are kept verbatim in
/// [`TriggerCategory::Other`] so they round-trip through the log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TriggerCategory {
    Enhancement,
    Avoidance,
    Other(String),
}

impl TriggerCategory {
    pub fn as_str(&self) -> &str {
        match self {
            TriggerCategory::Enhancement => "enhancement",
            TriggerCategory::Avoidance => "avoidance",
            TriggerCategory::Other(s) => s,
        }
    }
}

impl From<String> for TriggerCategory {
    fn from(s: String) -> Self {
        match s.as_str() {
            "enhancement" => TriggerCategory::Enhancement,
            "avoidance" => TriggerCategory::Avoidance,
            _ => TriggerCategory::Other(s),
        }
    }
}

impl From<TriggerCategory> for String {
    fn from(c: TriggerCategory) -> Self {
        match c {
            TriggerCategory::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

/// Extra detail recorded for food cravings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodDetails {
    /// Self-rated, usually 1 to 5; stored as sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hunger_level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Payload of a `cravings/impulse` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpulsePayload {
    #[serde(rename = "type")]
    pub kind: ImpulseKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<TriggerCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specific_trigger: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub food_details: Option<FoodDetails>,
}

impl ImpulsePayload {
    pub fn new(kind: ImpulseKind, category: TriggerCategory, trigger: impl Into<String>) -> Self {
        ImpulsePayload {
            kind,
            category: Some(category),
            specific_trigger: Some(trigger.into()),
            food_details: None,
        }
    }

    pub fn with_food_details(mut self, details: FoodDetails) -> Self {
        self.food_details = Some(details);
        self
    }

    /// The trigger name, or `"Unknown"` when it is missing or blank.
    pub fn trigger_label(&self) -> &str {
        match self.specific_trigger.as_deref() {
            Some(t) if !t.is_empty() => t,
            _ => "Unknown",
        }
    }

    /// The category name, or `"Unknown"` when it is missing or blank.
    pub fn category_label(&self) -> &str {
        match &self.category {
            Some(c) if !c.as_str().is_empty() => c.as_str(),
            _ => "Unknown",
        }
    }
}

/// How an impulse ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Consumed,
    Resisted,
}

/// Payload of a `cravings/outcome` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomePayload {
    pub original_event_id: String,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Payload of an `exercise/log` event. `duration` is in minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExercisePayload {
    #[serde(rename = "type")]
    pub activity: String,
    /// Self-rated, usually 1 to 5; stored as sent.
    pub intensity: f64,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "optional_minutes"
    )]
    pub duration: Option<u32>,
}

/// Payload of a `meditation/session` event. `duration` is in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeditationPayload {
    #[serde(deserialize_with = "minutes")]
    pub duration: u32,
}

/// Whole minutes from any JSON number: rounded, negatives read as 0.
fn minutes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    f64::deserialize(deserializer).map(whole_minutes)
}

fn optional_minutes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    Option::<f64>::deserialize(deserializer).map(|m| m.map(whole_minutes))
}

fn whole_minutes(value: f64) -> u32 {
    // `as` saturates at both ends
    value.round() as u32
}

/// The three explicit sleep-module events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SleepEvent {
    SunsetStart,
    WakeUp,
    MorningLockEnd,
}

/// The typed body of an event, one variant per `(module, eventType)` pair.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Impulse(ImpulsePayload),
    Outcome(OutcomePayload),
    /// An eating window opens; the fast is over.
    FastingWindowStart,
    /// An eating window closes; the fast begins.
    FastingWindowEnd,
    Exercise(ExercisePayload),
    Sleep(SleepEvent),
    MeditationSession(MeditationPayload),
}

impl EventKind {
    pub fn module(&self) -> Module {
        match self {
            EventKind::Impulse(_) | EventKind::Outcome(_) => Module::Cravings,
            EventKind::FastingWindowStart | EventKind::FastingWindowEnd => Module::Fasting,
            EventKind::Exercise(_) => Module::Exercise,
            EventKind::Sleep(_) => Module::Sleep,
            EventKind::MeditationSession(_) => Module::Meditation,
        }
    }

    /// The wire name of the event type within its module.
    pub fn event_type(&self) -> &'static str {
        match self {
            EventKind::Impulse(_) => "impulse",
            EventKind::Outcome(_) => "outcome",
            EventKind::FastingWindowStart => "window_start",
            EventKind::FastingWindowEnd => "window_end",
            EventKind::Exercise(_) => "log",
            EventKind::Sleep(SleepEvent::SunsetStart) => "sunset_start",
            EventKind::Sleep(SleepEvent::WakeUp) => "wake_up",
            EventKind::Sleep(SleepEvent::MorningLockEnd) => "morning_lock_end",
            EventKind::MeditationSession(_) => "session",
        }
    }

    fn from_parts(module: Module, event_type: &str, payload: Value) -> Result<Self, String> {
        fn typed<T: serde::de::DeserializeOwned>(
            module: Module,
            event_type: &str,
            payload: Value,
        ) -> Result<T, String> {
            serde_json::from_value(payload)
                .map_err(|e| format!("malformed {module}/{event_type} payload: {e}"))
        }

        let kind = match (module, event_type) {
            (Module::Cravings, "impulse") => {
                EventKind::Impulse(typed(module, event_type, payload)?)
            }
            (Module::Cravings, "outcome") => {
                EventKind::Outcome(typed(module, event_type, payload)?)
            }
            (Module::Fasting, "window_start") => EventKind::FastingWindowStart,
            (Module::Fasting, "window_end") => EventKind::FastingWindowEnd,
            (Module::Exercise, "log") => EventKind::Exercise(typed(module, event_type, payload)?),
            (Module::Sleep, "sunset_start") => EventKind::Sleep(SleepEvent::SunsetStart),
            (Module::Sleep, "wake_up") => EventKind::Sleep(SleepEvent::WakeUp),
            (Module::Sleep, "morning_lock_end") => EventKind::Sleep(SleepEvent::MorningLockEnd),
            (Module::Meditation, "session") => {
                EventKind::MeditationSession(typed(module, event_type, payload)?)
            }
            _ => return Err(format!("unknown event type {module}/{event_type}")),
        };
        Ok(kind)
    }
}

/// An immutable event record stored in the log.
///
/// Events are serialized as single JSON lines in `app.jsonl` using the flat
/// record shape `{id, userId, module, eventType, payload, timestamp}`. The
/// payload is typed through [`EventKind`]; a line whose `(module, eventType)`
/// pair is unknown, or whose payload does not fit that pair, fails to
/// deserialize.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use impulse_tracker::{Event, EventKind, Module};
///
/// let ts = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
/// let event = Event::new("user-1", EventKind::FastingWindowEnd, ts).with_id("evt-1");
/// assert_eq!(event.module(), Module::Fasting);
/// assert_eq!(event.event_type(), "window_end");
///
/// let json = serde_json::to_value(&event).unwrap();
/// assert_eq!(json["userId"], "user-1");
/// assert_eq!(json["payload"], serde_json::json!({}));
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawEvent")]
pub struct Event {
    /// Unique event identifier (UUID v4 unless set explicitly).
    pub id: String,

    /// Owner of the event.
    pub user_id: String,

    /// Module, event type and payload.
    pub kind: EventKind,

    /// Creation time. The only ordering key between events.
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Create a new event with a fresh UUID.
    pub fn new(user_id: impl Into<String>, kind: EventKind, timestamp: DateTime<Utc>) -> Self {
        Event {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            kind,
            timestamp,
        }
    }

    /// Replace the generated identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn module(&self) -> Module {
        self.kind.module()
    }

    pub fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }
}

#[derive(Serialize)]
struct EmptyPayload {}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut st = serializer.serialize_struct("Event", 6)?;
        st.serialize_field("id", &self.id)?;
        st.serialize_field("userId", &self.user_id)?;
        st.serialize_field("module", &self.kind.module())?;
        st.serialize_field("eventType", self.kind.event_type())?;
        match &self.kind {
            EventKind::Impulse(p) => st.serialize_field("payload", p)?,
            EventKind::Outcome(p) => st.serialize_field("payload", p)?,
            EventKind::Exercise(p) => st.serialize_field("payload", p)?,
            EventKind::MeditationSession(p) => st.serialize_field("payload", p)?,
            EventKind::FastingWindowStart | EventKind::FastingWindowEnd | EventKind::Sleep(_) => {
                st.serialize_field("payload", &EmptyPayload {})?
            }
        }
        st.serialize_field("timestamp", &self.timestamp)?;
        st.end()
    }
}

/// Wire mirror of [`Event`] with an untyped payload.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    id: String,
    user_id: String,
    module: Module,
    event_type: String,
    #[serde(default)]
    payload: Value,
    timestamp: DateTime<Utc>,
}

impl TryFrom<RawEvent> for Event {
    type Error = String;

    fn try_from(raw: RawEvent) -> Result<Self, Self::Error> {
        let kind = EventKind::from_parts(raw.module, &raw.event_type, raw.payload)?;
        Ok(Event {
            id: raw.id,
            user_id: raw.user_id,
            kind,
            timestamp: raw.timestamp,
        })
    }
}
