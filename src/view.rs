use crate::event::Event;
use crate::log::EventReader;
use crate::snapshot::{self, Snapshot};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// A pure function that folds an event into state.
///
/// Reducers receive owned state and return owned state. They must not do I/O
/// and must not read the clock: anything time-dependent is derived from the
/// folded state afterwards, at query time.
///
/// # Examples
///
/// ```
/// use impulse_tracker::{Event, EventKind, ReduceFn};
///
/// fn count_outcomes(state: u64, event: &Event) -> u64 {
///     match event.kind {
///         EventKind::Outcome(_) => state + 1,
///         _ => state,
///     }
/// }
///
/// let reducer: ReduceFn<u64> = count_outcomes;
/// ```
pub type ReduceFn<S> = fn(S, &Event) -> S;

/// Fold a sequence of events from `S::default()` without touching disk.
pub fn fold_events<'a, S: Default>(
    reducer: ReduceFn<S>,
    events: impl IntoIterator<Item = &'a Event>,
) -> S {
    events.into_iter().fold(S::default(), reducer)
}

mod sealed {
    pub trait Sealed {}
}

/// Type-erased view operations, used by the log's view registry.
///
/// This trait is sealed and cannot be implemented outside of this crate.
pub trait ViewOps: sealed::Sealed + Send {
    /// Fold pending events, discarding the state reference.
    fn refresh_boxed(&mut self, reader: &EventReader) -> io::Result<()>;
    /// Point the view at the start of a freshly rotated log, keeping state.
    fn reset_offset(&mut self) -> io::Result<()>;
    /// Drop the snapshot and return to the default state (after a clear).
    fn reset(&mut self) -> io::Result<()>;
    fn view_name(&self) -> &str;
    /// Downcast to `&dyn Any` for type recovery.
    fn as_any(&self) -> &dyn Any;
}

/// Position in the active log up to which a view has folded: the byte
/// offset after the last folded line and that line's hash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Cursor {
    offset: u64,
    hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Snapshot not read yet.
    Unloaded,
    /// Next refresh folds archive and active log from scratch.
    Replay,
    /// Next refresh folds only what follows the cursor.
    Tail,
}

/// Why a snapshot cannot be resumed from.
enum Staleness {
    PastEof { log_len: u64 },
    HashMismatch,
}

impl fmt::Display for Staleness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Staleness::PastEof { log_len } => write!(f, "offset is past the log end ({log_len})"),
            Staleness::HashMismatch => f.write_str("hash of the last folded line differs"),
        }
    }
}

/// A derived view over an event log.
///
/// Owns a reducer, keeps its snapshot on disk, and folds only the events
/// appended since the last refresh.
pub struct View<S> {
    name: String,
    reducer: ReduceFn<S>,
    snapshot_path: PathBuf,
    state: S,
    cursor: Cursor,
    phase: Phase,
}

impl<S: fmt::Debug> fmt::Debug for View<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("offset", &self.cursor.offset)
            .field("phase", &self.phase)
            .finish()
    }
}

impl<S> View<S> {
    /// The in-memory state; `S::default()` before the first refresh.
    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<S> View<S>
where
    S: Serialize + DeserializeOwned + Default + Clone,
{
    /// Create a view whose snapshot lives at `views_dir/<name>.snapshot.json`.
    pub fn new(name: &str, reducer: ReduceFn<S>, views_dir: &Path) -> Self {
        View {
            name: name.to_string(),
            reducer,
            snapshot_path: views_dir.join(format!("{name}.snapshot.json")),
            state: S::default(),
            cursor: Cursor::default(),
            phase: Phase::Unloaded,
        }
    }

    /// Fold new events into the view.
    ///
    /// On first call, loads the snapshot and verifies it against the log;
    /// without a usable snapshot the whole history (archive + active log) is
    /// replayed. Afterwards only events past the stored offset are read.
    /// The snapshot is rewritten only when something was folded.
    ///
    /// # Errors
    ///
    /// Returns an error if reading events or saving the snapshot fails.
    pub fn refresh(&mut self, reader: &EventReader) -> io::Result<&S> {
        if self.phase == Phase::Unloaded {
            self.phase = self.restore(reader)?;
        }

        let folded = match self.phase {
            Phase::Replay => {
                let events = reader
                    .read_full()?
                    .map(|r| r.map(|(event, hash)| (event, None, hash)));
                let folded = self.fold(events)?;
                if folded > 0 {
                    self.cursor.offset = reader.active_log_size()?;
                }
                folded
            }
            _ => {
                let events = reader
                    .read_from(self.cursor.offset)?
                    .map(|r| r.map(|(event, next, hash)| (event, Some(next), hash)));
                self.fold(events)?
            }
        };
        self.phase = Phase::Tail;

        if folded > 0 {
            log::debug!("view '{}': folded {folded} events", self.name);
            self.save()?;
        }
        Ok(&self.state)
    }

    /// Throw away the snapshot and replay the full history.
    pub fn rebuild(&mut self, reader: &EventReader) -> io::Result<&S> {
        snapshot::delete(&self.snapshot_path)?;
        self.start_over();
        self.refresh(reader)
    }

    /// Load the snapshot and decide how the first refresh proceeds.
    fn restore(&mut self, reader: &EventReader) -> io::Result<Phase> {
        let Some(snap) = snapshot::load::<S>(&self.snapshot_path)? else {
            return Ok(Phase::Replay);
        };
        self.state = snap.state;
        self.cursor = Cursor {
            offset: snap.offset,
            hash: snap.hash,
        };

        match self.staleness(reader)? {
            None => Ok(Phase::Tail),
            Some(reason) => {
                log::warn!(
                    "view '{}': snapshot at offset {} is stale ({reason}), rebuilding",
                    self.name,
                    self.cursor.offset
                );
                self.start_over();
                Ok(Phase::Replay)
            }
        }
    }

    /// Whether the cursor still lines up with the active log.
    fn staleness(&self, reader: &EventReader) -> io::Result<Option<Staleness>> {
        if self.cursor.offset == 0 {
            return Ok(None);
        }
        let log_len = reader.active_log_size()?;
        if self.cursor.offset > log_len {
            return Ok(Some(Staleness::PastEof { log_len }));
        }
        Ok(match reader.read_line_hash_before(self.cursor.offset)? {
            Some(hash) if hash != self.cursor.hash => Some(Staleness::HashMismatch),
            _ => None,
        })
    }

    /// Run `events` through the reducer, advancing the cursor per line.
    fn fold(
        &mut self,
        events: impl Iterator<Item = io::Result<(Event, Option<u64>, String)>>,
    ) -> io::Result<usize> {
        let mut state = std::mem::take(&mut self.state);
        let mut folded = 0;
        let mut outcome = Ok(());
        for item in events {
            match item {
                Ok((event, next, hash)) => {
                    state = (self.reducer)(state, &event);
                    if let Some(next) = next {
                        self.cursor.offset = next;
                    }
                    self.cursor.hash = hash;
                    folded += 1;
                }
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }
        self.state = state;
        outcome.map(|()| folded)
    }

    fn start_over(&mut self) {
        self.state = S::default();
        self.cursor = Cursor::default();
        self.phase = Phase::Replay;
    }

    fn save(&self) -> io::Result<()> {
        snapshot::save(
            &self.snapshot_path,
            &Snapshot::new(
                self.state.clone(),
                self.cursor.offset,
                self.cursor.hash.clone(),
            ),
        )
    }
}

impl<S> sealed::Sealed for View<S> {}

impl<S> ViewOps for View<S>
where
    S: Serialize + DeserializeOwned + Default + Clone + Send + 'static,
{
    fn refresh_boxed(&mut self, reader: &EventReader) -> io::Result<()> {
        self.refresh(reader).map(drop)
    }

    fn reset_offset(&mut self) -> io::Result<()> {
        self.cursor = Cursor::default();
        self.save()
    }

    fn reset(&mut self) -> io::Result<()> {
        snapshot::delete(&self.snapshot_path)?;
        self.state = S::default();
        self.cursor = Cursor::default();
        self.phase = Phase::Tail;
        Ok(())
    }

    fn view_name(&self) -> &str {
        &self.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
