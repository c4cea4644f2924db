//! Checkpoints for folded views, and the atomic JSON writer they share with
//! the user profile.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// A persisted checkpoint of a view's state.
///
/// Written next to the log under `views/<name>.snapshot.json` whenever a
/// refresh consumed new events. On the next refresh only events after
/// `offset` are folded.
///
/// ```text
/// $ cat views/fasting.snapshot.json | jq .
/// {
///   "state": { "last": { "fasting": true, "at": "2024-03-01T20:00:00Z" } },
///   "offset": 2210,
///   "hash": "9c41d0e27ab35f18"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Snapshot<S> {
    /// The folded state at the time of the snapshot.
    pub state: S,

    /// Byte offset into `app.jsonl` after the last event consumed.
    /// Always refers to the active log; the archive is fully consumed by then.
    pub offset: u64,

    /// Hex-encoded xxh64 hash of the last line consumed.
    pub hash: String,
}

impl<S> Snapshot<S> {
    pub fn new(state: S, offset: u64, hash: String) -> Self {
        Snapshot {
            state,
            offset,
            hash,
        }
    }
}

/// Serialize `value` as pretty JSON and replace `path` atomically.
///
/// Writes `<path>.tmp`, syncs, then renames over the target, so a crash
/// mid-write leaves the previous file intact.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> io::Result<()> {
    let tmp_path = tmp_path(path);

    let json = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(json.as_bytes())?;
    file.sync_data()?;
    drop(file);

    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Save a snapshot atomically.
pub fn save<S: Serialize>(path: &Path, snapshot: &Snapshot<S>) -> io::Result<()> {
    write_json_atomic(path, snapshot)
}

/// Load a snapshot.
///
/// Returns `Ok(None)` when the file is missing or does not parse; a corrupt
/// snapshot is treated as absent so the view replays the log.
pub fn load<S: DeserializeOwned>(path: &Path) -> io::Result<Option<Snapshot<S>>> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    match serde_json::from_str(&contents) {
        Ok(snapshot) => Ok(Some(snapshot)),
        Err(e) => {
            log::warn!("ignoring unreadable snapshot {}: {e}", path.display());
            Ok(None)
        }
    }
}

/// Delete a snapshot and any leftover `.tmp` file. Idempotent.
pub fn delete(path: &Path) -> io::Result<()> {
    remove_if_exists(path)?;
    remove_if_exists(&tmp_path(path))
}

fn tmp_path(path: &Path) -> std::path::PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    name.into()
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
