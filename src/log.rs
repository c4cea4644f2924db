use crate::archive;
use crate::event::Event;
use crate::view::{ReduceFn, View, ViewOps};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Compute xxh64 hash of raw line bytes (without trailing newline), hex-encoded.
pub fn line_hash(line: &[u8]) -> String {
    let hash = xxhash_rust::xxh64::xxh64(line, 0);
    format!("{:016x}", hash)
}

/// Whether the writer takes an exclusive advisory lock on `app.jsonl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockMode {
    /// Exclusive `flock`; a second writer fails to open.
    #[default]
    Flock,
    /// No locking. Only safe when a single process writes.
    None,
}

/// Read-only access to the log files.
///
/// Views refresh from a reader so the log can lend it out while its view
/// registry is borrowed mutably.
#[derive(Debug, Clone)]
pub struct EventReader {
    log_path: PathBuf,
    archive_path: PathBuf,
}

impl EventReader {
    fn new(dir: &Path) -> Self {
        EventReader {
            log_path: dir.join("app.jsonl"),
            archive_path: dir.join("archive.jsonl.zst"),
        }
    }

    /// Read events from the active log starting at the given byte offset.
    ///
    /// Yields `(event, next_byte_offset, line_hash)` for each complete line.
    /// Empty lines are skipped. A trailing partial line is skipped silently.
    pub fn read_from(
        &self,
        offset: u64,
    ) -> io::Result<impl Iterator<Item = io::Result<(Event, u64, String)>> + use<>> {
        let mut file = File::open(&self.log_path)?;
        file.seek(SeekFrom::Start(offset))?;

        let file_len = file.metadata()?.len();
        let reader = BufReader::new(file);

        Ok(LogIterator {
            lines: reader.lines(),
            pos: offset,
            file_len,
        })
    }

    /// Read the complete history: the archive first, then the active log.
    ///
    /// Yields `(event, line_hash)` in storage order.
    pub fn read_full(&self) -> io::Result<Box<dyn Iterator<Item = io::Result<(Event, String)>>>> {
        let active = self
            .read_from(0)?
            .map(|r| r.map(|(event, _, hash)| (event, hash)));

        match archive::open_reader(&self.archive_path)? {
            Some(reader) => {
                let archived = reader.lines().filter_map(|line| match line {
                    Ok(line) if line.is_empty() => None,
                    Ok(line) => Some(parse_line(&line).map(|e| (e, line_hash(line.as_bytes())))),
                    Err(e) => Some(Err(e)),
                });
                Ok(Box::new(archived.chain(active)))
            }
            None => Ok(Box::new(active)),
        }
    }

    /// Every event with `timestamp >= since`, sorted by timestamp.
    ///
    /// The sort is stable, so events sharing a timestamp keep storage order.
    pub fn events_since(&self, since: DateTime<Utc>) -> io::Result<Vec<Event>> {
        let mut events = Vec::new();
        for result in self.read_full()? {
            let (event, _) = result?;
            if event.timestamp >= since {
                events.push(event);
            }
        }
        events.sort_by_key(|e| e.timestamp);
        Ok(events)
    }

    /// The complete history, in storage order.
    pub fn events(&self) -> io::Result<Vec<Event>> {
        self.read_full()?
            .map(|r| r.map(|(event, _)| event))
            .collect()
    }

    /// Returns the current size in bytes of the active log file.
    pub fn active_log_size(&self) -> io::Result<u64> {
        Ok(fs::metadata(&self.log_path)?.len())
    }

    /// Hash of the line ending just before `offset`.
    ///
    /// `offset` is the byte after the newline of the last consumed line.
    /// Returns `None` if offset is 0 or past EOF.
    pub fn read_line_hash_before(&self, offset: u64) -> io::Result<Option<String>> {
        if offset == 0 {
            return Ok(None);
        }

        let mut file = File::open(&self.log_path)?;
        let file_len = file.metadata()?.len();

        if offset > file_len {
            return Ok(None);
        }

        // offset - 1 is the '\n' ending the previous line
        let newline_pos = offset - 1;
        let mut start = 0u64;

        if newline_pos > 0 {
            let scan_start = newline_pos.saturating_sub(8192);
            file.seek(SeekFrom::Start(scan_start))?;
            let mut buf = vec![0u8; (newline_pos - scan_start) as usize];
            file.read_exact(&mut buf)?;

            if let Some(pos) = buf.iter().rposition(|&b| b == b'\n') {
                start = scan_start + pos as u64 + 1;
            } else {
                start = scan_start;
            }
        }

        file.seek(SeekFrom::Start(start))?;
        let line_len = (newline_pos - start) as usize;
        let mut line_buf = vec![0u8; line_len];
        file.read_exact(&mut line_buf)?;

        Ok(Some(line_hash(&line_buf)))
    }
}

/// The append-only event store.
///
/// One directory holds the active log `app.jsonl`, rotated history in
/// `archive.jsonl.zst`, and view snapshots under `views/`. Events are only
/// ever appended; [`EventLog::clear`] is the single bulk delete.
pub struct EventLog {
    dir: PathBuf,
    views_dir: PathBuf,
    reader: EventReader,
    file: File,
    max_log_size: u64,
    views: Vec<Box<dyn ViewOps>>,
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("dir", &self.dir)
            .field("max_log_size", &self.max_log_size)
            .field(
                "views",
                &self.views.iter().map(|v| v.view_name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

type ViewFactory = Box<dyn FnOnce(&Path) -> Box<dyn ViewOps>>;

/// Configures and opens an [`EventLog`].
pub struct EventLogBuilder {
    dir: PathBuf,
    max_log_size: u64,
    lock_mode: LockMode,
    views: Vec<ViewFactory>,
}

impl EventLogBuilder {
    /// Rotate the active log into the archive once it grows past `bytes`.
    /// `0` disables rotation.
    pub fn max_log_size(mut self, bytes: u64) -> Self {
        self.max_log_size = bytes;
        self
    }

    pub fn lock_mode(mut self, mode: LockMode) -> Self {
        self.lock_mode = mode;
        self
    }

    /// Register a view folded by `reducer`. Its snapshot is stored as
    /// `views/<name>.snapshot.json`.
    pub fn view<S>(mut self, name: &str, reducer: ReduceFn<S>) -> Self
    where
        S: Serialize + DeserializeOwned + Default + Clone + Send + 'static,
    {
        let name = name.to_string();
        self.views.push(Box::new(move |views_dir: &Path| {
            Box::new(View::new(&name, reducer, views_dir)) as Box<dyn ViewOps>
        }));
        self
    }

    pub fn open(self) -> io::Result<EventLog> {
        let mut log = EventLog::open_with_lock(&self.dir, self.lock_mode)?;
        log.max_log_size = self.max_log_size;
        let views_dir = log.views_dir.clone();
        log.views = self.views.into_iter().map(|make| make(&views_dir)).collect();
        Ok(log)
    }
}

impl EventLog {
    pub fn builder(dir: impl AsRef<Path>) -> EventLogBuilder {
        EventLogBuilder {
            dir: dir.as_ref().to_path_buf(),
            max_log_size: 0,
            lock_mode: LockMode::default(),
            views: Vec::new(),
        }
    }

    /// Open or create an event log in the given directory, locking it for
    /// exclusive writing.
    pub fn open(dir: impl AsRef<Path>) -> io::Result<Self> {
        Self::open_with_lock(dir, LockMode::Flock)
    }

    /// Open or create an event log with an explicit [`LockMode`].
    ///
    /// Creates the directory and `views/` if missing. A partial line left at
    /// the end of `app.jsonl` by an interrupted write is truncated away.
    pub fn open_with_lock(dir: impl AsRef<Path>, lock_mode: LockMode) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let views_dir = dir.join("views");
        let reader = EventReader::new(&dir);

        fs::create_dir_all(&views_dir)?;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&reader.log_path)?;

        if lock_mode == LockMode::Flock && file.try_lock_exclusive().is_err() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!(
                    "another writer holds the lock on {}",
                    reader.log_path.display()
                ),
            ));
        }

        let mut log = EventLog {
            dir,
            views_dir,
            reader,
            file,
            max_log_size: 0,
            views: Vec::new(),
        };
        log.repair_partial_tail()?;
        log::debug!("opened event log at {}", log.dir.display());
        Ok(log)
    }

    /// Append an event to the active log.
    ///
    /// Serializes the event as a single JSON line, appends it, and syncs to
    /// disk. Returns the byte offset where the event starts. May rotate the
    /// log afterwards if `max_log_size` is exceeded.
    pub fn append(&mut self, event: &Event) -> io::Result<u64> {
        let offset = self.file.seek(SeekFrom::End(0))?;
        let json = serde_json::to_string(event)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(self.file, "{json}")?;
        self.file.sync_data()?;
        log::debug!(
            "appended {}/{} {} at offset {offset}",
            event.module(),
            event.event_type(),
            event.id
        );

        if self.max_log_size > 0 && offset + json.len() as u64 + 1 > self.max_log_size {
            self.rotate()?;
        }
        Ok(offset)
    }

    /// Move the active log into the archive.
    ///
    /// Registered views are refreshed first so their snapshots cover every
    /// archived event, then the active log is compressed into a new archive
    /// frame and truncated in place (the lock stays held), and view offsets
    /// are reset to 0.
    pub fn rotate(&mut self) -> io::Result<()> {
        self.refresh_all()?;

        let contents = fs::read(&self.reader.log_path)?;
        if contents.is_empty() {
            return Ok(());
        }
        archive::append_frame(&self.reader.archive_path, &contents)?;
        self.file.set_len(0)?;
        self.file.sync_all()?;

        for view in &mut self.views {
            view.reset_offset()?;
        }
        log::info!(
            "rotated {} bytes of {} into the archive",
            contents.len(),
            self.reader.log_path.display()
        );
        Ok(())
    }

    /// Delete every event: remove the archive, truncate the active log, and
    /// reset all registered views to their default state.
    ///
    /// If the archive cannot be removed nothing changes. Once the active log
    /// has been touched the views are reset even if truncation fails.
    pub fn clear(&mut self) -> io::Result<()> {
        archive::remove(&self.reader.archive_path)?;
        let truncated = self.file.set_len(0).and_then(|()| self.file.sync_all());
        for view in &mut self.views {
            view.reset()?;
        }
        truncated?;
        log::info!("cleared event log at {}", self.dir.display());
        Ok(())
    }

    /// Fold any new events into every registered view.
    pub fn refresh_all(&mut self) -> io::Result<()> {
        for view in &mut self.views {
            view.refresh_boxed(&self.reader)?;
        }
        Ok(())
    }

    /// Borrow the state of a registered view.
    ///
    /// Fails with `NotFound` for an unknown name and `InvalidInput` when `S`
    /// is not the view's state type.
    pub fn view<S: 'static>(&self, name: &str) -> io::Result<&S> {
        let view = self
            .views
            .iter()
            .find(|v| v.view_name() == name)
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("view '{name}' not found"))
            })?;
        view.as_any()
            .downcast_ref::<View<S>>()
            .map(|v| v.state())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("view '{name}' has a different state type"),
                )
            })
    }

    /// Read-only access to the log files.
    pub fn reader(&self) -> &EventReader {
        &self.reader
    }

    /// See [`EventReader::read_from`].
    pub fn read_from(
        &self,
        offset: u64,
    ) -> io::Result<impl Iterator<Item = io::Result<(Event, u64, String)>> + use<>> {
        self.reader.read_from(offset)
    }

    /// See [`EventReader::read_full`].
    pub fn read_full(&self) -> io::Result<Box<dyn Iterator<Item = io::Result<(Event, String)>>>> {
        self.reader.read_full()
    }

    /// Returns the path to the data directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path to the active log file.
    pub fn log_path(&self) -> &Path {
        &self.reader.log_path
    }

    /// Returns the path to the archive file.
    pub fn archive_path(&self) -> &Path {
        &self.reader.archive_path
    }

    /// Returns the path to the views directory.
    pub fn views_dir(&self) -> &Path {
        &self.views_dir
    }

    /// Returns the current size in bytes of the active log file.
    pub fn active_log_size(&self) -> io::Result<u64> {
        self.reader.active_log_size()
    }

    fn repair_partial_tail(&mut self) -> io::Result<()> {
        let len = self.file.metadata()?.len();
        if len == 0 {
            return Ok(());
        }

        let mut contents = Vec::with_capacity(len as usize);
        File::open(&self.reader.log_path)?.read_to_end(&mut contents)?;
        if contents.last() == Some(&b'\n') {
            return Ok(());
        }

        let keep = contents
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |pos| pos as u64 + 1);
        log::warn!(
            "truncating {} partial bytes at the end of {}",
            len - keep,
            self.reader.log_path.display()
        );
        self.file.set_len(keep)?;
        self.file.sync_all()
    }
}

fn parse_line(line: &str) -> io::Result<Event> {
    serde_json::from_str(line).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

struct LogIterator<I> {
    lines: I,
    pos: u64,
    file_len: u64,
}

impl<I: Iterator<Item = io::Result<String>>> Iterator for LogIterator<I> {
    type Item = io::Result<(Event, u64, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e)),
            };

            let line_bytes = line.len() as u64;

            // A line that reaches EOF without a newline is a partial write.
            if self.pos + line_bytes >= self.file_len {
                return None;
            }

            let next_pos = self.pos + line_bytes + 1;

            if line.is_empty() {
                self.pos = next_pos;
                continue;
            }

            let hash = line_hash(line.as_bytes());
            let event = match parse_line(&line) {
                Ok(e) => e,
                Err(e) => return Some(Err(e)),
            };

            self.pos = next_pos;
            return Some(Ok((event, next_pos, hash)));
        }
    }
}
