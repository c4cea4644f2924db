//! Rotated history, stored as concatenated zstd frames.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

const COMPRESSION_LEVEL: i32 = 3;

/// Compress `data` and append it to the archive as one new frame.
/// Creates the archive file if it doesn't exist.
pub fn append_frame(archive_path: &Path, data: &[u8]) -> io::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(archive_path)?;
    let mut encoder = zstd::Encoder::new(file, COMPRESSION_LEVEL)?;
    encoder.write_all(data)?;
    let file = encoder.finish()?;
    file.sync_data()?;
    Ok(())
}

/// Stream every frame of the archive as one continuous run of lines.
/// Returns `Ok(None)` if there is no archive yet.
pub fn open_reader(archive_path: &Path) -> io::Result<Option<Box<dyn BufRead>>> {
    let file = match File::open(archive_path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let decoder = zstd::Decoder::new(file)?;
    Ok(Some(Box::new(BufReader::new(decoder))))
}

/// Delete the archive. Idempotent.
pub fn remove(archive_path: &Path) -> io::Result<()> {
    match fs::remove_file(archive_path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
