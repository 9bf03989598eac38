//! Read-only archive of past snapshot files.
//!
//! The collector rotates its snapshot into numbered files; a higher number is
//! newer. Three layouts are read:
//!
//! - `*.json`: one plain snapshot
//! - `*.json.gz`: one gzipped snapshot
//! - any other `*.gz` / `*.tgz`: a gzipped tarball, one snapshot per member
//!   (`backup-1.gz`, `backup-2.gz`, …)
//!
//! Chunks are served newest file first, tarball members in archive order,
//! until a chunk's last sample is older than the requested window.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use crate::error::FeedError;
use crate::feed::Snapshot;

const SECS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq)]
enum NamePart {
    Number(String),
    Text(String),
}

impl Ord for NamePart {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Self::Number(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Number(_)) => Ordering::Greater,
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for NamePart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Digit-aware sort key: `file-10` sorts after `file-9`.
fn natural_key(name: &str) -> Vec<NamePart> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_digits = false;
    for c in name.chars() {
        let digit = c.is_ascii_digit();
        if !current.is_empty() && digit != in_digits {
            parts.push(finish_part(std::mem::take(&mut current), in_digits));
        }
        in_digits = digit;
        current.push(c);
    }
    if !current.is_empty() {
        parts.push(finish_part(current, in_digits));
    }
    parts
}

fn finish_part(text: String, digits: bool) -> NamePart {
    if digits {
        let trimmed = text.trim_start_matches('0');
        NamePart::Number(if trimmed.is_empty() { "0" } else { trimmed }.to_string())
    } else {
        NamePart::Text(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    /// `.json` or `.json.gz`
    Single,
    /// gzipped tar of JSON members
    Tarball,
}

fn file_kind(path: &Path) -> Option<FileKind> {
    let name = path.file_name()?.to_str()?;
    if name.ends_with(".json") || name.ends_with(".json.gz") {
        Some(FileKind::Single)
    } else if name.ends_with(".gz") || name.ends_with(".tgz") {
        Some(FileKind::Tarball)
    } else {
        None
    }
}

/// Every regular member of a gzipped tarball, parsed as a snapshot.
/// Members that are not valid snapshots are logged and skipped.
fn read_tarball(path: &Path) -> Result<Vec<Snapshot>, FeedError> {
    let file = File::open(path).map_err(|e| FeedError::io(path, e))?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    let mut snapshots = Vec::new();
    for entry in archive.entries().map_err(|e| FeedError::io(path, e))? {
        let mut entry = entry.map_err(|e| FeedError::io(path, e))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let member = entry
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let mut text = String::new();
        entry
            .read_to_string(&mut text)
            .map_err(|e| FeedError::io(path, e))?;
        match Snapshot::from_json_str(&text) {
            Ok(snapshot) => snapshots.push(snapshot),
            Err(e) => log::warn!("skipping {}:{member}: {e}", path.display()),
        }
    }
    Ok(snapshots)
}

fn read_chunks(path: &Path) -> Result<Vec<Snapshot>, FeedError> {
    match file_kind(path) {
        Some(FileKind::Tarball) => read_tarball(path),
        _ => Snapshot::load(path).map(|s| vec![s]),
    }
}

/// Directory of snapshot files.
#[derive(Debug, Clone)]
pub struct HistoryArchive {
    dir: PathBuf,
}

impl HistoryArchive {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, FeedError> {
        let dir = dir.into();
        if !dir.is_dir() {
            let err = std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory");
            return Err(FeedError::io(dir, err));
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot files, newest first.
    pub fn files(&self) -> Result<Vec<PathBuf>, FeedError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| FeedError::io(&self.dir, e))?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && file_kind(p).is_some())
            .collect();
        files.sort_by_cached_key(|p| {
            natural_key(&p.file_name().unwrap_or_default().to_string_lossy())
        });
        files.reverse();
        Ok(files)
    }

    /// Chunks covering the last `days` days relative to `now` (unix seconds).
    pub fn chunks_within(&self, days: u32, now: i64) -> Result<ArchiveChunks, FeedError> {
        Ok(ArchiveChunks {
            files: self.files()?.into_iter(),
            pending: VecDeque::new(),
            days: i64::from(days),
            now,
        })
    }
}

/// Newest-first iterator over archived snapshots.
pub struct ArchiveChunks {
    files: std::vec::IntoIter<PathBuf>,
    /// Remaining members of the file being served.
    pending: VecDeque<Snapshot>,
    days: i64,
    now: i64,
}

impl ArchiveChunks {
    fn stop(&mut self) {
        // everything after this chunk is older still
        self.files = Vec::new().into_iter();
        self.pending.clear();
    }
}

impl Iterator for ArchiveChunks {
    type Item = Snapshot;

    fn next(&mut self) -> Option<Snapshot> {
        loop {
            let snapshot = match self.pending.pop_front() {
                Some(s) => s,
                None => {
                    let path = self.files.next()?;
                    match read_chunks(&path) {
                        Ok(chunks) => {
                            log::debug!("reading {} ({} chunks)", path.display(), chunks.len());
                            self.pending = chunks.into();
                        }
                        Err(e) => log::warn!("skipping archive file: {e}"),
                    }
                    continue;
                }
            };
            let Some(last) = snapshot.last_timestamp() else {
                log::debug!("skipping empty archive chunk");
                continue;
            };
            let age_days = (self.now - last).div_euclid(SECS_PER_DAY);
            if age_days >= self.days {
                self.stop();
                return None;
            }
            log::debug!("serving {} entries, {age_days}d old", snapshot.len());
            return Some(snapshot);
        }
    }
}
