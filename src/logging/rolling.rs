//! Day-rotated, size-segmented log files
//!
//! One file per calendar day, `<prefix>.<YYYYMMDD>.log`. When a file would
//! grow past `max_bytes` the day continues in `<prefix>.<YYYYMMDD>.<n>.log`.
//! `<prefix>.log` always points at the active file, and files dated more than
//! `retention_days` before the active day are removed on every day switch.

use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::fs_utils;

const DATE_FORMAT: &str = "%Y%m%d";

#[derive(Debug, Clone)]
pub struct RollingOptions {
    pub dir: PathBuf,
    /// File name prefix
    pub prefix: String,
    /// Segment size limit in bytes, 0 for none
    pub max_bytes: u64,
    /// Days to keep, 0 keeps everything
    pub retention_days: u32,
}

pub struct RollingWriter {
    options: RollingOptions,
    day: NaiveDate,
    segment: u32,
    file: File,
    size: u64,
}

impl RollingWriter {
    pub fn open(options: RollingOptions) -> io::Result<Self> {
        Self::open_at(options, Local::now().naive_local())
    }

    /// Open for the day of `now`, appending to that day's newest segment
    pub fn open_at(options: RollingOptions, now: NaiveDateTime) -> io::Result<Self> {
        fs_utils::create_dir_all(&options.dir)?;

        let day = now.date();
        let mut segment = latest_segment(&options, day)?;
        let (mut file, mut size) = open_append(&options.dir.join(segment_file_name(
            &options.prefix,
            day,
            segment,
        )))?;

        if options.max_bytes > 0 && size >= options.max_bytes {
            segment += 1;
            (file, size) = open_append(&options.dir.join(segment_file_name(
                &options.prefix,
                day,
                segment,
            )))?;
        }

        let writer = Self {
            options,
            day,
            segment,
            file,
            size,
        };
        writer.update_link()?;
        writer.purge();

        Ok(writer)
    }

    /// Write one record as if at `now`, rotating first when needed
    pub fn write_at(&mut self, now: NaiveDateTime, buf: &[u8]) -> io::Result<usize> {
        let day = now.date();
        if day != self.day {
            let segment = latest_segment(&self.options, day)?;
            self.switch_to(day, segment)?;
            self.purge();
        }

        let incoming = buf.len() as u64;
        if self.options.max_bytes > 0
            && self.size > 0
            && self.size + incoming > self.options.max_bytes
        {
            self.switch_to(self.day, self.segment + 1)?;
        }

        self.file.write_all(buf)?;
        self.size += incoming;
        Ok(buf.len())
    }

    pub fn current_path(&self) -> PathBuf {
        self.options
            .dir
            .join(segment_file_name(&self.options.prefix, self.day, self.segment))
    }

    /// Stable reference to the active file
    pub fn link_path(&self) -> PathBuf {
        link_path(&self.options)
    }

    fn switch_to(&mut self, day: NaiveDate, segment: u32) -> io::Result<()> {
        self.file.flush()?;

        let path = self
            .options
            .dir
            .join(segment_file_name(&self.options.prefix, day, segment));
        let (file, size) = open_append(&path)?;

        self.file = file;
        self.size = size;
        self.day = day;
        self.segment = segment;

        // A stale link must not cost the record that triggered the switch
        if let Err(e) = self.update_link() {
            eprintln!(
                "bedisk: failed to update log link {}: {}",
                self.link_path().display(),
                e
            );
        }
        Ok(())
    }

    #[cfg(unix)]
    fn update_link(&self) -> io::Result<()> {
        let target = segment_file_name(&self.options.prefix, self.day, self.segment);
        let tmp = self
            .options
            .dir
            .join(format!(".{}.log.tmp", self.options.prefix));

        // Leftover from an interrupted swap
        let _ = fs::remove_file(&tmp);
        std::os::unix::fs::symlink(&target, &tmp)?;
        fs::rename(&tmp, self.link_path())
    }

    #[cfg(not(unix))]
    fn update_link(&self) -> io::Result<()> {
        let target = segment_file_name(&self.options.prefix, self.day, self.segment);
        fs::write(self.link_path(), target)
    }

    fn purge(&self) {
        if self.options.retention_days == 0 {
            return;
        }
        let Some(cutoff) = self
            .day
            .checked_sub_signed(Duration::days(i64::from(self.options.retention_days)))
        else {
            return;
        };

        let entries = match fs::read_dir(&self.options.dir) {
            Ok(entries) => entries,
            Err(e) => {
                eprintln!(
                    "bedisk: failed to scan log dir {}: {}",
                    self.options.dir.display(),
                    e
                );
                return;
            }
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some((date, _)) = name
                .to_str()
                .and_then(|n| parse_file_name(&self.options.prefix, n))
            else {
                continue;
            };
            if date < cutoff {
                if let Err(e) = fs::remove_file(entry.path()) {
                    eprintln!(
                        "bedisk: failed to delete old log file {}: {}",
                        entry.path().display(),
                        e
                    );
                }
            }
        }
    }
}

impl Write for RollingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_at(Local::now().naive_local(), buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Rolling writer shared between the log worker and introspection
#[derive(Clone)]
pub struct SharedRollingWriter {
    inner: Arc<Mutex<RollingWriter>>,
}

impl SharedRollingWriter {
    pub fn new(writer: RollingWriter) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    pub fn current_path(&self) -> PathBuf {
        self.lock().current_path()
    }

    pub fn link_path(&self) -> PathBuf {
        self.lock().link_path()
    }

    fn lock(&self) -> MutexGuard<'_, RollingWriter> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Write for SharedRollingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock().flush()
    }
}

fn open_append(path: &Path) -> io::Result<(File, u64)> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let size = file.metadata()?.len();
    Ok((file, size))
}

fn link_path(options: &RollingOptions) -> PathBuf {
    options.dir.join(format!("{}.log", options.prefix))
}

fn segment_file_name(prefix: &str, day: NaiveDate, segment: u32) -> String {
    let date = day.format(DATE_FORMAT);
    if segment == 0 {
        format!("{}.{}.log", prefix, date)
    } else {
        format!("{}.{}.{}.log", prefix, date, segment)
    }
}

/// Parse `<prefix>.<YYYYMMDD>[.<n>].log` into its date and segment number
fn parse_file_name(prefix: &str, name: &str) -> Option<(NaiveDate, u32)> {
    let rest = name
        .strip_prefix(prefix)?
        .strip_prefix('.')?
        .strip_suffix(".log")?;

    let (date, segment) = match rest.split_once('.') {
        Some((date, segment)) => (date, segment.parse().ok()?),
        None => (rest, 0),
    };
    if date.len() != 8 {
        return None;
    }

    let date = NaiveDate::parse_from_str(date, DATE_FORMAT).ok()?;
    Some((date, segment))
}

fn latest_segment(options: &RollingOptions, day: NaiveDate) -> io::Result<u32> {
    let mut latest = 0;
    for entry in fs::read_dir(&options.dir)?.flatten() {
        let name = entry.file_name();
        if let Some((date, segment)) = name
            .to_str()
            .and_then(|n| parse_file_name(&options.prefix, n))
        {
            if date == day {
                latest = latest.max(segment);
            }
        }
    }
    Ok(latest)
}
