use std::fmt;
use std::fs::File;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// How long a scan may run between cooperative sleeps.
const RATELIMIT_SLICE: Duration = Duration::from_nanos(1_000_000_000 / 6);

/// How long each cooperative sleep lasts.
const RATELIMIT_SLEEP: Duration = Duration::from_millis(100);

/// Elapsed-time bookkeeping for long scans.
///
/// A `Timer` serves two purposes. It rate-limits scans by sleeping for a
/// short interval whenever a full time slice of work has been done since the
/// last sleep, so that a background rebuild or search leaves CPU for
/// co-tenants. And it carries an optional deadline: once the deadline has
/// passed, `step` and `check_expired` fail with a timeout error, which the
/// search entry point propagates to its caller.
///
/// `step` should be called regularly (roughly every hundred records) from
/// scan loops.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    last: Instant,
    min_dur: Duration,
    timeout: Option<Duration>,
}

impl Timer {
    /// Create a timer with no deadline and no rate-limit grace period.
    pub fn new() -> Timer {
        Timer::with_timeout(None)
    }

    /// Create a timer with an optional deadline.
    pub fn with_timeout(timeout: Option<Duration>) -> Timer {
        let now = Instant::now();
        Timer { start: now, last: now, min_dur: Duration::ZERO, timeout }
    }

    /// Create a timer that only starts rate-limiting after the given initial
    /// grace period, so that short scans finish at full speed.
    pub fn rate_limited(min_dur: Duration) -> Timer {
        let now = Instant::now();
        Timer { start: now, last: now, min_dur, timeout: None }
    }

    /// Check the deadline and yield the CPU when a full slice of work has
    /// been done since the last sleep.
    pub fn step(&mut self) -> Result<()> {
        self.check_expired()?;
        let now = Instant::now();
        if now - self.start > self.min_dur && now - self.last > RATELIMIT_SLICE
        {
            thread::sleep(RATELIMIT_SLEEP);
            self.last = now;
        }
        Ok(())
    }

    /// Check the deadline without rate-limiting.
    pub fn check_expired(&self) -> Result<()> {
        if let Some(timeout) = self.timeout {
            if self.start.elapsed() > timeout {
                return Err(Error::timeout());
            }
        }
        Ok(())
    }

    /// Return the elapsed duration since this timer was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for Timer {
    fn default() -> Timer {
        Timer::new()
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:0.4}", self.elapsed().as_secs_f64())
    }
}

/// A type that provides a Display impl for std::time::Duration.
#[derive(Debug)]
pub struct NiceDuration(pub Duration);

impl fmt::Display for NiceDuration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:0.4} secs", self.0.as_secs_f64())
    }
}

impl NiceDuration {
    /// Create a duration corresponding to the amount of time since the
    /// instant given.
    pub fn since(t: Instant) -> NiceDuration {
        NiceDuration(Instant::now().duration_since(t))
    }
}

/// Decode ISO-8859-1 bytes into an owned string.
///
/// The list files (and therefore the archived copies of them) are encoded as
/// ISO-8859-1, whose 256 code points map one-to-one onto the first 256
/// Unicode scalar values.
pub fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Strip one trailing line terminator and any trailing whitespace from a raw
/// line, returning the remaining prefix.
pub fn trim_line(bytes: &[u8]) -> &[u8] {
    let mut end = bytes.len();
    while end > 0 && (bytes[end - 1] as char).is_whitespace() {
        end -= 1;
    }
    &bytes[..end]
}

/// Split on runs of whitespace, yielding at most `limit` fields. The final
/// field keeps any interior whitespace intact, so `limit = 4` turns a
/// ratings row into its distribution, vote count, score and (possibly
/// space-bearing) title.
pub fn split_whitespace_limit(s: &str, limit: usize) -> Vec<&str> {
    let mut fields = Vec::with_capacity(limit);
    let mut rest = s.trim_start();
    while fields.len() + 1 < limit {
        match rest.find(char::is_whitespace) {
            None => break,
            Some(i) => {
                fields.push(&rest[..i]);
                rest = rest[i..].trim_start();
            }
        }
    }
    if !rest.is_empty() {
        fields.push(rest);
    }
    fields
}

/// Opens a file for reading, attaching the path to any error.
pub fn open_file<P: AsRef<Path>>(path: P) -> Result<File> {
    let path = path.as_ref();
    File::open(path).map_err(|e| Error::io_path(e, path))
}

/// Creates a file and truncates it, attaching the path to any error.
pub fn create_file<P: AsRef<Path>>(path: P) -> Result<File> {
    let path = path.as_ref();
    File::create(path).map_err(|e| Error::io_path(e, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin1_round_trip() {
        assert_eq!(latin1(b"abc"), "abc");
        assert_eq!(latin1(&[0x4c, 0xe9, 0x6f, 0x6e]), "L\u{e9}on");
    }

    #[test]
    fn trim_line_strips_terminators() {
        assert_eq!(trim_line(b"abc\n"), b"abc");
        assert_eq!(trim_line(b"abc \t\r\n"), b"abc");
        assert_eq!(trim_line(b"abc"), b"abc");
        assert_eq!(trim_line(b"\n"), b"");
    }

    #[test]
    fn whitespace_limit_preserves_title_spaces() {
        let fields = split_whitespace_limit(
            "0000000125  695936   8.6  Pulp  Fiction (1994)",
            4,
        );
        assert_eq!(
            fields,
            vec!["0000000125", "695936", "8.6", "Pulp  Fiction (1994)"],
        );

        assert_eq!(split_whitespace_limit("a b", 4), vec!["a", "b"]);
        assert_eq!(split_whitespace_limit("", 4), Vec::<&str>::new());
    }

    #[test]
    fn timer_expires() {
        let timer = Timer::with_timeout(Some(Duration::ZERO));
        thread::sleep(Duration::from_millis(2));
        assert!(timer.check_expired().unwrap_err().is_timeout());

        let timer = Timer::with_timeout(Some(Duration::from_secs(3600)));
        assert!(timer.check_expired().is_ok());
    }
}
