/*!
Planning of read ranges for point lookups.

Given a set of query keys, the planner produces a small, ordered,
non-overlapping set of ranges to read from a primary sub-stream. Two
strategies exist: consult a secondary index sub-stream (exact offsets, so no
end bound is needed) or consult the primary sub-stream's own bookmarks
(approximate, so every range carries an end bound to guarantee
termination).
*/

use std::collections::{BTreeMap, HashMap};
use std::io::SeekFrom;
use std::path::Path;
use std::time::Duration;

use log::debug;

use crate::archive::ChunkReader;
use crate::error::{Error, Result};
use crate::util::Timer;

/// One planned read: start offset, optional end bound, and how many
/// matching records to expect. The expectation may overcount (the reader
/// then scans to the end bound) but never undercounts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ScanRange {
    /// Logical offset to seek to.
    pub start: u64,
    /// Logical offset past the region, or `None` for end-of-stream.
    pub end: Option<u64>,
    /// Number of matching records expected within the range.
    pub count: usize,
}

/// Plan reads using a secondary index sub-stream.
///
/// The index maps each key to the exact offsets of its records, so the
/// resulting ranges have no end bound; the record count alone terminates
/// the scan. The index itself is searched via its bookmarks, one pass over
/// the sorted queries.
pub fn plan_indexed(
    archive: &Path,
    index_name: &str,
    queries: &std::collections::HashSet<String>,
) -> Result<Vec<ScanRange>> {
    let mut timer = Timer::rate_limited(Duration::from_secs(1));
    let mut idx = ChunkReader::open(archive, index_name)?;
    let mut locs: BTreeMap<u64, usize> = BTreeMap::new();

    let mut sorted: Vec<&String> = queries.iter().collect();
    sorted.sort();

    debug!("searching index {}", index_name);
    let mut last_bookmark = 0;
    let mut lines = 0u64;
    for query in sorted {
        let bookmark = idx.find_bookmark(query.as_bytes())?;
        if bookmark != last_bookmark {
            idx.seek(SeekFrom::Start(bookmark))?;
            last_bookmark = bookmark;
        }
        while let Some(raw) = idx.next_line()? {
            lines += 1;
            if lines % 100 == 0 {
                timer.step()?;
            }
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches('\n');
            let (key, offsets) = line.split_once('\t').ok_or_else(|| {
                Error::bug(format!("malformed index line: {:?}", line))
            })?;
            if queries.contains(key) {
                for off in offsets.split(' ') {
                    let off: u64 = off.parse().map_err(|_| {
                        Error::bug(format!("malformed index line: {:?}", line))
                    })?;
                    *locs.entry(off).or_insert(0) += 1;
                }
            } else if key > query.as_str() {
                // The index is sorted, so nothing below can match.
                break;
            }
        }
    }
    debug!("index search completed in {} seconds", timer);

    Ok(locs
        .into_iter()
        .map(|(start, count)| ScanRange { start, end: None, count })
        .collect())
}

/// Plan reads using the primary sub-stream's own bookmarks.
///
/// Each query maps to the bookmark range that may contain its records;
/// overlapping and adjacent ranges are then coalesced in offset order. A
/// range with no end swallows every range after it.
pub fn plan_bookmarked(
    file: &ChunkReader,
    queries: &std::collections::HashSet<String>,
) -> Result<Vec<ScanRange>> {
    let mut starts: BTreeMap<u64, usize> = BTreeMap::new();
    let mut ends: HashMap<u64, Option<u64>> = HashMap::new();

    let mut sorted: Vec<&String> = queries.iter().collect();
    sorted.sort();
    for query in sorted {
        let (start, end) = file.find_bookmark_range(query.as_bytes())?;
        let slot = ends.entry(start).or_insert(Some(0));
        *slot = match (*slot, end) {
            (None, _) | (_, None) => None,
            (Some(a), Some(b)) => Some(a.max(b)),
        };
        *starts.entry(start).or_insert(0) += 1;
    }

    Ok(coalesce(starts, ends))
}

/// Merge per-query ranges into a non-overlapping, ascending list.
fn coalesce(
    starts: BTreeMap<u64, usize>,
    ends: HashMap<u64, Option<u64>>,
) -> Vec<ScanRange> {
    let mut out = vec![];
    let mut start = 0;
    let mut end = Some(0);
    let mut count = 0;
    for (next_start, next_count) in starts {
        let next_end = ends.get(&next_start).copied().unwrap_or(None);
        if end.is_none() || next_start <= end.unwrap() {
            // This range begins inside (or adjacent to) the running range,
            // so extend the running range to cover it.
            end = match (end, next_end) {
                (None, _) | (_, None) => None,
                (Some(a), Some(b)) => Some(a.max(b)),
            };
            count += next_count;
        } else {
            if count > 0 {
                out.push(ScanRange { start, end, count });
            }
            start = next_start;
            end = next_end;
            count = next_count;
        }
    }
    if count > 0 {
        out.push(ScanRange { start, end, count });
    }
    out
}
