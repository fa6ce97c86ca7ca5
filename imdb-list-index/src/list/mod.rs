/*!
Parsers for the IMDb plain text list files.

Every list file follows the same overall shape: a prose header ending at a
recognizable sentinel line, a run of data lines, and (for some files) a
footer. One shared skeleton drives the two operations every parser
supports, parameterized by a [`ListMeta`] descriptor and a per-parser
`parse_line`:

* **Ingest** (`rebuild_list`): stream a raw list file, copy its data lines
  into an archive sub-stream, and record where each record key landed.
  Parsers over sorted single files record keys as chunk bookmarks; the rest
  write a sorted secondary index sub-stream. Parsers that merge several
  source files must use an index, because the concatenation is not sorted.
* **Point lookup** (`lookup`): plan seek ranges for a set of query keys,
  then parse just those regions of the archived sub-stream, collecting the
  records whose key is queried. With no query set, the whole sub-stream is
  scanned.

The aka, plot and names parsers carry line-to-line state (the current title
or person); that state lives in the parser value itself, so each scan gets
a fresh one.
*/

use std::collections::HashSet;
use std::io::{BufRead, SeekFrom};
use std::path::Path;

use bstr::ByteSlice;
use fnv::FnvHashMap;
use log::{debug, warn};

use crate::archive::{ChunkReader, ChunkWriter, DEFAULT_CHUNK_SIZE};
use crate::codec::open_compressed;
use crate::error::{Error, ErrorKind, Result};
use crate::seek::{plan_bookmarked, plan_indexed, ScanRange};
use crate::util::{latin1, trim_line, Timer};

pub(crate) use self::aka::AkaParser;
pub(crate) use self::basic::{
    parse_duration, CertificatesParser, ColorInfoParser, GenresParser,
    RunningTimesParser,
};
pub(crate) use self::movies::MoviesParser;
pub(crate) use self::names::{
    sort_credits, CastParser, DirectorsParser, WritersParser,
};
pub(crate) use self::plot::PlotParser;
pub(crate) use self::rating::RatingParser;

mod aka;
mod basic;
mod movies;
mod names;
mod plot;
mod rating;

/// Static description of one list file parser.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ListMeta {
    /// The archive sub-stream holding the copied list data.
    pub name: &'static str,
    /// The raw file names (without `.list.gz`) feeding the sub-stream.
    pub sources: &'static [&'static str],
    /// Whether to discard video game and TV episode lines up front.
    pub skip_tvvg: bool,
    /// Whether lookups go through a secondary index sub-stream. Without
    /// one, record keys become bookmarks on the primary sub-stream, which
    /// requires the source file to be sorted by key.
    pub needs_index: bool,
    /// Whether rebuild fails when no source file could be opened.
    pub required: bool,
    /// The header ends at the line matching this (after trimming)...
    pub sentinel: &'static str,
    /// ...plus this many additional lines.
    pub header_skip: usize,
}

impl ListMeta {
    /// The name of the secondary index sub-stream.
    pub fn index_name(&self) -> String {
        format!("{}.index", self.name)
    }
}

/// The outcome of feeding one line to a parser.
#[derive(Clone, Debug)]
pub(crate) enum Step<P> {
    /// A data record: its key, the logical offset it can be re-read from,
    /// and the parsed payload.
    Record { key: String, offset: u64, payload: P },
    /// Nothing to index on this line (blank separators, continuations,
    /// state transitions).
    Skip,
    /// The end of the data section was reached; stop scanning.
    End,
}

/// A parser for one kind of list file.
pub(crate) trait ListParser {
    /// The per-record payload this parser produces.
    type Payload;

    /// The descriptor for this parser.
    const META: ListMeta;

    /// Parse one (decoded, right-trimmed) line. `offset` is the logical
    /// offset of the line's first byte within the sub-stream.
    fn parse_line(&mut self, line: &str, offset: u64)
        -> Result<Step<Self::Payload>>;
}

/// Advance `rdr` just past the list header: read until the sentinel line,
/// then skip the descriptor's extra lines. Failing to find the sentinel is
/// a structural error, fatal for the whole file.
fn skip_header<R: BufRead>(rdr: &mut R, meta: &ListMeta) -> Result<()> {
    let mut line = Vec::new();
    loop {
        line.clear();
        if rdr.read_until(b'\n', &mut line).map_err(Error::io)? == 0 {
            return Err(Error::parse(format!(
                "{}: header sentinel {:?} not found",
                meta.name, meta.sentinel
            )));
        }
        if trim_line(&line) == meta.sentinel.as_bytes() {
            break;
        }
    }
    for _ in 0..meta.header_skip {
        line.clear();
        rdr.read_until(b'\n', &mut line).map_err(Error::io)?;
    }
    Ok(())
}

/// Returns true for lines describing video games or individual TV
/// episodes, which several parsers drop wholesale.
fn is_tvvg(raw: &[u8]) -> bool {
    raw.contains(&b'{') || raw.contains_str("(VG)")
}

/// Ingest a parser's source files into the archive: copy data lines into
/// the primary sub-stream and record each key, either as bookmarks on the
/// primary sub-stream or as a sorted secondary index sub-stream.
pub(crate) fn rebuild_list<P: ListParser>(
    parser: &mut P,
    archive: &Path,
    source_dir: &Path,
) -> Result<()> {
    let meta = P::META;
    // With a secondary index the primary sub-stream needs no bookmark
    // boundaries, so chunks may cut themselves as the buffer fills.
    let mut out = ChunkWriter::append(
        archive,
        meta.name,
        DEFAULT_CHUNK_SIZE,
        meta.needs_index,
    )?;
    let mut index: FnvHashMap<String, Vec<u64>> = FnvHashMap::default();
    let mut opened = 0;
    let mut last_path = source_dir.join(format!("{}.list.gz", meta.name));

    for &source in meta.sources {
        let path = source_dir.join(format!("{}.list.gz", source));
        last_path = path.clone();
        let mut rdr = match open_compressed(&path) {
            Ok(rdr) => rdr,
            Err(err) => match err.kind() {
                ErrorKind::SourceMissing(_) => {
                    warn!("skipping {}: not found", path.display());
                    continue;
                }
                _ => return Err(err),
            },
        };
        opened += 1;
        skip_header(&mut rdr, &meta)?;

        let mut raw = Vec::new();
        let mut loc = out.tell();
        loop {
            raw.clear();
            if rdr.read_until(b'\n', &mut raw).map_err(Error::io)? == 0 {
                break;
            }
            if meta.skip_tvvg && is_tvvg(&raw) {
                continue;
            }
            out.write(&raw)?;
            let line = latin1(trim_line(&raw));
            match parser.parse_line(&line, loc)? {
                Step::End => break,
                Step::Skip => {}
                Step::Record { key, offset, .. } => {
                    if meta.needs_index {
                        index.entry(key).or_default().push(offset);
                    } else {
                        out.bookmark(key.as_bytes())?;
                    }
                }
            }
            loc = out.tell();
        }
    }
    out.close()?;

    if opened == 0 && meta.required {
        return Err(Error::source_missing(last_path));
    }

    if meta.needs_index {
        let mut keys: Vec<&String> = index.keys().collect();
        keys.sort();
        let mut idx = ChunkWriter::append(
            archive,
            &meta.index_name(),
            DEFAULT_CHUNK_SIZE,
            false,
        )?;
        for key in keys {
            let offsets: Vec<String> =
                index[key].iter().map(|off| off.to_string()).collect();
            idx.write(key.as_bytes())?;
            idx.write(b"\t")?;
            idx.write(offsets.join(" ").as_bytes())?;
            idx.write(b"\n")?;
            idx.bookmark(key.as_bytes())?;
        }
        idx.close()?;
    }
    Ok(())
}

/// Answer a point lookup (or, with `queries = None`, scan everything),
/// returning `(key, payload)` pairs in stream order. Records whose lines
/// fail to parse are skipped here, not fatal; the caller asked about
/// specific keys and malformed bystander lines should not break that.
pub(crate) fn lookup<P: ListParser>(
    parser: &mut P,
    archive: &Path,
    queries: Option<&HashSet<String>>,
) -> Result<Vec<(String, P::Payload)>> {
    let meta = P::META;
    if let Some(queries) = queries {
        if queries.is_empty() {
            return Ok(vec![]);
        }
    }
    let mut file = ChunkReader::open(archive, meta.name)?;
    debug!("reading {}", meta.name);

    let ranges: Vec<ScanRange> = match queries {
        None => vec![ScanRange { start: 0, end: None, count: 0 }],
        Some(queries) if meta.needs_index => {
            plan_indexed(archive, &meta.index_name(), queries)?
        }
        Some(queries) => plan_bookmarked(&file, queries)?,
    };

    let mut timer = Timer::new();
    let mut results = vec![];
    let mut lines = 0u64;
    let mut loc = 0;
    for range in ranges {
        if queries.is_some() {
            if range.start > loc {
                file.seek(SeekFrom::Start(range.start))?;
                loc = file.tell();
            } else if range.start < loc {
                // Already read past this range while serving the previous
                // one.
                continue;
            }
        }
        let mut found = 0;
        loop {
            if queries.is_some() && found >= range.count {
                break;
            }
            if let Some(end) = range.end {
                if loc >= end {
                    break;
                }
            }
            let raw = match file.next_line()? {
                None => break,
                Some(raw) => raw,
            };
            if queries.is_some() {
                lines += 1;
                if lines % 100 == 0 {
                    timer.step()?;
                }
            }
            let line = latin1(trim_line(&raw));
            let step = match parser.parse_line(&line, loc) {
                Ok(step) => step,
                Err(err) => match err.kind() {
                    ErrorKind::Parse(_) => {
                        debug!("{}: skipping line: {}", meta.name, err);
                        loc = file.tell();
                        continue;
                    }
                    _ => return Err(err),
                },
            };
            loc = file.tell();
            match step {
                Step::End => break,
                Step::Skip => {}
                Step::Record { key, payload, .. } => {
                    if queries.map_or(true, |q| q.contains(&key)) {
                        results.push((key, payload));
                        found += 1;
                    }
                }
            }
        }
    }
    debug!("{} lookup completed in {} seconds", meta.name, timer);
    Ok(results)
}

/// Collect `(key, payload)` pairs into a last-write-wins map.
pub(crate) fn into_map<P>(rows: Vec<(String, P)>) -> FnvHashMap<String, P> {
    let mut map = FnvHashMap::default();
    for (key, payload) in rows {
        map.insert(key, payload);
    }
    map
}

/// Collect `(key, payload)` pairs into a map of vectors, preserving stream
/// order within each key.
pub(crate) fn into_multimap<P>(
    rows: Vec<(String, P)>,
) -> FnvHashMap<String, Vec<P>> {
    let mut map: FnvHashMap<String, Vec<P>> = FnvHashMap::default();
    for (key, payload) in rows {
        map.entry(key).or_default().push(payload);
    }
    map
}
