/*!
Chunked storage of compressed data.

An archive is a single zip container holding any number of named
sub-streams. Each sub-stream is stored as an ordered run of independently
compressed chunks; a chunk's member name records the logical offset of its
first byte within the decompressed sub-stream, and optionally a *bookmark*
key marking the greatest record key flushed into it. Bookmarks allow a
reader to find an approximate seek position for a key without consulting a
secondary index.

Readers transparently degrade to a plain gzip stream when the archive is not
a zip container, which permits pointing them directly at an upstream
`*.list.gz` file. A gzip-backed handle only supports forward reads.
*/

use std::fs::File;
use std::io::{self, BufReader, Read, SeekFrom};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use log::error;

use crate::error::{Error, Result};
use crate::util::open_file;

pub use self::zipfile::{ZipReader, ZipWriter};

mod zipfile;

/// The default target size of a chunk, in decompressed bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 128 * 1024;

/// One chunk of a sub-stream: its zip member, logical start offset and
/// optional bookmark.
#[derive(Clone, Debug)]
struct ChunkInfo {
    member: usize,
    pos: u64,
    size: u64,
    bookmark: Option<Vec<u8>>,
}

/// Build the member-name prefix for a sub-stream.
fn chunk_prefix(sub: &str) -> String {
    if sub.is_empty() {
        "c.".to_string()
    } else {
        format!("{}/c.", sub)
    }
}

/// Parse a member name of the form `<prefix><hex offset>[,<base64 key>]`.
/// Returns `None` for members belonging to other sub-streams.
fn parse_chunk_name(
    name: &str,
    prefix: &str,
) -> Result<Option<(u64, Option<Vec<u8>>)>> {
    let rest = match name.strip_prefix(prefix) {
        None => return Ok(None),
        Some(rest) => rest,
    };
    // Members of nested sub-streams share the prefix of their parents when
    // the parent name is a path prefix; those still contain a '/' here.
    if rest.contains('/') {
        return Ok(None);
    }
    let (hex, bookmark) = match rest.split_once(',') {
        None => (rest, None),
        Some((hex, b64)) => (hex, Some(base64_decode(b64)?)),
    };
    let pos = u64::from_str_radix(hex, 16).map_err(|_| {
        Error::archive_invalid(format!("bad chunk name {}", name))
    })?;
    Ok(Some((pos, bookmark)))
}

/// List the chunks of a sub-stream, sorted by logical offset.
fn list_chunks(zip: &ZipReader, prefix: &str) -> Result<Vec<ChunkInfo>> {
    let mut chunks = vec![];
    for (i, member) in zip.members().iter().enumerate() {
        if let Some((pos, bookmark)) = parse_chunk_name(&member.name, prefix)?
        {
            chunks.push(ChunkInfo {
                member: i,
                pos,
                size: member.size,
                bookmark,
            });
        }
    }
    chunks.sort_by_key(|c| c.pos);
    Ok(chunks)
}

/// A writer for one sub-stream of an archive.
///
/// Bytes accumulate in a write buffer; whole chunks are cut from it whenever
/// it reaches the chunk target (if `autoflush` is enabled) or whenever a
/// bookmark forces a boundary. Call `close` to flush the tail and commit the
/// zip directory; dropping the writer without closing it loses data.
#[derive(Debug)]
pub struct ChunkWriter {
    zip: ZipWriter,
    prefix: String,
    chunk_size: usize,
    autoflush: bool,
    buf: Vec<u8>,
    /// Total logical bytes written to the sub-stream, including bytes still
    /// in the buffer.
    pos: u64,
    last_bookmark: Option<Vec<u8>>,
}

impl ChunkWriter {
    /// Create a fresh archive (truncating any existing file) and open the
    /// given sub-stream for writing.
    pub fn create<P: AsRef<Path>>(
        path: P,
        sub: &str,
        chunk_size: usize,
        autoflush: bool,
    ) -> Result<ChunkWriter> {
        let zip = ZipWriter::create(path)?;
        ChunkWriter::new(zip, sub, chunk_size, autoflush)
    }

    /// Open the given sub-stream of an archive for appending, creating the
    /// archive if it does not exist.
    pub fn append<P: AsRef<Path>>(
        path: P,
        sub: &str,
        chunk_size: usize,
        autoflush: bool,
    ) -> Result<ChunkWriter> {
        let zip = ZipWriter::append(path)?;
        ChunkWriter::new(zip, sub, chunk_size, autoflush)
    }

    fn new(
        zip: ZipWriter,
        sub: &str,
        chunk_size: usize,
        autoflush: bool,
    ) -> Result<ChunkWriter> {
        assert!(chunk_size > 0);
        let prefix = chunk_prefix(sub);
        // Resume at the end of any existing chunks.
        let mut pos = 0;
        for member in zip.members() {
            if let Some((chunk_pos, _)) =
                parse_chunk_name(&member.name, &prefix)?
            {
                pos = pos.max(chunk_pos + member.size);
            }
        }
        Ok(ChunkWriter {
            zip,
            prefix,
            chunk_size,
            autoflush,
            buf: vec![],
            pos,
            last_bookmark: None,
        })
    }

    /// The logical length of the sub-stream, including buffered bytes. This
    /// is the offset at which the next `write` will land.
    pub fn tell(&self) -> u64 {
        self.pos
    }

    /// Append bytes to the sub-stream.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(data);
        self.pos += data.len() as u64;
        if self.autoflush {
            self.emit(true, None)
        } else {
            Ok(())
        }
    }

    /// Record a bookmark for the bytes written so far, cutting a chunk
    /// tagged with `key` if the buffer is close enough to the chunk target.
    ///
    /// Keys must be non-decreasing across calls; an out-of-order key would
    /// silently corrupt every later bookmark seek, so it is rejected here.
    pub fn bookmark(&mut self, key: &[u8]) -> Result<()> {
        if let Some(ref last) = self.last_bookmark {
            if key < last.as_slice() {
                error!(
                    "bookmark {:?} arrived after {:?}",
                    bstr::BStr::new(key),
                    bstr::BStr::new(last),
                );
                return Err(Error::parse(format!(
                    "bookmark keys out of order: {:?} < {:?}",
                    bstr::BStr::new(key),
                    bstr::BStr::new(last),
                )));
            }
        }
        self.last_bookmark = Some(key.to_vec());
        // Cutting a chunk at every bookmark would produce thousands of tiny
        // members, so only cut once the buffer is within 1/8 of the target.
        if self.buf.len() >= self.chunk_size - self.chunk_size / 8 {
            self.emit(false, Some(key))?;
        }
        Ok(())
    }

    /// Flush all buffered bytes, cutting a final short chunk if needed.
    pub fn flush(&mut self) -> Result<()> {
        self.emit(false, None)
    }

    /// Flush and commit the archive. Must be called; the zip directory is
    /// only written here.
    pub fn close(mut self) -> Result<()> {
        self.flush()?;
        self.zip.finish()
    }

    /// Cut chunks out of the write buffer. When `auto` is true, only whole
    /// chunks are cut; otherwise the buffer is emptied completely. The
    /// bookmark, if any, tags the final chunk cut.
    fn emit(&mut self, auto: bool, bookmark: Option<&[u8]>) -> Result<()> {
        while !self.buf.is_empty()
            && (self.buf.len() >= self.chunk_size || !auto)
        {
            let chunk_pos = self.pos - self.buf.len() as u64;
            let take = self.buf.len().min(self.chunk_size);
            let mut name = format!("{}{:08x}", self.prefix, chunk_pos);
            if let Some(key) = bookmark {
                if self.buf.len() <= self.chunk_size {
                    name.push(',');
                    name.push_str(&base64_encode(key));
                }
            }
            self.zip.add(&name, &self.buf[..take])?;
            self.buf.drain(..take);
        }
        Ok(())
    }
}

/// A reader for one sub-stream of an archive.
///
/// Reads are sequential; `seek` re-positions the stream by locating the
/// chunk covering the requested offset and discarding the remainder. When
/// the archive file is itself a bare gzip stream, the reader degrades to a
/// single forward-only sub-stream and bookmarks are unavailable.
#[derive(Debug)]
pub struct ChunkReader {
    backend: Backend,
    /// Decompressed bytes not yet delivered; `start` is the cursor.
    buf: Vec<u8>,
    start: usize,
    /// Logical offset of the next byte to be delivered.
    pos: u64,
    eof: bool,
    chunk_size: usize,
}

#[derive(Debug)]
enum Backend {
    Zip { zip: ZipReader, chunks: Vec<ChunkInfo>, next: usize },
    Gzip(MultiGzDecoder<BufReader<File>>),
}

impl ChunkReader {
    /// Open a sub-stream of the archive at `path` for reading.
    ///
    /// A sub-stream with no chunks reads as empty. If the archive is not a
    /// zip container but is a valid gzip stream, the gzip data itself is
    /// exposed as the (only) sub-stream.
    pub fn open<P: AsRef<Path>>(path: P, sub: &str) -> Result<ChunkReader> {
        let path = path.as_ref();
        let mut magic = [0u8; 2];
        let n = open_file(path)?.read(&mut magic).map_err(Error::io)?;
        let backend = if n == 2 && magic == [b'P', b'K'] {
            let zip = ZipReader::open(path)?;
            let chunks = list_chunks(&zip, &chunk_prefix(sub))?;
            Backend::Zip { zip, chunks, next: 0 }
        } else if n == 2 && magic == [0x1f, 0x8b] {
            let rdr = MultiGzDecoder::new(BufReader::new(open_file(path)?));
            Backend::Gzip(rdr)
        } else {
            return Err(Error::archive_invalid(format!(
                "{} is neither a zip container nor a gzip stream",
                path.display()
            )));
        };
        Ok(ChunkReader {
            backend,
            buf: vec![],
            start: 0,
            pos: 0,
            eof: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// The logical offset of the next byte this reader will deliver, i.e.
    /// the number of decompressed bytes consumed so far (after any seek).
    pub fn tell(&self) -> u64 {
        self.pos
    }

    /// Read up to `n` bytes. Fewer are returned only at end of stream.
    pub fn read(&mut self, n: usize) -> Result<Vec<u8>> {
        while self.buffered() < n && !self.eof {
            self.fill()?;
        }
        let take = self.buffered().min(n);
        let out = self.buf[self.start..self.start + take].to_vec();
        self.consume(take);
        Ok(out)
    }

    /// Return the next `\n`-terminated line, including its terminator, or
    /// the trailing unterminated fragment at end of stream, or `None` once
    /// the stream is exhausted.
    pub fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            if let Some(i) =
                self.buf[self.start..].iter().position(|&b| b == b'\n')
            {
                let line = self.buf[self.start..self.start + i + 1].to_vec();
                self.consume(i + 1);
                return Ok(Some(line));
            }
            if self.eof {
                if self.buffered() == 0 {
                    return Ok(None);
                }
                let line = self.buf[self.start..].to_vec();
                self.consume(line.len());
                return Ok(Some(line));
            }
            self.fill()?;
        }
    }

    /// Re-position the stream. Seeking from the end is not supported, and a
    /// gzip-backed stream only seeks forward.
    pub fn seek(&mut self, from: SeekFrom) -> Result<()> {
        let target = match from {
            SeekFrom::Start(off) => off,
            SeekFrom::Current(delta) => {
                let target = self.pos as i64 + delta;
                if target < 0 {
                    return Err(Error::unsupported(
                        "cannot seek before the start of a sub-stream",
                    ));
                }
                target as u64
            }
            SeekFrom::End(_) => {
                return Err(Error::unsupported(
                    "cannot seek relative to the end of a sub-stream",
                ))
            }
        };
        match self.backend {
            Backend::Gzip(_) => {
                if target < self.pos {
                    return Err(Error::unsupported(
                        "cannot seek backwards in a gzip stream",
                    ));
                }
            }
            Backend::Zip { ref chunks, ref mut next, .. } => {
                // Locate the greatest chunk starting at or before the
                // target, position at its start and discard up to target.
                let mut idx = 0;
                let mut chunk_pos = 0;
                for (i, chunk) in chunks.iter().enumerate() {
                    if chunk.pos <= target {
                        idx = i;
                        chunk_pos = chunk.pos;
                    } else {
                        break;
                    }
                }
                *next = idx;
                self.buf.clear();
                self.start = 0;
                self.pos = chunk_pos;
                self.eof = false;
            }
        }
        let delta = (target - self.pos) as usize;
        if delta > 0 {
            self.read(delta)?;
        }
        Ok(())
    }

    /// Return a position at or before the first record with the given key,
    /// based on chunk bookmarks: the start of the last chunk whose bookmark
    /// orders strictly below `key`, or 0 if there is none.
    pub fn find_bookmark(&self, key: &[u8]) -> Result<u64> {
        Ok(self.find_bookmark_range_impl(key, false)?.0)
    }

    /// Like `find_bookmark`, but also return an upper bound: the start of
    /// the chunk *after* the first chunk whose bookmark orders above `key`
    /// (that chunk may itself still hold records for `key`), or `None` when
    /// the region extends to the end of the sub-stream. Records for `key`,
    /// if any, live entirely within the returned range.
    pub fn find_bookmark_range(
        &self,
        key: &[u8],
    ) -> Result<(u64, Option<u64>)> {
        self.find_bookmark_range_impl(key, true)
    }

    fn find_bookmark_range_impl(
        &self,
        key: &[u8],
        give_range: bool,
    ) -> Result<(u64, Option<u64>)> {
        let chunks = match self.backend {
            Backend::Gzip(_) => {
                return Err(Error::unsupported(
                    "bookmarks are unavailable on a gzip stream",
                ))
            }
            Backend::Zip { ref chunks, .. } => chunks,
        };
        let mut pos = 0;
        for chunk in chunks {
            match chunk.bookmark {
                Some(ref b) if b.as_slice() < key => pos = chunk.pos,
                _ => {}
            }
        }
        if !give_range {
            return Ok((pos, None));
        }
        let mut passed = false;
        for chunk in chunks {
            if passed {
                return Ok((pos, Some(chunk.pos)));
            }
            if let Some(ref b) = chunk.bookmark {
                if b.as_slice() > key {
                    passed = true;
                }
            }
        }
        Ok((pos, None))
    }

    fn buffered(&self) -> usize {
        self.buf.len() - self.start
    }

    fn consume(&mut self, n: usize) {
        self.start += n;
        self.pos += n as u64;
        // Compact once the consumed prefix dominates the buffer.
        if self.start > self.chunk_size {
            self.buf.drain(..self.start);
            self.start = 0;
        }
    }

    /// Decompress the next chunk (or, for gzip, the next block) into the
    /// buffer. Sets `eof` when the stream is exhausted.
    fn fill(&mut self) -> Result<()> {
        match self.backend {
            Backend::Zip { ref mut zip, ref chunks, ref mut next } => {
                if *next >= chunks.len() {
                    self.eof = true;
                    return Ok(());
                }
                let data = zip.read(chunks[*next].member)?;
                *next += 1;
                self.buf.extend_from_slice(&data);
            }
            Backend::Gzip(ref mut rdr) => {
                let mut block = vec![0u8; self.chunk_size];
                let n = read_some(rdr, &mut block)?;
                if n == 0 {
                    self.eof = true;
                } else {
                    self.buf.extend_from_slice(&block[..n]);
                }
            }
        }
        Ok(())
    }
}

/// Read into `buf` until at least one byte arrives or the stream ends.
fn read_some<R: Read>(rdr: &mut R, buf: &mut [u8]) -> Result<usize> {
    loop {
        match rdr.read(buf) {
            Ok(n) => return Ok(n),
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::io(e)),
        }
    }
}

// Urlsafe base64 (RFC 4648 §5) with padding, as used in chunk names.
const BASE64: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

fn base64_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() + 2) / 3 * 4);
    for group in data.chunks(3) {
        let b = [
            group[0],
            group.get(1).copied().unwrap_or(0),
            group.get(2).copied().unwrap_or(0),
        ];
        let n = (u32::from(b[0]) << 16) | (u32::from(b[1]) << 8)
            | u32::from(b[2]);
        let chars = [
            BASE64[(n >> 18) as usize & 0x3f],
            BASE64[(n >> 12) as usize & 0x3f],
            BASE64[(n >> 6) as usize & 0x3f],
            BASE64[n as usize & 0x3f],
        ];
        let keep = match group.len() {
            1 => 2,
            2 => 3,
            _ => 4,
        };
        for &c in &chars[..keep] {
            out.push(c as char);
        }
        for _ in keep..4 {
            out.push('=');
        }
    }
    out
}

fn base64_decode(s: &str) -> Result<Vec<u8>> {
    let invalid =
        || Error::archive_invalid(format!("bad base64 bookmark: {}", s));
    let stripped = s.trim_end_matches('=');
    let mut out = Vec::with_capacity(stripped.len() * 3 / 4);
    for quad in stripped.as_bytes().chunks(4) {
        if quad.len() == 1 {
            return Err(invalid());
        }
        let mut n: u32 = 0;
        for &c in quad {
            let v = BASE64.iter().position(|&b| b == c).ok_or_else(invalid)?;
            n = (n << 6) | v as u32;
        }
        n <<= 6 * (4 - quad.len()) as u32;
        let bytes = [(n >> 16) as u8, (n >> 8) as u8, n as u8];
        out.extend_from_slice(&bytes[..quad.len() - 1]);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::TempDir;
    use std::io::Write;

    fn archive_with(
        tmp: &TempDir,
        sub: &str,
        chunk_size: usize,
        records: &[(&[u8], Option<&[u8]>)],
    ) -> std::path::PathBuf {
        let path = tmp.path().join("t.zip");
        let mut wtr =
            ChunkWriter::append(&path, sub, chunk_size, false).unwrap();
        for &(data, bookmark) in records {
            wtr.write(data).unwrap();
            if let Some(key) = bookmark {
                wtr.bookmark(key).unwrap();
            }
        }
        wtr.close().unwrap();
        path
    }

    #[test]
    fn base64_round_trip() {
        for input in [
            &b""[..],
            &b"a"[..],
            &b"ab"[..],
            &b"abc"[..],
            &b"abcd"[..],
            &b"The Matrix (1999)"[..],
        ] {
            let enc = base64_encode(input);
            assert_eq!(base64_decode(&enc).unwrap(), input, "{:?}", enc);
        }
        // Padded urlsafe values, as the original tooling produces them.
        assert_eq!(base64_encode(b"ab"), "YWI=");
        assert_eq!(base64_encode(&[0xfb, 0xff]), "-_8=");
    }

    #[test]
    fn round_trip_various_chunk_sizes() {
        let payload: Vec<u8> =
            (0..100_000u32).map(|i| (i % 251) as u8).collect();
        for chunk_size in [1, 7, 4096, DEFAULT_CHUNK_SIZE] {
            let tmp = TempDir::new("archive-roundtrip").unwrap();
            let path = tmp.path().join("t.zip");
            let mut wtr =
                ChunkWriter::create(&path, "data", chunk_size, true).unwrap();
            // Arbitrary interleaving of write sizes.
            let mut at = 0;
            for step in [1usize, 10, 100, 1000, 50_000].iter().cycle() {
                if at >= payload.len() {
                    break;
                }
                let end = (at + step).min(payload.len());
                wtr.write(&payload[at..end]).unwrap();
                at = end;
            }
            wtr.close().unwrap();

            let mut rdr = ChunkReader::open(&path, "data").unwrap();
            let mut got = vec![];
            loop {
                let block = rdr.read(3000).unwrap();
                if block.is_empty() {
                    break;
                }
                got.extend_from_slice(&block);
            }
            assert_eq!(got, payload, "chunk_size={}", chunk_size);
            assert_eq!(rdr.tell(), payload.len() as u64);
        }
    }

    #[test]
    fn line_iteration_completeness() {
        let tmp = TempDir::new("archive-lines").unwrap();
        let content = b"first\nsecond line\n\nfourth\ntrailing fragment";
        let path = archive_with(&tmp, "lines", 8, &[(content, None)]);

        let mut rdr = ChunkReader::open(&path, "lines").unwrap();
        let mut lines = vec![];
        while let Some(line) = rdr.next_line().unwrap() {
            lines.push(line);
        }
        assert_eq!(
            lines,
            vec![
                b"first\n".to_vec(),
                b"second line\n".to_vec(),
                b"\n".to_vec(),
                b"fourth\n".to_vec(),
                b"trailing fragment".to_vec(),
            ],
        );
        let total: Vec<u8> = lines.concat();
        assert_eq!(total, content);
        assert!(rdr.next_line().unwrap().is_none());
    }

    #[test]
    fn seek_determinism() {
        let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 7) as u8).collect();
        let tmp = TempDir::new("archive-seek").unwrap();
        let path = archive_with(&tmp, "s", 512, &[(&payload, None)]);

        let mut rdr = ChunkReader::open(&path, "s").unwrap();
        for &off in &[0usize, 1, 511, 512, 513, 5_000, 9_999, 10_000] {
            rdr.seek(SeekFrom::Start(off as u64)).unwrap();
            assert_eq!(rdr.tell(), off as u64);
            let got = rdr.read(100).unwrap();
            let want = &payload[off..(off + 100).min(payload.len())];
            assert_eq!(got, want, "offset {}", off);
        }
        // Backward seeks re-read earlier chunks.
        rdr.seek(SeekFrom::Start(9_000)).unwrap();
        rdr.seek(SeekFrom::Start(10)).unwrap();
        assert_eq!(rdr.read(4).unwrap(), &payload[10..14]);
        rdr.seek(SeekFrom::Current(2)).unwrap();
        assert_eq!(rdr.read(2).unwrap(), &payload[16..18]);
    }

    #[test]
    fn bookmarks_bound_records() {
        let tmp = TempDir::new("archive-bookmarks").unwrap();
        let path = tmp.path().join("t.zip");
        // Tiny chunk size so nearly every bookmark cuts a chunk.
        let mut wtr = ChunkWriter::append(&path, "b", 32, false).unwrap();
        let mut offsets = vec![];
        for i in 0..100u32 {
            let key = format!("key{:04}", i);
            let record = format!("{} payload payload\n", key);
            offsets.push(wtr.tell());
            wtr.write(record.as_bytes()).unwrap();
            wtr.bookmark(key.as_bytes()).unwrap();
        }
        wtr.close().unwrap();

        let mut rdr = ChunkReader::open(&path, "b").unwrap();
        for i in [0u32, 1, 17, 50, 98, 99] {
            let key = format!("key{:04}", i);
            let (start, end) =
                rdr.find_bookmark_range(key.as_bytes()).unwrap();
            assert!(
                start <= offsets[i as usize],
                "start {} > record offset {} for {}",
                start,
                offsets[i as usize],
                key,
            );
            if let Some(end) = end {
                assert!(end > offsets[i as usize]);
            }
            // The record is actually found within [start, end).
            rdr.seek(SeekFrom::Start(start)).unwrap();
            let mut found = false;
            while let Some(line) = rdr.next_line().unwrap() {
                if end.map_or(false, |e| rdr.tell() > e) {
                    break;
                }
                if line.starts_with(key.as_bytes()) {
                    found = true;
                    break;
                }
            }
            assert!(found, "record {} not found in its bookmark range", key);
        }
        // A key below every bookmark starts at the beginning.
        assert_eq!(rdr.find_bookmark(b"aaa").unwrap(), 0);
    }

    #[test]
    fn bookmark_order_is_checked() {
        let tmp = TempDir::new("archive-bookmark-order").unwrap();
        let path = tmp.path().join("t.zip");
        let mut wtr =
            ChunkWriter::append(&path, "b", 1024, false).unwrap();
        wtr.write(b"x").unwrap();
        wtr.bookmark(b"m").unwrap();
        wtr.write(b"y").unwrap();
        assert!(wtr.bookmark(b"a").is_err());
        assert!(wtr.bookmark(b"m").is_ok());
    }

    #[test]
    fn append_resumes_offsets() {
        let tmp = TempDir::new("archive-append").unwrap();
        let path = tmp.path().join("t.zip");
        let mut wtr = ChunkWriter::append(&path, "a", 4, true).unwrap();
        wtr.write(b"0123456789").unwrap();
        wtr.close().unwrap();

        let mut wtr = ChunkWriter::append(&path, "a", 4, true).unwrap();
        assert_eq!(wtr.tell(), 10);
        wtr.write(b"abcdef").unwrap();
        wtr.close().unwrap();

        // A second sub-stream in the same archive is independent.
        let mut wtr = ChunkWriter::append(&path, "z", 4, true).unwrap();
        assert_eq!(wtr.tell(), 0);
        wtr.write(b"zzz").unwrap();
        wtr.close().unwrap();

        let mut rdr = ChunkReader::open(&path, "a").unwrap();
        assert_eq!(rdr.read(100).unwrap(), b"0123456789abcdef");
        let mut rdr = ChunkReader::open(&path, "z").unwrap();
        assert_eq!(rdr.read(100).unwrap(), b"zzz");
    }

    #[test]
    fn missing_sub_stream_reads_empty() {
        let tmp = TempDir::new("archive-missing").unwrap();
        let path = archive_with(&tmp, "real", 64, &[(b"data", None)]);
        let mut rdr = ChunkReader::open(&path, "no-such").unwrap();
        assert!(rdr.read(10).unwrap().is_empty());
        assert!(rdr.next_line().unwrap().is_none());
        assert_eq!(rdr.tell(), 0);
    }

    #[test]
    fn gzip_degradation() {
        let tmp = TempDir::new("archive-gzip").unwrap();
        let path = tmp.path().join("t.gz");
        let file = std::fs::File::create(&path).unwrap();
        let mut enc = flate2::write::GzEncoder::new(
            file,
            flate2::Compression::default(),
        );
        enc.write_all(b"alpha\nbeta\ngamma\n").unwrap();
        enc.finish().unwrap();

        let mut rdr = ChunkReader::open(&path, "").unwrap();
        assert_eq!(rdr.next_line().unwrap().unwrap(), b"alpha\n");
        // Forward seeks discard, backward seeks are rejected.
        rdr.seek(SeekFrom::Start(11)).unwrap();
        assert_eq!(rdr.next_line().unwrap().unwrap(), b"gamma\n");
        assert!(rdr.seek(SeekFrom::Start(0)).is_err());
        assert!(rdr.find_bookmark(b"k").is_err());
        assert_eq!(rdr.tell(), 17);

        // A gzip stream cannot be opened for writing.
        assert!(ChunkWriter::append(&path, "", 1024, true).is_err());
    }

    #[test]
    fn garbage_file_is_invalid() {
        let tmp = TempDir::new("archive-garbage").unwrap();
        let path = tmp.path().join("t.bin");
        std::fs::write(&path, b"neither zip nor gzip").unwrap();
        assert!(ChunkReader::open(&path, "").is_err());
    }
}
