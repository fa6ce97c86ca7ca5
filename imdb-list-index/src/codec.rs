/*!
Reading and writing gzip files through an external decompressor.

Decompressing the large upstream list files with an external `gzip`
subprocess is considerably faster than an in-process decoder, so reads
prefer spawning one and fall back to `flate2` when no such program can be
started. Writes (only the search index sidecar) always use `flate2`.
*/

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::debug;

use crate::error::{Error, Result};

/// The decompressor command line. Anything that behaves like gzip(1) with
/// `-d` will do.
const DECOMPRESSOR: &[&str] = &["gzip", "--quiet", "-d"];

/// Open a gzip file for buffered reading of its decompressed content.
///
/// A missing file is reported as `SourceMissing` so that callers can skip
/// optional inputs.
pub fn open_compressed(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(ref e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::source_missing(path))
        }
        Err(e) => return Err(Error::io_path(e, path)),
    };
    let spawned = Command::new(DECOMPRESSOR[0])
        .args(&DECOMPRESSOR[1..])
        .stdin(Stdio::from(file))
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn();
    match spawned {
        Ok(mut child) => {
            let stdout = child.stdout.take().expect("piped stdout");
            Ok(Box::new(BufReader::new(Subprocess { child, stdout })))
        }
        Err(e) => {
            debug!(
                "cannot spawn {}: {}; decompressing {} in process",
                DECOMPRESSOR[0],
                e,
                path.display()
            );
            let file = File::open(path).map_err(|e| Error::io_path(e, path))?;
            Ok(Box::new(BufReader::new(MultiGzDecoder::new(
                BufReader::new(file),
            ))))
        }
    }
}

/// Create a gzip file for buffered writing. The returned writer must be
/// dropped (or flushed) to complete the stream.
pub fn create_compressed(path: &Path) -> Result<Box<dyn Write + Send>> {
    let file = File::create(path).map_err(|e| Error::io_path(e, path))?;
    Ok(Box::new(GzEncoder::new(file, Compression::default())))
}

/// A running decompressor child whose stdout we read. Reaped on drop so
/// that early abandonment (a reader that stops mid-file) does not leave a
/// zombie behind.
struct Subprocess {
    child: Child,
    stdout: ChildStdout,
}

impl Read for Subprocess {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stdout.read(buf)
    }
}

impl Drop for Subprocess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::tests::TempDir;

    #[test]
    fn reads_what_was_written() {
        let tmp = TempDir::new("codec").unwrap();
        let path = tmp.path().join("t.gz");
        let mut wtr = create_compressed(&path).unwrap();
        wtr.write_all(b"one\ntwo\nthree\n").unwrap();
        drop(wtr);

        let mut rdr = open_compressed(&path).unwrap();
        let mut got = String::new();
        rdr.read_to_string(&mut got).unwrap();
        assert_eq!(got, "one\ntwo\nthree\n");
    }

    #[test]
    fn missing_file_is_source_missing() {
        let tmp = TempDir::new("codec-missing").unwrap();
        let err = match open_compressed(&tmp.path().join("no-such.gz")) {
            Ok(_) => panic!("expected an error"),
            Err(err) => err,
        };
        assert!(matches!(err.kind(), ErrorKind::SourceMissing(_)));
    }
}
