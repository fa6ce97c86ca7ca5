use std::fs::{self, File};
use std::io;
use std::path::Path;

use log::info;

/// The base URL of an HTTP frontend to the IMDb plain text list mirrors.
///
/// The lists stopped updating in 2017, so "frozendata" is as fresh as it
/// gets. Any of the FTP mirrors works as long as it serves the same
/// layout.
const BASE_URL: &str =
    "https://ftp.funet.fi/pub/mirrors/ftp.imdb.com/pub/frozendata";

/// All of the list files the archive can ingest.
const LIST_FILES: &[&str] = &[
    "movies",
    "aka-titles",
    "ratings",
    "plot",
    "color-info",
    "genres",
    "running-times",
    "certificates",
    "actors",
    "actresses",
    "directors",
    "writers",
];

/// Ensure that all of the list files exist with non-zero size in the
/// given directory, fetching any that do not. Files are kept compressed
/// on disk; the rebuild decompresses them itself.
///
/// Returns true if and only if at least one file was downloaded.
pub fn fetch_all<P: AsRef<Path>>(dir: P) -> anyhow::Result<bool> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let mut fetched = false;
    for name in LIST_FILES {
        let filename = format!("{}.list.gz", name);
        let path = dir.join(&filename);
        if fs::metadata(&path).map(|md| md.len() > 0).unwrap_or(false) {
            continue;
        }
        let url = format!("{}/{}", BASE_URL, filename);
        info!("downloading {} to {}", url, path.display());
        let resp = ureq::get(&url).call()?;
        let mut rdr = resp.into_reader();
        let mut out = File::create(&path)?;
        io::copy(&mut rdr, &mut out)?;
        fetched = true;
    }
    Ok(fetched)
}
