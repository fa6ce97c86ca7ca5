/*!
The search index and the approximate-title ranker.

Searching does not touch the archived list data at all. A rebuild emits a
flat gzip sidecar (`<archive>.idx`) with one line per title *and* per
alternate title: a lowercased alphanumeric token column for cheap substring
scans, the year, the display title, the real title an alternate points at,
and the vote count for popularity weighting.

A query is cleaned, stemmed and exploded into fixed-size substring
fingerprints; any index line containing one of them (and passing the year
window) becomes a candidate. Candidates are scored by gestalt similarity
against the query (title with and without suffixes, query with and
without the year appended), gated by the quick-ratio upper bounds, and the
surviving ratio is weighted by a fitted popularity curve, a TV-show
penalty and year proximity. The best score per stored title wins, with a
parallel map remembering which alternate name produced it.
*/

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use bstr::ByteSlice;
use fnv::FnvHashMap;
use log::{debug, info, warn};

use crate::archive::{ChunkWriter, DEFAULT_CHUNK_SIZE};
use crate::codec::{create_compressed, open_compressed};
use crate::error::{Error, ErrorKind, Result};
use crate::list::{self, AkaParser, MoviesParser, RatingParser};
use crate::ratio::SequenceMatcher;
use crate::record::{parse_title, Rating, TITLE_RE};
use crate::util::{trim_line, Timer};

/// The length of substring fingerprints. Shorter means more candidates per
/// query (better recall, slower scans).
const FINGERPRINT_SIZE: usize = 5;

/// How far a result's year may stray from the queried year.
const DELTA_YEAR: u32 = 8;

/// The initial similarity cutoff; candidates never score below it.
const CUTOFF: f64 = 0.6;

/// The four most common three-letter words in movie titles, dropped when
/// stemming a multi-word query.
const STEMS: &[&str] = &["the", "and", "der", "for"];

/// The path of the search index sidecar for an archive.
pub(crate) fn index_path(archive: &Path) -> PathBuf {
    let mut path = archive.as_os_str().to_os_string();
    path.push(".idx");
    PathBuf::from(path)
}

/// Lowercase a word and drop everything that is not `[a-z0-9 ]`. Accented
/// characters are dropped, not folded.
fn clean_word(word: &str) -> String {
    word.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == ' ')
        .collect()
}

/// Clean a word list and, when it still leaves more than one word, stem
/// it: drop words of length two or less, the most common stems, and small
/// bare numbers (years survive). If stemming would leave nothing, the
/// unstemmed list wins.
fn clean_words(words: &[&str]) -> Vec<String> {
    let cleaned: Vec<String> = words
        .iter()
        .map(|w| clean_word(w))
        .filter(|w| !w.is_empty())
        .collect();
    if words.len() == 1 {
        return cleaned;
    }
    let mut stemmed = vec![];
    for word in &cleaned {
        if word.len() <= 2 || STEMS.contains(&word.as_str()) {
            continue;
        }
        if word.len() <= 4 {
            if let Ok(n) = word.parse::<u32>() {
                if n < 2100 {
                    continue;
                }
            }
        }
        stemmed.push(word.clone());
    }
    if stemmed.is_empty() {
        cleaned
    } else {
        stemmed
    }
}

/// Explode each word into its contiguous substrings of length `size`.
/// Words shorter than `size` yield themselves.
fn subwords(words: &[String], size: usize) -> Vec<String> {
    let mut out = vec![];
    for word in words {
        if word.len() <= size {
            out.push(word.clone());
        } else {
            for i in 0..=word.len() - size {
                out.push(word[i..i + size].to_string());
            }
        }
    }
    out
}

/// Load the complete rating map from the archive.
pub(crate) fn ratings_map(
    archive: &Path,
) -> Result<FnvHashMap<String, Rating>> {
    let mut parser = RatingParser;
    let rows = list::lookup(&mut parser, archive, None)?;
    let mut map = FnvHashMap::default();
    for (key, raw) in rows {
        map.insert(key, raw.into_rating()?);
    }
    Ok(map)
}

/// Build the search index sidecar (and the `stopwords` word-frequency
/// sub-stream) from the archived movies, aka-titles and ratings streams.
pub(crate) fn create_index(archive: &Path) -> Result<()> {
    let ratings = ratings_map(archive)?;
    let mut frequencies: FnvHashMap<String, u64> = FnvHashMap::default();
    let mut out = create_compressed(&index_path(archive))?;
    let mut count = 0u64;
    let mut skipped = 0u64;

    let mut write_entry = |out: &mut Box<dyn Write + Send>,
                           frequencies: &mut FnvHashMap<String, u64>,
                           display: &str,
                           aka_for: &str|
     -> Result<bool> {
        let parsed = match parse_title(display) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("not indexing {:?}: {}", display, err);
                return Ok(false);
            }
        };
        let searchable = clean_word(&parsed.name);
        for word in searchable.split(' ').filter(|w| !w.is_empty()) {
            *frequencies.entry(word.to_string()).or_insert(0) += 1;
        }
        let rated_as =
            if aka_for.is_empty() { parsed.raw.as_str() } else { aka_for };
        let nratings =
            ratings.get(rated_as).map(|r| r.nratings).unwrap_or(0);
        let tokens: String = searchable.split(' ').collect();
        let year = parsed.year.map(|y| y.to_string()).unwrap_or_default();
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}",
            tokens, year, parsed.raw, aka_for, nratings
        )
        .map_err(Error::io)?;
        Ok(true)
    };

    let mut movies = MoviesParser;
    for (title, ()) in list::lookup(&mut movies, archive, None)? {
        if write_entry(&mut out, &mut frequencies, &title, "")? {
            count += 1;
        }
    }

    // The same alternate name repeats once per region; index it once.
    let mut aka = AkaParser::default();
    let mut last: Option<(String, String)> = None;
    for (real, alternate) in list::lookup(&mut aka, archive, None)? {
        let pair = (real, alternate.name);
        if last.as_ref() == Some(&pair) {
            skipped += 1;
            continue;
        }
        if write_entry(&mut out, &mut frequencies, &pair.1, &pair.0)? {
            count += 1;
        }
        last = Some(pair);
    }
    out.flush().map_err(Error::io)?;
    drop(out);
    info!(
        "{} titles indexed ({} duplicate alternates skipped)",
        count, skipped
    );

    let mut words: Vec<(&String, &u64)> = frequencies.iter().collect();
    words.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    let mut stopwords = ChunkWriter::append(
        archive,
        "stopwords",
        DEFAULT_CHUNK_SIZE,
        true,
    )?;
    for (word, times) in words {
        stopwords.write(format!("{} {}\n", word, times).as_bytes())?;
    }
    stopwords.close()?;
    Ok(())
}

/// One accepted line of the search index.
struct Candidate {
    title: String,
    year: Option<u32>,
    aka_for: String,
    nratings: u32,
}

/// Scan the search index, yielding the lines that contain at least one
/// fingerprint and fall inside the year window.
fn scan_index(
    archive: &Path,
    wordlist: &[String],
    year: Option<u32>,
    timer: &mut Timer,
) -> Result<Vec<Candidate>> {
    let path = index_path(archive);
    let mut rdr = match open_compressed(&path) {
        Ok(rdr) => rdr,
        Err(err) => match err.kind() {
            ErrorKind::SourceMissing(_) => {
                return Err(Error::archive_invalid(format!(
                    "search index {} is missing; rebuild the archive",
                    path.display()
                )))
            }
            _ => return Err(err),
        },
    };

    let mut candidates = vec![];
    let mut raw = Vec::new();
    let mut lines = 0u64;
    loop {
        raw.clear();
        if rdr.read_until(b'\n', &mut raw).map_err(Error::io)? == 0 {
            break;
        }
        lines += 1;
        if lines % 100 == 0 {
            timer.step()?;
        }
        if !wordlist.iter().any(|w| raw.contains_str(w.as_str())) {
            continue;
        }
        let line = String::from_utf8_lossy(trim_line(&raw)).into_owned();
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 5 {
            debug!("malformed index line: {:?}", line);
            continue;
        }
        let ryear: Option<u32> = fields[1].parse().ok();
        if let (Some(qy), Some(ry)) = (year, ryear) {
            // Half-open window, biased low.
            if ry < qy.saturating_sub(DELTA_YEAR) || ry >= qy + DELTA_YEAR {
                continue;
            }
        }
        candidates.push(Candidate {
            title: fields[2].to_string(),
            year: ryear,
            aka_for: fields[3].to_string(),
            nratings: fields[4].parse().unwrap_or(0),
        });
    }
    Ok(candidates)
}

/// The popularity/recency weight applied to a candidate's similarity.
fn rank_factor(
    nratings: u32,
    stored: &str,
    result_year: Option<u32>,
    query_year: Option<u32>,
    this_year: u32,
) -> f64 {
    // Fitted popularity curve: roughly 0.92 for unrated titles, 1.0 around
    // a hundred votes, 1.2 for the most-voted blockbusters.
    let mut factor = 0.0205376 * (nratings as f64).powf(0.167496) + 0.9226;
    // Prefer movies over TV shows; mini-series pay the price too.
    if stored.starts_with('"') {
        factor *= 0.95;
    }
    match result_year {
        // A result with no known year is almost never the one wanted.
        None => factor *= 0.90,
        Some(ry) => {
            if let Some(qy) = query_year {
                if qy == this_year && ry == this_year {
                    // A release from this calendar year has had no time to
                    // gather votes; give it the benefit of the doubt.
                    factor = factor.max(1.0);
                }
                let dy = qy as f64 - ry as f64;
                factor *= (-(dy * dy) / 160.0).exp();
            }
        }
    }
    factor
}

/// Search the index for `query`, optionally near an estimated `year`.
///
/// Returns the score map keyed by stored (real) title, and the parallel
/// map naming the alternate title responsible wherever an alternate
/// produced the winning score.
pub(crate) fn search(
    archive: &Path,
    query: &str,
    year: Option<u32>,
    timeout: Option<Duration>,
) -> Result<(FnvHashMap<String, f64>, FnvHashMap<String, String>)> {
    let this_year = time::OffsetDateTime::now_utc().year() as u32;
    let mut timer = Timer::with_timeout(timeout);

    let words: Vec<&str> = query.split_whitespace().collect();
    let wordlist = subwords(&clean_words(&words), FINGERPRINT_SIZE);
    debug!("fingerprints for {:?}: {:?}", query, wordlist);

    let mut scores: FnvHashMap<String, f64> = FnvHashMap::default();
    let mut aka_scores: FnvHashMap<String, String> = FnvHashMap::default();
    if wordlist.is_empty() {
        return Ok((scores, aka_scores));
    }

    let lcquery = query.to_lowercase();
    let mut matchers = vec![SequenceMatcher::new(&lcquery)];
    if let Some(qy) = year {
        let yearstr = format!(" ({}", qy);
        if !lcquery.contains(&yearstr) {
            matchers
                .push(SequenceMatcher::new(&format!("{}{})", lcquery, yearstr)));
        }
    }

    for candidate in scan_index(archive, &wordlist, year, &mut timer)? {
        let lctitle = candidate.title.to_lowercase();
        let name = match TITLE_RE.captures(&candidate.title) {
            None => {
                debug!("unparseable index title: {:?}", candidate.title);
                continue;
            }
            Some(caps) => caps["name"].to_lowercase(),
        };
        let mut variants = vec![(1.0, lctitle), (1.0, name)];
        // Retry without the subtitle, at a penalty. Only worthwhile when a
        // year was given; otherwise "ABC (1991)" and "ABC: Revenge of the
        // DEF (1999)" would rank the same.
        if year.is_some() {
            if let Some(colon) = variants[1].1.find(':') {
                let prefix = variants[1].1[..colon].to_string();
                variants.push((0.95, prefix));
            }
        }

        let mut score = 0.0;
        let mut cutoff = CUTOFF;
        for matcher in &mut matchers {
            for (penalty, variant) in &variants {
                matcher.set_seq1(variant);
                if matcher.real_quick_ratio() > cutoff
                    && matcher.quick_ratio() > cutoff
                {
                    let ratio = matcher.ratio() * penalty;
                    if ratio > cutoff {
                        score = ratio.max(score);
                        cutoff = score;
                    }
                }
            }
        }
        if score <= 0.0 {
            continue;
        }
        timer.check_expired()?;

        let stored = if candidate.aka_for.is_empty() {
            candidate.title.clone()
        } else {
            candidate.aka_for.clone()
        };
        score *= rank_factor(
            candidate.nratings,
            &stored,
            candidate.year,
            year,
            this_year,
        );
        let best = scores.get(&stored).copied().unwrap_or(0.0);
        if score > best {
            if candidate.aka_for.is_empty() {
                aka_scores.remove(&stored);
            } else {
                aka_scores.insert(stored.clone(), candidate.title);
            }
            scores.insert(stored, score);
        }
    }
    Ok((scores, aka_scores))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleaning_drops_punctuation_and_accents() {
        assert_eq!(clean_word("Léon:"), "lon");
        assert_eq!(clean_word("WarGames"), "wargames");
        assert_eq!(clean_word("?!"), "");
    }

    #[test]
    fn single_words_are_never_stemmed() {
        assert_eq!(clean_words(&["The"]), vec!["the"]);
        assert_eq!(clean_words(&["Up"]), vec!["up"]);
    }

    #[test]
    fn stemming_drops_short_common_and_small_numbers() {
        assert_eq!(
            clean_words(&["The", "Texas", "Chainsaw", "Massacre"]),
            vec!["texas", "chainsaw", "massacre"],
        );
        assert_eq!(
            clean_words(&["Die", "Hard", "2"]),
            vec!["die", "hard"],
        );
        // Years survive the small-number rule.
        assert_eq!(
            clean_words(&["Blade", "Runner", "2049"]),
            vec!["blade", "runner", "2049"],
        );
        // If stemming leaves nothing, fall back to the unstemmed list.
        assert_eq!(clean_words(&["The", "Who"]), vec!["the", "who"]);
    }

    #[test]
    fn subwords_explode_long_words() {
        let words = vec!["les".to_string(), "miserables".to_string()];
        assert_eq!(
            subwords(&words, 5),
            vec!["les", "miser", "isera", "serab", "erabl", "rable", "ables"],
        );
    }

    #[test]
    fn popularity_factor_is_monotonic() {
        let factors: Vec<f64> = [0u32, 10, 1_000, 250_000, 1_000_000]
            .iter()
            .map(|&n| rank_factor(n, "X (2000)", Some(2000), None, 2026))
            .collect();
        for pair in factors.windows(2) {
            assert!(pair[0] <= pair[1], "{:?}", factors);
        }
        // Unrated titles fall just below 1.0, blockbusters above.
        assert!(factors[0] > 0.9 && factors[0] < 1.0);
        assert!(factors[3] > 1.0);
    }

    #[test]
    fn tv_and_yearless_penalties() {
        let base = rank_factor(100, "X (2000)", Some(2000), Some(2000), 2026);
        let tv =
            rank_factor(100, "\"X\" (2000)", Some(2000), Some(2000), 2026);
        assert!((tv / base - 0.95).abs() < 1e-9);

        let yearless = rank_factor(100, "X", None, Some(2000), 2026);
        let with_year = rank_factor(100, "X", Some(2000), None, 2026);
        assert!((yearless / with_year - 0.90).abs() < 1e-9);
    }

    #[test]
    fn year_distance_decays() {
        let same = rank_factor(0, "X (2000)", Some(2000), Some(2000), 2026);
        let off2 = rank_factor(0, "X (1998)", Some(1998), Some(2000), 2026);
        let off8 = rank_factor(0, "X (1992)", Some(1992), Some(2000), 2026);
        assert!(same > off2 && off2 > off8);
        assert!((off2 / same - (-4.0f64 / 160.0).exp()).abs() < 1e-9);
    }

    #[test]
    fn current_year_gets_benefit_of_the_doubt() {
        let factor = rank_factor(0, "X (2026)", Some(2026), Some(2026), 2026);
        assert!(factor >= 1.0);
        // Not extended to other years.
        let past = rank_factor(0, "X (1990)", Some(1990), Some(1990), 2026);
        assert!(past < 1.0);
    }
}
