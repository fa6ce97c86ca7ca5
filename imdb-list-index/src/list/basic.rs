use crate::error::{Error, Result};
use crate::list::{ListMeta, ListParser, Step};
use crate::record::Certificate;

/// The 77-dash rule that ends the header of the basic-format lists.
const HEADER_RULE: &str =
    "-----------------------------------------------------------------------------";

/// The 80-dash rule that ends the certificates data section.
const FOOTER: &str = "--------------------------------------------------------------------------------";

/// Split a basic-format data line on tab runs: title column, value column.
/// Lines with fewer than two columns (including separator rules) carry no
/// data. Some running-times entries genuinely have no value.
fn split_columns(line: &str) -> Vec<&str> {
    line.split('\t').filter(|field| !field.is_empty()).collect()
}

fn basic_parse(line: &str, offset: u64) -> Step<String> {
    let fields = split_columns(line);
    if fields.len() < 2 {
        return Step::Skip;
    }
    Step::Record {
        key: fields[0].to_string(),
        offset,
        payload: fields[1].to_string(),
    }
}

/// Parser for `color-info.list.gz`. The file is sorted, so bookmarks
/// suffice; duplicate entries collapse last-write-wins at lookup time.
#[derive(Debug, Default)]
pub(crate) struct ColorInfoParser;

impl ListParser for ColorInfoParser {
    type Payload = String;

    const META: ListMeta = ListMeta {
        name: "color-info",
        sources: &["color-info"],
        skip_tvvg: true,
        needs_index: false,
        required: false,
        sentinel: HEADER_RULE,
        header_skip: 3,
    };

    fn parse_line(&mut self, line: &str, offset: u64) -> Result<Step<String>> {
        Ok(basic_parse(line, offset))
    }
}

/// Parser for `genres.list.gz`. Titles repeat, one line per genre, so an
/// index is required; lookups return the sorted genre list per title.
#[derive(Debug, Default)]
pub(crate) struct GenresParser;

impl ListParser for GenresParser {
    type Payload = String;

    const META: ListMeta = ListMeta {
        name: "genres",
        sources: &["genres"],
        skip_tvvg: true,
        needs_index: true,
        required: false,
        sentinel: "8: THE GENRES LIST",
        header_skip: 2,
    };

    fn parse_line(&mut self, line: &str, offset: u64) -> Result<Step<String>> {
        Ok(basic_parse(line, offset))
    }
}

/// Parser for `running-times.list.gz`. Titles repeat, one line per
/// country, so an index is required; the values need further digestion
/// (see `parse_duration`) and lookups report the median across entries.
#[derive(Debug, Default)]
pub(crate) struct RunningTimesParser;

impl ListParser for RunningTimesParser {
    type Payload = String;

    const META: ListMeta = ListMeta {
        name: "running-times",
        sources: &["running-times"],
        skip_tvvg: true,
        needs_index: true,
        required: false,
        sentinel: HEADER_RULE,
        header_skip: 3,
    };

    fn parse_line(&mut self, line: &str, offset: u64) -> Result<Step<String>> {
        Ok(basic_parse(line, offset))
    }
}

/// Digest a running-times value of the form `[COUNTRY:]DURATION[:EXTRA]`
/// into `(minutes, country)`.
///
/// The list carries plenty of near-numeric garbage (`"54 min."`, `"1o7"`,
/// `"2 1/2"`, `"2 x 90"`); only the leading digits count, matching what
/// the IMDb site itself displays. A value with no leading digits yields no
/// duration at all.
pub(crate) fn parse_duration(value: &str) -> (Option<u32>, Option<String>) {
    let (country, duration) = match value.chars().next() {
        Some(c) if c.is_ascii_digit() => (None, value),
        _ => match value.split_once(':') {
            Some((country, rest)) => (Some(country.to_string()), rest),
            None => (None, ""),
        },
    };
    let duration = duration.trim();
    let digits: &str = match duration.find(|c: char| !c.is_ascii_digit()) {
        None => duration,
        Some(end) => &duration[..end],
    };
    (digits.parse().ok(), country)
}

/// Parser for `certificates.list.gz`. Sorted, so bookmarks suffice. Only
/// USA certificates are retained; the rest of the world's entries are
/// skipped at parse time so they never count against a lookup.
#[derive(Debug, Default)]
pub(crate) struct CertificatesParser;

/// The countries whose certificates are retained.
const COUNTRIES: &[&str] = &["USA"];

impl ListParser for CertificatesParser {
    type Payload = Certificate;

    const META: ListMeta = ListMeta {
        name: "certificates",
        sources: &["certificates"],
        skip_tvvg: true,
        needs_index: false,
        required: false,
        sentinel: HEADER_RULE,
        header_skip: 3,
    };

    fn parse_line(
        &mut self,
        line: &str,
        offset: u64,
    ) -> Result<Step<Certificate>> {
        let fields = split_columns(line);
        if fields.len() < 2 {
            if line == FOOTER {
                return Ok(Step::End);
            }
            return Err(Error::parse(format!(
                "certificates: expected title and certificate: {:?}",
                line
            )));
        }
        let (country, certificate) = match fields[1].split_once(':') {
            None => return Ok(Step::Skip),
            Some(split) => split,
        };
        if !COUNTRIES.contains(&country) {
            return Ok(Step::Skip);
        }
        Ok(Step::Record {
            key: fields[0].to_string(),
            offset,
            payload: Certificate {
                certificate: certificate.to_string(),
                country: country.to_string(),
            },
        })
    }
}
