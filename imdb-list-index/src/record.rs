use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::error::{Error, Result};

lazy_static! {
    /// Matches an IMDb title token: a display name followed by one or more
    /// parenthesized suffixes (year, TV/V/VG/mini markers, uniquifying roman
    /// numeral), with anything after two spaces captured as trailing data.
    pub static ref TITLE_RE: Regex = Regex::new(
        r"^(?P<title>(?P<name>.+?)(?: \((?:(?P<TV>TV)|(?P<V>V)|(?P<VG>VG)|(?P<mini>mini)|(?P<year>\d{4}|\?{4})(?P<unique>/[IVXLCDM]+)?)\))+)(?P<trailing>(?:  .*)?)$"
    ).unwrap();

    /// Matches a person name written as `Last[, First][ (ROMAN)]`.
    pub static ref NAME_RE: Regex = Regex::new(
        r"^(?P<name>(?P<last>.+?)(?:, (?P<first>.+?))?(?: \((?P<unique>[IVXLCDM]+)\))*)$"
    ).unwrap();

    /// Matches the data attached to a credit line after the title:
    /// `(notes)`, `[character]` and `<billing order>`, each separated by two
    /// spaces.
    pub static ref CAST_RE: Regex = Regex::new(
        r"(?P<notes>  \(.+?\))*(?:  \[(?P<character>.+?)\])?(?:  <(?P<order>\d+)>)?(?P<trailing>.*?)$"
    ).unwrap();
}

/// The category a title belongs to, as far as it can be told from the title
/// token alone.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum TitleCategory {
    /// The title is quoted, marking a TV show.
    TvShow,
}

/// An IMDb title token broken into its components.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParsedTitle {
    /// The exact title token, quotes and suffixes included.
    pub raw: String,
    /// The display name with year/type suffixes and quotes stripped.
    pub name: String,
    /// The four-digit year, unless the token carries `(????)`.
    pub year: Option<u32>,
    /// The uniquifying suffix (e.g. `/II`) distinguishing same-name,
    /// same-year titles.
    pub unique: Option<String>,
    /// The detected category, if any.
    pub category: Option<TitleCategory>,
}

/// Parse a title token into its components.
pub fn parse_title(title: &str) -> Result<ParsedTitle> {
    let caps = TITLE_RE.captures(title).ok_or_else(|| {
        Error::parse(format!("cannot parse {:?} as an IMDb title", title))
    })?;
    if !caps["trailing"].is_empty() {
        return Err(Error::parse(format!(
            "cannot parse {:?} as an IMDb title",
            title
        )));
    }
    let mut name = caps["name"].to_string();
    let year = match caps.name("year").map(|m| m.as_str()) {
        None | Some("????") => None,
        Some(y) => y.parse().ok(),
    };
    let unique = caps.name("unique").map(|m| m.as_str().to_string());

    let mut category = None;
    if name.starts_with('"') && name.ends_with('"') && name.len() >= 2 {
        name = name[1..name.len() - 1].to_string();
        category = Some(TitleCategory::TvShow);
    }

    Ok(ParsedTitle {
        raw: title.to_string(),
        name,
        year,
        unique,
        category,
    })
}

/// An IMDb person name token broken into its components.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParsedName {
    /// The exact name token.
    pub raw: String,
    /// Given name, when the token is written `Last, First`.
    pub first: Option<String>,
    /// Family name (or the whole name for mononyms).
    pub last: String,
    /// The uniquifying roman numeral distinguishing same-name people.
    pub unique: Option<String>,
}

/// Parse a person name token into its components.
pub fn parse_name(name: &str) -> Result<ParsedName> {
    let caps = NAME_RE.captures(name).ok_or_else(|| {
        Error::parse(format!("cannot parse {:?} as an IMDb name", name))
    })?;
    Ok(ParsedName {
        raw: name.to_string(),
        first: caps.name("first").map(|m| m.as_str().to_string()),
        last: caps["last"].to_string(),
        unique: caps.name("unique").map(|m| m.as_str().to_string()),
    })
}

/// A title's rating summary.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Rating {
    /// The ten-character vote histogram glyph.
    pub distribution: String,
    /// How many votes the title has received.
    pub nratings: u32,
    /// The weighted rank, kept as its decimal string (e.g. `"8.3"`).
    pub score: String,
}

impl Default for Rating {
    /// The rating reported for titles with no rating data.
    fn default() -> Rating {
        Rating {
            distribution: ".".repeat(10),
            nratings: 0,
            score: "0".to_string(),
        }
    }
}

/// A title's plot summary.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Plot {
    /// The summary text, joined into a single line.
    pub summary: String,
    /// The summary's author. Byline extraction is not implemented; this is
    /// here so wrappers need not change shape when it is.
    pub byline: Option<String>,
}

/// An alternate (regional or translated) name for a title.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Aka {
    /// The alternate title token, year suffix included.
    pub name: String,
    /// The region annotation, parentheses included, e.g. `"(UK)"`.
    pub region: Option<String>,
}

/// A certificate assigned to a title by a ratings board.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Certificate {
    /// The certificate, e.g. `"PG-13"`.
    pub certificate: String,
    /// The country that issued it.
    pub country: String,
}

/// One person's credit on one title.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct CastCredit {
    /// The person's name token.
    pub person: String,
    /// The character played, for acting credits.
    pub character: Option<String>,
    /// The billing order. Credits without one sort last.
    pub order: Option<u32>,
    /// Parenthesized notes, e.g. `"  (uncredited)"` trimmed to
    /// `"(uncredited)"`.
    pub notes: Option<String>,
}

/// A lazily populated attribute slot on a `Title`.
///
/// `Default` records that the archive was consulted and holds no data for
/// the title, which is different from `Unset` (never asked).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Attr<T> {
    /// The attribute has not been loaded.
    Unset,
    /// The attribute was loaded and found.
    Value(T),
    /// The attribute was loaded and the archive has no data for this title.
    Default,
}

impl<T> Attr<T> {
    /// True if the attribute has not been loaded yet.
    pub fn is_unset(&self) -> bool {
        matches!(*self, Attr::Unset)
    }

    /// The loaded value, or `None` when unloaded or absent.
    pub fn get(&self) -> Option<&T> {
        match *self {
            Attr::Value(ref v) => Some(v),
            _ => None,
        }
    }
}

/// A title returned from a search, with lazily populated attributes.
///
/// The `raw` title token is the identity used everywhere: as the join key
/// against every list sub-stream and as the map key in search results.
/// Attribute slots start out unset; the engine's `populate_*` methods fill
/// them in bulk, which is much cheaper than populating titles one at a
/// time.
#[derive(Clone, Debug)]
pub struct Title {
    raw: String,
    name: String,
    year: Option<u32>,
    unique: Option<String>,
    category: Option<TitleCategory>,
    aka: Option<String>,
    pub(crate) rating: Attr<Rating>,
    pub(crate) plot: Attr<Plot>,
    pub(crate) color_info: Attr<String>,
    pub(crate) genres: Attr<Vec<String>>,
    pub(crate) running_time: Attr<u32>,
    pub(crate) certificates: Attr<Certificate>,
    pub(crate) cast: Attr<Vec<CastCredit>>,
    pub(crate) directors: Attr<Vec<CastCredit>>,
    pub(crate) writers: Attr<Vec<CastCredit>>,
    pub(crate) aka_titles: Attr<Vec<Aka>>,
}

impl Title {
    /// Create a title handle from its raw token.
    pub fn new(raw: &str) -> Result<Title> {
        let parsed = parse_title(raw)?;
        Ok(Title {
            raw: parsed.raw,
            name: parsed.name,
            year: parsed.year,
            unique: parsed.unique,
            category: parsed.category,
            aka: None,
            rating: Attr::Unset,
            plot: Attr::Unset,
            color_info: Attr::Unset,
            genres: Attr::Unset,
            running_time: Attr::Unset,
            certificates: Attr::Unset,
            cast: Attr::Unset,
            directors: Attr::Unset,
            writers: Attr::Unset,
            aka_titles: Attr::Unset,
        })
    }

    /// The exact title token, quotes and suffixes included.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The display name, without suffixes or quotes.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The title's year, if known.
    pub fn year(&self) -> Option<u32> {
        self.year
    }

    /// The uniquifying suffix, if any.
    pub fn unique(&self) -> Option<&str> {
        self.unique.as_deref()
    }

    /// The title's category, if one could be detected.
    pub fn category(&self) -> Option<TitleCategory> {
        self.category
    }

    /// The alternate name this title was found under, when a search matched
    /// it through an aka entry.
    pub fn aka(&self) -> Option<&str> {
        self.aka.as_deref()
    }

    pub(crate) fn set_aka(&mut self, aka: Option<String>) {
        self.aka = aka;
    }

    /// The rating, if loaded and present.
    pub fn rating(&self) -> Option<&Rating> {
        self.rating.get()
    }

    /// The plot summary, if loaded and present.
    pub fn plot(&self) -> Option<&Plot> {
        self.plot.get()
    }

    /// The color info value, if loaded and present.
    pub fn color_info(&self) -> Option<&str> {
        self.color_info.get().map(|s| s.as_str())
    }

    /// The sorted genre list, if loaded and present.
    pub fn genres(&self) -> Option<&[String]> {
        self.genres.get().map(|v| v.as_slice())
    }

    /// The median running time in minutes, if loaded and present.
    pub fn running_time(&self) -> Option<u32> {
        self.running_time.get().copied()
    }

    /// The certificate, if loaded and present.
    pub fn certificates(&self) -> Option<&Certificate> {
        self.certificates.get()
    }

    /// The acting credits in billing order, if loaded and present.
    pub fn cast(&self) -> Option<&[CastCredit]> {
        self.cast.get().map(|v| v.as_slice())
    }

    /// The directing credits, if loaded and present.
    pub fn directors(&self) -> Option<&[CastCredit]> {
        self.directors.get().map(|v| v.as_slice())
    }

    /// The writing credits, if loaded and present.
    pub fn writers(&self) -> Option<&[CastCredit]> {
        self.writers.get().map(|v| v.as_slice())
    }

    /// All alternate names, if loaded and present.
    pub fn aka_titles(&self) -> Option<&[Aka]> {
        self.aka_titles.get().map(|v| v.as_slice())
    }
}

impl fmt::Display for Title {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
