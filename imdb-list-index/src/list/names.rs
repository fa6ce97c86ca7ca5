use crate::error::{Error, Result};
use crate::list::{ListMeta, ListParser, Step};
use crate::record::{CastCredit, CAST_RE, TITLE_RE};

/// The header rule shared by all names-format lists: the underline row of
/// the `Name ... Titles` column headings.
const SENTINEL: &str = "----\t\t\t------";

/// Shared line logic for the names-format lists (actors, actresses,
/// directors, writers).
///
/// A person's block starts at an unindented `person<TAB>credit` line;
/// tab-indented lines add further credits for the same person. Records are
/// keyed by the credited *title* and carry the block's starting offset, so
/// a seek lands at the top of the person's block and replays it. Blank
/// lines end the block; a long all-dash rule ends the data.
#[derive(Debug, Default)]
struct People {
    person: Option<(String, u64)>,
}

impl People {
    fn parse_line(
        &mut self,
        list: &str,
        line: &str,
        offset: u64,
    ) -> Result<Step<CastCredit>> {
        if line.is_empty() {
            self.person = None;
            return Ok(Step::Skip);
        }
        let mut credit = line;
        if !line.starts_with('\t') {
            if line.len() > 60 && line.chars().all(|c| c == '-') {
                return Ok(Step::End);
            }
            let (person, rest) = line.split_once('\t').ok_or_else(|| {
                Error::parse(format!(
                    "{}: expected person and credit: {:?}",
                    list, line
                ))
            })?;
            self.person = Some((person.to_string(), offset));
            credit = rest;
        }
        let credit = credit.trim();
        // Video games and TV episodes are filtered per credit line, since a
        // person's block may mix them with film credits.
        if credit.contains("(VG)") || credit.contains('{') {
            return Ok(Step::Skip);
        }
        let (person, person_offset) = self.person.clone().ok_or_else(|| {
            Error::parse(format!(
                "{}: credit with no current person: {:?}",
                list, line
            ))
        })?;
        let caps = TITLE_RE.captures(credit).ok_or_else(|| {
            Error::parse(format!(
                "{}: cannot extract title from {:?}",
                list, credit
            ))
        })?;
        let title = caps["title"].to_string();
        let suffix = CAST_RE
            .captures(caps.name("trailing").map_or("", |m| m.as_str()))
            .ok_or_else(|| {
                Error::parse(format!(
                    "{}: cannot extract casting from {:?}",
                    list, credit
                ))
            })?;
        let order = match suffix.name("order") {
            None => None,
            Some(m) => Some(m.as_str().parse().map_err(|_| {
                Error::parse(format!(
                    "{}: bad billing order in {:?}",
                    list, credit
                ))
            })?),
        };
        Ok(Step::Record {
            key: title,
            offset: person_offset,
            payload: CastCredit {
                person,
                character: suffix
                    .name("character")
                    .map(|m| m.as_str().to_string()),
                order,
                notes: suffix.name("notes").map(|m| m.as_str().to_string()),
            },
        })
    }
}

macro_rules! names_parser {
    ($(#[$doc:meta])* $name:ident, $list:expr, $sources:expr) => {
        $(#[$doc])*
        #[derive(Debug, Default)]
        pub(crate) struct $name {
            people: People,
        }

        impl ListParser for $name {
            type Payload = CastCredit;

            const META: ListMeta = ListMeta {
                name: $list,
                sources: $sources,
                skip_tvvg: false,
                needs_index: true,
                required: false,
                sentinel: SENTINEL,
                header_skip: 0,
            };

            fn parse_line(
                &mut self,
                line: &str,
                offset: u64,
            ) -> Result<Step<CastCredit>> {
                self.people.parse_line($list, line, offset)
            }
        }
    };
}

names_parser!(
    /// Parser for the merged `actors.list.gz` and `actresses.list.gz`.
    /// Merging two files is exactly why the index is mandatory here: the
    /// combined stream is not sorted.
    CastParser,
    "cast",
    &["actors", "actresses"]
);

names_parser!(
    /// Parser for `directors.list.gz`.
    DirectorsParser,
    "directors",
    &["directors"]
);

names_parser!(
    /// Parser for `writers.list.gz`.
    WritersParser,
    "writers",
    &["writers"]
);

/// Sort a title's credits into billing order; credits without an order
/// sort after the ones with one.
pub(crate) fn sort_credits(credits: &mut [CastCredit]) {
    credits.sort_by_key(|credit| credit.order.unwrap_or(9999));
}
