use crate::error::{Error, Result};
use crate::list::{ListMeta, ListParser, Step};
use crate::record::Rating;
use crate::util::split_whitespace_limit;

/// Parser for `ratings.list.gz`. The ratings report is sorted by title, so
/// no secondary index is needed; record keys double as chunk bookmarks.
///
/// Data rows look like
/// `      0000000125  695936   8.6  Pulp Fiction (1994)`: six characters of
/// margin, then the vote histogram, the vote count, the weighted rank and
/// the title, separated by whitespace runs. Only the first three splits are
/// taken, so interior runs of spaces in a title survive untouched. A blank
/// line ends the report (the file continues with other sections).
#[derive(Debug, Default)]
pub(crate) struct RatingParser;

/// The raw column values of one rating row. Vote counts stay textual until
/// a row is actually returned to a caller, so bystander rows with mangled
/// numbers cannot fail a scan.
#[derive(Clone, Debug)]
pub(crate) struct RawRating {
    pub distribution: String,
    pub nratings: String,
    pub score: String,
}

impl RawRating {
    /// Convert to the public record, parsing the vote count.
    pub fn into_rating(self) -> Result<Rating> {
        let nratings = self.nratings.parse().map_err(|_| {
            Error::parse(format!(
                "ratings: bad vote count {:?}",
                self.nratings
            ))
        })?;
        Ok(Rating {
            distribution: self.distribution,
            nratings,
            score: self.score,
        })
    }
}

impl ListParser for RatingParser {
    type Payload = RawRating;

    const META: ListMeta = ListMeta {
        name: "ratings",
        sources: &["ratings"],
        skip_tvvg: true,
        needs_index: false,
        required: false,
        sentinel: "MOVIE RATINGS REPORT",
        header_skip: 2,
    };

    fn parse_line(
        &mut self,
        line: &str,
        offset: u64,
    ) -> Result<Step<RawRating>> {
        if line.is_empty() {
            return Ok(Step::End);
        }
        let rest = line.get(6..).unwrap_or("");
        let fields = split_whitespace_limit(rest, 4);
        if fields.len() != 4 {
            return Err(Error::parse(format!(
                "ratings: expected distribution, votes, rank and title: {:?}",
                line
            )));
        }
        Ok(Step::Record {
            key: fields[3].to_string(),
            offset,
            payload: RawRating {
                distribution: fields[0].to_string(),
                nratings: fields[1].to_string(),
                score: fields[2].to_string(),
            },
        })
    }
}
