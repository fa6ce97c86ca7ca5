use crate::error::{Error, Result};
use crate::list::{ListMeta, ListParser, Step};

/// The footer terminating the movies data section.
const FOOTER: &str = "--------------------------------------------------------------------------------";

/// Parser for `movies.list.gz`, the canonical roll of title tokens. Each
/// data line is the title token, a tab run, and the year; only the token
/// matters here. This is the one list every archive must have, since the
/// search index is built from it.
#[derive(Debug, Default)]
pub(crate) struct MoviesParser;

impl ListParser for MoviesParser {
    type Payload = ();

    const META: ListMeta = ListMeta {
        name: "movies",
        sources: &["movies"],
        skip_tvvg: true,
        needs_index: false,
        required: true,
        sentinel: "===========",
        header_skip: 1,
    };

    fn parse_line(&mut self, line: &str, offset: u64) -> Result<Step<()>> {
        match line.split_once('\t') {
            Some((title, _)) => Ok(Step::Record {
                key: title.to_string(),
                offset,
                payload: (),
            }),
            None if line == FOOTER => Ok(Step::End),
            None => Err(Error::parse(format!(
                "movies: expected a tab-separated line, got {:?}",
                line
            ))),
        }
    }
}
