/*!
This crate converts the classic IMDb plain text list files into a single
compressed archive supporting random access by logical position, and
answers approximate-title searches and on-demand attribute lookups
(rating, plot, genres, running time, certificates, cast, directors,
writers, alternate titles) against it.

The storage substrate is a chunked zip container: every list becomes a
named sub-stream of independently compressed chunks, with bookmark keys on
chunk boundaries (or a secondary index sub-stream, for lists that are not
sorted) providing approximate seek-by-key. Searching runs over a flat
sidecar index with a substring prefilter and a gestalt-similarity ranker
weighted by popularity and year proximity.

The usual round trip:

```no_run
use imdb_list_index::Imdb;

# fn example() -> imdb_list_index::Result<()> {
let imdb = Imdb::open("imdb.zip");
imdb.rebuild("/data/imdb-lists")?;

let mut results = imdb.search("war games", Some(1983), None)?;
for scored in results.as_mut_slice() {
    let score = scored.score();
    let title = scored.value_mut();
    println!("{:0.3}  {}", score, title);
    if let Some(rating) = imdb.rating(title)? {
        println!("       {}/10, {} votes", rating.score, rating.nratings);
    }
}
# Ok(())
# }
```
*/

#![deny(missing_docs)]

pub use crate::error::{Error, ErrorKind, Result};
pub use crate::imdb::{Attribute, Imdb};
pub use crate::ratio::SequenceMatcher;
pub use crate::record::{
    parse_name, parse_title, Aka, Attr, CastCredit, Certificate, ParsedName,
    ParsedTitle, Plot, Rating, Title, TitleCategory, CAST_RE, NAME_RE,
    TITLE_RE,
};
pub use crate::scored::{Scored, SearchResults};
pub use crate::util::Timer;

pub mod archive;
mod codec;
mod error;
mod imdb;
mod list;
mod ratio;
mod record;
mod scored;
mod search;
mod seek;
#[cfg(test)]
mod tests;
mod util;
