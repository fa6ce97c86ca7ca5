use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, Instant};

use fnv::FnvHashMap;
use log::{debug, error, info};

use crate::error::{Error, Result};
use crate::list::{
    self, AkaParser, CastParser, CertificatesParser, ColorInfoParser,
    DirectorsParser, GenresParser, ListParser, MoviesParser, PlotParser,
    RatingParser, RunningTimesParser, WritersParser,
};
use crate::record::{Aka, Attr, CastCredit, Certificate, Plot, Rating, Title};
use crate::scored::{Scored, SearchResults};
use crate::search;
use crate::util::NiceDuration;

/// How many results a search returns at most.
const NUM_RESULTS: usize = 30;

/// The main interface to an archived copy of the IMDb list files.
///
/// An engine is a handle on an archive path; opening one does no I/O.
/// `rebuild` converts a directory of raw `*.list.gz` files into the
/// archive (plus its search index sidecar), after which `search` answers
/// approximate-title queries and the `populate_*` family loads attributes
/// for any set of titles in one pass over the relevant sub-stream.
#[derive(Clone, Debug)]
pub struct Imdb {
    archive: PathBuf,
}

impl Imdb {
    /// Create an engine for the archive at `path`. The archive need not
    /// exist yet; `rebuild` creates it.
    pub fn open<P: AsRef<Path>>(path: P) -> Imdb {
        Imdb { archive: path.as_ref().to_path_buf() }
    }

    /// The path of the archive this engine reads.
    pub fn archive(&self) -> &Path {
        &self.archive
    }

    /// Convert the raw list files in `source_dir` into the archive and
    /// build the search index.
    ///
    /// Fails with `ArchiveExists` if the archive is already present: a
    /// rebuild always starts from scratch. A list file that is missing or
    /// malformed is logged and skipped (its attribute will read as absent),
    /// except `movies.list.gz`, which the search index cannot exist
    /// without.
    pub fn rebuild<P: AsRef<Path>>(&self, source_dir: P) -> Result<()> {
        let source_dir = source_dir.as_ref();
        if self.archive.exists() {
            return Err(Error::archive_exists(&self.archive));
        }

        self.ingest::<MoviesParser>(source_dir)?;
        self.ingest_optional::<AkaParser>(source_dir);
        self.ingest_optional::<RatingParser>(source_dir);
        self.ingest_optional::<PlotParser>(source_dir);
        self.ingest_optional::<ColorInfoParser>(source_dir);
        self.ingest_optional::<GenresParser>(source_dir);
        self.ingest_optional::<RunningTimesParser>(source_dir);
        self.ingest_optional::<CertificatesParser>(source_dir);
        self.ingest_optional::<CastParser>(source_dir);
        self.ingest_optional::<DirectorsParser>(source_dir);
        self.ingest_optional::<WritersParser>(source_dir);

        info!("creating search index...");
        let start = Instant::now();
        search::create_index(&self.archive)?;
        info!("created search index (took {})", NiceDuration::since(start));
        Ok(())
    }

    fn ingest<P: ListParser + Default>(
        &self,
        source_dir: &Path,
    ) -> Result<()> {
        info!("indexing {}...", P::META.name);
        let start = Instant::now();
        let mut parser = P::default();
        list::rebuild_list(&mut parser, &self.archive, source_dir)?;
        info!(
            "indexed {} (took {})",
            P::META.name,
            NiceDuration::since(start)
        );
        Ok(())
    }

    fn ingest_optional<P: ListParser + Default>(&self, source_dir: &Path) {
        if let Err(err) = self.ingest::<P>(source_dir) {
            error!("skipping {}: {}", P::META.name, err);
        }
    }

    /// Search for titles approximately matching `query`, optionally near
    /// an estimated `year`, returning up to 30 scored titles in
    /// descending score order.
    ///
    /// A query with no usable words, or one matching nothing, returns an
    /// empty result set. If `timeout` elapses mid-scan the search fails
    /// with a `Timeout` error and partial results are discarded.
    pub fn search(
        &self,
        query: &str,
        year: Option<u32>,
        timeout: Option<Duration>,
    ) -> Result<SearchResults<Title>> {
        let (scores, mut aka) =
            search::search(&self.archive, query, year, timeout)?;
        let mut ranked: Vec<(String, f64)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1).unwrap().then_with(|| a.0.cmp(&b.0))
        });
        ranked.truncate(NUM_RESULTS);

        let mut results = SearchResults::new();
        for (raw, score) in ranked {
            let mut title = Title::new(&raw)?;
            title.set_aka(aka.remove(&raw));
            results.push(Scored::new(title).with_score(score));
        }
        Ok(results)
    }

    /// Load ratings for all of `titles` in one pass.
    pub fn populate_rating(&self, titles: &mut [Title]) -> Result<()> {
        let queries = query_set(titles);
        let mut parser = RatingParser;
        let rows = list::lookup(&mut parser, &self.archive, Some(&queries))?;
        let mut map: FnvHashMap<String, Rating> = FnvHashMap::default();
        for (key, raw) in rows {
            match raw.into_rating() {
                Ok(rating) => {
                    map.insert(key, rating);
                }
                Err(err) => debug!("skipping rating for {}: {}", key, err),
            }
        }
        for title in titles {
            title.rating = value_or_default(map.remove(title.raw()));
        }
        Ok(())
    }

    /// Load plot summaries for all of `titles` in one pass. When several
    /// summaries exist for a title, the shortest is kept.
    pub fn populate_plot(&self, titles: &mut [Title]) -> Result<()> {
        let queries = query_set(titles);
        let mut parser = PlotParser::default();
        let rows = list::lookup(&mut parser, &self.archive, Some(&queries))?;
        let mut map: FnvHashMap<String, String> = FnvHashMap::default();
        for (key, summary) in rows {
            match map.get(&key) {
                Some(existing) if existing.len() <= summary.len() => {}
                _ => {
                    map.insert(key, summary);
                }
            }
        }
        for title in titles {
            title.plot =
                value_or_default(map.remove(title.raw()).map(|summary| {
                    Plot { summary, byline: None }
                }));
        }
        Ok(())
    }

    /// Load color info for all of `titles` in one pass.
    pub fn populate_color_info(&self, titles: &mut [Title]) -> Result<()> {
        let queries = query_set(titles);
        let mut parser = ColorInfoParser;
        let rows = list::lookup(&mut parser, &self.archive, Some(&queries))?;
        let mut map = list::into_map(rows);
        for title in titles {
            title.color_info = value_or_default(map.remove(title.raw()));
        }
        Ok(())
    }

    /// Load the sorted genre lists for all of `titles` in one pass.
    pub fn populate_genres(&self, titles: &mut [Title]) -> Result<()> {
        let queries = query_set(titles);
        let mut parser = GenresParser;
        let rows = list::lookup(&mut parser, &self.archive, Some(&queries))?;
        let mut map = list::into_multimap(rows);
        for genres in map.values_mut() {
            genres.sort();
        }
        for title in titles {
            title.genres = value_or_default(map.remove(title.raw()));
        }
        Ok(())
    }

    /// Load running times for all of `titles` in one pass, reporting the
    /// median across a title's per-country entries.
    pub fn populate_running_time(&self, titles: &mut [Title]) -> Result<()> {
        let queries = query_set(titles);
        let mut parser = RunningTimesParser;
        let rows = list::lookup(&mut parser, &self.archive, Some(&queries))?;
        let map = list::into_multimap(rows);
        let mut medians: FnvHashMap<String, Option<u32>> =
            FnvHashMap::default();
        for (key, values) in map {
            let mut durations: Vec<Option<u32>> = values
                .iter()
                .map(|value| list::parse_duration(value).0)
                .collect();
            durations.sort();
            let median = durations[durations.len() / 2];
            medians.insert(key, median);
        }
        for title in titles {
            title.running_time =
                value_or_default(medians.remove(title.raw()).flatten());
        }
        Ok(())
    }

    /// Load USA certificates for all of `titles` in one pass.
    pub fn populate_certificates(&self, titles: &mut [Title]) -> Result<()> {
        let queries = query_set(titles);
        let mut parser = CertificatesParser;
        let rows = list::lookup(&mut parser, &self.archive, Some(&queries))?;
        let mut map = list::into_map(rows);
        for title in titles {
            title.certificates = value_or_default(map.remove(title.raw()));
        }
        Ok(())
    }

    /// Load acting credits for all of `titles` in one pass, in billing
    /// order.
    pub fn populate_cast(&self, titles: &mut [Title]) -> Result<()> {
        let map = self.credits::<CastParser>(titles)?;
        assign_credits(titles, map, |title| &mut title.cast);
        Ok(())
    }

    /// Load directing credits for all of `titles` in one pass.
    pub fn populate_directors(&self, titles: &mut [Title]) -> Result<()> {
        let map = self.credits::<DirectorsParser>(titles)?;
        assign_credits(titles, map, |title| &mut title.directors);
        Ok(())
    }

    /// Load writing credits for all of `titles` in one pass.
    pub fn populate_writers(&self, titles: &mut [Title]) -> Result<()> {
        let map = self.credits::<WritersParser>(titles)?;
        assign_credits(titles, map, |title| &mut title.writers);
        Ok(())
    }

    /// Load all alternate names for all of `titles` in one pass.
    pub fn populate_aka(&self, titles: &mut [Title]) -> Result<()> {
        let queries = query_set(titles);
        let mut parser = AkaParser::default();
        let rows = list::lookup(&mut parser, &self.archive, Some(&queries))?;
        let mut map = list::into_multimap(rows);
        for title in titles {
            title.aka_titles = value_or_default(map.remove(title.raw()));
        }
        Ok(())
    }

    fn credits<P>(
        &self,
        titles: &[Title],
    ) -> Result<FnvHashMap<String, Vec<CastCredit>>>
    where
        P: ListParser<Payload = CastCredit> + Default,
    {
        let queries = query_set(titles);
        let mut parser = P::default();
        let rows = list::lookup(&mut parser, &self.archive, Some(&queries))?;
        let mut map = list::into_multimap(rows);
        for credits in map.values_mut() {
            list::sort_credits(credits);
        }
        Ok(map)
    }

    /// Load one attribute for all of `titles`, dispatching through the
    /// attribute registry.
    pub fn populate(
        &self,
        attr: Attribute,
        titles: &mut [Title],
    ) -> Result<()> {
        match attr {
            Attribute::Rating => self.populate_rating(titles),
            Attribute::Plot => self.populate_plot(titles),
            Attribute::ColorInfo => self.populate_color_info(titles),
            Attribute::Genres => self.populate_genres(titles),
            Attribute::RunningTime => self.populate_running_time(titles),
            Attribute::Certificates => self.populate_certificates(titles),
            Attribute::Cast => self.populate_cast(titles),
            Attribute::Directors => self.populate_directors(titles),
            Attribute::Writers => self.populate_writers(titles),
            Attribute::Aka => self.populate_aka(titles),
        }
    }

    /// The rating of one title, populating it on first access.
    pub fn rating<'t>(
        &self,
        title: &'t mut Title,
    ) -> Result<Option<&'t Rating>> {
        if title.rating.is_unset() {
            self.populate_rating(std::slice::from_mut(title))?;
        }
        Ok(title.rating.get())
    }

    /// The plot of one title, populating it on first access.
    pub fn plot<'t>(&self, title: &'t mut Title) -> Result<Option<&'t Plot>> {
        if title.plot.is_unset() {
            self.populate_plot(std::slice::from_mut(title))?;
        }
        Ok(title.plot.get())
    }

    /// The color info of one title, populating it on first access.
    pub fn color_info<'t>(
        &self,
        title: &'t mut Title,
    ) -> Result<Option<&'t str>> {
        if title.color_info.is_unset() {
            self.populate_color_info(std::slice::from_mut(title))?;
        }
        Ok(title.color_info())
    }

    /// The genres of one title, populating them on first access.
    pub fn genres<'t>(
        &self,
        title: &'t mut Title,
    ) -> Result<Option<&'t [String]>> {
        if title.genres.is_unset() {
            self.populate_genres(std::slice::from_mut(title))?;
        }
        Ok(title.genres())
    }

    /// The median running time of one title, populating it on first
    /// access.
    pub fn running_time(&self, title: &mut Title) -> Result<Option<u32>> {
        if title.running_time.is_unset() {
            self.populate_running_time(std::slice::from_mut(title))?;
        }
        Ok(title.running_time())
    }

    /// The certificate of one title, populating it on first access.
    pub fn certificates<'t>(
        &self,
        title: &'t mut Title,
    ) -> Result<Option<&'t Certificate>> {
        if title.certificates.is_unset() {
            self.populate_certificates(std::slice::from_mut(title))?;
        }
        Ok(title.certificates())
    }

    /// The cast of one title, populating it on first access.
    pub fn cast<'t>(
        &self,
        title: &'t mut Title,
    ) -> Result<Option<&'t [CastCredit]>> {
        if title.cast.is_unset() {
            self.populate_cast(std::slice::from_mut(title))?;
        }
        Ok(title.cast())
    }

    /// The directors of one title, populating them on first access.
    pub fn directors<'t>(
        &self,
        title: &'t mut Title,
    ) -> Result<Option<&'t [CastCredit]>> {
        if title.directors.is_unset() {
            self.populate_directors(std::slice::from_mut(title))?;
        }
        Ok(title.directors())
    }

    /// The writers of one title, populating them on first access.
    pub fn writers<'t>(
        &self,
        title: &'t mut Title,
    ) -> Result<Option<&'t [CastCredit]>> {
        if title.writers.is_unset() {
            self.populate_writers(std::slice::from_mut(title))?;
        }
        Ok(title.writers())
    }

    /// The alternate names of one title, populating them on first access.
    pub fn aka_titles<'t>(
        &self,
        title: &'t mut Title,
    ) -> Result<Option<&'t [Aka]>> {
        if title.aka_titles.is_unset() {
            self.populate_aka(std::slice::from_mut(title))?;
        }
        Ok(title.aka_titles())
    }
}

fn query_set(titles: &[Title]) -> HashSet<String> {
    titles.iter().map(|title| title.raw().to_string()).collect()
}

fn value_or_default<T>(value: Option<T>) -> Attr<T> {
    match value {
        Some(value) => Attr::Value(value),
        None => Attr::Default,
    }
}

fn assign_credits<F>(
    titles: &mut [Title],
    mut map: FnvHashMap<String, Vec<CastCredit>>,
    slot: F,
) where
    F: Fn(&mut Title) -> &mut Attr<Vec<CastCredit>>,
{
    for title in titles {
        let value = map.remove(title.raw());
        *slot(title) = value_or_default(value);
    }
}

/// The populatable attributes, as a static registry. All per-attribute
/// plumbing (CLI flags, bulk dispatch) flows from this table.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Attribute {
    /// The rating histogram, vote count and rank.
    Rating,
    /// The (shortest) plot summary.
    Plot,
    /// Color or black-and-white.
    ColorInfo,
    /// The sorted genre list.
    Genres,
    /// The median running time in minutes.
    RunningTime,
    /// The USA certificate.
    Certificates,
    /// Acting credits, in billing order.
    Cast,
    /// Directing credits.
    Directors,
    /// Writing credits.
    Writers,
    /// Alternate titles.
    Aka,
}

impl Attribute {
    /// Every populatable attribute, in display order.
    pub const ALL: &'static [Attribute] = &[
        Attribute::Rating,
        Attribute::Plot,
        Attribute::ColorInfo,
        Attribute::Genres,
        Attribute::RunningTime,
        Attribute::Certificates,
        Attribute::Cast,
        Attribute::Directors,
        Attribute::Writers,
        Attribute::Aka,
    ];

    /// The attribute's snake_case name.
    pub fn name(&self) -> &'static str {
        match *self {
            Attribute::Rating => "rating",
            Attribute::Plot => "plot",
            Attribute::ColorInfo => "color_info",
            Attribute::Genres => "genres",
            Attribute::RunningTime => "running_time",
            Attribute::Certificates => "certificates",
            Attribute::Cast => "cast",
            Attribute::Directors => "directors",
            Attribute::Writers => "writers",
            Attribute::Aka => "aka",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Attribute {
    type Err = Error;

    fn from_str(s: &str) -> Result<Attribute> {
        let normalized = s.replace('-', "_");
        for &attr in Attribute::ALL {
            if attr.name() == normalized {
                return Ok(attr);
            }
        }
        Err(Error::parse(format!("unknown attribute: {:?}", s)))
    }
}
