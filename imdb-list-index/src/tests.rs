/*!
Shared test support: temporary directories and a small fixture corpus of
list files covering every parser, plus the end-to-end search scenarios.
*/

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ErrorKind;
use crate::imdb::Imdb;
use crate::record::Title;

/// Create an error from a format!-like syntax.
macro_rules! err {
    ($($tt:tt)*) => {
        Box::<dyn std::error::Error>::from(format!($($tt)*))
    }
}

/// A convenient result type alias for test setup.
pub(crate) type Result<T> =
    std::result::Result<T, Box<dyn std::error::Error>>;

/// A simple wrapper for creating a temporary directory that is
/// automatically deleted when it's dropped.
///
/// We use this in lieu of tempfile because tempfile brings in too many
/// dependencies.
#[derive(Debug)]
pub(crate) struct TempDir(PathBuf);

impl Drop for TempDir {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.0).unwrap();
    }
}

impl TempDir {
    /// Create a new empty temporary directory under the system's
    /// configured temporary directory.
    pub fn new(prefix: &str) -> Result<TempDir> {
        use std::sync::atomic::{AtomicUsize, Ordering};

        static TRIES: usize = 100;
        static COUNTER: AtomicUsize = AtomicUsize::new(0);

        let tmpdir = std::env::temp_dir().join("imdb-list-index-test");
        for _ in 0..TRIES {
            let count = COUNTER.fetch_add(1, Ordering::SeqCst);
            let path =
                tmpdir.join(format!("{}-{}-{}", prefix, std::process::id(), count));
            if path.is_dir() {
                continue;
            }
            std::fs::create_dir_all(&path).map_err(|e| {
                err!("failed to create {}: {}", path.display(), e)
            })?;
            return Ok(TempDir(path));
        }
        Err(err!("failed to create temp dir after {} tries", TRIES))
    }

    /// Return the underlying path to this temporary directory.
    pub fn path(&self) -> &Path {
        &self.0
    }
}

const MOVIES_LIST: &str = "\
MOVIES LIST
===========

\"Some Show\" (2004)\t2004-????
\"Some Show\" (2004) {Pilot (#1.1)}\t2004
Evangelion: 3.0 You Can (Not) Redo (2012)\t2012
Some Game (2005) (VG)\t2005
The Texas Chain Saw Massacre (1974)\t1974
The Texas Chainsaw Massacre (2003)\t2003
Up (2009)\t2009
Upside Down (2012)\t2012
War Games (1984)\t1984
WarGames (1983)\t1983
--------------------------------------------------------------------------------
";

const AKA_TITLES_LIST: &str = "\
AKA TITLES LIST
===============

originally presented in this list
Evangelion: 3.0 You Can (Not) Redo (2012)
   (aka Evangelion Shin Gekijoban: Kyu (2012))\t(Japan)
   (aka Evangelion Shin Gekijoban: Kyu (2012))\t(Japan: new title)

WarGames (1983)
   (aka Juegos de guerra (1983))\t(Spain)
";

const RATINGS_LIST: &str = "\
MOVIE RATINGS REPORT

New  Distribution  Votes  Rank
      0000012111   50000   7.8  \"Some Show\" (2004)
      0000001222   40000   7.9  Evangelion: 3.0 You Can (Not) Redo (2012)
      0000012221  260000   7.5  The Texas Chain Saw Massacre (1974)
      0000000125  400000   8.3  Up (2009)
      2100000001     500   4.1  War Games (1984)
      0000001232   70000   7.1  WarGames (1983)

SUMMARY REPORT FOLLOWS
";

const PLOT_LIST: &str = "\
PLOT SUMMARIES LIST
===================

MV: Up (2009)

PL: Carl Fredricksen, a retired balloon salesman, ties thousands of
PL: balloons to his house and flies to South America.
-------------------------------------------------------------------------------
MV: Up (2009)
PL: An old man flies away.
-------------------------------------------------------------------------------
MV: WarGames (1983)
PL: A young hacker accidentally starts a war game on a military
PL: supercomputer.
-------------------------------------------------------------------------------
";

const COLOR_INFO_LIST: &str = "\
COLOR INFO LIST
===============
-----------------------------------------------------------------------------
one
two
three
\"Some Show\" (2004)\tColor
Evangelion: 3.0 You Can (Not) Redo (2012)\tColor
The Texas Chain Saw Massacre (1974)\tColor
Up (2009)\tColor
WarGames (1983)\tColor
";

const GENRES_LIST: &str = "\
8: THE GENRES LIST
==================

\"Some Show\" (2004)\tComedy
Up (2009)\tAnimation
Up (2009)\tAdventure
Up (2009)\tComedy
WarGames (1983)\tThriller
WarGames (1983)\tDrama
";

const RUNNING_TIMES_LIST: &str = "\
RUNNING TIMES LIST
==================
-----------------------------------------------------------------------------
one
two
three
The Texas Chain Saw Massacre (1974)\tUSA:83
Up (2009)\tGermany:96
Up (2009)\tJapan:2 x 90
Up (2009)\tUSA:96
WarGames (1983)\tGermany:1o7
WarGames (1983)\tUSA:114
";

const CERTIFICATES_LIST: &str = "\
CERTIFICATES LIST
=================
-----------------------------------------------------------------------------
one
two
three
The Texas Chain Saw Massacre (1974)\tUSA:R
Up (2009)\tAustralia:PG
Up (2009)\tUSA:PG
WarGames (1983)\tUSA:PG
--------------------------------------------------------------------------------
";

const ACTORS_LIST: &str = "\
THE ACTORS LIST
===============

Name\t\t\tTitles
----\t\t\t------
Broderick, Matthew\tWarGames (1983)  [David Lightman]  <1>
\t\t\tLadyhawke (1985)  [Phillipe Gaston]  <1>

Coleman, Dabney\tWarGames (1983)  [McKittrick]  <2>

-----------------------------------------------------------------------
";

const ACTRESSES_LIST: &str = "\
THE ACTRESSES LIST
==================

Name\t\t\tTitles
----\t\t\t------
Sheedy, Ally\tWarGames (1983)  [Jennifer Mack]  <3>

-----------------------------------------------------------------------
";

const DIRECTORS_LIST: &str = "\
THE DIRECTORS LIST
==================

Name\t\t\tTitles
----\t\t\t------
Badham, John\tWarGames (1983)
\t\t\tShort Circuit (1986)

Docter, Pete\tUp (2009)

-----------------------------------------------------------------------
";

const WRITERS_LIST: &str = "\
THE WRITERS LIST
================

Name\t\t\tTitles
----\t\t\t------
Docter, Pete\tUp (2009)  (screenplay)

Lasker, Lawrence\tWarGames (1983)  (written by)

Parkes, Walter F.\tWarGames (1983)  (written by)

-----------------------------------------------------------------------
";

fn write_gz(dir: &Path, name: &str, content: &str) -> Result<()> {
    let path = dir.join(format!("{}.list.gz", name));
    let file = std::fs::File::create(path)?;
    let mut enc = flate2::write::GzEncoder::new(
        file,
        flate2::Compression::default(),
    );
    // The list files are ISO-8859-1; the fixtures are plain ASCII, so a
    // byte copy is faithful.
    enc.write_all(content.as_bytes())?;
    enc.finish()?;
    Ok(())
}

/// Write the full fixture corpus of `*.list.gz` files into `dir`.
pub(crate) fn write_corpus(dir: &Path) -> Result<()> {
    write_gz(dir, "movies", MOVIES_LIST)?;
    write_gz(dir, "aka-titles", AKA_TITLES_LIST)?;
    write_gz(dir, "ratings", RATINGS_LIST)?;
    write_gz(dir, "plot", PLOT_LIST)?;
    write_gz(dir, "color-info", COLOR_INFO_LIST)?;
    write_gz(dir, "genres", GENRES_LIST)?;
    write_gz(dir, "running-times", RUNNING_TIMES_LIST)?;
    write_gz(dir, "certificates", CERTIFICATES_LIST)?;
    write_gz(dir, "actors", ACTORS_LIST)?;
    write_gz(dir, "actresses", ACTRESSES_LIST)?;
    write_gz(dir, "directors", DIRECTORS_LIST)?;
    write_gz(dir, "writers", WRITERS_LIST)?;
    Ok(())
}

/// A rebuilt archive over the fixture corpus.
#[derive(Debug)]
pub(crate) struct TestDb {
    _tmpdir: TempDir,
    pub imdb: Imdb,
}

impl TestDb {
    /// Write the corpus, rebuild an archive from it, and return an engine.
    pub fn new() -> TestDb {
        let tmpdir = TempDir::new("db").unwrap();
        let data_dir = tmpdir.path().join("lists");
        std::fs::create_dir_all(&data_dir).unwrap();
        write_corpus(&data_dir).unwrap();

        let imdb = Imdb::open(tmpdir.path().join("imdb.zip"));
        imdb.rebuild(&data_dir).unwrap();
        TestDb { _tmpdir: tmpdir, imdb }
    }
}

fn top_titles(imdb: &Imdb, query: &str, year: Option<u32>) -> Vec<String> {
    imdb.search(query, year, None)
        .unwrap()
        .into_iter()
        .map(|scored| scored.into_value().raw().to_string())
        .collect()
}

#[test]
fn rebuild_rejects_existing_archive() {
    let db = TestDb::new();
    let err = db.imdb.rebuild("/nonexistent").unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::ArchiveExists(_)));
}

#[test]
fn search_war_games_1983() {
    let db = TestDb::new();
    let results = db.imdb.search("War Games", Some(1983), None).unwrap();
    assert!(!results.is_empty());
    let top = &results.as_slice()[0];
    assert_eq!(top.value().raw(), "WarGames (1983)");
    assert!(top.score() > 0.6, "score {}", top.score());
    // The literal "War Games (1984)" loses on popularity and year.
    let titles = top_titles(&db.imdb, "War Games", Some(1983));
    assert!(titles.contains(&"War Games (1984)".to_string()));
}

#[test]
fn search_up_ranks_first() {
    let db = TestDb::new();
    let titles = top_titles(&db.imdb, "Up", None);
    assert_eq!(titles.first().map(|s| s.as_str()), Some("Up (2009)"));
}

#[test]
fn search_texas_chainsaw_1974() {
    let db = TestDb::new();
    let results = db
        .imdb
        .search("texas chainsaw massacre", Some(1974), None)
        .unwrap();
    let top = &results.as_slice()[0];
    assert_eq!(top.value().raw(), "The Texas Chain Saw Massacre (1974)");
    // Weighted by the >200k-votes popularity tier.
    assert!(top.score() > 0.9, "score {}", top.score());
    // The 2003 remake is outside the year window entirely.
    for scored in results.as_slice() {
        assert_ne!(scored.value().raw(), "The Texas Chainsaw Massacre (2003)");
    }
}

#[test]
fn search_through_alternate_title() {
    let db = TestDb::new();
    let results = db
        .imdb
        .search("Evangelion Shin Gekijoban: Kyu", Some(2012), None)
        .unwrap();
    let found = results.as_slice().iter().find(|scored| {
        scored.value().raw() == "Evangelion: 3.0 You Can (Not) Redo (2012)"
    });
    let found = found.expect("primary title reached via alternate name");
    assert_eq!(
        found.value().aka(),
        Some("Evangelion Shin Gekijoban: Kyu (2012)"),
    );
}

#[test]
fn search_casing_does_not_matter() {
    let db = TestDb::new();
    assert_eq!(
        top_titles(&db.imdb, "WARGAMES", None).first().map(|s| s.as_str()),
        Some("WarGames (1983)"),
    );
    assert_eq!(
        top_titles(&db.imdb, "wargames", None).first().map(|s| s.as_str()),
        Some("WarGames (1983)"),
    );
}

#[test]
fn search_with_no_usable_words_is_empty() {
    let db = TestDb::new();
    assert!(db.imdb.search("", None, None).unwrap().is_empty());
    assert!(db.imdb.search("?!", None, None).unwrap().is_empty());
}

#[test]
fn search_timeout_propagates() {
    let db = TestDb::new();
    let err = db
        .imdb
        .search("War Games", Some(1983), Some(Duration::ZERO))
        .unwrap_err();
    assert!(err.is_timeout());
}

#[test]
fn search_without_index_is_invalid() {
    let tmp = TempDir::new("no-index").unwrap();
    let imdb = Imdb::open(tmp.path().join("imdb.zip"));
    // An archive exists but its sidecar does not.
    let mut wtr = crate::archive::ChunkWriter::create(
        imdb.archive(),
        "movies",
        crate::archive::DEFAULT_CHUNK_SIZE,
        true,
    )
    .unwrap();
    wtr.write(b"x\ty\n").unwrap();
    wtr.close().unwrap();
    let err = imdb.search("anything", None, None).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::ArchiveInvalid(_)));
}

#[test]
fn populate_rating_scenario() {
    let db = TestDb::new();
    let mut titles = vec![Title::new("Up (2009)").unwrap()];
    db.imdb.populate_rating(&mut titles).unwrap();
    let rating = titles[0].rating().expect("rating populated");
    assert!(rating.nratings > 0);
    let score: f64 = rating.score.parse().unwrap();
    assert!((0.0..=10.0).contains(&score));
    assert_eq!(rating.score, "8.3");
    assert_eq!(rating.distribution, "0000000125");
}

#[test]
fn populate_running_time_takes_median() {
    let db = TestDb::new();
    let mut titles = vec![
        Title::new("Up (2009)").unwrap(),
        Title::new("WarGames (1983)").unwrap(),
    ];
    db.imdb.populate_running_time(&mut titles).unwrap();
    // Up: entries 96, "2 x 90" -> 2, 96; median 96.
    assert_eq!(titles[0].running_time(), Some(96));
    // WarGames: "1o7" parses to 1, plus 114; median 114.
    assert_eq!(titles[1].running_time(), Some(114));
}

#[test]
fn populate_plot_keeps_the_shortest() {
    let db = TestDb::new();
    let mut titles = vec![Title::new("Up (2009)").unwrap()];
    db.imdb.populate_plot(&mut titles).unwrap();
    let plot = titles[0].plot().expect("plot populated");
    assert_eq!(plot.summary, "An old man flies away.");
    assert_eq!(plot.byline, None);

    let mut titles = vec![Title::new("WarGames (1983)").unwrap()];
    db.imdb.populate_plot(&mut titles).unwrap();
    assert_eq!(
        titles[0].plot().unwrap().summary,
        "A young hacker accidentally starts a war game on a military \
         supercomputer.",
    );
}

#[test]
fn populate_genres_sorts() {
    let db = TestDb::new();
    let mut titles = vec![Title::new("Up (2009)").unwrap()];
    db.imdb.populate_genres(&mut titles).unwrap();
    assert_eq!(
        titles[0].genres().unwrap(),
        &["Adventure", "Animation", "Comedy"],
    );
}

#[test]
fn populate_certificates_keeps_usa() {
    let db = TestDb::new();
    let mut titles = vec![Title::new("Up (2009)").unwrap()];
    db.imdb.populate_certificates(&mut titles).unwrap();
    let cert = titles[0].certificates().unwrap();
    assert_eq!(cert.certificate, "PG");
    assert_eq!(cert.country, "USA");
}

#[test]
fn populate_color_info() {
    let db = TestDb::new();
    let mut title = Title::new("WarGames (1983)").unwrap();
    assert_eq!(db.imdb.color_info(&mut title).unwrap(), Some("Color"));
}

#[test]
fn populate_cast_in_billing_order() {
    let db = TestDb::new();
    let mut titles = vec![Title::new("WarGames (1983)").unwrap()];
    db.imdb.populate_cast(&mut titles).unwrap();
    let cast = titles[0].cast().expect("cast populated");
    let people: Vec<&str> =
        cast.iter().map(|credit| credit.person.as_str()).collect();
    assert_eq!(
        people,
        vec!["Broderick, Matthew", "Coleman, Dabney", "Sheedy, Ally"],
    );
    assert_eq!(cast[0].character.as_deref(), Some("David Lightman"));
    assert_eq!(cast[0].order, Some(1));
}

#[test]
fn populate_directors_and_writers() {
    let db = TestDb::new();
    let mut title = Title::new("WarGames (1983)").unwrap();
    let directors = db.imdb.directors(&mut title).unwrap().unwrap();
    assert_eq!(directors.len(), 1);
    assert_eq!(directors[0].person, "Badham, John");

    let writers = db.imdb.writers(&mut title).unwrap().unwrap();
    let people: Vec<&str> =
        writers.iter().map(|credit| credit.person.as_str()).collect();
    assert_eq!(people, vec!["Lasker, Lawrence", "Parkes, Walter F."]);
    assert_eq!(writers[0].notes.as_deref(), Some("  (written by)"));
}

#[test]
fn populate_aka_lists_alternates() {
    let db = TestDb::new();
    let mut title =
        Title::new("Evangelion: 3.0 You Can (Not) Redo (2012)").unwrap();
    let akas = db.imdb.aka_titles(&mut title).unwrap().unwrap();
    assert_eq!(akas.len(), 2);
    assert_eq!(akas[0].name, "Evangelion Shin Gekijoban: Kyu (2012)");
    assert_eq!(akas[0].region.as_deref(), Some("(Japan)"));
}

#[test]
fn populate_unknown_title_reads_as_absent() {
    let db = TestDb::new();
    let mut titles = vec![Title::new("Nonexistent Film (1901)").unwrap()];
    db.imdb.populate_rating(&mut titles).unwrap();
    db.imdb.populate_genres(&mut titles).unwrap();
    db.imdb.populate_cast(&mut titles).unwrap();
    assert!(titles[0].rating().is_none());
    assert!(titles[0].genres().is_none());
    assert!(titles[0].cast().is_none());
    // Populated-but-absent is distinct from never-asked.
    assert!(!titles[0].rating.is_unset());
    assert!(titles[0].plot.is_unset());
}

#[test]
fn point_lookup_matches_full_scan() {
    use std::collections::HashSet;

    let db = TestDb::new();
    let archive = db.imdb.archive();

    // An indexed parser (genres) and a bookmarked parser (ratings).
    let queries: HashSet<String> =
        ["Up (2009)".to_string(), "WarGames (1983)".to_string()]
            .into_iter()
            .collect();

    let mut parser = crate::list::GenresParser;
    let looked_up =
        crate::list::lookup(&mut parser, archive, Some(&queries)).unwrap();
    let mut parser = crate::list::GenresParser;
    let mut scanned: Vec<(String, String)> =
        crate::list::lookup(&mut parser, archive, None)
            .unwrap()
            .into_iter()
            .filter(|(key, _)| queries.contains(key))
            .collect();
    let mut looked_up = looked_up;
    looked_up.sort();
    scanned.sort();
    assert_eq!(looked_up, scanned);

    let mut parser = crate::list::RatingParser;
    let looked_up: Vec<String> =
        crate::list::lookup(&mut parser, archive, Some(&queries))
            .unwrap()
            .into_iter()
            .map(|(key, _)| key)
            .collect();
    let mut parser = crate::list::RatingParser;
    let scanned: Vec<String> =
        crate::list::lookup(&mut parser, archive, None)
            .unwrap()
            .into_iter()
            .map(|(key, _)| key)
            .filter(|key| queries.contains(key))
            .collect();
    let mut looked_up = looked_up;
    let mut scanned = scanned;
    looked_up.sort();
    scanned.sort();
    assert_eq!(looked_up, scanned);
}

#[test]
fn stopwords_sub_stream_is_written() {
    let db = TestDb::new();
    let mut rdr =
        crate::archive::ChunkReader::open(db.imdb.archive(), "stopwords")
            .unwrap();
    let mut lines = vec![];
    while let Some(line) = rdr.next_line().unwrap() {
        lines.push(String::from_utf8(line).unwrap());
    }
    assert!(!lines.is_empty());
    // Every line is "word count".
    for line in &lines {
        let mut fields = line.trim_end().split(' ');
        assert!(fields.next().is_some());
        let count: u64 = fields.next().unwrap().parse().unwrap();
        assert!(count > 0);
    }
}
