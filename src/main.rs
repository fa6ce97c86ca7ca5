use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use imdb_list_index::{Attribute, Imdb, Title};
use lazy_static::lazy_static;

use crate::util::{format_attribute, write_results};

mod download;
mod logger;
mod util;

fn main() {
    if let Err(err) = try_main() {
        // A pipe error occurs when the consumer of this process's output has
        // hung up. This is a normal event, and we should quit gracefully.
        if is_pipe_error(&err) {
            process::exit(0);
        }
        eprintln!("{:?}", err);
        process::exit(1);
    }
}

fn try_main() -> anyhow::Result<()> {
    logger::init()?;
    log::set_max_level(log::LevelFilter::Info);

    let args = Args::from_matches(&app().get_matches())?;
    if args.debug {
        log::set_max_level(log::LevelFilter::Debug);
    } else if args.quiet {
        log::set_max_level(log::LevelFilter::Warn);
    }
    if args.rebuild.is_none()
        && args.searches.is_empty()
        && !args.fetch
        && args.displays.iter().all(|(_, values)| values.is_none())
    {
        anyhow::bail!("nothing to do; run with --help for usage");
    }

    if args.fetch {
        download::fetch_all(&args.data_dir)?;
    }

    let imdb = Imdb::open(&args.dbfile);
    if let Some(ref dir) = args.rebuild {
        imdb.rebuild(dir)?;
    }

    // The top hit of each search feeds any attribute flags given without
    // their own titles.
    let mut hits: Vec<Title> = vec![];
    let mut stdout = io::stdout();
    for (query, year) in &args.searches {
        let results = imdb.search(query, *year, args.timeout)?;
        write_results(&mut stdout, &results)?;
        if let Some(top) = results.into_iter().next() {
            hits.push(top.into_value());
        }
    }

    for (attr, values) in &args.displays {
        let values = match values {
            None => continue,
            Some(values) => values,
        };
        let mut titles: Vec<Title> = if values.is_empty() {
            hits.clone()
        } else {
            values
                .iter()
                .map(|v| Ok(Title::new(v)?))
                .collect::<anyhow::Result<Vec<Title>>>()?
        };
        if titles.is_empty() {
            anyhow::bail!(
                "--{} needs a TITLE argument or a preceding --search",
                attr.name().replace('_', "-"),
            );
        }
        imdb.populate(*attr, &mut titles)?;
        for title in &titles {
            writeln!(stdout, "{} for {}:", heading(*attr), title)?;
            writeln!(stdout, "  {}", format_attribute(*attr, title))?;
        }
        writeln!(stdout)?;
    }
    Ok(())
}

/// A human heading for an attribute, e.g. `Running time`.
fn heading(attr: Attribute) -> String {
    let name = attr.name().replace('_', " ");
    let mut chars = name.chars();
    match chars.next() {
        None => name,
        Some(first) => first.to_uppercase().collect::<String>()
            + chars.as_str(),
    }
}

#[derive(Debug)]
struct Args {
    dbfile: PathBuf,
    data_dir: PathBuf,
    fetch: bool,
    rebuild: Option<PathBuf>,
    searches: Vec<(String, Option<u32>)>,
    displays: Vec<(Attribute, Option<Vec<String>>)>,
    timeout: Option<Duration>,
    debug: bool,
    quiet: bool,
}

impl Args {
    fn from_matches(matches: &clap::ArgMatches) -> anyhow::Result<Args> {
        let dbfile =
            matches.value_of_os("dbfile").map(PathBuf::from).unwrap();
        let data_dir =
            matches.value_of_os("data-dir").map(PathBuf::from).unwrap();
        let rebuild = matches.value_of_os("rebuild-db").map(PathBuf::from);
        let searches = pair_years(
            matches
                .values_of_lossy("search")
                .unwrap_or_default(),
        );
        let timeout = match matches.value_of_lossy("timeout") {
            None => None,
            Some(secs) => {
                let secs: f64 = secs.parse()?;
                if !secs.is_finite() || secs < 0.0 {
                    anyhow::bail!("invalid --timeout value: {}", secs);
                }
                Some(Duration::from_secs_f64(secs))
            }
        };
        let mut displays = vec![];
        for &attr in Attribute::ALL {
            let flag = attr.name().replace('_', "-");
            let values = if matches.is_present(&flag) {
                Some(matches.values_of_lossy(&flag).unwrap_or_default())
            } else if matches.is_present("all") {
                Some(matches.values_of_lossy("all").unwrap_or_default())
            } else {
                None
            };
            displays.push((attr, values));
        }
        Ok(Args {
            dbfile,
            data_dir,
            fetch: matches.is_present("fetch"),
            rebuild,
            searches,
            displays,
            timeout,
            debug: matches.is_present("debug"),
            quiet: matches.is_present("quiet"),
        })
    }
}

/// Group raw `--search` values into `(query, year)` pairs: a bare year
/// between 1850 and 2100 attaches to the query before it rather than
/// starting a query of its own.
fn pair_years(values: Vec<String>) -> Vec<(String, Option<u32>)> {
    let mut searches: Vec<(String, Option<u32>)> = vec![];
    let mut check_for_year = false;
    for value in values {
        if check_for_year {
            if let Ok(year) = value.parse::<u32>() {
                if year > 1850 && year < 2100 {
                    searches.last_mut().unwrap().1 = Some(year);
                    check_for_year = false;
                    continue;
                }
            }
        }
        searches.push((value, None));
        check_for_year = true;
    }
    searches
}

fn app() -> clap::App<'static, 'static> {
    use clap::{App, AppSettings, Arg};

    lazy_static! {
        // clap wants all of its strings tied to a particular lifetime, but
        // we'd really like to determine some default values dynamically.
        // Using a lazy_static here is one way of safely giving a static
        // lifetime to a value that is computed at runtime.
        static ref DATA_DIR: PathBuf = env::temp_dir().join("imdb-lists");
    }

    App::new("imdb-lists")
        .version(clap::crate_version!())
        .max_term_width(100)
        .setting(AppSettings::UnifiedHelpMessage)
        .arg(Arg::with_name("dbfile")
             .long("dbfile")
             .env("IMDB_LISTS_DBFILE")
             .takes_value(true)
             .default_value("imdb.zip")
             .help("The archive file to build or query."))
        .arg(Arg::with_name("data-dir")
             .long("data-dir")
             .env("IMDB_LISTS_DATA_DIR")
             .takes_value(true)
             .default_value_os(DATA_DIR.as_os_str())
             .help("The location to store downloaded list files."))
        .arg(Arg::with_name("fetch")
             .long("fetch")
             .help("Download any missing list files into the data \
                    directory and exit (or continue with --rebuild-db)."))
        .arg(Arg::with_name("rebuild-db")
             .long("rebuild-db")
             .takes_value(true)
             .value_name("DIR")
             .help("Rebuild the archive from the list files in DIR. \
                    Fails if the archive already exists."))
        .arg(Arg::with_name("search")
             .long("search")
             .takes_value(true)
             .multiple(true)
             .value_name("QUERY")
             .help("Search the archive. A bare year after a query is \
                    used as that query's estimated year."))
        .arg(Arg::with_name("timeout")
             .long("timeout")
             .takes_value(true)
             .value_name("SECS")
             .help("Abort a search after this many seconds."))
        .arg(Arg::with_name("rating")
             .long("rating")
             .takes_value(true)
             .multiple(true)
             .min_values(0)
             .value_name("TITLE")
             .help("Display ratings for TITLEs (or the top search hits)."))
        .arg(Arg::with_name("plot")
             .long("plot")
             .takes_value(true)
             .multiple(true)
             .min_values(0)
             .value_name("TITLE")
             .help("Display plot summaries."))
        .arg(Arg::with_name("color-info")
             .long("color-info")
             .takes_value(true)
             .multiple(true)
             .min_values(0)
             .value_name("TITLE")
             .help("Display color info."))
        .arg(Arg::with_name("genres")
             .long("genres")
             .takes_value(true)
             .multiple(true)
             .min_values(0)
             .value_name("TITLE")
             .help("Display genres."))
        .arg(Arg::with_name("running-time")
             .long("running-time")
             .takes_value(true)
             .multiple(true)
             .min_values(0)
             .value_name("TITLE")
             .help("Display running times."))
        .arg(Arg::with_name("certificates")
             .long("certificates")
             .takes_value(true)
             .multiple(true)
             .min_values(0)
             .value_name("TITLE")
             .help("Display certificates."))
        .arg(Arg::with_name("cast")
             .long("cast")
             .takes_value(true)
             .multiple(true)
             .min_values(0)
             .value_name("TITLE")
             .help("Display cast."))
        .arg(Arg::with_name("directors")
             .long("directors")
             .takes_value(true)
             .multiple(true)
             .min_values(0)
             .value_name("TITLE")
             .help("Display directors."))
        .arg(Arg::with_name("writers")
             .long("writers")
             .takes_value(true)
             .multiple(true)
             .min_values(0)
             .value_name("TITLE")
             .help("Display writers."))
        .arg(Arg::with_name("aka")
             .long("aka")
             .takes_value(true)
             .multiple(true)
             .min_values(0)
             .value_name("TITLE")
             .help("Display alternate titles."))
        .arg(Arg::with_name("all")
             .long("all")
             .takes_value(true)
             .multiple(true)
             .min_values(0)
             .value_name("TITLE")
             .help("Display all information."))
        .arg(Arg::with_name("debug")
             .long("debug")
             .help("Show debug messages. Use this when filing bugs."))
        .arg(Arg::with_name("quiet")
             .long("quiet")
             .conflicts_with("debug")
             .help("Only print warnings and errors."))
}

/// Return true if and only if an I/O broken pipe error exists in the causal
/// chain of the given error.
fn is_pipe_error(err: &anyhow::Error) -> bool {
    for cause in err.chain() {
        if let Some(ioerr) = cause.downcast_ref::<io::Error>() {
            if ioerr.kind() == io::ErrorKind::BrokenPipe {
                return true;
            }
        }
    }
    false
}
