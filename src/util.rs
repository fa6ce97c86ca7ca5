use std::io::{self, Write};

use imdb_list_index::{
    Attribute, CastCredit, Rating, Scored, SearchResults, Title,
};
use tabwriter::TabWriter;

/// Write the given result set to the given writer as an aligned table.
pub fn write_results<W: io::Write>(
    wtr: W,
    results: &SearchResults<Title>,
) -> anyhow::Result<()> {
    let mut wtr = TabWriter::new(wtr).minwidth(4);
    writeln!(wtr, "#\tscore\ttitle\tyear\taka")?;
    for (i, scored) in results.as_slice().iter().enumerate() {
        write_result(&mut wtr, i + 1, scored)?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_result<W: io::Write>(
    mut wtr: W,
    position: usize,
    scored: &Scored<Title>,
) -> anyhow::Result<()> {
    let title = scored.value();
    writeln!(
        wtr,
        "{}\t{:0.3}\t{}\t{}\t{}",
        position,
        scored.score(),
        title.raw(),
        title
            .year()
            .map(|y| y.to_string())
            .unwrap_or("N/A".to_string()),
        title.aka().unwrap_or(""),
    )?;
    Ok(())
}

/// Render one populated attribute of a title for display, one value per
/// line. Attributes the archive has no data for render as the
/// conventional defaults.
pub fn format_attribute(attr: Attribute, title: &Title) -> String {
    match attr {
        Attribute::Rating => {
            let default = Rating::default();
            let rating = title.rating().unwrap_or(&default);
            format!("{}/10, {:>7} votes", rating.score, rating.nratings)
        }
        Attribute::Plot => match title.plot() {
            None => "(None)".to_string(),
            Some(plot) => plot.summary.clone(),
        },
        Attribute::ColorInfo => {
            title.color_info().unwrap_or("(None)").to_string()
        }
        Attribute::Genres => match title.genres() {
            None => "(None)".to_string(),
            Some(genres) => genres.join(", "),
        },
        Attribute::RunningTime => match title.running_time() {
            None => "(None)".to_string(),
            Some(minutes) => format!("{:3} minutes", minutes),
        },
        Attribute::Certificates => match title.certificates() {
            None => "(None)".to_string(),
            Some(cert) => {
                format!("{} ({})", cert.certificate, cert.country)
            }
        },
        Attribute::Cast => format_credits(title.cast()),
        Attribute::Directors => format_credits(title.directors()),
        Attribute::Writers => format_credits(title.writers()),
        Attribute::Aka => match title.aka_titles() {
            None => "(None)".to_string(),
            Some(akas) => akas
                .iter()
                .map(|aka| match aka.region {
                    None => aka.name.clone(),
                    Some(ref region) => {
                        format!("{} {}", aka.name, region)
                    }
                })
                .collect::<Vec<String>>()
                .join("\n  "),
        },
    }
}

fn format_credits(credits: Option<&[CastCredit]>) -> String {
    let credits = match credits {
        None => return "(None)".to_string(),
        Some(credits) => credits,
    };
    credits
        .iter()
        .map(format_credit)
        .collect::<Vec<String>>()
        .join("\n  ")
}

fn format_credit(credit: &CastCredit) -> String {
    let mut out = credit.person.clone();
    if let Some(ref character) = credit.character {
        out.push_str(&format!(" as {}", character));
    }
    if let Some(ref notes) = credit.notes {
        out.push_str(&format!(" {}", notes.trim()));
    }
    out
}
