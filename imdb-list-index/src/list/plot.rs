use crate::error::{Error, Result};
use crate::list::{ListMeta, ListParser, Step};

/// Parser for `plot.list.gz`. An `MV:` line opens a record (video games
/// and TV episodes are discarded here rather than up front, because their
/// `PL:` continuation lines carry no marker of their own); `PL:` lines
/// accumulate summary text; the first other line closes the record, whose
/// offset is that of the `MV:` line so a seek re-reads the whole block.
///
/// This file is not globally sorted, so lookups require the secondary
/// index.
#[derive(Debug, Default)]
pub(crate) struct PlotParser {
    title: Option<String>,
    begin: u64,
    plot: Vec<String>,
}

impl ListParser for PlotParser {
    type Payload = String;

    const META: ListMeta = ListMeta {
        name: "plot",
        sources: &["plot"],
        skip_tvvg: false,
        needs_index: true,
        required: false,
        sentinel: "===================",
        header_skip: 1,
    };

    fn parse_line(&mut self, line: &str, offset: u64) -> Result<Step<String>> {
        let (tag, data) = if line.is_empty() {
            ("--", "")
        } else {
            (line.get(0..2).unwrap_or("--"), line.get(4..).unwrap_or(""))
        };
        if tag == "MV" {
            if data.contains("(VG)") || data.contains('{') {
                self.title = None;
            } else {
                if !self.plot.is_empty() {
                    self.plot.clear();
                    self.title = None;
                    return Err(Error::parse(format!(
                        "plot: new title before the previous summary \
                         terminated: {:?}",
                        line
                    )));
                }
                self.title = Some(data.to_string());
                self.begin = offset;
            }
            return Ok(Step::Skip);
        }
        let title = match self.title {
            None => return Ok(Step::Skip),
            Some(ref title) => title.clone(),
        };
        if tag == "PL" {
            self.plot.push(data.to_string());
            return Ok(Step::Skip);
        }
        if !self.plot.is_empty() {
            let summary = self.plot.join(" ");
            self.plot.clear();
            return Ok(Step::Record {
                key: title,
                offset: self.begin,
                payload: summary,
            });
        }
        Ok(Step::Skip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_and_terminates() {
        let mut p = PlotParser::default();
        assert!(matches!(
            p.parse_line("MV: Up (2009)", 100).unwrap(),
            Step::Skip
        ));
        assert!(matches!(
            p.parse_line("PL: A grumpy old man flies his house", 120)
                .unwrap(),
            Step::Skip
        ));
        assert!(matches!(
            p.parse_line("PL: to South America.", 160).unwrap(),
            Step::Skip
        ));
        match p.parse_line(&"-".repeat(79), 185).unwrap() {
            Step::Record { key, offset, payload } => {
                assert_eq!(key, "Up (2009)");
                assert_eq!(offset, 100);
                assert_eq!(
                    payload,
                    "A grumpy old man flies his house to South America."
                );
            }
            step => panic!("unexpected step: {:?}", step),
        }
    }

    #[test]
    fn episodes_are_discarded() {
        let mut p = PlotParser::default();
        assert!(matches!(
            p.parse_line("MV: \"Show\" (2002) {Pilot (#1.1)}", 0).unwrap(),
            Step::Skip
        ));
        assert!(matches!(
            p.parse_line("PL: An episode summary.", 40).unwrap(),
            Step::Skip
        ));
        assert!(matches!(
            p.parse_line(&"-".repeat(79), 70).unwrap(),
            Step::Skip
        ));
    }

    #[test]
    fn blank_lines_within_a_record_are_tolerated() {
        let mut p = PlotParser::default();
        p.parse_line("MV: Film (1990)", 0).unwrap();
        assert!(matches!(p.parse_line("", 20).unwrap(), Step::Skip));
        p.parse_line("PL: Something happens.", 21).unwrap();
        match p.parse_line("", 44).unwrap() {
            Step::Record { key, payload, .. } => {
                assert_eq!(key, "Film (1990)");
                assert_eq!(payload, "Something happens.");
            }
            step => panic!("unexpected step: {:?}", step),
        }
    }
}
