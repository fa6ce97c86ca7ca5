use crate::error::{Error, Result};
use crate::list::{ListMeta, ListParser, Step};
use crate::record::Aka;

/// Parser for `aka-titles.list.gz`. A title token at column zero opens an
/// entry; the indented `   (aka ...)` lines that follow each name an
/// alternate title, optionally annotated with a region. Blank lines close
/// the entry. Records are keyed by the *real* title and carry the offset
/// of its opening line, so a lookup seek replays the whole entry rather
/// than landing mid-block with no current title.
#[derive(Debug, Default)]
pub(crate) struct AkaParser {
    current: Option<(String, u64)>,
}

impl ListParser for AkaParser {
    type Payload = Aka;

    const META: ListMeta = ListMeta {
        name: "aka-titles",
        sources: &["aka-titles"],
        skip_tvvg: true,
        needs_index: true,
        required: false,
        sentinel: "===============",
        header_skip: 2,
    };

    fn parse_line(&mut self, line: &str, offset: u64) -> Result<Step<Aka>> {
        if line.is_empty() {
            self.current = None;
            return Ok(Step::Skip);
        }
        if let Some(rest) = line.strip_prefix("   (aka ") {
            let (current, begin) = self.current.clone().ok_or_else(|| {
                Error::parse(format!(
                    "aka-titles: alternate name with no current title: {:?}",
                    line
                ))
            })?;
            let mut info = rest.splitn(2, '\t');
            let name = info.next().unwrap_or("");
            let name = name.strip_suffix(')').ok_or_else(|| {
                Error::parse(format!(
                    "aka-titles: unterminated alternate name: {:?}",
                    line
                ))
            })?;
            let region = info.next().map(|r| r.to_string());
            return Ok(Step::Record {
                key: current,
                offset: begin,
                payload: Aka { name: name.to_string(), region },
            });
        }
        if !line.starts_with(' ') {
            self.current = Some((line.to_string(), offset));
            return Ok(Step::Skip);
        }
        Err(Error::parse(format!(
            "aka-titles: unrecognized line: {:?}",
            line
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alternate_names_attach_to_current_title() {
        let mut p = AkaParser::default();
        assert!(matches!(
            p.parse_line("Live Free or Die Hard (2007)", 0).unwrap(),
            Step::Skip
        ));
        match p
            .parse_line("   (aka Die Hard 4.0 (2007))\t(UK)", 30)
            .unwrap()
        {
            Step::Record { key, offset, payload } => {
                assert_eq!(key, "Live Free or Die Hard (2007)");
                // Records carry the offset of the entry's opening line.
                assert_eq!(offset, 0);
                assert_eq!(payload.name, "Die Hard 4.0 (2007)");
                assert_eq!(payload.region.as_deref(), Some("(UK)"));
            }
            step => panic!("unexpected step: {:?}", step),
        }
        // No region annotation.
        match p.parse_line("   (aka Duro de matar 4.0 (2007))", 70).unwrap() {
            Step::Record { payload, .. } => {
                assert_eq!(payload.name, "Duro de matar 4.0 (2007)");
                assert_eq!(payload.region, None);
            }
            step => panic!("unexpected step: {:?}", step),
        }
        // Blank line resets the current title.
        assert!(matches!(p.parse_line("", 100).unwrap(), Step::Skip));
        assert!(p.parse_line("   (aka Orphaned (2007))", 110).is_err());
    }
}
