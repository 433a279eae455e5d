//! Reading and writing the tab-separated submission format.
//!
//! One row per mention: system id, mention id, mention text,
//! `doc:start-stop` span, KB entity ids (or a NIL cluster id), entity
//! type, mention type, and confidence. The same format carries both
//! system output and ground truth.

use crate::document::{Document, GroundTruth, Link, LinkType, Offsets};
use crate::entity::EntityType;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::io::{BufRead, Write};

const NUM_COLUMNS: usize = 8;
const HEADER_PREFIX: &str = "system_run_id";

/// Parses submission-format rows into ground truth.
pub struct OutputReader;

impl OutputReader {
    /// Read all rows from a submission-format stream.
    ///
    /// The stream must begin with the standard header row. Malformed
    /// rows, spans, and entity types are fatal.
    pub fn read<R: BufRead>(reader: R) -> Result<GroundTruth> {
        let mut gt: GroundTruth = HashMap::new();
        let mut lines = reader.lines();
        let header = lines
            .next()
            .ok_or_else(|| Error::parse("missing submission header row"))??;
        if !header.starts_with(HEADER_PREFIX) {
            return Err(Error::parse("missing submission header row"));
        }
        for (line_number, line) in lines.enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let (doc_id, offsets, link) = Self::parse_row(&line)
                .map_err(|e| Error::parse(format!("row {}: {}", line_number + 2, e)))?;
            gt.entry(doc_id).or_default().insert(offsets, link);
        }
        Ok(gt)
    }

    fn parse_row(line: &str) -> Result<(String, Offsets, Link)> {
        let columns: Vec<&str> = line.split('\t').collect();
        if columns.len() != NUM_COLUMNS {
            return Err(Error::parse(format!(
                "expected {} columns, got {}",
                NUM_COLUMNS,
                columns.len()
            )));
        }
        let (doc_id, offsets) = Self::parse_span(columns[3])?;
        let entity_type = EntityType::from_label(columns[5])?;
        let kb_field = columns[4];
        let link = if kb_field.contains("NIL") {
            Link {
                entity_type,
                link_type: LinkType::Nil,
                links: Vec::new(),
                cluster_id: Some(kb_field.to_string()),
                name: columns[2].to_string(),
            }
        } else {
            Link {
                entity_type,
                link_type: LinkType::Link,
                links: kb_field.split('|').map(str::to_string).collect(),
                cluster_id: None,
                name: columns[2].to_string(),
            }
        };
        Ok((doc_id, offsets, link))
    }

    /// Parse a `doc:start-stop` span.
    fn parse_span(span: &str) -> Result<(String, Offsets)> {
        let (doc_id, range) = span
            .rsplit_once(':')
            .ok_or_else(|| Error::parse(format!("bad span: {span}")))?;
        let (start, stop) = range
            .split_once('-')
            .ok_or_else(|| Error::parse(format!("bad span range: {span}")))?;
        let start = start
            .parse()
            .map_err(|_| Error::parse(format!("bad span start: {span}")))?;
        let stop = stop
            .parse()
            .map_err(|_| Error::parse(format!("bad span stop: {span}")))?;
        Ok((doc_id.to_string(), (start, stop)))
    }
}

/// Writes resolved documents in the submission format.
pub struct OutputWriter<W: Write> {
    writer: W,
    system_id: String,
    wrote_header: bool,
}

impl<W: Write> OutputWriter<W> {
    /// Create a writer tagged with a system run id.
    #[must_use]
    pub fn new(writer: W, system_id: impl Into<String>) -> Self {
        Self {
            writer,
            system_id: system_id.into(),
            wrote_header: false,
        }
    }

    /// Write every mention of a resolved document, one row per mention.
    ///
    /// Unresolved chains are written as `NIL`; the verbatim mention text
    /// is preserved.
    pub fn write(&mut self, document: &Document) -> Result<()> {
        if !self.wrote_header {
            writeln!(
                self.writer,
                "system_run_id\tmention_id\tmention_string\tspan\tkb_id\tentity_type\tmention_type\tconfidence"
            )?;
            self.wrote_header = true;
        }
        for chain in &document.mention_chains {
            let kb_id = chain
                .entity
                .as_ref()
                .map_or("NIL", |entity| entity.id.as_str());
            for mention in &chain.mentions {
                writeln!(
                    self.writer,
                    "{}\t{}\t{}\t{}:{}-{}\t{}\t{}\tNAM\t1.0",
                    self.system_id,
                    mention.id,
                    mention.original_string,
                    mention.doc_id,
                    mention.offsets.0,
                    mention.offsets.1,
                    kb_id,
                    mention.entity_type
                )?;
            }
        }
        Ok(())
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Mention, MentionChain};
    use crate::entity::Entity;
    use std::sync::Arc;

    const HEADER: &str =
        "system_run_id\tmention_id\tmention_string\tspan\tkb_id\tentity_type\tmention_type\tconfidence\n";

    #[test]
    fn reads_linked_and_nil_rows() {
        let data = format!(
            "{HEADER}\
             sys1\tm1\tJohn Smith\tdoc1_NW_1:10-19\t122|124\tPER\tNAM\t1.0\n\
             sys1\tm2\tNobody\tdoc1_NW_1:30-35\tNIL001\tPER\tNAM\t1.0\n"
        );
        let gt = OutputReader::read(data.as_bytes()).unwrap();
        let links = &gt["doc1_NW_1"];
        let linked = &links[&(10, 19)];
        assert_eq!(linked.link_type, LinkType::Link);
        assert_eq!(linked.links, vec!["122", "124"]);
        assert_eq!(linked.name, "John Smith");
        let nil = &links[&(30, 35)];
        assert_eq!(nil.link_type, LinkType::Nil);
        assert_eq!(nil.cluster_id.as_deref(), Some("NIL001"));
    }

    #[test]
    fn missing_header_is_fatal() {
        let data = "sys1\tm1\tJohn\tdoc1_NW_1:10-13\t122\tPER\tNAM\t1.0\n";
        assert!(OutputReader::read(data.as_bytes()).is_err());
    }

    #[test]
    fn bad_entity_type_is_fatal() {
        let data = format!("{HEADER}sys1\tm1\tJohn\tdoc1_NW_1:10-13\t122\tDOG\tNAM\t1.0\n");
        assert!(OutputReader::read(data.as_bytes()).is_err());
    }

    #[test]
    fn bad_column_count_is_fatal() {
        let data = format!("{HEADER}sys1\tm1\tJohn\tdoc1_NW_1:10-13\t122\tPER\n");
        assert!(OutputReader::read(data.as_bytes()).is_err());
    }

    #[test]
    fn bad_span_is_fatal() {
        let data = format!("{HEADER}sys1\tm1\tJohn\tdoc1_NW_1:ten-13\t122\tPER\tNAM\t1.0\n");
        assert!(OutputReader::read(data.as_bytes()).is_err());
    }

    #[test]
    fn blank_lines_are_skipped() {
        let data = format!("{HEADER}\n\n");
        assert!(OutputReader::read(data.as_bytes()).unwrap().is_empty());
    }

    fn resolved_document() -> Document {
        let m1 = Mention::new("m1", "John Smith", "doc1_NW_1", (10, 19), (2, 4), EntityType::Per);
        let m2 = Mention::new("m2", "Nobody", "doc1_NW_1", (30, 35), (6, 7), EntityType::Per);
        let mut d = Document::new(vec![m1.clone(), m2.clone()], vec![], "eng").unwrap();
        let mut c1 = MentionChain::singleton(m1);
        c1.entity = Some(Arc::new(Entity::new(
            "122",
            EntityType::Per,
            "John Smith",
            "APB",
            vec![],
        )));
        d.mention_chains = vec![c1, MentionChain::singleton(m2)];
        d
    }

    #[test]
    fn writes_rows_with_nil_for_unresolved() {
        let mut out = Vec::new();
        let mut writer = OutputWriter::new(&mut out, "sys1");
        writer.write(&resolved_document()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[1],
            "sys1\tm1\tJohn Smith\tdoc1_NW_1:10-19\t122\tPER\tNAM\t1.0"
        );
        assert_eq!(
            lines[2],
            "sys1\tm2\tNobody\tdoc1_NW_1:30-35\tNIL\tPER\tNAM\t1.0"
        );
    }

    #[test]
    fn writer_output_reads_back() {
        let mut out = Vec::new();
        OutputWriter::new(&mut out, "sys1")
            .write(&resolved_document())
            .unwrap();
        let gt = OutputReader::read(out.as_slice()).unwrap();
        assert_eq!(gt["doc1_NW_1"][&(10, 19)].links, vec!["122"]);
    }
}
