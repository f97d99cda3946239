//! This module reads the raw metadata table, formats the cleaned table and
//! matches sequenced libraries against the cleaned table.

use std::collections::HashMap;
use std::io::{Read, Write};

use thiserror::Error;

use crate::models::{AssayPanel, LibraryMatch, MetadataEntry, Record, CONTAINER_ID_FIELDS};

#[derive(Debug, Error)]
pub enum MetadataError {
    /// The header has no blank-named column. Usually a sign that the export format changed.
    #[error("{origin}: no blank-named column in header")]
    MissingBlankColumn { origin: String },

    #[error("{origin}: required column '{column}' not found")]
    MissingColumn { column: String, origin: String },

    #[error("{origin}: {source}")]
    Csv {
        origin: String,
        #[source]
        source: csv::Error,
    },

    #[error("record has no '{column}' column")]
    MissingOutputColumn { column: String },
}

type Result<T> = std::result::Result<T, MetadataError>;

fn csv_error(origin: &str) -> impl Fn(csv::Error) -> MetadataError + '_ {
    move |source| MetadataError::Csv {
        origin: origin.to_string(),
        source,
    }
}

/// Reads the raw metadata table.
///
/// `origin` names the source in error messages. The header must contain a
/// blank-named column and every assay column of `panel`. Rows with a field
/// count different from the header are an error.
pub fn read_table<R: Read>(reader: R, origin: &str, panel: &AssayPanel) -> Result<Vec<Record>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);

    let headers = rdr.headers().map_err(csv_error(origin))?.clone();
    if !headers.iter().any(|h| h.is_empty()) {
        return Err(MetadataError::MissingBlankColumn {
            origin: origin.to_string(),
        });
    }
    if let Some(missing) = panel.priority.iter().find(|f| !headers.iter().any(|h| h == f.as_str())) {
        return Err(MetadataError::MissingColumn {
            column: missing.clone(),
            origin: origin.to_string(),
        });
    }

    let mut records = Vec::new();
    for row in rdr.records() {
        let row = row.map_err(csv_error(origin))?;
        let record: Record = headers
            .iter()
            .zip(row.iter())
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect();
        records.push(record);
    }
    debug!("{}: {} records read", origin, records.len());
    Ok(records)
}

/// Formats cleaned records as comma-separated lines, header line first.
///
/// Values are written as they are, without quoting. Fails if a record lacks one of the
/// output columns, before anything is written.
pub fn format_table(records: &[Record], panel: &AssayPanel) -> Result<Vec<String>> {
    let fields = panel.output_fields();
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(fields.join(","));

    for record in records {
        let values = fields
            .iter()
            .map(|f| {
                record
                    .get(*f)
                    .map(|v| v.as_str())
                    .ok_or_else(|| MetadataError::MissingOutputColumn {
                        column: f.to_string(),
                    })
            })
            .collect::<Result<Vec<&str>>>()?;
        lines.push(values.join(","));
    }
    Ok(lines)
}

/// Writes one line per entry.
///
/// A broken pipe is reported like any other I/O error, callers decide whether it matters.
pub fn write_lines<W: Write>(mut out: W, lines: &[String]) -> std::io::Result<()> {
    for line in lines {
        writeln!(out, "{}", line)?;
    }
    out.flush()
}

/// The cleaned metadata table, indexed by each of the container id columns
#[derive(Debug)]
pub struct MetadataIndex {
    entries: Vec<MetadataEntry>,

    /// One map per entry in `CONTAINER_ID_FIELDS`, container id to position in `entries`
    by_field: Vec<HashMap<String, usize>>,
}

impl MetadataIndex {
    pub fn new() -> Self {
        MetadataIndex {
            entries: Vec::new(),
            by_field: CONTAINER_ID_FIELDS.iter().map(|_| HashMap::new()).collect(),
        }
    }

    /// Reads a cleaned metadata table. Columns other than ids, `Ct_combo` and the
    /// collection date are ignored.
    pub fn from_reader<R: Read>(reader: R, origin: &str) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);

        let mut index = MetadataIndex::new();
        for entry in rdr.deserialize::<MetadataEntry>() {
            index.insert(entry.map_err(csv_error(origin))?);
        }
        debug!("{}: {} metadata entries indexed", origin, index.len());
        Ok(index)
    }

    /// Adds an entry under each of its non-empty container ids. An id that is
    /// already known in a column now points to `entry`.
    pub fn insert(&mut self, entry: MetadataEntry) {
        let pos = self.entries.len();
        for (field, map) in CONTAINER_ID_FIELDS.iter().zip(self.by_field.iter_mut()) {
            if let Some(id) = entry.container_id(field) {
                if !id.is_empty() {
                    map.insert(id.to_string(), pos);
                }
            }
        }
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finds the metadata entry for a library id.
    ///
    /// Everything from the first `-` on is cut off the library id to get the
    /// container id. The id columns are probed in `CONTAINER_ID_FIELDS` order
    /// and a hit in a later column replaces a hit in an earlier one.
    pub fn get(&self, library_id: &str) -> Option<&MetadataEntry> {
        let container_id = library_id.split('-').next().unwrap_or(library_id);
        let mut selected = None;
        for map in &self.by_field {
            if let Some(&pos) = map.get(container_id) {
                selected = Some(pos);
            }
        }
        selected.map(|pos| &self.entries[pos])
    }

    /// Builds the report row for a library.
    ///
    /// Unmatched negative controls (library id starting with `negative_prefix`)
    /// get a Ct of `0.0`, other unmatched libraries get empty values.
    pub fn match_library(&self, library_id: &str, negative_prefix: &str) -> LibraryMatch {
        if let Some(entry) = self.get(library_id) {
            LibraryMatch {
                sample: library_id.to_string(),
                ct: entry.ct_combo.clone(),
                date: entry.collection_date.clone(),
            }
        } else if library_id.starts_with(negative_prefix) {
            LibraryMatch {
                sample: library_id.to_string(),
                ct: String::from("0.0"),
                date: String::new(),
            }
        } else {
            debug!("No metadata for library {}", library_id);
            LibraryMatch {
                sample: library_id.to_string(),
                ct: String::new(),
                date: String::new(),
            }
        }
    }

    /// Tab-separated report lines for all libraries, header line first
    pub fn format_matches(&self, library_ids: &[String], negative_prefix: &str) -> Vec<String> {
        let mut lines = vec![String::from("sample\tct\tdate")];
        lines.extend(
            library_ids
                .iter()
                .map(|id| self.match_library(id, negative_prefix).fields().join("\t")),
        );
        lines
    }
}

impl Default for MetadataIndex {
    fn default() -> Self {
        MetadataIndex::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;

    type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

    const RAW: &str = "\
,containerid,second_containerid,seq_containerid,collection_date,ncov_qpcr_e_sarbeco_result,ncov_qpcr_rdrp_lee_result,ncov_qpcr_n2_result,ncov_qpcr_n_sarbeco_result,ncov_qpcr_orf1_result
1,R1,,,2021-10-31,(Ct. 21.3),,,,
2,R2,R3851945,,2021-08-21,\"NAT   28.2\",0.00,E=N/A,,33.21 PANTHER
";

    const CLEANED: &str = "\
containerid,second_containerid,seq_containerid,Ct_combo,collection_date,ncov_qpcr_e_sarbeco_result
R12345678,,,21.3,2021-10-31,21.3
,R3851945,,28.2,2021-08-21,28.2
,,E14589235,,2021-11-21,
R555,,,30.1,2021-12-01,30.1
,,R555,31.9,2021-12-02,31.9
";

    #[test]
    fn read_raw_table() -> Result<()> {
        let panel = AssayPanel::default();
        let records = read_table(RAW.as_bytes(), "raw.csv", &panel)?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["ncov_qpcr_e_sarbeco_result"], "NAT   28.2");
        assert_eq!(records[1][""], "2");
        Ok(())
    }

    #[test]
    fn header_without_blank_column() {
        let input = "containerid,ncov_qpcr_e_sarbeco_result\nR1,21.3\n";
        let err = read_table(input.as_bytes(), "raw.csv", &AssayPanel::default()).unwrap_err();
        assert!(matches!(err, MetadataError::MissingBlankColumn { .. }));
    }

    #[test]
    fn header_without_assay_column() {
        let input = ",containerid,ncov_qpcr_e_sarbeco_result\n1,R1,21.3\n";
        let err = read_table(input.as_bytes(), "raw.csv", &AssayPanel::default()).unwrap_err();
        match err {
            MetadataError::MissingColumn { column, .. } => {
                assert_eq!(column, "ncov_qpcr_rdrp_lee_result")
            }
            e => panic!("unexpected error {}", e),
        }
    }

    #[test]
    fn ragged_row() {
        let input = RAW.to_string() + "3,R9\n";
        let err = read_table(input.as_bytes(), "raw.csv", &AssayPanel::default()).unwrap_err();
        assert!(matches!(err, MetadataError::Csv { .. }));
    }

    #[test]
    fn clean_and_format() -> Result<()> {
        let panel = AssayPanel::default();
        let records = read_table(RAW.as_bytes(), "raw.csv", &panel)?
            .into_iter()
            .map(|r| record::clean(r, &panel))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let lines = format_table(&records, &panel)?;
        assert_eq!(
            lines,
            vec![
                "containerid,second_containerid,seq_containerid,Ct_combo,collection_date,ncov_qpcr_e_sarbeco_result,ncov_qpcr_rdrp_lee_result,ncov_qpcr_n_sarbeco_result,ncov_qpcr_n2_result,ncov_qpcr_orf1_result",
                "R1,,,21.3,2021-10-31,21.3,,,,",
                "R2,R3851945,,28.2,2021-08-21,28.2,,,,33.21",
            ]
        );

        let mut out = Vec::new();
        write_lines(&mut out, &lines)?;
        assert_eq!(String::from_utf8(out)?.lines().count(), 3);
        Ok(())
    }

    #[test]
    fn format_missing_column() {
        let mut r = Record::new();
        r.insert(String::from("containerid"), String::from("R1"));
        let err = format_table(&[r], &AssayPanel::default()).unwrap_err();
        match err {
            MetadataError::MissingOutputColumn { column } => assert_eq!(column, "second_containerid"),
            e => panic!("unexpected error {}", e),
        }
    }

    #[test]
    fn index_skips_empty_ids() -> Result<()> {
        let index = MetadataIndex::from_reader(CLEANED.as_bytes(), "cleaned.csv")?;
        assert_eq!(index.len(), 5);
        assert!(index.get("").is_none());
        assert_eq!(index.get("R12345678").map(|e| e.ct_combo.as_str()), Some("21.3"));
        assert_eq!(index.get("R3851945").map(|e| e.ct_combo.as_str()), Some("28.2"));
        assert_eq!(index.get("E14589235").map(|e| e.collection_date.as_str()), Some("2021-11-21"));
        Ok(())
    }

    #[test]
    fn library_suffix_is_stripped() -> Result<()> {
        let index = MetadataIndex::from_reader(CLEANED.as_bytes(), "cleaned.csv")?;
        let m = index.match_library("R12345678-1-v2", "NEG");
        assert_eq!(m.sample, "R12345678-1-v2");
        assert_eq!(m.ct, "21.3");
        assert_eq!(m.date, "2021-10-31");
        Ok(())
    }

    #[test]
    fn later_id_column_wins() -> Result<()> {
        // R555 is a containerid of one row and the seq_containerid of another
        let index = MetadataIndex::from_reader(CLEANED.as_bytes(), "cleaned.csv")?;
        let m = index.match_library("R555", "NEG");
        assert_eq!(m.ct, "31.9");
        assert_eq!(m.date, "2021-12-02");
        Ok(())
    }

    #[test]
    fn later_row_wins_within_column() {
        let mut index = MetadataIndex::new();
        index.insert(MetadataEntry {
            containerid: String::from("R1"),
            ct_combo: String::from("20.0"),
            ..Default::default()
        });
        index.insert(MetadataEntry {
            containerid: String::from("R1"),
            ct_combo: String::from("22.0"),
            ..Default::default()
        });
        assert_eq!(index.match_library("R1", "NEG").ct, "22.0");
    }

    #[test]
    fn unmatched_libraries() -> Result<()> {
        let index = MetadataIndex::from_reader(CLEANED.as_bytes(), "cleaned.csv")?;
        let neg = index.match_library("NEG-20211201-1", "NEG");
        assert_eq!((neg.ct.as_str(), neg.date.as_str()), ("0.0", ""));
        let other = index.match_library("POS-1", "NEG");
        assert_eq!((other.ct.as_str(), other.date.as_str()), ("", ""));
        Ok(())
    }

    #[test]
    fn match_report() -> Result<()> {
        let index = MetadataIndex::from_reader(CLEANED.as_bytes(), "cleaned.csv")?;
        let ids = vec![String::from("E14589235-2"), String::from("NEG1"), String::from("X1")];
        assert_eq!(
            index.format_matches(&ids, "NEG"),
            vec![
                "sample\tct\tdate",
                "E14589235-2\t\t2021-11-21",
                "NEG1\t0.0\t",
                "X1\t\t",
            ]
        );
        Ok(())
    }
}
