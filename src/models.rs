use std::collections::HashMap;

use serde::Deserialize;

/// One row of the metadata table, keyed by column header
pub type Record = HashMap<String, String>;

/// Container id columns, in the order they are probed during library matching
pub const CONTAINER_ID_FIELDS: [&str; 3] = ["containerid", "second_containerid", "seq_containerid"];

pub const COLLECTION_DATE_FIELD: &str = "collection_date";

/// The set of Ct assay columns of a qPCR panel and how they are combined
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssayPanel {
    /// Assay columns in `Ct_combo` priority order
    pub priority: Vec<String>,

    /// Assay columns in the order they are written to the cleaned table
    pub output_order: Vec<String>,

    /// Name of the derived column holding the combined Ct
    pub combo_field: String,
}

impl AssayPanel {
    /// The SARS-CoV-2 panel: E-Sarbeco, RdRp-Lee, N2, N-Sarbeco, ORF1
    pub fn sars_cov_2() -> Self {
        let priority = vec![
            "ncov_qpcr_e_sarbeco_result",
            "ncov_qpcr_rdrp_lee_result",
            "ncov_qpcr_n2_result",
            "ncov_qpcr_n_sarbeco_result",
            "ncov_qpcr_orf1_result",
        ];
        let output_order = vec![
            "ncov_qpcr_e_sarbeco_result",
            "ncov_qpcr_rdrp_lee_result",
            "ncov_qpcr_n_sarbeco_result",
            "ncov_qpcr_n2_result",
            "ncov_qpcr_orf1_result",
        ];
        AssayPanel {
            priority: priority.into_iter().map(String::from).collect(),
            output_order: output_order.into_iter().map(String::from).collect(),
            combo_field: String::from("Ct_combo"),
        }
    }

    /// Builds a panel from a comma-separated list of assay columns in priority order.
    ///
    /// Columns are written in the same order. Returns `None` if the list holds no column names.
    pub fn from_list(list: &str) -> Option<Self> {
        let priority: Vec<String> = list
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if priority.is_empty() {
            return None;
        }
        Some(AssayPanel {
            output_order: priority.clone(),
            priority,
            combo_field: String::from("Ct_combo"),
        })
    }

    /// Columns of the cleaned table, in order
    pub fn output_fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = CONTAINER_ID_FIELDS.to_vec();
        fields.push(self.combo_field.as_str());
        fields.push(COLLECTION_DATE_FIELD);
        fields.extend(self.output_order.iter().map(|f| f.as_str()));
        fields
    }
}

impl Default for AssayPanel {
    fn default() -> Self {
        AssayPanel::sars_cov_2()
    }
}

/// A row of the cleaned metadata table, as far as library matching is concerned
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MetadataEntry {
    pub containerid: String,
    pub second_containerid: String,
    pub seq_containerid: String,
    #[serde(rename = "Ct_combo")]
    pub ct_combo: String,
    pub collection_date: String,
}

impl MetadataEntry {
    /// Value of one of the `CONTAINER_ID_FIELDS`
    pub fn container_id(&self, field: &str) -> Option<&str> {
        match field {
            "containerid" => Some(self.containerid.as_str()),
            "second_containerid" => Some(self.second_containerid.as_str()),
            "seq_containerid" => Some(self.seq_containerid.as_str()),
            _ => None,
        }
    }
}

/// Ct and collection date reported for a sequenced library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryMatch {
    pub sample: String,
    pub ct: String,
    pub date: String,
}

impl LibraryMatch {
    pub fn fields(&self) -> [&str; 3] {
        [self.sample.as_str(), self.ct.as_str(), self.date.as_str()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout() {
        let panel = AssayPanel::default();
        assert_eq!(
            panel.output_fields(),
            vec![
                "containerid",
                "second_containerid",
                "seq_containerid",
                "Ct_combo",
                "collection_date",
                "ncov_qpcr_e_sarbeco_result",
                "ncov_qpcr_rdrp_lee_result",
                "ncov_qpcr_n_sarbeco_result",
                "ncov_qpcr_n2_result",
                "ncov_qpcr_orf1_result",
            ]
        );
        assert_eq!(panel.priority[2], "ncov_qpcr_n2_result");
    }

    #[test]
    fn custom_panel() {
        let panel = AssayPanel::from_list(" flu_a_ct, flu_b_ct,").unwrap();
        assert_eq!(panel.priority, vec!["flu_a_ct", "flu_b_ct"]);
        assert_eq!(panel.output_order, panel.priority);
        assert_eq!(panel.output_fields().len(), 7);
        assert!(AssayPanel::from_list(" , ").is_none());
    }
}
