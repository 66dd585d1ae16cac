//! Report generator settings.
//!
//! Settings are read from an optional JSON file. Every key is optional and
//! falls back to the value in [`ReportConfig::default`].

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::bridge::BridgeConfig;
use crate::error::ConfigError;
use crate::session::WD_FORMAT_XML_DOCUMENT;

/// Bookmark names for the scalar product fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaceholderNames {
    pub job_order: String,
    pub customer: String,
    pub material_grade: String,
    pub product_serial_no: String,
    pub inspector: String,
    pub reviewer: String,
}

impl Default for PlaceholderNames {
    fn default() -> Self {
        Self {
            job_order: "JobOrderNo".to_string(),
            customer: "Customer".to_string(),
            material_grade: "MaterialGrade".to_string(),
            product_serial_no: "ProductSerialNo".to_string(),
            inspector: "Inspector".to_string(),
            reviewer: "Reviewer".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Template document.
    pub template: PathBuf,
    /// Directory generated reports are written to.
    pub output_dir: PathBuf,
    /// `chrono` format string for generated report file names.
    pub output_name: String,
    /// ProgID of the application to automate.
    pub prog_id: String,
    /// Container format passed to `SaveAs`.
    pub save_format: i32,
    /// Bookmark inside the templated row of the measurement table.
    pub data_anchor: String,
    pub placeholders: PlaceholderNames,
    /// Where the working copy of the template goes. Defaults to the system temp dir.
    pub scratch_dir: Option<PathBuf>,
    pub bridge: BridgeConfig,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            template: PathBuf::from("word_template/report_template.docx"),
            output_dir: PathBuf::from("reports"),
            output_name: "%Y%m%d_%H%M%S_report.docx".to_string(),
            prog_id: "Word.Application".to_string(),
            save_format: WD_FORMAT_XML_DOCUMENT,
            data_anchor: "DataInsertPoint".to_string(),
            placeholders: PlaceholderNames::default(),
            scratch_dir: None,
            bridge: BridgeConfig::default(),
        }
    }
}

impl ReportConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Destination path for a report generated at `now`.
    pub fn output_path(&self, now: DateTime<Local>) -> PathBuf {
        self.output_dir
            .join(now.format(&self.output_name).to_string())
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        std::fs::write(
            &path,
            r#"{ "output_dir": "out", "placeholders": { "customer": "Client" } }"#,
        )
        .unwrap();

        let config = ReportConfig::load(&path).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.placeholders.customer, "Client");
        assert_eq!(config.placeholders.job_order, "JobOrderNo");
        assert_eq!(config.save_format, 16);
        assert_eq!(config.data_anchor, "DataInsertPoint");
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(ReportConfig::load(&path), Err(ConfigError::Parse { .. })));
        assert!(matches!(
            ReportConfig::load(&dir.path().join("missing.json")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_output_path_uses_timestamp() {
        let config = ReportConfig::default();
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            config.output_path(now),
            PathBuf::from("reports").join("20240309_140507_report.docx")
        );
    }
}
