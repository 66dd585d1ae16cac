//! Report input data.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Text written for a value explicitly marked not applicable.
pub const NOT_APPLICABLE_TEXT: &str = "N/A";

/// Text written in place of a measurement that carried the invalid sentinel.
pub const INVALID_VALUE_TEXT: &str = "INVALID";

/// A single measurement-table value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum FieldValue {
    #[default]
    Empty,
    Number(f64),
    NotApplicable,
    /// The source reported the reserved sentinel number instead of a measurement.
    Invalid,
    Text(String),
}

impl FieldValue {
    /// Reserved number instruments emit for "no valid measurement".
    pub const INVALID_SENTINEL: f64 = 7777777.0;

    /// Interpret raw input text.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return FieldValue::Empty;
        }
        if raw.eq_ignore_ascii_case(NOT_APPLICABLE_TEXT) {
            return FieldValue::NotApplicable;
        }
        match raw.parse::<f64>() {
            Ok(n) if n.is_finite() => FieldValue::number(n),
            _ => FieldValue::Text(raw.to_string()),
        }
    }

    /// A number, unless it is the invalid sentinel.
    pub fn number(n: f64) -> Self {
        if is_sentinel(n) {
            FieldValue::Invalid
        } else {
            FieldValue::Number(n)
        }
    }

    pub fn text(s: impl Into<String>) -> Self {
        FieldValue::Text(s.into())
    }
}

// Relative comparison with 12 significant digits.
fn is_sentinel(n: f64) -> bool {
    let s = FieldValue::INVALID_SENTINEL;
    (n - s).abs() * 1e12 <= n.abs().min(s)
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Empty => Ok(()),
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::NotApplicable => f.write_str(NOT_APPLICABLE_TEXT),
            FieldValue::Invalid => f.write_str(INVALID_VALUE_TEXT),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::number(n)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

/// Report-level scalar fields. Absent values are empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductParam {
    pub job_order: String,
    pub material_grade: String,
    pub customer: String,
    pub product_serial_no: String,
    /// Shared by every table row.
    pub measurement_tool: String,
    /// Shared by every table row.
    pub measurement_no: String,
    pub inspector: String,
    pub reviewer: String,
}

/// One row of the measurement table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectionParam {
    pub name: String,
    pub default_value: FieldValue,
    pub max_value: FieldValue,
    pub min_value: FieldValue,
    pub actual_value: FieldValue,
    pub offset: FieldValue,
    pub over_offset: FieldValue,
}

impl InspectionParam {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// The `"<actual> <offset>"` text of the last table column.
    pub fn actual_with_offset(&self) -> String {
        format!("{} {}", self.actual_value, self.offset)
    }
}

/// Everything needed to produce one report.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReportRequest {
    pub template: PathBuf,
    pub destination: PathBuf,
    pub product: ProductParam,
    /// Output row order follows this order.
    pub inspections: Vec<InspectionParam>,
}

impl ReportRequest {
    pub fn new(template: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            template: template.into(),
            destination: destination.into(),
            ..Default::default()
        }
    }

    pub fn with_product(mut self, product: ProductParam) -> Self {
        self.product = product;
        self
    }

    pub fn with_inspections(mut self, inspections: Vec<InspectionParam>) -> Self {
        self.inspections = inspections;
        self
    }
}

/// Strip surrounding whitespace and any double quotes pasted along with a path.
pub fn clean_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(raw.trim().replace('"', ""))
}
