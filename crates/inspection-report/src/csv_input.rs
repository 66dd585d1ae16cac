//! Loading inspection parameters from a measurement CSV export.
//!
//! The export has one header line and one data line. Header cells look like
//! `<Attribute>_<Parameter>` (`ActualValue_D1`, `Max_D1`, ...); every
//! parameter becomes one [`InspectionParam`], in the order its first column
//! appears.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::error::InputError;
use crate::model::{FieldValue, InspectionParam};

static HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([a-zA-Z]+)_(.*)$").expect("valid regex"));

/// Read parameters from a CSV file.
pub fn load_inspection_params<P: AsRef<Path>>(path: P) -> Result<Vec<InspectionParam>, InputError> {
    let path = path.as_ref();
    let params = read_inspection_params(File::open(path)?)?;
    info!("Loaded {} inspection parameter(s) from {}", params.len(), path.display());
    Ok(params)
}

/// Read parameters from CSV text.
pub fn read_inspection_params<R: Read>(reader: R) -> Result<Vec<InspectionParam>, InputError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut lines = Vec::with_capacity(2);
    for record in csv_reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        lines.push(record);
        if lines.len() == 2 {
            break;
        }
    }
    if lines.len() < 2 {
        return Err(InputError::MissingLines(lines.len()));
    }
    let (header, data) = (&lines[0], &lines[1]);

    let mut params: Vec<InspectionParam> = Vec::new();
    for (col, title) in header.iter().enumerate() {
        let Some(caps) = HEADER.captures(title) else {
            debug!("Ignoring column '{title}'");
            continue;
        };
        let attribute = &caps[1];
        let name = &caps[2];
        let value = FieldValue::parse(data.get(col).unwrap_or(""));

        let index = match params.iter().position(|p| p.name == name) {
            Some(index) => index,
            None => {
                params.push(InspectionParam::new(name));
                params.len() - 1
            }
        };
        let param = &mut params[index];
        match attribute {
            "DefaultValue" => param.default_value = value,
            "Max" => param.max_value = value,
            "Min" => param.min_value = value,
            "ActualValue" => param.actual_value = value,
            "Offset" => param.offset = value,
            "OverOffset" => param.over_offset = value,
            other => debug!("Ignoring unknown attribute '{other}' of '{name}'"),
        }
    }
    Ok(params)
}

/// `*.csv` files directly inside `dir`, sorted by file name.
pub fn list_csv_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>, InputError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if is_csv && path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}
