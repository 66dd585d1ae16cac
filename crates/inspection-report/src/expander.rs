//! Growing the measurement table to fit the input.
//!
//! Expansion is two-phase: the templated row under the anchor bookmark is
//! resolved and its index captured first, then rows are inserted one call at
//! a time using that row as the structural reference. Indices inside the
//! document shift while rows are added, so callers address data rows only as
//! `first_data_row + offset`.

use tracing::{debug, info};

use crate::automation::{ObjectId, Value};
use crate::error::{AutomationError, ReportError, Result};
use crate::scope::{HandleScope, ObjectGuard};
use crate::session::AutomationSession;

/// The table that holds the data rows, plus where they start.
pub struct ExpandedTable<'b> {
    table: ObjectGuard<'b>,
    first_data_row: i32,
    inserted: usize,
}

impl ExpandedTable<'_> {
    pub fn table(&self) -> ObjectId {
        self.table.id()
    }

    /// 1-based index of data row 0.
    pub fn first_data_row(&self) -> i32 {
        self.first_data_row
    }

    /// 1-based index of data row `offset`. Offsets past the inserted block
    /// are rejected.
    pub fn data_row(&self, offset: usize) -> Result<i32> {
        row_at(self.first_data_row, offset)
            .filter(|_| offset <= self.inserted)
            .ok_or_else(|| ReportError::RowInsertFailed {
                index: offset,
                source: AutomationError::call(
                    "Rows.Add",
                    format!("data row {offset} is outside the {} inserted row(s)", self.inserted),
                ),
            })
    }

    pub fn inserted_rows(&self) -> usize {
        self.inserted
    }
}

/// Insert `extra_rows` rows at the row containing bookmark `anchor`.
///
/// The anchor's own row is reused as data row 0, so a table for `n` entries
/// needs `n - 1` extra rows. Every helper object is released before
/// returning; only the table handle is handed back.
pub fn expand<'b>(
    session: &AutomationSession<'b>,
    anchor: &str,
    extra_rows: usize,
) -> Result<ExpandedTable<'b>> {
    let document = session.document()?;
    let backend = session.backend();
    let mut scope = HandleScope::new(backend);

    let bookmarks = scope.property(document, "Bookmarks")?;
    let exists = backend
        .invoke(bookmarks, "Exists", &[Value::from(anchor)])?
        .as_bool()
        .unwrap_or(false);
    if !exists {
        return Err(ReportError::AnchorMissing(anchor.to_string()));
    }
    let bookmark = scope
        .indexed(bookmarks, "Item", &[Value::from(anchor)])
        .map_err(|_| ReportError::AnchorMissing(anchor.to_string()))?;
    let range = scope.property(bookmark, "Range")?;

    let not_in_table = |e: AutomationError| ReportError::NotInTable {
        name: anchor.to_string(),
        detail: e.to_string(),
    };

    let tables = scope.property(range, "Tables")?;
    let table_count = backend
        .get_property(tables, "Count", &[])?
        .as_i32()
        .unwrap_or(0);
    if table_count < 1 {
        return Err(ReportError::NotInTable {
            name: anchor.to_string(),
            detail: "the bookmark range contains no table".into(),
        });
    }
    let table = scope
        .indexed(tables, "Item", &[Value::Int(1)])
        .map_err(not_in_table)?;
    let rows = scope.property(range, "Rows").map_err(not_in_table)?;
    let template_row = scope.property(rows, "First").map_err(not_in_table)?;
    let index = backend.get_property(template_row, "Index", &[])?;
    let first_data_row = index.as_i32().filter(|i| *i > 0).ok_or_else(|| ReportError::NotInTable {
        name: anchor.to_string(),
        detail: format!("template row reported index {index}"),
    })?;
    debug!("Template row for '{anchor}' is row {first_data_row}");
    if row_at(first_data_row, extra_rows).is_none() {
        return Err(ReportError::RowInsertFailed {
            index: 0,
            source: AutomationError::call(
                "Rows.Add",
                format!("{extra_rows} extra row(s) after row {first_data_row} exceed the table's index range"),
            ),
        });
    }

    for i in 0..extra_rows {
        let added = backend
            .invoke(rows, "Add", &[Value::Object(template_row)])
            .map_err(|source| ReportError::RowInsertFailed { index: i, source })?;
        scope.adopt_value(&added);
    }
    info!("Inserted {extra_rows} table row(s) at '{anchor}'");

    let table = scope
        .detach(table)
        .ok_or_else(|| ReportError::NotInTable {
            name: anchor.to_string(),
            detail: "table handle was lost".into(),
        })?;
    Ok(ExpandedTable {
        table,
        first_data_row,
        inserted: extra_rows,
    })
}

fn row_at(first_data_row: i32, offset: usize) -> Option<i32> {
    i32::try_from(offset)
        .ok()
        .and_then(|offset| first_data_row.checked_add(offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeDocument, FakeFaults, FakeWord};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn template(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("template.docx");
        std::fs::write(&path, b"docx").unwrap();
        path
    }

    #[test]
    fn test_expand_inserts_rows_and_keeps_base_index() {
        let dir = TempDir::new().unwrap();
        let word = FakeWord::new(FakeDocument::inspection_template());
        let session = AutomationSession::open(&word, "Word.Application", &template(&dir)).unwrap();

        let expanded = expand(&session, "DataInsertPoint", 3).unwrap();
        assert_eq!(expanded.first_data_row(), 2);
        assert_eq!(expanded.data_row(3).unwrap(), 5);
        assert!(matches!(expanded.data_row(4), Err(ReportError::RowInsertFailed { index: 4, .. })));
        assert_eq!(expanded.inserted_rows(), 3);
        // application, document and the returned table
        assert_eq!(word.live_handles(), 3);

        let table = word.document().unwrap().table(0).unwrap().clone();
        assert_eq!(table.row_count(), 6);
        assert_eq!(table.cell_text(1, 1), Some("Dimension"));
        assert_eq!(table.cell_text(6, 1), Some("Remarks"));

        drop(expanded);
        assert_eq!(word.live_handles(), 2);
    }

    #[test]
    fn test_expand_zero_rows() {
        let dir = TempDir::new().unwrap();
        let word = FakeWord::new(FakeDocument::inspection_template());
        let session = AutomationSession::open(&word, "Word.Application", &template(&dir)).unwrap();
        let expanded = expand(&session, "DataInsertPoint", 0).unwrap();
        assert_eq!(expanded.first_data_row(), 2);
        assert_eq!(word.document().unwrap().table(0).unwrap().row_count(), 3);
    }

    #[test]
    fn test_row_count_beyond_index_range_is_rejected_before_inserting() {
        let dir = TempDir::new().unwrap();
        let word = FakeWord::new(FakeDocument::inspection_template());
        let session = AutomationSession::open(&word, "Word.Application", &template(&dir)).unwrap();

        let result = expand(&session, "DataInsertPoint", i32::MAX as usize);
        assert!(matches!(result, Err(ReportError::RowInsertFailed { index: 0, .. })));
        assert!(!word.calls().contains(&"Rows.Add".to_string()));
        assert_eq!(word.document().unwrap().table(0).unwrap().row_count(), 3);
        assert_eq!(word.live_handles(), 2);
    }

    #[test]
    fn test_row_offsets_do_not_wrap() {
        assert_eq!(row_at(2, 3), Some(5));
        assert_eq!(row_at(2, usize::MAX), None);
        assert_eq!(row_at(i32::MAX, 1), None);
    }

    #[test]
    fn test_missing_anchor() {
        let dir = TempDir::new().unwrap();
        let word = FakeWord::new(FakeDocument::new().with_text_bookmark("Customer"));
        let session = AutomationSession::open(&word, "Word.Application", &template(&dir)).unwrap();
        let result = expand(&session, "DataInsertPoint", 2);
        assert!(matches!(result, Err(ReportError::AnchorMissing(name)) if name == "DataInsertPoint"));
        assert_eq!(word.live_handles(), 2);
    }

    #[test]
    fn test_anchor_outside_table_inserts_nothing() {
        let dir = TempDir::new().unwrap();
        let (doc, _) = FakeDocument::new()
            .with_text_bookmark("DataInsertPoint")
            .with_table(&[&["a", "b"]]);
        let word = FakeWord::new(doc);
        let session = AutomationSession::open(&word, "Word.Application", &template(&dir)).unwrap();

        let result = expand(&session, "DataInsertPoint", 4);
        assert!(matches!(result, Err(ReportError::NotInTable { .. })));
        assert_eq!(word.document().unwrap().table(0).unwrap().row_count(), 1);
        assert!(!word.calls().contains(&"Rows.Add".to_string()));
        assert_eq!(word.live_handles(), 2);
    }

    #[test]
    fn test_row_insert_failure() {
        let dir = TempDir::new().unwrap();
        let word = FakeWord::with_faults(
            FakeDocument::inspection_template(),
            FakeFaults {
                fail_row_insert_at: Some(1),
                ..Default::default()
            },
        );
        let session = AutomationSession::open(&word, "Word.Application", &template(&dir)).unwrap();
        let result = expand(&session, "DataInsertPoint", 3);
        assert!(matches!(result, Err(ReportError::RowInsertFailed { index: 1, .. })));
        assert_eq!(word.live_handles(), 2);
    }
}
