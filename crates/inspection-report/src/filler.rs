//! Writing text into bookmarks and table cells.

use tracing::{debug, warn};

use crate::automation::{ObjectId, Value};
use crate::error::{AutomationError, ReportError, Result};
use crate::model::FieldValue;
use crate::scope::HandleScope;
use crate::session::AutomationSession;

/// Replace the text of bookmark `name` with `text`.
///
/// Returns `Ok(false)` (after logging a warning) when the document has no
/// such bookmark.
pub fn fill_placeholder(session: &AutomationSession<'_>, name: &str, text: &str) -> Result<bool> {
    if name.is_empty() {
        debug!("Skipping placeholder with an empty name");
        return Ok(false);
    }
    let document = session.document()?;
    let backend = session.backend();
    let mut scope = HandleScope::new(backend);

    let bookmarks = scope.property(document, "Bookmarks")?;
    let exists = backend
        .invoke(bookmarks, "Exists", &[Value::from(name)])?
        .as_bool()
        .unwrap_or(false);
    if !exists {
        warn!("Bookmark '{name}' does not exist, leaving it unfilled");
        return Ok(false);
    }

    let bookmark = scope.indexed(bookmarks, "Item", &[Value::from(name)])?;
    let range = scope.property(bookmark, "Range")?;
    backend.set_property(range, "Text", Value::from(text))?;
    debug!("Filled bookmark '{name}' with '{text}'");
    Ok(true)
}

/// Write `value` into the 1-based (`row`, `col`) cell of `table`.
///
/// Invalid coordinates and an unset value are logged and skipped with
/// `Ok(false)`. Automation failures surface as [`ReportError::CellFillFailed`].
pub fn fill_cell(
    session: &AutomationSession<'_>,
    table: ObjectId,
    row: i32,
    col: i32,
    value: Option<&FieldValue>,
) -> Result<bool> {
    if row <= 0 || col <= 0 {
        debug!("Skipping cell with invalid coordinates ({row}, {col})");
        return Ok(false);
    }
    let Some(value) = value else {
        debug!("Skipping cell ({row}, {col}): no value");
        return Ok(false);
    };

    let backend = session.backend();
    let mut scope = HandleScope::new(backend);
    let text = value.to_string();
    let text = text.trim();

    let mut write = || -> std::result::Result<(), AutomationError> {
        let cell = scope.indexed(table, "Cell", &[Value::Int(row), Value::Int(col)])?;
        let range = scope.property(cell, "Range")?;
        backend.set_property(range, "Text", Value::from(text))
    };
    write().map_err(|source| ReportError::CellFillFailed { row, col, source })?;
    debug!("Filled cell ({row}, {col}) with '{text}'");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::AutomationBackend;
    use crate::fake::{FakeDocument, FakeFaults, FakeWord};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn template(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("template.docx");
        std::fs::write(&path, b"docx").unwrap();
        path
    }

    fn first_table(session: &AutomationSession<'_>, word: &FakeWord) -> ObjectId {
        let doc = session.document().unwrap();
        let bookmarks = word.get_property(doc, "Bookmarks", &[]).unwrap().as_object().unwrap();
        let mark = word
            .get_property(bookmarks, "Item", &["DataInsertPoint".into()])
            .unwrap()
            .as_object()
            .unwrap();
        let range = word.get_property(mark, "Range", &[]).unwrap().as_object().unwrap();
        let tables = word.get_property(range, "Tables", &[]).unwrap().as_object().unwrap();
        let table = word.get_property(tables, "Item", &[Value::Int(1)]).unwrap().as_object().unwrap();
        for object in [tables, range, mark, bookmarks] {
            word.release(object).unwrap();
        }
        table
    }

    #[test]
    fn test_fill_placeholder() {
        let dir = TempDir::new().unwrap();
        let word = FakeWord::new(FakeDocument::inspection_template());
        let session = AutomationSession::open(&word, "Word.Application", &template(&dir)).unwrap();

        assert!(fill_placeholder(&session, "Customer", "ACME").unwrap());
        assert!(!fill_placeholder(&session, "NoSuchBookmark", "x").unwrap());
        assert!(!fill_placeholder(&session, "", "x").unwrap());

        assert_eq!(word.document().unwrap().bookmark_text("Customer"), Some("ACME"));
        // application + document
        assert_eq!(word.live_handles(), 2);
    }

    #[test]
    fn test_fill_cell_skips_invalid_input() {
        let dir = TempDir::new().unwrap();
        let word = FakeWord::new(FakeDocument::inspection_template());
        let session = AutomationSession::open(&word, "Word.Application", &template(&dir)).unwrap();
        let table = first_table(&session, &word);

        let value = FieldValue::Number(1.5);
        assert!(!fill_cell(&session, table, 0, 1, Some(&value)).unwrap());
        assert!(!fill_cell(&session, table, 2, -1, Some(&value)).unwrap());
        assert!(!fill_cell(&session, table, 2, 1, None).unwrap());
        assert!(fill_cell(&session, table, 2, 4, Some(&value)).unwrap());

        let doc = word.document().unwrap();
        assert_eq!(doc.table(0).unwrap().cell_text(2, 4), Some("1.5"));
        word.release(table).unwrap();
        assert_eq!(word.live_handles(), 2);
    }

    #[test]
    fn test_fill_cell_failure_releases_intermediates() {
        let dir = TempDir::new().unwrap();
        let word = FakeWord::with_faults(
            FakeDocument::inspection_template(),
            FakeFaults {
                fail_cell_write: Some((2, 5)),
                ..Default::default()
            },
        );
        let session = AutomationSession::open(&word, "Word.Application", &template(&dir)).unwrap();
        let table = first_table(&session, &word);

        let result = fill_cell(&session, table, 2, 5, Some(&FieldValue::text(" 10 0.1 ")));
        assert!(matches!(result, Err(ReportError::CellFillFailed { row: 2, col: 5, .. })));
        let result = fill_cell(&session, table, 9, 1, Some(&FieldValue::text("x")));
        assert!(matches!(result, Err(ReportError::CellFillFailed { row: 9, .. })));

        word.release(table).unwrap();
        assert_eq!(word.live_handles(), 2);
    }
}
