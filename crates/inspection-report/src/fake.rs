//! An in-memory stand-in for `Word.Application`.
//!
//! [`FakeWord`] implements just enough of Word's object model (application,
//! documents, bookmarks, ranges, tables, rows and cells) for the report
//! generator to run end to end without Windows. It keeps a live-handle count,
//! a call log and a launch counter so tests can assert that every handle is
//! released and that cleanup happens in the right order, and it can be told to
//! fail at the points where the real application is known to misbehave.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::automation::{AutomationBackend, ObjectId, ProcessTerminator, Value};
use crate::error::{AutomationError, ProcessError};

/// Process id reported by every fake application instance.
pub const FAKE_PROCESS_ID: u32 = 4242;

/// What `terminate_process` does for the fake application's process id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TerminateBehavior {
    /// Terminate if the process is still alive, otherwise report `NotFound`.
    #[default]
    Normal,
    /// The process can be opened but refuses to die.
    Refuse,
}

/// Failure points of the fake application.
#[derive(Debug, Clone, Default)]
pub struct FakeFaults {
    pub fail_launch: bool,
    pub fail_open: bool,
    /// `Documents.Open` succeeds but returns an empty value, as asynchronous
    /// automation variants do; the document is only reachable via `ActiveDocument`.
    pub open_returns_empty: bool,
    /// `Documents.Open` reports an error after the document has loaded, so
    /// it is still reachable via `ActiveDocument`.
    pub open_errors_after_load: bool,
    pub no_active_document: bool,
    pub fail_save: bool,
    pub fail_close: bool,
    pub fail_quit: bool,
    /// Fail the n-th (0-based) `Rows.Add` call.
    pub fail_row_insert_at: Option<usize>,
    /// Fail writes to the cell at (row, col).
    pub fail_cell_write: Option<(i32, i32)>,
    /// Panic inside `Range.Text` writes to bookmark ranges.
    pub panic_on_bookmark_write: bool,
    pub terminate: TerminateBehavior,
}

/// A bookmark and what it spans.
#[derive(Debug, Clone, PartialEq)]
pub struct FakeBookmark {
    pub name: String,
    pub target: BookmarkTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookmarkTarget {
    /// Running text outside any table.
    Text,
    /// A cell; `row_id` is the stable identity of the row, not its position.
    Cell { table: usize, row_id: u64, col: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FakeRow {
    id: u64,
    cells: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FakeTable {
    rows: Vec<FakeRow>,
}

impl FakeTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Text of the cell at 1-based (row, col).
    pub fn cell_text(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row.checked_sub(1)?)?
            .cells
            .get(col.checked_sub(1)?)
            .map(String::as_str)
    }

    /// All cell texts of a 1-based row.
    pub fn row_texts(&self, row: usize) -> Option<Vec<&str>> {
        let row = self.rows.get(row.checked_sub(1)?)?;
        Some(row.cells.iter().map(String::as_str).collect())
    }

    fn position(&self, row_id: u64) -> Option<usize> {
        self.rows.iter().position(|r| r.id == row_id)
    }
}

/// Document content: bookmarks with their text, and tables.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FakeDocument {
    bookmarks: Vec<FakeBookmark>,
    bookmark_text: HashMap<String, String>,
    tables: Vec<FakeTable>,
    next_row_id: u64,
}

impl FakeDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// The template the report generator is written against: one text
    /// bookmark per product field, and a five-column table with a header row,
    /// a templated data row holding `DataInsertPoint`, and a closing remarks row.
    pub fn inspection_template() -> Self {
        let mut doc = Self::new();
        for name in [
            "JobOrderNo",
            "Customer",
            "MaterialGrade",
            "ProductSerialNo",
            "Inspector",
            "Reviewer",
        ] {
            doc = doc.with_text_bookmark(name);
        }
        let (doc, table) = doc.with_table(
            &[
                &["Dimension", "Tool", "Tool No.", "Nominal", "Actual"],
                &["", "", "", "", ""],
                &["Remarks", "", "", "", ""],
            ],
        );
        doc.with_cell_bookmark("DataInsertPoint", table, 2, 1)
    }

    pub fn with_text_bookmark(mut self, name: &str) -> Self {
        self.bookmarks.push(FakeBookmark {
            name: name.to_string(),
            target: BookmarkTarget::Text,
        });
        self.bookmark_text.insert(name.to_string(), String::new());
        self
    }

    /// Append a table; returns the document and the table's 0-based index.
    pub fn with_table(mut self, rows: &[&[&str]]) -> (Self, usize) {
        let mut table = FakeTable { rows: Vec::new() };
        for cells in rows {
            let id = self.allocate_row_id();
            table.rows.push(FakeRow {
                id,
                cells: cells.iter().map(|c| c.to_string()).collect(),
            });
        }
        self.tables.push(table);
        let index = self.tables.len() - 1;
        (self, index)
    }

    /// Bookmark the 1-based (row, col) cell of a table.
    ///
    /// # Panics
    ///
    /// Panics if the table or row does not exist.
    pub fn with_cell_bookmark(mut self, name: &str, table: usize, row: usize, col: usize) -> Self {
        let row_id = self.tables[table].rows[row - 1].id;
        self.bookmarks.push(FakeBookmark {
            name: name.to_string(),
            target: BookmarkTarget::Cell { table, row_id, col },
        });
        self
    }

    pub fn bookmark_text(&self, name: &str) -> Option<&str> {
        self.bookmark_text.get(name).map(String::as_str)
    }

    pub fn table(&self, index: usize) -> Option<&FakeTable> {
        self.tables.get(index)
    }

    fn bookmark(&self, name: &str) -> Option<&FakeBookmark> {
        self.bookmarks.iter().find(|b| b.name == name)
    }

    fn allocate_row_id(&mut self) -> u64 {
        self.next_row_id += 1;
        self.next_row_id
    }
}

#[derive(Debug, Clone, PartialEq)]
enum RangeTarget {
    Bookmark(String),
    Cell { table: usize, row_id: u64, col: usize },
}

#[derive(Debug, Clone, PartialEq)]
enum FakeObject {
    Application,
    Documents,
    Document,
    Bookmarks,
    Bookmark(String),
    Range(RangeTarget),
    Tables(Option<usize>),
    Table(usize),
    Rows { table: usize, row_ids: Vec<u64> },
    Row { table: usize, row_id: u64 },
    Cell { table: usize, row_id: u64, col: usize },
}

impl FakeObject {
    fn type_name(&self) -> &'static str {
        match self {
            FakeObject::Application => "Application",
            FakeObject::Documents => "Documents",
            FakeObject::Document => "Document",
            FakeObject::Bookmarks => "Bookmarks",
            FakeObject::Bookmark(_) => "Bookmark",
            FakeObject::Range(_) => "Range",
            FakeObject::Tables(_) => "Tables",
            FakeObject::Table(_) => "Table",
            FakeObject::Rows { .. } => "Rows",
            FakeObject::Row { .. } => "Row",
            FakeObject::Cell { .. } => "Cell",
        }
    }
}

#[derive(Debug, Default)]
struct FakeState {
    template: FakeDocument,
    document: Option<FakeDocument>,
    saved: Option<SavedDocument>,
    objects: HashMap<u64, FakeObject>,
    next_id: u64,
    launches: usize,
    process_alive: bool,
    row_inserts: usize,
    calls: Vec<String>,
    faults: FakeFaults,
    opened_path: Option<String>,
}

/// A document as it was persisted by `SaveAs`.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedDocument {
    pub path: String,
    pub format: i32,
    pub document: FakeDocument,
}

/// In-memory automation backend; see the module documentation.
#[derive(Debug)]
pub struct FakeWord {
    state: RefCell<FakeState>,
}

impl FakeWord {
    pub fn new(template: FakeDocument) -> Self {
        Self::with_faults(template, FakeFaults::default())
    }

    pub fn with_faults(template: FakeDocument, faults: FakeFaults) -> Self {
        Self {
            state: RefCell::new(FakeState {
                template,
                faults,
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Number of handles issued and not yet released.
    pub fn live_handles(&self) -> usize {
        self.state.borrow().objects.len()
    }

    pub fn is_live(&self, object: ObjectId) -> bool {
        self.state.borrow().objects.contains_key(&object.0)
    }

    /// How many times an application object was created.
    pub fn launches(&self) -> usize {
        self.state.borrow().launches
    }

    pub fn process_alive(&self) -> bool {
        self.state.borrow().process_alive
    }

    /// `Type.Member` entries for every call, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    pub fn saved(&self) -> Option<SavedDocument> {
        self.state.borrow().saved.clone()
    }

    /// The path most recently passed to `Documents.Open`.
    pub fn opened_path(&self) -> Option<String> {
        self.state.borrow().opened_path.clone()
    }

    /// The currently open document, if any.
    pub fn document(&self) -> Option<FakeDocument> {
        self.state.borrow().document.clone()
    }
}

impl FakeState {
    fn issue(&mut self, object: FakeObject) -> Value {
        let id = self.next_id;
        self.next_id += 1;
        self.objects.insert(id, object);
        Value::Object(ObjectId(id))
    }

    fn lookup(&self, object: ObjectId) -> Result<FakeObject, AutomationError> {
        self.objects
            .get(&object.0)
            .cloned()
            .ok_or(AutomationError::UnknownObject(object))
    }

    fn log(&mut self, object: &FakeObject, member: &str) {
        self.calls.push(format!("{}.{member}", object.type_name()));
    }

    fn document(&self, member: &str) -> Result<&FakeDocument, AutomationError> {
        self.document
            .as_ref()
            .ok_or_else(|| AutomationError::call(member, "no document is open"))
    }

    fn document_mut(&mut self, member: &str) -> Result<&mut FakeDocument, AutomationError> {
        self.document
            .as_mut()
            .ok_or_else(|| AutomationError::call(member, "no document is open"))
    }

    fn table(&self, table: usize, member: &str) -> Result<&FakeTable, AutomationError> {
        self.document(member)?
            .tables
            .get(table)
            .ok_or_else(|| AutomationError::call(member, "table no longer exists"))
    }

    fn get(&mut self, object: &FakeObject, name: &str, args: &[Value]) -> Result<Value, AutomationError> {
        match (object, name) {
            (FakeObject::Application, "Documents") => Ok(self.issue(FakeObject::Documents)),
            (FakeObject::Application, "ActiveDocument") => {
                if self.document.is_none() || self.faults.no_active_document {
                    return Err(AutomationError::call(name, "no active document"));
                }
                Ok(self.issue(FakeObject::Document))
            }
            (FakeObject::Application, "ProcessId") => Ok(Value::Int(FAKE_PROCESS_ID as i32)),
            (FakeObject::Document, "Bookmarks") => {
                self.document(name)?;
                Ok(self.issue(FakeObject::Bookmarks))
            }
            (FakeObject::Bookmarks, "Item") => {
                let key = text_arg(args, 0, name)?;
                if self.document(name)?.bookmark(&key).is_none() {
                    return Err(AutomationError::call(name, "the requested member of the collection does not exist"));
                }
                Ok(self.issue(FakeObject::Bookmark(key)))
            }
            (FakeObject::Bookmark(bookmark), "Range") => {
                let target = match self.document(name)?.bookmark(bookmark) {
                    Some(FakeBookmark { target: BookmarkTarget::Cell { table, row_id, col }, .. }) => {
                        RangeTarget::Cell { table: *table, row_id: *row_id, col: *col }
                    }
                    Some(_) => RangeTarget::Bookmark(bookmark.clone()),
                    None => return Err(AutomationError::call(name, "bookmark was deleted")),
                };
                Ok(self.issue(FakeObject::Range(target)))
            }
            (FakeObject::Range(target), "Tables") => {
                let table = match target {
                    RangeTarget::Cell { table, .. } => Some(*table),
                    RangeTarget::Bookmark(_) => None,
                };
                Ok(self.issue(FakeObject::Tables(table)))
            }
            (FakeObject::Range(target), "Rows") => match target {
                RangeTarget::Cell { table, row_id, .. } => Ok(self.issue(FakeObject::Rows {
                    table: *table,
                    row_ids: vec![*row_id],
                })),
                RangeTarget::Bookmark(_) => Err(AutomationError::call(name, "this is not a valid action outside of a table")),
            },
            (FakeObject::Tables(table), "Count") => Ok(Value::Int(table.map_or(0, |_| 1))),
            (FakeObject::Tables(table), "Item") => match (table, args.first().and_then(Value::as_i32)) {
                (Some(table), Some(1)) => Ok(self.issue(FakeObject::Table(*table))),
                _ => Err(AutomationError::call(name, "the requested member of the collection does not exist")),
            },
            (FakeObject::Rows { row_ids, .. }, "Count") => Ok(Value::Int(row_ids.len() as i32)),
            (FakeObject::Rows { table, row_ids }, "First") => match row_ids.first() {
                Some(row_id) => Ok(self.issue(FakeObject::Row { table: *table, row_id: *row_id })),
                None => Err(AutomationError::call(name, "collection is empty")),
            },
            (FakeObject::Row { table, row_id }, "Index") => {
                let position = self
                    .table(*table, name)?
                    .position(*row_id)
                    .ok_or_else(|| AutomationError::call(name, "row was deleted"))?;
                Ok(Value::Int(position as i32 + 1))
            }
            (FakeObject::Table(table), "Cell") => {
                let row = args.first().and_then(Value::as_i32).unwrap_or(0);
                let col = args.get(1).and_then(Value::as_i32).unwrap_or(0);
                let found = self.table(*table, name)?;
                let row_id = usize::try_from(row)
                    .ok()
                    .and_then(|r| r.checked_sub(1))
                    .and_then(|r| found.rows.get(r))
                    .filter(|r| col >= 1 && (col as usize) <= r.cells.len())
                    .map(|r| r.id)
                    .ok_or_else(|| AutomationError::call(name, "the requested member of the collection does not exist"))?;
                Ok(self.issue(FakeObject::Cell { table: *table, row_id, col: col as usize }))
            }
            (FakeObject::Cell { table, row_id, col }, "Range") => Ok(self.issue(FakeObject::Range(
                RangeTarget::Cell { table: *table, row_id: *row_id, col: *col },
            ))),
            _ => Err(AutomationError::call(name, format!("unknown member of {}", object.type_name()))),
        }
    }

    fn set(&mut self, object: &FakeObject, name: &str, value: Value) -> Result<(), AutomationError> {
        match (object, name) {
            (FakeObject::Application, "Visible" | "DisplayAlerts") => Ok(()),
            (FakeObject::Range(RangeTarget::Bookmark(bookmark)), "Text") => {
                if self.faults.panic_on_bookmark_write {
                    panic!("automation server crashed while writing '{bookmark}'");
                }
                let text = value.as_str().unwrap_or_default().to_string();
                self.document_mut(name)?.bookmark_text.insert(bookmark.clone(), text);
                Ok(())
            }
            (FakeObject::Range(RangeTarget::Cell { table, row_id, col }), "Text") => {
                let text = value.as_str().unwrap_or_default().to_string();
                let fail = self.faults.fail_cell_write;
                let doc = self.document_mut(name)?;
                let table = doc
                    .tables
                    .get_mut(*table)
                    .ok_or_else(|| AutomationError::call(name, "table no longer exists"))?;
                let position = table
                    .position(*row_id)
                    .ok_or_else(|| AutomationError::call(name, "row was deleted"))?;
                if fail == Some((position as i32 + 1, *col as i32)) {
                    return Err(AutomationError::call(name, "the cell is locked"));
                }
                table.rows[position].cells[*col - 1] = text;
                Ok(())
            }
            _ => Err(AutomationError::call(name, format!("unknown property of {}", object.type_name()))),
        }
    }

    fn call(&mut self, object: &FakeObject, name: &str, args: &[Value]) -> Result<Value, AutomationError> {
        match (object, name) {
            (FakeObject::Application, "Quit") => {
                if self.faults.fail_quit {
                    return Err(AutomationError::call(name, "the application is busy"));
                }
                self.document = None;
                self.process_alive = false;
                Ok(Value::Empty)
            }
            (FakeObject::Documents, "Open") => {
                if self.faults.fail_open {
                    return Err(AutomationError::call(name, "the file appears to be corrupted"));
                }
                self.opened_path = Some(text_arg(args, 0, name)?);
                self.document = Some(self.template.clone());
                if self.faults.open_errors_after_load {
                    return Err(AutomationError::call(name, "the call was rejected by callee"));
                }
                if self.faults.open_returns_empty {
                    return Ok(Value::Empty);
                }
                Ok(self.issue(FakeObject::Document))
            }
            (FakeObject::Document, "SaveAs") => {
                if self.faults.fail_save {
                    return Err(AutomationError::call(name, "the disk is full"));
                }
                let path = text_arg(args, 0, name)?;
                let format = args.get(1).and_then(Value::as_i32).unwrap_or(0);
                let document = self.document(name)?.clone();
                self.saved = Some(SavedDocument { path, format, document });
                Ok(Value::Empty)
            }
            (FakeObject::Document, "Close") => {
                if self.faults.fail_close {
                    return Err(AutomationError::call(name, "the document is in use"));
                }
                self.document = None;
                Ok(Value::Empty)
            }
            (FakeObject::Bookmarks, "Exists") => {
                let key = text_arg(args, 0, name)?;
                Ok(Value::Bool(self.document(name)?.bookmark(&key).is_some()))
            }
            (FakeObject::Rows { table, .. }, "Add") => {
                let attempt = self.row_inserts;
                self.row_inserts += 1;
                if self.faults.fail_row_insert_at == Some(attempt) {
                    return Err(AutomationError::call(name, "cannot insert rows here"));
                }
                let reference = args
                    .first()
                    .and_then(Value::as_object)
                    .ok_or_else(|| AutomationError::call(name, "expected a reference row"))?;
                let before = match self.lookup(reference)? {
                    FakeObject::Row { row_id, .. } => row_id,
                    other => return Err(AutomationError::call(name, format!("expected a Row, got {}", other.type_name()))),
                };
                let table = *table;
                let doc = self.document_mut(name)?;
                let row_id = doc.allocate_row_id();
                let rows = &mut doc
                    .tables
                    .get_mut(table)
                    .ok_or_else(|| AutomationError::call(name, "table no longer exists"))?
                    .rows;
                let position = rows
                    .iter()
                    .position(|r| r.id == before)
                    .ok_or_else(|| AutomationError::call(name, "row was deleted"))?;
                let width = rows[position].cells.len();
                // Word inserts the new row before the reference row.
                rows.insert(position, FakeRow { id: row_id, cells: vec![String::new(); width] });
                Ok(self.issue(FakeObject::Row { table, row_id }))
            }
            _ => Err(AutomationError::call(name, format!("unknown method of {}", object.type_name()))),
        }
    }
}

fn text_arg(args: &[Value], index: usize, member: &str) -> Result<String, AutomationError> {
    args.get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AutomationError::call(member, format!("argument {index} must be text")))
}

impl ProcessTerminator for FakeWord {
    fn terminate_process(&self, pid: u32) -> Result<(), ProcessError> {
        let mut state = self.state.borrow_mut();
        state.calls.push("Process.Terminate".to_string());
        if pid != FAKE_PROCESS_ID || !state.process_alive {
            return Err(ProcessError::NotFound(pid));
        }
        match state.faults.terminate {
            TerminateBehavior::Normal => {
                state.process_alive = false;
                state.document = None;
                Ok(())
            }
            TerminateBehavior::Refuse => Err(ProcessError::TerminateFailed {
                pid,
                message: "access is denied".to_string(),
            }),
        }
    }
}

impl AutomationBackend for FakeWord {
    fn create_object(&self, prog_id: &str) -> Result<ObjectId, AutomationError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(format!("CreateObject({prog_id})"));
        if state.faults.fail_launch || prog_id != "Word.Application" {
            return Err(AutomationError::call("CreateObject", format!("class '{prog_id}' is not registered")));
        }
        state.launches += 1;
        state.process_alive = true;
        let app = state.issue(FakeObject::Application);
        app.as_object()
            .ok_or_else(|| AutomationError::call("CreateObject", "no object issued"))
    }

    fn get_property(&self, object: ObjectId, name: &str, args: &[Value]) -> Result<Value, AutomationError> {
        let mut state = self.state.borrow_mut();
        let target = state.lookup(object)?;
        state.log(&target, name);
        state.get(&target, name, args)
    }

    fn set_property(&self, object: ObjectId, name: &str, value: Value) -> Result<(), AutomationError> {
        let mut state = self.state.borrow_mut();
        let target = state.lookup(object)?;
        state.log(&target, name);
        state.set(&target, name, value)
    }

    fn invoke(&self, object: ObjectId, name: &str, args: &[Value]) -> Result<Value, AutomationError> {
        let mut state = self.state.borrow_mut();
        let target = state.lookup(object)?;
        state.log(&target, name);
        state.call(&target, name, args)
    }

    fn release(&self, object: ObjectId) -> Result<(), AutomationError> {
        let mut state = self.state.borrow_mut();
        state
            .objects
            .remove(&object.0)
            .map(|_| ())
            .ok_or(AutomationError::UnknownObject(object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn open(word: &FakeWord) -> (ObjectId, ObjectId) {
        let app = word.create_object("Word.Application").unwrap();
        let docs = word.get_property(app, "Documents", &[]).unwrap().as_object().unwrap();
        let doc = word
            .invoke(docs, "Open", &["C:\\t.docx".into(), false.into(), false.into()])
            .unwrap()
            .as_object()
            .unwrap();
        word.release(docs).unwrap();
        (app, doc)
    }

    #[test]
    fn test_rows_add_inserts_before_reference() {
        let word = FakeWord::new(FakeDocument::inspection_template());
        let (_app, doc) = open(&word);
        let bookmarks = word.get_property(doc, "Bookmarks", &[]).unwrap().as_object().unwrap();
        let mark = word
            .get_property(bookmarks, "Item", &["DataInsertPoint".into()])
            .unwrap()
            .as_object()
            .unwrap();
        let range = word.get_property(mark, "Range", &[]).unwrap().as_object().unwrap();
        let rows = word.get_property(range, "Rows", &[]).unwrap().as_object().unwrap();
        let first = word.get_property(rows, "First", &[]).unwrap().as_object().unwrap();
        assert_eq!(word.get_property(first, "Index", &[]).unwrap(), Value::Int(2));

        word.invoke(rows, "Add", &[Value::Object(first)]).unwrap();
        assert_eq!(word.get_property(first, "Index", &[]).unwrap(), Value::Int(3));

        let table = word.document().unwrap().table(0).unwrap().clone();
        assert_eq!(table.row_count(), 4);
        assert_eq!(table.cell_text(4, 1), Some("Remarks"));
    }

    #[test]
    fn test_released_handles_are_unknown() {
        let word = FakeWord::new(FakeDocument::inspection_template());
        let (app, doc) = open(&word);
        word.release(doc).unwrap();
        assert!(matches!(
            word.get_property(doc, "Bookmarks", &[]),
            Err(AutomationError::UnknownObject(_))
        ));
        word.release(app).unwrap();
        assert_eq!(word.live_handles(), 0);
    }

    #[test]
    fn test_terminate_only_live_process() {
        let word = FakeWord::new(FakeDocument::new());
        assert!(matches!(
            word.terminate_process(FAKE_PROCESS_ID),
            Err(ProcessError::NotFound(_))
        ));
        let app = word.create_object("Word.Application").unwrap();
        assert!(word.process_alive());
        word.terminate_process(FAKE_PROCESS_ID).unwrap();
        assert!(!word.process_alive());
        word.release(app).unwrap();
    }
}
