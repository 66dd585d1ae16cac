//! One running application instance with one open document.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::automation::{AutomationBackend, ObjectId, Value};
use crate::error::{ReportError, Result};
use crate::model::clean_path;
use crate::scope::HandleScope;
use crate::watchdog::ProcessWatchdog;

/// `wdFormatXMLDocument`: the .docx container format.
pub const WD_FORMAT_XML_DOCUMENT: i32 = 16;

/// `wdAlertsNone`.
const WD_ALERTS_NONE: i32 = 0;

/// Owner of the application handle, the document handle and the
/// application's process id.
///
/// Dropping a session that was not [`close`](Self::close)d releases it, and
/// the embedded watchdog then terminates the process if it is still alive.
pub struct AutomationSession<'b> {
    backend: &'b dyn AutomationBackend,
    application: Option<ObjectId>,
    document: Option<ObjectId>,
    // Declared last so it is dropped after `Drop::drop` has released the handles.
    watchdog: ProcessWatchdog<'b, dyn AutomationBackend + 'b>,
}

impl<'b> AutomationSession<'b> {
    /// Start the application and open `template`.
    ///
    /// A missing template is reported before anything is launched. Every
    /// object created along the way is released again if opening fails.
    pub fn open(backend: &'b dyn AutomationBackend, prog_id: &str, template: &Path) -> Result<Self> {
        let template = clean_path(template);
        if !template.is_file() {
            return Err(ReportError::TemplateMissing(template));
        }

        debug!("Creating {prog_id}");
        let application = backend
            .create_object(prog_id)
            .map_err(|e| ReportError::LaunchFailed(e.to_string()))?;

        let mut session = Self {
            backend,
            application: Some(application),
            document: None,
            watchdog: ProcessWatchdog::new(backend),
        };
        session.suppress_ui(application);
        session.track_process(application);

        // On error `session` is dropped here, quitting and releasing the application.
        let document = session.open_document(application, &template)?;
        session.document = Some(document);
        info!("Opened template {}", template.display());
        Ok(session)
    }

    fn suppress_ui(&self, application: ObjectId) {
        if let Err(e) = self.backend.set_property(application, "Visible", Value::Bool(false)) {
            warn!("Could not hide the application window: {e}");
        }
        if let Err(e) = self
            .backend
            .set_property(application, "DisplayAlerts", Value::Int(WD_ALERTS_NONE))
        {
            warn!("Could not disable application alerts: {e}");
        }
    }

    fn track_process(&mut self, application: ObjectId) {
        match self.backend.get_property(application, "ProcessId", &[]) {
            Ok(value) => match value.as_i32().and_then(|pid| u32::try_from(pid).ok()) {
                Some(pid) if pid != 0 => self.watchdog.track(pid),
                _ => debug!("Application reported no usable process id ({value})"),
            },
            Err(e) => debug!("Application process id unavailable: {e}"),
        }
    }

    fn open_document(&self, application: ObjectId, template: &Path) -> Result<ObjectId> {
        let mut scope = HandleScope::new(self.backend);
        let documents = scope
            .property(application, "Documents")
            .map_err(|e| ReportError::DocumentOpenFailed(e.to_string()))?;

        // Open(FileName, ConfirmConversions, ReadOnly, AddToRecentFiles)
        let path = self.backend.native_path(template);
        let opened = self.backend.invoke(
            documents,
            "Open",
            &[
                Value::Text(path),
                Value::Bool(false),
                Value::Bool(false),
                Value::Bool(false),
            ],
        );
        match opened {
            Ok(Value::Object(document)) => return Ok(document),
            Ok(other) => debug!("Documents.Open returned {other}, falling back to ActiveDocument"),
            Err(e) => warn!("Documents.Open failed, falling back to ActiveDocument: {e}"),
        }

        let active = self
            .backend
            .get_property(application, "ActiveDocument", &[])
            .map_err(|e| ReportError::DocumentOpenFailed(e.to_string()))?;
        match active {
            Value::Object(document) => Ok(document),
            other => Err(ReportError::DocumentOpenFailed(format!(
                "ActiveDocument returned {other}"
            ))),
        }
    }

    pub fn backend(&self) -> &'b dyn AutomationBackend {
        self.backend
    }

    /// The open document.
    pub fn document(&self) -> Result<ObjectId> {
        self.document
            .ok_or_else(|| ReportError::DocumentOpenFailed("the session has been released".into()))
    }

    pub fn process_id(&self) -> Option<u32> {
        self.watchdog.tracked()
    }

    /// Save the document as `destination` in `format`, then shut the application down.
    ///
    /// Missing parent directories of `destination` are created first. On
    /// error the session is dropped, which releases it without saving.
    pub fn close(mut self, destination: &Path, format: i32) -> Result<()> {
        let document = self.document()?;
        let destination = clean_path(destination);

        if let Some(dir) = destination.parent().filter(|d| !d.as_os_str().is_empty()) {
            if !dir.is_dir() {
                std::fs::create_dir_all(dir).map_err(|source| {
                    ReportError::DirectoryCreateFailed {
                        path: dir.to_path_buf(),
                        source,
                    }
                })?;
                debug!("Created output directory {}", dir.display());
            }
        }

        let path = self.backend.native_path(&destination);
        self.backend
            .invoke(
                document,
                "SaveAs",
                &[Value::Text(path), Value::Int(format)],
            )
            .map_err(|source| ReportError::SaveFailed {
                path: destination.clone(),
                source,
            })?;
        info!("Saved report to {}", destination.display());

        self.release();
        Ok(())
    }

    /// Close the document without saving and quit the application, tolerating
    /// failures of either, then release both handles. Safe to call repeatedly.
    pub fn release(&mut self) {
        let document = self.document.take();
        let application = self.application.take();

        if let Some(document) = document {
            if let Err(e) = self.backend.invoke(document, "Close", &[Value::Bool(false)]) {
                warn!("Closing the document failed: {e}");
            }
        }
        if let Some(application) = application {
            if let Err(e) = self.backend.invoke(application, "Quit", &[]) {
                warn!("Quitting the application failed: {e}");
            }
        }

        for object in [document, application].into_iter().flatten() {
            if let Err(e) = self.backend.release(object) {
                debug!("Releasing object {object} failed: {e}");
            }
        }
    }
}

impl Drop for AutomationSession<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
