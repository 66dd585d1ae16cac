//! End-to-end generation of one report.
//!
//! ```text
//! Idle -> TemplateResolved -> SessionOpen -> StaticFieldsFilled
//!      -> TableFilled -> Saved -> Closed
//! ```
//!
//! Any step may move to `Failed` instead. The session is a local of the run,
//! so whichever way the run ends (error return or panic) it is released
//! before [`ReportOrchestrator::generate`] returns.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::automation::AutomationBackend;
use crate::config::ReportConfig;
use crate::error::{ReportError, Result};
use crate::expander;
use crate::filler;
use crate::model::{clean_path, FieldValue, InspectionParam, ProductParam, ReportRequest};
use crate::notify::Notifier;
use crate::session::AutomationSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportState {
    Idle,
    TemplateResolved,
    SessionOpen,
    StaticFieldsFilled,
    TableFilled,
    Saved,
    Closed,
    Failed,
}

#[derive(Debug)]
pub enum ReportOutcome {
    Saved(PathBuf),
    /// The request had no inspection parameters; nothing was launched.
    NothingToDo,
    Failed(ReportError),
}

impl ReportOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, ReportOutcome::Saved(_))
    }
}

enum Completed {
    Saved(PathBuf),
    NothingToDo,
}

/// Runs report requests against one automation backend, one at a time.
pub struct ReportOrchestrator<'b> {
    backend: &'b dyn AutomationBackend,
    config: ReportConfig,
    notifier: Option<Notifier>,
    states: Vec<ReportState>,
}

impl<'b> ReportOrchestrator<'b> {
    pub fn new(backend: &'b dyn AutomationBackend, config: ReportConfig) -> Self {
        Self {
            backend,
            config,
            notifier: None,
            states: vec![ReportState::Idle],
        }
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// States passed through by the most recent run, starting with `Idle`.
    pub fn states(&self) -> &[ReportState] {
        &self.states
    }

    pub fn state(&self) -> ReportState {
        self.states.last().copied().unwrap_or(ReportState::Idle)
    }

    /// Generate the report described by `request`.
    pub fn generate(&mut self, request: &ReportRequest) -> ReportOutcome {
        self.states.clear();
        self.states.push(ReportState::Idle);
        info!(
            "Generating report: template={}, destination={}, {} parameter(s)",
            request.template.display(),
            request.destination.display(),
            request.inspections.len()
        );

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.run(request)))
            .unwrap_or_else(|payload| Err(ReportError::Panicked(panic_message(payload))));

        match result {
            Ok(Completed::Saved(path)) => {
                self.notify_info("Report generated", &format!("Report saved to:\n{}", path.display()));
                ReportOutcome::Saved(path)
            }
            Ok(Completed::NothingToDo) => {
                warn!("No inspection parameters, skipping report generation");
                self.notify_warning(
                    "Nothing to do",
                    "No inspection parameters; report generation skipped.",
                );
                ReportOutcome::NothingToDo
            }
            Err(e) => {
                self.enter(ReportState::Failed);
                error!("Report generation failed: {e}");
                self.notify_error("Report generation failed", &e.to_string());
                ReportOutcome::Failed(e)
            }
        }
    }

    fn run(&mut self, request: &ReportRequest) -> Result<Completed> {
        let template = clean_path(&request.template);
        let destination = clean_path(&request.destination);
        if template.as_os_str().is_empty() || destination.as_os_str().is_empty() {
            return Err(ReportError::InvalidRequest(
                "template path or destination path is not set".into(),
            ));
        }
        if request.inspections.is_empty() {
            return Ok(Completed::NothingToDo);
        }

        let scratch = ScratchTemplate::resolve(&template, &self.config.scratch_dir())?;
        if scratch.is_original() && same_file(&template, &destination) {
            return Err(ReportError::InvalidRequest(
                "destination is the template itself and no working copy could be made".into(),
            ));
        }
        self.enter(ReportState::TemplateResolved);

        let session = AutomationSession::open(self.backend, &self.config.prog_id, scratch.path())?;
        self.enter(ReportState::SessionOpen);

        self.fill_product(&session, &request.product);
        self.enter(ReportState::StaticFieldsFilled);

        self.fill_table(&session, &request.product, &request.inspections)?;
        self.enter(ReportState::TableFilled);

        session.close(&destination, self.config.save_format)?;
        self.enter(ReportState::Saved);

        drop(scratch);
        self.enter(ReportState::Closed);
        Ok(Completed::Saved(destination))
    }

    fn fill_product(&self, session: &AutomationSession<'_>, product: &ProductParam) {
        let names = &self.config.placeholders;
        let fields = [
            (&names.job_order, &product.job_order),
            (&names.customer, &product.customer),
            (&names.material_grade, &product.material_grade),
            (&names.product_serial_no, &product.product_serial_no),
            (&names.inspector, &product.inspector),
            (&names.reviewer, &product.reviewer),
        ];
        for (name, text) in fields {
            if let Err(e) = filler::fill_placeholder(session, name, text) {
                warn!("Filling bookmark '{name}' failed: {e}");
            }
        }
    }

    fn fill_table(
        &self,
        session: &AutomationSession<'_>,
        product: &ProductParam,
        inspections: &[InspectionParam],
    ) -> Result<()> {
        let extra_rows = inspections.len().saturating_sub(1);
        let expanded = expander::expand(session, &self.config.data_anchor, extra_rows)?;

        for (offset, param) in inspections.iter().enumerate() {
            let row = expanded.data_row(offset)?;
            for (col, value) in (1..).zip(row_values(param, product).iter()) {
                if let Err(e) = filler::fill_cell(session, expanded.table(), row, col, Some(value)) {
                    warn!("{e}");
                }
            }
        }
        debug!("Filled {} table row(s)", inspections.len());
        Ok(())
    }

    fn enter(&mut self, state: ReportState) {
        debug!("Report state: {state:?}");
        self.states.push(state);
    }

    fn notify_info(&self, title: &str, body: &str) {
        if let Some(notifier) = &self.notifier {
            notifier.info(title, body);
        }
    }

    fn notify_warning(&self, title: &str, body: &str) {
        if let Some(notifier) = &self.notifier {
            notifier.warning(title, body);
        }
    }

    fn notify_error(&self, title: &str, body: &str) {
        if let Some(notifier) = &self.notifier {
            notifier.error(title, body);
        }
    }
}

/// Column 1 to 5 of a data row: name, tool, tool number, nominal value and
/// `"<actual> <offset>"`.
pub fn row_values(param: &InspectionParam, product: &ProductParam) -> [FieldValue; 5] {
    [
        FieldValue::text(param.name.as_str()),
        FieldValue::text(product.measurement_tool.as_str()),
        FieldValue::text(product.measurement_no.as_str()),
        param.default_value.clone(),
        FieldValue::Text(param.actual_with_offset()),
    ]
}

/// Working copy of the template, removed again when dropped.
struct ScratchTemplate {
    path: PathBuf,
    copied: bool,
}

impl ScratchTemplate {
    /// Copy `template` into `scratch_dir`. If that fails the original path
    /// is used, which exposes the caller's template to the automated
    /// application; this is logged as a warning.
    fn resolve(template: &Path, scratch_dir: &Path) -> Result<Self> {
        if !template.is_file() {
            // Let the session report the missing template.
            return Ok(Self::original(template));
        }
        let extension = template
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("docx");
        let name = format!(
            "temp_report_{}.{extension}",
            chrono::Utc::now().timestamp_millis()
        );
        let path = scratch_dir.join(name);
        remove_stale(&path);
        match std::fs::copy(template, &path) {
            Ok(_) => {
                debug!("Copied template to {}", path.display());
                Ok(Self { path, copied: true })
            }
            Err(e) => {
                warn!(
                    "Copying template to {} failed ({e}); opening the original template {} directly",
                    path.display(),
                    template.display()
                );
                Ok(Self::original(template))
            }
        }
    }

    fn original(template: &Path) -> Self {
        Self {
            path: template.to_path_buf(),
            copied: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn is_original(&self) -> bool {
        !self.copied
    }
}

impl Drop for ScratchTemplate {
    fn drop(&mut self) {
        if self.copied {
            if let Err(e) = std::fs::remove_file(&self.path) {
                debug!("Removing {} failed: {e}", self.path.display());
            }
        }
    }
}

fn remove_stale(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            debug!("Removing stale {} failed: {e}", path.display());
        }
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_row_values_layout() {
        let product = ProductParam {
            measurement_tool: "Caliper".into(),
            measurement_no: "C-7".into(),
            ..Default::default()
        };
        let mut param = InspectionParam::new("D1");
        param.default_value = FieldValue::Number(10.0);
        param.actual_value = FieldValue::Number(10.05);
        param.offset = FieldValue::Number(0.05);

        let texts: Vec<String> = row_values(&param, &product).iter().map(|v| v.to_string()).collect();
        assert_eq!(texts, vec!["D1", "Caliper", "C-7", "10", "10.05 0.05"]);
    }

    #[test]
    fn test_scratch_copy_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("t.docx");
        std::fs::write(&template, b"docx").unwrap();
        let scratch_dir = dir.path().join("scratch");
        std::fs::create_dir(&scratch_dir).unwrap();

        let scratch = ScratchTemplate::resolve(&template, &scratch_dir).unwrap();
        assert!(!scratch.is_original());
        let copy = scratch.path().to_path_buf();
        assert!(copy.starts_with(&scratch_dir));
        assert!(copy.is_file());
        drop(scratch);
        assert!(!copy.exists());
        assert!(template.is_file());
    }

    #[test]
    fn test_remove_stale_tolerates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("temp_report_1.docx");
        std::fs::write(&stale, b"old").unwrap();
        remove_stale(&stale);
        assert!(!stale.exists());

        // remove_file refuses directories; the failure is logged, not raised.
        let squatter = dir.path().join("temp_report_2.docx");
        std::fs::create_dir(&squatter).unwrap();
        remove_stale(&squatter);
        assert!(squatter.is_dir());

        remove_stale(&dir.path().join("temp_report_3.docx"));
    }

    #[test]
    fn test_scratch_falls_back_to_original() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("t.docx");
        std::fs::write(&template, b"docx").unwrap();

        let scratch = ScratchTemplate::resolve(&template, &dir.path().join("missing")).unwrap();
        assert!(scratch.is_original());
        assert_eq!(scratch.path(), template.as_path());
        drop(scratch);
        assert!(template.is_file());
    }
}
