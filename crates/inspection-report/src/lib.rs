//! Inspection report generation by driving Word through its automation object model.
//!
//! Measurement results (one CSV export per product) are merged into a Word
//! template: bookmarks receive the product fields, and the measurement table
//! is grown in place so that every inspection parameter gets its own row. The
//! generated document is saved as `.docx`.
//!
//! # Architecture
//!
//! ```text
//! ReportOrchestrator
//!     └── AutomationSession (application + document, RAII)
//!           └── dyn AutomationBackend
//!                 ├── BridgeBackend: spawns [wine] word-com-bridge.exe
//!                 │     └── COM: Word.Application
//!                 └── FakeWord: in-memory object model (`fake` feature)
//! ```
//!
//! Every object the backend hands out is released on every path, normal or
//! not, and the application process is terminated if it outlives its
//! session.
//!
//! # Example
//!
//! ```rust,no_run
//! use inspection_report::{
//!     load_inspection_params, BridgeBackend, ReportConfig, ReportOrchestrator, ReportOutcome,
//!     ReportRequest,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ReportConfig::default();
//!     let backend = BridgeBackend::start(&config.bridge)?;
//!     let request = ReportRequest::new(&config.template, "reports/SN-01.docx")
//!         .with_inspections(load_inspection_params("measurements/SN-01.csv")?);
//!
//!     let mut orchestrator = ReportOrchestrator::new(&backend, config);
//!     if let ReportOutcome::Failed(e) = orchestrator.generate(&request) {
//!         eprintln!("{e}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod automation;
pub mod bridge;
pub mod config;
pub mod csv_input;
pub mod error;
pub mod expander;
#[cfg(any(test, feature = "fake"))]
pub mod fake;
pub mod filler;
pub mod model;
pub mod notify;
pub mod orchestrator;
pub mod scope;
pub mod session;
pub mod watchdog;

pub use automation::{AutomationBackend, ObjectId, ProcessTerminator, Value};
pub use bridge::{linux_to_wine_path, BridgeBackend, BridgeConfig};
pub use config::{PlaceholderNames, ReportConfig};
pub use csv_input::{list_csv_files, load_inspection_params, read_inspection_params};
pub use error::{AutomationError, ConfigError, InputError, ProcessError, ReportError};
pub use model::{FieldValue, InspectionParam, ProductParam, ReportRequest};
pub use notify::{Notification, NotificationLevel, NotificationQueue, Notifier};
pub use orchestrator::{ReportOrchestrator, ReportOutcome, ReportState};
pub use session::AutomationSession;
