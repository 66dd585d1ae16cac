//! The late-bound automation surface the report generator drives.
//!
//! Every object the automated application hands out is addressed by an
//! [`ObjectId`]; every id returned by a backend must eventually be passed to
//! [`AutomationBackend::release`]. Callers normally never do that by hand and
//! go through [`crate::scope::HandleScope`] instead.

use std::path::Path;

pub use word_com_protocol::{ObjectId, Value};

use crate::error::{AutomationError, ProcessError};

/// Forced termination of an OS process.
pub trait ProcessTerminator {
    /// Terminate `pid`. Returns [`ProcessError::NotFound`] when no handle to
    /// the process can be acquired.
    fn terminate_process(&self, pid: u32) -> Result<(), ProcessError>;
}

/// An automation object model reachable through late binding.
///
/// Implementations are single-apartment: all calls for one backend value
/// must come from the thread that created it, which is why the methods take
/// `&self` and implementations are free to be `!Sync`.
pub trait AutomationBackend: ProcessTerminator {
    /// Create a top-level object (starting the application if needed).
    fn create_object(&self, prog_id: &str) -> Result<ObjectId, AutomationError>;

    /// Read a property; `args` index it (`Item("name")`, `Cell(r, c)`).
    fn get_property(
        &self,
        object: ObjectId,
        name: &str,
        args: &[Value],
    ) -> Result<Value, AutomationError>;

    /// Assign a property.
    fn set_property(&self, object: ObjectId, name: &str, value: Value)
        -> Result<(), AutomationError>;

    /// Call a method.
    fn invoke(&self, object: ObjectId, name: &str, args: &[Value])
        -> Result<Value, AutomationError>;

    /// Drop the reference to `object`. The id is invalid afterwards.
    fn release(&self, object: ObjectId) -> Result<(), AutomationError>;

    /// Render a local path the way the automated application expects it.
    fn native_path(&self, path: &Path) -> String {
        path.display().to_string()
    }
}

/// Require `value` to be an object reference.
pub(crate) fn expect_object(value: Value, member: &str) -> Result<ObjectId, AutomationError> {
    match value {
        Value::Object(id) => Ok(id),
        other => Err(AutomationError::NotAnObject {
            member: member.to_string(),
            found: other.to_string(),
        }),
    }
}
