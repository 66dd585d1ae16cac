//! Deterministic release of automation handles.
//!
//! A [`HandleScope`] collects every object id acquired while it is alive and
//! releases them in reverse order when dropped, so early returns and unwinding
//! panics leave nothing behind in the automated application.

use tracing::debug;

use crate::automation::{expect_object, AutomationBackend, ObjectId, Value};
use crate::error::AutomationError;

/// Owner of a set of acquired handles.
pub struct HandleScope<'b> {
    backend: &'b dyn AutomationBackend,
    handles: Vec<ObjectId>,
}

impl<'b> HandleScope<'b> {
    pub fn new(backend: &'b dyn AutomationBackend) -> Self {
        Self {
            backend,
            handles: Vec::new(),
        }
    }

    pub fn backend(&self) -> &'b dyn AutomationBackend {
        self.backend
    }

    /// Take ownership of an id obtained elsewhere.
    pub fn adopt(&mut self, object: ObjectId) -> ObjectId {
        self.handles.push(object);
        object
    }

    /// Take ownership of `value` if it is an object reference.
    pub fn adopt_value(&mut self, value: &Value) -> Option<ObjectId> {
        value.as_object().map(|id| self.adopt(id))
    }

    /// `object.name` as a child object.
    pub fn property(&mut self, object: ObjectId, name: &str) -> Result<ObjectId, AutomationError> {
        self.indexed(object, name, &[])
    }

    /// `object.name(args...)` as a child object.
    pub fn indexed(
        &mut self,
        object: ObjectId,
        name: &str,
        args: &[Value],
    ) -> Result<ObjectId, AutomationError> {
        let value = self.backend.get_property(object, name, args)?;
        let child = expect_object(value, name)?;
        Ok(self.adopt(child))
    }

    /// Hand one owned handle out of the scope so it survives the scope's drop.
    pub fn detach(&mut self, object: ObjectId) -> Option<ObjectGuard<'b>> {
        let pos = self.handles.iter().rposition(|h| *h == object)?;
        self.handles.remove(pos);
        Some(ObjectGuard::new(self.backend, object))
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Release everything held so far, newest first.
    pub fn release_all(&mut self) {
        while let Some(object) = self.handles.pop() {
            release_quietly(self.backend, object);
        }
    }
}

impl Drop for HandleScope<'_> {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// Owner of exactly one handle.
pub struct ObjectGuard<'b> {
    backend: &'b dyn AutomationBackend,
    object: ObjectId,
}

impl<'b> ObjectGuard<'b> {
    pub fn new(backend: &'b dyn AutomationBackend, object: ObjectId) -> Self {
        Self { backend, object }
    }

    pub fn id(&self) -> ObjectId {
        self.object
    }
}

impl Drop for ObjectGuard<'_> {
    fn drop(&mut self) {
        release_quietly(self.backend, self.object);
    }
}

fn release_quietly(backend: &dyn AutomationBackend, object: ObjectId) {
    if let Err(e) = backend.release(object) {
        debug!("Releasing object {object} failed: {e}");
    }
}
