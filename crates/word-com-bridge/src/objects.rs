//! The bridge's handle table and the mapping between protocol values and VARIANTs.

#![cfg(windows)]

use std::collections::HashMap;

use windows::Win32::System::Variant::VT_DISPATCH;
use word_com_protocol::{FaultKind, ObjectId, Value};

use crate::dispatch::{DispatchObject, Variant};
use crate::Fault;

/// Live COM objects addressed by protocol id. Ids start at 1 and are never reused.
pub struct ObjectTable {
    objects: HashMap<u64, DispatchObject>,
    next_id: u64,
}

impl ObjectTable {
    pub fn new() -> Self {
        Self {
            objects: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn insert(&mut self, object: DispatchObject) -> ObjectId {
        let id = self.next_id;
        self.next_id += 1;
        self.objects.insert(id, object);
        ObjectId(id)
    }

    pub fn get(&self, id: ObjectId) -> Result<&DispatchObject, Fault> {
        self.objects.get(&id.0).ok_or_else(|| unknown(id))
    }

    /// Drop the table's reference to `id`.
    pub fn remove(&mut self, id: ObjectId) -> Result<(), Fault> {
        self.objects.remove(&id.0).map(drop).ok_or_else(|| unknown(id))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Release every object, newest first.
    pub fn clear(&mut self) {
        let mut ids: Vec<u64> = self.objects.keys().copied().collect();
        ids.sort_unstable_by(|a, b| b.cmp(a));
        for id in ids {
            self.objects.remove(&id);
        }
    }

    pub fn to_variant(&self, value: &Value) -> Result<Variant, Fault> {
        Ok(match value {
            Value::Empty => Variant::empty(),
            Value::Bool(b) => Variant::bool(*b),
            Value::Int(i) => Variant::int(*i),
            Value::Double(d) => Variant::double(*d),
            Value::Text(s) => Variant::text(s),
            Value::Object(id) => Variant::dispatch(self.get(*id)?.as_idispatch()),
        })
    }

    pub fn to_variants(&self, values: &[Value]) -> Result<Vec<Variant>, Fault> {
        values.iter().map(|v| self.to_variant(v)).collect()
    }

    /// Convert a call result. A returned object gets its own reference in
    /// the table; the result's reference is released when `variant` drops.
    pub fn value_from(&mut self, variant: &Variant) -> Result<Value, Fault> {
        if variant.is_empty() {
            return Ok(Value::Empty);
        }
        if variant.vt() == VT_DISPATCH {
            return Ok(match variant.to_dispatch() {
                Some(disp) => Value::Object(self.insert(DispatchObject::from_idispatch(disp))),
                None => Value::Empty,
            });
        }
        variant
            .as_bool()
            .map(Value::Bool)
            .or_else(|| variant.as_i32().map(Value::Int))
            .or_else(|| variant.as_f64().map(Value::Double))
            .or_else(|| variant.to_text().map(Value::Text))
            .ok_or_else(|| {
                Fault::new(
                    FaultKind::Exception,
                    format!("unsupported VARIANT type VT={}", variant.vt().0),
                )
            })
    }
}

fn unknown(id: ObjectId) -> Fault {
    Fault::new(FaultKind::UnknownObject, format!("unknown object {id}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_values_cross_the_table() {
        let mut table = ObjectTable::new();
        for value in [
            Value::Empty,
            Value::Bool(false),
            Value::Int(42),
            Value::Double(0.125),
            Value::Text("INVALID".into()),
        ] {
            let variant = table.to_variant(&value).unwrap();
            assert_eq!(table.value_from(&variant).unwrap(), value);
        }
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_unknown_object_argument_is_rejected() {
        let table = ObjectTable::new();
        let fault = table.to_variants(&[Value::Int(1), Value::Object(ObjectId(9))]).err().unwrap();
        assert_eq!(fault.kind, FaultKind::UnknownObject);
    }
}
