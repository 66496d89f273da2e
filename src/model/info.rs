//! Typed key/value payload carried by drawables
//!
//! A category declares an ordered list of `InfoDescriptor`s; each drawable of
//! that category carries one `InfoSlot` per descriptor. A slot only accepts a
//! value whose representation matches its declared type.

use crate::model::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};

/// Primitive info types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InfoType {
    Str,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl std::fmt::Display for InfoType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InfoType::Str => write!(f, "string"),
            InfoType::I16 => write!(f, "int16"),
            InfoType::I32 => write!(f, "int32"),
            InfoType::I64 => write!(f, "int64"),
            InfoType::F32 => write!(f, "float32"),
            InfoType::F64 => write!(f, "float64"),
        }
    }
}

/// A single info value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InfoValue {
    Str(String),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl InfoValue {
    /// Runtime type of this value
    pub fn info_type(&self) -> InfoType {
        match self {
            InfoValue::Str(_) => InfoType::Str,
            InfoValue::I16(_) => InfoType::I16,
            InfoValue::I32(_) => InfoType::I32,
            InfoValue::I64(_) => InfoType::I64,
            InfoValue::F32(_) => InfoType::F32,
            InfoValue::F64(_) => InfoType::F64,
        }
    }

    /// Widen numeric values for statistics
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            InfoValue::Str(_) => None,
            InfoValue::I16(v) => Some(*v as f64),
            InfoValue::I32(v) => Some(*v as f64),
            InfoValue::I64(v) => Some(*v as f64),
            InfoValue::F32(v) => Some(*v as f64),
            InfoValue::F64(v) => Some(*v),
        }
    }
}

impl std::fmt::Display for InfoValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InfoValue::Str(s) => write!(f, "{}", s),
            InfoValue::I16(v) => write!(f, "{}", v),
            InfoValue::I32(v) => write!(f, "{}", v),
            InfoValue::I64(v) => write!(f, "{}", v),
            InfoValue::F32(v) => write!(f, "{}", v),
            InfoValue::F64(v) => write!(f, "{}", v),
        }
    }
}

/// Named, typed field of a category's info schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoDescriptor {
    pub name: String,
    pub ty: InfoType,
}

impl InfoDescriptor {
    pub fn new(name: impl Into<String>, ty: InfoType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Declared type plus an optional value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoSlot {
    ty: InfoType,
    value: Option<InfoValue>,
}

impl InfoSlot {
    /// Empty slot of the given type
    pub fn declared(ty: InfoType) -> Self {
        Self { ty, value: None }
    }

    /// Slot holding `value`, typed by the value itself
    pub fn with_value(value: InfoValue) -> Self {
        Self {
            ty: value.info_type(),
            value: Some(value),
        }
    }

    pub fn info_type(&self) -> InfoType {
        self.ty
    }

    pub fn value(&self) -> Option<&InfoValue> {
        self.value.as_ref()
    }

    /// Assign a value; a mismatched type is rejected and the slot keeps its old value
    pub fn set(&mut self, value: InfoValue) -> ModelResult<()> {
        let actual = value.info_type();
        if actual != self.ty {
            return Err(ModelError::TypeMismatch {
                declared: self.ty,
                actual,
            });
        }
        self.value = Some(value);
        Ok(())
    }
}

/// Fresh, empty slots for a schema
pub fn slots_for(schema: &[InfoDescriptor]) -> Vec<InfoSlot> {
    schema.iter().map(|d| InfoSlot::declared(d.ty)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_matching_type() {
        let mut slot = InfoSlot::declared(InfoType::I32);
        slot.set(InfoValue::I32(42)).unwrap();
        assert_eq!(slot.value(), Some(&InfoValue::I32(42)));
    }

    #[test]
    fn test_mismatch_leaves_slot_unchanged() {
        let mut slot = InfoSlot::declared(InfoType::I32);
        slot.set(InfoValue::I32(1)).unwrap();

        let err = slot.set(InfoValue::I64(2)).unwrap_err();
        assert_eq!(
            err,
            ModelError::TypeMismatch {
                declared: InfoType::I32,
                actual: InfoType::I64
            }
        );
        assert_eq!(slot.value(), Some(&InfoValue::I32(1)));

        assert!(slot.set(InfoValue::Str("x".into())).is_err());
        assert_eq!(slot.value(), Some(&InfoValue::I32(1)));
    }

    #[test]
    fn test_slots_for_schema() {
        let schema = vec![
            InfoDescriptor::new("msg_tag", InfoType::I32),
            InfoDescriptor::new("comment", InfoType::Str),
        ];
        let slots = slots_for(&schema);

        assert_eq!(slots.len(), 2);
        assert_eq!(slots[1].info_type(), InfoType::Str);
        assert!(slots.iter().all(|s| s.value().is_none()));
    }

    #[test]
    fn test_as_f64() {
        assert_eq!(InfoValue::I16(-3).as_f64(), Some(-3.0));
        assert_eq!(InfoValue::F32(0.5).as_f64(), Some(0.5));
        assert_eq!(InfoValue::Str("a".into()).as_f64(), None);
    }
}
