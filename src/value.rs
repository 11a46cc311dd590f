//! typed values that flow through a [`crate::row::RowData`].

use std::sync::Arc;

/// one row value. `HostString` models a reference-counted, host-owned string (the host
/// binding hands out a view into its own memory rather than a copy); everything else is
/// owned by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum RValue {
    Number(f64),
    String(Vec<u8>),
    HostString(Arc<str>),
    /// a reducer (e.g. `ToList`) collecting multiple values under one key.
    Array(Vec<RValue>),
    Null,
}

impl RValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RValue::Null)
    }
}

impl From<f64> for RValue {
    fn from(n: f64) -> Self {
        RValue::Number(n)
    }
}

impl From<&str> for RValue {
    fn from(s: &str) -> Self {
        RValue::String(s.as_bytes().to_vec())
    }
}

impl From<String> for RValue {
    fn from(s: String) -> Self {
        RValue::String(s.into_bytes())
    }
}
