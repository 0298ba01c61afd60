//! Total parse results.
//!
//! Every parse step in this crate produces a usable result for any input.
//! `Parsed` records whether that result is clean or a best-effort recovery.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum Parsed<T> {
    /// The input was well formed.
    Ok(T),
    /// The input was malformed; the payload is the best-effort partial result.
    Degraded(T),
}

impl<T> Parsed<T> {
    pub fn new(value: T, degraded: bool) -> Self {
        if degraded {
            Parsed::Degraded(value)
        } else {
            Parsed::Ok(value)
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Parsed::Ok(value) | Parsed::Degraded(value) => value,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Parsed::Ok(value) | Parsed::Degraded(value) => value,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Parsed::Degraded(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Parsed<U> {
        match self {
            Parsed::Ok(value) => Parsed::Ok(f(value)),
            Parsed::Degraded(value) => Parsed::Degraded(f(value)),
        }
    }
}
