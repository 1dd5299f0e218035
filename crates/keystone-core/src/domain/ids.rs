//! Domain identifiers.
//!
//! - `ModuleId`: the stable key a module is registered under (e.g. `"database"`).
//! - `PassId`: ULID of one bulk start/shutdown pass, used to correlate logs.
//!
//! `Id<T>` keeps the phantom-marker layout so that further ULID-based ids can
//! be added without repeating the Display/serde plumbing.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// Stable identity of a module.
///
/// Ordering is lexical; the orchestrator relies on it for deterministic
/// iteration (logs, status output, bulk failure lists).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ModuleId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ModuleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for ModuleId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// IdMarker provides the Display prefix of a ULID-based id.
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ULID-based id, typed by a zero-sized marker.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Pass のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Pass {}

impl IdMarker for Pass {
    fn prefix() -> &'static str {
        "pass-"
    }
}

/// Identifier of one bulk start or shutdown pass.
pub type PassId = Id<Pass>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_id_displays_its_key() {
        let id = ModuleId::new("database");
        assert_eq!(id.to_string(), "database");
        assert_eq!(id.as_str(), "database");
        assert_eq!(ModuleId::from("database"), id);
    }

    #[test]
    fn module_ids_sort_lexically() {
        let mut ids = vec![ModuleId::from("c"), ModuleId::from("a"), ModuleId::from("b")];
        ids.sort();
        assert_eq!(ids, vec![ModuleId::from("a"), ModuleId::from("b"), ModuleId::from("c")]);
    }

    #[test]
    fn module_id_serializes_as_plain_string() {
        let id = ModuleId::new("cache");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"cache\"");
        let back: ModuleId = serde_json::from_str("\"cache\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn pass_id_has_prefix() {
        let ulid = Ulid::new();
        let pass = PassId::from_ulid(ulid);
        assert_eq!(pass.as_ulid(), ulid);
        assert!(pass.to_string().starts_with("pass-"));
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        assert_eq!(std::mem::size_of::<PassId>(), std::mem::size_of::<Ulid>());
    }
}
