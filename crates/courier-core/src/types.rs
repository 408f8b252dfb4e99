//! # Domain Types
//!
//! Core types used throughout Courier.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   QueueItem     │   │  Capabilities   │   │   DrainState    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  key (QueueKey) │   │  object_store   │   │  Idle           │       │
//! │  │  name           │   │  relational     │   │  Draining       │       │
//! │  │  payload        │   │                 │   │                 │       │
//! │  └─────────────────┘   └────────┬────────┘   └─────────────────┘       │
//! │                                 │ select_backend()                      │
//! │                                 ▼                                       │
//! │                        ┌─────────────────┐                              │
//! │                        │  BackendKind    │                              │
//! │                        │  ObjectStore    │  (preferred)                 │
//! │                        │  Relational     │                              │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// =============================================================================
// Queue Key
// =============================================================================

/// Backend-assigned key of a queued item.
///
/// Keys are strictly increasing over the lifetime of a store. Gaps are
/// allowed (deleted items never give their key back), so ordering by key is
/// ordering by enqueue time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueKey(u64);

impl QueueKey {
    /// Wraps a raw key value.
    pub const fn new(raw: u64) -> Self {
        QueueKey(raw)
    }

    /// Returns the raw key value.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns the key following this one.
    pub const fn next(self) -> Self {
        QueueKey(self.0 + 1)
    }
}

impl From<u64> for QueueKey {
    fn from(raw: u64) -> Self {
        QueueKey(raw)
    }
}

impl std::fmt::Display for QueueKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Queue Item
// =============================================================================

/// A unit of work waiting for delivery.
///
/// Created by a successful enqueue and immutable until the backend deletes
/// it, which only happens after the remote endpoint confirmed delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Ordering key assigned by the backend.
    pub key: QueueKey,
    /// Caller-supplied name (usually a file name). Not unique.
    pub name: String,
    /// Opaque payload, already encoded by the caller (e.g. base64 text).
    pub payload: String,
}

impl QueueItem {
    /// Creates a queue item.
    pub fn new(key: QueueKey, name: impl Into<String>, payload: impl Into<String>) -> Self {
        QueueItem {
            key,
            name: name.into(),
            payload: payload.into(),
        }
    }
}

// =============================================================================
// Backend Kind
// =============================================================================

/// The two interchangeable persistence engines.
///
/// Declaration order is the selection preference: the object store is
/// preferred over the relational store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Object/cursor-oriented transactional store (Backend A).
    ObjectStore,
    /// Relational transactional store (Backend B).
    Relational,
}

impl BackendKind {
    /// All kinds, in preference order.
    pub const PREFERENCE: [BackendKind; 2] = [BackendKind::ObjectStore, BackendKind::Relational];
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::ObjectStore => write!(f, "object"),
            BackendKind::Relational => write!(f, "relational"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "object" | "object_store" | "redb" => Ok(BackendKind::ObjectStore),
            "relational" | "sql" | "sqlite" => Ok(BackendKind::Relational),
            _ => Err(ValidationError::NotAllowed {
                field: "backend".to_string(),
                allowed: vec!["object".to_string(), "relational".to_string()],
            }),
        }
    }
}

// =============================================================================
// Backend Preference
// =============================================================================

/// Host-side restriction on which backend may be chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendPreference {
    /// Use the first available backend in preference order.
    #[default]
    Auto,
    /// Only ever use the object store.
    Object,
    /// Only ever use the relational store.
    Relational,
}

impl std::fmt::Display for BackendPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendPreference::Auto => write!(f, "auto"),
            BackendPreference::Object => write!(f, "object"),
            BackendPreference::Relational => write!(f, "relational"),
        }
    }
}

impl std::str::FromStr for BackendPreference {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(BackendPreference::Auto),
            "object" | "object_store" | "redb" => Ok(BackendPreference::Object),
            "relational" | "sql" | "sqlite" => Ok(BackendPreference::Relational),
            _ => Err(ValidationError::NotAllowed {
                field: "backend".to_string(),
                allowed: vec![
                    "auto".to_string(),
                    "object".to_string(),
                    "relational".to_string(),
                ],
            }),
        }
    }
}

// =============================================================================
// Capabilities
// =============================================================================

/// Capability descriptor supplied by the host at construction time.
///
/// Says which persistence engines the platform can offer. The facade reads
/// it exactly once, when it connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// The object/cursor-oriented store is usable.
    pub object_store: bool,
    /// The relational store is usable.
    pub relational_store: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities::all()
    }
}

impl Capabilities {
    /// Both engines available.
    pub const fn all() -> Self {
        Capabilities {
            object_store: true,
            relational_store: true,
        }
    }

    /// No durable engine available (offline mode unsupported).
    pub const fn none() -> Self {
        Capabilities {
            object_store: false,
            relational_store: false,
        }
    }

    /// Only the object store.
    pub const fn object_only() -> Self {
        Capabilities {
            object_store: true,
            relational_store: false,
        }
    }

    /// Only the relational store.
    pub const fn relational_only() -> Self {
        Capabilities {
            object_store: false,
            relational_store: true,
        }
    }

    /// Returns true if the given engine is offered.
    pub fn supports(&self, kind: BackendKind) -> bool {
        match kind {
            BackendKind::ObjectStore => self.object_store,
            BackendKind::Relational => self.relational_store,
        }
    }

    /// Returns true if at least one durable engine is offered.
    pub fn is_offline_capable(&self) -> bool {
        self.object_store || self.relational_store
    }

    /// Narrows the descriptor to what the preference allows.
    pub fn restrict(self, preference: BackendPreference) -> Self {
        match preference {
            BackendPreference::Auto => self,
            BackendPreference::Object => Capabilities {
                object_store: self.object_store,
                relational_store: false,
            },
            BackendPreference::Relational => Capabilities {
                object_store: false,
                relational_store: self.relational_store,
            },
        }
    }

    /// Picks the first available engine in preference order.
    pub fn select_backend(&self) -> Option<BackendKind> {
        BackendKind::PREFERENCE
            .into_iter()
            .find(|kind| self.supports(*kind))
    }
}

// =============================================================================
// Drain State
// =============================================================================

/// State of a drain controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainState {
    /// No drain is in flight or scheduled.
    #[default]
    Idle,
    /// A drain cycle is peeking, uploading or deleting.
    Draining,
}

impl DrainState {
    /// Returns true when no drain is in flight.
    pub fn is_idle(&self) -> bool {
        matches!(self, DrainState::Idle)
    }
}

impl std::fmt::Display for DrainState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DrainState::Idle => write!(f, "idle"),
            DrainState::Draining => write!(f, "draining"),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_key_ordering() {
        let a = QueueKey::new(1);
        let b = a.next();
        assert!(a < b);
        assert_eq!(b.get(), 2);
        assert_eq!(b.to_string(), "2");
    }

    #[test]
    fn test_backend_selection_prefers_object_store() {
        assert_eq!(
            Capabilities::all().select_backend(),
            Some(BackendKind::ObjectStore)
        );
        assert_eq!(
            Capabilities::relational_only().select_backend(),
            Some(BackendKind::Relational)
        );
        assert_eq!(Capabilities::none().select_backend(), None);
        assert!(!Capabilities::none().is_offline_capable());
    }

    #[test]
    fn test_capabilities_restrict() {
        let caps = Capabilities::all().restrict(BackendPreference::Relational);
        assert_eq!(caps.select_backend(), Some(BackendKind::Relational));

        // Restricting to an engine the host lacks leaves nothing
        let caps = Capabilities::relational_only().restrict(BackendPreference::Object);
        assert_eq!(caps.select_backend(), None);

        let caps = Capabilities::object_only().restrict(BackendPreference::Auto);
        assert_eq!(caps.select_backend(), Some(BackendKind::ObjectStore));
    }

    #[test]
    fn test_backend_parsing() {
        assert_eq!("object".parse::<BackendKind>().unwrap(), BackendKind::ObjectStore);
        assert_eq!("SQLite".parse::<BackendKind>().unwrap(), BackendKind::Relational);
        assert!("mongo".parse::<BackendKind>().is_err());

        assert_eq!(
            "auto".parse::<BackendPreference>().unwrap(),
            BackendPreference::Auto
        );
        assert_eq!(
            "relational".parse::<BackendPreference>().unwrap(),
            BackendPreference::Relational
        );
        assert!("both".parse::<BackendPreference>().is_err());
    }

    #[test]
    fn test_drain_state_default_is_idle() {
        assert!(DrainState::default().is_idle());
        assert!(!DrainState::Draining.is_idle());
        assert_eq!(DrainState::Draining.to_string(), "draining");
    }

    #[test]
    fn test_queue_item_serialization() {
        let item = QueueItem::new(QueueKey::new(7), "a.txt", "AAAA");
        let json = serde_json::to_string(&item).unwrap();
        assert_eq!(json, r#"{"key":7,"name":"a.txt","payload":"AAAA"}"#);
    }
}
