//! # courier-core: Pure Types for the Courier Upload Queue
//!
//! This crate holds the vocabulary shared by the storage backends and the
//! upload engine. It has zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   courier-cli ──► courier-sync ──► courier-store ──► courier-core      │
//! │                        │                                  ▲             │
//! │                        └──────────────────────────────────┘             │
//! │                                                                         │
//! │   QueueItem, QueueKey      what lives in a backend                      │
//! │   Capabilities, BackendKind  which backend the host can offer           │
//! │   DrainState               idle / draining                              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Queue items, keys, backend kinds and capability descriptors
//! - [`error`] - Validation error types
//! - [`validation`] - Input rules for item names and store identifiers
//!
//! ## Example Usage
//!
//! ```rust
//! use courier_core::{BackendKind, Capabilities};
//!
//! // The object store wins whenever the host offers it
//! let caps = Capabilities::all();
//! assert_eq!(caps.select_backend(), Some(BackendKind::ObjectStore));
//!
//! let caps = Capabilities::relational_only();
//! assert_eq!(caps.select_backend(), Some(BackendKind::Relational));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreResult, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default database namespace (names the on-disk files).
pub const DEFAULT_NAMESPACE: &str = "uploader";

/// Default logical store name (table / object store).
pub const DEFAULT_STORE_NAME: &str = "files";

/// Schema version written next to the store by both backends.
///
/// A stored version that differs from this value triggers migration on connect.
pub const SCHEMA_VERSION: &str = "1.0";
