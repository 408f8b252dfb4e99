//! # Validation Module
//!
//! Input validation for items and store identifiers.
//!
//! ## Why Store Names Are Strict
//! The relational backend interpolates the store name into DDL and DML
//! (table names cannot be bound as parameters), and the namespace becomes a
//! file name on disk. Both are therefore restricted to a safe identifier
//! alphabet before any backend sees them.
//!
//! ## Usage
//! ```rust
//! use courier_core::validation::{validate_item_name, validate_store_name};
//!
//! assert!(validate_item_name("report.pdf").is_ok());
//! assert!(validate_store_name("files").is_ok());
//! assert!(validate_store_name("files; DROP TABLE x").is_err());
//! ```

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum length of an item name.
pub const MAX_ITEM_NAME_LEN: usize = 255;

/// Maximum length of a namespace or store identifier.
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Store name prefixes taken by internal tables of either engine.
pub const RESERVED_STORE_PREFIXES: [&str; 2] = ["_courier_", "sqlite_"];

// =============================================================================
// Item Validators
// =============================================================================

/// Validates a caller-supplied item name.
///
/// ## Rules
/// - Must not be empty (after trimming)
/// - At most 255 characters
pub fn validate_item_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > MAX_ITEM_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_ITEM_NAME_LEN,
        });
    }

    Ok(())
}

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates a logical store name (table / object store identifier).
///
/// ## Rules
/// - 1 to 64 characters
/// - ASCII letters, digits and underscores
/// - Must not start with a digit
/// - Must not use a reserved prefix (`_courier_`, `sqlite_`)
pub fn validate_store_name(store: &str) -> ValidationResult<()> {
    validate_identifier("store", store, false)?;

    let lower = store.to_ascii_lowercase();
    if let Some(prefix) = RESERVED_STORE_PREFIXES
        .iter()
        .find(|prefix| lower.starts_with(**prefix))
    {
        return Err(ValidationError::InvalidFormat {
            field: "store".to_string(),
            reason: format!("the prefix {} is reserved", prefix),
        });
    }

    Ok(())
}

/// Validates a database namespace.
///
/// Same rules as [`validate_store_name`], hyphens also allowed.
pub fn validate_namespace(namespace: &str) -> ValidationResult<()> {
    validate_identifier("namespace", namespace, true)
}

fn validate_identifier(field: &str, value: &str, allow_hyphen: bool) -> ValidationResult<()> {
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_IDENTIFIER_LEN,
        });
    }

    if value.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must not start with a digit".to_string(),
        });
    }

    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || (allow_hyphen && c == '-'))
    {
        let reason = if allow_hyphen {
            "must contain only letters, numbers, hyphens, and underscores"
        } else {
            "must contain only letters, numbers, and underscores"
        };
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: reason.to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
