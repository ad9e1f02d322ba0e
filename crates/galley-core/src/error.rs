//! # Error Types
//!
//! Domain-specific error types for galley-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  galley-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures (pre-lock)           │
//! │                                                                         │
//! │  galley-db errors (separate crate)                                     │
//! │  └── DbError          - Storage failures, not-found, wraps CoreError   │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business rule errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The named variant does not belong to the recipe.
    #[error("Variant {variant_id} not found on recipe {recipe_id}")]
    VariantNotFound {
        recipe_id: String,
        variant_id: String,
    },

    /// A purchase order status change that the lifecycle does not allow.
    ///
    /// ## Allowed Transitions
    /// ```text
    /// pending ──► received   (applies stock + ledger effects once)
    /// pending ──► cancelled
    /// received ─► received   (no-op for effects, editable fields only)
    /// ```
    /// Anything else is rejected; a received order is undone by deleting it.
    #[error("Purchase order {order_id} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        order_id: String,
        from: String,
        to: String,
    },

    /// A batch operation was called with nothing to do.
    #[error("{operation} requires at least one line")]
    EmptyBatch { operation: String },

    /// A batch exceeded the maximum number of lines.
    #[error("{operation} accepts at most {max} lines")]
    BatchTooLarge { operation: String, max: usize },

    /// Consolidation item had neither a counted value nor a pending count.
    #[error("No physical count recorded for ingredient {0}")]
    MissingPhysicalCount(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before a transaction is opened, so a rejected request never holds
/// a lock or leaves a partial effect.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must be zero or greater.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// NaN or infinity.
    #[error("{field} must be a finite number")]
    NotFinite { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: f64, max: f64 },

    /// Invalid format (e.g., invalid UUID, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// An amount that would leave the representable range.
    pub fn amount_out_of_range(field: &str) -> Self {
        ValidationError::OutOfRange {
            field: field.to_string(),
            min: -(crate::MAX_AMOUNT_CENTS as f64),
            max: crate::MAX_AMOUNT_CENTS as f64,
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InvalidStatusTransition {
            order_id: "po-1".to_string(),
            from: "received".to_string(),
            to: "pending".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Purchase order po-1 cannot move from received to pending"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::NotFinite {
            field: "quantity".to_string(),
        };
        assert_eq!(err.to_string(), "quantity must be a finite number");

        let err = ValidationError::OutOfRange {
            field: "yield_percent".to_string(),
            min: 0.0,
            max: 100.0,
        };
        assert_eq!(err.to_string(), "yield_percent must be between 0 and 100");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "recipe_id".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
