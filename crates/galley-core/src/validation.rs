//! # Validation Module
//!
//! Input checks run before a transaction is opened.
//!
//! ## Where Validation Sits
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  request ──► THIS MODULE ──► BEGIN ──► lock rows ──► write ──► COMMIT   │
//! │                  │                                                      │
//! │                  └── rejected here: no lock held, nothing written       │
//! │                                                                         │
//! │  SQLite constraints (NOT NULL, CHECK, UNIQUE) catch what slips past.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use galley_core::validation::{validate_quantity, validate_required};
//!
//! assert!(validate_quantity("quantity", 2.5).is_ok());
//! assert!(validate_quantity("quantity", f64::NAN).is_err());
//! assert!(validate_required("recipe_id", "  ").is_err());
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::{MAX_BATCH_LINES, MAX_PRICE_CENTS, MAX_QUANTITY, QUANTITY_EPSILON};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Rejects empty or whitespace-only ids and references.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates an ingredient or recipe name.
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
pub fn validate_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Optional free text (notes, reasons, supplier references).
pub fn validate_text(field: &str, value: Option<&str>, max: usize) -> ValidationResult<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Numeric Validators
// =============================================================================

fn finite(field: &str, value: f64) -> ValidationResult<()> {
    if !value.is_finite() {
        return Err(ValidationError::NotFinite {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Quantity that moves stock: finite, strictly positive, at least
/// [`QUANTITY_EPSILON`] and at most [`MAX_QUANTITY`].
///
/// ```rust
/// use galley_core::validation::validate_quantity;
///
/// assert!(validate_quantity("quantity", 0.25).is_ok());
/// assert!(validate_quantity("quantity", 0.0).is_err());
/// assert!(validate_quantity("quantity", -1.0).is_err());
/// assert!(validate_quantity("quantity", 1e18).is_err());
/// ```
pub fn validate_quantity(field: &str, value: f64) -> ValidationResult<()> {
    finite(field, value)?;
    if value <= 0.0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    if !(QUANTITY_EPSILON..=MAX_QUANTITY).contains(&value) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: QUANTITY_EPSILON,
            max: MAX_QUANTITY,
        });
    }
    Ok(())
}

/// Finite, zero or greater, at most [`MAX_QUANTITY`] (stock minimums,
/// counted stock, composition, received quantities).
pub fn validate_non_negative(field: &str, value: f64) -> ValidationResult<()> {
    finite(field, value)?;
    if value < 0.0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    if value > MAX_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0.0,
            max: MAX_QUANTITY,
        });
    }
    Ok(())
}

/// Amounts in cents: zero up to [`MAX_PRICE_CENTS`].
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    if cents > MAX_PRICE_CENTS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0.0,
            max: MAX_PRICE_CENTS as f64,
        });
    }
    Ok(())
}

/// A batch yields at least one portion.
pub fn validate_portions(portions: i64) -> ValidationResult<()> {
    if portions < 1 {
        return Err(ValidationError::MustBePositive {
            field: "portions".to_string(),
        });
    }
    Ok(())
}

/// Variant multiplier: finite and strictly positive.
pub fn validate_price_factor(factor: f64) -> ValidationResult<()> {
    validate_quantity("price_factor", factor)
}

/// Usable fraction in percent, (0, 100].
pub fn validate_yield_percent(value: f64) -> ValidationResult<()> {
    finite("yield_percent", value)?;
    if value <= 0.0 || value > 100.0 {
        return Err(ValidationError::OutOfRange {
            field: "yield_percent".to_string(),
            min: 0.0,
            max: 100.0,
        });
    }
    Ok(())
}

// =============================================================================
// Batch Validators
// =============================================================================

/// Batches must hold between 1 and [`MAX_BATCH_LINES`] lines.
pub fn validate_batch_size(operation: &str, len: usize) -> CoreResult<()> {
    if len == 0 {
        return Err(CoreError::EmptyBatch {
            operation: operation.to_string(),
        });
    }
    if len > MAX_BATCH_LINES {
        return Err(CoreError::BatchTooLarge {
            operation: operation.to_string(),
            max: MAX_BATCH_LINES,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
