//! # Validation Module
//!
//! Boundary validation for sale and refund requests.
//!
//! Requests are validated once, in full, before any business logic or
//! database work runs; a request that passes here can only fail on
//! business rules (stock, refund bounds) or storage errors.

use crate::error::ValidationError;
use crate::types::{NewRefund, NewRefundLine, NewSale, NewSaleLine};
use crate::{MAX_LINE_QUANTITY, MAX_REASON_LENGTH, MAX_SALE_LINES};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Field Validators
// =============================================================================

/// Validates a line quantity: positive and bounded.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a unit price in cents. Zero is allowed (free items).
pub fn validate_unit_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustBeNonNegative {
            field: "unit_price_cents".to_string(),
        });
    }

    Ok(())
}

/// Validates an external entity id (store, customer, product).
pub fn validate_entity_id(field: &str, id: i64) -> ValidationResult<()> {
    if id <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a refund reason: required, bounded free text.
pub fn validate_reason(reason: &str) -> ValidationResult<()> {
    let reason = reason.trim();

    if reason.is_empty() {
        return Err(ValidationError::Required {
            field: "reason".to_string(),
        });
    }

    if reason.len() > MAX_REASON_LENGTH {
        return Err(ValidationError::TooLong {
            field: "reason".to_string(),
            max: MAX_REASON_LENGTH,
        });
    }

    Ok(())
}

/// Validates a sale/refund UUID reference.
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Request Validators
// =============================================================================

/// Validates a whole sale creation request.
///
/// ## Rules
/// - store and customer ids positive
/// - at least one line, at most MAX_SALE_LINES
/// - every line: positive bounded quantity, non-negative unit price,
///   positive product id
/// - one line per product (refund bookkeeping is keyed by product)
pub fn validate_new_sale(request: &NewSale) -> ValidationResult<()> {
    validate_entity_id("store_id", request.store_id)?;
    validate_entity_id("customer_id", request.customer_id)?;

    if request.lines.is_empty() {
        return Err(ValidationError::Required {
            field: "lines".to_string(),
        });
    }

    if request.lines.len() > MAX_SALE_LINES {
        return Err(ValidationError::OutOfRange {
            field: "lines".to_string(),
            min: 1,
            max: MAX_SALE_LINES as i64,
        });
    }

    for line in &request.lines {
        validate_sale_line(line)?;
    }

    check_unique_products(request.lines.iter().map(|line| line.product_id))?;

    Ok(())
}

fn validate_sale_line(line: &NewSaleLine) -> ValidationResult<()> {
    validate_entity_id("product_id", line.product_id)?;
    validate_quantity(line.quantity)?;
    validate_unit_price_cents(line.unit_price_cents)?;
    Ok(())
}

/// Validates a whole refund creation request.
///
/// `lines: None` (full refund) is always structurally valid; the balance
/// check against the sale happens in the workflow. `lines: Some([])` is
/// rejected: an explicitly empty refund is meaningless.
pub fn validate_new_refund(request: &NewRefund) -> ValidationResult<()> {
    validate_uuid("sale_id", &request.sale_id)?;
    validate_reason(&request.reason)?;

    if let Some(lines) = &request.lines {
        if lines.is_empty() {
            return Err(ValidationError::Required {
                field: "lines".to_string(),
            });
        }

        for line in lines {
            validate_refund_line(line)?;
        }

        check_unique_products(lines.iter().map(|line| line.product_id))?;
    }

    Ok(())
}

fn validate_refund_line(line: &NewRefundLine) -> ValidationResult<()> {
    validate_entity_id("product_id", line.product_id)?;
    validate_quantity(line.quantity)?;
    Ok(())
}

fn check_unique_products(product_ids: impl Iterator<Item = i64>) -> ValidationResult<()> {
    let mut seen = Vec::new();
    for product_id in product_ids {
        if seen.contains(&product_id) {
            return Err(ValidationError::DuplicateProduct { product_id });
        }
        seen.push(product_id);
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
