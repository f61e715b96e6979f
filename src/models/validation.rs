use rust_decimal::Decimal;

use super::{AddMoneyRequest, OrderItem, PlaceOrderRequest, ValidationError, ValidationResult};

/// Trait for validating input models
pub trait Validate {
    fn validate(&self) -> ValidationResult<()>;
}

/// Validation constants
pub const MAX_STUDENT_ID_LENGTH: usize = 128;
pub const MAX_DESCRIPTION_LENGTH: usize = 200;
pub const MAX_ITEM_NAME_LENGTH: usize = 100;
pub const MAX_ORDER_ITEMS: usize = 50;
pub const MONEY_SCALE: u32 = 2;
pub const MIN_AMOUNT: Decimal = Decimal::from_parts(1, 0, 0, false, 2); // 0.01
pub const MAX_ITEM_PRICE: Decimal = Decimal::from_parts(1000000, 0, 0, false, 2); // 10000.00

impl Validate for AddMoneyRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_amount("amount", &self.amount, None)
    }
}

impl Validate for OrderItem {
    fn validate(&self) -> ValidationResult<()> {
        validate_item_name(&self.item_name)?;
        validate_amount("price", &self.price, Some(MAX_ITEM_PRICE))
    }
}

impl Validate for PlaceOrderRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_order_items(&self.items)?;
        validate_amount("totalAmount", &self.total_amount, None)
    }
}

/// Validate the authenticated student identifier
pub fn validate_student_id(student_id: &str) -> ValidationResult<()> {
    let trimmed = student_id.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::RequiredField {
            field: "student_id".to_string(),
        });
    }

    if trimmed.len() > MAX_STUDENT_ID_LENGTH {
        return Err(ValidationError::TooLong {
            field: "student_id".to_string(),
            max_length: MAX_STUDENT_ID_LENGTH,
            actual_length: trimmed.len(),
        });
    }

    Ok(())
}

/// Validate a monetary amount: positive, at most two decimal places and,
/// when given, no larger than `max`
pub fn validate_amount(field: &str, amount: &Decimal, max: Option<Decimal>) -> ValidationResult<()> {
    if *amount < MIN_AMOUNT {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            value: amount.to_string(),
            reason: format!("Must be at least {}", MIN_AMOUNT),
        });
    }

    if let Some(max) = max {
        if *amount > max {
            return Err(ValidationError::OutOfRange {
                field: field.to_string(),
                min: MIN_AMOUNT.to_string(),
                max: max.to_string(),
                value: amount.to_string(),
            });
        }
    }

    if amount.normalize().scale() > MONEY_SCALE {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            value: amount.to_string(),
            reason: "Cannot have more than 2 decimal places".to_string(),
        });
    }

    Ok(())
}

/// Validate a ledger entry description
pub fn validate_description(description: &str) -> ValidationResult<()> {
    let trimmed = description.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::RequiredField {
            field: "description".to_string(),
        });
    }

    if trimmed.len() > MAX_DESCRIPTION_LENGTH {
        return Err(ValidationError::TooLong {
            field: "description".to_string(),
            max_length: MAX_DESCRIPTION_LENGTH,
            actual_length: trimmed.len(),
        });
    }

    Ok(())
}

/// Validate an order line item name
pub fn validate_item_name(name: &str) -> ValidationResult<()> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::RequiredField {
            field: "itemName".to_string(),
        });
    }

    if trimmed.len() > MAX_ITEM_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: "itemName".to_string(),
            max_length: MAX_ITEM_NAME_LENGTH,
            actual_length: trimmed.len(),
        });
    }

    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::InvalidValue {
            field: "itemName".to_string(),
            value: name.to_string(),
            reason: "Contains invalid control characters".to_string(),
        });
    }

    Ok(())
}

/// Validate the item list of an order
pub fn validate_order_items(items: &[OrderItem]) -> ValidationResult<()> {
    if items.is_empty() {
        return Err(ValidationError::RequiredField {
            field: "items".to_string(),
        });
    }

    if items.len() > MAX_ORDER_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: "1".to_string(),
            max: MAX_ORDER_ITEMS.to_string(),
            value: items.len().to_string(),
        });
    }

    for item in items {
        item.validate()?;
    }

    Ok(())
}
