// src/common/money.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::common::error::AppError;

pub const DEFAULT_VAT_RATE: Decimal = Decimal::from_parts(15, 0, 0, false, 0);

/// Priced line on a quotation or invoice. `total` is always recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[schema(example = "Compressor replacement")]
    pub description: String,
    #[schema(example = "2")]
    pub quantity: Decimal,
    #[schema(example = "100.00")]
    pub unit_price: Decimal,
    #[serde(default)]
    pub total: Decimal,
}

impl LineItem {
    pub fn new(description: impl Into<String>, quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price,
            total: quantity * unit_price,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub subtotal: Decimal,
    pub vat_amount: Decimal,
    pub total_amount: Decimal,
}

/// Validates the items, writes each line total and returns the document totals.
pub fn calculate_totals(items: &mut [LineItem], vat_rate: Decimal) -> Result<Totals, AppError> {
    if vat_rate.is_sign_negative() {
        return Err(AppError::invalid("vatRate must not be negative"));
    }

    for (index, item) in items.iter().enumerate() {
        if item.description.trim().is_empty() {
            return Err(AppError::invalid(format!(
                "lineItems[{index}]: description is required"
            )));
        }
        if item.quantity.is_sign_negative() {
            return Err(AppError::invalid(format!(
                "lineItems[{index}]: quantity must not be negative"
            )));
        }
        if item.unit_price.is_sign_negative() {
            return Err(AppError::invalid(format!(
                "lineItems[{index}]: unitPrice must not be negative"
            )));
        }
    }

    let mut subtotal = Decimal::ZERO;
    for item in items.iter_mut() {
        item.total = item.quantity * item.unit_price;
        subtotal += item.total;
    }

    let vat_amount = subtotal * vat_rate / Decimal::ONE_HUNDRED;

    Ok(Totals {
        subtotal,
        vat_amount,
        total_amount: subtotal + vat_amount,
    })
}
