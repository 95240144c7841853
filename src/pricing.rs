//! Deposit arithmetic. All amounts are integer minor units (cents) until
//! display formatting; rounding is half-up, matching the payment backend.

use crate::errors::ServiceError;
use crate::models::Service;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

/// Card processing fee applied to the full subtotal: 2.2%.
pub const CARD_FEE_RATE_PER_MILLE: i64 = 22;

/// Share of the subtotal collected up front: 50%.
pub const DEPOSIT_RATE_PERCENT: i64 = 50;

/// `numerator / denominator` rounded half-up, in integer arithmetic.
fn round_half_up(numerator: i64, denominator: i64) -> i64 {
    debug_assert!(denominator > 0);
    debug_assert!(numerator >= 0);
    (numerator * 2 + denominator) / (denominator * 2)
}

/// The deposit breakdown shown to the customer and charged by the saga.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "subtotal": 6000,
    "card_fee": 132,
    "base_deposit": 3000,
    "deposit_amount": 3132,
    "total_amount": 6132,
    "balance_due": 3000,
    "currency": "AUD"
}))]
pub struct DepositQuote {
    /// Sum of selected service prices
    pub subtotal: i64,
    /// 2.2% of the full subtotal, loaded entirely onto the deposit
    pub card_fee: i64,
    /// 50% of the subtotal
    pub base_deposit: i64,
    /// Amount charged at booking time
    pub deposit_amount: i64,
    /// Subtotal plus card fee
    pub total_amount: i64,
    /// Remainder payable in person, exactly half the subtotal
    pub balance_due: i64,
    pub currency: String,
}

pub fn card_fee(subtotal: i64) -> i64 {
    round_half_up(subtotal * CARD_FEE_RATE_PER_MILLE, 1000)
}

pub fn base_deposit(subtotal: i64) -> i64 {
    round_half_up(subtotal * DEPOSIT_RATE_PERCENT, 100)
}

/// Compute the deposit breakdown for a selection of services.
///
/// Rejects empty selections and mixed-currency selections; the backends
/// price a booking in a single currency.
pub fn quote(services: &[Service]) -> Result<DepositQuote, ServiceError> {
    let first = services.first().ok_or_else(|| {
        ServiceError::ValidationError("at least one service must be selected".into())
    })?;
    if services.iter().any(|s| s.currency != first.currency) {
        return Err(ServiceError::ValidationError(
            "selected services must share a currency".into(),
        ));
    }

    let subtotal: i64 = services.iter().map(|s| s.price).sum();
    let card_fee = card_fee(subtotal);
    let base_deposit = base_deposit(subtotal);

    Ok(DepositQuote {
        subtotal,
        card_fee,
        base_deposit,
        deposit_amount: base_deposit + card_fee,
        total_amount: subtotal + card_fee,
        balance_due: subtotal - base_deposit,
        currency: first.currency.clone(),
    })
}
