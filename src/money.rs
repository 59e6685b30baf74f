//! Helpers for monetary amounts.

/// Round `amount` to the nearest cent.
///
/// Amounts are stored as `f64`, so repeated additions and subtractions can
/// drift by fractions of a cent. Every stored total goes through this
/// function after it is adjusted.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Round a spent total to cents and clamp it at zero.
///
/// Totals that round to zero from below come out as `0.0`, never `-0.0`.
pub fn clamp_spent(amount: f64) -> f64 {
    let rounded = round_cents(amount);
    if rounded <= 0.0 { 0.0 } else { rounded }
}

/// Whether `amount` can be used as a transaction or budget amount.
pub fn is_valid_amount(amount: f64) -> bool {
    amount.is_finite() && amount > 0.0
}
