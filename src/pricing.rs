//! Order totals calculator.
//!
//! Pure arithmetic over `Decimal`. Discount and tax are rounded to two decimal
//! places independently, and tax is computed on the post-discount base *after*
//! it has been rounded; changing that order shifts grand totals by a cent on
//! adversarial inputs, so the tests pin it.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceBreakdown {
    pub subtotal: Decimal,
    pub discount_percentage: Decimal,
    pub discount_amount: Decimal,
    pub service_fee: Decimal,
    pub tax_percentage: Decimal,
    pub tax_amount: Decimal,
    pub grand_total: Decimal,
}

fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `grand_total = subtotal − discount + tax + service_fee`, all at 2dp.
pub fn calculate_totals(
    subtotal: Decimal,
    discount_percentage: Decimal,
    tax_percentage: Decimal,
    service_fee: Decimal,
) -> PriceBreakdown {
    let hundred = Decimal::from(100);
    let discount_amount = round2(subtotal * discount_percentage / hundred);
    let discounted = subtotal - discount_amount;
    let tax_amount = round2(discounted * tax_percentage / hundred);
    let grand_total = round2(discounted + tax_amount + service_fee);

    PriceBreakdown {
        subtotal: round2(subtotal),
        discount_percentage,
        discount_amount,
        service_fee: round2(service_fee),
        tax_percentage,
        tax_amount,
        grand_total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_worked_example() {
        // 3 x 10.00 + 2 x 5.00, 10% discount, 5% tax, 2.00 fee.
        let b = calculate_totals(dec("40.00"), dec("10"), dec("5"), dec("2"));
        assert_eq!(b.subtotal, dec("40.00"));
        assert_eq!(b.discount_amount, dec("4.00"));
        assert_eq!(b.tax_amount, dec("1.80"));
        assert_eq!(b.grand_total, dec("39.80"));
    }

    #[test]
    fn test_zero_rates() {
        let b = calculate_totals(dec("15.50"), Decimal::ZERO, Decimal::ZERO, Decimal::ZERO);
        assert_eq!(b.discount_amount, Decimal::ZERO);
        assert_eq!(b.tax_amount, Decimal::ZERO);
        assert_eq!(b.grand_total, dec("15.50"));
    }

    #[test]
    fn test_midpoint_rounds_away_from_zero() {
        // 4.45 * 10% = 0.445; banker's rounding would give 0.44.
        let b = calculate_totals(dec("4.45"), dec("10"), Decimal::ZERO, Decimal::ZERO);
        assert_eq!(b.discount_amount, dec("0.45"));
        assert_eq!(b.grand_total, dec("4.00"));
    }

    #[test]
    fn test_tax_applies_to_rounded_base() {
        // Unrounded base would be 4.005, taxed at 100% -> 4.01.
        // The rounded base 4.00 must be used instead.
        let b = calculate_totals(dec("4.45"), dec("10"), dec("100"), Decimal::ZERO);
        assert_eq!(b.discount_amount, dec("0.45"));
        assert_eq!(b.tax_amount, dec("4.00"));
        assert_eq!(b.grand_total, dec("8.00"));
    }

    #[test]
    fn test_full_discount() {
        let b = calculate_totals(dec("25.00"), dec("100"), dec("11"), dec("1.50"));
        assert_eq!(b.discount_amount, dec("25.00"));
        assert_eq!(b.tax_amount, Decimal::ZERO);
        assert_eq!(b.grand_total, dec("1.50"));
    }

    #[test]
    fn test_breakdown_identity() {
        let b = calculate_totals(dec("123.45"), dec("7.5"), dec("12.5"), dec("3.25"));
        assert_eq!(
            b.grand_total,
            b.subtotal - b.discount_amount + b.tax_amount + b.service_fee
        );
    }
}
