//! VAT arithmetic on integer sums.
//!
//! Prices are VAT-inclusive, so the tax is extracted from the price rather
//! than added on top: `vat = round(price * percent / (100 + percent))`.
//! Rounding is half-to-even on the exact quotient.

pub const STANDARD_VAT_PERCENT: u32 = 12;

/// VAT extracted from a line price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VatSplit {
    /// Price as transmitted (still VAT-inclusive).
    pub price: i64,
    pub vat: i64,
}

/// Extract VAT from `price`.
///
/// # Examples
/// ```rust
/// use ofd_core::receipt::vat;
///
/// assert_eq!(vat::compute(15000, 12, true).vat, 1607);
/// assert_eq!(vat::compute(15000, 12, false).vat, 0);
/// ```
pub fn compute(price: i64, percent: u32, vat_included: bool) -> VatSplit {
    if !vat_included || percent == 0 {
        return VatSplit { price, vat: 0 };
    }
    let numerator = i128::from(price) * i128::from(percent);
    let denominator = 100 + i128::from(percent);
    VatSplit {
        price,
        vat: round_half_even(numerator, denominator) as i64,
    }
}

fn round_half_even(numerator: i128, denominator: i128) -> i128 {
    let negative = numerator < 0;
    let numerator = numerator.abs();
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    let rounded = match (remainder * 2).cmp(&denominator) {
        std::cmp::Ordering::Less => quotient,
        std::cmp::Ordering::Greater => quotient + 1,
        std::cmp::Ordering::Equal => quotient + (quotient & 1),
    };
    if negative { -rounded } else { rounded }
}
