use anyhow::{bail, Result};

pub type RationalNumber = num_rational::Ratio<u64>;

/// Express a decimal price over a fixed denominator, rounding to the nearest
/// numerator. Parameter services publish unit prices as floats which are only
/// meaningful to a fixed number of decimal places.
pub fn rational_number_over(f: f64, denominator: u64) -> Result<RationalNumber> {
    if !f.is_finite() || f < 0.0 {
        bail!("Cannot convert {f} to Rational");
    }
    if denominator == 0 {
        bail!("Zero denominator");
    }
    let numerator = (f * denominator as f64).round();
    if numerator > u64::MAX as f64 {
        bail!("{f} is too large for a Rational over {denominator}");
    }
    Ok(RationalNumber::new(numerator as u64, denominator))
}
