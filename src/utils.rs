//! Small formatting helpers shared by the display implementations

/// Scale of the fixed-point representation used for prices and volumes:
/// one unit is 1/100,000.
pub const FIXED_POINT_SCALE: u64 = 100_000;

/// Render a fixed-point quantity as decimal text with five fractional
/// digits, e.g. `407_510_000` → `"4075.10000"`.
#[must_use]
pub fn format_fixed(value: u64) -> String {
    format!(
        "{}.{:05}",
        value / FIXED_POINT_SCALE,
        value % FIXED_POINT_SCALE
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_fixed_pads_fraction() {
        assert_eq!(format_fixed(0), "0.00000");
        assert_eq!(format_fixed(1), "0.00001");
        assert_eq!(format_fixed(100_000), "1.00000");
        assert_eq!(format_fixed(407_510_000), "4075.10000");
    }
}
