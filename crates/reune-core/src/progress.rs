//! Progress arithmetic for key results and objectives.
//!
//! Both functions are pure; persisting the results is `okr`'s job.

use crate::decimal::to_two_places;
use bigdecimal::{BigDecimal, Zero};

fn hundred() -> BigDecimal {
    BigDecimal::from(100)
}

/// Percentage of the way `current` has moved from `initial` towards `target`,
/// clamped to [0, 100] and rounded to two places.
///
/// When `target == initial` any value at or above `initial` counts as done.
/// Decreasing targets (`target < initial`) work the same way: moving down
/// towards the target is progress.
pub fn compute_progress(
    initial: &BigDecimal,
    target: &BigDecimal,
    current: &BigDecimal,
) -> BigDecimal {
    let range_total = target - initial;
    let range_current = current - initial;

    let raw = if range_total.is_zero() {
        if range_current >= BigDecimal::zero() {
            hundred()
        } else {
            BigDecimal::zero()
        }
    } else {
        (range_current / range_total) * hundred()
    };

    to_two_places(&clamp_percent(raw))
}

/// Arithmetic mean of key-result progress values; `0.00` for no values.
pub fn mean_progress<'a, I>(values: I) -> BigDecimal
where
    I: IntoIterator<Item = &'a BigDecimal>,
{
    let mut sum = BigDecimal::zero();
    let mut count: u64 = 0;
    for v in values {
        sum += v;
        count += 1;
    }
    if count == 0 {
        return to_two_places(&BigDecimal::zero());
    }
    to_two_places(&(sum / BigDecimal::from(count)))
}

fn clamp_percent(value: BigDecimal) -> BigDecimal {
    if value < BigDecimal::zero() {
        BigDecimal::zero()
    } else if value > hundred() {
        hundred()
    } else {
        value
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::format_two_places;
    use std::str::FromStr;

    fn d(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn progress(initial: &str, target: &str, current: &str) -> String {
        format_two_places(&compute_progress(&d(initial), &d(target), &d(current)))
    }

    #[test]
    fn quarter_of_the_way() {
        assert_eq!(progress("0", "200", "50"), "25.00");
    }

    #[test]
    fn overshoot_is_clamped_to_100() {
        assert_eq!(progress("0", "200", "250"), "100.00");
    }

    #[test]
    fn regression_is_clamped_to_0() {
        assert_eq!(progress("10", "20", "5"), "0.00");
    }

    #[test]
    fn equal_bounds_reached() {
        assert_eq!(progress("10", "10", "10"), "100.00");
        assert_eq!(progress("10", "10", "12"), "100.00");
    }

    #[test]
    fn equal_bounds_below_initial() {
        assert_eq!(progress("10", "10", "5"), "0.00");
    }

    #[test]
    fn non_terminating_ratio_rounds_to_two_places() {
        assert_eq!(progress("0", "3", "1"), "33.33");
        assert_eq!(progress("0", "3", "2"), "66.67");
    }

    #[test]
    fn offset_initial_value() {
        assert_eq!(progress("100.00", "300.00", "150.00"), "25.00");
    }

    #[test]
    fn decreasing_target() {
        // e.g. cut churn from 20% to 10%
        assert_eq!(progress("20", "10", "15"), "50.00");
        assert_eq!(progress("20", "10", "25"), "0.00");
        assert_eq!(progress("20", "10", "5"), "100.00");
    }

    #[test]
    fn formula_holds_across_a_range_of_values() {
        let initial = d("0");
        let target = d("80");
        for step in 0..=80 {
            let current = BigDecimal::from(step);
            let expected = to_two_places(&(BigDecimal::from(step) * BigDecimal::from(100) / d("80")));
            assert_eq!(compute_progress(&initial, &target, &current), expected);
        }
    }

    #[test]
    fn mean_of_two() {
        let values = [d("25.00"), d("100.00")];
        assert_eq!(format_two_places(&mean_progress(values.iter())), "62.50");
    }

    #[test]
    fn mean_of_nothing_is_zero() {
        let values: Vec<BigDecimal> = Vec::new();
        assert_eq!(format_two_places(&mean_progress(values.iter())), "0.00");
    }

    #[test]
    fn mean_rounds_to_two_places() {
        let values = [d("0"), d("0"), d("100")];
        assert_eq!(format_two_places(&mean_progress(values.iter())), "33.33");
    }
}
