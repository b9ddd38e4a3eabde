//! The depreciation schedule.
//!
//! An output's spendable value decays geometrically in continuous seconds:
//! `f(x) = S * (3_455_999_999 / 3_456_000_000)^x`, which is a daily loss of
//! 1/40000 (0.0025%) of the remaining value. The per-second ratio is never
//! raised to large powers directly: the age is decomposed into days,
//! half-hours and seconds, and the matching aggregate ratios
//! `39_999/40_000` (day) and `1_919_999/1_920_000` (half-hour) are used as
//! exact rationals. The whole computation runs over big integers with a
//! single round at the end, so it is bit-identical on every node.

use num_bigint::BigUint;
use num_traits::One;

use lib_types::{Currency, Timestamp};

/// Ages are clamped to this horizon (~1000 years); the schedule is flat
/// beyond it, which also bounds the exponent sizes.
pub const MAX_CUSTODY_FEE_COMPUTE_DURATION: Timestamp = 31_540_000_000;

// survival ratios, numerator / denominator
const RATIO_SEC: (u64, u64) = (3_455_999_999, 3_456_000_000);
const RATIO_SEMI_HOUR: (u64, u64) = (1_919_999, 1_920_000);
const RATIO_DAY: (u64, u64) = (39_999, 40_000);

/// Amounts are scaled by this before dividing, so the single rounding step
/// happens three digits below token precision.
const EXTRA_ACCURACY_MULTIPLIER: u64 = 1000;

const SECONDS_PER_DAY: u64 = 86_400;
const SECONDS_PER_SEMI_HOUR: u64 = 1_800;

/// `(days, semi_hours, seconds)` with `semi_hours < 48`, `seconds < 1800`.
fn duration_triplet(seconds: Timestamp) -> (u64, u64, u64) {
    let days = seconds / SECONDS_PER_DAY;
    let rest = seconds % SECONDS_PER_DAY;
    (days, rest / SECONDS_PER_SEMI_HOUR, rest % SECONDS_PER_SEMI_HOUR)
}

fn multiply_ratio(power: u64, num: &mut BigUint, den: &mut BigUint, ratio: (u64, u64)) {
    if power == 0 {
        return;
    }
    // exponents are bounded by the compute horizon: at most 365_046 days
    let power = u32::try_from(power).expect("triplet exponent fits u32");
    *num *= BigUint::from(ratio.0).pow(power);
    *den *= BigUint::from(ratio.1).pow(power);
}

/// The spendable amount left of `value` after `seconds` of custody.
///
/// `spendable_amount_after_seconds(v, 0) == v`; the result never exceeds
/// the input and is monotone non-increasing in the age.
pub fn spendable_amount_after_seconds(value: &Currency, seconds: Timestamp) -> Currency {
    let seconds = seconds.min(MAX_CUSTODY_FEE_COMPUTE_DURATION);
    let (days, semi_hours, secs) = duration_triplet(seconds);

    // merge the three segment ratios so the division rounds only once
    let mut num = BigUint::one();
    let mut den = BigUint::from(EXTRA_ACCURACY_MULTIPLIER);
    multiply_ratio(days, &mut num, &mut den, RATIO_DAY);
    multiply_ratio(semi_hours, &mut num, &mut den, RATIO_SEMI_HOUR);
    multiply_ratio(secs, &mut num, &mut den, RATIO_SEC);

    let mut x = value.big() * EXTRA_ACCURACY_MULTIPLIER;
    x *= num;

    // round half-up; the denominator carries the even factor 1000, so the
    // doubled-remainder comparison is exact
    let mut q = &x / &den;
    let r = x % &den;
    if r * 2u8 >= den {
        q += 1u8;
    }
    Currency::from_big(q)
}

/// `(spendable, fee)` with `spendable + fee == value`.
pub fn amount_custody_fee_pair_after_seconds(
    value: &Currency,
    seconds: Timestamp,
) -> (Currency, Currency) {
    let spendable = spendable_amount_after_seconds(value, seconds);
    let fee = value
        .checked_sub(&spendable)
        .expect("spendable amount never exceeds the input value");
    (spendable, fee)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gft(s: &str) -> Currency {
        Currency::from_token_str(s).unwrap()
    }

    #[test]
    fn golden_vectors() {
        // These exact values are consensus. They MUST NOT change.
        let cases: &[(&str, Timestamp, &str)] = &[
            ("0", 0, "0"),
            ("0", 500, "0"),
            ("1", 1, "1"),
            ("1", 50, "0.999999986"),
            ("0.000000001", 999999, "0.000000001"),
            ("10", 113, "9.999999673"),
            ("100", 24 * 60 * 60, "99.9975"),
            ("40000", 24 * 60 * 60, "39999"),
            ("500000000000", 24 * 60 * 60, "499987500000"),
            ("500000000000", 365 * 24 * 60 * 60, "495458196719.713017525"),
            ("35000.853", 1, "35000.852989872"),
            ("35000.853", 5404, "35000.798270685"),
            ("35000.853", 13679330, "34862.586836388"),
            ("35000.853", 157766400, "33438.96584286"),
            ("35000.853", MAX_CUSTODY_FEE_COMPUTE_DURATION, "3.807056146"),
        ];
        for (input, duration, expected) in cases {
            let (value, fee) = amount_custody_fee_pair_after_seconds(&gft(input), *duration);
            assert_eq!(
                value,
                gft(expected),
                "unexpected spendable value for {input} after {duration}s"
            );
            assert_eq!(
                fee,
                gft(input).checked_sub(&gft(expected)).unwrap(),
                "unexpected custody fee for {input} after {duration}s"
            );
        }
    }

    #[test]
    fn spendable_amount_reference_table() {
        // spendable value per starting amount across the reference ages
        // 1s, 5404s (3 half-hours 4s), 13679330s (158d 15hh 1130s) and
        // 157766400s (1826d); tiny amounts never lose value to rounding
        let durations = [1u64, 5404, 13_679_330, 157_766_400];
        let rows: &[(&str, [&str; 4])] = &[
            ("0.000000001", ["0.000000001", "0.000000001", "0.000000001", "0.000000001"]),
            ("0.00000001", ["0.00000001", "0.00000001", "0.00000001", "0.00000001"]),
            ("0.0000001", ["0.0000001", "0.0000001", "0.0000001", "0.000000096"]),
            ("0.000001", ["0.000001", "0.000001", "0.000000996", "0.000000955"]),
            ("0.0015", ["0.0015", "0.001499998", "0.001494074", "0.001433064"]),
            ("1", ["1", "0.999998436", "0.996049634", "0.95537574"]),
            (
                "50000000",
                [
                    "49999999.985532407",
                    "49999921.81717041",
                    "49802481.722928799",
                    "47768787.010505162",
                ],
            ),
        ];
        for (amount, expected) in rows {
            for (duration, expected) in durations.iter().zip(expected) {
                assert_eq!(
                    spendable_amount_after_seconds(&gft(amount), *duration),
                    gft(expected),
                    "unexpected spendable value for {amount} after {duration}s"
                );
            }
        }
    }

    #[test]
    fn pair_always_sums_to_input() {
        let values = ["0", "0.000000001", "1", "35000.853", "500000000000"];
        let durations = [0u64, 1, 50, 1800, 86400, 86401, 999999, 157766400];
        for v in values {
            for d in durations {
                let input = gft(v);
                let (spendable, fee) = amount_custody_fee_pair_after_seconds(&input, d);
                assert_eq!(spendable.clone() + fee, input);
                assert!(spendable <= gft(v));
            }
        }
    }

    #[test]
    fn zero_age_is_free() {
        for v in ["0", "1", "40000", "987432348584948439232921.493929483"] {
            let (spendable, fee) = amount_custody_fee_pair_after_seconds(&gft(v), 0);
            assert_eq!(spendable, gft(v));
            assert!(fee.is_zero());
        }
    }

    #[test]
    fn spendable_is_monotone_in_age() {
        let input = gft("35000.853");
        let mut previous = spendable_amount_after_seconds(&input, 0);
        for duration in [1, 2, 1799, 1800, 1801, 86399, 86400, 86401, 10_000_000, 157766400] {
            let current = spendable_amount_after_seconds(&input, duration);
            assert!(current <= previous, "not monotone at {duration}s");
            previous = current;
        }
    }

    #[test]
    fn triplet_decomposition() {
        assert_eq!(duration_triplet(0), (0, 0, 0));
        assert_eq!(duration_triplet(1799), (0, 0, 1799));
        assert_eq!(duration_triplet(1800), (0, 1, 0));
        assert_eq!(duration_triplet(86400), (1, 0, 0));
        // 2 days, 5 semi-hours, 105 seconds
        assert_eq!(duration_triplet(181_905), (2, 5, 105));
        let (_, semi_hours, secs) = duration_triplet(123_456_789);
        assert!(semi_hours < 48);
        assert!(secs < 1800);
    }

    #[test]
    fn split_ages_agree_within_rounding() {
        // splitting an age on schedule-segment boundaries and chaining the
        // two computations stays within one unit of the one-shot result
        let input = gft("35000.853");
        for (a, b) in [(1800u64, 4), (86400, 1800), (86400, 86400), (5404, 13679330 - 5404)] {
            let whole = spendable_amount_after_seconds(&input, a + b);
            let first = spendable_amount_after_seconds(&input, a);
            let chained = spendable_amount_after_seconds(&first, b);
            let (lo, hi) =
                if whole <= chained { (whole, chained) } else { (chained, whole) };
            let drift = hi.checked_sub(&lo).unwrap();
            assert!(
                drift <= Currency::from_units(1),
                "split {a}+{b} drifted by {drift} units"
            );
        }
    }

    #[test]
    fn ages_beyond_horizon_are_flat() {
        let input = gft("35000.853");
        let at_horizon = spendable_amount_after_seconds(&input, MAX_CUSTODY_FEE_COMPUTE_DURATION);
        for extra in [1u64, 1800, 86400 * 365] {
            assert_eq!(
                spendable_amount_after_seconds(&input, MAX_CUSTODY_FEE_COMPUTE_DURATION + extra),
                at_horizon
            );
        }
    }

    #[test]
    fn determinism_over_repeated_runs() {
        let input = gft("987432348584948439232921.493929483");
        let first = amount_custody_fee_pair_after_seconds(&input, 157766400);
        for _ in 0..5 {
            assert_eq!(amount_custody_fee_pair_after_seconds(&input, 157766400), first);
        }
    }
}
