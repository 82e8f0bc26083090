use num_rational::Rational64;
use std::fmt;

/// Exact rhythmic duration measured in quarter notes.
pub type HumNum = Rational64;

/// Longest dot chain honoured when converting `**recip` strings.
const MAX_DOTS: usize = 16;

pub fn zero() -> HumNum {
    HumNum::from_integer(0)
}

pub fn is_zero(value: &HumNum) -> bool {
    *value.numer() == 0
}

pub fn is_negative(value: &HumNum) -> bool {
    // Ratio keeps the sign on the numerator.
    *value.numer() < 0
}

pub fn to_f64(value: &HumNum) -> f64 {
    *value.numer() as f64 / *value.denom() as f64
}

/// A timing quantity that may not have been computed yet.
///
/// Every boundary that prints or scales a timing value sees the
/// unanalyzed state as `-1`.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum Timing {
    #[default]
    Unanalyzed,
    Known(HumNum),
}

impl Timing {
    pub fn known(value: HumNum) -> Self {
        Timing::Known(value)
    }

    pub fn is_analyzed(&self) -> bool {
        matches!(self, Timing::Known(_))
    }

    /// Raw value, `-1` when unanalyzed.
    pub fn value(&self) -> HumNum {
        match self {
            Timing::Known(value) => *value,
            Timing::Unanalyzed => HumNum::from_integer(-1),
        }
    }

    pub fn scaled(&self, scale: HumNum) -> HumNum {
        self.value() * scale
    }

    pub fn as_option(&self) -> Option<HumNum> {
        match self {
            Timing::Known(value) => Some(*value),
            Timing::Unanalyzed => None,
        }
    }
}

impl From<HumNum> for Timing {
    fn from(value: HumNum) -> Self {
        Timing::Known(value)
    }
}

impl fmt::Display for Timing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.value().to_string())
    }
}

impl fmt::Debug for Timing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timing::Known(value) => write!(f, "Timing({})", value),
            Timing::Unanalyzed => write!(f, "Timing(unanalyzed)"),
        }
    }
}

/// Convert a `**recip` rhythm into a duration in quarter notes.
///
/// Only the first space-separated subtoken is read, so chords such as
/// `4c 4e` resolve to the rhythm of their first note. A `q` anywhere marks a
/// grace note and yields zero. Returns `None` when no digit is present.
pub fn recip_to_duration(recip: &str) -> Option<HumNum> {
    let subtoken = recip.split(' ').next().unwrap_or("");
    if subtoken.contains('q') {
        return Some(zero());
    }

    let start = subtoken.find(|c: char| c.is_ascii_digit())?;
    let digits: String = subtoken[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let rest = &subtoken[start + digits.len()..];

    let whole_notes = if digits.chars().all(|c| c == '0') {
        // 0 = breve, 00 = long, 000 = maxima
        HumNum::from_integer(1i64 << digits.len().min(MAX_DOTS))
    } else {
        let denominator: i64 = digits.parse().ok()?;
        let numerator: i64 = match rest.strip_prefix('%') {
            Some(after) => {
                let top: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
                top.parse().unwrap_or(1)
            }
            None => 1,
        };
        if numerator == 0 {
            return Some(zero());
        }
        HumNum::new(numerator, denominator)
    };

    let dots = subtoken.chars().filter(|&c| c == '.').count().min(MAX_DOTS);
    let quarters = whole_notes * HumNum::from_integer(4);
    if dots == 0 {
        return Some(quarters);
    }
    let bottom = 1i64 << dots;
    let top = bottom * 2 - 1;
    Some(quarters * HumNum::new(top, bottom))
}

/// Express a duration in quarter notes as a `**recip` rhythm.
///
/// Plain and single or double dotted values get their usual spelling, other
/// durations fall back to the `n%m` form. Zero is a grace note, `q`.
pub fn duration_to_recip(duration: &HumNum) -> String {
    if is_zero(duration) {
        return "q".to_string();
    }
    let plain = |value: HumNum| {
        let recip = HumNum::from_integer(4) / value;
        if recip.is_integer() {
            Some(recip.numer().to_string())
        } else if *recip.numer() == 1 && recip.denom().count_ones() == 1 {
            // 1/2 = breve, 1/4 = long
            Some("0".repeat(recip.denom().trailing_zeros() as usize))
        } else {
            None
        }
    };
    if let Some(recip) = plain(*duration) {
        return recip;
    }
    for dots in 1..=2usize {
        let bottom = 1i64 << dots;
        let base = duration * HumNum::new(bottom, bottom * 2 - 1);
        if let Some(recip) = plain(base) {
            return format!("{}{}", recip, ".".repeat(dots));
        }
    }
    let recip = HumNum::from_integer(4) / duration;
    format!("{}%{}", recip.numer(), recip.denom())
}

/// Render a duration as `whole+numerator/denominator` (e.g. `1+1/2`).
pub fn mixed_fraction(value: &HumNum) -> String {
    if value.is_integer() {
        return value.numer().to_string();
    }
    let whole = value.trunc();
    let remainder = value - whole;
    if is_zero(&whole) {
        return value.to_string();
    }
    let remainder = if is_negative(&remainder) {
        -remainder
    } else {
        remainder
    };
    format!("{}+{}", whole.numer(), remainder)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(numer: i64, denom: i64) -> HumNum {
        HumNum::new(numer, denom)
    }

    #[test]
    fn test_recip_basic() {
        assert_eq!(recip_to_duration("4"), Some(q(1, 1)));
        assert_eq!(recip_to_duration("8"), Some(q(1, 2)));
        assert_eq!(recip_to_duration("1"), Some(q(4, 1)));
        assert_eq!(recip_to_duration("16cc#"), Some(q(1, 4)));
        assert_eq!(recip_to_duration("4c 8e"), Some(q(1, 1)));
    }

    #[test]
    fn test_recip_dots_and_breves() {
        assert_eq!(recip_to_duration("2."), Some(q(3, 1)));
        assert_eq!(recip_to_duration("4.."), Some(q(7, 4)));
        assert_eq!(recip_to_duration("0"), Some(q(8, 1)));
        assert_eq!(recip_to_duration("00"), Some(q(16, 1)));
    }

    #[test]
    fn test_recip_special() {
        assert_eq!(recip_to_duration("3%2"), Some(q(8, 3)));
        assert_eq!(recip_to_duration("12"), Some(q(1, 3)));
        assert_eq!(recip_to_duration("8qc"), Some(zero()));
        assert_eq!(recip_to_duration("c"), None);
        assert_eq!(recip_to_duration(""), None);
    }

    #[test]
    fn test_timing_sentinel() {
        let timing = Timing::default();
        assert!(!timing.is_analyzed());
        assert_eq!(timing.value(), q(-1, 1));
        assert_eq!(timing.scaled(q(1, 2)), q(-1, 2));
        assert_eq!(timing.to_string(), "-1");
        assert_eq!(Timing::known(q(3, 4)).to_string(), "3/4");
    }

    #[test]
    fn test_duration_to_recip() {
        assert_eq!(duration_to_recip(&q(1, 1)), "4");
        assert_eq!(duration_to_recip(&q(1, 2)), "8");
        assert_eq!(duration_to_recip(&q(3, 1)), "2.");
        assert_eq!(duration_to_recip(&q(7, 4)), "4..");
        assert_eq!(duration_to_recip(&q(1, 3)), "12");
        assert_eq!(duration_to_recip(&q(8, 1)), "0");
        assert_eq!(duration_to_recip(&q(16, 1)), "00");
        assert_eq!(duration_to_recip(&q(8, 3)), "3%2");
        assert_eq!(duration_to_recip(&zero()), "q");
    }

    #[test]
    fn test_mixed_fraction() {
        assert_eq!(mixed_fraction(&q(3, 2)), "1+1/2");
        assert_eq!(mixed_fraction(&q(1, 2)), "1/2");
        assert_eq!(mixed_fraction(&q(-1, 1)), "-1");
        assert_eq!(mixed_fraction(&q(4, 1)), "4");
        assert_eq!(mixed_fraction(&q(-3, 2)), "-1+1/2");
    }

    #[test]
    fn test_predicates() {
        assert!(is_zero(&zero()));
        assert!(is_negative(&q(-1, 4)));
        assert!(!is_negative(&q(1, 4)));
        assert!(!is_negative(&zero()));
        assert_eq!(to_f64(&q(3, 4)), 0.75);
    }
}
