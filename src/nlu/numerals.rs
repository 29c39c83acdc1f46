//! # Numeral Interpreter
//!
//! Converts recognized Turkish speech into an optional percentage value.
//! Accepts plain digits ("45"), a percent-marked group ("%45", "yüzde 45")
//! and the spoken tens + units construction ("kırk beş").
//!
//! Resolution order (first match wins):
//! 1. digit group in the raw text,
//! 2. standalone "yüz" token in the normalized text (always 100),
//! 3. digit group in the normalized text,
//! 4. spoken tens/units scan over the normalized tokens.
//!
//! A standalone "yüz" therefore outranks any spoken digits that follow it
//! ("yüz hayır kırk beş" resolves to 100). That precedence is intentional
//! and covered by a test below.

use super::normalize;

/// Tens words, multiples of ten from 10 to 90.
const TENS: [(&str, u8); 9] = [
    ("on", 10),
    ("yirmi", 20),
    ("otuz", 30),
    ("kırk", 40),
    ("elli", 50),
    ("altmış", 60),
    ("yetmiş", 70),
    ("seksen", 80),
    ("doksan", 90),
];

/// Units words, 1 through 9.
const UNITS: [(&str, u8); 9] = [
    ("bir", 1),
    ("iki", 2),
    ("üç", 3),
    ("dört", 4),
    ("beş", 5),
    ("altı", 6),
    ("yedi", 7),
    ("sekiz", 8),
    ("dokuz", 9),
];

/// The word for one hundred, matched as a standalone token only so that
/// "yüzde" (percent) never triggers it.
const HUNDRED: &str = "yüz";

/// Extract a percentage in [0, 100] from recognized text.
///
/// Returns `None` when no rule matches; the caller must treat that as
/// "could not determine a percentage" and prompt the user, never default
/// to a value. Out-of-range digit groups are rejected, not clamped.
pub fn extract_percentage(text: &str) -> Option<u8> {
    if let Some(value) = first_digit_group(text) {
        return Some(value);
    }

    let normalized = normalize(text);

    if normalized.split_whitespace().any(|token| token == HUNDRED) {
        return Some(100);
    }

    if let Some(value) = first_digit_group(&normalized) {
        return Some(value);
    }

    spoken_numerals(&normalized)
}

/// Find the first maximal run of ASCII digits and parse it.
///
/// Covers both the bare form ("45") and the percent-marked form ("%45",
/// "% 45"); the marker itself carries no information. The first run
/// decides: a run longer than three digits, or a value above 100, rejects
/// without scanning further.
fn first_digit_group(text: &str) -> Option<u8> {
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if !c.is_ascii_digit() {
            continue;
        }

        let mut digits = String::new();
        digits.push(c);
        while let Some(&next) = chars.peek() {
            if next.is_ascii_digit() {
                digits.push(next);
                chars.next();
            } else {
                break;
            }
        }

        if digits.len() > 3 {
            return None;
        }
        let value: u16 = digits.parse().ok()?;
        return if value <= 100 { Some(value as u8) } else { None };
    }

    None
}

/// Scan normalized tokens left to right for a tens word optionally
/// followed immediately by a units word. First match wins.
fn spoken_numerals(normalized: &str) -> Option<u8> {
    let tokens: Vec<&str> = normalized.split_whitespace().collect();

    for (i, token) in tokens.iter().enumerate() {
        if let Some(tens) = word_value(&TENS, token) {
            if let Some(units) = tokens.get(i + 1).and_then(|t| word_value(&UNITS, t)) {
                return Some(tens + units);
            }
            return Some(tens);
        }
        if let Some(units) = word_value(&UNITS, token) {
            return Some(units);
        }
    }

    None
}

fn word_value(table: &[(&str, u8)], token: &str) -> Option<u8> {
    table
        .iter()
        .find(|(word, _)| *word == token)
        .map(|(_, value)| *value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_digits_anywhere_in_text() {
        assert_eq!(extract_percentage("45"), Some(45));
        assert_eq!(extract_percentage("pwm 45 olsun"), Some(45));
        assert_eq!(extract_percentage("lütfen 0 yap"), Some(0));
        assert_eq!(extract_percentage("100 istiyorum"), Some(100));
    }

    #[test]
    fn percent_marked_digits() {
        assert_eq!(extract_percentage("%45"), Some(45));
        assert_eq!(extract_percentage("% 45"), Some(45));
        assert_eq!(extract_percentage("yüzde 45"), Some(45));
    }

    #[test]
    fn out_of_range_digits_are_rejected_not_clamped() {
        assert_eq!(extract_percentage("101"), None);
        assert_eq!(extract_percentage("999"), None);
        assert_eq!(extract_percentage("%250"), None);
    }

    #[test]
    fn long_digit_runs_are_rejected() {
        assert_eq!(extract_percentage("1000"), None);
        assert_eq!(extract_percentage("20250101"), None);
    }

    #[test]
    fn first_digit_group_decides_no_fallthrough() {
        // 250 rejects the digit path entirely; the later 45 is never read.
        // The spoken-numeral scan does not match digits either.
        assert_eq!(extract_percentage("250 yok 45"), None);
    }

    #[test]
    fn spoken_tens_plus_units() {
        assert_eq!(extract_percentage("kırk beş"), Some(45));
        assert_eq!(extract_percentage("yetmiş iki"), Some(72));
        assert_eq!(extract_percentage("pwm otuz yedi olsun"), Some(37));
    }

    #[test]
    fn lone_tens_and_lone_units() {
        assert_eq!(extract_percentage("elli"), Some(50));
        assert_eq!(extract_percentage("dokuz"), Some(9));
        assert_eq!(extract_percentage("on"), Some(10));
    }

    #[test]
    fn hundred_as_standalone_token() {
        assert_eq!(extract_percentage("yüz"), Some(100));
        assert_eq!(extract_percentage("tam yüz olsun"), Some(100));
    }

    #[test]
    fn hundred_outranks_later_spoken_digits() {
        // Intentional precedence: once "yüz" triggers, nothing after it
        // is scanned.
        assert_eq!(extract_percentage("yüz hayır kırk beş"), Some(100));
    }

    #[test]
    fn yuzde_alone_does_not_mean_hundred() {
        assert_eq!(extract_percentage("yüzde"), None);
    }

    #[test]
    fn first_spoken_match_wins() {
        assert_eq!(extract_percentage("yirmi değil otuz"), Some(20));
    }

    #[test]
    fn unrelated_speech_yields_nothing() {
        assert_eq!(extract_percentage("merhaba"), None);
        assert_eq!(extract_percentage(""), None);
        assert_eq!(extract_percentage("ışığı aç"), None);
    }

    #[test]
    fn punctuation_does_not_break_spoken_numerals() {
        assert_eq!(extract_percentage("Kırk, beş."), Some(45));
    }
}
