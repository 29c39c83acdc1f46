//! # Spoken-Command Interpretation
//!
//! Pure text-interpretation layer sitting between the transcription
//! backend and the session pipeline:
//!
//! - **Numeral Interpreter**: extracts a percentage value (0-100) from
//!   free-form Turkish speech, in digits or spoken numerals.
//! - **Intent Classifier**: recognizes the closed set of utterances that
//!   ask the assistant to stop.
//!
//! Both operate on the same normalized form of the recognized text, and
//! neither touches session state.

pub mod intent;
pub mod numerals;

pub use intent::is_stop_intent;
pub use numerals::extract_percentage;

/// Normalize recognized text for matching.
///
/// Keeps word characters, `%` and whitespace; everything else becomes a
/// separator. Lowercases and collapses runs of whitespace to single
/// spaces. Both the numeral interpreter and the intent classifier rely on
/// this exact normalization so their views of an utterance never diverge.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut cleaned = String::with_capacity(lowered.len());

    for c in lowered.chars() {
        if c.is_alphanumeric() || c == '%' {
            cleaned.push(c);
        } else {
            cleaned.push(' ');
        }
    }

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_punctuation_and_collapses_whitespace() {
        assert_eq!(normalize("  Kırk   beş,  lütfen! "), "kırk beş lütfen");
    }

    #[test]
    fn keeps_percent_and_digits() {
        assert_eq!(normalize("PWM %45 olsun."), "pwm %45 olsun");
    }

    #[test]
    fn empty_input_normalizes_to_empty() {
        assert_eq!(normalize("?!.,"), "");
    }
}
