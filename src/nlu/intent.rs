//! # Stop-Intent Classifier
//!
//! Decides whether an utterance asks the assistant to terminate the
//! session. Matching is substring containment over normalized text
//! against a configured phrase list, deliberately permissive: a false
//! positive ends a session early, a false negative would leave the
//! session un-terminable.

use super::normalize;

/// Returns true if the normalized text contains any configured stop
/// phrase as a substring.
///
/// Phrases are normalized the same way as the utterance, so the
/// configuration may carry casing or punctuation without breaking the
/// match. Empty phrases are ignored.
pub fn is_stop_intent(text: &str, stop_phrases: &[String]) -> bool {
    let normalized = normalize(text);

    stop_phrases.iter().any(|phrase| {
        let phrase = normalize(phrase);
        !phrase.is_empty() && normalized.contains(&phrase)
    })
}
