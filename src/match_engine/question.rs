//! Normalization of loosely-shaped generator payloads into canonical questions.
//!
//! Generators answer with whatever JSON they feel like: an `options` array with
//! a `correct` field holding text, a letter or an index, or separate `A`..`D`
//! fields plus an `answer` letter. [`RawQuestion::from_value`] classifies the
//! payload into a tagged union and [`normalize`] resolves it into a
//! [`Question`] whose correct option is guaranteed to be one of its options.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::state::match_state::{InvalidQuestion, Question, QuestionProvenance};

const TEXT_KEYS: [&str; 3] = ["question", "q", "prompt"];
const ANSWER_KEYS: [&str; 5] = [
    "correct",
    "answer",
    "answerKey",
    "answer_letter",
    "correctOption",
];
const OPTION_LETTERS: [char; 4] = ['A', 'B', 'C', 'D'];

/// Value of the field that designates the correct answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerKey {
    /// A string: a letter, the option text or a prefixed option text.
    Text(String),
    /// A non-negative integer, read as a zero-based option index.
    Index(u64),
}

/// Classified generator payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawQuestion {
    /// Options supplied as an ordered array.
    Listed {
        /// Prompt, if any alias was present.
        text: Option<String>,
        /// Option texts in order.
        options: Vec<String>,
        /// Field designating the correct answer.
        answer: Option<AnswerKey>,
        /// Optional explanation.
        explanation: Option<String>,
    },
    /// Options supplied as separate lettered fields (`A`, `option_A`, ...).
    Lettered {
        /// Prompt, if any alias was present.
        text: Option<String>,
        /// Present options with their letter label, in letter order.
        options: Vec<(char, String)>,
        /// Field designating the correct answer.
        answer: Option<AnswerKey>,
        /// Optional explanation.
        explanation: Option<String>,
    },
    /// The generator reported an error instead of a question.
    Failed {
        /// Error message carried by the payload.
        reason: String,
    },
    /// An `options` array holding an entry that is neither text nor a number.
    MalformedOptions {
        /// Zero-based position of the first offending entry.
        position: usize,
    },
    /// Anything else.
    Unrecognized,
}

/// How the correct option was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerResolution {
    /// A single letter mapped to an option position or label.
    Letter,
    /// A numeric zero-based index.
    Index,
    /// The answer field already held an option text.
    Verbatim,
    /// The answer field held a lettered option such as `"A. Paris"`.
    Prefixed,
    /// Nothing resolved; the first option was assumed correct.
    DefaultedToFirst,
}

/// A normalized question along with how its answer was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedQuestion {
    /// Canonical question.
    pub question: Question,
    /// Resolution step that produced the correct option.
    pub resolution: AnswerResolution,
}

/// Reasons a payload cannot be normalized at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    /// The generator answered with an error payload.
    #[error("generator reported an error: {0}")]
    Reported(String),
    /// No question text field was present.
    #[error("payload has no question text")]
    MissingText,
    /// No options were present.
    #[error("payload has no options")]
    MissingOptions,
    /// An option entry is not text; letters and indexes would no longer line up.
    #[error("option at position {0} is neither text nor a number")]
    MalformedOption(usize),
    /// The payload matched no known shape.
    #[error("payload shape is not recognized")]
    Unrecognized,
    /// The fields were present but do not form a valid question.
    #[error(transparent)]
    Invalid(#[from] InvalidQuestion),
}

impl RawQuestion {
    /// Classify an arbitrary JSON payload.
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return RawQuestion::Unrecognized;
        };

        let text = first_string(object, &TEXT_KEYS);
        let answer = first_answer(object);
        let explanation = object
            .get("explanation")
            .and_then(Value::as_str)
            .map(str::to_string);

        if let Some(entries) = object.get("options").and_then(Value::as_array) {
            let mut options = Vec::with_capacity(entries.len());
            for (position, option) in entries.iter().enumerate() {
                match option {
                    Value::String(text) => options.push(text.trim().to_string()),
                    Value::Number(number) => options.push(number.to_string()),
                    _ => return RawQuestion::MalformedOptions { position },
                }
            }
            return RawQuestion::Listed {
                text,
                options,
                answer,
                explanation,
            };
        }

        let lettered: Vec<(char, String)> = OPTION_LETTERS
            .iter()
            .filter_map(|letter| {
                let plain = letter.to_string();
                let prefixed = format!("option_{letter}");
                first_string(object, &[plain.as_str(), prefixed.as_str()])
                    .map(|option| (*letter, option))
            })
            .collect();
        if !lettered.is_empty() {
            return RawQuestion::Lettered {
                text,
                options: lettered,
                answer,
                explanation,
            };
        }

        match object.get("error") {
            Some(Value::String(reason)) => RawQuestion::Failed {
                reason: reason.clone(),
            },
            Some(other) => RawQuestion::Failed {
                reason: other.to_string(),
            },
            None => RawQuestion::Unrecognized,
        }
    }
}

/// Normalize a classified payload into a canonical question.
pub fn normalize(raw: RawQuestion) -> Result<NormalizedQuestion, NormalizeError> {
    let (text, options, labels, answer, explanation) = match raw {
        RawQuestion::Listed {
            text,
            options,
            answer,
            explanation,
        } => (text, options, None, answer, explanation),
        RawQuestion::Lettered {
            text,
            options,
            answer,
            explanation,
        } => {
            let (labels, options): (Vec<char>, Vec<String>) = options.into_iter().unzip();
            (text, options, Some(labels), answer, explanation)
        }
        RawQuestion::Failed { reason } => return Err(NormalizeError::Reported(reason)),
        RawQuestion::MalformedOptions { position } => {
            return Err(NormalizeError::MalformedOption(position));
        }
        RawQuestion::Unrecognized => return Err(NormalizeError::Unrecognized),
    };

    let text = text.ok_or(NormalizeError::MissingText)?;
    if options.is_empty() {
        return Err(NormalizeError::MissingOptions);
    }

    let (correct_index, resolution) = answer
        .as_ref()
        .and_then(|answer| resolve_answer(answer, &options, labels.as_deref()))
        .unwrap_or((0, AnswerResolution::DefaultedToFirst));

    let provenance = match resolution {
        AnswerResolution::DefaultedToFirst => QuestionProvenance::Degraded,
        _ => QuestionProvenance::Generated,
    };
    let question = Question::new(&text, options, correct_index, explanation, provenance)?;

    Ok(NormalizedQuestion {
        question,
        resolution,
    })
}

/// Normalize any generator payload, substituting the built-in question on failure.
pub fn normalize_or_fallback(value: &Value) -> Question {
    match normalize(RawQuestion::from_value(value)) {
        Ok(NormalizedQuestion {
            question,
            resolution: AnswerResolution::DefaultedToFirst,
        }) => {
            warn!(
                question = question.text(),
                "generated question has no resolvable correct answer; assuming the first option"
            );
            question
        }
        Ok(NormalizedQuestion {
            question,
            resolution,
        }) => {
            debug!(?resolution, "normalized generated question");
            question
        }
        Err(err) => {
            warn!(error = %err, "unusable generated question; serving fallback");
            Question::fallback()
        }
    }
}

fn resolve_answer(
    answer: &AnswerKey,
    options: &[String],
    labels: Option<&[char]>,
) -> Option<(usize, AnswerResolution)> {
    match answer {
        AnswerKey::Index(index) => usize::try_from(*index)
            .ok()
            .filter(|index| *index < options.len())
            .map(|index| (index, AnswerResolution::Index)),
        AnswerKey::Text(value) => {
            let value = value.trim();

            if let Some(index) = letter_index(value, options.len(), labels) {
                return Some((index, AnswerResolution::Letter));
            }

            if let Some(index) = options.iter().position(|option| option == value) {
                return Some((index, AnswerResolution::Verbatim));
            }

            strip_option_label(value)
                .and_then(|stripped| options.iter().position(|option| option == stripped))
                .map(|index| (index, AnswerResolution::Prefixed))
        }
    }
}

/// Map a lone `A`..`D` letter to an option position (or label when lettered).
fn letter_index(value: &str, len: usize, labels: Option<&[char]>) -> Option<usize> {
    let mut chars = value.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    if chars.next().is_some() || !OPTION_LETTERS.contains(&letter) {
        return None;
    }

    match labels {
        Some(labels) => labels.iter().position(|label| *label == letter),
        None => {
            let index = (letter as u8 - b'A') as usize;
            (index < len).then_some(index)
        }
    }
}

/// Strip a leading option label such as `A.`, `b)`, `C:` or `D ` from an answer.
fn strip_option_label(value: &str) -> Option<&str> {
    let mut chars = value.char_indices();
    let (_, letter) = chars.next()?;
    if !OPTION_LETTERS.contains(&letter.to_ascii_uppercase()) {
        return None;
    }

    let (offset, next) = chars.next()?;
    let rest = match next {
        '.' | ')' | ':' => &value[offset + next.len_utf8()..],
        c if c.is_whitespace() => &value[offset..],
        _ => return None,
    };

    let rest = rest.trim_start();
    (!rest.is_empty()).then_some(rest)
}

fn first_string(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| object.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn first_answer(object: &Map<String, Value>) -> Option<AnswerKey> {
    ANSWER_KEYS
        .iter()
        .filter_map(|key| object.get(*key))
        .find_map(|value| match value {
            Value::String(text) => Some(AnswerKey::Text(text.clone())),
            Value::Number(number) => Some(
                number
                    .as_u64()
                    .map(AnswerKey::Index)
                    .unwrap_or_else(|| AnswerKey::Text(number.to_string())),
            ),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn normalize_value(value: Value) -> NormalizedQuestion {
        normalize(RawQuestion::from_value(&value)).unwrap()
    }

    #[test]
    fn listed_options_with_letter_answer() {
        let normalized = normalize_value(json!({
            "question": "Capital of Italy?",
            "options": ["Paris", "Rome", "Madrid", "Lisbon"],
            "correct": "b",
        }));

        assert_eq!(normalized.resolution, AnswerResolution::Letter);
        assert_eq!(normalized.question.correct_option(), "Rome");
        assert_eq!(
            normalized.question.provenance(),
            QuestionProvenance::Generated
        );
    }

    #[test]
    fn lettered_fields_with_answer_letter() {
        let normalized = normalize_value(json!({
            "question": "2 + 2?",
            "A": "3",
            "B": "4",
            "C": "5",
            "D": "22",
            "answer": "B",
            "explanation": "Basic arithmetic.",
        }));

        assert_eq!(normalized.question.options(), ["3", "4", "5", "22"]);
        assert_eq!(normalized.question.correct_option(), "4");
        assert_eq!(normalized.question.explanation(), Some("Basic arithmetic."));
    }

    #[test]
    fn lettered_fields_keep_their_labels_when_one_is_missing() {
        let normalized = normalize_value(json!({
            "question": "Pick the vowel",
            "option_A": "b",
            "option_C": "e",
            "option_D": "k",
            "answer": "C",
        }));

        assert_eq!(normalized.resolution, AnswerResolution::Letter);
        assert_eq!(normalized.question.correct_option(), "e");
    }

    #[test]
    fn numeric_answer_is_a_zero_based_index() {
        let normalized = normalize_value(json!({
            "prompt": "Smallest prime?",
            "options": ["1", "2", "3"],
            "answer": 1,
        }));

        assert_eq!(normalized.resolution, AnswerResolution::Index);
        assert_eq!(normalized.question.correct_option(), "2");
    }

    #[test]
    fn verbatim_and_prefixed_answers_resolve_to_option_text() {
        let verbatim = normalize_value(json!({
            "question": "Capital of France?",
            "options": ["Berlin", "Paris"],
            "correctOption": "Paris",
        }));
        assert_eq!(verbatim.resolution, AnswerResolution::Verbatim);
        assert_eq!(verbatim.question.correct_option(), "Paris");

        let prefixed = normalize_value(json!({
            "question": "Capital of France?",
            "options": ["Berlin", "Paris"],
            "answer": "B. Paris",
        }));
        assert_eq!(prefixed.resolution, AnswerResolution::Prefixed);
        assert_eq!(prefixed.question.correct_option(), "Paris");
    }

    #[test]
    fn unresolvable_answer_defaults_to_first_option_and_is_flagged() {
        let normalized = normalize_value(json!({
            "question": "Capital of France?",
            "options": ["Berlin", "Paris"],
            "answer": "Madrid",
        }));

        assert_eq!(normalized.resolution, AnswerResolution::DefaultedToFirst);
        assert_eq!(normalized.question.correct_option(), "Berlin");
        assert_eq!(
            normalized.question.provenance(),
            QuestionProvenance::Degraded
        );
    }

    #[test]
    fn out_of_range_letter_or_index_falls_through() {
        let letter = normalize_value(json!({
            "question": "q",
            "options": ["x", "y"],
            "answer": "D",
        }));
        assert_eq!(letter.resolution, AnswerResolution::DefaultedToFirst);

        let index = normalize_value(json!({
            "question": "q",
            "options": ["x", "y"],
            "answer": 7,
        }));
        assert_eq!(index.resolution, AnswerResolution::DefaultedToFirst);
    }

    #[test]
    fn error_payloads_and_missing_fields_are_rejected() {
        assert_eq!(
            normalize(RawQuestion::from_value(
                &json!({ "error": "Gemini request failed" })
            )),
            Err(NormalizeError::Reported("Gemini request failed".into()))
        );
        assert_eq!(
            normalize(RawQuestion::from_value(
                &json!({ "options": ["a", "b"], "answer": "A" })
            )),
            Err(NormalizeError::MissingText)
        );
        assert_eq!(
            normalize(RawQuestion::from_value(
                &json!({ "question": "q", "options": [] })
            )),
            Err(NormalizeError::MissingOptions)
        );
        assert_eq!(
            normalize(RawQuestion::from_value(&json!("just text"))),
            Err(NormalizeError::Unrecognized)
        );
        assert!(matches!(
            normalize(RawQuestion::from_value(
                &json!({ "question": "q", "options": ["a", "a"], "answer": "A" })
            )),
            Err(NormalizeError::Invalid(InvalidQuestion::DuplicateOption(_)))
        ));
    }

    #[test]
    fn fallback_is_served_for_unusable_payloads() {
        let question = normalize_or_fallback(&json!({ "raw": "???" }));
        assert_eq!(question, Question::fallback());
    }

    #[test]
    fn non_text_option_entries_reject_the_whole_payload() {
        let payload = json!({
            "question": "Capital of Italy?",
            "options": ["Paris", null, "Rome", "Oslo"],
            "answer": "C",
        });

        assert_eq!(
            RawQuestion::from_value(&payload),
            RawQuestion::MalformedOptions { position: 1 }
        );
        assert_eq!(
            normalize(RawQuestion::from_value(&payload)),
            Err(NormalizeError::MalformedOption(1))
        );
        assert_eq!(normalize_or_fallback(&payload), Question::fallback());

        let nested = json!({ "question": "q", "options": ["a", { "text": "b" }], "answer": 1 });
        assert_eq!(normalize_or_fallback(&nested), Question::fallback());
    }

    #[test]
    fn option_label_stripping() {
        assert_eq!(strip_option_label("A. Paris"), Some("Paris"));
        assert_eq!(strip_option_label("c) Rome"), Some("Rome"));
        assert_eq!(strip_option_label("D: Oslo"), Some("Oslo"));
        assert_eq!(strip_option_label("B Berlin"), Some("Berlin"));
        assert_eq!(strip_option_label("Berlin"), None);
        assert_eq!(strip_option_label("A."), None);
    }
}
