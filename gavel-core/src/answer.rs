//! Answer composition from retrieved precedents.
//!
//! Deliberately template-based: a generative backend can replace
//! [`compose`] later as long as it keeps the same contract — query plus
//! retrieved cases in, answer plus context plus provenance out.

use serde::{Deserialize, Serialize};

use crate::caselaw::RetrievedCase;

/// Fixed answer returned when retrieval finds nothing. An empty corpus
/// is a defined terminal case, not an error.
pub const NO_PRECEDENT_ANSWER: &str = "No similar precedents were found.";

/// Characters of joined principles quoted inside the answer body. The
/// full per-case principles still travel untruncated in `context`.
const PREVIEW_LIMIT: usize = 500;

/// The response to one legal question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerPayload {
    pub answer: String,
    /// Per-case legal principles, in retrieval order, untruncated.
    pub context: Vec<String>,
    /// De-duplicated provenance of the retrieved cases.
    pub source_files: Vec<String>,
}

/// Build an answer from the query text and the retrieved cases.
pub fn compose(query: &str, retrieved: &[RetrievedCase]) -> AnswerPayload {
    if retrieved.is_empty() {
        return AnswerPayload {
            answer: NO_PRECEDENT_ANSWER.to_string(),
            context: Vec::new(),
            source_files: Vec::new(),
        };
    }

    let principles: Vec<&str> = retrieved
        .iter()
        .map(|r| r.case.legal_principles.as_str())
        .collect();
    let joined = principles.join("\n");
    // Char-based truncation keeps multi-byte text intact.
    let preview: String = joined.chars().take(PREVIEW_LIMIT).collect();
    let answer = format!(
        "Based on prior case law, \"{query}\" is most often interpreted as follows:\n{preview}..."
    );

    let context: Vec<String> = principles.iter().map(|p| p.to_string()).collect();

    let mut source_files: Vec<String> = Vec::new();
    for r in retrieved {
        if !source_files.contains(&r.case.source_file) {
            source_files.push(r.case.source_file.clone());
        }
    }

    AnswerPayload {
        answer,
        context,
        source_files,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caselaw::CaseRecord;

    fn hit(case_id: &str, principles: &str, source_file: &str, distance: f32) -> RetrievedCase {
        RetrievedCase {
            case: CaseRecord {
                case_id: case_id.to_string(),
                legal_principles: principles.to_string(),
                verdict: "upheld".to_string(),
                embedding: vec![0.0; 3],
                source_file: source_file.to_string(),
            },
            distance,
        }
    }

    #[test]
    fn empty_retrieval_yields_fixed_fallback() {
        let payload = compose("any question at all", &[]);
        assert_eq!(payload.answer, NO_PRECEDENT_ANSWER);
        assert!(payload.context.is_empty());
        assert!(payload.source_files.is_empty());
    }

    #[test]
    fn answer_echoes_query_and_quotes_principles() {
        let retrieved = vec![hit("C1", "Principle A", "f1.txt", 0.1)];
        let payload = compose("test query", &retrieved);

        assert!(payload.answer.contains("test query"));
        assert!(payload.answer.contains("Principle A"));
        assert_eq!(payload.context, vec!["Principle A"]);
        assert_eq!(payload.source_files, vec!["f1.txt"]);
    }

    #[test]
    fn context_has_one_entry_per_case_in_retrieval_order() {
        let retrieved = vec![
            hit("C1", "first", "f1.txt", 0.1),
            hit("C2", "second", "f2.txt", 0.2),
            hit("C3", "third", "f3.txt", 0.3),
        ];
        let payload = compose("q", &retrieved);
        assert_eq!(payload.context, vec!["first", "second", "third"]);
    }

    #[test]
    fn source_files_are_deduplicated() {
        let retrieved = vec![
            hit("C1", "a", "shared.txt", 0.1),
            hit("C2", "b", "other.txt", 0.2),
            hit("C3", "c", "shared.txt", 0.3),
        ];
        let payload = compose("q", &retrieved);
        assert_eq!(payload.source_files, vec!["shared.txt", "other.txt"]);
    }

    #[test]
    fn long_principles_are_truncated_in_answer_but_not_context() {
        let long = "x".repeat(800);
        let retrieved = vec![hit("C1", &long, "f1.txt", 0.1)];
        let payload = compose("q", &retrieved);

        // 500 chars of preview at most, regardless of principle length.
        let preview_len = payload
            .answer
            .chars()
            .filter(|c| *c == 'x')
            .count();
        assert_eq!(preview_len, 500);
        assert!(payload.answer.ends_with("..."));
        assert_eq!(payload.context[0].len(), 800);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        // Multi-byte characters around the cut point must not panic.
        let long = "ق".repeat(600);
        let retrieved = vec![hit("C1", &long, "f1.txt", 0.1)];
        let payload = compose("q", &retrieved);
        assert!(payload.answer.ends_with("..."));
    }
}
