use crate::warehouse::Record;
use regex::Regex;

/// How the question wants its answer shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerStyle {
    /// "list/show/display/which/what ..." questions get an enumerated list.
    Listing,
    /// Everything else gets a direct, concise answer.
    Direct,
}

/// Prefix classification of the question. Deliberately shallow: the words
/// that open the question decide the template.
pub fn classify(question: &str) -> AnswerStyle {
    let listing_re = Regex::new(r"(?i)^\s*(list|show|display|which|what)\b").unwrap();
    if listing_re.is_match(question) {
        AnswerStyle::Listing
    } else {
        AnswerStyle::Direct
    }
}

/// Builds the summarization prompt for the second LLM call, feeding the
/// bounded result set back as JSON context.
pub fn summary_prompt(question: &str, results: &[Record], limit: usize) -> String {
    let bounded = &results[..results.len().min(limit)];
    let context = serde_json::to_string_pretty(bounded).unwrap_or_default();

    match classify(question) {
        AnswerStyle::Listing => format!(
            r#"
Based on this data, provide a formatted list of the results to answer the question. Include all fields for each item, using clear labels.

Data: {context}
Question: {question}

Format the response as a numbered list, e.g.:
1. Item: [Field1: Value1, Field2: Value2, ...]
2. Item: [Field1: Value1, Field2: Value2, ...]
If no results, state: "No items found matching the criteria."
Ensure all returned items are listed, up to the provided data limit.
"#
        ),
        AnswerStyle::Direct => format!(
            r#"
Based on this data, answer the question directly and concisely:

Data: {context}
Question: {question}

Provide a specific, direct answer:
"#
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<Record> {
        let mut row = Record::new();
        row.insert("count".to_string(), serde_json::json!(42));
        vec![row]
    }

    #[test]
    fn listing_prefixes_classify_as_listing() {
        for q in [
            "list all devices",
            "Show the unprotected endpoints",
            "  which machines are outdated?",
            "What threats were seen today",
            "display open alerts",
        ] {
            assert_eq!(classify(q), AnswerStyle::Listing, "question: {}", q);
        }
    }

    #[test]
    fn other_questions_classify_as_direct() {
        for q in ["how many devices are there", "count the threats", "is device X protected"] {
            assert_eq!(classify(q), AnswerStyle::Direct, "question: {}", q);
        }
    }

    #[test]
    fn listing_prompt_requests_numbered_list() {
        let prompt = summary_prompt("list all devices", &rows(), 10);
        assert!(prompt.contains("numbered list"));
        assert!(prompt.contains("list all devices"));
    }

    #[test]
    fn direct_prompt_requests_concise_answer() {
        let prompt = summary_prompt("how many devices are there", &rows(), 10);
        assert!(prompt.contains("directly and concisely"));
        assert!(prompt.contains("\"count\": 42"));
    }

    #[test]
    fn context_is_bounded_by_limit() {
        let mut many = Vec::new();
        for i in 0..5 {
            let mut row = Record::new();
            row.insert("id".to_string(), serde_json::json!(i));
            many.push(row);
        }
        let prompt = summary_prompt("how many rows", &many, 2);
        assert!(prompt.contains("\"id\": 1"));
        assert!(!prompt.contains("\"id\": 4"));
    }
}
