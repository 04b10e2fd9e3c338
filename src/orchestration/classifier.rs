//! Retryable-error classification.
//!
//! The Step Runner treats a failure as transient when the classifier says
//! so; everything else is permanent and escalates immediately. The
//! classifier is a pluggable predicate so keyword matching on error text
//! can later be swapped for structured error codes without touching the
//! runner.

/// Decides whether a step failure is worth retrying.
pub trait RetryClassifier: Send + Sync {
    /// Classify the rendered error text of a failed attempt.
    fn is_retryable(&self, error_text: &str) -> bool;

    /// Classifier name for logs.
    fn classifier_name(&self) -> &'static str;
}

/// Transient-condition keywords: timeouts, connection trouble, temporary
/// unavailability.
const RETRYABLE_KEYWORDS: [&str; 3] = ["timeout", "connection", "temporarily unavailable"];

/// Default classifier: case-insensitive substring match against a fixed
/// keyword set.
#[derive(Debug, Clone)]
pub struct KeywordRetryClassifier {
    keywords: Vec<String>,
}

impl KeywordRetryClassifier {
    pub fn new() -> Self {
        Self::with_keywords(RETRYABLE_KEYWORDS.iter().map(|k| k.to_string()))
    }

    pub fn with_keywords(keywords: impl IntoIterator<Item = String>) -> Self {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.to_lowercase())
                .collect(),
        }
    }
}

impl Default for KeywordRetryClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryClassifier for KeywordRetryClassifier {
    fn is_retryable(&self, error_text: &str) -> bool {
        let lowered = error_text.to_lowercase();
        self.keywords.iter().any(|k| lowered.contains(k))
    }

    fn classifier_name(&self) -> &'static str {
        "KeywordRetryClassifier"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_transient_keywords_match() {
        let classifier = KeywordRetryClassifier::new();
        assert!(classifier.is_retryable("read timeout while polling"));
        assert!(classifier.is_retryable("Connection refused by host"));
        assert!(classifier.is_retryable("service temporarily unavailable"));
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let classifier = KeywordRetryClassifier::new();
        assert!(classifier.is_retryable("CONNECTION RESET"));
        assert!(classifier.is_retryable("Timeout after 600s"));
    }

    #[test]
    fn test_permanent_errors_do_not_match() {
        let classifier = KeywordRetryClassifier::new();
        assert!(!classifier.is_retryable("constraint violation on dim_products"));
        assert!(!classifier.is_retryable("data validation error"));
        assert!(!classifier.is_retryable(""));
    }

    #[test]
    fn test_custom_keyword_set() {
        let classifier = KeywordRetryClassifier::with_keywords(["deadlock".to_string()]);
        assert!(classifier.is_retryable("Deadlock detected"));
        assert!(!classifier.is_retryable("timeout"));
    }

    proptest! {
        #[test]
        fn prop_casing_never_changes_classification(
            casing_mask in prop::collection::vec(any::<bool>(), 1..40),
            suffix in "[a-z ]{0,20}",
        ) {
            let base = format!("temporarily unavailable {suffix}");
            let mixed: String = base
                .chars()
                .zip(casing_mask.iter().cycle())
                .map(|(c, upper)| if *upper { c.to_ascii_uppercase() } else { c })
                .collect();

            let classifier = KeywordRetryClassifier::new();
            prop_assert!(classifier.is_retryable(&mixed));
        }
    }
}
