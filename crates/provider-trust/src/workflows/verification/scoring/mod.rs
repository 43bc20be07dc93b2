mod config;
mod normalizer;
mod similarity;

pub use config::{
    InvalidThreshold, ScoringConfig, DEFAULT_FIELD_THRESHOLD, DEFAULT_OVERALL_THRESHOLD,
};
pub use normalizer::normalize;
pub use similarity::{best_match, edit_similarity, levenshtein, similarity, SpanMatch};

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Match detail for one expected value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMatch {
    pub found: bool,
    pub similarity: f64,
    pub expected_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_word: Option<String>,
}

/// Outcome of one document-verification attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub success: bool,
    pub overall_score: f64,
    pub fields: BTreeMap<String, FieldMatch>,
    pub raw_text: String,
    pub cleaned_text: String,
    pub processed_at: DateTime<Utc>,
    pub processing_time_ms: u64,
}

impl VerificationResult {
    pub fn missing_mandatory<'a>(
        &'a self,
        config: &'a ScoringConfig,
    ) -> impl Iterator<Item = &'a str> + 'a {
        config
            .mandatory_fields
            .iter()
            .map(String::as_str)
            .filter(|key| !self.fields.get(*key).map(|field| field.found).unwrap_or(false))
    }
}

/// Stateless matcher comparing OCR text against the identity a provider claims.
#[derive(Debug, Clone, Default)]
pub struct VerificationScorer {
    config: ScoringConfig,
}

impl VerificationScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn verify(
        &self,
        raw_text: &str,
        expected: &BTreeMap<String, String>,
    ) -> VerificationResult {
        let started = Instant::now();
        let cleaned_text = normalize(raw_text);
        let text_tokens = normalizer::tokens(&cleaned_text);

        // Values with nothing left after normalization cannot match and are
        // left out of the average.
        let fields = expected
            .iter()
            .filter_map(|(key, value)| {
                let normalized = normalize(value);
                (!normalized.is_empty()).then(|| {
                    let field = self.match_field(key, value, &normalized, &text_tokens);
                    (key.clone(), field)
                })
            })
            .collect::<BTreeMap<_, _>>();

        let overall_score = if fields.is_empty() {
            0.0
        } else {
            fields.values().map(|field| field.similarity).sum::<f64>() / fields.len() as f64
        };

        let mandatory_found = self
            .config
            .mandatory_fields
            .iter()
            .all(|key| fields.get(key).map(|field| field.found).unwrap_or(false));
        let success =
            !fields.is_empty() && overall_score >= self.config.overall_threshold && mandatory_found;

        let processing_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        VerificationResult {
            success,
            overall_score,
            fields,
            raw_text: raw_text.to_string(),
            cleaned_text,
            processed_at: Utc::now(),
            processing_time_ms,
        }
    }

    fn match_field(
        &self,
        key: &str,
        expected_value: &str,
        normalized: &str,
        text_tokens: &[&str],
    ) -> FieldMatch {
        let expected_tokens = normalizer::tokens(normalized).len();
        let best = best_match(normalized, expected_tokens, text_tokens);
        let similarity = best.as_ref().map(|span| span.similarity).unwrap_or(0.0);

        FieldMatch {
            found: best.is_some() && similarity >= self.config.threshold_for(key),
            similarity,
            expected_value: expected_value.to_string(),
            matched_word: best.map(|span| span.span),
        }
    }
}

