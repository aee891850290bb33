use std::path::Path;

use crate::error::{Error, Result};
use crate::lemma::Lemmatizer;
use crate::stopwords::StopWords;

const MIN_TOKEN_LEN: usize = 3;

#[derive(Debug, Clone)]
pub struct LinguisticResources {
    pub stop_words: StopWords,
    pub lemmatizer: Lemmatizer,
}

#[derive(Debug, Clone)]
enum Tier {
    Full(LinguisticResources),
    Degraded,
}

/// Lyrics normalizer reproducing the training-time text pipeline.
///
/// The tier is fixed at construction: the full tier drops stop words and
/// lemmatizes, the degraded tier only applies the length filter.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    tier: Tier,
}

impl Preprocessor {
    pub fn full(resources: LinguisticResources) -> Self {
        Self {
            tier: Tier::Full(resources),
        }
    }

    pub fn degraded() -> Self {
        Self { tier: Tier::Degraded }
    }

    /// Full pipeline when the lemma dictionary loads, degraded otherwise.
    ///
    /// An unknown language is a configuration error, not a degradation.
    pub fn from_resource_path(language: &str, lemma_path: Option<&Path>) -> Result<Self> {
        let stop_words = StopWords::for_language(language)?;
        let lemmatizer = match lemma_path {
            Some(path) => Lemmatizer::load(path),
            None => Err(Error::ArtifactMissing("no lemma dictionary configured".into())),
        };
        match lemmatizer {
            Ok(lemmatizer) => {
                tracing::info!(lemmas = lemmatizer.len(), language, "linguistic resources loaded");
                Ok(Self::full(LinguisticResources { stop_words, lemmatizer }))
            }
            Err(e) => {
                tracing::warn!(error = %e, "linguistic resources unavailable, preprocessing in degraded mode");
                Ok(Self::degraded())
            }
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.tier, Tier::Degraded)
    }

    pub fn process(&self, raw: &str) -> String {
        let cleaned = normalize(raw);
        let tokens = cleaned
            .split(' ')
            .filter(|t| t.len() >= MIN_TOKEN_LEN);
        let tokens: Vec<String> = match &self.tier {
            Tier::Full(res) => tokens
                .filter(|t| !res.stop_words.contains(t))
                .map(|t| res.lemmatizer.lemmatize(t))
                .collect(),
            Tier::Degraded => tokens.map(str::to_string).collect(),
        };
        tokens.join(" ")
    }
}

/// Lower-case, keep ASCII letters and whitespace, collapse whitespace runs.
fn normalize(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let kept: String = lowered
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_whitespace())
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}
