//! WordNet-style noun lemmatization backed by a plain-text lemma dictionary.
//!
//! Dictionary format, one entry per line:
//!
//! ```text
//! # comment
//! dog            a known lemma
//! geese goose    an irregular form and its base form(s)
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::{Error, Result};

const NOUN_RULES: &[(&str, &str)] = &[
    ("s", ""),
    ("ses", "s"),
    ("ves", "f"),
    ("xes", "x"),
    ("zes", "z"),
    ("ches", "ch"),
    ("shes", "sh"),
    ("men", "man"),
    ("ies", "y"),
];

#[derive(Debug, Clone, Default)]
pub struct Lemmatizer {
    lemmas: HashSet<String>,
    exceptions: HashMap<String, Vec<String>>,
}

impl Lemmatizer {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::ArtifactMissing(format!("{}: {e}", path.display())))?;
        let lemmatizer = Self::parse(&text);
        if lemmatizer.lemmas.is_empty() {
            return Err(Error::corrupt(path.display().to_string(), "empty lemma dictionary"));
        }
        Ok(lemmatizer)
    }

    pub fn parse(text: &str) -> Self {
        let mut lemmatizer = Self::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            let Some(form) = fields.next() else { continue };
            let bases: Vec<String> = fields.map(str::to_string).collect();
            if bases.is_empty() {
                lemmatizer.lemmas.insert(form.to_string());
            } else {
                lemmatizer.lemmas.extend(bases.iter().cloned());
                lemmatizer
                    .exceptions
                    .entry(form.to_string())
                    .or_default()
                    .extend(bases);
            }
        }
        lemmatizer
    }

    pub fn len(&self) -> usize {
        self.lemmas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lemmas.is_empty()
    }

    /// Shortest known base form of `word`, or `word` itself when none is known.
    pub fn lemmatize(&self, word: &str) -> String {
        self.candidates(word)
            .into_iter()
            .reduce(|best, c| if c.len() < best.len() { c } else { best })
            .unwrap_or_else(|| word.to_string())
    }

    fn candidates(&self, word: &str) -> Vec<String> {
        if let Some(bases) = self.exceptions.get(word) {
            let forms = std::iter::once(word.to_string()).chain(bases.iter().cloned());
            return self.known(forms);
        }
        let mut forms = apply_rules(&[word.to_string()]);
        let found = self.known(std::iter::once(word.to_string()).chain(forms.iter().cloned()));
        if !found.is_empty() {
            return found;
        }
        while !forms.is_empty() {
            forms = apply_rules(&forms);
            let found = self.known(forms.iter().cloned());
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }

    fn known(&self, forms: impl Iterator<Item = String>) -> Vec<String> {
        let mut seen = HashSet::new();
        forms
            .filter(|f| self.lemmas.contains(f) && seen.insert(f.clone()))
            .collect()
    }
}

fn apply_rules(forms: &[String]) -> Vec<String> {
    forms
        .iter()
        .flat_map(|form| {
            NOUN_RULES.iter().filter_map(move |(suffix, replacement)| {
                form.strip_suffix(suffix)
                    .map(|stem| format!("{stem}{replacement}"))
            })
        })
        .collect()
}
