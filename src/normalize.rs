//! Deterministic text normalization for storyline embeddings.
//!
//! Raw storylines and user queries pass through the same cleaning
//! pipeline before embedding: lower-casing, digit removal, punctuation
//! removal, stopword removal, and whitespace collapsing, in that fixed
//! order. The whole pipeline is a pure function of its input; there is
//! no locale, environment, or time dependence, so the same text always
//! produces the same cleaned form on every machine.
//!
//! Queries must be normalized with the exact policy the index was built
//! with, otherwise scores silently degrade. The build records its
//! policy (and a fingerprint of it) in the artifact metadata, and the
//! query engine reconstructs its normalizer from that record.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// English stopwords removed during normalization.
///
/// This is the NLTK English stopword list, kept verbatim so indexes
/// remain comparable with those produced by earlier tooling. Entries
/// with apostrophes only match when punctuation stripping is disabled,
/// since punctuation is removed before stopword filtering.
static STOPWORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "that'll",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "don't", "should", "should've", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn",
    "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn",
    "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan", "shan't",
    "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't", "wouldn",
    "wouldn't",
];

/// Toggles for the individual normalization stages.
///
/// The policy in effect at build time is recorded in the artifact
/// metadata so queries can be normalized identically at serving time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerPolicy {
    /// Lower-case all text before further processing.
    pub lowercase: bool,
    /// Replace digit runs with a space, splitting tokens like "area51".
    pub strip_digits: bool,
    /// Delete ASCII punctuation so contractions collapse ("don't" -> "dont").
    pub strip_punctuation: bool,
    /// Drop English stopwords after tokenization.
    pub remove_stopwords: bool,
}

impl Default for NormalizerPolicy {
    fn default() -> Self {
        Self {
            lowercase: true,
            strip_digits: true,
            strip_punctuation: true,
            remove_stopwords: true,
        }
    }
}

impl NormalizerPolicy {
    /// Stable fingerprint of the policy and its stopword list.
    ///
    /// Two artifact sets with equal fingerprints normalize every text
    /// identically, so their scores are directly comparable.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update([
            u8::from(self.lowercase),
            u8::from(self.strip_digits),
            u8::from(self.strip_punctuation),
            u8::from(self.remove_stopwords),
        ]);
        for word in STOPWORDS {
            hasher.update(word.as_bytes());
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Applies the normalization pipeline to raw text.
///
/// Construction is cheap; the stopword set is built once and shared by
/// clones, so a normalizer can be created per build or per engine and
/// reused across texts.
#[derive(Debug, Clone)]
pub struct Normalizer {
    policy: NormalizerPolicy,
    stopwords: HashSet<&'static str>,
}

impl Normalizer {
    /// Creates a normalizer for the given policy.
    #[must_use]
    pub fn new(policy: NormalizerPolicy) -> Self {
        let stopwords = if policy.remove_stopwords {
            STOPWORDS.iter().copied().collect()
        } else {
            HashSet::new()
        };
        Self { policy, stopwords }
    }

    /// Returns the policy this normalizer applies.
    #[must_use]
    pub fn policy(&self) -> &NormalizerPolicy {
        &self.policy
    }

    /// Normalizes one text.
    ///
    /// Empty input, or input that is entirely digits, punctuation, and
    /// stopwords, yields an empty string rather than an error.
    #[must_use]
    pub fn normalize(&self, raw: &str) -> String {
        let lowered = if self.policy.lowercase {
            raw.to_lowercase()
        } else {
            raw.to_string()
        };

        let mut scrubbed = String::with_capacity(lowered.len());
        for c in lowered.chars() {
            if self.policy.strip_digits && c.is_numeric() {
                // Digits become spaces so "area51" splits into "area".
                scrubbed.push(' ');
            } else if self.policy.strip_punctuation && c.is_ascii_punctuation() {
                // Punctuation is deleted outright: "don't" -> "dont".
            } else {
                scrubbed.push(c);
            }
        }

        let mut out = String::with_capacity(scrubbed.len());
        for token in scrubbed.split_whitespace() {
            if self.policy.remove_stopwords && self.stopwords.contains(token) {
                continue;
            }
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(token);
        }
        out
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(NormalizerPolicy::default())
    }
}
