//! String similarity scoring.

/// Scores two already-normalized strings.
///
/// Implementations must return a ratio in `[0, 1]` where `1.0` means
/// identical. Scoring is symmetric.
pub trait Similarity: Send + Sync {
    fn similarity(&self, a: &str, b: &str) -> f64;
}

/// Normalized Levenshtein ratio. The default scorer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Levenshtein;

impl Similarity for Levenshtein {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        strsim::normalized_levenshtein(a, b)
    }
}

/// Jaro-Winkler ratio, which favors shared prefixes.
#[derive(Debug, Clone, Copy, Default)]
pub struct JaroWinkler;

impl Similarity for JaroWinkler {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        strsim::jaro_winkler(a, b)
    }
}

impl<S: Similarity + ?Sized> Similarity for &S {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        (**self).similarity(a, b)
    }
}

impl<S: Similarity + ?Sized> Similarity for Box<S> {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        (**self).similarity(a, b)
    }
}
