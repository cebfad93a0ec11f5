//! "Did you mean" suggestions for names that match nothing.

use crate::config::SuggestionSettings;

/// Ranks candidate names by edit distance to the input.
#[derive(Debug, Clone)]
pub struct SuggestionGenerator {
    enabled: bool,
    max_suggestions: usize,
}

impl SuggestionGenerator {
    pub fn new(settings: &SuggestionSettings) -> Self {
        Self {
            enabled: settings.enabled,
            max_suggestions: settings.max_suggestions,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            max_suggestions: 0,
        }
    }

    /// Candidates within edit distance of `input`, closest first. Candidates that
    /// contain the input are always kept.
    pub fn suggest<'a, I>(&self, input: &str, candidates: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        if !self.enabled || self.max_suggestions == 0 {
            return Vec::new();
        }
        let needle: Vec<char> = input.trim().to_lowercase().chars().collect();
        if needle.is_empty() {
            return Vec::new();
        }
        let needle_str: String = needle.iter().collect();
        let max_dist = (needle.len() / 3).max(2);

        let mut scored: Vec<(usize, &str)> = candidates
            .into_iter()
            .filter_map(|candidate| {
                let lowered = candidate.to_lowercase();
                if lowered == needle_str {
                    return None;
                }
                let distance = if lowered.contains(&needle_str) {
                    0
                } else {
                    levenshtein_with_max(&lowered, &needle, max_dist)
                };
                (distance <= max_dist).then_some((distance, candidate))
            })
            .collect();
        scored.sort();
        scored.dedup_by(|a, b| a.1 == b.1);
        scored
            .into_iter()
            .take(self.max_suggestions)
            .map(|(_, candidate)| candidate.to_string())
            .collect()
    }
}

/// Edit distance between `value` and `needle`, or `max_dist + 1` once every
/// alignment exceeds `max_dist`.
fn levenshtein_with_max(value: &str, needle: &[char], max_dist: usize) -> usize {
    let n = needle.len();
    if n == 0 {
        return value.chars().count().min(max_dist + 1);
    }

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr: Vec<usize> = vec![0; n + 1];

    for (i, c) in value.chars().enumerate() {
        curr[0] = i + 1;
        let mut row_min = curr[0];
        for j in 1..=n {
            let cost = usize::from(c != needle[j - 1]);
            let d = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
            curr[j] = d;
            row_min = row_min.min(d);
        }
        if row_min > max_dist {
            return max_dist + 1;
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[n].min(max_dist + 1)
}
