use std::collections::HashSet;

use strsim::normalized_levenshtein;

use super::Track;

/// Lowercase, alphanumerics and single spaces only.
#[must_use]
pub fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// The same query with punctuation stripped and whitespace collapsed.
///
/// Used for the single retry after a failed search.
#[must_use]
pub fn relax_query(query: &str) -> String {
    query
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn token_overlap(a: &str, b: &str) -> f64 {
    let a = a.split(' ').filter(|x| !x.is_empty()).collect::<HashSet<_>>();
    let b = b.split(' ').filter(|x| !x.is_empty()).collect::<HashSet<_>>();

    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    #[allow(clippy::cast_precision_loss)]
    let shared = a.intersection(&b).count() as f64;
    #[allow(clippy::cast_precision_loss)]
    let total = a.len().max(b.len()) as f64;

    shared / total
}

/// How well `track` answers `query`, from 0 to 1. An exact match is 1.
#[must_use]
pub fn score(query: &str, track: &Track) -> f64 {
    let query = normalize(query);
    let title = normalize(&track.title);
    let artist = normalize(&track.artist);

    let forms = [
        title.clone(),
        format!("{} {}", artist, title),
        format!("{} {}", title, artist),
    ];

    if forms.iter().any(|x| *x == query) {
        return 1.0;
    }

    forms
        .iter()
        .map(|form| {
            let fuzzy = normalized_levenshtein(&query, form);
            let overlap = token_overlap(&query, form);
            // Keep inexact matches strictly below an exact one.
            fuzzy.mul_add(0.5, overlap * 0.5).min(0.99)
        })
        .fold(0.0, f64::max)
}

/// Index of the best match for `query`. Earlier tracks win ties.
#[must_use]
pub fn best_match(query: &str, tracks: &[Track]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;

    for (idx, track) in tracks.iter().enumerate() {
        let score = score(query, track);
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((idx, score));
        }
    }

    best.map(|(idx, _)| idx)
}
