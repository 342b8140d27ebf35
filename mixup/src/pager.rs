//! Final page slicing

use crate::candidate::Candidate;

/// `hits[from .. min(from + size, len)]`, empty when `from >= len`.
pub fn page(hits: &[Candidate], from: usize, size: usize) -> &[Candidate] {
    if from >= hits.len() {
        return &[];
    }
    let end = from.saturating_add(size).min(hits.len());
    &hits[from..end]
}

/// Owning form of [`page`]
pub fn into_page(mut hits: Vec<Candidate>, from: usize, size: usize) -> Vec<Candidate> {
    if from >= hits.len() {
        return Vec::new();
    }
    hits.truncate(from.saturating_add(size));
    hits.drain(..from);
    hits
}
