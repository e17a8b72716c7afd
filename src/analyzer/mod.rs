// Analyzer module: relevance rules and scoring.

pub mod rules;
pub mod scoring;

pub use scoring::{sort_for_dispatch, ScoringEngine};
