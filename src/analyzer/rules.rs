// Term matching strategies used by the scoring engine.
use crate::config::MatchStrategy;
use crate::normalizer::fold_diacritics;

/// A single configured term tested against free text.
pub trait Rule: Send + Sync {
    /// The term as configured, for tags and logs.
    fn term(&self) -> &str;
    fn matches(&self, text: &str) -> bool;
}

/// Case-insensitive substring match.
pub struct SubstringRule {
    term: String,
    needle: String,
}

impl SubstringRule {
    pub fn new(term: &str) -> Self {
        Self { term: term.to_string(), needle: term.to_lowercase() }
    }
}

impl Rule for SubstringRule {
    fn term(&self) -> &str {
        &self.term
    }

    fn matches(&self, text: &str) -> bool {
        !self.needle.is_empty() && text.to_lowercase().contains(&self.needle)
    }
}

/// Substring match that ignores case and French accents on both sides.
pub struct FoldedRule {
    term: String,
    needle: String,
}

impl FoldedRule {
    pub fn new(term: &str) -> Self {
        Self { term: term.to_string(), needle: fold_diacritics(term) }
    }
}

impl Rule for FoldedRule {
    fn term(&self) -> &str {
        &self.term
    }

    fn matches(&self, text: &str) -> bool {
        !self.needle.is_empty() && fold_diacritics(text).contains(&self.needle)
    }
}

pub fn build_rule(term: &str, strategy: MatchStrategy) -> Box<dyn Rule> {
    match strategy {
        MatchStrategy::Substring => Box::new(SubstringRule::new(term)),
        MatchStrategy::Folded => Box::new(FoldedRule::new(term)),
    }
}

/// Builds one rule per distinct term, keeping the configured order.
pub fn build_rules(terms: &[String], strategy: MatchStrategy) -> Vec<Box<dyn Rule>> {
    let mut seen = Vec::new();
    let mut rules = Vec::new();
    for term in terms {
        let key = term.trim().to_lowercase();
        if key.is_empty() || seen.contains(&key) {
            continue;
        }
        seen.push(key);
        rules.push(build_rule(term.trim(), strategy));
    }
    rules
}
