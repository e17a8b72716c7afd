use crate::analyzer::rules::{build_rules, Rule};
use crate::config::RuleConfig;
use crate::model::{MatchTag, Offer, Verdict};
use std::cmp::Reverse;

/// Score given to offers from a whitelisted buyer.
pub const PRIORITY_SCORE: u32 = 100;
/// Added when ordering alerts so priority matches always go first.
pub const PRIORITY_BONUS: u32 = 500;

struct CategoryRules {
    name: String,
    keywords: Vec<Box<dyn Rule>>,
}

/// Decides whether an offer is relevant. Rules are fixed at construction.
pub struct ScoringEngine {
    exclusions: Vec<Box<dyn Rule>>,
    target_buyers: Vec<Box<dyn Rule>>,
    /// `None` in whitelist-only mode.
    categories: Option<Vec<CategoryRules>>,
    weak: Vec<String>,
    strong: Vec<Box<dyn Rule>>,
    priority_tag: String,
}

impl ScoringEngine {
    pub fn new(config: &RuleConfig) -> Self {
        let strategy = config.match_strategy;
        let categories = config.keyword_scoring.then(|| {
            config
                .keyword_categories
                .iter()
                .map(|c| CategoryRules {
                    name: c.name.clone(),
                    keywords: build_rules(&c.keywords, strategy),
                })
                .collect()
        });

        Self {
            exclusions: build_rules(&config.exclusions, strategy),
            target_buyers: build_rules(&config.target_buyers, strategy),
            categories,
            weak: config.weak_keywords.iter().map(|w| w.trim().to_lowercase()).collect(),
            strong: build_rules(&config.strong_keywords, strategy),
            priority_tag: config.priority_tag.clone(),
        }
    }

    /// First match wins: exclusions, then the buyer whitelist, then keywords.
    pub fn score(&self, object_text: &str, buyer: &str) -> Verdict {
        if let Some(rule) = self
            .exclusions
            .iter()
            .find(|r| r.matches(object_text) || r.matches(buyer))
        {
            return Verdict::reject(MatchTag::Excluded(rule.term().to_string()));
        }

        if self.target_buyers.iter().any(|r| r.matches(buyer)) {
            return Verdict {
                score: PRIORITY_SCORE,
                tag: MatchTag::Priority(self.priority_tag.clone()),
            };
        }

        match &self.categories {
            Some(categories) => self.score_keywords(categories, object_text),
            None => Verdict::reject(MatchTag::NoMatch),
        }
    }

    fn score_keywords(&self, categories: &[CategoryRules], text: &str) -> Verdict {
        let mut suppressed: Option<String> = None;

        for category in categories {
            let hits: Vec<&dyn Rule> = category
                .keywords
                .iter()
                .filter(|k| k.matches(text))
                .map(|k| &**k)
                .collect();
            if hits.is_empty() {
                continue;
            }

            let weak_only = hits.iter().all(|h| self.weak.contains(&h.term().to_lowercase()));
            if weak_only && !self.strong.iter().any(|s| s.matches(text)) {
                suppressed.get_or_insert_with(|| hits[0].term().to_string());
                continue;
            }

            return Verdict {
                score: hits.len() as u32,
                tag: MatchTag::Category(category.name.clone()),
            };
        }

        match suppressed {
            Some(keyword) => Verdict::reject(MatchTag::WeakOnly(keyword)),
            None => Verdict::reject(MatchTag::NoMatch),
        }
    }
}

/// Ordering weight: score plus the priority bonus.
pub fn dispatch_rank(offer: &Offer) -> u32 {
    offer.score() + if offer.is_priority() { PRIORITY_BONUS } else { 0 }
}

/// Highest rank first; equal ranks keep portal order.
pub fn sort_for_dispatch(offers: &mut [Offer]) {
    offers.sort_by_key(|o| Reverse(dispatch_rank(o)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KeywordCategory, MatchStrategy};

    fn engine() -> ScoringEngine {
        ScoringEngine::new(&RuleConfig::default())
    }

    fn offer(score: u32, tag: MatchTag, name: &str) -> Offer {
        Offer {
            fingerprint: name.into(),
            reference: String::new(),
            buyer: String::new(),
            object_text: name.into(),
            deadline: String::new(),
            link: String::new(),
            verdict: Some(Verdict { score, tag }),
        }
    }

    #[test]
    fn exclusion_beats_whitelisted_buyer() {
        let v = engine().score("Nettoyage des locaux", "ONSSA — Direction du Nettoyage");
        assert_eq!(v.score, 0);
        assert_eq!(v.tag, MatchTag::Excluded("nettoyage".into()));
        assert_eq!(v.tag.to_string(), "excluded:nettoyage");
    }

    #[test]
    fn exclusion_also_applies_to_buyer_name() {
        let v = engine().score("Organisation d'une formation", "Société de Transport Urbain");
        assert_eq!(v.tag, MatchTag::Excluded("transport".into()));
    }

    #[test]
    fn whitelisted_buyer_beats_keywords() {
        let v = engine().score("organisation d'une formation", "Chambre d'Agriculture de Fès");
        assert_eq!(v.score, 100);
        assert_eq!(v.tag.to_string(), "agri");
        assert!(v.is_priority());
    }

    #[test]
    fn whitelist_applies_in_whitelist_only_mode() {
        let config = RuleConfig { keyword_scoring: false, ..RuleConfig::default() };
        let engine = ScoringEngine::new(&config);

        assert_eq!(engine.score("Achat de matériel", "ONSSA").score, 100);
        let v = engine.score("Organisation d'une formation", "Commune Urbaine");
        assert_eq!(v, Verdict::reject(MatchTag::NoMatch));
    }

    #[test]
    fn keyword_score_counts_distinct_hits() {
        let v = engine().score("Organisation d'un atelier de formation", "Commune Urbaine");
        assert_eq!(v.score, 3);
        assert_eq!(v.tag, MatchTag::Category("Event & Formation".into()));
    }

    #[test]
    fn weak_keyword_alone_is_suppressed() {
        let v = engine().score("Impression de documents administratifs", "Commune Urbaine");
        assert_eq!(v, Verdict::reject(MatchTag::WeakOnly("impression".into())));
    }

    #[test]
    fn weak_keyword_with_strong_keyword_passes() {
        let v = engine().score("Impression des supports de la formation", "Commune Urbaine");
        assert!(v.is_accepted());
        assert_eq!(v.score, 3);
    }

    #[test]
    fn strong_keyword_outside_category_rescues_weak_hit() {
        let config = RuleConfig {
            keyword_categories: vec![KeywordCategory {
                name: "Print".into(),
                keywords: vec!["impression".into()],
            }],
            strong_keywords: vec!["séminaire".into()],
            ..RuleConfig::default()
        };
        let engine = ScoringEngine::new(&config);

        assert_eq!(engine.score("Impression pour séminaire", "Commune").score, 1);
        assert_eq!(engine.score("Impression", "Commune").score, 0);
    }

    #[test]
    fn nothing_matches() {
        assert_eq!(
            engine().score("Acquisition de matériel informatique", "Commune Urbaine"),
            Verdict::reject(MatchTag::NoMatch)
        );
    }

    #[test]
    fn folded_strategy_matches_unaccented_text() {
        let config = RuleConfig { match_strategy: MatchStrategy::Folded, ..RuleConfig::default() };
        let engine = ScoringEngine::new(&config);

        let v = engine.score("Rénovation du batiment", "Commune");
        assert_eq!(v.tag, MatchTag::Excluded("bâtiment".into()));
        let v = engine.score("Organisation d'un evenement", "Commune");
        assert_eq!(v.score, 2);
    }

    #[test]
    fn priority_offers_sort_first_then_by_score() {
        let mut offers = vec![
            offer(3, MatchTag::Category("Event & Formation".into()), "kw3"),
            offer(100, MatchTag::Priority("agri".into()), "agri"),
            offer(7, MatchTag::Category("Event & Formation".into()), "kw7"),
            offer(3, MatchTag::Category("Event & Formation".into()), "kw3b"),
        ];
        sort_for_dispatch(&mut offers);
        let order: Vec<&str> = offers.iter().map(|o| o.fingerprint.as_str()).collect();
        assert_eq!(order, vec!["agri", "kw7", "kw3", "kw3b"]);
        assert_eq!(dispatch_rank(&offers[0]), 600);
    }
}
