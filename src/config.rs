use crate::model::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Ten years; the search window is computed from it.
pub const MAX_LOOKBACK_DAYS: i64 = 3650;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub telegram_bot_token: String,
    pub subscribers: Vec<Subscriber>,
    #[serde(default)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub rules: RuleConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default = "default_seen_file")]
    pub seen_file: PathBuf,
    #[serde(default = "default_startup_message")]
    pub startup_message: String,
}

impl AppConfig {
    /// The first subscriber receives startup and failure notices.
    pub fn admin(&self) -> &Subscriber {
        &self.subscribers[0]
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.subscribers.is_empty() {
            return Err(ConfigError::Invalid("at least one subscriber is required".into()));
        }
        if self.portal.default_page_size == 0 || self.portal.max_page_size == 0 {
            return Err(ConfigError::Invalid("page sizes must be positive".into()));
        }
        if !(0..=MAX_LOOKBACK_DAYS).contains(&self.portal.lookback_days) {
            return Err(ConfigError::Invalid(format!(
                "lookback_days must be between 0 and {}",
                MAX_LOOKBACK_DAYS
            )));
        }
        if self.schedule.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subscriber {
    pub name: String,
    pub id: String,
    #[serde(default)]
    pub subscriptions: SubscriptionFilter,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionFilter {
    #[default]
    All,
    Categories(Vec<String>),
}

impl SubscriptionFilter {
    pub fn accepts(&self, category: &str) -> bool {
        match self {
            SubscriptionFilter::All => true,
            SubscriptionFilter::Categories(wanted) => {
                wanted.iter().any(|c| c.eq_ignore_ascii_case(category))
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub search_url: String,
    /// Prefix for the relative hrefs found in result rows.
    pub link_base: String,
    pub user_agent: String,
    pub lookback_days: i64,
    pub category_value: String,
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub navigation_timeout_seconds: u64,
    pub submit_timeout_seconds: u64,
    pub results_timeout_seconds: u64,
    pub page_timeout_seconds: u64,
    pub postback_target_field: String,
    pub selectors: Selectors,
}

impl PortalConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_seconds)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_seconds)
    }

    pub fn results_timeout(&self) -> Duration {
        Duration::from_secs(self.results_timeout_seconds)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_seconds)
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            search_url: "https://www.marchespublics.gov.ma/index.php?page=entreprise.EntrepriseAdvancedSearch&searchAnnCons".into(),
            link_base: "https://www.marchespublics.gov.ma/index.php".into(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) TenderSniperBot/0.1".into(),
            lookback_days: 30,
            category_value: "3".into(),
            default_page_size: 10,
            max_page_size: 500,
            navigation_timeout_seconds: 90,
            submit_timeout_seconds: 60,
            results_timeout_seconds: 15,
            page_timeout_seconds: 30,
            postback_target_field: "PRADO_POSTBACK_TARGET".into(),
            selectors: Selectors::default(),
        }
    }
}

/// CSS selectors for the search form and the result table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Selectors {
    pub date_start: String,
    pub date_end: String,
    pub category: String,
    pub submit: String,
    pub results_table: String,
    pub rows: String,
    pub result_count: String,
    pub page_size: String,
    pub next_page: String,
    pub reference: String,
    pub object: String,
    pub object_label: String,
    pub buyer: String,
    pub buyer_label: String,
    pub deadline: String,
    pub action_link: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            date_start: "#ctl0_CONTENU_PAGE_AdvancedSearch_dateMiseEnLigneStart".into(),
            date_end: "#ctl0_CONTENU_PAGE_AdvancedSearch_dateMiseEnLigneEnd".into(),
            category: "#ctl0_CONTENU_PAGE_AdvancedSearch_categorie".into(),
            submit: "#ctl0_CONTENU_PAGE_AdvancedSearch_lancerRecherche".into(),
            results_table: ".table-results".into(),
            rows: ".table-results tbody tr".into(),
            result_count: "#ctl0_CONTENU_PAGE_resultSearch_nombreElement".into(),
            page_size: "#ctl0_CONTENU_PAGE_resultSearch_listePageSizeTop".into(),
            next_page: "#ctl0_CONTENU_PAGE_resultSearch_PagerTop_ctl2".into(),
            reference: "span.ref".into(),
            object: "div[id*='_panelBlocObjet']".into(),
            object_label: "Objet".into(),
            buyer: "div[id*='_panelBlocDenomination']".into(),
            buyer_label: "Acheteur public".into(),
            deadline: "td[headers='cons_dateEnd'] .cloture-line".into(),
            action_link: "td.actions a".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    #[default]
    Substring,
    /// Substring matching after folding accents on both sides.
    Folded,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeywordCategory {
    pub name: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    pub exclusions: Vec<String>,
    pub target_buyers: Vec<String>,
    pub keyword_categories: Vec<KeywordCategory>,
    pub weak_keywords: Vec<String>,
    pub strong_keywords: Vec<String>,
    /// When false only whitelisted buyers can pass.
    pub keyword_scoring: bool,
    pub priority_tag: String,
    pub match_strategy: MatchStrategy,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            exclusions: strings(&[
                "nettoyage", "gardiennage", "construction", "bâtiment", "plomberie",
                "sanitaire", "peinture", "électricité", "jardinage", "espaces verts",
                "piscine", "vêtement", "habillement", "carburant", "véhicule",
                "transport", "billet", "aérien", "travaux", "voirie", "topographique",
                "la peche", "secteur de la pêche", "maritime",
            ]),
            target_buyers: strings(&[
                "DIRECTION REGIONALE D'AGRICULTURE",
                "DIRECTION REGIONALE DE L'AGRICULTURE",
                "DIRECTEUR REGIONAL D'AGRICULTURE",
                "DIRECTEUR REGIONAL DE L'AGRICULTURE",
                "DIRECTION PROVINCIAL DE L'AGRICULTURE",
                "DIRECTION PROVINCIALE DE L'AGRICULTURE",
                "DIRECTEUR PROVINCIAL DE L'AGRICULTURE",
                "CHAMBRE D'AGRICULTURE",
                "MISE EN VALEUR AGRICOLE",
                "CONSEIL AGRICOLE",
                "ONSSA",
                "OFFICE NATIONAL DE SECURITE SANITAIRE",
            ]),
            keyword_categories: vec![KeywordCategory {
                name: "Event & Formation".into(),
                keywords: strings(&[
                    "formation", "session", "atelier", "renforcement de capacité",
                    "organisation", "animation", "événement", "sensibilisation",
                    "réception", "pause-café", "restauration", "traiteur",
                    "impression", "conception", "banderole", "flyer", "support",
                    "enquête", "étude", "conseil", "agri", "réunion",
                ]),
            }],
            weak_keywords: strings(&["impression"]),
            strong_keywords: strings(&["formation", "atelier", "sensibilisation", "événement"]),
            keyword_scoring: true,
            priority_tag: "agri".into(),
            match_strategy: MatchStrategy::Substring,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub max_attempts: u32,
    pub retry_delay_seconds: u64,
    pub check_interval_seconds: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_seconds: 60,
            check_interval_seconds: 4 * 60 * 60,
        }
    }
}

fn default_seen_file() -> PathBuf {
    PathBuf::from("data").join("seen_offers_ao.json")
}

fn default_startup_message() -> String {
    "🚜 Bot AO connecté. Je filtre les offres pour toi !".into()
}

pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    let mut config: AppConfig = serde_json::from_str(content)?;
    if let Ok(token) = std::env::var("TELEGRAM_TOKEN") {
        if !token.trim().is_empty() {
            config.telegram_bot_token = token.trim().to_string();
        }
    }
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}
