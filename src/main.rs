mod analyzer;
mod config;
mod model;
mod normalizer;
mod notifier;
mod parser;
mod pipeline;
mod scraper;
mod storage;
mod supervisor;
mod utils;

#[cfg(test)]
mod testing;

use analyzer::ScoringEngine;
use config::{load_config, AppConfig};
use notifier::{AlertDispatcher, TelegramNotifier};
use pipeline::TenderScanner;
use scraper::HttpBrowserLauncher;
use std::sync::Arc;
use storage::SeenStore;
use supervisor::{RetryPolicy, Supervisor, SystemClock};
use tracing::{error, info, warn};

const CONFIG_ENV: &str = "TENDER_CONFIG";

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt::init();

    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("😱 Panic occurred: {:?}", panic_info);
    }));

    let config_path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| "config.json".to_string());
    let config: AppConfig = match load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Config load error ({}): {}", config_path, e);
            return;
        }
    };
    if config.telegram_bot_token.is_empty() {
        warn!("⚠️ No Telegram token configured, alerts will not be delivered");
    }

    let messenger = match TelegramNotifier::new(config.telegram_bot_token.clone()) {
        Ok(n) => Arc::new(n),
        Err(e) => {
            error!("Failed to initialize Telegram client: {}", e);
            return;
        }
    };
    let dispatcher = Arc::new(AlertDispatcher::new(messenger, config.subscribers.clone()));
    let clock = Arc::new(SystemClock);

    let scanner = TenderScanner::new(
        config.portal.clone(),
        Arc::new(HttpBrowserLauncher::new(&config.portal)),
        ScoringEngine::new(&config.rules),
        SeenStore::new(config.seen_file.clone()),
        dispatcher.clone(),
        clock.clone(),
    );
    let mut supervisor = Supervisor::new(
        Box::new(scanner),
        dispatcher.clone(),
        clock,
        RetryPolicy::from(&config.schedule),
    );

    info!("Sending startup message to {}...", config.admin().name);
    if !dispatcher.notify_admin(&config.startup_message).await {
        warn!("Startup notification failed");
    }

    tokio::select! {
        _ = supervisor.run_forever() => {}
        _ = tokio::signal::ctrl_c() => {}
    }
    info!("🛑 Interrupted while {:?}, shutting down.", supervisor.state());
}
