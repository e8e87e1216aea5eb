pub mod cli;
pub mod core;
pub mod providers;
pub mod resolver;
pub mod store;

use crate::core::config::AppConfig;
use crate::core::currency::normalize_code;
use crate::core::{LocalRateStore, RateSource};
use crate::providers::{BackendRateSource, ExternalRateSource, KvRateStore};
use crate::resolver::ExchangeRateService;
use crate::store::KeyValueStore;
use crate::store::memory::MemoryCollection;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    Rate {
        from: String,
        to: String,
        refresh: bool,
    },
    Convert {
        amount: f64,
        from: String,
        to: String,
    },
    Table {
        base: Option<String>,
        codes: Vec<String>,
    },
    Stored,
    Clear,
}

/// Everything a command needs, wired from the config.
pub struct App {
    pub config: AppConfig,
    pub local: Arc<KvRateStore>,
    pub service: ExchangeRateService,
}

impl App {
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let local = Arc::new(match config.default_data_path() {
            Ok(path) => KvRateStore::new(&KeyValueStore::open(&path)),
            Err(e) => {
                warn!(error = %e, "No data directory, rates will not be persisted");
                KvRateStore::with_collection(Arc::new(MemoryCollection::new()))
            }
        });
        if !local.is_ready() {
            warn!("Local rate store is not available");
        }

        let backend: Option<Arc<dyn RateSource>> = match &config.providers.backend {
            Some(backend) => Some(Arc::new(
                BackendRateSource::new(backend, config.auth_token())
                    .context("Failed to create backend client")?,
            )),
            None => None,
        };

        let external_config = config
            .providers
            .external
            .as_ref()
            .context("No external rate provider configured")?;
        let external = Arc::new(
            ExternalRateSource::new(external_config)
                .context("Failed to create external provider client")?,
        );

        let service = ExchangeRateService::new(
            Arc::clone(&local) as Arc<dyn LocalRateStore>,
            backend,
            external,
        )
        .with_cache_duration(config.cache_duration());

        Ok(Self {
            config,
            local,
            service,
        })
    }
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("fxrate starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let app = App::from_config(config)?;

    match command {
        AppCommand::Rate { from, to, refresh } => {
            cli::rate::run(
                &app.service,
                &normalize_code(&from),
                &normalize_code(&to),
                refresh,
            )
            .await
        }
        AppCommand::Convert { amount, from, to } => {
            cli::rate::run_convert(
                &app.service,
                amount,
                &normalize_code(&from),
                &normalize_code(&to),
            )
            .await
        }
        AppCommand::Table { base, codes } => {
            let base = normalize_code(base.as_deref().unwrap_or(&app.config.base_currency));
            let codes: Vec<String> = if codes.is_empty() {
                app.config.watchlist.iter().map(|c| normalize_code(c)).collect()
            } else {
                codes.iter().map(|c| normalize_code(c)).collect()
            };
            cli::table::run(&app.service, &base, &codes).await
        }
        AppCommand::Stored => cli::stored::run(&app.local).await,
        AppCommand::Clear => cli::stored::run_clear(&app.local).await,
    }
}
