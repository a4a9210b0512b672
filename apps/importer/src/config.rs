//! Command line and environment configuration.
//!
//! Every flag can also be set through a `CLIPCARD_*` environment variable,
//! and `.env` is loaded before parsing.

use clap::Parser;
use clipcard_core::{Classifier, ContentKind, FormatOptions, TemplateSet};
use std::time::Duration;

use crate::error::ConfigError;
use crate::sink::BackoffPolicy;

/// Watch the clipboard and import recognized questions into Anki.
#[derive(Debug, Clone, Parser)]
#[command(name = "clipcard", author, version, about, long_about = None)]
pub struct Cli {
    /// Target deck name.
    #[arg(long, env = "CLIPCARD_DECK", default_value = "test")]
    pub deck: String,

    /// Note model for multiple-choice cards.
    #[arg(long = "model", env = "CLIPCARD_MCQ_MODEL", default_value = "IKKZ__MCQ.EN.NATIVE")]
    pub mcq_model: String,

    /// Note model for Q/A, definition and list cards (Front/Back fields).
    #[arg(long, env = "CLIPCARD_BASIC_MODEL", default_value = "Basic")]
    pub basic_model: String,

    /// Comma separated tags added to every card (multiple-choice cards also get `mcq`).
    #[arg(long, env = "CLIPCARD_TAGS", value_delimiter = ',', default_value = "auto-imported")]
    pub tags: Vec<String>,

    /// AnkiConnect endpoint.
    #[arg(long, env = "CLIPCARD_ANKI_URL", default_value = "http://localhost:8765")]
    pub anki_url: String,

    /// Clipboard poll interval in milliseconds.
    #[arg(long, env = "CLIPCARD_POLL_MS", default_value_t = 500)]
    pub poll_ms: u64,

    /// Number of recent fingerprints remembered.
    #[arg(long, env = "CLIPCARD_CACHE_CAPACITY", default_value_t = 1000)]
    pub cache_capacity: usize,

    /// Forget fingerprints after this many minutes (0 keeps them until evicted).
    #[arg(long, env = "CLIPCARD_CACHE_MAX_AGE_MINS", default_value_t = 720)]
    pub cache_max_age_mins: u64,

    #[arg(long, env = "CLIPCARD_CLIPBOARD_TIMEOUT_MS", default_value_t = 1000)]
    pub clipboard_timeout_ms: u64,

    #[arg(long, env = "CLIPCARD_SINK_TIMEOUT_MS", default_value_t = 5000)]
    pub sink_timeout_ms: u64,

    #[arg(long, env = "CLIPCARD_BACKOFF_BASE_MS", default_value_t = 1000)]
    pub backoff_base_ms: u64,

    #[arg(long, env = "CLIPCARD_BACKOFF_MAX_MS", default_value_t = 60_000)]
    pub backoff_max_ms: u64,

    /// Consecutive connection failures before Anki is reported unreachable.
    #[arg(long, env = "CLIPCARD_BACKOFF_MAX_FAILURES", default_value_t = 5)]
    pub backoff_max_failures: u32,

    /// Soft-wrap width for formatted fields (0 disables wrapping).
    #[arg(long, env = "CLIPCARD_WRAP_WIDTH", default_value_t = 80)]
    pub wrap_width: usize,

    /// Send field text without list, heading or emphasis formatting.
    #[arg(long, env = "CLIPCARD_NO_FORMAT")]
    pub no_format: bool,

    /// Content kinds to import.
    #[arg(
        long,
        env = "CLIPCARD_KINDS",
        value_delimiter = ',',
        default_value = "mcq,bullet_mcq,question_answer,definition,list"
    )]
    pub kinds: Vec<String>,

    /// Log a heartbeat every N ticks (0 disables).
    #[arg(long, env = "CLIPCARD_HEARTBEAT_TICKS", default_value_t = 60)]
    pub heartbeat_ticks: u64,

    /// Default log filter when RUST_LOG is unset.
    #[arg(long, env = "CLIPCARD_LOG", default_value = "info")]
    pub log_level: String,

    /// Print the clipboard a few times and exit.
    #[arg(long)]
    pub test: bool,
}

/// Immutable runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub deck: String,
    pub mcq_model: String,
    pub basic_model: String,
    pub tags: Vec<String>,
    pub anki_url: String,
    pub poll_interval: Duration,
    pub cache_capacity: usize,
    pub cache_max_age: Option<Duration>,
    pub clipboard_timeout: Duration,
    pub sink_timeout: Duration,
    pub backoff: BackoffPolicy,
    pub wrap_width: Option<usize>,
    pub format_fields: bool,
    pub kinds: Vec<ContentKind>,
    pub heartbeat_ticks: u64,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            deck: "test".to_string(),
            mcq_model: "IKKZ__MCQ.EN.NATIVE".to_string(),
            basic_model: "Basic".to_string(),
            tags: vec!["auto-imported".to_string()],
            anki_url: "http://localhost:8765".to_string(),
            poll_interval: Duration::from_millis(500),
            cache_capacity: 1000,
            cache_max_age: Some(Duration::from_secs(720 * 60)),
            clipboard_timeout: Duration::from_secs(1),
            sink_timeout: Duration::from_secs(5),
            backoff: BackoffPolicy::default(),
            wrap_width: Some(80),
            format_fields: true,
            kinds: ContentKind::ALL.to_vec(),
            heartbeat_ticks: 60,
            log_level: "info".to_string(),
        }
    }
}

impl TryFrom<Cli> for Config {
    type Error = ConfigError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let kinds = cli
            .kinds
            .iter()
            .filter(|k| !k.trim().is_empty())
            .map(|k| ContentKind::from_str(k).ok_or_else(|| ConfigError::UnknownKind(k.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        let config = Self {
            deck: cli.deck.trim().to_string(),
            mcq_model: cli.mcq_model.trim().to_string(),
            basic_model: cli.basic_model.trim().to_string(),
            tags: cli
                .tags
                .iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            anki_url: cli.anki_url.trim().to_string(),
            poll_interval: Duration::from_millis(cli.poll_ms),
            cache_capacity: cli.cache_capacity,
            cache_max_age: (cli.cache_max_age_mins > 0)
                .then(|| Duration::from_secs(cli.cache_max_age_mins.saturating_mul(60))),
            clipboard_timeout: Duration::from_millis(cli.clipboard_timeout_ms),
            sink_timeout: Duration::from_millis(cli.sink_timeout_ms),
            backoff: BackoffPolicy {
                base: Duration::from_millis(cli.backoff_base_ms),
                max_delay: Duration::from_millis(cli.backoff_max_ms),
                max_failures: cli.backoff_max_failures,
            },
            wrap_width: (cli.wrap_width > 0).then_some(cli.wrap_width),
            format_fields: !cli.no_format,
            kinds,
            heartbeat_ticks: cli.heartbeat_ticks,
            log_level: cli.log_level,
        };
        config.validate()?;
        Ok(config)
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("deck", &self.deck),
            ("model", &self.mcq_model),
            ("basic model", &self.basic_model),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Empty(name));
            }
        }
        if self.kinds.is_empty() {
            return Err(ConfigError::Empty("kinds"));
        }

        for (name, value) in [
            ("poll interval", self.poll_interval),
            ("clipboard timeout", self.clipboard_timeout),
            ("sink timeout", self.sink_timeout),
            ("backoff base", self.backoff.base),
        ] {
            if value.is_zero() {
                return Err(ConfigError::Zero(name));
            }
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::Zero("cache capacity"));
        }
        if self.backoff.max_failures == 0 {
            return Err(ConfigError::Zero("backoff max failures"));
        }
        if self.backoff.max_delay < self.backoff.base {
            return Err(ConfigError::BackoffRange {
                base_ms: self.backoff.base.as_millis() as u64,
                max_ms: self.backoff.max_delay.as_millis() as u64,
            });
        }

        let url = reqwest::Url::parse(&self.anki_url).map_err(|e| ConfigError::InvalidUrl {
            url: self.anki_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url: self.anki_url.clone(),
                reason: format!("unsupported scheme {}", url.scheme()),
            });
        }
        Ok(())
    }

    pub fn templates(&self) -> TemplateSet {
        TemplateSet::defaults(&self.deck, &self.mcq_model, &self.basic_model, &self.tags)
    }

    pub fn classifier(&self) -> Classifier {
        Classifier::for_kinds(&self.kinds)
    }

    pub fn format_options(&self) -> FormatOptions {
        if self.format_fields {
            FormatOptions {
                wrap_width: self.wrap_width,
                ..FormatOptions::default()
            }
        } else {
            FormatOptions {
                wrap_width: None,
                lists: false,
                headings: false,
                emphasis: false,
            }
        }
    }
}
