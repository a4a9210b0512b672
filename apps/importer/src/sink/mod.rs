//! Submission of cards to the flashcard application.
//!
//! `CardSink` is the raw remote API. `SinkAdapter` wraps it with a call
//! timeout, exponential backoff after connection failures and the
//! pre-flight checks run at startup.

mod anki;

pub use anki::AnkiConnect;

use async_trait::async_trait;
use clipcard_core::{Card, TemplateSet};
use std::borrow::Cow;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{ConfigError, SinkError};

/// Remote note store.
#[async_trait]
pub trait CardSink: Send + Sync {
    /// Add a note, returning its id.
    async fn add_note(&self, card: &Card) -> Result<i64, SinkError>;

    async fn deck_names(&self) -> Result<Vec<String>, SinkError>;

    async fn model_names(&self) -> Result<Vec<String>, SinkError>;

    async fn model_field_names(&self, model: &str) -> Result<Vec<String>, SinkError>;

    async fn create_deck(&self, deck: &str) -> Result<i64, SinkError>;
}

/// Exponential backoff after connection failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max_delay: Duration,
    /// Consecutive failures before the sink is reported unreachable.
    pub max_failures: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_failures: 5,
        }
    }
}

impl BackoffPolicy {
    /// Delay after the `failures`-th consecutive failure: `base * 2^(n-1)`,
    /// capped at `max_delay`.
    pub fn delay_for(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(failures - 1);
        self.base.saturating_mul(factor).min(self.max_delay)
    }
}

/// Result of one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Created(i64),
    DuplicateRejectedByRemote,
    Failed(FailureKind, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Unreachable or timed out; triggers backoff.
    Connection,
    /// The remote answered with an error.
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkHealth {
    Healthy,
    Degraded { failures: u32 },
    Unreachable { failures: u32 },
}

enum PreflightFailure {
    Sink(SinkError),
    Config(ConfigError),
}

impl From<SinkError> for PreflightFailure {
    fn from(err: SinkError) -> Self {
        Self::Sink(err)
    }
}

impl From<ConfigError> for PreflightFailure {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

pub struct SinkAdapter {
    sink: Arc<dyn CardSink>,
    policy: BackoffPolicy,
    timeout: Duration,
    failures: u32,
    not_before: Option<Instant>,
    reported_unreachable: bool,
    /// Per model: card field name -> field name the model actually uses.
    field_aliases: HashMap<String, HashMap<String, String>>,
}

impl SinkAdapter {
    pub fn new(sink: Arc<dyn CardSink>, policy: BackoffPolicy, timeout: Duration) -> Self {
        Self {
            sink,
            policy,
            timeout,
            failures: 0,
            not_before: None,
            reported_unreachable: false,
            field_aliases: HashMap::new(),
        }
    }

    pub fn is_backing_off(&self) -> bool {
        self.retry_in().is_some()
    }

    /// Time left until the next attempt is allowed.
    pub fn retry_in(&self) -> Option<Duration> {
        let not_before = self.not_before?;
        let now = Instant::now();
        (now < not_before).then(|| not_before - now)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }

    pub fn health(&self) -> SinkHealth {
        match self.failures {
            0 => SinkHealth::Healthy,
            n if n >= self.policy.max_failures => SinkHealth::Unreachable { failures: n },
            n => SinkHealth::Degraded { failures: n },
        }
    }

    pub async fn submit(&mut self, card: &Card) -> SubmitOutcome {
        if !self.field_aliases.contains_key(&card.model) {
            if let Err(err) = self.learn_fields(card).await {
                if err.is_connection() {
                    self.record_failure(&err);
                    return SubmitOutcome::Failed(FailureKind::Connection, err.to_string());
                }
                tracing::debug!(model = %card.model, error = %err, "Could not read model fields");
            }
        }

        let card = self.resolve_fields(card);
        let result = self.call(self.sink.add_note(&card)).await;

        match result {
            Ok(note_id) => {
                self.reset();
                SubmitOutcome::Created(note_id)
            }
            Err(SinkError::Duplicate(message)) => {
                tracing::debug!(%message, "Remote rejected duplicate note");
                self.reset();
                SubmitOutcome::DuplicateRejectedByRemote
            }
            Err(err) if err.is_connection() => {
                self.record_failure(&err);
                SubmitOutcome::Failed(FailureKind::Connection, err.to_string())
            }
            Err(err) => SubmitOutcome::Failed(FailureKind::Remote, err.to_string()),
        }
    }

    /// Check that every deck and model the templates use exists.
    ///
    /// Missing decks are created. A missing model or model field is fatal.
    /// Losing the connection at any step only logs a warning so the importer
    /// can start before Anki does; field names are then looked up on the
    /// first submission.
    pub async fn preflight(&mut self, templates: &TemplateSet) -> Result<(), ConfigError> {
        match self.check_templates(templates).await {
            Ok(()) => {
                tracing::info!("Pre-flight checks passed");
                Ok(())
            }
            Err(PreflightFailure::Sink(err)) if err.is_connection() => {
                tracing::warn!(error = %err, "AnkiConnect unreachable, skipping pre-flight checks");
                Ok(())
            }
            Err(PreflightFailure::Sink(err)) => Err(ConfigError::Preflight(err.to_string())),
            Err(PreflightFailure::Config(err)) => Err(err),
        }
    }

    async fn check_templates(&mut self, templates: &TemplateSet) -> Result<(), PreflightFailure> {
        let decks = self.call(self.sink.deck_names()).await?;
        for deck in templates.decks() {
            if decks.iter().any(|d| d == deck) {
                continue;
            }
            self.call(self.sink.create_deck(deck)).await?;
            tracing::info!(deck, "Created deck");
        }

        let models = self.call(self.sink.model_names()).await?;
        for (model, wanted) in templates.required_models() {
            if !models.iter().any(|m| m == model) {
                return Err(ConfigError::MissingModel(model.to_string()).into());
            }
            let available = self.call(self.sink.model_field_names(model)).await?;
            let (aliases, missing) = match_fields(wanted, &available);
            if let Some(field) = missing.first() {
                return Err(ConfigError::MissingField {
                    model: model.to_string(),
                    field: field.to_string(),
                }
                .into());
            }
            self.store_aliases(model, aliases);
        }
        Ok(())
    }

    /// Look up the field names of a model not seen during pre-flight.
    async fn learn_fields(&mut self, card: &Card) -> Result<(), SinkError> {
        let available = self.call(self.sink.model_field_names(&card.model)).await?;
        let (aliases, missing) = match_fields(card.fields.keys().map(String::as_str), &available);
        if !missing.is_empty() {
            tracing::warn!(model = %card.model, ?missing, "Note model lacks card fields");
        }
        self.store_aliases(&card.model, aliases);
        Ok(())
    }

    fn store_aliases(&mut self, model: &str, aliases: HashMap<String, String>) {
        if !aliases.is_empty() {
            tracing::debug!(model, ?aliases, "Mapping card fields onto model field names");
        }
        self.field_aliases.insert(model.to_string(), aliases);
    }

    async fn call<T>(&self, request: impl Future<Output = Result<T, SinkError>>) -> Result<T, SinkError> {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(SinkError::Timeout),
        }
    }

    fn resolve_fields<'c>(&self, card: &'c Card) -> Cow<'c, Card> {
        let Some(aliases) = self.field_aliases.get(&card.model) else {
            return Cow::Borrowed(card);
        };
        let mut renamed = card.clone();
        renamed.fields = card
            .fields
            .iter()
            .map(|(name, value)| {
                let name = aliases.get(name).unwrap_or(name).clone();
                (name, value.clone())
            })
            .collect();
        Cow::Owned(renamed)
    }

    fn record_failure(&mut self, err: &SinkError) {
        self.failures = self.failures.saturating_add(1);
        let delay = self.policy.delay_for(self.failures);
        self.not_before = Some(Instant::now() + delay);

        if self.failures >= self.policy.max_failures {
            if !self.reported_unreachable {
                tracing::error!(
                    failures = self.failures,
                    error = %err,
                    "AnkiConnect unreachable; is Anki running with the AnkiConnect add-on?"
                );
                self.reported_unreachable = true;
            }
        } else {
            tracing::warn!(
                failures = self.failures,
                retry_in_ms = delay.as_millis() as u64,
                error = %err,
                "AnkiConnect request failed, backing off"
            );
        }
    }

    fn reset(&mut self) {
        if self.failures > 0 {
            tracing::info!(failures = self.failures, "AnkiConnect reachable again");
        }
        self.failures = 0;
        self.not_before = None;
        self.reported_unreachable = false;
    }
}

/// Pair wanted card fields with the model's own spelling.
///
/// Exact matches need no alias; case-insensitive matches become aliases.
/// Returns the aliases and the fields with no match at all.
fn match_fields<'a>(
    wanted: impl IntoIterator<Item = &'a str>,
    available: &[String],
) -> (HashMap<String, String>, Vec<&'a str>) {
    let mut aliases = HashMap::new();
    let mut missing = Vec::new();
    for field in wanted {
        if available.iter().any(|f| f == field) {
            continue;
        }
        match available.iter().find(|f| f.eq_ignore_ascii_case(field)) {
            Some(actual) => {
                aliases.insert(field.to_string(), actual.clone());
            }
            None => missing.push(field),
        }
    }
    (aliases, missing)
}
