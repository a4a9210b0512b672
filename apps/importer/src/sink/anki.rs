//! AnkiConnect HTTP client.

use async_trait::async_trait;
use clipcard_core::Card;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

use super::CardSink;
use crate::error::SinkError;

const API_VERSION: u8 = 6;

// === API Request/Response Types ===

#[derive(Debug, Serialize)]
struct Request<'a, P> {
    action: &'a str,
    version: u8,
    params: P,
}

#[derive(Debug, Deserialize)]
struct Response<R> {
    result: Option<R>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Note<'a> {
    deck_name: &'a str,
    model_name: &'a str,
    fields: &'a BTreeMap<String, String>,
    tags: &'a [String],
    options: NoteOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NoteOptions {
    allow_duplicate: bool,
}

/// Client for the AnkiConnect add-on.
#[derive(Debug, Clone)]
pub struct AnkiConnect {
    client: Client,
    url: String,
}

impl AnkiConnect {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn invoke<P, R>(&self, action: &str, params: P) -> Result<R, SinkError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let request = Request {
            action,
            version: API_VERSION,
            params,
        };

        let resp = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SinkError::Timeout
                } else {
                    SinkError::Connection(e.to_string())
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(SinkError::Protocol(format!("{action}: HTTP {status} {message}")));
        }

        let response: Response<R> = resp
            .json()
            .await
            .map_err(|e| SinkError::Protocol(format!("{action}: {e}")))?;

        match (response.result, response.error) {
            (_, Some(error)) => Err(SinkError::from_remote(error)),
            (Some(result), None) => Ok(result),
            (None, None) => Err(SinkError::Protocol(format!("{action}: empty result"))),
        }
    }
}

#[async_trait]
impl CardSink for AnkiConnect {
    async fn add_note(&self, card: &Card) -> Result<i64, SinkError> {
        let note = Note {
            deck_name: &card.deck,
            model_name: &card.model,
            fields: &card.fields,
            tags: &card.tags,
            options: NoteOptions {
                allow_duplicate: false,
            },
        };
        self.invoke("addNote", json!({ "note": note })).await
    }

    async fn deck_names(&self) -> Result<Vec<String>, SinkError> {
        self.invoke("deckNames", json!({})).await
    }

    async fn model_names(&self) -> Result<Vec<String>, SinkError> {
        self.invoke("modelNames", json!({})).await
    }

    async fn model_field_names(&self, model: &str) -> Result<Vec<String>, SinkError> {
        self.invoke("modelFieldNames", json!({ "modelName": model })).await
    }

    async fn create_deck(&self, deck: &str) -> Result<i64, SinkError> {
        self.invoke("createDeck", json!({ "deck": deck })).await
    }
}
