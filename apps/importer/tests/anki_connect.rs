//! AnkiConnect wire format tests against a mock HTTP server.

use std::collections::BTreeMap;

use clipcard_core::Card;
use clipcard_importer::sink::{AnkiConnect, CardSink};
use clipcard_importer::SinkError;
use mockito::{Matcher, Server};
use pretty_assertions::assert_eq;
use serde_json::json;

fn card() -> Card {
    Card {
        deck: "test".to_string(),
        model: "MCQ".to_string(),
        fields: BTreeMap::from([
            ("Question".to_string(), "2+2?".to_string()),
            ("Answer".to_string(), "B".to_string()),
        ]),
        tags: vec!["auto-imported".to_string(), "mcq".to_string()],
    }
}

#[tokio::test]
async fn add_note_sends_envelope_and_returns_id() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_body(Matcher::Json(json!({
            "action": "addNote",
            "version": 6,
            "params": {
                "note": {
                    "deckName": "test",
                    "modelName": "MCQ",
                    "fields": { "Answer": "B", "Question": "2+2?" },
                    "tags": ["auto-imported", "mcq"],
                    "options": { "allowDuplicate": false }
                }
            }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"result": 1496198395707, "error": null}"#)
        .create_async()
        .await;

    let anki = AnkiConnect::new(server.url());
    let id = anki.add_note(&card()).await.expect("note should be created");

    mock.assert_async().await;
    assert_eq!(id, 1496198395707);
}

#[tokio::test]
async fn duplicate_error_is_classified() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_body(r#"{"result": null, "error": "cannot create note because it is a duplicate"}"#)
        .create_async()
        .await;

    let anki = AnkiConnect::new(server.url());
    assert_eq!(
        anki.add_note(&card()).await.unwrap_err(),
        SinkError::Duplicate("cannot create note because it is a duplicate".to_string())
    );
}

#[tokio::test]
async fn other_remote_errors_are_passed_through() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_body(r#"{"result": null, "error": "model was not found: MCQ"}"#)
        .create_async()
        .await;

    let anki = AnkiConnect::new(server.url());
    assert_eq!(
        anki.add_note(&card()).await.unwrap_err(),
        SinkError::Remote("model was not found: MCQ".to_string())
    );
}

#[tokio::test]
async fn malformed_responses_are_protocol_errors() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_body("not json")
        .create_async()
        .await;

    let anki = AnkiConnect::new(server.url());
    assert!(matches!(
        anki.deck_names().await.unwrap_err(),
        SinkError::Protocol(_)
    ));
}

#[tokio::test]
async fn http_errors_are_protocol_errors() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/")
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;

    let anki = AnkiConnect::new(server.url());
    let err = anki.model_names().await.unwrap_err();
    assert!(matches!(err, SinkError::Protocol(ref m) if m.contains("500")));
    assert!(!err.is_connection());
}

#[tokio::test]
async fn closed_port_is_a_connection_error() {
    let anki = AnkiConnect::new("http://127.0.0.1:9");
    let err = anki.deck_names().await.unwrap_err();
    assert!(err.is_connection(), "unexpected error: {err:?}");
}

#[tokio::test]
async fn deck_and_model_queries() {
    let mut server = Server::new_async().await;
    let decks = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({ "action": "deckNames", "version": 6 })))
        .with_body(r#"{"result": ["Default", "test"], "error": null}"#)
        .create_async()
        .await;
    let fields = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({
            "action": "modelFieldNames",
            "params": { "modelName": "MCQ" }
        })))
        .with_body(r#"{"result": ["question", "answer"], "error": null}"#)
        .create_async()
        .await;
    let create = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({
            "action": "createDeck",
            "params": { "deck": "AWS" }
        })))
        .with_body(r#"{"result": 1519323742721, "error": null}"#)
        .create_async()
        .await;

    let anki = AnkiConnect::new(server.url());
    assert_eq!(anki.deck_names().await.unwrap(), vec!["Default", "test"]);
    assert_eq!(
        anki.model_field_names("MCQ").await.unwrap(),
        vec!["question", "answer"]
    );
    assert_eq!(anki.create_deck("AWS").await.unwrap(), 1519323742721);

    decks.assert_async().await;
    fields.assert_async().await;
    create.assert_async().await;
}
