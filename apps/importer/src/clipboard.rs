//! Clipboard access.

use std::sync::Arc;
use std::time::Duration;

/// Source of clipboard text.
pub trait ClipboardSource: Send + Sync + 'static {
    /// Current text, or `None` when the clipboard is empty, holds no text
    /// or cannot be accessed.
    fn read_text(&self) -> Option<String>;
}

/// System clipboard backed by arboard.
#[derive(Debug, Default)]
pub struct SystemClipboard;

impl SystemClipboard {
    pub fn new() -> Self {
        Self
    }
}

impl ClipboardSource for SystemClipboard {
    fn read_text(&self) -> Option<String> {
        // A fresh handle per read; some platforms drop a long-lived one.
        arboard::Clipboard::new()
            .ok()
            .and_then(|mut cb| cb.get_text().ok())
    }
}

/// Read on the blocking pool, giving up after `timeout`.
pub async fn read_with_timeout(
    source: Arc<dyn ClipboardSource>,
    timeout: Duration,
) -> Option<String> {
    let read = tokio::task::spawn_blocking(move || source.read_text());
    match tokio::time::timeout(timeout, read).await {
        Ok(Ok(text)) => text,
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "Clipboard read task failed");
            None
        }
        Err(_) => {
            tracing::debug!(timeout_ms = timeout.as_millis() as u64, "Clipboard read timed out");
            None
        }
    }
}

/// Print the clipboard `reads` times, `pause` apart.
pub async fn probe(source: Arc<dyn ClipboardSource>, reads: usize, pause: Duration) {
    println!("Copy some text; the clipboard is read {reads} times...");
    for i in 1..=reads {
        let preview = match read_with_timeout(source.clone(), Duration::from_secs(1)).await {
            Some(text) if !text.is_empty() => text.chars().take(50).collect::<String>(),
            _ => "(empty)".to_string(),
        };
        println!("{i}. {preview:?}");
        if i < reads {
            tokio::time::sleep(pause).await;
        }
    }
}
