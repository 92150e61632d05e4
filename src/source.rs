//! Batch producers for the loglens driver: JSONL readers and a
//! synthetic generator. The engine is transport-agnostic; anything that
//! yields batches of candidate entries can feed it.

use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::Stream;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use loglens_types::{ErrorDetail, RawEntry};

/// A stream of producer batches, ready for StreamIngestor::connect
pub type BatchStream = Pin<Box<dyn Stream<Item = Result<Vec<RawEntry>>> + Send>>;

/// Decode one JSONL line into a candidate entry. Undecodable lines
/// become message-only candidates so the ingestor counts them as
/// malformed instead of the transport silently eating them.
fn decode_line(line: &str) -> RawEntry {
    serde_json::from_str(line).unwrap_or_else(|_| RawEntry::from_message(line))
}

/// Read newline-delimited JSON entries, batching up to `batch_size`
/// lines per producer batch
fn jsonl_batches<R>(reader: R, batch_size: usize) -> impl Stream<Item = Result<Vec<RawEntry>>>
where
    R: AsyncRead + Unpin + Send,
{
    let lines = BufReader::new(reader).lines();
    futures::stream::try_unfold(lines, move |mut lines| async move {
        let mut batch = Vec::with_capacity(batch_size);
        loop {
            match lines.next_line().await.context("reading log source")? {
                Some(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    batch.push(decode_line(&line));
                    if batch.len() >= batch_size {
                        break;
                    }
                }
                None => {
                    if batch.is_empty() {
                        return Ok(None);
                    }
                    break;
                }
            }
        }
        Ok(Some((batch, lines)))
    })
}

/// Batches from standard input
pub fn stdin_batches(batch_size: usize) -> BatchStream {
    Box::pin(jsonl_batches(tokio::io::stdin(), batch_size))
}

/// Batches from a JSONL file
pub async fn file_batches(path: &Path, batch_size: usize) -> Result<BatchStream> {
    let file = File::open(path)
        .await
        .with_context(|| format!("opening {}", path.display()))?;
    Ok(Box::pin(jsonl_batches(file, batch_size)))
}

/// Synthetic stream: roughly `rate` entries per second for `seconds`,
/// delivered in 100 ms chunks. Message shapes recur with varying ids so
/// pattern extraction has something to chew on.
pub fn synthetic_batches(rate: u64, seconds: u64) -> BatchStream {
    let total = rate.saturating_mul(seconds);
    let chunk = (rate / 10).max(1);

    Box::pin(futures::stream::try_unfold(0u64, move |produced| async move {
        if produced >= total {
            return Ok(None);
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        let n = chunk.min(total - produced);
        let batch = (produced..produced + n).map(synthetic_entry).collect();
        Ok(Some((batch, produced + n)))
    }))
}

fn synthetic_entry(i: u64) -> RawEntry {
    // Cheap deterministic scatter for ids and sizes
    let x = i
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    let id = (x >> 33) % 400;
    let ms = (x >> 17) % 900 + 5;

    let mut entry = RawEntry {
        timestamp: Some(Utc::now()),
        ..RawEntry::default()
    };

    match i % 10 {
        0..=4 => {
            entry.level = Some("info".into());
            entry.message = Some(format!("Request to /api/orders/{id} completed in {ms} ms"));
        }
        5 | 6 => {
            entry.level = Some("debug".into());
            entry.message = Some(format!("Cache lookup for key \"session:{id}\""));
        }
        7 => {
            entry.level = Some("info".into());
            entry.message = Some(format!("User u{id} logged in from 10.0.{}.{}", x % 254 + 1, (x >> 8) % 254 + 1));
        }
        8 => {
            entry.level = Some("warn".into());
            entry.message = Some(format!("Database timeout for user {id}"));
            entry
                .metadata
                .insert("user".into(), serde_json::Value::String(format!("u{id}")));
        }
        _ => {
            entry.level = Some("error".into());
            entry.message = Some("TimeoutError: upstream call exceeded deadline".into());
            entry.error = Some(ErrorDetail {
                name: "TimeoutError".into(),
                message: "upstream call exceeded deadline".into(),
                stack: Some(
                    "at fetchUpstream (gateway.js:88:13)\nat handle (router.js:41:9)".into(),
                ),
            });
            entry
                .metadata
                .insert("user".into(), serde_json::Value::String(format!("u{id}")));
            entry.metadata.insert(
                "endpoint".into(),
                serde_json::Value::String("/api/orders".into()),
            );
            entry.metadata.insert(
                "service".into(),
                serde_json::Value::String("gateway".into()),
            );
        }
    }

    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_decode_json_line() {
        let raw = decode_line(
            r#"{"timestamp":"2024-01-15T10:30:00Z","level":"info","message":"started"}"#,
        );
        assert!(raw.timestamp.is_some());
        assert_eq!(raw.message.as_deref(), Some("started"));
    }

    #[test]
    fn test_undecodable_line_keeps_text() {
        let raw = decode_line("plain text line");
        assert!(raw.timestamp.is_none());
        assert_eq!(raw.message.as_deref(), Some("plain text line"));
    }

    #[tokio::test]
    async fn test_jsonl_batching_and_blank_lines() {
        let input = "\
{\"timestamp\":\"2024-01-15T10:30:00Z\",\"level\":\"info\",\"message\":\"a\"}\n\
\n\
{\"timestamp\":\"2024-01-15T10:30:01Z\",\"level\":\"info\",\"message\":\"b\"}\n\
{\"timestamp\":\"2024-01-15T10:30:02Z\",\"level\":\"info\",\"message\":\"c\"}\n";
        let mut stream = Box::pin(jsonl_batches(input.as_bytes(), 2));
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.len(), 2);
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second.len(), 1);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_synthetic_produces_expected_total() {
        let mut stream = synthetic_batches(50, 1);
        let mut total = 0;
        while let Some(batch) = stream.next().await {
            total += batch.unwrap().len();
        }
        assert_eq!(total, 50);
    }
}
