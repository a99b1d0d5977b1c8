//! Streamed turn output as newline-delimited JSON.
//!
//! A producer task drains the provider stream and pushes one serialized
//! record per chunk into a bounded channel. The transport drains the
//! channel until it closes; dropping the receiver cancels the producer
//! (the next send fails) which in turn drops the upstream connection.

use log::{debug, error};
use serde_json::json;
use tokio::sync::mpsc;

use chat_core::message::HistoryMetadata;
use provider_client::ProviderStream;

use crate::response::format_chunk;

/// Content type for the streamed response body.
pub const NDJSON_CONTENT_TYPE: &str = "application/json-lines";

const CHANNEL_CAPACITY: usize = 32;

pub struct StreamAggregator;

impl StreamAggregator {
    /// Convert a provider stream into NDJSON lines. Records preserve the
    /// provider's emission order; the sequence ends when the provider's
    /// stream ends, with no explicit sentinel record.
    pub fn spawn(
        stream: ProviderStream,
        history_metadata: Option<HistoryMetadata>,
    ) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let ProviderStream {
                mut chunks,
                correlation_id,
            } = stream;

            use futures_util::StreamExt;
            while let Some(next) = chunks.next().await {
                let line = match next {
                    Ok(chunk) => {
                        let record = format_chunk(
                            &chunk,
                            history_metadata.clone(),
                            correlation_id.as_deref(),
                        );
                        match serde_json::to_string(&record) {
                            Ok(line) => line,
                            Err(e) => {
                                error!("failed to serialize stream record: {e}");
                                continue;
                            }
                        }
                    }
                    Err(e) => {
                        error!("provider stream failed mid-turn: {e}");
                        let _ = tx.send(json!({ "error": e.to_string() }).to_string()).await;
                        break;
                    }
                };
                if tx.send(line).await.is_err() {
                    debug!("client disconnected, closing provider stream");
                    break;
                }
            }
        });
        rx
    }
}
