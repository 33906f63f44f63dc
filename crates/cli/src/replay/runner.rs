//! Replay runner - feeds recorded messages to the dispatch service.
//!
//! Input is JSON lines, one record per line:
//!
//! ```text
//! {"session": "s1", "protocol": "happn_3", "message": {"action": "get", "path": "/a"}}
//! {"direction": "outbound", "message": {"action": "set", "path": "/a", "data": 1}}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use contracts::{DispatchSettings, Message, Request, Session};
use dispatcher::DispatchService;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use super::ReplayStats;
use crate::adapter::build_service;

/// Replay configuration
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    pub settings: DispatchSettings,

    /// JSON-lines input, `-` for stdin
    pub input: PathBuf,

    /// Protocol for records without one (None = current version)
    pub default_protocol: Option<String>,

    /// Maximum number of records (None = unlimited)
    pub limit: Option<u64>,

    /// Print encoded responses to stdout
    pub print_responses: bool,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Direction {
    #[default]
    Inbound,
    Outbound,
    System,
}

#[derive(Debug, Deserialize)]
struct ReplayRecord {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    session: Option<String>,
    #[serde(default)]
    protocol: Option<String>,
    #[serde(default)]
    direction: Direction,
    message: Value,
}

/// Replays one input through a freshly built service
pub struct Replay {
    config: ReplayConfig,
}

impl Replay {
    pub fn new(config: ReplayConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> Result<ReplayStats> {
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let service = build_service(self.config.settings.clone())?;

        if self.config.input.as_os_str() == "-" {
            let reader = BufReader::new(tokio::io::stdin());
            self.replay(&service, reader).await
        } else {
            let file = tokio::fs::File::open(&self.config.input)
                .await
                .with_context(|| format!("Failed to open {}", self.config.input.display()))?;
            self.replay(&service, BufReader::new(file)).await
        }
    }

    async fn replay<R>(&self, service: &DispatchService, reader: R) -> Result<ReplayStats>
    where
        R: AsyncBufRead + Unpin,
    {
        let start_time = Instant::now();
        let default_protocol = self
            .config
            .default_protocol
            .clone()
            .unwrap_or_else(|| service.current_protocol().to_string());

        let mut stats = ReplayStats::default();
        let mut sessions: HashMap<(String, String), Arc<Session>> = HashMap::new();
        let mut lines = reader.lines();
        let mut line_no = 0u64;

        while let Some(line) = lines.next_line().await.context("Failed to read input")? {
            line_no += 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if self.config.limit.is_some_and(|limit| stats.processed >= limit) {
                info!(limit = stats.processed, "Replay limit reached");
                break;
            }

            let record: ReplayRecord = match serde_json::from_str(line) {
                Ok(record) => record,
                Err(e) => {
                    warn!(line = line_no, error = %e, "Skipping malformed record");
                    stats.malformed += 1;
                    continue;
                }
            };

            let session_id = record.session.clone().unwrap_or_else(|| "replay".to_string());
            let protocol = record
                .protocol
                .clone()
                .unwrap_or_else(|| default_protocol.clone());
            let session = Arc::clone(
                sessions
                    .entry((session_id.clone(), protocol.clone()))
                    .or_insert_with(|| Arc::new(Session::new(session_id, protocol))),
            );
            let id = record.id.clone().unwrap_or_else(|| line_no.to_string());

            self.dispatch(service, record, id, session, &mut stats).await;
        }

        stats.duration = start_time.elapsed();
        stats.dispatch = Some(service.stats());
        Ok(stats)
    }

    async fn dispatch(
        &self,
        service: &DispatchService,
        record: ReplayRecord,
        id: String,
        session: Arc<Session>,
        stats: &mut ReplayStats,
    ) {
        stats.processed += 1;
        let started = Instant::now();

        let outcome = match record.direction {
            Direction::Inbound => service
                .process_message_in(Message::new(id.clone(), session, record.message))
                .await
                .map(|out| {
                    let ok = out.error.is_none();
                    (out, ok)
                }),
            direction => {
                let request: Request = match serde_json::from_value(record.message) {
                    Ok(request) => request,
                    Err(e) => {
                        warn!(id = %id, error = %e, "Skipping undecodable {direction:?} record");
                        stats.malformed += 1;
                        stats.processed -= 1;
                        return;
                    }
                };
                let message = Message::with_request(id.clone(), session, request);
                let result = if direction == Direction::Outbound {
                    service.process_message_out(message).await
                } else {
                    service.process_system(message).await
                };
                result.map(|out| (out, true))
            }
        };
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            Ok((out, ok)) => {
                if !ok {
                    stats.failed += 1;
                }
                if let Some(action) = out.action() {
                    stats.latency.update(action, latency_ms, ok);
                }
                debug!(id = %id, ok, latency_ms, "Record dispatched");
                if self.config.print_responses {
                    let payload = out.response.unwrap_or(out.raw);
                    println!("{}", json!({"id": id, "ok": ok, "payload": payload}));
                }
            }
            Err(e) => {
                stats.failed += 1;
                warn!(id = %id, error = %e, "Dispatch failed");
                if self.config.print_responses {
                    println!("{}", json!({"id": id, "ok": false, "error": e}));
                }
            }
        }
    }
}
