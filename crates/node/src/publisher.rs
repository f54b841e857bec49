// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound transport: channel resolution, compression, chunking, and
//! the shared publish socket.
//!
//! One socket serves every send from this node; sends are serialized
//! per datagram so fork storms cannot exhaust ephemeral ports or
//! reorder a chunk stream mid-flight.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use tf_core::Token;
use tf_rules::RouteTarget;
use tf_wire::{encode_for_wire, WireError, WireOptions, WirePayload};

use crate::deploy::{Channel, TOKEN_PORT_BASE};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("unknown channel: {0}")]
    UnknownChannel(String),
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error("send failed after retries: {0}")]
    Exhausted(std::io::Error),
}

/// Transport tuning for one publisher.
#[derive(Debug, Clone, Copy)]
pub struct PublisherConfig {
    pub max_wire_length: usize,
    pub compression_enabled: bool,
    pub socket_timeout: Duration,
    pub chunk_delay: Duration,
}

impl PublisherConfig {
    fn wire_options(&self) -> WireOptions {
        WireOptions {
            max_wire_length: self.max_wire_length,
            compression_enabled: self.compression_enabled,
        }
    }
}

/// The node's shared outbound socket plus the logical channel map.
pub struct Publisher {
    socket: Arc<UdpSocket>,
    channels: HashMap<String, Channel>,
    config: PublisherConfig,
    /// Serializes sends; held per datagram only.
    send_lock: Mutex<()>,
}

impl Publisher {
    pub fn new(
        socket: Arc<UdpSocket>,
        channels: HashMap<String, Channel>,
        config: PublisherConfig,
    ) -> Self {
        Self { socket, channels, config, send_lock: Mutex::new(()) }
    }

    /// Resolve a routing target to a concrete address:
    /// `host : 10_000 + channelIndex*1_000 + basePort`.
    pub fn resolve(&self, target: &RouteTarget) -> Result<String, PublishError> {
        let channel = self
            .channels
            .get(&target.channel)
            .ok_or_else(|| PublishError::UnknownChannel(target.channel.clone()))?;
        let port = TOKEN_PORT_BASE + channel.channel_index * 1_000 + target.port;
        Ok(format!("{}:{}", channel.host, port))
    }

    /// Publish one outgoing token to one routing target.
    pub async fn publish(&self, token: &Token, target: &RouteTarget) -> Result<(), PublishError> {
        let addr = self.resolve(target)?;
        match encode_for_wire(token, self.config.wire_options())? {
            WirePayload::Single(datagram) => {
                self.send_with_retry(&datagram, &addr).await?;
            }
            WirePayload::Chunked(datagrams) => {
                debug!(
                    sequence_id = %token.sequence_id(),
                    chunks = datagrams.len(),
                    %addr,
                    "publishing chunked token"
                );
                for (i, datagram) in datagrams.iter().enumerate() {
                    if i > 0 {
                        tokio::time::sleep(self.config.chunk_delay).await;
                    }
                    self.send_with_retry(datagram, &addr).await?;
                }
            }
        }
        Ok(())
    }

    /// Send raw bytes to an explicit address (commitment ACKs).
    pub async fn send_raw(&self, bytes: &[u8], addr: &str) -> Result<(), PublishError> {
        self.send_with_retry(bytes, addr).await
    }

    /// Bounded retry within the socket timeout. A datagram that cannot
    /// be sent by then is dropped by the caller; siblings are unaffected.
    async fn send_with_retry(&self, bytes: &[u8], addr: &str) -> Result<(), PublishError> {
        let deadline = tokio::time::Instant::now() + self.config.socket_timeout;
        let mut last_err: Option<std::io::Error> = None;
        loop {
            {
                let _guard = self.send_lock.lock().await;
                match self.socket.send_to(bytes, addr).await {
                    Ok(_) => return Ok(()),
                    Err(e) => {
                        warn!(%addr, error = %e, "datagram send failed, retrying");
                        last_err = Some(e);
                    }
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(PublishError::Exhausted(last_err.unwrap_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::TimedOut, "send timeout")
                })));
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

#[cfg(test)]
#[path = "publisher_tests.rs"]
mod tests;
