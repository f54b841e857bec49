// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node startup and shutdown.
//!
//! Startup order: state directory and lock file first, then rule-base
//! reload, then sockets, then tasks. Shutdown cancels every task and
//! drains within a bounded timeout.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use fs2::FileExt;
use std::io::Write;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tf_core::{Clock, Counters, Event, LoaderSettings, SettingsError, SystemClock};
use tf_rules::{RuleEngine, RuleStore, RuleStoreError};

use crate::deploy::{DeployError, Deployment};
use crate::env;
use crate::forkjoin::ForkJoinRegistry;
use crate::invoker::{HandlerRegistry, Invoker};
use crate::publisher::{Publisher, PublisherConfig};
use crate::reactor::{Reactor, TokenQueue};
use crate::rule_handler::RuleHandler;
use crate::runtime::Runtime;

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("no usable state directory (HOME unset)")]
    NoStateDir,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("another node holds the lock file: {0}")]
    LockFailed(std::io::Error),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Deploy(#[from] DeployError),
    #[error(transparent)]
    Rules(#[from] RuleStoreError),
}

/// Everything needed to start one node.
pub struct NodeConfig {
    pub state_dir: PathBuf,
    pub deploy: Deployment,
    pub settings: LoaderSettings,
}

/// A running node and its task handles.
pub struct Node {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    queue: Arc<TokenQueue>,
    store: Arc<RuleStore>,
    counters: Arc<Counters>,
    token_addr: SocketAddr,
    rule_addr: SocketAddr,
    // Held for the node's lifetime; released on drop.
    _lock_file: std::fs::File,
}

impl Node {
    /// Start a node on the system clock.
    pub async fn start(
        config: NodeConfig,
        registry: HandlerRegistry,
        engine: Arc<dyn RuleEngine>,
    ) -> Result<Self, LifecycleError> {
        Self::start_with_clock(config, registry, engine, SystemClock).await
    }

    /// Start with an explicit clock (tests drive a fake one).
    pub async fn start_with_clock<C: Clock>(
        config: NodeConfig,
        registry: HandlerRegistry,
        engine: Arc<dyn RuleEngine>,
        clock: C,
    ) -> Result<Self, LifecycleError> {
        let NodeConfig { state_dir, deploy, settings } = config;

        std::fs::create_dir_all(&state_dir)?;

        // Lock first: one node per state directory.
        let lock_path = state_dir.join(format!("{}.lock", deploy.place_id));
        let mut lock_file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
        lock_file.set_len(0)?;
        writeln!(lock_file, "{}", std::process::id())?;

        // Committed rule bases survive restarts.
        let rules_root = state_dir.join("rules");
        let store = Arc::new(RuleStore::new());
        let reloaded = store.reload(&rules_root)?;
        if reloaded > 0 {
            info!(bundles = reloaded, "reloaded committed rule bases");
        }

        let remote = env::remote_host().is_some();
        let bind_host = if remote { "0.0.0.0" } else { "127.0.0.1" };

        let token_socket =
            UdpSocket::bind((bind_host, deploy.token_port())).await?;
        let rule_socket = UdpSocket::bind((bind_host, deploy.rule_port())).await?;
        let token_addr = token_socket.local_addr()?;
        let rule_addr = rule_socket.local_addr()?;

        let publish_socket = Arc::new(UdpSocket::bind((bind_host, 0)).await?);
        let publisher = Arc::new(Publisher::new(
            publish_socket,
            deploy.channels.clone(),
            PublisherConfig {
                max_wire_length: settings.publisher.max_wire_length,
                compression_enabled: settings.publisher.compression_enabled,
                socket_timeout: std::time::Duration::from_millis(
                    settings.publisher.socket_timeout_ms,
                ),
                chunk_delay: std::time::Duration::from_millis(settings.publisher.chunk_delay_ms),
            },
        ));

        let queue = Arc::new(TokenQueue::new(settings.reactor.max_queue));
        let forkjoin = Arc::new(ForkJoinRegistry::new());
        let counters = Arc::new(Counters::new());
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();

        tasks.push(tokio::spawn(log_events(event_rx)));

        let reactor = Arc::new(Reactor::new(
            deploy.service_name.clone(),
            settings.clone(),
            store.clone(),
            forkjoin.clone(),
            queue.clone(),
            counters.clone(),
            event_tx.clone(),
            clock.clone(),
        ));
        tasks.push(tokio::spawn(reactor.run(token_socket, cancel.clone())));

        let rule_handler = Arc::new(RuleHandler::new(
            store.clone(),
            rules_root,
            remote,
            counters.clone(),
            event_tx.clone(),
            clock.clone(),
            settings.reactor.chunk_timeout_ms,
        ));
        tasks.push(tokio::spawn(rule_handler.run(rule_socket, cancel.clone())));

        let invoker = Invoker::new(
            registry,
            clock.clone(),
            deploy.place_id.clone(),
            deploy.build_version.clone(),
        );
        let runtime = Arc::new(Runtime::new(
            deploy.clone(),
            settings.clone(),
            store.clone(),
            engine,
            queue.clone(),
            forkjoin,
            invoker,
            publisher,
            counters.clone(),
            event_tx,
            clock,
        ));
        for _ in 0..settings.reactor.pool_size.max(1) {
            tasks.push(tokio::spawn(runtime.clone().run_worker(cancel.clone())));
        }
        tasks.push(tokio::spawn(runtime.run_join_reaper(cancel.clone())));

        info!(
            service = %deploy.service_name,
            %token_addr,
            %rule_addr,
            workers = settings.reactor.pool_size,
            "node started"
        );

        Ok(Self {
            cancel,
            tasks,
            queue,
            store,
            counters,
            token_addr,
            rule_addr,
            _lock_file: lock_file,
        })
    }

    pub fn token_addr(&self) -> SocketAddr {
        self.token_addr
    }

    pub fn rule_addr(&self) -> SocketAddr {
        self.rule_addr
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn store(&self) -> &RuleStore {
        &self.store
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Cancel every task and drain within the configured timeout.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.queue.close();
        let drain = async {
            for task in self.tasks {
                let _ = task.await;
            }
        };
        if tokio::time::timeout(env::drain_timeout(), drain).await.is_err() {
            warn!("drain timeout elapsed, abandoning remaining tasks");
        }
        info!("node stopped");
    }
}

/// Drain node events into the structured log.
async fn log_events(mut rx: mpsc::UnboundedReceiver<Event>) {
    while let Some(event) = rx.recv().await {
        match &event {
            Event::RuleBaseCommitted { .. } => info!("{}", event.summary()),
            Event::PublishFailed { .. } | Event::InvocationFailed { .. } => {
                warn!("{}", event.summary());
            }
            _ => debug!("{}", event.summary()),
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
