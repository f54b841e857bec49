// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! tfd: the Tokenflow node daemon.
//!
//! Usage: `tfd [deployment.toml] [loaderSettings.toml]`. Business
//! handlers are registered per deployed operation; this binary installs
//! a passthrough handler for each, suitable for routing-only places.
//! Real services embed `tf-node` as a library and register their own.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tf_core::LoaderSettings;
use tf_node::{
    env, Deployment, FnHandler, HandlerRegistry, InvokeContext, LifecycleError, Node,
};
use tf_rules::TableRuleEngine;

fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if let Ok(log_dir) = std::env::var("TF_LOG_DIR") {
        let appender = tracing_appender::rolling::daily(log_dir, "tfd.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        None
    }
}

/// Passthrough business logic: one input flows through unchanged, a
/// join set is carried as an `inputs` list.
fn passthrough(_: &InvokeContext, mut inputs: Vec<Value>) -> Result<Value, tf_node::BusinessError> {
    Ok(match inputs.len() {
        1 => inputs.remove(0),
        _ => json!({ "inputs": inputs }),
    })
}

#[tokio::main]
async fn main() -> Result<(), LifecycleError> {
    let _guard = init_tracing();

    let mut args = std::env::args().skip(1);
    let deploy_path =
        PathBuf::from(args.next().unwrap_or_else(|| "deployment.toml".to_string()));
    let settings_path =
        PathBuf::from(args.next().unwrap_or_else(|| "loaderSettings.toml".to_string()));

    let deploy = Deployment::load(&deploy_path)?;
    let settings = LoaderSettings::load(&settings_path)?;
    let state_dir = env::state_dir()?.join(&deploy.place_id);

    let mut registry = HandlerRegistry::new();
    for operation in &deploy.operations {
        registry.register(
            deploy.service_name.clone(),
            operation.clone(),
            Arc::new(FnHandler(passthrough)),
        );
    }

    let node = Node::start(
        tf_node::lifecycle::NodeConfig { state_dir, deploy, settings },
        registry,
        Arc::new(TableRuleEngine::new()),
    )
    .await?;

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    node.shutdown().await;
    Ok(())
}
