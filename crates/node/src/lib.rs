// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! tf-node: the per-node orchestrator daemon.
//!
//! A node hosts one logical service. Two UDP listeners (token ingress,
//! rule ingress) feed a deadline-aware priority queue drained by a
//! worker pool; each worker drives one token through admission, join
//! synchronization, guard, invocation, enrichment, and publication.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod deploy;
pub mod enricher;
pub mod env;
pub mod forkjoin;
pub mod generator;
pub mod invoker;
pub mod lifecycle;
pub mod publisher;
pub mod reactor;
pub mod rule_handler;
pub mod runtime;
pub mod scheduler;

pub use deploy::{Channel, DeployError, Deployment};
pub use forkjoin::{ForkJoinRegistry, JoinInput, JoinProgress};
pub use generator::EventGenerator;
pub use invoker::{
    BusinessError, BusinessHandler, FnHandler, HandlerRegistry, Invocation, InvokeContext,
    InvokeError, Invoker,
};
pub use lifecycle::{LifecycleError, Node, NodeConfig};
pub use publisher::{PublishError, Publisher, PublisherConfig};
pub use reactor::{QueuedToken, Reactor, TokenQueue};
pub use rule_handler::RuleHandler;
pub use runtime::{Runtime, RuntimeError, TokenState};
pub use scheduler::{prioritise, PREEMPT_KEY};
