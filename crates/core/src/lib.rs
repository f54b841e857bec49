// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tf-core: Core library for the Tokenflow orchestration substrate

pub mod clock;
pub mod counters;
pub mod event;
pub mod seq;
pub mod settings;
pub mod token;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use counters::{CounterSnapshot, Counters};
pub use event::Event;
pub use seq::{RuleBaseVersion, SeqError, SequenceId, ADMIN_VERSION, TOKEN_INCREMENT, VERSION_BASE};
pub use settings::{
    LoaderSettings, MonitorSettings, PublisherSettings, ReactorSettings, SettingsError,
};
#[cfg(any(test, feature = "test-support"))]
pub use test_support::TokenBuilder;
pub use token::{
    Header, JoinAttribute, MonitorData, ServiceRef, Token, INFRA_FIELDS, ORIGINAL_TOKEN,
    SERVICE_END_TIME, SERVICE_PROCESSING_TIME_MS, SERVICE_START_TIME, WORKFLOW_START_TIME,
};
