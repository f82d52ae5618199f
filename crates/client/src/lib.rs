//! # Flowsmith Client
//!
//! Runs a compiled flow against the remote services.
//!
//! A [`FlowClient`] is built from a [`ClientDefinition`] (tools, modifiers, an optional explicit
//! flow) plus its [`Services`] and [`Stores`]. Construction compiles the flow; nothing remote
//! happens until the first registration or run.
//!
//! ## Run lifecycle
//!
//! 1. Merge caller input over the defaults and validate it.
//! 2. Check authorizations for the base scopes and any stored flow scope.
//! 3. Resolve function ids and the flow id through the registration cache, registering when
//!    allowed.
//! 4. Start the run. A rejection for the flow scope is retried once after a forced refresh.
//! 5. Poll with [`FlowClient::progress`] under a [`PollBudget`] until the run is terminal.

pub mod client;
pub mod credentials;
pub mod error;
pub mod input;
pub mod permissions;
pub mod polling;

pub use client::{ClientDefinition, ClientOptions, FlowClient, RunRequest, Services, Stores, run_url};
pub use credentials::{KeyringCredentials, LoginHandler, MemoryCredentials, NoLogin, TokenLogin};
pub use error::ClientError;
pub use polling::{PollBudget, log_active_status};
