//! # canwatch-core
//!
//! Core logic for monitoring a cellular home-internet gateway over its local
//! HTTP management API and rebooting it when health checks fail.
//!
//! This crate provides:
//! - The gateway's two login protocols (cookie-based app login, and the
//!   nonce/challenge-response web login with derived hashes and CSRF token)
//! - Typed wrappers over the gateway's status and reboot endpoints
//! - A bounded reachability prober around an external ping collaborator
//! - The health evaluator that turns check results into a reboot decision,
//!   gated behind a minimum-uptime threshold
//!
//! ## Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`codec`] - The url-safe base64 escaping and paired SHA-256 hashing the
//!   web login protocol is built from
//! - [`auth`] - Session management for the app and web login protocols
//! - [`device`] - Typed gateway endpoint wrappers
//! - [`probe`] - Reachability probing with an inter-attempt delay
//! - [`health`] - Policy-driven health evaluation and the reboot decision
//! - [`error`] - Unified error type for the crate
//!
//! The evaluator runs one pass and produces one [`health::Decision`]; nothing
//! is persisted between runs, and no state is shared across threads.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod auth;
pub mod codec;
pub mod device;
pub mod error;
pub mod health;
pub mod probe;
mod transport;

// Re-export primary types for convenience
pub use auth::{AuthClient, AuthContext, Credentials, Session};
pub use device::{DeviceClient, SignalSnapshot, SiteIdentity, DEFAULT_GATEWAY_URL};
pub use error::{GatewayError, Result};
pub use health::{evaluate, Decision, Gateway, HealthPolicy, DEFAULT_5G_BAND, DEFAULT_PING_HOST};
pub use probe::{probe, Pinger, SystemPinger};
