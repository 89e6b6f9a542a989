//! Publish Entitlements - Subscription and credit entitlement engine
//!
//! Decides whether a user may publish an event and debits exactly one unit
//! of entitlement per publish. Users hold subscription grants (weekly and
//! monthly quotas) and prepaid credit packages; consumption prefers the
//! subscription and falls back to packages oldest first. Every counter
//! write is a guarded update, so limits hold under concurrent consumers.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;
