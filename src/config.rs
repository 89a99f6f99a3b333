// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Command line and environment configuration for the controller binary.
//!
//! Every flag can also be set through an environment variable, which is how
//! the deployment manifests configure it.

use crate::constants::{
    DEFAULT_BASE_DELAY_MILLIS, DEFAULT_BUCKET_BURST, DEFAULT_BUCKET_QPS, DEFAULT_MAX_DELAY_SECS,
    DEFAULT_METRICS_ADDR, DEFAULT_WORKERS,
};
use crate::errors::ConfigError;
use crate::queue::rate_limiter::RateLimiterSettings;
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::time::Duration;

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Compact human readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Arman controller
#[derive(Parser, Debug, Clone)]
#[command(name = "arman-controller")]
#[command(version)]
#[command(about = "Keeps a Deployment and a Service in sync with every Arman resource")]
pub struct ControllerArgs {
    /// Number of concurrent reconcile workers
    #[arg(long, env = "ARMAN_WORKERS", default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Only watch this namespace (all namespaces when unset)
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Listen address for /metrics and /healthz
    #[arg(long, env = "METRICS_ADDR", default_value = DEFAULT_METRICS_ADDR)]
    pub metrics_addr: SocketAddr,

    /// Log output format
    #[arg(long, env = "RUST_LOG_FORMAT", value_enum, ignore_case = true, default_value_t)]
    pub log_format: LogFormat,

    /// First retry delay for a failing key, in milliseconds
    #[arg(long, default_value_t = DEFAULT_BASE_DELAY_MILLIS)]
    pub base_delay_ms: u64,

    /// Maximum retry delay for a failing key, in seconds
    #[arg(long, default_value_t = DEFAULT_MAX_DELAY_SECS)]
    pub max_delay_secs: u64,

    /// Overall retry rate across all keys, per second
    #[arg(long, default_value_t = DEFAULT_BUCKET_QPS)]
    pub qps: f64,

    /// Overall retry burst across all keys
    #[arg(long, default_value_t = DEFAULT_BUCKET_BURST)]
    pub burst: u32,
}

impl ControllerArgs {
    /// Reject settings the controller cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid {
                setting: "workers",
                reason: "must be at least 1".to_string(),
            });
        }
        if !self.qps.is_finite() || self.qps <= 0.0 {
            return Err(ConfigError::Invalid {
                setting: "qps",
                reason: format!("must be a positive number, got {}", self.qps),
            });
        }
        if self.burst == 0 {
            return Err(ConfigError::Invalid {
                setting: "burst",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.base_delay_ms > self.max_delay_secs.saturating_mul(1000) {
            return Err(ConfigError::Invalid {
                setting: "base-delay-ms",
                reason: "must not exceed max-delay-secs".to_string(),
            });
        }
        Ok(())
    }

    /// Retry policy built from the rate limiter flags.
    #[must_use]
    pub fn rate_limiter_settings(&self) -> RateLimiterSettings {
        RateLimiterSettings {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_secs(self.max_delay_secs),
            qps: self.qps,
            burst: self.burst,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
