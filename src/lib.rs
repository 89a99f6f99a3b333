// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # Arman Controller
//!
//! A level-triggered Kubernetes controller for the `Arman` custom resource.
//! For every `Arman` it keeps one `Deployment` and one `Service` in line with
//! the spec, and reports the deployment's available replicas back on the
//! resource's status.
//!
//! ## Overview
//!
//! Watch events for `Arman`, `Deployment` and `Service` objects are mirrored
//! into a local cache and reduced to `namespace/name` keys of the owning
//! `Arman`. The keys go through a deduplicating, rate limited work queue to a
//! pool of workers, each of which converges one key at a time from cached
//! state.
//!
//! ## Modules
//!
//! - [`crd`] - The `Arman` custom resource
//! - [`cache`] - Watch-backed local cache
//! - [`router`] - Maps watch events to reconciliation keys
//! - [`queue`] - Work queue and retry rate limiters
//! - [`controller`] - Event intake and the worker pool
//! - [`reconcilers`] - Convergence of one `Arman`
//! - [`resources`] - Builders for the managed `Deployment` and `Service`
//! - [`context`] - Collaborator traits shared by the workers
//!
//! ## Example
//!
//! ```rust,no_run
//! use arman_controller::crd::{Arman, ArmanSpec};
//!
//! let web = Arman::new(
//!     "web",
//!     ArmanSpec {
//!         deployment_name: "web".to_string(),
//!         deployment_image: "nginx:1.27".to_string(),
//!         replicas: Some(2),
//!         service_name: "web".to_string(),
//!         service_port: 80,
//!         service_type: "ClusterIP".to_string(),
//!         service_target_port: 8080,
//!     },
//! );
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod constants;
pub mod context;
pub mod controller;
pub mod crd;
pub mod errors;
pub mod events;
pub mod key;
pub mod labels;
pub mod metrics;
pub mod ownership;
pub mod queue;
pub mod reconcilers;
pub mod resources;
pub mod router;

#[cfg(test)]
mod test_support;
