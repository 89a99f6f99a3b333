// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation logic for the `Arman` custom resource.
//!
//! # Reconciliation Architecture
//!
//! The controller follows the standard Kubernetes controller pattern:
//!
//! 1. **Watch** - Observe `Arman`, `Deployment` and `Service` changes through the cache
//! 2. **Reconcile** - Compare desired state (`Arman` spec) with the cached actual state
//! 3. **Update** - Create or update the managed `Deployment` and `Service`
//! 4. **Status** - Report the observed available replicas back on the `Arman`
//!
//! # Available Reconcilers
//!
//! - [`reconcile_arman`] - Converges one `Arman` identified by its key
//! - [`update_arman_status`] - Writes the `Arman` status from its `Deployment`
//!
//! # Example: Using a Reconciler
//!
//! ```rust,no_run
//! use arman_controller::context::Context;
//! use arman_controller::reconcilers::reconcile_arman;
//!
//! async fn sync(ctx: &Context) -> anyhow::Result<()> {
//!     reconcile_arman(ctx, "default/web").await?;
//!     Ok(())
//! }
//! ```

pub mod arman;
pub mod status;

pub use arman::{reconcile_arman, validate_spec};
pub use status::update_arman_status;
