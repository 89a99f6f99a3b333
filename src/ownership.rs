// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Owner reference checks for managed resources.
//!
//! A `Deployment` or `Service` belongs to an `Arman` only if it carries a
//! controller owner reference with that `Arman`'s UID. Matching by name is
//! never enough: a same-named `Arman` that was deleted and recreated has a new
//! UID and must not adopt the old children.

use crate::constants::{API_GROUP, KIND_ARMAN};
use crate::crd::Arman;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};

/// The controller owner reference of `meta`, if any.
#[must_use]
pub fn controller_owner(meta: &ObjectMeta) -> Option<&OwnerReference> {
    meta.owner_references
        .as_ref()?
        .iter()
        .find(|owner| owner.controller == Some(true))
}

/// The controller owner reference of `meta` when it points at an `Arman`.
#[must_use]
pub fn arman_owner(meta: &ObjectMeta) -> Option<&OwnerReference> {
    controller_owner(meta).filter(|owner| {
        owner.kind == KIND_ARMAN && api_group(&owner.api_version) == API_GROUP
    })
}

/// Returns true when `child` is controlled by `owner` (same UID).
#[must_use]
pub fn is_controlled_by(child: &ObjectMeta, owner: &Arman) -> bool {
    let Some(owner_uid) = owner.metadata.uid.as_deref() else {
        return false;
    };
    controller_owner(child).is_some_and(|reference| reference.uid == owner_uid)
}

fn api_group(api_version: &str) -> &str {
    match api_version.split_once('/') {
        Some((group, _)) => group,
        None => "",
    }
}

#[cfg(test)]
#[path = "ownership_tests.rs"]
mod ownership_tests;
