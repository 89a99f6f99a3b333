// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation keys.
//!
//! A key is the `namespace/name` string of one `Arman`. Cluster-scoped names
//! carry no namespace and no separator. Keys are what the work queue
//! deduplicates on, so the same object must always produce the same string.

use crate::errors::KeyError;

/// Build the key for an object in `namespace` (or cluster scope when `None`).
#[must_use]
pub fn meta_namespace_key(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{ns}/{name}"),
        _ => name.to_string(),
    }
}

/// Split a key into its namespace and name.
///
/// # Errors
///
/// Returns [`KeyError`] when the key has more than one separator or an empty name.
pub fn split_meta_namespace_key(key: &str) -> Result<(Option<&str>, &str), KeyError> {
    let mut parts = key.split('/');
    let (namespace, name) = match (parts.next(), parts.next(), parts.next()) {
        (Some(name), None, None) => (None, name),
        (Some(namespace), Some(name), None) => (Some(namespace), name),
        _ => return Err(KeyError::UnexpectedFormat(key.to_string())),
    };

    if name.is_empty() {
        return Err(KeyError::EmptyName(key.to_string()));
    }

    Ok((namespace.filter(|ns| !ns.is_empty()), name))
}
