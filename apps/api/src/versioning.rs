//! Version chain manager.
//!
//! Each document (resume or template) owns an append-only chain of immutable
//! version rows plus one mutable `current_version_id` pointer on the parent.
//! This module appends to chains and resolves pointers; it never repoints a
//! parent. Repointing is always the caller's second step.
//!
//! There is no locking between the "read latest" and "write next" steps: two
//! concurrent editors of the same chain can both observe the same latest
//! version and collide on the next number. Callers that want defined
//! behavior pass an expected pointer at the orchestration layer and get a
//! conflict before any write.

use serde_json::Value;

use crate::errors::AppError;
use crate::store::{filter, ListOptions, RecordStore};

/// Names one version chain: the version collection, its parent collection,
/// and the field on version rows referencing the parent.
pub struct Chain {
    pub collection: &'static str,
    pub parent_collection: &'static str,
    pub parent_field: &'static str,
}

pub const RESUME_CHAIN: Chain = Chain {
    collection: "resume_versions",
    parent_collection: "resumes",
    parent_field: "resume_id",
};

pub const TEMPLATE_CHAIN: Chain = Chain {
    collection: "template_versions",
    parent_collection: "templates",
    parent_field: "template_id",
};

/// Appends the first version of a fresh chain.
pub async fn start(
    store: &dyn RecordStore,
    chain: &Chain,
    parent_id: &str,
    payload: Value,
) -> Result<Value, AppError> {
    append(store, chain, parent_id, payload, false).await
}

/// Appends the next version of an existing chain. An empty chain on this
/// path means the parent's history is gone or never existed; surfaced as a
/// data-integrity error, never silently restarted at version 1.
pub async fn extend(
    store: &dyn RecordStore,
    chain: &Chain,
    parent_id: &str,
    payload: Value,
) -> Result<Value, AppError> {
    append(store, chain, parent_id, payload, true).await
}

async fn append(
    store: &dyn RecordStore,
    chain: &Chain,
    parent_id: &str,
    payload: Value,
    expect_existing: bool,
) -> Result<Value, AppError> {
    let Value::Object(mut fields) = payload else {
        return Err(AppError::Validation(
            "version payload must be a JSON object".to_string(),
        ));
    };

    let next = match (latest_number(store, chain, parent_id).await?, expect_existing) {
        (Some(latest), _) => latest + 1,
        (None, false) => 1,
        (None, true) => {
            return Err(AppError::BrokenChain(format!(
                "{} {parent_id} has no versions to extend",
                chain.parent_collection
            )))
        }
    };

    fields.insert(
        chain.parent_field.to_string(),
        Value::String(parent_id.to_string()),
    );
    fields.insert("version".to_string(), Value::from(next));

    Ok(store.create(chain.collection, Value::Object(fields)).await?)
}

/// The highest version number in a chain, read as descending-sort-take-first.
async fn latest_number(
    store: &dyn RecordStore,
    chain: &Chain,
    parent_id: &str,
) -> Result<Option<i64>, AppError> {
    let items = store
        .get_list(
            chain.collection,
            1,
            1,
            ListOptions {
                filter: Some(filter::eq(chain.parent_field, parent_id)),
                sort: Some("-version".to_string()),
            },
        )
        .await?;

    match items.first() {
        None => Ok(None),
        Some(row) => row
            .get("version")
            .and_then(Value::as_i64)
            .map(Some)
            .ok_or_else(|| {
                AppError::BrokenChain(format!(
                    "{} row for {parent_id} has no version number",
                    chain.collection
                ))
            }),
    }
}

/// Resolves a parent's current version: read the pointer, fetch that row by
/// id. O(1) per step, no chain scan.
pub async fn current(
    store: &dyn RecordStore,
    chain: &Chain,
    parent_id: &str,
) -> Result<Value, AppError> {
    let parent = store.get_one(chain.parent_collection, parent_id).await?;
    let pointer = parent
        .get("current_version_id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    resolve_pointer(store, chain, parent_id, pointer.as_deref()).await
}

/// Resolves an already-read pointer to its version row. A null pointer or a
/// pointer to a missing row is a broken chain.
pub async fn resolve_pointer(
    store: &dyn RecordStore,
    chain: &Chain,
    parent_id: &str,
    pointer: Option<&str>,
) -> Result<Value, AppError> {
    let Some(version_id) = pointer else {
        return Err(AppError::BrokenChain(format!(
            "{} {parent_id} has no current version pointer",
            chain.parent_collection
        )));
    };

    store
        .get_one(chain.collection, version_id)
        .await
        .map_err(|err| {
            if err.is_not_found() {
                AppError::BrokenChain(format!(
                    "{} {parent_id} points at missing version {version_id}",
                    chain.parent_collection
                ))
            } else {
                err.into()
            }
        })
}

/// All versions of a chain, newest first.
pub async fn history(
    store: &dyn RecordStore,
    chain: &Chain,
    parent_id: &str,
) -> Result<Vec<Value>, AppError> {
    Ok(store
        .get_list(
            chain.collection,
            1,
            200,
            ListOptions {
                filter: Some(filter::eq(chain.parent_field, parent_id)),
                sort: Some("-version".to_string()),
            },
        )
        .await?)
}
