//! Resume orchestration: composes the resume and template version chains
//! into the user-facing operations (create, fetch-for-edit, save, duplicate,
//! delete, list).
//!
//! Every operation is a sequence of independent store calls awaited in
//! order. "Append version then repoint parent" is two remote writes with no
//! transaction between them; when the second fails the state is left
//! readable-but-inconsistent and surfaced as `AppError::Incomplete`.

use serde_json::{json, Value};
use tracing::warn;

use crate::errors::AppError;
use crate::models::resume::{Resume, ResumeVersion};
use crate::models::template::{Template, TemplateVersion};
use crate::store::{decode, filter, ListOptions, RecordStore};
use crate::templates;
use crate::versioning::{self, RESUME_CHAIN, TEMPLATE_CHAIN};

pub mod handlers;

pub struct NewResume {
    pub owner_id: String,
    pub name: String,
    pub content: Value,
    pub template_id: Option<String>,
}

pub struct ResumeEdit {
    pub name: Option<String>,
    pub content: Option<Value>,
    pub markup: Option<String>,
    /// Optimistic-lock check: when set, the save fails with a conflict
    /// before any write unless the resume still points at this version.
    pub expected_current_version_id: Option<String>,
}

pub struct DuplicateResume {
    pub owner_id: String,
    pub name: Option<String>,
    pub content: Option<Value>,
}

/// The denormalized triple the editor needs.
#[derive(Debug, serde::Serialize)]
pub struct ResumeEditData {
    pub name: String,
    pub content: Value,
    pub markup: String,
}

/// Parses editor-supplied content. Content that is not valid JSON is
/// replaced by an empty document and the operation proceeds; the caller
/// never sees a parse error. Lenient on purpose.
pub fn parse_content(raw: &str) -> Value {
    match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(err) => {
            warn!("Resume content is not valid JSON, substituting an empty document: {err}");
            json!({})
        }
    }
}

/// Creates a resume together with version 1 of its chain.
///
/// Order matters: the version row needs the resume id, so the resume is
/// created first with a null pointer, then version 1, then the repoint.
pub async fn create_resume(
    store: &dyn RecordStore,
    params: NewResume,
) -> Result<Resume, AppError> {
    let template: Template = match &params.template_id {
        Some(template_id) => decode(store.get_one("templates", template_id).await?)?,
        None => templates::default_for_owner(store, &params.owner_id).await?,
    };
    let template_version: TemplateVersion = decode(
        versioning::current(store, &TEMPLATE_CHAIN, &template.id).await?,
    )?;

    let resume: Resume = decode(
        store
            .create(
                "resumes",
                json!({
                    "user_id": params.owner_id,
                    "name": params.name,
                    "content": params.content,
                    "current_version_id": null,
                }),
            )
            .await?,
    )?;

    // From here on a failure strands the resume row without a pointer.
    let version = versioning::start(
        store,
        &RESUME_CHAIN,
        &resume.id,
        json!({
            "content": params.content,
            "template_version_id": template_version.id,
            "user_id": params.owner_id,
        }),
    )
    .await
    .map_err(|err| create_incomplete(&resume.id, err))?;
    let version: ResumeVersion = decode(version)?;

    let resume = decode(
        store
            .update(
                "resumes",
                &resume.id,
                json!({ "current_version_id": version.id }),
            )
            .await
            .map_err(|err| create_incomplete(&resume.id, err.into()))?,
    )?;
    Ok(resume)
}

fn create_incomplete(resume_id: &str, err: AppError) -> AppError {
    AppError::Incomplete(format!(
        "resume {resume_id} was created without a version pointer: {err}"
    ))
}

/// Resolves resume → current version → template version and returns the
/// triple the editor consumes. Fails if any link in the chain is broken.
pub async fn fetch_for_edit(
    store: &dyn RecordStore,
    resume_id: &str,
) -> Result<ResumeEditData, AppError> {
    let resume: Resume = decode(store.get_one("resumes", resume_id).await?)?;
    let version: ResumeVersion = decode(
        versioning::resolve_pointer(
            store,
            &RESUME_CHAIN,
            resume_id,
            resume.current_version_id.as_deref(),
        )
        .await?,
    )?;
    let template_version = fetch_cross_reference(store, &version).await?;

    Ok(ResumeEditData {
        name: resume.name,
        content: version.content,
        markup: template_version.markup,
    })
}

/// A version's template cross-reference, with a missing row reported as a
/// broken chain rather than a plain not-found.
async fn fetch_cross_reference(
    store: &dyn RecordStore,
    version: &ResumeVersion,
) -> Result<TemplateVersion, AppError> {
    let record = store
        .get_one("template_versions", &version.template_version_id)
        .await
        .map_err(|err| {
            if err.is_not_found() {
                AppError::BrokenChain(format!(
                    "resume version {} references missing template version {}",
                    version.id, version.template_version_id
                ))
            } else {
                err.into()
            }
        })?;
    Ok(decode(record)?)
}

/// Saves an edit by appending to the resume chain, forking the template
/// chain first when the markup changed.
///
/// A markup change appends a new template version but does not repoint the
/// template's own pointer: the published template is independent of
/// per-resume edits, and only the new resume version carries the fork.
/// The two appends are sequential, not atomic as a pair.
pub async fn save_edit(
    store: &dyn RecordStore,
    resume_id: &str,
    edit: ResumeEdit,
) -> Result<ResumeVersion, AppError> {
    let resume: Resume = decode(store.get_one("resumes", resume_id).await?)?;

    if let Some(expected) = &edit.expected_current_version_id {
        if resume.current_version_id.as_deref() != Some(expected.as_str()) {
            return Err(AppError::Conflict(format!(
                "resume {resume_id} no longer points at version {expected}"
            )));
        }
    }

    let current: ResumeVersion = decode(
        versioning::resolve_pointer(
            store,
            &RESUME_CHAIN,
            resume_id,
            resume.current_version_id.as_deref(),
        )
        .await?,
    )?;
    let current_template_version = fetch_cross_reference(store, &current).await?;

    let template_version_id = match edit.markup {
        Some(markup) if markup != current_template_version.markup => {
            let forked: TemplateVersion = decode(
                versioning::extend(
                    store,
                    &TEMPLATE_CHAIN,
                    &current_template_version.template_id,
                    json!({ "markup": markup }),
                )
                .await?,
            )?;
            forked.id
        }
        _ => current_template_version.id,
    };

    let content = match edit.content {
        Some(content) => content,
        None => current.content.clone(),
    };

    let new_version: ResumeVersion = decode(
        versioning::extend(
            store,
            &RESUME_CHAIN,
            &resume.id,
            json!({
                "content": content,
                "template_version_id": template_version_id,
                "user_id": resume.owner_id,
            }),
        )
        .await?,
    )?;

    store
        .update(
            "resumes",
            &resume.id,
            json!({
                "name": edit.name.unwrap_or(resume.name),
                "content": content,
                "current_version_id": new_version.id,
            }),
        )
        .await
        .map_err(|err| {
            AppError::Incomplete(format!(
                "resume version {} was written but resume {resume_id} still points at \
                 the previous version: {err}",
                new_version.id
            ))
        })?;

    Ok(new_version)
}

/// Copies a resume for a new owner. The copy's version 1 references the
/// same template version as the source's current version: template
/// versions are shared by reference across resumes, never deep-copied.
pub async fn duplicate_resume(
    store: &dyn RecordStore,
    source_id: &str,
    params: DuplicateResume,
) -> Result<Resume, AppError> {
    let source: Resume = decode(store.get_one("resumes", source_id).await?)?;
    let source_version: ResumeVersion = decode(
        versioning::resolve_pointer(
            store,
            &RESUME_CHAIN,
            source_id,
            source.current_version_id.as_deref(),
        )
        .await?,
    )?;
    // Confirm the cross-reference still resolves before writing anything.
    let template_version = fetch_cross_reference(store, &source_version).await?;

    let name = params
        .name
        .unwrap_or_else(|| format!("{} (Copy)", source.name));
    let content = params.content.unwrap_or_else(|| source_version.content.clone());

    let resume: Resume = decode(
        store
            .create(
                "resumes",
                json!({
                    "user_id": params.owner_id,
                    "name": name,
                    "content": content,
                    "current_version_id": null,
                }),
            )
            .await?,
    )?;

    let version = versioning::start(
        store,
        &RESUME_CHAIN,
        &resume.id,
        json!({
            "content": content,
            "template_version_id": template_version.id,
            "user_id": params.owner_id,
        }),
    )
    .await
    .map_err(|err| create_incomplete(&resume.id, err))?;
    let version: ResumeVersion = decode(version)?;

    let resume = decode(
        store
            .update(
                "resumes",
                &resume.id,
                json!({ "current_version_id": version.id }),
            )
            .await
            .map_err(|err| create_incomplete(&resume.id, err.into()))?,
    )?;
    Ok(resume)
}

/// Deletes the resume row only. Its version rows stay fetchable by id;
/// reclaiming orphans is explicitly out of scope.
pub async fn delete_resume(store: &dyn RecordStore, resume_id: &str) -> Result<(), AppError> {
    Ok(store.delete("resumes", resume_id).await?)
}

/// The owner's resumes, first page of 50.
pub async fn list_resumes(
    store: &dyn RecordStore,
    owner_id: &str,
) -> Result<Vec<Resume>, AppError> {
    let items = store
        .get_list(
            "resumes",
            1,
            50,
            ListOptions {
                filter: Some(filter::eq("user_id", owner_id)),
                sort: None,
            },
        )
        .await?;
    items.into_iter().map(|record| Ok(decode(record)?)).collect()
}

/// A resume's version chain, newest first. Fails NotFound for an unknown
/// resume rather than returning an empty chain.
pub async fn version_history(
    store: &dyn RecordStore,
    resume_id: &str,
) -> Result<Vec<ResumeVersion>, AppError> {
    store.get_one("resumes", resume_id).await?;
    let rows = versioning::history(store, &RESUME_CHAIN, resume_id).await?;
    rows.into_iter().map(|record| Ok(decode(record)?)).collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::memory::MemoryRecordStore;

    fn new_resume(owner: &str, name: &str, content: Value) -> NewResume {
        NewResume {
            owner_id: owner.to_string(),
            name: name.to_string(),
            content,
            template_id: None,
        }
    }

    fn unchanged() -> ResumeEdit {
        ResumeEdit {
            name: None,
            content: None,
            markup: None,
            expected_current_version_id: None,
        }
    }

    async fn chain_len(store: &MemoryRecordStore, collection: &str, field: &str, id: &str) -> usize {
        store
            .get_list(
                collection,
                1,
                50,
                ListOptions {
                    filter: Some(filter::eq(field, id)),
                    sort: None,
                },
            )
            .await
            .unwrap()
            .len()
    }

    #[tokio::test]
    async fn test_create_without_template_seeds_default_chain() {
        let store = MemoryRecordStore::new();

        let resume = create_resume(&store, new_resume("u1", "First CV", json!({ "x": 1 })))
            .await
            .unwrap();
        assert_eq!(resume.owner_id, "u1");

        let edit = fetch_for_edit(&store, &resume.id).await.unwrap();
        assert_eq!(edit.name, "First CV");
        assert_eq!(edit.content, json!({ "x": 1 }));
        assert_eq!(edit.markup, templates::PLACEHOLDER_MARKUP);
    }

    #[tokio::test]
    async fn test_create_points_at_version_one_with_live_cross_reference() {
        let store = MemoryRecordStore::new();

        let resume = create_resume(&store, new_resume("u1", "CV", json!({})))
            .await
            .unwrap();

        let current: ResumeVersion = decode(
            versioning::current(&store, &RESUME_CHAIN, &resume.id).await.unwrap(),
        )
        .unwrap();
        assert_eq!(current.version, 1);
        assert_eq!(resume.current_version_id.as_deref(), Some(current.id.as_str()));

        // The cross-reference must resolve to an existing template version.
        store
            .get_one("template_versions", &current.template_version_id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_with_explicit_template() {
        let store = MemoryRecordStore::new();
        let template = templates::default_for_owner(&store, "u1").await.unwrap();

        let resume = create_resume(
            &store,
            NewResume {
                owner_id: "u2".to_string(),
                name: "Borrowed".to_string(),
                content: json!({}),
                template_id: Some(template.id.clone()),
            },
        )
        .await
        .unwrap();

        let current: ResumeVersion = decode(
            versioning::current(&store, &RESUME_CHAIN, &resume.id).await.unwrap(),
        )
        .unwrap();
        assert_eq!(
            Some(current.template_version_id.as_str()),
            template.current_version_id.as_deref()
        );
        // No second template was created for u2.
        let templates_count = store
            .get_list("templates", 1, 50, Default::default())
            .await
            .unwrap()
            .len();
        assert_eq!(templates_count, 1);
    }

    #[tokio::test]
    async fn test_save_with_unchanged_markup_only_extends_resume_chain() {
        let store = MemoryRecordStore::new();
        let resume = create_resume(&store, new_resume("u1", "CV", json!({ "x": 1 })))
            .await
            .unwrap();
        let template_id = {
            let all = store.get_list("templates", 1, 50, Default::default()).await.unwrap();
            all[0].get("id").unwrap().as_str().unwrap().to_string()
        };

        let v2 = save_edit(
            &store,
            &resume.id,
            ResumeEdit {
                content: Some(json!({ "x": 2 })),
                ..unchanged()
            },
        )
        .await
        .unwrap();
        assert_eq!(v2.version, 2);

        assert_eq!(chain_len(&store, "resume_versions", "resume_id", &resume.id).await, 2);
        assert_eq!(
            chain_len(&store, "template_versions", "template_id", &template_id).await,
            1
        );

        // Version 2 keeps version 1's cross-reference.
        let history = version_history(&store, &resume.id).await.unwrap();
        assert_eq!(history[0].template_version_id, history[1].template_version_id);
    }

    #[tokio::test]
    async fn test_save_with_changed_markup_forks_template_chain() {
        let store = MemoryRecordStore::new();
        let resume = create_resume(&store, new_resume("u1", "CV", json!({})))
            .await
            .unwrap();
        let template: Template = decode(
            store
                .get_list("templates", 1, 50, Default::default())
                .await
                .unwrap()
                .remove(0),
        )
        .unwrap();
        let original_pointer = template.current_version_id.clone();

        let v2 = save_edit(
            &store,
            &resume.id,
            ResumeEdit {
                markup: Some("<section>{{content}}</section>".to_string()),
                ..unchanged()
            },
        )
        .await
        .unwrap();

        assert_eq!(
            chain_len(&store, "template_versions", "template_id", &template.id).await,
            2
        );

        let forked: TemplateVersion = decode(
            store
                .get_one("template_versions", &v2.template_version_id)
                .await
                .unwrap(),
        )
        .unwrap();
        assert_eq!(forked.version, 2);
        assert_eq!(forked.markup, "<section>{{content}}</section>");

        // The template's own published pointer is independent of the edit.
        let template_after: Template =
            decode(store.get_one("templates", &template.id).await.unwrap()).unwrap();
        assert_eq!(template_after.current_version_id, original_pointer);
    }

    #[tokio::test]
    async fn test_save_with_identical_markup_does_not_fork() {
        let store = MemoryRecordStore::new();
        let resume = create_resume(&store, new_resume("u1", "CV", json!({})))
            .await
            .unwrap();

        let v2 = save_edit(
            &store,
            &resume.id,
            ResumeEdit {
                markup: Some(templates::PLACEHOLDER_MARKUP.to_string()),
                ..unchanged()
            },
        )
        .await
        .unwrap();

        let v1 = version_history(&store, &resume.id).await.unwrap().pop().unwrap();
        assert_eq!(v2.template_version_id, v1.template_version_id);
    }

    #[tokio::test]
    async fn test_save_updates_resume_name_and_pointer() {
        let store = MemoryRecordStore::new();
        let resume = create_resume(&store, new_resume("u1", "Old name", json!({})))
            .await
            .unwrap();

        let v2 = save_edit(
            &store,
            &resume.id,
            ResumeEdit {
                name: Some("New name".to_string()),
                content: Some(json!({ "x": 2 })),
                ..unchanged()
            },
        )
        .await
        .unwrap();

        let after: Resume = decode(store.get_one("resumes", &resume.id).await.unwrap()).unwrap();
        assert_eq!(after.name, "New name");
        assert_eq!(after.content, json!({ "x": 2 }));
        assert_eq!(after.current_version_id.as_deref(), Some(v2.id.as_str()));
    }

    #[tokio::test]
    async fn test_save_with_stale_expected_version_conflicts_without_writing() {
        let store = MemoryRecordStore::new();
        let resume = create_resume(&store, new_resume("u1", "CV", json!({})))
            .await
            .unwrap();

        let err = save_edit(
            &store,
            &resume.id,
            ResumeEdit {
                content: Some(json!({ "x": 9 })),
                expected_current_version_id: Some("stale".to_string()),
                ..unchanged()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        assert_eq!(chain_len(&store, "resume_versions", "resume_id", &resume.id).await, 1);
    }

    #[tokio::test]
    async fn test_save_with_matching_expected_version_proceeds() {
        let store = MemoryRecordStore::new();
        let resume = create_resume(&store, new_resume("u1", "CV", json!({})))
            .await
            .unwrap();

        let v2 = save_edit(
            &store,
            &resume.id,
            ResumeEdit {
                content: Some(json!({ "x": 2 })),
                expected_current_version_id: resume.current_version_id.clone(),
                ..unchanged()
            },
        )
        .await
        .unwrap();
        assert_eq!(v2.version, 2);
    }

    #[tokio::test]
    async fn test_save_on_resume_without_pointer_is_broken_chain() {
        let store = MemoryRecordStore::new();
        let stranded = store
            .create(
                "resumes",
                json!({ "user_id": "u1", "name": "stranded", "current_version_id": null }),
            )
            .await
            .unwrap();
        let id = stranded.get("id").unwrap().as_str().unwrap();

        let err = save_edit(&store, id, unchanged()).await.unwrap_err();
        assert!(matches!(err, AppError::BrokenChain(_)));
    }

    #[tokio::test]
    async fn test_duplicate_shares_template_version_by_reference() {
        let store = MemoryRecordStore::new();
        let source = create_resume(&store, new_resume("u1", "Mine", json!({ "x": 1 })))
            .await
            .unwrap();
        let source_version: ResumeVersion = decode(
            versioning::current(&store, &RESUME_CHAIN, &source.id).await.unwrap(),
        )
        .unwrap();

        let copy = duplicate_resume(
            &store,
            &source.id,
            DuplicateResume {
                owner_id: "u2".to_string(),
                name: None,
                content: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(copy.owner_id, "u2");
        assert_eq!(copy.name, "Mine (Copy)");

        let copy_version: ResumeVersion = decode(
            versioning::current(&store, &RESUME_CHAIN, &copy.id).await.unwrap(),
        )
        .unwrap();
        assert_eq!(copy_version.version, 1);
        assert_eq!(copy_version.content, json!({ "x": 1 }));
        // Identity equality of the cross-reference, not a copy.
        assert_eq!(copy_version.template_version_id, source_version.template_version_id);
    }

    #[tokio::test]
    async fn test_duplicate_accepts_overrides() {
        let store = MemoryRecordStore::new();
        let source = create_resume(&store, new_resume("u1", "Mine", json!({ "x": 1 })))
            .await
            .unwrap();

        let copy = duplicate_resume(
            &store,
            &source.id,
            DuplicateResume {
                owner_id: "u2".to_string(),
                name: Some("Fresh start".to_string()),
                content: Some(json!({ "x": 2 })),
            },
        )
        .await
        .unwrap();
        assert_eq!(copy.name, "Fresh start");
        assert_eq!(copy.content, json!({ "x": 2 }));
    }

    #[tokio::test]
    async fn test_delete_leaves_version_rows_fetchable() {
        let store = MemoryRecordStore::new();
        let resume = create_resume(&store, new_resume("u1", "CV", json!({})))
            .await
            .unwrap();
        let version_id = resume.current_version_id.clone().unwrap();

        delete_resume(&store, &resume.id).await.unwrap();

        let err = store.get_one("resumes", &resume.id).await.unwrap_err();
        assert!(err.is_not_found());
        // The orphaned version row stays.
        store.get_one("resume_versions", &version_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_resumes_is_scoped_to_owner() {
        let store = MemoryRecordStore::new();
        create_resume(&store, new_resume("u1", "A", json!({}))).await.unwrap();
        create_resume(&store, new_resume("u1", "B", json!({}))).await.unwrap();
        create_resume(&store, new_resume("u2", "C", json!({}))).await.unwrap();

        let mine = list_resumes(&store, "u1").await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|r| r.owner_id == "u1"));
    }

    #[tokio::test]
    async fn test_version_history_is_newest_first() {
        let store = MemoryRecordStore::new();
        let resume = create_resume(&store, new_resume("u1", "CV", json!({})))
            .await
            .unwrap();
        for x in 2..=4 {
            save_edit(
                &store,
                &resume.id,
                ResumeEdit { content: Some(json!({ "x": x })), ..unchanged() },
            )
            .await
            .unwrap();
        }

        let history = version_history(&store, &resume.id).await.unwrap();
        let numbers: Vec<i64> = history.iter().map(|v| v.version).collect();
        assert_eq!(numbers, vec![4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn test_version_history_of_unknown_resume_is_not_found() {
        let store = MemoryRecordStore::new();
        let err = version_history(&store, "nope").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_parse_content_accepts_valid_json() {
        assert_eq!(parse_content("{\"x\":1}"), json!({ "x": 1 }));
    }

    #[test]
    fn test_parse_content_substitutes_empty_document() {
        assert_eq!(parse_content("not json"), json!({}));
        assert_eq!(parse_content(""), json!({}));
    }
}
