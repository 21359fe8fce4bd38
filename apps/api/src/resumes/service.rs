//! Résumé operations on top of a [`ResumeStore`].

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::errors::AppError;
use crate::models::resume::{NewResume, ResumeRow};
use crate::models::sections::field_messages;
use crate::resumes::formsets::{plan_save, EditRequest, SavePlan};
use crate::resumes::versions::VersionGraph;
use crate::store::{ResumeDocument, ResumeStore};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateResumeRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    pub resume: ResumeRow,
    /// True when a new version was created.
    pub forked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionHistory {
    pub resume: ResumeRow,
    pub versions: Vec<ResumeRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub resumes: Vec<ResumeRow>,
    pub default_resume: Option<ResumeRow>,
    pub resume_count: usize,
    /// Every default résumé when the owner has more than one.
    pub default_conflicts: Vec<Uuid>,
}

/// Access-controlled lookup.
pub async fn find_owned(
    store: &dyn ResumeStore,
    id: Uuid,
    owner: Uuid,
) -> Result<ResumeRow, AppError> {
    store
        .find_owned(id, owner)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))
}

/// Creates a résumé; an owner's first résumé becomes their default.
pub async fn create_resume(
    store: &dyn ResumeStore,
    owner: Uuid,
    request: CreateResumeRequest,
) -> Result<ResumeRow, AppError> {
    let request = CreateResumeRequest {
        title: request.title.trim().to_string(),
    };
    if let Err(e) = request.validate() {
        let fields = field_messages(&e)
            .into_iter()
            .map(|(field, codes)| format!("{field}: {}", codes.join(", ")))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(AppError::Validation(fields));
    }

    let is_first = store.count_by_owner(owner).await? == 0;
    let resume = store
        .create_resume(NewResume::first_version(owner, request.title, is_first))
        .await?;

    info!(
        "Created resume {} for user {owner} (default: {})",
        resume.id, resume.is_default
    );
    Ok(resume)
}

pub async fn list_resumes(store: &dyn ResumeStore, owner: Uuid) -> Result<Vec<ResumeRow>, AppError> {
    Ok(store.list_by_owner(owner).await?)
}

pub async fn get_document(
    store: &dyn ResumeStore,
    id: Uuid,
    owner: Uuid,
) -> Result<ResumeDocument, AppError> {
    let resume = find_owned(store, id, owner).await?;
    Ok(store.load_document(resume).await?)
}

/// Saves an edit in place, or forks a new version when `save_as_new` is set.
///
/// All five sub-forms are validated before anything is written.
pub async fn save_edit(
    store: &dyn ResumeStore,
    id: Uuid,
    owner: Uuid,
    request: EditRequest,
) -> Result<SaveOutcome, AppError> {
    let current = get_document(store, id, owner).await?;

    let plan = plan_save(&current, request).map_err(|errors| {
        warn!("Rejected edit of resume {id}: {errors}");
        AppError::InvalidForms(errors)
    })?;

    match plan {
        SavePlan::InPlace { resume_id, plan } => {
            let resume = store.apply_in_place(resume_id, &plan).await?;
            info!("Updated resume {resume_id} in place (v{})", resume.version);
            Ok(SaveOutcome {
                resume,
                forked: false,
            })
        }
        SavePlan::Fork(plan) => {
            let resume = store.insert_fork(&plan).await?;
            info!(
                "Forked resume {id} v{} into {} v{}",
                current.resume.version, resume.id, resume.version
            );
            Ok(SaveOutcome {
                resume,
                forked: true,
            })
        }
    }
}

/// Deletes an owned résumé, returning the row as it was.
pub async fn delete_resume(
    store: &dyn ResumeStore,
    id: Uuid,
    owner: Uuid,
) -> Result<ResumeRow, AppError> {
    let resume = find_owned(store, id, owner).await?;
    if !store.delete_resume(id, owner).await? {
        return Err(AppError::NotFound(format!("Resume {id} not found")));
    }
    info!("Deleted resume {id} for user {owner}");
    Ok(resume)
}

pub async fn version_history(
    store: &dyn ResumeStore,
    id: Uuid,
    owner: Uuid,
    limit: usize,
) -> Result<VersionHistory, AppError> {
    let resume = find_owned(store, id, owner).await?;
    let graph = VersionGraph::new(store.list_by_owner(owner).await?);
    let versions = graph.chain_from(resume.id, limit)?;
    Ok(VersionHistory { resume, versions })
}

/// Owner overview. Multiple defaults are reported, not repaired.
pub async fn dashboard(store: &dyn ResumeStore, owner: Uuid) -> Result<Dashboard, AppError> {
    let resumes = store.list_by_owner(owner).await?;
    let defaults: Vec<Uuid> = resumes
        .iter()
        .filter(|r| r.is_default)
        .map(|r| r.id)
        .collect();
    let default_conflicts = if defaults.len() > 1 {
        warn!(
            "User {owner} has {} default resumes: {defaults:?}",
            defaults.len()
        );
        defaults
    } else {
        Vec::new()
    };
    let default_resume = resumes.iter().find(|r| r.is_default).cloned();

    Ok(Dashboard {
        resume_count: resumes.len(),
        default_resume,
        default_conflicts,
        resumes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sections::{PersonalDetails, Section, Skill};
    use crate::resumes::formsets::FormsetEntry;
    use crate::resumes::versions::DEFAULT_CHAIN_LIMIT;
    use crate::store::MemoryResumeStore;

    fn create(title: &str) -> CreateResumeRequest {
        CreateResumeRequest {
            title: title.to_string(),
        }
    }

    fn details(name: &str) -> PersonalDetails {
        PersonalDetails {
            full_name: name.to_string(),
            email: "alan@example.com".to_string(),
            ..PersonalDetails::default()
        }
    }

    fn skill_entry(id: Option<Uuid>, delete: bool, name: &str) -> FormsetEntry<Skill> {
        FormsetEntry {
            id,
            delete,
            data: Skill {
                name: name.to_string(),
                level: None,
            },
        }
    }

    fn edit(save_as_new: bool, skills: Vec<FormsetEntry<Skill>>) -> EditRequest {
        EditRequest {
            save_as_new,
            personal_details: details("Alan Turing"),
            education: vec![],
            experience: vec![],
            skills,
            projects: vec![],
        }
    }

    #[tokio::test]
    async fn test_first_resume_is_default_second_is_not() {
        let store = MemoryResumeStore::new();
        let owner = Uuid::new_v4();
        let first = create_resume(&store, owner, create("First")).await.unwrap();
        let second = create_resume(&store, owner, create("Second")).await.unwrap();
        assert!(first.is_default);
        assert!(!second.is_default);

        let other = create_resume(&store, Uuid::new_v4(), create("Other")).await.unwrap();
        assert!(other.is_default);
    }

    #[tokio::test]
    async fn test_create_rejects_blank_title() {
        let store = MemoryResumeStore::new();
        let result = create_resume(&store, Uuid::new_v4(), create("   ")).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        let result = create_resume(&store, Uuid::new_v4(), create(&"x".repeat(201))).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_fork_scenario_title_version_and_chain() {
        let store = MemoryResumeStore::new();
        let owner = Uuid::new_v4();
        let v1 = create_resume(&store, owner, create("A")).await.unwrap();

        let outcome = save_edit(&store, v1.id, owner, edit(true, vec![]))
            .await
            .unwrap();
        assert!(outcome.forked);
        let v2 = outcome.resume;
        assert_eq!(v2.title, "A (Copy)");
        assert_eq!(v2.version, 2);
        assert_eq!(v2.previous_version, Some(v1.id));
        assert_ne!(v2.id, v1.id);

        let history = version_history(&store, v2.id, owner, DEFAULT_CHAIN_LIMIT)
            .await
            .unwrap();
        let ids: Vec<Uuid> = history.versions.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![v2.id, v1.id]);
    }

    #[tokio::test]
    async fn test_fork_leaves_original_untouched() {
        let store = MemoryResumeStore::new();
        let owner = Uuid::new_v4();
        let v1 = create_resume(&store, owner, create("A")).await.unwrap();
        save_edit(
            &store,
            v1.id,
            owner,
            edit(false, vec![skill_entry(None, false, "Rust"), skill_entry(None, false, "Go")]),
        )
        .await
        .unwrap();
        let before = get_document(&store, v1.id, owner).await.unwrap();
        let go = before.skills[1].id;

        let forked = save_edit(
            &store,
            v1.id,
            owner,
            edit(true, vec![skill_entry(Some(go), true, "Go")]),
        )
        .await
        .unwrap()
        .resume;

        let after = get_document(&store, v1.id, owner).await.unwrap();
        assert_eq!(before, after);

        let copy = get_document(&store, forked.id, owner).await.unwrap();
        assert_eq!(copy.skills.len(), 1);
        assert_eq!(copy.skills[0].data.name, "Rust");
        assert_ne!(copy.skills[0].id, before.skills[0].id);
        assert_eq!(copy.skills[0].resume_id, forked.id);
        assert_eq!(copy.personal_details, details("Alan Turing"));
    }

    #[tokio::test]
    async fn test_in_place_delete_removes_row_and_keeps_identity() {
        let store = MemoryResumeStore::new();
        let owner = Uuid::new_v4();
        let v1 = create_resume(&store, owner, create("A")).await.unwrap();
        save_edit(&store, v1.id, owner, edit(false, vec![skill_entry(None, false, "Rust")]))
            .await
            .unwrap();
        let doc = get_document(&store, v1.id, owner).await.unwrap();
        let rust = doc.skills[0].id;

        let outcome = save_edit(
            &store,
            v1.id,
            owner,
            edit(false, vec![skill_entry(Some(rust), true, "Rust")]),
        )
        .await
        .unwrap();
        assert!(!outcome.forked);
        assert_eq!(outcome.resume.id, v1.id);
        assert_eq!(outcome.resume.version, 1);
        assert_eq!(outcome.resume.title, "A");
        assert!(outcome.resume.updated_at > doc.resume.updated_at);

        let doc = get_document(&store, v1.id, owner).await.unwrap();
        assert!(doc.skills.is_empty());
        assert_eq!(store.count_by_owner(owner).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_sub_form_persists_nothing() {
        let store = MemoryResumeStore::new();
        let owner = Uuid::new_v4();
        let v1 = create_resume(&store, owner, create("A")).await.unwrap();
        let before = get_document(&store, v1.id, owner).await.unwrap();

        let mut request = edit(true, vec![skill_entry(None, false, "Rust")]);
        request.personal_details.email = "broken".to_string();
        let result = save_edit(&store, v1.id, owner, request).await;

        let Err(AppError::InvalidForms(errors)) = result else {
            panic!("expected invalid forms");
        };
        assert!(errors.section(Section::PersonalDetails).is_some());
        assert!(errors.section(Section::Skills).is_none());
        assert_eq!(store.count_by_owner(owner).await.unwrap(), 1);
        assert_eq!(get_document(&store, v1.id, owner).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_other_owner_cannot_edit_or_delete() {
        let store = MemoryResumeStore::new();
        let owner = Uuid::new_v4();
        let intruder = Uuid::new_v4();
        let v1 = create_resume(&store, owner, create("A")).await.unwrap();

        let result = save_edit(&store, v1.id, intruder, edit(true, vec![])).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        let result = delete_resume(&store, v1.id, intruder).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(store.count_by_owner(owner).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_repeated_forks_grow_the_chain() {
        let store = MemoryResumeStore::new();
        let owner = Uuid::new_v4();
        let mut tip = create_resume(&store, owner, create("A")).await.unwrap();
        for _ in 0..3 {
            tip = save_edit(&store, tip.id, owner, edit(true, vec![]))
                .await
                .unwrap()
                .resume;
        }
        assert_eq!(tip.version, 4);
        assert_eq!(tip.title, "A (Copy) (Copy) (Copy)");

        let history = version_history(&store, tip.id, owner, DEFAULT_CHAIN_LIMIT)
            .await
            .unwrap();
        let versions: Vec<i32> = history.versions.iter().map(|r| r.version).collect();
        assert_eq!(versions, vec![4, 3, 2, 1]);

        let result = version_history(&store, tip.id, owner, 2).await;
        assert!(matches!(result, Err(AppError::VersionChain(_))));
    }

    #[tokio::test]
    async fn test_dashboard_flags_multiple_defaults() {
        let store = MemoryResumeStore::new();
        let owner = Uuid::new_v4();
        let v1 = create_resume(&store, owner, create("A")).await.unwrap();
        create_resume(&store, owner, create("B")).await.unwrap();

        let summary = dashboard(&store, owner).await.unwrap();
        assert_eq!(summary.resume_count, 2);
        assert_eq!(summary.default_resume.as_ref().map(|r| r.id), Some(v1.id));
        assert!(summary.default_conflicts.is_empty());

        // Forks copy the default flag.
        let v2 = save_edit(&store, v1.id, owner, edit(true, vec![]))
            .await
            .unwrap()
            .resume;
        let summary = dashboard(&store, owner).await.unwrap();
        assert_eq!(summary.resume_count, 3);
        assert_eq!(summary.default_conflicts.len(), 2);
        assert!(summary.default_conflicts.contains(&v1.id));
        assert!(summary.default_conflicts.contains(&v2.id));
    }

    #[tokio::test]
    async fn test_delete_makes_successor_a_chain_root() {
        let store = MemoryResumeStore::new();
        let owner = Uuid::new_v4();
        let v1 = create_resume(&store, owner, create("A")).await.unwrap();
        let v2 = save_edit(&store, v1.id, owner, edit(true, vec![]))
            .await
            .unwrap()
            .resume;

        let deleted = delete_resume(&store, v1.id, owner).await.unwrap();
        assert_eq!(deleted.title, "A");

        let history = version_history(&store, v2.id, owner, DEFAULT_CHAIN_LIMIT)
            .await
            .unwrap();
        assert_eq!(history.versions.len(), 1);
        assert_eq!(history.versions[0].version, 2);
    }
}
