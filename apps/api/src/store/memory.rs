//! In-process résumé store.
//!
//! Each write works on a copy of the state and swaps it in only when every
//! step succeeded, so a failed commit leaves nothing behind.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::resume::{NewResume, ResumeRow};
use crate::models::sections::{
    ChildRow, Education, Experience, PersonalDetails, Project, SectionData, Skill,
};
use crate::resumes::formsets::{ForkPlan, InPlacePlan, RowWrite, SectionChanges};
use crate::store::{ResumeDocument, ResumeStore, StoreError, StoreResult};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    resumes: HashMap<Uuid, ResumeRow>,
    personal_details: HashMap<Uuid, PersonalDetails>,
    education: Vec<ChildRow<Education>>,
    experience: Vec<ChildRow<Experience>>,
    skills: Vec<ChildRow<Skill>>,
    projects: Vec<ChildRow<Project>>,
}

/// Selects the table of a section inside [`MemoryState`].
trait MemorySection: SectionData {
    fn table(state: &MemoryState) -> &Vec<ChildRow<Self>>;
    fn table_mut(state: &mut MemoryState) -> &mut Vec<ChildRow<Self>>;
}

impl MemorySection for Education {
    fn table(state: &MemoryState) -> &Vec<ChildRow<Self>> {
        &state.education
    }
    fn table_mut(state: &mut MemoryState) -> &mut Vec<ChildRow<Self>> {
        &mut state.education
    }
}

impl MemorySection for Experience {
    fn table(state: &MemoryState) -> &Vec<ChildRow<Self>> {
        &state.experience
    }
    fn table_mut(state: &mut MemoryState) -> &mut Vec<ChildRow<Self>> {
        &mut state.experience
    }
}

impl MemorySection for Skill {
    fn table(state: &MemoryState) -> &Vec<ChildRow<Self>> {
        &state.skills
    }
    fn table_mut(state: &mut MemoryState) -> &mut Vec<ChildRow<Self>> {
        &mut state.skills
    }
}

impl MemorySection for Project {
    fn table(state: &MemoryState) -> &Vec<ChildRow<Self>> {
        &state.projects
    }
    fn table_mut(state: &mut MemoryState) -> &mut Vec<ChildRow<Self>> {
        &mut state.projects
    }
}

#[derive(Debug, Default)]
pub struct MemoryResumeStore {
    state: RwLock<MemoryState>,
}

impl MemoryResumeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A timestamp strictly after `previous`, normally the current time.
fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

fn rows_of<T: MemorySection>(state: &MemoryState, resume_id: Uuid) -> Vec<ChildRow<T>> {
    let mut rows: Vec<ChildRow<T>> = T::table(state)
        .iter()
        .filter(|row| row.resume_id == resume_id)
        .cloned()
        .collect();
    rows.sort_by_key(|row| row.sort_order);
    rows
}

fn apply_changes<T: MemorySection>(
    state: &mut MemoryState,
    resume_id: Uuid,
    changes: &SectionChanges<T>,
) -> StoreResult<()> {
    let table = T::table_mut(state);
    for id in &changes.deletes {
        let before = table.len();
        table.retain(|row| !(row.id == *id && row.resume_id == resume_id));
        if table.len() == before {
            return Err(StoreError::NotFound(format!("{} row {id}", T::SECTION)));
        }
    }
    for write in &changes.writes {
        match write {
            RowWrite::Insert { sort_order, data } => table.push(ChildRow {
                id: Uuid::new_v4(),
                resume_id,
                sort_order: *sort_order,
                data: data.clone(),
            }),
            RowWrite::Update {
                id,
                sort_order,
                data,
            } => {
                let row = table
                    .iter_mut()
                    .find(|row| row.id == *id && row.resume_id == resume_id)
                    .ok_or_else(|| StoreError::NotFound(format!("{} row {id}", T::SECTION)))?;
                row.sort_order = *sort_order;
                row.data = data.clone();
            }
        }
    }
    Ok(())
}

fn insert_copies<T: MemorySection>(state: &mut MemoryState, resume_id: Uuid, rows: &[T]) {
    let table = T::table_mut(state);
    for (index, data) in rows.iter().enumerate() {
        table.push(ChildRow {
            id: Uuid::new_v4(),
            resume_id,
            sort_order: index as i32,
            data: data.clone(),
        });
    }
}

fn insert_resume(state: &mut MemoryState, new: &NewResume) -> ResumeRow {
    let now = Utc::now();
    let row = ResumeRow {
        id: Uuid::new_v4(),
        user_id: new.user_id,
        title: new.title.clone(),
        created_at: now,
        updated_at: now,
        is_default: new.is_default,
        version: new.version,
        previous_version: new.previous_version,
    };
    state.resumes.insert(row.id, row.clone());
    row
}

#[async_trait]
impl ResumeStore for MemoryResumeStore {
    async fn count_by_owner(&self, owner: Uuid) -> StoreResult<i64> {
        let state = self.state.read().await;
        Ok(state.resumes.values().filter(|r| r.user_id == owner).count() as i64)
    }

    async fn create_resume(&self, new: NewResume) -> StoreResult<ResumeRow> {
        let mut state = self.state.write().await;
        let row = insert_resume(&mut state, &new);
        state
            .personal_details
            .insert(row.id, PersonalDetails::default());
        Ok(row)
    }

    async fn find_owned(&self, id: Uuid, owner: Uuid) -> StoreResult<Option<ResumeRow>> {
        let state = self.state.read().await;
        Ok(state
            .resumes
            .get(&id)
            .filter(|r| r.user_id == owner)
            .cloned())
    }

    async fn list_by_owner(&self, owner: Uuid) -> StoreResult<Vec<ResumeRow>> {
        let state = self.state.read().await;
        let mut rows: Vec<ResumeRow> = state
            .resumes
            .values()
            .filter(|r| r.user_id == owner)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(rows)
    }

    async fn load_document(&self, resume: ResumeRow) -> StoreResult<ResumeDocument> {
        let state = self.state.read().await;
        let id = resume.id;
        Ok(ResumeDocument {
            personal_details: state.personal_details.get(&id).cloned().unwrap_or_default(),
            education: rows_of(&state, id),
            experience: rows_of(&state, id),
            skills: rows_of(&state, id),
            projects: rows_of(&state, id),
            resume,
        })
    }

    async fn apply_in_place(&self, resume_id: Uuid, plan: &InPlacePlan) -> StoreResult<ResumeRow> {
        let mut guard = self.state.write().await;
        let mut draft = guard.clone();

        draft
            .personal_details
            .insert(resume_id, plan.personal_details.clone());
        apply_changes(&mut draft, resume_id, &plan.education)?;
        apply_changes(&mut draft, resume_id, &plan.experience)?;
        apply_changes(&mut draft, resume_id, &plan.skills)?;
        apply_changes(&mut draft, resume_id, &plan.projects)?;

        let resume = draft
            .resumes
            .get_mut(&resume_id)
            .ok_or_else(|| StoreError::NotFound(format!("resume {resume_id}")))?;
        resume.updated_at = next_timestamp(resume.updated_at);
        let updated = resume.clone();

        *guard = draft;
        Ok(updated)
    }

    async fn insert_fork(&self, plan: &ForkPlan) -> StoreResult<ResumeRow> {
        let mut guard = self.state.write().await;
        let mut draft = guard.clone();

        if let Some(previous) = plan.resume.previous_version {
            if !draft.resumes.contains_key(&previous) {
                return Err(StoreError::NotFound(format!("resume {previous}")));
            }
        }
        let row = insert_resume(&mut draft, &plan.resume);
        draft
            .personal_details
            .insert(row.id, plan.personal_details.clone());
        insert_copies(&mut draft, row.id, &plan.education);
        insert_copies(&mut draft, row.id, &plan.experience);
        insert_copies(&mut draft, row.id, &plan.skills);
        insert_copies(&mut draft, row.id, &plan.projects);

        *guard = draft;
        Ok(row)
    }

    async fn delete_resume(&self, id: Uuid, owner: Uuid) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        if !state.resumes.get(&id).is_some_and(|r| r.user_id == owner) {
            return Ok(false);
        }
        state.resumes.remove(&id);
        state.personal_details.remove(&id);
        state.education.retain(|row| row.resume_id != id);
        state.experience.retain(|row| row.resume_id != id);
        state.skills.retain(|row| row.resume_id != id);
        state.projects.retain(|row| row.resume_id != id);
        for successor in state.resumes.values_mut() {
            if successor.previous_version == Some(id) {
                successor.previous_version = None;
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skill(name: &str) -> Skill {
        Skill {
            name: name.to_string(),
            level: None,
        }
    }

    fn empty_changes<T>() -> SectionChanges<T> {
        SectionChanges {
            deletes: vec![],
            writes: vec![],
        }
    }

    fn plan_with_skills(skills: SectionChanges<Skill>) -> InPlacePlan {
        InPlacePlan {
            personal_details: PersonalDetails {
                full_name: "Edsger Dijkstra".to_string(),
                email: "ewd@example.com".to_string(),
                ..PersonalDetails::default()
            },
            education: empty_changes(),
            experience: empty_changes(),
            skills,
            projects: empty_changes(),
        }
    }

    #[tokio::test]
    async fn test_create_adds_empty_personal_details() {
        let store = MemoryResumeStore::new();
        let owner = Uuid::new_v4();
        let row = store
            .create_resume(NewResume::first_version(owner, "CV".to_string(), true))
            .await
            .unwrap();

        let doc = store.load_document(row.clone()).await.unwrap();
        assert_eq!(doc.personal_details, PersonalDetails::default());
        assert_eq!(row.version, 1);
        assert_eq!(store.count_by_owner(owner).await.unwrap(), 1);
        assert_eq!(store.count_by_owner(Uuid::new_v4()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_find_owned_hides_other_owners() {
        let store = MemoryResumeStore::new();
        let owner = Uuid::new_v4();
        let row = store
            .create_resume(NewResume::first_version(owner, "CV".to_string(), true))
            .await
            .unwrap();
        assert!(store.find_owned(row.id, owner).await.unwrap().is_some());
        assert!(store.find_owned(row.id, Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_in_place_advances_updated_at_only() {
        let store = MemoryResumeStore::new();
        let owner = Uuid::new_v4();
        let row = store
            .create_resume(NewResume::first_version(owner, "CV".to_string(), true))
            .await
            .unwrap();

        let changes = SectionChanges {
            deletes: vec![],
            writes: vec![RowWrite::Insert {
                sort_order: 0,
                data: skill("Rust"),
            }],
        };
        let updated = store
            .apply_in_place(row.id, &plan_with_skills(changes))
            .await
            .unwrap();

        assert!(updated.updated_at > row.updated_at);
        assert_eq!(updated.id, row.id);
        assert_eq!(updated.version, row.version);
        assert_eq!(updated.created_at, row.created_at);
        let doc = store.load_document(updated).await.unwrap();
        assert_eq!(doc.skills.len(), 1);
        assert_eq!(doc.personal_details.full_name, "Edsger Dijkstra");
    }

    #[tokio::test]
    async fn test_failed_in_place_commit_rolls_back() {
        let store = MemoryResumeStore::new();
        let owner = Uuid::new_v4();
        let row = store
            .create_resume(NewResume::first_version(owner, "CV".to_string(), true))
            .await
            .unwrap();

        let changes = SectionChanges {
            deletes: vec![],
            writes: vec![
                RowWrite::Insert {
                    sort_order: 0,
                    data: skill("Rust"),
                },
                RowWrite::Update {
                    id: Uuid::new_v4(),
                    sort_order: 1,
                    data: skill("Ghost"),
                },
            ],
        };
        let result = store.apply_in_place(row.id, &plan_with_skills(changes)).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));

        let doc = store.load_document(row.clone()).await.unwrap();
        assert!(doc.skills.is_empty());
        assert_eq!(doc.personal_details, PersonalDetails::default());
        let unchanged = store.find_owned(row.id, owner).await.unwrap().unwrap();
        assert_eq!(unchanged, row);
    }

    #[tokio::test]
    async fn test_delete_clears_successor_link() {
        let store = MemoryResumeStore::new();
        let owner = Uuid::new_v4();
        let v1 = store
            .create_resume(NewResume::first_version(owner, "CV".to_string(), true))
            .await
            .unwrap();
        let plan = ForkPlan {
            resume: NewResume {
                user_id: owner,
                title: "CV (Copy)".to_string(),
                is_default: true,
                version: 2,
                previous_version: Some(v1.id),
            },
            personal_details: PersonalDetails::default(),
            education: vec![],
            experience: vec![],
            skills: vec![skill("Rust")],
            projects: vec![],
        };
        let v2 = store.insert_fork(&plan).await.unwrap();

        assert!(!store.delete_resume(v1.id, Uuid::new_v4()).await.unwrap());
        assert!(store.delete_resume(v1.id, owner).await.unwrap());

        let v2 = store.find_owned(v2.id, owner).await.unwrap().unwrap();
        assert_eq!(v2.previous_version, None);
        assert_eq!(v2.version, 2);
        let doc = store.load_document(v2).await.unwrap();
        assert_eq!(doc.skills.len(), 1);
    }

    #[tokio::test]
    async fn test_fork_of_missing_predecessor_fails() {
        let store = MemoryResumeStore::new();
        let plan = ForkPlan {
            resume: NewResume {
                user_id: Uuid::new_v4(),
                title: "Orphan (Copy)".to_string(),
                is_default: false,
                version: 2,
                previous_version: Some(Uuid::new_v4()),
            },
            personal_details: PersonalDetails::default(),
            education: vec![],
            experience: vec![],
            skills: vec![],
            projects: vec![],
        };
        assert!(store.insert_fork(&plan).await.is_err());
    }
}
