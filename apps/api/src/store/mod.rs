//! Record store for résumés and their sections.
//!
//! `AppState` holds an `Arc<dyn ResumeStore>`: PostgreSQL when a database is
//! configured, the in-memory store otherwise (and in tests).

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::resume::{NewResume, ResumeRow};
use crate::models::sections::{ChildRow, Education, Experience, PersonalDetails, Project, Skill};
use crate::resumes::formsets::{ForkPlan, InPlacePlan};

pub use memory::MemoryResumeStore;
pub use postgres::PgResumeStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Record not found: {0}")]
    NotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A résumé with all of its section data, children in `sort_order`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResumeDocument {
    pub resume: ResumeRow,
    pub personal_details: PersonalDetails,
    pub education: Vec<ChildRow<Education>>,
    pub experience: Vec<ChildRow<Experience>>,
    pub skills: Vec<ChildRow<Skill>>,
    pub projects: Vec<ChildRow<Project>>,
}

#[async_trait]
pub trait ResumeStore: Send + Sync {
    async fn count_by_owner(&self, owner: Uuid) -> StoreResult<i64>;

    /// Inserts the résumé and its empty personal details together.
    async fn create_resume(&self, new: NewResume) -> StoreResult<ResumeRow>;

    /// Looks a résumé up by identity, only if `owner` owns it.
    async fn find_owned(&self, id: Uuid, owner: Uuid) -> StoreResult<Option<ResumeRow>>;

    /// Most recently updated first.
    async fn list_by_owner(&self, owner: Uuid) -> StoreResult<Vec<ResumeRow>>;

    async fn load_document(&self, resume: ResumeRow) -> StoreResult<ResumeDocument>;

    /// Commits an in-place edit atomically and advances `updated_at`.
    async fn apply_in_place(&self, resume_id: Uuid, plan: &InPlacePlan) -> StoreResult<ResumeRow>;

    /// Creates the forked version and copies of its children atomically.
    async fn insert_fork(&self, plan: &ForkPlan) -> StoreResult<ResumeRow>;

    /// Deletes the résumé and its children. Successors lose their predecessor link.
    async fn delete_resume(&self, id: Uuid, owner: Uuid) -> StoreResult<bool>;
}
