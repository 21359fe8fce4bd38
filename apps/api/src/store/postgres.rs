use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use crate::models::resume::{NewResume, ResumeRow};
use crate::models::sections::{
    ChildRow, Education, Experience, PersonalDetails, Project, SectionData, Skill,
};
use crate::resumes::formsets::{ForkPlan, InPlacePlan, RowWrite, SectionChanges};
use crate::store::{ResumeDocument, ResumeStore, StoreError, StoreResult};

const RESUME_COLUMNS: &str =
    "id, user_id, title, created_at, updated_at, is_default, version, previous_version";

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// Table layout of a section. Columns are bound in `COLUMNS` order.
trait PgSection: SectionData + for<'r> FromRow<'r, PgRow> {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];

    fn bind_fields<'q>(&'q self, query: PgQuery<'q>) -> PgQuery<'q>;
}

impl PgSection for Education {
    const TABLE: &'static str = "education";
    const COLUMNS: &'static [&'static str] = &[
        "institution",
        "degree",
        "field_of_study",
        "start_date",
        "end_date",
        "current",
        "description",
    ];

    fn bind_fields<'q>(&'q self, query: PgQuery<'q>) -> PgQuery<'q> {
        query
            .bind(&self.institution)
            .bind(&self.degree)
            .bind(&self.field_of_study)
            .bind(self.start_date)
            .bind(self.end_date)
            .bind(self.current)
            .bind(&self.description)
    }
}

impl PgSection for Experience {
    const TABLE: &'static str = "experience";
    const COLUMNS: &'static [&'static str] = &[
        "company",
        "position",
        "start_date",
        "end_date",
        "current",
        "description",
    ];

    fn bind_fields<'q>(&'q self, query: PgQuery<'q>) -> PgQuery<'q> {
        query
            .bind(&self.company)
            .bind(&self.position)
            .bind(self.start_date)
            .bind(self.end_date)
            .bind(self.current)
            .bind(&self.description)
    }
}

impl PgSection for Skill {
    const TABLE: &'static str = "skills";
    const COLUMNS: &'static [&'static str] = &["name", "level"];

    fn bind_fields<'q>(&'q self, query: PgQuery<'q>) -> PgQuery<'q> {
        query.bind(&self.name).bind(self.level)
    }
}

impl PgSection for Project {
    const TABLE: &'static str = "projects";
    const COLUMNS: &'static [&'static str] =
        &["name", "description", "url", "start_date", "end_date"];

    fn bind_fields<'q>(&'q self, query: PgQuery<'q>) -> PgQuery<'q> {
        query
            .bind(&self.name)
            .bind(&self.description)
            .bind(&self.url)
            .bind(self.start_date)
            .bind(self.end_date)
    }
}

impl<'r, T> FromRow<'r, PgRow> for ChildRow<T>
where
    T: FromRow<'r, PgRow>,
{
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ChildRow {
            id: row.try_get("id")?,
            resume_id: row.try_get("resume_id")?,
            sort_order: row.try_get("sort_order")?,
            data: T::from_row(row)?,
        })
    }
}

fn quoted_columns<T: PgSection>() -> String {
    T::COLUMNS
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

async fn fetch_rows<T: PgSection>(pool: &PgPool, resume_id: Uuid) -> StoreResult<Vec<ChildRow<T>>> {
    let query = format!(
        "SELECT id, resume_id, sort_order, {} FROM {} WHERE resume_id = $1 ORDER BY sort_order, id",
        quoted_columns::<T>(),
        T::TABLE
    );
    Ok(sqlx::query_as::<_, ChildRow<T>>(&query)
        .bind(resume_id)
        .fetch_all(pool)
        .await?)
}

async fn insert_row<T: PgSection>(
    conn: &mut PgConnection,
    resume_id: Uuid,
    sort_order: i32,
    data: &T,
) -> StoreResult<()> {
    let placeholders = (0..T::COLUMNS.len())
        .map(|i| format!("${}", i + 4))
        .collect::<Vec<_>>()
        .join(", ");
    let query = format!(
        "INSERT INTO {} (id, resume_id, sort_order, {}) VALUES ($1, $2, $3, {placeholders})",
        T::TABLE,
        quoted_columns::<T>()
    );
    let insert = sqlx::query(&query)
        .bind(Uuid::new_v4())
        .bind(resume_id)
        .bind(sort_order);
    data.bind_fields(insert).execute(&mut *conn).await?;
    Ok(())
}

async fn update_row<T: PgSection>(
    conn: &mut PgConnection,
    resume_id: Uuid,
    id: Uuid,
    sort_order: i32,
    data: &T,
) -> StoreResult<()> {
    let assignments = T::COLUMNS
        .iter()
        .enumerate()
        .map(|(i, c)| format!("\"{c}\" = ${}", i + 4))
        .collect::<Vec<_>>()
        .join(", ");
    let query = format!(
        "UPDATE {} SET sort_order = $3, {assignments} WHERE id = $1 AND resume_id = $2",
        T::TABLE
    );
    let update = sqlx::query(&query).bind(id).bind(resume_id).bind(sort_order);
    let result = data.bind_fields(update).execute(&mut *conn).await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(format!("{} row {id}", T::SECTION)));
    }
    Ok(())
}

async fn apply_changes<T: PgSection>(
    conn: &mut PgConnection,
    resume_id: Uuid,
    changes: &SectionChanges<T>,
) -> StoreResult<()> {
    for id in &changes.deletes {
        let query = format!("DELETE FROM {} WHERE id = $1 AND resume_id = $2", T::TABLE);
        let result = sqlx::query(&query)
            .bind(id)
            .bind(resume_id)
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("{} row {id}", T::SECTION)));
        }
    }
    for write in &changes.writes {
        match write {
            RowWrite::Insert { sort_order, data } => {
                insert_row(conn, resume_id, *sort_order, data).await?
            }
            RowWrite::Update {
                id,
                sort_order,
                data,
            } => update_row(conn, resume_id, *id, *sort_order, data).await?,
        }
    }
    Ok(())
}

async fn insert_copies<T: PgSection>(
    conn: &mut PgConnection,
    resume_id: Uuid,
    rows: &[T],
) -> StoreResult<()> {
    for (index, data) in rows.iter().enumerate() {
        insert_row(conn, resume_id, index as i32, data).await?;
    }
    Ok(())
}

async fn insert_resume(conn: &mut PgConnection, new: &NewResume) -> StoreResult<ResumeRow> {
    let query = format!(
        "INSERT INTO resumes (id, user_id, title, is_default, version, previous_version)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {RESUME_COLUMNS}"
    );
    Ok(sqlx::query_as::<_, ResumeRow>(&query)
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(&new.title)
        .bind(new.is_default)
        .bind(new.version)
        .bind(new.previous_version)
        .fetch_one(&mut *conn)
        .await?)
}

async fn upsert_personal_details(
    conn: &mut PgConnection,
    resume_id: Uuid,
    details: &PersonalDetails,
) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO personal_details
            (resume_id, full_name, email, phone, address, linkedin, website, summary)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (resume_id) DO UPDATE SET
            full_name = EXCLUDED.full_name,
            email = EXCLUDED.email,
            phone = EXCLUDED.phone,
            address = EXCLUDED.address,
            linkedin = EXCLUDED.linkedin,
            website = EXCLUDED.website,
            summary = EXCLUDED.summary
        "#,
    )
    .bind(resume_id)
    .bind(&details.full_name)
    .bind(&details.email)
    .bind(&details.phone)
    .bind(&details.address)
    .bind(&details.linkedin)
    .bind(&details.website)
    .bind(&details.summary)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// PostgreSQL-backed store. Every multi-row write runs in one transaction.
#[derive(Clone)]
pub struct PgResumeStore {
    pool: PgPool,
}

impl PgResumeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResumeStore for PgResumeStore {
    async fn count_by_owner(&self, owner: Uuid) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM resumes WHERE user_id = $1")
            .bind(owner)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn create_resume(&self, new: NewResume) -> StoreResult<ResumeRow> {
        let mut tx = self.pool.begin().await?;
        let row = insert_resume(&mut tx, &new).await?;
        upsert_personal_details(&mut tx, row.id, &PersonalDetails::default()).await?;
        tx.commit().await?;
        Ok(row)
    }

    async fn find_owned(&self, id: Uuid, owner: Uuid) -> StoreResult<Option<ResumeRow>> {
        let query = format!("SELECT {RESUME_COLUMNS} FROM resumes WHERE id = $1 AND user_id = $2");
        Ok(sqlx::query_as::<_, ResumeRow>(&query)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_by_owner(&self, owner: Uuid) -> StoreResult<Vec<ResumeRow>> {
        let query = format!(
            "SELECT {RESUME_COLUMNS} FROM resumes WHERE user_id = $1 ORDER BY updated_at DESC"
        );
        Ok(sqlx::query_as::<_, ResumeRow>(&query)
            .bind(owner)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn load_document(&self, resume: ResumeRow) -> StoreResult<ResumeDocument> {
        let personal_details = sqlx::query_as::<_, PersonalDetails>(
            "SELECT full_name, email, phone, address, linkedin, website, summary
             FROM personal_details WHERE resume_id = $1",
        )
        .bind(resume.id)
        .fetch_optional(&self.pool)
        .await?
        .unwrap_or_default();

        Ok(ResumeDocument {
            personal_details,
            education: fetch_rows(&self.pool, resume.id).await?,
            experience: fetch_rows(&self.pool, resume.id).await?,
            skills: fetch_rows(&self.pool, resume.id).await?,
            projects: fetch_rows(&self.pool, resume.id).await?,
            resume,
        })
    }

    async fn apply_in_place(&self, resume_id: Uuid, plan: &InPlacePlan) -> StoreResult<ResumeRow> {
        let mut tx = self.pool.begin().await?;

        upsert_personal_details(&mut tx, resume_id, &plan.personal_details).await?;
        apply_changes(&mut tx, resume_id, &plan.education).await?;
        apply_changes(&mut tx, resume_id, &plan.experience).await?;
        apply_changes(&mut tx, resume_id, &plan.skills).await?;
        apply_changes(&mut tx, resume_id, &plan.projects).await?;

        let query = format!(
            "UPDATE resumes
             SET updated_at = GREATEST(NOW(), updated_at + INTERVAL '1 microsecond')
             WHERE id = $1
             RETURNING {RESUME_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, ResumeRow>(&query)
            .bind(resume_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("resume {resume_id}")))?;

        tx.commit().await?;
        debug!("Committed in-place edit of resume {resume_id}");
        Ok(updated)
    }

    async fn insert_fork(&self, plan: &ForkPlan) -> StoreResult<ResumeRow> {
        let mut tx = self.pool.begin().await?;

        // Held until commit so the original cannot be deleted under the fork.
        if let Some(previous) = plan.resume.previous_version {
            let locked: Option<i32> =
                sqlx::query_scalar("SELECT 1 FROM resumes WHERE id = $1 FOR SHARE")
                    .bind(previous)
                    .fetch_optional(&mut *tx)
                    .await?;
            if locked.is_none() {
                return Err(StoreError::NotFound(format!("resume {previous}")));
            }
        }

        let row = insert_resume(&mut tx, &plan.resume).await?;
        upsert_personal_details(&mut tx, row.id, &plan.personal_details).await?;
        insert_copies(&mut tx, row.id, &plan.education).await?;
        insert_copies(&mut tx, row.id, &plan.experience).await?;
        insert_copies(&mut tx, row.id, &plan.skills).await?;
        insert_copies(&mut tx, row.id, &plan.projects).await?;

        tx.commit().await?;
        debug!("Committed fork {} (v{})", row.id, row.version);
        Ok(row)
    }

    async fn delete_resume(&self, id: Uuid, owner: Uuid) -> StoreResult<bool> {
        // Children cascade and successors are unlinked by the foreign keys.
        let result = sqlx::query("DELETE FROM resumes WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
