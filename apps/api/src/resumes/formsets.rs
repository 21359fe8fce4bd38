//! Edit/fork planning for a résumé and its section formsets.
//!
//! A submitted edit is validated as one unit (personal details plus the four
//! child collections) and turned into a [`SavePlan`] without touching the
//! store. The store then commits the plan in a single transaction.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::resume::{NewResume, ResumeRow};
use crate::models::sections::{
    field_messages, ChildRow, Education, Experience, PersonalDetails, Project, Section,
    SectionData, Skill,
};
use crate::store::ResumeDocument;

/// Appended to the title of every forked résumé.
pub const FORK_TITLE_SUFFIX: &str = " (Copy)";

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

/// One row of a child formset.
///
/// With an `id` the entry edits (or, with `delete`, removes) an existing row
/// of the résumé being edited. Without an `id` it adds a row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormsetEntry<T> {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub delete: bool,
    #[serde(flatten)]
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditRequest {
    /// Fork a new version instead of saving in place.
    #[serde(default)]
    pub save_as_new: bool,
    pub personal_details: PersonalDetails,
    #[serde(default)]
    pub education: Vec<FormsetEntry<Education>>,
    #[serde(default)]
    pub experience: Vec<FormsetEntry<Experience>>,
    #[serde(default)]
    pub skills: Vec<FormsetEntry<Skill>>,
    #[serde(default)]
    pub projects: Vec<FormsetEntry<Project>>,
}

// ────────────────────────────────────────────────────────────────────────────
// Validation errors
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SectionErrors {
    /// Errors on the sub-form itself (personal details).
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Vec<String>>,
    /// Errors keyed by the row's index in the submitted list.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub rows: BTreeMap<usize, BTreeMap<String, Vec<String>>>,
}

impl SectionErrors {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.rows.is_empty()
    }

    fn row_error(&mut self, index: usize, field: &str, code: &str) {
        self.rows
            .entry(index)
            .or_default()
            .entry(field.to_string())
            .or_default()
            .push(code.to_string());
    }
}

/// Every sub-form that failed validation, keyed by section name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FormErrors {
    sections: BTreeMap<&'static str, SectionErrors>,
}

impl FormErrors {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn section(&self, section: Section) -> Option<&SectionErrors> {
        self.sections.get(section.as_str())
    }

    pub fn failed_sections(&self) -> Vec<&'static str> {
        self.sections.keys().copied().collect()
    }

    fn record(&mut self, section: Section, errors: SectionErrors) {
        if !errors.is_empty() {
            self.sections.insert(section.as_str(), errors);
        }
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid sub-forms: {}", self.failed_sections().join(", "))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Plans
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum RowWrite<T> {
    Insert { sort_order: i32, data: T },
    Update { id: Uuid, sort_order: i32, data: T },
}

/// Row-level changes to one child collection of a résumé.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionChanges<T> {
    pub deletes: Vec<Uuid>,
    pub writes: Vec<RowWrite<T>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InPlacePlan {
    pub personal_details: PersonalDetails,
    pub education: SectionChanges<Education>,
    pub experience: SectionChanges<Experience>,
    pub skills: SectionChanges<Skill>,
    pub projects: SectionChanges<Project>,
}

/// A new résumé version and fresh copies of every surviving child row.
#[derive(Debug, Clone, PartialEq)]
pub struct ForkPlan {
    pub resume: NewResume,
    pub personal_details: PersonalDetails,
    pub education: Vec<Education>,
    pub experience: Vec<Experience>,
    pub skills: Vec<Skill>,
    pub projects: Vec<Project>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SavePlan {
    InPlace { resume_id: Uuid, plan: InPlacePlan },
    Fork(ForkPlan),
}

// ────────────────────────────────────────────────────────────────────────────
// Planning
// ────────────────────────────────────────────────────────────────────────────

/// Column values of the version forked from `original`.
pub fn fork_of(original: &ResumeRow) -> NewResume {
    NewResume {
        user_id: original.user_id,
        title: format!("{}{}", original.title, FORK_TITLE_SUFFIX),
        is_default: original.is_default,
        version: original.version + 1,
        previous_version: Some(original.id),
    }
}

/// Validates all five sub-forms against the current document and plans the save.
///
/// Nothing is planned unless every sub-form is valid.
pub fn plan_save(current: &ResumeDocument, request: EditRequest) -> Result<SavePlan, FormErrors> {
    let EditRequest {
        save_as_new,
        personal_details,
        education,
        experience,
        skills,
        projects,
    } = request;

    let mut errors = FormErrors::default();

    if let Err(e) = personal_details.validate() {
        errors.record(
            Section::PersonalDetails,
            SectionErrors {
                fields: field_messages(&e),
                rows: BTreeMap::new(),
            },
        );
    }
    let education = resolve_section(&current.education, education, &mut errors);
    let experience = resolve_section(&current.experience, experience, &mut errors);
    let skills = resolve_section(&current.skills, skills, &mut errors);
    let projects = resolve_section(&current.projects, projects, &mut errors);

    let (Some(education), Some(experience), Some(skills), Some(projects)) =
        (education, experience, skills, projects)
    else {
        return Err(errors);
    };
    if !errors.is_empty() {
        return Err(errors);
    }

    if save_as_new {
        Ok(SavePlan::Fork(ForkPlan {
            resume: fork_of(&current.resume),
            personal_details,
            education: education.into_copies(),
            experience: experience.into_copies(),
            skills: skills.into_copies(),
            projects: projects.into_copies(),
        }))
    } else {
        Ok(SavePlan::InPlace {
            resume_id: current.resume.id,
            plan: InPlacePlan {
                personal_details,
                education: education.into_changes(),
                experience: experience.into_changes(),
                skills: skills.into_changes(),
                projects: projects.into_changes(),
            },
        })
    }
}

/// A surviving row of a collection after the submitted entries are applied.
struct ResolvedRow<T> {
    /// Identity and stored sort order when the row already exists.
    existing: Option<(Uuid, i32)>,
    changed: bool,
    data: T,
}

struct ResolvedSection<T> {
    rows: Vec<ResolvedRow<T>>,
    deletes: Vec<Uuid>,
}

impl<T> ResolvedSection<T> {
    fn into_copies(self) -> Vec<T> {
        self.rows.into_iter().map(|row| row.data).collect()
    }

    fn into_changes(self) -> SectionChanges<T> {
        let writes = self
            .rows
            .into_iter()
            .enumerate()
            .filter_map(|(index, row)| {
                let sort_order = index as i32;
                match row.existing {
                    None => Some(RowWrite::Insert {
                        sort_order,
                        data: row.data,
                    }),
                    Some((id, stored_order)) if row.changed || stored_order != sort_order => {
                        Some(RowWrite::Update {
                            id,
                            sort_order,
                            data: row.data,
                        })
                    }
                    Some(_) => None,
                }
            })
            .collect();
        SectionChanges {
            deletes: self.deletes,
            writes,
        }
    }
}

/// Applies submitted entries to the stored rows of one collection.
///
/// The effective order is the stored rows (edited in place, deleted ones
/// removed) followed by the added rows. Entries marked for deletion are not
/// field-validated. Returns `None` after recording errors.
fn resolve_section<T: SectionData>(
    existing: &[ChildRow<T>],
    entries: Vec<FormsetEntry<T>>,
    errors: &mut FormErrors,
) -> Option<ResolvedSection<T>> {
    let known: HashSet<Uuid> = existing.iter().map(|row| row.id).collect();
    let mut seen = HashSet::new();
    // None marks a deletion.
    let mut edits: HashMap<Uuid, Option<T>> = HashMap::new();
    let mut added = Vec::new();
    let mut section_errors = SectionErrors::default();

    for (index, entry) in entries.into_iter().enumerate() {
        match entry.id {
            Some(id) if !known.contains(&id) => section_errors.row_error(index, "id", "unknown_row"),
            Some(id) if !seen.insert(id) => section_errors.row_error(index, "id", "duplicate_row"),
            Some(id) if entry.delete => {
                edits.insert(id, None);
            }
            None if entry.delete => {}
            id => match entry.data.validate() {
                Err(e) => {
                    section_errors.rows.insert(index, field_messages(&e));
                }
                Ok(()) => match id {
                    Some(id) => {
                        edits.insert(id, Some(entry.data));
                    }
                    None => added.push(entry.data),
                },
            },
        }
    }

    if !section_errors.is_empty() {
        errors.record(T::SECTION, section_errors);
        return None;
    }

    let mut rows = Vec::with_capacity(existing.len() + added.len());
    let mut deletes = Vec::new();
    for row in existing {
        match edits.remove(&row.id) {
            Some(None) => deletes.push(row.id),
            Some(Some(data)) => rows.push(ResolvedRow {
                existing: Some((row.id, row.sort_order)),
                changed: data != row.data,
                data,
            }),
            None => rows.push(ResolvedRow {
                existing: Some((row.id, row.sort_order)),
                changed: false,
                data: row.data.clone(),
            }),
        }
    }
    rows.extend(added.into_iter().map(|data| ResolvedRow {
        existing: None,
        changed: true,
        data,
    }));

    Some(ResolvedSection { rows, deletes })
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
