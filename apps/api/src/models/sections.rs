//! Résumé sections: the personal-details record and the four child collections.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    PersonalDetails,
    Education,
    Experience,
    Skills,
    Projects,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::PersonalDetails => "personal_details",
            Section::Education => "education",
            Section::Experience => "experience",
            Section::Skills => "skills",
            Section::Projects => "projects",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field values of one row in a child collection.
pub trait SectionData:
    Validate
    + Clone
    + PartialEq
    + fmt::Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + Unpin
    + 'static
{
    const SECTION: Section;
}

/// A stored child row owned by exactly one résumé.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChildRow<T> {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub sort_order: i32,
    #[serde(flatten)]
    pub data: T,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate, FromRow)]
pub struct PersonalDetails {
    #[validate(length(min = 1, max = 100))]
    pub full_name: String,
    #[validate(email)]
    pub email: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(url)]
    pub linkedin: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(url)]
    pub website: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, FromRow)]
pub struct Education {
    #[validate(length(min = 1, max = 200))]
    pub institution: String,
    #[validate(length(min = 1, max = 200))]
    pub degree: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(length(max = 200))]
    pub field_of_study: Option<String>,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub current: bool,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub description: Option<String>,
}

impl SectionData for Education {
    const SECTION: Section = Section::Education;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, FromRow)]
pub struct Experience {
    #[validate(length(min = 1, max = 200))]
    pub company: String,
    #[validate(length(min = 1, max = 200))]
    pub position: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub current: bool,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub description: Option<String>,
}

impl SectionData for Experience {
    const SECTION: Section = Section::Experience;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "skill_level", rename_all = "lowercase")]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, FromRow)]
pub struct Skill {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub level: Option<SkillLevel>,
}

impl SectionData for Skill {
    const SECTION: Section = Section::Skills;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, FromRow)]
pub struct Project {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(url)]
    pub url: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl SectionData for Project {
    const SECTION: Section = Section::Projects;
}

/// Treats an empty or whitespace-only string as an absent optional field.
fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Flattens validator output into `field -> [message or code]`.
pub fn field_messages(errors: &ValidationErrors) -> BTreeMap<String, Vec<String>> {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| match &e.message {
                    Some(message) => message.to_string(),
                    None => e.code.to_string(),
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_optional_fields_become_none() {
        let details: PersonalDetails = serde_json::from_value(serde_json::json!({
            "full_name": "Ada Lovelace",
            "email": "ada@example.com",
            "phone": "",
            "linkedin": "   ",
            "summary": "Analyst"
        }))
        .unwrap();
        assert_eq!(details.phone, None);
        assert_eq!(details.linkedin, None);
        assert_eq!(details.website, None);
        assert_eq!(details.summary.as_deref(), Some("Analyst"));
        assert!(details.validate().is_ok());
    }

    #[test]
    fn test_personal_details_rejects_bad_email_and_url() {
        let details = PersonalDetails {
            full_name: "Ada".to_string(),
            email: "not-an-email".to_string(),
            website: Some("nowhere".to_string()),
            ..PersonalDetails::default()
        };
        let errors = details.validate().unwrap_err();
        let messages = field_messages(&errors);
        assert!(messages.contains_key("email"));
        assert!(messages.contains_key("website"));
        assert!(!messages.contains_key("full_name"));
    }

    #[test]
    fn test_empty_personal_details_fail_required_fields() {
        let errors = PersonalDetails::default().validate().unwrap_err();
        let messages = field_messages(&errors);
        assert!(messages.contains_key("full_name"));
        assert!(messages.contains_key("email"));
    }

    #[test]
    fn test_skill_level_parses_lowercase() {
        let skill: Skill = serde_json::from_str(r#"{"name": "Rust", "level": "expert"}"#).unwrap();
        assert_eq!(skill.level, Some(SkillLevel::Expert));
        assert!(serde_json::from_str::<Skill>(r#"{"name": "Rust", "level": "guru"}"#).is_err());
    }

    #[test]
    fn test_child_row_serializes_flat() {
        let row = ChildRow {
            id: Uuid::new_v4(),
            resume_id: Uuid::new_v4(),
            sort_order: 0,
            data: Skill {
                name: "SQL".to_string(),
                level: None,
            },
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["name"], "SQL");
        assert_eq!(json["sort_order"], 0);
    }

    #[test]
    fn test_section_names() {
        assert_eq!(Section::PersonalDetails.to_string(), "personal_details");
        assert_eq!(Skill::SECTION.as_str(), "skills");
    }
}
