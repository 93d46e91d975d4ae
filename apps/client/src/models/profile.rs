use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::listing::Listing;

/// Candidate or recruiter profile, 1:1 with an identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub owner_id: String,
    pub full_name: Option<String>,
    pub headline: Option<String>,
    /// Free-text about section (`bio` on the table backend, `summary` on the REST API).
    pub bio: Option<String>,
    pub location: Option<String>,
    pub remote_pref: Option<String>,
    pub links: Vec<String>,
    /// Stored object path of the uploaded resume.
    pub resume_ref: Option<String>,
}

/// Partial profile update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_pref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<String>>,
}

impl ProfilePatch {
    pub fn merged_into(&self, profile: &Profile) -> Profile {
        let mut out = profile.clone();
        if let Some(v) = &self.full_name {
            out.full_name = Some(v.clone());
        }
        if let Some(v) = &self.headline {
            out.headline = Some(v.clone());
        }
        if let Some(v) = &self.bio {
            out.bio = Some(v.clone());
        }
        if let Some(v) = &self.location {
            out.location = Some(v.clone());
        }
        if let Some(v) = &self.remote_pref {
            out.remote_pref = Some(v.clone());
        }
        if let Some(v) = &self.links {
            out.links = v.clone();
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub id: String,
    pub name: String,
}

impl Listing for Skill {
    fn id(&self) -> &str {
        &self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![self.name.as_str()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experience {
    pub id: String,
    pub job_title: String,
    pub company: String,
    pub location: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_current: bool,
    pub description: Option<String>,
}

impl Listing for Experience {
    fn id(&self) -> &str {
        &self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![self.job_title.as_str(), self.company.as_str()]
    }
}

/// New experience entry; the server assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperienceDraft {
    pub job_title: String,
    pub company: String,
    pub start_date: NaiveDate,
    pub is_current: bool,
}

impl ExperienceDraft {
    /// Placeholder entry the editor inserts when "Add" is pressed.
    pub fn placeholder(today: NaiveDate) -> Self {
        Self {
            job_title: "New Position".to_string(),
            company: "Company Name".to_string(),
            start_date: today,
            is_current: true,
        }
    }
}

/// Partial experience update. `end_date: Some(None)` clears the end date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperiencePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_current: Option<bool>,
}

impl ExperiencePatch {
    /// Whether any validated text field is part of the patch.
    pub fn touches_text(&self) -> bool {
        self.job_title.is_some()
            || self.company.is_some()
            || self.location.is_some()
            || self.description.is_some()
    }

    pub fn merged_into(&self, exp: &Experience) -> Experience {
        let mut out = exp.clone();
        if let Some(v) = &self.job_title {
            out.job_title = v.clone();
        }
        if let Some(v) = &self.company {
            out.company = v.clone();
        }
        if let Some(v) = &self.location {
            out.location = Some(v.clone());
        }
        if let Some(v) = &self.description {
            out.description = Some(v.clone());
        }
        if let Some(v) = self.start_date {
            out.start_date = v;
        }
        if let Some(v) = self.end_date {
            out.end_date = v;
        }
        if let Some(v) = self.is_current {
            out.is_current = v;
        }
        out
    }
}
