//! Wire shapes of the REST API and their conversion into domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Job, JobDraft, JobSkill, Profile, ProfilePatch};

/// `company` is an object on the public listing and absent (with a flat
/// `company_name`) on raw job rows.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum CompanyField {
    Named { name: String },
    Plain(String),
}

/// A job as returned by `/jobs` and `/recruiter/jobs`.
#[derive(Debug, Deserialize)]
pub(super) struct JobRow {
    pub id: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub recruiter_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub company: Option<CompanyField>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub employment_type: Option<String>,
    #[serde(default)]
    pub salary_min: Option<i64>,
    #[serde(default)]
    pub salary_max: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub skills: Option<Vec<JobSkill>>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<JobRow> for Job {
    fn from(row: JobRow) -> Self {
        let company = match row.company {
            Some(CompanyField::Named { name }) | Some(CompanyField::Plain(name)) => name,
            None => row.company_name.unwrap_or_else(|| "Company".to_string()),
        };
        Job {
            slug: row.slug.unwrap_or_else(|| row.id.clone()),
            id: row.id,
            owner_id: row.recruiter_id,
            title: row.title.unwrap_or_else(|| "Untitled role".to_string()),
            company,
            location: row.location,
            job_type: row.employment_type,
            salary_min: row.salary_min,
            salary_max: row.salary_max,
            description: row.description,
            requirements: None,
            skills: row.skills.unwrap_or_default(),
            // Rows without a status are listed as open by the API.
            is_active: row.status.as_deref().map_or(true, |s| s == "open"),
            created_at: row.created_at.unwrap_or_default(),
        }
    }
}

/// Body of `POST /recruiter/jobs` and `PUT /recruiter/jobs/:id`.
/// The update replaces the whole record, so it always carries every field.
#[derive(Debug, Serialize)]
pub(super) struct JobWrite<'a> {
    pub title: &'a str,
    pub location: Option<&'a str>,
    pub employment_type: Option<&'a str>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub description: Option<&'a str>,
    pub skills: &'a [JobSkill],
    pub status: &'static str,
}

fn status_for(active: bool) -> &'static str {
    if active {
        "open"
    } else {
        "closed"
    }
}

fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}

impl<'a> JobWrite<'a> {
    pub fn from_draft(draft: &'a JobDraft) -> Self {
        Self {
            title: draft.title.trim(),
            location: non_empty(&draft.location),
            employment_type: non_empty(&draft.job_type),
            salary_min: draft.salary_min,
            salary_max: draft.salary_max,
            description: non_empty(&draft.description),
            skills: &draft.skills,
            status: status_for(true),
        }
    }

    pub fn from_job(job: &'a Job) -> Self {
        Self {
            title: &job.title,
            location: job.location.as_deref(),
            employment_type: job.job_type.as_deref(),
            salary_min: job.salary_min,
            salary_max: job.salary_max,
            description: job.description.as_deref(),
            skills: &job.skills,
            status: status_for(job.is_active),
        }
    }
}

/// `GET/PUT /candidate/profile`. Skills live inline as a name list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct CandidateProfile {
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub remote_pref: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub skills: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub links: Vec<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl CandidateProfile {
    pub fn into_profile(self, owner: &str) -> Profile {
        Profile {
            owner_id: owner.to_string(),
            full_name: None,
            headline: self.headline,
            bio: self.summary,
            location: self.location,
            remote_pref: self.remote_pref,
            links: self.links,
            resume_ref: None,
        }
    }

    pub fn apply(&mut self, patch: &ProfilePatch) {
        if let Some(v) = &patch.headline {
            self.headline = Some(v.clone());
        }
        if let Some(v) = &patch.bio {
            self.summary = Some(v.clone());
        }
        if let Some(v) = &patch.location {
            self.location = Some(v.clone());
        }
        if let Some(v) = &patch.remote_pref {
            self.remote_pref = Some(v.clone());
        }
        if let Some(v) = &patch.links {
            self.links = v.clone();
        }
    }

    pub fn has_skill(&self, name: &str) -> bool {
        self.skills.iter().any(|s| s.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Serialize)]
pub(super) struct ImproveRequest<'a> {
    pub description: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct CvRef<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cv_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(super) struct CandidateRef<'a> {
    pub candidate_id: &'a str,
}

/// Body of `POST /recruiter/jobs/{id}/match`.
#[derive(Debug, Serialize)]
pub(super) struct MatchRequest<'a> {
    pub job_id: &'a str,
    pub candidate_id: &'a str,
    pub cv_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(super) struct NoteBody<'a> {
    pub note: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct Ack {
    #[serde(default)]
    pub ok: bool,
}
