use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A record shown in a list view: addressable by id and searchable locally.
pub trait Listing: Clone + Send + Sync + 'static {
    fn id(&self) -> &str;

    /// Fields the local filter matches against (case-insensitive substring).
    fn search_fields(&self) -> Vec<&str>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillImportance {
    Must,
    Nice,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSkill {
    pub skill: String,
    pub importance: SkillImportance,
}

/// A job listing, as both backends describe it after decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    /// Public URL key; the table backend has none and falls back to the id.
    pub slug: String,
    pub owner_id: Option<String>,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub job_type: Option<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub description: Option<String>,
    pub requirements: Option<String>,
    pub skills: Vec<JobSkill>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Listing for Job {
    fn id(&self) -> &str {
        &self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.title.as_str(), self.company.as_str()];
        if let Some(location) = &self.location {
            fields.push(location);
        }
        fields
    }
}

/// Input for creating a job. Server assigns id, slug, owner and timestamps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDraft {
    pub title: String,
    pub company: String,
    pub location: String,
    pub job_type: String,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub description: String,
    pub requirements: Option<String>,
    pub skills: Vec<JobSkill>,
}

/// Partial update of a job. `None` means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirements: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary_min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary_max: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl JobPatch {
    pub fn active(is_active: bool) -> Self {
        Self {
            is_active: Some(is_active),
            ..Default::default()
        }
    }

    /// Applies the patch onto a copy of `job`.
    pub fn merged_into(&self, job: &Job) -> Job {
        let mut out = job.clone();
        if let Some(v) = &self.title {
            out.title = v.clone();
        }
        if let Some(v) = &self.company {
            out.company = v.clone();
        }
        if let Some(v) = &self.location {
            out.location = Some(v.clone());
        }
        if let Some(v) = &self.job_type {
            out.job_type = Some(v.clone());
        }
        if let Some(v) = &self.description {
            out.description = Some(v.clone());
        }
        if let Some(v) = &self.requirements {
            out.requirements = Some(v.clone());
        }
        if let Some(v) = self.salary_min {
            out.salary_min = Some(v);
        }
        if let Some(v) = self.salary_max {
            out.salary_max = Some(v);
        }
        if let Some(v) = self.is_active {
            out.is_active = v;
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PostVisibility {
    #[default]
    Public,
    Hidden,
}

/// A candidate's feed post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    #[serde(rename = "candidate_id")]
    pub author_id: Option<String>,
    pub body: String,
    #[serde(default)]
    pub visibility: PostVisibility,
    pub created_at: Option<DateTime<Utc>>,
}

impl Listing for Post {
    fn id(&self) -> &str {
        &self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![self.body.as_str()]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDraft {
    pub body: String,
    pub visibility: PostVisibility,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    #[default]
    Applied,
    Viewed,
    Shortlisted,
    Rejected,
}

/// A candidate's application to a job, with the latest match scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    pub job_id: String,
    pub candidate_id: String,
    #[serde(default)]
    pub cv_id: Option<String>,
    #[serde(default)]
    pub status: ApplicationStatus,
    pub applied_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub match_score: Option<f64>,
    #[serde(default)]
    pub match_level: Option<String>,
    #[serde(default)]
    pub matched_skills: Vec<String>,
    #[serde(default)]
    pub missing_skills: Vec<String>,
    #[serde(default)]
    pub rationale: Option<String>,
    #[serde(default)]
    pub best_fit: Option<bool>,
    /// Candidate email, present on the recruiter's per-job listing.
    #[serde(default)]
    pub email: Option<String>,
}

impl Listing for Application {
    fn id(&self) -> &str {
        &self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.candidate_id.as_str()];
        if let Some(email) = &self.email {
            fields.push(email);
        }
        fields.extend(self.matched_skills.iter().map(String::as_str));
        fields
    }
}
