//! Request/response records for the REST-only endpoints (matching, CVs, feed,
//! dashboards, recruiter tools and admin moderation).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::listing::Listing;
use crate::models::{Application, Post};

/// Body of `POST /candidate/match-check`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCheckRequest {
    pub jd_text: String,
    pub cv_id: Option<String>,
}

/// Score + skill gap analysis for an ad-hoc JD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCheckResponse {
    pub score: f64,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub suggestions: String,
}

/// Result of scoring one application against its job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub job_id: String,
    pub candidate_id: String,
    pub score: f64,
    #[serde(default)]
    pub match_level: Option<String>,
    #[serde(default)]
    pub matched_skills: Vec<String>,
    #[serde(default)]
    pub missing_skills: Vec<String>,
    pub rationale: String,
    pub created_at: DateTime<Utc>,
}

/// Summary of `POST /recruiter/jobs/:id/applications/score`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreAllSummary {
    pub scored: u32,
    pub best_fit_id: Option<String>,
}

/// A past match check, as listed by `GET /candidate/matches`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCheckRecord {
    pub id: String,
    #[serde(default)]
    pub jd_text: Option<String>,
    #[serde(default)]
    pub match_score: Option<f64>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub matched_skills: Vec<String>,
    #[serde(default)]
    pub missing_skills: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Listing for MatchCheckRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        self.jd_text.as_deref().into_iter().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvItem {
    pub id: String,
    pub file_url: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl Listing for CvItem {
    fn id(&self) -> &str {
        &self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![self.file_url.as_str()]
    }
}

/// Reply to a CV upload: the stored object path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    pub path: String,
}

/// Profile fields suggested from a parsed CV. Not saved until the user confirms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutofillSuggestion {
    pub headline: Option<String>,
    pub summary: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub links: Vec<String>,
}

/// JD rewrite or file ingest result used to pre-fill the job form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JdSuggestion {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub must_skills: Vec<String>,
    #[serde(default)]
    pub nice_skills: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStat {
    pub label: String,
    pub value: String,
    #[serde(default)]
    pub trend: Option<String>,
}

/// A candidate who applied to one of the recruiter's jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSummary {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Raw candidate row; its columns vary between deployments.
    #[serde(default)]
    pub candidate: Value,
    #[serde(default)]
    pub applications: Vec<Value>,
}

impl Listing for CandidateSummary {
    fn id(&self) -> &str {
        &self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.id.as_str()];
        if let Some(email) = &self.email {
            fields.push(email);
        }
        if let Some(headline) = self.candidate.get("headline").and_then(Value::as_str) {
            fields.push(headline);
        }
        fields
    }
}

/// Everything a recruiter sees on one candidate's page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateDetail {
    /// Raw candidate row; empty object when the candidate has none.
    #[serde(default)]
    pub profile: Value,
    #[serde(default)]
    pub posts: Vec<Post>,
    #[serde(default)]
    pub applications: Vec<Application>,
}

/// The recruiter's own company profile (`GET/PUT /recruiter/profile`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecruiterProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    #[serde(default)]
    pub id: Option<String>,
    pub recruiter_id: String,
    pub candidate_id: String,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateNote {
    #[serde(default)]
    pub id: Option<String>,
    pub candidate_id: String,
    pub note: String,
    #[serde(default)]
    pub author_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// A platform account as listed for moderation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Listing for AdminUser {
    fn id(&self) -> &str {
        &self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.id.as_str()];
        fields.extend(self.email.as_deref());
        fields.extend(self.role.as_deref());
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub read: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl Listing for Notification {
    fn id(&self) -> &str {
        &self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.kind.as_str()];
        if let Some(title) = self.data.get("job_title").and_then(Value::as_str) {
            fields.push(title);
        }
        fields
    }
}
