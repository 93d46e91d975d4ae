//! Backend ports.
//!
//! `RecruitmentBackend` is the shared interface the views talk to; the BaaS
//! table adapter and the REST adapter both implement it. `MatchingApi` covers
//! the scoring endpoints only the REST API offers.
//!
//! Views hold these as `Arc<dyn …>`, chosen once at startup from config.

use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::ClientResult;
use crate::models::api::{CvItem, MatchCheckRequest, MatchCheckResponse, ScoreAllSummary, ScoreResult};
use crate::models::{
    Application, Experience, ExperienceDraft, ExperiencePatch, Job, JobDraft, JobPatch, Post,
    PostDraft, Profile, ProfilePatch, Skill,
};
use crate::remote::FileUpload;

pub mod baas;
pub mod rest;

pub use baas::{BaasAuth, BaasBackend};
pub use rest::RestBackend;

/// Reply to "skill already on this profile".
pub const SKILL_CONFLICT_MESSAGE: &str = "Skill already added";

// ────────────────────────────────────────────────────────────────────────────
// Shared interface
// ────────────────────────────────────────────────────────────────────────────

/// Persistence operations shared by both backends.
///
/// `owner` is the signed-in identity's id. The REST API derives the owner
/// from the bearer credential and ignores it; the table backend filters on it.
#[async_trait]
pub trait RecruitmentBackend: Send + Sync {
    fn name(&self) -> &'static str;

    // Jobs

    /// Active jobs, newest first.
    async fn list_public_jobs(&self) -> ClientResult<Vec<Job>>;

    /// One job by public slug (or id where the backend has no slugs).
    async fn get_job(&self, slug: &str) -> ClientResult<Job>;

    /// Jobs posted by `owner`, newest first.
    async fn list_owned_jobs(&self, owner: &str) -> ClientResult<Vec<Job>>;

    /// Creates a job and returns the server's record.
    async fn create_job(&self, owner: &str, draft: &JobDraft) -> ClientResult<Job>;

    /// Applies `patch` to `current` and returns the server's record.
    async fn update_job(&self, current: &Job, patch: &JobPatch) -> ClientResult<Job>;

    async fn set_job_active(&self, current: &Job, active: bool) -> ClientResult<Job> {
        self.update_job(current, &JobPatch::active(active)).await
    }

    async fn delete_job(&self, id: &str) -> ClientResult<()>;

    // Profile

    async fn get_profile(&self, owner: &str) -> ClientResult<Profile>;

    async fn update_profile(&self, owner: &str, patch: &ProfilePatch) -> ClientResult<Profile>;

    /// Stores a resume and records it on the profile. Returns the stored path.
    async fn upload_resume(&self, owner: &str, file: FileUpload) -> ClientResult<String>;

    async fn list_skills(&self, owner: &str) -> ClientResult<Vec<Skill>>;

    /// Fails with `Conflict` when the profile already has the skill.
    async fn add_skill(&self, owner: &str, name: &str) -> ClientResult<Skill>;

    async fn remove_skill(&self, owner: &str, skill: &Skill) -> ClientResult<()>;

    /// Experience entries, most recent start date first.
    async fn list_experience(&self, owner: &str) -> ClientResult<Vec<Experience>>;

    async fn add_experience(&self, owner: &str, draft: &ExperienceDraft)
        -> ClientResult<Experience>;

    async fn update_experience(
        &self,
        current: &Experience,
        patch: &ExperiencePatch,
    ) -> ClientResult<Experience>;

    async fn delete_experience(&self, id: &str) -> ClientResult<()>;

    // Posts

    async fn list_posts(&self, owner: &str) -> ClientResult<Vec<Post>>;

    async fn create_post(&self, owner: &str, draft: &PostDraft) -> ClientResult<Post>;
}

/// Matching and scoring endpoints.
#[async_trait]
pub trait MatchingApi: Send + Sync {
    async fn match_check(&self, request: &MatchCheckRequest) -> ClientResult<MatchCheckResponse>;

    async fn list_cvs(&self) -> ClientResult<Vec<CvItem>>;

    /// Applications to one job, best score first. `include_best` marks the top one.
    async fn job_applications(&self, job_id: &str, include_best: bool)
        -> ClientResult<Vec<Application>>;

    async fn score_all(&self, job_id: &str) -> ClientResult<ScoreAllSummary>;

    async fn score_one(&self, job_id: &str, application_id: &str) -> ClientResult<ScoreResult>;
}

// ────────────────────────────────────────────────────────────────────────────
// Wire helpers
// ────────────────────────────────────────────────────────────────────────────

/// Insert and update replies arrive as a row list on some endpoints and as a
/// bare row on others.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub(crate) fn into_first(self) -> Option<T> {
        match self {
            OneOrMany::Many(rows) => rows.into_iter().next(),
            OneOrMany::One(row) => Some(row),
        }
    }
}
