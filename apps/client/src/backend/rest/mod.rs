//! REST API adapter.
//!
//! Every call goes through the shared `RemoteClient`, which carries the
//! session's bearer credential. The API derives the owner from that
//! credential, so `owner` arguments are only used to label returned records.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::backend::{MatchingApi, OneOrMany, RecruitmentBackend, SKILL_CONFLICT_MESSAGE};
use crate::errors::{ClientError, ClientResult};
use crate::models::api::{
    AdminUser, AutofillSuggestion, Bookmark, CandidateDetail, CandidateNote, CandidateSummary,
    CvItem, DashboardStat, JdSuggestion, MatchCheckRecord, MatchCheckRequest, MatchCheckResponse,
    Notification, RecruiterProfile, ScoreAllSummary, ScoreResult, StoredObject,
};
use crate::models::{
    Application, Experience, ExperienceDraft, ExperiencePatch, Job, JobDraft, JobPatch, Post,
    PostDraft, Profile, ProfilePatch, Role, Skill,
};
use crate::remote::{FileUpload, RemoteClient, RequestOptions};
use crate::validation::validate_candidate_note;

mod dto;

use dto::{
    Ack, CandidateProfile, CandidateRef, CvRef, ImproveRequest, JobRow, JobWrite, MatchRequest,
    NoteBody,
};

/// Multipart field name the upload endpoints read.
const FILE_FIELD: &str = "file";

#[derive(Clone)]
pub struct RestBackend {
    remote: RemoteClient,
}

impl RestBackend {
    pub fn new(remote: RemoteClient) -> Self {
        Self { remote }
    }

    async fn first_row<T>(&self, path: &str, options: RequestOptions) -> ClientResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.remote
            .request::<OneOrMany<T>>(path, options)
            .await?
            .into_first()
            .ok_or_else(|| ClientError::MissingRecord {
                path: path.to_string(),
            })
    }

    async fn fetch_candidate_profile(&self) -> ClientResult<CandidateProfile> {
        match self
            .remote
            .request::<CandidateProfile>("/candidate/profile", RequestOptions::get())
            .await
        {
            Ok(profile) => Ok(profile),
            // A new candidate has no profile row yet.
            Err(e) if e.is_not_found() => Ok(CandidateProfile::default()),
            Err(e) => Err(e),
        }
    }

    async fn put_candidate_profile(
        &self,
        profile: &CandidateProfile,
    ) -> ClientResult<CandidateProfile> {
        self.first_row("/candidate/profile", RequestOptions::put_json(profile)?)
            .await
    }

    async fn recruiter_job(&self, id: &str) -> ClientResult<Job> {
        let row: JobRow = self
            .remote
            .request(&format!("/recruiter/jobs/{id}"), RequestOptions::get())
            .await?;
        Ok(row.into())
    }

    // ── Candidate ───────────────────────────────────────────────────────────

    pub async fn apply(&self, job_id: &str, cv_id: Option<&str>) -> ClientResult<Application> {
        let options = RequestOptions::post_json(&CvRef { cv_id })?;
        let application: Application = self
            .first_row(&format!("/candidate/apply/{job_id}"), options)
            .await?;
        info!("Applied to job {job_id} ({})", application.id);
        Ok(application)
    }

    pub async fn upload_cv(&self, file: FileUpload) -> ClientResult<StoredObject> {
        self.remote
            .request("/candidate/cv", RequestOptions::upload(FILE_FIELD, file))
            .await
    }

    /// Profile suggestions from a CV (the latest one when `cv_id` is `None`).
    /// Nothing is saved until the caller applies them.
    pub async fn autofill(&self, cv_id: Option<&str>) -> ClientResult<AutofillSuggestion> {
        self.remote
            .request(
                "/candidate/profile/autofill",
                RequestOptions::post_json(&CvRef { cv_id })?,
            )
            .await
    }

    pub async fn feed(&self) -> ClientResult<Vec<Post>> {
        self.remote.request("/candidate/feed", RequestOptions::get()).await
    }

    pub async fn my_applications(&self) -> ClientResult<Vec<Application>> {
        self.remote
            .request("/candidate/applications", RequestOptions::get())
            .await
    }

    pub async fn match_history(&self) -> ClientResult<Vec<MatchCheckRecord>> {
        self.remote
            .request("/candidate/matches", RequestOptions::get())
            .await
    }

    /// Dashboard tiles for the role's home page.
    pub async fn dashboard(&self, role: Role) -> ClientResult<Vec<DashboardStat>> {
        let path = match role {
            Role::Seeker => "/candidate/dashboard",
            Role::Recruiter => "/recruiter/dashboard",
            Role::Admin => "/admin/overview",
        };
        self.remote.request(path, RequestOptions::get()).await
    }

    // ── Recruiter ───────────────────────────────────────────────────────────

    /// Rewrites a JD and splits out must/nice skills.
    pub async fn improve_jd(&self, description: &str) -> ClientResult<JdSuggestion> {
        self.remote
            .request(
                "/recruiter/jobs/improve",
                RequestOptions::post_json(&ImproveRequest { description })?,
            )
            .await
    }

    /// Extracts a job form pre-fill from an uploaded JD document.
    pub async fn ingest_jd(&self, file: FileUpload) -> ClientResult<JdSuggestion> {
        self.remote
            .request(
                "/recruiter/jobs/ingest",
                RequestOptions::upload(FILE_FIELD, file),
            )
            .await
    }

    pub async fn candidates(&self) -> ClientResult<Vec<CandidateSummary>> {
        self.remote
            .request("/recruiter/candidates", RequestOptions::get())
            .await
    }

    pub async fn candidate_detail(&self, candidate_id: &str) -> ClientResult<CandidateDetail> {
        self.remote
            .request(
                &format!("/recruiter/candidates/{candidate_id}"),
                RequestOptions::get(),
            )
            .await
    }

    /// An empty object from the API means no profile has been saved yet.
    pub async fn recruiter_profile(&self) -> ClientResult<RecruiterProfile> {
        self.remote
            .request("/recruiter/profile", RequestOptions::get())
            .await
    }

    pub async fn update_recruiter_profile(
        &self,
        profile: &RecruiterProfile,
    ) -> ClientResult<RecruiterProfile> {
        self.first_row("/recruiter/profile", RequestOptions::put_json(profile)?)
            .await
    }

    /// Files an application for `candidate_id` on the recruiter's job.
    pub async fn attach_candidate(
        &self,
        job_id: &str,
        candidate_id: &str,
    ) -> ClientResult<Application> {
        let options = RequestOptions::post_json(&CandidateRef { candidate_id })?;
        let application: Application = self
            .first_row(&format!("/recruiter/jobs/{job_id}/candidates"), options)
            .await?;
        info!("Attached candidate {candidate_id} to job {job_id}");
        Ok(application)
    }

    /// Scores a candidate against the job, creating the application if needed.
    pub async fn match_candidate(
        &self,
        job_id: &str,
        candidate_id: &str,
        cv_id: Option<&str>,
    ) -> ClientResult<ScoreResult> {
        let body = MatchRequest {
            job_id,
            candidate_id,
            cv_id,
        };
        self.remote
            .request(
                &format!("/recruiter/jobs/{job_id}/match"),
                RequestOptions::post_json(&body)?,
            )
            .await
    }

    pub async fn bookmark_candidate(
        &self,
        candidate_id: &str,
        note: &str,
    ) -> ClientResult<Bookmark> {
        self.first_row(
            &format!("/recruiter/candidates/{candidate_id}/bookmark"),
            RequestOptions::post_json(&NoteBody { note })?,
        )
        .await
    }

    pub async fn add_candidate_note(
        &self,
        candidate_id: &str,
        note: &str,
    ) -> ClientResult<CandidateNote> {
        validate_candidate_note(note)?;
        self.first_row(
            &format!("/recruiter/candidates/{candidate_id}/notes"),
            RequestOptions::post_json(&NoteBody { note: note.trim() })?,
        )
        .await
    }

    // ── Admin ───────────────────────────────────────────────────────────────

    pub async fn admin_users(&self) -> ClientResult<Vec<AdminUser>> {
        self.remote.request("/admin/users", RequestOptions::get()).await
    }

    /// Sets an account's moderation status (e.g. `active`, `suspended`).
    pub async fn set_user_status(&self, user_id: &str, status: &str) -> ClientResult<AdminUser> {
        let options = RequestOptions::patch_empty().query("status", status);
        let user: AdminUser = self
            .first_row(&format!("/admin/users/{user_id}"), options)
            .await?;
        info!("User {user_id} set to {status}");
        Ok(user)
    }

    pub async fn admin_posts(&self) -> ClientResult<Vec<Post>> {
        self.remote.request("/admin/posts", RequestOptions::get()).await
    }

    /// Hides a post from the feed. `status` defaults to `hidden` server-side.
    pub async fn moderate_post(&self, post_id: &str, status: &str) -> ClientResult<Post> {
        let options = RequestOptions::patch_empty().query("status", status);
        let post: Post = self
            .first_row(&format!("/admin/posts/{post_id}/moderate"), options)
            .await?;
        info!("Post {post_id} moderated to {status}");
        Ok(post)
    }

    // ── Notifications ───────────────────────────────────────────────────────

    pub async fn notifications(&self) -> ClientResult<Vec<Notification>> {
        self.remote.request("/notifications", RequestOptions::get()).await
    }

    pub async fn mark_notification_read(&self, id: &str) -> ClientResult<()> {
        let ack: Ack = self
            .remote
            .request(
                &format!("/notifications/{id}/read"),
                RequestOptions::post_empty(),
            )
            .await?;
        debug!("Notification {id} read (ack={})", ack.ok);
        Ok(())
    }
}

fn newest_first(mut jobs: Vec<Job>) -> Vec<Job> {
    jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    jobs
}

#[async_trait]
impl RecruitmentBackend for RestBackend {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn list_public_jobs(&self) -> ClientResult<Vec<Job>> {
        let rows: Vec<JobRow> = self.remote.request("/jobs", RequestOptions::get()).await?;
        let jobs = rows.into_iter().map(Job::from).filter(|j| j.is_active).collect();
        Ok(newest_first(jobs))
    }

    async fn get_job(&self, slug: &str) -> ClientResult<Job> {
        let row: JobRow = self
            .remote
            .request(&format!("/jobs/{slug}"), RequestOptions::get())
            .await?;
        Ok(row.into())
    }

    async fn list_owned_jobs(&self, _owner: &str) -> ClientResult<Vec<Job>> {
        let rows: Vec<JobRow> = self
            .remote
            .request("/recruiter/jobs", RequestOptions::get())
            .await?;
        Ok(newest_first(rows.into_iter().map(Job::from).collect()))
    }

    async fn create_job(&self, _owner: &str, draft: &JobDraft) -> ClientResult<Job> {
        let options = RequestOptions::post_json(&JobWrite::from_draft(draft))?;
        let row: JobRow = self.first_row("/recruiter/jobs", options).await?;
        Ok(row.into())
    }

    async fn update_job(&self, current: &Job, patch: &JobPatch) -> ClientResult<Job> {
        let merged = patch.merged_into(current);
        let path = format!("/recruiter/jobs/{}", current.id);
        let options = RequestOptions::put_json(&JobWrite::from_job(&merged))?;
        let reply: OneOrMany<JobRow> = self.remote.request(&path, options).await?;
        match reply.into_first() {
            Some(row) => Ok(row.into()),
            // Some deployments answer an update with no rows; read back the saved state.
            None => self.recruiter_job(&current.id).await,
        }
    }

    async fn delete_job(&self, _id: &str) -> ClientResult<()> {
        Err(ClientError::Unsupported("Deleting jobs"))
    }

    async fn get_profile(&self, owner: &str) -> ClientResult<Profile> {
        Ok(self.fetch_candidate_profile().await?.into_profile(owner))
    }

    async fn update_profile(&self, owner: &str, patch: &ProfilePatch) -> ClientResult<Profile> {
        // PUT replaces the row, so unchanged fields are sent back as read.
        let mut profile = self.fetch_candidate_profile().await?;
        profile.apply(patch);
        Ok(self.put_candidate_profile(&profile).await?.into_profile(owner))
    }

    async fn upload_resume(&self, _owner: &str, file: FileUpload) -> ClientResult<String> {
        Ok(self.upload_cv(file).await?.path)
    }

    async fn list_skills(&self, _owner: &str) -> ClientResult<Vec<Skill>> {
        let profile = self.fetch_candidate_profile().await?;
        Ok(profile
            .skills
            .into_iter()
            .map(|name| Skill {
                id: name.clone(),
                name,
            })
            .collect())
    }

    async fn add_skill(&self, _owner: &str, name: &str) -> ClientResult<Skill> {
        let mut profile = self.fetch_candidate_profile().await?;
        if profile.has_skill(name) {
            return Err(ClientError::Conflict(SKILL_CONFLICT_MESSAGE.to_string()));
        }
        profile.skills.push(name.to_string());
        let saved = self.put_candidate_profile(&profile).await?;
        let stored = saved
            .skills
            .into_iter()
            .find(|s| s.eq_ignore_ascii_case(name))
            .ok_or_else(|| ClientError::MissingRecord {
                path: "/candidate/profile".to_string(),
            })?;
        Ok(Skill {
            id: stored.clone(),
            name: stored,
        })
    }

    async fn remove_skill(&self, _owner: &str, skill: &Skill) -> ClientResult<()> {
        let mut profile = self.fetch_candidate_profile().await?;
        profile.skills.retain(|s| s != &skill.name);
        self.put_candidate_profile(&profile).await.map(|_| ())
    }

    async fn list_experience(&self, _owner: &str) -> ClientResult<Vec<Experience>> {
        Err(ClientError::Unsupported("Work experience"))
    }

    async fn add_experience(
        &self,
        _owner: &str,
        _draft: &ExperienceDraft,
    ) -> ClientResult<Experience> {
        Err(ClientError::Unsupported("Work experience"))
    }

    async fn update_experience(
        &self,
        _current: &Experience,
        _patch: &ExperiencePatch,
    ) -> ClientResult<Experience> {
        Err(ClientError::Unsupported("Work experience"))
    }

    async fn delete_experience(&self, _id: &str) -> ClientResult<()> {
        Err(ClientError::Unsupported("Work experience"))
    }

    async fn list_posts(&self, _owner: &str) -> ClientResult<Vec<Post>> {
        self.remote.request("/candidate/posts", RequestOptions::get()).await
    }

    async fn create_post(&self, _owner: &str, draft: &PostDraft) -> ClientResult<Post> {
        self.first_row("/candidate/posts", RequestOptions::post_json(draft)?)
            .await
    }
}

#[async_trait]
impl MatchingApi for RestBackend {
    async fn match_check(&self, request: &MatchCheckRequest) -> ClientResult<MatchCheckResponse> {
        self.remote
            .request("/candidate/match-check", RequestOptions::post_json(request)?)
            .await
    }

    async fn list_cvs(&self) -> ClientResult<Vec<CvItem>> {
        self.remote.request("/candidate/cvs", RequestOptions::get()).await
    }

    async fn job_applications(
        &self,
        job_id: &str,
        include_best: bool,
    ) -> ClientResult<Vec<Application>> {
        let options = RequestOptions::get().query("include_best", include_best.to_string());
        self.remote
            .request(&format!("/recruiter/jobs/{job_id}/applications"), options)
            .await
    }

    async fn score_all(&self, job_id: &str) -> ClientResult<ScoreAllSummary> {
        self.remote
            .request(
                &format!("/recruiter/jobs/{job_id}/applications/score"),
                RequestOptions::post_empty(),
            )
            .await
    }

    async fn score_one(&self, job_id: &str, application_id: &str) -> ClientResult<ScoreResult> {
        self.remote
            .request(
                &format!("/recruiter/jobs/{job_id}/applications/{application_id}/score"),
                RequestOptions::post_empty(),
            )
            .await
    }
}
