//! BaaS table/storage adapter.
//!
//! Rows are read and written through the project's REST surface
//! (`/rest/v1/<table>` with `col=eq.value` filters) and files go to
//! `/storage/v1/object/<bucket>/<path>`. Row-level security on the project
//! scopes every call to the bearer credential's owner.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use tracing::info;

use crate::backend::{RecruitmentBackend, SKILL_CONFLICT_MESSAGE};
use crate::errors::{ClientError, ClientResult};
use crate::models::{
    Credential, Experience, ExperienceDraft, ExperiencePatch, Job, JobDraft, JobPatch, Post,
    PostDraft, PostVisibility, Profile, ProfilePatch, Skill,
};
use crate::remote::{CredentialSource, FileUpload, RemoteClient, RequestOptions};
use crate::session::SessionHandle;

pub mod auth;

pub use auth::BaasAuth;

const RESUME_BUCKET: &str = "resumes";

// ────────────────────────────────────────────────────────────────────────────
// Credentials and queries
// ────────────────────────────────────────────────────────────────────────────

/// Bearer for BaaS calls: the session's token, or the project's anon key
/// for public reads.
pub struct BaasCredentials {
    session: SessionHandle,
    anon: Credential,
}

impl BaasCredentials {
    pub fn new(session: SessionHandle, anon_key: &str) -> Self {
        Self {
            session,
            anon: Credential::new(anon_key),
        }
    }
}

impl CredentialSource for BaasCredentials {
    fn bearer(&self) -> Option<Credential> {
        self.session.bearer().or_else(|| Some(self.anon.clone()))
    }
}

/// Equality filters and ordering for a table call.
#[derive(Debug, Default, Clone)]
pub struct Query {
    params: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Display) -> Self {
        self.params.push((column.to_string(), format!("eq.{value}")));
        self
    }

    pub fn order_desc(mut self, column: &str) -> Self {
        self.params.push(("order".to_string(), format!("{column}.desc")));
        self
    }

    fn apply(self, mut options: RequestOptions) -> RequestOptions {
        for (key, value) in self.params {
            options = options.query(key, value);
        }
        options
    }
}

fn table_path(table: &str) -> String {
    format!("/rest/v1/{table}")
}

// ────────────────────────────────────────────────────────────────────────────
// Row shapes
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct JobRow {
    id: String,
    #[serde(default)]
    recruiter_id: Option<String>,
    title: String,
    company: String,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    job_type: Option<String>,
    #[serde(default)]
    salary_min: Option<i64>,
    #[serde(default)]
    salary_max: Option<i64>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    requirements: Option<String>,
    #[serde(default = "active_by_default")]
    is_active: bool,
    created_at: DateTime<Utc>,
}

fn active_by_default() -> bool {
    true
}

impl From<JobRow> for Job {
    fn from(row: JobRow) -> Self {
        Job {
            // The jobs table has no slug column; the id is the public key.
            slug: row.id.clone(),
            id: row.id,
            owner_id: row.recruiter_id,
            title: row.title,
            company: row.company,
            location: row.location,
            job_type: row.job_type,
            salary_min: row.salary_min,
            salary_max: row.salary_max,
            description: row.description,
            requirements: row.requirements,
            skills: Vec::new(),
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct JobInsert<'a> {
    recruiter_id: &'a str,
    title: &'a str,
    company: &'a str,
    location: &'a str,
    job_type: &'a str,
    salary_min: Option<i64>,
    salary_max: Option<i64>,
    description: &'a str,
    requirements: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    id: String,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    headline: Option<String>,
    #[serde(default)]
    bio: Option<String>,
    #[serde(default)]
    resume_url: Option<String>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Profile {
            owner_id: row.id,
            full_name: row.full_name,
            headline: row.headline,
            bio: row.bio,
            resume_ref: row.resume_url,
            ..Default::default()
        }
    }
}

/// Columns of `profiles` a patch may touch.
#[derive(Debug, Serialize)]
struct ProfileUpdate<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    full_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    headline: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bio: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SkillRow {
    id: String,
    skill_name: String,
}

impl From<SkillRow> for Skill {
    fn from(row: SkillRow) -> Self {
        Skill {
            id: row.id,
            name: row.skill_name,
        }
    }
}

#[derive(Debug, Serialize)]
struct SkillInsert<'a> {
    user_id: &'a str,
    skill_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct ExperienceRow {
    id: String,
    job_title: String,
    company: String,
    #[serde(default)]
    location: Option<String>,
    start_date: NaiveDate,
    #[serde(default)]
    end_date: Option<NaiveDate>,
    #[serde(default)]
    is_current: bool,
    #[serde(default)]
    description: Option<String>,
}

impl From<ExperienceRow> for Experience {
    fn from(row: ExperienceRow) -> Self {
        Experience {
            id: row.id,
            job_title: row.job_title,
            company: row.company,
            location: row.location,
            start_date: row.start_date,
            end_date: row.end_date,
            is_current: row.is_current,
            description: row.description,
        }
    }
}

#[derive(Debug, Serialize)]
struct ExperienceInsert<'a> {
    user_id: &'a str,
    #[serde(flatten)]
    draft: &'a ExperienceDraft,
}

#[derive(Debug, Serialize)]
struct PostInsert<'a> {
    candidate_id: &'a str,
    body: &'a str,
    visibility: PostVisibility,
}

#[derive(Debug, Serialize)]
struct ResumeRef<'a> {
    resume_url: &'a str,
}

// ────────────────────────────────────────────────────────────────────────────
// Adapter
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct BaasBackend {
    remote: RemoteClient,
}

impl BaasBackend {
    /// `remote` must carry the project's `apikey` header and `BaasCredentials`.
    pub fn new(remote: RemoteClient) -> Self {
        Self { remote }
    }

    async fn select<T: DeserializeOwned>(&self, table: &str, query: Query) -> ClientResult<Vec<T>> {
        let options = query.apply(RequestOptions::get().query("select", "*"));
        self.remote.request(&table_path(table), options).await
    }

    async fn insert<T, B>(&self, table: &str, body: &B) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + Sync,
    {
        let options =
            RequestOptions::post_json(body)?.header("prefer", "return=representation");
        first(table, self.remote.request(&table_path(table), options).await?)
    }

    async fn update<T, B>(&self, table: &str, query: Query, body: &B) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + Sync,
    {
        let options = query.apply(
            RequestOptions::patch_json(body)?.header("prefer", "return=representation"),
        );
        first(table, self.remote.request(&table_path(table), options).await?)
    }

    async fn delete(&self, table: &str, query: Query) -> ClientResult<()> {
        let options = query.apply(RequestOptions::delete());
        self.remote.request_unit(&table_path(table), options).await
    }

    async fn upload_object(&self, bucket: &str, path: &str, file: FileUpload) -> ClientResult<()> {
        self.remote
            .request_unit(
                &object_path(bucket, path),
                RequestOptions::upload("file", file),
            )
            .await
    }
}

/// Storage URL path for an object key. Each key segment is percent-encoded;
/// the `/` separators are kept.
fn object_path(bucket: &str, key: &str) -> String {
    let key: Vec<_> = key.split('/').map(urlencoding::encode).collect();
    format!("/storage/v1/object/{bucket}/{}", key.join("/"))
}

/// First row of a `return=representation` reply; none means the filter
/// matched nothing the caller may write.
fn first<T>(table: &str, rows: Vec<T>) -> ClientResult<T> {
    rows.into_iter()
        .next()
        .ok_or_else(|| ClientError::MissingRecord {
            path: table_path(table),
        })
}

#[async_trait]
impl RecruitmentBackend for BaasBackend {
    fn name(&self) -> &'static str {
        "baas"
    }

    async fn list_public_jobs(&self) -> ClientResult<Vec<Job>> {
        let rows: Vec<JobRow> = self
            .select(
                "jobs",
                Query::new().eq("is_active", true).order_desc("created_at"),
            )
            .await?;
        Ok(rows.into_iter().map(Job::from).collect())
    }

    async fn get_job(&self, slug: &str) -> ClientResult<Job> {
        let rows: Vec<JobRow> = self.select("jobs", Query::new().eq("id", slug)).await?;
        rows.into_iter()
            .next()
            .map(Job::from)
            .ok_or_else(|| ClientError::Http {
                status: 404,
                message: "Job not found".to_string(),
            })
    }

    async fn list_owned_jobs(&self, owner: &str) -> ClientResult<Vec<Job>> {
        let rows: Vec<JobRow> = self
            .select(
                "jobs",
                Query::new().eq("recruiter_id", owner).order_desc("created_at"),
            )
            .await?;
        Ok(rows.into_iter().map(Job::from).collect())
    }

    async fn create_job(&self, owner: &str, draft: &JobDraft) -> ClientResult<Job> {
        let body = JobInsert {
            recruiter_id: owner,
            title: draft.title.trim(),
            company: draft.company.trim(),
            location: draft.location.trim(),
            job_type: &draft.job_type,
            salary_min: draft.salary_min,
            salary_max: draft.salary_max,
            description: draft.description.trim(),
            requirements: draft.requirements.as_deref().filter(|r| !r.trim().is_empty()),
        };
        let row: JobRow = self.insert("jobs", &body).await?;
        info!("Created job {} for {owner}", row.id);
        Ok(row.into())
    }

    async fn update_job(&self, current: &Job, patch: &JobPatch) -> ClientResult<Job> {
        let row: JobRow = self
            .update("jobs", Query::new().eq("id", &current.id), patch)
            .await?;
        Ok(row.into())
    }

    async fn delete_job(&self, id: &str) -> ClientResult<()> {
        self.delete("jobs", Query::new().eq("id", id)).await
    }

    async fn get_profile(&self, owner: &str) -> ClientResult<Profile> {
        let rows: Vec<ProfileRow> = self.select("profiles", Query::new().eq("id", owner)).await?;
        Ok(rows.into_iter().next().map(Profile::from).unwrap_or_else(|| Profile {
            owner_id: owner.to_string(),
            ..Default::default()
        }))
    }

    async fn update_profile(&self, owner: &str, patch: &ProfilePatch) -> ClientResult<Profile> {
        if patch.location.is_some() || patch.remote_pref.is_some() || patch.links.is_some() {
            return Err(ClientError::Unsupported(
                "Saving location, remote preference or links",
            ));
        }
        let body = ProfileUpdate {
            full_name: patch.full_name.as_deref(),
            headline: patch.headline.as_deref(),
            bio: patch.bio.as_deref(),
        };
        let row: ProfileRow = self
            .update("profiles", Query::new().eq("id", owner), &body)
            .await?;
        Ok(row.into())
    }

    async fn upload_resume(&self, owner: &str, file: FileUpload) -> ClientResult<String> {
        let path = format!(
            "{owner}/{}-{}",
            Utc::now().timestamp_millis(),
            file.file_name()
        );
        self.upload_object(RESUME_BUCKET, &path, file).await?;
        let _: ProfileRow = self
            .update(
                "profiles",
                Query::new().eq("id", owner),
                &ResumeRef { resume_url: &path },
            )
            .await?;
        info!("Stored resume at {RESUME_BUCKET}/{path}");
        Ok(path)
    }

    async fn list_skills(&self, owner: &str) -> ClientResult<Vec<Skill>> {
        let rows: Vec<SkillRow> = self
            .select("user_skills", Query::new().eq("user_id", owner))
            .await?;
        Ok(rows.into_iter().map(Skill::from).collect())
    }

    async fn add_skill(&self, owner: &str, name: &str) -> ClientResult<Skill> {
        let body = SkillInsert {
            user_id: owner,
            skill_name: name,
        };
        let row: SkillRow = self
            .insert("user_skills", &body)
            .await
            .map_err(|e| e.with_conflict_message(SKILL_CONFLICT_MESSAGE))?;
        Ok(row.into())
    }

    async fn remove_skill(&self, _owner: &str, skill: &Skill) -> ClientResult<()> {
        self.delete("user_skills", Query::new().eq("id", &skill.id)).await
    }

    async fn list_experience(&self, owner: &str) -> ClientResult<Vec<Experience>> {
        let rows: Vec<ExperienceRow> = self
            .select(
                "user_experience",
                Query::new().eq("user_id", owner).order_desc("start_date"),
            )
            .await?;
        Ok(rows.into_iter().map(Experience::from).collect())
    }

    async fn add_experience(
        &self,
        owner: &str,
        draft: &ExperienceDraft,
    ) -> ClientResult<Experience> {
        let body = ExperienceInsert {
            user_id: owner,
            draft,
        };
        let row: ExperienceRow = self.insert("user_experience", &body).await?;
        Ok(row.into())
    }

    async fn update_experience(
        &self,
        current: &Experience,
        patch: &ExperiencePatch,
    ) -> ClientResult<Experience> {
        let row: ExperienceRow = self
            .update("user_experience", Query::new().eq("id", &current.id), patch)
            .await?;
        Ok(row.into())
    }

    async fn delete_experience(&self, id: &str) -> ClientResult<()> {
        self.delete("user_experience", Query::new().eq("id", id)).await
    }

    async fn list_posts(&self, owner: &str) -> ClientResult<Vec<Post>> {
        self.select(
            "posts",
            Query::new().eq("candidate_id", owner).order_desc("created_at"),
        )
        .await
    }

    async fn create_post(&self, owner: &str, draft: &PostDraft) -> ClientResult<Post> {
        let body = PostInsert {
            candidate_id: owner,
            body: draft.body.trim(),
            visibility: draft.visibility,
        };
        self.insert("posts", &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::Anonymous;
    use crate::testing::{serve_once, CannedResponse};
    use std::sync::Arc;
    use std::time::Duration;

    fn backend(url: &str) -> BaasBackend {
        let remote = RemoteClient::new(url, Duration::from_secs(5), Arc::new(Anonymous))
            .unwrap()
            .with_default_header("apikey", "anon-key")
            .unwrap();
        BaasBackend::new(remote)
    }

    #[test]
    fn test_query_builds_filters_in_order() {
        let remote =
            RemoteClient::new("http://x.example", Duration::from_secs(1), Arc::new(Anonymous))
                .unwrap();
        let options = Query::new()
            .eq("recruiter_id", "r1")
            .order_desc("created_at")
            .apply(RequestOptions::get());
        let request = remote.build("/rest/v1/jobs", options).unwrap();
        assert_eq!(
            request.url().query(),
            Some("recruiter_id=eq.r1&order=created_at.desc")
        );
    }

    #[tokio::test]
    async fn test_public_jobs_query() {
        let body = r#"[{"id":"j1","recruiter_id":"r1","title":"Rust Dev","company":"Acme",
            "location":"Berlin","job_type":"full-time","salary_min":null,"salary_max":null,
            "description":"d","requirements":null,"is_active":true,
            "created_at":"2024-01-01T00:00:00+00:00"}]"#;
        let (url, request) = serve_once(CannedResponse::ok(body)).await;
        let jobs = backend(&url).list_public_jobs().await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].slug, "j1");
        let raw = request.await.unwrap();
        assert!(raw.starts_with(
            "GET /rest/v1/jobs?select=*&is_active=eq.true&order=created_at.desc "
        ));
    }

    #[tokio::test]
    async fn test_duplicate_skill_is_conflict_with_message() {
        let body = r#"{"code":"23505","details":"Key (user_id, skill_name)=(u1, React) already exists.","message":"duplicate key value violates unique constraint"}"#;
        let (url, _req) = serve_once(CannedResponse::new(409, body)).await;
        let err = backend(&url).add_skill("u1", "React").await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(err.user_message(), SKILL_CONFLICT_MESSAGE);
    }

    #[tokio::test]
    async fn test_insert_asks_for_representation() {
        let body = r#"[{"id":"s1","user_id":"u1","skill_name":"Rust"}]"#;
        let (url, request) = serve_once(CannedResponse::ok(body)).await;
        let skill = backend(&url).add_skill("u1", "Rust").await.unwrap();
        assert_eq!(skill.id, "s1");
        let raw = request.await.unwrap();
        assert!(raw.starts_with("POST /rest/v1/user_skills "));
        assert!(raw.contains("prefer: return=representation"));
        assert!(raw.contains(r#""skill_name":"Rust""#));
    }

    #[tokio::test]
    async fn test_update_with_no_visible_row_is_missing_record() {
        let (url, _req) = serve_once(CannedResponse::ok("[]")).await;
        let patch = JobPatch::active(false);
        let job: Job = JobRow {
            id: "j1".into(),
            recruiter_id: None,
            title: "T".into(),
            company: "C".into(),
            location: None,
            job_type: None,
            salary_min: None,
            salary_max: None,
            description: None,
            requirements: None,
            is_active: true,
            created_at: Utc::now(),
        }
        .into();
        let err = backend(&url).update_job(&job, &patch).await.unwrap_err();
        assert!(matches!(err, ClientError::MissingRecord { ref path } if path == "/rest/v1/jobs"));
    }

    #[tokio::test]
    async fn test_profile_fields_without_columns_are_rejected() {
        let patch = ProfilePatch {
            headline: Some("Backend engineer".into()),
            location: Some("Berlin".into()),
            ..Default::default()
        };
        let err = backend("http://127.0.0.1:9")
            .update_profile("u1", &patch)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Unsupported(_)));
    }

    #[test]
    fn test_object_path_encodes_file_names() {
        assert_eq!(
            object_path(RESUME_BUCKET, "u1/1700000000000-my cv #2?.pdf"),
            "/storage/v1/object/resumes/u1/1700000000000-my%20cv%20%232%3F.pdf"
        );
    }

    #[test]
    fn test_experience_insert_flattens_draft() {
        let draft = ExperienceDraft::placeholder(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        let body = serde_json::to_value(ExperienceInsert {
            user_id: "u1",
            draft: &draft,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "user_id": "u1",
                "job_title": "New Position",
                "company": "Company Name",
                "start_date": "2024-06-01",
                "is_current": true
            })
        );
    }
}
