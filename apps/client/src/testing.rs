//! In-memory fakes of the auth and backend ports, and a one-shot HTTP
//! responder for adapter tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::StatusCode;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::backend::{MatchingApi, RecruitmentBackend};
use crate::errors::{AuthFailure, ClientError, ClientResult};
use crate::models::api::{
    CvItem, MatchCheckRequest, MatchCheckResponse, ScoreAllSummary, ScoreResult,
};
use crate::models::{
    Application, Credential, Experience, ExperienceDraft, ExperiencePatch, Identity, Job,
    JobDraft, JobPatch, Post, PostDraft, Profile, ProfilePatch, Role, Skill,
};
use crate::remote::FileUpload;
use crate::session::{
    AuthBackend, AuthEvent, AuthSession, MetadataRoleSource, RoleSource, SignUpRequest,
};

// ────────────────────────────────────────────────────────────────────────────
// One-shot HTTP responder
// ────────────────────────────────────────────────────────────────────────────

pub struct CannedResponse {
    status: u16,
    body: String,
}

impl CannedResponse {
    pub fn new(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }

    pub fn ok(body: &str) -> Self {
        Self::new(200, body)
    }
}

/// Accepts one connection, answers it with `response` and yields the raw
/// request text.
pub async fn serve_once(response: CannedResponse) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let raw = read_request(&mut stream).await;
        let reply = format!(
            "HTTP/1.1 {} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            response.status,
            response.body.len(),
            response.body
        );
        stream.write_all(reply.as_bytes()).await.unwrap();
        stream.shutdown().await.ok();
        raw
    });

    (format!("http://{addr}"), handle)
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + len {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

// ────────────────────────────────────────────────────────────────────────────
// Auth
// ────────────────────────────────────────────────────────────────────────────

struct Account {
    id: Uuid,
    password: String,
    metadata: serde_json::Value,
}

pub struct MemoryAuth {
    accounts: Mutex<HashMap<String, Account>>,
    current: Mutex<Option<AuthSession>>,
    events: broadcast::Sender<AuthEvent>,
    confirm_email: bool,
    calls: AtomicUsize,
    issued: AtomicUsize,
}

impl MemoryAuth {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            accounts: Mutex::new(HashMap::new()),
            current: Mutex::new(None),
            events,
            confirm_email: false,
            calls: AtomicUsize::new(0),
            issued: AtomicUsize::new(0),
        }
    }

    /// Sign-up creates the account but issues no session.
    pub fn requiring_confirmation(mut self) -> Self {
        self.confirm_email = true;
        self
    }

    pub fn register(&self, email: &str, password: &str, role: Role) -> Uuid {
        let id = Uuid::new_v4();
        self.accounts.lock().unwrap().insert(
            email.to_string(),
            Account {
                id,
                password: password.to_string(),
                metadata: json!({ "full_name": email, "role": role.as_str() }),
            },
        );
        id
    }

    /// Number of auth calls that reached the backend.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn issue(&self, email: &str, id: Uuid, metadata: serde_json::Value) -> AuthSession {
        let n = self.issued.fetch_add(1, Ordering::SeqCst);
        let session = AuthSession {
            identity: Identity {
                id,
                email: email.to_string(),
            },
            credential: Credential::new(format!("access-{n}")),
            refresh_token: Some(format!("refresh-{n}")),
            expires_at: None,
            metadata,
        };
        *self.current.lock().unwrap() = Some(session.clone());
        session
    }
}

#[async_trait]
impl AuthBackend for MemoryAuth {
    async fn sign_in(&self, email: &str, password: &str) -> ClientResult<AuthSession> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (id, metadata) = {
            let accounts = self.accounts.lock().unwrap();
            match accounts.get(email) {
                Some(a) if a.password == password => (a.id, a.metadata.clone()),
                _ => return Err(AuthFailure::InvalidCredentials.into()),
            }
        };
        let session = self.issue(email, id, metadata);
        let _ = self.events.send(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, request: &SignUpRequest) -> ClientResult<Option<AuthSession>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let id = Uuid::new_v4();
        let metadata = json!({ "full_name": request.display_name, "role": request.role.as_str() });
        {
            let mut accounts = self.accounts.lock().unwrap();
            if accounts.contains_key(&request.email) {
                return Err(AuthFailure::AlreadyRegistered.into());
            }
            accounts.insert(
                request.email.clone(),
                Account {
                    id,
                    password: request.password.clone(),
                    metadata: metadata.clone(),
                },
            );
        }
        if self.confirm_email {
            return Ok(None);
        }
        let session = self.issue(&request.email, id, metadata);
        let _ = self.events.send(AuthEvent::SignedIn(session.clone()));
        Ok(Some(session))
    }

    async fn sign_out(&self) -> ClientResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.current.lock().unwrap() = None;
        let _ = self.events.send(AuthEvent::SignedOut);
        Ok(())
    }

    async fn current_session(&self) -> ClientResult<Option<AuthSession>> {
        Ok(self.current.lock().unwrap().clone())
    }

    async fn refresh(&self) -> ClientResult<AuthSession> {
        let current = self
            .current
            .lock()
            .unwrap()
            .clone()
            .ok_or(ClientError::Unauthenticated)?;
        let session = self.issue(
            &current.identity.email,
            current.identity.id,
            current.metadata,
        );
        let _ = self.events.send(AuthEvent::TokenRefreshed(session.clone()));
        Ok(session)
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

/// Metadata roles, with a per-email lookup latency.
#[derive(Default)]
pub struct DelayedRoles {
    delays: Mutex<HashMap<String, Duration>>,
}

impl DelayedRoles {
    pub fn delay(self, email: &str, delay: Duration) -> Self {
        self.delays.lock().unwrap().insert(email.to_string(), delay);
        self
    }
}

#[async_trait]
impl RoleSource for DelayedRoles {
    async fn resolve(&self, session: &AuthSession) -> ClientResult<Option<Role>> {
        let delay = self
            .delays
            .lock()
            .unwrap()
            .get(&session.identity.email)
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        MetadataRoleSource.resolve(session).await
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Recruitment backend
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Store {
    jobs: Vec<Job>,
    profiles: HashMap<String, Profile>,
    skills: Vec<(String, Skill)>,
    experience: Vec<(String, Experience)>,
    posts: Vec<Post>,
    next_id: u64,
}

impl Store {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

/// Backend fake with failure injection and per-owner latency.
#[derive(Default)]
pub struct MemoryBackend {
    store: Mutex<Store>,
    fail_next: Mutex<Option<(u16, String)>>,
    owner_delays: Mutex<HashMap<String, Duration>>,
    calls: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next call fails with this status and body.
    pub fn fail_next(&self, status: u16, body: &str) {
        *self.fail_next.lock().unwrap() = Some((status, body.to_string()));
    }

    /// Owner-scoped list calls for `owner` take this long.
    pub fn delay_owner(&self, owner: &str, delay: Duration) {
        self.owner_delays
            .lock()
            .unwrap()
            .insert(owner.to_string(), delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Inserts a job; `day` orders creation (higher is newer).
    pub fn seed_job(&self, owner: &str, title: &str, active: bool, day: u32) -> Job {
        let mut store = self.store.lock().unwrap();
        let id = store.next_id("job");
        let job = Job {
            slug: format!("{}-{id}", title.to_lowercase().replace(' ', "-")),
            id,
            owner_id: Some(owner.to_string()),
            title: title.to_string(),
            company: "Acme".to_string(),
            location: Some("Berlin".to_string()),
            job_type: Some("full-time".to_string()),
            salary_min: None,
            salary_max: None,
            description: Some("Build the platform".to_string()),
            requirements: None,
            skills: vec![],
            is_active: active,
            created_at: Utc.with_ymd_and_hms(2024, 1, day, 9, 0, 0).unwrap(),
        };
        store.jobs.push(job.clone());
        job
    }

    pub fn stored_jobs(&self) -> Vec<Job> {
        self.store.lock().unwrap().jobs.clone()
    }

    pub fn stored_skills(&self, owner: &str) -> Vec<Skill> {
        self.store
            .lock()
            .unwrap()
            .skills
            .iter()
            .filter(|(o, _)| o == owner)
            .map(|(_, s)| s.clone())
            .collect()
    }

    async fn enter(&self, owner: Option<&str>) -> ClientResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = owner.and_then(|o| self.owner_delays.lock().unwrap().get(o).copied());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some((status, body)) = self.fail_next.lock().unwrap().take() {
            let status = StatusCode::from_u16(status).unwrap();
            return Err(ClientError::from_status(status, &body));
        }
        Ok(())
    }
}

fn not_found(what: &str) -> ClientError {
    ClientError::from_status(StatusCode::NOT_FOUND, &format!("{what} not found"))
}

#[async_trait]
impl RecruitmentBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn list_public_jobs(&self) -> ClientResult<Vec<Job>> {
        self.enter(None).await?;
        let mut jobs: Vec<Job> = self
            .store
            .lock()
            .unwrap()
            .jobs
            .iter()
            .filter(|j| j.is_active)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    async fn get_job(&self, slug: &str) -> ClientResult<Job> {
        self.enter(None).await?;
        self.store
            .lock()
            .unwrap()
            .jobs
            .iter()
            .find(|j| j.slug == slug || j.id == slug)
            .cloned()
            .ok_or_else(|| not_found("Job"))
    }

    async fn list_owned_jobs(&self, owner: &str) -> ClientResult<Vec<Job>> {
        self.enter(Some(owner)).await?;
        let mut jobs: Vec<Job> = self
            .store
            .lock()
            .unwrap()
            .jobs
            .iter()
            .filter(|j| j.owner_id.as_deref() == Some(owner))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    async fn create_job(&self, owner: &str, draft: &JobDraft) -> ClientResult<Job> {
        self.enter(None).await?;
        let mut store = self.store.lock().unwrap();
        let id = store.next_id("job");
        let job = Job {
            slug: id.clone(),
            id,
            owner_id: Some(owner.to_string()),
            title: draft.title.clone(),
            company: draft.company.clone(),
            location: Some(draft.location.clone()),
            job_type: Some(draft.job_type.clone()),
            salary_min: draft.salary_min,
            salary_max: draft.salary_max,
            description: Some(draft.description.clone()),
            requirements: draft.requirements.clone(),
            skills: draft.skills.clone(),
            is_active: true,
            created_at: Utc::now(),
        };
        store.jobs.push(job.clone());
        Ok(job)
    }

    async fn update_job(&self, current: &Job, patch: &JobPatch) -> ClientResult<Job> {
        self.enter(None).await?;
        let mut store = self.store.lock().unwrap();
        let stored = store
            .jobs
            .iter_mut()
            .find(|j| j.id == current.id)
            .ok_or_else(|| not_found("Job"))?;
        *stored = patch.merged_into(stored);
        Ok(stored.clone())
    }

    async fn delete_job(&self, id: &str) -> ClientResult<()> {
        self.enter(None).await?;
        self.store.lock().unwrap().jobs.retain(|j| j.id != id);
        Ok(())
    }

    async fn get_profile(&self, owner: &str) -> ClientResult<Profile> {
        self.enter(Some(owner)).await?;
        Ok(self
            .store
            .lock()
            .unwrap()
            .profiles
            .get(owner)
            .cloned()
            .unwrap_or_else(|| Profile {
                owner_id: owner.to_string(),
                ..Default::default()
            }))
    }

    async fn update_profile(&self, owner: &str, patch: &ProfilePatch) -> ClientResult<Profile> {
        self.enter(None).await?;
        let mut store = self.store.lock().unwrap();
        let profile = store
            .profiles
            .entry(owner.to_string())
            .or_insert_with(|| Profile {
                owner_id: owner.to_string(),
                ..Default::default()
            });
        *profile = patch.merged_into(profile);
        Ok(profile.clone())
    }

    async fn upload_resume(&self, owner: &str, file: FileUpload) -> ClientResult<String> {
        self.enter(None).await?;
        let path = format!("{owner}/{}", file.file_name());
        let mut store = self.store.lock().unwrap();
        store
            .profiles
            .entry(owner.to_string())
            .or_insert_with(|| Profile {
                owner_id: owner.to_string(),
                ..Default::default()
            })
            .resume_ref = Some(path.clone());
        Ok(path)
    }

    async fn list_skills(&self, owner: &str) -> ClientResult<Vec<Skill>> {
        self.enter(Some(owner)).await?;
        Ok(self.stored_skills(owner))
    }

    async fn add_skill(&self, owner: &str, name: &str) -> ClientResult<Skill> {
        self.enter(None).await?;
        let mut store = self.store.lock().unwrap();
        if store.skills.iter().any(|(o, s)| o == owner && s.name == name) {
            return Err(ClientError::from_status(
                StatusCode::CONFLICT,
                r#"{"code":"23505","message":"duplicate key value violates unique constraint"}"#,
            ));
        }
        let skill = Skill {
            id: store.next_id("skill"),
            name: name.to_string(),
        };
        store.skills.push((owner.to_string(), skill.clone()));
        Ok(skill)
    }

    async fn remove_skill(&self, owner: &str, skill: &Skill) -> ClientResult<()> {
        self.enter(None).await?;
        self.store
            .lock()
            .unwrap()
            .skills
            .retain(|(o, s)| !(o == owner && s.id == skill.id));
        Ok(())
    }

    async fn list_experience(&self, owner: &str) -> ClientResult<Vec<Experience>> {
        self.enter(Some(owner)).await?;
        let mut entries: Vec<Experience> = self
            .store
            .lock()
            .unwrap()
            .experience
            .iter()
            .filter(|(o, _)| o == owner)
            .map(|(_, e)| e.clone())
            .collect();
        entries.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        Ok(entries)
    }

    async fn add_experience(
        &self,
        owner: &str,
        draft: &ExperienceDraft,
    ) -> ClientResult<Experience> {
        self.enter(None).await?;
        let mut store = self.store.lock().unwrap();
        let entry = Experience {
            id: store.next_id("exp"),
            job_title: draft.job_title.clone(),
            company: draft.company.clone(),
            location: None,
            start_date: draft.start_date,
            end_date: None,
            is_current: draft.is_current,
            description: None,
        };
        store.experience.push((owner.to_string(), entry.clone()));
        Ok(entry)
    }

    async fn update_experience(
        &self,
        current: &Experience,
        patch: &ExperiencePatch,
    ) -> ClientResult<Experience> {
        self.enter(None).await?;
        let mut store = self.store.lock().unwrap();
        let (_, stored) = store
            .experience
            .iter_mut()
            .find(|(_, e)| e.id == current.id)
            .ok_or_else(|| not_found("Experience"))?;
        *stored = patch.merged_into(stored);
        Ok(stored.clone())
    }

    async fn delete_experience(&self, id: &str) -> ClientResult<()> {
        self.enter(None).await?;
        self.store.lock().unwrap().experience.retain(|(_, e)| e.id != id);
        Ok(())
    }

    async fn list_posts(&self, owner: &str) -> ClientResult<Vec<Post>> {
        self.enter(Some(owner)).await?;
        Ok(self
            .store
            .lock()
            .unwrap()
            .posts
            .iter()
            .filter(|p| p.author_id.as_deref() == Some(owner))
            .cloned()
            .collect())
    }

    async fn create_post(&self, owner: &str, draft: &PostDraft) -> ClientResult<Post> {
        self.enter(None).await?;
        let mut store = self.store.lock().unwrap();
        let post = Post {
            id: store.next_id("post"),
            author_id: Some(owner.to_string()),
            body: draft.body.clone(),
            visibility: draft.visibility,
            created_at: Some(Utc::now()),
        };
        store.posts.push(post.clone());
        Ok(post)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Matching
// ────────────────────────────────────────────────────────────────────────────

/// Scores every application by the number of its matched skills.
#[derive(Default)]
pub struct MemoryMatching {
    applications: Mutex<Vec<Application>>,
    cvs: Vec<CvItem>,
    fail_next: Mutex<Option<(u16, String)>>,
    fail_listing: Mutex<Option<u16>>,
    calls: AtomicUsize,
}

impl MemoryMatching {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cv(mut self, id: &str) -> Self {
        self.cvs.push(CvItem {
            id: id.to_string(),
            file_url: format!("cvs/{id}.pdf"),
            created_at: None,
        });
        self
    }

    pub fn seed_application(&self, job_id: &str, candidate_id: &str, matched: &[&str]) -> String {
        let mut apps = self.applications.lock().unwrap();
        let id = format!("app-{}", apps.len() + 1);
        apps.push(Application {
            id: id.clone(),
            job_id: job_id.to_string(),
            candidate_id: candidate_id.to_string(),
            cv_id: None,
            status: Default::default(),
            applied_at: None,
            match_score: None,
            match_level: None,
            matched_skills: matched.iter().map(|s| s.to_string()).collect(),
            missing_skills: vec![],
            rationale: None,
            best_fit: None,
            email: Some(format!("{candidate_id}@mail.io")),
        });
        id
    }

    pub fn fail_next(&self, status: u16, body: &str) {
        *self.fail_next.lock().unwrap() = Some((status, body.to_string()));
    }

    /// Fails the next applications listing only; scoring still succeeds.
    pub fn fail_next_listing(&self, status: u16) {
        *self.fail_listing.lock().unwrap() = Some(status);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> ClientResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some((status, body)) = self.fail_next.lock().unwrap().take() {
            let status = StatusCode::from_u16(status).unwrap();
            return Err(ClientError::from_status(status, &body));
        }
        Ok(())
    }

    fn mark_best(apps: &mut [Application], job_id: &str) -> Option<String> {
        let best = apps
            .iter()
            .filter(|a| a.job_id == job_id)
            .max_by(|a, b| {
                a.match_score
                    .unwrap_or(0.0)
                    .total_cmp(&b.match_score.unwrap_or(0.0))
            })
            .map(|a| a.id.clone());
        for app in apps.iter_mut().filter(|a| a.job_id == job_id) {
            app.best_fit = Some(Some(&app.id) == best.as_ref());
        }
        best
    }
}

#[async_trait]
impl MatchingApi for MemoryMatching {
    async fn match_check(&self, request: &MatchCheckRequest) -> ClientResult<MatchCheckResponse> {
        self.enter()?;
        let matched: Vec<String> = ["Rust", "SQL"]
            .iter()
            .filter(|s| request.jd_text.contains(*s))
            .map(|s| s.to_string())
            .collect();
        Ok(MatchCheckResponse {
            score: matched.len() as f64 * 50.0,
            matched_skills: matched,
            missing_skills: vec!["Kubernetes".to_string()],
            suggestions: "Mention infrastructure work".to_string(),
        })
    }

    async fn list_cvs(&self) -> ClientResult<Vec<CvItem>> {
        self.enter()?;
        Ok(self.cvs.clone())
    }

    async fn job_applications(
        &self,
        job_id: &str,
        include_best: bool,
    ) -> ClientResult<Vec<Application>> {
        self.enter()?;
        if let Some(status) = self.fail_listing.lock().unwrap().take() {
            return Err(ClientError::from_status(StatusCode::from_u16(status).unwrap(), ""));
        }
        let mut all = self.applications.lock().unwrap();
        if include_best {
            Self::mark_best(&mut all, job_id);
        }
        let mut apps: Vec<Application> =
            all.iter().filter(|a| a.job_id == job_id).cloned().collect();
        apps.sort_by(|a, b| {
            b.match_score
                .unwrap_or(-1.0)
                .total_cmp(&a.match_score.unwrap_or(-1.0))
        });
        Ok(apps)
    }

    async fn score_all(&self, job_id: &str) -> ClientResult<ScoreAllSummary> {
        self.enter()?;
        let mut apps = self.applications.lock().unwrap();
        let mut scored = 0;
        for app in apps.iter_mut().filter(|a| a.job_id == job_id) {
            app.match_score = Some(app.matched_skills.len() as f64 * 25.0);
            scored += 1;
        }
        let best_fit_id = if scored > 0 {
            Self::mark_best(&mut apps, job_id)
        } else {
            None
        };
        Ok(ScoreAllSummary {
            scored,
            best_fit_id,
        })
    }

    async fn score_one(&self, job_id: &str, application_id: &str) -> ClientResult<ScoreResult> {
        self.enter()?;
        let mut apps = self.applications.lock().unwrap();
        let app = apps
            .iter_mut()
            .find(|a| a.job_id == job_id && a.id == application_id)
            .ok_or_else(|| not_found("Application"))?;
        let score = app.matched_skills.len() as f64 * 25.0;
        app.match_score = Some(score);
        let result = ScoreResult {
            job_id: job_id.to_string(),
            candidate_id: app.candidate_id.clone(),
            score,
            match_level: None,
            matched_skills: app.matched_skills.clone(),
            missing_skills: vec![],
            rationale: "skill overlap".to_string(),
            created_at: Utc::now(),
        };
        Self::mark_best(&mut apps, job_id);
        Ok(result)
    }
}
