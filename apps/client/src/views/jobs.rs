use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::info;

use crate::backend::RecruitmentBackend;
use crate::errors::{ClientError, ClientResult};
use crate::models::{Job, JobDraft, JobPatch};
use crate::session::SessionHandle;
use crate::validation::{validate_job_draft, validate_job_patch};
use crate::views::{owner_of, DetailModel, ListModel};

const PUBLIC_KEY: &str = "public";
const MAX_SKILL_TERMS: usize = 10;

// ────────────────────────────────────────────────────────────────────────────
// Public job board
// ────────────────────────────────────────────────────────────────────────────

/// Active jobs, newest first, plus the job currently opened.
pub struct JobBoard {
    backend: Arc<dyn RecruitmentBackend>,
    pub list: ListModel<Job>,
    pub detail: DetailModel<Job>,
}

impl JobBoard {
    pub fn new(backend: Arc<dyn RecruitmentBackend>) -> Self {
        Self {
            backend,
            list: ListModel::new(),
            detail: DetailModel::new(),
        }
    }

    pub async fn load(&self) {
        let ticket = self.list.begin_fetch(PUBLIC_KEY);
        let result = self.backend.list_public_jobs().await.map(newest_active);
        self.list.finish_fetch(ticket, result);
    }

    pub fn filtered(&self, query: &str) -> Vec<Job> {
        self.list.filtered(query)
    }

    pub async fn open(&self, slug: &str) {
        let ticket = self.detail.begin_fetch(slug);
        let result = self.backend.get_job(slug).await;
        self.detail.finish_fetch(ticket, result);
    }
}

fn newest_active(mut jobs: Vec<Job>) -> Vec<Job> {
    jobs.retain(|j| j.is_active);
    jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    jobs
}

// ────────────────────────────────────────────────────────────────────────────
// Recruiter job list
// ────────────────────────────────────────────────────────────────────────────

/// The signed-in recruiter's own jobs.
pub struct RecruiterJobs {
    backend: Arc<dyn RecruitmentBackend>,
    session: SessionHandle,
    pub list: ListModel<Job>,
}

impl RecruiterJobs {
    pub fn new(backend: Arc<dyn RecruitmentBackend>, session: SessionHandle) -> Self {
        Self {
            backend,
            session,
            list: ListModel::new(),
        }
    }

    /// Fetches the current identity's jobs. Also the explicit refresh.
    pub async fn load(&self) {
        match owner_of(&self.session.current()) {
            Ok(owner) => self.load_for(&owner).await,
            Err(e) => self.list.fail(&e),
        }
    }

    /// Fetch keyed by `owner`; a later call supersedes this one.
    pub async fn load_for(&self, owner: &str) {
        let ticket = self.list.begin_fetch(owner);
        let result = self.backend.list_owned_jobs(owner).await;
        self.list.finish_fetch(ticket, result);
    }

    pub async fn create(&self, draft: &JobDraft) -> ClientResult<Job> {
        let result = self
            .list
            .with_busy("create", async {
                validate_job_draft(draft)?;
                let owner = owner_of(&self.session.current())?;
                self.backend.create_job(&owner, draft).await
            })
            .await;
        let job = self.list.settle(result)?;
        info!("Job {} created", job.id);
        self.list.append(job.clone());
        self.list.notify("Job created");
        Ok(job)
    }

    pub async fn update(&self, id: &str, patch: &JobPatch) -> ClientResult<Job> {
        let result = self
            .list
            .with_busy(&format!("save:{id}"), async {
                validate_job_patch(patch)?;
                let current = self.listed(id)?;
                self.backend.update_job(&current, patch).await
            })
            .await;
        let job = self.list.settle(result)?;
        self.list.replace(job.clone());
        self.list.notify("Job updated");
        Ok(job)
    }

    /// Flips `is_active`. Local state changes only with the server's record.
    pub async fn toggle_active(&self, id: &str) -> ClientResult<Job> {
        let result = self
            .list
            .with_busy(&format!("toggle:{id}"), async {
                let current = self.listed(id)?;
                self.backend
                    .set_job_active(&current, !current.is_active)
                    .await
            })
            .await;
        let job = self.list.settle(result)?;
        self.list.replace(job.clone());
        self.list.notify(if job.is_active {
            "Job activated"
        } else {
            "Job deactivated"
        });
        Ok(job)
    }

    pub async fn delete(&self, id: &str) -> ClientResult<()> {
        let result = self
            .list
            .with_busy(&format!("delete:{id}"), self.backend.delete_job(id))
            .await;
        self.list.settle(result)?;
        self.list.remove(id);
        self.list.notify("Job deleted");
        Ok(())
    }

    fn listed(&self, id: &str) -> ClientResult<Job> {
        self.list.get(id).ok_or_else(|| ClientError::Http {
            status: 404,
            message: "Job not found".to_string(),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

/// Salary range label for a job card. Zero counts as unset.
pub fn format_salary(min: Option<i64>, max: Option<i64>) -> Option<String> {
    let min = min.filter(|v| *v != 0);
    let max = max.filter(|v| *v != 0);
    match (min, max) {
        (None, None) => None,
        (Some(min), Some(max)) => Some(format!("${} - ${}", group(min), group(max))),
        (Some(min), None) => Some(format!("From ${}", group(min))),
        (None, Some(max)) => Some(format!("Up to ${}", group(max))),
    }
}

fn group(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn word_separator() -> &'static Regex {
    static SEP: OnceLock<Regex> = OnceLock::new();
    SEP.get_or_init(|| Regex::new(r"[^A-Za-z0-9+.#-]").expect("static regex"))
}

/// Most frequent capitalized terms of a job description, at most ten.
/// Ties keep first-appearance order.
pub fn extract_skill_terms(text: &str) -> Vec<String> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for word in word_separator().split(text) {
        let len = word.chars().count();
        if !(2..=20).contains(&len) {
            continue;
        }
        let count = counts.entry(word).or_insert(0);
        if *count == 0 {
            order.push(word);
        }
        *count += 1;
    }
    // Stable sort.
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));
    order
        .into_iter()
        .filter(|w| w.starts_with(|c: char| c.is_ascii_uppercase()))
        .take(MAX_SKILL_TERMS)
        .map(str::to_string)
        .collect()
}
