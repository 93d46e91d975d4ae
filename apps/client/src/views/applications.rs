use std::sync::Arc;

use tracing::info;

use crate::backend::MatchingApi;
use crate::errors::ClientResult;
use crate::models::api::{ScoreAllSummary, ScoreResult};
use crate::models::Application;
use crate::views::ListModel;

/// Applicants for one of the recruiter's jobs, best match first.
pub struct ApplicationsView {
    matching: Arc<dyn MatchingApi>,
    job_id: String,
    pub list: ListModel<Application>,
}

impl ApplicationsView {
    pub fn new(matching: Arc<dyn MatchingApi>, job_id: impl Into<String>) -> Self {
        Self {
            matching,
            job_id: job_id.into(),
            list: ListModel::new(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub async fn load(&self) {
        self.reload().await;
    }

    /// `false` when the listing failed; the error is left on the list.
    async fn reload(&self) -> bool {
        let ticket = self.list.begin_fetch(&self.job_id);
        let result = self.matching.job_applications(&self.job_id, true).await;
        let fetched = result.is_ok();
        self.list.finish_fetch(ticket, result);
        fetched
    }

    /// Scores every applicant, then reloads so best-fit flags are fresh.
    /// A failed reload keeps its error instead of the success status.
    pub async fn score_all(&self) -> ClientResult<ScoreAllSummary> {
        let result = self
            .list
            .with_busy("score-all", self.matching.score_all(&self.job_id))
            .await;
        let summary = self.list.settle(result)?;
        info!("Scored {} applications for job {}", summary.scored, self.job_id);
        if self.reload().await {
            self.list.notify(format!("Scored {} applications", summary.scored));
        }
        Ok(summary)
    }

    pub async fn score_one(&self, application_id: &str) -> ClientResult<ScoreResult> {
        let result = self
            .list
            .with_busy(
                &format!("score:{application_id}"),
                self.matching.score_one(&self.job_id, application_id),
            )
            .await;
        let scored = self.list.settle(result)?;
        self.load().await;
        Ok(scored)
    }
}

/// `"87%"` for a scored application, `"Not scored"` otherwise.
pub fn score_label(score: Option<f64>) -> String {
    match score {
        Some(score) => format!("{}%", score.round()),
        None => "Not scored".to_string(),
    }
}
