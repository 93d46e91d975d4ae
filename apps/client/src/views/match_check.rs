use std::sync::Arc;

use crate::backend::MatchingApi;
use crate::errors::ClientResult;
use crate::models::api::{CvItem, MatchCheckRequest, MatchCheckResponse};
use crate::validation::validate_jd_text;
use crate::views::{DetailModel, ListModel};

/// Ad-hoc match of a pasted job description against one of the
/// candidate's CVs.
pub struct MatchCheckView {
    matching: Arc<dyn MatchingApi>,
    pub cvs: ListModel<CvItem>,
    pub result: DetailModel<MatchCheckResponse>,
}

impl MatchCheckView {
    pub fn new(matching: Arc<dyn MatchingApi>) -> Self {
        Self {
            matching,
            cvs: ListModel::new(),
            result: DetailModel::new(),
        }
    }

    pub async fn load_cvs(&self) {
        let ticket = self.cvs.begin_fetch("cvs");
        let result = self.matching.list_cvs().await;
        self.cvs.finish_fetch(ticket, result);
    }

    /// `cv_id: None` lets the server pick the latest CV.
    pub async fn check(
        &self,
        jd_text: &str,
        cv_id: Option<&str>,
    ) -> ClientResult<MatchCheckResponse> {
        if let Err(e) = validate_jd_text(jd_text) {
            self.result.fail(&e);
            return Err(e);
        }
        let request = MatchCheckRequest {
            jd_text: jd_text.trim().to_string(),
            cv_id: cv_id.map(str::to_string).filter(|id| !id.is_empty()),
        };
        let ticket = self.result.begin_fetch("match-check");
        let result = self
            .result
            .with_busy("check", self.matching.match_check(&request))
            .await;
        self.result.finish_fetch_ref(ticket, &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryMatching;

    #[tokio::test]
    async fn test_check_publishes_result() {
        let view = MatchCheckView::new(Arc::new(MemoryMatching::new().with_cv("cv-1")));
        view.load_cvs().await;
        assert_eq!(view.cvs.snapshot().items.len(), 1);

        let response = view
            .check("Rust and SQL services, Kubernetes a plus", Some("cv-1"))
            .await
            .unwrap();

        assert_eq!(response.score, 100.0);
        let state = view.result.snapshot();
        assert_eq!(state.record, Some(response));
        assert!(!state.loading);
        assert!(state.busy.is_empty());
    }

    #[tokio::test]
    async fn test_blank_jd_is_rejected_locally() {
        let matching = Arc::new(MemoryMatching::new());
        let view = MatchCheckView::new(matching.clone());
        assert!(view.check("  ", None).await.unwrap_err().is_validation());
        assert_eq!(matching.calls(), 0);
        assert!(view.result.snapshot().error.is_some());
    }
}
