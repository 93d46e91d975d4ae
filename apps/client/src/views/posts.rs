use std::sync::Arc;

use crate::backend::RecruitmentBackend;
use crate::errors::ClientResult;
use crate::models::{Post, PostDraft, PostVisibility};
use crate::session::SessionHandle;
use crate::validation::validate_post_body;
use crate::views::{owner_of, ListModel};

/// The signed-in candidate's posts, newest first.
pub struct PostsView {
    backend: Arc<dyn RecruitmentBackend>,
    session: SessionHandle,
    pub list: ListModel<Post>,
}

impl PostsView {
    pub fn new(backend: Arc<dyn RecruitmentBackend>, session: SessionHandle) -> Self {
        Self {
            backend,
            session,
            list: ListModel::new(),
        }
    }

    pub async fn load(&self) {
        let owner = match owner_of(&self.session.current()) {
            Ok(owner) => owner,
            Err(e) => return self.list.fail(&e),
        };
        let ticket = self.list.begin_fetch(&owner);
        let result = self.backend.list_posts(&owner).await.map(|mut posts| {
            posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            posts
        });
        self.list.finish_fetch(ticket, result);
    }

    pub async fn create(&self, body: &str, visibility: PostVisibility) -> ClientResult<Post> {
        let draft = PostDraft {
            body: body.trim().to_string(),
            visibility,
        };
        let result = self
            .list
            .with_busy("post", async {
                validate_post_body(&draft.body)?;
                let owner = owner_of(&self.session.current())?;
                self.backend.create_post(&owner, &draft).await
            })
            .await;
        let post = self.list.settle(result)?;
        self.list.prepend(post.clone());
        self.list.notify("Posted");
        Ok(post)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Credential, Identity, Role, Session};
    use crate::testing::MemoryBackend;
    use tokio::sync::watch;
    use uuid::Uuid;

    fn view(backend: Arc<MemoryBackend>) -> (PostsView, watch::Sender<Session>) {
        let (tx, rx) = watch::channel(Session::resolved(
            Identity {
                id: Uuid::new_v4(),
                email: "c@example.com".into(),
            },
            Some(Role::Seeker),
            Credential::new("t"),
        ));
        (PostsView::new(backend, SessionHandle::from_receiver(rx)), tx)
    }

    #[tokio::test]
    async fn test_new_post_listed_first_once() {
        let backend = Arc::new(MemoryBackend::new());
        let (posts, _tx) = view(backend);
        posts.load().await;

        let first = posts.create("Shipped a parser", PostVisibility::Public).await.unwrap();
        let second = posts.create("Open to work", PostVisibility::Hidden).await.unwrap();

        let items = posts.list.snapshot().items;
        assert_eq!(items, vec![second, first]);
    }

    #[tokio::test]
    async fn test_blank_post_rejected() {
        let backend = Arc::new(MemoryBackend::new());
        let (posts, _tx) = view(backend.clone());
        let err = posts.create("   ", PostVisibility::Public).await.unwrap_err();
        assert_eq!(err.user_message(), "Write something before posting");
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_signed_out_load_reports_error() {
        let backend = Arc::new(MemoryBackend::new());
        let (posts, tx) = view(backend.clone());
        tx.send_replace(Session::signed_out());
        posts.load().await;
        assert!(posts.list.snapshot().error.is_some());
        assert_eq!(backend.calls(), 0);
    }
}
