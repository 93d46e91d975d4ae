//! Candidate profile editor: profile fields, skills, experience and resume.

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::backend::{RecruitmentBackend, SKILL_CONFLICT_MESSAGE};
use crate::errors::{ClientError, ClientResult};
use crate::models::{Experience, ExperienceDraft, ExperiencePatch, Profile, ProfilePatch, Skill};
use crate::remote::FileUpload;
use crate::session::SessionHandle;
use crate::validation::{validate_experience_patch, validate_profile_patch, validate_skill};
use crate::views::{owner_of, DetailModel, ListModel};

pub const RESUME_UPLOADED: &str = "Resume uploaded successfully!";

pub struct ProfileEditor {
    backend: Arc<dyn RecruitmentBackend>,
    session: SessionHandle,
    pub profile: DetailModel<Profile>,
    pub skills: ListModel<Skill>,
    pub experience: ListModel<Experience>,
}

impl ProfileEditor {
    pub fn new(backend: Arc<dyn RecruitmentBackend>, session: SessionHandle) -> Self {
        Self {
            backend,
            session,
            profile: DetailModel::new(),
            skills: ListModel::new(),
            experience: ListModel::new(),
        }
    }

    fn owner(&self) -> ClientResult<String> {
        owner_of(&self.session.current())
    }

    /// Fetches the profile and both sub-collections concurrently.
    pub async fn load(&self) {
        let owner = match self.owner() {
            Ok(owner) => owner,
            Err(e) => {
                self.profile.fail(&e);
                return;
            }
        };
        let profile_ticket = self.profile.begin_fetch(&owner);
        let skills_ticket = self.skills.begin_fetch(&owner);
        let experience_ticket = self.experience.begin_fetch(&owner);

        let (profile, skills, experience) = tokio::join!(
            self.backend.get_profile(&owner),
            self.backend.list_skills(&owner),
            self.backend.list_experience(&owner),
        );

        let experience = match experience {
            Err(ClientError::Unsupported(what)) => {
                debug!("{what} unavailable on the {} backend", self.backend.name());
                Ok(Vec::new())
            }
            other => other,
        };

        self.profile.finish_fetch(profile_ticket, profile);
        self.skills.finish_fetch(skills_ticket, skills);
        self.experience.finish_fetch(experience_ticket, experience);
    }

    pub async fn save(&self, patch: &ProfilePatch) -> ClientResult<Profile> {
        let result = self
            .profile
            .with_busy("save", async {
                validate_profile_patch(patch)?;
                let owner = self.owner()?;
                self.backend.update_profile(&owner, patch).await
            })
            .await;
        let saved = self.profile.settle(result)?;
        self.profile.set(saved.clone());
        self.profile.notify("Profile updated");
        Ok(saved)
    }

    // ── skills ──────────────────────────────────────────────────────────────

    pub async fn add_skill(&self, raw: &str) -> ClientResult<Skill> {
        let result = self
            .skills
            .with_busy("add-skill", async {
                let name = validate_skill(raw)?;
                let owner = self.owner()?;
                self.backend
                    .add_skill(&owner, &name)
                    .await
                    .map_err(|e| e.with_conflict_message(SKILL_CONFLICT_MESSAGE))
            })
            .await;
        let skill = self.skills.settle(result)?;
        self.skills.append(skill.clone());
        self.skills.notify(format!("Added {}", skill.name));
        Ok(skill)
    }

    pub async fn remove_skill(&self, id: &str) -> ClientResult<()> {
        let result = self
            .skills
            .with_busy(&format!("remove-skill:{id}"), async {
                let owner = self.owner()?;
                let skill = self.skills.get(id).ok_or_else(|| missing("Skill"))?;
                self.backend.remove_skill(&owner, &skill).await
            })
            .await;
        self.skills.settle(result)?;
        self.skills.remove(id);
        Ok(())
    }

    // ── experience ──────────────────────────────────────────────────────────

    /// Inserts a placeholder entry starting `today`, shown first once stored.
    pub async fn add_experience(&self, today: NaiveDate) -> ClientResult<Experience> {
        let draft = ExperienceDraft::placeholder(today);
        let result = self
            .experience
            .with_busy("add-experience", async {
                let owner = self.owner()?;
                self.backend.add_experience(&owner, &draft).await
            })
            .await;
        let entry = self.experience.settle(result)?;
        self.experience.prepend(entry.clone());
        Ok(entry)
    }

    pub async fn update_experience(
        &self,
        id: &str,
        patch: &ExperiencePatch,
    ) -> ClientResult<Experience> {
        let result = self
            .experience
            .with_busy(&format!("save-experience:{id}"), async {
                let current = self.experience.get(id).ok_or_else(|| missing("Experience"))?;
                validate_experience_patch(&current, patch)?;
                self.backend.update_experience(&current, patch).await
            })
            .await;
        let entry = self.experience.settle(result)?;
        self.experience.replace(entry.clone());
        Ok(entry)
    }

    pub async fn delete_experience(&self, id: &str) -> ClientResult<()> {
        let result = self
            .experience
            .with_busy(
                &format!("delete-experience:{id}"),
                self.backend.delete_experience(id),
            )
            .await;
        self.experience.settle(result)?;
        self.experience.remove(id);
        Ok(())
    }

    // ── resume ──────────────────────────────────────────────────────────────

    /// Reads and uploads a resume from disk. Oversized files never leave
    /// the machine.
    pub async fn upload_resume_from(&self, path: impl AsRef<Path>) -> ClientResult<String> {
        let file = FileUpload::from_path(path).await;
        let file = self.profile.settle(file)?;
        self.upload_resume(file).await
    }

    pub async fn upload_resume(&self, file: FileUpload) -> ClientResult<String> {
        let result = self
            .profile
            .with_busy("upload-resume", async {
                let owner = self.owner()?;
                self.backend.upload_resume(&owner, file).await
            })
            .await;
        let stored = self.profile.settle(result)?;
        info!("Resume stored at {stored}");
        if let Some(mut profile) = self.profile.record() {
            profile.resume_ref = Some(stored.clone());
            self.profile.set(profile);
        }
        self.profile.notify(RESUME_UPLOADED);
        Ok(stored)
    }
}

fn missing(what: &str) -> ClientError {
    ClientError::Http {
        status: 404,
        message: format!("{what} not found"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Credential, Identity, Role, Session};
    use crate::remote::MAX_UPLOAD_BYTES;
    use crate::testing::MemoryBackend;
    use std::io::Write;
    use tokio::sync::watch;
    use uuid::Uuid;

    fn editor(backend: Arc<MemoryBackend>) -> (Uuid, ProfileEditor, watch::Sender<Session>) {
        let id = Uuid::new_v4();
        let session = Session::resolved(
            Identity {
                id,
                email: "cand@example.com".into(),
            },
            Some(Role::Seeker),
            Credential::new("token"),
        );
        let (tx, rx) = watch::channel(session);
        let editor = ProfileEditor::new(backend, SessionHandle::from_receiver(rx));
        (id, editor, tx)
    }

    fn june(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_skill_is_recoverable_conflict() {
        let backend = Arc::new(MemoryBackend::new());
        let (id, editor, _tx) = editor(backend.clone());
        editor.load().await;

        editor.add_skill("React").await.unwrap();
        let err = editor.add_skill("React").await.unwrap_err();

        assert!(err.is_conflict());
        let state = editor.skills.snapshot();
        assert_eq!(state.error.as_deref(), Some(SKILL_CONFLICT_MESSAGE));
        assert_eq!(state.items.iter().filter(|s| s.name == "React").count(), 1);
        assert_eq!(backend.stored_skills(&id.to_string()).len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_skill_is_rejected_locally() {
        let backend = Arc::new(MemoryBackend::new());
        let (_id, editor, _tx) = editor(backend.clone());
        let err = editor.add_skill("   ").await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_remove_skill() {
        let backend = Arc::new(MemoryBackend::new());
        let (id, editor, _tx) = editor(backend.clone());
        let skill = editor.add_skill("Rust").await.unwrap();
        editor.remove_skill(&skill.id).await.unwrap();
        assert!(editor.skills.snapshot().items.is_empty());
        assert!(backend.stored_skills(&id.to_string()).is_empty());
    }

    #[tokio::test]
    async fn test_save_validates_before_sending() {
        let backend = Arc::new(MemoryBackend::new());
        let (_id, editor, _tx) = editor(backend.clone());
        let patch = ProfilePatch {
            headline: Some("x".repeat(201)),
            ..Default::default()
        };
        assert!(editor.save(&patch).await.unwrap_err().is_validation());
        assert_eq!(backend.calls(), 0);

        let patch = ProfilePatch {
            headline: Some("Backend engineer".into()),
            ..Default::default()
        };
        let saved = editor.save(&patch).await.unwrap();
        assert_eq!(saved.headline.as_deref(), Some("Backend engineer"));
        assert_eq!(editor.profile.record(), Some(saved));
        assert_eq!(editor.profile.snapshot().status.as_deref(), Some("Profile updated"));
    }

    #[tokio::test]
    async fn test_experience_add_update_delete() {
        let backend = Arc::new(MemoryBackend::new());
        let (_id, editor, _tx) = editor(backend.clone());
        editor.load().await;

        let first = editor.add_experience(june(1)).await.unwrap();
        let second = editor.add_experience(june(2)).await.unwrap();
        let ids: Vec<_> = editor
            .experience
            .snapshot()
            .items
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![second.id.clone(), first.id.clone()]);
        assert_eq!(second.job_title, "New Position");

        let blank = ExperiencePatch {
            company: Some("  ".into()),
            ..Default::default()
        };
        assert!(editor
            .update_experience(&first.id, &blank)
            .await
            .unwrap_err()
            .is_validation());

        let patch = ExperiencePatch {
            job_title: Some("Staff Engineer".into()),
            ..Default::default()
        };
        let updated = editor.update_experience(&first.id, &patch).await.unwrap();
        assert_eq!(updated.job_title, "Staff Engineer");

        editor.delete_experience(&second.id).await.unwrap();
        let state = editor.experience.snapshot();
        assert_eq!(state.items, vec![updated]);
    }

    #[tokio::test]
    async fn test_resume_over_limit_never_sent() {
        let backend = Arc::new(MemoryBackend::new());
        let (_id, editor, _tx) = editor(backend.clone());
        let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        file.write_all(&vec![0u8; MAX_UPLOAD_BYTES as usize + 1]).unwrap();

        let err = editor.upload_resume_from(file.path()).await.unwrap_err();

        assert!(matches!(err, ClientError::FileTooLarge { .. }));
        assert_eq!(backend.calls(), 0);
        assert_eq!(
            editor.profile.snapshot().error.as_deref(),
            Some("File size must be less than 5MB")
        );
    }

    #[tokio::test]
    async fn test_resume_at_limit_is_uploaded() {
        let backend = Arc::new(MemoryBackend::new());
        let (id, editor, _tx) = editor(backend.clone());
        editor.load().await;
        let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        file.write_all(&vec![0u8; MAX_UPLOAD_BYTES as usize]).unwrap();

        let stored = editor.upload_resume_from(file.path()).await.unwrap();

        assert!(stored.starts_with(&id.to_string()));
        let state = editor.profile.snapshot();
        assert_eq!(state.status.as_deref(), Some(RESUME_UPLOADED));
        assert_eq!(state.record.unwrap().resume_ref, Some(stored));
    }
}
