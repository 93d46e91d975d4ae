pub mod api;
pub mod listing;
pub mod profile;
pub mod session;

pub use listing::{
    Application, ApplicationStatus, Job, JobDraft, JobPatch, JobSkill, Listing, Post, PostDraft,
    PostVisibility, SkillImportance,
};
pub use profile::{
    Experience, ExperienceDraft, ExperiencePatch, Profile, ProfilePatch, Skill,
};
pub use session::{Credential, Identity, Role, Session};
