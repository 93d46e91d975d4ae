//! Client-side validation mirroring the server's field rules.
//!
//! Each validator reports the FIRST violated rule as a `ClientError::Validation`
//! and never touches the network. Lengths are counted in characters.

use std::sync::OnceLock;

use regex::Regex;

use crate::errors::{ClientError, ClientResult};
use crate::models::{Experience, ExperiencePatch, JobDraft, JobPatch, ProfilePatch};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_NAME_LEN: usize = 100;
pub const MAX_HEADLINE_LEN: usize = 200;
pub const MAX_BIO_LEN: usize = 2000;
pub const MAX_SKILL_LEN: usize = 50;
pub const MAX_NOTE_LEN: usize = 2000;
pub const MAX_JOB_DESCRIPTION_LEN: usize = 5000;
pub const MIN_JOB_DESCRIPTION_LEN: usize = 10;
pub const MAX_REQUIREMENTS_LEN: usize = 3000;
pub const MAX_POST_LEN: usize = 3000;

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static regex"))
}

fn skill_pattern() -> &'static Regex {
    static SKILL: OnceLock<Regex> = OnceLock::new();
    SKILL.get_or_init(|| Regex::new(r"^[a-zA-Z0-9\s\-+#.]+$").expect("static regex"))
}

fn max_len(field: &'static str, value: &str, max: usize, message: &str) -> ClientResult<()> {
    if value.chars().count() > max {
        return Err(ClientError::validation(field, message));
    }
    Ok(())
}

fn required(field: &'static str, value: &str, message: &str) -> ClientResult<()> {
    if value.trim().is_empty() {
        return Err(ClientError::validation(field, message));
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Auth forms
// ────────────────────────────────────────────────────────────────────────────

pub fn validate_credentials(email: &str, password: &str) -> ClientResult<()> {
    if !email_pattern().is_match(email.trim()) {
        return Err(ClientError::validation(
            "email",
            "Please enter a valid email address",
        ));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ClientError::validation(
            "password",
            "Password must be at least 6 characters",
        ));
    }
    Ok(())
}

pub fn validate_sign_up(email: &str, password: &str, display_name: &str) -> ClientResult<()> {
    validate_credentials(email, password)?;
    required("display_name", display_name, "Please enter your full name")
}

// ────────────────────────────────────────────────────────────────────────────
// Profile
// ────────────────────────────────────────────────────────────────────────────

/// Validates every field present in the patch.
pub fn validate_profile_patch(patch: &ProfilePatch) -> ClientResult<()> {
    if let Some(name) = &patch.full_name {
        max_len("full_name", name, MAX_NAME_LEN, "Name must be less than 100 characters")?;
    }
    if let Some(headline) = &patch.headline {
        max_len(
            "headline",
            headline,
            MAX_HEADLINE_LEN,
            "Headline must be less than 200 characters",
        )?;
    }
    if let Some(bio) = &patch.bio {
        max_len("bio", bio, MAX_BIO_LEN, "Bio must be less than 2000 characters")?;
    }
    if let Some(location) = &patch.location {
        max_len(
            "location",
            location,
            MAX_NAME_LEN,
            "Location must be less than 100 characters",
        )?;
    }
    if let Some(links) = &patch.links {
        for link in links {
            let parsed = reqwest::Url::parse(link).ok();
            let is_web = parsed
                .as_ref()
                .map(|u| u.scheme() == "http" || u.scheme() == "https")
                .unwrap_or(false);
            if !is_web {
                return Err(ClientError::validation(
                    "links",
                    format!("'{link}' is not a valid web link"),
                ));
            }
        }
    }
    Ok(())
}

/// Validates a skill name and returns it trimmed.
pub fn validate_skill(raw: &str) -> ClientResult<String> {
    let skill = raw.trim();
    if skill.is_empty() {
        return Err(ClientError::validation("skill", "Skill name is required"));
    }
    max_len("skill", skill, MAX_SKILL_LEN, "Skill must be less than 50 characters")?;
    if !skill_pattern().is_match(skill) {
        return Err(ClientError::validation(
            "skill",
            "Skill contains invalid characters",
        ));
    }
    Ok(skill.to_string())
}

/// Validates an experience patch against the entry it would produce.
///
/// Only runs when a text field is in the patch; date and flag toggles pass through.
pub fn validate_experience_patch(current: &Experience, patch: &ExperiencePatch) -> ClientResult<()> {
    if !patch.touches_text() {
        return Ok(());
    }
    let merged = patch.merged_into(current);

    let title = merged.job_title.trim();
    required("job_title", title, "Job title is required")?;
    max_len("job_title", title, MAX_NAME_LEN, "Job title must be less than 100 characters")?;

    let company = merged.company.trim();
    required("company", company, "Company is required")?;
    max_len("company", company, MAX_NAME_LEN, "Company must be less than 100 characters")?;

    if let Some(location) = &merged.location {
        max_len(
            "location",
            location,
            MAX_NAME_LEN,
            "Location must be less than 100 characters",
        )?;
    }
    if let Some(description) = &merged.description {
        max_len(
            "description",
            description,
            MAX_BIO_LEN,
            "Description must be less than 2000 characters",
        )?;
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Jobs
// ────────────────────────────────────────────────────────────────────────────

pub fn validate_job_draft(draft: &JobDraft) -> ClientResult<()> {
    required("title", &draft.title, "Job title is required")?;
    max_len("title", &draft.title, MAX_NAME_LEN, "Job title must be less than 100 characters")?;
    required("company", &draft.company, "Company name is required")?;
    max_len("company", &draft.company, MAX_NAME_LEN, "Company name must be less than 100 characters")?;
    required("location", &draft.location, "Location is required")?;
    max_len("location", &draft.location, MAX_NAME_LEN, "Location must be less than 100 characters")?;
    required("job_type", &draft.job_type, "Job type is required")?;
    validate_description(&draft.description)?;
    if let Some(requirements) = &draft.requirements {
        max_len(
            "requirements",
            requirements,
            MAX_REQUIREMENTS_LEN,
            "Requirements must be less than 3000 characters",
        )?;
    }
    validate_salary_range(draft.salary_min, draft.salary_max)?;
    for skill in &draft.skills {
        validate_skill(&skill.skill)?;
    }
    Ok(())
}

/// Validates every field present in a job patch.
pub fn validate_job_patch(patch: &JobPatch) -> ClientResult<()> {
    if let Some(title) = &patch.title {
        required("title", title, "Job title is required")?;
        max_len("title", title, MAX_NAME_LEN, "Job title must be less than 100 characters")?;
    }
    if let Some(company) = &patch.company {
        required("company", company, "Company name is required")?;
        max_len("company", company, MAX_NAME_LEN, "Company name must be less than 100 characters")?;
    }
    if let Some(location) = &patch.location {
        required("location", location, "Location is required")?;
        max_len("location", location, MAX_NAME_LEN, "Location must be less than 100 characters")?;
    }
    if let Some(job_type) = &patch.job_type {
        required("job_type", job_type, "Job type is required")?;
    }
    if let Some(description) = &patch.description {
        validate_description(description)?;
    }
    if let Some(requirements) = &patch.requirements {
        max_len(
            "requirements",
            requirements,
            MAX_REQUIREMENTS_LEN,
            "Requirements must be less than 3000 characters",
        )?;
    }
    validate_salary_range(patch.salary_min, patch.salary_max)
}

fn validate_salary_range(min: Option<i64>, max: Option<i64>) -> ClientResult<()> {
    match (min, max) {
        (Some(min), Some(max)) if min > max => Err(ClientError::validation(
            "salary_max",
            "Maximum salary must not be below the minimum",
        )),
        _ => Ok(()),
    }
}

fn validate_description(description: &str) -> ClientResult<()> {
    if description.chars().count() < MIN_JOB_DESCRIPTION_LEN {
        return Err(ClientError::validation(
            "description",
            "Description must be at least 10 characters",
        ));
    }
    max_len(
        "description",
        description,
        MAX_JOB_DESCRIPTION_LEN,
        "Description must be less than 5000 characters",
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Posts and matching
// ────────────────────────────────────────────────────────────────────────────

pub fn validate_post_body(body: &str) -> ClientResult<()> {
    required("body", body, "Write something before posting")?;
    max_len("body", body, MAX_POST_LEN, "Post must be less than 3000 characters")
}

pub fn validate_candidate_note(note: &str) -> ClientResult<()> {
    required("note", note, "Write a note first")?;
    max_len("note", note, MAX_NOTE_LEN, "Note must be less than 2000 characters")
}

pub fn validate_jd_text(jd_text: &str) -> ClientResult<()> {
    required("jd_text", jd_text, "Paste a job description first")
}
