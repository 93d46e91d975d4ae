use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hirematch_client::guard::{self, GuardDecision};
use hirematch_client::models::{JobDraft, Role};
use hirematch_client::views::applications::score_label;
use hirematch_client::views::{
    extract_skill_terms, format_salary, ApplicationsView, JobBoard, MatchCheckView,
    ProfileEditor, RecruiterJobs,
};
use hirematch_client::{AppContext, Config};

const RESOLVE_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Parser)]
#[command(name = "hirematch", about = "HireMatch recruitment client", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List open jobs, newest first.
    Jobs {
        /// Local filter over title, company and location.
        #[arg(long)]
        filter: Option<String>,
    },
    /// Show one job by slug.
    Job { slug: String },
    SignIn { email: String, password: String },
    SignUp {
        email: String,
        password: String,
        #[arg(long)]
        name: String,
        /// candidate or recruiter
        #[arg(long, default_value = "candidate")]
        role: String,
    },
    SignOut,
    Whoami,
    /// Evaluate the route guard for a path with the current session.
    Guard { path: String },
    /// The signed-in recruiter's jobs.
    MyJobs,
    PostJob {
        #[arg(long)]
        title: String,
        #[arg(long)]
        company: String,
        #[arg(long)]
        location: String,
        #[arg(long, default_value = "full-time")]
        job_type: String,
        /// File holding the description.
        #[arg(long)]
        description: PathBuf,
    },
    ToggleJob { id: String },
    DeleteJob { id: String },
    AddSkill { name: String },
    UploadResume { path: PathBuf },
    /// Score a job description file against a CV.
    MatchCheck {
        jd: PathBuf,
        #[arg(long)]
        cv: Option<String>,
    },
    /// Top capitalized terms of a job description file.
    ExtractSkills { jd: PathBuf },
    Applications {
        job_id: String,
        /// Score every applicant first.
        #[arg(long)]
        score: bool,
    },
    Notifications,
    Dashboard,
    /// Platform accounts (admin only).
    Users,
    /// Attach a private note to a candidate (recruiter only).
    Note { candidate_id: String, text: String },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("hirematch_client={}", &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    info!("HireMatch client v{}", env!("CARGO_PKG_VERSION"));

    let ctx = AppContext::from_config(config)?;
    ctx.start().await;
    let outcome = run(&ctx, cli.command).await;
    ctx.shutdown().await;
    outcome
}

async fn run(ctx: &AppContext, command: Command) -> Result<()> {
    let handle = ctx.handle();
    match command {
        Command::Jobs { filter } => {
            let board = JobBoard::new(ctx.backend.clone());
            board.load().await;
            fail_on(board.list.snapshot().error)?;
            for job in board.filtered(filter.as_deref().unwrap_or("")) {
                let salary = format_salary(job.salary_min, job.salary_max).unwrap_or_default();
                println!(
                    "{:<28} {:<40} {:<20} {}",
                    job.slug, job.title, job.company, salary
                );
            }
        }
        Command::Job { slug } => {
            let board = JobBoard::new(ctx.backend.clone());
            board.open(&slug).await;
            let state = board.detail.snapshot();
            fail_on(state.error)?;
            if let Some(job) = state.record {
                println!("{} at {}", job.title, job.company);
                if let Some(location) = &job.location {
                    println!("Location: {location}");
                }
                if let Some(salary) = format_salary(job.salary_min, job.salary_max) {
                    println!("Salary: {salary}");
                }
                println!("\n{}", job.description.unwrap_or_default());
            }
        }
        Command::SignIn { email, password } => {
            ctx.session.sign_in(&email, &password).await?;
            let session = resolved(ctx).await?;
            match guard::landing_route(&session) {
                Some(route) => println!("Signed in. Continue at {route}"),
                None => println!("Signed in."),
            }
        }
        Command::SignUp {
            email,
            password,
            name,
            role,
        } => {
            let role: Role = role.parse()?;
            ctx.session.sign_up(&email, &password, &name, role).await?;
            if handle.current().is_authenticated() || wait_for_identity(ctx).await {
                let session = resolved(ctx).await?;
                if let Some(route) = guard::landing_route(&session) {
                    println!("Account created. Continue at {route}");
                }
            } else {
                println!("Account created. Confirm your email, then sign in.");
            }
        }
        Command::SignOut => {
            ctx.session.sign_out().await;
            println!("Signed out.");
        }
        Command::Whoami => {
            let session = handle.current();
            match &session.identity {
                Some(identity) => println!(
                    "{} ({})",
                    identity.email,
                    session
                        .effective_role()
                        .map(|r| r.to_string())
                        .unwrap_or_else(|| "no role".to_string())
                ),
                None => println!("Not signed in."),
            }
        }
        Command::Guard { path } => match guard::guard_route(&path, &handle.current()) {
            GuardDecision::Pending => println!("pending"),
            GuardDecision::Authorized => println!("authorized"),
            GuardDecision::RedirectSignIn { route, .. } => println!("redirect {route}"),
            GuardDecision::RedirectHome { route, .. } => println!("redirect {route}"),
        },
        Command::MyJobs => {
            let jobs = RecruiterJobs::new(ctx.backend.clone(), handle);
            jobs.load().await;
            let state = jobs.list.snapshot();
            fail_on(state.error)?;
            for job in state.items {
                let badge = if job.is_active { "active" } else { "inactive" };
                println!("{:<38} {:<9} {}", job.id, badge, job.title);
            }
        }
        Command::PostJob {
            title,
            company,
            location,
            job_type,
            description,
        } => {
            let description = tokio::fs::read_to_string(&description)
                .await
                .with_context(|| format!("reading {}", description.display()))?;
            let draft = JobDraft {
                title,
                company,
                location,
                job_type,
                description,
                ..Default::default()
            };
            let jobs = RecruiterJobs::new(ctx.backend.clone(), handle);
            let job = jobs.create(&draft).await?;
            println!("Created {}", job.slug);
        }
        Command::ToggleJob { id } => {
            let jobs = RecruiterJobs::new(ctx.backend.clone(), handle);
            jobs.load().await;
            jobs.toggle_active(&id).await?;
            println!("{}", jobs.list.snapshot().status.unwrap_or_default());
        }
        Command::DeleteJob { id } => {
            let jobs = RecruiterJobs::new(ctx.backend.clone(), handle);
            jobs.delete(&id).await?;
            println!("Deleted {id}");
        }
        Command::AddSkill { name } => {
            let editor = ProfileEditor::new(ctx.backend.clone(), handle);
            match editor.add_skill(&name).await {
                Ok(skill) => println!("Added {}", skill.name),
                Err(e) if e.is_conflict() => println!("{}", e.user_message()),
                Err(e) => return Err(e.into()),
            }
        }
        Command::UploadResume { path } => {
            let editor = ProfileEditor::new(ctx.backend.clone(), handle);
            editor.load().await;
            editor.upload_resume_from(&path).await?;
            println!("{}", editor.profile.snapshot().status.unwrap_or_default());
        }
        Command::MatchCheck { jd, cv } => {
            let jd_text = tokio::fs::read_to_string(&jd)
                .await
                .with_context(|| format!("reading {}", jd.display()))?;
            let view = MatchCheckView::new(ctx.matching.clone());
            let result = view.check(&jd_text, cv.as_deref()).await?;
            println!("Score: {}", score_label(Some(result.score)));
            println!("Matched: {}", result.matched_skills.join(", "));
            println!("Missing: {}", result.missing_skills.join(", "));
            println!("Suggestion: {}", result.suggestions);
        }
        Command::ExtractSkills { jd } => {
            let text = tokio::fs::read_to_string(&jd)
                .await
                .with_context(|| format!("reading {}", jd.display()))?;
            println!("{}", extract_skill_terms(&text).join(", "));
        }
        Command::Applications { job_id, score } => {
            let view = ApplicationsView::new(ctx.matching.clone(), job_id);
            if score {
                view.score_all().await?;
            } else {
                view.load().await;
            }
            let state = view.list.snapshot();
            fail_on(state.error)?;
            for app in state.items {
                let best = if app.best_fit == Some(true) { "Best fit" } else { "-" };
                println!(
                    "{:<38} {:<30} {:<10} {}",
                    app.id,
                    app.email.as_deref().unwrap_or(&app.candidate_id),
                    score_label(app.match_score),
                    best
                );
            }
        }
        Command::Notifications => {
            for n in ctx.rest.notifications().await? {
                let marker = if n.read { " " } else { "*" };
                println!("{marker} {} {}", n.kind, n.data);
            }
        }
        Command::Dashboard => {
            let Some(role) = handle.current().effective_role() else {
                bail!("Sign in to see a dashboard");
            };
            for stat in ctx.rest.dashboard(role).await? {
                println!("{:<30} {}", stat.label, stat.value);
            }
        }
        Command::Users => {
            for user in ctx.rest.admin_users().await? {
                println!(
                    "{:<38} {:<30} {:<10} {}",
                    user.id,
                    user.email.as_deref().unwrap_or("-"),
                    user.role.as_deref().unwrap_or("-"),
                    user.status.as_deref().unwrap_or("-")
                );
            }
        }
        Command::Note { candidate_id, text } => {
            ctx.rest.add_candidate_note(&candidate_id, &text).await?;
            println!("Note saved for {candidate_id}");
        }
    }
    Ok(())
}

/// Surfaces a view's error message as the command's failure.
fn fail_on(error: Option<String>) -> Result<()> {
    match error {
        Some(message) => bail!(message),
        None => Ok(()),
    }
}

/// Waits for the provider to publish an authenticated, role-resolved session.
async fn resolved(ctx: &AppContext) -> Result<hirematch_client::models::Session> {
    let mut rx = ctx.handle().subscribe();
    let session = tokio::time::timeout(
        RESOLVE_TIMEOUT,
        rx.wait_for(|s| s.is_authenticated() && !s.loading),
    )
    .await
    .context("timed out waiting for the session to resolve")?
    .context("session provider stopped")?
    .clone();
    Ok(session)
}

/// Whether sign-up produced a session (no email confirmation pending).
async fn wait_for_identity(ctx: &AppContext) -> bool {
    let mut rx = ctx.handle().subscribe();
    tokio::time::timeout(
        Duration::from_millis(500),
        rx.wait_for(|s| s.is_authenticated()),
    )
    .await
    .is_ok_and(|r| r.is_ok())
}
