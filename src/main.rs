use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Context;
use chrono::{Local, NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use alumni_session_portal::classify::Classifier;
use alumni_session_portal::config::{init_logger, Config};
use alumni_session_portal::error::PortalError;
use alumni_session_portal::models::{
    AttendanceResponse, Bucket, Buckets, ClassifiedSession, Department, FeedbackRecord, Role,
    StudyYear, Viewer,
};
use alumni_session_portal::workflow::{
    self, AdminAction, AttendanceState, CardView, FeedbackDraft, FeedbackState,
};
use alumni_session_portal::{db, ingest, report};

#[derive(Parser)]
#[command(name = "session-portal")]
#[command(about = "Knowledge sharing sessions for the alumni and placement portal", long_about = None)]
struct Cli {
    /// Evaluate as if the local time were this instant (YYYY-MM-DDTHH:MM)
    #[arg(long, global = true, value_parser = parse_now)]
    now: Option<NaiveDateTime>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct ViewerArgs {
    #[arg(long, default_value = "anonymous")]
    user: String,
    #[arg(long, value_enum, default_value_t = Role::Student)]
    role: Role,
    /// Year of study, E-1 through E-4
    #[arg(long)]
    year: Option<StudyYear>,
    /// Department code such as CSE or MECH
    #[arg(long)]
    department: Option<Department>,
}

impl ViewerArgs {
    fn into_viewer(self) -> Viewer {
        if self.role == Role::Student && self.year.is_none() {
            log::debug!("student {} has no year of study set", self.user);
        }
        Viewer {
            user_id: self.user,
            role: self.role,
            year_of_study: self.year,
            department: self.department,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load sample sessions around today's date
    Seed,
    /// Import sessions from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Show ongoing, upcoming and previous sessions
    List {
        #[command(flatten)]
        viewer: ViewerArgs,
        /// Read sessions from a JSON export instead of the database
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Tell the organisers whether you will attend an upcoming session
    Attend {
        #[command(flatten)]
        viewer: ViewerArgs,
        #[arg(long)]
        session: String,
        #[arg(long, action = clap::ArgAction::Set)]
        will_attend: bool,
    },
    /// Leave feedback on a completed session
    Feedback {
        #[command(flatten)]
        viewer: ViewerArgs,
        #[arg(long)]
        session: String,
        /// Whole number from 1 to 5
        #[arg(long)]
        rating: Option<String>,
        #[arg(long)]
        text: Option<String>,
    },
    /// Start, complete, cancel or delete a session (admins only)
    Status {
        #[command(flatten)]
        viewer: ViewerArgs,
        #[arg(long)]
        session: String,
        #[arg(long, value_enum)]
        action: AdminAction,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Generate a markdown digest of all sessions
    Report {
        #[arg(long, default_value = "sessions-report.md")]
        out: PathBuf,
    },
}

fn parse_now(raw: &str) -> Result<NaiveDateTime, String> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];

    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw.trim(), format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(chrono::NaiveTime::MIN))
        })
        .ok_or_else(|| format!("'{raw}' is not a local date-time like 2025-06-10T09:30"))
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(config.database_url()?)
        .await
        .context("failed to connect to Postgres")
}

fn find_session<'a>(
    buckets: &'a Buckets,
    session_id: &str,
) -> Result<&'a ClassifiedSession, PortalError> {
    buckets
        .find(session_id)
        .ok_or_else(|| PortalError::SessionNotFound(session_id.to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env();
    init_logger(&config);

    let now = cli.now.unwrap_or_else(|| Local::now().naive_local());
    let classifier = Classifier::with_duration_minutes(config.session_duration_minutes);
    log::debug!("evaluating sessions at {now}");

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&config).await?;
            let counts = db::seed(&pool, now.date()).await?;
            println!(
                "Seeded {} new sessions, refreshed {} existing.",
                counts.inserted, counts.updated
            );
        }
        Commands::Import { csv } => {
            let sessions = ingest::read_csv(&csv)?;
            let pool = connect(&config).await?;
            let inserted = db::import_sessions(&pool, &sessions).await?;
            println!("Inserted {inserted} sessions from {}.", csv.display());
        }
        Commands::List { viewer, file, json } => {
            let viewer = viewer.into_viewer();
            let (sessions, attendance, feedback) = match file {
                Some(path) => (
                    ingest::load_sessions_json(&path)?,
                    HashMap::new(),
                    HashMap::new(),
                ),
                None => {
                    let pool = connect(&config).await?;
                    let sessions = db::fetch_all_sessions(&pool).await?;
                    if viewer.is_student() {
                        (
                            sessions,
                            db::fetch_student_attendance(&pool, &viewer.user_id).await?,
                            db::fetch_student_feedback(&pool, &viewer.user_id).await?,
                        )
                    } else {
                        (sessions, HashMap::new(), HashMap::new())
                    }
                }
            };

            let buckets = classifier.classify(&sessions, now);
            if json {
                println!("{}", serde_json::to_string_pretty(&buckets)?);
                return Ok(());
            }

            print_bucket(Bucket::Ongoing, &buckets.ongoing, &viewer, &attendance, &feedback);
            print_bucket(Bucket::Upcoming, &buckets.upcoming, &viewer, &attendance, &feedback);
            print_bucket(Bucket::Previous, &buckets.previous, &viewer, &attendance, &feedback);
        }
        Commands::Attend {
            viewer,
            session,
            will_attend,
        } => {
            let viewer = viewer.into_viewer();
            let pool = connect(&config).await?;
            let buckets = classifier.classify(&db::fetch_all_sessions(&pool).await?, now);
            let card = find_session(&buckets, &session)?;

            let prior = db::get_student_attendance(&pool, &card.id, &viewer.user_id).await?;
            AttendanceState::resolve(card, &viewer, prior.as_ref()).submit(will_attend)?;
            db::submit_attendance_response(&pool, &card.id, &viewer.user_id, will_attend).await?;

            let answer = if will_attend { "attending" } else { "not attending" };
            println!("Recorded {} as {answer} '{}'.", viewer.user_id, card.title);
        }
        Commands::Feedback {
            viewer,
            session,
            rating,
            text,
        } => {
            let viewer = viewer.into_viewer();
            let draft = FeedbackDraft { rating, text };
            draft.validate()?;

            let pool = connect(&config).await?;
            let buckets = classifier.classify(&db::fetch_all_sessions(&pool).await?, now);
            let card = find_session(&buckets, &session)?;

            let prior = db::get_student_feedback(&pool, &card.id, &viewer.user_id).await?;
            let state = FeedbackState::resolve(card, &viewer, prior.as_ref());
            let (_, valid) = state.submit(&draft)?;
            db::submit_feedback(&pool, &card.id, &viewer.user_id, &valid).await?;

            println!("Thanks! Rated '{}' {}/5.", card.title, valid.rating);
        }
        Commands::Status {
            viewer,
            session,
            action,
            reason,
        } => {
            let viewer = viewer.into_viewer();
            workflow::ensure_admin(&viewer)?;

            let pool = connect(&config).await?;
            let buckets = classifier.classify(&db::fetch_all_sessions(&pool).await?, now);
            match buckets.find(&session) {
                Some(card) if !workflow::admin_actions(card, &viewer).contains(&action) => {
                    log::warn!(
                        "'{}' is not normally offered for {} sessions",
                        action.label(),
                        card.bucket.label().to_lowercase()
                    );
                }
                Some(_) => {}
                None => log::debug!("session {session} is hidden or missing locally"),
            }

            match action.target_status() {
                Some(status) => {
                    db::update_session_status(&pool, &session, &status, reason.as_deref())
                        .await?;
                    println!("Session {session} is now {}.", status.as_str());
                }
                None => {
                    db::delete_session(&pool, &session).await?;
                    println!("Session {session} deleted.");
                }
            }
        }
        Commands::Report { out } => {
            let pool = connect(&config).await?;
            let buckets = classifier.classify(&db::fetch_all_sessions(&pool).await?, now);
            let tallies = db::attendance_tallies(&pool).await?;
            let feedback = db::feedback_summaries(&pool).await?;
            let report = report::build_report(now, &buckets, &tallies, &feedback);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn print_bucket(
    bucket: Bucket,
    sessions: &[ClassifiedSession],
    viewer: &Viewer,
    attendance: &HashMap<String, AttendanceResponse>,
    feedback: &HashMap<String, FeedbackRecord>,
) {
    println!("{} ({})", bucket.label(), sessions.len());
    if sessions.is_empty() {
        println!("  nothing here");
        return;
    }

    for session in sessions {
        println!(
            "- [{}] {} | {} {} {} | {} | {}",
            session.id,
            session.title,
            session.month,
            session.day,
            session.time,
            session.venue,
            session.session_head
        );

        let view = CardView::build(
            session,
            viewer,
            attendance.get(&session.id),
            feedback.get(&session.id),
        );
        match view.attendance {
            AttendanceState::NotApplicable => {}
            AttendanceState::Unanswered => println!("    attendance: awaiting your response"),
            AttendanceState::Answered { will_attend: true } => {
                println!("    attendance: you said you will attend")
            }
            AttendanceState::Answered { will_attend: false } => {
                println!("    attendance: you said you will not attend")
            }
        }
        match &view.feedback {
            FeedbackState::NotApplicable => {}
            FeedbackState::NoFeedbackYet => println!("    feedback: open"),
            FeedbackState::Submitted { rating, .. } => {
                println!("    feedback: submitted ({rating}/5)")
            }
        }
        if viewer.is_student() && !view.eligible {
            println!("    not open to your year or department");
        }
        if !view.admin.is_empty() {
            let labels: Vec<&str> = view.admin.iter().map(AdminAction::label).collect();
            println!("    admin: {}", labels.join(", "));
        }
    }
}
