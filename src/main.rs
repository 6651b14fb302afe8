use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing_subscriber::EnvFilter;

use academic_progress::config::{self, AppConfig};
use academic_progress::db::{self, PgRecords};
use academic_progress::report::{self, ReportOptions};
use academic_progress::service::{self, GradeService};
use academic_progress::EngineError;

#[derive(Parser)]
#[command(name = "academic-progress")]
#[command(about = "Course grades and academic progression reports for Group Scholar", long_about = None)]
struct Cli {
    /// Config file (defaults to ./academic-progress.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import evaluations from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Final grade and approval status per enrolled course
    Grades {
        #[arg(long)]
        student: String,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        term: Option<u8>,
    },
    /// Credit and grade summary for one semester
    Semester {
        #[arg(long)]
        student: String,
        #[arg(long)]
        year: i32,
        #[arg(long)]
        term: u8,
    },
    /// Multi-semester progression tier, alerts and recommendations
    Progression {
        #[arg(long)]
        student: String,
    },
    /// Generate a semester report, or a full history report without --year/--term
    Report {
        #[arg(long)]
        student: String,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        term: Option<u8>,
        /// Include per-course evaluation detail
        #[arg(long)]
        details: bool,
        /// Include chart series
        #[arg(long)]
        charts: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn format_grade(grade: Option<f64>) -> String {
    grade.map_or_else(|| "-".to_string(), |value| format!("{value:.2}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load_config_from(cli.config.as_deref())?;
    init_tracing(&config.log_filter);

    match run(cli.command, &config).await {
        Ok(()) => Ok(()),
        Err(err) => match err.downcast_ref::<EngineError>() {
            Some(EngineError::InvalidInput(_)) => {
                eprintln!("error: {err}");
                std::process::exit(2);
            }
            Some(EngineError::NotFound { .. }) => {
                eprintln!("error: {err}");
                std::process::exit(3);
            }
            _ => Err(err),
        },
    }
}

async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(config.require_database_url()?)
        .await
        .context("failed to connect to Postgres")
}

async fn grade_service(config: &AppConfig) -> anyhow::Result<GradeService<PgRecords>> {
    let pool = connect(config).await?;
    Ok(GradeService::new(PgRecords::new(pool), config.progression))
}

/// Request arguments are validated before any connection is opened.
async fn run(command: Commands, config: &AppConfig) -> anyhow::Result<()> {
    match command {
        Commands::InitDb => {
            let pool = connect(config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(config).await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let pool = connect(config).await?;
            let summary = db::import_csv(&pool, &csv).await?;
            println!(
                "Inserted {} evaluations from {} ({} rows skipped).",
                summary.inserted,
                csv.display(),
                summary.skipped
            );
        }
        Commands::Grades {
            student,
            year,
            term,
        } => {
            let student_id = service::parse_student_id(&student)?;
            let term = service::resolve_term(year, term)?;
            let grades = grade_service(config).await?;
            let outcomes = grades.course_grades(student_id, term).await?;

            if outcomes.is_empty() {
                println!("No enrollments found.");
                return Ok(());
            }

            for (key, outcome) in outcomes.iter() {
                println!(
                    "- {} {} ({}, {} credits) grade {} [{}]",
                    key,
                    outcome.course.code,
                    outcome.course.name,
                    outcome.course.credits,
                    format_grade(outcome.final_grade),
                    outcome.approval.label
                );
            }
        }
        Commands::Semester {
            student,
            year,
            term,
        } => {
            let student_id = service::parse_student_id(&student)?;
            let key = service::resolve_term(Some(year), Some(term))?
                .context("term is required")?;
            let grades = grade_service(config).await?;
            let (info, summary) = grades.semester_summary(student_id, key).await?;

            println!("{} - {}", info.full_name(), summary.label);
            println!(
                "Courses: {} total, {} graded, {} passed, {} failed",
                summary.total_courses,
                summary.graded_courses,
                summary.passed_courses,
                summary.failed_courses
            );
            println!(
                "Credits: {} total, {} passed",
                summary.total_credits, summary.passed_credits
            );
            println!(
                "Weighted average: {} ({})",
                format_grade(summary.weighted_average),
                report::performance_label(summary.weighted_average)
            );
        }
        Commands::Progression { student } => {
            let student_id = service::parse_student_id(&student)?;
            let grades = grade_service(config).await?;
            let progression = grades.progression(student_id).await?;
            let assessment = &progression.assessment;

            println!(
                "{}: {} across {} semester(s){}",
                progression.student.full_name(),
                assessment.tier.label(),
                assessment.semesters_evaluated,
                if assessment.needs_attention {
                    " - needs attention"
                } else {
                    ""
                }
            );
            if !assessment.alerts.is_empty() {
                println!("Alerts:");
                for alert in assessment.alerts.iter() {
                    println!("- {}", alert.message);
                }
            }
            println!("Recommendations:");
            for recommendation in assessment.recommendations.iter() {
                println!("- {recommendation}");
            }
        }
        Commands::Report {
            student,
            year,
            term,
            details,
            charts,
            format,
            out,
        } => {
            let student_id = service::parse_student_id(&student)?;
            let options = ReportOptions::new(details).with_charts(charts);
            let scope = service::resolve_term(year, term)?;
            let grades = grade_service(config).await?;
            let data = match scope {
                Some(key) => grades.semester_report(student_id, key, &options).await?,
                None => grades.history_report(student_id, &options).await?,
            };

            let rendered = match format {
                OutputFormat::Markdown => report::render_markdown(&data),
                OutputFormat::Json => serde_json::to_string_pretty(&data)?,
            };

            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Report written to {}.", path.display());
                }
                None => print!("{rendered}"),
            }
        }
    }

    Ok(())
}
