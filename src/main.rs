use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, EnvFilter};

use student_risk_triage::models::RiskLevel;
use student_risk_triage::pipeline::{analyze_files, DatasetPaths};
use student_risk_triage::{report, AppConfig};

#[derive(Parser)]
#[command(name = "student-risk-triage")]
#[command(about = "Merge attendance, marks and fee sheets and flag at-risk students", long_about = None)]
struct Cli {
    /// TOML file overriding thresholds, extensions and expected columns
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Sources {
    #[arg(long)]
    attendance: PathBuf,
    #[arg(long)]
    marks: PathBuf,
    #[arg(long)]
    fees: PathBuf,
}

impl Sources {
    fn paths(&self) -> DatasetPaths {
        DatasetPaths {
            attendance: self.attendance.clone(),
            marks: self.marks.clone(),
            fees: self.fees.clone(),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Csv,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every student with their risk tier
    Analyze {
        #[command(flatten)]
        sources: Sources,
        /// Only show students in this tier ("high-risk", "at-risk", "safe")
        #[arg(long)]
        tier: Option<RiskLevel>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        sources: Sources,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Export students flagged At Risk or High Risk
    Export {
        #[command(flatten)]
        sources: Sources,
        #[arg(long, default_value = "at_risk_students.csv")]
        out: PathBuf,
        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze {
            sources,
            tier,
            limit,
        } => {
            let run = analyze_files(&sources.paths(), &config).await?;
            if run.records.is_empty() {
                println!("No students found in the uploaded data.");
                return Ok(());
            }

            let summary = report::summarize(&run.records);
            println!(
                "{} students: {} high risk, {} at risk, {} safe",
                summary.total_students, summary.high_risk, summary.at_risk, summary.safe
            );
            for record in report::by_severity(&run.records)
                .into_iter()
                .filter(|record| tier.map_or(true, |level| record.risk_level == level))
                .take(limit)
            {
                println!(
                    "- {} attendance {:.2}% avg score {:.2} trend {} fee pending {:.2} [{}]",
                    record.student_id,
                    record.attendance_pct,
                    record.avg_score,
                    report::format_trend(record.score_trend),
                    record.fee_pending,
                    record.risk_level
                );
            }
        }
        Commands::Report { sources, out } => {
            let run = analyze_files(&sources.paths(), &config).await?;
            let output = report::build_report(&run);
            std::fs::write(&out, output)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export {
            sources,
            out,
            format,
        } => {
            let run = analyze_files(&sources.paths(), &config).await?;
            let flagged = report::at_risk(&run.records);
            match format {
                ExportFormat::Csv => report::write_csv_file(&out, &flagged)?,
                ExportFormat::Json => {
                    let json = report::export_json(&run, &flagged)?;
                    std::fs::write(&out, json)
                        .with_context(|| format!("failed to write {}", out.display()))?;
                }
            }
            println!(
                "{}: exported {} students to {}.",
                report::alert_subject(run.generated_at.date_naive()),
                flagged.len(),
                out.display()
            );
        }
    }

    Ok(())
}
