use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use worklog_ingest::config::Settings;
use worklog_ingest::dates;
use worklog_ingest::db::{self, SqliteStore, TaskSink};
use worklog_ingest::document::{self, ExtractionMode};
use worklog_ingest::normalize::PassthroughNormalizer;
use worklog_ingest::parser::tasks::TaskRecord;
use worklog_ingest::parser::TextPipeline;
use worklog_ingest::pipeline::{self, DocumentOutcome};

#[derive(Parser)]
#[command(name = "worklog", about = "Daily work-log ingestion pipeline")]
struct Cli {
    /// Settings file (default: ./worklog.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, denoise and reconstruct documents; print the wrapped result
    Extract {
        files: Vec<PathBuf>,
        #[arg(short, long, value_enum)]
        mode: Option<ExtractionMode>,
        /// Print per-rule line counts
        #[arg(long)]
        rules: bool,
    },
    /// Split a concatenated text file into contributor sections
    Segment { file: PathBuf },
    /// Parse normalized text into task records
    Tasks {
        file: PathBuf,
        #[arg(long)]
        json: bool,
        /// Upsert the records into the database
        #[arg(long)]
        save: bool,
    },
    /// Full pipeline with the passthrough normalizer
    Run {
        files: Vec<PathBuf>,
        /// Pick documents from this directory by date token instead
        #[arg(short, long, conflicts_with = "files")]
        dir: Option<PathBuf>,
        /// YYMMDD token for --dir (default: today)
        #[arg(long, requires = "dir")]
        date: Option<String>,
        #[arg(short, long, value_enum)]
        mode: Option<ExtractionMode>,
        #[arg(long)]
        json: bool,
        #[arg(long)]
        save: bool,
    },
    /// List stored task records
    Show {
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref()).context("loading settings")?;

    let result = match cli.command {
        Commands::Extract { files, mode, rules } => {
            if files.is_empty() {
                bail!("no input documents given");
            }
            if let Some(mode) = mode {
                settings.extraction.mode = mode;
            }
            let text = TextPipeline::new(&settings)?;
            let pb = progress_bar(files.len());
            let outcomes = pipeline::process_documents(&files, &settings, &text, Some(&pb));
            pb.finish_and_clear();

            println!("{}", pipeline::combine(&outcomes));
            print_outcomes(&outcomes);
            if rules {
                for o in &outcomes {
                    if let DocumentOutcome::Processed(doc) = o {
                        eprintln!("{}:\n{}", doc.path.display(), doc.rules);
                    }
                }
            }
            Ok(())
        }
        Commands::Segment { file } => {
            let text = read_text(&file)?;
            let pipeline = TextPipeline::new(&settings)?;
            let seg = pipeline.segmenter.segment(&text);
            println!("strategy: {}", seg.strategy);
            for (i, s) in seg.sections.iter().enumerate() {
                let date = s.work_date.map(dates::format_dotted).unwrap_or_else(|| "-".into());
                println!(
                    "{:>3} | {:<10} | {:<10} | {:>6} chars | {}",
                    i + 1,
                    s.name,
                    date,
                    s.body.chars().count(),
                    truncate(&first_line(&s.body), 40)
                );
            }
            Ok(())
        }
        Commands::Tasks { file, json, save } => {
            let text = read_text(&file)?;
            let pipeline = TextPipeline::new(&settings)?;
            let extraction = pipeline.tasks.extract(&text);
            print_tasks(&extraction.records, json)?;
            if save {
                save_records(&settings, &extraction.records)?;
            }
            Ok(())
        }
        Commands::Run {
            files,
            dir,
            date,
            mode,
            json,
            save,
        } => {
            if let Some(mode) = mode {
                settings.extraction.mode = mode;
            }
            let files = match dir {
                Some(dir) => {
                    let token = date.unwrap_or_else(dates::today_token);
                    document::find_files_by_date(&dir, &token)?
                }
                None => files,
            };
            if files.is_empty() {
                bail!("no input documents found");
            }

            println!("Processing {} documents ({} mode)...", files.len(), settings.extraction.mode);
            let pb = progress_bar(files.len());
            let report = pipeline::run(&files, &settings, &PassthroughNormalizer, Some(&pb))?;
            pb.finish_and_clear();

            print_outcomes(&report.outcomes);
            println!(
                "Segmented {} contributors ({}), {} normalization failures.",
                report.segmentation.sections.len(),
                report.segmentation.strategy,
                report.contributors.iter().filter(|c| !c.ok).count()
            );
            print_tasks(&report.tasks.records, json)?;
            if save {
                save_records(&settings, &report.tasks.records)?;
            }
            Ok(())
        }
        Commands::Show { from, to } => {
            let store = SqliteStore::open(&db::path(&settings.db.path))?;
            let records = store.fetch_tasks(from, to)?;
            if records.is_empty() {
                println!("No stored tasks.");
                return Ok(());
            }
            print_tasks(&records, false)?;
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn save_records(settings: &Settings, records: &[TaskRecord]) -> anyhow::Result<()> {
    let path = db::path(&settings.db.path);
    let mut store = SqliteStore::open(&path)?;
    let saved = store.accept_all(records)?;
    println!("Saved {} tasks to {}.", saved, path.display());
    Ok(())
}

fn print_outcomes(outcomes: &[DocumentOutcome]) {
    let failed: Vec<_> = outcomes.iter().filter(|o| !o.is_ok()).collect();
    eprintln!(
        "{} documents: {} ok, {} failed.",
        outcomes.len(),
        outcomes.len() - failed.len(),
        failed.len()
    );
    for o in failed {
        if let DocumentOutcome::Failed { path, error } = o {
            eprintln!("  {}: {}", path.display(), error);
        }
    }
}

fn print_tasks(records: &[TaskRecord], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }
    println!(
        "{:>3} | {:<10} | {:<10} | {:<20} | {:>4} | {:<6} | {}",
        "#", "Member", "Date", "Project", "%", "Status", "Content"
    );
    println!("{}", "-".repeat(100));
    for (i, r) in records.iter().enumerate() {
        println!(
            "{:>3} | {:<10} | {:<10} | {:<20} | {:>4} | {:<6} | {}",
            i + 1,
            truncate(&r.member_name, 10),
            r.work_date,
            truncate(r.project_name.as_deref().unwrap_or("-"), 20),
            r.progress_percent,
            r.status,
            truncate(&first_line(&r.content), 40)
        );
    }
    println!("\n{} tasks", records.len());
    Ok(())
}

fn first_line(s: &str) -> String {
    s.lines().next().unwrap_or_default().to_string()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
