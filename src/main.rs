use anyhow::{Context, Result};
use bank_review_pipeline::{render_report, LoadMode, Pipeline, PipelineConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "review-pipeline", version, about = "Bank app review pipeline")]
struct Cli {
    /// TOML configuration file (built-in defaults when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Clean and deduplicate raw reviews
    Preprocess,
    /// Attach sentiment and theme labels
    Analyze,
    /// Write labeled reviews to the database
    Load {
        /// Add to existing tables instead of dropping and recreating them
        #[arg(long)]
        append: bool,
    },
    /// Audit row counts and label completeness
    Verify {
        /// Exit non-zero when any check fails
        #[arg(long)]
        strict: bool,
    },
    /// Print per-bank insights and recommendations
    Insights,
    /// Run every stage in order
    Run {
        #[arg(long)]
        append: bool,
        #[arg(long)]
        strict: bool,
    },
}

fn load_mode(append: bool) -> LoadMode {
    if append {
        LoadMode::Append
    } else {
        LoadMode::Reset
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    let pipeline = Pipeline::new(config);

    match cli.command {
        Command::Preprocess => {
            let stats = pipeline.preprocess().context("Preprocessing failed")?;
            println!("✓ {}", stats.summary());
        }
        Command::Analyze => {
            let adapter = pipeline.sentiment_adapter()?;
            let count = pipeline.analyze(&adapter).context("Analysis failed")?;
            println!("✓ Labeled {} reviews", count);
        }
        Command::Load { append } => {
            let result = pipeline.load(load_mode(append)).context("Database load failed")?;
            println!(
                "✓ Loaded {} banks and {} reviews (run {})",
                result.banks_inserted, result.reviews_inserted, result.run_id
            );
        }
        Command::Verify { strict } => {
            let report = pipeline.verify().context("Integrity check failed to run")?;
            println!("{}", report.summary());
            if strict && !report.passed() {
                process::exit(2);
            }
        }
        Command::Insights => {
            let insights = pipeline.insights().context("Insight generation failed")?;
            print!("{}", render_report(&insights));
        }
        Command::Run { append, strict } => {
            let summary = pipeline.run(load_mode(append)).context("Pipeline run failed")?;
            println!("✓ {}", summary.normalization.summary());
            println!("✓ Labeled {} reviews", summary.labeled);
            println!(
                "✓ Loaded {} banks and {} reviews",
                summary.load.banks_inserted, summary.load.reviews_inserted
            );
            println!("{}", summary.verification.summary());
            print!("{}", render_report(&summary.insights));
            if strict && !summary.verification.passed() {
                process::exit(2);
            }
        }
    }

    Ok(())
}
