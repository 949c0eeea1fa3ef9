use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use genesis_core::services::collaborators::{
    FeedbackSource, LineFileSource, NoFeedback, normalize_feedback,
};
use genesis_core::services::perception::parse_shape;
use genesis_core::{Orchestrator, RunReport, RunRequest, ensure_initialized};

#[derive(Parser)]
#[command(
    name = "genesis",
    about = "Event memory with a knowledge-graph-augmented decision pipeline"
)]
struct Cli {
    /// Workspace directory (config, tier artifacts, logbook)
    #[arg(long, global = true, env = "GENESIS_ROOT", default_value = ".genesis")]
    root: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Create the workspace layout (idempotent)
    Init,
    /// Run the pipeline once over a text file
    Run {
        #[arg(long)]
        text: PathBuf,
        /// Image embedding shape, e.g. 1x512
        #[arg(long)]
        image_shape: Option<String>,
        /// Numerical data shape, e.g. 100x5
        #[arg(long)]
        numerical_shape: Option<String>,
        /// File of external text, one item per line
        #[arg(long)]
        external: Option<PathBuf>,
        /// Unattended: do not prompt for feedback
        #[arg(long)]
        ci: bool,
        /// Long-term query term (defaults to config, then the input summary)
        #[arg(long)]
        query: Option<String>,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the pipeline over many text files in parallel (never prompts)
    Batch {
        files: Vec<PathBuf>,
        #[arg(long, default_value_t = 4)]
        workers: usize,
    },
    /// Print every stored event of a tier
    History {
        #[arg(long, value_enum, default_value_t = TierArg::Short)]
        tier: TierArg,
    },
    /// Case-insensitive search over stored input summaries
    Query {
        term: String,
        #[arg(long, value_enum, default_value_t = TierArg::Long)]
        tier: TierArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum TierArg {
    Short,
    Long,
}

/// Asks on stderr, reads one line from stdin.
struct StdinFeedback;

impl FeedbackSource for StdinFeedback {
    fn feedback(&self) -> Result<String> {
        eprint!("Enter your feedback on the system's decision (or type 'none' to skip): ");
        io::stderr().flush()?;
        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .context("reading feedback from stdin")?;
        Ok(normalize_feedback(&line))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(if cli.verbose { "debug" } else { "info" })?;
    tracing::debug!(root = %cli.root.display(), "using workspace");

    match cli.cmd {
        Cmd::Init => init(&cli.root),
        Cmd::Run {
            text,
            image_shape,
            numerical_shape,
            external,
            ci,
            query,
            json,
        } => {
            let mut req = RunRequest::from_file(text);
            if let Some(s) = image_shape {
                req = req.with_image_shape(parse_shape(&s)?);
            }
            if let Some(s) = numerical_shape {
                req = req.with_numerical_shape(parse_shape(&s)?);
            }
            if let Some(q) = query {
                req = req.with_query(q);
            }
            run(&cli.root, req, external, ci, json)
        }
        Cmd::Batch { files, workers } => batch(&cli.root, files, workers),
        Cmd::History { tier } => history(&cli.root, tier),
        Cmd::Query { term, tier } => query(&cli.root, &term, tier),
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
    Ok(())
}

fn init(root: &Path) -> Result<()> {
    let report = ensure_initialized(root)?;
    println!("Workspace: {}", report.root.display());
    for c in &report.created {
        println!("  created  {c}");
    }
    for e in &report.existed {
        println!("  existed  {e}");
    }
    Ok(())
}

fn run(
    root: &Path,
    req: RunRequest,
    external: Option<PathBuf>,
    ci: bool,
    json: bool,
) -> Result<()> {
    let mut orch = Orchestrator::open(root)?;
    if let Some(path) = external {
        orch = orch.with_external(LineFileSource::new(path));
    }
    let unattended = ci || orch.config().services.ci_mode;
    orch = if unattended {
        orch.with_feedback(NoFeedback)
    } else {
        orch.with_feedback(StdinFeedback)
    };

    let report = orch.run(&req)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(r: &RunReport) {
    println!("Decision: {}", r.decision);
    println!("Reward: {}", r.reward);
    println!(
        "Analysis: average_signal_value={:.6} improvement_needed={}",
        r.analysis.average_signal_value, r.analysis.improvement_needed
    );
    println!("Self-improvement: {}", r.improvement_outcome);
    println!("Action: {}", r.action_outcome);
    match r.performance.average_reward {
        Some(avg) => println!("History: average reward {avg:.3}"),
        None => println!("History: no data"),
    }
    for s in &r.performance.suggestions {
        println!("  - {s}");
    }
    println!("Code suggestion: {}", r.code_suggestion);
    println!("Targeted suggestion: {}", r.auto_code_suggestion);
    if !r.feedback.is_empty() {
        println!("Feedback: {}", r.feedback);
    }
    if let Some(ev) = &r.long_term_event {
        println!(
            "Long-term: image={:?} numerical={:?}",
            ev.multi_modal.image_embedding_shape, ev.multi_modal.numerical_data_shape
        );
    }
    println!(
        "Long-term query {:?}: {} match(es)",
        r.query_term,
        r.long_term_matches.len()
    );
}

fn batch(root: &Path, files: Vec<PathBuf>, workers: usize) -> Result<()> {
    if files.is_empty() {
        bail!("batch needs at least one input file");
    }
    let orch = Orchestrator::open(root)?;
    let reqs: Vec<RunRequest> = files.iter().map(RunRequest::from_file).collect();
    let results = orch.run_batch(&reqs, workers);

    let mut failed = 0usize;
    for (file, res) in files.iter().zip(&results) {
        match res {
            Ok(r) => println!("{}\t{}\t{}", file.display(), r.reward, r.decision.label),
            Err(e) => {
                failed += 1;
                println!("{}\tERROR\t{e}", file.display());
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {} runs failed", results.len());
    }
    Ok(())
}

fn history(root: &Path, tier: TierArg) -> Result<()> {
    let orch = Orchestrator::open(root)?;
    let text = match tier {
        TierArg::Short => serde_json::to_string_pretty(&orch.short_term().retrieve_all()?)?,
        TierArg::Long => serde_json::to_string_pretty(&orch.long_term().retrieve_all()?)?,
    };
    println!("{text}");
    Ok(())
}

fn query(root: &Path, term: &str, tier: TierArg) -> Result<()> {
    let orch = Orchestrator::open(root)?;
    let text = match tier {
        TierArg::Short => serde_json::to_string_pretty(&orch.short_term().query(term)?)?,
        TierArg::Long => serde_json::to_string_pretty(&orch.long_term().query(term)?)?,
    };
    println!("{text}");
    Ok(())
}
