use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::SubscriberBuilder;
use tracing_subscriber::EnvFilter;

mod history;
mod problems;
mod provenance;
mod runner;

use runner::RunCfg;

#[derive(Parser)]
#[command(name = "cli")]
#[command(about = "Nelder-Mead search runner")]
struct Cmd {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log: String,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Run repeated simplex searches on a built-in problem
    Run {
        /// JSON run configuration; defaults when omitted
        #[arg(long)]
        config: Option<PathBuf>,
        /// One of: sphere, rosenbrock, constrained, crash
        #[arg(long)]
        problem: String,
        #[arg(long, default_value_t = 2)]
        dim: usize,
        /// Overrides the seed of the configuration
        #[arg(long)]
        seed: Option<u64>,
        /// Result JSON
        #[arg(long)]
        out: PathBuf,
        /// Evaluation history CSV
        #[arg(long)]
        history: Option<PathBuf>,
    },
    /// Print a provenance block, or summarize a history CSV
    Report {
        #[arg(long)]
        history: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cmd = Cmd::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cmd.log));
    SubscriberBuilder::default()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    match cmd.action {
        Action::Run {
            config,
            problem,
            dim,
            seed,
            out,
            history,
        } => run(config.as_deref(), &problem, dim, seed, &out, history.as_deref()),
        Action::Report { history } => report(history.as_deref()),
    }
}

fn load_cfg(path: Option<&Path>) -> Result<RunCfg> {
    let Some(path) = path else {
        return Ok(RunCfg::default());
    };
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))
}

fn run(
    config: Option<&Path>,
    problem: &str,
    dim: usize,
    seed: Option<u64>,
    out: &Path,
    history_path: Option<&Path>,
) -> Result<()> {
    let mut cfg = load_cfg(config)?;
    if let Some(seed) = seed {
        cfg.seed = seed;
    }
    let problem = problems::problem(problem, dim)?;
    tracing::info!(problem = problem.name, dim, seed = cfg.seed, "run");
    let (summary, cache) = runner::run(&problem, &cfg)?;

    if let Some(parent) = out.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(out, serde_json::to_vec_pretty(&summary)?)
        .with_context(|| format!("writing {}", out.display()))?;

    let mut payload = provenance::Payload::new(serde_json::json!({
        "problem": problem.name,
        "dim": dim,
        "config": cfg,
    }));
    if let Some(path) = history_path {
        history::write_history(&cache, path)?;
        payload = payload.with_output(path);
    }
    let sidecar = provenance::write_sidecar(out, payload)?;
    tracing::info!(
        best_f = summary.best_f,
        best_h = summary.best_h,
        calls = summary.calls.len(),
        blackbox_calls = summary.blackbox_calls,
        sidecar = %sidecar.display(),
        "run finished"
    );
    Ok(())
}

fn report(history_path: Option<&Path>) -> Result<()> {
    let obj = match history_path {
        Some(path) => serde_json::to_value(history::summarize(path)?)?,
        None => serde_json::json!({
            "code_rev": provenance::current_git_rev(),
            "nmsearch_version": nmsearch::VERSION,
            "problems": problems::NAMES,
            "default_config": RunCfg::default(),
        }),
    };
    println!("{}", serde_json::to_string_pretty(&obj)?);
    Ok(())
}
