use anyhow::{Context, Result};
use binvet::cli::{Args, Command, OutputFormat};
use binvet::driver::Driver;
use binvet::policy::Policy;
use binvet::report::{normalize_run, Run};
use binvet::{diff, output, rules};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = Args::parse();

    // RUST_LOG wins; otherwise the verbose flag selects the level.
    let env_filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if args.verbose {
        EnvFilter::new("binvet=debug")
    } else {
        EnvFilter::new("binvet=warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn run(args: Args) -> Result<ExitCode> {
    let (rendered, exit) = match args.command {
        Command::Analyze { ref paths, recurse, threads, ref config, ref normalize_root } => {
            analyze(paths, recurse, threads, config.as_deref(), normalize_root.as_deref(), &args.format)?
        }
        Command::Diff { ref expected, ref actual } => diff_logs(expected, actual, &args.format)?,
        Command::Rules => (list_rules(), ExitCode::SUCCESS),
    };

    match &args.output {
        Some(path) => {
            fs::write(path, &rendered)
                .with_context(|| format!("failed to write output to {}", path.display()))?;
            eprintln!("results written to: {}", path.display());
        }
        None => print!("{rendered}"),
    }

    Ok(exit)
}

fn analyze(
    paths: &[PathBuf],
    recurse: bool,
    threads: usize,
    config: Option<&std::path::Path>,
    normalize_root: Option<&str>,
    format: &OutputFormat,
) -> Result<(String, ExitCode)> {
    let policy = match config {
        Some(path) => Policy::load(path)?,
        None => Policy::empty(),
    };

    let driver = Driver::new(rules::builtin_rules(), policy)
        .threads(threads)
        .recurse(recurse);
    let run = driver.run(paths)?;

    let run = match normalize_root {
        Some(root) => normalize_run(&run, Some(root)),
        None => run,
    };

    let exit = ExitCode::from(run.exit_code() as u8);
    let rendered = match format {
        OutputFormat::Json => output::render_json(&run)?,
        OutputFormat::Terminal => output::render_terminal(&run),
    };
    Ok((rendered, exit))
}

fn diff_logs(
    expected_path: &std::path::Path,
    actual_path: &std::path::Path,
    format: &OutputFormat,
) -> Result<(String, ExitCode)> {
    let read_run = |path: &std::path::Path| -> Result<Run> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read run log {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("{} is not a valid run log", path.display()))
    };

    let expected = normalize_run(&read_run(expected_path)?, None);
    let actual = normalize_run(&read_run(actual_path)?, None);
    let outcome = diff::diff_runs(&expected, &actual);

    let exit = if outcome.is_match() { ExitCode::SUCCESS } else { ExitCode::from(1) };
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&outcome)? + "\n",
        OutputFormat::Terminal => output::render_diff(&outcome),
    };
    Ok((rendered, exit))
}

fn list_rules() -> String {
    use std::fmt::Write;
    let mut out = String::new();
    for rule in rules::builtin_rules() {
        let _ = writeln!(out, "{}  {}", rule.id(), rule.name());
        let _ = writeln!(out, "    {}", rule.description());
        for option in rule.options() {
            let default = serde_json::to_string(&option.default).unwrap_or_default();
            let _ = writeln!(out, "    option {} (default: {})", option.name, default);
        }
    }
    out
}
