//! Conductor - declarative conformance testing for MCP servers

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use conductor::config::{ServerConfig, DEFAULT_CONFIG_PATH};
use conductor::report::OutputOptions;
use conductor::suite::{apply_filter, load_suites, Filter};
use conductor::{check_suites, run_suites};

#[derive(Parser, Debug)]
#[command(name = "conductor")]
#[command(about = "Conductor - declarative conformance testing for MCP servers")]
#[command(version)]
struct Args {
    /// Suite files or glob patterns (e.g. "tests/**/*.yaml").
    #[arg(value_name = "SUITE", required = true)]
    suites: Vec<String>,

    /// Path to the server config file.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: std::path::PathBuf,

    /// Filter expression: `tag:x`, `/regex/`, or a substring of the
    /// test name or suite description.
    #[arg(long, value_name = "EXPR")]
    filter: Option<String>,

    /// Show passing tests with full context.
    #[arg(long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print the summary line.
    #[arg(long)]
    quiet: bool,

    /// Enable debug logging.
    #[arg(long, conflicts_with = "quiet")]
    debug: bool,

    /// Append per-test and per-suite durations.
    #[arg(long)]
    timing: bool,

    /// Emit machine-readable JSON results on stdout.
    #[arg(long)]
    json: bool,

    /// Only print failing and erroring tests.
    #[arg(long)]
    errors_only: bool,

    /// Cluster identical diagnostics at the end of the report.
    #[arg(long)]
    group_errors: bool,

    /// One line per failure, no diagnostic detail.
    #[arg(long)]
    concise: bool,

    /// Cap on diagnostics printed across the whole run.
    #[arg(long, value_name = "N")]
    max_errors: Option<usize>,

    /// Parse suites and compile patterns without launching the server.
    #[arg(long)]
    syntax_only: bool,

    /// Suppress suggestion and grouping analysis in the output.
    #[arg(long)]
    no_analysis: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug { "debug" } else { "info" };
    // Logs go to stderr so `--json` output on stdout stays parseable.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let mut suites = load_suites(&args.suites)?;
    if let Some(expr) = &args.filter {
        let filter = Filter::parse(expr)?;
        suites = apply_filter(suites, &filter);
    }

    let report = if args.syntax_only {
        check_suites(&suites)
    } else {
        let config = ServerConfig::load(&args.config)?;
        run_suites(&config, &suites).await
    };

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        let options = OutputOptions {
            verbose: args.verbose,
            quiet: args.quiet,
            timing: args.timing,
            errors_only: args.errors_only,
            group_errors: args.group_errors,
            concise: args.concise,
            max_errors: args.max_errors,
            no_analysis: args.no_analysis,
        };
        print!("{}", report.render_human(&options));
    }

    std::process::exit(report.exit_code());
}
