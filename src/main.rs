//! mcp-aegis — runs declarative test suites against an MCP server speaking
//! JSON-RPC over stdio, printing a PASS/FAIL/ERROR line per test and a
//! final summary. Exits 0 only if every test in every suite passed.

use clap::Parser;
use mcp_aegis_rs::runner::outcome::{SuiteResult, TestStatus};
use mcp_aegis_rs::{config, Result, TestRunner};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "mcp-aegis")]
#[command(about = "Declarative test harness for MCP servers over stdio", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the server descriptor (command, args, startup timeout, ready pattern)
    #[arg(short, long, env = "MCP_AEGIS_CONFIG")]
    config: PathBuf,

    /// One or more suite files to run, in order, against fresh server instances
    #[arg(required = true)]
    suites: Vec<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "MCP_AEGIS_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    info!("mcp-aegis v{} starting", env!("CARGO_PKG_VERSION"));

    let descriptor = config::load_descriptor(&cli.config)?;

    let mut total = 0usize;
    let mut total_passed = 0usize;
    let mut any_suite_failed = false;

    for suite_path in &cli.suites {
        let suite = config::load_suite(suite_path)?;
        println!("\n{} ({})", suite.description, suite_path.display());

        let runner = TestRunner::new();
        let result = runner.run_suite(&descriptor, &suite).await;
        print_suite_result(&result);

        total += result.results.len();
        total_passed += result.pass_count();
        if !result.all_passed() {
            any_suite_failed = true;
        }
    }

    println!("\n{total_passed}/{total} tests passed across {} suite(s)", cli.suites.len());

    if any_suite_failed {
        std::process::exit(1);
    }
    Ok(())
}

fn print_suite_result(result: &SuiteResult) {
    for test in &result.results {
        match &test.status {
            TestStatus::Pass => println!("  PASS  {}", test.name),
            TestStatus::Fail(diffs) => {
                println!("  FAIL  {}", test.name);
                for diff in diffs {
                    println!("          {diff}");
                }
            }
            TestStatus::Error { kind, message } => {
                println!("  ERROR {} [{kind}]: {message}", test.name);
            }
        }
        for suggestion in &test.suggestions {
            println!("          hint: {}", suggestion.rationale);
        }
    }
    if let Some(reason) = &result.aborted {
        println!("  suite aborted: {reason}");
    }
}

fn init_tracing(log_level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::registry().with(filter).with(fmt::layer()).init();

    Ok(())
}
