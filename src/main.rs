use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use uxpilot::config::{AgentConfig, LoopConfig, ProviderSettings};
use uxpilot::device::MaestroDriver;
use uxpilot::llm::create_provider;
use uxpilot::preflight;
use uxpilot::report::MarkdownRecorder;
use uxpilot::session::SessionRunner;

#[derive(Parser)]
#[command(
    name = "uxpilot",
    version,
    about = "Autonomous mobile QA and UX audit agent"
)]
struct Cli {
    /// Log level when RUST_LOG is not set (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one test session against the attached device
    Run(RunArgs),
    /// Check that adb, maestro, and a connected device are reachable
    Doctor,
}

#[derive(Args)]
struct RunArgs {
    /// Natural-language goal for this session
    #[arg(long)]
    goal: String,

    /// Vision-model provider (openai or anthropic); defaults to
    /// UXPILOT_PROVIDER or openai
    #[arg(long)]
    provider: Option<String>,

    /// Model override; defaults to the provider's standard vision model
    #[arg(long)]
    model: Option<String>,

    /// Iteration budget before the session stops
    #[arg(long, default_value_t = 50)]
    max_steps: u32,

    /// Elapsed ms since the last action that triggers a latency UX signal
    #[arg(long, default_value_t = 5000)]
    latency_threshold_ms: u64,

    /// Pause after each action before the next capture, in ms
    #[arg(long, default_value_t = 2000)]
    settle_ms: u64,

    /// Longest edge of the screenshot sent to the model, in pixels
    #[arg(long, default_value_t = 1024)]
    frame_max_edge: u32,

    /// JPEG quality for the encoded screenshot (1-100)
    #[arg(long, default_value_t = 85)]
    frame_quality: u8,

    /// Attempt ceiling for one decision, counting the first call
    #[arg(long, default_value_t = 3)]
    decision_attempts: u32,

    /// Directory for session reports
    #[arg(long, default_value = "reports")]
    reports_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Commands::Run(args) => run_session(args).await,
        Commands::Doctor => run_doctor().await,
    }
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run_session(args: RunArgs) -> Result<()> {
    let provider_settings = ProviderSettings::resolve(
        args.provider.as_deref(),
        args.model.as_deref(),
    )?;

    let loop_config = LoopConfig {
        max_steps: args.max_steps,
        latency_threshold: Duration::from_millis(args.latency_threshold_ms),
        settle_delay: Duration::from_millis(args.settle_ms),
        frame_max_edge: args.frame_max_edge,
        frame_quality: args.frame_quality,
        decision_attempts: args.decision_attempts,
        ..LoopConfig::default()
    };
    loop_config.validate()?;

    let config = AgentConfig::new(provider_settings, loop_config, args.reports_dir);

    // Refuse to enter the loop when the toolchain or device is missing.
    let checks = preflight::run_checks().await;
    if !checks.all_ok() {
        print_check_report(&checks);
        bail!("preflight failed; fix the issues above and retry");
    }
    info!(
        adb = %checks.adb.detail,
        maestro = %checks.maestro.detail,
        device = %checks.device.detail,
        "preflight passed"
    );

    let provider = create_provider(&config.provider)?;
    let device = MaestroDriver::new(config.command_timeout, config.capture_timeout);
    let mut recorder = MarkdownRecorder::create(&config.reports_dir, &args.goal)?;
    let report_path = recorder.path().to_path_buf();

    // Operator interruption: seal best-effort instead of hanging on
    // in-flight calls (which are all individually time-bounded).
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, sealing session");
                cancel.cancel();
            }
        });
    }

    let runner = SessionRunner::new(
        &device,
        provider.as_ref(),
        &mut recorder,
        config.loop_config,
        cancel,
    );
    let outcome = runner.run(&args.goal).await;

    info!(
        steps = outcome.steps,
        reason = %outcome.termination.reason(),
        report = %report_path.display(),
        "session finished"
    );

    if outcome.seal_failed {
        warn!("session report could not be sealed; step blocks above the summary are intact");
    }
    if let uxpilot::session::Termination::FatalError { reason } = &outcome.termination {
        bail!("session ended with a fatal error: {reason}");
    }
    Ok(())
}

async fn run_doctor() -> Result<()> {
    let checks = preflight::run_checks().await;
    print_check_report(&checks);
    if !checks.all_ok() {
        bail!("some checks failed");
    }
    println!("\nAll checks passed. uxpilot is ready to run.");
    Ok(())
}

fn print_check_report(checks: &preflight::CheckReport) {
    let row = |name: &str, result: &preflight::CheckResult| {
        let mark = if result.ok { "OK" } else { "FAIL" };
        println!("  [{mark}] {name}: {}", result.detail);
    };
    println!("uxpilot preflight:");
    row("adb", &checks.adb);
    row("maestro", &checks.maestro);
    row("device", &checks.device);
}
