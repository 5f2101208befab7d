use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use log::info;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

mod cli;

use cli::{Cli, Commands};
use mender::config::Config;
use mender::domain::{Event, EventLevel, PollPage};
use mender::ipc::{DaemonResponse, Events, IpcClient};

const FOLLOW_INTERVAL: Duration = Duration::from_millis(500);

fn setup_logging(level: Option<&str>) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mender")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("mender.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.unwrap_or("info")))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Daemon => handle_daemon_command(config).await,
        Commands::Trigger { kind } => handle_trigger_command(kind, config).await,
        Commands::Status { since, follow } => handle_status_command(*since, *follow, config).await,
        Commands::Reset => handle_reset_command(config).await,
        Commands::Cancel => handle_cancel_command(config).await,
        Commands::Report => handle_report_command(config).await,
        Commands::Chat { message } => handle_chat_command(&message.join(" "), config).await,
    }
}

async fn connect(config: &Config) -> Result<IpcClient> {
    let client = IpcClient::with_socket(&config.ipc.socket_path);
    client.connect().await?;
    Ok(client)
}

/// Unwrap a daemon response into its result value
fn into_result(response: DaemonResponse) -> Result<Value> {
    match (response.result, response.error) {
        (_, Some(err)) => Err(eyre!("{} (code {})", err.message, err.code)),
        (Some(result), None) => Ok(result),
        (None, None) => Ok(Value::Null),
    }
}

fn print_event(event: &Event) {
    let line = format!("[{}] {}", event.clock(), event.message);
    let styled = match event.level {
        EventLevel::Phase => line.cyan().bold(),
        EventLevel::Error => line.red(),
        EventLevel::Success => line.green(),
        EventLevel::Warning => line.yellow(),
        EventLevel::Banner | EventLevel::Complete => line.bold(),
        EventLevel::Tool | EventLevel::ToolResult | EventLevel::Divider => line.dimmed(),
        EventLevel::Info => line.normal(),
    };
    println!("{}", styled);
}

async fn handle_daemon_command(config: &Config) -> Result<()> {
    println!(
        "{} {}",
        "Starting mender daemon on".cyan(),
        config.ipc.socket_path.display()
    );

    let shutdown = CancellationToken::new();
    let watcher = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            watcher.cancel();
        }
    });

    mender::daemon::run(config, shutdown).await.context("Daemon failed")?;
    println!("{}", "Daemon stopped".cyan());
    Ok(())
}

async fn handle_trigger_command(kind: &str, config: &Config) -> Result<()> {
    info!("Triggering repair for {}", kind);
    let client = connect(config).await?;
    let result = into_result(client.trigger(kind).await?)?;
    println!(
        "{} {}  {}",
        "Triggered:".green(),
        result["run_id"].as_str().unwrap_or("?"),
        result["label"].as_str().unwrap_or(kind)
    );
    Ok(())
}

async fn handle_status_command(since: Option<usize>, follow: bool, config: &Config) -> Result<()> {
    let client = connect(config).await?;

    if since.is_none() && !follow {
        let record = into_result(client.status().await?)?;
        println!("{} {}", "Run:".green(), record["run_id"].as_str().unwrap_or("(none)"));
        println!("  Phase:    {}", record["phase"].as_str().unwrap_or("?"));
        println!("  Running:  {}", record["running"]);
        if let Some(outcome) = record["outcome"].as_str() {
            println!("  Outcome:  {}", outcome);
        }
        if let Some(reason) = record["abort_reason"].as_str() {
            println!("  Reason:   {}", reason.red());
        }
        if let Some(kind) = record["incident"]["failure_kind"].as_str() {
            println!("  Failure:  {}", kind);
        }
        println!("  Tests:    {} attempt(s)", record["incident"]["test_attempts"]);
        println!("  Events:   {}", record["log"].as_array().map(Vec::len).unwrap_or(0));
        if let Some(path) = record["report"]["path"].as_str() {
            println!("  Report:   {}", path);
        }
        return Ok(());
    }

    let mut cursor = since.unwrap_or(0);
    loop {
        let page: PollPage = serde_json::from_value(into_result(client.poll(cursor).await?)?)
            .context("Malformed poll response")?;
        for event in &page.events {
            print_event(event);
        }
        cursor = page.total.max(cursor);

        if !follow || !page.running {
            if let Some(outcome) = page.outcome {
                println!("{} {:?}", "Outcome:".green(), outcome);
            }
            return Ok(());
        }
        tokio::time::sleep(FOLLOW_INTERVAL).await;
    }
}

async fn handle_reset_command(config: &Config) -> Result<()> {
    let client = connect(config).await?;
    into_result(client.reset().await?)?;
    println!("{}", "Reset to idle; incident log emptied".green());
    Ok(())
}

async fn handle_cancel_command(config: &Config) -> Result<()> {
    let client = connect(config).await?;
    into_result(client.cancel().await?)?;
    println!("{}", "Cancellation requested".yellow());
    Ok(())
}

async fn handle_report_command(config: &Config) -> Result<()> {
    let client = connect(config).await?;
    let report = into_result(client.report().await?)?;
    println!("{} {}", "Report:".green(), report["path"].as_str().unwrap_or("?"));
    println!();
    println!("{}", report["content"].as_str().unwrap_or_default());
    Ok(())
}

async fn handle_chat_command(message: &str, config: &Config) -> Result<()> {
    info!("Chat: {}", message);
    let client = connect(config).await?;
    into_result(client.subscribe().await?)?;

    let handled = into_result(client.chat_send(message).await?)?;
    if handled["handled"] != Value::Bool(true) {
        println!("{}", "(not a command; ignored)".dimmed());
        return Ok(());
    }

    while let Some(event) = client.recv_event().await {
        if event.event != Events::CHAT_MESSAGE {
            continue;
        }
        if event.data["done"] == Value::Bool(true) {
            break;
        }
        println!("{}\n", event.data["text"].as_str().unwrap_or_default());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging
    setup_logging(config.log_level.as_deref()).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
