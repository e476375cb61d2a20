use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

use telemetry_pipeline::analysis::{HealthScore, LogAnalyzer};
use telemetry_pipeline::config::{load_config, TelemetryConfig};
use telemetry_pipeline::events::{EventEmitter, Level, LogEvent};
use telemetry_pipeline::lifecycle::{signals, Shutdown};
use telemetry_pipeline::observability::logging;
use telemetry_pipeline::simulate::{self, Scenario};
use telemetry_pipeline::tail::{watcher_for, TailMonitor};

#[derive(Parser)]
#[command(name = "telemetry-cli")]
#[command(about = "Analyze, monitor and exercise the telemetry event streams", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the daily markdown report
    Report {
        /// Day to analyze (YYYY-MM-DD), today when omitted
        #[arg(short, long)]
        date: Option<NaiveDate>,
        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print daily metrics and health score as JSON
    Analyze {
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Follow today's event file and print notable entries
    Monitor,
    /// Emit sample events into today's files
    Simulate {
        #[arg(value_enum, default_value = "all")]
        scenario: Scenario,
    },
    /// Query a running host's admin status
    Status {
        #[arg(short, long, default_value = "http://localhost:5000")]
        url: String,
        #[arg(short, long)]
        key: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => TelemetryConfig::default(),
    };
    logging::init(&config.observability);

    match cli.command {
        Commands::Report { date, output } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let report = LogAnalyzer::from_config(&config).generate_daily_report(date)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &report.text)?;
                    println!("Report written to {}", path.display());
                }
                None => println!("{}", report.text),
            }
        }
        Commands::Analyze { date } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let metrics = LogAnalyzer::from_config(&config).parse_logs_for_date(date)?;
            let health = HealthScore::compute(&metrics);
            let out = json!({ "date": date, "metrics": metrics, "health": health });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Commands::Monitor => {
            let shutdown = Shutdown::new();
            signals::spawn_signal_handler(shutdown.clone());

            let mut monitor = TailMonitor::for_today(&config.emitter.log_dir, &config.emitter.service);
            let mut watcher = watcher_for(&config.tail);
            println!("Monitoring {} (Ctrl+C to stop)", monitor.path().display());
            let slow_ms = config.instrumentation.slow_response_ms;
            monitor
                .run(watcher.as_mut(), |event| print_notable(&event, slow_ms), shutdown.subscribe())
                .await?;
        }
        Commands::Simulate { scenario } => {
            let emitter = EventEmitter::daily_files(&config.emitter);
            simulate::run(&emitter, scenario);
            println!(
                "Scenario {:?} written to {}",
                scenario,
                config.emitter.log_dir.display()
            );
        }
        Commands::Status { url, key } => {
            let mut headers = HeaderMap::new();
            headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);
            let res = reqwest::Client::new()
                .get(format!("{}/admin/status", url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

fn print_notable(event: &LogEvent, slow_ms: u64) {
    if event.level == Level::Error {
        println!("NEW ERROR [{}] {}", event.timestamp, event.message);
        if let Some(error) = event.str_field("error") {
            println!("  {}", error);
        }
    }
    if event.has_flag("security") {
        println!(
            "SECURITY EVENT [{}] {} from {}",
            event.timestamp,
            event.message,
            event.str_field("ip").unwrap_or("unknown")
        );
    }
    if let Some(ms) = response_millis(event) {
        if ms > slow_ms {
            println!(
                "SLOW REQUEST [{}] {} {}ms",
                event.timestamp,
                event.str_field("url").unwrap_or("unknown"),
                ms
            );
        }
    }
}

fn response_millis(event: &LogEvent) -> Option<u64> {
    match event.field("responseTime")? {
        Value::String(s) => s.trim_end_matches("ms").parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("{}", text);
        }
        return Ok(());
    }
    let body: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
