//! Synheart Vitals Agent CLI
//!
//! Personal-baseline vitals monitor for research.

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use synheart_vitals_agent::{
    config::Config,
    core::{MonitorSession, ReportBuilder, RunRecorder, SessionOutcome},
    explain::{create_shared_stats_with_persistence, EventLog},
    ingest::{InputFormat, ReadingSource, SourceItem, SweatBand, VitalsSimulator},
    notify::{AlertNotice, AlertSink, LogSink},
    DISCLAIMER, DISCLAIMER_SHORT, VERSION,
};

#[cfg(feature = "notify")]
use synheart_vitals_agent::{notify::NotifyConfig, BlockingWebhookNotifier};

#[derive(Parser)]
#[command(name = "synheart-vitals")]
#[command(author = "Synheart")]
#[command(version = VERSION)]
#[command(about = "Personal-baseline vitals monitor for research", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a stream of readings
    Monitor {
        /// Input file (stdin if omitted)
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// Input format (csv or jsonl)
        #[arg(long, default_value = "csv")]
        format: String,

        /// Use the built-in simulator instead of an input stream
        #[arg(long)]
        simulate: bool,

        /// Simulator seed
        #[arg(long, default_value = "7")]
        seed: u64,

        /// Stop after this many readings
        #[arg(long)]
        count: Option<usize>,

        /// Delay between simulated readings in milliseconds
        #[arg(long, default_value = "1000")]
        interval_ms: u64,

        /// Post alert notices to this webhook (requires notify feature)
        #[arg(long)]
        notify_url: Option<String>,

        /// Skip writing the session report
        #[arg(long)]
        no_export: bool,
    },

    /// Print simulated readings
    Simulate {
        /// Number of readings
        #[arg(long, default_value = "120")]
        count: usize,

        /// Simulator seed
        #[arg(long, default_value = "7")]
        seed: u64,

        /// Output format (csv or jsonl)
        #[arg(long, default_value = "csv")]
        format: String,
    },

    /// Accept readings over HTTP (requires server feature)
    Serve {
        /// Port to bind to
        #[arg(long, default_value = "8791")]
        port: u16,
    },

    /// Show monitoring statistics
    Status,

    /// Show configuration
    Config,

    /// Display the health disclaimer
    Disclaimer,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Monitor {
            input,
            format,
            simulate,
            seed,
            count,
            interval_ms,
            notify_url,
            no_export,
        } => cmd_monitor(MonitorArgs {
            input,
            format,
            simulate,
            seed,
            count,
            interval_ms,
            notify_url,
            no_export,
        }),
        Commands::Simulate {
            count,
            seed,
            format,
        } => cmd_simulate(count, seed, &format),
        Commands::Serve { port } => cmd_serve(port),
        Commands::Status => cmd_status(),
        Commands::Config => cmd_config(),
        Commands::Disclaimer => {
            println!("{DISCLAIMER}");
            Ok(())
        }
    }
}

struct MonitorArgs {
    input: Option<PathBuf>,
    format: String,
    simulate: bool,
    seed: u64,
    count: Option<usize>,
    interval_ms: u64,
    notify_url: Option<String>,
    no_export: bool,
}

fn cmd_monitor(args: MonitorArgs) -> anyhow::Result<()> {
    println!("Synheart Vitals Agent v{VERSION}");
    println!();

    let config = Config::load().context("loading configuration")?;
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }
    let tz = config.display_timezone();

    let mut source = if args.simulate {
        let simulator = VitalsSimulator::new(args.seed, Utc::now(), chrono::Duration::seconds(1));
        let pace = (args.interval_ms > 0).then(|| Duration::from_millis(args.interval_ms));
        println!("Source: simulator (seed {})", args.seed);
        ReadingSource::from_items(simulator.map(Ok), pace)
    } else {
        let format = InputFormat::from_name(&args.format)
            .with_context(|| format!("unknown input format '{}'", args.format))?;
        match args.input {
            Some(ref path) => {
                let file = std::fs::File::open(path)
                    .with_context(|| format!("opening {}", path.display()))?;
                println!("Source: {}", path.display());
                ReadingSource::from_reader(BufReader::new(file), format)
            }
            None => {
                println!("Source: stdin");
                ReadingSource::from_reader(BufReader::new(std::io::stdin()), format)
            }
        }
    };

    let mut sink = create_sink(args.notify_url, &config);

    println!("  Baseline window: {} readings", config.baseline.window);
    println!(
        "  Thresholds: mild {:.0}%, strong {:.0}%",
        config.thresholds.mild * 100.0,
        config.thresholds.strong * 100.0
    );
    println!("  Timezone: {tz}");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    let stats = create_shared_stats_with_persistence(config.stats_path());
    let mut session = MonitorSession::from_config(&config);
    let mut event_log = EventLog::new(config.event_log_capacity);
    let mut recorder = RunRecorder::new(config.report_history);

    source.start()?;
    let receiver = source.receiver().clone();

    while running.load(Ordering::SeqCst) {
        if args.count.is_some_and(|n| recorder.reading_count() >= n as u64) {
            break;
        }

        let item: SourceItem = match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(item) => item,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        };

        let raw = match item {
            Ok(raw) => raw,
            Err(e) => {
                stats.record_unparseable();
                eprintln!("Skipped line: {e}");
                continue;
            }
        };

        match session.process_raw(raw) {
            Ok(outcome) => {
                stats.record_outcome(&outcome);
                print_outcome(&outcome, &tz);

                if let Some(notice) = AlertNotice::from_outcome(&outcome) {
                    if let Err(e) = sink.deliver(&notice) {
                        eprintln!("Warning: Alert notice failed: {e}");
                    }
                }

                recorder.record(&outcome);
                event_log.push_all(outcome.events);
            }
            Err(e) => {
                stats.record_error(&e);
                eprintln!("Skipped reading: {e}");
            }
        }
    }

    println!();
    println!("Stopping monitor...");
    source.stop();

    if let Err(e) = stats.save() {
        eprintln!("Warning: Could not save stats: {e}");
    }

    if !args.no_export && recorder.reading_count() > 0 {
        let final_baseline = session
            .baseline_status()
            .is_ready()
            .then(|| session.current_baseline());
        let builder = ReportBuilder::new()
            .with_session_id(format!("SESS-{}", Utc::now().timestamp_millis()));
        let report = builder.build_from(&recorder, final_baseline);
        let json = serde_json::to_string_pretty(&report)?;

        let export_path = config.export_path.join(format!(
            "session_{}.json",
            Utc::now().format("%Y%m%d_%H%M%S")
        ));
        if let Some(parent) = export_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match std::fs::write(&export_path, json) {
            Ok(_) => println!(
                "Exported {} of {} readings to {:?}",
                recorder.retained_readings(),
                recorder.reading_count(),
                export_path
            ),
            Err(e) => eprintln!("Error writing session report: {e}"),
        }
    }

    if !event_log.is_empty() {
        println!();
        println!("Recent events:");
        for event in event_log.iter().take(10) {
            println!(
                "  [{}] {}",
                event.timestamp.with_timezone(&tz).format("%H:%M:%S"),
                event.message
            );
        }
    }

    println!();
    println!("{}", stats.summary());
    Ok(())
}

fn print_outcome(outcome: &SessionOutcome, tz: &chrono_tz::Tz) {
    let c = &outcome.classified;
    let r = &c.reading;
    println!(
        "[{}] {:<8} hr {:>5.1} | temp {:>4.1} | sweat {:>5.0} ({}) | dev {:>5.1}%{}",
        r.timestamp().with_timezone(tz).format("%H:%M:%S"),
        c.state,
        r.heart_rate(),
        r.skin_temp(),
        r.sweat_level(),
        SweatBand::from_level(r.sweat_level()).as_str(),
        outcome.deviation.max_magnitude * 100.0,
        if c.provisional { " (learning)" } else { "" }
    );
    for event in &outcome.events {
        println!("    -> {}", event.message);
    }
}

fn cmd_simulate(count: usize, seed: u64, format: &str) -> anyhow::Result<()> {
    let format = InputFormat::from_name(format)
        .with_context(|| format!("unknown output format '{format}'"))?;
    let simulator = VitalsSimulator::new(seed, Utc::now(), chrono::Duration::seconds(1));

    if format == InputFormat::Csv {
        println!("time,heart_rate,skin_temp,sweat_level");
    }
    for raw in simulator.take(count) {
        match format {
            InputFormat::Csv => println!(
                "{},{:.1},{:.2},{:.0}",
                raw.timestamp.map(|t| t.timestamp_millis()).unwrap_or_default(),
                raw.heart_rate.unwrap_or_default(),
                raw.skin_temp.unwrap_or_default(),
                raw.sweat_level.unwrap_or_default()
            ),
            InputFormat::JsonLines => println!("{}", serde_json::to_string(&raw)?),
        }
    }
    Ok(())
}

#[cfg(feature = "server")]
fn cmd_serve(port: u16) -> anyhow::Result<()> {
    use synheart_vitals_agent::server::{run, ServerConfig};

    let config = Config::load().context("loading configuration")?;
    let state_dir = config.data_path.join("server");
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async move {
        let (addr, shutdown_tx) = run(ServerConfig::new(port, config, state_dir)).await?;
        println!("Synheart Vitals Agent v{VERSION}");
        println!("Listening on http://{addr}");
        println!("Press Ctrl+C to stop");

        tokio::signal::ctrl_c().await?;
        println!("Stopping server...");
        let _ = shutdown_tx.send(());
        Ok::<(), anyhow::Error>(())
    })
}

#[cfg(not(feature = "server"))]
fn cmd_serve(_port: u16) -> anyhow::Result<()> {
    anyhow::bail!("serve requires the server feature (rebuild with --features server)")
}

fn cmd_status() -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();

    println!("Synheart Vitals Agent Status");
    println!("============================");
    println!();

    println!("Configuration:");
    println!("  Baseline window: {} readings", config.baseline.window);
    println!(
        "  Adaptation: after {} NORMAL readings, alpha {}",
        config.baseline.adapt_start, config.baseline.alpha
    );
    println!(
        "  Thresholds: mild {:.0}%, strong {:.0}%",
        config.thresholds.mild * 100.0,
        config.thresholds.strong * 100.0
    );
    println!(
        "  Alert webhook: {}",
        if config.notify.is_some() {
            "configured"
        } else {
            "none"
        }
    );
    println!();

    let stats_path = config.stats_path();
    if stats_path.exists() {
        let content = std::fs::read_to_string(&stats_path)?;
        let stats: serde_json::Value = serde_json::from_str(&content)?;
        println!("Cumulative Statistics:");
        for (label, key) in [
            ("Readings classified", "readings_processed"),
            ("Readings rejected", "readings_rejected"),
            ("Out-of-order readings", "out_of_order"),
            ("Events emitted", "events_emitted"),
            ("Alerts raised", "alerts_raised"),
        ] {
            if let Some(value) = stats.get(key) {
                println!("  {label}: {value}");
            }
        }
    } else {
        println!("No previous monitoring data found.");
    }

    println!();
    println!("{DISCLAIMER_SHORT}");
    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("setting Ctrl+C handler")
}

/// Pick the alert sink from CLI args or configuration.
#[cfg(feature = "notify")]
fn create_sink(url: Option<String>, config: &Config) -> Box<dyn AlertSink> {
    let notify = match url {
        Some(url) => Some(
            config
                .notify
                .clone()
                .map(|n| NotifyConfig { url: url.clone(), ..n })
                .unwrap_or_else(|| NotifyConfig::new(url)),
        ),
        None => config.notify.clone(),
    };

    match notify {
        Some(notify) => match BlockingWebhookNotifier::new(notify) {
            Ok(notifier) => {
                println!("  Alert webhook: enabled");
                Box::new(notifier)
            }
            Err(e) => {
                eprintln!("Warning: Webhook initialization failed: {e}");
                eprintln!("Continuing with log-only alerts.");
                Box::new(LogSink::new())
            }
        },
        None => Box::new(LogSink::new()),
    }
}

#[cfg(not(feature = "notify"))]
fn create_sink(url: Option<String>, _config: &Config) -> Box<dyn AlertSink> {
    if url.is_some() {
        eprintln!("Warning: --notify-url ignored (notify feature not enabled at compile time)");
    }
    Box::new(LogSink::new())
}
