//! # Valuation CLI Application
//!
//! Command-line front end for the valuation pipeline.
//!
//! ## Subcommands
//!
//! - `serve`: Run the HTTP valuation API
//! - `evaluate`: Score one page against a requirement and print the result
//! - `watch`: Drive the auto-evaluation controller from the terminal
//!
//! `serve` and `evaluate` log to stderr and export OTLP telemetry. `watch`
//! logs to `.valuation/watch.log` because stdout carries the relayed messages.

mod logging;
mod telemetry;

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{info, instrument, warn};
use valuation::acquirer::Acquirer;
use valuation::controller::{
    ChatSessionHandle, Controller, ControllerCommand, ControllerConfig, ControllerSnapshot,
    EnvironmentContext, HttpValuationClient, MessageKind, Mode, Notice, NoticeLevel,
    OutboundMessage, TickPolicy, ValuationBackend, format_score, outcome_messages,
};
use valuation::evaluation::{
    Evaluator, EvaluatorConfig, ScoreBand, ValuationRequest, ValuationTarget,
};
use valuation::format_markdown;
use valuation::model::{GeminiClient, ModelConfig};
use valuation::screenshot::ScreenshotClient;

#[derive(Parser)]
#[command(author, version, about = "Evaluate rendered web pages against natural-language requirements", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the valuation HTTP API
    Serve(ServeArgs),

    /// Evaluate a page once
    Evaluate(EvaluateArgs),

    /// Re-evaluate a page from the terminal until it meets the requirements
    Watch(WatchArgs),
}

#[derive(Args, Debug)]
struct ModelArgs {
    /// LLM model to use
    #[arg(short, long, default_value = "gemini-2.0-flash")]
    model: String,

    /// Client-side request quota per minute
    #[arg(long, default_value = "30")]
    requests_per_minute: u32,
}

impl ModelArgs {
    fn config(&self) -> ModelConfig {
        ModelConfig {
            model_name: self.model.clone(),
            requests_per_minute: self.requests_per_minute,
        }
    }
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:3000")]
    listen: String,

    #[command(flatten)]
    model: ModelArgs,
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    /// Page to evaluate
    #[arg(short, long)]
    url: String,

    /// Requirements the page should meet
    #[arg(short, long)]
    requirements: String,

    /// Tag to extract from external pages
    #[arg(short, long)]
    selector: Option<String>,

    /// Evaluate a screenshot instead of the page structure
    #[arg(long)]
    screenshot: bool,

    /// Output format (text or json)
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    #[command(flatten)]
    model: ModelArgs,
}

#[derive(Args, Debug)]
struct WatchArgs {
    /// Page to evaluate
    #[arg(short, long)]
    url: String,

    /// Requirements the page should meet
    #[arg(short, long)]
    requirements: String,

    /// Base URL of a running valuation API; evaluates in-process when omitted
    #[arg(long)]
    server: Option<String>,

    /// Score at which the requirements count as met
    #[arg(short, long, default_value = "80")]
    threshold: f64,

    /// Seconds between auto-mode runs
    #[arg(long, default_value = "10")]
    period_secs: u64,

    /// Start a new run on every tick even if the previous one is still pending
    #[arg(long)]
    allow_overlap: bool,

    /// Enter auto mode immediately
    #[arg(long)]
    auto: bool,

    #[command(flatten)]
    model: ModelArgs,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _otel = match &cli.command {
        Some(Commands::Serve(_)) | Some(Commands::Evaluate(_)) => {
            Some(telemetry::init_tracing_subscriber()?)
        }
        _ => None,
    };

    match cli.command {
        Some(Commands::Serve(args)) => serve_command(args).await?,
        Some(Commands::Evaluate(args)) => evaluate_command(args).await?,
        Some(Commands::Watch(args)) => {
            logging::setup_file_logging()?;
            watch_command(args).await?;
        }
        None => {
            let _ = Cli::parse_from(["valuation", "--help"]);
        }
    }

    Ok(())
}

fn build_evaluator(model: &ModelArgs) -> anyhow::Result<Evaluator<GeminiClient>> {
    let client = GeminiClient::new_gemini_from_env(&model.config())?;
    let evaluator = Evaluator::new(client, Acquirer::default(), EvaluatorConfig::default());

    Ok(match ScreenshotClient::from_env() {
        Ok(capturer) => evaluator.with_capturer(capturer),
        Err(e) => {
            warn!("Screenshot evaluation disabled: {}", e);
            evaluator
        }
    })
}

#[instrument]
async fn serve_command(args: ServeArgs) -> anyhow::Result<()> {
    let evaluator = build_evaluator(&args.model)?;
    println!("Listening on http://{}", args.listen);

    valuation::server::serve(&args.listen, evaluator, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown requested");
    })
    .await?;

    Ok(())
}

#[instrument]
async fn evaluate_command(args: EvaluateArgs) -> anyhow::Result<()> {
    let evaluator = build_evaluator(&args.model)?;
    let mut request = ValuationRequest::new(&args.url, &args.requirements);
    if let Some(selector) = args.selector {
        request = request.with_selector(selector);
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg} [{elapsed}]")?);
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(format!("Evaluating {}...", args.url));

    let outcome = if args.screenshot {
        evaluator.evaluate_screenshot(&request).await
    } else {
        evaluator.evaluate_dom(&request).await
    };
    spinner.finish_and_clear();
    let result = outcome.context("evaluation failed")?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => {
            let [summary, _] = outcome_messages(&result.evaluation, ControllerConfig::default().threshold);
            format_markdown(&summary.content)?;
        }
    }

    Ok(())
}

#[instrument]
async fn watch_command(args: WatchArgs) -> anyhow::Result<()> {
    let config = ControllerConfig::builder()
        .threshold(args.threshold)
        .period(Duration::from_secs(args.period_secs))
        .tick_policy(if args.allow_overlap {
            TickPolicy::Overlap
        } else {
            TickPolicy::Serialize
        })
        .auto_start(args.auto)
        .build();

    match args.server.clone() {
        Some(base) => run_watch(HttpValuationClient::new(base), config, args).await,
        None => {
            let evaluator = build_evaluator(&args.model)?;
            run_watch(evaluator, config, args).await
        }
    }
}

async fn run_watch<B: ValuationBackend>(backend: B, config: ControllerConfig, args: WatchArgs) -> anyhow::Result<()> {
    let threshold = config.threshold;
    let mut controller = Controller::new(backend, TerminalContext, TerminalChat::default(), config)
        .with_target(&args.url, &args.requirements);
    let snapshots = controller.subscribe();
    let (tx, rx) = mpsc::channel(16);

    print_help();
    let input = tokio::spawn(read_commands(tx, snapshots, threshold));
    controller.run(rx).await;
    input.abort();

    Ok(())
}

fn print_help() {
    println!("Commands: start | stop | run | mode <auto|manual> | url <url> | requirements <text>");
    println!("          history | history <n> | send | quit");
}

async fn read_commands(
    tx: mpsc::Sender<ControllerCommand>,
    snapshots: watch::Receiver<ControllerSnapshot>,
    threshold: f64,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read stdin: {}", e);
                break;
            }
        };

        let (word, rest) = match line.trim().split_once(' ') {
            Some((word, rest)) => (word, rest.trim()),
            None => (line.trim(), ""),
        };
        let command = match (word, rest) {
            ("", _) => continue,
            ("start", _) => ControllerCommand::StartAuto,
            ("stop", _) => ControllerCommand::StopAuto,
            ("run", _) => ControllerCommand::RunManual,
            ("mode", "auto") => ControllerCommand::SetMode(Mode::Auto),
            ("mode", "manual") => ControllerCommand::SetMode(Mode::Manual),
            ("url", url) if !url.is_empty() => ControllerCommand::SetUrl(url.to_string()),
            ("requirements", text) if !text.is_empty() => {
                ControllerCommand::SetRequirements(text.to_string())
            }
            ("history", "") => {
                print_history(&snapshots.borrow());
                continue;
            }
            ("history", n) => match n.parse::<usize>() {
                Ok(n) if n > 0 => {
                    let summary = history_summary(&snapshots.borrow(), n - 1, threshold);
                    match summary {
                        Some(summary) => {
                            if let Err(e) = format_markdown(&summary) {
                                warn!("Failed to render history entry: {}", e);
                                println!("{}", summary);
                            }
                        }
                        None => {
                            println!("No history entry {}", n);
                            continue;
                        }
                    }
                    ControllerCommand::SelectHistory(n - 1)
                }
                _ => {
                    println!("history takes an entry number starting at 1");
                    continue;
                }
            },
            ("send", _) => ControllerCommand::Resend,
            ("quit", _) | ("exit", _) => ControllerCommand::Shutdown,
            _ => {
                print_help();
                continue;
            }
        };

        let quit = command == ControllerCommand::Shutdown;
        if tx.send(command).await.is_err() || quit {
            break;
        }
    }
}

fn print_history(snapshot: &ControllerSnapshot) {
    if snapshot.history.is_empty() {
        println!("No evaluations yet");
        return;
    }

    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    for (i, item) in snapshot.history.iter().enumerate() {
        let score = item.result.score();
        let color = match ScoreBand::from_score(score) {
            ScoreBand::High => Color::Green,
            ScoreBand::Medium => Color::Yellow,
            ScoreBand::Low => Color::Red,
        };
        let target = match &item.result.target {
            ValuationTarget::Url(url) => url.as_str(),
            ValuationTarget::Screenshot(_) => "screenshot",
        };

        let _ = write!(stdout, "{:>3}  {}  ", i + 1, item.timestamp.format("%H:%M:%S"));
        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
        let _ = write!(stdout, "{:>5}%", format_score(score));
        let _ = stdout.reset();
        let _ = writeln!(stdout, "  {}", target);
    }
    if let Some(error) = &snapshot.error {
        let _ = writeln!(stdout, "Last error: {}", error);
    }
}

/// Markdown summary of the history entry at `index`
fn history_summary(snapshot: &ControllerSnapshot, index: usize, threshold: f64) -> Option<String> {
    let item = snapshot.history.get(index)?;
    let [summary, _] = outcome_messages(&item.result.evaluation, threshold);
    Some(summary.content)
}

/// Relays controller output to the terminal
struct TerminalContext;

impl EnvironmentContext for TerminalContext {
    fn current_address(&self) -> Option<String> {
        None
    }

    fn broadcast(&self, message: OutboundMessage) {
        let rendered = match message.kind {
            MessageKind::ValuationSuccess | MessageKind::ValuationSuggestions => {
                format_markdown(&message.content)
            }
            MessageKind::TriggerChat => format_markdown(&format!("> {}", message.content)),
        };
        if let Err(e) = rendered {
            warn!("Failed to render message: {}", e);
            println!("{}", message.content);
        }
    }

    fn notify(&self, notice: Notice) {
        let color = match notice.level {
            NoticeLevel::Info => Color::Cyan,
            NoticeLevel::Success => Color::Green,
            NoticeLevel::Error => Color::Red,
        };
        let mut stderr = StandardStream::stderr(ColorChoice::Auto);
        let _ = stderr.set_color(ColorSpec::new().set_fg(Some(color)));
        let _ = writeln!(stderr, "{}", notice.text);
        let _ = stderr.reset();
    }
}

/// The terminal stands in for the chat; it only records that a session began
#[derive(Default)]
struct TerminalChat {
    started: AtomicBool,
}

impl ChatSessionHandle for TerminalChat {
    fn mark_started(&self) {
        if !self.started.swap(true, Ordering::SeqCst) {
            info!("Chat session started");
        }
    }

    fn show_chat(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use valuation::evaluation::{EvaluationResult, ValuationHistoryItem, ValuationResult};

    fn snapshot(scores: &[f64]) -> ControllerSnapshot {
        ControllerSnapshot {
            history: scores
                .iter()
                .map(|score| {
                    ValuationHistoryItem::now(ValuationResult::for_url(
                        "http://localhost:5173",
                        EvaluationResult::new(*score, "Checked".to_string(), vec!["Add a footer".to_string()]),
                    ))
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_history_summary_renders_selected_entry() {
        let snapshot = snapshot(&[40.0, 90.0]);

        let low = history_summary(&snapshot, 0, 80.0).unwrap();
        let high = history_summary(&snapshot, 1, 80.0).unwrap();

        assert!(low.starts_with("## 🔄 Requirements Partially Met (40%)"));
        assert!(low.contains("- Add a footer"));
        assert!(high.starts_with("## ✅ Requirements Matched (90%)"));
        assert_eq!(history_summary(&snapshot, 2, 80.0), None);
    }
}
