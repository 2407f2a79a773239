//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use compintel_core::{
    OpenRouterClient, Pipeline, ResendNotifier, RunOptions, Services, chat, delivery,
};
use compintel_report::{ExportFormat, export_filename, render, render_markdown, write_export};
use compintel_shared::{
    AppConfig, ChannelProgress, EventKind, ProgressEvent, Report, ReportId, expand_home,
    init_config, load_config, validate_api_key,
};
use compintel_storage::Storage;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Competitor Intel: turn a company URL into a competitor report.
#[derive(Parser)]
#[command(
    name = "compintel",
    version,
    about = "Discover and analyze a company's competitors from its website.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// How `analyze` shows progress.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum EventFormat {
    /// A spinner with the current stage.
    Text,
    /// One JSON object per event on stdout.
    Json,
}

/// Export file format.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum FormatArg {
    Html,
    Markdown,
    Json,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Html => ExportFormat::Html,
            FormatArg::Markdown => ExportFormat::Markdown,
            FormatArg::Json => ExportFormat::Json,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Analyze a company's competitors from its website URL.
    Analyze {
        /// Company website, e.g. `acme.com` or `https://acme.com`.
        url: String,

        /// Email the finished report to this address.
        #[arg(short, long)]
        email: Option<String>,

        /// Maximum number of competitors to analyze.
        #[arg(long)]
        max_competitors: Option<usize>,

        /// Do not save the report to history.
        #[arg(long)]
        no_persist: bool,

        /// Progress output: text spinner or JSON lines.
        #[arg(long, default_value = "text")]
        events: EventFormat,
    },

    /// Browse stored reports.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Email a stored report.
    Send {
        /// Report ID.
        id: String,

        /// Recipient address.
        #[arg(short, long)]
        email: String,
    },

    /// Export a stored report to a file.
    Export {
        /// Report ID.
        id: String,

        /// Output format.
        #[arg(short, long, default_value = "html")]
        format: FormatArg,

        /// Output path (defaults to `competitor-intel-<company>.<ext>`).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Ask a question about a stored report.
    Chat {
        /// Report ID.
        id: String,

        /// The question.
        question: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Report history subcommands.
#[derive(Subcommand)]
pub(crate) enum HistoryAction {
    /// List stored reports, newest first.
    List {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Print one report as Markdown.
    Show {
        /// Report ID.
        id: String,
    },
    /// Delete every stored report.
    Clear {
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "compintel=info",
        1 => "compintel=debug",
        _ => "compintel=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so `--events json` output stays machine-readable.
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Analyze {
            url,
            email,
            max_competitors,
            no_persist,
            events,
        } => cmd_analyze(&url, email, max_competitors, no_persist, events).await,
        Command::History { action } => match action {
            HistoryAction::List { limit } => cmd_history_list(limit).await,
            HistoryAction::Show { id } => cmd_history_show(&id).await,
            HistoryAction::Clear { yes } => cmd_history_clear(yes).await,
        },
        Command::Send { id, email } => cmd_send(&id, &email).await,
        Command::Export { id, format, out } => cmd_export(&id, format.into(), out).await,
        Command::Chat { id, question } => cmd_chat(&id, &question).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Analyze
// ---------------------------------------------------------------------------

async fn cmd_analyze(
    url: &str,
    email: Option<String>,
    max_competitors: Option<usize>,
    no_persist: bool,
    events: EventFormat,
) -> Result<()> {
    // Validate API key before doing anything
    let config = load_config()?;
    validate_api_key(&config)?;

    if let Some(address) = email.as_deref() {
        delivery::validate_email(address)?;
    }

    let mut options = RunOptions::from_config(&config.defaults);
    options.recipient_email = email;
    if let Some(max) = max_competitors {
        if max == 0 {
            return Err(eyre!("--max-competitors must be at least 1"));
        }
        options.max_competitors = max;
    }
    if no_persist {
        options.persist = false;
    }

    let services = Services::from_config(&config).await?;
    if options.recipient_email.is_some() && services.notifier.is_none() {
        warn!(
            env = %config.email.api_key_env,
            "email delivery is not configured; the report will not be sent"
        );
    }

    // Ctrl-C cancels the run; the pipeline stops at the next await point.
    let cancel = options.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    info!(url, max_competitors = options.max_competitors, "analyzing competitors");

    let (sink, rx) = ChannelProgress::new();
    let printer = match events {
        EventFormat::Text => {
            let progress = CliProgress::new();
            tokio::spawn(progress.drain(rx))
        }
        EventFormat::Json => tokio::spawn(print_json_events(rx)),
    };

    let pipeline = Pipeline::new(services);
    let result = pipeline.run(url, &options, &sink).await;
    drop(sink);
    printer
        .await
        .map_err(|e| eyre!("progress printer failed: {e}"))?;

    let run = result?;
    if matches!(events, EventFormat::Text) {
        print_run_summary(&run.report, &run.warnings, run.elapsed, options.persist);
    }
    Ok(())
}

async fn print_json_events(mut rx: UnboundedReceiver<ProgressEvent>) {
    while let Some(event) = rx.recv().await {
        match serde_json::to_string(&event) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(error = %e, "failed to serialize progress event"),
        }
    }
}

fn print_run_summary(report: &Report, warnings: &[String], elapsed: Duration, persisted: bool) {
    println!();
    println!("  {} vs {} competitors", report.company_name, report.competitors.len());
    for competitor in report.competitors_by_threat() {
        println!(
            "    {:<24} {:<6} {:>3}/100  {}",
            competitor.name,
            competitor.threat_level.as_str(),
            competitor.effective_threat_score(),
            competitor.url
        );
    }
    if persisted {
        println!("  ID:     {}", report.id);
    }
    if let Some(to) = report.recipient_email.as_deref() {
        println!("  Sent:   {to}");
    }
    for warning in warnings {
        println!("  Warn:   {warning}");
    }
    println!("  Time:   {:.1}s", elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    async fn drain(self, mut rx: UnboundedReceiver<ProgressEvent>) {
        while let Some(event) = rx.recv().await {
            self.show(event);
        }
        self.spinner.finish_and_clear();
    }

    fn show(&self, event: ProgressEvent) {
        let detail = event.detail.unwrap_or_default();
        match event.stage {
            EventKind::Warning => self.spinner.println(format!("  warning: {detail}")),
            EventKind::Error => self.spinner.println(format!("  error: {detail}")),
            EventKind::CompetitorDone | EventKind::ReportSent | EventKind::Profile => {
                self.spinner.println(format!("  {detail}"));
            }
            _ => self.spinner.set_message(detail),
        }
    }
}

// ---------------------------------------------------------------------------
// Stored reports
// ---------------------------------------------------------------------------

async fn open_store(config: &AppConfig) -> Result<Storage> {
    let path = expand_home(&config.defaults.db_path)?;
    Ok(Storage::open(&path).await?)
}

async fn open_store_readonly(config: &AppConfig) -> Result<Storage> {
    let path = expand_home(&config.defaults.db_path)?;
    Ok(Storage::open_readonly(&path).await?)
}

fn parse_id(id: &str) -> Result<ReportId> {
    id.trim()
        .parse()
        .map_err(|e| eyre!("invalid report ID '{id}': {e}"))
}

async fn load_report(store: &Storage, id: &str) -> Result<Report> {
    let id = parse_id(id)?;
    store
        .get_report(&id)
        .await?
        .ok_or_else(|| eyre!("report {id} not found"))
}

async fn cmd_history_list(limit: usize) -> Result<()> {
    let config = load_config()?;
    let store = open_store_readonly(&config).await?;
    let reports = store.list_reports(limit).await?;

    if reports.is_empty() {
        println!("No reports yet. Run `compintel analyze <url>` to create one.");
        return Ok(());
    }

    for summary in reports {
        println!(
            "{}  {}  {:<24} {:>2} competitors{}  {}",
            summary.id,
            summary.created_at.format("%Y-%m-%d %H:%M"),
            summary.company_name,
            summary.competitor_count,
            if summary.report_sent { "  sent" } else { "" },
            summary.source_url,
        );
    }
    Ok(())
}

async fn cmd_history_show(id: &str) -> Result<()> {
    let config = load_config()?;
    let store = open_store_readonly(&config).await?;
    let report = load_report(&store, id).await?;
    println!("{}", render_markdown(&report));
    Ok(())
}

async fn cmd_history_clear(yes: bool) -> Result<()> {
    if !yes {
        return Err(eyre!("refusing to delete report history without --yes"));
    }
    let config = load_config()?;
    let store = open_store(&config).await?;
    let deleted = store.delete_all_reports().await?;
    println!("Deleted {deleted} reports.");
    Ok(())
}

async fn cmd_send(id: &str, email: &str) -> Result<()> {
    let config = load_config()?;
    let timeout = Duration::from_secs(config.defaults.call_timeout_secs);
    let notifier = ResendNotifier::from_config(&config.email, timeout)?;
    let store = open_store(&config).await?;
    let id = parse_id(id)?;

    let report = delivery::resend_stored(&store, &notifier, &id, email).await?;
    println!("Report for {} sent to {email}.", report.company_name);
    Ok(())
}

async fn cmd_export(id: &str, format: ExportFormat, out: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let store = open_store_readonly(&config).await?;
    let report = load_report(&store, id).await?;

    let content = render(&report, format)?;
    let path = out.unwrap_or_else(|| PathBuf::from(export_filename(&report, format)));
    write_export(&path, &content)?;
    println!("Exported to {}", path.display());
    Ok(())
}

async fn cmd_chat(id: &str, question: &str) -> Result<()> {
    let config = load_config()?;
    validate_api_key(&config)?;

    let timeout = Duration::from_secs(config.defaults.call_timeout_secs);
    let engine = OpenRouterClient::from_config(&config.openrouter, timeout)?;
    let store = open_store_readonly(&config).await?;
    let id = parse_id(id)?;

    info!(report_id = %id, model = engine.model(), "asking about report");
    let answer = chat::ask_about_stored(&store, &engine, &id, question).await?;
    println!("{}", answer.trim());
    Ok(())
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
