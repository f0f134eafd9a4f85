//! equity-desk: command-line front end for the equity research desk
//!
//! ```bash
//! export DEEPSEEK_API_KEY=sk-...
//! export TUSHARE_TOKEN=...
//!
//! equity-desk analyze 600519
//! equity-desk --concurrency 2 batch 600519.SH 000858.SZ
//! equity-desk watchlist
//! equity-desk quick 000001
//! equity-desk schedule
//! ```

mod output;

use agent_equity::data::normalize_symbol;
use agent_equity::{
    AnalysisMode, BatchReport, BatchRunner, EmailNotifier, EquityConfig, MarkdownReportWriter,
    MarketDataSource, PipelineOrchestrator, TushareClient,
};
use agent_llm::providers::{OpenAIConfig, OpenAIProvider};
use agent_runtime::AgentExecutor;
use agent_utils::{LogFormat, init_tracing, init_tracing_with};
use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "equity-desk", version)]
#[command(about = "Multi-agent A-share research desk", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Securities analysed at once during batch runs
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Bull/bear debate rounds
    #[arg(long, global = true)]
    rounds: Option<usize>,

    /// Session label for single and batch runs (standard, pre_market, post_market)
    #[arg(long, global = true)]
    mode: Option<AnalysisMode>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyse one security
    Analyze { code: String },
    /// Analyse several securities
    Batch {
        #[arg(required = true)]
        codes: Vec<String>,
    },
    /// Analyse the configured watchlist and email the summary when enabled
    Watchlist,
    /// Collect market data only and print the latest quote
    Quick { code: String },
    /// Run the watchlist on the configured cron schedule until Ctrl-C
    Schedule,
}

/// Command-line flags take precedence over the environment
fn load_config(cli: &Cli) -> anyhow::Result<EquityConfig> {
    let mut builder = EquityConfig::builder();
    if let Some(concurrency) = cli.concurrency {
        builder = builder.batch_concurrency(concurrency);
    }
    if let Some(rounds) = cli.rounds {
        builder = builder.max_debate_rounds(rounds);
    }
    if let Some(mode) = cli.mode {
        builder = builder.mode(mode);
    }
    Ok(builder.with_env()?.build()?)
}

fn build_pipeline(config: Arc<EquityConfig>) -> anyhow::Result<PipelineOrchestrator> {
    config.validate_credentials()?;
    let api_key = config.api_key.clone().unwrap_or_default();

    let provider = OpenAIProvider::with_config(
        OpenAIConfig::deepseek(api_key)
            .with_api_base(config.api_base.clone())
            .with_timeout(config.call_timeout.as_secs()),
    )?;
    let executor = AgentExecutor::builder()
        .provider(Arc::new(provider))
        .model(config.model.clone())
        .call_timeout(config.call_timeout)
        .build()?;

    let pipeline = PipelineOrchestrator::builder()
        .config(Arc::clone(&config))
        .executor(executor)
        .source(Arc::new(TushareClient::from_config(&config)?))
        .renderer(Arc::new(MarkdownReportWriter::from_config(&config)))
        .build()?;
    Ok(pipeline)
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, cancelling in-flight work");
            token.cancel();
        }
    });
    cancel
}

async fn quick(config: &EquityConfig, code: &str, cancel: &CancellationToken) -> anyhow::Result<()> {
    let symbol = normalize_symbol(code)?;
    let source = TushareClient::from_config(config)?;
    let ctx = tokio::select! {
        () = cancel.cancelled() => bail!("cancelled"),
        ctx = source.fetch(&symbol) => ctx?,
    };
    println!("{}", output::quote_table(&ctx));
    Ok(())
}

/// Delivery failures are logged; the batch itself already succeeded
async fn deliver(notifier: Option<&EmailNotifier>, report: &BatchReport) {
    let Some(notifier) = notifier else {
        return;
    };
    if report.summary.is_none() {
        warn!("No summary to email");
        return;
    }
    if let Err(e) = notifier.send(report).await {
        warn!(error = %e, "Failed to email batch summary");
    }
}

async fn batch(
    pipeline: PipelineOrchestrator,
    codes: &[String],
    notifier: Option<&EmailNotifier>,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let report = BatchRunner::new(pipeline).run(codes, cancel).await;
    println!("{}", output::batch_table(&report));
    if let Some(path) = &report.summary_path {
        println!("汇总报告: {}", path.display());
    }
    deliver(notifier, &report).await;
    if report.succeeded() == 0 && !report.failures.is_empty() {
        bail!("all {} securities failed", report.failures.len());
    }
    Ok(())
}

async fn schedule(pipeline: PipelineOrchestrator, cancel: CancellationToken) -> anyhow::Result<()> {
    let config = pipeline.config().clone();
    if config.schedule.is_empty() {
        bail!("no scheduled runs configured");
    }

    let mut scheduler = JobScheduler::new().await?;
    let watchlist = Arc::new(config.watchlist.clone());
    let notifier = Arc::new(EmailNotifier::from_config(&config.email)?);

    for entry in &config.schedule {
        let mode = entry.mode;
        let runner = BatchRunner::new(pipeline.clone().with_mode(mode));
        let watchlist = Arc::clone(&watchlist);
        let notifier = Arc::clone(&notifier);
        let job_cancel = cancel.clone();

        let job = Job::new_async(entry.cron.as_str(), move |_uuid, _lock| {
            let runner = runner.clone();
            let watchlist = Arc::clone(&watchlist);
            let notifier = Arc::clone(&notifier);
            let cancel = job_cancel.clone();

            Box::pin(async move {
                info!(%mode, securities = watchlist.len(), "Scheduled watchlist run starting");
                let report = runner.run(&watchlist, &cancel).await;
                info!(
                    %mode,
                    succeeded = report.succeeded(),
                    failed = report.failures.len(),
                    "Scheduled watchlist run finished"
                );
                deliver((*notifier).as_ref(), &report).await;
            })
        })
        .with_context(|| format!("invalid cron expression: {}", entry.cron))?;

        scheduler.add(job).await?;
        info!(cron = %entry.cron, %mode, "Registered scheduled run");
    }

    scheduler.start().await?;
    info!("Scheduler running, press Ctrl-C to stop");

    cancel.cancelled().await;
    scheduler.shutdown().await?;
    info!("Scheduler stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if cli.json_logs {
        init_tracing_with(LogFormat::Json);
    } else {
        init_tracing();
    }

    let config = Arc::new(load_config(&cli)?);
    let cancel = cancel_on_ctrl_c();

    info!(model = %config.model, rounds = config.max_debate_rounds, mode = %config.mode, "Starting equity-desk");

    match cli.command {
        Command::Analyze { code } => {
            let result = build_pipeline(config)?.analyze(&code, &cancel).await?;
            println!("{}", output::results_table(std::slice::from_ref(&result)));
            if let Some(summary) = &result.decision.summary {
                println!("{summary}");
            }
        }
        Command::Batch { codes } => batch(build_pipeline(config)?, &codes, None, &cancel).await?,
        Command::Watchlist => {
            let watchlist = config.watchlist.clone();
            let notifier = EmailNotifier::from_config(&config.email)?;
            batch(build_pipeline(config)?, &watchlist, notifier.as_ref(), &cancel).await?;
        }
        Command::Quick { code } => quick(&config, &code, &cancel).await?,
        Command::Schedule => schedule(build_pipeline(config)?, cancel).await?,
    }

    Ok(())
}
