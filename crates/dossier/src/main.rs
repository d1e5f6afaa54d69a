use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::Context;
use clap::{Parser, ValueEnum};

use dossier_bitrix::BitrixClient;
use dossier_core::{
    aggregator::{AggregatorConfig, DealAggregator},
    config::Config,
    domain::DealId,
    output::{write_reports, DirectorySink, ReportFormat},
    paginator::Paginator,
    report::Report,
};

/// Build JSON / Markdown reports for a Bitrix24 deal.
#[derive(Parser, Debug)]
#[command(name = "dossier", version)]
struct Cli {
    /// Bitrix24 deal id
    deal_id: u64,

    /// Path to the JSON config file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Directory for the generated reports
    #[arg(short, long, default_value = "reports")]
    output: PathBuf,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = FormatArg::All)]
    format: FormatArg,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Override the pagination page limit from the config
    #[arg(long)]
    max_pages: Option<usize>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    Json,
    Md,
    All,
}

impl From<FormatArg> for ReportFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Json => ReportFormat::Json,
            FormatArg::Md => ReportFormat::Markdown,
            FormatArg::All => ReportFormat::All,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let cfg = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            let _ = dossier_core::logging::init("info", None);
            tracing::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let level = if cli.verbose { "debug" } else { cfg.log_level.as_str() };
    if let Err(e) = dossier_core::logging::init(level, cfg.log_path.as_deref()) {
        eprintln!("{e}");
    }
    if !cfg.dotenv_keys.is_empty() {
        tracing::debug!(keys = ?cfg.dotenv_keys, "environment filled from .env");
    }

    match run(&cli, &cfg).await {
        Ok(()) => {
            tracing::info!("processing finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            if cli.verbose {
                tracing::error!("{e:?}");
            } else {
                tracing::error!("{e:#}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, cfg: &Config) -> anyhow::Result<()> {
    let deal_id = DealId(cli.deal_id);
    tracing::info!(deal_id = deal_id.0, "processing deal");

    let api = Arc::new(BitrixClient::new(
        &cfg.bitrix_url,
        &cfg.bitrix_token,
        cfg.request_timeout,
    )?);
    let paginator = Paginator::new(api.clone()).with_page_delay(cfg.page_delay);
    let aggregator = DealAggregator::new(
        api,
        paginator,
        AggregatorConfig {
            max_pages: cli.max_pages.unwrap_or(cfg.max_pages),
        },
    );

    tracing::debug!("requesting deal data from Bitrix24");
    let dossier = aggregator.get_deal_data(deal_id).await;
    if let Some(error) = dossier.error() {
        tracing::warn!(deal_id = deal_id.0, %error, "writing a partial report");
    }

    tracing::debug!("building timeline");
    let report = Report::from_dossier(deal_id, &dossier).context("timeline merge failed")?;

    tokio::fs::create_dir_all(&cli.output)
        .await
        .with_context(|| format!("cannot create output directory {}", cli.output.display()))?;
    let sink = DirectorySink::new(&cli.output);
    write_reports(&report, cli.format.into(), &sink).await?;

    Ok(())
}
