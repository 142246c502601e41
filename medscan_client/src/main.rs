use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use backoff::ExponentialBackoff;
use clap::Parser;
use dotenv::dotenv;

use medscan_client::config::ClientConfig;
use medscan_client::interpret::ConfidenceThreshold;
use medscan_client::render::{render_session, render_validation_error};
use medscan_client::report::{save_report, AnalysisReport};
use medscan_client::session::{AnalysisOutcome, AnalysisSession};
use medscan_client::settings::SettingsStore;
use medscan_client::transport::HttpTransport;
use medscan_client::validator::CandidateFile;
use medscan_client::Modality;

#[derive(Parser, Debug)]
#[command(author, version, about = "Submit a chest X-ray or brain scan for analysis", long_about = None)]
struct Args {
    /// Images to submit, in order. The last accepted one is authoritative.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Scan type
    #[arg(short, long, value_enum, default_value_t = Modality::Pneumonia)]
    modality: Modality,

    /// Analysis service base URL
    #[arg(short, long)]
    endpoint: Option<String>,

    /// TOML config file
    #[arg(short, long, env = "MEDSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Confidence threshold in percent (50-100)
    #[arg(short, long)]
    threshold: Option<i64>,

    /// Request timeout in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_secs: Option<u64>,

    /// Resubmit after a transient failure up to this many times
    #[arg(short, long, default_value_t = 0)]
    retries: u32,

    /// Write a JSON report here when result saving is enabled
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Stage files instead of submitting them on drop
    #[arg(long)]
    no_auto_analysis: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("medscan_client=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = ClientConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(endpoint) = args.endpoint {
        config.endpoint = endpoint;
    }
    if let Some(percent) = args.threshold {
        config.settings.confidence_threshold = ConfidenceThreshold::new(percent)?;
    }
    if let Some(secs) = args.timeout_secs {
        config.timeout = Some(Duration::from_secs(secs));
    }
    if args.no_auto_analysis {
        config.settings.auto_analysis = false;
    }

    let transport = HttpTransport::new(&config.endpoint, config.timeout)?;
    let settings = Arc::new(config.settings);
    let mut session = AnalysisSession::new(
        args.modality,
        config.upload.clone(),
        Arc::new(transport),
        settings.clone(),
    );

    let mut last_accepted = None;
    for path in &args.files {
        let candidate = CandidateFile::from_path(path, session.policy().max_bytes())
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        match session.on_drop(candidate.clone()) {
            Ok(_) => last_accepted = Some(candidate),
            Err(err) => println!("{}", render_validation_error(&err)),
        }
    }

    let Some(candidate) = last_accepted else {
        eprintln!("No acceptable image was provided.");
        return Ok(ExitCode::from(2));
    };

    if session.staged().is_some() {
        println!("Auto analysis is disabled; submitting {} on request.", candidate.file_name);
        session.analyze()?;
    }

    let mut backoff = ExponentialBackoff {
        max_elapsed_time: None,
        ..ExponentialBackoff::default()
    };
    session
        .settle_with_retry(&candidate, args.retries, &mut backoff)
        .await?;

    let threshold = settings.confidence_threshold();
    println!("{}", render_session(&session, threshold));

    match session.outcome() {
        Some(AnalysisOutcome::Success(_)) => {
            if let (Some(path), Some(display)) = (&args.output, session.display(threshold)) {
                let report = AnalysisReport {
                    modality: session.modality(),
                    file_name: &candidate.file_name,
                    analyzed_at: chrono::Utc::now(),
                    confidence_threshold: threshold.percent(),
                    result: &display,
                };
                if save_report(settings.as_ref(), &report, path)? {
                    println!("Saved report to {}", path.display());
                } else {
                    println!("Result saving is disabled; no report written.");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        _ => Ok(ExitCode::FAILURE),
    }
}
