//! `pact-verify`: replay a consumer contract against a running provider.

use anyhow::{Context, Result};
use contract_common::init_tracing;
use contract_pact::{AncestorSearch, ContractLocator, FixedPath, locate_contract};
use contract_verifier::{
    BrokerConfig, ContractSource, Verifier, VerifierConfig, publish_best_effort,
    tracing_config_from_lookup,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};

fn contract_path(config: &VerifierConfig) -> Result<PathBuf> {
    let file_name = config.contract_file_name();
    let cwd = std::env::current_dir().context("reading current directory")?;
    let search = AncestorSearch::new(cwd, "pacts");

    let fallback = config
        .pact_file
        .clone()
        .unwrap_or_else(|| Path::new("pacts").join(&file_name));
    let fixed = config.pact_file.clone().map(FixedPath);

    let mut locators: Vec<&dyn ContractLocator> = vec![&search];
    if let Some(fixed) = fixed.as_ref() {
        locators.push(fixed);
    }
    Ok(locate_contract(&locators, &file_name, &fallback))
}

async fn run() -> Result<bool> {
    dotenvy::dotenv().ok();
    let tracing_config = tracing_config_from_lookup(|name| std::env::var(name).ok(), "pact-verify")?;
    init_tracing(&tracing_config);

    let config = VerifierConfig::from_env().context("loading verifier configuration")?;

    let path = contract_path(&config)?;
    info!(path = %path.display(), "Using contract file");

    let publish = config.publish_results;
    let branch = config.branch.clone();
    let verifier = Verifier::new(config)?;
    let run = verifier.verify(&ContractSource::File(path)).await?;

    if publish {
        match BrokerConfig::from_env() {
            Ok(broker_config) => {
                let report = publish_best_effort(broker_config, &run, &branch).await;
                if !report.all_succeeded() {
                    info!(?report, "Publishing to broker was incomplete");
                }
            }
            Err(e) => warn!(error = %e, "Invalid broker configuration, results not published"),
        }
    }

    println!("{run}");
    Ok(run.overall_success)
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %e, "Verification aborted");
            eprintln!("pact-verify: {e:#}");
            ExitCode::from(2)
        }
    }
}
