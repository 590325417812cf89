//! otx: command line client for offchain token transfers.
//!
//! Exit codes: 0 success, 1 verification failure or rejected transfer,
//! 2 usage, I/O or network error.

mod commands;
mod config;
mod opt;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use otx_aggregator::JsonRpcAggregatorClient;
use otx_token::{TrustBase, VerificationError};
use otx_transfer::TransferError;

use crate::commands::Context;
use crate::config::CliConfig;
use crate::opt::Opt;

#[tokio::main]
async fn main() -> ExitCode {
    let opt = Opt::parse();

    let config = match CliConfig::load(opt.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::from(2);
        }
    };
    init_logging(&config);

    let ctx = match build_context(&opt, &config) {
        Ok(ctx) => ctx,
        Err(e) => return report(e),
    };
    match commands::handle_subcommand(opt.command, &ctx).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(e),
    }
}

fn report(err: anyhow::Error) -> ExitCode {
    eprintln!("error: {err:#}");
    ExitCode::from(exit_code(&err))
}

fn init_logging(config: &CliConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_context(opt: &Opt, config: &CliConfig) -> anyhow::Result<Context> {
    let url = opt
        .aggregator_url
        .clone()
        .unwrap_or_else(|| config.aggregator.url.clone());
    let client = JsonRpcAggregatorClient::with_options(
        url.clone(),
        config.aggregator.api_key.clone(),
        Duration::from_secs(config.aggregator.request_timeout_secs),
    )?;

    let trust_base = match opt.trust_base.clone().or_else(|| config.trust_base_path()) {
        Some(path) => Some(
            TrustBase::load(&path)
                .with_context(|| format!("failed to load trust base {}", path.display()))?,
        ),
        None => None,
    };
    debug!(aggregator = %url, trust_base = trust_base.is_some(), "context ready");

    Ok(Context {
        client: Box::new(client),
        trust_base,
        policy: config.polling.policy(),
    })
}

/// Map an error to the process exit code.
fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if cause.downcast_ref::<VerificationError>().is_some() {
            return 1;
        }
        if let Some(e) = cause.downcast_ref::<TransferError>() {
            return match e {
                TransferError::NetworkUnavailable(_)
                | TransferError::Aggregator(_)
                | TransferError::Token(_)
                | TransferError::NoPendingTransfer => 2,
                _ => 1,
            };
        }
    }
    2
}

#[cfg(test)]
mod tests {
    use super::*;
    use otx_aggregator::AggregatorError;
    use otx_crypto::{DataHash, HashAlgorithm};
    use otx_token::RequestId;

    #[test]
    fn test_exit_codes() {
        let hash = DataHash::compute(HashAlgorithm::Sha256, b"x");
        let tampered = anyhow::Error::from(VerificationError::StateDataTampered("x".into()));
        assert_eq!(exit_code(&tampered), 1);

        let conflict = anyhow::Error::from(TransferError::DoubleSpendOrConflict {
            request_id: RequestId::from_hash(hash),
            registered: hash,
            attempted: hash,
        })
        .context("send failed");
        assert_eq!(exit_code(&conflict), 1);

        let wrapped = anyhow::Error::from(TransferError::from(VerificationError::ChainBroken(
            "x".into(),
        )));
        assert_eq!(exit_code(&wrapped), 1);

        let offline = anyhow::Error::from(TransferError::from(AggregatorError::Timeout));
        assert_eq!(exit_code(&offline), 2);

        let io = anyhow::Error::from(std::io::Error::other("disk"));
        assert_eq!(exit_code(&io), 2);
    }
}
