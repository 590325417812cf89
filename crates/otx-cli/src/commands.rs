mod address;
mod mint;
mod receive;
mod send;
mod status;
mod verify;

use std::path::Path;

use anyhow::{anyhow, Context as _, Result};
use clap::{Args, Subcommand};

use otx_aggregator::{AggregatorClient, PollPolicy};
use otx_crypto::Secret;
use otx_token::{Address, TokenFile, TokenId, TokenType, TrustBase};

pub(crate) use address::AddressArgs;
pub(crate) use mint::MintArgs;
pub(crate) use receive::ReceiveArgs;
pub(crate) use send::SendArgs;
pub(crate) use status::StatusArgs;
pub(crate) use verify::VerifyArgs;

#[derive(Subcommand, Debug)]
pub(crate) enum SubCmd {
    /// Print the address to hand out for receiving tokens.
    Address(AddressArgs),

    /// Mint a new token and write its transfer file.
    Mint(MintArgs),

    /// Transfer a token to an address.
    Send(SendArgs),

    /// Complete a transfer addressed to you.
    Receive(ReceiveArgs),

    /// Verify a token's full history.
    Verify(VerifyArgs),

    /// Ask the aggregator whether a token's current state is spent.
    Status(StatusArgs),
}

/// What commands run against.
pub(crate) struct Context {
    pub client: Box<dyn AggregatorClient>,
    pub trust_base: Option<TrustBase>,
    pub policy: PollPolicy,
}

impl Context {
    pub fn trust_base(&self) -> Result<&TrustBase> {
        self.trust_base.as_ref().ok_or_else(|| {
            anyhow!("no trust base configured: set [trust] trust_base_path or pass --trust-base")
        })
    }
}

#[derive(Args, Debug)]
pub(crate) struct SecretArgs {
    /// Owner secret. Prefer setting OTX_SECRET.
    #[arg(long, env = "OTX_SECRET", hide_env_values = true)]
    pub secret: String,
}

impl SecretArgs {
    pub fn secret(&self) -> Secret {
        Secret::from(self.secret.as_str())
    }
}

#[derive(Args, Debug, Default)]
pub(crate) struct DataArgs {
    /// State data as UTF-8 text.
    #[arg(long, conflicts_with = "data_hex")]
    pub data: Option<String>,

    /// State data as hex.
    #[arg(long)]
    pub data_hex: Option<String>,
}

impl DataArgs {
    pub fn bytes(&self) -> Result<Option<Vec<u8>>> {
        match (&self.data, &self.data_hex) {
            (Some(text), _) => Ok(Some(text.as_bytes().to_vec())),
            (None, Some(h)) => Ok(Some(hex::decode(h).context("--data-hex is not valid hex")?)),
            (None, None) => Ok(None),
        }
    }
}

pub(crate) fn parse_hex32(s: &str) -> std::result::Result<[u8; 32], String> {
    let bytes = hex::decode(s).map_err(|e| format!("invalid hex: {e}"))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| format!("expected 32 bytes, got {}", b.len()))
}

pub(crate) fn parse_token_id(s: &str) -> std::result::Result<TokenId, String> {
    parse_hex32(s).map(TokenId)
}

pub(crate) fn parse_token_type(s: &str) -> std::result::Result<TokenType, String> {
    parse_hex32(s).map(TokenType)
}

pub(crate) fn parse_address(s: &str) -> std::result::Result<Address, String> {
    s.parse::<Address>().map_err(|e| e.to_string())
}

/// Token type used when none is given.
pub(crate) const DEFAULT_TOKEN_TYPE: TokenType = TokenType([0u8; 32]);

pub(crate) fn load_file(path: &Path) -> Result<TokenFile> {
    TokenFile::load(path).with_context(|| format!("failed to load {}", path.display()))
}

pub(crate) fn save_file(file: &TokenFile, path: &Path) -> Result<()> {
    file.save(path)
        .with_context(|| format!("failed to write {}", path.display()))
}

pub(crate) async fn handle_subcommand(cmd: SubCmd, ctx: &Context) -> Result<()> {
    match cmd {
        SubCmd::Address(args) => address::run(args),
        SubCmd::Mint(args) => mint::run(args, ctx).await,
        SubCmd::Send(args) => send::run(args, ctx).await,
        SubCmd::Receive(args) => receive::run(args, ctx).await,
        SubCmd::Verify(args) => verify::run(args, ctx).await,
        SubCmd::Status(args) => status::run(args, ctx).await,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use otx_aggregator::{InMemoryAggregator, PollPolicy};
    use std::time::Duration;

    use super::Context;

    pub fn context(aggregator: InMemoryAggregator) -> Context {
        Context {
            trust_base: Some(aggregator.trust_base()),
            client: Box::new(aggregator),
            policy: PollPolicy {
                max_attempts: 3,
                initial_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(20),
                multiplier: 2.0,
                deadline: None,
            },
        }
    }
}
