use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;

use otx_token::{PredicateKind, TokenCoinData, TokenFile, TokenId, TokenType};
use otx_transfer::{mint_token, MintParams};

use super::{
    parse_token_id, parse_token_type, save_file, Context, DataArgs, SecretArgs, DEFAULT_TOKEN_TYPE,
};

#[derive(Args, Debug)]
pub(crate) struct MintArgs {
    #[command(flatten)]
    pub secret: SecretArgs,

    /// Token id, as 32 hex bytes. Random when omitted.
    #[arg(long, value_parser = parse_token_id)]
    pub token_id: Option<TokenId>,

    /// Token type, as 32 hex bytes. Defaults to all zeros.
    #[arg(long, value_parser = parse_token_type)]
    pub token_type: Option<TokenType>,

    /// Immutable token metadata, as UTF-8 text.
    #[arg(long)]
    pub token_data: Option<String>,

    /// Fungible balance as COIN_ID=AMOUNT. Repeatable.
    #[arg(long = "coin", value_parser = parse_coin)]
    pub coins: Vec<(Vec<u8>, u128)>,

    #[command(flatten)]
    pub data: DataArgs,

    /// Lock the token with a one-time masked predicate.
    #[arg(long)]
    pub masked: bool,

    /// Mint justification, as UTF-8 text.
    #[arg(long)]
    pub reason: Option<String>,

    /// Where to write the transfer file.
    #[arg(long)]
    pub out: PathBuf,
}

fn parse_coin(s: &str) -> std::result::Result<(Vec<u8>, u128), String> {
    let (id, amount) = s
        .split_once('=')
        .ok_or_else(|| format!("expected COIN_ID=AMOUNT, got {s:?}"))?;
    let amount = amount
        .parse::<u128>()
        .map_err(|e| format!("invalid amount {amount:?}: {e}"))?;
    Ok((id.as_bytes().to_vec(), amount))
}

pub(crate) async fn run(args: MintArgs, ctx: &Context) -> Result<()> {
    let trust_base = ctx.trust_base()?;
    let coin_data = if args.coins.is_empty() {
        None
    } else {
        Some(TokenCoinData::new(args.coins).context("invalid coin balances")?)
    };
    let kind = if args.masked {
        PredicateKind::Masked
    } else {
        PredicateKind::Unmasked
    };
    let params = MintParams {
        token_id: args.token_id,
        token_data: args.token_data.map(String::into_bytes).unwrap_or_default(),
        coin_data,
        data: args.data.bytes()?,
        reason: args.reason.map(String::into_bytes),
        ..MintParams::new(args.token_type.unwrap_or(DEFAULT_TOKEN_TYPE), kind)
    };

    let token = mint_token(
        ctx.client.as_ref(),
        &args.secret.secret(),
        params,
        &ctx.policy,
        trust_base,
    )
    .await?;
    save_file(&TokenFile::new(token.clone()), &args.out)?;
    println!("minted {} -> {}", token.id(), args.out.display());
    Ok(())
}
