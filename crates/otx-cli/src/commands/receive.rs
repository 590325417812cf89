use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use otx_token::TokenFile;
use otx_transfer::{receive, ReceiveParams};

use super::{load_file, parse_hex32, save_file, Context, DataArgs, SecretArgs};

#[derive(Args, Debug)]
pub(crate) struct ReceiveArgs {
    /// Transfer file from the sender.
    pub file: PathBuf,

    #[command(flatten)]
    pub secret: SecretArgs,

    /// Mask salt of the masked address the token was sent to.
    #[arg(long, value_parser = parse_hex32)]
    pub mask_salt: Option<[u8; 32]>,

    /// State data the sender committed to but did not include.
    #[command(flatten)]
    pub data: DataArgs,

    /// Never contact the aggregator; fails if the transfer is not yet registered.
    #[arg(long)]
    pub offline: bool,

    /// Where to write the received token.
    #[arg(long)]
    pub out: PathBuf,
}

pub(crate) async fn run(args: ReceiveArgs, ctx: &Context) -> Result<()> {
    let file = load_file(&args.file)?;
    let mut params = match args.mask_salt {
        Some(salt) => ReceiveParams::masked(salt),
        None => ReceiveParams::unmasked(),
    };
    params.data = args.data.bytes()?;
    let client = (!args.offline).then(|| ctx.client.as_ref());

    let token = receive(
        client,
        &file,
        &args.secret.secret(),
        params,
        ctx.trust_base()?,
        &ctx.policy,
    )
    .await?;
    save_file(&TokenFile::new(token.clone()), &args.out)?;
    println!(
        "received {} ({} transfers) -> {}",
        token.id(),
        token.transactions.len(),
        args.out.display()
    );
    Ok(())
}
