use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;

use otx_token::{verify, Address};
use otx_transfer::{send_immediate, send_offline, SendParams};

use super::{load_file, parse_address, save_file, Context, DataArgs, SecretArgs};

#[derive(Args, Debug)]
pub(crate) struct SendArgs {
    /// Transfer file holding the token.
    pub file: PathBuf,

    #[command(flatten)]
    pub secret: SecretArgs,

    /// Recipient address.
    #[arg(long, value_parser = parse_address)]
    pub to: Address,

    /// Where to write the transfer file for the recipient.
    #[arg(long)]
    pub out: PathBuf,

    /// Only sign; the recipient registers the transfer.
    #[arg(long)]
    pub offline: bool,

    #[command(flatten)]
    pub data: DataArgs,

    /// Commit to the data without putting it in the file.
    #[arg(long)]
    pub withhold_data: bool,

    /// Committed message, as UTF-8 text.
    #[arg(long)]
    pub message: Option<String>,

    /// Plaintext note for the recipient.
    #[arg(long)]
    pub note: Option<String>,
}

pub(crate) async fn run(args: SendArgs, ctx: &Context) -> Result<()> {
    let file = load_file(&args.file)?;
    if file.offline_transfer.is_some() {
        bail!(
            "{} already holds a pending transfer; receive it first",
            args.file.display()
        );
    }
    verify(&file.token, ctx.trust_base()?)?;

    let data = args.data.bytes()?;
    if args.withhold_data && data.is_none() {
        bail!("--withhold-data needs --data or --data-hex");
    }
    let owner = args.secret.secret();
    let params = SendParams {
        data,
        include_data: !args.withhold_data,
        message: args.message.map(String::into_bytes),
        note: args.note,
        ..SendParams::new(args.to)
    };
    let out = if args.offline {
        send_offline(&file.token, &owner, params)?
    } else {
        send_immediate(ctx.client.as_ref(), &file.token, &owner, params, &ctx.policy).await?
    };
    save_file(&out, &args.out)?;

    if let Some(transfer) = &out.offline_transfer {
        println!(
            "{:?} transfer {} -> {}",
            transfer.status,
            transfer.commitment.request_id,
            args.out.display()
        );
    }
    Ok(())
}
