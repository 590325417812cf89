use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::warn;

use otx_token::verify;
use otx_transfer::{spend_status, SpendStatus, TransferError};

use super::{load_file, Context};

#[derive(Args, Debug)]
pub(crate) struct VerifyArgs {
    /// Transfer file to verify.
    pub file: PathBuf,

    /// Also ask the aggregator whether the current state is spent.
    #[arg(long)]
    pub check_spent: bool,
}

pub(crate) async fn run(args: VerifyArgs, ctx: &Context) -> Result<()> {
    let file = load_file(&args.file)?;
    if let Err(e) = verify(&file.token, ctx.trust_base()?) {
        println!("{e}");
        return Err(e.into());
    }
    file.validate_offline_transfer()?;
    println!("valid");

    if let Some(transfer) = &file.offline_transfer {
        println!(
            "pending transfer to {} ({:?})",
            transfer.recipient_address, transfer.status
        );
    }
    if args.check_spent {
        match spend_status(ctx.client.as_ref(), &file.token).await {
            Ok(SpendStatus::Unspent) => println!("unspent"),
            Ok(SpendStatus::Spent(_)) => println!("spent"),
            Err(TransferError::NetworkUnavailable(reason)) => {
                warn!(%reason, "spend check skipped");
                println!("network unavailable, local validation only");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
