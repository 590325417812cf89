use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use otx_transfer::{spend_status, SpendStatus};

use super::{load_file, Context};

#[derive(Args, Debug)]
pub(crate) struct StatusArgs {
    /// Transfer file holding the token.
    pub file: PathBuf,
}

pub(crate) async fn run(args: StatusArgs, ctx: &Context) -> Result<()> {
    let file = load_file(&args.file)?;
    match spend_status(ctx.client.as_ref(), &file.token).await? {
        SpendStatus::Unspent => println!("unspent"),
        SpendStatus::Spent(proof) => match proof.transaction_hash {
            Some(hash) => println!("spent by transaction {hash}"),
            None => println!("spent"),
        },
    }
    Ok(())
}
