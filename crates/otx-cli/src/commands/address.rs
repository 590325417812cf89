use anyhow::Result;
use clap::Args;

use otx_token::{random_salt, Predicate, PredicateKind, TokenType};

use super::{parse_hex32, parse_token_type, SecretArgs, DEFAULT_TOKEN_TYPE};

#[derive(Args, Debug)]
pub(crate) struct AddressArgs {
    #[command(flatten)]
    pub secret: SecretArgs,

    /// Token type the address receives, as 32 hex bytes. Defaults to all zeros.
    #[arg(long, value_parser = parse_token_type)]
    pub token_type: Option<TokenType>,

    /// Hand out a one-time masked address instead of the reusable one.
    #[arg(long)]
    pub masked: bool,

    /// Mask salt, as 32 hex bytes. Random when omitted; keep it for `receive`.
    #[arg(long, value_parser = parse_hex32, requires = "masked")]
    pub mask_salt: Option<[u8; 32]>,
}

pub(crate) fn run(args: AddressArgs) -> Result<()> {
    let secret = args.secret.secret();
    let token_type = args.token_type.unwrap_or(DEFAULT_TOKEN_TYPE);
    if args.masked {
        let salt = args.mask_salt.unwrap_or_else(random_salt);
        let address = Predicate::address_for(&secret, PredicateKind::Masked, token_type, &salt);
        println!("{address}");
        println!("mask salt: {}", hex::encode(salt));
    } else {
        let address =
            Predicate::address_for(&secret, PredicateKind::Unmasked, token_type, &[0u8; 32]);
        println!("{address}");
    }
    Ok(())
}
