//! Integration tests for the offchain token system.
//!
//! The tests under `tests/` run complete flows (mint, send, receive, verify)
//! across the workspace crates against an in-process aggregator. This
//! library holds the fixtures they share.
//!
//! ```sh
//! cargo test -p otx-integration-tests
//! ```

use std::time::Duration;

use otx_aggregator::{InMemoryAggregator, PollPolicy};
use otx_crypto::Secret;
use otx_token::{Address, Predicate, PredicateKind, Token, TokenType};
use otx_transfer::{mint_token, receive, send_immediate, MintParams, ReceiveParams, SendParams};

pub const TOKEN_TYPE: TokenType = TokenType([0x42; 32]);

/// Short schedule so failing polls end quickly.
pub fn fast_policy() -> PollPolicy {
    PollPolicy {
        max_attempts: 3,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(40),
        multiplier: 2.0,
        deadline: None,
    }
}

/// Reusable address of `name`'s secret.
pub fn address_of(name: &str) -> Address {
    Predicate::address_for(
        &Secret::from(name),
        PredicateKind::Unmasked,
        TOKEN_TYPE,
        &[0u8; 32],
    )
}

/// Mint a token to `owner` with optional state data.
pub async fn mint(aggregator: &InMemoryAggregator, owner: &str, data: Option<&[u8]>) -> Token {
    let params = MintParams {
        data: data.map(<[u8]>::to_vec),
        token_data: b"integration".to_vec(),
        ..MintParams::new(TOKEN_TYPE, PredicateKind::Unmasked)
    };
    mint_token(
        aggregator,
        &Secret::from(owner),
        params,
        &fast_policy(),
        &aggregator.trust_base(),
    )
    .await
    .expect("mint")
}

/// Immediate transfer from `from` to `to`, completed by `to`.
pub async fn transfer(
    aggregator: &InMemoryAggregator,
    token: &Token,
    from: &str,
    to: &str,
    data: Option<&[u8]>,
) -> Token {
    let params = SendParams {
        data: data.map(<[u8]>::to_vec),
        ..SendParams::new(address_of(to))
    };
    let file = send_immediate(
        aggregator,
        token,
        &Secret::from(from),
        params,
        &fast_policy(),
    )
    .await
    .expect("send");
    receive(
        Some(aggregator),
        &file,
        &Secret::from(to),
        ReceiveParams::unmasked(),
        &aggregator.trust_base(),
        &fast_policy(),
    )
    .await
    .expect("receive")
}
