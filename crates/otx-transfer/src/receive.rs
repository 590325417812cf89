//! Completing a transfer on the recipient side.

use tracing::{debug, info, warn};

use otx_aggregator::{AggregatorClient, PollPolicy};
use otx_crypto::{compute_recipient_data_hash, Secret};
use otx_token::{
    verify, verify_transaction, Predicate, PredicateKind, Token, TokenFile, TokenState,
    TrustBase, VerificationError,
};

use crate::submit::{ensure_own_registration, submit_and_confirm};
use crate::{Result, TransferError};

/// How the recipient opens the state it receives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiveParams {
    pub kind: PredicateKind,
    /// Salt the recipient used to derive the masked address it handed out.
    pub mask_salt: Option<[u8; 32]>,
    /// State data, required when the sender did not include it.
    pub data: Option<Vec<u8>>,
}

impl ReceiveParams {
    pub fn unmasked() -> Self {
        Self {
            kind: PredicateKind::Unmasked,
            mask_salt: None,
            data: None,
        }
    }

    pub fn masked(mask_salt: [u8; 32]) -> Self {
        Self {
            kind: PredicateKind::Masked,
            mask_salt: Some(mask_salt),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = Some(data);
        self
    }
}

/// Apply the pending transfer in `file` and return the recipient's token.
///
/// The source token is verified first. If the sender bundled no proof the
/// commitment is registered here, which needs `client`. The resulting token
/// has passed full verification; its transfer file carries no
/// `offlineTransfer` section.
///
/// # Errors
///
/// - [`TransferError::NoPendingTransfer`] if `file` has no offline transfer
/// - [`TransferError::NotRecipient`] if `recipient` does not own the paid address
/// - [`TransferError::StateDataMismatch`] if the state data does not match its commitment
/// - [`TransferError::NetworkUnavailable`] if registration is needed and no client is available
/// - [`TransferError::Verification`] if the source token or the result fails verification
pub async fn receive(
    client: Option<&dyn AggregatorClient>,
    file: &TokenFile,
    recipient: &Secret,
    params: ReceiveParams,
    trust_base: &TrustBase,
    policy: &PollPolicy,
) -> Result<Token> {
    file.validate_structure()?;
    let transfer = file
        .offline_transfer
        .as_ref()
        .ok_or(TransferError::NoPendingTransfer)?;
    verify(&file.token, trust_base)?;
    file.validate_offline_transfer()?;

    let commitment = &transfer.commitment;
    let data = &commitment.transaction_data;
    let salt = match params.kind {
        PredicateKind::Unmasked => data.salt,
        PredicateKind::Masked => params.mask_salt.ok_or_else(|| {
            TransferError::NotRecipient("a masked address needs its mask salt".into())
        })?,
    };
    let predicate = Predicate::derive(recipient, params.kind, data.token_id, data.token_type, &salt);
    if !predicate.matches_address(&data.recipient) {
        return Err(TransferError::NotRecipient(format!(
            "{} is not derived from this secret",
            data.recipient
        )));
    }

    let supplied = params.data.or_else(|| transfer.recipient_data.clone());
    let state_data = match (&data.recipient_data_hash, supplied) {
        (Some(expected), supplied) => {
            if compute_recipient_data_hash(supplied.as_deref()).as_ref() != Some(expected) {
                return Err(TransferError::StateDataMismatch(match supplied {
                    Some(_) => format!("data does not hash to {expected}"),
                    None => format!("data committed to {expected} was not supplied"),
                }));
            }
            supplied
        }
        (None, Some(d)) if !d.is_empty() => {
            return Err(TransferError::StateDataMismatch(
                "transaction commits to no data".into(),
            ));
        }
        // Uncommitted states carry no data, not an empty payload.
        (None, _) => None,
    };

    let transaction_hash = commitment.transaction_hash()?;
    if !commitment.authenticator.verify(&transaction_hash)
        || commitment.authenticator.request_id() != commitment.request_id
    {
        return Err(VerificationError::SignatureInvalid(
            "offline commitment is not signed over its transaction".into(),
        )
        .into());
    }

    let proof = match &transfer.inclusion_proof {
        Some(proof) => {
            ensure_own_registration(&commitment.request_id, &transaction_hash, proof)?;
            debug!(request_id = %commitment.request_id, "using bundled inclusion proof");
            proof.clone()
        }
        None => {
            let client = client.ok_or_else(|| {
                warn!(request_id = %commitment.request_id, "pending transfer needs the aggregator");
                TransferError::NetworkUnavailable(
                    "pending transfer must be registered but no aggregator is available".into(),
                )
            })?;
            submit_and_confirm(client, commitment, policy).await?
        }
    };

    let new_state = TokenState::new(&predicate, state_data)?;
    let token = verify_transaction(&file.token, data.clone(), proof, new_state, trust_base)?;
    info!(
        token_id = %token.id(),
        request_id = %commitment.request_id,
        transfers = token.transactions.len(),
        "transfer received"
    );
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::send::{send_immediate, send_offline, SendParams};
    use crate::testing::{fast_policy, minted, TOKEN_TYPE};
    use otx_aggregator::InMemoryAggregator;
    use otx_token::{Address, VerificationStage};

    fn address(name: &str, kind: PredicateKind, salt: [u8; 32]) -> Address {
        Predicate::address_for(&Secret::from(name), kind, TOKEN_TYPE, &salt)
    }

    #[tokio::test]
    async fn test_receive_immediate_transfer_offline() {
        let aggregator = InMemoryAggregator::new();
        let alice = Secret::from("alice");
        let bob = Secret::from("bob");
        let token = minted(&aggregator, &alice, None).await;
        let params = SendParams {
            data: Some(b"for bob".to_vec()),
            ..SendParams::new(address("bob", PredicateKind::Unmasked, [0u8; 32]))
        };
        let file = send_immediate(&aggregator, &token, &alice, params, &fast_policy())
            .await
            .expect("send");

        let received = receive(
            None,
            &file,
            &bob,
            ReceiveParams::unmasked(),
            &aggregator.trust_base(),
            &fast_policy(),
        )
        .await
        .expect("receive without network");
        assert_eq!(received.transactions.len(), 1);
        assert_eq!(received.state.data.as_deref(), Some(&b"for bob"[..]));
        received
            .state
            .decode_predicate()
            .expect("predicate")
            .signing_key(&bob)
            .expect("bob owns it");
    }

    #[tokio::test]
    async fn test_receive_offline_registers() {
        let aggregator = InMemoryAggregator::new();
        let alice = Secret::from("alice");
        let token = minted(&aggregator, &alice, None).await;
        let mask = [4u8; 32];
        let file = send_offline(
            &token,
            &alice,
            SendParams::new(address("bob", PredicateKind::Masked, mask)),
        )
        .expect("send");

        let err = receive(
            None,
            &file,
            &Secret::from("bob"),
            ReceiveParams::masked(mask),
            &aggregator.trust_base(),
            &fast_policy(),
        )
        .await
        .expect_err("needs network");
        assert!(matches!(err, TransferError::NetworkUnavailable(_)));

        let received = receive(
            Some(&aggregator),
            &file,
            &Secret::from("bob"),
            ReceiveParams::masked(mask),
            &aggregator.trust_base(),
            &fast_policy(),
        )
        .await
        .expect("receive");
        assert_eq!(
            received.state.decode_predicate().expect("predicate").kind(),
            PredicateKind::Masked
        );
    }

    #[tokio::test]
    async fn test_masked_receive_needs_right_salt() {
        let aggregator = InMemoryAggregator::new();
        let alice = Secret::from("alice");
        let token = minted(&aggregator, &alice, None).await;
        let file = send_offline(
            &token,
            &alice,
            SendParams::new(address("bob", PredicateKind::Masked, [4u8; 32])),
        )
        .expect("send");
        let err = receive(
            Some(&aggregator),
            &file,
            &Secret::from("bob"),
            ReceiveParams::masked([5u8; 32]),
            &aggregator.trust_base(),
            &fast_policy(),
        )
        .await
        .expect_err("wrong salt");
        assert!(matches!(err, TransferError::NotRecipient(_)));
    }

    #[tokio::test]
    async fn test_wrong_recipient() {
        let aggregator = InMemoryAggregator::new();
        let alice = Secret::from("alice");
        let token = minted(&aggregator, &alice, None).await;
        let file = send_offline(
            &token,
            &alice,
            SendParams::new(address("bob", PredicateKind::Unmasked, [0u8; 32])),
        )
        .expect("send");
        let err = receive(
            Some(&aggregator),
            &file,
            &Secret::from("carol"),
            ReceiveParams::unmasked(),
            &aggregator.trust_base(),
            &fast_policy(),
        )
        .await
        .expect_err("carol is not the recipient");
        assert!(matches!(err, TransferError::NotRecipient(_)));
    }

    #[tokio::test]
    async fn test_withheld_data_must_match() {
        let aggregator = InMemoryAggregator::new();
        let alice = Secret::from("alice");
        let token = minted(&aggregator, &alice, None).await;
        let params = SendParams {
            data: Some(b"secret terms".to_vec()),
            include_data: false,
            ..SendParams::new(address("bob", PredicateKind::Unmasked, [0u8; 32]))
        };
        let file = send_offline(&token, &alice, params).expect("send");
        let bob = Secret::from("bob");
        let trust_base = aggregator.trust_base();

        for params in [
            ReceiveParams::unmasked(),
            ReceiveParams::unmasked().with_data(b"other terms".to_vec()),
        ] {
            let err = receive(Some(&aggregator), &file, &bob, params, &trust_base, &fast_policy())
                .await
                .expect_err("mismatch");
            assert!(matches!(err, TransferError::StateDataMismatch(_)), "{err:?}");
        }
        assert_eq!(aggregator.len().await, 1, "nothing registered on mismatch");

        let received = receive(
            Some(&aggregator),
            &file,
            &bob,
            ReceiveParams::unmasked().with_data(b"secret terms".to_vec()),
            &trust_base,
            &fast_policy(),
        )
        .await
        .expect("receive");
        assert_eq!(received.state.data.as_deref(), Some(&b"secret terms"[..]));
    }

    #[tokio::test]
    async fn test_empty_uncommitted_data_is_dropped() {
        let aggregator = InMemoryAggregator::new();
        let alice = Secret::from("alice");
        let token = minted(&aggregator, &alice, None).await;
        let file = send_offline(
            &token,
            &alice,
            SendParams::new(address("bob", PredicateKind::Unmasked, [0u8; 32])),
        )
        .expect("send");
        let received = receive(
            Some(&aggregator),
            &file,
            &Secret::from("bob"),
            ReceiveParams::unmasked().with_data(Vec::new()),
            &aggregator.trust_base(),
            &fast_policy(),
        )
        .await
        .expect("receive");
        assert_eq!(received.state.data, None);
        otx_token::verify(&received, &aggregator.trust_base()).expect("valid");
    }

    #[tokio::test]
    async fn test_relabelled_empty_state_cannot_be_spent_twice() {
        let aggregator = InMemoryAggregator::new();
        let alice = Secret::from("alice");
        let token = minted(&aggregator, &alice, None).await;
        let mut relabelled = token.clone();
        relabelled.state.data = Some(Vec::new());
        assert!(otx_token::verify(&relabelled, &aggregator.trust_base()).is_err());

        let to_bob = send_immediate(
            &aggregator,
            &token,
            &alice,
            SendParams::new(address("bob", PredicateKind::Unmasked, [0u8; 32])),
            &fast_policy(),
        )
        .await
        .expect("send to bob");
        // The relabelled state hashes differently, so its spend registers too,
        // but the carol package never verifies.
        let to_carol = send_immediate(
            &aggregator,
            &relabelled,
            &alice,
            SendParams::new(address("carol", PredicateKind::Unmasked, [0u8; 32])),
            &fast_policy(),
        )
        .await
        .expect("registry accepts any signed request id");

        receive(
            None,
            &to_bob,
            &Secret::from("bob"),
            ReceiveParams::unmasked(),
            &aggregator.trust_base(),
            &fast_policy(),
        )
        .await
        .expect("bob holds the token");
        let err = receive(
            None,
            &to_carol,
            &Secret::from("carol"),
            ReceiveParams::unmasked(),
            &aggregator.trust_base(),
            &fast_policy(),
        )
        .await
        .expect_err("carol's source state is not canonical");
        match err {
            TransferError::Verification(e) => {
                assert_eq!(e.kind(), VerificationStage::StateDataTampered)
            }
            other => unreachable!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_tampered_source_is_rejected() {
        let aggregator = InMemoryAggregator::new();
        let alice = Secret::from("alice");
        let token = minted(&aggregator, &alice, Some(br#"{"name":"X"}"#.to_vec())).await;
        let mut file = send_offline(
            &token,
            &alice,
            SendParams::new(address("bob", PredicateKind::Unmasked, [0u8; 32])),
        )
        .expect("send");
        if let Some(data) = file.token.state.data.as_mut() {
            data[2] ^= 0x01;
        }
        let err = receive(
            Some(&aggregator),
            &file,
            &Secret::from("bob"),
            ReceiveParams::unmasked(),
            &aggregator.trust_base(),
            &fast_policy(),
        )
        .await
        .expect_err("tampered");
        match err {
            TransferError::Verification(e) => {
                assert_eq!(e.kind(), VerificationStage::StateDataTampered)
            }
            other => unreachable!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_file_without_transfer() {
        let aggregator = InMemoryAggregator::new();
        let token = minted(&aggregator, &Secret::from("alice"), None).await;
        let err = receive(
            Some(&aggregator),
            &TokenFile::new(token),
            &Secret::from("alice"),
            ReceiveParams::unmasked(),
            &aggregator.trust_base(),
            &fast_policy(),
        )
        .await
        .expect_err("nothing to receive");
        assert!(matches!(err, TransferError::NoPendingTransfer));
    }
}
