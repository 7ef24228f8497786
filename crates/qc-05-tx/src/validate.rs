//! Basic (stateless) and state-dependent transaction validation.

use qc_01_crypto::verify;
use qc_04_state::StateTxn;
use shared_types::{AccessType, Address, CoreError, TokenMeta};

use crate::config::TxConfig;
use crate::entities::{Transaction, TxPayload};
use crate::multisig::{MultiSigAccount, MultiSigRegistry, PendingSpend};

/// Chain context a transaction is validated against: the height of the
/// block it is being applied within (needed for multi-sig spend expiry).
#[derive(Debug, Clone, Copy)]
pub struct TxContext {
    pub block_height: u64,
}

/// Field-level checks that need no state and no network: sizes, counts,
/// structural well-formedness. Run before `state_validate_and_apply` so
/// malformed transactions never touch state.
pub fn basic_validate(tx: &Transaction, cfg: &TxConfig) -> Result<(), CoreError> {
    match &tx.payload {
        TxPayload::Transfer { outputs, message } => {
            check_outputs(outputs, cfg)?;
            if let Some(bytes) = message {
                check_message_len(bytes, cfg)?;
            }
        }
        TxPayload::Coinbase { .. } => {
            // Coinbase never arrives through mempool admission; basic_validate
            // exists only so the block builder can reuse the same dispatch.
        }
        TxPayload::Message { payload, .. } => check_message_len(payload, cfg)?,
        TxPayload::TokenCreate {
            symbol,
            name,
            initial_balances,
            ..
        } => {
            if symbol.is_empty() || symbol.len() > 16 {
                return Err(CoreError::Malformed("token symbol length out of range".to_string()));
            }
            if name.is_empty() || name.len() > 64 {
                return Err(CoreError::Malformed("token name length out of range".to_string()));
            }
            check_outputs(initial_balances, cfg)?;
        }
        TxPayload::TokenTransfer { outputs, .. } => check_outputs(outputs, cfg)?,
        TxPayload::Slave { delegated } => {
            if delegated.is_empty() || delegated.len() > cfg.max_delegated_keys_per_tx {
                return Err(CoreError::Malformed("delegated key count out of range".to_string()));
            }
        }
        TxPayload::MultiSigCreate {
            signatories,
            weights,
            threshold,
        } => {
            if signatories.is_empty() || signatories.len() > cfg.max_signatories {
                return Err(CoreError::Malformed("signatory count out of range".to_string()));
            }
            if signatories.len() != weights.len() {
                return Err(CoreError::Malformed(
                    "signatory and weight counts differ".to_string(),
                ));
            }
            if *threshold == 0 {
                return Err(CoreError::Malformed("multi-sig threshold must be positive".to_string()));
            }
        }
        TxPayload::MultiSigSpend { outputs, .. } => check_outputs(outputs, cfg)?,
        TxPayload::MultiSigVote { .. } => {}
    }
    Ok(())
}

fn check_outputs(outputs: &[(Address, u64)], cfg: &TxConfig) -> Result<(), CoreError> {
    if outputs.is_empty() || outputs.len() > cfg.max_outputs_per_tx {
        return Err(CoreError::Malformed("output count out of range".to_string()));
    }
    let mut total: u64 = 0;
    for (_, amount) in outputs {
        total = total
            .checked_add(*amount)
            .ok_or_else(|| CoreError::Malformed("output sum overflows u64".to_string()))?;
    }
    Ok(())
}

fn check_message_len(bytes: &[u8], cfg: &TxConfig) -> Result<(), CoreError> {
    if bytes.len() > cfg.max_message_bytes {
        return Err(CoreError::Malformed("message payload too large".to_string()));
    }
    Ok(())
}

/// Verifies the signer's key and signature, the stateful-signature
/// discipline (a key is recorded used on its first accepted transaction and
/// rejected on reuse), and the nonce, then dispatches to the per-variant
/// state mutation. Debits `fee` from the sender as the common final step —
/// every variant except `Coinbase` pays one.
pub fn state_validate_and_apply(
    tx: &Transaction,
    state: &mut StateTxn,
    multisig: &mut MultiSigRegistry,
    ctx: TxContext,
) -> Result<(), CoreError> {
    if matches!(tx.payload, TxPayload::Coinbase { .. }) {
        return apply_coinbase(tx, state);
    }

    let signer = qc_01_crypto::address_of(&tx.public_key, tx.master_address.version());
    let authorized = if signer == tx.master_address {
        true
    } else {
        match state.delegated_access(&tx.master_address, &tx.public_key) {
            Some(AccessType::All) => true,
            Some(AccessType::TransferOnly) => {
                matches!(tx.payload, TxPayload::Transfer { .. } | TxPayload::Message { .. })
            }
            None => false,
        }
    };
    if !authorized {
        return Err(CoreError::InvalidSignature);
    }

    if !verify(&tx.public_key, &tx.canonical_bytes(), &tx.signature) {
        return Err(CoreError::InvalidSignature);
    }

    state.mark_key_used(tx.master_address, tx.public_key.clone())?;
    state.consume_nonce(tx.master_address, tx.nonce)?;
    state.debit(tx.master_address, tx.fee)?;

    match &tx.payload {
        TxPayload::Transfer { outputs, .. } => {
            for (recipient, amount) in outputs {
                state.debit(tx.master_address, *amount)?;
                state.credit(*recipient, *amount);
            }
        }
        TxPayload::Coinbase { .. } => unreachable!("handled above"),
        TxPayload::Message { .. } => {
            // Opaque payload; no state effect beyond the fee already debited.
        }
        TxPayload::TokenCreate {
            symbol,
            name,
            owner,
            decimals,
            initial_balances,
        } => {
            let token_hash = tx.hash();
            let total_supply = initial_balances.iter().map(|(_, amount)| *amount).sum();
            state.create_token(
                token_hash,
                TokenMeta {
                    creating_tx_hash: token_hash,
                    symbol: symbol.clone(),
                    name: name.clone(),
                    owner: *owner,
                    decimals: *decimals,
                    total_supply,
                },
            )?;
            for (recipient, amount) in initial_balances {
                state.credit_token(*recipient, token_hash, *amount);
            }
        }
        TxPayload::TokenTransfer { token_hash, outputs } => {
            if state.get_token(token_hash).is_none() {
                return Err(CoreError::UnknownToken(*token_hash));
            }
            for (recipient, amount) in outputs {
                state.debit_token(tx.master_address, *token_hash, *amount)?;
                state.credit_token(*recipient, *token_hash, *amount);
            }
        }
        TxPayload::Slave { delegated } => {
            for key in delegated {
                state.add_delegated_key(tx.master_address, key.clone());
            }
        }
        TxPayload::MultiSigCreate {
            signatories,
            weights,
            threshold,
        } => {
            let multisig_address = tx.master_address;
            multisig.apply_block(ctx.block_height, |ms_txn| {
                ms_txn.create_account(
                    multisig_address,
                    MultiSigAccount {
                        signatories: signatories.clone(),
                        weights: weights.clone(),
                        threshold: *threshold,
                    },
                )
            })?;
        }
        TxPayload::MultiSigSpend {
            multisig_address,
            outputs,
            expiry_height,
        } => {
            let spend_hash = tx.hash();
            let spend = PendingSpend::new(*multisig_address, outputs.clone(), *expiry_height);
            multisig.apply_block(ctx.block_height, |ms_txn| {
                ms_txn.create_spend(spend_hash, spend)
            })?;
        }
        TxPayload::MultiSigVote { spend_hash, vote_yes } => {
            let spend_hash = *spend_hash;
            let vote_yes = *vote_yes;
            let signer_address = tx.master_address;
            let height = ctx.block_height;
            let (ready, outputs) = multisig.apply_block(height, |ms_txn| {
                let ready = ms_txn.cast_vote(spend_hash, signer_address, vote_yes, height)?;
                let outputs = ms_txn
                    .get_spend(&spend_hash)
                    .map(|spend| spend.outputs.clone())
                    .unwrap_or_default();
                Ok((ready, outputs))
            })?;
            if ready {
                for (recipient, amount) in &outputs {
                    state.credit(*recipient, *amount);
                }
                multisig.apply_block(height, |ms_txn| {
                    ms_txn.mark_executed(spend_hash);
                    Ok(())
                })?;
            }
        }
    }
    Ok(())
}

fn apply_coinbase(tx: &Transaction, state: &mut StateTxn) -> Result<(), CoreError> {
    match &tx.payload {
        TxPayload::Coinbase { recipient, amount } => {
            state.credit(*recipient, *amount);
            Ok(())
        }
        _ => unreachable!("apply_coinbase called on non-coinbase transaction"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qc_01_crypto::KeyPair;
    use qc_04_state::StateStore;
    use shared_types::PublicKeyBytes;

    fn ctx() -> TxContext {
        TxContext { block_height: 1 }
    }

    fn signed_transfer(keypair: &KeyPair, nonce: u64, outputs: Vec<(Address, u64)>, fee: u64) -> Transaction {
        let address = qc_01_crypto::address_of(&keypair.public_key_bytes(), Address::VERSION_DEV);
        let mut tx = Transaction {
            master_address: address,
            public_key: keypair.public_key_bytes(),
            signature: shared_types::SignatureBytes(Vec::new()),
            nonce,
            fee,
            payload: TxPayload::Transfer { outputs, message: None },
        };
        tx.signature = keypair.sign(&tx.canonical_bytes());
        tx
    }

    fn addr(byte: u8) -> Address {
        let mut bytes = [0u8; 25];
        bytes[0] = Address::VERSION_DEV;
        bytes[1] = byte;
        Address(bytes)
    }

    #[test]
    fn valid_transfer_moves_balance_and_pays_fee() {
        let keypair = KeyPair::generate();
        let sender = qc_01_crypto::address_of(&keypair.public_key_bytes(), Address::VERSION_DEV);
        let mut store = StateStore::new();
        let mut multisig = MultiSigRegistry::new();

        store
            .apply_block(0, |txn| {
                txn.credit(sender, 1000);
                Ok(())
            })
            .unwrap();

        let tx = signed_transfer(&keypair, 0, vec![(addr(9), 100)], 5);
        store
            .apply_block(1, |txn| state_validate_and_apply(&tx, txn, &mut multisig, ctx()))
            .unwrap();

        assert_eq!(store.get_account(&sender).balance, 895);
        assert_eq!(store.get_account(&addr(9)).balance, 100);
        assert_eq!(store.get_account(&sender).nonce, 1);
    }

    #[test]
    fn reused_signing_key_is_rejected() {
        let keypair = KeyPair::generate();
        let sender = qc_01_crypto::address_of(&keypair.public_key_bytes(), Address::VERSION_DEV);
        let mut store = StateStore::new();
        let mut multisig = MultiSigRegistry::new();
        store.apply_block(0, |txn| { txn.credit(sender, 1000); Ok(()) }).unwrap();

        let tx1 = signed_transfer(&keypair, 0, vec![(addr(9), 10)], 1);
        store
            .apply_block(1, |txn| state_validate_and_apply(&tx1, txn, &mut multisig, ctx()))
            .unwrap();

        let tx2 = signed_transfer(&keypair, 1, vec![(addr(9), 10)], 1);
        let result = store.apply_block(2, |txn| state_validate_and_apply(&tx2, txn, &mut multisig, ctx()));
        assert!(matches!(result, Err(CoreError::ReusedSigningKey)));
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let keypair = KeyPair::generate();
        let sender = qc_01_crypto::address_of(&keypair.public_key_bytes(), Address::VERSION_DEV);
        let mut store = StateStore::new();
        let mut multisig = MultiSigRegistry::new();
        store.apply_block(0, |txn| { txn.credit(sender, 1000); Ok(()) }).unwrap();

        let mut tx = signed_transfer(&keypair, 0, vec![(addr(9), 10)], 1);
        tx.signature = shared_types::SignatureBytes(vec![0xAB; 10]);
        let result = store.apply_block(1, |txn| state_validate_and_apply(&tx, txn, &mut multisig, ctx()));
        assert!(matches!(result, Err(CoreError::InvalidSignature)));
    }

    #[test]
    fn unknown_public_key_cannot_impersonate_master_address() {
        let owner = KeyPair::generate();
        let impostor = KeyPair::generate();
        let owner_address = qc_01_crypto::address_of(&owner.public_key_bytes(), Address::VERSION_DEV);

        let mut tx = Transaction {
            master_address: owner_address,
            public_key: impostor.public_key_bytes(),
            signature: shared_types::SignatureBytes(Vec::new()),
            nonce: 0,
            fee: 1,
            payload: TxPayload::Transfer {
                outputs: vec![(addr(9), 10)],
                message: None,
            },
        };
        tx.signature = impostor.sign(&tx.canonical_bytes());

        let mut store = StateStore::new();
        let mut multisig = MultiSigRegistry::new();
        store.apply_block(0, |txn| { txn.credit(owner_address, 1000); Ok(()) }).unwrap();

        let result = store.apply_block(1, |txn| state_validate_and_apply(&tx, txn, &mut multisig, ctx()));
        assert!(matches!(result, Err(CoreError::InvalidSignature)));
    }

    #[test]
    fn token_create_then_transfer_moves_token_balance() {
        let keypair = KeyPair::generate();
        let owner = qc_01_crypto::address_of(&keypair.public_key_bytes(), Address::VERSION_DEV);
        let mut store = StateStore::new();
        let mut multisig = MultiSigRegistry::new();
        store.apply_block(0, |txn| { txn.credit(owner, 1000); Ok(()) }).unwrap();

        let mut create_tx = Transaction {
            master_address: owner,
            public_key: keypair.public_key_bytes(),
            signature: shared_types::SignatureBytes(Vec::new()),
            nonce: 0,
            fee: 1,
            payload: TxPayload::TokenCreate {
                symbol: "QCT".to_string(),
                name: "Quantum Chain Token".to_string(),
                owner,
                decimals: 8,
                initial_balances: vec![(owner, 500)],
            },
        };
        create_tx.signature = keypair.sign(&create_tx.canonical_bytes());
        let token_hash = create_tx.hash();

        store
            .apply_block(1, |txn| state_validate_and_apply(&create_tx, txn, &mut multisig, ctx()))
            .unwrap();
        assert_eq!(
            store.get_account(&owner).token_balances.get(&token_hash),
            Some(&500)
        );

        let mut transfer_tx = Transaction {
            master_address: owner,
            public_key: keypair.public_key_bytes(),
            signature: shared_types::SignatureBytes(Vec::new()),
            nonce: 1,
            fee: 1,
            payload: TxPayload::TokenTransfer {
                token_hash,
                outputs: vec![(addr(9), 200)],
            },
        };
        transfer_tx.signature = keypair.sign(&transfer_tx.canonical_bytes());
        store
            .apply_block(2, |txn| state_validate_and_apply(&transfer_tx, txn, &mut multisig, ctx()))
            .unwrap();

        assert_eq!(
            store.get_account(&owner).token_balances.get(&token_hash),
            Some(&300)
        );
        assert_eq!(
            store.get_account(&addr(9)).token_balances.get(&token_hash),
            Some(&200)
        );
    }

    #[test]
    fn basic_validate_rejects_empty_outputs() {
        let cfg = TxConfig::default();
        let tx = Transaction {
            master_address: addr(1),
            public_key: PublicKeyBytes(vec![1]),
            signature: shared_types::SignatureBytes(vec![2]),
            nonce: 0,
            fee: 0,
            payload: TxPayload::Transfer {
                outputs: vec![],
                message: None,
            },
        };
        assert!(basic_validate(&tx, &cfg).is_err());
    }
}
