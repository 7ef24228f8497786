//! The transaction taxonomy: one envelope, nine payload variants.

use qc_01_crypto::hash as content_hash;
use qc_02_codec::{CodecResult, Encode, Reader, Writer};
use shared_types::{AccessType, Address, DelegatedKey, Hash, PublicKeyBytes, SignatureBytes};

/// A transaction: a common signed envelope wrapping one tagged payload.
///
/// `content_hash()` and `canonical_bytes()` are derived, not stored fields:
/// a stored hash can drift out of sync with its inputs, a derived one
/// can't.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub master_address: Address,
    pub public_key: PublicKeyBytes,
    pub signature: SignatureBytes,
    pub nonce: u64,
    pub fee: u64,
    pub payload: TxPayload,
}

#[derive(Debug, Clone)]
pub enum TxPayload {
    Transfer {
        outputs: Vec<(Address, u64)>,
        message: Option<Vec<u8>>,
    },
    /// Amount is `subsidy(block_number) + Σ fees`; only valid as the first
    /// transaction of a block, never gossiped or admitted to the mempool
    /// standalone.
    Coinbase { recipient: Address, amount: u64 },
    Message {
        payload: Vec<u8>,
        recipient: Option<Address>,
    },
    TokenCreate {
        symbol: String,
        name: String,
        owner: Address,
        decimals: u8,
        initial_balances: Vec<(Address, u64)>,
    },
    TokenTransfer {
        token_hash: Hash,
        outputs: Vec<(Address, u64)>,
    },
    Slave {
        delegated: Vec<DelegatedKey>,
    },
    MultiSigCreate {
        signatories: Vec<Address>,
        weights: Vec<u64>,
        threshold: u64,
    },
    MultiSigSpend {
        multisig_address: Address,
        outputs: Vec<(Address, u64)>,
        expiry_height: u64,
    },
    MultiSigVote {
        spend_hash: Hash,
        vote_yes: bool,
    },
}

const TAG_TRANSFER: u8 = 0;
const TAG_COINBASE: u8 = 1;
const TAG_MESSAGE: u8 = 2;
const TAG_TOKEN_CREATE: u8 = 3;
const TAG_TOKEN_TRANSFER: u8 = 4;
const TAG_SLAVE: u8 = 5;
const TAG_MULTISIG_CREATE: u8 = 6;
const TAG_MULTISIG_SPEND: u8 = 7;
const TAG_MULTISIG_VOTE: u8 = 8;

impl Transaction {
    /// The bytes the signature is computed over: the envelope with the
    /// signature field zeroed (omitted, in this encoding), followed by the
    /// tagged payload.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        self.master_address.encode(&mut w);
        self.public_key.encode(&mut w);
        w.u64(self.nonce);
        w.u64(self.fee);
        self.payload.encode(&mut w);
        w.into_bytes()
    }

    /// The transaction's identity: the content hash of its canonical bytes.
    /// Two transactions with the same hash are the same transaction.
    pub fn hash(&self) -> Hash {
        content_hash(&self.canonical_bytes())
    }
}

impl Encode for TxPayload {
    fn encode(&self, w: &mut Writer) {
        match self {
            TxPayload::Transfer { outputs, message } => {
                w.u8(TAG_TRANSFER);
                encode_outputs(w, outputs);
                match message {
                    Some(bytes) => {
                        w.u8(1);
                        w.var_bytes(bytes);
                    }
                    None => {
                        w.u8(0);
                    }
                }
            }
            TxPayload::Coinbase { recipient, amount } => {
                w.u8(TAG_COINBASE);
                recipient.encode(w);
                w.u64(*amount);
            }
            TxPayload::Message { payload, recipient } => {
                w.u8(TAG_MESSAGE);
                w.var_bytes(payload);
                match recipient {
                    Some(addr) => {
                        w.u8(1);
                        addr.encode(w);
                    }
                    None => {
                        w.u8(0);
                    }
                }
            }
            TxPayload::TokenCreate {
                symbol,
                name,
                owner,
                decimals,
                initial_balances,
            } => {
                w.u8(TAG_TOKEN_CREATE);
                w.var_str(symbol);
                w.var_str(name);
                owner.encode(w);
                w.u8(*decimals);
                encode_outputs(w, initial_balances);
            }
            TxPayload::TokenTransfer { token_hash, outputs } => {
                w.u8(TAG_TOKEN_TRANSFER);
                token_hash.encode(w);
                encode_outputs(w, outputs);
            }
            TxPayload::Slave { delegated } => {
                w.u8(TAG_SLAVE);
                w.seq(delegated, |w, key| {
                    key.public_key.encode(w);
                    w.u8(match key.access {
                        AccessType::All => 0,
                        AccessType::TransferOnly => 1,
                    });
                });
            }
            TxPayload::MultiSigCreate {
                signatories,
                weights,
                threshold,
            } => {
                w.u8(TAG_MULTISIG_CREATE);
                w.seq(signatories, |w, addr| addr.encode(w));
                w.seq(weights, |w, weight| {
                    w.u64(*weight);
                });
                w.u64(*threshold);
            }
            TxPayload::MultiSigSpend {
                multisig_address,
                outputs,
                expiry_height,
            } => {
                w.u8(TAG_MULTISIG_SPEND);
                multisig_address.encode(w);
                encode_outputs(w, outputs);
                w.u64(*expiry_height);
            }
            TxPayload::MultiSigVote { spend_hash, vote_yes } => {
                w.u8(TAG_MULTISIG_VOTE);
                spend_hash.encode(w);
                w.u8(if *vote_yes { 1 } else { 0 });
            }
        }
    }

    fn decode(r: &mut Reader) -> CodecResult<Self> {
        let tag = r.u8()?;
        match tag {
            TAG_TRANSFER => {
                let outputs = decode_outputs(r)?;
                let message = match r.u8()? {
                    1 => Some(r.var_bytes()?),
                    _ => None,
                };
                Ok(TxPayload::Transfer { outputs, message })
            }
            TAG_COINBASE => {
                let recipient = Address::decode(r)?;
                let amount = r.u64()?;
                Ok(TxPayload::Coinbase { recipient, amount })
            }
            TAG_MESSAGE => {
                let payload = r.var_bytes()?;
                let recipient = match r.u8()? {
                    1 => Some(Address::decode(r)?),
                    _ => None,
                };
                Ok(TxPayload::Message { payload, recipient })
            }
            TAG_TOKEN_CREATE => {
                let symbol = r.var_str()?;
                let name = r.var_str()?;
                let owner = Address::decode(r)?;
                let decimals = r.u8()?;
                let initial_balances = decode_outputs(r)?;
                Ok(TxPayload::TokenCreate {
                    symbol,
                    name,
                    owner,
                    decimals,
                    initial_balances,
                })
            }
            TAG_TOKEN_TRANSFER => {
                let token_hash = Hash::decode(r)?;
                let outputs = decode_outputs(r)?;
                Ok(TxPayload::TokenTransfer { token_hash, outputs })
            }
            TAG_SLAVE => {
                let delegated = r.seq(|r| {
                    let public_key = PublicKeyBytes::decode(r)?;
                    let access = match r.u8()? {
                        0 => AccessType::All,
                        _ => AccessType::TransferOnly,
                    };
                    Ok(DelegatedKey { public_key, access })
                })?;
                Ok(TxPayload::Slave { delegated })
            }
            TAG_MULTISIG_CREATE => {
                let signatories = r.seq(Address::decode)?;
                let weights = r.seq(|r| r.u64())?;
                let threshold = r.u64()?;
                Ok(TxPayload::MultiSigCreate {
                    signatories,
                    weights,
                    threshold,
                })
            }
            TAG_MULTISIG_SPEND => {
                let multisig_address = Address::decode(r)?;
                let outputs = decode_outputs(r)?;
                let expiry_height = r.u64()?;
                Ok(TxPayload::MultiSigSpend {
                    multisig_address,
                    outputs,
                    expiry_height,
                })
            }
            TAG_MULTISIG_VOTE => {
                let spend_hash = Hash::decode(r)?;
                let vote_yes = r.u8()? != 0;
                Ok(TxPayload::MultiSigVote { spend_hash, vote_yes })
            }
            _ => Err(qc_02_codec::CodecError::Malformed("unknown transaction payload tag")),
        }
    }
}

/// Full wire/storage encoding, signature included. Distinct from
/// [`Transaction::canonical_bytes`], which omits the signature because
/// it's the preimage the signature is computed over.
impl Encode for Transaction {
    fn encode(&self, w: &mut Writer) {
        self.master_address.encode(w);
        self.public_key.encode(w);
        self.signature.encode(w);
        w.u64(self.nonce);
        w.u64(self.fee);
        self.payload.encode(w);
    }

    fn decode(r: &mut Reader) -> CodecResult<Self> {
        Ok(Self {
            master_address: Address::decode(r)?,
            public_key: PublicKeyBytes::decode(r)?,
            signature: SignatureBytes::decode(r)?,
            nonce: r.u64()?,
            fee: r.u64()?,
            payload: TxPayload::decode(r)?,
        })
    }
}

fn encode_outputs(w: &mut Writer, outputs: &[(Address, u64)]) {
    w.seq(outputs, |w, (addr, amount)| {
        addr.encode(w);
        w.u64(*amount);
    });
}

fn decode_outputs(r: &mut Reader) -> CodecResult<Vec<(Address, u64)>> {
    r.seq(|r| {
        let addr = Address::decode(r)?;
        let amount = r.u64()?;
        Ok((addr, amount))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        let mut bytes = [0u8; 25];
        bytes[0] = Address::VERSION_DEV;
        bytes[1] = byte;
        Address(bytes)
    }

    fn sample_tx(payload: TxPayload) -> Transaction {
        Transaction {
            master_address: addr(1),
            public_key: PublicKeyBytes(vec![1, 2, 3]),
            signature: SignatureBytes(vec![4, 5, 6]),
            nonce: 7,
            fee: 10,
            payload,
        }
    }

    #[test]
    fn full_transaction_round_trips_including_signature() {
        let tx = sample_tx(TxPayload::Message {
            payload: b"hello".to_vec(),
            recipient: Some(addr(2)),
        });
        let encoded = tx.encode_to_vec();
        let decoded = Transaction::decode_from_slice(&encoded).unwrap();
        assert_eq!(decoded.master_address, tx.master_address);
        assert_eq!(decoded.signature, tx.signature);
        assert_eq!(decoded.hash(), tx.hash());
    }

    #[test]
    fn transfer_payload_round_trips() {
        let payload = TxPayload::Transfer {
            outputs: vec![(addr(2), 100), (addr(3), 200)],
            message: Some(b"hi".to_vec()),
        };
        let encoded = payload.encode_to_vec();
        let decoded = TxPayload::decode_from_slice(&encoded).unwrap();
        match decoded {
            TxPayload::Transfer { outputs, message } => {
                assert_eq!(outputs, vec![(addr(2), 100), (addr(3), 200)]);
                assert_eq!(message, Some(b"hi".to_vec()));
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn multisig_spend_payload_round_trips() {
        let payload = TxPayload::MultiSigSpend {
            multisig_address: addr(9),
            outputs: vec![(addr(2), 50)],
            expiry_height: 1000,
        };
        let encoded = payload.encode_to_vec();
        let decoded = TxPayload::decode_from_slice(&encoded).unwrap();
        match decoded {
            TxPayload::MultiSigSpend {
                multisig_address,
                outputs,
                expiry_height,
            } => {
                assert_eq!(multisig_address, addr(9));
                assert_eq!(outputs, vec![(addr(2), 50)]);
                assert_eq!(expiry_height, 1000);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn canonical_bytes_excludes_signature_field() {
        let tx_a = sample_tx(TxPayload::Message {
            payload: b"hello".to_vec(),
            recipient: None,
        });
        let mut tx_b = tx_a.clone();
        tx_b.signature = SignatureBytes(vec![0xFF; 32]);
        assert_eq!(tx_a.canonical_bytes(), tx_b.canonical_bytes());
        assert_eq!(tx_a.hash(), tx_b.hash());
    }

    #[test]
    fn different_payloads_hash_differently() {
        let tx_a = sample_tx(TxPayload::Transfer {
            outputs: vec![(addr(2), 1)],
            message: None,
        });
        let tx_b = sample_tx(TxPayload::Transfer {
            outputs: vec![(addr(2), 2)],
            message: None,
        });
        assert_ne!(tx_a.hash(), tx_b.hash());
    }
}
