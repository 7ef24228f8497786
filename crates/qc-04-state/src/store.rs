use std::collections::HashMap;

use shared_types::{
    AccessType, AccountState, Address, CoreError, DelegatedKey, Hash, PublicKeyBytes, TokenMeta,
};

use crate::errors::StateError;

/// Records, for a single block, enough information to undo every mutation
/// that block made. `accounts` maps an address to the state it had *before*
/// its first mutation in this block (`None` means the address did not exist
/// before this block, i.e. it should be removed entirely on revert); `tokens`
/// is the same idea for token metadata.
#[derive(Debug, Default)]
struct BlockWriteSet {
    height: u64,
    accounts: HashMap<Address, Option<AccountState>>,
    tokens: HashMap<Hash, Option<TokenMeta>>,
}

/// Flat account-state overlay: `Address -> AccountState` plus a
/// `token_hash -> TokenMeta` registry, with a per-block undo-log stacked on
/// top so a reorg can walk back to a common ancestor one block at a time.
///
/// There is no trie here and no light-client proof machinery — state is
/// authoritative, in-process data, not something a remote peer is ever asked
/// to verify against a root hash.
pub struct StateStore {
    accounts: HashMap<Address, AccountState>,
    tokens: HashMap<Hash, TokenMeta>,
    write_sets: Vec<BlockWriteSet>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            accounts: HashMap::new(),
            tokens: HashMap::new(),
            write_sets: Vec::new(),
        }
    }

    /// The height of the most recently applied block, if any.
    pub fn tip_height(&self) -> Option<u64> {
        self.write_sets.last().map(|ws| ws.height)
    }

    /// Returns a copy of the account's state, or the default (zeroed)
    /// account if it has never been touched.
    pub fn get_account(&self, address: &Address) -> AccountState {
        self.accounts.get(address).cloned().unwrap_or_default()
    }

    /// Returns a token's metadata, if a `TokenCreate` has registered it.
    pub fn get_token(&self, token: &Hash) -> Option<TokenMeta> {
        self.tokens.get(token).cloned()
    }

    /// Applies a block's worth of mutations via `f`, which receives a
    /// [`StateTxn`] scoped to this block's write-set. If `f` returns an
    /// error the write-set accumulated so far is rolled back in place and
    /// the store is left exactly as it was before the call.
    pub fn apply_block<F, T>(&mut self, height: u64, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(&mut StateTxn) -> Result<T, CoreError>,
    {
        let mut txn = StateTxn {
            accounts: &mut self.accounts,
            tokens: &mut self.tokens,
            account_undo: HashMap::new(),
            token_undo: HashMap::new(),
        };
        match f(&mut txn) {
            Ok(value) => {
                let write_set = BlockWriteSet {
                    height,
                    accounts: txn.account_undo,
                    tokens: txn.token_undo,
                };
                self.write_sets.push(write_set);
                Ok(value)
            }
            Err(err) => {
                for (address, prior) in txn.account_undo {
                    match prior {
                        Some(state) => {
                            txn.accounts.insert(address, state);
                        }
                        None => {
                            txn.accounts.remove(&address);
                        }
                    }
                }
                for (token, prior) in txn.token_undo {
                    match prior {
                        Some(meta) => {
                            txn.tokens.insert(token, meta);
                        }
                        None => {
                            txn.tokens.remove(&token);
                        }
                    }
                }
                Err(err)
            }
        }
    }

    /// Reverts the most recently applied block, restoring every account and
    /// token it touched to its pre-block state. Used during reorg to walk
    /// the old branch back to the fork point.
    pub fn revert_block(&mut self, height: u64) -> Result<(), StateError> {
        let top = self.write_sets.last().map(|ws| ws.height);
        if top != Some(height) {
            return Err(StateError::RevertMismatch {
                requested: height,
                tip: top,
            });
        }
        let write_set = self.write_sets.pop().expect("checked above");
        for (address, prior) in write_set.accounts {
            match prior {
                Some(state) => {
                    self.accounts.insert(address, state);
                }
                None => {
                    self.accounts.remove(&address);
                }
            }
        }
        for (token, prior) in write_set.tokens {
            match prior {
                Some(meta) => {
                    self.tokens.insert(token, meta);
                }
                None => {
                    self.tokens.remove(&token);
                }
            }
        }
        Ok(())
    }
}

/// A handle into a single block's worth of mutations. Every primitive
/// mutator records the address's pre-mutation state in the undo-log the
/// first time that address is touched within this block, so repeated
/// mutations of the same address within a block don't clobber the undo
/// entry with an intermediate state.
pub struct StateTxn<'a> {
    accounts: &'a mut HashMap<Address, AccountState>,
    tokens: &'a mut HashMap<Hash, TokenMeta>,
    account_undo: HashMap<Address, Option<AccountState>>,
    token_undo: HashMap<Hash, Option<TokenMeta>>,
}

impl<'a> StateTxn<'a> {
    fn record_account_undo(&mut self, address: Address) {
        self.account_undo
            .entry(address)
            .or_insert_with(|| self.accounts.get(&address).cloned());
    }

    fn account_mut(&mut self, address: Address) -> &mut AccountState {
        self.record_account_undo(address);
        self.accounts.entry(address).or_default()
    }

    pub fn get(&self, address: &Address) -> AccountState {
        self.accounts.get(address).cloned().unwrap_or_default()
    }

    pub fn credit(&mut self, address: Address, amount: u64) {
        let account = self.account_mut(address);
        account.balance = account.balance.saturating_add(amount);
    }

    pub fn debit(&mut self, address: Address, amount: u64) -> Result<(), CoreError> {
        let available = self.get(&address).balance;
        if available < amount {
            return Err(CoreError::InsufficientBalance {
                have: available,
                need: amount,
            });
        }
        let account = self.account_mut(address);
        account.balance -= amount;
        Ok(())
    }

    pub fn set_nonce(&mut self, address: Address, nonce: u64) {
        self.account_mut(address).nonce = nonce;
    }

    /// Checks the account's current nonce matches `expected`, i.e. that this
    /// transaction is the next one the account is permitted to submit, and
    /// advances the stored nonce to `expected + 1`.
    pub fn consume_nonce(&mut self, address: Address, expected: u64) -> Result<(), CoreError> {
        let got = self.get(&address).nonce;
        if got != expected {
            return Err(CoreError::NonceGap { expected, got });
        }
        self.set_nonce(address, expected + 1);
        Ok(())
    }

    pub fn mark_key_used(&mut self, address: Address, key: PublicKeyBytes) -> Result<(), CoreError> {
        if self.get(&address).has_used_key(&key) {
            return Err(CoreError::ReusedSigningKey);
        }
        self.account_mut(address).used_keys.push(key);
        Ok(())
    }

    pub fn add_delegated_key(&mut self, address: Address, delegated: DelegatedKey) {
        self.account_mut(address).delegated_keys.push(delegated);
    }

    pub fn delegated_access(&self, address: &Address, key: &PublicKeyBytes) -> Option<AccessType> {
        self.get(address).slave_access_for(key)
    }

    pub fn credit_token(&mut self, address: Address, token: Hash, amount: u64) {
        let account = self.account_mut(address);
        let entry = account.token_balances.entry(token).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    pub fn debit_token(&mut self, address: Address, token: Hash, amount: u64) -> Result<(), CoreError> {
        let available = self
            .get(&address)
            .token_balances
            .get(&token)
            .copied()
            .unwrap_or(0);
        if available < amount {
            return Err(CoreError::InsufficientTokenBalance { token, have: available, need: amount });
        }
        let account = self.account_mut(address);
        let entry = account.token_balances.entry(token).or_insert(0);
        *entry -= amount;
        Ok(())
    }

    pub fn get_token(&self, token: &Hash) -> Option<TokenMeta> {
        self.tokens.get(token).cloned()
    }

    /// Registers a newly created token. Fails if a token with the same hash
    /// (the creating transaction's hash) already exists.
    pub fn create_token(&mut self, token: Hash, meta: TokenMeta) -> Result<(), CoreError> {
        if self.tokens.contains_key(&token) {
            return Err(CoreError::TokenAlreadyExists(token));
        }
        self.token_undo.entry(token).or_insert(None);
        self.tokens.insert(token, meta);
        Ok(())
    }
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

    #[test]
    fn credit_and_debit_round_trip() {
        let mut store = StateStore::new();
        store
            .apply_block(0, |txn| {
                txn.credit(addr(1), 100);
                Ok(())
            })
            .unwrap();
        assert_eq!(store.get_account(&addr(1)).balance, 100);

        store
            .apply_block(1, |txn| {
                txn.debit(addr(1), 40)?;
                txn.credit(addr(2), 40);
                Ok(())
            })
            .unwrap();
        assert_eq!(store.get_account(&addr(1)).balance, 60);
        assert_eq!(store.get_account(&addr(2)).balance, 40);
    }

    #[test]
    fn failed_block_rolls_back_in_place() {
        let mut store = StateStore::new();
        store
            .apply_block(0, |txn| {
                txn.credit(addr(1), 10);
                Ok(())
            })
            .unwrap();

        let result: Result<(), CoreError> = store.apply_block(1, |txn| {
            txn.credit(addr(1), 5);
            txn.debit(addr(1), 1000)
        });
        assert!(result.is_err());
        assert_eq!(store.get_account(&addr(1)).balance, 10);
        assert_eq!(store.tip_height(), Some(0));
    }

    #[test]
    fn revert_block_restores_prior_state() {
        let mut store = StateStore::new();
        store
            .apply_block(0, |txn| {
                txn.credit(addr(1), 100);
                Ok(())
            })
            .unwrap();
        store
            .apply_block(1, |txn| {
                txn.debit(addr(1), 30)?;
                txn.set_nonce(addr(1), 1);
                Ok(())
            })
            .unwrap();
        assert_eq!(store.get_account(&addr(1)).balance, 70);

        store.revert_block(1).unwrap();
        assert_eq!(store.get_account(&addr(1)).balance, 100);
        assert_eq!(store.get_account(&addr(1)).nonce, 0);
        assert_eq!(store.tip_height(), Some(0));

        store.revert_block(0).unwrap();
        assert_eq!(store.get_account(&addr(1)).balance, 0);
        assert_eq!(store.tip_height(), None);
    }

    #[test]
    fn revert_wrong_height_is_rejected() {
        let mut store = StateStore::new();
        store.apply_block(0, |_txn| Ok(())).unwrap();
        let err = store.revert_block(5).unwrap_err();
        assert!(matches!(err, StateError::RevertMismatch { .. }));
    }

    #[test]
    fn key_reuse_is_rejected() {
        let mut store = StateStore::new();
        let key = PublicKeyBytes(vec![1, 2, 3]);
        store
            .apply_block(0, |txn| txn.mark_key_used(addr(1), key.clone()))
            .unwrap();

        let result = store.apply_block(1, |txn| txn.mark_key_used(addr(1), key.clone()));
        assert!(matches!(result, Err(CoreError::ReusedSigningKey)));
    }

    #[test]
    fn nonce_gap_is_rejected() {
        let mut store = StateStore::new();
        let result = store.apply_block(0, |txn| txn.consume_nonce(addr(1), 3));
        assert!(matches!(result, Err(CoreError::NonceGap { expected: 3, got: 0 })));

        store.apply_block(0, |txn| txn.consume_nonce(addr(1), 0)).unwrap();
        assert_eq!(store.get_account(&addr(1)).nonce, 1);
    }

    #[test]
    fn token_balances_track_independently_of_native_balance() {
        let mut store = StateStore::new();
        let token: Hash = [7u8; 32];
        store
            .apply_block(0, |txn| {
                txn.credit_token(addr(1), token, 50);
                Ok(())
            })
            .unwrap();
        assert_eq!(
            store.get_account(&addr(1)).token_balances.get(&token),
            Some(&50)
        );

        let result = store.apply_block(1, |txn| txn.debit_token(addr(1), token, 1000));
        assert!(result.is_err());
        assert_eq!(
            store.get_account(&addr(1)).token_balances.get(&token),
            Some(&50)
        );
    }

    #[test]
    fn delegated_key_access_is_queryable() {
        let mut store = StateStore::new();
        let key = PublicKeyBytes(vec![9]);
        store
            .apply_block(0, |txn| {
                txn.add_delegated_key(
                    addr(1),
                    DelegatedKey {
                        public_key: key.clone(),
                        access: AccessType::TransferOnly,
                    },
                );
                Ok(())
            })
            .unwrap();

        let view = store.get_account(&addr(1));
        assert_eq!(view.slave_access_for(&key), Some(AccessType::TransferOnly));
    }

    fn sample_token_meta(owner: Address) -> TokenMeta {
        TokenMeta {
            creating_tx_hash: [5u8; 32],
            symbol: "QCT".to_string(),
            name: "Quantum Chain Token".to_string(),
            owner,
            decimals: 8,
            total_supply: 1_000_000,
        }
    }

    #[test]
    fn token_creation_is_rejected_on_duplicate_hash_and_reverted() {
        let mut store = StateStore::new();
        let token_hash: Hash = [5u8; 32];
        let meta = sample_token_meta(addr(1));

        store
            .apply_block(0, |txn| txn.create_token(token_hash, meta.clone()))
            .unwrap();
        assert!(store.get_token(&token_hash).is_some());

        let result = store.apply_block(1, |txn| txn.create_token(token_hash, meta.clone()));
        assert!(matches!(result, Err(CoreError::TokenAlreadyExists(_))));

        store.revert_block(0).unwrap();
        assert!(store.get_token(&token_hash).is_none());
    }
}
