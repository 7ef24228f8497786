//! Multi-signature accounts and their pending spends.
//!
//! `spec.md`'s Data Model section enumerates the persisted chain-state keys
//! (account, token, block, fork) but is silent on where a multi-sig
//! account's signatories/weights/threshold and its in-flight spends live —
//! an Open Question resolved here (see `DESIGN.md`): they get their own
//! registry, mutated and undo-logged the same way `qc-04-state::StateStore`
//! handles accounts, rather than being shoehorned into `AccountState`
//! (whose `delegated_keys` models single-key master/slave delegation, a
//! different mechanism).

use std::collections::HashMap;

use shared_types::{Address, CoreError, Hash};

/// A multi-sig account's membership, created once and immutable afterward.
#[derive(Debug, Clone)]
pub struct MultiSigAccount {
    pub signatories: Vec<Address>,
    pub weights: Vec<u64>,
    pub threshold: u64,
}

impl MultiSigAccount {
    fn weight_of(&self, signer: &Address) -> Option<u64> {
        self.signatories
            .iter()
            .position(|s| s == signer)
            .map(|idx| self.weights[idx])
    }
}

/// A spend proposed against a multi-sig account, awaiting enough weighted
/// votes to reach the account's threshold before `expiry_height`.
#[derive(Debug, Clone)]
pub struct PendingSpend {
    pub multisig_address: Address,
    pub outputs: Vec<(Address, u64)>,
    pub expiry_height: u64,
    votes: HashMap<Address, bool>,
    pub executed: bool,
}

impl PendingSpend {
    fn total_supporting_weight(&self, account: &MultiSigAccount) -> u64 {
        self.votes
            .iter()
            .filter(|(_, &voted_yes)| voted_yes)
            .filter_map(|(signer, _)| account.weight_of(signer))
            .sum()
    }
}

#[derive(Debug, Default)]
struct MultiSigWriteSet {
    height: u64,
    accounts: HashMap<Address, Option<MultiSigAccount>>,
    spends: HashMap<Hash, Option<PendingSpend>>,
}

/// Registry of multi-sig accounts and pending spends, with the same
/// per-block undo-log discipline as `qc-04-state::StateStore`.
pub struct MultiSigRegistry {
    accounts: HashMap<Address, MultiSigAccount>,
    spends: HashMap<Hash, PendingSpend>,
    write_sets: Vec<MultiSigWriteSet>,
}

impl Default for MultiSigRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiSigRegistry {
    pub fn new() -> Self {
        Self {
            accounts: HashMap::new(),
            spends: HashMap::new(),
            write_sets: Vec::new(),
        }
    }

    pub fn get_account(&self, address: &Address) -> Option<&MultiSigAccount> {
        self.accounts.get(address)
    }

    pub fn get_spend(&self, spend_hash: &Hash) -> Option<&PendingSpend> {
        self.spends.get(spend_hash)
    }

    pub fn apply_block<F, T>(&mut self, height: u64, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(&mut MultiSigTxn) -> Result<T, CoreError>,
    {
        let mut txn = MultiSigTxn {
            accounts: &mut self.accounts,
            spends: &mut self.spends,
            account_undo: HashMap::new(),
            spend_undo: HashMap::new(),
        };
        match f(&mut txn) {
            Ok(value) => {
                self.write_sets.push(MultiSigWriteSet {
                    height,
                    accounts: txn.account_undo,
                    spends: txn.spend_undo,
                });
                Ok(value)
            }
            Err(err) => {
                for (address, prior) in txn.account_undo {
                    match prior {
                        Some(account) => {
                            txn.accounts.insert(address, account);
                        }
                        None => {
                            txn.accounts.remove(&address);
                        }
                    }
                }
                for (spend_hash, prior) in txn.spend_undo {
                    match prior {
                        Some(spend) => {
                            txn.spends.insert(spend_hash, spend);
                        }
                        None => {
                            txn.spends.remove(&spend_hash);
                        }
                    }
                }
                Err(err)
            }
        }
    }

    pub fn revert_block(&mut self, height: u64) -> Option<()> {
        let top = self.write_sets.last().map(|ws| ws.height);
        if top != Some(height) {
            return None;
        }
        let write_set = self.write_sets.pop()?;
        for (address, prior) in write_set.accounts {
            match prior {
                Some(account) => {
                    self.accounts.insert(address, account);
                }
                None => {
                    self.accounts.remove(&address);
                }
            }
        }
        for (spend_hash, prior) in write_set.spends {
            match prior {
                Some(spend) => {
                    self.spends.insert(spend_hash, spend);
                }
                None => {
                    self.spends.remove(&spend_hash);
                }
            }
        }
        Some(())
    }
}

pub struct MultiSigTxn<'a> {
    accounts: &'a mut HashMap<Address, MultiSigAccount>,
    spends: &'a mut HashMap<Hash, PendingSpend>,
    account_undo: HashMap<Address, Option<MultiSigAccount>>,
    spend_undo: HashMap<Hash, Option<PendingSpend>>,
}

impl<'a> MultiSigTxn<'a> {
    pub fn get_account(&self, address: &Address) -> Option<&MultiSigAccount> {
        self.accounts.get(address)
    }

    pub fn get_spend(&self, spend_hash: &Hash) -> Option<&PendingSpend> {
        self.spends.get(spend_hash)
    }

    pub fn create_account(
        &mut self,
        address: Address,
        account: MultiSigAccount,
    ) -> Result<(), CoreError> {
        if self.accounts.contains_key(&address) {
            return Err(CoreError::Malformed(
                "multi-sig address already registered".to_string(),
            ));
        }
        self.account_undo.entry(address).or_insert(None);
        self.accounts.insert(address, account);
        Ok(())
    }

    pub fn create_spend(
        &mut self,
        spend_hash: Hash,
        spend: PendingSpend,
    ) -> Result<(), CoreError> {
        if self.spends.contains_key(&spend_hash) {
            return Err(CoreError::DuplicateTx);
        }
        self.spend_undo.entry(spend_hash).or_insert(None);
        self.spends.insert(spend_hash, spend);
        Ok(())
    }

    /// Records `signer`'s vote on `spend_hash` and returns `true` if the
    /// spend now has enough weighted support to execute (the caller then
    /// moves the funds and should mark the spend executed via
    /// [`Self::mark_executed`]).
    pub fn cast_vote(
        &mut self,
        spend_hash: Hash,
        signer: Address,
        vote_yes: bool,
        current_height: u64,
    ) -> Result<bool, CoreError> {
        let account_address = {
            let spend = self.spends.get(&spend_hash).ok_or(CoreError::Malformed(
                "vote references unknown pending spend".to_string(),
            ))?;
            if spend.executed {
                return Err(CoreError::Malformed("spend already executed".to_string()));
            }
            if current_height > spend.expiry_height {
                return Err(CoreError::Expired(spend.expiry_height));
            }
            spend.multisig_address
        };
        let account = self
            .accounts
            .get(&account_address)
            .ok_or(CoreError::Malformed("unknown multi-sig account".to_string()))?
            .clone();
        if account.weight_of(&signer).is_none() {
            return Err(CoreError::Malformed(
                "signer is not a signatory of this multi-sig account".to_string(),
            ));
        }

        self.spend_undo
            .entry(spend_hash)
            .or_insert_with(|| self.spends.get(&spend_hash).cloned());
        let spend = self.spends.get_mut(&spend_hash).expect("checked above");
        spend.votes.insert(signer, vote_yes);

        let supporting = spend.total_supporting_weight(&account);
        Ok(supporting >= account.threshold)
    }

    pub fn mark_executed(&mut self, spend_hash: Hash) {
        self.spend_undo
            .entry(spend_hash)
            .or_insert_with(|| self.spends.get(&spend_hash).cloned());
        if let Some(spend) = self.spends.get_mut(&spend_hash) {
            spend.executed = true;
        }
    }
}

impl PendingSpend {
    pub fn new(multisig_address: Address, outputs: Vec<(Address, u64)>, expiry_height: u64) -> Self {
        Self {
            multisig_address,
            outputs,
            expiry_height,
            votes: HashMap::new(),
            executed: false,
        }
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
    fn vote_reaching_threshold_reports_ready_to_execute() {
        let mut registry = MultiSigRegistry::new();
        let ms_addr = addr(100);
        let account = MultiSigAccount {
            signatories: vec![addr(1), addr(2), addr(3)],
            weights: vec![1, 1, 1],
            threshold: 2,
        };
        registry
            .apply_block(0, |txn| txn.create_account(ms_addr, account))
            .unwrap();

        let spend_hash: Hash = [9u8; 32];
        let spend = PendingSpend::new(ms_addr, vec![(addr(5), 10)], 100);
        registry
            .apply_block(1, |txn| txn.create_spend(spend_hash, spend))
            .unwrap();

        let ready = registry
            .apply_block(2, |txn| txn.cast_vote(spend_hash, addr(1), true, 5))
            .unwrap();
        assert!(!ready, "a single vote of 1 out of a threshold of 2 is not enough");

        let ready = registry
            .apply_block(3, |txn| txn.cast_vote(spend_hash, addr(2), true, 5))
            .unwrap();
        assert!(ready);
    }

    #[test]
    fn vote_past_expiry_is_rejected() {
        let mut registry = MultiSigRegistry::new();
        let ms_addr = addr(100);
        let account = MultiSigAccount {
            signatories: vec![addr(1)],
            weights: vec![1],
            threshold: 1,
        };
        registry
            .apply_block(0, |txn| txn.create_account(ms_addr, account))
            .unwrap();
        let spend_hash: Hash = [9u8; 32];
        registry
            .apply_block(1, |txn| {
                txn.create_spend(spend_hash, PendingSpend::new(ms_addr, vec![], 10))
            })
            .unwrap();

        let result = registry.apply_block(2, |txn| txn.cast_vote(spend_hash, addr(1), true, 11));
        assert!(matches!(result, Err(CoreError::Expired(10))));
    }
}
