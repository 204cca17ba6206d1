// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use super::{AccountRecord, Store, StoreError, TransactionRecord};
use crate::base::{AccountNumber, ClientId};
use crate::client::ClientProfile;
use std::collections::BTreeMap;

/// In-process store. Cloning it snapshots every record.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    clients: BTreeMap<ClientId, ClientProfile>,
    accounts: BTreeMap<AccountNumber, AccountRecord>,
    transactions: Vec<TransactionRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }
}

impl Store for MemoryStore {
    fn load_client(&mut self, id: &ClientId) -> Result<Option<ClientProfile>, StoreError> {
        Ok(self.clients.get(id).cloned())
    }

    fn insert_client(&mut self, profile: &ClientProfile) -> Result<(), StoreError> {
        self.clients.insert(profile.id.clone(), profile.clone());
        Ok(())
    }

    fn client_ids(&mut self) -> Result<Vec<ClientId>, StoreError> {
        Ok(self.clients.keys().cloned().collect())
    }

    fn load_accounts(&mut self, owner: &ClientId) -> Result<Vec<AccountRecord>, StoreError> {
        Ok(self
            .accounts
            .values()
            .filter(|record| &record.owner == owner)
            .cloned()
            .collect())
    }

    fn save_account(&mut self, record: &AccountRecord) -> Result<(), StoreError> {
        if self
            .accounts
            .get(&record.number)
            .is_some_and(|existing| existing.owner != record.owner)
        {
            return Err(StoreError::ForeignAccount {
                number: record.number,
            });
        }
        self.accounts.insert(record.number, record.clone());
        Ok(())
    }

    fn last_account_number(&mut self) -> Result<Option<AccountNumber>, StoreError> {
        Ok(self.accounts.keys().next_back().copied())
    }

    fn load_transactions(
        &mut self,
        account: AccountNumber,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        Ok(self
            .transactions
            .iter()
            .filter(|record| record.account == account)
            .cloned()
            .collect())
    }

    fn append_transaction(&mut self, record: &TransactionRecord) -> Result<(), StoreError> {
        self.transactions.push(record.clone());
        Ok(())
    }

    fn commit(
        &mut self,
        account: &AccountRecord,
        transaction: &TransactionRecord,
    ) -> Result<(), StoreError> {
        // Nothing after the account save can fail.
        self.save_account(account)?;
        self.append_transaction(transaction)
    }
}
