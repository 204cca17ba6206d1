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

//! Persistence seam.
//!
//! The core never owns a schema or a connection: it loads records when a
//! client is first used and saves them right after each accepted mutation.
//! A [`Store`] is whatever keeps those records between sessions.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::account::{Account, WithdrawalPolicy};
use crate::base::{AccountNumber, ClientId};
use crate::client::ClientProfile;
use crate::clock::SharedClock;
use crate::history::HistoryEntry;
use crate::transaction::TransactionKind;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored value could not be read back.
    #[error("corrupt {field} value `{value}`")]
    Corrupt { field: &'static str, value: String },

    /// An account save would overwrite an account owned by another client.
    #[error("account {number} belongs to another client")]
    ForeignAccount { number: AccountNumber },
}

/// Durable form of an account. `policy` is `None` for basic accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub number: AccountNumber,
    pub agency: String,
    pub owner: ClientId,
    pub balance: Decimal,
    pub policy: Option<WithdrawalPolicy>,
}

impl AccountRecord {
    /// Rehydrates the account with its recorded transactions, oldest first.
    pub fn into_account(self, transactions: Vec<TransactionRecord>, clock: SharedClock) -> Account {
        let entries = transactions
            .into_iter()
            .map(TransactionRecord::into_entry)
            .collect();
        Account::restore(
            self.number,
            self.agency,
            self.owner,
            self.policy.into(),
            self.balance,
            entries,
            clock,
        )
    }
}

impl From<&Account> for AccountRecord {
    fn from(account: &Account) -> Self {
        Self {
            number: account.number(),
            agency: account.agency().to_owned(),
            owner: account.owner().clone(),
            balance: account.balance(),
            policy: account.kind().policy(),
        }
    }
}

/// Durable form of one history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub account: AccountNumber,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub timestamp: NaiveDateTime,
}

impl TransactionRecord {
    pub fn new(account: AccountNumber, entry: &HistoryEntry) -> Self {
        Self {
            account,
            kind: entry.kind,
            amount: entry.amount,
            timestamp: entry.timestamp,
        }
    }

    pub fn into_entry(self) -> HistoryEntry {
        HistoryEntry {
            kind: self.kind,
            amount: self.amount,
            timestamp: self.timestamp,
        }
    }
}

/// Records a directory loads from and saves to.
pub trait Store: Send {
    fn load_client(&mut self, id: &ClientId) -> Result<Option<ClientProfile>, StoreError>;

    /// Inserts a new client. Callers check for duplicates first.
    fn insert_client(&mut self, profile: &ClientProfile) -> Result<(), StoreError>;

    /// Every stored client identifier, in ascending order.
    fn client_ids(&mut self) -> Result<Vec<ClientId>, StoreError>;

    /// Accounts owned by `owner`, ordered by number.
    fn load_accounts(&mut self, owner: &ClientId) -> Result<Vec<AccountRecord>, StoreError>;

    /// Inserts or updates an account by number.
    ///
    /// Fails with [`StoreError::ForeignAccount`] when the number is already
    /// taken by an account of a different owner.
    fn save_account(&mut self, record: &AccountRecord) -> Result<(), StoreError>;

    /// Highest account number ever saved.
    fn last_account_number(&mut self) -> Result<Option<AccountNumber>, StoreError>;

    /// Transactions of one account in the order they were appended.
    fn load_transactions(
        &mut self,
        account: AccountNumber,
    ) -> Result<Vec<TransactionRecord>, StoreError>;

    fn append_transaction(&mut self, record: &TransactionRecord) -> Result<(), StoreError>;

    /// Saves the account and appends the transaction that produced it, as
    /// one unit: either both are stored or neither is.
    fn commit(
        &mut self,
        account: &AccountRecord,
        transaction: &TransactionRecord,
    ) -> Result<(), StoreError>;
}
