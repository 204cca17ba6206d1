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

//! Clients and the accounts they own.

use crate::account::Account;
use crate::base::{AccountNumber, ClientId};
use crate::error::TransactionError;
use crate::history::HistoryEntry;
use crate::transaction::Transaction;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

/// Identity fields of a client, as registered and as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientProfile {
    pub id: ClientId,
    pub name: String,
    pub birth_date: NaiveDate,
    pub address: String,
}

#[derive(Debug)]
pub struct Client {
    profile: ClientProfile,
    accounts: Vec<Account>,
}

impl Client {
    pub fn new(profile: ClientProfile) -> Self {
        Self {
            profile,
            accounts: Vec::new(),
        }
    }

    pub fn id(&self) -> &ClientId {
        &self.profile.id
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }

    pub fn birth_date(&self) -> NaiveDate {
        self.profile.birth_date
    }

    pub fn address(&self) -> &str {
        &self.profile.address
    }

    pub fn profile(&self) -> &ClientProfile {
        &self.profile
    }

    /// Owned accounts in the order they were added.
    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn account(&self, number: AccountNumber) -> Option<&Account> {
        self.accounts.iter().find(|account| account.number() == number)
    }

    pub(crate) fn account_mut(&mut self, number: AccountNumber) -> Option<&mut Account> {
        self.accounts
            .iter_mut()
            .find(|account| account.number() == number)
    }

    pub fn add_account(&mut self, account: Account) {
        debug_assert_eq!(account.owner(), self.id(), "account added to a foreign client");
        self.accounts.push(account);
    }

    /// Applies `transaction` to one of this client's accounts.
    ///
    /// Every failure, expected or not, is logged and reported as `false`.
    pub fn perform_transaction(&mut self, number: AccountNumber, transaction: &Transaction) -> bool {
        self.try_perform_transaction(number, transaction).is_ok()
    }

    /// Same as [`Client::perform_transaction`] but keeps the reason of a
    /// failure for the caller to show.
    pub fn try_perform_transaction(
        &mut self,
        number: AccountNumber,
        transaction: &Transaction,
    ) -> Result<HistoryEntry, TransactionError> {
        let client = self.profile.id.clone();
        debug!(%client, account = %number, ?transaction, "performing transaction");

        let result = self
            .account_mut(number)
            .ok_or(TransactionError::AccountNotFound(number))
            .and_then(|account| transaction.register(account));

        match &result {
            Ok(_) => debug!(%client, account = %number, "transaction applied"),
            Err(e) if e.is_rule_violation() => {
                warn!(%client, account = %number, kind = %transaction.kind(), "transaction rejected: {e}")
            }
            Err(e) => {
                error!(%client, account = %number, ?transaction, "transaction failed unexpectedly: {e}")
            }
        }
        result
    }
}
