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

//! Client directory: the lookup seam between callers and persistence.
//!
//! Clients are loaded from the [`Store`] the first time they are used and
//! kept in memory afterwards. Every accepted mutation is written back before
//! the call returns.
//!
//! A client's entry stays exclusively locked while a transaction runs
//! against one of its accounts, so the balance check and the update cannot
//! interleave with another operation on the same client.

use crate::account::{Account, AccountKind, WithdrawalPolicy};
use crate::base::{AccountNumber, ClientId};
use crate::client::{Client, ClientProfile};
use crate::clock::{SharedClock, SystemClock};
use crate::error::DirectoryError;
use crate::history::HistoryEntry;
use crate::report::{AccountSummary, Statement};
use crate::store::{AccountRecord, MemoryStore, Store, TransactionRecord};
use crate::transaction::{Transaction, TransactionKind};
use dashmap::DashMap;
use dashmap::mapref::one::Ref;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info};

pub struct Directory<S: Store> {
    /// Clients loaded so far, by identifier.
    clients: DashMap<ClientId, Client>,
    store: Mutex<S>,
    /// Number handed to the next opened account. Wider than
    /// [`AccountNumber`] so running past `u32::MAX` is seen, not wrapped.
    next_number: AtomicU64,
    clock: SharedClock,
    /// Policy of checking accounts opened without an explicit one.
    policy: WithdrawalPolicy,
}

impl<S: Store> Directory<S> {
    /// Creates a directory over `store`, using the wall clock.
    ///
    /// # Errors
    ///
    /// [`DirectoryError::Store`] if the highest account number cannot be read.
    pub fn new(store: S) -> Result<Self, DirectoryError> {
        Self::with_clock(store, SystemClock::shared())
    }

    pub fn with_clock(mut store: S, clock: SharedClock) -> Result<Self, DirectoryError> {
        let next = store
            .last_account_number()?
            .map_or(1, |last| u64::from(last.0) + 1);
        Ok(Self::from_parts(store, clock, next))
    }

    fn from_parts(store: S, clock: SharedClock, next: u64) -> Self {
        Directory {
            clients: DashMap::new(),
            store: Mutex::new(store),
            next_number: AtomicU64::new(next),
            clock,
            policy: WithdrawalPolicy::default(),
        }
    }

    /// Sets the policy given to checking accounts opened through
    /// [`Directory::open_checking_account`].
    pub fn with_policy(mut self, policy: WithdrawalPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> WithdrawalPolicy {
        self.policy
    }

    /// Gives back the underlying store.
    pub fn into_store(self) -> S {
        self.store.into_inner()
    }

    /// Registers a new client.
    ///
    /// # Errors
    ///
    /// - [`DirectoryError::InvalidClientId`] - Identifier is empty.
    /// - [`DirectoryError::DuplicateClient`] - Identifier already registered.
    /// - [`DirectoryError::Store`] - The record could not be saved.
    pub fn register_client(&self, profile: ClientProfile) -> Result<(), DirectoryError> {
        if profile.id.is_blank() {
            return Err(DirectoryError::InvalidClientId);
        }
        if self.clients.contains_key(&profile.id) {
            return Err(DirectoryError::DuplicateClient(profile.id));
        }
        {
            let mut store = self.store.lock();
            if store.load_client(&profile.id)?.is_some() {
                return Err(DirectoryError::DuplicateClient(profile.id));
            }
            store.insert_client(&profile)?;
        }

        info!(client = %profile.id, name = %profile.name, "client registered");
        self.clients.insert(profile.id.clone(), Client::new(profile));
        Ok(())
    }

    /// Makes sure `id` is in memory, loading it with its accounts and their
    /// history on first use.
    fn load(&self, id: &ClientId) -> Result<(), DirectoryError> {
        if self.clients.contains_key(id) {
            return Ok(());
        }

        let client = {
            let mut store = self.store.lock();
            let profile = store
                .load_client(id)?
                .ok_or_else(|| DirectoryError::ClientNotFound(id.clone()))?;
            let mut client = Client::new(profile);
            for record in store.load_accounts(id)? {
                let transactions = store.load_transactions(record.number)?;
                client.add_account(record.into_account(transactions, self.clock.clone()));
            }
            client
        };

        debug!(client = %id, accounts = client.accounts().len(), "client loaded");
        self.clients.entry(id.clone()).or_insert(client);
        Ok(())
    }

    /// Looks up a client.
    ///
    /// # Errors
    ///
    /// [`DirectoryError::ClientNotFound`] if nobody is registered under `id`.
    pub fn client(&self, id: &ClientId) -> Result<Ref<'_, ClientId, Client>, DirectoryError> {
        self.load(id)?;
        self.clients
            .get(id)
            .ok_or_else(|| DirectoryError::ClientNotFound(id.clone()))
    }

    /// Opens an account for `id` under the next sequential number.
    ///
    /// # Errors
    ///
    /// - [`DirectoryError::ClientNotFound`] - Unknown client.
    /// - [`DirectoryError::AccountNumbersExhausted`] - Every `u32` number
    ///   has been handed out.
    /// - [`DirectoryError::Store`] - The account could not be saved.
    pub fn open_account(
        &self,
        id: &ClientId,
        kind: AccountKind,
    ) -> Result<AccountNumber, DirectoryError> {
        self.load(id)?;
        let mut client = self
            .clients
            .get_mut(id)
            .ok_or_else(|| DirectoryError::ClientNotFound(id.clone()))?;

        let number = u32::try_from(self.next_number.fetch_add(1, Ordering::SeqCst))
            .map(AccountNumber)
            .map_err(|_| DirectoryError::AccountNumbersExhausted)?;
        let account = Account::with_clock(number, id.clone(), kind, self.clock.clone());
        self.store.lock().save_account(&AccountRecord::from(&account))?;
        client.add_account(account);

        info!(client = %id, account = %number, kind = kind.label(), "account opened");
        Ok(number)
    }

    /// Opens a checking account with the directory's default policy.
    pub fn open_checking_account(&self, id: &ClientId) -> Result<AccountNumber, DirectoryError> {
        self.open_account(id, AccountKind::Checking(self.policy))
    }

    /// Performs `transaction` on account `number` of client `id` and
    /// persists the outcome.
    ///
    /// The new balance and the transaction record are committed to the
    /// store together. If that commit fails the in-memory account is rolled
    /// back, so memory and store never disagree.
    ///
    /// # Errors
    ///
    /// - [`DirectoryError::ClientNotFound`] - Unknown client.
    /// - [`DirectoryError::Transaction`] - The account rejected the
    ///   operation, or the client owns no such account.
    /// - [`DirectoryError::Store`] - The result could not be saved; the
    ///   account is left as it was before the call.
    pub fn perform(
        &self,
        id: &ClientId,
        number: AccountNumber,
        transaction: &Transaction,
    ) -> Result<HistoryEntry, DirectoryError> {
        self.load(id)?;
        let mut client = self
            .clients
            .get_mut(id)
            .ok_or_else(|| DirectoryError::ClientNotFound(id.clone()))?;

        let checkpoint = client.account(number).map(Account::checkpoint);
        let entry = client.try_perform_transaction(number, transaction)?;
        let (Some(checkpoint), Some(account)) = (checkpoint, client.account_mut(number)) else {
            return Err(DirectoryError::AccountNotFound(number));
        };

        let committed = self
            .store
            .lock()
            .commit(&AccountRecord::from(&*account), &TransactionRecord::new(number, &entry));
        if let Err(e) = committed {
            error!(client = %id, account = %number, "transaction not saved, rolling back: {e}");
            account.rollback(checkpoint);
            return Err(e.into());
        }
        Ok(entry)
    }

    /// Every account of every registered client, ordered by number.
    pub fn accounts(&self) -> Result<Vec<AccountSummary>, DirectoryError> {
        let ids = self.store.lock().client_ids()?;
        let mut summaries = Vec::new();
        for id in &ids {
            summaries.extend(self.accounts_of(id)?);
        }
        summaries.sort_by_key(|summary| summary.number);
        Ok(summaries)
    }

    /// Accounts of one client, in the order they were opened.
    pub fn accounts_of(&self, id: &ClientId) -> Result<Vec<AccountSummary>, DirectoryError> {
        let client = self.client(id)?;
        Ok(client
            .accounts()
            .iter()
            .map(|account| AccountSummary::new(account, client.name()))
            .collect())
    }

    /// Statement of one account, optionally restricted to one kind.
    pub fn statement(
        &self,
        id: &ClientId,
        number: AccountNumber,
        kind: Option<TransactionKind>,
    ) -> Result<Statement, DirectoryError> {
        let client = self.client(id)?;
        let account = client
            .account(number)
            .ok_or(DirectoryError::AccountNotFound(number))?;
        Ok(Statement::new(account, client.name(), kind))
    }

    /// Statement of the current accounting period.
    pub fn daily_statement(
        &self,
        id: &ClientId,
        number: AccountNumber,
    ) -> Result<Statement, DirectoryError> {
        let client = self.client(id)?;
        let account = client
            .account(number)
            .ok_or(DirectoryError::AccountNotFound(number))?;
        Ok(Statement::for_day(account, client.name(), self.clock.today()))
    }
}

impl Directory<MemoryStore> {
    /// Directory backed by a fresh [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self::from_parts(MemoryStore::new(), SystemClock::shared(), 1)
    }
}

impl Default for Directory<MemoryStore> {
    fn default() -> Self {
        Self::in_memory()
    }
}
