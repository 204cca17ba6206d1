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

//! Directory public API integration tests.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use retail_ledger::store::{AccountRecord, TransactionRecord};
use retail_ledger::{
    AccountKind, AccountNumber, ClientId, ClientProfile, Directory, DirectoryError, ManualClock,
    MemoryStore, SqliteStore, Store, StoreError, Transaction, TransactionError, TransactionKind,
    WithdrawalPolicy,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

fn profile(id: &str, name: &str) -> ClientProfile {
    ClientProfile {
        id: ClientId::from(id),
        name: name.into(),
        birth_date: NaiveDate::from_ymd_opt(1988, 8, 8).unwrap(),
        address: "Avenida Central, 100".into(),
    }
}

fn morning() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 10, 1)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
}

fn directory_with_client<S: Store>(store: S) -> (Directory<S>, ClientId, AccountNumber) {
    let directory = Directory::new(store).unwrap();
    let id = ClientId::from("111");
    directory.register_client(profile("111", "Ana")).unwrap();
    let number = directory.open_checking_account(&id).unwrap();
    (directory, id, number)
}

// === Registration ===

#[test]
fn register_and_look_up_client() {
    let directory = Directory::in_memory();
    directory.register_client(profile("111", "Ana")).unwrap();

    let client = directory.client(&ClientId::from("111")).unwrap();
    assert_eq!(client.name(), "Ana");
    assert!(client.accounts().is_empty());
}

#[test]
fn duplicate_client_is_rejected() {
    let directory = Directory::in_memory();
    directory.register_client(profile("111", "Ana")).unwrap();

    let result = directory.register_client(profile("111", "Someone Else"));
    assert!(matches!(result, Err(DirectoryError::DuplicateClient(id)) if id.as_str() == "111"));
    assert_eq!(directory.client(&ClientId::from("111")).unwrap().name(), "Ana");
}

#[test]
fn duplicate_client_is_rejected_across_sessions() {
    let directory = Directory::in_memory();
    directory.register_client(profile("111", "Ana")).unwrap();

    let reopened = Directory::new(directory.into_store()).unwrap();
    assert!(matches!(
        reopened.register_client(profile("111", "Ana")),
        Err(DirectoryError::DuplicateClient(_))
    ));
}

#[test]
fn unknown_client_is_not_found() {
    let directory = Directory::in_memory();
    let id = ClientId::from("404");
    assert!(matches!(directory.client(&id), Err(DirectoryError::ClientNotFound(_))));
    assert!(matches!(
        directory.open_checking_account(&id),
        Err(DirectoryError::ClientNotFound(_))
    ));
    assert!(matches!(
        directory.perform(&id, AccountNumber(1), &Transaction::deposit(dec!(1))),
        Err(DirectoryError::ClientNotFound(_))
    ));
}

// === Accounts ===

#[test]
fn account_numbers_are_sequential_across_clients() {
    let directory = Directory::in_memory();
    directory.register_client(profile("111", "Ana")).unwrap();
    directory.register_client(profile("222", "Bo")).unwrap();

    let first = directory.open_checking_account(&ClientId::from("111")).unwrap();
    let second = directory
        .open_account(&ClientId::from("222"), AccountKind::Basic)
        .unwrap();
    let third = directory.open_checking_account(&ClientId::from("111")).unwrap();

    assert_eq!((first, second, third), (AccountNumber(1), AccountNumber(2), AccountNumber(3)));
}

#[test]
fn accounts_are_enumerated_by_number() {
    let directory = Directory::in_memory();
    directory.register_client(profile("222", "Bo")).unwrap();
    directory.register_client(profile("111", "Ana")).unwrap();
    directory.open_checking_account(&ClientId::from("222")).unwrap();
    directory.open_checking_account(&ClientId::from("111")).unwrap();
    directory.open_account(&ClientId::from("222"), AccountKind::Basic).unwrap();

    let listing: Vec<_> = directory
        .accounts()
        .unwrap()
        .into_iter()
        .map(|s| (s.number.0, s.holder, s.kind))
        .collect();
    assert_eq!(
        listing,
        vec![
            (1, "Bo".to_string(), "checking".to_string()),
            (2, "Ana".to_string(), "checking".to_string()),
            (3, "Bo".to_string(), "basic".to_string()),
        ]
    );

    assert_eq!(directory.accounts_of(&ClientId::from("111")).unwrap().len(), 1);
}

#[test]
fn directory_policy_applies_to_new_checking_accounts() {
    let policy = WithdrawalPolicy {
        per_operation_limit: dec!(100),
        max_withdrawals_per_period: 2,
    };
    let directory = Directory::in_memory().with_policy(policy);
    let id = ClientId::from("111");
    directory.register_client(profile("111", "Ana")).unwrap();
    let number = directory.open_checking_account(&id).unwrap();

    let client = directory.client(&id).unwrap();
    assert_eq!(
        client.account(number).unwrap().kind(),
        AccountKind::Checking(policy)
    );
}

// === Transactions ===

#[test]
fn perform_updates_balance_and_history() {
    let (directory, id, number) = directory_with_client(MemoryStore::new());

    let entry = directory
        .perform(&id, number, &Transaction::deposit(dec!(250)))
        .unwrap();
    assert_eq!(entry.kind, TransactionKind::Deposit);

    let client = directory.client(&id).unwrap();
    let account = client.account(number).unwrap();
    assert_eq!(account.balance(), dec!(250));
    assert_eq!(account.history().len(), 1);
}

#[test]
fn perform_reports_rule_violations() {
    let (directory, id, number) = directory_with_client(MemoryStore::new());
    directory
        .perform(&id, number, &Transaction::deposit(dec!(1000)))
        .unwrap();

    let result = directory.perform(&id, number, &Transaction::withdrawal(dec!(600)));
    assert!(matches!(
        result,
        Err(DirectoryError::Transaction(TransactionError::LimitExceeded { .. }))
    ));

    let result = directory.perform(&id, AccountNumber(99), &Transaction::deposit(dec!(1)));
    assert!(matches!(
        result,
        Err(DirectoryError::Transaction(TransactionError::AccountNotFound(AccountNumber(99))))
    ));
}

#[test]
fn clients_only_reach_their_own_accounts() {
    let (directory, _, number) = directory_with_client(MemoryStore::new());
    directory.register_client(profile("222", "Bo")).unwrap();

    let result = directory.perform(&ClientId::from("222"), number, &Transaction::deposit(dec!(5)));
    assert!(matches!(
        result,
        Err(DirectoryError::Transaction(TransactionError::AccountNotFound(_)))
    ));
}

// === Persistence ===

#[test]
fn state_survives_reopening_memory_store() {
    let (directory, id, number) = directory_with_client(MemoryStore::new());
    directory
        .perform(&id, number, &Transaction::deposit(dec!(300)))
        .unwrap();
    directory
        .perform(&id, number, &Transaction::withdrawal(dec!(120)))
        .unwrap();

    let store = directory.into_store();
    assert_eq!(store.transaction_count(), 2);

    let reopened = Directory::new(store).unwrap();
    let client = reopened.client(&id).unwrap();
    let account = client.account(number).unwrap();
    assert_eq!(account.balance(), dec!(180));
    assert_eq!(account.history().len(), 2);
    assert_eq!(account.kind(), AccountKind::checking());
}

#[test]
fn state_survives_reopening_sqlite_store() {
    let (directory, id, number) = directory_with_client(SqliteStore::open_in_memory().unwrap());
    directory
        .perform(&id, number, &Transaction::deposit(dec!(99.95)))
        .unwrap();

    let reopened = Directory::new(directory.into_store()).unwrap();
    let statement = reopened.statement(&id, number, None).unwrap();
    assert_eq!(statement.balance, dec!(99.95));
    assert_eq!(statement.entries.len(), 1);
    assert_eq!(statement.holder, "Ana");

    assert_eq!(
        reopened.open_checking_account(&id).unwrap(),
        AccountNumber(2)
    );
}

#[test]
fn withdrawal_quota_survives_reopening_on_the_same_day() {
    let clock = Arc::new(ManualClock::new(morning()));
    let directory = Directory::with_clock(MemoryStore::new(), clock.clone()).unwrap();
    let id = ClientId::from("111");
    directory.register_client(profile("111", "Ana")).unwrap();
    let number = directory.open_checking_account(&id).unwrap();
    directory
        .perform(&id, number, &Transaction::deposit(dec!(1000)))
        .unwrap();
    for _ in 0..3 {
        directory
            .perform(&id, number, &Transaction::withdrawal(dec!(10)))
            .unwrap();
    }

    let reopened = Directory::with_clock(directory.into_store(), clock.clone()).unwrap();
    assert!(matches!(
        reopened.perform(&id, number, &Transaction::withdrawal(dec!(10))),
        Err(DirectoryError::Transaction(TransactionError::WithdrawalQuotaExceeded { max: 3 }))
    ));

    clock.advance(TimeDelta::days(1));
    reopened
        .perform(&id, number, &Transaction::withdrawal(dec!(10)))
        .unwrap();
}

#[test]
fn daily_statement_uses_directory_clock() {
    let clock = Arc::new(ManualClock::new(morning()));
    let directory = Directory::with_clock(MemoryStore::new(), clock.clone()).unwrap();
    let id = ClientId::from("111");
    directory.register_client(profile("111", "Ana")).unwrap();
    let number = directory.open_checking_account(&id).unwrap();

    directory
        .perform(&id, number, &Transaction::deposit(dec!(100)))
        .unwrap();
    clock.advance(TimeDelta::days(1));
    directory
        .perform(&id, number, &Transaction::withdrawal(dec!(25)))
        .unwrap();

    let today = directory.daily_statement(&id, number).unwrap();
    assert_eq!(today.entries.len(), 1);
    assert_eq!(today.entries[0].kind, TransactionKind::Withdrawal);

    let deposits = directory
        .statement(&id, number, Some(TransactionKind::Deposit))
        .unwrap();
    assert_eq!(deposits.entries.len(), 1);
    assert_eq!(deposits.balance, dec!(75));

    assert!(matches!(
        directory.statement(&id, AccountNumber(42), None),
        Err(DirectoryError::AccountNotFound(AccountNumber(42)))
    ));
}

/// Memory store whose commits fail while `full` is set, like a full disk.
#[derive(Debug)]
struct FullDiskStore {
    inner: MemoryStore,
    full: Arc<AtomicBool>,
}

impl Store for FullDiskStore {
    fn load_client(&mut self, id: &ClientId) -> Result<Option<ClientProfile>, StoreError> {
        self.inner.load_client(id)
    }

    fn insert_client(&mut self, profile: &ClientProfile) -> Result<(), StoreError> {
        self.inner.insert_client(profile)
    }

    fn client_ids(&mut self) -> Result<Vec<ClientId>, StoreError> {
        self.inner.client_ids()
    }

    fn load_accounts(&mut self, owner: &ClientId) -> Result<Vec<AccountRecord>, StoreError> {
        self.inner.load_accounts(owner)
    }

    fn save_account(&mut self, record: &AccountRecord) -> Result<(), StoreError> {
        self.inner.save_account(record)
    }

    fn last_account_number(&mut self) -> Result<Option<AccountNumber>, StoreError> {
        self.inner.last_account_number()
    }

    fn load_transactions(
        &mut self,
        account: AccountNumber,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        self.inner.load_transactions(account)
    }

    fn append_transaction(&mut self, record: &TransactionRecord) -> Result<(), StoreError> {
        self.inner.append_transaction(record)
    }

    fn commit(
        &mut self,
        account: &AccountRecord,
        transaction: &TransactionRecord,
    ) -> Result<(), StoreError> {
        if self.full.load(Ordering::SeqCst) {
            return Err(StoreError::Sqlite(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_FULL),
                Some("database or disk is full".into()),
            )));
        }
        self.inner.commit(account, transaction)
    }
}

fn balance_and_history<S: Store>(
    directory: &Directory<S>,
    id: &ClientId,
    number: AccountNumber,
) -> (Decimal, usize, Option<u32>) {
    let client = directory.client(id).unwrap();
    let account = client.account(number).unwrap();
    (
        account.balance(),
        account.history().len(),
        account.withdrawals_remaining(),
    )
}

#[test]
fn unsaved_transactions_are_rolled_back() {
    let clock = Arc::new(ManualClock::new(morning()));
    let full = Arc::new(AtomicBool::new(false));
    let store = FullDiskStore {
        inner: MemoryStore::new(),
        full: full.clone(),
    };
    let (directory, id, number) = {
        let directory = Directory::with_clock(store, clock.clone()).unwrap();
        let id = ClientId::from("111");
        directory.register_client(profile("111", "Ana")).unwrap();
        let number = directory.open_checking_account(&id).unwrap();
        (directory, id, number)
    };
    directory
        .perform(&id, number, &Transaction::deposit(dec!(1000)))
        .unwrap();
    directory
        .perform(&id, number, &Transaction::withdrawal(dec!(100)))
        .unwrap();

    full.store(true, Ordering::SeqCst);
    for tx in [
        Transaction::deposit(dec!(100)),
        Transaction::withdrawal(dec!(100)),
    ] {
        assert!(matches!(
            directory.perform(&id, number, &tx),
            Err(DirectoryError::Store(StoreError::Sqlite(_)))
        ));
    }
    assert_eq!(
        balance_and_history(&directory, &id, number),
        (dec!(900), 2, Some(2))
    );

    // The failed withdrawal did not use up quota.
    full.store(false, Ordering::SeqCst);
    for _ in 0..2 {
        directory
            .perform(&id, number, &Transaction::withdrawal(dec!(100)))
            .unwrap();
    }
    assert!(matches!(
        directory.perform(&id, number, &Transaction::withdrawal(dec!(100))),
        Err(DirectoryError::Transaction(TransactionError::WithdrawalQuotaExceeded { max: 3 }))
    ));

    let reopened = Directory::with_clock(directory.into_store().inner, clock).unwrap();
    assert_eq!(
        balance_and_history(&reopened, &id, number),
        (dec!(700), 4, Some(0))
    );
}

// === Shared use ===

#[test]
fn concurrent_deposits_on_one_client_are_serialized() {
    let (directory, id, number) = directory_with_client(MemoryStore::new());

    thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..25 {
                    directory
                        .perform(&id, number, &Transaction::deposit(dec!(1)))
                        .unwrap();
                }
            });
        }
    });

    let client = directory.client(&id).unwrap();
    let account = client.account(number).unwrap();
    assert_eq!(account.balance(), dec!(200));
    assert_eq!(account.history().len(), 200);
}
