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

//! # Retail Ledger
//!
//! This library models a retail banking ledger: clients own accounts,
//! accounts accept deposits and withdrawals under configurable limits, and
//! every accepted operation lands in an append-only history.
//!
//! ## Core Components
//!
//! - [`Account`]: Balance holder; checking accounts add a per-operation
//!   ceiling and a daily withdrawal count
//! - [`Transaction`]: Deposit or withdrawal request applied to one account
//! - [`History`]: Ordered record of applied transactions
//! - [`Client`]: Owner of accounts, performs transactions on them
//! - [`Directory`]: Client lookup backed by a [`Store`]
//! - [`TransactionError`]: Why an operation was rejected
//!
//! ## Example
//!
//! ```
//! use chrono::NaiveDate;
//! use retail_ledger::{ClientId, ClientProfile, Directory, Transaction};
//! use rust_decimal_macros::dec;
//!
//! let directory = Directory::in_memory();
//! let id = ClientId::from("12345678900");
//! directory
//!     .register_client(ClientProfile {
//!         id: id.clone(),
//!         name: "Ana".into(),
//!         birth_date: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
//!         address: "Rua A, 1".into(),
//!     })
//!     .unwrap();
//! let number = directory.open_checking_account(&id).unwrap();
//!
//! directory.perform(&id, number, &Transaction::deposit(dec!(1000))).unwrap();
//! directory.perform(&id, number, &Transaction::withdrawal(dec!(400))).unwrap();
//!
//! // Above the 500 per-operation limit.
//! assert!(directory.perform(&id, number, &Transaction::withdrawal(dec!(600))).is_err());
//!
//! let client = directory.client(&id).unwrap();
//! assert_eq!(client.account(number).unwrap().balance(), dec!(600));
//! ```
//!
//! ## Concurrency
//!
//! Operations are synchronous and run to completion. A [`Directory`] may be
//! shared between threads; it serializes operations per client.

pub mod account;
mod base;
mod client;
pub mod clock;
mod directory;
pub mod error;
mod history;
pub mod report;
pub mod store;
mod transaction;

pub use account::{Account, AccountKind, WithdrawalPolicy};
pub use base::{AccountNumber, ClientId, DEFAULT_AGENCY};
pub use client::{Client, ClientProfile};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use directory::Directory;
pub use error::{DirectoryError, TransactionError};
pub use history::{History, HistoryEntry};
pub use report::{AccountSummary, Statement};
pub use store::{MemoryStore, SqliteStore, Store, StoreError};
pub use transaction::{Transaction, TransactionKind, UnknownTransactionKind};
