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

use crate::account::Account;
use crate::error::TransactionError;
use crate::history::HistoryEntry;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
}

impl TransactionKind {
    /// Label used in history entries and statements.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Deposit => "Deposit",
            Self::Withdrawal => "Withdrawal",
        }
    }

    /// Case-insensitive match against a label.
    pub fn matches(&self, label: &str) -> bool {
        self.label().eq_ignore_ascii_case(label.trim())
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTransactionKind(pub String);

impl fmt::Display for UnknownTransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown transaction kind `{}`", self.0)
    }
}

impl std::error::Error for UnknownTransactionKind {}

impl FromStr for TransactionKind {
    type Err = UnknownTransactionKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "deposit" => Ok(Self::Deposit),
            "withdrawal" | "withdraw" => Ok(Self::Withdrawal),
            _ => Err(UnknownTransactionKind(s.to_owned())),
        }
    }
}

/// A request to move money into or out of one account.
///
/// Immutable once built. Applying it goes through [`Transaction::register`],
/// which is the only path that writes account history.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Transaction {
    Deposit { amount: Decimal },
    Withdrawal { amount: Decimal },
}

impl Transaction {
    pub fn deposit(amount: Decimal) -> Self {
        Self::Deposit { amount }
    }

    pub fn withdrawal(amount: Decimal) -> Self {
        Self::Withdrawal { amount }
    }

    pub fn new(kind: TransactionKind, amount: Decimal) -> Self {
        match kind {
            TransactionKind::Deposit => Self::deposit(amount),
            TransactionKind::Withdrawal => Self::withdrawal(amount),
        }
    }

    pub fn kind(&self) -> TransactionKind {
        match self {
            Self::Deposit { .. } => TransactionKind::Deposit,
            Self::Withdrawal { .. } => TransactionKind::Withdrawal,
        }
    }

    pub fn amount(&self) -> Decimal {
        match self {
            Self::Deposit { amount } | Self::Withdrawal { amount } => *amount,
        }
    }

    /// Applies the transaction to `account`.
    ///
    /// On success exactly one history entry is appended and a copy of it is
    /// returned. On failure the account and its history are unchanged.
    ///
    /// # Errors
    ///
    /// Whatever [`Account::deposit`] or [`Account::withdraw`] rejects.
    pub fn register(&self, account: &mut Account) -> Result<HistoryEntry, TransactionError> {
        match *self {
            Self::Deposit { amount } => account.deposit(amount)?,
            Self::Withdrawal { amount } => account.withdraw(amount)?,
        }
        Ok(account.record(self.kind(), self.amount()))
    }
}
