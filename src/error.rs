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

//! Error types for transaction processing and client lookup.

use crate::base::{AccountNumber, ClientId};
use crate::store::StoreError;
use rust_decimal::Decimal;
use thiserror::Error;

/// Transaction processing errors.
///
/// Every variant is recoverable: the operation that produced it left the
/// account untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    /// Amount is zero or negative
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// Withdrawal would exceed the balance
    #[error("insufficient funds")]
    InsufficientFunds,

    /// Withdrawal exceeds the per-operation ceiling of a checking account
    #[error("withdrawal exceeds the per-operation limit of {limit}")]
    LimitExceeded { limit: Decimal },

    /// The accounting period's withdrawal count has been used up
    #[error("withdrawal count exceeded ({max} per day)")]
    WithdrawalQuotaExceeded { max: u32 },

    /// Balance arithmetic left the representable range
    #[error("balance overflow")]
    BalanceOverflow,

    /// Client does not own an account with this number
    #[error("account {0} not found")]
    AccountNotFound(AccountNumber),
}

impl TransactionError {
    /// Business-rule rejections, as opposed to failures nobody should hit.
    pub fn is_rule_violation(&self) -> bool {
        !matches!(self, TransactionError::BalanceOverflow)
    }
}

/// Directory-level errors: lookups, registration and persistence.
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("client {0} not found")]
    ClientNotFound(ClientId),

    #[error("account {0} not found")]
    AccountNotFound(AccountNumber),

    #[error("client {0} is already registered")]
    DuplicateClient(ClientId),

    #[error("client identifier must not be empty")]
    InvalidClientId,

    #[error("no account numbers left")]
    AccountNumbersExhausted,

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
