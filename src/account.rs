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

//! Account management.
//!
//! A single [`Account`] type covers both basic and checking accounts; the
//! [`AccountKind`] tag decides which withdrawal gates apply.
//!
//! Checking withdrawals are gated in this order:
//!
//! 1. amount above the per-operation limit → [`TransactionError::LimitExceeded`]
//! 2. period quota used up → [`TransactionError::WithdrawalQuotaExceeded`]
//! 3. base rule (positive amount, enough balance)
//!
//! Only a withdrawal that passes all three consumes quota.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use retail_ledger::{Account, AccountNumber, ClientId};
//!
//! let mut account = Account::checking(AccountNumber(1), ClientId::from("123"));
//! account.deposit(dec!(1000)).unwrap();
//! assert!(account.withdraw(dec!(600)).is_err());
//! assert_eq!(account.balance(), dec!(1000));
//! ```

use crate::base::{AccountNumber, ClientId, DEFAULT_AGENCY};
use crate::clock::{SharedClock, SystemClock};
use crate::error::TransactionError;
use crate::history::{History, HistoryEntry};
use crate::transaction::TransactionKind;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde::Deserialize;
use tracing::debug;

/// Withdrawal ceilings of a checking account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, Deserialize)]
pub struct WithdrawalPolicy {
    pub per_operation_limit: Decimal,
    pub max_withdrawals_per_period: u32,
}

impl WithdrawalPolicy {
    pub const DEFAULT_LIMIT: Decimal = Decimal::from_parts(500, 0, 0, false, 0);
    pub const DEFAULT_MAX_WITHDRAWALS: u32 = 3;
}

impl Default for WithdrawalPolicy {
    fn default() -> Self {
        Self {
            per_operation_limit: Self::DEFAULT_LIMIT,
            max_withdrawals_per_period: Self::DEFAULT_MAX_WITHDRAWALS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKind {
    /// Balance rules only.
    Basic,
    /// Balance rules plus per-operation and per-period withdrawal ceilings.
    Checking(WithdrawalPolicy),
}

impl AccountKind {
    pub fn checking() -> Self {
        Self::Checking(WithdrawalPolicy::default())
    }

    pub fn policy(&self) -> Option<WithdrawalPolicy> {
        match self {
            Self::Basic => None,
            Self::Checking(policy) => Some(*policy),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Checking(_) => "checking",
        }
    }
}

impl From<Option<WithdrawalPolicy>> for AccountKind {
    fn from(policy: Option<WithdrawalPolicy>) -> Self {
        policy.map_or(Self::Basic, Self::Checking)
    }
}

/// Withdrawals consumed in the accounting period `period`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct WithdrawalQuota {
    period: Option<NaiveDate>,
    used: u32,
}

impl WithdrawalQuota {
    fn used_on(&self, day: NaiveDate) -> u32 {
        if self.period == Some(day) { self.used } else { 0 }
    }

    fn consume(&mut self, day: NaiveDate) {
        if self.period != Some(day) {
            debug!(%day, "starting new withdrawal period");
            self.period = Some(day);
            self.used = 0;
        }
        self.used += 1;
    }
}

/// State needed to undo one applied transaction.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Checkpoint {
    balance: Decimal,
    quota: WithdrawalQuota,
    history_len: usize,
}

/// Ledger account.
#[derive(Debug)]
pub struct Account {
    number: AccountNumber,
    agency: String,
    owner: ClientId,
    kind: AccountKind,
    balance: Decimal,
    history: History,
    quota: WithdrawalQuota,
    clock: SharedClock,
}

impl Account {
    const DECIMAL_PRECISION: u32 = 2;

    pub fn new(number: AccountNumber, owner: ClientId, kind: AccountKind) -> Self {
        Self::with_clock(number, owner, kind, SystemClock::shared())
    }

    pub fn basic(number: AccountNumber, owner: ClientId) -> Self {
        Self::new(number, owner, AccountKind::Basic)
    }

    /// Checking account with the default 500 / 3 per day policy.
    pub fn checking(number: AccountNumber, owner: ClientId) -> Self {
        Self::new(number, owner, AccountKind::checking())
    }

    pub fn with_clock(
        number: AccountNumber,
        owner: ClientId,
        kind: AccountKind,
        clock: SharedClock,
    ) -> Self {
        Self {
            number,
            agency: DEFAULT_AGENCY.to_owned(),
            owner,
            kind,
            balance: Decimal::ZERO,
            history: History::new(clock.clone()),
            quota: WithdrawalQuota::default(),
            clock,
        }
    }

    /// Rebuilds an account from persisted state.
    ///
    /// The withdrawal counter is derived once from today's history; from
    /// then on it is maintained incrementally.
    pub(crate) fn restore(
        number: AccountNumber,
        agency: String,
        owner: ClientId,
        kind: AccountKind,
        balance: Decimal,
        entries: Vec<HistoryEntry>,
        clock: SharedClock,
    ) -> Self {
        let history = History::from_entries(clock.clone(), entries);
        let today = clock.today();
        let used = history
            .entries_on(today)
            .filter(|entry| entry.kind == TransactionKind::Withdrawal)
            .count();
        Self {
            number,
            agency,
            owner,
            kind,
            balance,
            history,
            quota: WithdrawalQuota {
                period: Some(today),
                used: u32::try_from(used).unwrap_or(u32::MAX),
            },
            clock,
        }
    }

    pub fn number(&self) -> AccountNumber {
        self.number
    }

    pub fn agency(&self) -> &str {
        &self.agency
    }

    pub fn owner(&self) -> &ClientId {
        &self.owner
    }

    pub fn kind(&self) -> AccountKind {
        self.kind
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Withdrawals still allowed today; `None` for accounts without a quota.
    pub fn withdrawals_remaining(&self) -> Option<u32> {
        let policy = self.kind.policy()?;
        let used = self.quota.used_on(self.clock.today());
        Some(policy.max_withdrawals_per_period.saturating_sub(used))
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.balance >= Decimal::ZERO,
            "Invariant violated: balance went negative: {}",
            self.balance
        );
    }

    /// Increases the balance.
    ///
    /// Does not touch history; see [`crate::Transaction::register`].
    pub fn deposit(&mut self, amount: Decimal) -> Result<(), TransactionError> {
        if amount <= Decimal::ZERO {
            return Err(TransactionError::InvalidAmount);
        }
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(TransactionError::BalanceOverflow)?;
        self.assert_invariants();
        Ok(())
    }

    /// Decreases the balance, applying the checking gates first when the
    /// account has a policy.
    pub fn withdraw(&mut self, amount: Decimal) -> Result<(), TransactionError> {
        let AccountKind::Checking(policy) = self.kind else {
            return self.debit(amount);
        };

        if amount > policy.per_operation_limit {
            return Err(TransactionError::LimitExceeded {
                limit: policy.per_operation_limit,
            });
        }
        let today = self.clock.today();
        if self.quota.used_on(today) >= policy.max_withdrawals_per_period {
            return Err(TransactionError::WithdrawalQuotaExceeded {
                max: policy.max_withdrawals_per_period,
            });
        }
        self.debit(amount)?;
        self.quota.consume(today);
        Ok(())
    }

    /// Base withdrawal rule shared by every kind.
    fn debit(&mut self, amount: Decimal) -> Result<(), TransactionError> {
        if amount <= Decimal::ZERO {
            return Err(TransactionError::InvalidAmount);
        }
        if amount > self.balance {
            return Err(TransactionError::InsufficientFunds);
        }
        self.balance -= amount;
        self.assert_invariants();
        Ok(())
    }

    pub(crate) fn record(&mut self, kind: TransactionKind, amount: Decimal) -> HistoryEntry {
        self.history.add_entry(kind, amount).clone()
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            balance: self.balance,
            quota: self.quota,
            history_len: self.history.len(),
        }
    }

    /// Undoes everything applied since `checkpoint` was taken. Only for
    /// operations that could not be persisted.
    pub(crate) fn rollback(&mut self, checkpoint: Checkpoint) {
        debug!(account = %self.number, "rolling back unsaved transaction");
        self.balance = checkpoint.balance;
        self.quota = checkpoint.quota;
        self.history.truncate(checkpoint.history_len);
    }
}

impl Serialize for Account {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Account", 5)?;
        state.serialize_field("agency", &self.agency)?;
        state.serialize_field("number", &self.number)?;
        state.serialize_field("owner", &self.owner)?;
        state.serialize_field("kind", self.kind.label())?;
        state.serialize_field(
            "balance",
            &self.balance.round_dp(Account::DECIMAL_PRECISION),
        )?;
        state.end()
    }
}
