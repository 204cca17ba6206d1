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

//! Statements and account listings built from accounts and their history.

use crate::account::Account;
use crate::base::AccountNumber;
use crate::history::HistoryEntry;
use crate::transaction::TransactionKind;
use chrono::NaiveDate;
use csv::Writer;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;

const BANNER_WIDTH: usize = 42;

/// Account statement: the selected history entries and the balance at the
/// time it was built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub agency: String,
    pub number: AccountNumber,
    pub holder: String,
    pub entries: Vec<HistoryEntry>,
    pub balance: Decimal,
}

impl Statement {
    /// Full statement, optionally restricted to one kind of transaction.
    pub fn new(account: &Account, holder: &str, kind: Option<TransactionKind>) -> Self {
        let entries = account
            .history()
            .entries(kind.map(|kind| kind.label()))
            .cloned()
            .collect();
        Self::with_entries(account, holder, entries)
    }

    /// Statement of the transactions stamped on `day`.
    pub fn for_day(account: &Account, holder: &str, day: NaiveDate) -> Self {
        let entries = account.history().entries_on(day).cloned().collect();
        Self::with_entries(account, holder, entries)
    }

    fn with_entries(account: &Account, holder: &str, entries: Vec<HistoryEntry>) -> Self {
        Self {
            agency: account.agency().to_owned(),
            number: account.number(),
            holder: holder.to_owned(),
            entries,
            balance: account.balance(),
        }
    }

    /// Sum of deposits minus sum of withdrawals among the listed entries,
    /// or `None` if that sum leaves the representable range.
    pub fn net_change(&self) -> Option<Decimal> {
        self.entries
            .iter()
            .try_fold(Decimal::ZERO, |total, entry| match entry.kind {
                TransactionKind::Deposit => total.checked_add(entry.amount),
                TransactionKind::Withdrawal => total.checked_sub(entry.amount),
            })
    }

    /// Writes the entries as `kind,amount,timestamp` rows with a header.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut wtr = Writer::from_writer(writer);
        for entry in &self.entries {
            wtr.serialize(entry)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:=^width$}", " STATEMENT ", width = BANNER_WIDTH)?;
        writeln!(
            f,
            "Agency: {}  Account: {}  Holder: {}",
            self.agency, self.number, self.holder
        )?;
        if self.entries.is_empty() {
            writeln!(f, "\nNo transactions were made on this account.")?;
        }
        for entry in &self.entries {
            writeln!(
                f,
                "\n{}:\t{}\n\t$ {:.2}",
                entry.kind,
                entry.timestamp.format("%d-%m-%Y %H:%M:%S"),
                entry.amount
            )?;
        }
        writeln!(f, "\nBalance:\n\t$ {:.2}", self.balance)?;
        write!(f, "{}", "=".repeat(BANNER_WIDTH))
    }
}

/// One row of an account listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub agency: String,
    pub number: AccountNumber,
    pub holder: String,
    pub kind: String,
    pub balance: Decimal,
}

impl AccountSummary {
    pub fn new(account: &Account, holder: &str) -> Self {
        Self {
            agency: account.agency().to_owned(),
            number: account.number(),
            holder: holder.to_owned(),
            kind: account.kind().label().to_owned(),
            balance: account.balance(),
        }
    }
}

impl fmt::Display for AccountSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Agency:\t\t{}", self.agency)?;
        writeln!(f, "Account:\t{} ({})", self.number, self.kind)?;
        writeln!(f, "Holder:\t\t{}", self.holder)?;
        write!(f, "Balance:\t$ {:.2}", self.balance)
    }
}

/// Writes summaries as CSV rows with a header.
pub fn write_summaries<W: Write>(summaries: &[AccountSummary], writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    for summary in summaries {
        wtr.serialize(summary)?;
    }
    wtr.flush()?;
    Ok(())
}
