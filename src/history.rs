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

//! Append-only record of the transactions applied to one account.
//!
//! Insertion order is the statement order. Entries are never edited, and
//! the only removal is the crate-internal undo of an entry that could not be
//! persisted. Every query hands out a fresh iterator over the same entries.

use crate::clock::SharedClock;
use crate::transaction::TransactionKind;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug)]
pub struct History {
    entries: Vec<HistoryEntry>,
    clock: SharedClock,
}

impl History {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            entries: Vec::new(),
            clock,
        }
    }

    /// Rebuilds a history from previously recorded entries, kept in the
    /// order given.
    pub fn from_entries(clock: SharedClock, entries: Vec<HistoryEntry>) -> Self {
        Self { entries, clock }
    }

    /// Appends an entry stamped with the current time.
    pub fn add_entry(&mut self, kind: TransactionKind, amount: Decimal) -> &HistoryEntry {
        let timestamp = self.clock.now();
        let index = self.entries.len();
        self.entries.push(HistoryEntry {
            kind,
            amount,
            timestamp,
        });
        &self.entries[index]
    }

    /// Entries in insertion order, optionally restricted to one kind label
    /// (`"deposit"`, `"Withdrawal"`, ...).
    pub fn entries<'a>(
        &'a self,
        filter_kind: Option<&'a str>,
    ) -> impl Iterator<Item = &'a HistoryEntry> + 'a {
        self.entries
            .iter()
            .filter(move |entry| filter_kind.is_none_or(|label| entry.kind.matches(label)))
    }

    pub fn entries_of(&self, kind: TransactionKind) -> impl Iterator<Item = &HistoryEntry> + '_ {
        self.entries.iter().filter(move |entry| entry.kind == kind)
    }

    /// Entries stamped on the given calendar day.
    pub fn entries_on(&self, day: NaiveDate) -> impl Iterator<Item = &HistoryEntry> + '_ {
        self.entries
            .iter()
            .filter(move |entry| entry.timestamp.date() == day)
    }

    /// Entries of the current accounting period.
    pub fn current_period(&self) -> impl Iterator<Item = &HistoryEntry> + '_ {
        self.entries_on(self.clock.today())
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
