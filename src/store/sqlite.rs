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

use super::{AccountRecord, Store, StoreError, TransactionRecord};
use crate::account::WithdrawalPolicy;
use crate::base::{AccountNumber, ClientId};
use crate::client::ClientProfile;
use crate::transaction::TransactionKind;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS clients (
    cpf TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    birth_date TEXT NOT NULL,
    address TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS accounts (
    number INTEGER PRIMARY KEY,
    agency TEXT NOT NULL,
    balance TEXT NOT NULL,
    client_cpf TEXT NOT NULL REFERENCES clients (cpf),
    limit_value TEXT,
    withdraw_limit INTEGER
);
CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_number INTEGER NOT NULL REFERENCES accounts (number),
    kind TEXT NOT NULL,
    amount TEXT NOT NULL,
    timestamp TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS transactions_by_account ON transactions (account_number, id);
";

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// SQLite-backed store. Decimals are kept as text so no precision is lost.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (creating if needed) the database file and its tables.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::setup(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::setup(Connection::open_in_memory()?)
    }

    fn setup(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }
}

fn corrupt(field: &'static str, value: &str) -> StoreError {
    StoreError::Corrupt {
        field,
        value: value.to_owned(),
    }
}

fn parse_decimal(field: &'static str, value: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str(value).map_err(|_| corrupt(field, value))
}

fn parse_date(value: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| corrupt("birth_date", value))
}

fn parse_timestamp(value: &str) -> Result<NaiveDateTime, StoreError> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).map_err(|_| corrupt("timestamp", value))
}

impl Store for SqliteStore {
    fn load_client(&mut self, id: &ClientId) -> Result<Option<ClientProfile>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT cpf, name, birth_date, address FROM clients WHERE cpf = ?1",
                params![id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(cpf, name, birth_date, address)| -> Result<_, StoreError> {
            Ok(ClientProfile {
                id: ClientId(cpf),
                name,
                birth_date: parse_date(&birth_date)?,
                address,
            })
        })
        .transpose()
    }

    fn insert_client(&mut self, profile: &ClientProfile) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO clients (cpf, name, birth_date, address) VALUES (?1, ?2, ?3, ?4)",
            params![
                profile.id.as_str(),
                profile.name,
                profile.birth_date.format(DATE_FORMAT).to_string(),
                profile.address,
            ],
        )?;
        Ok(())
    }

    fn client_ids(&mut self) -> Result<Vec<ClientId>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT cpf FROM clients ORDER BY cpf")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .map(|id| id.map(ClientId))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn load_accounts(&mut self, owner: &ClientId) -> Result<Vec<AccountRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT number, agency, balance, limit_value, withdraw_limit
             FROM accounts WHERE client_cpf = ?1 ORDER BY number",
        )?;
        let rows = stmt
            .query_map(params![owner.as_str()], |row| {
                Ok((
                    row.get::<_, u32>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<u32>>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(number, agency, balance, limit, max_withdrawals)| -> Result<_, StoreError> {
                let policy = match (limit, max_withdrawals) {
                    (Some(limit), Some(max)) => Some(WithdrawalPolicy {
                        per_operation_limit: parse_decimal("limit_value", &limit)?,
                        max_withdrawals_per_period: max,
                    }),
                    _ => None,
                };
                Ok(AccountRecord {
                    number: AccountNumber(number),
                    agency,
                    owner: owner.clone(),
                    balance: parse_decimal("balance", &balance)?,
                    policy,
                })
            })
            .collect()
    }

    fn save_account(&mut self, record: &AccountRecord) -> Result<(), StoreError> {
        save_account(&self.conn, record)
    }

    fn last_account_number(&mut self) -> Result<Option<AccountNumber>, StoreError> {
        let last: Option<u32> =
            self.conn
                .query_row("SELECT MAX(number) FROM accounts", [], |row| row.get(0))?;
        Ok(last.map(AccountNumber))
    }

    fn load_transactions(
        &mut self,
        account: AccountNumber,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT kind, amount, timestamp FROM transactions
             WHERE account_number = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![account.0], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(kind, amount, timestamp)| -> Result<_, StoreError> {
                Ok(TransactionRecord {
                    account,
                    kind: kind
                        .parse::<TransactionKind>()
                        .map_err(|_| corrupt("kind", &kind))?,
                    amount: parse_decimal("amount", &amount)?,
                    timestamp: parse_timestamp(&timestamp)?,
                })
            })
            .collect()
    }

    fn append_transaction(&mut self, record: &TransactionRecord) -> Result<(), StoreError> {
        append_transaction(&self.conn, record)
    }

    fn commit(
        &mut self,
        account: &AccountRecord,
        transaction: &TransactionRecord,
    ) -> Result<(), StoreError> {
        // Dropping `tx` before `commit` rolls both writes back.
        let tx = self.conn.transaction()?;
        save_account(&tx, account)?;
        append_transaction(&tx, transaction)?;
        tx.commit()?;
        Ok(())
    }
}

/// Upsert that only ever updates a row of the same owner.
fn save_account(conn: &Connection, record: &AccountRecord) -> Result<(), StoreError> {
    let limit = record
        .policy
        .map(|policy| policy.per_operation_limit.to_string());
    let max_withdrawals = record.policy.map(|policy| policy.max_withdrawals_per_period);
    let changed = conn.execute(
        "INSERT INTO accounts (number, agency, balance, client_cpf, limit_value, withdraw_limit)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (number) DO UPDATE SET
            balance = excluded.balance,
            limit_value = excluded.limit_value,
            withdraw_limit = excluded.withdraw_limit
         WHERE accounts.client_cpf = excluded.client_cpf",
        params![
            record.number.0,
            record.agency,
            record.balance.to_string(),
            record.owner.as_str(),
            limit,
            max_withdrawals,
        ],
    )?;
    if changed == 0 {
        return Err(StoreError::ForeignAccount {
            number: record.number,
        });
    }
    Ok(())
}

fn append_transaction(conn: &Connection, record: &TransactionRecord) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO transactions (account_number, kind, amount, timestamp)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            record.account.0,
            record.kind.label(),
            record.amount.to_string(),
            record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}
