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

use anyhow::{Context, anyhow, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use csv::{Position, ReaderBuilder, Trim};
use retail_ledger::report::write_summaries;
use retail_ledger::{
    AccountKind, AccountNumber, ClientId, ClientProfile, Directory, SqliteStore, Store,
    Transaction, TransactionKind, WithdrawalPolicy,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "retail-ledger")]
#[command(about = "Clients, checking accounts and statements over a SQLite ledger", long_about = None)]
struct Args {
    /// SQLite database file
    #[arg(long, env = "LEDGER_DB", default_value = "banking.db", value_name = "PATH")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a new client
    RegisterClient {
        /// Tax/identity number
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        /// Birth date as YYYY-MM-DD
        #[arg(long)]
        birth_date: NaiveDate,
        #[arg(long)]
        address: String,
    },
    /// Open an account for an existing client
    OpenAccount {
        #[arg(long)]
        client: String,
        #[arg(long, value_enum, default_value_t = Kind::Checking)]
        kind: Kind,
        /// Per-operation withdrawal ceiling
        #[arg(long, default_value_t = WithdrawalPolicy::DEFAULT_LIMIT)]
        limit: Decimal,
        /// Withdrawals allowed per day
        #[arg(long, default_value_t = WithdrawalPolicy::DEFAULT_MAX_WITHDRAWALS)]
        max_withdrawals: u32,
    },
    /// Deposit into an account
    Deposit(Operation),
    /// Withdraw from an account
    Withdraw(Operation),
    /// Print an account statement
    Statement {
        #[command(flatten)]
        target: Target,
        /// Only show one kind of transaction
        #[arg(long, conflicts_with = "today")]
        kind: Option<TransactionKind>,
        /// Only show today's transactions
        #[arg(long)]
        today: bool,
        /// Emit CSV instead of text
        #[arg(long)]
        csv: bool,
    },
    /// List accounts
    Accounts {
        /// Restrict the listing to one client
        #[arg(long)]
        client: Option<String>,
        #[arg(long)]
        csv: bool,
    },
    /// Apply operations from a CSV file (type,client,account,amount)
    Batch {
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct Target {
    #[arg(long)]
    client: String,
    /// Account number; may be omitted when the client has a single account
    #[arg(long)]
    account: Option<u32>,
}

#[derive(clap::Args, Debug)]
struct Operation {
    #[command(flatten)]
    target: Target,
    amount: Decimal,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Kind {
    Basic,
    Checking,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    setup_tracing();

    let store = SqliteStore::open(&args.db)
        .with_context(|| format!("Can't open database `{}`", args.db.display()))?;
    let directory = Directory::new(store)?;
    let mut output = std::io::stdout().lock();
    run(&directory, args.command, &mut output)
}

fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

fn run<S: Store, W: Write>(
    directory: &Directory<S>,
    command: Command,
    output: &mut W,
) -> anyhow::Result<()> {
    match command {
        Command::RegisterClient {
            id,
            name,
            birth_date,
            address,
        } => {
            directory.register_client(ClientProfile {
                id: ClientId::new(id),
                name: name.clone(),
                birth_date,
                address,
            })?;
            writeln!(output, "Client {name} registered.")?;
        }
        Command::OpenAccount {
            client,
            kind,
            limit,
            max_withdrawals,
        } => {
            let kind = match kind {
                Kind::Basic => AccountKind::Basic,
                Kind::Checking => AccountKind::Checking(WithdrawalPolicy {
                    per_operation_limit: limit,
                    max_withdrawals_per_period: max_withdrawals,
                }),
            };
            let number = directory.open_account(&ClientId::new(client), kind)?;
            writeln!(output, "Account {number} opened.")?;
        }
        Command::Deposit(operation) => {
            perform(directory, operation, Transaction::deposit, output)?;
        }
        Command::Withdraw(operation) => {
            perform(directory, operation, Transaction::withdrawal, output)?;
        }
        Command::Statement {
            target,
            kind,
            today,
            csv,
        } => {
            let (client, number) = resolve(directory, &target)?;
            let statement = if today {
                directory.daily_statement(&client, number)?
            } else {
                directory.statement(&client, number, kind)?
            };
            if csv {
                statement.write_csv(&mut *output)?;
            } else {
                writeln!(output, "{statement}")?;
            }
        }
        Command::Accounts { client, csv } => {
            let summaries = match client {
                Some(client) => directory.accounts_of(&ClientId::new(client))?,
                None => directory.accounts()?,
            };
            if csv {
                write_summaries(&summaries, &mut *output)?;
            } else if summaries.is_empty() {
                writeln!(output, "No accounts.")?;
            } else {
                for summary in &summaries {
                    writeln!(output, "{summary}\n")?;
                }
            }
        }
        Command::Batch { input } => {
            let file = File::open(&input)
                .with_context(|| format!("Can't open input file `{}`", input.display()))?;
            let report = process_batch(directory, BufReader::new(file))?;
            writeln!(
                output,
                "{} operations applied, {} skipped.",
                report.applied,
                report.skipped.len()
            )?;
        }
    }
    Ok(())
}

fn perform<S: Store, W: Write>(
    directory: &Directory<S>,
    operation: Operation,
    build: fn(Decimal) -> Transaction,
    output: &mut W,
) -> anyhow::Result<()> {
    let (client, number) = resolve(directory, &operation.target)?;
    let transaction = build(operation.amount);
    directory
        .perform(&client, number, &transaction)
        .with_context(|| format!("{} failed", transaction.kind()))?;
    let balance = directory
        .client(&client)?
        .account(number)
        .map(|account| account.balance())
        .ok_or_else(|| anyhow!("account {number} disappeared"))?;
    writeln!(output, "{} done. Balance: $ {balance:.2}", transaction.kind())?;
    Ok(())
}

/// Picks the account a command applies to.
fn resolve<S: Store>(
    directory: &Directory<S>,
    target: &Target,
) -> anyhow::Result<(ClientId, AccountNumber)> {
    let client = ClientId::new(target.client.clone());
    if let Some(number) = target.account {
        return Ok((client, AccountNumber(number)));
    }

    let summaries = directory.accounts_of(&client)?;
    match summaries.as_slice() {
        [] => bail!("client {client} has no account"),
        [only] => Ok((client, only.number)),
        several => {
            let numbers: Vec<String> = several.iter().map(|s| s.number.to_string()).collect();
            bail!(
                "client {client} has several accounts ({}); pass --account",
                numbers.join(", ")
            )
        }
    }
}

#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(rename = "type")]
    tx_type: String,
    client: String,
    account: u32,
    amount: Decimal,
}

/// Outcome of a batch run. `skipped` holds the 1-based file lines (the
/// header is line 1) of rows that were not applied.
#[derive(Debug, Default, PartialEq, Eq)]
struct BatchReport {
    applied: usize,
    skipped: Vec<u64>,
}

/// Applies every well-formed row; malformed rows and rejected operations
/// are logged and skipped.
fn process_batch<S: Store, R: Read>(
    directory: &Directory<S>,
    reader: R,
) -> Result<BatchReport, csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .has_headers(true)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();

    let mut report = BatchReport::default();
    for result in rdr.records() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                let line = e.position().map_or(0, Position::line);
                warn!(line, "Skipping unreadable row: {e}");
                report.skipped.push(line);
                continue;
            }
        };
        let line = row.position().map_or(0, Position::line);
        let record: CsvRecord = match row.deserialize(Some(&headers)) {
            Ok(record) => record,
            Err(e) => {
                warn!(line, "Skipping malformed row: {e}");
                report.skipped.push(line);
                continue;
            }
        };
        let kind = match record.tx_type.parse::<TransactionKind>() {
            Ok(kind) => kind,
            Err(e) => {
                warn!(line, "Skipping row: {e}");
                report.skipped.push(line);
                continue;
            }
        };

        let client = ClientId::new(record.client);
        let transaction = Transaction::new(kind, record.amount);
        match directory.perform(&client, AccountNumber(record.account), &transaction) {
            Ok(_) => report.applied += 1,
            Err(e) => {
                warn!(line, %client, account = record.account, "Skipping operation: {e}");
                report.skipped.push(line);
            }
        }
    }
    Ok(report)
}
