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

use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use servimarket::{
    CategoryId, ClientId, Location, Marketplace, NewProposal, NewRequest, PaymentEvent,
    PaymentEventKind, PaymentMetadata, ProposalId, ProposalPatch, ProviderId, RequestId, Urgency,
};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;
use std::process;

/// Servimarket - Replay marketplace operation CSV files
///
/// Reads lifecycle operations from a CSV file, runs them through the engine,
/// and prints the resulting transactions to stdout.
#[derive(Parser, Debug)]
#[command(name = "servimarket")]
#[command(about = "A marketplace engine that replays lifecycle operation CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with operations
    ///
    /// Expected format: op,actor,request,proposal,amount,days,message
    /// Entities are named by free-form aliases; ids are generated on first
    /// mention. Example: cargo run -- operations.csv > transactions.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let replay = match replay_operations(BufReader::new(file)) {
        Ok(replay) => replay,
        Err(e) => {
            eprintln!("Error replaying operations: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = write_transactions(&replay, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `op, actor, request, proposal, amount, days, message`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    actor: String,
    #[serde(default)]
    request: String,
    #[serde(default)]
    proposal: String,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    amount: Option<Decimal>,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    days: Option<u32>,
    #[serde(default)]
    message: String,
}

/// Alias-to-id maps built up during a replay.
#[derive(Default)]
struct Aliases {
    clients: HashMap<String, ClientId>,
    providers: HashMap<String, ProviderId>,
    requests: HashMap<String, RequestId>,
    proposals: HashMap<String, ProposalId>,
}

struct Replay {
    market: Marketplace,
    aliases: Aliases,
}

fn replay_operations<R: Read>(reader: R) -> Result<Replay, csv::Error> {
    let market = Marketplace::with_defaults();
    let mut aliases = Aliases::default();
    let mut csv_reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    for result in csv_reader.deserialize::<CsvRecord>() {
        let record = result?;
        if let Err(e) = apply(&market, &mut aliases, &record) {
            // A rejected operation does not stop the replay; the engine
            // guarantees nothing half-applied.
            eprintln!("{}: {}", record.op, e);
        }
    }

    Ok(Replay { market, aliases })
}

fn apply(
    market: &Marketplace,
    aliases: &mut Aliases,
    record: &CsvRecord,
) -> Result<(), String> {
    match record.op.to_lowercase().as_str() {
        "post" => {
            let client = client_id(aliases, &record.actor);
            let request = market
                .requests()
                .create_request(
                    client,
                    NewRequest {
                        category_id: CategoryId::new(),
                        title: record.message.clone(),
                        description: record.message.clone(),
                        budget_min: None,
                        budget_max: record.amount,
                        deadline: None,
                        urgency: Urgency::Medium,
                        location: Location::default(),
                    },
                )
                .map_err(|e| e.to_string())?;
            aliases.requests.insert(record.request.clone(), request.id);
            Ok(())
        }
        "bid" => {
            let provider = provider_id(aliases, &record.actor);
            let request_id = lookup(&aliases.requests, &record.request, "request")?;
            let price = record.amount.ok_or("bid requires an amount")?;
            let proposal = market
                .proposals()
                .submit_proposal(
                    provider,
                    NewProposal {
                        request_id,
                        price,
                        estimated_days: record.days,
                        message: record.message.clone(),
                    },
                )
                .map_err(|e| e.to_string())?;
            aliases.proposals.insert(record.proposal.clone(), proposal.id);
            Ok(())
        }
        "edit" => {
            let provider = provider_id(aliases, &record.actor);
            let proposal_id = lookup(&aliases.proposals, &record.proposal, "proposal")?;
            market
                .proposals()
                .edit_proposal(
                    proposal_id,
                    provider,
                    ProposalPatch {
                        price: record.amount,
                        estimated_days: record.days,
                        message: (!record.message.is_empty()).then(|| record.message.clone()),
                    },
                )
                .map(|_| ())
                .map_err(|e| e.to_string())
        }
        "withdraw" => {
            let provider = provider_id(aliases, &record.actor);
            let proposal_id = lookup(&aliases.proposals, &record.proposal, "proposal")?;
            market
                .proposals()
                .withdraw_proposal(proposal_id, provider)
                .map(|_| ())
                .map_err(|e| e.to_string())
        }
        "accept" => {
            let client = client_id(aliases, &record.actor);
            let proposal_id = lookup(&aliases.proposals, &record.proposal, "proposal")?;
            market
                .acceptance()
                .accept_proposal(proposal_id, client)
                .map(|_| ())
                .map_err(|e| e.to_string())
        }
        "intent" => {
            let client = client_id(aliases, &record.actor);
            let proposal_id = lookup(&aliases.proposals, &record.proposal, "proposal")?;
            let reference = format!("ref-{}", record.proposal);
            market
                .acceptance()
                .open_payment_intent(proposal_id, client, reference)
                .map(|_| ())
                .map_err(|e| e.to_string())
        }
        "pay_ok" | "pay_fail" => {
            let proposal_id = lookup(&aliases.proposals, &record.proposal, "proposal")?;
            let transaction = market
                .store()
                .transaction_for_proposal(proposal_id)
                .ok_or("no transaction opened for this proposal")?;
            let kind = if record.op.eq_ignore_ascii_case("pay_ok") {
                PaymentEventKind::Succeeded
            } else {
                PaymentEventKind::Failed
            };
            let outcome = market.settlement().handle_payment_event(PaymentEvent {
                kind,
                metadata: PaymentMetadata {
                    transaction_id: transaction.id,
                    proposal_id: transaction.proposal_id,
                    request_id: transaction.request_id,
                },
            });
            eprintln!("{}: {:?}", record.op, outcome);
            Ok(())
        }
        "confirm" => {
            let client = client_id(aliases, &record.actor);
            let proposal_id = lookup(&aliases.proposals, &record.proposal, "proposal")?;
            let transaction = market
                .store()
                .transaction_for_proposal(proposal_id)
                .ok_or("no transaction opened for this proposal")?;
            market
                .settlement()
                .confirm_transaction(transaction.id, client)
                .map(|_| ())
                .map_err(|e| e.to_string())
        }
        "complete" => {
            let provider = provider_id(aliases, &record.actor);
            let proposal_id = lookup(&aliases.proposals, &record.proposal, "proposal")?;
            let transaction = market
                .store()
                .transaction_for_proposal(proposal_id)
                .ok_or("no transaction opened for this proposal")?;
            market
                .settlement()
                .complete_transaction(transaction.id, provider)
                .map(|_| ())
                .map_err(|e| e.to_string())
        }
        other => Err(format!("unknown operation '{}'", other)),
    }
}

fn client_id(aliases: &mut Aliases, alias: &str) -> ClientId {
    *aliases
        .clients
        .entry(alias.to_string())
        .or_insert_with(ClientId::new)
}

fn provider_id(aliases: &mut Aliases, alias: &str) -> ProviderId {
    *aliases
        .providers
        .entry(alias.to_string())
        .or_insert_with(ProviderId::new)
}

fn lookup<T: Copy>(
    map: &HashMap<String, T>,
    alias: &str,
    kind: &str,
) -> Result<T, String> {
    map.get(alias)
        .copied()
        .ok_or_else(|| format!("unknown {} alias '{}'", kind, alias))
}

/// Output row: one line per transaction, aliases resolved back.
#[derive(Debug, Serialize)]
struct OutputRecord {
    request: String,
    proposal: String,
    amount: Decimal,
    platform_fee: Decimal,
    provider_earnings: Decimal,
    status: String,
}

fn write_transactions<W: std::io::Write>(replay: &Replay, out: W) -> Result<(), csv::Error> {
    let mut writer = Writer::from_writer(out);

    // Stable order: follow proposal aliases alphabetically.
    let mut names: Vec<_> = replay.aliases.proposals.iter().collect();
    names.sort_by(|a, b| a.0.cmp(b.0));

    for (proposal_alias, proposal_id) in names {
        let Some(transaction) = replay.market.store().transaction_for_proposal(*proposal_id)
        else {
            continue;
        };
        let request_alias = replay
            .aliases
            .requests
            .iter()
            .find(|(_, id)| **id == transaction.request_id)
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| transaction.request_id.to_string());

        writer.serialize(OutputRecord {
            request: request_alias,
            proposal: proposal_alias.clone(),
            amount: transaction.amount,
            platform_fee: transaction.platform_fee,
            provider_earnings: transaction.provider_earnings,
            status: format!("{:?}", transaction.payment_status),
        })?;
    }

    writer.flush()?;
    Ok(())
}
