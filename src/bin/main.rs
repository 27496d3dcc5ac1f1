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

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use csv::{ReaderBuilder, Trim, Writer};
use royalty_ledger::{
    Amount, Artist, ArtistId, BalanceSnapshot, BrandId, DivergenceAlert, EarningSource, EntryKind,
    Ledger, LedgerConfig, LogSink, NewEntry, ReconciliationJob, Release, ReleaseId, ReleaseStatus,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Royalty Ledger - Artist balances and reconciliation from CSV exports
///
/// Imports ledger entries from CSV and either prints per-artist balances or
/// audits a set of cached balances against them.
#[derive(Parser, Debug)]
#[command(name = "royalty-ledger")]
#[command(about = "Artist balance ledger and reconciliation tool", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(long, env = "ROYALTY_LEDGER_CONFIG", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every artist's balance as CSV
    ///
    /// Example: royalty-ledger balances --entries entries.csv > balances.csv
    Balances {
        /// Ledger entries: artist,brand,kind,amount,recorded_at,release,source,platform,description
        #[arg(long, value_name = "FILE")]
        entries: PathBuf,

        /// Releases referenced by entries: release,artist,catalog_number,title
        #[arg(long, value_name = "FILE")]
        releases: Option<PathBuf>,
    },
    /// Compare cached balances with the ledger and print divergences as CSV
    Reconcile {
        #[arg(long, value_name = "FILE")]
        entries: PathBuf,

        #[arg(long, value_name = "FILE")]
        releases: Option<PathBuf>,

        /// Cached balances: artist,balance[,computed_at]
        #[arg(long, value_name = "FILE")]
        snapshots: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match LedgerConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading config '{}': {}", path.display(), e);
                process::exit(1);
            }
        },
        None => LedgerConfig::default(),
    };
    let ledger = Ledger::with_config(config);

    let result = match args.command {
        Command::Balances { entries, releases } => load(&ledger, &entries, releases.as_deref())
            .and_then(|()| write_balances(&ledger, std::io::stdout())),
        Command::Reconcile {
            entries,
            releases,
            snapshots,
        } => load(&ledger, &entries, releases.as_deref())
            .and_then(|()| open(&snapshots))
            .and_then(|file| load_snapshots(&ledger, file))
            .and_then(|()| reconcile(&ledger, std::io::stdout())),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn open(path: &Path) -> Result<BufReader<File>, csv::Error> {
    File::open(path).map(BufReader::new).map_err(|e| {
        std::io::Error::new(e.kind(), format!("{}: {}", path.display(), e)).into()
    })
}

fn load(ledger: &Ledger, entries: &Path, releases: Option<&Path>) -> Result<(), csv::Error> {
    let rows = read_entries(open(entries)?)?;
    let registered = register_artists(ledger, &rows);
    info!(registered, "artists registered");
    if let Some(releases) = releases {
        load_releases(ledger, open(releases)?)?;
    }
    append_entries(ledger, rows);
    Ok(())
}

fn reader<R: Read>(reader: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader)
}

/// Raw entry row.
#[derive(Debug, Deserialize)]
struct EntryRecord {
    artist: u32,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    brand: Option<u16>,
    kind: String,
    amount: Decimal,
    recorded_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    release: Option<u32>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    platform: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl EntryRecord {
    /// Converts the row into an entry request.
    ///
    /// Returns `None` for unknown kinds, unknown earning sources and amounts
    /// finer than one cent.
    fn into_entry(self) -> Option<NewEntry> {
        let kind = match self.kind.to_lowercase().as_str() {
            "earning" => {
                let source = match self.source?.to_lowercase().as_str() {
                    "streaming" => EarningSource::Streaming,
                    "digital_sale" | "digital sale" => EarningSource::DigitalSale,
                    "merchandise" => EarningSource::Merchandise,
                    _ => return None,
                };
                EntryKind::Earning {
                    source,
                    platform: self.platform.unwrap_or_default(),
                }
            }
            "royalty" => EntryKind::Royalty,
            "expense" => EntryKind::Expense,
            _ => return None,
        };
        Some(NewEntry {
            artist_id: ArtistId(self.artist),
            kind,
            amount: Amount::from_decimal(self.amount)?,
            release_id: self.release.map(ReleaseId),
            description: self.description.filter(|d| !d.is_empty()),
            recorded_at: self.recorded_at,
            corrects: None,
        })
    }
}

/// Parses entry rows, skipping malformed ones.
fn read_entries<R: Read>(input: R) -> Result<Vec<(BrandId, NewEntry)>, csv::Error> {
    let mut rows = Vec::new();
    for (line, result) in reader(input).deserialize::<EntryRecord>().enumerate() {
        match result {
            Ok(record) => {
                let brand = BrandId(record.brand.unwrap_or(1));
                match record.into_entry() {
                    Some(entry) => rows.push((brand, entry)),
                    None => warn!(line = line + 2, "skipping invalid entry record"),
                }
            }
            Err(e) => warn!(line = line + 2, error = %e, "skipping malformed row"),
        }
    }
    Ok(rows)
}

/// Artists appearing in the import are registered on first sight.
/// Registers every artist the rows mention that the roster does not know yet.
fn register_artists(ledger: &Ledger, rows: &[(BrandId, NewEntry)]) -> usize {
    let mut registered = 0usize;
    for (brand, entry) in rows {
        if ledger.roster().contains_artist(entry.artist_id) {
            continue;
        }
        let artist = Artist {
            id: entry.artist_id,
            brand: *brand,
            name: format!("artist-{}", entry.artist_id),
        };
        match ledger.roster().register_artist(artist) {
            Ok(()) => registered += 1,
            Err(e) => warn!(artist = %entry.artist_id, error = %e, "artist rejected"),
        }
    }
    registered
}

fn append_entries(ledger: &Ledger, rows: Vec<(BrandId, NewEntry)>) {
    let total = rows.len();
    let mut rejected = 0usize;
    for (_, entry) in rows {
        let artist_id = entry.artist_id;
        if let Err(e) = ledger.append(entry) {
            rejected += 1;
            warn!(artist = %artist_id, error = %e, "entry rejected");
        }
    }
    info!(appended = total - rejected, rejected, "entries imported");
}

#[derive(Debug, Deserialize)]
struct ReleaseRecord {
    release: u32,
    artist: u32,
    catalog_number: String,
    title: String,
}

fn load_releases<R: Read>(ledger: &Ledger, input: R) -> Result<(), csv::Error> {
    for result in reader(input).deserialize::<ReleaseRecord>() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "skipping malformed release row");
                continue;
            }
        };
        let release = Release {
            id: ReleaseId(record.release),
            catalog_number: record.catalog_number,
            title: record.title,
            status: ReleaseStatus::Live,
            primary_artist: ArtistId(record.artist),
            collaborators: Vec::new(),
        };
        if let Err(e) = ledger.roster().register_release(release) {
            warn!(release = record.release, error = %e, "release rejected");
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct SnapshotRecord {
    artist: u32,
    balance: Decimal,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    computed_at: Option<DateTime<Utc>>,
}

fn load_snapshots<R: Read>(ledger: &Ledger, input: R) -> Result<(), csv::Error> {
    for result in reader(input).deserialize::<SnapshotRecord>() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "skipping malformed snapshot row");
                continue;
            }
        };
        let Some(balance) = Amount::from_decimal(record.balance) else {
            warn!(artist = record.artist, "skipping snapshot with sub-cent balance");
            continue;
        };
        let snapshot = BalanceSnapshot::new(
            ArtistId(record.artist),
            balance,
            record.computed_at.unwrap_or_else(Utc::now),
        );
        if let Err(e) = ledger.load_snapshot(snapshot) {
            warn!(artist = record.artist, error = %e, "snapshot rejected");
        }
    }
    Ok(())
}

/// Writes one statement row per artist.
///
/// Columns: `artist, earnings, royalties, expenses, paid, balance, pending_payment`
fn write_balances<W: Write>(ledger: &Ledger, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    for account in ledger.accounts() {
        wtr.serialize(&*account)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Divergence alert as written to the alerts CSV, in decimal major units.
#[derive(Debug, Serialize)]
struct AlertRecord {
    artist: ArtistId,
    cached_balance: Decimal,
    computed_balance: Decimal,
    detected_at: DateTime<Utc>,
}

impl From<&DivergenceAlert> for AlertRecord {
    fn from(alert: &DivergenceAlert) -> Self {
        Self {
            artist: alert.artist_id,
            cached_balance: alert.cached_balance.to_decimal(),
            computed_balance: alert.computed_balance.to_decimal(),
            detected_at: alert.detected_at,
        }
    }
}

/// Runs one reconciliation pass and writes its alerts.
///
/// Columns: `artist, cached_balance, computed_balance, detected_at`
fn reconcile<W: Write>(ledger: &Ledger, writer: W) -> Result<(), csv::Error> {
    let report = ReconciliationJob::new(ledger, &LogSink).run();
    for (artist_id, failure) in &report.failures {
        eprintln!("artist {}: {}", artist_id, failure);
    }

    let mut wtr = Writer::from_writer(writer);
    for alert in &report.divergences {
        wtr.serialize(AlertRecord::from(alert))?;
    }
    wtr.flush()?;
    Ok(())
}
