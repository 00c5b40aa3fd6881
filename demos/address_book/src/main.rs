//! Address book walkthrough
//!
//! Exercises the whole Portico stack against the embedded in-memory
//! engine:
//!
//! - schema registration and database setup
//! - typed saves through a base-bound dao, transaction commit
//! - raw object queries with named parameters
//! - paged and streaming iteration
//! - query-by-example with `%`/`_` patterns
//! - rollback and delete semantics
//!
//! The schema and sample data come from `portico_testkit`; this binary
//! walks the same six-entry address book the scenario tests assert on.
//!
//! Run with: cargo run -p address_book

use std::sync::Arc;

use clap::Parser;
use portico_core::{Dao, Db, Params, QueryRow};
use portico_model::{Persistent, Value};
use portico_store::{Engine, MemoryEngine, StoreConfig};
use portico_testkit::fixtures::{
    personal, sample_addresses, sample_communications, Address, CommType, Communication,
    PersonalAddress, COMMUNICATION, ORGANISATIONAL_ADDRESS, PERSONAL_ADDRESS,
};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Runnable walkthrough for the Portico data-access stack.
#[derive(Parser)]
#[command(name = "address_book")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Nickname pattern for the query-by-example step (`%` any run, `_` one char)
    #[arg(short, long, default_value = "L%")]
    pattern: String,

    /// Entries per batch in the paged-iteration step
    #[arg(long, default_value_t = 4)]
    page_size: usize,

    /// Match `like` patterns case-insensitively
    #[arg(short, long)]
    case_insensitive: bool,

    /// Output format for the final summary (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// What the walkthrough did, for the final summary.
#[derive(Debug, Serialize)]
struct WalkthroughReport {
    /// Entries saved and committed at the start.
    addresses_saved: usize,
    /// Channels attached to the first entry.
    communications_saved: usize,
    /// Pattern the query-by-example step probed with.
    example_pattern: String,
    /// Nicknames the probe matched.
    example_matches: Vec<String>,
    /// Owner of the mobile channel, per the parameterized query.
    mobile_owner: Option<String>,
    /// Batch sizes the paged iteration produced.
    page_sizes: Vec<usize>,
    /// Entries left after the delete step.
    remaining: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG overrides the verbosity flag
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("Portico Address Book Walkthrough");
    println!("================================\n");

    // Register the address hierarchy and open a handle over the engine
    let engine = MemoryEngine::builder()
        .register(&PERSONAL_ADDRESS)
        .register(&ORGANISATIONAL_ADDRESS)
        .register(&COMMUNICATION)
        .config(StoreConfig::new().like_case_insensitive(cli.case_insensitive))
        .build()?;
    let db = Db::new(Arc::new(engine.clone()));
    println!("[OK] Engine ready, schema registered");

    let addresses: Dao<Address> = Dao::new(&db);
    let personals: Dao<PersonalAddress> = Dao::new(&db);
    let communications: Dao<Communication> = Dao::new(&db);

    // Save the six sample entries through the base-bound dao, then hang
    // two communication channels off the first one
    let mut sample = sample_addresses();
    println!("\n[+] Saving {} address entries...", sample.len());
    for entry in &mut sample {
        addresses.save(entry)?;
    }
    let nikki = sample[0].key().ok_or("save assigns a key")?;
    let mut channels = sample_communications(nikki);
    for channel in &mut channels {
        communications.save(channel)?;
    }
    if !addresses.commit()? {
        return Err("initial commit conflicted".into());
    }
    println!(
        "[OK] Committed {} addresses and {} channels",
        sample.len(),
        channels.len()
    );

    // Read the whole hierarchy back through the base type
    println!("\n[*] All address entries:");
    for entry in addresses.fetch_all()? {
        match &entry {
            Address::Personal(p) => {
                println!("  person   {:<10} {} {}", p.nickname, p.first_name, p.last_name);
            }
            Address::Organisational(o) => {
                println!("  company  {:<10} {}", o.nickname, o.name);
            }
        }
    }

    // Raw dialect queries: a bare scan and a parameterized projection
    let rows = communications.find("from Communication")?;
    println!("\n[*] Raw query found {} communication channels", rows.len());

    let params = Params::new().bind("ct", CommType::Mobile);
    let owners = communications.find_with(
        "select owner from Communication where comm_type = :ct",
        &params,
    )?;
    let mobile_owner = match owners
        .first()
        .and_then(QueryRow::as_scalar)
        .and_then(Value::as_key)
    {
        Some(key) => addresses.fetch(key)?.map(|a| a.nickname().to_string()),
        None => None,
    };
    match &mobile_owner {
        Some(nickname) => println!("[*] The mobile number belongs to {nickname}"),
        None => println!("[!] No mobile channel found"),
    }

    // Paged iteration: each batch opens and closes its own cursor
    println!("\n[*] Paged iteration, {} per batch:", cli.page_size);
    let mut page_sizes = Vec::new();
    for page in addresses.iterate_pages(cli.page_size, 0) {
        let page = page?;
        page_sizes.push(page.len());
        let names: Vec<&str> = page.iter().map(Address::nickname).collect();
        println!("  batch of {}: {}", page.len(), names.join(", "));
    }

    // Streaming iteration: one cursor held across the whole pass,
    // released when the stream runs out
    println!("\n[*] Streaming in nickname order:");
    for entry in addresses.iterate_all_where("order by nickname")? {
        println!("  {}", entry?.nickname());
    }
    debug!(open_cursors = engine.open_cursors(), "after iteration");

    // Query-by-example: unset attributes are skipped, text matches as a
    // pattern
    let probe = personal(&cli.pattern, "", "", None);
    let matches = personals.find_by_example(&probe)?;
    let matched_names: Vec<String> = matches.iter().map(|p| p.nickname.clone()).collect();
    println!(
        "\n[*] Example probe nickname = {:?} matched: {}",
        cli.pattern,
        if matched_names.is_empty() {
            "(nothing)".to_string()
        } else {
            matched_names.join(", ")
        }
    );

    if let Some(mut hit) = matches.into_iter().next() {
        // Rename the first hit and show read-your-writes before commit
        let key = hit.key.ok_or("hydrated entities carry a key")?;
        println!("\n[~] Renaming {} to Duffy...", hit.nickname);
        hit.nickname = "Duffy".to_string();
        personals.save(&mut hit)?;
        if let Some(pending) = addresses.fetch(key)? {
            println!("  the uncommitted session already sees {}", pending.nickname());
        }
        addresses.commit()?;

        // A rollback discards staged writes but leaves the object alone
        hit.nickname = "Schnuffy".to_string();
        personals.save(&mut hit)?;
        personals.rollback()?;
        let stored = personals.fetch(key)?.ok_or("row is committed")?;
        println!(
            "[~] After rollback the object says {}, storage says {}",
            hit.nickname, stored.nickname
        );

        // Delete the row for good
        personals.delete(&stored)?;
        addresses.commit()?;
        match addresses.fetch(key)? {
            None => println!("[-] Deleted entry {key} is gone"),
            Some(entry) => println!("[!] Entry {} survived the delete", entry.nickname()),
        }
    } else {
        println!("[!] Nothing matched, skipping the rename and delete steps");
    }

    let remaining = addresses.fetch_all()?.len();
    addresses.close_session()?;
    db.close_database()?;
    println!("\n[OK] Database closed");

    let report = WalkthroughReport {
        addresses_saved: sample.len(),
        communications_saved: channels.len(),
        example_pattern: cli.pattern,
        example_matches: matched_names,
        mobile_owner,
        page_sizes,
        remaining,
    };
    match cli.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_summary(&report),
    }

    Ok(())
}

fn print_summary(report: &WalkthroughReport) {
    println!("\n[#] Summary:");
    println!("  Addresses saved:     {}", report.addresses_saved);
    println!("  Channels saved:      {}", report.communications_saved);
    println!(
        "  Example {:?} matched: {}",
        report.example_pattern,
        report.example_matches.join(", ")
    );
    match &report.mobile_owner {
        Some(owner) => println!("  Mobile owner:        {owner}"),
        None => println!("  Mobile owner:        (none)"),
    }
    println!("  Paged batch sizes:   {:?}", report.page_sizes);
    println!("  Entries remaining:   {}", report.remaining);
}
