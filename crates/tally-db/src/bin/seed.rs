//! # Seed Data Generator
//!
//! Populates the database with customers for development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 customers (default)
//! cargo run -p tally-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p tally-db --bin seed -- --count 1000
//!
//! # Specify database path
//! cargo run -p tally-db --bin seed -- --db ./data/tally.db
//! ```
//!
//! ## Generated Customers
//! - `C0000` is always the walk-in counter customer (no tax id)
//! - Other codes are `C{NNNN}` with a name built from the lists below and
//!   a synthetic tax id on every third customer

use std::env;
use tally_core::Customer;
use tally_db::{Database, DbConfig};

const FIRST_NAMES: &[&str] = &[
    "Ada", "Alan", "Grace", "Linus", "Margaret", "Dennis", "Barbara", "Ken", "Frances", "Edsger",
    "Radia", "Donald", "Hedy", "John", "Katherine", "Niklaus",
];

const LAST_NAMES: &[&str] = &[
    "Lovelace", "Turing", "Hopper", "Torvalds", "Hamilton", "Ritchie", "Liskov", "Thompson",
    "Allen", "Dijkstra", "Perlman", "Knuth", "Lamarr", "Backus", "Johnson", "Wirth",
];

/// Code of the default counter customer.
const WALK_IN_CODE: &str = "C0000";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path = String::from("./tally_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of customers to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: ./tally_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Tally POS Seed Data Generator");
    println!("=============================");
    println!("Database:  {}", db_path);
    println!("Customers: {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database, migrations applied");

    let existing = db.customers().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} customers", existing);
        println!("  Skipping seed to avoid duplicates.");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let mut generated = 0;

    for seed in 0..count {
        let customer = generate_customer(seed);

        if let Err(e) = db.customers().insert(&customer).await {
            eprintln!("Failed to insert {}: {}", customer.code, e);
            continue;
        }

        generated += 1;
        if generated % 100 == 0 {
            println!("  Generated {} customers...", generated);
        }
    }

    println!();
    println!("✓ Generated {} customers in {:?}", generated, start.elapsed());

    Ok(())
}

/// Builds one customer. Index 0 is the walk-in customer.
fn generate_customer(seed: usize) -> Customer {
    if seed == 0 {
        return Customer {
            code: WALK_IN_CODE.to_string(),
            name: "Counter Sale".to_string(),
            tax_id: None,
        };
    }

    let first = FIRST_NAMES[seed % FIRST_NAMES.len()];
    let last = LAST_NAMES[(seed / FIRST_NAMES.len() + seed) % LAST_NAMES.len()];

    let tax_id = if seed % 3 == 0 {
        Some(format!("X{:08}", seed * 7919 % 100_000_000))
    } else {
        None
    };

    Customer {
        code: format!("C{:04}", seed),
        name: format!("{} {}", first, last),
        tax_id,
    }
}
