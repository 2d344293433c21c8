use std::collections::hash_map::DefaultHasher;
use std::hash::Hash;
use std::hash::Hasher;

use chain_hash::Config;
use chain_hash::HashTable;
use chain_hash::hash_table::Entry;
use clap::Parser;

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'c', long = "target_capacity", default_value_t = 1000)]
    target_capacity: usize,

    #[arg(short = 'n', long = "entries")]
    entries: Option<usize>,

    #[arg(short = 'l', long = "max_load_factor", default_value_t = 0.75)]
    max_load_factor: f32,
}

fn hash_u64(value: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let config = Config::default()
        .with_initial_capacity(args.target_capacity)
        .with_max_load_factor(args.max_load_factor);
    let mut table: HashTable<u64> = match HashTable::with_config(config) {
        Ok(table) => table,
        Err(err) => {
            eprintln!("invalid configuration: {err}");
            std::process::exit(2);
        }
    };

    println!(
        "Created HashTable with {} buckets (max load factor {})",
        table.bucket_count(),
        table.max_load_factor()
    );

    let num_values = args.entries.unwrap_or(args.target_capacity);
    println!("Filling table with {num_values} u64 values...");

    let mut resizes = 0;
    for i in 0..num_values {
        let value = i as u64;
        let buckets_before = table.bucket_count();
        match table.entry(hash_u64(value), |&v| v == value) {
            Entry::Vacant(entry) => {
                entry.insert(value);
            }
            Entry::Occupied(_) => {
                panic!("Value already exists in table: {}", value);
            }
        }
        if table.bucket_count() != buckets_before {
            resizes += 1;
        }
    }

    println!("Inserted {} values into table", table.len());
    println!("Resized {resizes} times, ending with {} buckets", table.bucket_count());
    println!("Final load factor: {:.2}%", table.load_factor() * 100.0);

    println!("Chain length histogram:");
    for (length, buckets) in table.chain_histogram().iter().enumerate() {
        println!("{length:>4}: {buckets}");
    }
    table.debug_stats().print();
}
