//! heaptable CLI
//!
//! Command-line interface for creating tables, storing records and querying
//! them through saved indexes.

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use heaptable::index::{Avl, IndexFamily, Isam, Sequential};
use heaptable::{
    Algorithm, Config, HeapFile, IndexContainer, KeyKind, Position, Record, Result, StoreError,
    TypeDescriptor, Value,
};

/// heaptable CLI
#[derive(Parser, Debug)]
#[command(name = "heaptable-cli")]
#[command(about = "CLI for the heaptable storage engine")]
#[command(version)]
struct Args {
    /// Tables directory
    #[arg(short, long, default_value = "./tables")]
    dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a table (or reopen it with the same schema)
    Create {
        /// Table name
        table: String,

        /// Attribute as name:type, e.g. id:int or name:varchar(20)
        #[arg(short, long = "attr", required = true)]
        attributes: Vec<String>,

        /// Primary key attribute
        #[arg(short, long)]
        primary_key: String,
    },

    /// Insert a record, one value per attribute in schema order
    Insert {
        table: String,
        #[arg(allow_hyphen_values = true)]
        values: Vec<String>,
    },

    /// Read the record at a position
    Get { table: String, position: Position },

    /// Delete the record at a position
    Delete { table: String, position: Position },

    /// Print every live record
    Scan { table: String },

    /// Build and query indexes
    Index {
        #[command(subcommand)]
        command: IndexCommands,
    },
}

#[derive(Subcommand, Debug)]
enum IndexCommands {
    /// Index an attribute over every live record and save the index
    Build {
        table: String,
        attribute: String,
        #[arg(short, long, default_value = "avl")]
        algorithm: Algorithm,
    },

    /// Look up a key in a saved index
    Search {
        table: String,
        attribute: String,
        #[arg(allow_hyphen_values = true)]
        key: String,
        #[arg(short, long, default_value = "avl")]
        algorithm: Algorithm,
    },

    /// Look up every key in [begin, end] in a saved index
    Range {
        table: String,
        attribute: String,
        #[arg(allow_hyphen_values = true)]
        begin: String,
        #[arg(allow_hyphen_values = true)]
        end: String,
        #[arg(short, long, default_value = "avl")]
        algorithm: Algorithm,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,heaptable=debug"));

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();
    let config = Config::builder().tables_dir(&args.dir).build();

    if let Err(e) = run(&config, args.command) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(config: &Config, command: Commands) -> Result<()> {
    match command {
        Commands::Create {
            table,
            attributes,
            primary_key,
        } => {
            let mut names = Vec::with_capacity(attributes.len());
            let mut types = Vec::with_capacity(attributes.len());
            for attr in &attributes {
                let (name, ty) = attr.split_once(':').ok_or_else(|| {
                    StoreError::Schema(format!("attribute '{}' must look like name:type", attr))
                })?;
                names.push(name.to_string());
                types.push(ty.parse::<TypeDescriptor>()?);
            }

            let heap = HeapFile::create(config.clone(), &table, types, names, primary_key)?;
            println!(
                "table {} ready: record size {} bytes, {} slots",
                heap.table_name(),
                heap.get_record_size(),
                heap.record_count()?
            );
            heap.close()
        }

        Commands::Insert { table, values } => {
            let mut heap = HeapFile::open(config.clone(), &table)?;
            let types = heap.get_attribute_types().to_vec();
            if values.len() != types.len() {
                return Err(StoreError::InvalidRecordFormat(format!(
                    "table {} has {} attributes, got {} values",
                    table,
                    types.len(),
                    values.len()
                )));
            }

            let parsed = values
                .iter()
                .zip(&types)
                .map(|(text, ty)| Value::parse(ty, text))
                .collect::<Result<Vec<_>>>()?;
            let record = Record::from_values(&parsed, &types)?;
            let position = heap.add(&record)?;

            let (_, key) = heap.get_key(&record)?;
            println!("inserted {}={} at {}", key.name, key.value.trim_end_matches('\0'), position);
            heap.close()
        }

        Commands::Get { table, position } => {
            let heap = HeapFile::open(config.clone(), &table)?;
            let record = heap.read(position)?;
            print_record(&heap, position, &record)
        }

        Commands::Delete { table, position } => {
            let mut heap = HeapFile::open(config.clone(), &table)?;
            if heap.remove(position)? {
                println!("deleted record at {}", position);
            } else {
                println!("no live record at {}", position);
            }
            heap.close()
        }

        Commands::Scan { table } => {
            let heap = HeapFile::open(config.clone(), &table)?;
            println!("{}", heap.get_attribute_names().join(" | "));
            let rows = heap.scan()?;
            for (position, record) in &rows {
                print_record(&heap, *position, record)?;
            }
            println!("{} live of {} slots", rows.len(), heap.record_count()?);
            Ok(())
        }

        Commands::Index { command } => match command {
            IndexCommands::Build {
                table,
                attribute,
                algorithm,
            } => match algorithm {
                Algorithm::Sequential => build_index::<Sequential>(config, &table, &attribute),
                Algorithm::Avl => build_index::<Avl>(config, &table, &attribute),
                Algorithm::Isam => build_index::<Isam>(config, &table, &attribute),
            },
            IndexCommands::Search {
                table,
                attribute,
                key,
                algorithm,
            } => {
                let query = Query::Point(key);
                match algorithm {
                    Algorithm::Sequential => query_index::<Sequential>(config, &table, &attribute, query),
                    Algorithm::Avl => query_index::<Avl>(config, &table, &attribute, query),
                    Algorithm::Isam => query_index::<Isam>(config, &table, &attribute, query),
                }
            }
            IndexCommands::Range {
                table,
                attribute,
                begin,
                end,
                algorithm,
            } => {
                let query = Query::Range(begin, end);
                match algorithm {
                    Algorithm::Sequential => query_index::<Sequential>(config, &table, &attribute, query),
                    Algorithm::Avl => query_index::<Avl>(config, &table, &attribute, query),
                    Algorithm::Isam => query_index::<Isam>(config, &table, &attribute, query),
                }
            }
        },
    }
}

enum Query {
    Point(String),
    Range(String, String),
}

fn build_index<F: IndexFamily>(config: &Config, table: &str, attribute: &str) -> Result<()> {
    let heap = HeapFile::open(config.clone(), table)?;
    let mut container = IndexContainer::<F>::for_attribute(&heap, attribute)?;

    let idx = heap.metadata().get_attribute_idx(attribute)?;
    let types = heap.get_attribute_types();
    let mut rows = Vec::new();
    for (position, record) in heap.scan()? {
        rows.push((record.field_value(idx, types)?, position));
    }

    let (response, accepted) = match container.key_kind() {
        KeyKind::Int => container.bulk_insert(keyed(rows, |v| match v {
            Value::Int(n) => Some(n),
            _ => None,
        }))?,
        KeyKind::Float => container.bulk_insert(keyed(rows, |v| match v {
            Value::Float(x) => Some(x),
            _ => None,
        }))?,
        KeyKind::Text => container.bulk_insert(keyed(rows, |v| match v {
            Value::Varchar(s) => Some(s),
            _ => None,
        }))?,
    };

    let path = config.index_path(table, attribute, F::ALGORITHM);
    container.save(&path)?;

    let rejected = accepted.iter().filter(|ok| !**ok).count();
    println!(
        "{} index on {}.{}: {} entries, {} rejected, {:?}",
        F::ALGORITHM,
        table,
        attribute,
        response.positions.len(),
        rejected,
        response.elapsed
    );
    Ok(())
}

fn query_index<F: IndexFamily>(
    config: &Config,
    table: &str,
    attribute: &str,
    query: Query,
) -> Result<()> {
    let heap = HeapFile::open(config.clone(), table)?;
    let container = IndexContainer::<F>::load(&config.index_path(table, attribute, F::ALGORITHM))?;
    let ty = heap.get_type(attribute)?;

    let (positions, elapsed) = match query {
        Query::Point(key) => {
            let (position, elapsed) = match Value::parse(&ty, &key)? {
                Value::Int(n) => container.search(n)?,
                Value::Float(x) => container.search(x)?,
                Value::Varchar(s) => container.search(s)?,
                Value::Bool(_) => return Err(StoreError::UnsupportedKeyType(ty.kind)),
            };
            (vec![position], elapsed)
        }
        Query::Range(begin, end) => {
            let response = match (Value::parse(&ty, &begin)?, Value::parse(&ty, &end)?) {
                (Value::Int(b), Value::Int(e)) => container.range_search(b, e)?,
                (Value::Float(b), Value::Float(e)) => container.range_search(b, e)?,
                (Value::Varchar(b), Value::Varchar(e)) => container.range_search(b, e)?,
                _ => return Err(StoreError::UnsupportedKeyType(ty.kind)),
            };
            (response.positions, response.elapsed)
        }
    };

    println!("{}", heap.get_attribute_names().join(" | "));
    for position in &positions {
        let record = heap.read(*position)?;
        print_record(&heap, *position, &record)?;
    }
    println!("{} match(es) in {:?}", positions.len(), elapsed);
    Ok(())
}

fn keyed<K>(rows: Vec<(Value, Position)>, key: impl Fn(Value) -> Option<K>) -> Vec<(K, Position)> {
    rows.into_iter()
        .filter_map(|(value, position)| key(value).map(|k| (k, position)))
        .collect()
}

fn print_record(heap: &HeapFile, position: Position, record: &Record) -> Result<()> {
    let values = record.values(heap.get_attribute_types())?;
    let line: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    println!("@{:<8} {}", position, line.join(" | "));
    Ok(())
}
