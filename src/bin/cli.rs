//! kvwatch CLI Client
//!
//! Command-line interface for interacting with kvwatch.

use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use kvwatch::network::Client;
use kvwatch::{KvError, Result, Value, ValueKind, WatchOp};

/// kvwatch CLI
#[derive(Parser, Debug)]
#[command(name = "kvwatch-cli")]
#[command(about = "CLI for the kvwatch key-value store")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:2000")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Put {
        /// The key to set
        key: String,

        /// The value to set (arrays are comma separated)
        value: String,

        /// Value kind (string, bytes, bool, i32, i64, u32, u64, f32, f64,
        /// string[], i32[], i64[], f32[], f64[])
        #[arg(short, long, default_value = "string")]
        kind: ValueKind,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Stream changes to a key
    Watch {
        /// The key to watch
        key: String,

        /// Which mutations to report (all, put, delete)
        #[arg(short, long, default_value = "all")]
        op: WatchOp,

        /// Stop after this many seconds (0 = until the server closes)
        #[arg(long, default_value = "0")]
        seconds: u64,
    },

    /// Ping the server
    Ping,
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(KvError::NotFound(key)) => {
            eprintln!("(not found) {}", key);
            ExitCode::from(1)
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(2)
        }
    }
}

fn run(args: Args) -> Result<()> {
    let mut client = Client::connect(&args.server)?;

    match args.command {
        Commands::Get { key } => {
            let value = client.get(&key)?;
            println!("({}) {}", value.kind(), value);
        }
        Commands::Put { key, value, kind } => {
            client.put(&key, Value::parse(kind, &value)?)?;
            println!("OK");
        }
        Commands::Del { key } => {
            client.delete(&key)?;
            println!("OK");
        }
        Commands::Watch { key, op, seconds } => {
            let mut events = client.watch(&key, op)?;
            if seconds > 0 {
                events = events.with_deadline(Instant::now() + Duration::from_secs(seconds));
            }
            for update in events {
                let update = update?;
                match update.value {
                    Some(value) => println!(
                        "#{} {} {} = ({}) {}",
                        update.revision,
                        update.kind,
                        update.key,
                        value.kind(),
                        value
                    ),
                    None => println!("#{} {} {}", update.revision, update.kind, update.key),
                }
            }
        }
        Commands::Ping => {
            client.ping()?;
            println!("PONG");
        }
    }

    Ok(())
}
