use voter_verify::{
    common::{Config, DevMode},
    core::{face, FingerprintSession, VerifyOutcome},
    storage::{MirrorStore, VoterId},
};

use clap::{Parser, Subcommand};
use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "voterverify")]
#[command(about = "Biometric voter verification with a serial fingerprint sensor")]
struct Cli {
    /// Enable development mode (saves records locally for testing)
    #[arg(long, global = true)]
    dev: bool,

    /// Path to the TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Serial port of the sensor, overrides the configuration
    #[arg(long, global = true)]
    port: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a new fingerprint
    Register {
        /// Sensor slot / voter ID (1-127)
        #[arg(short, long)]
        id: VoterId,
        #[arg(short, long)]
        name: String,
    },
    /// Match a fingerprint against the sensor database
    Verify,
    /// Delete one voter from the sensor and the local records
    Delete {
        #[arg(short, long)]
        id: VoterId,
    },
    /// Erase the sensor, then the local records once the sensor confirms
    EraseAll,
    /// Erase the sensor and unconditionally remove the local records
    Restart {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// List locally mirrored enrollments
    List,
    /// Show the verification log
    History,
    /// Compare two 128-dimensional face encodings stored as JSON
    CompareFaces {
        #[arg(long)]
        first: PathBuf,
        #[arg(long)]
        second: PathBuf,
        /// Minimum similarity for a match (defaults to the configured threshold)
        #[arg(short, long)]
        threshold: Option<f64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on mode
    setup_logging(cli.dev);

    let dev_mode = DevMode::new(cli.dev)?;
    let mut config = load_config(cli.config.as_ref(), &dev_mode)?;
    if let Some(port) = cli.port {
        config.sensor.port = port;
        config.validate()?;
    }

    let store = MirrorStore::new_with_dev_mode(&dev_mode, &config.storage)?;

    match cli.command {
        Commands::Register { id, name } => {
            let session = connect(&config, store)?;
            let record = session.register(id, &name)?;
            println!("✅ Fingerprint registered successfully for {} (ID {})",
                     record.voter_name, record.voter_id);
            session.disconnect();
        }
        Commands::Verify => {
            let session = connect(&config, store)?;
            match session.verify()? {
                VerifyOutcome::Matched(found) => {
                    println!("Match found! ID: {}, Name: {}, Confidence: {}%",
                             found.voter_id,
                             found.voter_name.as_deref().unwrap_or("Unknown"),
                             found.confidence);
                }
                VerifyOutcome::NotFound => println!("No match found"),
                VerifyOutcome::NoEnrollments => println!("No fingerprints registered to verify against"),
            }
            session.disconnect();
        }
        Commands::Delete { id } => {
            let session = connect(&config, store)?;
            session.delete_one(id)?;
            println!("Successfully deleted fingerprint for voter ID {}", id);
            session.disconnect();
        }
        Commands::EraseAll => {
            let session = connect(&config, store)?;
            session.erase_all()?;
            println!("All fingerprint data successfully deleted");
            session.disconnect();
        }
        Commands::Restart { yes } => {
            if !yes && !confirm("This will erase all fingerprint data. Continue? (y/n): ")? {
                println!("Restart cancelled");
                return Ok(());
            }
            let session = connect(&config, store)?;
            session.restart()?;
            println!("Fingerprint system restarted successfully");
            session.disconnect();
        }
        Commands::List => {
            let records = store.load_enrollments()?;
            if records.is_empty() {
                println!("No fingerprints registered");
            }
            for record in records {
                println!("{:>4}  {:<30} {}", record.voter_id, record.voter_name, record.timestamp);
            }
        }
        Commands::History => {
            for record in store.load_verifications()? {
                println!("{}  {:?}  ID {}  {}  {}%",
                         record.timestamp,
                         record.status,
                         record.voter_id.as_deref().unwrap_or("-"),
                         record.voter_name.as_deref().unwrap_or("-"),
                         record.confidence);
            }
        }
        Commands::CompareFaces { first, second, threshold } => {
            let a = face::load_encoding(&first)
                .with_context(|| format!("Failed to read encoding {}", first.display()))?;
            let b = face::load_encoding(&second)
                .with_context(|| format!("Failed to read encoding {}", second.display()))?;

            let threshold = threshold.unwrap_or(config.face.match_threshold);
            let comparison = face::compare_encodings(&a, &b, threshold)?;
            println!("{}", serde_json::to_string_pretty(&comparison)?);
        }
    }

    Ok(())
}

fn load_config(path: Option<&PathBuf>, dev_mode: &DevMode) -> Result<Config> {
    if let Some(path) = path {
        return Ok(Config::load_from_path(path)?);
    }
    if let Some(path) = dev_mode.config_file().filter(|p| p.exists()) {
        return Ok(Config::load_from_path(&path)?);
    }
    Ok(Config::load()?)
}

fn connect(config: &Config, store: MirrorStore) -> Result<FingerprintSession> {
    FingerprintSession::connect(config, store)
        .with_context(|| format!("Failed to initialize fingerprint sensor on port {}", config.sensor.port))
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

fn setup_logging(dev_mode: bool) {
    if dev_mode {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt::init();
    }
}
