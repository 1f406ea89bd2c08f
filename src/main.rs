use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use machinemate::domain::{Category, Difficulty, MachineQuery};
use machinemate::{AppController, IdentificationOutcome, MachineDefinition};

/// Gym machine identification from photos
#[derive(Parser, Debug)]
#[command(name = "machinemate", version, about)]
struct Cli {
    /// Directory holding config.toml and logs (defaults to the OS config directory)
    #[arg(long, env = "MACHINEMATE_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Identify the machine in a photo
    Identify {
        /// Photo path or file:// URI
        photo: String,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// List catalog machines
    Machines {
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        difficulty: Option<Difficulty>,
        /// Substring of the name or a search keyword
        #[arg(long)]
        search: Option<String>,
        /// Required search keyword (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 20)]
        page_size: usize,
    },
    /// Show one machine definition
    Machine { id: String },
    /// List catalog categories
    Categories,
    /// List catalog difficulties
    Difficulties,
    /// Check the identification backend
    Health,
    /// Show the backend's record of an identification
    Trace {
        /// Trace id from an identification outcome
        trace_id: String,
    },
    /// Show or change the stored configuration file
    Config {
        /// Identification backend base URL
        #[arg(long, conflicts_with = "offline")]
        api_base_url: Option<String>,
        /// Remove the backend URL and identify offline
        #[arg(long)]
        offline: bool,
        /// Minimum confidence for automatic identification (0.0-1.0)
        #[arg(long)]
        threshold: Option<f64>,
        /// Identification timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Show the configuration in use, with environment overrides applied
        #[arg(long, conflicts_with_all = ["api_base_url", "offline", "threshold", "timeout_secs"])]
        effective: bool,
    },
    /// Show config, data and log locations
    Paths,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let controller = AppController::new(cli.data_dir).context("Failed to initialize MachineMate")?;

    match cli.command {
        Command::Identify { photo, json } => identify(&controller, &photo, json).await?,
        Command::Machines {
            category,
            difficulty,
            search,
            tags,
            page,
            page_size,
        } => {
            let query = MachineQuery {
                category,
                difficulty,
                search,
                tags,
            };
            let listing = controller.list_machines(&query, page, page_size)?;
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
        Command::Machine { id } => {
            let machine = controller.machine(&id)?;
            println!("{}", serde_json::to_string_pretty(&machine)?);
        }
        Command::Categories => {
            println!("{}", serde_json::to_string_pretty(&controller.categories())?);
        }
        Command::Difficulties => {
            println!("{}", serde_json::to_string_pretty(&controller.difficulties())?);
        }
        Command::Health => {
            let health = controller.health().await?;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
        Command::Trace { trace_id } => {
            let trace = controller.trace(&trace_id).await?;
            println!("{}", serde_json::to_string_pretty(&trace)?);
        }
        Command::Config {
            api_base_url,
            offline,
            threshold,
            timeout_secs,
            effective,
        } => {
            if effective {
                print!("{}", toml::to_string_pretty(&controller.config())?);
                return Ok(());
            }

            let mut config = controller.stored_config();
            let changed =
                api_base_url.is_some() || offline || threshold.is_some() || timeout_secs.is_some();

            if offline {
                config.identification.api_base_url = None;
            }
            if let Some(url) = api_base_url {
                config.identification.api_base_url = Some(url);
            }
            if let Some(threshold) = threshold {
                config.identification.confidence_threshold = threshold;
            }
            if let Some(secs) = timeout_secs {
                config.identification.request_timeout_secs = secs;
            }
            if changed {
                controller.update_config(config.clone())?;
            }
            print!("{}", toml::to_string_pretty(&config)?);
        }
        Command::Paths => {
            println!("{}", serde_json::to_string_pretty(&controller.paths())?);
        }
    }

    Ok(())
}

async fn identify(controller: &AppController, photo: &str, json: bool) -> Result<()> {
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    print_identification(controller, photo, json, &cancel).await
}

/// Resolve and print; prints nothing once `cancel` has fired.
async fn print_identification(
    controller: &AppController,
    photo: &str,
    json: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let Some(outcome) = controller.identify_cancellable(photo, cancel).await? else {
        debug!(photo = photo, "Identify interrupted, no outcome");
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    print_outcome(controller, &outcome)
}

fn print_outcome(controller: &AppController, outcome: &IdentificationOutcome) -> Result<()> {
    match outcome {
        IdentificationOutcome::Catalog {
            machine_id,
            confidence,
            ..
        } => {
            println!("Identified ({:.0}% confident)", confidence * 100.0);
            print_machine(&controller.machine(machine_id)?);
        }
        IdentificationOutcome::Fallback { machine_id, .. } => {
            println!("Backend unavailable, offline suggestion:");
            print_machine(&controller.machine(machine_id)?);
        }
        IdentificationOutcome::Manual { candidates, .. }
        | IdentificationOutcome::Generic { candidates, .. }
        | IdentificationOutcome::NotGym { candidates, .. } => {
            println!("Could not identify the machine confidently ({}).", outcome.kind());
            if candidates.is_empty() {
                println!("Pick a machine from `machinemate machines`.");
            } else {
                println!("Did you mean:");
                for candidate in candidates {
                    let name = controller
                        .machine(&candidate.machine_id)
                        .map(|m| m.name)
                        .unwrap_or_else(|_| candidate.machine_id.clone());
                    println!("  {:<28} {:>3.0}%", name, candidate.confidence * 100.0);
                }
            }
        }
    }
    Ok(())
}

fn print_machine(machine: &MachineDefinition) {
    println!("\n{} [{}] ({}, {})", machine.name, machine.id, machine.category, machine.difficulty);
    println!("Primary muscles: {}", machine.primary_muscles.join(", "));

    let sections = [
        ("Setup", &machine.setup_steps),
        ("How to", &machine.how_to_steps),
        ("Common mistakes", &machine.common_mistakes),
        ("Safety", &machine.safety_tips),
    ];
    for (title, lines) in sections {
        if lines.is_empty() {
            continue;
        }
        println!("\n{}:", title);
        for (i, line) in lines.iter().enumerate() {
            println!("  {}. {}", i + 1, line);
        }
    }
}
