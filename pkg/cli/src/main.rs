use std::path::{Path, PathBuf};

use accumulator::{MerkleHasher, PoseidonHasher, TREE_DEPTH};
use clap::{Args, Parser, Subcommand};
use client::{Circuit, CircuitInputs, ClientConfig, HttpProver, PoseidonCircuit, Prover};
use eyre::{eyre, Context, Result};
use notes::{owner_for_address, storage::RocksRepository, NoteState, NoteStore};
use primitives::{util::short_hex, Address, Amount};
use serde_json::json;
use tracing::info;
use zk_primitives::Element;

mod logging;

use logging::LogFormat;

#[derive(Parser)]
#[command(name = "shielded", about = "Tools for the shielded pool client")]
struct Cli {
    /// TOML config file, layered under `SHIELDED_*` env vars
    #[arg(long, env = "SHIELDED_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Plain, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the note owner field for an address
    Owner { address: Address },

    /// Print the empty-subtree hash at every level of the tree
    ZeroHashes {
        #[arg(long, default_value_t = TREE_DEPTH)]
        depth: usize,
    },

    /// Compute a note commitment
    Commitment(CommitmentArgs),

    /// Inspect the local note database
    #[command(subcommand)]
    Notes(NotesCommand),

    /// Send a circuit inputs JSON file to the prove server
    Prove {
        file: PathBuf,
    },
}

#[derive(Args)]
struct CommitmentArgs {
    #[arg(long)]
    value: Amount,
    #[arg(long)]
    secret: Element,
    /// Holder address; the owner field is derived from it
    #[arg(long)]
    address: Address,
}

#[derive(Subcommand)]
enum NotesCommand {
    /// List every note held by an address
    List {
        address: Address,
        /// One JSON object per line
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logging::init(cli.log_format)?;

    let config = ClientConfig::load(cli.config.as_deref()).wrap_err("failed to load config")?;

    match cli.command {
        Command::Owner { address } => {
            println!("{}", owner_for_address(&address).to_hex());
        }
        Command::ZeroHashes { depth } => {
            for (level, hash) in PoseidonHasher.zero_hashes(depth).iter().enumerate() {
                println!("{level:>3} {}", hash.to_hex());
            }
        }
        Command::Commitment(args) => {
            let owner = owner_for_address(&args.address);
            let commitment = PoseidonCircuit.commitment(args.value.to_element(), args.secret, owner);
            println!("{}", commitment.to_hex());
        }
        Command::Notes(NotesCommand::List { address, json }) => {
            list_notes(&config, address, json)?;
        }
        Command::Prove { file } => prove(&config, &file).await?,
    }

    Ok(())
}

fn list_notes(config: &ClientConfig, address: Address, json: bool) -> Result<()> {
    let path = config
        .note_db_path
        .as_ref()
        .ok_or_else(|| eyre!("note_db_path is not configured"))?;

    let store = NoteStore::new(
        RocksRepository::open(path)
            .wrap_err_with(|| format!("failed to open note db at {}", path.display()))?,
    );

    for note in store.all_for(owner_for_address(&address))? {
        if json {
            println!("{}", serde_json::to_string(&note)?);
            continue;
        }

        let leaf = note
            .leaf_index
            .map_or_else(|| "-".to_string(), |index| index.to_string());
        println!(
            "{}  leaf {leaf:>7}  {:>24}  {:<8}  {}",
            note.id,
            note.value,
            state_label(&note.state),
            short_hex(&note.commitment.to_hex(), 6),
        );
    }

    Ok(())
}

fn state_label(state: &NoteState) -> &'static str {
    match state {
        NoteState::Pending { .. } => "pending",
        NoteState::Unspent => "unspent",
        NoteState::Reserved { .. } => "reserved",
        NoteState::Spent => "spent",
    }
}

async fn prove(config: &ClientConfig, file: &Path) -> Result<()> {
    let raw = std::fs::read(file).wrap_err_with(|| format!("failed to read {}", file.display()))?;
    let inputs: CircuitInputs = serde_json::from_slice(&raw).wrap_err("invalid circuit inputs")?;

    let prover = HttpProver::new(&config.prover_url, config.prover_timeout());
    info!(endpoint = prover.endpoint(), "requesting proof");
    let proof = prover.prove(&inputs).await?;

    let words: Vec<String> = proof
        .public_inputs
        .to_array()
        .iter()
        .map(|word| word.to_hex())
        .collect();
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "proof": format!("0x{}", hex::encode(&proof.bytes)),
            "publicInputs": words,
        }))?
    );

    Ok(())
}
