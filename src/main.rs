//! Multisig Factory CLI Application
//!
//! A command-line interface for creating multisig wallets and driving their
//! proposals.

use clap::{ArgGroup, Args, Parser, Subcommand};
use multisig_factory::cli::{self, AppState, DeadlineArg};
use multisig_factory::multisig::Nonce;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "multisig")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "M-of-N multisig wallet factory", long_about = None)]
struct Cli {
    /// Data directory for registry storage
    #[arg(short, long, default_value = ".multisig_data")]
    data_dir: PathBuf,

    /// Override the ledger execution timeout (milliseconds)
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wallet operations
    Wallet {
        #[command(subcommand)]
        action: WalletCommands,
    },

    /// Submit a new proposal
    #[command(group(ArgGroup::new("expiry").required(true).args(["deadline", "deadline_in"])))]
    Propose {
        /// Wallet address
        #[arg(short, long)]
        wallet: String,

        /// Proposing signer
        #[arg(short, long)]
        from: String,

        /// Target address
        #[arg(short, long)]
        to: String,

        /// Value in ETH
        #[arg(short, long, default_value = "0")]
        value: String,

        /// Hex call data; empty means a plain transfer
        #[arg(long)]
        data: Option<String>,

        /// Absolute deadline (unix seconds)
        #[arg(long)]
        deadline: Option<u64>,

        /// Deadline relative to now (seconds)
        #[arg(long)]
        deadline_in: Option<u64>,
    },

    /// Confirm a proposal
    Confirm(VoteArgs),

    /// Reject a proposal
    Reject(VoteArgs),

    /// Execute a confirmed proposal
    Execute(VoteArgs),

    /// Show a proposal
    Proposal {
        #[arg(short, long)]
        wallet: String,

        #[arg(short, long)]
        nonce: Nonce,
    },

    /// List all proposals of a wallet
    Proposals {
        #[arg(short, long)]
        wallet: String,
    },

    /// Show actions performed by the ledger
    Ledger,

    /// Registry backup operations
    Backup {
        #[command(subcommand)]
        action: BackupCommands,
    },
}

#[derive(Subcommand)]
enum BackupCommands {
    /// List saved backups
    List,

    /// Roll the registry back to a backup
    Restore {
        /// Backup index (0 is the most recent)
        #[arg(short, long)]
        index: usize,
    },
}

#[derive(Subcommand)]
enum WalletCommands {
    /// Create a new wallet
    Create {
        /// Signer address (repeat for each signer)
        #[arg(short, long = "signer", required = true)]
        signers: Vec<String>,

        /// Confirmations required to execute
        #[arg(short, long)]
        required: usize,
    },

    /// List wallets
    List {
        /// Only wallets this address signs for
        #[arg(short, long)]
        signer: Option<String>,
    },

    /// Show wallet details
    Info {
        #[arg(short, long)]
        wallet: String,
    },
}

#[derive(Args)]
struct VoteArgs {
    /// Wallet address
    #[arg(short, long)]
    wallet: String,

    /// Acting signer
    #[arg(short, long)]
    from: String,

    /// Proposal nonce
    #[arg(short, long)]
    nonce: Nonce,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(cli))
}

async fn run(cli: Cli) -> cli::CliResult<()> {
    // Initialize application state
    let mut state = AppState::new(cli.data_dir.clone(), cli.timeout_ms)?;

    // Process commands
    match cli.command {
        Commands::Wallet { action } => match action {
            WalletCommands::Create { signers, required } => {
                cli::cmd_wallet_create(&mut state, &signers, required).await?;
            }
            WalletCommands::List { signer } => {
                cli::cmd_wallet_list(&state, signer.as_deref()).await?;
            }
            WalletCommands::Info { wallet } => {
                cli::cmd_wallet_info(&state, &wallet).await?;
            }
        },

        Commands::Propose {
            wallet,
            from,
            to,
            value,
            data,
            deadline,
            deadline_in,
        } => {
            let deadline = match (deadline, deadline_in) {
                (Some(ts), _) => DeadlineArg::At(ts),
                (None, Some(secs)) => DeadlineArg::In(secs),
                (None, None) => return Err("either --deadline or --deadline-in is required".into()),
            };
            cli::cmd_propose(
                &mut state,
                &wallet,
                &from,
                &to,
                &value,
                data.as_deref(),
                deadline,
            )
            .await?;
        }

        Commands::Confirm(args) => {
            cli::cmd_confirm(&mut state, &args.wallet, &args.from, args.nonce).await?;
        }

        Commands::Reject(args) => {
            cli::cmd_reject(&mut state, &args.wallet, &args.from, args.nonce).await?;
        }

        Commands::Execute(args) => {
            cli::cmd_execute(&mut state, &args.wallet, &args.from, args.nonce).await?;
        }

        Commands::Proposal { wallet, nonce } => {
            cli::cmd_proposal(&state, &wallet, nonce).await?;
        }

        Commands::Proposals { wallet } => {
            cli::cmd_proposals(&state, &wallet).await?;
        }

        Commands::Ledger => {
            cli::cmd_ledger(&state)?;
        }

        Commands::Backup { action } => match action {
            BackupCommands::List => {
                cli::cmd_backup_list(&state)?;
            }
            BackupCommands::Restore { index } => {
                cli::cmd_backup_restore(&mut state, index).await?;
            }
        },
    }

    Ok(())
}
