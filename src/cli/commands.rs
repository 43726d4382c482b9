//! CLI commands for the multisig engine
//!
//! Implements all command handlers for the CLI interface. Each command loads
//! the registry from the data directory, runs, and saves it back.

use crate::config::EngineConfig;
use crate::core::{
    format_call_data, format_ether, format_time_interval, parse_call_data, parse_ether, Address,
    SystemClock, Timestamp, WalletId,
};
use crate::ledger::InMemoryLedger;
use crate::multisig::{EngineEvent, Nonce, ProposalRequest, ProposalView, WalletRegistry};
use crate::storage::{Storage, StorageConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Name of the optional engine config file inside the data directory
pub const CONFIG_FILE: &str = "config.json";

/// When a new proposal stops being executable
#[derive(Debug, Clone, Copy)]
pub enum DeadlineArg {
    /// Absolute unix timestamp
    At(Timestamp),
    /// Seconds from now
    In(u64),
}

/// Application state
pub struct AppState {
    pub registry: WalletRegistry,
    pub ledger: Arc<InMemoryLedger>,
    pub storage: Storage,
    events: broadcast::Receiver<EngineEvent>,
}

impl AppState {
    /// Load registry, ledger journal and config from `data_dir`
    pub fn new(data_dir: PathBuf, timeout_ms: Option<u64>) -> CliResult<Self> {
        let storage = Storage::new(StorageConfig {
            data_dir: data_dir.clone(),
            ..Default::default()
        })?;

        let mut config = EngineConfig::load_or_default(&data_dir.join(CONFIG_FILE))?;
        if let Some(ms) = timeout_ms {
            config.execution_timeout_ms = ms;
        }

        let ledger = Arc::new(InMemoryLedger::with_entries(storage.load_ledger()?));
        let registry = WalletRegistry::restore(
            storage.load_registry()?,
            Arc::new(SystemClock),
            ledger.clone(),
            config,
        )?;
        let events = registry.subscribe();

        Ok(Self {
            registry,
            ledger,
            storage,
            events,
        })
    }

    /// Save the current state
    pub async fn save(&self) -> CliResult<()> {
        self.storage.save_registry(&self.registry.snapshot().await)?;
        self.storage.save_ledger(&self.ledger.entries())?;
        Ok(())
    }

    /// Print and log events emitted since the last call
    pub fn report_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            log::info!("Event: {:?}", event);
            match event {
                EngineEvent::WalletCreated {
                    wallet_id,
                    required_confirmations,
                    signers,
                } => println!(
                    "📣 WalletCreated {} ({}-of-{})",
                    wallet_id,
                    required_confirmations,
                    signers.len()
                ),
                EngineEvent::ProposalCreated {
                    wallet_id,
                    nonce,
                    proposer,
                } => println!(
                    "📣 ProposalCreated {} #{} by {}",
                    wallet_id, nonce, proposer
                ),
                EngineEvent::ProposalExecuted { wallet_id, nonce } => {
                    println!("📣 ProposalExecuted {} #{}", wallet_id, nonce)
                }
            }
        }
    }
}

/// Parse an address argument
pub fn parse_address(input: &str) -> CliResult<Address> {
    Ok(input.parse::<Address>()?)
}

fn print_proposal(view: &ProposalView, required: usize, now: Timestamp) {
    println!("   Proposal #{}", view.nonce);
    println!("      Proposer:      {}", view.proposer);
    println!("      To:            {}", view.target);
    println!("      Value:         {} ETH", format_ether(view.value));
    println!("      Data:          {}", format_call_data(&view.call_data));
    println!(
        "      Confirmations: {}/{} ({} rejected)",
        view.confirmations, required, view.rejections
    );
    println!("      Status:        {:?}", view.status);
    println!("      Executed:      {}", if view.executed { "YES" } else { "NO" });

    match view.remaining(now) {
        Some(0) => println!("      Deadline:      {} (now)", view.deadline),
        Some(secs) => println!(
            "      Deadline:      {} ({} left)",
            view.deadline,
            format_time_interval(secs)
        ),
        None => println!("      Deadline:      {} (passed)", view.deadline),
    }

    if !view.executed && view.confirmations >= required && view.remaining(now).is_some() {
        println!("      ✅ Ready to execute");
    }
}

/// Create a new wallet
pub async fn cmd_wallet_create(
    state: &mut AppState,
    signers: &[String],
    required: usize,
) -> CliResult<WalletId> {
    let signers = signers
        .iter()
        .map(|s| parse_address(s))
        .collect::<CliResult<Vec<_>>>()?;

    let id = state.registry.create_wallet(signers, required).await?;
    let wallet = state.registry.wallet(&id).await?;

    println!("✅ Wallet created!");
    println!("   Address:   {}", id);
    println!("   Threshold: {}", wallet.signer_set().await.description());

    state.report_events();
    state.save().await?;
    Ok(id)
}

/// List wallets, optionally only those a signer belongs to
pub async fn cmd_wallet_list(state: &AppState, signer: Option<&str>) -> CliResult<()> {
    let ids: Vec<WalletId> = match signer {
        Some(s) => {
            let signer = parse_address(s)?;
            if !state.registry.has_any_wallet(&signer).await {
                println!("👛 {} does not sign for any wallet.", signer);
                return Ok(());
            }
            state
                .registry
                .wallets_for_signer(&signer)
                .await
                .into_iter()
                .collect()
        }
        None => state.registry.wallet_ids().await,
    };

    if ids.is_empty() {
        println!("👛 No wallets created yet.");
        return Ok(());
    }

    println!("👛 Wallets ({}):", ids.len());
    for id in ids {
        let wallet = state.registry.wallet(&id).await?;
        println!(
            "   {} [{}] {} proposals",
            id,
            wallet.signer_set().await.description(),
            wallet.nonce().await
        );
    }
    Ok(())
}

/// Show wallet details
pub async fn cmd_wallet_info(state: &AppState, wallet: &str) -> CliResult<()> {
    let id = parse_address(wallet)?;
    let wallet = state.registry.wallet(&id).await?;
    let signer_set = wallet.signer_set().await;

    println!("👛 Wallet: {}", id);
    println!("   Threshold: {}", signer_set.description());
    println!("   Proposals: {}", wallet.nonce().await);
    println!("   Signers:");
    for signer in signer_set.signers() {
        println!("      {}", signer);
    }
    Ok(())
}

/// Propose a transfer or call
#[allow(clippy::too_many_arguments)]
pub async fn cmd_propose(
    state: &mut AppState,
    wallet: &str,
    from: &str,
    to: &str,
    value: &str,
    data: Option<&str>,
    deadline: DeadlineArg,
) -> CliResult<Nonce> {
    let id = parse_address(wallet)?;
    let from = parse_address(from)?;
    let to = parse_address(to)?;
    let value = parse_ether(value)?;
    let call_data = parse_call_data(data.unwrap_or("0x"))?;

    let deadline = match deadline {
        DeadlineArg::At(ts) => ts,
        DeadlineArg::In(secs) => {
            let now = state.registry.wallet(&id).await?.now().await;
            now.saturating_add(secs)
        }
    };

    let request = ProposalRequest::transfer(to, value, deadline).with_call_data(call_data);
    let nonce = state.registry.propose(&id, &from, request).await?;

    println!("📝 Proposal #{} submitted to {}", nonce, id);

    state.report_events();
    state.save().await?;
    Ok(nonce)
}

/// Confirm a proposal
pub async fn cmd_confirm(state: &mut AppState, wallet: &str, from: &str, nonce: Nonce) -> CliResult<()> {
    let id = parse_address(wallet)?;
    let from = parse_address(from)?;

    let outcome = state.registry.confirm(&id, &from, nonce).await;
    // Persist even on failure: a stale proposal is expired as a side effect
    state.save().await?;
    outcome?;

    let view = state.registry.proposal_at(&id, nonce).await?;
    let required = state.registry.required_confirmations(&id).await?;
    println!(
        "👍 Confirmed proposal #{} ({}/{} confirmations)",
        nonce, view.confirmations, required
    );
    Ok(())
}

/// Reject a proposal
pub async fn cmd_reject(state: &mut AppState, wallet: &str, from: &str, nonce: Nonce) -> CliResult<()> {
    let id = parse_address(wallet)?;
    let from = parse_address(from)?;

    let outcome = state.registry.reject(&id, &from, nonce).await;
    state.save().await?;
    outcome?;

    let view = state.registry.proposal_at(&id, nonce).await?;
    println!(
        "👎 Rejected proposal #{} ({} rejections)",
        nonce, view.rejections
    );
    Ok(())
}

/// Execute a proposal
pub async fn cmd_execute(state: &mut AppState, wallet: &str, from: &str, nonce: Nonce) -> CliResult<()> {
    let id = parse_address(wallet)?;
    let from = parse_address(from)?;

    let outcome = state.registry.execute(&id, &from, nonce).await;
    state.report_events();
    state.save().await?;
    let result = outcome?;

    println!("🚀 Executed proposal #{}", nonce);
    println!("   Action:    {:?}", result.receipt.kind);
    println!("   Reference: {}", result.receipt.reference);
    Ok(())
}

/// Show one proposal
pub async fn cmd_proposal(state: &AppState, wallet: &str, nonce: Nonce) -> CliResult<()> {
    let id = parse_address(wallet)?;
    let wallet = state.registry.wallet(&id).await?;

    let view = wallet.proposal_view(nonce).await?;
    print_proposal(&view, wallet.required_confirmations().await, wallet.now().await);
    Ok(())
}

/// Show every proposal of a wallet
pub async fn cmd_proposals(state: &AppState, wallet: &str) -> CliResult<()> {
    let id = parse_address(wallet)?;
    let wallet = state.registry.wallet(&id).await?;
    let required = wallet.required_confirmations().await;
    let now = wallet.now().await;

    let views = wallet.proposal_views().await;
    if views.is_empty() {
        println!("📭 No proposals for {}", id);
        return Ok(());
    }

    println!("📋 Proposals for {} ({}):", id, views.len());
    for view in &views {
        print_proposal(view, required, now);
    }
    Ok(())
}

/// Show actions performed by the ledger
pub fn cmd_ledger(state: &AppState) -> CliResult<()> {
    let entries = state.ledger.entries();
    if entries.is_empty() {
        println!("📒 Ledger is empty.");
        return Ok(());
    }

    println!("📒 Ledger ({} actions):", entries.len());
    for entry in entries {
        println!(
            "   {} {:?} {} -> {} {} ETH data={} at {}",
            entry.reference.get(..16).unwrap_or(&entry.reference),
            entry.kind,
            entry.source.short(),
            entry.target.short(),
            format_ether(entry.value),
            format_call_data(&entry.data),
            entry.recorded_at.to_rfc3339()
        );
    }
    Ok(())
}

/// List saved registry backups, newest first
pub fn cmd_backup_list(state: &AppState) -> CliResult<()> {
    let backups = state.storage.list_backups();
    if backups.is_empty() {
        println!("🗄️  No backups in {}", state.storage.data_dir().display());
        return Ok(());
    }

    println!("🗄️  Backups ({}):", backups.len());
    for index in backups {
        let snapshot = state.storage.restore_backup(index)?;
        println!(
            "   [{}] {} wallets, {} created",
            index,
            snapshot.wallets.len(),
            snapshot.wallets_created
        );
    }
    Ok(())
}

/// Replace the current registry with a saved backup
pub async fn cmd_backup_restore(state: &mut AppState, index: usize) -> CliResult<()> {
    let snapshot = state.storage.restore_backup(index)?;
    let registry = WalletRegistry::restore(
        snapshot,
        Arc::new(SystemClock),
        state.ledger.clone(),
        state.registry.config().clone(),
    )?;

    state.events = registry.subscribe();
    state.registry = registry;
    state.save().await?;

    println!(
        "♻️  Restored backup {} ({} wallets)",
        index,
        state.registry.wallet_count().await
    );
    Ok(())
}
