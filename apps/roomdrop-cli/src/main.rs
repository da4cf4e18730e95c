//! Sends files between two peers of an in-memory room and saves what the
//! receiving peer accepted.

mod args;
mod config;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use roomdrop_file_share::{
    Direction, ReceiveDecision, ReceiveRequestHandler, TransferConfig, TransferCoordinator,
    TransferRecord, TransferStatus,
};
use roomdrop_protocol::{FileId, Metadata};
use roomdrop_room::{MemoryRoom, PeerChannel};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use args::Args;

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str =
    "info,roomdrop_cli=debug,roomdrop_file_share=debug,roomdrop_room=debug";

/// Upper bound on waiting for the receiving side once every send finished.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let args = Args::parse();
    let config_path = config::config_file_path(args.config.clone());
    let mut config = TransferConfig::load(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;
    args.apply(&mut config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        files = args.files.len(),
        "starting roomdrop"
    );

    let room = MemoryRoom::new();
    let sender = TransferCoordinator::new(TransferConfig {
        display_name: format!("{} (sender)", config.display_name),
        ..config.clone()
    });
    let receiver = TransferCoordinator::new(TransferConfig {
        display_name: format!("{} (receiver)", config.display_name),
        ..config.clone()
    });
    receiver.set_receive_handler(Some(size_limit_handler(config.max_accept_bytes)));

    let (sender_member, sender_inbound) = room.join(&sender.config().display_name);
    let (receiver_member, receiver_inbound) = room.join(&receiver.config().display_name);
    let receiver_id = receiver_member.local_peer().id;
    sender.attach(Arc::new(sender_member), sender_inbound);
    receiver.attach(Arc::new(receiver_member), receiver_inbound);

    let mut sent = Vec::with_capacity(args.files.len());
    for path in &args.files {
        match sender.send_path(path, Some(receiver_id.clone())).await {
            Ok(id) => sent.push(id),
            Err(e) => warn!(path = %path.display(), error = %e, "cannot send file"),
        }
    }
    let unreadable = args.files.len() - sent.len();

    let outbound = wait_terminal(&sender, &sent, Direction::Send).await?;
    let announced: Vec<FileId> = outbound
        .iter()
        .filter(|r| receiver.transfer(&r.id, Direction::Receive).is_some())
        .map(|r| r.id.clone())
        .collect();
    let inbound = tokio::time::timeout(
        SETTLE_TIMEOUT + config.reassembly_grace(),
        wait_terminal(&receiver, &announced, Direction::Receive),
    )
    .await
    .context("timed out waiting for the receiving peer")??;

    let mut failed = unreadable;
    for record in &outbound {
        let received = inbound.iter().find(|r| r.id == record.id);
        match received.map(|r| r.status) {
            Some(TransferStatus::Completed) => {
                let saved = receiver.download_file(&record.id).await?;
                match saved {
                    Some(path) => println!("{}  ->  {}", record.name, path.display()),
                    None => println!("{}  ->  (not saved)", record.name),
                }
            }
            _ => {
                failed += 1;
                let reason = received
                    .and_then(|r| r.error.as_deref())
                    .or(record.error.as_deref())
                    .unwrap_or("unknown error");
                println!("{}  failed: {reason}", record.name);
            }
        }
    }

    sender.detach();
    receiver.detach();

    if failed > 0 {
        anyhow::bail!("{failed} of {} transfers failed", args.files.len());
    }
    Ok(())
}

/// Accepts every file unless it is larger than `limit`.
fn size_limit_handler(limit: Option<u64>) -> ReceiveRequestHandler {
    Arc::new(move |metadata: Metadata, decision: ReceiveDecision| match limit {
        Some(limit) if metadata.size > limit => {
            info!(file = %metadata.name, size = metadata.size, limit, "rejecting oversized file");
            decision.reject(format!("file too large ({} > {limit} bytes)", metadata.size));
        }
        _ => decision.accept(),
    })
}

/// Waits until every record in `ids` for `direction` is completed or failed.
async fn wait_terminal(
    coord: &TransferCoordinator,
    ids: &[FileId],
    direction: Direction,
) -> anyhow::Result<Vec<TransferRecord>> {
    let wanted: HashSet<&FileId> = ids.iter().collect();
    let mut updates = coord.subscribe();
    let records = updates
        .wait_for(|records| {
            let done = records
                .iter()
                .filter(|r| r.direction == direction && wanted.contains(&r.id))
                .filter(|r| r.is_terminal())
                .count();
            done == wanted.len()
        })
        .await
        .context("transfer store closed")?
        .iter()
        .filter(|r| r.direction == direction && wanted.contains(&r.id))
        .cloned()
        .collect();
    Ok(records)
}
