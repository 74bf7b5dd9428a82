//! Transaction history command

use anyhow::Result;

use chain_activity::types::Direction;
use chain_activity::{ActivityConfig, ActivityService, Address, Snapshot};

use super::{parse_address, print_error, print_success};

/// Run the history command
pub async fn run(config: &ActivityConfig, address: &str, pages: usize) -> Result<()> {
    let account = parse_address(address)?;
    let service = ActivityService::from_config(config, None)?;
    service.set_account(Some(account.clone()));

    let mut loaded = 0;
    while loaded < pages.max(1) {
        if let Err(e) = service.fetch_history(loaded == 0).await {
            print_error(&e.to_string());
            return Ok(());
        }
        loaded += 1;
        if !service.snapshot().has_more {
            break;
        }
    }

    print_history(&service, &service.snapshot(), &account);
    Ok(())
}

fn print_history(service: &ActivityService, snapshot: &Snapshot, account: &Address) {
    let chain = service.registry().resolve(snapshot.selected_chain);

    println!();
    if snapshot.transactions.is_empty() {
        println!("No outgoing transactions on {}.", chain.name);
        println!();
        return;
    }

    print_success(&format!(
        "{} on {} ({} transactions)",
        account.short(),
        chain.name,
        snapshot.transactions.len()
    ));
    println!();
    println!(
        "{:<17} {:<9} {:<22} {:<14} {}",
        "Time", "Type", "Amount", "To", "Tx Hash"
    );
    println!("{}", "-".repeat(78));

    for tx in &snapshot.transactions {
        let time = tx
            .time()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let kind = match tx.direction(account) {
            Direction::Sent => "\x1b[31msent\x1b[0m    ",
            Direction::Received => "\x1b[32mreceived\x1b[0m",
        };
        let amount = format!("{} {}", tx.value, tx.token_symbol);
        let to = tx
            .to
            .parse::<Address>()
            .map(|a| a.short())
            .unwrap_or_else(|_| "-".to_string());
        let hash_short = tx.hash.get(..12).unwrap_or(&tx.hash);

        println!(
            "{:<17} {} {:<22} {:<14} {}...",
            time, kind, amount, to, hash_short
        );
    }

    println!();
    if let Some(latest) = snapshot.transactions.first() {
        println!("Latest: {}", chain.tx_url(&latest.hash));
    }
    if snapshot.has_more {
        println!("More transactions available. Use --pages to load more.");
    }
    println!();
}
