//! Token balances command

use anyhow::Result;

use chain_activity::{ActivityConfig, ActivityService};

use super::{parse_address, print_success, print_warning};

/// Run the tokens command
pub async fn run(config: &ActivityConfig, address: &str) -> Result<()> {
    let account = parse_address(address)?;
    let service = ActivityService::from_config(config, None)?;
    service.set_account(Some(account.clone()));
    service.fetch_tokens().await;

    let snapshot = service.snapshot();
    let chain = service.registry().resolve(snapshot.selected_chain);

    println!();
    if snapshot.tokens.is_empty() {
        print_warning("Could not load balances. Run with --verbose for details.");
        return Ok(());
    }

    print_success(&format!("Balances of {} on {}", account.short(), chain.name));
    println!();
    println!("{:<10} {:<24} {:>18}  {}", "Symbol", "Name", "Balance", "Contract");
    println!("{}", "-".repeat(78));

    for token in &snapshot.tokens {
        let contract = if token.is_native {
            "native".to_string()
        } else {
            token.contract_address.clone()
        };
        println!(
            "{:<10} {:<24} {:>18}  {}",
            token.symbol, token.name, token.balance, contract
        );
    }
    println!();

    Ok(())
}
