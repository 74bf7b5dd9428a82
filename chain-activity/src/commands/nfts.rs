//! NFT holdings command

use anyhow::Result;

use chain_activity::{ActivityConfig, ActivityService};

use super::{parse_address, print_success};

/// Run the nfts command
pub async fn run(config: &ActivityConfig, address: &str) -> Result<()> {
    let account = parse_address(address)?;
    let service = ActivityService::from_config(config, None)?;
    service.set_account(Some(account.clone()));
    service.fetch_nfts().await;

    let snapshot = service.snapshot();
    let chain = service.registry().resolve(snapshot.selected_chain);

    println!();
    if snapshot.nfts.is_empty() {
        println!("No NFTs found for {} on {}.", account.short(), chain.name);
        println!();
        return Ok(());
    }

    print_success(&format!(
        "NFTs of {} on {} ({})",
        account.short(),
        chain.name,
        snapshot.nfts.len()
    ));
    println!();

    for nft in &snapshot.nfts {
        println!("  {} \x1b[2m({})\x1b[0m", nft.name, nft.collection_name);
        println!(
            "    {} #{} [{}]",
            nft.contract_address, nft.token_id, nft.standard
        );
        if let Some(image) = &nft.image {
            println!("    {}", image);
        }
    }
    println!();

    Ok(())
}
