//! Supported chains command

use anyhow::Result;

use chain_activity::persistence::{FilePreferenceStore, PreferenceStore};
use chain_activity::ActivityConfig;

use super::print_warning;

/// Run the chains command
pub async fn run(config: &ActivityConfig) -> Result<()> {
    let registry = config.registry()?;
    let preferences = FilePreferenceStore::new(config.preferences_path());

    let selected = match preferences.load() {
        Ok(Some(selection)) if registry.contains(selection.selected_chain) => {
            selection.selected_chain
        }
        Ok(_) => registry.default_chain(),
        Err(e) => {
            print_warning(&format!("Could not read preferences: {}", e));
            registry.default_chain()
        }
    };

    println!();
    println!(
        "  {:<8} {:<14} {:<8} {}",
        "Chain", "Name", "Currency", "Explorer"
    );
    println!("{}", "-".repeat(64));

    for chain in registry.supported() {
        let marker = if chain.id == selected { "*" } else { " " };
        println!(
            "{} {:<8} {:<14} {:<8} {}",
            marker,
            chain.id.to_string(),
            chain.name,
            chain.currency,
            chain.explorer_url
        );
    }

    println!();
    println!("* = selected");
    println!();

    Ok(())
}
