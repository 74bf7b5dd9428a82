//! Chain selection command

use anyhow::Result;

use chain_activity::persistence::{ChainSelection, FilePreferenceStore, PreferenceStore};
use chain_activity::ActivityConfig;

use super::{parse_chain, print_error, print_success};

/// Run the select command
pub async fn run(config: &ActivityConfig, chain: &str) -> Result<()> {
    let registry = config.registry()?;

    let chain = match parse_chain(&registry, chain) {
        Ok(id) => id,
        Err(e) => {
            print_error(&e.to_string());
            return Ok(());
        }
    };

    let preferences = FilePreferenceStore::new(config.preferences_path());
    preferences.save(&ChainSelection {
        selected_chain: chain,
    })?;

    let info = registry.resolve(chain);
    print_success(&format!("Selected {} ({})", info.name, info.id));

    Ok(())
}
