//! CLI Commands
//!
//! Implementation of all chain-activity CLI commands.

pub mod chains;
pub mod connect;
pub mod gas;
pub mod history;
pub mod nfts;
pub mod select;
pub mod tokens;

use anyhow::{anyhow, Result};

use chain_activity::{Address, ChainId, ChainRegistry};

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("\x1b[31mError:\x1b[0m {}", message);
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("\x1b[32m{}\x1b[0m", message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("\x1b[33mWarning:\x1b[0m {}", message);
}

/// Parse an account address argument
pub fn parse_address(raw: &str) -> Result<Address> {
    raw.parse()
        .map_err(|e| anyhow!("{}. Expected 0x followed by 40 hex digits", e))
}

/// Resolve a chain argument given as an id (`0x89`, `137`) or a name (`polygon`)
pub fn parse_chain(registry: &ChainRegistry, raw: &str) -> Result<ChainId> {
    let matches_name = |name: &str| {
        name.eq_ignore_ascii_case(raw)
            || name
                .split(' ')
                .next()
                .is_some_and(|first| first.eq_ignore_ascii_case(raw))
    };
    if let Some(info) = registry.supported().iter().find(|c| matches_name(c.name)) {
        return Ok(info.id);
    }

    let id: ChainId = raw.parse()?;
    if !registry.contains(id) {
        let names: Vec<&str> = registry.supported().iter().map(|c| c.name).collect();
        return Err(anyhow!(
            "Unsupported chain {}. Supported: {}",
            id,
            names.join(", ")
        ));
    }
    Ok(id)
}
