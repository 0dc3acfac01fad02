//! Path command implementation

use anyhow::Result;
use rdm_core::ConfigStore;

/// Print the configuration file path
pub fn execute(store: &ConfigStore) -> Result<()> {
    println!("{}", store.path().display());
    Ok(())
}
