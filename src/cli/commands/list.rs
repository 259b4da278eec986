//! List command - print the manifest of the data directory.

use crate::config::Settings;
use crate::registry::FileRegistry;

/// Scan the configured data directory once and print its manifest as JSON.
pub fn run(settings: &Settings) -> anyhow::Result<()> {
    let data_dir = settings.data_dir()?;
    let registry = FileRegistry::new(&data_dir)?;
    let manifest = registry.get_manifest();
    println!("{}", serde_json::to_string_pretty(&manifest)?);
    Ok(())
}
