use std::path::PathBuf;

use super::config::{default_config_path, GovConfig};

/// Write a commented default config file
pub fn execute(output: Option<PathBuf>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = output.unwrap_or_else(default_config_path);

    if path.exists() && !force {
        return Err(format!(
            "Config file already exists at {} (use --force to overwrite)",
            path.display()
        )
        .into());
    }

    GovConfig::create_default(&path)?;

    println!("✅ Wrote default config to {}", path.display());
    println!("   Fill in [rpc] and [contracts], or export the matching environment variables.");
    Ok(())
}
