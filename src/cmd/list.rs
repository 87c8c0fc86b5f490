//! List command - show registry records

use std::path::PathBuf;

use anyhow::Result;

use upack::store::{LocalRegistry, RegistryScope};

pub fn list(scope: RegistryScope, registry_root: Option<PathBuf>) -> Result<()> {
    let registry = match registry_root {
        Some(root) => Some(LocalRegistry::open_at(&root)?),
        None => LocalRegistry::open(scope)?,
    };

    let Some(registry) = registry else {
        println!("No registry for scope 'none'");
        return Ok(());
    };

    let records = registry.list()?;
    if records.is_empty() {
        println!("No packages installed");
        return Ok(());
    }

    for record in records {
        let full_name = match &record.group {
            Some(group) => format!("{group}/{}", record.name),
            None => record.name.clone(),
        };
        println!(
            "{full_name} {} ({}) installed {} via {}",
            record.version, record.install_path, record.installation_date, record.installed_using
        );
    }
    Ok(())
}
