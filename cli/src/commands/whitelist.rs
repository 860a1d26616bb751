//! Whitelist commands - manage the persistent tier.

use anyhow::{bail, Result};

use crate::Engine;

pub async fn add(engine: &Engine, bundle_id: &str) -> Result<()> {
    engine.whitelist().add_to_persistent(bundle_id).await?;
    println!("Whitelisted {}", bundle_id);
    Ok(())
}

pub async fn remove(engine: &Engine, bundle_id: &str) -> Result<()> {
    if !engine.whitelist().remove_from_persistent(bundle_id).await? {
        bail!("{} is protected and cannot be removed", bundle_id);
    }
    println!("Removed {} from the whitelist", bundle_id);
    Ok(())
}

pub async fn toggle(engine: &Engine, bundle_id: &str) -> Result<()> {
    if engine.toggle_whitelist(bundle_id, true).await? {
        println!("{} is whitelisted", bundle_id);
    } else {
        println!("{} is no longer whitelisted", bundle_id);
    }
    Ok(())
}

pub fn list(engine: &Engine, json: bool) -> Result<()> {
    let entries = engine.whitelist().persistent_entries();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for id in &entries {
        let marker = if engine.is_protected(id) { " (protected)" } else { "" };
        println!("{}{}", id, marker);
    }
    println!("\nTotal: {} entries", entries.len());
    Ok(())
}

pub async fn clear(engine: &Engine) -> Result<()> {
    engine.whitelist().clear_persistent().await?;
    println!(
        "Cleared whitelist; {} protected entries kept",
        engine.whitelist().persistent_entries().len()
    );
    Ok(())
}
