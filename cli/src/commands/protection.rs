//! Protection commands.

use anyhow::{bail, Result};
use serde_json::json;

use crate::Engine;

pub fn show(engine: &Engine, bundle_id: &str, as_json: bool) -> Result<()> {
    let reason = engine.protection_reason(bundle_id);

    if as_json {
        let value = json!({
            "bundleId": bundle_id,
            "protected": reason.is_some(),
            "reason": reason.as_ref().map(ToString::to_string),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    match reason {
        Some(reason) => println!("{}: protected ({})", bundle_id, reason),
        None => println!("{}: not protected", bundle_id),
    }
    Ok(())
}

pub fn check(engine: &Engine) -> Result<()> {
    let missing = engine.policy().validate();
    if !missing.is_empty() {
        bail!("Protection self-check failed for: {}", missing.join(", "));
    }
    println!("Protection self-check passed for {}", engine.policy().self_id());
    Ok(())
}
