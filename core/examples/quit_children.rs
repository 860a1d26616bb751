//! Example: Spawn a few `sleep` processes and quit them in one batch.
//!
//! One of them is whitelisted for the session and survives.

use std::process::Command;

use appquitter_core::{
    BatchEvent, MemoryStore, ProcessIdentity, QuitterConfig, QuitterEngine, SignalTerminator,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let engine = QuitterEngine::with_parts(
        SignalTerminator::new(),
        MemoryStore::new(),
        QuitterConfig::default(),
    )
    .await?;

    let mut candidates = Vec::new();
    for n in 1..=3 {
        let mut child = Command::new("sleep").arg("60").spawn()?;
        let pid = child.id();
        candidates.push(ProcessIdentity::new(
            format!("com.example.sleeper{}", n),
            pid,
            format!("Sleeper {}", n),
        )?);
        // Reap the child so it does not linger as a zombie once signalled.
        std::thread::spawn(move || child.wait());
    }

    engine.whitelist().add_to_session("com.example.sleeper2");
    println!("Quitting {} processes...\n", candidates.len());

    let survivor = candidates[1].pid();
    let mut handle = engine.quit_all(candidates);
    while let Some(event) = handle.next_event().await {
        match event {
            BatchEvent::Progress { report, .. } => println!("  {}", report.message()),
            BatchEvent::Completed(result) => {
                println!(
                    "\nDone: {} quit, {} failed, {} whitelisted",
                    result.succeeded().count(),
                    result.failed().count(),
                    result.filtered_count
                );
            }
        }
    }

    // Clean up the whitelisted one.
    Command::new("kill").arg(survivor.to_string()).status()?;
    Ok(())
}
