//! Terminal implementation of the interactive browser surface
//!
//! Prints the URL for the user to open in their own browser and reads the
//! resulting callback URL (or an empty line for dismissal) from stdin.

use photos_auth::{HostError, HostOutcome, InteractionHost, Url};

pub struct ConsoleInteractionHost;

impl InteractionHost for ConsoleInteractionHost {
    async fn present_url(&self, url: Url, callback_prefix: &str) -> Result<HostOutcome, HostError> {
        println!("\nOpen this URL in your browser:\n\n  {}\n", url);
        if callback_prefix.is_empty() {
            println!("Press Enter once you have finished (or to cancel):");
        } else {
            println!(
                "Paste the {} callback URL here (empty line to cancel):",
                callback_prefix
            );
        }

        let line = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| line)
        })
        .await
        .map_err(|e| HostError::Failed(format!("stdin task failed: {}", e)))?
        .map_err(|e| HostError::Unavailable(format!("stdin read failed: {}", e)))?;

        let line = line.trim();
        if line.is_empty() {
            return Ok(HostOutcome::Dismissed);
        }

        let callback =
            Url::parse(line).map_err(|e| HostError::Failed(format!("not a valid URL: {}", e)))?;
        Ok(HostOutcome::Callback(callback))
    }
}
