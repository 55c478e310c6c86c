//! Navigator that hands URLs to the user's browser.

use std::process::{Command, Stdio};

use codedeck_core::Navigator;
use tracing::debug;

/// Prints the target and launches the platform opener. Local routes
/// (anything that is not an absolute URL) are only printed.
pub struct BrowserNavigator;

impl Navigator for BrowserNavigator {
    fn navigate(&self, target: &str) {
        if !target.starts_with("http://") && !target.starts_with("https://") {
            debug!(url = %target, "navigation to local route");
            return;
        }

        println!("Opening {target}");

        let opener = if cfg!(target_os = "macos") {
            "open"
        } else if cfg!(target_os = "windows") {
            "explorer"
        } else {
            "xdg-open"
        };
        let spawned = Command::new(opener)
            .arg(target)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        if let Err(err) = spawned {
            debug!(error = %err, "no browser opener available, open the URL manually");
        }
    }
}
