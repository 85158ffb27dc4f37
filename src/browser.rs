//! Opening pull requests in the user's browser.

use anyhow::{Context, Result};

/// Launch the system browser without waiting for it.
pub fn open_url(url: &str) -> Result<()> {
    webbrowser::open(url).with_context(|| format!("Failed to open {url} in a browser"))?;
    log::info!("opened {url}");
    Ok(())
}

/// Open `url`, printing it for the user when no browser can be launched.
/// Only call this once the terminal has been restored.
pub fn open_or_print(url: &str) {
    if let Err(err) = open_url(url) {
        log::warn!("{:#}", err);
        println!("Please open this URL manually: {url}");
    }
}
