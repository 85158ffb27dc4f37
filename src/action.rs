//! Turns the finished session into the one thing to do after the TUI closes.

use crate::browser;
use crate::checkout;
use crate::session::{Exit, Session};
use anyhow::Result;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Nothing,
    OpenInBrowser { url: String },
    CloneAndCheckout { repo_name: String, number: u64 },
}

/// The external commands an [`Action`] can run.
pub trait Handoff {
    fn open(&self, url: &str) -> Result<()>;
    fn checkout(&self, repo_name: &str, number: u64) -> Result<()>;
}

/// Runs the real browser launcher and `gh` checkout.
pub struct SystemHandoff {
    base_dir: PathBuf,
}

impl SystemHandoff {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }
}

impl Handoff for SystemHandoff {
    fn open(&self, url: &str) -> Result<()> {
        browser::open_or_print(url);
        Ok(())
    }

    fn checkout(&self, repo_name: &str, number: u64) -> Result<()> {
        checkout::clone_and_checkout(repo_name, number, &self.base_dir)
    }
}

pub fn resolve(session: &Session) -> Action {
    let exit = match session.exit() {
        None | Some(Exit::Quit) => return Action::Nothing,
        Some(exit) => exit,
    };

    let Some(entry) = session.highlighted() else {
        log::warn!("session ended with {:?} but nothing was highlighted", exit);
        return Action::Nothing;
    };

    match exit {
        Exit::Checkout => Action::CloneAndCheckout {
            repo_name: entry.repo_name.clone(),
            number: entry.number,
        },
        _ => Action::OpenInBrowser {
            url: entry.url.clone(),
        },
    }
}

pub fn perform(action: Action, handoff: &dyn Handoff) -> Result<()> {
    log::info!("performing {:?}", action);
    match action {
        Action::Nothing => Ok(()),
        Action::OpenInBrowser { url } => handoff.open(&url),
        Action::CloneAndCheckout { repo_name, number } => handoff.checkout(&repo_name, number),
    }
}
