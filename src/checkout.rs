use anyhow::{Context, Result};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Where `owner/name` lives under the clone base directory.
pub fn clone_target(base_dir: &Path, repo_name: &str) -> PathBuf {
    repo_name
        .split('/')
        .filter(|part| !part.is_empty())
        .fold(base_dir.to_path_buf(), |dir, part| dir.join(part))
}

/// Anything but an explicit no counts as yes, matching the `[Y/n]` prompt.
pub fn confirms(answer: &str) -> bool {
    !matches!(answer.trim().to_ascii_lowercase().as_str(), "n" | "no")
}

fn prompt_clone(repo_name: &str, dir: &Path) -> Result<bool> {
    print!("Clone {} into {}? [Y/n]: ", repo_name, dir.display());
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(confirms(&input))
}

fn run_gh(args: &[&str], dir: Option<&Path>) -> Result<()> {
    let mut cmd = Command::new("gh");
    cmd.args(args);
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }

    let status = cmd
        .status()
        .with_context(|| format!("Failed to run gh {}", args.join(" ")))?;
    if !status.success() {
        anyhow::bail!("gh {} exited with {}", args.join(" "), status);
    }
    Ok(())
}

/// Clone the repository if needed, check out the PR, then hand the terminal
/// to a shell inside the checkout. Only returns early if the user declines
/// the clone or something fails.
pub fn clone_and_checkout(repo_name: &str, number: u64, base_dir: &Path) -> Result<()> {
    let dir = clone_target(base_dir, repo_name);

    if dir.exists() {
        println!("Found existing repository {}", dir.display());
    } else {
        if !prompt_clone(repo_name, &dir)? {
            println!("Skipping clone.");
            return Ok(());
        }

        if let Some(parent) = dir.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        println!("Cloning {} into {}", repo_name, dir.display());
        let target = dir.to_string_lossy();
        run_gh(&["repo", "clone", repo_name, &target], None)?;
    }

    log::info!("checking out {}#{} in {}", repo_name, number, dir.display());
    run_gh(&["pr", "checkout", &number.to_string()], Some(&dir))?;
    println!("Checked out PR #{} in {}", number, dir.display());

    std::env::set_current_dir(&dir)
        .with_context(|| format!("Failed to change directory to {}", dir.display()))?;
    hand_off_to_shell()
}

fn user_shell() -> String {
    std::env::var("SHELL")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "/bin/sh".to_string())
}

#[cfg(unix)]
fn hand_off_to_shell() -> Result<()> {
    use std::os::unix::process::CommandExt;

    let shell = user_shell();
    log::info!("replacing process with {shell}");
    // exec only returns on failure
    let err = Command::new(&shell).exec();
    Err(anyhow::Error::from(err).context(format!("Failed to exec {shell}")))
}

#[cfg(not(unix))]
fn hand_off_to_shell() -> Result<()> {
    let shell = user_shell();
    log::info!("spawning {shell}");
    let status = Command::new(&shell)
        .status()
        .with_context(|| format!("Failed to launch {shell}"))?;
    std::process::exit(status.code().unwrap_or(1));
}
