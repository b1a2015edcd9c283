//! Token management: `auth set|clear|status`

use anyhow::{bail, Context, Result};
use std::io::BufRead;

use crate::infrastructure::{CredentialStore, EnvCredentialStore, FileCredentialStore};
use crate::ui;

/// Environment variable read by `--token`
const TOKEN_VAR: &str = "GITHUB_TOKEN";

fn default_store() -> Result<FileCredentialStore> {
    FileCredentialStore::default_location()
        .context("Cannot locate a config directory; set HOME or XDG_CONFIG_HOME")
}

pub fn set(token: Option<String>) -> Result<()> {
    let token = match token {
        Some(token) => token,
        None => {
            let mut line = String::new();
            std::io::stdin()
                .lock()
                .read_line(&mut line)
                .context("Failed to read token from stdin")?;
            line
        }
    };
    if token.trim().is_empty() {
        bail!("Token must not be empty");
    }

    let store = default_store()?;
    store_token(&store, &token)?;
    ui::print_success(&format!("Token stored in {}", store.describe()));
    Ok(())
}

pub fn clear() -> Result<()> {
    let store = default_store()?;
    store.clear().context("Failed to remove stored token")?;
    ui::print_success(&format!("Token removed from {}", store.describe()));
    Ok(())
}

/// Report which source would supply the token, without printing it
pub fn status(explicit: Option<&str>) -> Result<()> {
    let env_store = EnvCredentialStore::new(TOKEN_VAR);
    let from_env = env_store.load().ok().flatten();

    if explicit.is_some() && explicit != from_env.as_deref() {
        ui::print_info("Token supplied with --token");
        return Ok(());
    }
    if from_env.is_some() {
        ui::print_info(&format!("Token supplied by {}", env_store.describe()));
        return Ok(());
    }

    let store = default_store()?;
    match store.load().context("Failed to read stored token")? {
        Some(token) => ui::print_info(&format!(
            "Token stored in {} ({})",
            store.describe(),
            mask(&token)
        )),
        None => ui::print_warning("No token configured; run `relay auth set` or set GITHUB_TOKEN"),
    }
    Ok(())
}

fn store_token(store: &dyn CredentialStore, token: &str) -> Result<()> {
    store.set(token).context("Failed to store token")
}

/// First and last four characters only
fn mask(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}
