//! Host token storage
//!
//! The token is resolved once at startup and is read-only afterwards.
//! Resolution order: explicit `--token` / `GITHUB_TOKEN`, then the store.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::error::CredentialError;

/// Where the host token is kept between runs
pub trait CredentialStore: Send + Sync {
    /// Human-readable location, for status output
    fn describe(&self) -> String;

    fn load(&self) -> Result<Option<String>, CredentialError>;

    fn set(&self, token: &str) -> Result<(), CredentialError>;

    fn clear(&self) -> Result<(), CredentialError>;
}

/// Token file under the user's config directory
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$XDG_CONFIG_HOME/relay/token`, falling back to `~/.config/relay/token`
    pub fn default_location() -> Option<Self> {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .filter(|p| p.is_absolute())
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
        Some(Self::new(base.join("relay").join("token")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> CredentialError {
        CredentialError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<Option<String>, CredentialError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(non_blank(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn set(&self, token: &str) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path).map_err(|e| self.io_error(e))?;

        // `mode` only applies on creation; tighten a file left by an older run
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .map_err(|e| self.io_error(e))?;
        }

        file.write_all(format!("{}\n", token.trim()).as_bytes())
            .map_err(|e| self.io_error(e))?;

        debug!(path = %self.path.display(), "Stored token");
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

/// Read-only store backed by an environment variable
pub struct EnvCredentialStore {
    var: String,
}

impl EnvCredentialStore {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialStore for EnvCredentialStore {
    fn describe(&self) -> String {
        format!("${}", self.var)
    }

    fn load(&self) -> Result<Option<String>, CredentialError> {
        Ok(std::env::var(&self.var).ok().and_then(|v| non_blank(&v)))
    }

    fn set(&self, _token: &str) -> Result<(), CredentialError> {
        Err(CredentialError::ReadOnly {
            store: self.describe(),
        })
    }

    fn clear(&self) -> Result<(), CredentialError> {
        Err(CredentialError::ReadOnly {
            store: self.describe(),
        })
    }
}

/// Process-local store
#[derive(Default)]
pub struct MemoryCredentialStore {
    token: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: Mutex::new(token),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.token.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn load(&self) -> Result<Option<String>, CredentialError> {
        Ok(self.slot().clone())
    }

    fn set(&self, token: &str) -> Result<(), CredentialError> {
        *self.slot() = non_blank(token);
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialError> {
        *self.slot() = None;
        Ok(())
    }
}

/// Resolve the token for this run.
///
/// A store read failure is logged and treated as "no token"; the host
/// client then fails with `MissingCredential` on first use.
pub fn discover_token(explicit: Option<String>, store: Option<&dyn CredentialStore>) -> Option<String> {
    explicit
        .and_then(|t| non_blank(&t))
        .or_else(|| {
            store.and_then(|s| match s.load() {
                Ok(token) => token,
                Err(e) => {
                    debug!(store = %s.describe(), error = %e, "Could not read stored token");
                    None
                }
            })
        })
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
