// session.rs: login session persisted between CLI invocations

use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

const SESSION_FILE: &str = "session.json";

/// Stored in `~/.ragpile/session.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Value of the `ragpile_token` cookie.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl Session {
    /// Load session from `session.json` in the given ragpile directory.
    ///
    /// Returns an empty session if the file doesn't exist.
    pub fn load(home: &Path) -> io::Result<Self> {
        let path = home.join(SESSION_FILE);
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
        } else {
            Ok(Self::default())
        }
    }

    /// Write the session. On Unix the file is readable by its owner only.
    pub fn save(&self, home: &Path) -> io::Result<()> {
        std::fs::create_dir_all(home)?;
        let content = serde_json::to_string_pretty(self)?;
        let path = home.join(SESSION_FILE);

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
            options.mode(0o600);
            if path.exists() {
                std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
            }
        }
        let mut file = options.open(&path)?;
        file.write_all(content.as_bytes())
    }

    /// Token to send: `RAGPILE_TOKEN` wins over the stored one.
    pub fn effective_token(&self, env_token: Option<String>) -> Option<String> {
        env_token
            .filter(|t| !t.is_empty())
            .or_else(|| self.token.clone())
    }
}
