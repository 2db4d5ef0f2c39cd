use crate::config::Settings;
use anyhow::Context;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Bearer credential handed to each backend call. Never attached to a shared client.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    token: String,
}

impl Credentials {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: token.into().trim().to_string(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Parses an `Authorization: Bearer <token>` header value.
    pub fn from_authorization(header: &str) -> Option<Self> {
        let (scheme, token) = header.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
            return None;
        }
        Some(Self::bearer(token))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credentials(<redacted>)")
    }
}

/// File-backed token storage; the CLI's counterpart of browser local storage.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        Ok(Self::new(settings.require_token_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> anyhow::Result<Option<Credentials>> {
        match fs::read_to_string(&self.path).await {
            Ok(s) if s.trim().is_empty() => Ok(None),
            Ok(s) => Ok(Some(Credentials::bearer(s))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err)
                .with_context(|| format!("failed to read token file {}", self.path.display())),
        }
    }

    pub async fn save(&self, credentials: &Credentials) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&self.path, credentials.token())
            .await
            .with_context(|| format!("failed to write token file {}", self.path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .await
                .context("failed to restrict token file permissions")?;
        }
        Ok(())
    }

    /// Returns whether a token was removed.
    pub async fn clear(&self) -> anyhow::Result<bool> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err)
                .with_context(|| format!("failed to remove token file {}", self.path.display())),
        }
    }
}

/// `DAIRY_API_TOKEN` wins over the stored token.
pub async fn resolve_credentials(
    settings: &Settings,
    store: &TokenStore,
) -> anyhow::Result<Credentials> {
    if let Some(token) = settings.api_token.as_deref() {
        return Ok(Credentials::bearer(token));
    }
    store
        .load()
        .await?
        .context("not logged in: run `dairy login` or set DAIRY_API_TOKEN")
}
