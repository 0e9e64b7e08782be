// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential persistence: one JSON record per profile directory.
//!
//! The file is the only state that survives between invocations, so every
//! command re-reads it. Writes go through a temp file and a rename, so a
//! concurrent reader sees either the old record or the new one.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AuthError;

/// File name of the credential record inside the profile directory.
pub const CREDENTIALS_FILE: &str = "credentials.json";

/// The persisted OAuth token plus what is needed to refresh it unaided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Absent means the token never expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,
}

/// Everything a refresh needs, borrowed from a record that has all of it.
#[derive(Debug, Clone, Copy)]
pub struct RefreshParams<'a> {
    pub refresh_token: &'a str,
    pub client_id: &'a str,
    pub token_endpoint: &'a str,
}

impl CredentialRecord {
    /// Refresh is only possible when the token, client id and endpoint are
    /// all present and non-empty.
    pub fn refresh_params(&self) -> Option<RefreshParams<'_>> {
        let refresh_token = self.refresh_token.as_deref().filter(|s| !s.is_empty())?;
        let client_id = self.client_id.as_deref().filter(|s| !s.is_empty())?;
        let token_endpoint = self.token_endpoint.as_deref().filter(|s| !s.is_empty())?;
        Some(RefreshParams { refresh_token, client_id, token_endpoint })
    }

    /// Signed time left until expiry, or `None` for a non-expiring token.
    pub fn time_to_expiry(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.expiry.map(|e| e - now)
    }
}

/// Path of the credential file for a profile directory.
pub fn credentials_path(dir: &Path) -> PathBuf {
    dir.join(CREDENTIALS_FILE)
}

/// Read the record. `Ok(None)` means no file exists.
pub fn read(dir: &Path) -> Result<Option<CredentialRecord>, AuthError> {
    let path = credentials_path(dir);
    let contents = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(AuthError::io(path, e)),
    };
    let record = serde_json::from_str(&contents)
        .map_err(|source| AuthError::CorruptRecord { path: path.clone(), source })?;
    Ok(Some(record))
}

/// Write the record with owner-only permissions, creating the directory
/// (0700) if needed.
///
/// Uses a unique temp filename (PID + counter) so two writers in the same
/// directory never share a half-written temp file; the final rename is
/// last-writer-wins.
pub fn write(dir: &Path, record: &CredentialRecord) -> Result<(), AuthError> {
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    create_private_dir(dir)?;

    let path = credentials_path(dir);
    let json = serde_json::to_vec_pretty(record)
        .map_err(|source| AuthError::EncodeRecord { path: path.clone(), source })?;

    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_path = dir.join(format!(".{CREDENTIALS_FILE}.{}.{seq}.tmp", std::process::id()));

    let result = write_private_file(&tmp_path, &json)
        .and_then(|()| std::fs::rename(&tmp_path, &path));
    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(AuthError::io(path, e));
    }

    debug!(path = %path.display(), "credentials written");
    Ok(())
}

/// Remove the record. A missing file is success.
pub fn delete(dir: &Path) -> Result<(), AuthError> {
    let path = credentials_path(dir);
    match std::fs::remove_file(&path) {
        Ok(()) => {
            debug!(path = %path.display(), "credentials deleted");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AuthError::io(path, e)),
    }
}

fn create_private_dir(dir: &Path) -> Result<(), AuthError> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir).map_err(|e| AuthError::io(dir, e))
}

fn write_private_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
