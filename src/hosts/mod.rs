//! Hosts-file application primitive.
//!
//! Deliberately thin: the dispatcher hands this module already-validated
//! entries and a target path. Full hosts-file parsing belongs to the
//! client side; the helper only needs "apply entries to file" and a
//! structural sanity check.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::ipc::protocol::HostEntry;

/// Failures while touching the managed hosts file.
#[derive(Debug, Error)]
pub enum HostsError {
    #[error("hosts file not found: {0}")]
    NotFound(PathBuf),

    #[error("hosts file line {line} is malformed: {content:?}")]
    Malformed { line: usize, content: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl HostsError {
    fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Stable symbolic code for the wire and the audit trail.
    pub fn code(&self) -> &'static str {
        match self {
            HostsError::NotFound(_) => "FILE_NOT_FOUND",
            HostsError::Malformed { .. } => "VALIDATION_FAILED",
            HostsError::Io { source, .. } => match source.kind() {
                io::ErrorKind::NotFound => "FILE_NOT_FOUND",
                io::ErrorKind::PermissionDenied => "PERMISSION_DENIED",
                _ => "FILE_WRITE_FAILED",
            },
        }
    }
}

/// The hosts file the helper is allowed to mutate.
pub struct HostsFile {
    path: PathBuf,
}

impl HostsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Render and write the entries, replacing the file atomically via a
    /// temp file in the same directory.
    pub fn apply(&self, entries: &[HostEntry]) -> Result<usize, HostsError> {
        let rendered = render(entries);

        let tmp_path = self.path.with_extension("hosts-helper.tmp");
        {
            let mut tmp = File::create(&tmp_path)
                .map_err(|e| HostsError::io("failed to create temp hosts file", e))?;
            tmp.write_all(rendered.as_bytes())
                .map_err(|e| HostsError::io("failed to write temp hosts file", e))?;
            tmp.sync_all()
                .map_err(|e| HostsError::io("failed to sync temp hosts file", e))?;
        }
        fs::rename(&tmp_path, &self.path)
            .map_err(|e| HostsError::io("failed to replace hosts file", e))?;

        tracing::info!(path = %self.path.display(), entries = entries.len(), "hosts file written");
        Ok(entries.len())
    }

    /// Structural check: the file exists and every non-comment line has at
    /// least an address and one name. Returns the active entry count.
    pub fn validate(&self) -> Result<usize, HostsError> {
        if !self.path.is_file() {
            return Err(HostsError::NotFound(self.path.clone()));
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| HostsError::io("failed to read hosts file", e))?;

        let mut active = 0;
        for (i, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 2 {
                return Err(HostsError::Malformed {
                    line: i + 1,
                    content: line.to_string(),
                });
            }
            active += 1;
        }
        Ok(active)
    }
}

fn render(entries: &[HostEntry]) -> String {
    let mut out = String::from("# Managed by hosts-helper\n");
    for entry in entries {
        if !entry.enabled {
            out.push_str("# ");
        }
        out.push_str(&entry.ip);
        out.push('\t');
        out.push_str(&entry.hostname);
        if let Some(comment) = entry.comment.as_deref() {
            if !comment.is_empty() {
                out.push_str("\t# ");
                out.push_str(comment);
            }
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ip: &str, hostname: &str, enabled: bool) -> HostEntry {
        HostEntry {
            ip: ip.to_string(),
            hostname: hostname.to_string(),
            comment: None,
            enabled,
        }
    }

    #[test]
    fn apply_then_validate_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let hosts = HostsFile::new(dir.path().join("hosts"));

        let entries = vec![
            entry("10.0.0.1", "one.example.com", true),
            entry("10.0.0.2", "two.example.com", false),
        ];
        assert_eq!(hosts.apply(&entries).unwrap(), 2);

        // Disabled entries are written commented out and not counted active.
        assert_eq!(hosts.validate().unwrap(), 1);

        let content = fs::read_to_string(hosts.path()).unwrap();
        assert!(content.contains("10.0.0.1\tone.example.com"));
        assert!(content.contains("# 10.0.0.2\ttwo.example.com"));
    }

    #[test]
    fn comments_are_rendered() {
        let dir = tempfile::tempdir().unwrap();
        let hosts = HostsFile::new(dir.path().join("hosts"));

        let mut e = entry("10.0.0.1", "one.example.com", true);
        e.comment = Some("staging".to_string());
        hosts.apply(&[e]).unwrap();

        let content = fs::read_to_string(hosts.path()).unwrap();
        assert!(content.contains("# staging"));
    }

    #[test]
    fn validate_flags_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts");
        fs::write(&path, "127.0.0.1 localhost\nlonely-field\n").unwrap();

        let err = HostsFile::new(&path).validate().unwrap_err();
        assert!(matches!(err, HostsError::Malformed { line: 2, .. }));
    }

    #[test]
    fn validate_missing_file() {
        let err = HostsFile::new("/definitely/not/there").validate().unwrap_err();
        assert_eq!(err.code(), "FILE_NOT_FOUND");
    }
}
