use chrono::{DateTime, Utc};
use flairbot_core::FlairError;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub user: String,
    pub class_key: String,
    pub text: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(user: &str, class_key: &str, text: Option<&str>) -> Self {
        Self {
            user: user.to_string(),
            class_key: class_key.to_string(),
            text: text.map(str::to_string),
            timestamp: Utc::now(),
        }
    }
}

/// `user: <user> | class(es): <key>[ | text: <text>] @ <YYYY-MM-DD HH:MM:SS>`
pub fn format_entry(entry: &AuditEntry) -> String {
    let mut line = format!("user: {} | class(es): {}", entry.user, entry.class_key);
    if let Some(text) = entry.text.as_deref().filter(|t| !t.is_empty()) {
        line.push_str(" | text: ");
        line.push_str(text);
    }
    line.push_str(" @ ");
    line.push_str(&entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string());
    line
}

/// Append-only record of applied flairs. The file is opened for each entry
/// and closed again; earlier lines are never rewritten.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &AuditEntry) -> Result<(), FlairError> {
        let mut line = format_entry(entry);
        line.push('\n');

        let write = || -> std::io::Result<()> {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            file.write_all(line.as_bytes())
        };

        write().map_err(|source| FlairError::AuditWrite {
            path: self.path.display().to_string(),
            source,
        })?;

        debug!("Appended audit entry for {} to {}", entry.user, self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(text: Option<&str>) -> AuditEntry {
        AuditEntry {
            user: "coolUser123".to_string(),
            class_key: "23-24 season3 7".to_string(),
            text: text.map(str::to_string),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 5, 9, 3, 7).unwrap(),
        }
    }

    #[test]
    fn test_format_with_text() {
        assert_eq!(
            format_entry(&entry(Some("Veteran"))),
            "user: coolUser123 | class(es): 23-24 season3 7 | text: Veteran @ 2024-01-05 09:03:07"
        );
    }

    #[test]
    fn test_format_without_text() {
        assert_eq!(
            format_entry(&entry(None)),
            "user: coolUser123 | class(es): 23-24 season3 7 @ 2024-01-05 09:03:07"
        );
        assert_eq!(format_entry(&entry(Some(""))), format_entry(&entry(None)));
    }

    #[test]
    fn test_append_keeps_existing_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        std::fs::write(&path, "earlier line\n").unwrap();

        let log = AuditLog::new(&path);
        log.append(&entry(Some("Veteran"))).unwrap();
        log.append(&entry(Some("Vétéran ✓"))).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "earlier line");
        assert!(lines[1].contains("text: Veteran @"));
        assert!(lines[2].contains("text: Vétéran ✓ @"));
    }

    #[test]
    fn test_append_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("log.txt"));
        log.append(&entry(None)).unwrap();
        assert!(log.path().exists());
    }

    #[test]
    fn test_append_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("missing").join("log.txt"));
        assert!(matches!(
            log.append(&entry(None)),
            Err(FlairError::AuditWrite { .. })
        ));
    }
}
