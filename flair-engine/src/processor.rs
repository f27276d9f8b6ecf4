//! One pass over the unread inbox.
//!
//! Each message moves through: received → filtered (subject and author
//! checks) → classified (key extracted from the body) → resolved (key found
//! in the flair table) → applied (flair set, audit line written) →
//! acknowledged (marked read). Messages that fail the filter stay unread and
//! see no remote calls. Every message that passes the filter is marked read,
//! except when setting the flair itself fails; those stay unread so the next
//! pass picks them up again.

use crate::audit_log::{AuditEntry, AuditLog};
use crate::classify::{check_author, extract_class, AuthorCheck};
use crate::flair_table::FlairTable;
use flairbot_core::{CoreError, ErrorExt, FlairSession, InboxMessage, Settings};
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// Everything a pass needs besides the session.
#[derive(Debug, Clone)]
pub struct ProcessorContext {
    pub subject: String,
    pub subreddit: String,
    pub table: FlairTable,
    /// `None` when audit logging is switched off.
    pub audit: Option<AuditLog>,
}

impl ProcessorContext {
    pub fn from_settings<P: Into<PathBuf>>(
        settings: &Settings,
        table: FlairTable,
        audit_path: P,
    ) -> Self {
        Self {
            subject: settings.subject.clone(),
            subreddit: settings.subreddit.clone(),
            table,
            audit: settings.logging.then(|| AuditLog::new(audit_path)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Wrong subject or author; left unread.
    Ignored,
    /// No classification key in the body.
    NoClassification,
    /// Key extracted but absent from the flair table.
    UnknownClass { class_key: String },
    Applied { user: String, class_key: String },
    /// Reddit refused or never answered the flair call; left unread.
    FlairFailed { user: String, class_key: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageResult {
    pub outcome: Outcome,
    pub marked_read: bool,
    pub audit_failed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub examined: usize,
    pub ignored: usize,
    pub no_classification: usize,
    pub unknown_class: usize,
    pub applied: usize,
    pub flair_failed: usize,
    pub mark_read_failed: usize,
    pub audit_failed: usize,
}

impl PassSummary {
    pub fn record(&mut self, result: &MessageResult) {
        self.examined += 1;
        match result.outcome {
            Outcome::Ignored => self.ignored += 1,
            Outcome::NoClassification => self.no_classification += 1,
            Outcome::UnknownClass { .. } => self.unknown_class += 1,
            Outcome::Applied { .. } => self.applied += 1,
            Outcome::FlairFailed { .. } => self.flair_failed += 1,
        }

        let expected_read = !matches!(
            result.outcome,
            Outcome::Ignored | Outcome::FlairFailed { .. }
        );
        if expected_read && !result.marked_read {
            self.mark_read_failed += 1;
        }
        if result.audit_failed {
            self.audit_failed += 1;
        }
    }
}

/// Author to flair, if the message passes the subject and author checks.
fn accepted_author<'a>(ctx: &ProcessorContext, message: &'a InboxMessage) -> Option<&'a str> {
    if message.subject != ctx.subject {
        return None;
    }

    let author = message.author.as_deref()?;
    match check_author(author) {
        AuthorCheck::Valid => Some(author),
        AuthorCheck::TrailingCharacters { matched } => {
            warn!(
                "Author '{}' of {} only partly looks like a username (matched '{}')",
                author, message.id, matched
            );
            Some(author)
        }
        AuthorCheck::Invalid => None,
    }
}

pub async fn process_message<S>(
    session: &S,
    ctx: &ProcessorContext,
    message: &InboxMessage,
) -> MessageResult
where
    S: FlairSession + ?Sized,
{
    let Some(author) = accepted_author(ctx, message) else {
        debug!("Ignoring {} (subject '{}')", message.id, message.subject);
        return MessageResult {
            outcome: Outcome::Ignored,
            marked_read: false,
            audit_failed: false,
        };
    };

    let mut audit_failed = false;
    let outcome = match extract_class(&message.body) {
        None => {
            warn!(
                "No flair class found in {} from {}, marking read",
                message.id, author
            );
            Outcome::NoClassification
        }
        Some(class_key) => match ctx.table.get(class_key) {
            None => {
                debug!("Class '{}' requested by {} is not in the flair table", class_key, author);
                Outcome::UnknownClass {
                    class_key: class_key.to_string(),
                }
            }
            Some(text) => {
                let flair_text = text.unwrap_or("");
                match session
                    .set_flair(&ctx.subreddit, author, flair_text, class_key)
                    .await
                {
                    Ok(()) => {
                        info!(
                            "Applied flair '{}' ({}) to {} on r/{}",
                            flair_text, class_key, author, ctx.subreddit
                        );
                        if let Some(audit) = &ctx.audit {
                            let entry = AuditEntry::new(author, class_key, text);
                            if let Err(e) = audit.append(&entry) {
                                e.log_error();
                                audit_failed = true;
                            }
                        }
                        Outcome::Applied {
                            user: author.to_string(),
                            class_key: class_key.to_string(),
                        }
                    }
                    Err(e) => {
                        error!(
                            "Could not set flair for {} ({}), leaving {} unread: {}",
                            author, class_key, message.id, e
                        );
                        return MessageResult {
                            outcome: Outcome::FlairFailed {
                                user: author.to_string(),
                                class_key: class_key.to_string(),
                            },
                            marked_read: false,
                            audit_failed,
                        };
                    }
                }
            }
        },
    };

    let marked_read = match session.mark_read(message).await {
        Ok(()) => true,
        Err(e) => {
            error!("Could not mark {} as read: {}", message.id, e);
            false
        }
    };

    MessageResult {
        outcome,
        marked_read,
        audit_failed,
    }
}

/// Fetches the unread inbox once and processes it in order. Only the fetch
/// can fail the pass; per-message problems are counted in the summary.
pub async fn run_pass<S>(session: &S, ctx: &ProcessorContext) -> Result<PassSummary, CoreError>
where
    S: FlairSession + ?Sized,
{
    let messages = session.unread_messages().await?;
    info!("Processing {} unread messages", messages.len());

    let mut summary = PassSummary::default();
    for message in &messages {
        let result = process_message(session, ctx, message).await;
        summary.record(&result);
    }

    info!(
        "Pass complete: {} examined, {} applied, {} unknown class, {} without class, {} ignored, {} failed",
        summary.examined,
        summary.applied,
        summary.unknown_class,
        summary.no_classification,
        summary.ignored,
        summary.flair_failed
    );
    Ok(summary)
}
