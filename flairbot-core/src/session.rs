use crate::error::CoreError;
use crate::types::InboxMessage;
use async_trait::async_trait;

/// Remote operations the flair pipeline needs from an authenticated session.
#[async_trait]
pub trait FlairSession: Send + Sync {
    /// Name of the authenticated account.
    async fn current_user(&self) -> Result<String, CoreError>;

    /// Point-in-time snapshot of the unread inbox.
    async fn unread_messages(&self) -> Result<Vec<InboxMessage>, CoreError>;

    /// Sets `username`'s flair on `subreddit` to `text` with the given CSS class.
    async fn set_flair(
        &self,
        subreddit: &str,
        username: &str,
        text: &str,
        css_class: &str,
    ) -> Result<(), CoreError>;

    async fn mark_read(&self, message: &InboxMessage) -> Result<(), CoreError>;
}
