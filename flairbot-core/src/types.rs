/// One item from the bot account's inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboxMessage {
    /// Reddit fullname, e.g. `t4_1a2b3c`.
    pub id: String,
    /// `None` when the sender's account has been deleted.
    pub author: Option<String>,
    pub subject: String,
    pub body: String,
}
