pub mod audit_log;
pub mod classify;
pub mod flair_table;
pub mod processor;

pub use audit_log::{format_entry, AuditEntry, AuditLog};
pub use classify::{check_author, extract_class, AuthorCheck};
pub use flair_table::FlairTable;
pub use processor::{process_message, run_pass, MessageResult, Outcome, PassSummary, ProcessorContext};
