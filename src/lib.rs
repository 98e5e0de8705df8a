pub mod account;
pub mod classifier;
pub mod config;
pub mod coordinator;
pub mod list_store;
pub mod mailbox;
pub mod message;
pub mod report;

pub use account::{AccountProcessor, Pass, PassError, PassOutcome};
pub use classifier::{Classifier, Verdict};
pub use config::{AccountConfig, Config, ListDefaults};
pub use coordinator::{run_all, AccountResult, PassStatus, RunReport};
pub use list_store::{ListError, ListStore};
pub use mailbox::{MailboxError, MailboxSession, MailboxTransport, MemoryMailbox};
pub use message::MessageFeatures;
pub use report::{LogReporter, Reporter};
