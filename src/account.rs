use std::fmt;

use crate::classifier::{self, Classifier, Verdict};
use crate::config::{AccountConfig, ListDefaults};
use crate::list_store::{ListError, ListStore};
use crate::mailbox::{MailboxError, MailboxSession, MailboxTransport};
use crate::message::MessageFeatures;
use crate::report::Reporter;

/// One full sweep of an account's folders, either moving whitelisted mail
/// back to the inbox or deleting blacklisted mail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Whitelist,
    Blacklist,
}

impl Pass {
    pub fn verb(&self) -> &'static str {
        match self {
            Pass::Whitelist => "moved",
            Pass::Blacklist => "deleted",
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pass::Whitelist => write!(f, "whitelist"),
            Pass::Blacklist => write!(f, "blacklist"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PassError {
    #[error("missing parameter(s) {missing:?} for account {account}")]
    Config {
        account: String,
        missing: Vec<&'static str>,
    },
    #[error("cannot select folder {folder}: {source}")]
    Folder {
        folder: String,
        source: MailboxError,
    },
    #[error(transparent)]
    Mailbox(#[from] MailboxError),
    #[error(transparent)]
    List(#[from] ListError),
}

/// Explicit pass result. A pass is skipped without opening a connection
/// when the relevant list is not configured or empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    Skipped,
    Completed { affected: u64 },
}

/// Drives the whitelist and blacklist passes for one account: loads the
/// relevant list, walks every declared folder through the mailbox
/// collaborator, classifies each message, and applies move/delete actions.
pub struct AccountProcessor<'a, T: MailboxTransport> {
    transport: &'a T,
    defaults: &'a ListDefaults,
    reporter: &'a dyn Reporter,
}

impl<'a, T: MailboxTransport> AccountProcessor<'a, T> {
    pub fn new(transport: &'a T, defaults: &'a ListDefaults, reporter: &'a dyn Reporter) -> Self {
        AccountProcessor {
            transport,
            defaults,
            reporter,
        }
    }

    /// The required-field check precedes any network interaction; a
    /// failing account is reported and skipped, never partially processed.
    fn check_required(&self, account: &AccountConfig, pass: Pass) -> Result<(), PassError> {
        let missing = account.missing_fields(pass == Pass::Whitelist);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(PassError::Config {
                account: account.name.clone(),
                missing,
            })
        }
    }

    /// Move every message whose raw From value contains a whitelist entry
    /// (case-sensitive) to the account's inbox. No list mutation occurs.
    pub fn run_whitelist_pass(&self, account: &AccountConfig) -> Result<PassOutcome, PassError> {
        self.check_required(account, Pass::Whitelist)?;
        let host = account.host.as_deref().unwrap_or_default();
        let username = account.username.as_deref().unwrap_or_default();
        let password = account.password.as_deref().unwrap_or_default();
        let inbox = account.inbox.as_deref().unwrap_or_default();

        let Some(path) = account.whitelist_path(self.defaults) else {
            log::debug!("no whitelist configured for {}", account.name);
            return Ok(PassOutcome::Skipped);
        };
        let patterns = ListStore::new(path).load()?;
        if patterns.is_empty() {
            log::debug!("whitelist for {} is empty, skipping pass", account.name);
            return Ok(PassOutcome::Skipped);
        }

        let mut session = self.transport.connect(host)?;
        session.login(username, password)?;

        let mut moved = 0u64;
        for folder in account.folders() {
            session
                .select_folder(&folder)
                .map_err(|source| PassError::Folder {
                    folder: folder.clone(),
                    source,
                })?;
            let ids = session.list_message_ids()?;
            for (uid, raw) in session.fetch_raw(&ids)? {
                let features = MessageFeatures::extract(&raw, &folder);
                let Some(raw_from) = &features.raw_from else {
                    continue;
                };
                if let Some(pattern) = classifier::whitelist_match(&patterns, raw_from) {
                    let verdict = Verdict::MoveWhitelist {
                        pattern: pattern.to_string(),
                    };
                    session.move_messages(&[uid], inbox)?;
                    moved += 1;
                    self.reporter.action(
                        &account.name,
                        uid,
                        raw_from,
                        features.subject.as_deref().unwrap_or(""),
                        &verdict.reason(),
                    );
                }
            }
            session.close_folder()?;
        }

        self.reporter.summary(&account.name, Pass::Whitelist, moved);
        Ok(PassOutcome::Completed { affected: moved })
    }

    /// Delete every message the blacklist cascade condemns, harvesting new
    /// signals into the blacklist file along the way.
    pub fn run_blacklist_pass(&self, account: &AccountConfig) -> Result<PassOutcome, PassError> {
        self.check_required(account, Pass::Blacklist)?;
        let host = account.host.as_deref().unwrap_or_default();
        let username = account.username.as_deref().unwrap_or_default();
        let password = account.password.as_deref().unwrap_or_default();

        let Some(path) = account.blacklist_path(self.defaults) else {
            log::debug!("no blacklist configured for {}", account.name);
            return Ok(PassOutcome::Skipped);
        };
        let store = ListStore::new(path);
        let patterns = store.load()?;
        if patterns.is_empty() {
            log::debug!("blacklist for {} is empty, skipping pass", account.name);
            return Ok(PassOutcome::Skipped);
        }
        // Snapshot for the cascade; signals appended during this pass take
        // effect on the next run.
        let engine = Classifier::new(&patterns);

        let mut session = self.transport.connect(host)?;
        session.login(username, password)?;

        let mut deleted = 0u64;
        for folder in account.folders() {
            session
                .select_folder(&folder)
                .map_err(|source| PassError::Folder {
                    folder: folder.clone(),
                    source,
                })?;
            let harvest = Classifier::is_harvest_folder(&folder);
            let ids = session.list_message_ids()?;
            for (uid, raw) in session.fetch_raw(&ids)? {
                let features = MessageFeatures::extract(&raw, &folder);
                let subject = features.subject.as_deref().unwrap_or("");

                if harvest {
                    if let Some(address) = &features.from_address {
                        store.append_if_new(address)?;
                        if let Some(ip) = &features.origin_ip {
                            store.append_if_new(ip)?;
                        }
                        session.delete_messages(&[uid])?;
                        deleted += 1;
                        let verdict = Verdict::DeleteBlacklistFolder {
                            address: address.clone(),
                        };
                        self.reporter
                            .action(&account.name, uid, address, subject, &verdict.reason());
                    }
                }

                // The cascade runs below the harvest step as well.
                let verdict = engine.classify(&features);
                if verdict == Verdict::Keep {
                    continue;
                }
                if verdict.records_ip_signal() {
                    if let Some(ip) = &features.origin_ip {
                        store.append_if_new(ip)?;
                    }
                }
                session.delete_messages(&[uid])?;
                deleted += 1;
                self.reporter.action(
                    &account.name,
                    uid,
                    features.sender.as_deref().unwrap_or(""),
                    subject,
                    &verdict.reason(),
                );
            }
            session.close_folder()?;
        }

        self.reporter.summary(&account.name, Pass::Blacklist, deleted);
        Ok(PassOutcome::Completed { affected: deleted })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::MemoryMailbox;
    use crate::report::CollectingReporter;
    use std::path::Path;

    fn account(name: &str, folders: &str) -> AccountConfig {
        AccountConfig {
            name: name.to_string(),
            host: Some("mail.example.org".to_string()),
            username: Some("user".to_string()),
            password: Some("secret".to_string()),
            folder: Some(folders.to_string()),
            inbox: Some("INBOX".to_string()),
            blacklist: None,
            whitelist: None,
        }
    }

    fn spam_message(from: &str, subject: &str) -> Vec<u8> {
        format!(
            "Received: from relay.example.net ([203.0.113.9])\r\n\
\tby mx.example.org with ESMTP; Mon, 23 Oct 2023 10:00:00 +0000\r\n\
From: {from}\r\nTo: victim@example.org\r\nSubject: {subject}\r\n\r\nbody\r\n"
        )
        .into_bytes()
    }

    fn write_list(path: &Path, lines: &[&str]) {
        std::fs::write(path, lines.join("\n")).unwrap();
    }

    #[test]
    fn whitelist_pass_moves_matching_messages_to_inbox() {
        let dir = tempfile::tempdir().unwrap();
        let whitelist = dir.path().join("whitelist.txt");
        write_list(&whitelist, &["boss@work.example"]);

        let mailbox = MemoryMailbox::new();
        mailbox.add_folder("INBOX");
        mailbox.add_message("Spam", 1, &spam_message("Boss <boss@work.example>", "meeting"));
        mailbox.add_message("Spam", 2, &spam_message("other@example.org", "hello"));

        let mut acct = account("work", "Spam");
        acct.whitelist = Some(whitelist);
        let defaults = ListDefaults::default();
        let reporter = CollectingReporter::default();
        let processor = AccountProcessor::new(&mailbox, &defaults, &reporter);

        let outcome = processor.run_whitelist_pass(&acct).unwrap();
        assert_eq!(outcome, PassOutcome::Completed { affected: 1 });
        assert_eq!(mailbox.message_uids("INBOX"), vec![1]);
        assert_eq!(mailbox.message_uids("Spam"), vec![2]);
        assert_eq!(
            reporter.summaries.lock().unwrap().as_slice(),
            &[("work".to_string(), Pass::Whitelist, 1)]
        );
    }

    #[test]
    fn missing_host_aborts_before_any_connection() {
        let mailbox = MemoryMailbox::new();
        let mut acct = account("broken", "Spam");
        acct.host = None;
        let defaults = ListDefaults::default();
        let reporter = CollectingReporter::default();
        let processor = AccountProcessor::new(&mailbox, &defaults, &reporter);

        match processor.run_blacklist_pass(&acct) {
            Err(PassError::Config { missing, .. }) => assert_eq!(missing, vec!["host"]),
            other => panic!("expected config error, got {other:?}"),
        }
        assert_eq!(mailbox.connect_count(), 0);
    }

    #[test]
    fn empty_blacklist_skips_pass_without_connecting() {
        let dir = tempfile::tempdir().unwrap();
        let blacklist = dir.path().join("blacklist.txt");

        let mailbox = MemoryMailbox::new();
        let mut acct = account("quiet", "Spam");
        acct.blacklist = Some(blacklist);
        let defaults = ListDefaults::default();
        let reporter = CollectingReporter::default();
        let processor = AccountProcessor::new(&mailbox, &defaults, &reporter);

        let outcome = processor.run_blacklist_pass(&acct).unwrap();
        assert_eq!(outcome, PassOutcome::Skipped);
        assert_eq!(mailbox.connect_count(), 0);
    }

    #[test]
    fn blacklist_pass_deletes_and_records_ip_signal() {
        let dir = tempfile::tempdir().unwrap();
        let blacklist = dir.path().join("blacklist.txt");
        write_list(&blacklist, &["evil.com"]);

        let mailbox = MemoryMailbox::new();
        mailbox.add_message("Spam", 7, &spam_message("spam@evil.com", "buy now"));
        mailbox.add_message("Spam", 8, &spam_message("friend@example.org", "lunch"));

        let mut acct = account("victim", "Spam");
        acct.blacklist = Some(blacklist.clone());
        let defaults = ListDefaults::default();
        let reporter = CollectingReporter::default();
        let processor = AccountProcessor::new(&mailbox, &defaults, &reporter);

        let outcome = processor.run_blacklist_pass(&acct).unwrap();
        assert_eq!(outcome, PassOutcome::Completed { affected: 1 });
        assert_eq!(mailbox.message_uids("Spam"), vec![8]);
        let content = std::fs::read_to_string(&blacklist).unwrap();
        assert_eq!(content, "203.0.113.9\nevil.com");
    }

    #[test]
    fn blacklist_folder_harvests_sender_and_ip() {
        let dir = tempfile::tempdir().unwrap();
        let blacklist = dir.path().join("blacklist.txt");
        write_list(&blacklist, &["unrelated.example"]);

        let mailbox = MemoryMailbox::new();
        mailbox.add_message(
            "Blacklist",
            3,
            &spam_message("Crook <crook@scam.example>", "offer"),
        );

        let mut acct = account("victim", "Blacklist");
        acct.blacklist = Some(blacklist.clone());
        let defaults = ListDefaults::default();
        let reporter = CollectingReporter::default();
        let processor = AccountProcessor::new(&mailbox, &defaults, &reporter);

        let outcome = processor.run_blacklist_pass(&acct).unwrap();
        assert_eq!(outcome, PassOutcome::Completed { affected: 1 });
        assert!(mailbox.message_uids("Blacklist").is_empty());
        let content = std::fs::read_to_string(&blacklist).unwrap();
        assert_eq!(content, "203.0.113.9\ncrook@scam.example\nunrelated.example");
    }

    #[test]
    fn unknown_folder_aborts_the_account_pass() {
        let dir = tempfile::tempdir().unwrap();
        let blacklist = dir.path().join("blacklist.txt");
        write_list(&blacklist, &["evil.com"]);

        let mailbox = MemoryMailbox::new();
        mailbox.add_message("Spam", 1, &spam_message("spam@evil.com", "first"));

        // "Missing" is not a folder on the server; the whole pass aborts,
        // but the deletion already applied in "Spam" stands.
        let mut acct = account("victim", "Spam, Missing");
        acct.blacklist = Some(blacklist);
        let defaults = ListDefaults::default();
        let reporter = CollectingReporter::default();
        let processor = AccountProcessor::new(&mailbox, &defaults, &reporter);

        match processor.run_blacklist_pass(&acct) {
            Err(PassError::Folder { folder, .. }) => assert_eq!(folder, "Missing"),
            other => panic!("expected folder error, got {other:?}"),
        }
        assert!(mailbox.message_uids("Spam").is_empty());
        // No summary line for an aborted pass.
        assert!(reporter.summaries.lock().unwrap().is_empty());
    }

    #[test]
    fn message_without_ip_is_kept_by_cascade() {
        let dir = tempfile::tempdir().unwrap();
        let blacklist = dir.path().join("blacklist.txt");
        write_list(&blacklist, &["evil.com"]);

        let raw = b"From: spam@evil.com\r\nSubject: no trace headers\r\n\r\nbody\r\n";
        let mailbox = MemoryMailbox::new();
        mailbox.add_message("Spam", 5, raw);

        let mut acct = account("victim", "Spam");
        acct.blacklist = Some(blacklist);
        let defaults = ListDefaults::default();
        let reporter = CollectingReporter::default();
        let processor = AccountProcessor::new(&mailbox, &defaults, &reporter);

        let outcome = processor.run_blacklist_pass(&acct).unwrap();
        assert_eq!(outcome, PassOutcome::Completed { affected: 0 });
        assert_eq!(mailbox.message_uids("Spam"), vec![5]);
    }

    #[test]
    fn default_list_paths_are_used_when_account_has_none() {
        let dir = tempfile::tempdir().unwrap();
        let blacklist = dir.path().join("default-blacklist.txt");
        write_list(&blacklist, &["evil.com"]);

        let mailbox = MemoryMailbox::new();
        mailbox.add_message("Spam", 9, &spam_message("spam@evil.com", "buy"));

        let acct = account("victim", "Spam");
        let defaults = ListDefaults {
            blacklist: Some(blacklist),
            whitelist: None,
        };
        let reporter = CollectingReporter::default();
        let processor = AccountProcessor::new(&mailbox, &defaults, &reporter);

        let outcome = processor.run_blacklist_pass(&acct).unwrap();
        assert_eq!(outcome, PassOutcome::Completed { affected: 1 });
    }
}
