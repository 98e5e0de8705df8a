use crate::account::{AccountProcessor, Pass, PassError, PassOutcome};
use crate::config::Config;
use crate::mailbox::MailboxTransport;
use crate::report::Reporter;

/// Outcome of one pass for one account, recorded as a value instead of
/// unwinding control flow so the coordinator can aggregate and continue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassStatus {
    Skipped,
    Completed(u64),
    Failed(String),
}

impl PassStatus {
    fn from_result(result: Result<PassOutcome, PassError>) -> Self {
        match result {
            Ok(PassOutcome::Skipped) => PassStatus::Skipped,
            Ok(PassOutcome::Completed { affected }) => PassStatus::Completed(affected),
            Err(error) => PassStatus::Failed(error.to_string()),
        }
    }

    fn affected(&self) -> u64 {
        match self {
            PassStatus::Completed(n) => *n,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountResult {
    pub account: String,
    pub whitelist: PassStatus,
    pub blacklist: PassStatus,
}

impl AccountResult {
    pub fn moved(&self) -> u64 {
        self.whitelist.affected()
    }

    pub fn deleted(&self) -> u64 {
        self.blacklist.affected()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub accounts: Vec<AccountResult>,
}

impl RunReport {
    pub fn total_moved(&self) -> u64 {
        self.accounts.iter().map(AccountResult::moved).sum()
    }

    pub fn total_deleted(&self) -> u64 {
        self.accounts.iter().map(AccountResult::deleted).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, Pass, &str)> {
        self.accounts.iter().flat_map(|result| {
            let mut failures = Vec::new();
            if let PassStatus::Failed(reason) = &result.whitelist {
                failures.push((result.account.as_str(), Pass::Whitelist, reason.as_str()));
            }
            if let PassStatus::Failed(reason) = &result.blacklist {
                failures.push((result.account.as_str(), Pass::Blacklist, reason.as_str()));
            }
            failures
        })
    }
}

/// Sweep every configured account: whitelist pass first, so that rescued
/// mail is out of the scanned folders before the blacklist pass, then the
/// blacklist pass. Failures are isolated per account and per pass.
pub fn run_all<T: MailboxTransport>(
    config: &Config,
    transport: &T,
    reporter: &dyn Reporter,
) -> RunReport {
    let mut report = RunReport::default();
    for account in &config.accounts {
        let processor = AccountProcessor::new(transport, &config.defaults, reporter);

        let whitelist = processor.run_whitelist_pass(account);
        if let Err(error) = &whitelist {
            reporter.failure(&account.name, Pass::Whitelist, error);
        }
        // The blacklist pass runs even when the whitelist pass failed; the
        // two passes have independent requirements.
        let blacklist = processor.run_blacklist_pass(account);
        if let Err(error) = &blacklist {
            reporter.failure(&account.name, Pass::Blacklist, error);
        }

        report.accounts.push(AccountResult {
            account: account.name.clone(),
            whitelist: PassStatus::from_result(whitelist),
            blacklist: PassStatus::from_result(blacklist),
        });
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AccountConfig, ListDefaults};
    use crate::mailbox::MemoryMailbox;
    use crate::report::CollectingReporter;

    fn account(name: &str) -> AccountConfig {
        AccountConfig {
            name: name.to_string(),
            host: Some("mail.example.org".to_string()),
            username: Some("user".to_string()),
            password: Some("secret".to_string()),
            folder: Some("Spam".to_string()),
            inbox: Some("INBOX".to_string()),
            ..Default::default()
        }
    }

    fn spam_message(from: &str) -> Vec<u8> {
        format!(
            "Received: from relay.example.net ([203.0.113.9])\r\n\
\tby mx.example.org with ESMTP; Mon, 23 Oct 2023 10:00:00 +0000\r\n\
From: {from}\r\nSubject: hello\r\n\r\nbody\r\n"
        )
        .into_bytes()
    }

    #[test]
    fn failing_account_does_not_stop_subsequent_accounts() {
        let dir = tempfile::tempdir().unwrap();
        let blacklist = dir.path().join("blacklist.txt");
        std::fs::write(&blacklist, "evil.com").unwrap();

        let mailbox = MemoryMailbox::new();
        mailbox.add_folder("INBOX");
        mailbox.add_message("Spam", 1, &spam_message("spam@evil.com"));

        let mut broken = account("broken");
        broken.host = None;
        let good = account("good");

        let config = Config {
            defaults: ListDefaults {
                blacklist: Some(blacklist),
                whitelist: None,
            },
            accounts: vec![broken, good],
        };

        let reporter = CollectingReporter::default();
        let report = run_all(&config, &mailbox, &reporter);

        assert_eq!(report.accounts.len(), 2);
        assert!(matches!(
            report.accounts[0].blacklist,
            PassStatus::Failed(_)
        ));
        assert_eq!(report.accounts[1].blacklist, PassStatus::Completed(1));
        assert_eq!(report.total_deleted(), 1);
        assert!(mailbox.message_uids("Spam").is_empty());
    }

    #[test]
    fn whitelisted_message_is_moved_before_blacklist_pass_sees_it() {
        let dir = tempfile::tempdir().unwrap();
        let blacklist = dir.path().join("blacklist.txt");
        let whitelist = dir.path().join("whitelist.txt");
        // The sender is on both lists; the whitelist pass runs first and
        // moves the message out of the scanned folder.
        std::fs::write(&blacklist, "mixed.example").unwrap();
        std::fs::write(&whitelist, "friend@mixed.example").unwrap();

        let mailbox = MemoryMailbox::new();
        mailbox.add_folder("INBOX");
        mailbox.add_message("Spam", 1, &spam_message("friend@mixed.example"));

        let config = Config {
            defaults: ListDefaults {
                blacklist: Some(blacklist),
                whitelist: Some(whitelist),
            },
            accounts: vec![account("mixed")],
        };

        let reporter = CollectingReporter::default();
        let report = run_all(&config, &mailbox, &reporter);

        assert_eq!(report.accounts[0].whitelist, PassStatus::Completed(1));
        assert_eq!(report.accounts[0].blacklist, PassStatus::Completed(0));
        assert_eq!(mailbox.message_uids("INBOX"), vec![1]);
    }

    #[test]
    fn whitelist_failure_does_not_suppress_blacklist_pass() {
        let dir = tempfile::tempdir().unwrap();
        let blacklist = dir.path().join("blacklist.txt");
        std::fs::write(&blacklist, "evil.com").unwrap();

        let mailbox = MemoryMailbox::new();
        mailbox.add_message("Spam", 1, &spam_message("spam@evil.com"));

        // No inbox: the whitelist pass fails its required-field check,
        // the blacklist pass still runs.
        let mut acct = account("no-inbox");
        acct.inbox = None;
        acct.whitelist = Some(dir.path().join("whitelist.txt"));

        let config = Config {
            defaults: ListDefaults {
                blacklist: Some(blacklist),
                whitelist: None,
            },
            accounts: vec![acct],
        };

        let reporter = CollectingReporter::default();
        let report = run_all(&config, &mailbox, &reporter);

        assert!(matches!(
            report.accounts[0].whitelist,
            PassStatus::Failed(_)
        ));
        assert_eq!(report.accounts[0].blacklist, PassStatus::Completed(1));
        assert_eq!(reporter.failures.lock().unwrap().len(), 1);
    }
}
