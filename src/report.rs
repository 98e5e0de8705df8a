use crate::account::{Pass, PassError};

/// Injected reporting capability. The run coordinator and account
/// processor emit one action line per affected message and one summary
/// per completed pass through this trait instead of ambient global state.
pub trait Reporter {
    fn action(&self, account: &str, uid: u32, address: &str, subject: &str, reason: &str);
    fn summary(&self, account: &str, pass: Pass, affected: u64);
    fn failure(&self, account: &str, pass: Pass, error: &PassError);
}

/// Default reporter writing through the `log` facade.
#[derive(Debug, Default)]
pub struct LogReporter;

impl LogReporter {
    /// The blacklist pass reports a bare zero line; only the whitelist
    /// pass qualifies it with "to be moved".
    fn summary_line(account: &str, pass: Pass, affected: u64) -> String {
        match (affected, pass) {
            (0, Pass::Whitelist) => {
                format!("No matching emails found for {account} to be moved!")
            }
            (0, Pass::Blacklist) => format!("No matching emails found for {account}!"),
            (1, _) => format!("1 email has been {} for {account}!", pass.verb()),
            (n, _) => format!("{n} emails have been {} for {account}!", pass.verb()),
        }
    }
}

impl Reporter for LogReporter {
    fn action(&self, account: &str, uid: u32, address: &str, subject: &str, reason: &str) {
        log::info!("[{account}] {uid} {address} {subject} has been {reason}");
    }

    fn summary(&self, account: &str, pass: Pass, affected: u64) {
        log::info!("{}", Self::summary_line(account, pass, affected));
    }

    fn failure(&self, account: &str, pass: Pass, error: &PassError) {
        log::error!("{pass} pass failed for {account}: {error}");
    }
}


#[cfg(test)]
#[derive(Debug, Default)]
pub struct CollectingReporter {
    pub actions: std::sync::Mutex<Vec<String>>,
    pub summaries: std::sync::Mutex<Vec<(String, Pass, u64)>>,
    pub failures: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl Reporter for CollectingReporter {
    fn action(&self, account: &str, uid: u32, address: &str, subject: &str, reason: &str) {
        self.actions
            .lock()
            .unwrap()
            .push(format!("{account} {uid} {address} {subject} {reason}"));
    }

    fn summary(&self, account: &str, pass: Pass, affected: u64) {
        self.summaries
            .lock()
            .unwrap()
            .push((account.to_string(), pass, affected));
    }

    fn failure(&self, account: &str, pass: Pass, error: &PassError) {
        self.failures
            .lock()
            .unwrap()
            .push(format!("{account} {pass}: {error}"));
    }
}
