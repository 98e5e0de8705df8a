use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration: the accounts to sweep, in declaration order,
/// plus fallback list paths shared by accounts that set none of their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: ListDefaults,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListDefaults {
    pub blacklist: Option<PathBuf>,
    pub whitelist: Option<PathBuf>,
}

/// One mailbox account. Every key is optional at parse time; required
/// fields are checked per pass so that one incomplete account is skipped
/// with an error instead of failing the whole configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountConfig {
    pub name: String,
    pub host: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Comma-separated folder names to scan.
    pub folder: Option<String>,
    /// Target folder of whitelist moves.
    pub inbox: Option<String>,
    pub blacklist: Option<PathBuf>,
    pub whitelist: Option<PathBuf>,
}

impl AccountConfig {
    pub fn folders(&self) -> Vec<String> {
        self.folder
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn blacklist_path<'a>(&'a self, defaults: &'a ListDefaults) -> Option<&'a PathBuf> {
        self.blacklist.as_ref().or(defaults.blacklist.as_ref())
    }

    pub fn whitelist_path<'a>(&'a self, defaults: &'a ListDefaults) -> Option<&'a PathBuf> {
        self.whitelist.as_ref().or(defaults.whitelist.as_ref())
    }

    /// Required connection fields; the whitelist pass additionally needs
    /// the inbox to move matches into.
    pub fn missing_fields(&self, require_inbox: bool) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.host.is_none() {
            missing.push("host");
        }
        if self.username.is_none() {
            missing.push("username");
        }
        if self.password.is_none() {
            missing.push("password");
        }
        if self.folders().is_empty() {
            missing.push("folder");
        }
        if require_inbox && self.inbox.is_none() {
            missing.push("inbox");
        }
        missing
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            defaults: ListDefaults {
                blacklist: Some(PathBuf::from("/var/lib/spamsweep/blacklist.txt")),
                whitelist: Some(PathBuf::from("/var/lib/spamsweep/whitelist.txt")),
            },
            accounts: vec![AccountConfig {
                name: "example".to_string(),
                host: Some("imap.example.org".to_string()),
                username: Some("user@example.org".to_string()),
                password: Some("changeme".to_string()),
                folder: Some("Spam, Junk, Blacklist".to_string()),
                inbox: Some("INBOX".to_string()),
                blacklist: None,
                whitelist: None,
            }],
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Problems a run would hit, one line per finding. Missing required
    /// fields are reported here but only become per-account errors at run
    /// time.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.accounts.is_empty() {
            problems.push("no accounts configured".to_string());
        }
        for account in &self.accounts {
            if account.name.is_empty() {
                problems.push("account with empty name".to_string());
            }
            let missing = account.missing_fields(true);
            if !missing.is_empty() {
                problems.push(format!(
                    "account {}: missing parameter(s) {missing:?}",
                    account.name
                ));
            }
            if account.blacklist_path(&self.defaults).is_none() {
                problems.push(format!(
                    "account {}: no blacklist configured (pass will be skipped)",
                    account.name
                ));
            }
            if account.whitelist_path(&self.defaults).is_none() {
                problems.push(format!(
                    "account {}: no whitelist configured (pass will be skipped)",
                    account.name
                ));
            }
        }
        problems
    }
}
