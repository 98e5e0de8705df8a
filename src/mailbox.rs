use std::sync::{Arc, Mutex};

#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("unknown folder: {0}")]
    FolderNotFound(String),
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Connection factory for a remote mailbox service. Implementations own
/// transport security; certificate verification is always enforced, there
/// is no insecure mode to opt into.
pub trait MailboxTransport {
    type Session: MailboxSession;

    fn connect(&self, host: &str) -> Result<Self::Session, MailboxError>;
}

/// One authenticated mailbox session. All operations are blocking; the
/// sweeper processes folders and messages strictly one at a time.
pub trait MailboxSession {
    fn login(&mut self, username: &str, password: &str) -> Result<(), MailboxError>;
    fn select_folder(&mut self, folder: &str) -> Result<(), MailboxError>;
    fn list_message_ids(&mut self) -> Result<Vec<u32>, MailboxError>;
    fn fetch_raw(&mut self, ids: &[u32]) -> Result<Vec<(u32, Vec<u8>)>, MailboxError>;
    fn delete_messages(&mut self, ids: &[u32]) -> Result<(), MailboxError>;
    fn move_messages(&mut self, ids: &[u32], target: &str) -> Result<(), MailboxError>;
    fn close_folder(&mut self) -> Result<(), MailboxError>;
}

#[derive(Debug, Clone)]
struct StoredMessage {
    uid: u32,
    raw: Vec<u8>,
}

#[derive(Debug, Default)]
struct MemoryStore {
    folders: Vec<(String, Vec<StoredMessage>)>,
    connects: u32,
    logins: u32,
}

impl MemoryStore {
    fn folder_mut(&mut self, name: &str) -> Option<&mut Vec<StoredMessage>> {
        self.folders
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, messages)| messages)
    }
}

/// In-memory mailbox used by the demo mode and the test suite. Folders
/// live behind a shared handle so that moves and deletes made through one
/// session are visible to later sessions, the way a real server behaves.
#[derive(Debug, Clone, Default)]
pub struct MemoryMailbox {
    inner: Arc<Mutex<MemoryStore>>,
}

impl MemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_folder(&self, name: &str) {
        let mut store = self.inner.lock().unwrap();
        if store.folder_mut(name).is_none() {
            store.folders.push((name.to_string(), Vec::new()));
        }
    }

    pub fn add_message(&self, folder: &str, uid: u32, raw: &[u8]) {
        self.add_folder(folder);
        let mut store = self.inner.lock().unwrap();
        store.folder_mut(folder).unwrap().push(StoredMessage {
            uid,
            raw: raw.to_vec(),
        });
    }

    /// How many sessions have been opened; lets tests assert that skipped
    /// passes open no connection at all.
    pub fn connect_count(&self) -> u32 {
        self.inner.lock().unwrap().connects
    }

    pub fn login_count(&self) -> u32 {
        self.inner.lock().unwrap().logins
    }

    pub fn message_uids(&self, folder: &str) -> Vec<u32> {
        let mut store = self.inner.lock().unwrap();
        store
            .folder_mut(folder)
            .map(|messages| messages.iter().map(|m| m.uid).collect())
            .unwrap_or_default()
    }
}

pub struct MemorySession {
    inner: Arc<Mutex<MemoryStore>>,
    selected: Option<String>,
}

impl MemorySession {
    fn selected(&self) -> Result<String, MailboxError> {
        self.selected
            .clone()
            .ok_or_else(|| MailboxError::Protocol("no folder selected".to_string()))
    }
}

impl MailboxTransport for MemoryMailbox {
    type Session = MemorySession;

    fn connect(&self, _host: &str) -> Result<MemorySession, MailboxError> {
        self.inner.lock().unwrap().connects += 1;
        Ok(MemorySession {
            inner: self.inner.clone(),
            selected: None,
        })
    }
}

impl MailboxSession for MemorySession {
    fn login(&mut self, _username: &str, _password: &str) -> Result<(), MailboxError> {
        self.inner.lock().unwrap().logins += 1;
        Ok(())
    }

    fn select_folder(&mut self, folder: &str) -> Result<(), MailboxError> {
        let mut store = self.inner.lock().unwrap();
        if store.folder_mut(folder).is_none() {
            return Err(MailboxError::FolderNotFound(folder.to_string()));
        }
        self.selected = Some(folder.to_string());
        Ok(())
    }

    fn list_message_ids(&mut self) -> Result<Vec<u32>, MailboxError> {
        let folder = self.selected()?;
        let mut store = self.inner.lock().unwrap();
        Ok(store
            .folder_mut(&folder)
            .map(|messages| messages.iter().map(|m| m.uid).collect())
            .unwrap_or_default())
    }

    fn fetch_raw(&mut self, ids: &[u32]) -> Result<Vec<(u32, Vec<u8>)>, MailboxError> {
        let folder = self.selected()?;
        let mut store = self.inner.lock().unwrap();
        let messages = store.folder_mut(&folder).into_iter().flatten();
        Ok(messages
            .filter(|m| ids.contains(&m.uid))
            .map(|m| (m.uid, m.raw.clone()))
            .collect())
    }

    fn delete_messages(&mut self, ids: &[u32]) -> Result<(), MailboxError> {
        let folder = self.selected()?;
        let mut store = self.inner.lock().unwrap();
        if let Some(messages) = store.folder_mut(&folder) {
            messages.retain(|m| !ids.contains(&m.uid));
        }
        Ok(())
    }

    fn move_messages(&mut self, ids: &[u32], target: &str) -> Result<(), MailboxError> {
        let folder = self.selected()?;
        let mut store = self.inner.lock().unwrap();
        if store.folder_mut(target).is_none() {
            return Err(MailboxError::FolderNotFound(target.to_string()));
        }
        let moved: Vec<StoredMessage> = match store.folder_mut(&folder) {
            Some(messages) => {
                let moved = messages
                    .iter()
                    .filter(|m| ids.contains(&m.uid))
                    .cloned()
                    .collect();
                messages.retain(|m| !ids.contains(&m.uid));
                moved
            }
            None => Vec::new(),
        };
        store.folder_mut(target).unwrap().extend(moved);
        Ok(())
    }

    fn close_folder(&mut self) -> Result<(), MailboxError> {
        self.selected = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_between_folders() {
        let mailbox = MemoryMailbox::new();
        mailbox.add_message("Spam", 1, b"raw");
        mailbox.add_folder("INBOX");

        let mut session = mailbox.connect("host").unwrap();
        session.login("u", "p").unwrap();
        session.select_folder("Spam").unwrap();
        session.move_messages(&[1], "INBOX").unwrap();
        session.close_folder().unwrap();

        assert!(mailbox.message_uids("Spam").is_empty());
        assert_eq!(mailbox.message_uids("INBOX"), vec![1]);
    }

    #[test]
    fn unknown_folder_is_reported() {
        let mailbox = MemoryMailbox::new();
        let mut session = mailbox.connect("host").unwrap();
        match session.select_folder("Nope") {
            Err(MailboxError::FolderNotFound(name)) => assert_eq!(name, "Nope"),
            other => panic!("expected folder error, got {other:?}"),
        }
    }

    #[test]
    fn operations_require_a_selected_folder() {
        let mailbox = MemoryMailbox::new();
        let mut session = mailbox.connect("host").unwrap();
        match session.list_message_ids() {
            Err(MailboxError::Protocol(_)) => {}
            other => panic!("expected protocol error, got {other:?}"),
        }
    }
}
