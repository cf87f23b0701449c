// Справочник контактов (только чтение)

use crate::protocol::messages::Channel;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactRole {
    Teacher,
    Parent,
    Student,
    Staff,
    Admin,
}

/// Информация о контакте
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    pub name: String,
    pub role: ContactRole,
    pub phone: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub subjects: BTreeSet<String>,
    /// Ordered by preference, no duplicates
    pub preferred_channels: Vec<Channel>,
}

impl Contact {
    /// A contact reachable in-app only.
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: ContactRole) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
            phone: None,
            email: None,
            subjects: BTreeSet::new(),
            preferred_channels: vec![Channel::InApp],
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subjects.insert(subject.into());
        self
    }

    /// Replaces the channel preferences; later duplicates are dropped.
    pub fn with_channels(mut self, channels: impl IntoIterator<Item = Channel>) -> Self {
        let mut seen = Vec::new();
        for channel in channels {
            if !seen.contains(&channel) {
                seen.push(channel);
            }
        }
        self.preferred_channels = seen;
        self
    }

    pub fn prefers(&self, channel: Channel) -> bool {
        self.preferred_channels.contains(&channel)
    }
}

/// Source of contacts. The core only reads from it.
pub trait ContactDirectory: Send + Sync {
    fn contact(&self, contact_id: &str) -> Option<Contact>;
}

/// Справочник контактов в памяти
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    contacts: RwLock<HashMap<String, Contact>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_contacts(contacts: impl IntoIterator<Item = Contact>) -> Self {
        let directory = Self::new();
        for contact in contacts {
            directory.insert(contact);
        }
        directory
    }

    /// Adds or replaces a contact.
    pub fn insert(&self, contact: Contact) {
        self.contacts
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(contact.id.clone(), contact);
    }

    pub fn remove(&self, contact_id: &str) -> Option<Contact> {
        self.contacts
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(contact_id)
    }

    pub fn len(&self) -> usize {
        self.contacts.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn filtered(&self, keep: impl Fn(&Contact) -> bool) -> Vec<Contact> {
        let mut found: Vec<Contact> = self
            .contacts
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|c| keep(c))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        found
    }

    /// Поиск по началу имени или любого слова имени, без учета регистра
    pub fn search(&self, query: &str) -> Vec<Contact> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }
        self.filtered(|c| {
            let name = c.name.to_lowercase();
            name.starts_with(&query) || name.split_whitespace().any(|word| word.starts_with(&query))
        })
    }

    pub fn by_role(&self, role: ContactRole) -> Vec<Contact> {
        self.filtered(|c| c.role == role)
    }

    /// Teachers of a subject, case-insensitive.
    pub fn teaching_subject(&self, subject: &str) -> Vec<Contact> {
        let subject = subject.trim().to_lowercase();
        self.filtered(|c| {
            c.role == ContactRole::Teacher && c.subjects.iter().any(|s| s.to_lowercase() == subject)
        })
    }
}

impl ContactDirectory for InMemoryDirectory {
    fn contact(&self, contact_id: &str) -> Option<Contact> {
        self.contacts
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(contact_id)
            .cloned()
    }
}
