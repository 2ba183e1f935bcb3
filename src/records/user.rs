use serde::{Deserialize, Serialize};

use crate::{core::index::Record, types::Timestamp};

/// Community role, as written in the `role` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Champion,
    #[default]
    Community,
    Support,
    Manager,
    Alumni,
    Inactive,
}

impl UserRole {
    pub const ALL: [UserRole; 6] = [
        UserRole::Champion,
        UserRole::Community,
        UserRole::Support,
        UserRole::Manager,
        UserRole::Alumni,
        UserRole::Inactive,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Champion => "champion",
            UserRole::Community => "community",
            UserRole::Support => "support",
            UserRole::Manager => "manager",
            UserRole::Alumni => "alumni",
            UserRole::Inactive => "inactive",
        }
    }

    /// Case-insensitive parse of a role cell.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim().to_lowercase();
        Self::ALL.into_iter().find(|role| role.as_str() == text)
    }

    /// Capitalized form used in the sheet, e.g. `Community`.
    pub fn label(self) -> String {
        let name = self.as_str();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    pub fn is_staff(self) -> bool {
        matches!(self, UserRole::Support | UserRole::Manager)
    }
}

/// Member of the community. Identified by full name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub full_name: String,
    /// Preferred names, main alias first.
    pub aliases: Vec<String>,
    pub role: UserRole,
    /// Chat handle without the leading `@`; empty when unknown.
    pub telegram_username: String,
    /// `MM-DD`.
    pub birthday: Option<String>,
    pub telegram_id: Option<i64>,
    /// Customer id in the point-of-sale system.
    pub pos_id: Option<String>,
    pub last_private_chat: Option<Timestamp>,
    pub telegram_blocked: bool,
}

impl User {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            aliases: Vec::new(),
            role: UserRole::default(),
            telegram_username: String::new(),
            birthday: None,
            telegram_id: None,
            pos_id: None,
            last_private_chat: None,
            telegram_blocked: false,
        }
    }

    pub fn first_name(&self) -> &str {
        self.full_name.split(' ').next().unwrap_or(&self.full_name)
    }

    pub fn main_alias(&self) -> Option<&str> {
        self.aliases.first().map(String::as_str)
    }

    pub fn friendly_first_name(&self) -> &str {
        self.main_alias().unwrap_or_else(|| self.first_name())
    }

    /// Short display name with the chat handle, e.g. `Alex / @alex`.
    pub fn friendly_name(&self) -> String {
        self.with_handle(self.friendly_first_name())
    }

    /// Unambiguous display name with the chat handle.
    pub fn specific_name(&self) -> String {
        self.with_handle(self.main_alias().unwrap_or(&self.full_name))
    }

    fn with_handle(&self, name: &str) -> String {
        if self.telegram_username.is_empty() {
            name.to_string()
        } else {
            format!("{name} / @{}", self.telegram_username)
        }
    }

    /// True when a private message can be delivered.
    pub fn can_contact(&self) -> bool {
        self.telegram_id.is_some() && self.role != UserRole::Inactive && !self.telegram_blocked
    }

    /// Lowercased keys the user can be found by: handle, aliases, first name, full name.
    pub fn search_keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.aliases.len() + 3);
        if !self.telegram_username.is_empty() {
            keys.push(self.telegram_username.to_lowercase());
        }
        keys.extend(self.aliases.iter().map(|alias| alias.to_lowercase()));
        keys.push(self.first_name().to_lowercase());
        keys.push(self.full_name.to_lowercase());
        keys
    }
}

impl Record for User {
    type Id = String;

    fn id(&self) -> String {
        self.full_name.clone()
    }
}
