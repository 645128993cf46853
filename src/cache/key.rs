//! Namespaced entity keys.
//!
//! Every entity dictionary lives under a top-level key made of a fixed
//! namespace prefix followed by the decimal entity id (Global has no id).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Entity category. Each maps to a distinct fixed prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Global,
    Chat,
    User,
    Conversation,
}

impl Namespace {
    pub fn prefix(&self) -> &'static str {
        match self {
            Namespace::Global => "GLOBALDATA",
            Namespace::Chat => "CHATDATA",
            Namespace::User => "USERDATA",
            Namespace::Conversation => "CONVERSATION",
        }
    }

    /// Whether keys in this namespace carry an entity id.
    pub fn has_identifier(&self) -> bool {
        !matches!(self, Namespace::Global)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Global => write!(f, "global"),
            Namespace::Chat => write!(f, "chat"),
            Namespace::User => write!(f, "user"),
            Namespace::Conversation => write!(f, "conversation"),
        }
    }
}

/// The top-level store key an entity's dictionary is kept under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey(String);

impl EntityKey {
    /// Derive the key for `namespace` and `id`.
    ///
    /// The id is ignored for [`Namespace::Global`]. Passing `None` for an
    /// id-bearing namespace yields the bare prefix; callers should go
    /// through [`Scope::key`] instead.
    pub fn derive(namespace: Namespace, id: Option<i64>) -> Self {
        match (namespace.has_identifier(), id) {
            (true, Some(id)) => Self(format!("{}{}", namespace.prefix(), id)),
            _ => Self(namespace.prefix().to_string()),
        }
    }

    pub fn global() -> Self {
        Self::derive(Namespace::Global, None)
    }

    pub fn chat(chat_id: i64) -> Self {
        Self::derive(Namespace::Chat, Some(chat_id))
    }

    pub fn user(user_id: i64) -> Self {
        Self::derive(Namespace::User, Some(user_id))
    }

    pub fn conversation(chat_id: i64) -> Self {
        Self::derive(Namespace::Conversation, Some(chat_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EntityKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<EntityKey> for String {
    fn from(key: EntityKey) -> Self {
        key.0
    }
}

/// A namespace paired with the id it requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Chat(i64),
    User(i64),
    Conversation(i64),
}

impl Scope {
    pub fn namespace(&self) -> Namespace {
        match self {
            Scope::Global => Namespace::Global,
            Scope::Chat(_) => Namespace::Chat,
            Scope::User(_) => Namespace::User,
            Scope::Conversation(_) => Namespace::Conversation,
        }
    }

    pub fn id(&self) -> Option<i64> {
        match *self {
            Scope::Global => None,
            Scope::Chat(id) | Scope::User(id) | Scope::Conversation(id) => Some(id),
        }
    }

    pub fn key(&self) -> EntityKey {
        EntityKey::derive(self.namespace(), self.id())
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id() {
            Some(id) => write!(f, "{}:{}", self.namespace(), id),
            None => write!(f, "{}", self.namespace()),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScopeParseError {
    #[error("unknown namespace: {0}")]
    UnknownNamespace(String),

    #[error("namespace {0} requires an id")]
    MissingId(Namespace),

    #[error("global scope takes no id")]
    UnexpectedId,

    #[error("invalid id {0:?}")]
    InvalidId(String),
}

impl FromStr for Scope {
    type Err = ScopeParseError;

    /// Parses `global`, `chat:<id>`, `user:<id>` or `conversation:<id>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, id) = match s.split_once(':') {
            Some((name, id)) => (name, Some(id)),
            None => (s, None),
        };

        let namespace = match name {
            "global" => Namespace::Global,
            "chat" => Namespace::Chat,
            "user" => Namespace::User,
            "conversation" => Namespace::Conversation,
            other => return Err(ScopeParseError::UnknownNamespace(other.to_string())),
        };

        let id = match (namespace, id) {
            (Namespace::Global, None) => return Ok(Scope::Global),
            (Namespace::Global, Some(_)) => return Err(ScopeParseError::UnexpectedId),
            (ns, None) => return Err(ScopeParseError::MissingId(ns)),
            (_, Some(raw)) => raw
                .parse::<i64>()
                .map_err(|_| ScopeParseError::InvalidId(raw.to_string()))?,
        };

        Ok(match namespace {
            Namespace::Chat => Scope::Chat(id),
            Namespace::User => Scope::User(id),
            Namespace::Conversation => Scope::Conversation(id),
            Namespace::Global => Scope::Global,
        })
    }
}
