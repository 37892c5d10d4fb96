use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;

const TITLE_CHARS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Chat history per session. Sessions are never deleted; turns only appended.
pub trait SessionStore: Send + Sync {
    fn create(&self) -> SessionId;
    fn append(&self, id: SessionId, turn: ChatTurn) -> Result<()>;
    fn list(&self, id: SessionId) -> Result<Vec<ChatTurn>>;
    /// All session ids, oldest first.
    fn sessions(&self) -> Vec<SessionId>;
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    inner: Mutex<BTreeMap<SessionId, Vec<ChatTurn>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<SessionId, Vec<ChatTurn>>> {
        // A poisoned lock only means another thread panicked mid-append; the map is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&self) -> SessionId {
        let mut map = self.lock();
        let next = map.keys().next_back().map(|id| id.0 + 1).unwrap_or(1);
        let id = SessionId(next);
        map.insert(id, Vec::new());
        id
    }

    fn append(&self, id: SessionId, turn: ChatTurn) -> Result<()> {
        let mut map = self.lock();
        let turns = map
            .get_mut(&id)
            .ok_or_else(|| Error::Session(format!("unknown session {id}")))?;
        turns.push(turn);
        Ok(())
    }

    fn list(&self, id: SessionId) -> Result<Vec<ChatTurn>> {
        self.lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::Session(format!("unknown session {id}")))
    }

    fn sessions(&self) -> Vec<SessionId> {
        self.lock().keys().copied().collect()
    }
}

/// Display title: the first user message (clipped), or `Session N`.
pub fn session_title(id: SessionId, turns: &[ChatTurn]) -> String {
    match turns.iter().find(|t| t.role == Role::User) {
        Some(t) if t.content.chars().count() > TITLE_CHARS => {
            format!("{}...", crate::clip_chars(&t.content, TITLE_CHARS))
        }
        Some(t) => t.content.clone(),
        None => format!("Session {id}"),
    }
}

/// Markdown transcript of a session, one `## Role:` block per turn.
pub fn export_markdown(turns: &[ChatTurn]) -> String {
    let mut out = String::new();
    for t in turns {
        let role = match t.role {
            Role::User => "User",
            Role::Assistant => "Assistant",
        };
        out.push_str(&format!("## {role}:\n{}\n\n", t.content));
    }
    out
}

pub fn export_file_name(id: SessionId) -> String {
    format!("research_session_{id}.md")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_increase_and_turns_keep_order() {
        let store = InMemorySessionStore::new();
        let a = store.create();
        let b = store.create();
        assert_eq!(a, SessionId(1));
        assert_eq!(b, SessionId(2));

        store.append(a, ChatTurn::user("q1")).unwrap();
        store.append(a, ChatTurn::assistant("a1")).unwrap();
        store.append(b, ChatTurn::user("other")).unwrap();
        assert_eq!(
            store.list(a).unwrap(),
            vec![ChatTurn::user("q1"), ChatTurn::assistant("a1")]
        );
        assert_eq!(store.sessions(), vec![a, b]);
    }

    #[test]
    fn unknown_session_is_an_error() {
        let store = InMemorySessionStore::new();
        assert!(matches!(
            store.append(SessionId(9), ChatTurn::user("x")),
            Err(Error::Session(_))
        ));
        assert!(store.list(SessionId(9)).is_err());
    }

    #[test]
    fn titles_clip_first_user_message() {
        let id = SessionId(3);
        assert_eq!(session_title(id, &[]), "Session 3");
        assert_eq!(
            session_title(id, &[ChatTurn::assistant("hi"), ChatTurn::user("short")]),
            "short"
        );
        let long = "What are the long term effects of intermittent fasting?";
        assert_eq!(
            session_title(id, &[ChatTurn::user(long)]),
            "What are the long term effects..."
        );
    }

    #[test]
    fn markdown_export_has_role_headings_in_order() {
        let md = export_markdown(&[ChatTurn::user("q"), ChatTurn::assistant("a")]);
        assert_eq!(md, "## User:\nq\n\n## Assistant:\na\n\n");
        assert_eq!(export_file_name(SessionId(4)), "research_session_4.md");
    }
}
