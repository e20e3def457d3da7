//! Database row types. These map directly to SQLite rows.
//! Distinct from courier-types wire models to keep the DB layer independent.

use courier_types::{Chat, Message};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRow {
    pub id: String,
    pub title: String,
    pub last_message_at: i64,
    pub unread_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRow {
    pub id: String,
    pub chat_id: String,
    pub ts: i64,
    pub sender: String,
    pub body: String,
}

impl ChatRow {
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            last_message_at: row.get(2)?,
            unread_count: row.get(3)?,
        })
    }
}

impl MessageRow {
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            chat_id: row.get(1)?,
            ts: row.get(2)?,
            sender: row.get(3)?,
            body: row.get(4)?,
        })
    }
}

impl From<ChatRow> for Chat {
    fn from(row: ChatRow) -> Self {
        Chat {
            id: row.id,
            title: row.title,
            last_message_at: row.last_message_at,
            unread_count: row.unread_count,
        }
    }
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Message {
            id: row.id,
            chat_id: row.chat_id,
            ts: row.ts,
            sender: row.sender,
            body: row.body,
        }
    }
}
