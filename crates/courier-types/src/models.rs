use serde::{Deserialize, Serialize};

/// A conversation as shown in the chat list.
///
/// Field names follow the wire contract (`lastMessageAt`, `unreadCount`) so
/// the same shape is used by the HTTP bridge and the sync feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub title: String,
    /// Epoch milliseconds of the most recent message.
    pub last_message_at: i64,
    pub unread_count: u32,
}

/// A single chat message. `chat_id` always references an existing [`Chat`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    /// Epoch milliseconds.
    pub ts: i64,
    pub sender: String,
    pub body: String,
}
