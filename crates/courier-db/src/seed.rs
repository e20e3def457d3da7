use rand::Rng;
use rusqlite::Connection;
use tracing::info;
use uuid::Uuid;

use crate::Result;

pub const SEED_CHAT_COUNT: u32 = 200;
pub const MIN_MESSAGES_PER_CHAT: u32 = 100;
pub const MAX_MESSAGES_PER_CHAT: u32 = 200;
/// Gap between consecutive seeded messages in a chat: 5 minutes.
pub const MESSAGE_SPACING_MS: i64 = 5 * 60 * 1000;
pub const ONE_YEAR_MS: i64 = 365 * 24 * 60 * 60 * 1000;

/// Fixed roster used for seeded and synthetic messages.
pub const SENDERS: [&str; 8] = [
    "Alice", "Bob", "Charlie", "Diana", "Eve", "Frank", "Grace", "Henry",
];

pub fn random_sender<R: Rng>(rng: &mut R) -> &'static str {
    SENDERS[rng.random_range(0..SENDERS.len())]
}

/// Seed the store unless `chats` already has rows. Returns whether seeding ran.
///
/// Runs in one transaction: a failure part-way leaves no seeded rows behind.
pub fn seed_if_empty<R: Rng>(conn: &mut Connection, rng: &mut R, now_ms: i64) -> Result<bool> {
    let existing: i64 = conn.query_row("SELECT COUNT(*) FROM chats", [], |r| r.get(0))?;
    if existing > 0 {
        info!("Store already holds {} chats, skipping seed", existing);
        return Ok(false);
    }

    let tx = conn.transaction()?;
    let mut message_total = 0u64;
    {
        let mut insert_chat = tx.prepare_cached(
            "INSERT INTO chats (id, title, lastMessageAt, unreadCount) VALUES (?1, ?2, ?3, ?4)",
        )?;
        let mut insert_message = tx.prepare_cached(
            "INSERT INTO messages (id, chatId, ts, sender, body) VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;

        for n in 1..=SEED_CHAT_COUNT {
            let chat_id = format!("chat_{}", n);
            let title = format!("Chat {}", n);
            let last_message_at = now_ms - rng.random_range(0..ONE_YEAR_MS);
            let unread_count: u32 = rng.random_range(0..=9);

            insert_chat.execute(rusqlite::params![chat_id, title, last_message_at, unread_count])?;

            let count = rng.random_range(MIN_MESSAGES_PER_CHAT..=MAX_MESSAGES_PER_CHAT);
            for i in 0..count {
                // Oldest first; the last one lands exactly on last_message_at.
                let ts = last_message_at - i64::from(count - 1 - i) * MESSAGE_SPACING_MS;
                let body = format!("Message {} in {}", i + 1, title);

                insert_message.execute(rusqlite::params![
                    Uuid::new_v4().to_string(),
                    chat_id,
                    ts,
                    random_sender(rng),
                    body,
                ])?;
            }
            message_total += u64::from(count);
        }
    }
    tx.commit()?;

    info!("Seeded {} chats with {} messages", SEED_CHAT_COUNT, message_total);
    Ok(true)
}
