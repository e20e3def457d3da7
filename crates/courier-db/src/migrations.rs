use rusqlite::Connection;
use tracing::info;

use crate::Result;

/// Create the schema if absent. Every statement is idempotent.
///
/// `messages_fts` is an external-content FTS5 index over `messages`. Its rowid
/// is the implicit integer rowid of the `messages` row, not the string `id`;
/// the triggers below are the only writers, so every insert path keys the
/// index the same way.
pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS chats (
            id              TEXT PRIMARY KEY,
            title           TEXT NOT NULL,
            lastMessageAt   INTEGER NOT NULL,
            unreadCount     INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS messages (
            id          TEXT PRIMARY KEY,
            chatId      TEXT NOT NULL REFERENCES chats(id),
            ts          INTEGER NOT NULL,
            sender      TEXT NOT NULL,
            body        TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chats_last_message_at
            ON chats(lastMessageAt);

        CREATE INDEX IF NOT EXISTS idx_messages_chat_ts
            ON messages(chatId, ts);

        CREATE VIRTUAL TABLE IF NOT EXISTS messages_fts USING fts5(
            chatId, body,
            content = 'messages',
            content_rowid = 'rowid'
        );

        CREATE TRIGGER IF NOT EXISTS messages_fts_ai
            AFTER INSERT ON messages BEGIN
                INSERT INTO messages_fts(rowid, chatId, body)
                VALUES (new.rowid, new.chatId, new.body);
            END;

        CREATE TRIGGER IF NOT EXISTS messages_fts_ad
            AFTER DELETE ON messages BEGIN
                INSERT INTO messages_fts(messages_fts, rowid, chatId, body)
                VALUES ('delete', old.rowid, old.chatId, old.body);
            END;

        CREATE TRIGGER IF NOT EXISTS messages_fts_au
            AFTER UPDATE ON messages BEGIN
                INSERT INTO messages_fts(messages_fts, rowid, chatId, body)
                VALUES ('delete', old.rowid, old.chatId, old.body);
                INSERT INTO messages_fts(rowid, chatId, body)
                VALUES (new.rowid, new.chatId, new.body);
            END;
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object_names(conn: &Connection, kind: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = ?1 ORDER BY name")
            .unwrap();
        stmt.query_map([kind], |r| r.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<String>, _>>()
            .unwrap()
    }

    #[test]
    fn creates_tables_indexes_and_fts() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let tables = object_names(&conn, "table");
        assert!(tables.contains(&"chats".to_string()));
        assert!(tables.contains(&"messages".to_string()));
        assert!(tables.contains(&"messages_fts".to_string()));

        let indexes = object_names(&conn, "index");
        assert!(indexes.contains(&"idx_chats_last_message_at".to_string()));
        assert!(indexes.contains(&"idx_messages_chat_ts".to_string()));

        let triggers = object_names(&conn, "trigger");
        assert_eq!(triggers, vec!["messages_fts_ad", "messages_fts_ai", "messages_fts_au"]);
    }

    #[test]
    fn messages_require_an_existing_chat() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        run(&conn).unwrap();

        let orphan = conn.execute(
            "INSERT INTO messages (id, chatId, ts, sender, body) VALUES ('m1', 'nope', 1, 'Eve', 'hi')",
            [],
        );
        assert!(orphan.is_err());
    }
}
