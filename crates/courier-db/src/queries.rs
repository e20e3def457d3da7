use crate::models::{ChatRow, MessageRow};
use crate::{Database, Result};
use rusqlite::Connection;

impl Database {
    // -- Chats --

    /// Chats ordered by most recent activity, newest first.
    pub fn get_chats(&self, limit: u32, offset: u32) -> Result<Vec<ChatRow>> {
        self.with_conn(|conn| query_chats(conn, limit, offset))
    }

    pub fn count_chats(&self) -> Result<u32> {
        self.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM chats", [], |r| r.get(0))?))
    }

    // -- Messages --

    /// One page of a chat's history, returned oldest first.
    ///
    /// With `before`, only messages strictly older than that timestamp are
    /// eligible, so passing the oldest `ts` of the previous page walks
    /// backwards through history.
    pub fn get_messages(
        &self,
        chat_id: &str,
        limit: u32,
        before: Option<i64>,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_messages(conn, chat_id, limit, before))
    }

    pub fn count_messages(&self) -> Result<u64> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM messages", [], |r| r.get(0))?)
        })
    }

    // -- Search --

    /// Prefix search over message bodies, best match first.
    ///
    /// Every whitespace-separated token of `query` is matched as a prefix and
    /// all tokens must match. A query without any word characters returns
    /// nothing.
    pub fn search_messages(&self, query: &str, limit: u32) -> Result<Vec<MessageRow>> {
        let Some(expression) = prefix_match_expression(query) else {
            return Ok(vec![]);
        };
        self.with_conn(|conn| query_search(conn, &expression, limit))
    }
}

/// Build the FTS5 MATCH expression for a user query.
///
/// `Message 1` becomes `body : "Message"* AND body : "1"*`.
pub fn prefix_match_expression(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .filter(|token| token.chars().any(char::is_alphanumeric))
        .map(|token| format!("body : \"{}\"*", token.replace('"', "\"\"")))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" AND "))
    }
}

fn query_chats(conn: &Connection, limit: u32, offset: u32) -> Result<Vec<ChatRow>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, title, lastMessageAt, unreadCount
         FROM chats
         ORDER BY lastMessageAt DESC, id ASC
         LIMIT ?1 OFFSET ?2",
    )?;

    let rows = stmt
        .query_map(rusqlite::params![limit, offset], ChatRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn query_messages(
    conn: &Connection,
    chat_id: &str,
    limit: u32,
    before: Option<i64>,
) -> Result<Vec<MessageRow>> {
    // Newest-first to apply the limit, then flipped to chronological order.
    let mut stmt = conn.prepare_cached(
        "SELECT id, chatId, ts, sender, body
         FROM messages
         WHERE chatId = ?1 AND (?2 IS NULL OR ts < ?2)
         ORDER BY ts DESC
         LIMIT ?3",
    )?;

    let mut rows = stmt
        .query_map(rusqlite::params![chat_id, before, limit], MessageRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.reverse();
    Ok(rows)
}

fn query_search(conn: &Connection, expression: &str, limit: u32) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare_cached(
        "SELECT m.id, m.chatId, m.ts, m.sender, m.body
         FROM messages_fts
         JOIN messages m ON m.rowid = messages_fts.rowid
         WHERE messages_fts MATCH ?1
         ORDER BY messages_fts.rank
         LIMIT ?2",
    )?;

    let rows = stmt
        .query_map(rusqlite::params![expression, limit], MessageRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreError;

    fn seeded() -> Database {
        let db = Database::in_memory();
        db.initialize().unwrap();
        db
    }

    #[test]
    fn chats_are_ordered_newest_first_and_limited() {
        let db = seeded();
        for (limit, offset) in [(0, 0), (1, 0), (50, 0), (50, 175), (300, 0), (10, 195)] {
            let chats = db.get_chats(limit, offset).unwrap();
            assert!(chats.len() <= limit as usize);
            assert!(chats.windows(2).all(|w| w[0].last_message_at >= w[1].last_message_at));
        }
        assert_eq!(db.get_chats(10, 195).unwrap().len(), 5);
    }

    #[test]
    fn chat_pages_do_not_overlap() {
        let db = seeded();
        let first = db.get_chats(100, 0).unwrap();
        let second = db.get_chats(100, 100).unwrap();
        assert_eq!(first.len() + second.len(), 200);
        assert!(first.last().unwrap().last_message_at >= second[0].last_message_at);
        assert!(first.iter().all(|c| second.iter().all(|d| d.id != c.id)));
    }

    #[test]
    fn out_of_range_offset_yields_empty_page() {
        let db = seeded();
        assert!(db.get_chats(20, 10_000).unwrap().is_empty());
    }

    #[test]
    fn messages_are_chronological_and_scoped_to_chat() {
        let db = seeded();
        let page = db.get_messages("chat_7", 50, None).unwrap();
        assert_eq!(page.len(), 50);
        assert!(page.iter().all(|m| m.chat_id == "chat_7"));
        assert!(page.windows(2).all(|w| w[0].ts <= w[1].ts));

        // The page is the newest slice of the chat.
        let chat = db
            .get_chats(200, 0)
            .unwrap()
            .into_iter()
            .find(|c| c.id == "chat_7")
            .unwrap();
        assert_eq!(page.last().unwrap().ts, chat.last_message_at);
    }

    #[test]
    fn before_cursor_walks_backwards_through_history() {
        let db = seeded();
        let mut seen = Vec::new();
        let mut cursor = None;

        loop {
            let page = db.get_messages("chat_12", 30, cursor).unwrap();
            if page.is_empty() {
                break;
            }
            if let Some(t) = cursor {
                assert!(page.iter().all(|m| m.ts < t));
            }
            cursor = Some(page[0].ts);
            let mut ids: Vec<String> = page.into_iter().map(|m| m.id).collect();
            ids.extend(seen);
            seen = ids;
        }

        let total: u32 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM messages WHERE chatId = 'chat_12'", [], |r| {
                    r.get(0)
                })?)
            })
            .unwrap();
        assert_eq!(seen.len(), total as usize);

        let mut unique = seen.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), seen.len());
    }

    #[test]
    fn unknown_chat_yields_no_messages() {
        let db = seeded();
        assert!(db.get_messages("chat_9999", 50, None).unwrap().is_empty());
    }

    #[test]
    fn prefix_search_matches_every_token() {
        let db = seeded();
        let results = db.search_messages("Message 1", 50).unwrap();
        assert!(!results.is_empty());
        assert!(results.len() <= 50);
        for m in &results {
            let tokens: Vec<&str> = m.body.split_whitespace().collect();
            assert!(tokens.iter().any(|t| t.starts_with("Message")), "{}", m.body);
            assert!(tokens.iter().any(|t| t.starts_with('1')), "{}", m.body);
        }
    }

    #[test]
    fn search_finds_a_specific_message() {
        let db = seeded();
        let target = db
            .get_messages("chat_7", 200, None)
            .unwrap()
            .into_iter()
            .find(|m| m.body == "Message 42 in Chat 7")
            .unwrap();

        let results = db.search_messages("Message 42 in Chat 7", 200).unwrap();
        assert!(results.iter().any(|m| m.id == target.id));
    }

    #[test]
    fn search_ranks_denser_matches_first() {
        let db = seeded();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chats (id, title, lastMessageAt, unreadCount) VALUES ('chat_zoo', 'Zoo', 0, 0)",
                [],
            )?;
            conn.execute(
                "INSERT INTO messages (id, chatId, ts, sender, body) VALUES
                    ('weak', 'chat_zoo', 1, 'Alice', 'a zebra crossing near the long winding road by the river'),
                    ('strong', 'chat_zoo', 2, 'Bob', 'zebra zebra zebra')",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        let ids: Vec<String> = db
            .search_messages("zeb", 10)
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["strong", "weak"]);
    }

    #[test]
    fn search_respects_limit_and_case() {
        let db = seeded();
        assert_eq!(db.search_messages("message", 25).unwrap().len(), 25);
        assert!(db.search_messages("zebra", 25).unwrap().is_empty());
    }

    #[test]
    fn empty_or_symbol_only_query_returns_nothing() {
        let db = seeded();
        assert!(db.search_messages("", 50).unwrap().is_empty());
        assert!(db.search_messages("   \t ", 50).unwrap().is_empty());
        assert!(db.search_messages("\" * ( )", 50).unwrap().is_empty());
    }

    #[test]
    fn search_on_closed_store_fails() {
        let db = seeded();
        db.close();
        assert!(matches!(db.search_messages("Message", 5), Err(StoreError::NotOpen)));
    }

    #[test]
    fn match_expression_quotes_and_wildcards_every_token() {
        assert_eq!(prefix_match_expression("Message"), Some("body : \"Message\"*".into()));
        assert_eq!(
            prefix_match_expression("  Message   1 "),
            Some("body : \"Message\"* AND body : \"1\"*".into())
        );
        assert_eq!(
            prefix_match_expression("say\"hi"),
            Some("body : \"say\"\"hi\"*".into())
        );
        assert_eq!(prefix_match_expression("AND OR"), Some("body : \"AND\"* AND body : \"OR\"*".into()));
        assert_eq!(prefix_match_expression("* -"), None);
    }
}
