use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rand::Rng;
use uuid::Uuid;

use courier_db::{Database, StoreError, seed};
use courier_types::Message;

/// Generator delays are drawn uniformly from `[MIN_INTERVAL, MAX_INTERVAL)`.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1000);
pub const MAX_INTERVAL: Duration = Duration::from_millis(3000);

pub fn next_interval<R: Rng>(rng: &mut R) -> Duration {
    let ms = rng.random_range(MIN_INTERVAL.as_millis() as u64..MAX_INTERVAL.as_millis() as u64);
    Duration::from_millis(ms)
}

/// Pick a random chat with a single-row read and build a synthetic message
/// for it. The message is not written back to the store.
///
/// Returns `Ok(None)` when the store has no chats.
pub fn synthesize(db: &Database) -> Result<Option<Message>, StoreError> {
    let total = db.count_chats()?;
    if total == 0 {
        return Ok(None);
    }

    let offset = rand::rng().random_range(0..total);
    let Some(chat) = db.get_chats(1, offset)?.into_iter().next() else {
        return Ok(None);
    };

    Ok(Some(synthetic_message(&chat.id, Utc::now(), &mut rand::rng())))
}

pub fn synthetic_message<R: Rng>(chat_id: &str, now: DateTime<Utc>, rng: &mut R) -> Message {
    Message {
        id: Uuid::new_v4().to_string(),
        chat_id: chat_id.to_string(),
        ts: now.timestamp_millis(),
        sender: seed::random_sender(rng).to_string(),
        body: format!(
            "New message at {}",
            now.to_rfc3339_opts(SecondsFormat::Millis, true)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn intervals_stay_within_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1000 {
            let d = next_interval(&mut rng);
            assert!(d >= MIN_INTERVAL && d < MAX_INTERVAL, "{:?}", d);
        }
    }

    #[test]
    fn synthetic_message_describes_its_time() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 5).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let m = synthetic_message("chat_9", now, &mut rng);

        assert_eq!(m.chat_id, "chat_9");
        assert_eq!(m.ts, now.timestamp_millis());
        assert_eq!(m.body, "New message at 2026-03-01T12:30:05.000Z");
        assert!(seed::SENDERS.contains(&m.sender.as_str()));
        assert!(Uuid::parse_str(&m.id).is_ok());
    }

    #[test]
    fn ids_are_fresh() {
        let now = Utc::now();
        let mut rng = StdRng::seed_from_u64(5);
        let a = synthetic_message("chat_1", now, &mut rng);
        let b = synthetic_message("chat_1", now, &mut rng);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn synthesize_targets_an_existing_chat_without_persisting() {
        let db = Database::in_memory();
        db.initialize().unwrap();
        let before = db.count_messages().unwrap();

        for _ in 0..20 {
            let m = synthesize(&db).unwrap().unwrap();
            let n: u32 = m.chat_id.trim_start_matches("chat_").parse().unwrap();
            assert!((1..=200).contains(&n));
            assert!(db.get_messages(&m.chat_id, 1, None).unwrap().len() == 1);
        }

        assert_eq!(db.count_messages().unwrap(), before);
    }

    #[test]
    fn synthesize_surfaces_store_failures() {
        let db = Database::in_memory();
        assert!(matches!(synthesize(&db), Err(StoreError::NotOpen)));
    }
}
