use serde::Serialize;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db;

use super::room::UserId;

pub const FILE_PLACEHOLDER: &str = "Fayl göndərildi.";

/// A persisted one-to-one chat message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub sender: UserId,
    pub receiver: UserId,
    pub text: String,
    pub file: Option<String>,
    /// Public link to `file`, filled in by whoever knows the uploads origin.
    #[serde(rename = "fileURL")]
    pub file_url: Option<String>,
    pub read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

pub struct NewMessage<'a> {
    pub sender: &'a UserId,
    pub receiver: &'a UserId,
    pub text: &'a str,
    pub file: Option<&'a str>,
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    sender_id: String,
    receiver_id: String,
    text: String,
    file: Option<String>,
    read: bool,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<MessageRow> for Message {
    type Error = sqlx::Error;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(Message {
            id: Uuid::parse_str(&row.id).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            sender: UserId(row.sender_id),
            receiver: UserId(row.receiver_id),
            text: row.text,
            file: row.file,
            file_url: None,
            read: row.read,
            created_at: db::from_ms(row.created_at),
            updated_at: db::from_ms(row.updated_at),
        })
    }
}

const COLUMNS: &str = "id,sender_id,receiver_id,text,file,read,created_at,updated_at";

fn into_messages(rows: Vec<MessageRow>) -> Result<Vec<Message>, sqlx::Error> {
    rows.into_iter().map(Message::try_from).collect()
}

pub(crate) async fn insert_msg(db_pool: &SqlitePool, new: NewMessage<'_>) -> Result<Message, sqlx::Error> {
    let now = db::now_ms();
    let row: MessageRow = sqlx::query_as(&format!(
        "INSERT INTO messages (id,sender_id,receiver_id,text,file,read,created_at,updated_at) VALUES (?,?,?,?,?,0,?,?) RETURNING {COLUMNS}"
    ))
        .bind(Uuid::now_v7().to_string())
        .bind(new.sender.as_str())
        .bind(new.receiver.as_str())
        .bind(new.text)
        .bind(new.file)
        .bind(now)
        .bind(now)
        .fetch_one(db_pool)
        .await?;

    row.try_into()
}

/// Flags every unread message `sender → receiver` as read. Returns how many flipped.
pub(crate) async fn mark_read(db_pool: &SqlitePool, sender: &UserId, receiver: &UserId) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE messages SET read=1, updated_at=? WHERE sender_id=? AND receiver_id=? AND read=0")
        .bind(db::now_ms())
        .bind(sender.as_str())
        .bind(receiver.as_str())
        .execute(db_pool)
        .await?;

    Ok(result.rows_affected())
}

/// Both directions of the conversation between `a` and `b`, newest first.
pub(crate) async fn transcript(db_pool: &SqlitePool, a: &UserId, b: &UserId) -> Result<Vec<Message>, sqlx::Error> {
    let rows: Vec<MessageRow> = sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM messages WHERE (sender_id=? AND receiver_id=?) OR (sender_id=? AND receiver_id=?) ORDER BY seq DESC"
    ))
        .bind(a.as_str())
        .bind(b.as_str())
        .bind(b.as_str())
        .bind(a.as_str())
        .fetch_all(db_pool)
        .await?;

    into_messages(rows)
}

/// Everything addressed to `receiver`, oldest first.
pub(crate) async fn inbox(db_pool: &SqlitePool, receiver: &UserId) -> Result<Vec<Message>, sqlx::Error> {
    let rows: Vec<MessageRow> = sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM messages WHERE receiver_id=? ORDER BY seq ASC"
    ))
        .bind(receiver.as_str())
        .fetch_all(db_pool)
        .await?;

    into_messages(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn send(db_pool: &SqlitePool, from: &str, to: &str, text: &str) -> Message {
        insert_msg(db_pool, NewMessage {
            sender: &from.into(),
            receiver: &to.into(),
            text,
            file: None,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn insert_returns_the_stored_row() {
        let db_pool = db::memory().await.unwrap();
        let msg = insert_msg(&db_pool, NewMessage {
            sender: &"u1".into(),
            receiver: &"u2".into(),
            text: FILE_PLACEHOLDER,
            file: Some("image_1.png"),
        })
        .await
        .unwrap();

        assert_eq!(msg.sender, "u1".into());
        assert_eq!(msg.receiver, "u2".into());
        assert_eq!(msg.file.as_deref(), Some("image_1.png"));
        assert!(!msg.read);
        assert_eq!(msg.created_at, msg.updated_at);
    }

    #[tokio::test]
    async fn mark_read_only_touches_one_direction() {
        let db_pool = db::memory().await.unwrap();
        send(&db_pool, "u2", "u1", "from u2 #1").await;
        send(&db_pool, "u2", "u1", "from u2 #2").await;
        send(&db_pool, "u1", "u2", "from u1").await;
        send(&db_pool, "u3", "u1", "from u3").await;

        assert_eq!(mark_read(&db_pool, &"u2".into(), &"u1".into()).await.unwrap(), 2);
        assert_eq!(mark_read(&db_pool, &"u2".into(), &"u1".into()).await.unwrap(), 0);

        let inbox = inbox(&db_pool, &"u1".into()).await.unwrap();
        let read: Vec<(&str, bool)> = inbox.iter().map(|m| (m.text.as_str(), m.read)).collect();
        assert_eq!(read, vec![("from u2 #1", true), ("from u2 #2", true), ("from u3", false)]);

        let outgoing = transcript(&db_pool, &"u1".into(), &"u2".into()).await.unwrap();
        let mine = outgoing.iter().find(|m| m.sender == "u1".into()).unwrap();
        assert!(!mine.read);
    }

    #[tokio::test]
    async fn transcript_is_newest_first_and_scoped_to_the_pair() {
        let db_pool = db::memory().await.unwrap();
        send(&db_pool, "u1", "u2", "one").await;
        send(&db_pool, "u2", "u1", "two").await;
        send(&db_pool, "u1", "u3", "elsewhere").await;
        send(&db_pool, "u1", "u2", "three").await;

        let texts: Vec<String> = transcript(&db_pool, &"u2".into(), &"u1".into())
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(texts, vec!["three", "two", "one"]);
    }

    #[tokio::test]
    async fn message_json_shape() {
        let db_pool = db::memory().await.unwrap();
        let msg = send(&db_pool, "u1", "u2", "hello").await;
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["sender"], "u1");
        assert_eq!(json["receiver"], "u2");
        assert_eq!(json["text"], "hello");
        assert_eq!(json["read"], false);
        assert!(json["file"].is_null());
        assert!(json["fileURL"].is_null());
        assert!(json.get("fileUrl").is_none());
        assert!(json["createdAt"].is_string());
    }
}
