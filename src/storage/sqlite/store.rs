//! `SQLite`-backed conversation store.

use super::{acquire_lock, configure_connection, record_operation_metrics, status_of, with_transaction};
use crate::models::{
    Conversation, ConversationId, ConversationSource, Message, QaPair, TagPoolEntry, TagUpdate,
};
use crate::storage::traits::ConversationStore;
use crate::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::instrument;

const BACKEND: &str = "sqlite";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        source TEXT NOT NULL,
        tags TEXT NOT NULL DEFAULT '[]',
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
        role TEXT NOT NULL,
        content TEXT NOT NULL,
        position INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, position);
    CREATE TABLE IF NOT EXISTS qa_pairs (
        id TEXT PRIMARY KEY,
        conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
        question TEXT NOT NULL,
        answer TEXT NOT NULL,
        position INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_qa_pairs_conversation ON qa_pairs(conversation_id, position);
    CREATE TABLE IF NOT EXISTS tag_pool (
        canonical_name TEXT PRIMARY KEY,
        usage_count INTEGER NOT NULL,
        aliases TEXT NOT NULL DEFAULT '[]'
    );
";

/// `SQLite`-backed conversation store.
///
/// Uses a `Mutex<Connection>` for thread-safe access; WAL mode and the
/// `busy_timeout` pragma handle contention with other processes. Tag lists
/// and pool aliases are stored as JSON arrays.
pub struct SqliteConversationStore {
    /// Protected by a mutex because `rusqlite::Connection` is not `Sync`.
    conn: Mutex<Connection>,
    /// Path to the database (None for in-memory).
    db_path: Option<PathBuf>,
}

impl SqliteConversationStore {
    /// Opens or creates a database file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
                operation: "create_data_dir".to_string(),
                cause: format!("{}: {e}", parent.display()),
            })?;
        }

        let conn = Connection::open(&db_path).map_err(|e| Error::OperationFailed {
            operation: "open_sqlite".to_string(),
            cause: e.to_string(),
        })?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory database (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::OperationFailed {
            operation: "open_sqlite_in_memory".to_string(),
            cause: e.to_string(),
        })?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        configure_connection(&conn)?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| db_error("initialize_schema", &e))
    }

    /// Runs `op` with the connection, recording metrics for `operation`.
    fn observed<T>(
        &self,
        operation: &'static str,
        op: impl FnOnce(&Connection) -> Result<T>,
    ) -> Result<T> {
        let start = Instant::now();
        let result = {
            let conn = acquire_lock(&self.conn);
            op(&conn)
        };
        record_operation_metrics(BACKEND, operation, start, status_of(&result));
        result
    }
}

impl ConversationStore for SqliteConversationStore {
    fn name(&self) -> &'static str {
        BACKEND
    }

    #[instrument(skip(self, conversation), fields(backend = BACKEND, conversation_id = %conversation.id))]
    fn save_conversation(&self, conversation: &Conversation) -> Result<()> {
        self.observed("save_conversation", |conn| {
            conn.execute(
                "INSERT INTO conversations (id, title, source, tags, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    source = excluded.source,
                    tags = excluded.tags,
                    updated_at = excluded.updated_at",
                params![
                    conversation.id.as_str(),
                    conversation.title,
                    conversation.source.as_str(),
                    encode_list(&conversation.tags)?,
                    to_sql_time(conversation.created_at),
                    to_sql_time(conversation.updated_at),
                ],
            )
            .map_err(|e| db_error("save_conversation", &e))?;
            Ok(())
        })
    }

    #[instrument(skip(self, messages), fields(backend = BACKEND, count = messages.len()))]
    fn add_messages(&self, messages: &[Message]) -> Result<()> {
        self.observed("add_messages", |conn| {
            with_transaction(conn, |tx| {
                for message in messages {
                    ensure_conversation(tx, &message.conversation_id)?;
                    tx.execute(
                        "INSERT INTO messages (id, conversation_id, role, content, position)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![
                            message.id,
                            message.conversation_id.as_str(),
                            message.role.as_str(),
                            message.content,
                            message.position,
                        ],
                    )
                    .map_err(|e| db_error("insert_message", &e))?;
                }
                Ok(())
            })
        })
    }

    #[instrument(skip(self, pairs), fields(backend = BACKEND, count = pairs.len()))]
    fn add_qa_pairs(&self, pairs: &[QaPair]) -> Result<()> {
        self.observed("add_qa_pairs", |conn| {
            with_transaction(conn, |tx| {
                for pair in pairs {
                    ensure_conversation(tx, &pair.conversation_id)?;
                    tx.execute(
                        "INSERT INTO qa_pairs (id, conversation_id, question, answer, position)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![
                            pair.id,
                            pair.conversation_id.as_str(),
                            pair.question,
                            pair.answer,
                            pair.position,
                        ],
                    )
                    .map_err(|e| db_error("insert_qa_pair", &e))?;
                }
                Ok(())
            })
        })
    }

    #[instrument(skip(self), fields(backend = BACKEND, conversation_id = %id))]
    fn get_conversation(&self, id: &ConversationId) -> Result<Option<Conversation>> {
        self.observed("get_conversation", |conn| {
            let row = conn
                .query_row(
                    "SELECT id, title, source, tags, created_at, updated_at
                     FROM conversations WHERE id = ?1",
                    params![id.as_str()],
                    ConversationRow::from_row,
                )
                .optional()
                .map_err(|e| db_error("get_conversation", &e))?;
            row.map(ConversationRow::into_conversation).transpose()
        })
    }

    #[instrument(skip(self), fields(backend = BACKEND))]
    fn list_conversations(&self) -> Result<Vec<Conversation>> {
        self.observed("list_conversations", |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, title, source, tags, created_at, updated_at
                     FROM conversations ORDER BY created_at, id",
                )
                .map_err(|e| db_error("list_conversations", &e))?;
            let rows = stmt
                .query_map([], ConversationRow::from_row)
                .map_err(|e| db_error("list_conversations", &e))?;

            rows.map(|row| {
                row.map_err(|e| db_error("list_conversations", &e))
                    .and_then(ConversationRow::into_conversation)
            })
            .collect()
        })
    }

    #[instrument(skip(self), fields(backend = BACKEND, conversation_id = %id))]
    fn conversation_documents(&self, id: &ConversationId) -> Result<Vec<String>> {
        self.observed("conversation_documents", |conn| {
            let messages = query_strings(
                conn,
                "SELECT content FROM messages WHERE conversation_id = ?1 ORDER BY position, rowid",
                id,
            )?;
            if !messages.is_empty() {
                return Ok(messages);
            }
            query_strings(
                conn,
                "SELECT question || char(10) || char(10) || answer FROM qa_pairs
                 WHERE conversation_id = ?1 ORDER BY position, rowid",
                id,
            )
        })
    }

    #[instrument(skip(self, updates), fields(backend = BACKEND, count = updates.len()))]
    fn replace_tags(&self, updates: &[TagUpdate]) -> Result<()> {
        self.observed("replace_tags", |conn| {
            with_transaction(conn, |tx| apply_tag_updates(tx, updates))
        })
    }

    #[instrument(skip(self, updates, pool), fields(backend = BACKEND, updates = updates.len(), pool = pool.len()))]
    fn commit_canonical_tags(&self, updates: &[TagUpdate], pool: &[TagPoolEntry]) -> Result<()> {
        self.observed("commit_canonical_tags", |conn| {
            with_transaction(conn, |tx| {
                apply_tag_updates(tx, updates)?;
                tx.execute("DELETE FROM tag_pool", [])
                    .map_err(|e| db_error("clear_tag_pool", &e))?;
                let mut stmt = tx
                    .prepare(
                        "INSERT INTO tag_pool (canonical_name, usage_count, aliases)
                         VALUES (?1, ?2, ?3)",
                    )
                    .map_err(|e| db_error("insert_tag_pool", &e))?;
                for entry in pool {
                    stmt.execute(params![
                        entry.canonical_name,
                        i64::try_from(entry.usage_count).unwrap_or(i64::MAX),
                        encode_list(&entry.aliases)?,
                    ])
                    .map_err(|e| db_error("insert_tag_pool", &e))?;
                }
                Ok(())
            })
        })
    }

    #[instrument(skip(self), fields(backend = BACKEND))]
    fn tag_pool(&self) -> Result<Vec<TagPoolEntry>> {
        self.observed("tag_pool", |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT canonical_name, usage_count, aliases FROM tag_pool
                     ORDER BY usage_count DESC, canonical_name ASC",
                )
                .map_err(|e| db_error("tag_pool", &e))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })
                .map_err(|e| db_error("tag_pool", &e))?;

            rows.map(|row| {
                let (canonical_name, usage_count, aliases) =
                    row.map_err(|e| db_error("tag_pool", &e))?;
                Ok(TagPoolEntry {
                    canonical_name,
                    usage_count: usize::try_from(usage_count).unwrap_or(0),
                    aliases: decode_list(&aliases)?,
                })
            })
            .collect()
        })
    }

    fn count(&self) -> Result<usize> {
        self.observed("count", |conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))
                .map_err(|e| db_error("count", &e))?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
    }
}

/// Raw conversation row before JSON decoding.
struct ConversationRow {
    id: String,
    title: String,
    source: String,
    tags: String,
    created_at: i64,
    updated_at: i64,
}

impl ConversationRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            source: row.get(2)?,
            tags: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn into_conversation(self) -> Result<Conversation> {
        Ok(Conversation {
            id: ConversationId::new(self.id),
            title: self.title,
            source: ConversationSource::parse(&self.source),
            tags: decode_list(&self.tags)?,
            created_at: u64::try_from(self.created_at).unwrap_or(0),
            updated_at: u64::try_from(self.updated_at).unwrap_or(0),
        })
    }
}

fn apply_tag_updates(conn: &Connection, updates: &[TagUpdate]) -> Result<()> {
    let now = to_sql_time(crate::current_timestamp());
    let mut stmt = conn
        .prepare("UPDATE conversations SET tags = ?1, updated_at = ?2 WHERE id = ?3")
        .map_err(|e| db_error("update_tags", &e))?;
    for update in updates {
        let changed = stmt
            .execute(params![
                encode_list(&update.tags)?,
                now,
                update.conversation_id.as_str()
            ])
            .map_err(|e| db_error("update_tags", &e))?;
        if changed == 0 {
            return Err(Error::NotFound(format!(
                "conversation {}",
                update.conversation_id
            )));
        }
    }
    Ok(())
}

fn ensure_conversation(conn: &Connection, id: &ConversationId) -> Result<()> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM conversations WHERE id = ?1",
            params![id.as_str()],
            |_| Ok(()),
        )
        .optional()
        .map_err(|e| db_error("lookup_conversation", &e))?;
    exists.ok_or_else(|| Error::NotFound(format!("conversation {id}")))
}

fn query_strings(conn: &Connection, sql: &str, id: &ConversationId) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| db_error("conversation_documents", &e))?;
    let rows = stmt
        .query_map(params![id.as_str()], |row| row.get::<_, String>(0))
        .map_err(|e| db_error("conversation_documents", &e))?;
    rows.map(|row| row.map_err(|e| db_error("conversation_documents", &e)))
        .collect()
}

fn encode_list(items: &[String]) -> Result<String> {
    serde_json::to_string(items).map_err(|e| Error::OperationFailed {
        operation: "encode_tags".to_string(),
        cause: e.to_string(),
    })
}

fn decode_list(raw: &str) -> Result<Vec<String>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw).map_err(|e| Error::OperationFailed {
        operation: "decode_tags".to_string(),
        cause: e.to_string(),
    })
}

// rusqlite has no ToSql for u64
#[allow(clippy::cast_possible_wrap)]
const fn to_sql_time(secs: u64) -> i64 {
    secs as i64
}

fn db_error(operation: &str, e: &rusqlite::Error) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageRole;
    use tempfile::TempDir;

    fn store() -> SqliteConversationStore {
        SqliteConversationStore::in_memory().unwrap()
    }

    fn saved(store: &SqliteConversationStore, id: &str, tags: &[&str]) -> Conversation {
        let conversation = Conversation::new(format!("Conversation {id}"), ConversationSource::Claude)
            .with_id(id)
            .with_tags(tags.iter().copied());
        store.save_conversation(&conversation).unwrap();
        conversation
    }

    #[test]
    fn test_save_and_get_round_trip() {
        let store = store();
        let conversation = saved(&store, "c1", &["Rust", "Async"]);

        let loaded = store.get_conversation(&conversation.id).unwrap().unwrap();
        assert_eq!(loaded, conversation);
        assert!(store.get_conversation(&ConversationId::new("missing")).unwrap().is_none());
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_save_replaces_existing() {
        let store = store();
        let conversation = saved(&store, "c1", &["Rust"]);
        let renamed = Conversation {
            title: "Renamed".to_string(),
            ..conversation.clone()
        };
        store.save_conversation(&renamed).unwrap();

        let loaded = store.get_conversation(&conversation.id).unwrap().unwrap();
        assert_eq!(loaded.title, "Renamed");
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_documents_prefer_messages() {
        let store = store();
        let c1 = saved(&store, "c1", &[]);
        store
            .add_messages(&[
                Message::new(c1.id.clone(), MessageRole::Assistant, "second", 1),
                Message::new(c1.id.clone(), MessageRole::User, "first", 0),
            ])
            .unwrap();
        store
            .add_qa_pairs(&[QaPair::new(c1.id.clone(), "q", "a", 0)])
            .unwrap();
        assert_eq!(
            store.conversation_documents(&c1.id).unwrap(),
            vec!["first", "second"]
        );

        let c2 = saved(&store, "c2", &[]);
        store
            .add_qa_pairs(&[QaPair::new(c2.id.clone(), "How?", "Like this.", 0)])
            .unwrap();
        assert_eq!(
            store.conversation_documents(&c2.id).unwrap(),
            vec!["How?\n\nLike this."]
        );

        let c3 = saved(&store, "c3", &[]);
        assert!(store.conversation_documents(&c3.id).unwrap().is_empty());
    }

    #[test]
    fn test_add_messages_to_missing_conversation_writes_nothing() {
        let store = store();
        let c1 = saved(&store, "c1", &[]);
        let result = store.add_messages(&[
            Message::new(c1.id.clone(), MessageRole::User, "kept?", 0),
            Message::new(ConversationId::new("ghost"), MessageRole::User, "orphan", 0),
        ]);
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert!(store.conversation_documents(&c1.id).unwrap().is_empty());
    }

    #[test]
    fn test_replace_tags_is_atomic() {
        let store = store();
        let c1 = saved(&store, "c1", &["Old"]);
        let result = store.replace_tags(&[
            TagUpdate::new(c1.id.clone(), vec!["New".to_string()]),
            TagUpdate::new(ConversationId::new("ghost"), vec!["X".to_string()]),
        ]);
        assert!(matches!(result, Err(Error::NotFound(_))));
        let loaded = store.get_conversation(&c1.id).unwrap().unwrap();
        assert_eq!(loaded.tags, vec!["Old"]);

        store
            .replace_tags(&[TagUpdate::new(c1.id.clone(), vec!["New".to_string()])])
            .unwrap();
        let loaded = store.get_conversation(&c1.id).unwrap().unwrap();
        assert_eq!(loaded.tags, vec!["New"]);
    }

    #[test]
    fn test_commit_canonical_tags_rebuilds_pool() {
        let store = store();
        let c1 = saved(&store, "c1", &["python basics"]);
        store
            .commit_canonical_tags(
                &[],
                &[TagPoolEntry {
                    canonical_name: "Stale".to_string(),
                    usage_count: 9,
                    aliases: Vec::new(),
                }],
            )
            .unwrap();

        store
            .commit_canonical_tags(
                &[TagUpdate::new(c1.id.clone(), vec!["Python".to_string()])],
                &[
                    TagPoolEntry {
                        canonical_name: "Rust".to_string(),
                        usage_count: 1,
                        aliases: Vec::new(),
                    },
                    TagPoolEntry {
                        canonical_name: "Python".to_string(),
                        usage_count: 2,
                        aliases: vec!["Python Basics".to_string()],
                    },
                    TagPoolEntry {
                        canonical_name: "Go".to_string(),
                        usage_count: 1,
                        aliases: Vec::new(),
                    },
                ],
            )
            .unwrap();

        let pool = store.tag_pool().unwrap();
        let names: Vec<_> = pool.iter().map(|e| e.canonical_name.as_str()).collect();
        assert_eq!(names, vec!["Python", "Go", "Rust"]);
        assert_eq!(pool[0].aliases, vec!["Python Basics"]);
        assert_eq!(
            store.get_conversation(&c1.id).unwrap().unwrap().tags,
            vec!["Python"]
        );
    }

    #[test]
    fn test_commit_canonical_tags_failure_keeps_previous_pool() {
        let store = store();
        let c1 = saved(&store, "c1", &["Rust"]);
        let pool = vec![TagPoolEntry {
            canonical_name: "Rust".to_string(),
            usage_count: 1,
            aliases: Vec::new(),
        }];
        store.commit_canonical_tags(&[], &pool).unwrap();

        let result = store.commit_canonical_tags(
            &[
                TagUpdate::new(c1.id.clone(), vec!["Changed".to_string()]),
                TagUpdate::new(ConversationId::new("ghost"), Vec::new()),
            ],
            &[],
        );
        assert!(result.is_err());
        assert_eq!(store.tag_pool().unwrap(), pool);
        assert_eq!(
            store.get_conversation(&c1.id).unwrap().unwrap().tags,
            vec!["Rust"]
        );
    }

    #[test]
    fn test_file_database_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("memoria.db");
        {
            let store = SqliteConversationStore::new(&path).unwrap();
            assert_eq!(store.db_path(), Some(path.as_path()));
            saved(&store, "c1", &["Rust"]);
        }
        let reopened = SqliteConversationStore::new(&path).unwrap();
        let list = reopened.list_conversations().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].tags, vec!["Rust"]);
    }
}
