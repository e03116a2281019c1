pub mod models;

use models::{ChatBox, Message, NewMessage};
use rusqlite::{params, Connection, OptionalExtension, Result};
use std::sync::Mutex;

pub struct Database {
    pub conn: Mutex<Connection>,
}

impl Database {
    pub fn new(path: &std::path::Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).ok();
        }
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// In-memory database for tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA foreign_keys=ON;

            CREATE TABLE IF NOT EXISTS chat_boxes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_box_id INTEGER NOT NULL,
                user_id TEXT NOT NULL,
                request TEXT NOT NULL,
                response TEXT NOT NULL,
                thinking TEXT,
                retrieved_docs TEXT,
                response_time_ms INTEGER NOT NULL DEFAULT 0,
                liked INTEGER,
                disliked INTEGER,
                rating INTEGER,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                FOREIGN KEY (chat_box_id) REFERENCES chat_boxes(id) ON DELETE CASCADE
            );
            ",
        )?;
        Ok(())
    }

    // ── Chat boxes ──

    pub fn create_chat_box(&self, user_id: &str, name: &str) -> Result<ChatBox> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO chat_boxes (name, user_id) VALUES (?1, ?2)",
            params![name, user_id],
        )?;
        let id = conn.last_insert_rowid();
        conn.query_row(
            "SELECT id, name, user_id, created_at, updated_at FROM chat_boxes WHERE id = ?1",
            params![id],
            row_to_chat_box,
        )
    }

    pub fn list_chat_boxes(&self, user_id: &str) -> Result<Vec<ChatBox>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, user_id, created_at, updated_at FROM chat_boxes
             WHERE user_id = ?1 ORDER BY updated_at DESC",
        )?;
        let rows = stmt.query_map(params![user_id], row_to_chat_box)?;
        rows.collect()
    }

    pub fn get_chat_box(&self, id: i64) -> Result<Option<ChatBox>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, name, user_id, created_at, updated_at FROM chat_boxes WHERE id = ?1",
            params![id],
            row_to_chat_box,
        )
        .optional()
    }

    pub fn delete_chat_box(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM chat_boxes WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn rename_chat_box(&self, id: i64, name: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE chat_boxes SET name = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![name, id],
        )?;
        Ok(())
    }

    // ── Messages ──

    pub fn create_message(&self, new: &NewMessage) -> Result<Message> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO messages
             (chat_box_id, user_id, request, response, thinking, retrieved_docs, response_time_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                new.chat_box_id,
                new.user_id,
                new.request,
                new.response,
                new.thinking,
                new.retrieved_docs,
                new.response_time_ms
            ],
        )?;
        let id = conn.last_insert_rowid();
        // Touch chat box updated_at
        conn.execute(
            "UPDATE chat_boxes SET updated_at = datetime('now') WHERE id = ?1",
            params![new.chat_box_id],
        )?;
        conn.query_row(
            &format!("{MESSAGE_SELECT} WHERE id = ?1"),
            params![id],
            row_to_message,
        )
    }

    pub fn get_messages(&self, chat_box_id: i64) -> Result<Vec<Message>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "{MESSAGE_SELECT} WHERE chat_box_id = ?1 ORDER BY created_at ASC, id ASC"
        ))?;
        let rows = stmt.query_map(params![chat_box_id], row_to_message)?;
        rows.collect()
    }

    /// Update feedback fields on a saved message. Fields passed as `None`
    /// keep their stored value. Returns false when the id does not exist.
    pub fn update_feedback(
        &self,
        id: i64,
        liked: Option<bool>,
        disliked: Option<bool>,
        rating: Option<i64>,
    ) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE messages SET
                 liked = COALESCE(?1, liked),
                 disliked = COALESCE(?2, disliked),
                 rating = COALESCE(?3, rating)
             WHERE id = ?4",
            params![liked, disliked, rating, id],
        )?;
        Ok(changed > 0)
    }
}

const MESSAGE_SELECT: &str = "SELECT id, chat_box_id, user_id, request, response, thinking, \
     retrieved_docs, response_time_ms, liked, disliked, rating, created_at FROM messages";

fn row_to_chat_box(row: &rusqlite::Row<'_>) -> Result<ChatBox> {
    Ok(ChatBox {
        id: row.get(0)?,
        name: row.get(1)?,
        user_id: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        chat_box_id: row.get(1)?,
        user_id: row.get(2)?,
        request: row.get(3)?,
        response: row.get(4)?,
        thinking: row.get(5)?,
        retrieved_docs: row.get(6)?,
        response_time_ms: row.get(7)?,
        liked: row.get(8)?,
        disliked: row.get(9)?,
        rating: row.get(10)?,
        created_at: row.get(11)?,
    })
}
