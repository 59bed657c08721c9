//! SQLite-backed [`DocumentStore`].
//!
//! Ids come from an `AUTOINCREMENT` rowid so a deleted id is never handed out
//! again. SQLite's `LOWER` only folds ASCII, so each searchable field is also
//! stored Unicode-lowercased (`*_folded`) and `search_like` matches the query,
//! folded the same way, against those columns. `%`, `_` and `\` in the query
//! are escaped so the match is a literal substring test.

use std::collections::BTreeSet;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use crate::error::StorageError;
use crate::models::{Document, DocumentId, NewDocument};
use crate::traits::DocumentStore;

const SELECT_COLUMNS: &str =
    "SELECT id, filename, content_type, content_text, description, uploaded_at FROM documents";

pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if missing) the database at `database_url` and ensures
    /// the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filename TEXT,
                content_type TEXT NOT NULL,
                content_text TEXT NOT NULL,
                description TEXT,
                uploaded_at TEXT NOT NULL,
                filename_folded TEXT,
                content_folded TEXT NOT NULL,
                description_folded TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_documents_uploaded_at ON documents(uploaded_at DESC)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

}

fn row_to_document(row: &SqliteRow) -> Result<Document, sqlx::Error> {
    Ok(Document {
        id: DocumentId(row.try_get("id")?),
        filename: row.try_get("filename")?,
        content_type: row.try_get("content_type")?,
        content_text: row.try_get("content_text")?,
        description: row.try_get("description")?,
        uploaded_at: row.try_get::<DateTime<Utc>, _>("uploaded_at")?,
    })
}

fn rows_to_documents(rows: &[SqliteRow]) -> Result<Vec<Document>, StorageError> {
    rows.iter()
        .map(|row| row_to_document(row).map_err(StorageError::from))
        .collect()
}

fn fold(value: &str) -> String {
    value.to_lowercase()
}

fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for ch in fold(query).chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn save(&self, document: NewDocument) -> Result<Document, StorageError> {
        let result = sqlx::query(
            r#"
            INSERT INTO documents (
                filename, content_type, content_text, description, uploaded_at,
                filename_folded, content_folded, description_folded
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&document.filename)
        .bind(&document.content_type)
        .bind(&document.content_text)
        .bind(&document.description)
        .bind(document.uploaded_at)
        .bind(document.filename.as_deref().map(fold))
        .bind(fold(&document.content_text))
        .bind(document.description.as_deref().map(fold))
        .execute(&self.pool)
        .await?;

        Ok(document.into_document(DocumentId(result.last_insert_rowid())))
    }

    async fn find_all_by_id(
        &self,
        ids: &BTreeSet<DocumentId>,
    ) -> Result<Vec<Document>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("{SELECT_COLUMNS} WHERE id IN ({placeholders}) ORDER BY id");

        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id.0);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows_to_documents(&rows)
    }

    async fn search_like(&self, query: &str) -> Result<Vec<Document>, StorageError> {
        let pattern = like_pattern(query);
        let sql = format!(
            r#"{SELECT_COLUMNS}
            WHERE content_folded LIKE ? ESCAPE '\'
               OR description_folded LIKE ? ESCAPE '\'
               OR filename_folded LIKE ? ESCAPE '\'
            ORDER BY id"#
        );

        let rows = sqlx::query(&sql)
            .bind(&pattern)
            .bind(&pattern)
            .bind(&pattern)
            .fetch_all(&self.pool)
            .await?;
        rows_to_documents(&rows)
    }

    async fn find_all(&self) -> Result<Vec<Document>, StorageError> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows_to_documents(&rows)
    }

    async fn exists_by_id(&self, id: DocumentId) -> Result<bool, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE id = ?")
            .bind(id.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn delete_by_id(&self, id: DocumentId) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_store() -> (TempDir, SqliteDocumentStore) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("docs.db").display());
        let store = SqliteDocumentStore::connect(&url).await.unwrap();
        (dir, store)
    }

    fn new_document(text: &str, filename: Option<&str>, description: Option<&str>) -> NewDocument {
        NewDocument {
            filename: filename.map(str::to_string),
            content_type: "text/plain".to_string(),
            content_text: text.to_string(),
            description: description.map(str::to_string),
            uploaded_at: Utc::now(),
        }
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("Hello"), "%hello%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[tokio::test]
    async fn saved_documents_round_trip() {
        let (_dir, store) = open_store().await;
        let saved = store
            .save(new_document("body", Some("a.txt"), None))
            .await
            .unwrap();

        let all = store.find_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, saved.id);
        assert_eq!(all[0].filename.as_deref(), Some("a.txt"));
        assert_eq!(all[0].description, None);
        assert_eq!(all[0].content_text, "body");
        assert_eq!(
            all[0].uploaded_at.timestamp_millis(),
            saved.uploaded_at.timestamp_millis()
        );
    }

    #[tokio::test]
    async fn deleted_ids_are_not_reused() {
        let (_dir, store) = open_store().await;
        let first = store.save(new_document("a", None, None)).await.unwrap();
        let second = store.save(new_document("b", None, None)).await.unwrap();
        assert!(store.delete_by_id(second.id).await.unwrap());
        let third = store.save(new_document("c", None, None)).await.unwrap();

        assert!(second.id > first.id);
        assert!(third.id > second.id);
        assert!(!store.exists_by_id(second.id).await.unwrap());
        assert!(store.exists_by_id(third.id).await.unwrap());
        assert!(!store.delete_by_id(second.id).await.unwrap());
    }

    #[tokio::test]
    async fn search_like_matches_any_field_case_insensitively() {
        let (_dir, store) = open_store().await;
        let by_text = store
            .save(new_document("Say HELLO there", None, None))
            .await
            .unwrap();
        let by_description = store
            .save(new_document("nothing", None, Some("Hello notes")))
            .await
            .unwrap();
        let by_filename = store
            .save(new_document("nothing", Some("hello.txt"), None))
            .await
            .unwrap();
        store
            .save(new_document("unrelated", Some("x.txt"), Some("misc")))
            .await
            .unwrap();

        let ids: Vec<DocumentId> = store
            .search_like("hello")
            .await
            .unwrap()
            .into_iter()
            .map(|document| document.id)
            .collect();
        assert_eq!(ids, vec![by_text.id, by_description.id, by_filename.id]);
    }

    #[tokio::test]
    async fn search_like_folds_non_ascii_letters() {
        let (_dir, store) = open_store().await;
        let eclair = store
            .save(new_document("Éclair recipe", None, None))
            .await
            .unwrap();
        let notes = store
            .save(new_document("nothing", Some("STRASSE.txt"), Some("Über Notes")))
            .await
            .unwrap();

        for query in ["Éclair", "éclair", "ÉCLAIR"] {
            let found = store.search_like(query).await.unwrap();
            assert_eq!(found.len(), 1, "query {query}");
            assert_eq!(found[0].id, eclair.id);
        }

        let found = store.search_like("über").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, notes.id);
    }

    #[tokio::test]
    async fn search_like_treats_wildcards_literally() {
        let (_dir, store) = open_store().await;
        let literal = store
            .save(new_document("save 50% today", None, None))
            .await
            .unwrap();
        store
            .save(new_document("save 500 today", None, None))
            .await
            .unwrap();

        let found = store.search_like("50%").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, literal.id);
    }

    #[tokio::test]
    async fn find_all_by_id_returns_only_known_ids() {
        let (_dir, store) = open_store().await;
        let first = store.save(new_document("a", None, None)).await.unwrap();
        store.save(new_document("b", None, None)).await.unwrap();

        let ids = BTreeSet::from([first.id, DocumentId(404)]);
        let found = store.find_all_by_id(&ids).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, first.id);

        assert!(store.find_all_by_id(&BTreeSet::new()).await.unwrap().is_empty());
    }
}
