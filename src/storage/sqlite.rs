use super::RestaurantStore;
use crate::domain::{PriceCategory, RestaurantRecord, RestaurantSummary};
use crate::error::{RecommenderError, Result};
use async_trait::async_trait;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS restaurants (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    name                TEXT NOT NULL,
    city                TEXT NOT NULL,
    location            TEXT,
    rating              REAL,
    cost_for_two        INTEGER,
    price_category      TEXT CHECK (price_category IN ('$', '$$', '$$$')),
    has_online_delivery INTEGER,
    cuisines            TEXT,
    raw_data            TEXT
);
CREATE INDEX IF NOT EXISTS idx_restaurants_city_price
    ON restaurants (city, price_category);
"#;

const INSERT_SQL: &str = "INSERT INTO restaurants \
    (name, city, location, rating, cost_for_two, price_category, has_online_delivery, cuisines, raw_data) \
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";

impl ToSql for PriceCategory {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for PriceCategory {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// SQLite-backed restaurant table.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file, creating parent directories.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        info!("Opened restaurant database at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| RecommenderError::Database {
            message: "connection lock poisoned".to_string(),
        })
    }

    fn insert_in(tx: &Transaction<'_>, records: &[RestaurantRecord]) -> Result<usize> {
        let mut stmt = tx.prepare(INSERT_SQL)?;
        for r in records {
            let raw = serde_json::to_string(&r.raw_data)?;
            stmt.execute(params![
                r.name,
                r.city,
                r.location,
                r.rating,
                r.cost_for_two,
                r.price_category,
                r.has_online_delivery,
                r.cuisines,
                raw,
            ])?;
        }
        Ok(records.len())
    }

    fn table_exists(conn: &Connection) -> Result<bool> {
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'restaurants'",
            [],
            |row| row.get(0),
        )?;
        Ok(n > 0)
    }
}

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<RestaurantSummary> {
    Ok(RestaurantSummary {
        name: row.get(0)?,
        city: row.get(1)?,
        location: row.get(2)?,
        rating: row.get(3)?,
        cost_for_two: row.get(4)?,
        price_category: row.get(5)?,
        has_online_delivery: row.get(6)?,
        cuisines: row.get(7)?,
    })
}

#[async_trait]
impl RestaurantStore for SqliteStore {
    async fn ensure_schema(&self) -> Result<()> {
        self.lock()?.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let n = self.lock()?.execute("DELETE FROM restaurants", [])?;
        debug!("Cleared {} restaurant rows", n);
        Ok(())
    }

    async fn insert_all(&self, records: &[RestaurantRecord]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let inserted = Self::insert_in(&tx, records)?;
        tx.commit()?;
        Ok(inserted)
    }

    /// Delete and insert in one transaction, so readers never observe a
    /// half-written table and a failed insert keeps the previous rows.
    async fn replace_all(&self, records: &[RestaurantRecord]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM restaurants", [])?;
        let inserted = Self::insert_in(&tx, records)?;
        tx.commit()?;
        Ok(inserted)
    }

    async fn count(&self) -> Result<usize> {
        let n: i64 = self
            .lock()?
            .query_row("SELECT COUNT(*) FROM restaurants", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    async fn is_empty(&self) -> Result<bool> {
        let conn = self.lock()?;
        if !Self::table_exists(&conn)? {
            return Ok(true);
        }
        let any: Option<i64> = conn
            .query_row("SELECT 1 FROM restaurants LIMIT 1", [], |row| row.get(0))
            .optional()?;
        Ok(any.is_none())
    }

    async fn list_cities(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT DISTINCT city FROM restaurants ORDER BY city")?;
        let cities = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(cities)
    }

    async fn find_restaurants(
        &self,
        city: &str,
        price_category: PriceCategory,
        limit: usize,
    ) -> Result<Vec<RestaurantSummary>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT name, city, location, rating, cost_for_two, price_category, \
                    has_online_delivery, cuisines \
             FROM restaurants \
             WHERE city = ?1 AND price_category = ?2 \
             ORDER BY rating IS NULL, rating DESC, id ASC \
             LIMIT ?3",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![city, price_category, limit], summary_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(name: &str, city: &str, rating: Option<f64>, cost: u64) -> RestaurantRecord {
        RestaurantRecord {
            name: name.to_string(),
            city: city.to_string(),
            location: Some("Banashankari".to_string()),
            rating,
            cost_for_two: cost,
            price_category: PriceCategory::from_cost(cost),
            has_online_delivery: true,
            cuisines: None,
            raw_data: json!({"name": name}),
        }
    }

    #[tokio::test]
    async fn test_missing_table_counts_as_empty() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.is_empty().await.unwrap());
        store.ensure_schema().await.unwrap();
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_replace_all_swaps_contents() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.ensure_schema().await.unwrap();
        store
            .insert_all(&[record("Old", "Bangalore", None, 300)])
            .await
            .unwrap();

        let inserted = store
            .replace_all(&[
                record("A", "Bangalore", Some(4.0), 800),
                record("B", "Mumbai", Some(3.5), 900),
            ])
            .await
            .unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(store.count().await.unwrap(), 2);
        assert_eq!(store.list_cities().await.unwrap(), vec!["Bangalore", "Mumbai"]);
    }

    #[tokio::test]
    async fn test_failed_replace_keeps_previous_rows() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.ensure_schema().await.unwrap();
        store
            .insert_all(&[
                record("Old A", "Bangalore", None, 300),
                record("Old B", "Bangalore", Some(3.9), 700),
                record("Old C", "Mumbai", Some(4.2), 1800),
            ])
            .await
            .unwrap();
        // Abort the second insert of any batch that starts from an empty table.
        store
            .lock()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER abort_second_insert BEFORE INSERT ON restaurants \
                 WHEN (SELECT COUNT(*) FROM restaurants) >= 1 \
                 BEGIN SELECT RAISE(ABORT, 'write rejected'); END;",
            )
            .unwrap();

        let err = store
            .replace_all(&[
                record("New A", "Delhi", Some(4.0), 800),
                record("New B", "Delhi", Some(4.4), 900),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, RecommenderError::Database { .. }));
        assert_eq!(store.count().await.unwrap(), 3);
        assert_eq!(store.list_cities().await.unwrap(), vec!["Bangalore", "Mumbai"]);
    }

    #[tokio::test]
    async fn test_find_orders_by_rating_nulls_last() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.ensure_schema().await.unwrap();
        store
            .insert_all(&[
                record("Unrated", "Bangalore", None, 800),
                record("Good", "Bangalore", Some(4.1), 800),
                record("Best", "Bangalore", Some(4.6), 600),
                record("Cheap", "Bangalore", Some(4.9), 200),
                record("Elsewhere", "Mumbai", Some(5.0), 800),
            ])
            .await
            .unwrap();

        let found = store
            .find_restaurants("Bangalore", PriceCategory::Moderate, 20)
            .await
            .unwrap();
        let names: Vec<_> = found.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Best", "Good", "Unrated"]);
        assert_eq!(found[0].price_category, Some(PriceCategory::Moderate));
        assert_eq!(found[0].cost_for_two, Some(600));
        assert_eq!(found[0].has_online_delivery, Some(true));

        let limited = store
            .find_restaurants("Bangalore", PriceCategory::Moderate, 1)
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_raw_data_stored_verbatim() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.ensure_schema().await.unwrap();
        let mut r = record("Jalsa", "Bangalore", Some(4.1), 800);
        r.raw_data = json!({"name": "Jalsa", "rate": "4.1/5", "votes": 775});
        store.insert_all(&[r.clone()]).await.unwrap();

        let raw: String = store
            .lock()
            .unwrap()
            .query_row("SELECT raw_data FROM restaurants", [], |row| row.get(0))
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, r.raw_data);
    }

    #[tokio::test]
    async fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("restaurants.db");
        let store = SqliteStore::open(&path).unwrap();
        store.ensure_schema().await.unwrap();
        assert!(path.exists());
    }
}
