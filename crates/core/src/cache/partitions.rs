//! Partition and entry operations.
//!
//! A partition is a named set of request/response pairs. Partitions are
//! created lazily by their first write and removed only by explicit deletion
//! or by quota eviction emptying them.

use super::connection::CacheStorage;
use super::hash::EntryKey;
use crate::Error;
use crate::request::CachedResponse;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};

/// Listing row for a stored entry (no body).
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct EntryMeta {
    pub partition: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub stored_at: String,
}

/// Per-partition usage numbers.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PartitionStats {
    pub name: String,
    pub created_at: String,
    pub entries: u64,
    pub bytes: u64,
}

/// A stored entry found by a cross-partition match.
#[derive(Debug, Clone)]
pub struct MatchedEntry {
    pub partition: String,
    pub stored_at: String,
    pub response: CachedResponse,
}

/// Handle to one named partition.
///
/// Holding a handle does not create the partition; the first `put` does.
#[derive(Clone, Debug)]
pub struct Partition {
    storage: CacheStorage,
    name: String,
}

/// Fixed-width timestamps so `stored_at` sorts chronologically as text.
fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

fn ensure_partition(conn: &rusqlite::Connection, name: &str, now: &str) -> rusqlite::Result<()> {
    conn.execute("INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)", params![name, now])?;
    Ok(())
}

fn upsert_entry(
    conn: &rusqlite::Connection, partition: &str, key: &EntryKey, response: &CachedResponse, now: &str,
) -> Result<(), Error> {
    let headers_json = serde_json::to_string(&response.headers)?;
    conn.execute(
        "INSERT INTO entries (partition, key_hash, method, url, status, headers_json, body, stored_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(partition, key_hash) DO UPDATE SET
            method = excluded.method,
            url = excluded.url,
            status = excluded.status,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            partition,
            &key.hash,
            &key.method,
            &key.url,
            response.status,
            headers_json,
            response.body.as_ref(),
            now
        ],
    )?;
    Ok(())
}

fn decode_response(status: u16, headers_json: &str, body: Vec<u8>) -> Result<CachedResponse, Error> {
    let headers: Vec<(String, String)> = serde_json::from_str(headers_json)?;
    Ok(CachedResponse { status, headers, body: Bytes::from(body) })
}

impl Partition {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store `response` under `key`, replacing any previous entry.
    pub async fn put(&self, key: &EntryKey, response: &CachedResponse) -> Result<(), Error> {
        let name = self.name.clone();
        let key = key.clone();
        let response = response.clone();
        let now = timestamp();
        self.storage
            .conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_partition(&tx, &name, &now)?;
                upsert_entry(&tx, &name, &key, &response, &now)?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Store every pair in one transaction: either all land or none do.
    pub async fn put_all(&self, entries: Vec<(EntryKey, CachedResponse)>) -> Result<(), Error> {
        let name = self.name.clone();
        let now = timestamp();
        self.storage
            .conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_partition(&tx, &name, &now)?;
                for (key, response) in &entries {
                    upsert_entry(&tx, &name, key, response, &now)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up a stored response in this partition.
    pub async fn lookup(&self, key: &EntryKey) -> Result<Option<CachedResponse>, Error> {
        let name = self.name.clone();
        let hash = key.hash.clone();
        self.storage
            .conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let row = conn
                    .query_row(
                        "SELECT status, headers_json, body FROM entries WHERE partition = ?1 AND key_hash = ?2",
                        params![name, hash],
                        |row| Ok((row.get::<_, u16>(0)?, row.get::<_, String>(1)?, row.get::<_, Vec<u8>>(2)?)),
                    )
                    .optional()?;

                row.map(|(status, headers_json, body)| decode_response(status, &headers_json, body))
                    .transpose()
            })
            .await
            .map_err(Error::from)
    }

    /// List entries ordered by URL.
    pub async fn keys(&self) -> Result<Vec<EntryMeta>, Error> {
        let name = self.name.clone();
        self.storage
            .conn
            .call(move |conn| -> Result<Vec<EntryMeta>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT partition, method, url, status, stored_at FROM entries
                    WHERE partition = ?1 ORDER BY url, method",
                )?;
                let rows = stmt
                    .query_map(params![name], |row| {
                        Ok(EntryMeta {
                            partition: row.get(0)?,
                            method: row.get(1)?,
                            url: row.get(2)?,
                            status: row.get(3)?,
                            stored_at: row.get(4)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn len(&self) -> Result<u64, Error> {
        let name = self.name.clone();
        self.storage
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE partition = ?1", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

impl CacheStorage {
    /// Handle to the partition called `name`. Does not create it.
    pub fn open_partition(&self, name: &str) -> Partition {
        Partition { storage: self.clone(), name: name.to_string() }
    }

    /// Names of all existing partitions, oldest first.
    pub async fn partition_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM partitions ORDER BY rowid")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn has_partition(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM partitions WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a partition and all of its entries.
    ///
    /// Returns false if no partition had that name.
    pub async fn delete_partition(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM partitions WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Find `key` in any partition, searching oldest partition first.
    pub async fn match_any(&self, key: &EntryKey) -> Result<Option<MatchedEntry>, Error> {
        let hash = key.hash.clone();
        self.conn
            .call(move |conn| -> Result<Option<MatchedEntry>, Error> {
                let row = conn
                    .query_row(
                        "SELECT e.partition, e.stored_at, e.status, e.headers_json, e.body
                        FROM entries e JOIN partitions p ON p.name = e.partition
                        WHERE e.key_hash = ?1
                        ORDER BY p.rowid LIMIT 1",
                        params![hash],
                        |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, String>(1)?,
                                row.get::<_, u16>(2)?,
                                row.get::<_, String>(3)?,
                                row.get::<_, Vec<u8>>(4)?,
                            ))
                        },
                    )
                    .optional()?;

                row.map(|(partition, stored_at, status, headers_json, body)| {
                    Ok(MatchedEntry { partition, stored_at, response: decode_response(status, &headers_json, body)? })
                })
                .transpose()
            })
            .await
            .map_err(Error::from)
    }

    /// Entry counts and body sizes for every partition, oldest first.
    pub async fn stats(&self) -> Result<Vec<PartitionStats>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<PartitionStats>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT p.name, p.created_at, COUNT(e.key_hash), COALESCE(SUM(LENGTH(e.body)), 0)
                    FROM partitions p LEFT JOIN entries e ON e.partition = p.name
                    GROUP BY p.name ORDER BY p.rowid",
                )?;
                let stats = stmt
                    .query_map([], |row| {
                        Ok(PartitionStats {
                            name: row.get(0)?,
                            created_at: row.get(1)?,
                            entries: row.get::<_, i64>(2)? as u64,
                            bytes: row.get::<_, i64>(3)? as u64,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(stats)
            })
            .await
            .map_err(Error::from)
    }

    /// Reclaim space: drop the oldest entries across all partitions until at
    /// most `max_entries` remain. Partitions left empty are removed too.
    ///
    /// Returns the number of deleted entries.
    pub async fn evict_oldest(&self, max_entries: usize) -> Result<u64, Error> {
        let max = i64::try_from(max_entries).unwrap_or(i64::MAX);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let tx = conn.transaction()?;
                let count: i64 = tx.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
                if count <= max {
                    return Ok(0);
                }

                let to_delete = count - max;
                let deleted = tx.execute(
                    "DELETE FROM entries WHERE rowid IN (
                        SELECT rowid FROM entries ORDER BY stored_at ASC LIMIT ?1
                    )",
                    params![to_delete],
                )?;
                tx.execute(
                    "DELETE FROM partitions WHERE NOT EXISTS (
                        SELECT 1 FROM entries WHERE entries.partition = partitions.name
                    )",
                    [],
                )?;
                tx.commit()?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::CacheRequest;
    use url::Url;

    fn key(path: &str) -> EntryKey {
        let url = Url::parse("https://reset.example").unwrap().join(path).unwrap();
        EntryKey::for_request(&CacheRequest::get(url), &[])
    }

    fn page(body: &str) -> CachedResponse {
        CachedResponse::new(200, vec![("content-type".into(), "text/html".into())], body.to_string())
    }

    #[tokio::test]
    async fn test_partition_created_on_first_write() {
        let db = CacheStorage::open_in_memory().await.unwrap();
        let partition = db.open_partition("reset-static-v1");
        assert!(!db.has_partition("reset-static-v1").await.unwrap());

        partition.put(&key("/"), &page("<h1>shell</h1>")).await.unwrap();

        assert!(db.has_partition("reset-static-v1").await.unwrap());
        assert_eq!(partition.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_put_and_lookup() {
        let db = CacheStorage::open_in_memory().await.unwrap();
        let partition = db.open_partition("reset-dynamic-v1");
        let response = page("<h1>dashboard</h1>");

        partition.put(&key("/dashboard"), &response).await.unwrap();

        let stored = partition.lookup(&key("/dashboard")).await.unwrap().unwrap();
        assert_eq!(stored, response);
        assert!(partition.lookup(&key("/other")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let db = CacheStorage::open_in_memory().await.unwrap();
        let partition = db.open_partition("reset-dynamic-v1");

        partition.put(&key("/app"), &page("old")).await.unwrap();
        partition.put(&key("/app"), &page("new")).await.unwrap();

        let stored = partition.lookup(&key("/app")).await.unwrap().unwrap();
        assert_eq!(stored.body, Bytes::from("new"));
        assert_eq!(partition.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_put_all_and_keys() {
        let db = CacheStorage::open_in_memory().await.unwrap();
        let partition = db.open_partition("reset-static-v1");

        partition
            .put_all(vec![(key("/app"), page("app")), (key("/"), page("root"))])
            .await
            .unwrap();

        let urls: Vec<String> = partition.keys().await.unwrap().into_iter().map(|m| m.url).collect();
        assert_eq!(urls, vec!["https://reset.example/", "https://reset.example/app"]);
    }

    #[tokio::test]
    async fn test_delete_partition_cascades() {
        let db = CacheStorage::open_in_memory().await.unwrap();
        db.open_partition("reset-static-v1").put(&key("/"), &page("v1")).await.unwrap();

        assert!(db.delete_partition("reset-static-v1").await.unwrap());
        assert!(!db.delete_partition("reset-static-v1").await.unwrap());
        assert!(db.match_any(&key("/")).await.unwrap().is_none());
        assert!(db.partition_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_match_any_prefers_oldest_partition() {
        let db = CacheStorage::open_in_memory().await.unwrap();
        db.open_partition("reset-static-v1").put(&key("/"), &page("static")).await.unwrap();
        db.open_partition("reset-dynamic-v1").put(&key("/"), &page("dynamic")).await.unwrap();
        db.open_partition("reset-dynamic-v1").put(&key("/offline"), &page("offline")).await.unwrap();

        let hit = db.match_any(&key("/")).await.unwrap().unwrap();
        assert_eq!(hit.partition, "reset-static-v1");
        assert_eq!(hit.response.body, Bytes::from("static"));

        let hit = db.match_any(&key("/offline")).await.unwrap().unwrap();
        assert_eq!(hit.partition, "reset-dynamic-v1");
    }

    #[tokio::test]
    async fn test_stats() {
        let db = CacheStorage::open_in_memory().await.unwrap();
        db.open_partition("a").put(&key("/1"), &page("12345")).await.unwrap();
        db.open_partition("a").put(&key("/2"), &page("678")).await.unwrap();
        db.open_partition("b").put(&key("/1"), &page("x")).await.unwrap();

        let stats = db.stats().await.unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].name, "a");
        assert_eq!(stats[0].entries, 2);
        assert_eq!(stats[0].bytes, 8);
        assert_eq!(stats[1].entries, 1);
    }

    #[tokio::test]
    async fn test_evict_oldest() {
        let db = CacheStorage::open_in_memory().await.unwrap();
        db.open_partition("a").put(&key("/1"), &page("1")).await.unwrap();
        tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;
        db.open_partition("b").put(&key("/2"), &page("2")).await.unwrap();
        tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;
        db.open_partition("b").put(&key("/3"), &page("3")).await.unwrap();

        assert_eq!(db.evict_oldest(5).await.unwrap(), 0);
        assert_eq!(db.evict_oldest(2).await.unwrap(), 1);

        assert!(db.match_any(&key("/1")).await.unwrap().is_none());
        assert!(db.match_any(&key("/3")).await.unwrap().is_some());
        assert_eq!(db.partition_names().await.unwrap(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn test_evict_oldest_limit_above_i64_keeps_everything() {
        let db = CacheStorage::open_in_memory().await.unwrap();
        db.open_partition("a").put(&key("/1"), &page("1")).await.unwrap();

        assert_eq!(db.evict_oldest(usize::MAX).await.unwrap(), 0);
        assert!(db.match_any(&key("/1")).await.unwrap().is_some());
        assert_eq!(db.partition_names().await.unwrap(), vec!["a".to_string()]);
    }
}
