//! Request/response entry operations.
//!
//! Entries are keyed by method and fragment-free URL. Only GET requests can
//! be stored or matched.

use super::connection::CacheDb;
use super::hash::compute_entry_key;
use crate::http::{Request, Response};
use crate::Error;
use bytes::Bytes;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A stored entry together with the store it was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    pub store_name: String,
    pub url: String,
    pub response: Response,
    pub stored_at: String,
}

/// Owned row data, ready to move onto the connection thread.
struct EntryRecord {
    key_hash: String,
    method: String,
    url: String,
    response_url: String,
    status: u16,
    headers_json: String,
    body: Bytes,
}

impl EntryRecord {
    fn new(request: &Request, response: &Response) -> Result<Self, Error> {
        if !request.is_get() {
            return Err(Error::InvalidInput(format!("cannot store {} request", request.method)));
        }
        let url = request.cache_url();
        Ok(Self {
            key_hash: compute_entry_key(&request.method, &url),
            method: request.method.clone(),
            url,
            response_url: response.url.clone(),
            status: response.status,
            headers_json: serde_json::to_string(&response.headers)?,
            body: response.body.clone(),
        })
    }

    fn insert(&self, conn: &rusqlite::Connection, store_name: &str, stored_at: &str) -> Result<(), Error> {
        conn.execute(
            "INSERT INTO cache_entries (
                store_name, key_hash, method, url, response_url, status, headers_json, body, stored_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(store_name, key_hash) DO UPDATE SET
                response_url = excluded.response_url,
                status = excluded.status,
                headers_json = excluded.headers_json,
                body = excluded.body,
                stored_at = excluded.stored_at",
            params![
                store_name,
                &self.key_hash,
                &self.method,
                &self.url,
                &self.response_url,
                self.status,
                &self.headers_json,
                self.body.as_ref(),
                stored_at,
            ],
        )?;
        Ok(())
    }
}

/// Raw row as read from SQLite, decoded outside the row closure.
struct EntryRow {
    store_name: String,
    url: String,
    response_url: String,
    status: u16,
    headers_json: String,
    body: Vec<u8>,
    stored_at: String,
}

impl EntryRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            store_name: row.get(0)?,
            url: row.get(1)?,
            response_url: row.get(2)?,
            status: row.get(3)?,
            headers_json: row.get(4)?,
            body: row.get(5)?,
            stored_at: row.get(6)?,
        })
    }

    fn decode(self) -> Result<CachedEntry, Error> {
        let headers: Vec<(String, String)> = serde_json::from_str(&self.headers_json)?;
        Ok(CachedEntry {
            store_name: self.store_name,
            url: self.url,
            response: Response {
                url: self.response_url,
                status: self.status,
                headers,
                body: Bytes::from(self.body),
            },
            stored_at: self.stored_at,
        })
    }
}

const SELECT_ENTRY: &str = "SELECT e.store_name, e.url, e.response_url, e.status, e.headers_json, e.body, e.stored_at
    FROM cache_entries e JOIN cache_stores s ON s.name = e.store_name";

impl CacheDb {
    /// Store one response, creating the store if needed.
    ///
    /// An existing entry for the same request is replaced.
    pub async fn put_entry(&self, store_name: &str, request: &Request, response: &Response) -> Result<(), Error> {
        let record = EntryRecord::new(request, response)?;
        let store_name = store_name.to_string();
        let stored_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO cache_stores (name, created_at) VALUES (?1, ?2)",
                    params![&store_name, &stored_at],
                )?;
                record.insert(&tx, &store_name, &stored_at)?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Store a batch of responses as one transaction.
    ///
    /// The store is created in the same transaction, so a failure leaves
    /// neither the store nor any of the entries behind.
    pub async fn put_entries(&self, store_name: &str, entries: &[(Request, Response)]) -> Result<(), Error> {
        let records = entries
            .iter()
            .map(|(request, response)| EntryRecord::new(request, response))
            .collect::<Result<Vec<_>, _>>()?;
        let store_name = store_name.to_string();
        let stored_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO cache_stores (name, created_at) VALUES (?1, ?2)",
                    params![&store_name, &stored_at],
                )?;
                for record in &records {
                    record.insert(&tx, &store_name, &stored_at)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up a request in one named store.
    pub async fn match_entry(&self, store_name: &str, request: &Request) -> Result<Option<CachedEntry>, Error> {
        if !request.is_get() {
            return Ok(None);
        }
        let key_hash = compute_entry_key(&request.method, &request.cache_url());
        let store_name = store_name.to_string();
        let sql = format!("{SELECT_ENTRY} WHERE e.store_name = ?1 AND e.key_hash = ?2");
        self.query_entry(sql, vec![store_name, key_hash]).await
    }

    /// Look up a request across every store, oldest store first.
    pub async fn match_any(&self, request: &Request) -> Result<Option<CachedEntry>, Error> {
        if !request.is_get() {
            return Ok(None);
        }
        let key_hash = compute_entry_key(&request.method, &request.cache_url());
        let sql = format!("{SELECT_ENTRY} WHERE e.key_hash = ?1 ORDER BY s.rowid ASC LIMIT 1");
        self.query_entry(sql, vec![key_hash]).await
    }

    /// Number of entries held by a store.
    pub async fn entry_count(&self, store_name: &str) -> Result<u64, Error> {
        let store_name = store_name.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM cache_entries WHERE store_name = ?1",
                    params![store_name],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    async fn query_entry(&self, sql: String, args: Vec<String>) -> Result<Option<CachedEntry>, Error> {
        self.conn
            .call(move |conn| -> Result<Option<CachedEntry>, Error> {
                let mut stmt = conn.prepare(&sql)?;
                let result = stmt.query_row(rusqlite::params_from_iter(args.iter()), EntryRow::from_row);

                match result {
                    Ok(row) => row.decode().map(Some),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }
}
