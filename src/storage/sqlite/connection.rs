//! Connection handling for the `SQLite` store.
//!
//! Mutex acquisition with poison recovery, connection pragmas, and the
//! `BEGIN IMMEDIATE` transaction wrapper every multi-row write goes through.

use crate::{Error, Result};
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};

/// Acquires a mutex lock, recovering from poison.
///
/// If a previous critical section panicked, the inner value is recovered
/// and a warning is logged; a failed statement never leaves the connection
/// itself unusable.
pub fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Configures a connection: WAL journal, NORMAL synchronous, 5 second busy
/// timeout, and foreign key enforcement.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if foreign keys cannot be enabled.
pub fn configure_connection(conn: &Connection) -> Result<()> {
    // journal_mode returns a row, so pragma_update is used and the result ignored
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    let _ = conn.pragma_update(None, "busy_timeout", "5000");
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(|e| Error::OperationFailed {
            operation: "configure_connection".to_string(),
            cause: e.to_string(),
        })?;
    Ok(())
}

/// Runs `body` inside `BEGIN IMMEDIATE` ... `COMMIT`.
///
/// Any error from `body` or from the commit rolls the transaction back and
/// is returned unchanged.
///
/// # Errors
///
/// Returns the first error raised by `body`, or an
/// [`Error::OperationFailed`] if the transaction cannot begin or commit.
pub fn with_transaction<T>(
    conn: &Connection,
    body: impl FnOnce(&Connection) -> Result<T>,
) -> Result<T> {
    conn.execute("BEGIN IMMEDIATE", [])
        .map_err(|e| Error::OperationFailed {
            operation: "begin_transaction".to_string(),
            cause: e.to_string(),
        })?;

    let result = body(conn).and_then(|value| {
        conn.execute("COMMIT", [])
            .map(|_| value)
            .map_err(|e| Error::OperationFailed {
                operation: "commit_transaction".to_string(),
                cause: e.to_string(),
            })
    });

    if result.is_err() {
        let _ = conn.execute("ROLLBACK", []);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_acquire_lock_concurrent() {
        let mutex = Arc::new(Mutex::new(0));
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let mutex = Arc::clone(&mutex);
                thread::spawn(move || {
                    *acquire_lock(&mutex) += 1;
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(*acquire_lock(&mutex), 10);
    }

    #[test]
    fn test_acquire_lock_recovers_from_poison() {
        let mutex = Arc::new(Mutex::new(1));
        let poisoner = Arc::clone(&mutex);
        let _ = thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert!(mutex.is_poisoned());
        assert_eq!(*acquire_lock(&mutex), 1);
    }

    #[test]
    fn test_configure_connection() {
        let conn = Connection::open_in_memory().unwrap();
        configure_connection(&conn).unwrap();

        let synchronous: i32 = conn
            .pragma_query_value(None, "synchronous", |row| row.get(0))
            .unwrap();
        assert_eq!(synchronous, 1);

        let busy_timeout: i32 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .unwrap();
        assert_eq!(busy_timeout, 5000);

        let foreign_keys: i32 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert_eq!(foreign_keys, 1);
    }

    fn counter_table() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE t (n INTEGER NOT NULL)", []).unwrap();
        conn
    }

    fn row_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_with_transaction_commits() {
        let conn = counter_table();
        let value = with_transaction(&conn, |tx| {
            tx.execute("INSERT INTO t (n) VALUES (1)", [])
                .map_err(|e| Error::OperationFailed {
                    operation: "insert".to_string(),
                    cause: e.to_string(),
                })?;
            Ok(7)
        })
        .unwrap();
        assert_eq!(value, 7);
        assert_eq!(row_count(&conn), 1);
    }

    #[test]
    fn test_with_transaction_rolls_back_on_error() {
        let conn = counter_table();
        let result: Result<()> = with_transaction(&conn, |tx| {
            tx.execute("INSERT INTO t (n) VALUES (1)", [])
                .map_err(|e| Error::OperationFailed {
                    operation: "insert".to_string(),
                    cause: e.to_string(),
                })?;
            Err(Error::NotFound("second row".to_string()))
        });
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(row_count(&conn), 0);

        // the connection is usable again after the rollback
        with_transaction(&conn, |_| Ok(())).unwrap();
    }
}
