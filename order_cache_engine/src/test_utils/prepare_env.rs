use std::{
    fs,
    path::Path,
    time::{Duration, SystemTime},
};

use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::SqliteDatabase;

/// Loads `.env.test`, initialises logging, and creates a fresh database with the order schema at `url`.
pub async fn prepare_test_env(url: &str) {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    create_database(url).await;
    run_migrations(url).await;
}

const TEST_DB_PREFIX: &str = "ocs_test_store_";
/// Test databases older than this are left over from earlier runs.
const STALE_TEST_DB_AGE: Duration = Duration::from_secs(60 * 60);

/// A throwaway SQLite database URL in the system temp directory. Databases left behind by earlier runs are removed.
pub fn random_db_path() -> String {
    let dir = std::env::temp_dir();
    remove_stale_test_databases(&dir, STALE_TEST_DB_AGE);
    let path = dir.join(format!("{TEST_DB_PREFIX}{}.db", rand::random::<u64>()));
    format!("sqlite://{}", path.display())
}

/// Deletes test database files (including their `-wal` and `-shm` companions) in `dir` that were last modified
/// more than `max_age` ago. Returns the number of files removed.
pub fn remove_stale_test_databases(dir: &Path, max_age: Duration) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    let now = SystemTime::now();
    entries
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with(TEST_DB_PREFIX))
        .filter(|e| {
            e.metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|t| now.duration_since(t).ok())
                .map_or(false, |age| age > max_age)
        })
        .filter(|e| fs::remove_file(e.path()).is_ok())
        .count()
}

pub async fn run_migrations(url: &str) {
    let db = SqliteDatabase::new_with_url(url, 1).await.expect("Error creating connection to database");
    db.create_schema().await.expect("Error running DB migrations");
    db.close().await;
    info!("🚀️ Migrations complete");
}

pub async fn create_database<P: AsRef<Path>>(path: P) {
    let p = path.as_ref().as_os_str().to_str().unwrap();
    if let Err(e) = Sqlite::drop_database(p).await {
        trace!("Could not drop database {p}: {e:?}");
    }
    Sqlite::create_database(p).await.expect("Error creating database");
    info!("Created Sqlite database {p}");
}

#[cfg(test)]
mod test {
    use std::fs::File;

    use super::*;

    #[test]
    fn stale_test_databases_are_removed() {
        let dir = std::env::temp_dir().join(format!("ocs_cleanup_{}", rand::random::<u64>()));
        fs::create_dir_all(&dir).unwrap();
        let stale = dir.join(format!("{TEST_DB_PREFIX}1.db-wal"));
        let fresh = dir.join(format!("{TEST_DB_PREFIX}2.db"));
        let unrelated = dir.join("orders.db");
        for path in [&stale, &fresh, &unrelated] {
            File::create(path).unwrap();
        }
        let two_hours_ago = SystemTime::now() - Duration::from_secs(2 * 60 * 60);
        for path in [&stale, &unrelated] {
            File::options().write(true).open(path).unwrap().set_modified(two_hours_ago).unwrap();
        }

        assert_eq!(remove_stale_test_databases(&dir, STALE_TEST_DB_AGE), 1);
        assert!(!stale.exists());
        assert!(fresh.exists());
        assert!(unrelated.exists());
        fs::remove_dir_all(&dir).unwrap();
    }
}
