use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use crate::account::database::{AccountDatabase, AccountDatabaseError};
use crate::account::entities::Account;
use crate::crypto::salted_hash::SaltedHash;
use crate::profiles::database::ProfileDatabase;
use crate::profiles::entities::{PROFILE_COLLECTION, ProfileRecord};
use crate::profiles::error::ProfileError;

pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates the necessary tables if they don't exist
    pub async fn init(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                uid TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                display_name TEXT,
                photo_url TEXT,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Profile documents, one per uid
        let create_profiles = format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{PROFILE_COLLECTION}" (
                uid TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                email TEXT NOT NULL,
                photo_url TEXT,
                created_at INTEGER NOT NULL
            )
            "#
        );
        sqlx::query(&create_profiles).execute(&self.pool).await?;

        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

fn timestamp_from_millis(millis: i64) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| sqlx::Error::Decode(format!("invalid timestamp {millis}").into()))
}

// ACCOUNTS

impl From<sqlx::Error> for AccountDatabaseError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("account database error: {}", err);
        AccountDatabaseError::OperationFailed
    }
}

fn account_from_row(row: &SqliteRow) -> Result<Account, AccountDatabaseError> {
    let password_hash: String = row.try_get("password_hash")?;
    let created_at: i64 = row.try_get("created_at")?;

    Ok(Account {
        uid: row.try_get("uid")?,
        email: row.try_get("email")?,
        password_hash: SaltedHash::try_from(password_hash)
            .map_err(|_| AccountDatabaseError::OperationFailed)?,
        display_name: row.try_get("display_name")?,
        photo_url: row.try_get("photo_url")?,
        created_at: timestamp_from_millis(created_at)?,
    })
}

#[async_trait]
impl AccountDatabase for SqliteDatabase {
    async fn insert_account(&self, account: Account) -> Result<(), AccountDatabaseError> {
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (uid, email, password_hash, display_name, photo_url, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.uid)
        .bind(&account.email)
        .bind(account.password_hash.to_string())
        .bind(account.display_name.as_deref())
        .bind(account.photo_url.as_deref())
        .bind(account.created_at.timestamp_millis())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(AccountDatabaseError::DuplicateEmail(account.email))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn fetch_account(&self, uid: &str) -> Result<Option<Account>, AccountDatabaseError> {
        let row = sqlx::query(
            r#"
            SELECT uid, email, password_hash, display_name, photo_url, created_at
            FROM accounts
            WHERE uid = ?
            "#,
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(account_from_row).transpose()
    }

    async fn fetch_account_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Account>, AccountDatabaseError> {
        let row = sqlx::query(
            r#"
            SELECT uid, email, password_hash, display_name, photo_url, created_at
            FROM accounts
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(account_from_row).transpose()
    }

    async fn update_account(&self, account: Account) -> Result<(), AccountDatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET email = ?, password_hash = ?, display_name = ?, photo_url = ?
            WHERE uid = ?
            "#,
        )
        .bind(&account.email)
        .bind(account.password_hash.to_string())
        .bind(account.display_name.as_deref())
        .bind(account.photo_url.as_deref())
        .bind(&account.uid)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AccountDatabaseError::NotFound(account.uid));
        }

        Ok(())
    }
}

// PROFILES

#[async_trait]
impl ProfileDatabase for SqliteDatabase {
    async fn put_profile(&self, record: ProfileRecord) -> Result<(), ProfileError> {
        let insert = format!(
            r#"
            INSERT INTO "{PROFILE_COLLECTION}" (uid, display_name, email, photo_url, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#
        );
        let result = sqlx::query(&insert)
            .bind(&record.uid)
            .bind(&record.display_name)
            .bind(&record.email)
            .bind(record.photo_url.as_deref())
            .bind(record.created_at.timestamp_millis())
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(ProfileError::AlreadyExists(record.uid)),
            Err(err) => Err(err.into()),
        }
    }

    async fn get_profile(&self, uid: &str) -> Result<Option<ProfileRecord>, ProfileError> {
        let select = format!(
            r#"
            SELECT uid, display_name, email, photo_url, created_at
            FROM "{PROFILE_COLLECTION}"
            WHERE uid = ?
            "#
        );
        let row = sqlx::query(&select)
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let created_at: i64 = row.try_get("created_at")?;
        Ok(Some(ProfileRecord {
            uid: row.try_get("uid")?,
            display_name: row.try_get("display_name")?,
            email: row.try_get("email")?,
            photo_url: row.try_get("photo_url")?,
            created_at: timestamp_from_millis(created_at)?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup() -> SqliteDatabase {
        // A single connection keeps the in-memory database alive and shared
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let db = SqliteDatabase::new(pool);
        db.init().await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_account_insert_fetch_update() {
        let db = setup().await;
        let account = Account::new(
            "alice@example.com".to_string(),
            SaltedHash::generate_from("Secret123!").unwrap(),
        );
        let uid = account.uid.clone();

        db.insert_account(account.clone()).await.unwrap();

        let mut stored = db
            .fetch_account_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.uid, uid);
        assert!(stored.password_hash.verify_password("Secret123!").is_ok());

        stored.display_name = Some("alice".to_string());
        db.update_account(stored).await.unwrap();

        let updated = db.fetch_account(&uid).await.unwrap().unwrap();
        assert_eq!(updated.display_name.as_deref(), Some("alice"));

        let duplicate = Account::new(
            "alice@example.com".to_string(),
            SaltedHash::generate_from("Other123!").unwrap(),
        );
        assert!(matches!(
            db.insert_account(duplicate).await,
            Err(AccountDatabaseError::DuplicateEmail(_))
        ));
    }

    #[tokio::test]
    async fn test_profile_written_once() {
        let db = setup().await;
        let record = ProfileRecord {
            uid: "u1".to_string(),
            display_name: "alice".to_string(),
            email: "alice@example.com".to_string(),
            photo_url: Some("https://cdn.example.com/images/u1/a.png".to_string()),
            created_at: DateTime::from_timestamp_millis(1_700_000_000_000).unwrap(),
        };

        db.put_profile(record.clone()).await.unwrap();

        assert_eq!(db.get_profile("u1").await.unwrap(), Some(record.clone()));
        assert!(db.get_profile("u2").await.unwrap().is_none());
        assert!(matches!(
            db.put_profile(record).await,
            Err(ProfileError::AlreadyExists(_))
        ));

        let count: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM "user""#)
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
