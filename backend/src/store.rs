use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Postgres, QueryBuilder, Row};
use thiserror::Error;

use crate::models::{Birthday, NewBirthday};

// Four binds per row keeps each statement well under Postgres' 65535 parameter limit.
const IMPORT_CHUNK_SIZE: usize = 1000;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait BirthdayStore: Send + Sync {
    async fn list_by_fingerprint(&self, fingerprint: &str) -> Result<Vec<Birthday>, StoreError>;

    /// All owners' rows falling on the given calendar day.
    async fn list_by_date(&self, month: i32, day: i32) -> Result<Vec<Birthday>, StoreError>;

    async fn create(&self, birthday: &NewBirthday) -> Result<i32, StoreError>;

    /// Returns the number of rows affected; zero when `id` does not exist.
    async fn update(&self, id: i32, birthday: &NewBirthday) -> Result<u64, StoreError>;

    /// Returns the number of rows affected; zero when `id` does not exist.
    async fn delete(&self, id: i32) -> Result<u64, StoreError>;

    async fn bulk_import(&self, birthdays: &[NewBirthday]) -> Result<u64, StoreError>;
}

pub struct PgBirthdayStore {
    db: PgPool,
}

impl PgBirthdayStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS birthdays (
                id SERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                month INTEGER NOT NULL,
                day INTEGER NOT NULL,
                fingerprint TEXT NOT NULL
            )",
        )
        .execute(&self.db)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS birthdays_fingerprint_idx ON birthdays (fingerprint)")
            .execute(&self.db)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS birthdays_month_day_idx ON birthdays (month, day)")
            .execute(&self.db)
            .await?;

        Ok(())
    }
}

fn birthday_from_row(row: &PgRow) -> Result<Birthday, sqlx::Error> {
    Ok(Birthday {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        month: row.try_get("month")?,
        day: row.try_get("day")?,
        fingerprint: row.try_get("fingerprint")?,
    })
}

#[async_trait]
impl BirthdayStore for PgBirthdayStore {
    async fn list_by_fingerprint(&self, fingerprint: &str) -> Result<Vec<Birthday>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, name, month, day, fingerprint FROM birthdays WHERE fingerprint = $1 ORDER BY id",
        )
        .bind(fingerprint)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.iter().map(birthday_from_row).collect::<Result<Vec<_>, sqlx::Error>>()?)
    }

    async fn list_by_date(&self, month: i32, day: i32) -> Result<Vec<Birthday>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, name, month, day, fingerprint FROM birthdays WHERE month = $1 AND day = $2 ORDER BY id",
        )
        .bind(month)
        .bind(day)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.iter().map(birthday_from_row).collect::<Result<Vec<_>, sqlx::Error>>()?)
    }

    async fn create(&self, birthday: &NewBirthday) -> Result<i32, StoreError> {
        let id: i32 = sqlx::query_scalar(
            "INSERT INTO birthdays (name, month, day, fingerprint) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(&birthday.name)
        .bind(birthday.month)
        .bind(birthday.day)
        .bind(&birthday.fingerprint)
        .fetch_one(&self.db)
        .await?;

        Ok(id)
    }

    async fn update(&self, id: i32, birthday: &NewBirthday) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE birthdays SET name = $1, month = $2, day = $3, fingerprint = $4 WHERE id = $5",
        )
        .bind(&birthday.name)
        .bind(birthday.month)
        .bind(birthday.day)
        .bind(&birthday.fingerprint)
        .bind(id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete(&self, id: i32) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM birthdays WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }

    async fn bulk_import(&self, birthdays: &[NewBirthday]) -> Result<u64, StoreError> {
        if birthdays.is_empty() {
            return Ok(0);
        }

        let mut tx = self.db.begin().await?;
        let mut inserted = 0;

        for chunk in birthdays.chunks(IMPORT_CHUNK_SIZE) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO birthdays (name, month, day, fingerprint) ");
            builder.push_values(chunk, |mut row, birthday| {
                row.push_bind(&birthday.name)
                    .push_bind(birthday.month)
                    .push_bind(birthday.day)
                    .push_bind(&birthday.fingerprint);
            });

            inserted += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }
}

#[cfg(test)]
pub mod memory {
    use std::sync::atomic::{AtomicBool, Ordering};

    use tokio::sync::RwLock;

    use super::*;

    /// In-process stand-in for Postgres used by unit tests.
    #[derive(Default)]
    pub struct MemoryBirthdayStore {
        rows: RwLock<Vec<Birthday>>,
        next_id: RwLock<i32>,
        failing: AtomicBool,
    }

    impl MemoryBirthdayStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes every subsequent call fail like a dropped connection.
        pub fn fail_all(&self) {
            self.failing.store(true, Ordering::SeqCst);
        }

        pub async fn rows(&self) -> Vec<Birthday> {
            self.rows.read().await.clone()
        }

        fn check(&self) -> Result<(), StoreError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
            }
            Ok(())
        }

        async fn insert(&self, birthday: &NewBirthday) -> i32 {
            let mut next_id = self.next_id.write().await;
            *next_id += 1;
            self.rows.write().await.push(Birthday {
                id: *next_id,
                name: birthday.name.clone(),
                month: birthday.month,
                day: birthday.day,
                fingerprint: birthday.fingerprint.clone(),
            });
            *next_id
        }
    }

    #[async_trait]
    impl BirthdayStore for MemoryBirthdayStore {
        async fn list_by_fingerprint(&self, fingerprint: &str) -> Result<Vec<Birthday>, StoreError> {
            self.check()?;
            Ok(self
                .rows
                .read()
                .await
                .iter()
                .filter(|b| b.fingerprint == fingerprint)
                .cloned()
                .collect())
        }

        async fn list_by_date(&self, month: i32, day: i32) -> Result<Vec<Birthday>, StoreError> {
            self.check()?;
            Ok(self
                .rows
                .read()
                .await
                .iter()
                .filter(|b| b.month == month && b.day == day)
                .cloned()
                .collect())
        }

        async fn create(&self, birthday: &NewBirthday) -> Result<i32, StoreError> {
            self.check()?;
            Ok(self.insert(birthday).await)
        }

        async fn update(&self, id: i32, birthday: &NewBirthday) -> Result<u64, StoreError> {
            self.check()?;
            let mut rows = self.rows.write().await;
            match rows.iter_mut().find(|b| b.id == id) {
                Some(row) => {
                    row.name = birthday.name.clone();
                    row.month = birthday.month;
                    row.day = birthday.day;
                    row.fingerprint = birthday.fingerprint.clone();
                    Ok(1)
                }
                None => Ok(0),
            }
        }

        async fn delete(&self, id: i32) -> Result<u64, StoreError> {
            self.check()?;
            let mut rows = self.rows.write().await;
            let before = rows.len();
            rows.retain(|b| b.id != id);
            Ok((before - rows.len()) as u64)
        }

        async fn bulk_import(&self, birthdays: &[NewBirthday]) -> Result<u64, StoreError> {
            self.check()?;
            for birthday in birthdays {
                self.insert(birthday).await;
            }
            Ok(birthdays.len() as u64)
        }
    }
}
