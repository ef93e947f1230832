use std::{
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode},
    SqlitePool,
};
use uuid::Uuid;

use crate::{
    errors::{AppError, StoreError},
    store::BillStore,
    structs::{Bill, BillRecord, FileRef, NewFile},
};

/// Route under which uploaded receipts are served.
pub const UPLOADS_ROUTE: &str = "/uploads";

pub async fn connect(database_url: &str) -> Result<SqlitePool, AppError> {
    let opts = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .read_only(false)
        .busy_timeout(Duration::from_secs(5));

    let db_pool = SqlitePool::connect_with(opts).await?;
    sqlx::migrate!().run(&db_pool).await.map_err(|e| {
        log::error!("Migration failed: {}", e);
        AppError::SqlxError(e.into())
    })?;
    log::info!("Database migrated successfully");
    Ok(db_pool)
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    upload_dir: PathBuf,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            pool,
            upload_dir: upload_dir.into(),
        }
    }

    #[cfg(test)]
    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }
}

fn to_bill(row: BillRecord) -> Result<Bill, StoreError> {
    let id = row.id.clone();
    Bill::try_from(row).map_err(|e| {
        log::error!("Unreadable bill {}: {}", id, e);
        StoreError::Internal(format!("bill {id} is corrupted"))
    })
}

/// Keeps only the last path component so a name cannot escape its directory.
fn safe_file_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("receipt")
        .to_owned()
}

#[async_trait]
impl BillStore for SqliteStore {
    async fn list(&self, email: &str) -> Result<Vec<Bill>, StoreError> {
        let rows = sqlx::query_as::<_, BillRecord>(
            "SELECT * FROM bills WHERE email = $1 AND date IS NOT NULL ORDER BY created_at",
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;
        log::debug!("{} bills for {}", rows.len(), email);
        rows.into_iter().map(to_bill).collect()
    }

    async fn create(&self, file: NewFile) -> Result<FileRef, StoreError> {
        let key = Uuid::new_v4().to_string();
        let file_name = safe_file_name(&file.attachment.file_name);

        let dir = self.upload_dir.join(&key);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(&file_name), &file.attachment.data).await?;

        let file_url = format!("{}/{}/{}", UPLOADS_ROUTE, key, file_name);
        let created_at = chrono::Utc::now().to_string();
        sqlx::query(
            "INSERT INTO bills (id, email, file_url, file_name, status, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&key)
        .bind(&file.email)
        .bind(&file_url)
        .bind(&file_name)
        .bind("pending")
        .bind(&created_at)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;

        log::info!("Receipt {} stored for {} under {}", file_name, file.email, key);
        Ok(FileRef { file_url, key })
    }

    async fn update(&self, selector: Option<&str>, bill: Bill) -> Result<Bill, StoreError> {
        let now = chrono::Utc::now().to_string();
        let date = bill.date.format("%Y-%m-%d").to_string();

        let row = match selector {
            Some(id) => sqlx::query_as::<_, BillRecord>(
                "UPDATE bills SET expense_type = $1, name = $2, date = $3, amount = $4, vat = $5, pct = $6, commentary = $7, file_url = $8, file_name = $9, status = $10, updated_at = $11 WHERE id = $12 AND email = $13 RETURNING *",
            )
            .bind(&bill.expense_type)
            .bind(&bill.name)
            .bind(&date)
            .bind(bill.amount)
            .bind(bill.vat)
            .bind(bill.pct)
            .bind(&bill.commentary)
            .bind(&bill.file_url)
            .bind(&bill.file_name)
            .bind(bill.status.as_str())
            .bind(&now)
            .bind(id)
            .bind(&bill.email)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("bill {id}")))?,
            None => sqlx::query_as::<_, BillRecord>(
                "INSERT INTO bills (id, email, expense_type, name, date, amount, vat, pct, commentary, file_url, file_name, status, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) RETURNING *",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&bill.email)
            .bind(&bill.expense_type)
            .bind(&bill.name)
            .bind(&date)
            .bind(bill.amount)
            .bind(bill.vat)
            .bind(bill.pct)
            .bind(&bill.commentary)
            .bind(&bill.file_url)
            .bind(&bill.file_name)
            .bind(bill.status.as_str())
            .bind(&now)
            .bind(&now)
            .fetch_one(&self.pool)
            .await?,
        };

        log::info!("Bill {} saved for {}", row.id, row.email);
        to_bill(row)
    }

    async fn discard(&self, email: &str, key: &str) -> Result<(), StoreError> {
        let deleted = sqlx::query("DELETE FROM bills WHERE id = $1 AND email = $2 AND date IS NULL")
            .bind(key)
            .bind(email)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if deleted == 0 {
            log::debug!("No draft {} to discard for {}", key, email);
            return Ok(());
        }

        match tokio::fs::remove_dir_all(self.upload_dir.join(key)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        log::info!("Discarded draft receipt {} for {}", key, email);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;
    use crate::structs::{Attachment, BillStatus};

    async fn memory_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!().run(&pool).await.unwrap();
        let dir = std::env::temp_dir().join(format!("billed-test-{}", Uuid::new_v4()));
        SqliteStore::new(pool, dir)
    }

    fn bill(email: &str, date: NaiveDate) -> Bill {
        Bill {
            id: String::new(),
            email: email.into(),
            expense_type: "Transports".into(),
            name: "Vol Paris Londres".into(),
            date,
            amount: 348,
            vat: 70,
            pct: 20,
            commentary: String::new(),
            file_url: None,
            file_name: None,
            status: BillStatus::Pending,
        }
    }

    #[actix_web::test]
    async fn upload_then_update_lists_the_bill() {
        let store = memory_store().await;
        let upload = NewFile {
            attachment: Attachment::new("../../receipt.png", "image/png", b"png".to_vec()),
            email: "a@a".into(),
        };

        let file_ref = store.create(upload).await.unwrap();
        assert!(file_ref.file_url.ends_with("/receipt.png"));
        assert!(store.upload_dir().join(&file_ref.key).join("receipt.png").exists());
        // a receipt alone has no date yet and stays out of the list
        assert!(store.list("a@a").await.unwrap().is_empty());

        let mut draft = bill("a@a", NaiveDate::from_ymd_opt(2022, 2, 19).unwrap());
        draft.file_url = Some(file_ref.file_url.clone());
        draft.file_name = Some("receipt.png".into());
        let saved = store.update(Some(&file_ref.key), draft).await.unwrap();
        assert_eq!(saved.id, file_ref.key);

        let listed = store.list("a@a").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, BillStatus::Pending);
        assert_eq!(listed[0].file_url.as_deref(), Some(file_ref.file_url.as_str()));
        assert!(store.list("b@b").await.unwrap().is_empty());

        let _ = tokio::fs::remove_dir_all(store.upload_dir()).await;
    }

    #[actix_web::test]
    async fn update_without_selector_inserts() {
        let store = memory_store().await;

        let saved = store
            .update(None, bill("a@a", NaiveDate::from_ymd_opt(2021, 1, 1).unwrap()))
            .await
            .unwrap();

        assert!(!saved.id.is_empty());
        assert_eq!(store.list("a@a").await.unwrap(), vec![saved]);
    }

    #[actix_web::test]
    async fn unknown_selector_is_a_404() {
        let store = memory_store().await;

        let err = store
            .update(Some("missing"), bill("a@a", NaiveDate::from_ymd_opt(2021, 1, 1).unwrap()))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(err.to_string().contains("404"));
    }

    #[actix_web::test]
    async fn discard_removes_drafts_but_not_submitted_bills() {
        let store = memory_store().await;
        let receipt = |name: &str| NewFile {
            attachment: Attachment::new(name, "image/png", b"png".to_vec()),
            email: "a@a".into(),
        };

        let draft = store.create(receipt("first.png")).await.unwrap();
        store.discard("b@b", &draft.key).await.unwrap();
        assert!(store.upload_dir().join(&draft.key).exists());
        store.discard("a@a", &draft.key).await.unwrap();
        assert!(!store.upload_dir().join(&draft.key).exists());

        let kept = store.create(receipt("second.png")).await.unwrap();
        let mut submitted = bill("a@a", NaiveDate::from_ymd_opt(2022, 3, 1).unwrap());
        submitted.file_url = Some(kept.file_url.clone());
        store.update(Some(&kept.key), submitted).await.unwrap();
        store.discard("a@a", &kept.key).await.unwrap();

        assert!(store.upload_dir().join(&kept.key).exists());
        assert_eq!(store.list("a@a").await.unwrap().len(), 1);

        let _ = tokio::fs::remove_dir_all(store.upload_dir()).await;
    }

    #[test]
    fn file_names_lose_their_directories() {
        assert_eq!(safe_file_name("../../etc/passwd.png"), "passwd.png");
        assert_eq!(safe_file_name("scan.jpg"), "scan.jpg");
        assert_eq!(safe_file_name(".."), "receipt");
    }
}
