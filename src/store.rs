//! The `bills` resource as seen by the controllers.

use async_trait::async_trait;

use crate::{
    errors::StoreError,
    structs::{Bill, FileRef, NewFile},
};

#[async_trait]
pub trait BillStore: Send + Sync {
    /// Bills owned by `email`, in store order.
    async fn list(&self, email: &str) -> Result<Vec<Bill>, StoreError>;

    /// Saves the receipt and opens a pending bill for it.
    async fn create(&self, file: NewFile) -> Result<FileRef, StoreError>;

    /// Writes `bill` over the record `selector`, or inserts it when there is none.
    async fn update(&self, selector: Option<&str>, bill: Bill) -> Result<Bill, StoreError>;

    /// Drops a receipt whose bill was never submitted. Submitted bills are left alone.
    async fn discard(&self, email: &str, key: &str) -> Result<(), StoreError>;
}
