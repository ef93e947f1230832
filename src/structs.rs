use std::fmt;

use actix_web::web::Bytes;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::errors::FormError;

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BillStatus {
    #[default]
    Pending,
    Accepted,
    Refused,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Pending => "pending",
            BillStatus::Accepted => "accepted",
            BillStatus::Refused => "refused",
        }
    }
}

impl std::str::FromStr for BillStatus {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BillStatus::Pending),
            "accepted" => Ok(BillStatus::Accepted),
            "refused" => Ok(BillStatus::Refused),
            other => Err(FormError::Invalid("status", other.to_owned())),
        }
    }
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An expense report entry. `id` is assigned by the store.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Bill {
    pub id: String,
    pub email: String,
    #[serde(rename = "type")]
    pub expense_type: String,
    pub name: String,
    pub date: NaiveDate,
    pub amount: i64,
    pub vat: i64,
    pub pct: i64,
    pub commentary: String,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub status: BillStatus,
}

/// Raw `bills` row, dates and status kept as text like the rest of the schema.
#[derive(Debug, Clone, FromRow)]
pub struct BillRecord {
    pub id: String,
    pub email: String,
    pub expense_type: String,
    pub name: String,
    /// Empty until the bill form is submitted.
    pub date: Option<String>,
    pub amount: i64,
    pub vat: i64,
    pub pct: i64,
    pub commentary: String,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub status: String,
}

impl TryFrom<BillRecord> for Bill {
    type Error = FormError;

    fn try_from(row: BillRecord) -> Result<Self, Self::Error> {
        let raw_date = row.date.ok_or(FormError::Missing("date"))?;
        let date = NaiveDate::parse_from_str(&raw_date, "%Y-%m-%d")
            .map_err(|_| FormError::Invalid("date", raw_date.clone()))?;
        Ok(Bill {
            id: row.id,
            email: row.email,
            expense_type: row.expense_type,
            name: row.name,
            date,
            amount: row.amount,
            vat: row.vat,
            pct: row.pct,
            commentary: row.commentary,
            file_url: row.file_url,
            file_name: row.file_name,
            status: row.status.parse()?,
        })
    }
}

/// Values posted by the new bill form, untouched.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct NewBillForm {
    #[serde(rename = "type")]
    pub expense_type: String,
    #[serde(default)]
    pub name: String,
    pub date: String,
    pub amount: String,
    #[serde(default)]
    pub vat: String,
    #[serde(default)]
    pub pct: String,
    #[serde(default)]
    pub commentary: String,
}

impl NewBillForm {
    /// Builds a pending bill for `email`. Empty `pct` falls back to 20, empty `vat` to 0.
    pub fn into_bill(self, email: &str, file: Option<&FileRef>, file_name: Option<&str>) -> Result<Bill, FormError> {
        if self.expense_type.trim().is_empty() {
            return Err(FormError::Missing("type"));
        }
        let date = self.date.trim();
        if date.is_empty() {
            return Err(FormError::Missing("date"));
        }
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|_| FormError::Invalid("date", self.date.clone()))?;
        let amount = parse_number("amount", &self.amount)?
            .ok_or(FormError::Missing("amount"))?;
        let vat = parse_number("vat", &self.vat)?.unwrap_or(0);
        let pct = parse_number("pct", &self.pct)?.unwrap_or(20);

        Ok(Bill {
            id: String::new(),
            email: email.to_owned(),
            expense_type: self.expense_type,
            name: self.name,
            date,
            amount,
            vat,
            pct,
            commentary: self.commentary,
            file_url: file.map(|f| f.file_url.clone()),
            file_name: file_name.map(str::to_owned),
            status: BillStatus::Pending,
        })
    }
}

fn parse_number(field: &'static str, raw: &str) -> Result<Option<i64>, FormError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<i64>()
        .map(Some)
        .map_err(|_| FormError::Invalid(field, raw.to_owned()))
}

/// One entry of a file input selection.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub file_name: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }
}

/// Upload payload handed to the store.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub attachment: Attachment,
    pub email: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub file_url: String,
    pub key: String,
}

/// Upload kept between requests while the form is being filled.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    pub file_ref: FileRef,
    pub file_name: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserType {
    Employee,
    Admin,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    #[serde(rename = "type")]
    pub user_type: UserType,
    pub email: String,
}
