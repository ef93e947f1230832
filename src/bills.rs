use std::sync::Arc;

use crate::{
    errors::AppError,
    navigation::{paths, Navigator},
    session::SessionProvider,
    store::BillStore,
    structs::{Bill, SessionUser},
    utils::{format_date, format_status},
    views::{self, BillRow, Page},
};

/// Drives the employee's bills list.
pub struct BillsController<'a> {
    store: Arc<dyn BillStore>,
    navigator: &'a dyn Navigator,
    user: SessionUser,
    page: Page,
}

impl<'a> BillsController<'a> {
    pub fn new(
        store: Arc<dyn BillStore>,
        session: &dyn SessionProvider,
        navigator: &'a dyn Navigator,
    ) -> Result<Self, AppError> {
        let user = session.current_user()?.ok_or(AppError::Unauthorized)?;
        Ok(Self {
            store,
            navigator,
            user,
            page: Page {
                title: "Mes notes de frais".into(),
                ..Default::default()
            },
        })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Fetches the user's bills and renders them, newest first.
    ///
    /// A store failure renders the error panel instead and yields `None`.
    pub async fn activate(&mut self) -> Result<Option<Vec<BillRow>>, AppError> {
        match self.store.list(&self.user.email).await {
            Ok(bills) => {
                let rows = to_rows(bills);
                log::info!("Rendering {} bills for {}", rows.len(), self.user.email);
                self.page.body = views::bills_ui(&rows)?;
                Ok(Some(rows))
            }
            Err(e) => {
                log::error!("Failed to list bills: {}", e);
                self.page.body = views::error_ui(&e.to_string())?;
                Ok(None)
            }
        }
    }

    /// Opens the receipt dialog for `bill`. Every call opens it once.
    pub fn on_view_attachment(&mut self, bill: &BillRow) -> Result<(), AppError> {
        let modal = views::attachment_modal(bill.file_url.as_deref(), bill.file_name.as_deref())?;
        self.page.open_modal(modal);
        log::debug!("Receipt dialog for {} (opened {} times)", bill.id, self.page.modal_opens);
        Ok(())
    }

    pub fn on_new_bill(&self) {
        self.navigator.navigate(paths::NEW_BILL);
    }
}

fn to_rows(mut bills: Vec<Bill>) -> Vec<BillRow> {
    bills.sort_by(|a, b| b.date.cmp(&a.date));
    bills
        .into_iter()
        .map(|bill| BillRow {
            iso_date: bill.date.format("%Y-%m-%d").to_string(),
            date: format_date(bill.date),
            status: format_status(bill.status).to_owned(),
            id: bill.id,
            expense_type: bill.expense_type,
            name: bill.name,
            amount: bill.amount,
            file_url: bill.file_url,
            file_name: bill.file_name,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{
        errors::StoreError,
        navigation::RecordingNavigator,
        session::MemorySession,
        store::mock::{fixtures, MockStore, StoreCall},
        structs::UserType,
    };

    fn employee() -> MemorySession {
        MemorySession::with_user(&SessionUser {
            user_type: UserType::Employee,
            email: "a@a".into(),
        })
        .unwrap()
    }

    fn rendered_dates(html: &str) -> Vec<String> {
        html.split("data-date=\"")
            .skip(1)
            .map(|rest| rest.split('"').next().unwrap_or_default().to_owned())
            .collect()
    }

    #[actix_web::test]
    async fn bills_are_ordered_from_latest_to_earliest() {
        let store = Arc::new(MockStore::new());
        let navigator = RecordingNavigator::new();
        let mut bills = BillsController::new(store.clone(), &employee(), &navigator).unwrap();

        let rows = bills.activate().await.unwrap().unwrap();

        let dates = rendered_dates(&bills.page().body);
        assert_eq!(dates, vec!["2004-04-04", "2003-03-03", "2002-02-02", "2001-01-01"]);
        assert_eq!(rows.iter().map(|r| r.iso_date.clone()).collect::<Vec<_>>(), dates);
        assert_eq!(rows[0].date, "4 Avr. 04");
        assert_eq!(store.calls(), vec![StoreCall::List("a@a".into())]);
    }

    #[actix_web::test]
    async fn dates_in_2022_render_in_descending_order() {
        let mut records = fixtures();
        records.truncate(3);
        for (bill, month) in records.iter_mut().zip([1, 3, 2]) {
            bill.date = NaiveDate::from_ymd_opt(2022, month, 1).unwrap();
        }
        let store = Arc::new(MockStore::with_bills(records));
        let navigator = RecordingNavigator::new();
        let mut bills = BillsController::new(store, &employee(), &navigator).unwrap();

        bills.activate().await.unwrap();

        assert_eq!(
            rendered_dates(&bills.page().body),
            vec!["2022-03-01", "2022-02-01", "2022-01-01"]
        );
    }

    #[actix_web::test]
    async fn bills_sharing_a_date_keep_store_order() {
        let mut records = fixtures();
        for bill in records.iter_mut() {
            bill.date = NaiveDate::from_ymd_opt(2020, 5, 5).unwrap();
        }
        let ids: Vec<String> = records.iter().map(|b| b.id.clone()).collect();
        let store = Arc::new(MockStore::with_bills(records));
        let navigator = RecordingNavigator::new();
        let mut bills = BillsController::new(store, &employee(), &navigator).unwrap();

        let rows = bills.activate().await.unwrap().unwrap();

        assert_eq!(rows.into_iter().map(|r| r.id).collect::<Vec<_>>(), ids);
    }

    #[actix_web::test]
    async fn empty_collection_renders_empty_table() {
        let store = Arc::new(MockStore::with_bills(Vec::new()));
        let navigator = RecordingNavigator::new();
        let mut bills = BillsController::new(store, &employee(), &navigator).unwrap();

        let rows = bills.activate().await.unwrap().unwrap();

        assert!(rows.is_empty());
        assert!(bills.page().body.contains("data-testid=\"tbody\""));
        assert!(!bills.page().body.contains("error-message"));
    }

    #[actix_web::test]
    async fn api_404_is_rendered() {
        let store = Arc::new(MockStore::new());
        store.fail_list_once(StoreError::NotFound("bills".into()));
        let navigator = RecordingNavigator::new();
        let mut bills = BillsController::new(store, &employee(), &navigator).unwrap();

        let rows = bills.activate().await.unwrap();

        assert!(rows.is_none());
        assert!(bills.page().body.contains("Erreur 404"));
        assert!(!bills.page().body.contains("data-testid=\"tbody\""));
    }

    #[actix_web::test]
    async fn api_500_is_rendered() {
        let store = Arc::new(MockStore::new());
        store.fail_list_once(StoreError::Internal("server".into()));
        let navigator = RecordingNavigator::new();
        let mut bills = BillsController::new(store, &employee(), &navigator).unwrap();

        assert!(bills.activate().await.unwrap().is_none());
        assert!(bills.page().body.contains("Erreur 500"));
    }

    #[actix_web::test]
    async fn each_eye_click_opens_the_modal_once() {
        let store = Arc::new(MockStore::new());
        let navigator = RecordingNavigator::new();
        let mut bills = BillsController::new(store, &employee(), &navigator).unwrap();
        let rows = bills.activate().await.unwrap().unwrap();

        for row in rows.iter().rev() {
            bills.on_view_attachment(row).unwrap();
        }

        assert_eq!(bills.page().modal_opens, rows.len());
        let modal = bills.page().modal.clone().unwrap();
        assert!(modal.contains("billable.jpg"));
    }

    #[actix_web::test]
    async fn bill_without_receipt_still_renders_and_opens_placeholder() {
        let store = Arc::new(MockStore::new());
        let navigator = RecordingNavigator::new();
        let mut bills = BillsController::new(store, &employee(), &navigator).unwrap();
        let rows = bills.activate().await.unwrap().unwrap();

        let bare = rows.iter().find(|r| r.file_url.is_none()).unwrap();
        assert!(bills.page().body.contains(&format!("data-bill-id=\"{}\"", bare.id)));
        bills.on_view_attachment(bare).unwrap();

        assert!(bills.page().modal.as_deref().unwrap().contains("Aucun justificatif"));
    }

    #[test]
    fn new_bill_button_navigates_to_form() {
        let store = Arc::new(MockStore::new());
        let navigator = RecordingNavigator::new();
        let bills = BillsController::new(store, &employee(), &navigator).unwrap();

        bills.on_new_bill();

        assert_eq!(navigator.last().as_deref(), Some(paths::NEW_BILL));
    }

    #[test]
    fn controller_requires_a_signed_in_user() {
        let store = Arc::new(MockStore::new());
        let navigator = RecordingNavigator::new();
        let result = BillsController::new(store, &MemorySession::new(), &navigator);
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }
}
