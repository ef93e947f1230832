use actix_multipart::form::{bytes::Bytes, MultipartForm, MultipartFormConfig};
use actix_session::Session;
use actix_web::{
    get,
    http::header,
    post,
    web::{self, Data},
    HttpResponse, Responder,
};
use serde::Deserialize;

use crate::{
    bills::BillsController,
    errors::AppError,
    navigation::{paths, RecordingNavigator},
    new_bill::{NewBillController, SubmitState},
    session::{SessionProvider, PENDING_FILE_KEY, USER_KEY},
    structs::{Attachment, NewBillForm, PendingUpload, SessionUser, UserType},
    views::{Page, TEMPLATES},
    AppState,
};

const MAX_RECEIPT_BYTES: usize = 10 * 1024 * 1024;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        MultipartFormConfig::default()
            .total_limit(MAX_RECEIPT_BYTES)
            .memory_limit(MAX_RECEIPT_BYTES),
    )
    .service(login_handler)
    .service(login_form_handler)
    .service(logout_handler)
    .service(bills_handler)
    .service(new_bill_button_handler)
    .service(new_bill_handler)
    .service(new_bill_file_handler)
    .service(new_bill_form_handler)
    .service(attachment_handler);
}

fn see_other(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .append_header((header::LOCATION, location))
        .finish()
}

fn html(page: &Page) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(page.html()?))
}

fn pending_upload(session: &Session) -> Result<Option<PendingUpload>, AppError> {
    session
        .get::<PendingUpload>(PENDING_FILE_KEY)
        .map_err(|e| AppError::SessionError(e.to_string()))
}

/// Login handler
#[get("/")]
pub async fn login_handler(session: Session) -> Result<impl Responder, AppError> {
    if session.current_user()?.is_some() {
        return Ok(see_other(paths::BILLS));
    }

    let page = Page {
        title: "Billed".into(),
        body: TEMPLATES.render("login.html", &tera::Context::new()).map_err(|e| {
            log::error!("Failed to render template: {}", e);
            AppError::TemplateError(e)
        })?,
        ..Default::default()
    };
    html(&page)
}

#[derive(Deserialize)]
pub struct Login {
    email: String,
    #[serde(rename = "type", default = "employee")]
    user_type: UserType,
}

fn employee() -> UserType {
    UserType::Employee
}

/// Stores the identity the bills pages read. Credentials are not checked here.
#[post("/login")]
pub async fn login_form_handler(
    web::Form(form): web::Form<Login>,
    session: Session,
) -> Result<impl Responder, AppError> {
    if form.email.is_empty() {
        return Ok(HttpResponse::BadRequest().body("All fields are required"));
    }
    if !form.email.contains('@') {
        return Ok(HttpResponse::BadRequest().body("Invalid email address"));
    }

    let user = SessionUser {
        user_type: form.user_type,
        email: form.email.to_lowercase(),
    };
    session.renew();
    session
        .insert(USER_KEY, &user)
        .map_err(|e| AppError::SessionError(e.to_string()))?;
    log::info!("{} signed in as {:?}", user.email, user.user_type);

    Ok(see_other(paths::BILLS))
}

#[post("/logout")]
pub async fn logout_handler(session: Session) -> impl Responder {
    session.purge();
    see_other(paths::LOGIN)
}

#[get("/bills")]
pub async fn bills_handler(state: Data<AppState>, session: Session) -> Result<impl Responder, AppError> {
    let navigator = RecordingNavigator::new();
    let mut bills = match BillsController::new(state.store.clone(), &session, &navigator) {
        Ok(bills) => bills,
        Err(AppError::Unauthorized) => return Ok(see_other(paths::LOGIN)),
        Err(e) => return Err(e),
    };

    bills.activate().await?;
    html(bills.page())
}

/// The "new bill" button of the list.
#[post("/bills")]
pub async fn new_bill_button_handler(state: Data<AppState>, session: Session) -> Result<impl Responder, AppError> {
    let navigator = RecordingNavigator::new();
    let bills = match BillsController::new(state.store.clone(), &session, &navigator) {
        Ok(bills) => bills,
        Err(AppError::Unauthorized) => return Ok(see_other(paths::LOGIN)),
        Err(e) => return Err(e),
    };

    bills.on_new_bill();
    Ok(see_other(&navigator.last().unwrap_or_else(|| paths::BILLS.to_owned())))
}

#[get("/bills/{id}/attachment")]
pub async fn attachment_handler(
    state: Data<AppState>,
    session: Session,
    path: web::Path<String>,
) -> Result<impl Responder, AppError> {
    let id = path.into_inner();
    let navigator = RecordingNavigator::new();
    let mut bills = match BillsController::new(state.store.clone(), &session, &navigator) {
        Ok(bills) => bills,
        Err(AppError::Unauthorized) => return Ok(see_other(paths::LOGIN)),
        Err(e) => return Err(e),
    };

    // the error panel is already on the page when the store failed
    let Some(rows) = bills.activate().await? else {
        return html(bills.page());
    };
    let row = rows.iter().find(|row| row.id == id).ok_or(AppError::NotFound)?;
    bills.on_view_attachment(row)?;
    html(bills.page())
}

#[get("/bills/new")]
pub async fn new_bill_handler(state: Data<AppState>, session: Session) -> Result<impl Responder, AppError> {
    let navigator = RecordingNavigator::new();
    let pending = pending_upload(&session)?;
    let new_bill = match NewBillController::new(state.store.clone(), &session, &navigator, pending) {
        Ok(new_bill) => new_bill,
        Err(AppError::Unauthorized) => return Ok(see_other(paths::LOGIN)),
        Err(e) => return Err(e),
    };
    html(new_bill.page())
}

#[derive(MultipartForm)]
pub struct ReceiptUpload {
    file: Bytes,
}

/// Receives the receipt picked in the file input of the new bill page.
#[post("/bills/new/file")]
pub async fn new_bill_file_handler(
    state: Data<AppState>,
    session: Session,
    MultipartForm(form): MultipartForm<ReceiptUpload>,
) -> Result<impl Responder, AppError> {
    let navigator = RecordingNavigator::new();
    let pending = pending_upload(&session)?;
    let mut new_bill = match NewBillController::new(state.store.clone(), &session, &navigator, pending) {
        Ok(new_bill) => new_bill,
        Err(AppError::Unauthorized) => return Ok(see_other(paths::LOGIN)),
        Err(e) => return Err(e),
    };

    // browsers post an unnamed empty part when nothing was picked
    let files = match form.file.file_name.filter(|name| !name.is_empty()) {
        Some(file_name) => {
            let mime_type = form
                .file
                .content_type
                .map_or_else(|| "application/octet-stream".to_owned(), |m| m.to_string());
            vec![Attachment::new(file_name, mime_type, form.file.data)]
        }
        None => Vec::new(),
    };
    let selected = !files.is_empty();

    let valid = new_bill.on_file_selected(files).await?;
    match new_bill.pending_upload() {
        Some(pending) => session
            .insert(PENDING_FILE_KEY, pending)
            .map_err(|e| AppError::SessionError(e.to_string()))?,
        None => {
            session.remove(PENDING_FILE_KEY);
        }
    }

    let mut response = if selected && !valid {
        HttpResponse::UnprocessableEntity()
    } else if new_bill.file_error().is_some() {
        HttpResponse::InternalServerError()
    } else {
        HttpResponse::Ok()
    };
    Ok(response
        .content_type("text/html; charset=utf-8")
        .body(new_bill.page().html()?))
}

#[post("/bills/new")]
pub async fn new_bill_form_handler(
    web::Form(form): web::Form<NewBillForm>,
    state: Data<AppState>,
    session: Session,
) -> Result<impl Responder, AppError> {
    let navigator = RecordingNavigator::new();
    let pending = pending_upload(&session)?;
    let mut new_bill = match NewBillController::new(state.store.clone(), &session, &navigator, pending) {
        Ok(new_bill) => new_bill,
        Err(AppError::Unauthorized) => return Ok(see_other(paths::LOGIN)),
        Err(e) => return Err(e),
    };

    match new_bill.on_submit(form).await? {
        SubmitState::Navigated => {
            session.remove(PENDING_FILE_KEY);
            Ok(see_other(&navigator.last().unwrap_or_else(|| paths::BILLS.to_owned())))
        }
        _ => Ok(HttpResponse::BadRequest()
            .content_type("text/html; charset=utf-8")
            .body(new_bill.page().html()?)),
    }
}
