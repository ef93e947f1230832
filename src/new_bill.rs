use std::sync::Arc;

use crate::{
    errors::AppError,
    navigation::{paths, Navigator},
    session::SessionProvider,
    store::BillStore,
    structs::{Attachment, NewBillForm, NewFile, PendingUpload, SessionUser},
    views::{self, Page},
};

const ALLOWED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

pub const INVALID_FILE_MESSAGE: &str = "Seuls les fichiers jpg, jpeg et png sont acceptés";

/// True when `file_name` ends with a jpg, jpeg or png extension, in any case.
///
/// Only the name is looked at, never the file content.
pub fn validate_file(file_name: &str) -> bool {
    match file_name.rsplit_once('.') {
        Some((_, ext)) => ALLOWED_EXTENSIONS.iter().any(|allowed| ext.eq_ignore_ascii_case(allowed)),
        None => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Uploading,
    Uploaded(PendingUpload),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitState {
    Editing,
    Submitting,
    Submitted,
    Navigated,
}

/// Drives the new bill form: receipt upload, then submission.
pub struct NewBillController<'a> {
    store: Arc<dyn BillStore>,
    navigator: &'a dyn Navigator,
    user: SessionUser,
    page: Page,
    upload: UploadState,
    submit: SubmitState,
    file_error: Option<String>,
    form_error: Option<String>,
}

impl<'a> NewBillController<'a> {
    /// `pending` resumes a form whose receipt was uploaded by an earlier request.
    pub fn new(
        store: Arc<dyn BillStore>,
        session: &dyn SessionProvider,
        navigator: &'a dyn Navigator,
        pending: Option<PendingUpload>,
    ) -> Result<Self, AppError> {
        let user = session.current_user()?.ok_or(AppError::Unauthorized)?;
        let mut controller = Self {
            store,
            navigator,
            user,
            page: Page {
                title: "Envoyer une note de frais".into(),
                ..Default::default()
            },
            upload: pending.map_or(UploadState::Idle, UploadState::Uploaded),
            submit: SubmitState::Editing,
            file_error: None,
            form_error: None,
        };
        controller.render()?;
        Ok(controller)
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    #[cfg(test)]
    pub fn upload_state(&self) -> &UploadState {
        &self.upload
    }

    pub fn pending_upload(&self) -> Option<&PendingUpload> {
        match &self.upload {
            UploadState::Uploaded(pending) => Some(pending),
            _ => None,
        }
    }

    pub fn file_error(&self) -> Option<&str> {
        self.file_error.as_deref()
    }

    #[cfg(test)]
    pub fn form_error(&self) -> Option<&str> {
        self.form_error.as_deref()
    }

    pub fn validate_file(&self, file_name: &str) -> bool {
        validate_file(file_name)
    }

    /// Handles a change of the file input. Only the first file is used.
    ///
    /// Returns whether the file passed validation. A rejected file is never
    /// uploaded. Any new selection drops the earlier upload.
    pub async fn on_file_selected(&mut self, files: Vec<Attachment>) -> Result<bool, AppError> {
        let Some(file) = files.into_iter().next() else {
            return Ok(false);
        };
        self.discard_pending().await;

        if !self.validate_file(&file.file_name) {
            log::warn!("Rejected receipt {} ({})", file.file_name, file.mime_type);
            self.upload = UploadState::Idle;
            self.file_error = Some(INVALID_FILE_MESSAGE.to_owned());
            self.render()?;
            return Ok(false);
        }

        self.upload = UploadState::Uploading;
        self.file_error = None;
        let file_name = file.file_name.clone();
        let upload = NewFile {
            attachment: file,
            email: self.user.email.clone(),
        };

        match self.store.create(upload).await {
            Ok(file_ref) => {
                log::info!("Uploaded receipt {} as {}", file_name, file_ref.key);
                self.upload = UploadState::Uploaded(PendingUpload { file_ref, file_name });
            }
            Err(e) => {
                log::error!("Failed to upload receipt {}: {}", file_name, e);
                self.upload = UploadState::Idle;
                self.file_error = Some(e.to_string());
            }
        }
        self.render()?;
        Ok(true)
    }

    /// Saves the bill and goes back to the list. A store failure keeps the
    /// form on screen with the error.
    pub async fn on_submit(&mut self, form: NewBillForm) -> Result<SubmitState, AppError> {
        self.submit = SubmitState::Submitting;
        self.form_error = None;

        let pending = self.pending_upload().cloned();
        let bill = match form.into_bill(
            &self.user.email,
            pending.as_ref().map(|p| &p.file_ref),
            pending.as_ref().map(|p| p.file_name.as_str()),
        ) {
            Ok(bill) => bill,
            Err(e) => {
                log::warn!("Invalid bill form: {}", e);
                self.submit = SubmitState::Editing;
                self.form_error = Some(e.to_string());
                self.render()?;
                return Ok(self.submit);
            }
        };

        let selector = pending.as_ref().map(|p| p.file_ref.key.as_str());
        match self.store.update(selector, bill).await {
            Ok(saved) => {
                log::info!("Bill {} submitted by {}", saved.id, self.user.email);
                self.submit = SubmitState::Submitted;
                self.upload = UploadState::Idle;
                self.navigator.navigate(paths::BILLS);
                self.submit = SubmitState::Navigated;
            }
            Err(e) => {
                log::error!("Failed to submit bill: {}", e);
                self.submit = SubmitState::Editing;
                self.form_error = Some(e.to_string());
                self.render()?;
            }
        }
        Ok(self.submit)
    }

    async fn discard_pending(&mut self) {
        let UploadState::Uploaded(previous) = std::mem::replace(&mut self.upload, UploadState::Idle) else {
            return;
        };
        if let Err(e) = self.store.discard(&self.user.email, &previous.file_ref.key).await {
            log::warn!("Could not discard receipt {}: {}", previous.file_ref.key, e);
        }
    }

    fn render(&mut self) -> Result<(), AppError> {
        let file_name = self.pending_upload().map(|p| p.file_name.clone());
        self.page.body = views::new_bill_ui(
            self.file_error.as_deref(),
            file_name.as_deref(),
            self.form_error.as_deref(),
        )?;
        Ok(())
    }
}
