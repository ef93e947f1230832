use serde::Serialize;
use tera::{Context, Tera};

use crate::errors::AppError;

const TEMPLATE_GLOB: &str = "templates/**/*";

lazy_static! {
    /// Loaded once. A broken template stops the server at startup.
    pub static ref TEMPLATES: Tera = {
        let mut tera = Tera::new(TEMPLATE_GLOB).unwrap_or_else(|e| {
            log::error!("Could not load {}: {}", TEMPLATE_GLOB, e);
            std::process::exit(1)
        });
        tera.autoescape_on(vec![".html"]);
        tera
    };
}

/// What the bills table shows for one bill.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct BillRow {
    pub id: String,
    pub expense_type: String,
    pub name: String,
    pub iso_date: String,
    pub date: String,
    pub amount: i64,
    pub status: String,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
}

/// The rendered view a controller owns: main content plus an optional dialog.
#[derive(Debug, Default, Clone)]
pub struct Page {
    pub title: String,
    pub body: String,
    pub modal: Option<String>,
    pub modal_opens: usize,
}

impl Page {
    pub fn open_modal(&mut self, html: String) {
        self.modal = Some(html);
        self.modal_opens += 1;
    }

    pub fn html(&self) -> Result<String, AppError> {
        let mut context = Context::new();
        context.insert("title", &self.title);
        context.insert("content", &self.body);
        context.insert("modal", &self.modal);
        context.insert("version", env!("CARGO_PKG_VERSION"));
        render("layout.html", &context)
    }
}

fn render(template: &str, context: &Context) -> Result<String, AppError> {
    TEMPLATES.render(template, context).map_err(|e| {
        log::error!("Failed to render template {}: {}", template, e);
        AppError::TemplateError(e)
    })
}

pub fn bills_ui(rows: &[BillRow]) -> Result<String, AppError> {
    let mut context = Context::new();
    context.insert("bills", rows);
    render("bills.html", &context)
}

pub fn error_ui(message: &str) -> Result<String, AppError> {
    let mut context = Context::new();
    context.insert("error", message);
    render("error.html", &context)
}

pub fn new_bill_ui(file_error: Option<&str>, file_name: Option<&str>, form_error: Option<&str>) -> Result<String, AppError> {
    let mut context = Context::new();
    context.insert("file_error", &file_error);
    context.insert("file_name", &file_name);
    context.insert("form_error", &form_error);
    render("new_bill.html", &context)
}

pub fn attachment_modal(file_url: Option<&str>, file_name: Option<&str>) -> Result<String, AppError> {
    let mut context = Context::new();
    context.insert("file_url", &file_url);
    context.insert("file_name", &file_name);
    render("attachment_modal.html", &context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_panel_contains_message() {
        let html = error_ui("Erreur 404: bills").unwrap();
        assert!(html.contains("data-testid=\"error-message\""));
        assert!(html.contains("Erreur 404"));
    }

    #[test]
    fn empty_list_renders_empty_table() {
        let html = bills_ui(&[]).unwrap();
        assert!(html.contains("data-testid=\"tbody\""));
        assert!(html.contains("Mes notes de frais"));
        assert!(!html.contains("data-testid=\"icon-eye\""));
    }

    #[test]
    fn bill_fields_are_escaped() {
        let row = BillRow {
            id: "1".into(),
            expense_type: "Transports".into(),
            name: "<script>".into(),
            iso_date: "2022-01-01".into(),
            date: "1 Jan. 22".into(),
            amount: 10,
            status: "En attente".into(),
            file_url: None,
            file_name: None,
        };
        let html = bills_ui(&[row]).unwrap();
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn modal_without_file_shows_placeholder() {
        let html = attachment_modal(None, None).unwrap();
        assert!(html.contains("Aucun justificatif"));
        let html = attachment_modal(Some("https://test.tld/a.png"), Some("a.png")).unwrap();
        assert!(html.contains("<img"));
        assert!(html.contains("a.png"));
        assert!(!html.contains("Aucun justificatif"));
    }

    #[test]
    fn layout_wraps_body_and_modal() {
        let mut page = Page {
            title: "Billed".into(),
            body: "<p>corps</p>".into(),
            ..Default::default()
        };
        page.open_modal("<div id=\"modaleFile\"></div>".into());
        let html = page.html().unwrap();
        assert!(html.contains("<p>corps</p>"));
        assert!(html.contains("modaleFile"));
        assert_eq!(page.modal_opens, 1);
    }
}
