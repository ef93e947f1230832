use std::cell::RefCell;

pub mod paths {
    pub const LOGIN: &str = "/";
    pub const BILLS: &str = "/bills";
    pub const NEW_BILL: &str = "/bills/new";
}

/// Replaces the displayed view with the one at `path`.
pub trait Navigator {
    fn navigate(&self, path: &str);
}

/// Keeps every requested path. The HTTP layer redirects to the last one.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visited: RefCell<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<String> {
        self.visited.borrow().last().cloned()
    }

    #[cfg(test)]
    pub fn visited(&self) -> Vec<String> {
        self.visited.borrow().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) {
        log::debug!("navigate to {}", path);
        self.visited.borrow_mut().push(path.to_owned());
    }
}
