//! Loading indicator shown around long-running operations.

use std::rc::Rc;

/// Host-side busy overlay.
pub trait LoadingIndicator {
    fn show(&self);
    fn hide(&self);
}

/// Indicator for hosts without a visible overlay; only logs.
#[derive(Debug, Default)]
pub struct LogIndicator;

impl LoadingIndicator for LogIndicator {
    fn show(&self) {
        log::debug!("[Busy] show");
    }

    fn hide(&self) {
        log::debug!("[Busy] hide");
    }
}

/// Shows the indicator on creation and hides it when dropped, so every exit
/// path of the enclosing scope releases it.
pub struct BusyGuard {
    indicator: Rc<dyn LoadingIndicator>,
}

impl BusyGuard {
    pub fn new(indicator: Rc<dyn LoadingIndicator>) -> Self {
        indicator.show();
        Self { indicator }
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.indicator.hide();
    }
}
