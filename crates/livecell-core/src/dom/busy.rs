//! Busy-indicator protocol for cell controls.
//!
//! `set_buttons_busy` shows the indicator nested under the element whose id
//! is the cell id, immediately. `clear_buttons_busy` hides it after a fixed
//! settle delay so a fast completion does not flash the indicator.
//!
//! The delayed hide is fire-and-forget: a busy signal set during the delay
//! window is still hidden when the pending hide fires.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::AbortHandle;

use super::{Document, ElementId};
use crate::config::BusyOptions;

/// Shows and hides per-cell busy indicators.
pub struct BusyIndicator {
    document: Arc<dyn Document>,
    indicator_class: String,
    settle_delay: Duration,
    /// Scheduled hides; aborted if the indicator itself goes away.
    pending: Mutex<Vec<AbortHandle>>,
}

impl BusyIndicator {
    pub fn new(document: Arc<dyn Document>, options: &BusyOptions) -> Self {
        Self {
            document,
            indicator_class: options.indicator_class.clone(),
            settle_delay: Duration::from_millis(options.settle_delay_ms),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Show the busy indicator for `cell_id` right away.
    pub fn set_buttons_busy(&self, cell_id: &str) {
        match find_indicator(self.document.as_ref(), cell_id, &self.indicator_class) {
            Some(el) => self.document.set_visible(el, true),
            None => tracing::debug!(cell = cell_id, "no busy indicator to show"),
        }
    }

    /// Hide the busy indicator for `cell_id` once the settle delay has passed.
    pub fn clear_buttons_busy(&self, cell_id: &str) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!(cell = cell_id, "no async runtime; busy indicator left visible");
                return;
            }
        };

        let document = self.document.clone();
        let class = self.indicator_class.clone();
        let cell_id = cell_id.to_string();
        let delay = self.settle_delay;

        let task = handle.spawn(async move {
            tokio::time::sleep(delay).await;
            match find_indicator(document.as_ref(), &cell_id, &class) {
                Some(el) => document.set_visible(el, false),
                None => tracing::debug!(cell = %cell_id, "no busy indicator to hide"),
            }
        });

        let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
        pending.retain(|h| !h.is_finished());
        pending.push(task.abort_handle());
    }

    fn cancel_pending(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
        for handle in pending.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for BusyIndicator {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

fn find_indicator(document: &dyn Document, cell_id: &str, class: &str) -> Option<ElementId> {
    let root = document.element_by_id(cell_id)?;
    document.find_descendant(root, class)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{ElementSpec, VirtualDom};

    fn setup() -> (Arc<VirtualDom>, BusyIndicator, ElementId) {
        let dom = Arc::new(VirtualDom::new());
        let cell = dom.append(dom.body(), ElementSpec::new("div").id("cell-1"));
        let controls = dom.append(cell, ElementSpec::new("div").class("controls"));
        let spinner = dom.append(controls, ElementSpec::new("span").class("livecell-busy").hidden());
        let busy = BusyIndicator::new(dom.clone(), &BusyOptions::default());
        (dom, busy, spinner)
    }

    #[tokio::test(start_paused = true)]
    async fn test_hide_waits_for_settle_delay() {
        let (dom, busy, spinner) = setup();

        busy.set_buttons_busy("cell-1");
        assert!(dom.is_visible(spinner));
        busy.clear_buttons_busy("cell-1");

        tokio::time::sleep(Duration::from_millis(2999)).await;
        assert!(dom.is_visible(spinner));

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(!dom.is_visible(spinner));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_hide_wins_over_new_busy() {
        let (dom, busy, spinner) = setup();

        busy.set_buttons_busy("cell-1");
        busy.clear_buttons_busy("cell-1");
        tokio::time::sleep(Duration::from_millis(1000)).await;

        // Re-shown inside the window, still hidden by the earlier clear
        busy.set_buttons_busy("cell-1");
        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert!(!dom.is_visible(spinner));
    }

    #[tokio::test]
    async fn test_missing_elements_are_tolerated() {
        let (dom, busy, spinner) = setup();
        busy.set_buttons_busy("no-such-cell");
        busy.clear_buttons_busy("no-such-cell");
        assert!(!dom.is_visible(spinner));
    }
}
