//! Renderer boundary.
//!
//! The event loop publishes every rebuilt presentation list and every
//! visibility change on watch channels; a renderer task subscribes and draws.

use hyprdock_core::{DockItem, PresentationList};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Something that can draw the dock.
pub trait DockRenderer: Send {
    /// Draw a freshly rebuilt list.
    fn redraw(&mut self, list: &PresentationList);
    /// Show or hide the dock surface.
    fn set_visible(&mut self, visible: bool);
}

/// Headless renderer that logs what would be drawn.
#[derive(Debug, Default)]
pub struct LogRenderer {
    redraws: u64,
}

impl DockRenderer for LogRenderer {
    fn redraw(&mut self, list: &PresentationList) {
        self.redraws += 1;
        let slots: Vec<String> = list
            .items
            .iter()
            .map(|item| match item {
                DockItem::Launcher => "[launcher]".to_string(),
                DockItem::Task(task) => {
                    let mut slot = format!("{}x{}", task.key, task.window_count());
                    if task.pinned {
                        slot.push('*');
                    }
                    if task.active {
                        slot.push('!');
                    }
                    slot
                }
            })
            .collect();
        info!(
            "Redraw #{} at {}px: {}",
            self.redraws,
            list.icon_size,
            slots.join(" ")
        );
    }

    fn set_visible(&mut self, visible: bool) {
        info!("Dock {}", if visible { "shown" } else { "hidden" });
    }
}

/// Drive `renderer` from the list and visibility subscriptions until both
/// senders are gone.
pub async fn run_renderer<R: DockRenderer>(
    mut renderer: R,
    mut list_rx: watch::Receiver<Arc<PresentationList>>,
    mut visible_rx: watch::Receiver<bool>,
) {
    renderer.set_visible(*visible_rx.borrow_and_update());
    let initial = Arc::clone(&list_rx.borrow_and_update());
    renderer.redraw(&initial);

    let mut list_open = true;
    let mut visible_open = true;
    while list_open || visible_open {
        tokio::select! {
            changed = list_rx.changed(), if list_open => {
                if changed.is_err() {
                    list_open = false;
                    continue;
                }
                let list = Arc::clone(&list_rx.borrow_and_update());
                renderer.redraw(&list);
            }
            changed = visible_rx.changed(), if visible_open => {
                if changed.is_err() {
                    visible_open = false;
                    continue;
                }
                let visible = *visible_rx.borrow_and_update();
                renderer.set_visible(visible);
            }
        }
    }
    debug!("Renderer stopped");
}
