//! One running panel: page state, the backend channel and the surface, tied
//! together by the layout save path.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::connection::{ConnectionManager, Link};
use crate::dispatch::{self, Dispatched, Haptics};
use crate::pages::PageStore;
use crate::protocol::{ServerEnvelope, save_layout_envelope};
use crate::reconcile::{Reconciliation, reconcile, restack};
use crate::surface::{Placement, Surface};
use crate::widget::{PlacedItem, WidgetTemplate};

/// Process-wide panel state. Created once at startup and driven by the
/// event loop until the process exits.
pub struct PanelSession<L, S, H> {
    store: PageStore,
    connection: ConnectionManager<L>,
    surface: S,
    haptics: H,
}

impl<L, S, H> PanelSession<L, S, H>
where
    L: Link,
    S: Surface,
    H: Haptics,
{
    pub fn new(connection: ConnectionManager<L>, surface: S, haptics: H) -> Self {
        Self {
            store: PageStore::new(),
            connection,
            surface,
            haptics,
        }
    }

    pub fn store(&self) -> &PageStore {
        &self.store
    }

    pub fn connection(&self) -> &ConnectionManager<L> {
        &self.connection
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn connection_connecting(&mut self) {
        self.connection.on_connecting();
    }

    pub fn connection_opened(&mut self) {
        self.connection.on_open();
        self.surface.set_connected(true);
    }

    pub fn connection_closed(&mut self, reason: &str) {
        self.connection.on_close();
        self.surface.set_connected(false);
        debug!(reason, "connection closed");
    }

    pub fn inbound_text(&mut self, text: &str) {
        if let Some(envelope) = self.connection.on_text(text) {
            self.handle_inbound(envelope);
        }
    }

    pub fn handle_inbound(&mut self, envelope: ServerEnvelope) {
        match envelope {
            ServerEnvelope::Config { data } => {
                info!(pages = data.pages.len(), root = %data.root_page, "received config");
                self.store.apply_config(data);
                self.render();
            }
            ServerEnvelope::NowPlaying(playing) => self.surface.patch_now_playing(&playing),
            ServerEnvelope::Telemetry(sample) => self.surface.patch_telemetry(&sample),
            ServerEnvelope::Unrecognized => debug!("ignoring unrecognized message"),
        }
    }

    /// Redraws the current page from canonical state. Ghosts stay in the
    /// store but are never shown.
    pub fn render(&mut self) {
        self.surface.clear();
        self.surface.set_can_go_back(self.store.can_go_back());
        for widget in self.store.widgets().iter().filter(|widget| !widget.is_ghost()) {
            self.surface.place(widget, Placement::Exact);
        }
    }

    /// Handles a geometry report from the surface. Returns whether a save
    /// went out.
    pub fn layout_changed(&mut self, live: &[PlacedItem]) -> bool {
        self.surface.sync_geometry(live);
        self.save_layout_from(live)
    }

    pub fn add_widget(&mut self, template: WidgetTemplate) -> bool {
        let widget = self.store.add_widget(template).clone();
        info!(template = %template, widget = ?widget.id(), "adding widget");
        self.surface.place(&widget, Placement::Auto);
        // Saved at the placeholder spot; the surface's next layout_changed
        // carries the auto-placed geometry.
        self.save_current_layout()
    }

    pub fn delete_widget(&mut self, id: &str) -> bool {
        self.surface.remove(id);
        if self.store.remove_widget(id).is_none() {
            warn!(widget = id, "widget id not found in state; cleaning up anyway");
        }
        self.save_current_layout()
    }

    /// Destructive repair of the current page. Ghosts are dropped, the rest
    /// is stacked in one column, saved without the deficit guard, and the
    /// client reloads from the backend.
    pub fn reset_layout(&mut self) {
        if !self.store.is_configured() {
            warn!("ignoring reset before the first config");
            return;
        }

        let page = self.store.current_page().to_string();
        restack(self.store.widgets_mut());
        let layout = self.store.widgets().to_vec();
        info!(page = %page, items = layout.len(), "resetting layout");

        if !self.connection.send(&save_layout_envelope(page, layout)) {
            warn!("reset layout could not be saved while disconnected");
        }
        self.render();
        self.connection.request_reload();
    }

    pub fn dispatch(&mut self, action: Value) -> Dispatched {
        let outcome = dispatch::dispatch(
            action,
            &mut self.store,
            &mut self.connection,
            &mut self.haptics,
        );
        if outcome == Dispatched::Navigated {
            self.render();
        }
        outcome
    }

    pub fn go_back(&mut self) {
        if self.store.go_back() {
            self.render();
        }
    }

    fn save_current_layout(&mut self) -> bool {
        let live = self.surface.geometry();
        self.save_layout_from(&live)
    }

    fn save_layout_from(&mut self, live: &[PlacedItem]) -> bool {
        if !self.store.is_configured() {
            debug!("no config yet; not saving placeholder page");
            return false;
        }

        let page = self.store.current_page().to_string();

        match reconcile(self.store.widgets_mut(), live) {
            Reconciliation::Save {
                layout,
                dirty,
                ghosts,
            } => {
                debug!(
                    page = %page,
                    items = layout.len(),
                    dirty,
                    ghosts = ghosts.len(),
                    "saving layout"
                );
                self.connection.send(&save_layout_envelope(page, layout))
            }
            Reconciliation::Abort { .. } => false,
        }
    }
}
