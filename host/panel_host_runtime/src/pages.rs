//! Per-page widget lists, the current page, and the back stack.

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::protocol::{ConfigPayload, DEFAULT_ROOT_PAGE};
use crate::widget::{Widget, WidgetTemplate, new_widget_id};

/// Client-side copy of every page's widgets.
///
/// `pages[current]` always exists: every path that changes `current`
/// inserts an empty page first when needed. Until the first config arrives
/// the store only holds a placeholder home page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageStore {
    pages: IndexMap<String, Vec<Widget>>,
    current: String,
    history: Vec<String>,
    configured: bool,
}

impl Default for PageStore {
    fn default() -> Self {
        let mut pages = IndexMap::new();
        pages.insert(DEFAULT_ROOT_PAGE.to_string(), Vec::new());
        Self {
            pages,
            current: DEFAULT_ROOT_PAGE.to_string(),
            history: Vec::new(),
            configured: false,
        }
    }
}

impl PageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces everything with the backend's copy and forgets the back stack.
    pub fn apply_config(&mut self, config: ConfigPayload) {
        let ConfigPayload { pages, root_page } = config;
        self.pages = pages;
        self.pages.entry(root_page.clone()).or_default();
        self.current = root_page;
        self.history.clear();
        self.configured = true;
    }

    pub fn navigate(&mut self, target: &str) {
        if !self.pages.contains_key(target) {
            warn!(page = target, "creating new page");
            self.pages.insert(target.to_string(), Vec::new());
        }

        let previous = std::mem::replace(&mut self.current, target.to_string());
        self.history.push(previous);
    }

    /// Returns `false` when there was nothing to go back to.
    pub fn go_back(&mut self) -> bool {
        match self.history.pop() {
            Some(previous) => {
                self.pages.entry(previous.clone()).or_default();
                self.current = previous;
                true
            }
            None => false,
        }
    }

    /// Appends a fresh widget built from `template` to the current page.
    pub fn add_widget(&mut self, template: WidgetTemplate) -> &Widget {
        let widget = template.instantiate(new_widget_id());
        let page = self.current_widgets_entry();
        page.push(widget);
        &page[page.len() - 1]
    }

    /// Removes the widget with `id` from the current page. A missing id is
    /// treated as already removed.
    pub fn remove_widget(&mut self, id: &str) -> Option<Widget> {
        let page = self.current_widgets_entry();
        match page.iter().position(|widget| widget.id() == Some(id)) {
            Some(index) => Some(page.remove(index)),
            None => {
                debug!(widget = id, "widget not in current page; already removed");
                None
            }
        }
    }

    pub fn current_page(&self) -> &str {
        &self.current
    }

    pub fn widgets(&self) -> &[Widget] {
        self.pages.get(&self.current).map_or(&[][..], Vec::as_slice)
    }

    pub fn widgets_mut(&mut self) -> &mut Vec<Widget> {
        self.current_widgets_entry()
    }

    pub fn page(&self, id: &str) -> Option<&[Widget]> {
        self.pages.get(id).map(Vec::as_slice)
    }

    pub fn pages(&self) -> &IndexMap<String, Vec<Widget>> {
        &self.pages
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Whether the backend's copy has been applied at least once.
    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn can_go_back(&self) -> bool {
        !self.history.is_empty()
    }

    fn current_widgets_entry(&mut self) -> &mut Vec<Widget> {
        self.pages.entry(self.current.clone()).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::{Geometry, WidgetKind};

    fn gauge(id: &str) -> Widget {
        Widget::new(id, WidgetKind::Gauge, Geometry::new(0, 0, 2, 2))
    }

    fn config(root: &str, pages: &[(&str, Vec<Widget>)]) -> ConfigPayload {
        ConfigPayload {
            pages: pages
                .iter()
                .map(|(id, widgets)| (id.to_string(), widgets.clone()))
                .collect(),
            root_page: root.to_string(),
        }
    }

    #[test]
    fn apply_config_replaces_state_and_clears_history() {
        let mut store = PageStore::new();
        store.navigate("scratch");
        store.add_widget(WidgetTemplate::Cpu);

        store.apply_config(config("home", &[("home", vec![gauge("w1")]), ("obs", vec![])]));

        assert_eq!(store.current_page(), "home");
        assert!(store.history().is_empty());
        assert!(store.page("scratch").is_none());
        assert_eq!(store.widgets().len(), 1);
    }

    #[test]
    fn store_is_unconfigured_until_first_config() {
        let mut store = PageStore::new();
        assert!(!store.is_configured());

        store.apply_config(config("home", &[]));

        assert!(store.is_configured());
    }

    #[test]
    fn apply_config_inserts_missing_root_page() {
        let mut store = PageStore::new();
        store.apply_config(config("media", &[("home", vec![gauge("w1")])]));

        assert_eq!(store.current_page(), "media");
        assert_eq!(store.page("media"), Some(&[][..]));
    }

    #[test]
    fn go_back_without_history_is_a_noop() {
        let mut store = PageStore::new();
        store.apply_config(config("home", &[("home", vec![])]));

        assert!(!store.go_back());
        assert_eq!(store.current_page(), "home");
        assert!(!store.can_go_back());
    }

    #[test]
    fn go_back_returns_to_page_before_last_navigate() {
        let mut store = PageStore::new();
        store.navigate("p1");
        store.navigate("p2");

        assert!(store.go_back());
        assert_eq!(store.current_page(), "p1");
        assert!(store.go_back());
        assert_eq!(store.current_page(), "home");
        assert!(!store.go_back());
    }

    #[test]
    fn navigating_to_known_page_keeps_its_widgets() {
        let mut store = PageStore::new();
        store.navigate("obs");
        let id = store.add_widget(WidgetTemplate::Ram).id().map(str::to_string);
        store.go_back();

        store.navigate("obs");

        assert_eq!(store.widgets().len(), 1);
        assert_eq!(store.widgets()[0].id().map(str::to_string), id);
    }

    #[test]
    fn add_widget_appends_template_to_current_page() {
        let mut store = PageStore::new();
        let widget = store.add_widget(WidgetTemplate::Spotify).clone();

        assert_eq!(widget.kind, Some(WidgetKind::Spotify));
        assert!(widget.id().is_some_and(|id| id.starts_with("w_")));
        assert_eq!(store.widgets(), &[widget][..]);
    }

    #[test]
    fn remove_widget_is_idempotent() {
        let mut store = PageStore::new();
        store.apply_config(config("home", &[("home", vec![gauge("w1"), gauge("w2")])]));

        let removed = store.remove_widget("w1").expect("w1 present");
        assert_eq!(removed.id(), Some("w1"));
        assert!(store.remove_widget("w1").is_none());
        assert_eq!(store.widgets().len(), 1);
        assert_eq!(store.widgets()[0].id(), Some("w2"));
    }

    #[test]
    fn equivalent_config_after_reconnect_discards_local_navigation() {
        let payload = config("home", &[("home", vec![gauge("w1")]), ("obs", vec![gauge("w2")])]);

        let mut store = PageStore::new();
        store.apply_config(payload.clone());
        let after_first = store.clone();

        store.navigate("obs");
        store.navigate("fresh");
        store.apply_config(payload);

        assert_eq!(store, after_first);
    }
}
