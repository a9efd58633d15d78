//! Folding live surface geometry back into the canonical widget list.
//!
//! The surface may report more items than the page holds (stale nodes left
//! behind by a render race) or fewer (a placement that failed). Surplus
//! entries are dropped from the save. A deficit refuses the save outright,
//! since the backend would read a short list as a deletion.

use tracing::{error, warn};

use crate::widget::{AUTO_POSITION_KEY, Geometry, PlacedItem, Widget, WidgetKind};

const RESTACK_ROW_STRIDE: u32 = 4;
const RESTACK_SIZE: (u32, u32) = (5, 3);
const RESTACK_SPOTIFY_SIZE: (u32, u32) = (12, 4);

#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// Every canonical widget was matched; `layout` is safe to persist.
    Save {
        layout: Vec<Widget>,
        /// Whether any canonical geometry changed during this pass.
        dirty: bool,
        ghosts: Vec<String>,
    },
    /// The surface reported fewer widgets than the page holds.
    Abort {
        matched: usize,
        expected: usize,
        ghosts: Vec<String>,
    },
}

impl Reconciliation {
    pub fn layout(&self) -> Option<&[Widget]> {
        match self {
            Self::Save { layout, .. } => Some(layout),
            Self::Abort { .. } => None,
        }
    }

    pub fn ghosts(&self) -> &[String] {
        match self {
            Self::Save { ghosts, .. } | Self::Abort { ghosts, .. } => ghosts,
        }
    }
}

/// Runs one reconciliation pass.
///
/// Matched widgets get their geometry overwritten in place, even when the
/// pass ends up aborting. Non-geometry attributes are never touched. The
/// resulting layout follows the order the surface reported. Canonical ghosts
/// are never part of the layout and do not count toward the guard.
pub fn reconcile(canonical: &mut [Widget], live: &[PlacedItem]) -> Reconciliation {
    let mut claimed = vec![false; canonical.len()];
    let mut layout = Vec::with_capacity(canonical.len());
    let mut ghosts = Vec::new();
    let mut dirty = false;

    for item in live {
        let slot = canonical
            .iter()
            .position(|widget| widget.id() == Some(item.id.as_str()));

        match slot {
            Some(index) if canonical[index].is_ghost() => {
                warn!(widget = %item.id, "canonical widget has no type; excluded from save");
                ghosts.push(item.id.clone());
            }
            Some(index) if !claimed[index] => {
                claimed[index] = true;
                let widget = &mut canonical[index];
                dirty |= widget.set_geometry(item.geometry);
                layout.push(widget.clone());
            }
            Some(_) => {
                warn!(widget = %item.id, "duplicate entry in live geometry; ignoring repeat");
                ghosts.push(item.id.clone());
            }
            None => {
                warn!(widget = %item.id, "ghost widget in live geometry; excluded from save");
                ghosts.push(item.id.clone());
            }
        }
    }

    let expected = canonical.iter().filter(|widget| !widget.is_ghost()).count();
    if layout.len() < expected {
        error!(
            matched = layout.len(),
            expected,
            "live geometry is missing canonical widgets; aborting save to prevent data loss"
        );
        return Reconciliation::Abort {
            matched: layout.len(),
            expected,
            ghosts,
        };
    }

    Reconciliation::Save {
        layout,
        dirty,
        ghosts,
    }
}

/// Repairs a corrupted page: drops ghosts and stacks the rest in one column.
pub fn restack(widgets: &mut Vec<Widget>) {
    widgets.retain(|widget| !widget.is_ghost());

    for (row, widget) in (0_u32..).zip(widgets.iter_mut()) {
        let (w, h) = match widget.kind {
            Some(WidgetKind::Spotify) => RESTACK_SPOTIFY_SIZE,
            _ => RESTACK_SIZE,
        };
        widget.set_geometry(Geometry::new(0, row * RESTACK_ROW_STRIDE, w, h));
        widget.extra.remove(AUTO_POSITION_KEY);
    }
}
