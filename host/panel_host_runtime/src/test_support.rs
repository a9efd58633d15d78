//! Recording fakes shared by the unit tests.

use std::time::Duration;

use serde_json::Value;

use crate::connection::Link;
use crate::dispatch::Haptics;
use crate::protocol::{NowPlaying, Telemetry};
use crate::surface::{Placement, Surface};
use crate::widget::{PlacedItem, Widget};

#[derive(Debug, Default)]
pub struct RecordingLink {
    pub sent: Vec<String>,
    pub reloads: usize,
}

impl RecordingLink {
    pub fn sent_json(&self) -> Vec<Value> {
        self.sent
            .iter()
            .map(|text| serde_json::from_str(text).expect("sent frame is json"))
            .collect()
    }
}

impl Link for RecordingLink {
    fn send_text(&mut self, text: String) -> bool {
        self.sent.push(text);
        true
    }

    fn reload(&mut self) {
        self.reloads += 1;
    }
}

#[derive(Debug, Default)]
pub struct CountingHaptics {
    pub pulses: Vec<Duration>,
}

impl Haptics for CountingHaptics {
    fn pulse(&mut self, duration: Duration) {
        self.pulses.push(duration);
    }
}

/// Surface that places items exactly where asked and remembers every call.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub placed: Vec<PlacedItem>,
    pub auto_placed: Vec<String>,
    pub clears: usize,
    pub can_go_back: Option<bool>,
    pub connected: Option<bool>,
    pub now_playing: Vec<NowPlaying>,
    pub telemetry: Vec<Telemetry>,
}

impl RecordingSurface {
    pub fn placed_ids(&self) -> Vec<&str> {
        self.placed.iter().map(|item| item.id.as_str()).collect()
    }
}

impl Surface for RecordingSurface {
    fn clear(&mut self) {
        self.clears += 1;
        self.placed.clear();
    }

    fn place(&mut self, widget: &Widget, placement: Placement) {
        let Some(id) = widget.id() else {
            return;
        };
        if placement == Placement::Auto {
            self.auto_placed.push(id.to_string());
        }
        self.placed.push(PlacedItem::new(id, widget.geometry()));
    }

    fn remove(&mut self, id: &str) {
        self.placed.retain(|item| item.id != id);
    }

    fn geometry(&self) -> Vec<PlacedItem> {
        self.placed.clone()
    }

    fn sync_geometry(&mut self, items: &[PlacedItem]) {
        self.placed = items.to_vec();
    }

    fn set_can_go_back(&mut self, can_go_back: bool) {
        self.can_go_back = Some(can_go_back);
    }

    fn set_connected(&mut self, connected: bool) {
        self.connected = Some(connected);
    }

    fn patch_now_playing(&mut self, playing: &NowPlaying) {
        self.now_playing.push(playing.clone());
    }

    fn patch_telemetry(&mut self, sample: &Telemetry) {
        self.telemetry.push(sample.clone());
    }
}
