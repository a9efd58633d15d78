//! The interactive grid surface and the stdio bridge that drives one.
//!
//! The surface is an external process speaking length-prefixed JSON frames:
//! a 4-byte big-endian length followed by one JSON object tagged by `t`.
//! It sends [`SurfaceEvent`]s on our stdin and receives [`SurfaceCommand`]s
//! on our stdout.

use std::collections::BTreeMap;
use std::io::{ErrorKind, Read, Write};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{HostError, HostResult};
use crate::protocol::{NowPlaying, Telemetry};
use crate::widget::{PlacedItem, Widget};

pub const SURFACE_TO_HOST_CAP: usize = 65_536;
pub const HOST_TO_SURFACE_CAP: usize = 1_048_576;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Use the widget's stored geometry.
    Exact,
    /// Let the surface find a free spot.
    Auto,
}

/// A drag/resize grid that reports `(id, x, y, w, h)` for what it shows.
pub trait Surface {
    fn clear(&mut self);
    fn place(&mut self, widget: &Widget, placement: Placement);
    fn remove(&mut self, id: &str);
    /// Geometry of every item currently placed.
    fn geometry(&self) -> Vec<PlacedItem>;
    /// Adopts the geometry the surface reported after a drag or resize.
    fn sync_geometry(&mut self, items: &[PlacedItem]);
    fn set_can_go_back(&mut self, can_go_back: bool);
    fn set_connected(&mut self, connected: bool);
    fn patch_now_playing(&mut self, playing: &NowPlaying);
    fn patch_telemetry(&mut self, sample: &Telemetry);
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "t")]
pub enum SurfaceEvent {
    #[serde(rename = "layout_changed")]
    LayoutChanged { items: Vec<PlacedItem> },

    #[serde(rename = "action")]
    Action { action: Value },

    #[serde(rename = "add_widget")]
    AddWidget { template: String },

    #[serde(rename = "delete_widget")]
    DeleteWidget { id: String },

    #[serde(rename = "back")]
    Back,

    /// Sent only after the user confirmed the destructive reset.
    #[serde(rename = "reset_layout")]
    ResetLayout,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "t")]
pub enum SurfaceCommand {
    #[serde(rename = "clear")]
    Clear,

    #[serde(rename = "place")]
    Place { widget: Widget, auto_position: bool },

    #[serde(rename = "remove")]
    Remove { id: String },

    #[serde(rename = "nav")]
    Nav { can_back: bool },

    #[serde(rename = "status")]
    Status { connected: bool },

    #[serde(rename = "now_playing")]
    NowPlaying(NowPlaying),

    #[serde(rename = "telemetry")]
    Telemetry { metrics: BTreeMap<String, f64> },
}

impl SurfaceCommand {
    /// Live data patches can be dropped under backpressure; the next sample
    /// replaces them anyway. Structural commands cannot.
    fn is_droppable(&self) -> bool {
        matches!(self, Self::NowPlaying(_) | Self::Telemetry { .. })
    }
}

/// [`Surface`] backed by the stdio bridge.
///
/// Keeps a mirror of placed geometry so reconciliation can run without a
/// round trip. `layout_changed` reports from the surface overwrite it.
pub struct StdioSurface {
    commands: SyncSender<SurfaceCommand>,
    placed: Vec<PlacedItem>,
    queue_capacity: usize,
    dropped_patches: u64,
}

impl StdioSurface {
    pub fn new(commands: SyncSender<SurfaceCommand>, queue_capacity: usize) -> Self {
        Self {
            commands,
            placed: Vec::new(),
            queue_capacity,
            dropped_patches: 0,
        }
    }

    fn emit(&mut self, command: SurfaceCommand) {
        if !command.is_droppable() {
            if self.commands.send(command).is_err() {
                warn!("surface writer gone; dropping command");
            }
            return;
        }

        match self.commands.try_send(command) {
            Ok(()) => {}
            Err(TrySendError::Full(_command)) => {
                self.dropped_patches += 1;
                let dropped = self.dropped_patches;
                if dropped == 1 || dropped.is_power_of_two() {
                    warn!(
                        capacity = self.queue_capacity,
                        dropped, "surface queue full; dropped live patch(es)"
                    );
                }
            }
            Err(TrySendError::Disconnected(_command)) => {
                warn!("surface writer gone; dropping live patch");
            }
        }
    }
}

impl Surface for StdioSurface {
    fn clear(&mut self) {
        self.placed.clear();
        self.emit(SurfaceCommand::Clear);
    }

    fn place(&mut self, widget: &Widget, placement: Placement) {
        let Some(id) = widget.id() else {
            debug!("not placing widget without id");
            return;
        };

        let item = PlacedItem::new(id, widget.geometry());
        match self.placed.iter_mut().find(|placed| placed.id == item.id) {
            Some(existing) => *existing = item,
            None => self.placed.push(item),
        }

        self.emit(SurfaceCommand::Place {
            widget: widget.clone(),
            auto_position: placement == Placement::Auto,
        });
    }

    fn remove(&mut self, id: &str) {
        self.placed.retain(|placed| placed.id != id);
        self.emit(SurfaceCommand::Remove { id: id.to_string() });
    }

    fn geometry(&self) -> Vec<PlacedItem> {
        self.placed.clone()
    }

    fn sync_geometry(&mut self, items: &[PlacedItem]) {
        self.placed = items.to_vec();
    }

    fn set_can_go_back(&mut self, can_go_back: bool) {
        self.emit(SurfaceCommand::Nav {
            can_back: can_go_back,
        });
    }

    fn set_connected(&mut self, connected: bool) {
        self.emit(SurfaceCommand::Status { connected });
    }

    fn patch_now_playing(&mut self, playing: &NowPlaying) {
        self.emit(SurfaceCommand::NowPlaying(playing.clone()));
    }

    fn patch_telemetry(&mut self, sample: &Telemetry) {
        self.emit(SurfaceCommand::Telemetry {
            metrics: sample.metrics.clone(),
        });
    }
}

pub fn writer_loop<W: Write>(rx: Receiver<SurfaceCommand>, mut writer: W) -> HostResult<()> {
    for command in rx {
        let payload = serde_json::to_vec(&command)?;
        write_frame(&mut writer, &payload, HOST_TO_SURFACE_CAP)?;
        writer.flush()?;
    }

    Ok(())
}

/// Reads surface frames until EOF. Frames that do not decode are skipped.
pub fn reader_loop<R, F>(mut reader: R, mut on_event: F) -> HostResult<()>
where
    R: Read,
    F: FnMut(SurfaceEvent),
{
    loop {
        match read_frame(&mut reader, SURFACE_TO_HOST_CAP) {
            Ok(payload) => match serde_json::from_slice::<SurfaceEvent>(&payload) {
                Ok(event) => on_event(event),
                Err(err) => warn!(%err, "skipping undecodable surface event"),
            },
            Err(HostError::Io(err)) if err.kind() == ErrorKind::UnexpectedEof => return Ok(()),
            Err(err) => return Err(err),
        }
    }
}

fn read_frame(reader: &mut impl Read, max_payload: usize) -> HostResult<Vec<u8>> {
    let mut len_buf = [0_u8; 4];
    reader.read_exact(&mut len_buf)?;

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_payload {
        return Err(HostError::Frame {
            len,
            max: max_payload,
        });
    }

    let mut payload = vec![0_u8; len];
    reader.read_exact(&mut payload)?;
    Ok(payload)
}

fn write_frame(writer: &mut impl Write, payload: &[u8], max_payload: usize) -> HostResult<()> {
    if payload.len() > max_payload {
        return Err(HostError::Frame {
            len: payload.len(),
            max: max_payload,
        });
    }

    let len = u32::try_from(payload.len()).map_err(|_| HostError::Frame {
        len: payload.len(),
        max: u32::MAX as usize,
    })?;

    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(payload)?;
    Ok(())
}
