pub mod config;
pub mod connection;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod pages;
pub mod protocol;
pub mod reconcile;
pub mod session;
pub mod surface;
pub mod widget;

#[cfg(test)]
mod test_support;

use std::io;
use std::sync::mpsc::{self, Sender};
use std::thread;

use tracing::{debug, error, info, warn};

use crate::connection::{ConnectionManager, Link, LinkEvent, spawn_socket_link};
use crate::device::DeviceIdentity;
use crate::dispatch::{Haptics, NoHaptics};
use crate::surface::{StdioSurface, Surface, SurfaceEvent, reader_loop, writer_loop};

pub use crate::config::HostConfig;
pub use crate::error::{HostError, HostResult};
pub use crate::session::PanelSession;
pub use crate::widget::{Widget, WidgetTemplate};

/// Everything the event loop reacts to, from either helper thread.
#[derive(Debug)]
pub enum HostEvent {
    Link(LinkEvent),
    Surface(SurfaceEvent),
    /// The surface closed its end of the bridge.
    SurfaceClosed,
}

pub fn run(config: HostConfig) -> Result<(), Box<dyn std::error::Error>> {
    let device = DeviceIdentity::load_or_create(&config.device_file)?;
    let endpoint = config.endpoint(&device);
    info!(device = device.as_str(), url = %endpoint.url(), "starting panel host");

    let (events_tx, events_rx) = mpsc::channel();
    let (commands_tx, commands_rx) = mpsc::sync_channel(config.surface_queue_cap);

    let writer_handle = thread::Builder::new()
        .name("surface-writer".to_string())
        .spawn(move || writer_loop(commands_rx, io::stdout().lock()))?;

    let reader_tx = events_tx.clone();
    let reader_handle = thread::Builder::new()
        .name("surface-reader".to_string())
        .spawn(move || {
            let read_result = reader_loop(io::stdin().lock(), |event| {
                let _ = reader_tx.send(HostEvent::Surface(event));
            });

            if let Err(err) = &read_result {
                error!(%err, "surface reader terminated with error");
            }
            let _ = reader_tx.send(HostEvent::SurfaceClosed);
            read_result
        })?;

    let link_tx = forward_link_events(events_tx);
    let link = spawn_socket_link(endpoint, config.reconnect_delay, link_tx)?;

    let mut connection = ConnectionManager::new(link);
    connection.subscribe(|state| info!(?state, "connection state changed"));
    let surface = StdioSurface::new(commands_tx, config.surface_queue_cap);
    let mut session = PanelSession::new(connection, surface, NoHaptics);
    session.render();

    for event in events_rx {
        if !handle_event(&mut session, event) {
            break;
        }
    }

    // Drop the session first so the writer sees its queue close.
    drop(session);

    if reader_handle.is_finished() {
        match reader_handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(%err, "reader thread returned error"),
            Err(err) => warn!(?err, "reader thread join failed"),
        }
    } else {
        debug!("reader thread still active during shutdown; skipping join");
    }

    match writer_handle.join() {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(%err, "writer thread returned error"),
        Err(err) => warn!(?err, "writer thread join failed"),
    }

    info!("panel host stopped");
    Ok(())
}

fn forward_link_events(events: Sender<HostEvent>) -> impl FnMut(LinkEvent) -> bool + Send + 'static {
    move |event| events.send(HostEvent::Link(event)).is_ok()
}

/// Applies one event to the session. Returns `false` once the surface is gone.
pub fn handle_event<L, S, H>(session: &mut PanelSession<L, S, H>, event: HostEvent) -> bool
where
    L: Link,
    S: Surface,
    H: Haptics,
{
    match event {
        HostEvent::Link(LinkEvent::Connecting) => session.connection_connecting(),
        HostEvent::Link(LinkEvent::Opened) => session.connection_opened(),
        HostEvent::Link(LinkEvent::Text(text)) => session.inbound_text(&text),
        HostEvent::Link(LinkEvent::Closed(reason)) => session.connection_closed(&reason),
        HostEvent::Surface(SurfaceEvent::LayoutChanged { items }) => {
            session.layout_changed(&items);
        }
        HostEvent::Surface(SurfaceEvent::Action { action }) => {
            session.dispatch(action);
        }
        HostEvent::Surface(SurfaceEvent::AddWidget { template }) => {
            match template.parse::<WidgetTemplate>() {
                Ok(template) => {
                    session.add_widget(template);
                }
                Err(err) => warn!(%err, "ignoring add widget request"),
            }
        }
        HostEvent::Surface(SurfaceEvent::DeleteWidget { id }) => {
            session.delete_widget(&id);
        }
        HostEvent::Surface(SurfaceEvent::Back) => session.go_back(),
        HostEvent::Surface(SurfaceEvent::ResetLayout) => session.reset_layout(),
        HostEvent::SurfaceClosed => {
            info!("surface closed");
            return false;
        }
    }

    true
}
