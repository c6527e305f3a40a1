use std::env;

pub mod error;
pub mod protocol;
pub mod registry;
pub mod render;
pub mod session;
pub mod shm;
pub mod surface;
pub mod transport;
pub mod window;
mod wire_format;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use protocol::WaylandId;
pub use render::{Canvas, Painter, ScanLine};
pub use session::{EventHandler, WaylandSession};
pub use window::{Window, WindowConfig};

/// Logs at `info` unless `RUST_LOG` says otherwise.
pub fn init_log() {
    let filters = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    pretty_env_logger::formatted_builder()
        .parse_filters(&filters)
        .init();
}

pub fn connect(display: Option<&str>) -> Result<WaylandSession> {
    WaylandSession::connect(display)
}
