//! Linux desktop integration over the session bus
//!
//! - a [StatusNotifierItem] tray icon whose pixmap and title are pushed by the application,
//!   see [`Tray`]
//! - badges on dock and taskbar launchers, see [`launcher`]
//! - the desktop accent color and background permission requests through the XDG desktop
//!   portal, see [`portal`]
//!
//! # Async Runtime
//!
//! libvesktop uses [Tokio] by default, but can be runtime-agnostic by disabling the "tokio"
//! feature and enabling the "async-io" feature
//!
//! ```toml
//! [dependencies]
//! libvesktop = { version = "0.1", default-features = false, features = ["async-io"] }
//! ```
//!
//! # Blocking API
//!
//! The "blocking" feature (enabled by default) provides [`blocking::Host`], which exposes every
//! operation as a blocking call returning `bool` or `Option`
//!
//! [StatusNotifierItem]: https://www.freedesktop.org/wiki/Specifications/StatusNotifierItem/
//! [Tokio]: https://tokio.rs

use std::time::Duration;

#[cfg(feature = "blocking")]
pub mod blocking;
mod compat;
mod config;
mod dbus_interface;
pub mod launcher;
pub mod portal;
mod service;
mod tray;

pub use config::{Config, DESKTOP_ID_ENV};
pub use tray::{Category, Icon, Status, ToolTip};

/// An error while talking to the session bus
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// D-Bus connection error
    ///
    /// Can not connect to the session D-Bus daemon, or encounter an error during the connection.
    Dbus(zbus::Error),
    /// Failed to register to the [StatusNotifierWatcher]
    ///
    /// Current desktop environment does not support the [StatusNotifierItem] specification or the
    /// plugin that adds support is not running. The next icon update retries.
    ///
    /// [StatusNotifierWatcher]: https://www.freedesktop.org/wiki/Specifications/StatusNotifierItem/StatusNotifierWatcher/
    /// [StatusNotifierItem]: https://www.freedesktop.org/wiki/Specifications/StatusNotifierItem/
    Watcher(zbus::fdo::Error),
    /// The bus did not grant the well-known name of the item
    NameNotOwned(String),
    /// Another object is already served at the item's path on this connection
    AlreadyExported,
    /// No session bus was reachable when the service was created
    Disconnected,
    /// A bus round-trip did not complete in time
    Timeout(Duration),
    /// The reply did not have the expected shape
    MalformedReply(&'static str),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use Error::*;
        match self {
            Dbus(e) => write!(f, "D-Bus connection error: {e}"),
            Watcher(e) => write!(f, "failed to register to the StatusNotifierWatcher: {e}"),
            NameNotOwned(name) => write!(f, "bus name {name} could not be acquired"),
            AlreadyExported => write!(f, "an object is already exported at the item path"),
            Disconnected => write!(f, "not connected to the session bus"),
            Timeout(after) => write!(f, "no reply from the bus after {after:?}"),
            MalformedReply(what) => write!(f, "unexpected reply for {what}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use Error::*;
        match self {
            Dbus(e) => e.source(),
            Watcher(e) => e.source(),
            NameNotOwned(_) | AlreadyExported | Disconnected | Timeout(_) | MalformedReply(_) => {
                None
            }
        }
    }
}

/// Open a session bus connection, giving up after `timeout`
///
/// The connection can be shared by every [`launcher`] and [`portal`] request.
pub async fn session_connection(timeout: Duration) -> Result<zbus::Connection, Error> {
    compat::timeout(timeout, zbus::Connection::session())
        .await?
        .map_err(Error::Dbus)
}

/// A running tray item
///
/// The item stays invisible until the first [`set_icon`] registers it to the
/// StatusNotifierWatcher.
///
/// [`set_icon`]: Self::set_icon
pub struct Tray {
    service: service::Service,
}

impl Tray {
    /// Connect to the session bus, export the item and own its bus name
    ///
    /// If the item can not be fully set up, whatever was exported is removed again.
    pub async fn spawn(config: Config) -> Result<Self, Error> {
        let service = service::Service::connect(config).await;
        if let Err(e) = service.initialize().await {
            if let Err(e) = service.shutdown().await {
                log::warn!("failed to remove half initialized tray: {e}");
            }
            return Err(e);
        }
        Ok(Tray { service })
    }

    /// Bus name the item is registered under
    pub fn name(&self) -> Option<&str> {
        self.service.identity().map(|identity| identity.name.as_str())
    }

    /// Replace the icon
    ///
    /// `pixmap` is the width and the height as native-endian `i32`s followed by the ARGB32
    /// pixels, see [`Icon::from_buffer`]. A buffer shorter than 8 bytes clears the icon.
    pub async fn set_icon(&self, pixmap: impl Into<Vec<u8>>) -> Result<(), Error> {
        self.service.set_icon_pixmap(pixmap.into()).await
    }

    /// Replace the title, setting the current title again does nothing
    pub async fn set_title(&self, title: &str) -> Result<(), Error> {
        self.service.set_title(title).await
    }

    /// Remove the item from the bus
    pub async fn shutdown(self) -> Result<(), Error> {
        self.service.shutdown().await
    }
}
