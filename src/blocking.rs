//! The blocking API
//!
//! Every call blocks the calling thread until the bus answers or the configured timeout
//! elapses. Errors are logged and reported as `false` or `None`. Must not be called from
//! within an async runtime.

use once_cell::sync::OnceCell;
use zbus::Connection;

use crate::{compat, launcher, portal, Config, Error, Tray};

/// Owner of the desktop integration of an application
///
/// Holds at most one tray item, created by [`init_service`] and removed by
/// [`destroy_service`] or when the host is dropped. Launcher and portal requests share one
/// session connection, opened on first use; the tray item keeps a connection of its own.
///
/// # Examples
///
/// ```no_run
/// let mut host = libvesktop::blocking::Host::default();
/// if host.init_service() {
///     host.set_title("(2) Equibop");
/// }
/// host.update_launcher_count(2);
/// ```
///
/// [`init_service`]: Self::init_service
/// [`destroy_service`]: Self::destroy_service
pub struct Host {
    config: Config,
    conn: OnceCell<Connection>,
    tray: Option<Tray>,
}

impl Default for Host {
    fn default() -> Self {
        Host::new(Config::default())
    }
}

impl Host {
    pub fn new(config: Config) -> Self {
        Host {
            config,
            conn: OnceCell::new(),
            tray: None,
        }
    }

    // not cached on failure, the next request connects again
    fn connection(&self) -> Result<&Connection, Error> {
        self.conn.get_or_try_init(|| {
            compat::block_on(crate::session_connection(self.config.timeout()))
        })
    }

    /// Show `count` on the application's launcher, `0` hides the badge
    pub fn update_launcher_count(&self, count: i64) -> bool {
        self.connection()
            .and_then(|conn| compat::block_on(launcher::update_count(conn, &self.config, count)))
            .inspect_err(|e| log::warn!("failed to update launcher count: {e}"))
            .is_ok()
    }

    /// Desktop accent color as `0xRRGGBB`
    pub fn accent_color(&self) -> Option<u32> {
        self.connection()
            .and_then(|conn| compat::block_on(portal::accent_color(conn, &self.config)))
            .inspect_err(|e| log::warn!("failed to read accent color: {e}"))
            .ok()
    }

    /// Ask to keep running in the background, optionally autostarting with `commandline`
    pub fn request_background(&self, autostart: bool, commandline: &[String]) -> bool {
        self.connection()
            .and_then(|conn| {
                compat::block_on(portal::request_background(
                    conn,
                    &self.config,
                    autostart,
                    commandline,
                ))
            })
            .inspect_err(|e| log::warn!("failed to request background: {e}"))
            .is_ok()
    }

    /// Create the tray item, does nothing if it already exists
    pub fn init_service(&mut self) -> bool {
        if self.tray.is_some() {
            return true;
        }
        match compat::block_on(Tray::spawn(self.config.clone())) {
            Ok(tray) => {
                self.tray = Some(tray);
                true
            }
            Err(e) => {
                log::warn!("failed to initialize tray: {e}");
                false
            }
        }
    }

    /// Whether [`init_service`](Self::init_service) succeeded and the item was not destroyed
    pub fn is_initialized(&self) -> bool {
        self.tray.is_some()
    }

    /// Replace the tray icon, see [`Tray::set_icon`]
    pub fn set_icon(&self, pixmap: &[u8]) -> bool {
        let Some(tray) = &self.tray else {
            log::warn!("tray icon set before the tray was initialized");
            return false;
        };
        compat::block_on(tray.set_icon(pixmap))
            .inspect_err(|e| log::warn!("failed to set tray icon: {e}"))
            .is_ok()
    }

    /// Replace the tray title
    pub fn set_title(&self, title: &str) -> bool {
        let Some(tray) = &self.tray else {
            log::warn!("tray title set before the tray was initialized");
            return false;
        };
        compat::block_on(tray.set_title(title))
            .inspect_err(|e| log::warn!("failed to set tray title: {e}"))
            .is_ok()
    }

    /// Remove the tray item, does nothing if there is none
    pub fn destroy_service(&mut self) {
        if let Some(tray) = self.tray.take() {
            if let Err(e) = compat::block_on(tray.shutdown()) {
                log::warn!("failed to remove tray: {e}");
            }
        }
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        self.destroy_service();
    }
}
