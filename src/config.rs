use std::time::Duration;

use crate::Category;

/// Environment variable carrying the desktop file id of the running application
pub const DESKTOP_ID_ENV: &str = "CHROME_DESKTOP";

const DEFAULT_ID: &str = "equibop";
const DEFAULT_TITLE: &str = "Equibop";
const DEFAULT_DESKTOP_ID: &str = "vesktop";
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_millis(5000);

/// Options shared by the tray service and the one-shot desktop requests
///
/// # Examples
///
/// ```
/// # use std::time::Duration;
/// let config = libvesktop::Config::default()
///     .title("My App")
///     .call_timeout(Duration::from_secs(2));
/// ```
#[derive(Clone, Debug)]
pub struct Config {
    id: String,
    title: String,
    category: Category,
    desktop_id: Option<String>,
    call_timeout: Duration,
    own_name: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            id: DEFAULT_ID.into(),
            title: DEFAULT_TITLE.into(),
            category: Category::Communications,
            desktop_id: None,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            own_name: true,
        }
    }
}

impl Config {
    /// Value of the tray item's `Id` property
    ///
    /// It's a name that should be unique for this application and consistent
    /// between sessions, such as the application name itself.
    pub fn id(self, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..self
        }
    }

    /// Title the tray item starts with
    pub fn title(self, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..self
        }
    }

    /// Value of the tray item's `Category` property
    pub fn category(self, category: Category) -> Self {
        Self { category, ..self }
    }

    /// Desktop file id used to address launcher entries, with or without the `.desktop` suffix
    ///
    /// When unset, [`DESKTOP_ID_ENV`] is consulted before falling back to `vesktop`.
    pub fn desktop_id(self, desktop_id: impl Into<String>) -> Self {
        Self {
            desktop_id: Some(desktop_id.into()),
            ..self
        }
    }

    /// Upper bound of every blocking round-trip to the session bus
    pub fn call_timeout(self, call_timeout: Duration) -> Self {
        Self {
            call_timeout,
            ..self
        }
    }

    /// Disable owning a D-Bus well-known name (`StatusNotifierItem-PID-1`) for the tray service
    ///
    /// The item is then registered to the watcher with the unique name of its connection. This
    /// violates the [StatusNotifierItem] specification, but is required in some sandboxed
    /// environments (e.g., flatpak).
    ///
    /// See <https://chromium-review.googlesource.com/c/chromium/src/+/4179380>
    ///
    /// [StatusNotifierItem]: https://www.freedesktop.org/wiki/Specifications/StatusNotifierItem/StatusNotifierItem/
    pub fn disable_dbus_name(self, disable: bool) -> Self {
        Self {
            own_name: !disable,
            ..self
        }
    }

    pub(crate) fn item_id(&self) -> &str {
        &self.id
    }

    pub(crate) fn initial_title(&self) -> &str {
        &self.title
    }

    pub(crate) fn item_category(&self) -> Category {
        self.category
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.call_timeout
    }

    pub(crate) fn owns_name(&self) -> bool {
        self.own_name
    }

    /// Desktop file id without the `.desktop` suffix
    pub fn desktop_file_id(&self) -> String {
        let hint = self
            .desktop_id
            .clone()
            .or_else(|| std::env::var(DESKTOP_ID_ENV).ok());
        desktop_file_id_from(hint.as_deref())
    }
}

fn desktop_file_id_from(hint: Option<&str>) -> String {
    hint.map(|id| id.trim())
        .map(|id| id.strip_suffix(".desktop").unwrap_or(id))
        .filter(|id| !id.is_empty())
        .unwrap_or(DEFAULT_DESKTOP_ID)
        .to_string()
}
