use std::collections::HashMap;
use std::sync::Arc;

use zbus::object_server::SignalEmitter;
use zbus::zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};

use crate::compat::Mutex;
use crate::service::PresentationState;
use crate::{Category, Icon, ToolTip};

pub const SNI_PATH: &str = "/StatusNotifierItem";
pub const SNI_NAME_PREFIX: &str = "org.kde.StatusNotifierItem";
pub const MENU_PATH: &str = "/MenuBar";

pub const LAUNCHER_ENTRY_PATH: &str = "/";
pub const LAUNCHER_ENTRY_INTERFACE: &str = "com.canonical.Unity.LauncherEntry";
pub const LAUNCHER_ENTRY_UPDATE: &str = "Update";

#[zbus::proxy(
    interface = "org.kde.StatusNotifierWatcher",
    default_service = "org.kde.StatusNotifierWatcher",
    default_path = "/StatusNotifierWatcher",
    gen_blocking = false
)]
pub(crate) trait StatusNotifierWatcher {
    // methods
    async fn register_status_notifier_item(&self, service: &str) -> zbus::Result<()>;
}

/// See <https://flatpak.github.io/xdg-desktop-portal/docs/doc-org.freedesktop.portal.Settings.html>
#[zbus::proxy(
    interface = "org.freedesktop.portal.Settings",
    default_service = "org.freedesktop.portal.Desktop",
    default_path = "/org/freedesktop/portal/desktop",
    gen_blocking = false
)]
pub(crate) trait Settings {
    fn read(&self, namespace: &str, key: &str) -> zbus::Result<OwnedValue>;
}

/// See <https://flatpak.github.io/xdg-desktop-portal/docs/doc-org.freedesktop.portal.Background.html>
#[zbus::proxy(
    interface = "org.freedesktop.portal.Background",
    default_service = "org.freedesktop.portal.Desktop",
    default_path = "/org/freedesktop/portal/desktop",
    gen_blocking = false
)]
pub(crate) trait Background {
    fn request_background(
        &self,
        parent_window: &str,
        options: HashMap<&str, Value<'_>>,
    ) -> zbus::Result<OwnedObjectPath>;
}

/// The `org.kde.StatusNotifierItem` object exported at [`SNI_PATH`]
///
/// Property reads are answered from the shared [`PresentationState`], from whatever task zbus
/// dispatches them on.
pub struct StatusNotifierItem {
    id: String,
    category: Category,
    state: Arc<Mutex<PresentationState>>,
}

impl StatusNotifierItem {
    pub fn new(id: String, category: Category, state: Arc<Mutex<PresentationState>>) -> Self {
        StatusNotifierItem {
            id,
            category,
            state,
        }
    }
}

// Activation requests are acknowledged but carry no action, hosts treat an item that errors
// on them as broken
#[zbus::interface(name = "org.kde.StatusNotifierItem")]
impl StatusNotifierItem {
    // methods
    fn activate(&self, _x: i32, _y: i32) -> zbus::fdo::Result<()> {
        Ok(())
    }

    fn secondary_activate(&self, _x: i32, _y: i32) -> zbus::fdo::Result<()> {
        Ok(())
    }

    fn context_menu(&self, _x: i32, _y: i32) -> zbus::fdo::Result<()> {
        Ok(())
    }

    fn scroll(&self, _delta: i32, _orientation: &str) -> zbus::fdo::Result<()> {
        Ok(())
    }

    // properties
    #[zbus(property)]
    fn category(&self) -> zbus::fdo::Result<String> {
        Ok(self.category.to_string())
    }

    #[zbus(property)]
    fn id(&self) -> zbus::fdo::Result<String> {
        Ok(self.id.clone())
    }

    #[zbus(property)]
    async fn title(&self) -> zbus::fdo::Result<String> {
        Ok(self.state.lock().await.title.clone())
    }

    #[zbus(property)]
    async fn status(&self) -> zbus::fdo::Result<String> {
        Ok(self.state.lock().await.status.to_string())
    }

    #[zbus(property)]
    fn icon_name(&self) -> zbus::fdo::Result<String> {
        Ok(String::new())
    }

    #[zbus(property)]
    async fn icon_pixmap(&self) -> zbus::fdo::Result<Vec<Icon>> {
        Ok(self.state.lock().await.icon_pixmap())
    }

    #[zbus(property)]
    fn attention_icon_name(&self) -> zbus::fdo::Result<String> {
        Ok(String::new())
    }

    #[zbus(property)]
    async fn tool_tip(&self) -> zbus::fdo::Result<ToolTip> {
        Ok(self.state.lock().await.tool_tip())
    }

    #[zbus(property)]
    fn item_is_menu(&self) -> zbus::fdo::Result<bool> {
        Ok(false)
    }

    #[zbus(property)]
    fn menu(&self) -> zbus::fdo::Result<ObjectPath<'_>> {
        Ok(ObjectPath::from_static_str(MENU_PATH).expect("MENU_PATH valid"))
    }

    // signals
    #[zbus(signal)]
    pub async fn new_title(emitter: &SignalEmitter<'_>) -> zbus::Result<()>;

    #[zbus(signal)]
    pub async fn new_icon(emitter: &SignalEmitter<'_>) -> zbus::Result<()>;

    #[zbus(signal)]
    pub async fn new_status(emitter: &SignalEmitter<'_>, status: &str) -> zbus::Result<()>;
}
