//! Badges on dock and taskbar launchers, through the `com.canonical.Unity.LauncherEntry` signal

use std::collections::HashMap;

use zbus::names::BusName;
use zbus::zvariant::Value;
use zbus::Connection;

use crate::compat;
use crate::dbus_interface::{LAUNCHER_ENTRY_INTERFACE, LAUNCHER_ENTRY_PATH, LAUNCHER_ENTRY_UPDATE};
use crate::{Config, Error};

/// Show `count` on the application's launcher, `0` hides the badge
///
/// The signal is broadcast on `conn`, nothing acknowledges it.
pub async fn update_count(conn: &Connection, config: &Config, count: i64) -> Result<(), Error> {
    let timeout = config.timeout();
    let app_uri = application_uri(&config.desktop_file_id());
    log::trace!("updating launcher entry {app_uri} to {count}");
    compat::timeout(
        timeout,
        conn.emit_signal(
            None::<BusName<'_>>,
            LAUNCHER_ENTRY_PATH,
            LAUNCHER_ENTRY_INTERFACE,
            LAUNCHER_ENTRY_UPDATE,
            &(app_uri, properties(count)),
        ),
    )
    .await?
    .map_err(Error::Dbus)
}

fn application_uri(desktop_file_id: &str) -> String {
    format!("application://{desktop_file_id}.desktop")
}

fn properties(count: i64) -> HashMap<&'static str, Value<'static>> {
    HashMap::from([
        ("count", Value::from(count)),
        ("count-visible", Value::from(count != 0)),
    ])
}
