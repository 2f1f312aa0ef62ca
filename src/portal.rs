//! One-shot requests to the XDG desktop portal

use std::collections::HashMap;

use zbus::zvariant::Value;
use zbus::Connection;

use crate::compat;
use crate::dbus_interface::{BackgroundProxy, SettingsProxy};
use crate::{Config, Error};

const APPEARANCE_NAMESPACE: &str = "org.freedesktop.appearance";
const ACCENT_COLOR_KEY: &str = "accent-color";

/// Read the desktop accent color as `0xRRGGBB`
///
/// Fails with [`Error::MalformedReply`] unless the portal answers with three channels in
/// `[0, 1]`, out of range channels are never clamped.
pub async fn accent_color(conn: &Connection, config: &Config) -> Result<u32, Error> {
    let timeout = config.timeout();
    let settings = SettingsProxy::new(conn).await.map_err(Error::Dbus)?;
    let value = compat::timeout(timeout, settings.read(APPEARANCE_NAMESPACE, ACCENT_COLOR_KEY))
        .await?
        .map_err(Error::Dbus)?;
    decode_accent_color(&value).ok_or(Error::MalformedReply(ACCENT_COLOR_KEY))
}

/// Decode a `(ddd)` color, portals wrap it in one or more extra variants
pub(crate) fn decode_accent_color(value: &Value<'_>) -> Option<u32> {
    let mut value = value;
    while let Value::Value(inner) = value {
        value = &**inner;
    }
    let Value::Structure(color) = value else {
        return None;
    };
    let [r, g, b] = color.fields() else {
        return None;
    };
    let channel = |v: &Value<'_>| match *v {
        Value::F64(v) if v.is_finite() && (0.0..=1.0).contains(&v) => {
            Some((v * 255.0).round() as u32)
        }
        _ => None,
    };
    Some(channel(r)? << 16 | channel(g)? << 8 | channel(b)?)
}

/// Ask the background portal to let the application run in the background
///
/// Only the call itself is checked, the portal may still prompt the user and deny the request
/// later on.
pub async fn request_background(
    conn: &Connection,
    config: &Config,
    autostart: bool,
    commandline: &[String],
) -> Result<(), Error> {
    let timeout = config.timeout();
    let background = BackgroundProxy::new(conn).await.map_err(Error::Dbus)?;
    let request = compat::timeout(
        timeout,
        background.request_background("", background_options(autostart, commandline)),
    )
    .await?
    .map_err(Error::Dbus)?;
    log::debug!("background requested, portal request at {}", request.as_str());
    Ok(())
}

fn background_options(
    autostart: bool,
    commandline: &[String],
) -> HashMap<&'static str, Value<'static>> {
    let mut options = HashMap::new();
    options.insert("autostart", Value::from(autostart));
    if !commandline.is_empty() {
        options.insert("commandline", Value::from(commandline.to_vec()));
    }
    options
}
