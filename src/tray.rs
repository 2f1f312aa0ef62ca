use serde::Serialize;
use std::fmt;
use zbus::zvariant::{Type, Value};

/// Category of this item.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Type, Serialize)]
#[zvariant(signature = "s")]
pub enum Category {
    /// The item describes the status of a generic application, for instance
    /// the current state of a media player. In the case where the category of
    /// the item can not be known, such as when the item is being proxied from
    /// another incompatible or emulated system, ApplicationStatus can be used
    /// a sensible default fallback.
    ApplicationStatus,
    /// The item describes the status of communication oriented applications,
    /// like an instant messenger or an email client.
    Communications,
    /// The item describes services of the system not seen as a stand alone
    /// application by the user, such as an indicator for the activity of a disk
    /// indexing service.
    SystemServices,
    /// The item describes the state and control of a particular hardware,
    /// such as an indicator of the battery charge or sound card volume control.
    Hardware,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        self.serialize(f)
    }
}

/// Status of this item or of the associated application.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Type, Serialize)]
#[zvariant(signature = "s")]
pub enum Status {
    /// The item doesn't convey important information to the user, it can be
    /// considered an "idle" status and is likely that visualizations will chose
    /// to hide it.
    Passive,
    /// The item is active, is more important that the item will be shown in
    /// some way to the user.
    #[default]
    Active,
    /// The item carries really important information for the user, such as
    /// battery charge running out and is wants to incentive the direct user
    /// intervention. Visualizations should emphasize in some way the items with
    /// NeedsAttention status.
    NeedsAttention,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        self.serialize(f)
    }
}

/// Extra information associated to the item
///
/// That can be visualized for instance by a tooltip (or by any other mean the
/// visualization consider appropriate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Type, Value, Serialize)]
pub struct ToolTip {
    /// Freedesktop-compliant name for an icon.
    pub icon_name: String,
    /// Icon data
    pub icon_pixmap: Vec<Icon>,
    /// Title for this tooltip
    pub title: String,
    /// Descriptive text for this tooltip. It can contain also a subset of the
    /// HTML markup language, for a list of allowed tags see Section Markup.
    pub description: String,
}

/// An ARGB32 image
#[derive(Clone, Debug, PartialEq, Eq, Hash, Type, Value, Serialize)]
pub struct Icon {
    pub width: i32,
    pub height: i32,
    /// ARGB32 format, network byte order
    pub data: Vec<u8>,
}

/// Size of the `width`/`height` header in front of an icon buffer
pub(crate) const ICON_HEADER_LEN: usize = 8;

impl Icon {
    /// Reinterpret a host supplied icon buffer
    ///
    /// The buffer starts with the width and the height as native-endian `i32`s, followed by
    /// `width * height * 4` ARGB bytes. Returns `None` if the header is incomplete.
    ///
    /// The pixel data is forwarded as is, its length is not checked against the header.
    pub fn from_buffer(buffer: &[u8]) -> Option<Icon> {
        let (header, data) = buffer.split_at_checked(ICON_HEADER_LEN)?;
        let (width, height) = header.split_at(4);
        Some(Icon {
            width: i32::from_ne_bytes(width.try_into().ok()?),
            height: i32::from_ne_bytes(height.try_into().ok()?),
            data: data.to_vec(),
        })
    }

    /// Whether `data` holds exactly `width * height` ARGB32 pixels
    pub fn is_consistent(&self) -> bool {
        usize::try_from(self.width)
            .ok()
            .zip(usize::try_from(self.height).ok())
            .and_then(|(w, h)| w.checked_mul(h)?.checked_mul(4))
            == Some(self.data.len())
    }
}
