use std::sync::Arc;
use std::time::Duration;

use zbus::fdo::{RequestNameFlags, RequestNameReply};
use zbus::Connection;

use crate::compat::{self, Mutex};
use crate::dbus_interface::{
    StatusNotifierItem, StatusNotifierWatcherProxy, SNI_NAME_PREFIX, SNI_PATH,
};
use crate::{Config, Error, Icon, Status, ToolTip};

/// Mutable presentation of the item, shared with the exported object
#[derive(Debug)]
pub struct PresentationState {
    pub status: Status,
    pub title: String,
    /// Host supplied icon buffer, see [`Icon::from_buffer`]
    pub icon_pixmap: Vec<u8>,
}

impl PresentationState {
    fn new(title: &str) -> Self {
        PresentationState {
            status: Status::Active,
            title: title.to_owned(),
            icon_pixmap: Vec::new(),
        }
    }

    pub fn icon_pixmap(&self) -> Vec<Icon> {
        Icon::from_buffer(&self.icon_pixmap).into_iter().collect()
    }

    pub fn tool_tip(&self) -> ToolTip {
        ToolTip {
            title: self.title.clone(),
            ..Default::default()
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum RegistrationPhase {
    #[default]
    NotRegisteredWithWatcher,
    RegisteredWithWatcher,
}

#[derive(Debug, Default)]
struct Lifecycle {
    exported: bool,
    phase: RegistrationPhase,
}

/// Bus name and object path of an item, fixed once connected
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServiceIdentity {
    pub name: String,
    pub path: &'static str,
}

impl ServiceIdentity {
    fn well_known() -> Self {
        ServiceIdentity {
            name: format!("{SNI_NAME_PREFIX}-{}-1", std::process::id()),
            path: SNI_PATH,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ItemSignal {
    NewIcon,
    NewTitle,
    NewStatus(Status),
}

/// The session bus operations the item relies on
#[allow(async_fn_in_trait)]
pub trait Backend: Send + Sync + 'static {
    fn unique_name(&self) -> Option<String>;
    async fn export(&self, item: StatusNotifierItem) -> Result<(), Error>;
    async fn own_name(&self, name: &str) -> Result<(), Error>;
    async fn register_with_watcher(&self, name: &str) -> Result<(), Error>;
    async fn emit(&self, signal: ItemSignal) -> Result<(), Error>;
    async fn unexport(&self) -> Result<(), Error>;
}

pub struct SessionBus {
    conn: Connection,
    timeout: Duration,
}

impl SessionBus {
    pub async fn connect(timeout: Duration) -> Result<Self, Error> {
        let conn = crate::session_connection(timeout).await?;
        Ok(SessionBus { conn, timeout })
    }
}

impl Backend for SessionBus {
    fn unique_name(&self) -> Option<String> {
        self.conn.unique_name().map(|name| name.to_string())
    }

    async fn export(&self, item: StatusNotifierItem) -> Result<(), Error> {
        let added = self
            .conn
            .object_server()
            .at(SNI_PATH, item)
            .await
            .map_err(Error::Dbus)?;
        if added {
            Ok(())
        } else {
            Err(Error::AlreadyExported)
        }
    }

    async fn own_name(&self, name: &str) -> Result<(), Error> {
        let flags = RequestNameFlags::AllowReplacement | RequestNameFlags::ReplaceExisting;
        let reply = compat::timeout(self.timeout, self.conn.request_name_with_flags(name, flags))
            .await?
            .map_err(Error::Dbus)?;
        match reply {
            RequestNameReply::PrimaryOwner | RequestNameReply::AlreadyOwner => Ok(()),
            RequestNameReply::InQueue | RequestNameReply::Exists => {
                Err(Error::NameNotOwned(name.to_owned()))
            }
        }
    }

    async fn register_with_watcher(&self, name: &str) -> Result<(), Error> {
        let snw_object = StatusNotifierWatcherProxy::new(&self.conn)
            .await
            .map_err(Error::Dbus)?;
        compat::timeout(self.timeout, snw_object.register_status_notifier_item(name))
            .await?
            .map_err(|e| {
                let fdo_err: zbus::fdo::Error = e.into();
                if let zbus::fdo::Error::ZBus(e) = fdo_err {
                    Error::Dbus(e)
                } else {
                    Error::Watcher(fdo_err)
                }
            })
    }

    async fn emit(&self, signal: ItemSignal) -> Result<(), Error> {
        let sni_obj = self
            .conn
            .object_server()
            .interface::<_, StatusNotifierItem>(SNI_PATH)
            .await
            .map_err(Error::Dbus)?;
        let emitter = sni_obj.signal_emitter();
        log::trace!("emitting {signal:?}");
        let emitted = match signal {
            ItemSignal::NewIcon => {
                compat::timeout(self.timeout, StatusNotifierItem::new_icon(emitter)).await?
            }
            ItemSignal::NewTitle => {
                compat::timeout(self.timeout, StatusNotifierItem::new_title(emitter)).await?
            }
            ItemSignal::NewStatus(status) => {
                let status = status.to_string();
                compat::timeout(self.timeout, StatusNotifierItem::new_status(emitter, &status))
                    .await?
            }
        };
        emitted.map_err(Error::Dbus)
    }

    async fn unexport(&self) -> Result<(), Error> {
        self.conn
            .object_server()
            .remove::<StatusNotifierItem, _>(SNI_PATH)
            .await
            .map(|_| ())
            .map_err(Error::Dbus)
    }
}

/// The StatusNotifierItem service
///
/// Without a bus the service is inert: `identity` stays unset and every operation either
/// does nothing or fails with [`Error::Disconnected`].
pub(crate) struct Service<B = SessionBus> {
    bus: Option<B>,
    identity: Option<ServiceIdentity>,
    config: Config,
    pub(crate) state: Arc<Mutex<PresentationState>>,
    // held across the watcher round-trip, never while touching `state`
    lifecycle: Mutex<Lifecycle>,
}

impl Service<SessionBus> {
    pub async fn connect(config: Config) -> Self {
        let bus = match SessionBus::connect(config.timeout()).await {
            Ok(bus) => Some(bus),
            Err(e) => {
                log::error!("failed to connect to session bus: {e}");
                None
            }
        };
        Service::with_bus(bus, config)
    }
}

impl<B: Backend> Service<B> {
    pub fn with_bus(bus: Option<B>, config: Config) -> Self {
        let identity = bus.as_ref().and_then(|bus| {
            if config.owns_name() {
                Some(ServiceIdentity::well_known())
            } else {
                bus.unique_name().map(|name| ServiceIdentity {
                    name,
                    path: SNI_PATH,
                })
            }
        });
        let state = PresentationState::new(config.initial_title());
        Service {
            bus,
            identity,
            config,
            state: Arc::new(Mutex::new(state)),
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }

    pub fn identity(&self) -> Option<&ServiceIdentity> {
        self.identity.as_ref()
    }

    /// Export the item and own its well-known name
    ///
    /// Must be called once, a failed instance should be shut down and discarded.
    pub async fn initialize(&self) -> Result<(), Error> {
        let (Some(bus), Some(identity)) = (&self.bus, &self.identity) else {
            return Err(Error::Disconnected);
        };

        let item = StatusNotifierItem::new(
            self.config.item_id().to_owned(),
            self.config.item_category(),
            self.state.clone(),
        );
        bus.export(item).await?;
        self.lifecycle.lock().await.exported = true;
        log::debug!("exported StatusNotifierItem at {}", identity.path);

        if self.config.owns_name() {
            bus.own_name(&identity.name).await?;
            log::debug!("owned bus name {}", identity.name);
        }
        Ok(())
    }

    async fn register_with_watcher(&self, lifecycle: &mut Lifecycle) -> Result<(), Error> {
        let (Some(bus), Some(identity)) = (&self.bus, &self.identity) else {
            return Ok(());
        };
        if lifecycle.phase == RegistrationPhase::RegisteredWithWatcher {
            return Ok(());
        }

        bus.register_with_watcher(&identity.name).await?;
        lifecycle.phase = RegistrationPhase::RegisteredWithWatcher;
        log::debug!("registered {} to StatusNotifierWatcher", identity.name);

        if let Err(e) = bus.emit(ItemSignal::NewStatus(Status::Active)).await {
            log::warn!("failed to announce status after registration: {e}");
        }
        Ok(())
    }

    /// Stage a new icon buffer and publish it
    ///
    /// The first icon registers the item to the watcher, later ones emit `NewIcon`. The buffer
    /// is kept even if publishing fails, so the next call retries with it in place.
    pub async fn set_icon_pixmap(&self, pixmap: Vec<u8>) -> Result<(), Error> {
        let Some(bus) = &self.bus else {
            return Err(Error::Disconnected);
        };

        if let Some(icon) = Icon::from_buffer(&pixmap).filter(|icon| !icon.is_consistent()) {
            log::warn!(
                "icon of {}x{} carries {} bytes of pixel data, forwarding as is",
                icon.width,
                icon.height,
                icon.data.len()
            );
        }
        self.state.lock().await.icon_pixmap = pixmap;

        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.phase == RegistrationPhase::NotRegisteredWithWatcher {
            self.register_with_watcher(&mut lifecycle).await
        } else {
            drop(lifecycle);
            bus.emit(ItemSignal::NewIcon).await
        }
    }

    pub async fn set_title(&self, title: &str) -> Result<(), Error> {
        let Some(bus) = &self.bus else {
            return Ok(());
        };

        {
            let mut state = self.state.lock().await;
            if state.title == title {
                return Ok(());
            }
            state.title = title.to_owned();
        }
        bus.emit(ItemSignal::NewTitle).await
    }

    /// Remove the exported object
    ///
    /// The bus name and the watcher registration go away with the connection.
    pub async fn shutdown(&self) -> Result<(), Error> {
        let Some(bus) = &self.bus else {
            return Ok(());
        };
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.exported {
            bus.unexport().await?;
            lifecycle.exported = false;
            log::debug!("removed StatusNotifierItem from {SNI_PATH}");
        }
        Ok(())
    }

    #[cfg(test)]
    async fn phase(&self) -> RegistrationPhase {
        self.lifecycle.lock().await.phase
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::OnceLock;

    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    enum Call {
        Export,
        OwnName(String),
        Register(String),
        Emit(ItemSignal),
        Unexport,
    }

    #[derive(Clone, Default)]
    struct RecordingBus {
        calls: Arc<std::sync::Mutex<Vec<Call>>>,
        watcher_offline: Arc<AtomicBool>,
        name_taken: Arc<AtomicBool>,
        // when set, registration is slow and reads the item back like a watcher does
        watcher_view: Arc<OnceLock<Arc<Mutex<PresentationState>>>>,
        seen_by_watcher: Arc<std::sync::Mutex<Vec<(String, usize)>>>,
    }

    impl RecordingBus {
        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }

        fn take_calls(&self) -> Vec<Call> {
            std::mem::take(&mut *self.calls.lock().unwrap())
        }
    }

    impl Backend for RecordingBus {
        fn unique_name(&self) -> Option<String> {
            Some(":1.42".into())
        }

        async fn export(&self, _item: StatusNotifierItem) -> Result<(), Error> {
            self.record(Call::Export);
            Ok(())
        }

        async fn own_name(&self, name: &str) -> Result<(), Error> {
            self.record(Call::OwnName(name.into()));
            if self.name_taken.load(Ordering::SeqCst) {
                Err(Error::NameNotOwned(name.into()))
            } else {
                Ok(())
            }
        }

        async fn register_with_watcher(&self, name: &str) -> Result<(), Error> {
            self.record(Call::Register(name.into()));
            if let Some(state) = self.watcher_view.get() {
                tokio::time::sleep(Duration::from_millis(50)).await;
                let seen = {
                    let state = state.lock().await;
                    (state.title.clone(), state.icon_pixmap().len())
                };
                self.seen_by_watcher.lock().unwrap().push(seen);
            }
            if self.watcher_offline.load(Ordering::SeqCst) {
                Err(Error::Watcher(zbus::fdo::Error::ServiceUnknown(
                    "org.kde.StatusNotifierWatcher".into(),
                )))
            } else {
                Ok(())
            }
        }

        async fn emit(&self, signal: ItemSignal) -> Result<(), Error> {
            self.record(Call::Emit(signal));
            Ok(())
        }

        async fn unexport(&self) -> Result<(), Error> {
            self.record(Call::Unexport);
            Ok(())
        }
    }

    fn service() -> (Service<RecordingBus>, RecordingBus) {
        let bus = RecordingBus::default();
        (Service::with_bus(Some(bus.clone()), Config::default()), bus)
    }

    fn icon_buffer(width: i32, height: i32, data: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&width.to_ne_bytes());
        buf.extend_from_slice(&height.to_ne_bytes());
        buf.extend_from_slice(data);
        buf
    }

    #[tokio::test]
    async fn initialize_exports_then_owns_name() {
        let (service, bus) = service();
        service.initialize().await.unwrap();

        let name = format!("org.kde.StatusNotifierItem-{}-1", std::process::id());
        assert_eq!(service.identity().unwrap().name, name);
        assert_eq!(bus.take_calls(), vec![Call::Export, Call::OwnName(name)]);
    }

    #[tokio::test]
    async fn initialize_fails_when_name_not_owned() {
        let (service, bus) = service();
        bus.name_taken.store(true, Ordering::SeqCst);
        assert!(matches!(
            service.initialize().await,
            Err(Error::NameNotOwned(_))
        ));

        // the export happened, shutting down must undo it
        bus.take_calls();
        service.shutdown().await.unwrap();
        assert_eq!(bus.take_calls(), vec![Call::Unexport]);
    }

    #[tokio::test]
    async fn without_dbus_name_uses_unique_name() {
        let bus = RecordingBus::default();
        let service = Service::with_bus(
            Some(bus.clone()),
            Config::default().disable_dbus_name(true),
        );
        service.initialize().await.unwrap();
        service.set_icon_pixmap(Vec::new()).await.unwrap();

        assert_eq!(
            bus.take_calls(),
            vec![
                Call::Export,
                Call::Register(":1.42".into()),
                Call::Emit(ItemSignal::NewStatus(Status::Active)),
            ]
        );
    }

    #[tokio::test]
    async fn same_title_is_not_signaled() {
        let (service, bus) = service();
        service.set_title("Equibop").await.unwrap();
        assert!(bus.take_calls().is_empty());

        service.set_title("(3) Equibop").await.unwrap();
        assert_eq!(bus.take_calls(), vec![Call::Emit(ItemSignal::NewTitle)]);
        assert_eq!(service.state.lock().await.title, "(3) Equibop");

        service.set_title("(3) Equibop").await.unwrap();
        assert!(bus.take_calls().is_empty());
    }

    #[tokio::test]
    async fn title_round_trip() {
        let (service, _bus) = service();
        for title in ["", "Equibop", "ディスコード 🎧", "(12) général"] {
            service.set_title(title).await.unwrap();
            assert_eq!(service.state.lock().await.tool_tip().title, title);
            assert_eq!(service.state.lock().await.title, title);
        }
    }

    #[tokio::test]
    async fn first_icon_registers_then_icons_are_signaled() {
        let (service, bus) = service();
        let name = service.identity().unwrap().name.clone();

        service.set_icon_pixmap(icon_buffer(1, 1, &[0; 4])).await.unwrap();
        assert_eq!(
            bus.take_calls(),
            vec![
                Call::Register(name),
                Call::Emit(ItemSignal::NewStatus(Status::Active)),
            ]
        );
        assert_eq!(service.phase().await, RegistrationPhase::RegisteredWithWatcher);

        for _ in 0..2 {
            service.set_icon_pixmap(icon_buffer(1, 1, &[1; 4])).await.unwrap();
            assert_eq!(bus.take_calls(), vec![Call::Emit(ItemSignal::NewIcon)]);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_icons_register_once() {
        let (service, bus) = service();
        assert!(bus.watcher_view.set(service.state.clone()).is_ok());
        let service = Arc::new(service);

        let tasks: Vec<_> = (0..8u8)
            .map(|i| {
                let service = service.clone();
                tokio::spawn(async move {
                    service.set_icon_pixmap(icon_buffer(1, 1, &[i; 4])).await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let calls = bus.take_calls();
        let count = |wanted: &dyn Fn(&Call) -> bool| calls.iter().filter(|c| wanted(c)).count();
        assert_eq!(count(&|c| matches!(c, Call::Register(_))), 1);
        assert_eq!(
            count(&|c| *c == Call::Emit(ItemSignal::NewStatus(Status::Active))),
            1
        );
        assert_eq!(count(&|c| *c == Call::Emit(ItemSignal::NewIcon)), 7);
        assert_eq!(
            *bus.seen_by_watcher.lock().unwrap(),
            vec![("Equibop".to_string(), 1)]
        );
        assert_eq!(service.phase().await, RegistrationPhase::RegisteredWithWatcher);
    }

    #[tokio::test]
    async fn registration_is_retried_on_next_icon() {
        let (service, bus) = service();
        let name = service.identity().unwrap().name.clone();
        bus.watcher_offline.store(true, Ordering::SeqCst);

        let first = icon_buffer(1, 1, &[0xff, 0, 0, 0]);
        assert!(matches!(
            service.set_icon_pixmap(first.clone()).await,
            Err(Error::Watcher(_))
        ));
        assert_eq!(bus.take_calls(), vec![Call::Register(name.clone())]);
        assert_eq!(service.phase().await, RegistrationPhase::NotRegisteredWithWatcher);
        // staged regardless
        assert_eq!(service.state.lock().await.icon_pixmap, first);

        bus.watcher_offline.store(false, Ordering::SeqCst);
        service.set_icon_pixmap(first).await.unwrap();
        assert_eq!(
            bus.take_calls(),
            vec![
                Call::Register(name),
                Call::Emit(ItemSignal::NewStatus(Status::Active)),
            ]
        );
        assert_eq!(service.phase().await, RegistrationPhase::RegisteredWithWatcher);
    }

    #[tokio::test]
    async fn icon_pixmap_property() {
        let (service, _bus) = service();
        assert!(service.state.lock().await.icon_pixmap().is_empty());

        service.set_icon_pixmap(Vec::new()).await.unwrap();
        assert!(service.state.lock().await.icon_pixmap().is_empty());

        let pixels = [0xff, 0x10, 0x20, 0x30, 0x80, 0x40, 0x50, 0x60];
        service
            .set_icon_pixmap(icon_buffer(2, 1, &pixels))
            .await
            .unwrap();
        assert_eq!(
            service.state.lock().await.icon_pixmap(),
            vec![Icon {
                width: 2,
                height: 1,
                data: pixels.to_vec(),
            }]
        );
    }

    #[tokio::test]
    async fn tool_tip_mirrors_title() {
        let (service, _bus) = service();
        service.set_title("Friends").await.unwrap();
        let tool_tip = service.state.lock().await.tool_tip();
        assert_eq!(
            tool_tip,
            ToolTip {
                icon_name: String::new(),
                icon_pixmap: Vec::new(),
                title: "Friends".into(),
                description: String::new(),
            }
        );
    }

    #[tokio::test]
    async fn inert_without_bus() {
        let service = Service::<RecordingBus>::with_bus(None, Config::default());
        assert!(service.identity().is_none());
        assert!(matches!(
            service.initialize().await,
            Err(Error::Disconnected)
        ));
        assert!(matches!(
            service.set_icon_pixmap(icon_buffer(1, 1, &[0; 4])).await,
            Err(Error::Disconnected)
        ));
        service.set_title("ignored").await.unwrap();
        assert_eq!(service.state.lock().await.title, "Equibop");
        service.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_only_unexports_once() {
        let (service, bus) = service();
        service.shutdown().await.unwrap();
        assert!(bus.take_calls().is_empty());

        service.initialize().await.unwrap();
        bus.take_calls();
        service.shutdown().await.unwrap();
        service.shutdown().await.unwrap();
        assert_eq!(bus.take_calls(), vec![Call::Unexport]);
    }
}
