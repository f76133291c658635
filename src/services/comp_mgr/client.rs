use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::config::HibernationConfig;
use crate::events::{WindowId, WindowInfo};
use crate::services::display::DisplayServer;
use crate::services::scene::ActorHandle;

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    #[cfg(test)]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    fn next() -> Self {
        Self(NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client#{}", self.0)
    }
}

/// Тип клиента, назначенный диспетчером
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientKind {
    App,
    Dialog,
    Notification,
    Menu,
    StatusArea,
    HomeApplet,
    Desktop,
    Passthrough,
}

/// Флаги записи клиента
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientFlags {
    pub can_hibernate: bool,
    pub hibernating: bool,
    pub effect_running: bool,
    /// Обычные обновления актора приостановлены
    pub dont_update: bool,
    /// Гибернация запрошена во время эффекта и выполнится после него
    pub hibernate_after_effect: bool,
}

/// Запись композитора для одного окна-клиента.
///
/// Владение разделяемое (`ClientRef`): ссылку держит стек окон, пока окно
/// живо, набор спящих клиентов и контекст анимации. Запись живёт, пока
/// жива хотя бы одна из этих ссылок.
pub struct CompClient {
    id: ClientId,
    window: WindowId,
    kind: ClientKind,
    name: String,
    actor: ActorHandle,
    flags: Mutex<ClientFlags>,
}

pub type ClientRef = Arc<CompClient>;

impl CompClient {
    pub fn new(window: &WindowInfo, kind: ClientKind, actor: ActorHandle, can_hibernate: bool) -> ClientRef {
        Arc::new(Self {
            id: ClientId::next(),
            window: window.id,
            kind,
            name: window.name.clone(),
            actor,
            flags: Mutex::new(ClientFlags {
                can_hibernate,
                ..ClientFlags::default()
            }),
        })
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Окно, для которого создана запись; у спящего клиента оно уже уничтожено
    pub fn window(&self) -> WindowId {
        self.window
    }

    pub fn kind(&self) -> ClientKind {
        self.kind
    }

    pub fn is_app(&self) -> bool {
        self.kind == ClientKind::App
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn actor(&self) -> &ActorHandle {
        &self.actor
    }

    pub fn flags(&self) -> ClientFlags {
        *self.flags.lock()
    }

    pub fn can_hibernate(&self) -> bool {
        self.flags.lock().can_hibernate
    }

    pub fn is_hibernating(&self) -> bool {
        self.flags.lock().hibernating
    }

    pub fn effect_running(&self) -> bool {
        self.flags.lock().effect_running
    }

    pub fn updates_suspended(&self) -> bool {
        self.flags.lock().dont_update
    }

    pub(super) fn update_flags<R>(&self, f: impl FnOnce(&mut ClientFlags) -> R) -> R {
        f(&mut self.flags.lock())
    }
}

impl fmt::Display for CompClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} \"{}\" (0x{:x}, {:?})", self.id, self.name, self.window, self.kind)
    }
}

impl fmt::Debug for CompClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompClient")
            .field("id", &self.id)
            .field("window", &self.window)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("actor", &self.actor.id())
            .field("flags", &*self.flags.lock())
            .finish()
    }
}

impl Drop for CompClient {
    fn drop(&mut self) {
        debug!("Запись {} \"{}\" уничтожена", self.id, self.name);
    }
}

/// Может ли клиент уйти в гибернацию: маркер под основным именем,
/// иначе под устаревшим псевдонимом. Значение свойства не важно.
pub fn resolve_hibernation(
    display: &mut dyn DisplayServer,
    window: WindowId,
    names: &HibernationConfig,
) -> bool {
    display.has_property(window, &names.property) || display.has_property(window, &names.alias)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::services::display::DryRunDisplay;
    use crate::services::scene::Actor;
    use kurbo::{Rect, Size};

    fn display() -> DryRunDisplay {
        DryRunDisplay::new(Size::new(800.0, 480.0))
    }

    #[test]
    fn test_primary_marker() {
        let names = Config::default().hibernation;
        let mut display = display();
        display.set_property(1, &names.property);
        assert!(resolve_hibernation(&mut display, 1, &names));
    }

    #[test]
    fn test_alias_marker() {
        let names = Config::default().hibernation;
        let mut display = display();
        display.set_property(1, &names.alias);
        assert!(resolve_hibernation(&mut display, 1, &names));
    }

    #[test]
    fn test_both_markers() {
        let names = Config::default().hibernation;
        let mut display = display();
        display.set_property(1, &names.property);
        display.set_property(1, &names.alias);
        assert!(resolve_hibernation(&mut display, 1, &names));
    }

    #[test]
    fn test_no_marker() {
        let names = Config::default().hibernation;
        let mut display = display();
        display.set_property(1, "_NET_WM_NAME");
        assert!(!resolve_hibernation(&mut display, 1, &names));
        assert!(!resolve_hibernation(&mut display, 2, &names));
    }

    #[test]
    fn test_new_client_flags() {
        let window = WindowInfo::new(5, "Notes");
        let actor = Actor::new("Notes", Rect::ZERO);
        let client = CompClient::new(&window, ClientKind::App, actor, true);

        assert_eq!(
            client.flags(),
            ClientFlags {
                can_hibernate: true,
                ..ClientFlags::default()
            }
        );
        assert!(client.is_app());
        assert_eq!(client.window(), 5);
    }
}
