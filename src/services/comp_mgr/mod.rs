//! Composite manager: companion records for every managed window, the
//! hibernation lifecycle, unmap effects and the stacking gate.
//!
//! All methods take `&mut self` and are called from the single compositor
//! event loop, so the hibernating set, the pending effects table and the
//! deferred-restack flag need no locking.

mod client;
mod effects;
mod input_region;
mod stack;
mod stacking;

pub use client::{resolve_hibernation, ClientId, ClientKind, ClientRef, CompClient};
pub use effects::ClientEvent;
pub use stack::WindowStack;

use kurbo::{Point, Rect};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use self::effects::AnimationContext;
use self::stacking::StackSync;
use crate::config::Config;
use crate::error::{CompError, Result};
use crate::events::{WindowId, WindowInfo};
use crate::services::dispatcher::Dispatcher;
use crate::services::display::DisplayServer;
use crate::services::scene::{Actor, ActorHandle, Animator, EffectId, Stage};
use crate::services::switcher::Switcher;

pub struct CompMgr {
    config: Arc<Config>,
    display: Box<dyn DisplayServer>,
    animator: Box<dyn Animator>,
    switcher: Box<dyn Switcher>,
    dispatcher: Dispatcher,
    stage: Stage,
    home: ActorHandle,
    stack: WindowStack,
    /// Спящие клиенты; каждая запись держит дополнительную ссылку менеджера
    hibernating: HashMap<ClientId, ClientRef>,
    effects: HashMap<EffectId, AnimationContext>,
    stacking: StackSync,
    showing_home: bool,
}

impl CompMgr {
    pub fn new(
        config: Arc<Config>,
        display: Box<dyn DisplayServer>,
        animator: Box<dyn Animator>,
        switcher: Box<dyn Switcher>,
    ) -> Self {
        let screen = display.screen_size();
        let mut stage = Stage::new();

        let group = switcher.group();
        group.set_size(screen);
        stage.add_actor(&group);

        // Домашний экран всегда под всеми остальными акторами
        let home = Actor::new("home", Rect::from_origin_size(Point::ZERO, screen));
        stage.add_actor(&home);
        stage.lower_bottom(&home);

        info!(
            "Композитный менеджер создан, экран {}x{}",
            screen.width, screen.height
        );

        Self {
            config,
            display,
            animator,
            switcher,
            dispatcher: Dispatcher::new(),
            stage,
            home,
            stack: WindowStack::new(),
            hibernating: HashMap::new(),
            effects: HashMap::new(),
            stacking: StackSync::default(),
            showing_home: false,
        }
    }

    /// Регистрирует появившееся окно. `None`, если диспетчер окно отклонил.
    /// Повторный map известного окна возвращает существующую запись.
    pub fn map_window(&mut self, window: &WindowInfo) -> Option<ClientId> {
        if let Some(existing) = self.stack.by_window(window.id) {
            debug!("Повторный map для {}", existing);
            return Some(existing.id());
        }

        let kind = self.dispatcher.classify(window)?;
        let can_hibernate =
            resolve_hibernation(self.display.as_mut(), window.id, &self.config.hibernation);

        // Базовая часть: актор для клиента создаётся вместе с записью
        let actor = Actor::new(window.name.clone(), window.geometry.to_rect());
        self.stage.add_actor(&actor);

        let client = CompClient::new(window, kind, actor, can_hibernate);
        info!("Зарегистрирован {} (can_hibernate: {})", client, can_hibernate);

        self.stack.push(client.clone());
        self.map_notify(&client);
        Some(client.id())
    }

    fn map_notify(&mut self, client: &ClientRef) {
        // В переключатель попадают только приложения
        if !client.is_app() {
            return;
        }

        let actor = client.actor();
        actor.set_tag(Some(client.id()));
        self.switcher.add_window_actor(actor);
    }

    /// Окно клиента исчезло. Возвращает `false`, если окно не управлялось
    pub fn unregister_client(&mut self, window: WindowId) -> bool {
        let Some(client) = self.stack.remove(window) else {
            debug!("unregister для неизвестного окна 0x{:x}", window);
            return false;
        };

        self.dispatcher.release(client.kind());

        if client.is_hibernating() {
            // Окна больше нет, но актор нужен переключателю
            info!("{} уходит в набор спящих", client);
            self.hibernating.insert(client.id(), client.clone());
        } else {
            if client.is_app() {
                let actor = client.actor();
                self.switcher.remove_window_actor(actor);
                actor.set_tag(None);
            }
            // Актор с идущим эффектом уберёт обработчик завершения
            if !client.effect_running() {
                self.stage.remove_actor(client.actor());
            }
            info!("{} снят с учёта", client);
        }

        true
    }

    /// Закрывает клиента. Спящий уничтожается сразу, живому отправляется
    /// кооперативный запрос, а снятие произойдёт позже через unregister.
    pub fn close_client(&mut self, id: ClientId) -> Result<()> {
        if let Some(client) = self.hibernating.remove(&id) {
            info!("Закрытие спящего {}", client);
            let actor = client.actor();
            self.switcher.remove_window_actor(actor);
            actor.set_tag(None);
            self.stage.remove_actor(actor);
            return Ok(());
        }

        match self.stack.by_id(id) {
            Some(client) => {
                info!("Запрос закрытия для {}", client);
                let window = client.window();
                self.display.deliver_delete(window)
            }
            None => CompError::client_not_found(id),
        }
    }

    /// Усыпляет клиента: обновления приостанавливаются, окну отправляется
    /// запрос на закрытие. Перенос в набор спящих делает последующий unregister.
    pub fn hibernate_client(&mut self, id: ClientId) -> Result<()> {
        let Some(client) = self.stack.by_id(id).cloned() else {
            if self.hibernating.contains_key(&id) {
                debug!("{} уже спит", id);
                return Ok(());
            }
            return CompError::client_not_found(id);
        };

        if client.is_hibernating() {
            debug!("{} уже ждёт закрытия окна", client);
            return Ok(());
        }

        if client.effect_running() {
            info!("{}: гибернация после завершения эффекта", client);
            client.update_flags(|flags| flags.hibernate_after_effect = true);
            return Ok(());
        }

        self.hibernate_now(&client)
    }

    fn hibernate_now(&mut self, client: &ClientRef) -> Result<()> {
        if !client.can_hibernate() {
            warn!("{} не объявлял поддержку гибернации", client);
        }

        client.update_flags(|flags| {
            flags.dont_update = true;
            flags.hibernating = true;
        });
        info!("Гибернация {}", client);

        self.display.deliver_delete(client.window())
    }

    /// Усыпляет все окна стека, сверху вниз, по снимку стека
    pub fn hibernate_all(&mut self) {
        let snapshot = self.stack.snapshot_top_down();
        if snapshot.is_empty() {
            debug!("hibernate_all: стек пуст");
            return;
        }

        info!("Гибернация всех клиентов: {}", snapshot.len());
        for client in snapshot {
            if let Err(e) = self.hibernate_client(client.id()) {
                warn!("Не удалось усыпить {}: {}", client, e);
            }
        }
    }

    /// Ищет клиента по окну, для которого он создавался, включая спящих
    #[cfg(test)]
    pub fn client_for_window(&self, window: WindowId) -> Option<&ClientRef> {
        self.stack.by_window(window).or_else(|| {
            self.hibernating
                .values()
                .find(|client| client.window() == window)
        })
    }

    #[cfg(test)]
    pub fn client(&self, id: ClientId) -> Option<&ClientRef> {
        self.stack.by_id(id).or_else(|| self.hibernating.get(&id))
    }

    #[cfg(test)]
    pub fn is_in_hibernating_set(&self, id: ClientId) -> bool {
        self.hibernating.contains_key(&id)
    }

    pub fn hibernating_count(&self) -> usize {
        self.hibernating.len()
    }

    pub fn stack(&self) -> &WindowStack {
        &self.stack
    }

    #[cfg(test)]
    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    #[cfg(test)]
    pub fn home(&self) -> &ActorHandle {
        &self.home
    }

    #[cfg(test)]
    pub fn pending_effects(&self) -> usize {
        self.effects.len()
    }
}

impl Drop for CompMgr {
    fn drop(&mut self) {
        let hibernating = self.hibernating.len();
        for (_, client) in self.hibernating.drain() {
            debug!("Освобождение спящего {}", client);
        }
        // Контексты незавершённых анимаций держат временные ссылки
        self.effects.clear();
        info!(
            "Композитный менеджер остановлен, освобождено спящих: {}",
            hibernating
        );
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::events::WindowGeometry;
    use crate::services::dispatcher::NORMAL_TYPE;
    use crate::services::display::DryRunDisplay;
    use crate::services::scene::RecordingAnimator;
    use crate::services::switcher::TaskSwitcher;

    /// Менеджер с dry-run соседями, состояние которых видно тесту
    pub(crate) struct Harness {
        pub(crate) mgr: CompMgr,
        pub(crate) display: DryRunDisplay,
        pub(crate) switcher: TaskSwitcher,
        pub(crate) animator: RecordingAnimator,
    }

    impl Harness {
        pub(crate) fn new() -> Self {
            let config = Arc::new(Config::default());
            let display = DryRunDisplay::new(config.screen_size());
            let switcher = TaskSwitcher::new(config.switcher_button());
            let animator = RecordingAnimator::default();
            let mgr = CompMgr::new(
                config,
                Box::new(display.clone()),
                Box::new(animator.clone()),
                Box::new(switcher.clone()),
            );
            Self {
                mgr,
                display,
                switcher,
                animator,
            }
        }

        pub(crate) fn window(id: WindowId, name: &str, net_type: &str) -> WindowInfo {
            WindowInfo::new(id, name)
                .with_type(net_type)
                .with_geometry(WindowGeometry::new(0, 56, 800, 424))
        }

        pub(crate) fn map_app(&mut self, id: WindowId, name: &str, props: &[&str]) -> ClientRef {
            for prop in props {
                self.display.set_property(id, prop);
            }
            let client_id = self
                .mgr
                .map_window(&Self::window(id, name, NORMAL_TYPE))
                .expect("приложение должно регистрироваться");
            self.mgr.client(client_id).cloned().expect("клиент в стеке")
        }

        pub(crate) fn switcher_group_id(&self) -> crate::services::scene::ActorId {
            self.switcher.group().id()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::Harness;
    use super::*;
    use crate::services::dispatcher::{DESKTOP_TYPE, NOTIFICATION_TYPE};

    const KILLABLE: &str = "_HILDON_APP_KILLABLE";
    const ABLE_TO_HIBERNATE: &str = "_HILDON_ABLE_TO_HIBERNATE";

    #[test]
    fn test_map_app_adds_to_switcher_with_tag() {
        let mut h = Harness::new();
        let client = h.map_app(0x10, "Notes", &[KILLABLE]);

        assert!(client.can_hibernate());
        assert_eq!(client.actor().tag(), Some(client.id()));
        assert_eq!(h.switcher.actor_ids(), vec![client.actor().id()]);
        assert!(h.mgr.stage().contains(client.actor()));
    }

    #[test]
    fn test_alias_marker_on_map() {
        let mut h = Harness::new();
        let client = h.map_app(0x10, "Browser", &[ABLE_TO_HIBERNATE]);
        assert!(client.can_hibernate());

        let plain = h.map_app(0x11, "Terminal", &[]);
        assert!(!plain.can_hibernate());
    }

    #[test]
    fn test_non_app_not_in_switcher() {
        let mut h = Harness::new();
        let id = h
            .mgr
            .map_window(&Harness::window(0x20, "note", NOTIFICATION_TYPE))
            .unwrap();

        let client = h.mgr.client(id).unwrap();
        assert_eq!(client.kind(), ClientKind::Notification);
        assert_eq!(client.actor().tag(), None);
        assert!(h.switcher.actor_ids().is_empty());
    }

    #[test]
    fn test_second_desktop_rejected() {
        let mut h = Harness::new();
        assert!(h
            .mgr
            .map_window(&Harness::window(0x30, "desktop", DESKTOP_TYPE))
            .is_some());
        assert!(h
            .mgr
            .map_window(&Harness::window(0x31, "desktop2", DESKTOP_TYPE))
            .is_none());
        assert_eq!(h.mgr.stack().len(), 1);

        h.mgr.unregister_client(0x30);
        assert!(h
            .mgr
            .map_window(&Harness::window(0x32, "desktop3", DESKTOP_TYPE))
            .is_some());
    }

    #[test]
    fn test_unregister_live_app_releases_everything() {
        let mut h = Harness::new();
        let client = h.map_app(0x10, "Terminal", &[]);
        let actor = client.actor().clone();

        assert!(h.mgr.unregister_client(0x10));

        assert!(h.switcher.actor_ids().is_empty());
        assert_eq!(h.switcher.removal_count(actor.id()), 1);
        assert_eq!(actor.tag(), None);
        assert!(!h.mgr.stage().contains(&actor));
        assert_eq!(h.mgr.hibernating_count(), 0);
        // Осталась только ссылка теста
        assert_eq!(Arc::strong_count(&client), 1);
    }

    #[test]
    fn test_unregister_unknown_window() {
        let mut h = Harness::new();
        assert!(!h.mgr.unregister_client(0x99));
    }

    #[test]
    fn test_hibernate_requests_delete_and_suspends_updates() {
        let mut h = Harness::new();
        let client = h.map_app(0x10, "Notes", &[KILLABLE]);

        h.mgr.hibernate_client(client.id()).unwrap();

        assert!(client.is_hibernating());
        assert!(client.updates_suspended());
        assert_eq!(h.display.deletes(), vec![0x10]);
        // Окно ещё живо: в набор спящих клиент попадёт только после unregister
        assert!(!h.mgr.is_in_hibernating_set(client.id()));
        assert!(h.mgr.stack().contains(client.id()));

        // Повторный запрос не шлёт второй delete
        h.mgr.hibernate_client(client.id()).unwrap();
        assert_eq!(h.display.deletes(), vec![0x10]);
    }

    #[test]
    fn test_hibernate_unregister_close_scenario() {
        let mut h = Harness::new();
        let client = h.map_app(0x10, "Notes", &[KILLABLE]);
        let id = client.id();
        let actor = client.actor().clone();
        assert!(client.can_hibernate());

        h.mgr.hibernate_client(id).unwrap();
        assert!(client.is_hibernating());
        assert_eq!(h.display.deletes(), vec![0x10]);

        // Окно исчезает
        assert!(h.mgr.unregister_client(0x10));
        assert!(h.mgr.is_in_hibernating_set(id));
        assert_eq!(h.mgr.hibernating_count(), 1);
        assert_eq!(h.switcher.actor_ids(), vec![actor.id()]);
        assert_eq!(actor.tag(), Some(id));
        // Тест + набор спящих
        assert_eq!(Arc::strong_count(&client), 2);
        assert_eq!(
            h.mgr.client_for_window(0x10).map(|c| c.id()),
            Some(id)
        );

        h.mgr.close_client(id).unwrap();

        assert_eq!(h.mgr.hibernating_count(), 0);
        assert!(!h.mgr.is_in_hibernating_set(id));
        assert!(h.switcher.actor_ids().is_empty());
        assert_eq!(h.switcher.removal_count(actor.id()), 1);
        assert!(!h.mgr.stage().contains(&actor));
        assert_eq!(Arc::strong_count(&client), 1);
        // Закрытие спящего не трогает дисплей
        assert_eq!(h.display.deletes(), vec![0x10]);

        // Второй close: клиента уже нет
        assert!(matches!(
            h.mgr.close_client(id),
            Err(CompError::ClientNotFound(missing)) if missing == id
        ));
    }

    #[test]
    fn test_close_live_client_only_requests_delete() {
        let mut h = Harness::new();
        let client = h.map_app(0x10, "Terminal", &[]);

        h.mgr.close_client(client.id()).unwrap();

        assert_eq!(h.display.deletes(), vec![0x10]);
        assert!(h.mgr.stack().contains(client.id()));
        assert_eq!(h.switcher.actor_ids(), vec![client.actor().id()]);
    }

    #[test]
    fn test_hibernate_all_empty_stack_is_noop() {
        let mut h = Harness::new();
        h.mgr.hibernate_all();
        assert!(h.display.deletes().is_empty());
        assert_eq!(h.mgr.hibernating_count(), 0);
    }

    #[test]
    fn test_hibernate_all_top_down() {
        let mut h = Harness::new();
        let a = h.map_app(0x10, "A", &[KILLABLE]);
        let b = h.map_app(0x11, "B", &[]);
        let c = h.map_app(0x12, "C", &[ABLE_TO_HIBERNATE]);

        h.mgr.hibernate_all();

        assert_eq!(h.display.deletes(), vec![0x12, 0x11, 0x10]);
        assert!(a.is_hibernating() && b.is_hibernating() && c.is_hibernating());
        assert_eq!(h.mgr.stack().len(), 3);
    }

    #[test]
    fn test_hibernate_unknown_client() {
        let mut h = Harness::new();
        let missing = ClientId::new(u64::MAX);
        assert!(h.mgr.hibernate_client(missing).is_err());
        assert!(h.mgr.close_client(missing).is_err());
    }

    #[test]
    fn test_drop_releases_hibernating_set() {
        let mut h = Harness::new();
        let client = h.map_app(0x10, "Notes", &[KILLABLE]);
        h.mgr.hibernate_client(client.id()).unwrap();
        h.mgr.unregister_client(0x10);
        assert_eq!(Arc::strong_count(&client), 2);

        drop(h.mgr);

        assert_eq!(Arc::strong_count(&client), 1);
    }

    #[test]
    fn test_home_is_bottom_after_construction() {
        let h = Harness::new();
        let order = h.mgr.stage().order();
        assert_eq!(order.first(), Some(&h.mgr.home().id()));
    }
}
