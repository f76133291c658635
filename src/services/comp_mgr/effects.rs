use tracing::{debug, info, warn};

use super::client::ClientRef;
use super::CompMgr;
use crate::events::WindowId;
use crate::services::scene::{ActorHandle, EffectId, Gravity, ScaleEffect};

/// Событие жизненного цикла клиента, на которое может отвечать эффект
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    Map,
    Unmap,
}

/// Живёт ровно столько, сколько анимация: держит временную ссылку на
/// клиента и собственный дескриптор актора.
pub(super) struct AnimationContext {
    client: ClientRef,
    actor: ActorHandle,
}

impl CompMgr {
    pub fn client_event(&mut self, window: WindowId, event: ClientEvent) {
        let Some(client) = self.stack.by_window(window).cloned() else {
            debug!("{:?} для неизвестного окна 0x{:x}", event, window);
            return;
        };

        if !client.is_app() {
            return;
        }

        match event {
            ClientEvent::Unmap => self.start_unmap_effect(&client),
            // Идущий эффект вернёт актор сам по завершении
            ClientEvent::Map if !client.effect_running() => restore_actor(client.actor()),
            ClientEvent::Map => debug!("{}: map во время эффекта", client),
        }
    }

    fn start_unmap_effect(&mut self, client: &ClientRef) {
        if client.effect_running() {
            debug!("{}: эффект уже идёт", client);
            return;
        }

        // Актор спящего клиента остаётся в переключателе как есть
        if client.is_hibernating() {
            debug!("{}: спящий клиент закрывается без эффекта", client);
            return;
        }

        let actor = client.actor().clone();
        let from = actor.scale();
        let target = self.config.effects.unmap_scale;

        client.update_flags(|flags| {
            flags.effect_running = true;
            flags.dont_update = true;
        });

        actor.move_anchor_point_from_gravity(Gravity::Center);

        let effect = ScaleEffect {
            from,
            to: (target, target),
            duration: self.config.unmap_duration(),
            curve: self.config.effects.curve,
        };
        let id = self.animator.start_scale(actor.clone(), effect);

        info!("{}: эффект закрытия {}", client, id);
        self.effects.insert(
            id,
            AnimationContext {
                client: client.clone(),
                actor,
            },
        );
    }

    /// Завершение анимации. Повторная или чужая доставка игнорируется
    pub fn effect_completed(&mut self, id: EffectId) {
        let Some(AnimationContext { client, actor }) = self.effects.remove(&id) else {
            debug!("{} уже обработан или неизвестен", id);
            return;
        };

        let hibernate_pending = client.update_flags(|flags| {
            flags.effect_running = false;
            flags.dont_update = false;
            std::mem::take(&mut flags.hibernate_after_effect)
        });

        let live = self.stack.contains(client.id());
        // Актор спящего остаётся в переключателе как есть
        if !client.is_hibernating() {
            if live {
                // Окно снова показано или просто скрыто: актор возвращается к обычному виду
                restore_actor(&actor);
            } else {
                // Окно ушло во время анимации: базовое снятие доделывается здесь
                self.stage.remove_actor(&actor);
            }
        }

        info!("{}: {} завершён", client, id);

        if hibernate_pending {
            if live {
                if let Err(e) = self.hibernate_now(&client) {
                    warn!("Отложенная гибернация {} не удалась: {}", client, e);
                }
            } else {
                debug!("{}: окно исчезло, отложенная гибернация отменена", client);
            }
        }
        // Здесь освобождаются временная ссылка на клиента и дескриптор актора
    }
}

fn restore_actor(actor: &ActorHandle) {
    actor.set_scale(1.0, 1.0);
    actor.move_anchor_point_from_gravity(Gravity::NorthWest);
}

#[cfg(test)]
mod tests {
    use super::super::testing::Harness;
    use super::*;
    use crate::services::dispatcher::{DIALOG_TYPE, NORMAL_TYPE};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_unmap_starts_effect_and_suspends_updates() {
        let mut h = Harness::new();
        let client = h.map_app(0x10, "Terminal", &[]);

        h.mgr.client_event(0x10, ClientEvent::Unmap);

        assert!(client.effect_running());
        assert!(client.updates_suspended());
        assert_eq!(h.mgr.pending_effects(), 1);

        let started = h.animator.started();
        assert_eq!(started.len(), 1);
        let (_, actor, effect) = &started[0];
        assert_eq!(actor.id(), client.actor().id());
        assert_eq!(effect.from, (1.0, 1.0));
        assert_eq!(effect.to, (0.1, 0.1));
        assert_eq!(effect.duration, Duration::from_millis(200));
        // Актор привязан к центру
        assert_eq!(actor.anchor_point(), kurbo::Point::new(400.0, 212.0));
    }

    #[test]
    fn test_second_unmap_does_not_start_second_effect() {
        let mut h = Harness::new();
        h.map_app(0x10, "Terminal", &[]);

        h.mgr.client_event(0x10, ClientEvent::Unmap);
        h.mgr.client_event(0x10, ClientEvent::Unmap);

        assert_eq!(h.animator.started_ids().len(), 1);
        assert_eq!(h.mgr.pending_effects(), 1);
    }

    #[test]
    fn test_non_app_unmap_has_no_effect() {
        let mut h = Harness::new();
        h.mgr
            .map_window(&Harness::window(0x20, "dialog", DIALOG_TYPE))
            .unwrap();

        h.mgr.client_event(0x20, ClientEvent::Unmap);
        h.mgr.client_event(0x20, ClientEvent::Map);

        assert!(h.animator.started().is_empty());
        assert_eq!(h.mgr.pending_effects(), 0);
    }

    #[test]
    fn test_completion_is_exactly_once() {
        let mut h = Harness::new();
        let client = h.map_app(0x10, "Terminal", &[]);
        h.mgr.client_event(0x10, ClientEvent::Unmap);
        let id = h.animator.started_ids()[0];
        h.animator.finish_all();

        // тест + стек + контекст анимации
        assert_eq!(Arc::strong_count(&client), 3);

        h.mgr.effect_completed(id);
        assert!(!client.effect_running());
        assert!(!client.updates_suspended());
        assert_eq!(Arc::strong_count(&client), 2);

        h.mgr.effect_completed(id);
        assert_eq!(Arc::strong_count(&client), 2);
        assert_eq!(h.mgr.pending_effects(), 0);
    }

    #[test]
    fn test_n_effects_complete_independently() {
        let mut h = Harness::new();
        let clients: Vec<_> = (0..4)
            .map(|i| h.map_app(0x10 + i, &format!("app{}", i), &[]))
            .collect();

        for client in &clients {
            h.mgr.client_event(client.window(), ClientEvent::Unmap);
        }
        let ids = h.animator.started_ids();
        h.animator.finish_all();
        assert_eq!(ids.len(), 4);

        // Завершаем в обратном порядке; каждое касается только своего клиента
        for (done, id) in ids.iter().rev().enumerate() {
            h.mgr.effect_completed(*id);

            for (index, client) in clients.iter().enumerate() {
                let finished = index >= clients.len() - 1 - done;
                assert_eq!(client.effect_running(), !finished);
                assert_eq!(client.updates_suspended(), !finished);
                assert_eq!(Arc::strong_count(client), if finished { 2 } else { 3 });
            }
        }
        assert_eq!(h.mgr.pending_effects(), 0);
    }

    #[test]
    fn test_client_survives_unregister_during_effect() {
        let mut h = Harness::new();
        let client = h.map_app(0x10, "Terminal", &[]);
        let actor = client.actor().clone();

        h.mgr.client_event(0x10, ClientEvent::Unmap);
        let id = h.animator.started_ids()[0];
        h.animator.finish_all();

        h.mgr.unregister_client(0x10);

        // Стек отпустил запись, но контекст анимации её держит
        assert_eq!(Arc::strong_count(&client), 2);
        assert!(h.mgr.stage().contains(&actor));
        assert!(h.switcher.actor_ids().is_empty());

        h.mgr.effect_completed(id);

        assert_eq!(Arc::strong_count(&client), 1);
        assert!(!h.mgr.stage().contains(&actor));
    }

    #[test]
    fn test_hibernate_during_effect_waits_for_completion() {
        let mut h = Harness::new();
        let client = h.map_app(0x10, "Notes", &["_HILDON_APP_KILLABLE"]);

        h.mgr.client_event(0x10, ClientEvent::Unmap);
        let id = h.animator.started_ids()[0];

        h.mgr.hibernate_client(client.id()).unwrap();
        assert!(!client.is_hibernating());
        assert!(client.flags().hibernate_after_effect);
        assert!(h.display.deletes().is_empty());

        h.mgr.effect_completed(id);

        assert!(client.is_hibernating());
        assert!(client.updates_suspended());
        assert!(!client.flags().hibernate_after_effect);
        assert_eq!(h.display.deletes(), vec![0x10]);
    }

    #[test]
    fn test_deferred_hibernate_dropped_when_window_gone() {
        let mut h = Harness::new();
        let client = h.map_app(0x10, "Notes", &[]);

        h.mgr.client_event(0x10, ClientEvent::Unmap);
        let id = h.animator.started_ids()[0];
        h.mgr.hibernate_client(client.id()).unwrap();
        h.mgr.unregister_client(0x10);

        h.mgr.effect_completed(id);

        assert!(!client.is_hibernating());
        assert!(h.display.deletes().is_empty());
        assert_eq!(h.mgr.hibernating_count(), 0);
    }

    #[test]
    fn test_hibernating_client_unmaps_without_effect() {
        let mut h = Harness::new();
        let client = h.map_app(0x10, "Notes", &["_HILDON_APP_KILLABLE"]);

        h.mgr.hibernate_client(client.id()).unwrap();
        h.mgr.client_event(0x10, ClientEvent::Unmap);

        assert!(h.animator.started().is_empty());
        assert_eq!(client.actor().scale(), (1.0, 1.0));
    }

    #[test]
    fn test_remap_during_effect_restores_actor_on_completion() {
        let mut h = Harness::new();
        let client = h.map_app(0x10, "Terminal", &[]);
        let actor = client.actor().clone();
        let geometry = actor.geometry();

        h.mgr.client_event(0x10, ClientEvent::Unmap);
        let id = h.animator.started_ids()[0];
        actor.set_scale(0.1, 0.1);

        // Окно снова показано, пока анимация идёт
        let remapped = h.mgr.map_window(&Harness::window(0x10, "Terminal", NORMAL_TYPE));
        assert_eq!(remapped, Some(client.id()));
        h.mgr.client_event(0x10, ClientEvent::Map);
        assert_eq!(actor.scale(), (0.1, 0.1));

        h.mgr.effect_completed(id);

        assert!(h.mgr.stack().contains(client.id()));
        assert!(h.mgr.stage().contains(&actor));
        assert_eq!(actor.scale(), (1.0, 1.0));
        assert_eq!(actor.anchor_point(), kurbo::Point::ZERO);
        assert_eq!(actor.geometry(), geometry);
    }

    #[test]
    fn test_map_without_effect_restores_actor() {
        let mut h = Harness::new();
        let client = h.map_app(0x10, "Terminal", &[]);
        let actor = client.actor().clone();
        actor.move_anchor_point_from_gravity(Gravity::Center);
        actor.set_scale(0.5, 0.5);

        h.mgr.client_event(0x10, ClientEvent::Map);

        assert_eq!(actor.scale(), (1.0, 1.0));
        assert_eq!(actor.anchor_point(), kurbo::Point::ZERO);
    }

    #[test]
    fn test_drop_releases_pending_effects() {
        let mut h = Harness::new();
        let client = h.map_app(0x10, "Terminal", &[]);
        h.mgr.client_event(0x10, ClientEvent::Unmap);
        h.animator.finish_all();
        assert_eq!(Arc::strong_count(&client), 3);

        drop(h.mgr);

        assert_eq!(Arc::strong_count(&client), 1);
    }
}
