use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::error::Result;
use crate::events::{CompositorEvent, ControlRequest, WindowEvent};
use crate::services::comp_mgr::{ClientEvent, CompMgr};
use crate::services::switcher::TaskSwitcher;

/// Цикл событий композитора: единственный владелец менеджера.
/// Все события, включая завершения анимаций, обрабатываются по очереди.
pub struct Session {
    manager: CompMgr,
    switcher: TaskSwitcher,
    events: UnboundedReceiver<CompositorEvent>,
}

impl Session {
    pub fn new(
        manager: CompMgr,
        switcher: TaskSwitcher,
        events: UnboundedReceiver<CompositorEvent>,
    ) -> Self {
        Self {
            manager,
            switcher,
            events,
        }
    }

    pub async fn run(mut self, mut shutdown: oneshot::Receiver<()>) -> Result<()> {
        info!("Цикл событий композитора запущен");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Получен запрос остановки");
                    break;
                }
                event = self.events.recv() => match event {
                    Some(event) => self.handle(event),
                    None => {
                        info!("Все источники событий закрыты");
                        break;
                    }
                },
            }
        }

        info!(
            "Цикл событий остановлен, окон в стеке: {}, спящих: {}",
            self.manager.stack().len(),
            self.manager.hibernating_count()
        );
        // Менеджер уничтожается вместе с сессией и освобождает спящих клиентов
        Ok(())
    }

    pub fn handle(&mut self, event: CompositorEvent) {
        crate::debug_if_enabled!("Событие: {}", event);

        match event {
            CompositorEvent::Window(event) => self.handle_window(event),
            CompositorEvent::Control(request) => self.handle_control(request),
            CompositorEvent::EffectCompleted(id) => self.manager.effect_completed(id),
        }
    }

    fn handle_window(&mut self, event: WindowEvent) {
        match event {
            WindowEvent::Mapped(info) => {
                if self.manager.map_window(&info).is_some() {
                    self.manager.client_event(info.id, ClientEvent::Map);
                    self.manager.restack();
                }
            }
            WindowEvent::Unmapped(window) => {
                self.manager.client_event(window, ClientEvent::Unmap);
            }
            WindowEvent::Destroyed(window) => {
                if self.manager.unregister_client(window) {
                    self.manager.restack();
                }
            }
        }
    }

    fn handle_control(&mut self, request: ControlRequest) {
        match request {
            ControlRequest::CloseClient(id) => {
                if let Err(e) = self.manager.close_client(id) {
                    warn!("Не удалось закрыть {}: {}", id, e);
                }
            }
            ControlRequest::HibernateClient(id) => {
                if let Err(e) = self.manager.hibernate_client(id) {
                    warn!("Не удалось усыпить {}: {}", id, e);
                }
            }
            ControlRequest::HibernateAll => self.manager.hibernate_all(),
            ControlRequest::ShowSwitcher => self.switcher.show(),
            ControlRequest::HideSwitcher => {
                self.switcher.hide();
                self.manager.sync_stacking();
            }
            ControlRequest::Restack => self.manager.restack(),
            ControlRequest::RaiseHome => self.manager.raise_home_actor(),
            ControlRequest::LowerHome => self.manager.lower_home_actor(),
        }
    }

    #[cfg(test)]
    pub fn manager(&self) -> &CompMgr {
        &self.manager
    }
}
