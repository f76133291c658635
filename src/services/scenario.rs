use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::interval;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::Result;
use crate::events::{
    CompositorEvent, ControlRequest, WindowEvent, WindowGeometry, WindowId, WindowInfo,
};
use crate::services::comp_mgr::ClientId;
use crate::services::dispatcher::{DESKTOP_TYPE, NORMAL_TYPE, NOTIFICATION_TYPE};
use crate::services::display::DryRunDisplay;
use crate::services::event_source::EventSource;
use crate::services::switcher::TaskSwitcher;

const DESKTOP_WINDOW: WindowId = 0x0200_0000;
const ROUND_BASE: WindowId = 0x0200_0100;
const ROUND_STRIDE: WindowId = 0x100;

/// Сценарий dry-run режима: по таймеру эмулирует окна приложений и
/// запросы переключателя, проходя все ветви жизненного цикла.
pub struct DryRunScenario {
    config: Arc<Config>,
    display: DryRunDisplay,
    switcher: TaskSwitcher,
    events: UnboundedSender<CompositorEvent>,
}

/// Шаг сценария. Закрытие и гибернация адресуются миниатюрой в
/// переключателе: запись клиента известна только после map.
#[derive(Debug, Clone, PartialEq)]
enum Step {
    Emit(CompositorEvent),
    Close(String),
    Hibernate(String),
}

/// Окна одного круга сценария
#[derive(Debug, Clone, Copy)]
struct RoundWindows {
    notes: WindowId,
    browser: WindowId,
    terminal: WindowId,
    notification: WindowId,
}

impl RoundWindows {
    fn new(round: u32) -> Self {
        let base = ROUND_BASE + round * ROUND_STRIDE;
        Self {
            notes: base + 1,
            browser: base + 2,
            terminal: base + 3,
            notification: base + 4,
        }
    }
}

impl DryRunScenario {
    pub fn new(
        config: Arc<Config>,
        display: DryRunDisplay,
        switcher: TaskSwitcher,
        events: UnboundedSender<CompositorEvent>,
    ) -> Self {
        Self {
            config,
            display,
            switcher,
            events,
        }
    }

    fn app_window(&self, id: WindowId, name: &str, net_type: &str) -> WindowInfo {
        let screen = self.config.screen_size();
        let top = self.config.switcher.button_height;
        WindowInfo::new(id, name)
            .with_type(net_type)
            .with_geometry(WindowGeometry::new(
                0,
                top as i32,
                screen.width as u32,
                (screen.height as u32).saturating_sub(top),
            ))
    }

    /// Шаги одного круга. Маркеры гибернации выставляются до появления окон
    fn round(&self, round: u32) -> Vec<Step> {
        let w = RoundWindows::new(round);
        let names = &self.config.hibernation;
        self.display.set_property(w.notes, &names.property);
        self.display.set_property(w.browser, &names.alias);

        let title = |app: &str| format!("{} #{}", app, round + 1);
        let mapped = |info: WindowInfo| Step::Emit(CompositorEvent::Window(WindowEvent::Mapped(info)));
        let control = |request| Step::Emit(CompositorEvent::Control(request));

        let mut steps = Vec::new();
        if round == 0 {
            steps.push(mapped(
                WindowInfo::new(DESKTOP_WINDOW, "Desktop").with_type(DESKTOP_TYPE),
            ));
        }
        steps.extend([
            mapped(self.app_window(w.notes, &title("Notes"), NORMAL_TYPE)),
            mapped(self.app_window(w.browser, &title("Browser"), NORMAL_TYPE)),
            mapped(self.app_window(w.terminal, &title("Terminal"), NORMAL_TYPE)),
            mapped(WindowInfo::new(w.notification, "Battery low").with_type(NOTIFICATION_TYPE)),
            control(ControlRequest::ShowSwitcher),
            control(ControlRequest::Restack),
            control(ControlRequest::Restack),
            control(ControlRequest::HideSwitcher),
            Step::Hibernate(title("Notes")),
            Step::Close(title("Notes")),
            Step::Close(title("Terminal")),
            Step::Emit(CompositorEvent::Window(WindowEvent::Unmapped(w.notification))),
            Step::Emit(CompositorEvent::Window(WindowEvent::Destroyed(w.notification))),
            control(ControlRequest::RaiseHome),
            control(ControlRequest::LowerHome),
            control(ControlRequest::HibernateAll),
            Step::Close(title("Browser")),
        ]);
        steps
    }

    /// Превращает шаг в событие; миниатюры может уже не быть
    fn resolve(&self, step: Step) -> Option<CompositorEvent> {
        let (name, request): (String, fn(ClientId) -> ControlRequest) = match step {
            Step::Emit(event) => return Some(event),
            Step::Close(name) => (name, ControlRequest::CloseClient),
            Step::Hibernate(name) => (name, ControlRequest::HibernateClient),
        };

        match self.switcher.client_named(&name) {
            Some(id) => Some(CompositorEvent::Control(request(id))),
            None => {
                debug!("Dry-run: миниатюры \"{}\" нет в переключателе", name);
                None
            }
        }
    }

    fn interval(&self) -> Duration {
        Duration::from_millis(self.config.session.scenario_interval_ms)
    }
}

#[async_trait::async_trait]
impl EventSource for DryRunScenario {
    async fn run(self: Box<Self>) -> Result<()> {
        info!("Dry-run режим: сценарий окон запущен");

        let mut ticker = interval(self.interval());
        let mut round = 0;

        loop {
            info!("Dry-run: круг сценария {}", round);
            for step in self.round(round) {
                ticker.tick().await;
                let Some(event) = self.resolve(step) else {
                    continue;
                };
                info!("Dry-run: {}", event);
                if self.events.send(event).is_err() {
                    info!("Очередь событий закрыта, сценарий остановлен");
                    return Ok(());
                }
            }
            round += 1;
        }
    }
}
