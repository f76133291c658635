pub mod control;
pub mod window;

pub use control::ControlRequest;
pub use window::{WindowEvent, WindowGeometry, WindowId, WindowInfo};

use crate::services::scene::EffectId;
use std::fmt;

/// Всё, что обрабатывает цикл событий композитора, приходит через одну очередь
#[derive(Debug, Clone, PartialEq)]
pub enum CompositorEvent {
    Window(WindowEvent),
    Control(ControlRequest),
    /// Анимация эффекта завершилась; доставляется тем же циклом, что и остальные события
    EffectCompleted(EffectId),
}

impl fmt::Display for CompositorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompositorEvent::Window(event) => write!(f, "{}", event),
            CompositorEvent::Control(request) => write!(f, "{}", request),
            CompositorEvent::EffectCompleted(id) => write!(f, "EffectCompleted: {}", id),
        }
    }
}
