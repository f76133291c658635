//! Display server boundary: the compositor only issues configuration calls
//! through [`DisplayServer`]; the protocol itself lives behind it.
//!
//! Two implementations, picked by [`create_display`]: the X11 backend and
//! a recording dry-run backend used by `--dry-run` and by tests.

mod dry_run;
mod x11;

#[cfg(test)]
pub use self::dry_run::DisplayCall;
pub use self::dry_run::DryRunDisplay;
pub use self::x11::{X11Display, X11EventPump};

use kurbo::{Rect, Size};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::events::{CompositorEvent, WindowId};

pub type RegionId = u32;

/// Вид формы окна (XShape)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Bounding,
    Input,
}

/// Классы событий ввода, выбираемые на окне
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputEvent {
    FocusChange,
    Exposure,
    PropertyChange,
    ButtonPress,
    ButtonRelease,
    KeyPress,
    KeyRelease,
}

pub trait DisplayServer: Send {
    fn screen_size(&self) -> Size;

    /// Окно-оверлей композитора, покрывающее весь экран
    fn overlay_window(&mut self) -> Result<WindowId>;

    /// Окно, в которое рисует граф сцены
    fn stage_window(&self) -> WindowId;

    fn select_input(&mut self, window: WindowId, events: &[InputEvent]) -> Result<()>;

    fn create_region(&mut self, rects: &[Rect]) -> Result<RegionId>;

    /// `None` снимает форму (окно снова прямоугольное)
    fn set_window_shape_region(
        &mut self,
        window: WindowId,
        kind: ShapeKind,
        region: Option<RegionId>,
    ) -> Result<()>;

    fn destroy_region(&mut self, region: RegionId) -> Result<()>;

    /// Существует ли свойство окна. Значение не читается, отсутствие не ошибка
    fn has_property(&mut self, window: WindowId, name: &str) -> bool;

    /// Кооперативный запрос на закрытие (WM_DELETE_WINDOW), не принудительное уничтожение
    fn deliver_delete(&mut self, window: WindowId) -> Result<()>;
}

/// Выбранный бэкенд дисплея
pub enum DisplayBackend {
    X11 {
        display: X11Display,
        pump: X11EventPump,
    },
    DryRun(DryRunDisplay),
}

/// Factory function to create the display backend based on the dry_run flag
pub fn create_display(
    config: &Arc<Config>,
    events: UnboundedSender<CompositorEvent>,
    dry_run: bool,
) -> Result<DisplayBackend> {
    if dry_run {
        info!("Используется dry-run дисплей");
        Ok(DisplayBackend::DryRun(
            DryRunDisplay::new(config.screen_size()).with_events(events),
        ))
    } else {
        let (display, pump) = X11Display::connect(events)?;
        Ok(DisplayBackend::X11 { display, pump })
    }
}
