use kurbo::{Point, Rect};
use tracing::{debug, info};

use super::CompMgr;
use crate::error::Result;
use crate::events::WindowId;
use crate::services::display::{DisplayServer, InputEvent, RegionId, ShapeKind};

/// События, которые оверлей и окно сцены получают в области кнопки
pub const VIEWPORT_EVENTS: [InputEvent; 7] = [
    InputEvent::FocusChange,
    InputEvent::Exposure,
    InputEvent::PropertyChange,
    InputEvent::ButtonPress,
    InputEvent::ButtonRelease,
    InputEvent::KeyPress,
    InputEvent::KeyRelease,
];

impl CompMgr {
    /// Активация композитора. Ошибки дисплея здесь фатальны
    pub fn turn_on(&mut self) -> Result<()> {
        let overlay = self.display.overlay_window()?;

        // Базовая активация: ввод принимает весь оверлей
        let screen = Rect::from_origin_size(Point::ZERO, self.display.screen_size());
        let region = self.display.create_region(&[screen])?;
        with_region(self.display.as_mut(), region, |display| {
            display.set_window_shape_region(overlay, ShapeKind::Input, Some(region))
        })?;
        info!("Оверлей 0x{:x} активирован", overlay);

        let button = self.switcher.button_geometry();
        self.setup_input_viewport(overlay, button)
    }

    /// Сужает область ввода оверлея и окна сцены до прямоугольника кнопки
    /// переключателя; остальной экран пропускает ввод к окнам под ним.
    fn setup_input_viewport(&mut self, overlay: WindowId, button: Rect) -> Result<()> {
        let stage = self.display.stage_window();
        debug!(
            "Область ввода: {}x{} в ({}, {})",
            button.width(),
            button.height(),
            button.x0,
            button.y0
        );

        self.display.select_input(overlay, &VIEWPORT_EVENTS)?;
        let region = self.display.create_region(&[button])?;

        with_region(self.display.as_mut(), region, |display| {
            display.set_window_shape_region(overlay, ShapeKind::Bounding, None)?;
            display.set_window_shape_region(overlay, ShapeKind::Input, Some(region))?;

            display.select_input(stage, &VIEWPORT_EVENTS)?;
            display.set_window_shape_region(stage, ShapeKind::Bounding, None)?;
            display.set_window_shape_region(stage, ShapeKind::Input, Some(region))
        })?;

        info!("Область ввода сужена до кнопки переключателя");
        Ok(())
    }
}

/// Регион освобождается и при ошибке: сервер держит только копию формы
fn with_region(
    display: &mut dyn DisplayServer,
    region: RegionId,
    f: impl FnOnce(&mut dyn DisplayServer) -> Result<()>,
) -> Result<()> {
    let result = f(&mut *display);
    let destroyed = display.destroy_region(region);
    result.and(destroyed)
}

#[cfg(test)]
mod tests {
    use super::super::testing::Harness;
    use super::*;
    use crate::error::CompError;
    use crate::services::display::DisplayCall;

    const OVERLAY: WindowId = 0x0100_0001;
    const STAGE: WindowId = 0x0100_0002;

    #[test]
    fn test_turn_on_shrinks_input_to_button() {
        let mut h = Harness::new();
        h.mgr.turn_on().unwrap();

        let screen = Rect::new(0.0, 0.0, 800.0, 480.0);
        let button = Rect::new(0.0, 0.0, 112.0, 56.0);
        let events = VIEWPORT_EVENTS.to_vec();

        assert_eq!(
            h.display.calls(),
            vec![
                DisplayCall::OverlayWindow,
                DisplayCall::CreateRegion {
                    region: 1,
                    rects: vec![screen]
                },
                DisplayCall::SetShape {
                    window: OVERLAY,
                    kind: ShapeKind::Input,
                    region: Some(1)
                },
                DisplayCall::DestroyRegion(1),
                DisplayCall::SelectInput {
                    window: OVERLAY,
                    events: events.clone()
                },
                DisplayCall::CreateRegion {
                    region: 2,
                    rects: vec![button]
                },
                DisplayCall::SetShape {
                    window: OVERLAY,
                    kind: ShapeKind::Bounding,
                    region: None
                },
                DisplayCall::SetShape {
                    window: OVERLAY,
                    kind: ShapeKind::Input,
                    region: Some(2)
                },
                DisplayCall::SelectInput {
                    window: STAGE,
                    events
                },
                DisplayCall::SetShape {
                    window: STAGE,
                    kind: ShapeKind::Bounding,
                    region: None
                },
                DisplayCall::SetShape {
                    window: STAGE,
                    kind: ShapeKind::Input,
                    region: Some(2)
                },
                DisplayCall::DestroyRegion(2),
            ]
        );
        assert_eq!(h.display.live_regions(), 0);
    }

    #[test]
    fn test_shape_failure_is_fatal_and_region_released() {
        let mut h = Harness::new();
        h.display.fail_shapes();

        let result = h.mgr.turn_on();

        assert!(matches!(result, Err(CompError::Display(_))));
        assert_eq!(h.display.live_regions(), 0);
    }
}
