use kurbo::{Rect, Size};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use super::{DisplayServer, InputEvent, RegionId, ShapeKind};
use crate::comp_error;
use crate::error::Result;
use crate::events::{CompositorEvent, WindowEvent, WindowId};

const OVERLAY_WINDOW: WindowId = 0x0100_0001;
const STAGE_WINDOW: WindowId = 0x0100_0002;

/// Вызов, полученный dry-run дисплеем
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayCall {
    OverlayWindow,
    SelectInput {
        window: WindowId,
        events: Vec<InputEvent>,
    },
    CreateRegion {
        region: RegionId,
        rects: Vec<Rect>,
    },
    SetShape {
        window: WindowId,
        kind: ShapeKind,
        region: Option<RegionId>,
    },
    DestroyRegion(RegionId),
    DeliverDelete(WindowId),
}

struct DryRunState {
    screen: Size,
    calls: Vec<DisplayCall>,
    properties: HashMap<WindowId, HashSet<String>>,
    next_region: RegionId,
    live_regions: HashSet<RegionId>,
    events: Option<UnboundedSender<CompositorEvent>>,
    fail_shapes: bool,
}

/// Дисплей без X-сервера: записывает вызовы, хранит свойства окон в памяти
/// и имитирует послушных клиентов, закрывающихся по запросу.
#[derive(Clone)]
pub struct DryRunDisplay {
    state: Arc<Mutex<DryRunState>>,
}

impl DryRunDisplay {
    pub fn new(screen: Size) -> Self {
        Self {
            state: Arc::new(Mutex::new(DryRunState {
                screen,
                calls: Vec::new(),
                properties: HashMap::new(),
                next_region: 1,
                live_regions: HashSet::new(),
                events: None,
                fail_shapes: false,
            })),
        }
    }

    /// На запрос закрытия окно отвечает событиями Unmapped и Destroyed
    pub fn with_events(self, events: UnboundedSender<CompositorEvent>) -> Self {
        self.state.lock().events = Some(events);
        self
    }

    pub fn set_property(&self, window: WindowId, name: &str) {
        self.state
            .lock()
            .properties
            .entry(window)
            .or_default()
            .insert(name.to_string());
    }

    #[cfg(test)]
    pub fn calls(&self) -> Vec<DisplayCall> {
        self.state.lock().calls.clone()
    }

    #[cfg(test)]
    pub fn deletes(&self) -> Vec<WindowId> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                DisplayCall::DeliverDelete(window) => Some(*window),
                _ => None,
            })
            .collect()
    }

    #[cfg(test)]
    pub fn live_regions(&self) -> usize {
        self.state.lock().live_regions.len()
    }

    #[cfg(test)]
    pub(crate) fn fail_shapes(&self) {
        self.state.lock().fail_shapes = true;
    }

    fn record(&self, call: DisplayCall) {
        let mut state = self.state.lock();
        debug!("dry-run дисплей #{}: {:?}", state.calls.len() + 1, call);
        state.calls.push(call);
    }
}

impl DisplayServer for DryRunDisplay {
    fn screen_size(&self) -> Size {
        self.state.lock().screen
    }

    fn overlay_window(&mut self) -> Result<WindowId> {
        self.record(DisplayCall::OverlayWindow);
        Ok(OVERLAY_WINDOW)
    }

    fn stage_window(&self) -> WindowId {
        STAGE_WINDOW
    }

    fn select_input(&mut self, window: WindowId, events: &[InputEvent]) -> Result<()> {
        self.record(DisplayCall::SelectInput {
            window,
            events: events.to_vec(),
        });
        Ok(())
    }

    fn create_region(&mut self, rects: &[Rect]) -> Result<RegionId> {
        let region = {
            let mut state = self.state.lock();
            let region = state.next_region;
            state.next_region += 1;
            state.live_regions.insert(region);
            region
        };
        self.record(DisplayCall::CreateRegion {
            region,
            rects: rects.to_vec(),
        });
        Ok(region)
    }

    fn set_window_shape_region(
        &mut self,
        window: WindowId,
        kind: ShapeKind,
        region: Option<RegionId>,
    ) -> Result<()> {
        if self.state.lock().fail_shapes {
            return Err(comp_error!(display, "SetWindowShapeRegion отклонён для 0x{:x}", window));
        }
        self.record(DisplayCall::SetShape {
            window,
            kind,
            region,
        });
        Ok(())
    }

    fn destroy_region(&mut self, region: RegionId) -> Result<()> {
        if !self.state.lock().live_regions.remove(&region) {
            return Err(comp_error!(display, "Регион {} не существует", region));
        }
        self.record(DisplayCall::DestroyRegion(region));
        Ok(())
    }

    fn has_property(&mut self, window: WindowId, name: &str) -> bool {
        self.state
            .lock()
            .properties
            .get(&window)
            .map(|props| props.contains(name))
            .unwrap_or(false)
    }

    fn deliver_delete(&mut self, window: WindowId) -> Result<()> {
        self.record(DisplayCall::DeliverDelete(window));

        let events = self.state.lock().events.clone();
        if let Some(events) = events {
            info!("dry-run: окно 0x{:x} закрывается по запросу", window);
            // Клиент послушно закрывается: сначала unmap, потом уничтожение окна
            for event in [WindowEvent::Unmapped(window), WindowEvent::Destroyed(window)] {
                if events.send(CompositorEvent::Window(event)).is_err() {
                    debug!("Очередь событий закрыта");
                    break;
                }
            }
        }
        Ok(())
    }
}
