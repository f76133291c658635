use kurbo::Rect;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Идентификатор окна дисплейного сервера (X11 XID)
pub type WindowId = u32;

/// Информация об окне в момент его появления
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowInfo {
    pub id: WindowId,
    pub name: String,
    /// Имя атома заявленного типа окна (_NET_WM_WINDOW_TYPE_*)
    pub net_type: Option<String>,
    pub override_redirect: bool,
    pub geometry: WindowGeometry,
}

impl WindowInfo {
    pub fn new(id: WindowId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            net_type: None,
            override_redirect: false,
            geometry: WindowGeometry::default(),
        }
    }

    pub fn with_type(mut self, net_type: impl Into<String>) -> Self {
        self.net_type = Some(net_type.into());
        self
    }

    pub fn with_geometry(mut self, geometry: WindowGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_override_redirect(mut self, override_redirect: bool) -> Self {
        self.override_redirect = override_redirect;
        self
    }
}

impl fmt::Display for WindowInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.net_type {
            Some(net_type) => write!(f, "0x{:x} \"{}\" ({})", self.id, self.name, net_type),
            None => write!(f, "0x{:x} \"{}\"", self.id, self.name),
        }
    }
}

/// Геометрия окна
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowGeometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl WindowGeometry {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn to_rect(self) -> Rect {
        Rect::new(
            self.x as f64,
            self.y as f64,
            self.x as f64 + self.width as f64,
            self.y as f64 + self.height as f64,
        )
    }
}

/// События жизненного цикла окна от дисплейного сервера
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowEvent {
    Mapped(WindowInfo),
    Unmapped(WindowId),
    Destroyed(WindowId),
}

impl WindowEvent {
    #[cfg(test)]
    pub fn window_id(&self) -> WindowId {
        match self {
            WindowEvent::Mapped(info) => info.id,
            WindowEvent::Unmapped(id) | WindowEvent::Destroyed(id) => *id,
        }
    }
}

impl fmt::Display for WindowEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowEvent::Mapped(info) => write!(f, "Mapped: {}", info),
            WindowEvent::Unmapped(id) => write!(f, "Unmapped: 0x{:x}", id),
            WindowEvent::Destroyed(id) => write!(f, "Destroyed: 0x{:x}", id),
        }
    }
}
