use tracing::{debug, warn};

use crate::events::WindowInfo;
use crate::services::comp_mgr::ClientKind;

pub const HOME_APPLET_TYPE: &str = "_HILDON_WM_WINDOW_TYPE_HOME_APPLET";
pub const APP_MENU_TYPE: &str = "_HILDON_WM_WINDOW_TYPE_APP_MENU";
pub const STATUS_AREA_TYPE: &str = "_HILDON_WM_WINDOW_TYPE_STATUS_AREA";
pub const STATUS_MENU_TYPE: &str = "_HILDON_WM_WINDOW_TYPE_STATUS_MENU";
pub const DESKTOP_TYPE: &str = "_NET_WM_WINDOW_TYPE_DESKTOP";
pub const NORMAL_TYPE: &str = "_NET_WM_WINDOW_TYPE_NORMAL";
pub const DIALOG_TYPE: &str = "_NET_WM_WINDOW_TYPE_DIALOG";
pub const NOTIFICATION_TYPE: &str = "_NET_WM_WINDOW_TYPE_NOTIFICATION";

/// Классифицирует окна по заявленному типу. Рабочий стол допускается
/// только один: пока он жив, второй запрос отклоняется.
#[derive(Debug, Default)]
pub struct Dispatcher {
    desktop_present: bool,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classify(&mut self, window: &WindowInfo) -> Option<ClientKind> {
        if window.override_redirect {
            return Some(ClientKind::Passthrough);
        }

        let kind = match window.net_type.as_deref() {
            Some(HOME_APPLET_TYPE) => ClientKind::HomeApplet,
            Some(APP_MENU_TYPE) | Some(STATUS_MENU_TYPE) => ClientKind::Menu,
            Some(STATUS_AREA_TYPE) => ClientKind::StatusArea,
            Some(DESKTOP_TYPE) => {
                if self.desktop_present {
                    warn!("Второй рабочий стол отклонён: {}", window);
                    return None;
                }
                self.desktop_present = true;
                ClientKind::Desktop
            }
            Some(NORMAL_TYPE) => ClientKind::App,
            Some(DIALOG_TYPE) => ClientKind::Dialog,
            Some(NOTIFICATION_TYPE) => ClientKind::Notification,
            _ => ClientKind::Passthrough,
        };

        debug!("{} классифицировано как {:?}", window, kind);
        Some(kind)
    }

    /// Освобождает место рабочего стола после его ухода
    pub fn release(&mut self, kind: ClientKind) {
        if kind == ClientKind::Desktop {
            self.desktop_present = false;
        }
    }
}
