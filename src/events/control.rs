use std::fmt;

use crate::services::comp_mgr::ClientId;

/// Запросы управления от переключателя задач и домашнего экрана.
///
/// Клиенты адресуются записью, а не окном: X-сервер переиспользует
/// идентификаторы окон, и окно спящего клиента может достаться новому.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    CloseClient(ClientId),
    HibernateClient(ClientId),
    HibernateAll,
    ShowSwitcher,
    /// Переключатель закрылся: выполнить отложенную перестановку стека
    HideSwitcher,
    Restack,
    RaiseHome,
    LowerHome,
}

impl fmt::Display for ControlRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlRequest::CloseClient(id) => write!(f, "CloseClient: {}", id),
            ControlRequest::HibernateClient(id) => write!(f, "HibernateClient: {}", id),
            other => write!(f, "{:?}", other),
        }
    }
}
