use thiserror::Error;

use crate::services::comp_mgr::ClientId;

#[derive(Error, Debug)]
pub enum CompError {
    #[error("Ошибка конфигурации: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("Не удалось подключиться к X-серверу: {0}")]
    X11Connect(#[from] x11rb::errors::ConnectError),

    #[error("Ошибка соединения с X-сервером: {0}")]
    X11Connection(#[from] x11rb::errors::ConnectionError),

    #[error("Ошибка ответа X-сервера: {0}")]
    X11Reply(#[from] x11rb::errors::ReplyError),

    #[error("Ошибка выделения X ресурса: {0}")]
    X11Id(#[from] x11rb::errors::ReplyOrIdError),

    #[error("Ошибка дисплейного сервера: {0}")]
    Display(String),

    #[error("Клиент не найден: {0}")]
    ClientNotFound(ClientId),

    #[error("Сервис недоступен: {0}")]
    ServiceUnavailable(String),

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

impl CompError {
    pub fn client_not_found<T>(id: ClientId) -> Result<T> {
        Err(CompError::ClientNotFound(id))
    }
}

pub type Result<T> = std::result::Result<T, CompError>;

// Удобные макросы для создания ошибок
#[macro_export]
macro_rules! comp_error {
    (display, $($arg:tt)*) => {
        $crate::error::CompError::Display(format!($($arg)*))
    };
    (service_unavailable, $($arg:tt)*) => {
        $crate::error::CompError::ServiceUnavailable(format!($($arg)*))
    };
    (internal, $($arg:tt)*) => {
        $crate::error::CompError::Internal(format!($($arg)*))
    };
}
