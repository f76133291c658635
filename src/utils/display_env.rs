use std::env;
use tracing::{info, warn};

use crate::comp_error;
use crate::error::Result;

/// Проверить окружение перед подключением к X-серверу
pub fn check_display_env() -> Result<()> {
    info!("Проверка окружения дисплея...");

    let name = env::var("DISPLAY").map_err(|_| {
        comp_error!(
            service_unavailable,
            "Переменная DISPLAY не задана. Запустите внутри X-сессии или с --dry-run"
        )
    })?;
    check_display_name(&name)?;

    if env::var_os("WAYLAND_DISPLAY").is_some() {
        warn!("Обнаружена Wayland-сессия, композитор будет работать через XWayland");
    }

    info!("Дисплей {} доступен для подключения", name);
    Ok(())
}

/// Имя дисплея в форме `[host]:N[.S]`
fn check_display_name(value: &str) -> Result<()> {
    let Some((_, number)) = value.rsplit_once(':') else {
        return Err(comp_error!(
            service_unavailable,
            "Некорректное значение DISPLAY: {:?}",
            value
        ));
    };

    let number = number.split('.').next().unwrap_or_default();
    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
        return Err(comp_error!(
            service_unavailable,
            "Некорректный номер дисплея в {:?}",
            value
        ));
    }

    Ok(())
}
