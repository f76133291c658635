use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use kurbo::{Rect, Size};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::services::scene::Curve;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub logging: LoggingConfig,
    pub effects: EffectsConfig,
    pub hibernation: HibernationConfig,
    pub display: DisplayConfig,
    pub switcher: SwitcherConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub filter: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EffectsConfig {
    pub unmap_duration_ms: u64,
    /// Конечный масштаб актора в эффекте закрытия
    pub unmap_scale: f64,
    pub frame_interval_ms: u64,
    pub curve: Curve,
}

/// Имена свойства-маркера гибернации: основное и устаревший псевдоним
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HibernationConfig {
    pub property: String,
    pub alias: String,
}

/// Размер экрана для dry-run дисплея (реальный X-сервер сообщает свой)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
}

/// Прямоугольник кнопки переключателя задач
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SwitcherConfig {
    pub button_x: i32,
    pub button_y: i32,
    pub button_width: u32,
    pub button_height: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    pub scenario_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "compact".to_string(),
                filter: "hd_compositor=info".to_string(),
            },
            effects: EffectsConfig {
                unmap_duration_ms: 200,
                unmap_scale: 0.1,
                frame_interval_ms: 16,
                curve: Curve::RampInc,
            },
            hibernation: HibernationConfig {
                property: "_HILDON_APP_KILLABLE".to_string(),
                alias: "_HILDON_ABLE_TO_HIBERNATE".to_string(),
            },
            display: DisplayConfig {
                width: 800,
                height: 480,
            },
            switcher: SwitcherConfig {
                button_x: 0,
                button_y: 0,
                button_width: 112,
                button_height: 56,
            },
            session: SessionConfig {
                scenario_interval_ms: 1500,
            },
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        // Значения по умолчанию -> файл -> переменные окружения HDCM_SECTION__KEY
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("HDCM_").split("__"));

        let config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Валидация настроек логирования
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "compact" | "full" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        // Валидация эффектов
        if self.effects.unmap_duration_ms == 0 {
            anyhow::bail!("unmap_duration_ms должно быть больше 0");
        }

        if !(self.effects.unmap_scale > 0.0 && self.effects.unmap_scale < 1.0) {
            anyhow::bail!(
                "unmap_scale должно лежать в интервале (0, 1), получено {}",
                self.effects.unmap_scale
            );
        }

        if self.effects.frame_interval_ms == 0 {
            anyhow::bail!("frame_interval_ms должно быть больше 0");
        }

        // Валидация имён свойств гибернации
        if self.hibernation.property.is_empty() || self.hibernation.alias.is_empty() {
            anyhow::bail!("Имена свойств гибернации не могут быть пустыми");
        }

        if self.display.width == 0 || self.display.height == 0 {
            anyhow::bail!("Размер экрана не может быть нулевым");
        }

        if self.switcher.button_width == 0 || self.switcher.button_height == 0 {
            anyhow::bail!("Прямоугольник кнопки переключателя пуст");
        }

        if self.session.scenario_interval_ms < 100 {
            anyhow::bail!("scenario_interval_ms должно быть минимум 100");
        }

        Ok(())
    }

    pub fn unmap_duration(&self) -> Duration {
        Duration::from_millis(self.effects.unmap_duration_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.effects.frame_interval_ms)
    }

    pub fn screen_size(&self) -> Size {
        Size::new(self.display.width as f64, self.display.height as f64)
    }

    pub fn switcher_button(&self) -> Rect {
        let s = &self.switcher;
        Rect::new(
            s.button_x as f64,
            s.button_y as f64,
            s.button_x as f64 + s.button_width as f64,
            s.button_y as f64 + s.button_height as f64,
        )
    }
}
