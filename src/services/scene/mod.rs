//! Минимальный граф сцены: акторы, корневой контейнер и таймлайны.
//!
//! Отрисовка сюда не входит: композитор только переставляет акторы,
//! меняет их масштаб и точку привязки и запускает анимации.

mod actor;
mod stage;
mod timeline;

pub use actor::{Actor, ActorHandle, ActorId, Gravity};
pub use stage::Stage;
pub use timeline::{Animator, Curve, EffectId, ScaleEffect, TokioAnimator};

#[cfg(test)]
pub(crate) use timeline::testing::RecordingAnimator;
