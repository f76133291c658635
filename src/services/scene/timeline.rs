use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::debug;

use super::actor::ActorHandle;
use crate::events::CompositorEvent;

/// Идентификатор запущенной анимации; завершение приходит с тем же id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(pub u64);

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "effect#{}", self.0)
    }
}

/// Кривая интерполяции
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Curve {
    /// Линейный рост 0 → 1
    RampInc,
    Sine,
}

impl Curve {
    pub fn alpha(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Curve::RampInc => t,
            Curve::Sine => (1.0 - (PI * t).cos()) / 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleEffect {
    pub from: (f64, f64),
    pub to: (f64, f64),
    pub duration: Duration,
    pub curve: Curve,
}

impl ScaleEffect {
    pub fn sample(&self, t: f64) -> (f64, f64) {
        let alpha = self.curve.alpha(t);
        if alpha >= 1.0 {
            return self.to;
        }
        (
            self.from.0 + (self.to.0 - self.from.0) * alpha,
            self.from.1 + (self.to.1 - self.from.1) * alpha,
        )
    }
}

/// Запуск анимаций. Возврат немедленный, завершение доставляется позже
/// как `CompositorEvent::EffectCompleted` в очередь цикла событий.
pub trait Animator: Send {
    fn start_scale(&mut self, actor: ActorHandle, effect: ScaleEffect) -> EffectId;
}

/// Таймлайны на задачах tokio
pub struct TokioAnimator {
    events: UnboundedSender<CompositorEvent>,
    frame_interval: Duration,
    next_id: u64,
}

impl TokioAnimator {
    pub fn new(events: UnboundedSender<CompositorEvent>, frame_interval: Duration) -> Self {
        Self {
            events,
            frame_interval,
            next_id: 1,
        }
    }
}

impl Animator for TokioAnimator {
    fn start_scale(&mut self, actor: ActorHandle, effect: ScaleEffect) -> EffectId {
        let id = EffectId(self.next_id);
        self.next_id += 1;

        let events = self.events.clone();
        let frame_interval = self.frame_interval;

        debug!("Запуск {} для {} ({:?})", id, actor, effect);

        tokio::spawn(async move {
            let start = Instant::now();
            let total = effect.duration.as_secs_f64();
            let mut ticker = interval(frame_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let t = if total > 0.0 {
                    (start.elapsed().as_secs_f64() / total).min(1.0)
                } else {
                    1.0
                };
                let (sx, sy) = effect.sample(t);
                actor.set_scale(sx, sy);
                if t >= 1.0 {
                    break;
                }
            }

            // Собственная ссылка таймлайна на актор освобождается до уведомления
            drop(actor);

            if events.send(CompositorEvent::EffectCompleted(id)).is_err() {
                debug!("Очередь событий закрыта, завершение {} потеряно", id);
            }
        });

        id
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::scene::Actor;
    use kurbo::Rect;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    #[test]
    fn test_curve_endpoints() {
        for curve in [Curve::RampInc, Curve::Sine] {
            assert_eq!(curve.alpha(0.0), 0.0);
            assert!((curve.alpha(1.0) - 1.0).abs() < 1e-9);
            assert_eq!(curve.alpha(2.0), curve.alpha(1.0));
        }
        assert_eq!(Curve::RampInc.alpha(0.25), 0.25);
        assert!((Curve::Sine.alpha(0.5) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_scale_sample() {
        let effect = ScaleEffect {
            from: (1.0, 1.0),
            to: (0.1, 0.1),
            duration: Duration::from_millis(200),
            curve: Curve::RampInc,
        };
        let (sx, sy) = effect.sample(0.5);
        assert!((sx - 0.55).abs() < 1e-9);
        assert!((sy - 0.55).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_animator_completes_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut animator = TokioAnimator::new(tx, Duration::from_millis(16));
        let actor = Actor::new("app", Rect::new(0.0, 0.0, 100.0, 100.0));

        let id = animator.start_scale(
            actor.clone(),
            ScaleEffect {
                from: (1.0, 1.0),
                to: (0.1, 0.1),
                duration: Duration::from_millis(200),
                curve: Curve::RampInc,
            },
        );

        let event = rx.recv().await;
        assert_eq!(event, Some(CompositorEvent::EffectCompleted(id)));
        assert_eq!(actor.scale(), (0.1, 0.1));
        // Таймлайн больше не держит актор
        assert_eq!(Arc::strong_count(&actor), 1);

        drop(animator);
        assert_eq!(rx.recv().await, None);
    }
}
