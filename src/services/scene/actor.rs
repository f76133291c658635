use kurbo::{Point, Rect, Size, Vec2};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::services::comp_mgr::ClientId;

static NEXT_ACTOR_ID: AtomicU64 = AtomicU64::new(1);

pub type ActorId = u64;

/// Разделяемый дескриптор актора. Каждый клон является отдельной ссылкой:
/// актор живёт, пока жив хотя бы один держатель.
pub type ActorHandle = Arc<Actor>;

/// Точка привязки относительно размеров актора
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gravity {
    NorthWest,
    Center,
}

#[derive(Debug, Clone)]
struct ActorState {
    /// Положение точки привязки в координатах родителя
    position: Point,
    size: Size,
    anchor: Point,
    scale: (f64, f64),
    /// Обратная ссылка на запись клиента
    tag: Option<ClientId>,
}

/// Визуальное представление окна в графе сцены
pub struct Actor {
    id: ActorId,
    name: String,
    state: Mutex<ActorState>,
}

impl Actor {
    pub fn new(name: impl Into<String>, geometry: Rect) -> ActorHandle {
        Arc::new(Self {
            id: NEXT_ACTOR_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            state: Mutex::new(ActorState {
                position: geometry.origin(),
                size: geometry.size(),
                anchor: Point::ZERO,
                scale: (1.0, 1.0),
                tag: None,
            }),
        })
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Видимый прямоугольник с учётом точки привязки и масштаба
    #[cfg(test)]
    pub fn geometry(&self) -> Rect {
        let state = self.state.lock();
        let (sx, sy) = state.scale;
        let origin = state.position - Vec2::new(state.anchor.x * sx, state.anchor.y * sy);
        Rect::from_origin_size(
            origin,
            Size::new(state.size.width * sx, state.size.height * sy),
        )
    }

    pub fn set_size(&self, size: Size) {
        self.state.lock().size = size;
    }

    pub fn scale(&self) -> (f64, f64) {
        self.state.lock().scale
    }

    pub fn set_scale(&self, scale_x: f64, scale_y: f64) {
        self.state.lock().scale = (scale_x, scale_y);
    }

    #[cfg(test)]
    pub fn anchor_point(&self) -> Point {
        self.state.lock().anchor
    }

    /// Переносит точку привязки, не сдвигая актор на экране
    pub fn move_anchor_point_from_gravity(&self, gravity: Gravity) {
        let mut state = self.state.lock();
        let anchor = match gravity {
            Gravity::NorthWest => Point::ZERO,
            Gravity::Center => Point::new(state.size.width / 2.0, state.size.height / 2.0),
        };
        let (sx, sy) = state.scale;
        let delta = anchor - state.anchor;
        state.position += Vec2::new(delta.x * sx, delta.y * sy);
        state.anchor = anchor;
    }

    pub fn set_tag(&self, tag: Option<ClientId>) {
        self.state.lock().tag = tag;
    }

    pub fn tag(&self) -> Option<ClientId> {
        self.state.lock().tag
    }
}

impl fmt::Debug for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Actor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &*self.state.lock())
            .finish()
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor#{} \"{}\"", self.id, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_ids_are_unique() {
        let a = Actor::new("a", Rect::new(0.0, 0.0, 10.0, 10.0));
        let b = Actor::new("b", Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_center_anchor_keeps_geometry() {
        let actor = Actor::new("app", Rect::new(0.0, 56.0, 800.0, 480.0));
        let before = actor.geometry();

        actor.move_anchor_point_from_gravity(Gravity::Center);

        assert_eq!(actor.anchor_point(), Point::new(400.0, 212.0));
        assert_eq!(actor.geometry(), before);
    }

    #[test]
    fn test_scale_shrinks_around_center() {
        let actor = Actor::new("app", Rect::new(0.0, 0.0, 100.0, 100.0));
        actor.move_anchor_point_from_gravity(Gravity::Center);
        actor.set_scale(0.5, 0.5);

        assert_eq!(actor.geometry(), Rect::new(25.0, 25.0, 75.0, 75.0));
    }

    #[test]
    fn test_tag_round_trip() {
        let actor = Actor::new("app", Rect::ZERO);
        assert_eq!(actor.tag(), None);
        actor.set_tag(Some(ClientId::new(3)));
        assert_eq!(actor.tag(), Some(ClientId::new(3)));
        actor.set_tag(None);
        assert_eq!(actor.tag(), None);
    }
}
