use smallvec::SmallVec;

use super::client::{ClientId, ClientRef};
use crate::events::WindowId;
use crate::services::scene::ActorHandle;

/// Снимок стека: на телефоне окон обычно немного
pub type StackSnapshot = SmallVec<[ClientRef; 16]>;

/// Клиенты с живыми окнами, снизу вверх. Элемент стека является собственной
/// ссылкой окна-клиента на запись.
#[derive(Debug, Default)]
pub struct WindowStack {
    entries: Vec<ClientRef>,
}

impl WindowStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, client: ClientRef) {
        self.entries.push(client);
    }

    pub fn remove(&mut self, window: WindowId) -> Option<ClientRef> {
        let index = self.entries.iter().position(|c| c.window() == window)?;
        Some(self.entries.remove(index))
    }

    pub fn by_window(&self, window: WindowId) -> Option<&ClientRef> {
        self.entries.iter().find(|c| c.window() == window)
    }

    pub fn by_id(&self, id: ClientId) -> Option<&ClientRef> {
        self.entries.iter().find(|c| c.id() == id)
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.by_id(id).is_some()
    }

    /// Копия стека сверху вниз: по ней можно итерироваться, пока сам стек меняется
    pub fn snapshot_top_down(&self) -> StackSnapshot {
        self.entries.iter().rev().cloned().collect()
    }

    pub fn actors_bottom_up(&self) -> Vec<ActorHandle> {
        self.entries.iter().map(|c| c.actor().clone()).collect()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::WindowInfo;
    use crate::services::comp_mgr::{ClientKind, CompClient};
    use crate::services::scene::Actor;
    use kurbo::Rect;

    fn client(window: WindowId) -> ClientRef {
        CompClient::new(
            &WindowInfo::new(window, format!("w{}", window)),
            ClientKind::App,
            Actor::new("a", Rect::ZERO),
            false,
        )
    }

    #[test]
    fn test_snapshot_is_top_down_and_detached() {
        let mut stack = WindowStack::new();
        stack.push(client(1));
        stack.push(client(2));
        stack.push(client(3));

        let snapshot = stack.snapshot_top_down();
        let windows: Vec<WindowId> = snapshot.iter().map(|c| c.window()).collect();
        assert_eq!(windows, vec![3, 2, 1]);

        stack.remove(2);
        assert_eq!(snapshot.len(), 3);
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn test_remove_missing_window() {
        let mut stack = WindowStack::new();
        stack.push(client(1));
        assert!(stack.remove(9).is_none());
        assert!(stack.by_window(1).is_some());
    }
}
