use tracing::trace;

use super::actor::{ActorHandle, ActorId};

/// Корневой контейнер сцены: порядок акторов снизу вверх
#[derive(Debug, Default)]
pub struct Stage {
    children: Vec<ActorHandle>,
    restacks: u64,
}

impl Stage {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, actor: &ActorHandle) -> Option<usize> {
        self.children.iter().position(|child| child.id() == actor.id())
    }

    pub fn contains(&self, actor: &ActorHandle) -> bool {
        self.position(actor).is_some()
    }

    /// Добавляет актор поверх остальных; повторное добавление игнорируется
    pub fn add_actor(&mut self, actor: &ActorHandle) {
        if !self.contains(actor) {
            self.children.push(actor.clone());
        }
    }

    pub fn remove_actor(&mut self, actor: &ActorHandle) -> bool {
        match self.position(actor) {
            Some(index) => {
                self.children.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn raise_top(&mut self, actor: &ActorHandle) {
        if let Some(index) = self.position(actor) {
            let child = self.children.remove(index);
            self.children.push(child);
        }
    }

    pub fn lower_bottom(&mut self, actor: &ActorHandle) {
        if let Some(index) = self.position(actor) {
            let child = self.children.remove(index);
            self.children.insert(0, child);
        }
    }

    /// Ставит `actor` непосредственно под `sibling`
    pub fn lower_below(&mut self, actor: &ActorHandle, sibling: &ActorHandle) {
        if actor.id() == sibling.id() {
            return;
        }
        let Some(index) = self.position(actor) else {
            return;
        };
        let child = self.children.remove(index);
        match self.position(sibling) {
            Some(target) => self.children.insert(target, child),
            None => self.children.insert(0, child),
        }
    }

    /// Переупорядочивает перечисленные акторы снизу вверх поверх остальных
    pub fn restack(&mut self, bottom_to_top: &[ActorHandle]) {
        for actor in bottom_to_top {
            self.raise_top(actor);
        }
        self.restacks += 1;
        trace!("Stage restack #{}: {:?}", self.restacks, self.order());
    }

    /// Сколько раз выполнялась полная перестановка
    #[cfg(test)]
    pub fn restack_count(&self) -> u64 {
        self.restacks
    }

    pub fn order(&self) -> Vec<ActorId> {
        self.children.iter().map(|child| child.id()).collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.children.len()
    }
}
