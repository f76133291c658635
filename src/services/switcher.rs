use kurbo::Rect;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::services::comp_mgr::ClientId;
#[cfg(test)]
use crate::services::scene::ActorId;
use crate::services::scene::{Actor, ActorHandle};

/// Переключатель задач в роли, нужной композитору: он заимствует акторы
/// окон приложений и сообщает, открыт ли он сейчас.
pub trait Switcher: Send {
    /// Корневая группа переключателя на сцене
    fn group(&self) -> ActorHandle;
    fn add_window_actor(&mut self, actor: &ActorHandle);
    fn remove_window_actor(&mut self, actor: &ActorHandle);
    fn is_showing_switcher(&self) -> bool;
    /// Прямоугольник кнопки-переключателя в координатах экрана
    fn button_geometry(&self) -> Rect;
}

#[derive(Debug)]
struct SwitcherState {
    actors: Vec<ActorHandle>,
    showing: bool,
    #[cfg(test)]
    removals: Vec<ActorId>,
}

/// Простая модель переключателя. Клоны разделяют состояние, поэтому
/// цикл событий может показывать/скрывать его, пока композитор
/// добавляет и убирает акторы.
#[derive(Debug, Clone)]
pub struct TaskSwitcher {
    group: ActorHandle,
    button: Rect,
    state: Arc<Mutex<SwitcherState>>,
}

impl TaskSwitcher {
    pub fn new(button: Rect) -> Self {
        Self {
            group: Actor::new("switcher", Rect::ZERO),
            button,
            state: Arc::new(Mutex::new(SwitcherState {
                actors: Vec::new(),
                showing: false,
                #[cfg(test)]
                removals: Vec::new(),
            })),
        }
    }

    pub fn show(&self) {
        info!("Переключатель задач открыт");
        self.state.lock().showing = true;
    }

    pub fn hide(&self) {
        info!("Переключатель задач закрыт");
        self.state.lock().showing = false;
    }

    /// Запись, на которую ссылается миниатюра с таким заголовком.
    /// Нажатие на миниатюру находит клиента через метку актора.
    pub fn client_named(&self, name: &str) -> Option<ClientId> {
        self.state
            .lock()
            .actors
            .iter()
            .find(|actor| actor.name() == name)
            .and_then(|actor| actor.tag())
    }

    #[cfg(test)]
    pub fn actor_ids(&self) -> Vec<ActorId> {
        self.state.lock().actors.iter().map(|a| a.id()).collect()
    }

    /// Сколько раз актор убирался из переключателя
    #[cfg(test)]
    pub fn removal_count(&self, actor: ActorId) -> usize {
        self.state
            .lock()
            .removals
            .iter()
            .filter(|id| **id == actor)
            .count()
    }
}

impl Switcher for TaskSwitcher {
    fn group(&self) -> ActorHandle {
        self.group.clone()
    }

    fn add_window_actor(&mut self, actor: &ActorHandle) {
        let mut state = self.state.lock();
        if state.actors.iter().any(|a| a.id() == actor.id()) {
            warn!("{} уже в переключателе", actor);
            return;
        }
        debug!("{} добавлен в переключатель", actor);
        state.actors.push(actor.clone());
    }

    fn remove_window_actor(&mut self, actor: &ActorHandle) {
        let mut state = self.state.lock();
        let before = state.actors.len();
        state.actors.retain(|a| a.id() != actor.id());
        if state.actors.len() == before {
            warn!("{} не найден в переключателе", actor);
            return;
        }
        debug!("{} убран из переключателя", actor);
        #[cfg(test)]
        state.removals.push(actor.id());
    }

    fn is_showing_switcher(&self) -> bool {
        self.state.lock().showing
    }

    fn button_geometry(&self) -> Rect {
        self.button
    }
}
