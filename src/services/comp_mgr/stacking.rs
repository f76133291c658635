use tracing::{debug, info};

use super::CompMgr;

/// Отложенная перестановка стека. Флаг, а не счётчик: сколько бы
/// запросов ни пришло при открытом переключателе, выполнится одна.
#[derive(Debug, Default)]
pub(super) struct StackSync {
    pending: bool,
}

impl StackSync {
    pub(super) fn defer(&mut self) {
        self.pending = true;
    }

    pub(super) fn take_pending(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }

    pub(super) fn is_pending(&self) -> bool {
        self.pending
    }
}

impl CompMgr {
    /// Пересчитывает порядок акторов. Пока открыт переключатель, только
    /// помечает, что перестановка нужна.
    pub fn restack(&mut self) {
        if self.switcher.is_showing_switcher() {
            if !self.stacking.is_pending() {
                debug!("Переключатель открыт, перестановка отложена");
            }
            self.stacking.defer();
            return;
        }

        self.apply_default_stacking();
    }

    /// Вызывается переключателем при закрытии
    pub fn sync_stacking(&mut self) {
        if self.stacking.take_pending() {
            info!("Выполнение отложенной перестановки");
            self.apply_default_stacking();
        }
    }

    #[cfg(test)]
    pub fn restack_pending(&self) -> bool {
        self.stacking.is_pending()
    }

    fn apply_default_stacking(&mut self) {
        let group = self.switcher.group();
        let actors = self.stack.actors_bottom_up();

        self.stage.restack(&actors);
        self.stage.raise_top(&group);

        if self.showing_home {
            self.stage.lower_below(&self.home, &group);
        } else {
            self.stage.lower_bottom(&self.home);
        }

        crate::trace_if_enabled!("Порядок сцены: {:?}", self.stage.order());
    }

    /// Домашний экран прямо под группой переключателя
    pub fn raise_home_actor(&mut self) {
        let group = self.switcher.group();
        self.stage.lower_below(&self.home, &group);
        self.showing_home = true;
        debug!("Домашний экран поднят");
    }

    /// Домашний экран под всеми акторами
    pub fn lower_home_actor(&mut self) {
        self.stage.lower_bottom(&self.home);
        self.showing_home = false;
        debug!("Домашний экран опущен");
    }

    #[cfg(test)]
    pub fn is_showing_home(&self) -> bool {
        self.showing_home
    }
}
