pub mod comp_mgr;
pub mod dispatcher;
pub mod display;
pub mod event_source;
pub mod scenario;
pub mod scene;
pub mod session;
pub mod switcher;

pub use comp_mgr::CompMgr;
pub use display::{create_display, DisplayBackend};
pub use event_source::EventSource;
pub use scenario::DryRunScenario;
pub use session::Session;
pub use switcher::TaskSwitcher;
