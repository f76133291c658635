use kurbo::{Rect, Size};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::composite::ConnectionExt as _;
use x11rb::protocol::shape::SK;
use x11rb::protocol::xfixes::ConnectionExt as _;
use x11rb::protocol::xproto::{
    Atom, AtomEnum, ChangeWindowAttributesAux, ClientMessageData, ClientMessageEvent,
    ConnectionExt as _, CreateWindowAux, EventMask, Rectangle, Window, WindowClass,
    CLIENT_MESSAGE_EVENT,
};
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;
use x11rb::{COPY_FROM_PARENT, CURRENT_TIME, NONE};

use super::{DisplayServer, InputEvent, RegionId, ShapeKind};
use crate::comp_error;
use crate::error::Result;
use crate::events::{CompositorEvent, WindowEvent, WindowGeometry, WindowId, WindowInfo};
use crate::services::event_source::EventSource;

const PUMP_IDLE: Duration = Duration::from_millis(5);

fn intern(conn: &RustConnection, name: &str, only_if_exists: bool) -> Result<Atom> {
    Ok(conn.intern_atom(only_if_exists, name.as_bytes())?.reply()?.atom)
}

fn to_rectangle(rect: &Rect) -> Rectangle {
    let rect = rect.round();
    Rectangle {
        x: rect.x0 as i16,
        y: rect.y0 as i16,
        width: rect.width() as u16,
        height: rect.height() as u16,
    }
}

fn event_mask(events: &[InputEvent]) -> EventMask {
    events
        .iter()
        .fold(EventMask::NO_EVENT, |mask, event| {
            mask | match event {
                InputEvent::FocusChange => EventMask::FOCUS_CHANGE,
                InputEvent::Exposure => EventMask::EXPOSURE,
                InputEvent::PropertyChange => EventMask::PROPERTY_CHANGE,
                InputEvent::ButtonPress => EventMask::BUTTON_PRESS,
                InputEvent::ButtonRelease => EventMask::BUTTON_RELEASE,
                InputEvent::KeyPress => EventMask::KEY_PRESS,
                InputEvent::KeyRelease => EventMask::KEY_RELEASE,
            }
        })
}

/// Дисплей поверх X11: composite overlay, регионы xfixes, формы окон
pub struct X11Display {
    conn: Arc<RustConnection>,
    screen_size: Size,
    overlay: Window,
    stage: Window,
    wm_protocols: Atom,
    wm_delete_window: Atom,
    atoms: HashMap<String, Atom>,
}

impl X11Display {
    pub fn connect(events: UnboundedSender<CompositorEvent>) -> Result<(Self, X11EventPump)> {
        let (conn, screen_num) = x11rb::connect(None)?;
        let conn = Arc::new(conn);

        let screen = &conn.setup().roots[screen_num];
        let root = screen.root;
        let (width, height) = (screen.width_in_pixels, screen.height_in_pixels);
        info!("Подключено к X-серверу, экран {}: {}x{}", screen_num, width, height);

        let composite = conn.composite_query_version(0, 4)?.reply()?;
        info!(
            "Composite extension v{}.{}",
            composite.major_version, composite.minor_version
        );
        let xfixes = conn.xfixes_query_version(5, 0)?.reply()?;
        info!(
            "XFixes extension v{}.{}",
            xfixes.major_version, xfixes.minor_version
        );

        let wm_protocols = intern(&conn, "WM_PROTOCOLS", false)?;
        let wm_delete_window = intern(&conn, "WM_DELETE_WINDOW", false)?;
        let net_wm_window_type = intern(&conn, "_NET_WM_WINDOW_TYPE", false)?;

        let overlay = conn.composite_get_overlay_window(root)?.reply()?.overlay_win;

        // Окно сцены живёт внутри оверлея и покрывает весь экран
        let stage = conn.generate_id()?;
        conn.create_window(
            COPY_FROM_PARENT as u8,
            stage,
            overlay,
            0,
            0,
            width,
            height,
            0,
            WindowClass::INPUT_OUTPUT,
            COPY_FROM_PARENT,
            &CreateWindowAux::new(),
        )?;
        conn.map_window(stage)?;

        conn.change_window_attributes(
            root,
            &ChangeWindowAttributesAux::new().event_mask(EventMask::SUBSTRUCTURE_NOTIFY),
        )?;
        conn.flush()?;

        let pump = X11EventPump {
            conn: conn.clone(),
            events,
            own_windows: [overlay, stage],
            net_wm_window_type,
        };

        Ok((
            Self {
                conn,
                screen_size: Size::new(width as f64, height as f64),
                overlay,
                stage,
                wm_protocols,
                wm_delete_window,
                atoms: HashMap::new(),
            },
            pump,
        ))
    }

    fn atom(&mut self, name: &str) -> Result<Atom> {
        if let Some(atom) = self.atoms.get(name) {
            return Ok(*atom);
        }
        let atom = intern(&self.conn, name, true)?;
        // NONE не кэшируем: атом может появиться позже
        if atom != NONE {
            self.atoms.insert(name.to_string(), atom);
        }
        Ok(atom)
    }
}

impl DisplayServer for X11Display {
    fn screen_size(&self) -> Size {
        self.screen_size
    }

    fn overlay_window(&mut self) -> Result<WindowId> {
        Ok(self.overlay)
    }

    fn stage_window(&self) -> WindowId {
        self.stage
    }

    fn select_input(&mut self, window: WindowId, events: &[InputEvent]) -> Result<()> {
        self.conn
            .change_window_attributes(
                window,
                &ChangeWindowAttributesAux::new().event_mask(event_mask(events)),
            )?
            .check()?;
        Ok(())
    }

    fn create_region(&mut self, rects: &[Rect]) -> Result<RegionId> {
        let region = self.conn.generate_id()?;
        let rectangles: Vec<Rectangle> = rects.iter().map(to_rectangle).collect();
        self.conn.xfixes_create_region(region, &rectangles)?.check()?;
        Ok(region)
    }

    fn set_window_shape_region(
        &mut self,
        window: WindowId,
        kind: ShapeKind,
        region: Option<RegionId>,
    ) -> Result<()> {
        let kind = match kind {
            ShapeKind::Bounding => SK::BOUNDING,
            ShapeKind::Input => SK::INPUT,
        };
        self.conn
            .xfixes_set_window_shape_region(window, kind, 0, 0, region.unwrap_or(NONE))?
            .check()?;
        Ok(())
    }

    fn destroy_region(&mut self, region: RegionId) -> Result<()> {
        self.conn.xfixes_destroy_region(region)?.check()?;
        Ok(())
    }

    fn has_property(&mut self, window: WindowId, name: &str) -> bool {
        let atom = match self.atom(name) {
            Ok(atom) if atom != NONE => atom,
            Ok(_) => return false,
            Err(e) => {
                debug!("Не удалось получить атом {}: {}", name, e);
                return false;
            }
        };

        let reply = self
            .conn
            .get_property(false, window, atom, AtomEnum::ANY, 0, 0)
            .map_err(crate::error::CompError::from)
            .and_then(|cookie| cookie.reply().map_err(crate::error::CompError::from));

        match reply {
            Ok(reply) => reply.type_ != NONE,
            Err(e) => {
                debug!("Свойство {} окна 0x{:x} недоступно: {}", name, window, e);
                false
            }
        }
    }

    fn deliver_delete(&mut self, window: WindowId) -> Result<()> {
        let event = ClientMessageEvent {
            response_type: CLIENT_MESSAGE_EVENT,
            format: 32,
            sequence: 0,
            window,
            type_: self.wm_protocols,
            data: ClientMessageData::from([self.wm_delete_window, CURRENT_TIME, 0, 0, 0]),
        };

        self.conn
            .send_event(false, window, EventMask::NO_EVENT, event)?;
        self.conn.flush()?;
        debug!("WM_DELETE_WINDOW отправлен окну 0x{:x}", window);
        Ok(())
    }
}

/// Переводит события подструктуры корневого окна в события композитора
pub struct X11EventPump {
    conn: Arc<RustConnection>,
    events: UnboundedSender<CompositorEvent>,
    own_windows: [Window; 2],
    net_wm_window_type: Atom,
}

impl X11EventPump {
    fn describe(&self, window: Window, override_redirect: bool) -> WindowInfo {
        let mut info = WindowInfo::new(window, self.window_name(window).unwrap_or_default())
            .with_override_redirect(override_redirect);

        match self.window_type(window) {
            Ok(Some(net_type)) => info = info.with_type(net_type),
            Ok(None) => {}
            Err(e) => debug!("Тип окна 0x{:x} не прочитан: {}", window, e),
        }

        match self.conn.get_geometry(window).map_err(crate::error::CompError::from) {
            Ok(cookie) => match cookie.reply() {
                Ok(geometry) => {
                    info = info.with_geometry(WindowGeometry::new(
                        geometry.x as i32,
                        geometry.y as i32,
                        geometry.width as u32,
                        geometry.height as u32,
                    ))
                }
                Err(e) => debug!("Геометрия окна 0x{:x} недоступна: {}", window, e),
            },
            Err(e) => debug!("Геометрия окна 0x{:x} недоступна: {}", window, e),
        }

        info
    }

    fn window_name(&self, window: Window) -> Result<String> {
        let reply = self
            .conn
            .get_property(false, window, AtomEnum::WM_NAME, AtomEnum::STRING, 0, 256)?
            .reply()?;
        Ok(String::from_utf8_lossy(&reply.value).into_owned())
    }

    fn window_type(&self, window: Window) -> Result<Option<String>> {
        let reply = self
            .conn
            .get_property(false, window, self.net_wm_window_type, AtomEnum::ATOM, 0, 1)?
            .reply()?;
        let Some(atom) = reply.value32().and_then(|mut atoms| atoms.next()) else {
            return Ok(None);
        };
        let name = self.conn.get_atom_name(atom)?.reply()?.name;
        Ok(Some(String::from_utf8_lossy(&name).into_owned()))
    }

    fn pump_blocking(&self) -> Result<()> {
        loop {
            let Some(event) = self.conn.poll_for_event()? else {
                // Цикл композитора завершился: выходим, а не ждём следующего события X
                if self.events.is_closed() {
                    info!("Очередь событий закрыта, X11 pump останавливается");
                    return Ok(());
                }
                std::thread::sleep(PUMP_IDLE);
                continue;
            };

            let event = match event {
                Event::MapNotify(e) if !self.own_windows.contains(&e.window) => {
                    WindowEvent::Mapped(self.describe(e.window, e.override_redirect))
                }
                Event::UnmapNotify(e) if !self.own_windows.contains(&e.window) => {
                    WindowEvent::Unmapped(e.window)
                }
                Event::DestroyNotify(e) => WindowEvent::Destroyed(e.window),
                Event::Error(e) => {
                    warn!("Асинхронная ошибка X: {:?}", e);
                    continue;
                }
                _ => continue,
            };

            if self.events.send(CompositorEvent::Window(event)).is_err() {
                info!("Очередь событий закрыта, X11 pump останавливается");
                return Ok(());
            }
        }
    }
}

#[async_trait::async_trait]
impl EventSource for X11EventPump {
    async fn run(self: Box<Self>) -> Result<()> {
        info!("X11 pump запущен");
        tokio::task::spawn_blocking(move || self.pump_blocking())
            .await
            .map_err(|e| comp_error!(internal, "X11 pump аварийно завершился: {}", e))?
    }
}
