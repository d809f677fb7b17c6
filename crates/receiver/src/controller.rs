//! Loop de controle do cliente.
//!
//! Um único dono para codec, watchdog, pinos e display: a thread de leitura
//! só entrega bytes, e tudo que muda estado acontece em [`Controller::tick`].

use crate::link::LineSource;
use crate::pins::{Latched, OutputPin};
use crate::screen::Screen;
use crate::surface::DrawSurface;
use chrono::FixedOffset;
use rpcooler_core::color::Palette;
use rpcooler_core::display::DisplayModel;
use rpcooler_core::protocol::{LineCodec, WireMessage};
use rpcooler_core::watchdog::{LinkMode, Watchdog};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

type Pin = Latched<Box<dyn OutputPin>>;

/// Saídas físicas do cliente.
pub struct Pins {
    pub cooler: Box<dyn OutputPin>,
    pub fault: Box<dyn OutputPin>,
    pub backlight: Box<dyn OutputPin>,
}

/// Display opcional (só faz sentido com telemetria).
pub struct Display {
    pub screen: Screen,
    pub surface: Box<dyn DrawSurface>,
    pub utc_offset: FixedOffset,
    pub palette: Palette,
}

impl Display {
    fn init(&mut self) {
        let palette = &self.palette;
        let result = self
            .screen
            .clear(self.surface.as_mut(), palette)
            .and_then(|()| self.screen.draw_labels(self.surface.as_mut(), palette));
        if let Err(e) = result {
            warn!("Falha ao inicializar o display: {e}");
        }
    }

    /// Desenha o snapshot e retorna se é horário noturno.
    fn render(&mut self, message: &WireMessage) -> Option<bool> {
        let snapshot = message.telemetry.as_ref()?;
        let model = DisplayModel::build(snapshot, message.cooler_state, self.utc_offset, &self.palette);
        if let Err(e) = self.screen.render(self.surface.as_mut(), &model, &self.palette) {
            warn!("Falha ao desenhar o display: {e}");
        }
        Some(model.night_mode)
    }

    fn no_link(&mut self) {
        if let Err(e) = self.screen.draw_no_link(self.surface.as_mut(), &self.palette) {
            warn!("Falha ao desenhar o aviso de enlace: {e}");
        }
    }
}

pub struct Controller<L: LineSource> {
    source: L,
    tick: Duration,
    codec: Box<dyn LineCodec>,
    watchdog: Watchdog,
    cooler: Pin,
    fault: Pin,
    backlight: Pin,
    display: Option<Display>,
    last_mode: LinkMode,
}

impl<L: LineSource> Controller<L> {
    /// Cria o controlador e aplica o estado inicial: cooler e LED de falha
    /// desligados, backlight ligado.
    pub fn new(
        source: L,
        tick: Duration,
        codec: Box<dyn LineCodec>,
        watchdog: Watchdog,
        pins: Pins,
        mut display: Option<Display>,
    ) -> Self {
        let mut cooler = Latched::new("cooler", pins.cooler);
        let mut fault = Latched::new("fault", pins.fault);
        let mut backlight = Latched::new("backlight", pins.backlight);
        cooler.apply(false);
        fault.apply(false);
        backlight.apply(true);

        if let Some(display) = display.as_mut() {
            display.init();
        }

        Self {
            source,
            tick,
            codec,
            watchdog,
            cooler,
            fault,
            backlight,
            display,
            last_mode: LinkMode::Normal,
        }
    }

    #[cfg(test)]
    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    /// Uma iteração: espera até um tick por uma linha e atualiza as saídas.
    ///
    /// Cada iteração dura pelo menos um tick, então `N` ticks ociosos
    /// correspondem a `N × tick` de tempo real mesmo sob rajadas de lixo.
    pub fn tick(&mut self) -> LinkMode {
        let started = Instant::now();
        let mode = self.step();
        if let Some(rest) = self.tick.checked_sub(started.elapsed()) {
            std::thread::sleep(rest);
        }
        mode
    }

    fn step(&mut self) -> LinkMode {
        let message = self
            .source
            .poll_line(self.tick)
            .and_then(|line| match self.codec.decode(&line) {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!("Linha inválida ({} bytes): {e}", line.len());
                    None
                }
            });

        let outputs = match &message {
            Some(message) => {
                debug!("← cooler {}", message.cooler_state.label());
                self.watchdog.on_message(message.cooler_state)
            }
            None => self.watchdog.on_idle(),
        };
        self.cooler.apply(outputs.cooler);
        self.fault.apply(outputs.fault);

        let mode = self.watchdog.mode();
        self.log_transition(mode);

        if let Some(display) = self.display.as_mut() {
            if let Some(night) = message.as_ref().and_then(|m| display.render(m)) {
                self.backlight.apply(!night);
            }
            if mode == LinkMode::Emergency && self.last_mode == LinkMode::Normal {
                display.no_link();
            }
        }

        self.last_mode = mode;
        mode
    }

    fn log_transition(&self, mode: LinkMode) {
        match (self.last_mode, mode) {
            (LinkMode::Normal, LinkMode::Emergency) => warn!(
                "Sem mensagens há {} ticks: modo de emergência, cooler forçado em ON",
                self.watchdog.idle_ticks()
            ),
            (LinkMode::Emergency, LinkMode::Normal) => {
                info!("Enlace restabelecido, cooler {}", self.watchdog.last_decision().label())
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pins::testing::MemoryPin;
    use crate::surface::testing::RecordingSurface;
    use rpcooler_core::color::Rgb;
    use rpcooler_core::protocol::{ByteLineCodec, JsonLineCodec};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io;
    use std::rc::Rc;

    /// Entrega uma linha por tick; `None` = silêncio.
    struct Scripted(VecDeque<Option<Vec<u8>>>);

    impl LineSource for Scripted {
        fn poll_line(&mut self, _timeout: Duration) -> Option<Vec<u8>> {
            self.0.pop_front().flatten()
        }
    }

    #[derive(Clone, Default)]
    struct SharedSurface(Rc<RefCell<RecordingSurface>>);

    impl DrawSurface for SharedSurface {
        fn text(&mut self, x: u16, y: u16, text: &str, fg: Rgb, bg: Rgb) -> io::Result<()> {
            self.0.borrow_mut().text(x, y, text, fg, bg)
        }

        fn rect(&mut self, x: u16, y: u16, w: u16, h: u16, color: Rgb, filled: bool) -> io::Result<()> {
            self.0.borrow_mut().rect(x, y, w, h, color, filled)
        }
    }

    struct Rig {
        cooler: MemoryPin,
        fault: MemoryPin,
        backlight: MemoryPin,
        surface: SharedSurface,
    }

    fn controller(
        lines: Vec<Option<Vec<u8>>>,
        codec: Box<dyn LineCodec>,
        threshold: u32,
        with_display: bool,
    ) -> (Controller<Scripted>, Rig) {
        paced_controller(lines, codec, threshold, with_display, Duration::ZERO)
    }

    fn paced_controller(
        lines: Vec<Option<Vec<u8>>>,
        codec: Box<dyn LineCodec>,
        threshold: u32,
        with_display: bool,
        tick: Duration,
    ) -> (Controller<Scripted>, Rig) {
        let rig = Rig {
            cooler: MemoryPin::default(),
            fault: MemoryPin::default(),
            backlight: MemoryPin::default(),
            surface: SharedSurface::default(),
        };
        let display = with_display.then(|| Display {
            screen: Screen::default(),
            surface: Box::new(rig.surface.clone()),
            utc_offset: FixedOffset::east_opt(0).unwrap(),
            palette: Palette::default(),
        });
        let pins = Pins {
            cooler: Box::new(rig.cooler.clone()),
            fault: Box::new(rig.fault.clone()),
            backlight: Box::new(rig.backlight.clone()),
        };
        let controller = Controller::new(
            Scripted(lines.into()),
            tick,
            codec,
            Watchdog::new(threshold),
            pins,
            display,
        );
        (controller, rig)
    }

    fn byte(on: bool) -> Option<Vec<u8>> {
        Some(vec![u8::from(on), b'\n'])
    }

    fn json_line(body: &[u8]) -> Option<Vec<u8>> {
        let mut line = body.to_vec();
        line.push(b'\n');
        Some(line)
    }

    #[test]
    fn initial_outputs() {
        let (_c, rig) = controller(vec![], Box::new(ByteLineCodec), 10, false);
        assert_eq!(rig.cooler.last(), Some(false));
        assert_eq!(rig.fault.last(), Some(false));
        assert_eq!(rig.backlight.last(), Some(true));
    }

    #[test]
    fn silence_triggers_emergency_at_threshold() {
        let mut lines = vec![byte(false)];
        lines.extend(std::iter::repeat_n(None, 1000));
        let (mut c, rig) = controller(lines, Box::new(ByteLineCodec), 1000, false);

        assert_eq!(c.tick(), LinkMode::Normal);
        for _ in 0..999 {
            assert_eq!(c.tick(), LinkMode::Normal);
        }
        assert_eq!(rig.cooler.last(), Some(false));
        assert_eq!(rig.fault.last(), Some(false));

        assert_eq!(c.tick(), LinkMode::Emergency);
        assert_eq!(rig.cooler.last(), Some(true));
        assert_eq!(rig.fault.last(), Some(true));
    }

    #[test]
    fn malformed_lines_count_as_silence() {
        let lines = vec![
            byte(true),
            Some(b"lixo\n".to_vec()),
            Some(vec![0x07, b'\n']),
            Some(b"\n".to_vec()),
        ];
        let (mut c, rig) = controller(lines, Box::new(ByteLineCodec), 3, false);
        c.tick();
        c.tick();
        c.tick();
        assert_eq!(c.watchdog().idle_ticks(), 2);
        assert_eq!(c.tick(), LinkMode::Emergency);
        assert_eq!(rig.fault.last(), Some(true));
    }

    #[test]
    fn burst_of_bad_lines_still_takes_full_ticks() {
        let tick = Duration::from_millis(10);
        let lines = vec![Some(b"lixo\n".to_vec()); 20];
        let (mut c, rig) = paced_controller(lines, Box::new(ByteLineCodec), 20, false, tick);

        let start = Instant::now();
        for _ in 0..19 {
            assert_eq!(c.tick(), LinkMode::Normal);
        }
        assert_eq!(c.tick(), LinkMode::Emergency);
        assert!(start.elapsed() >= tick * 20);
        assert_eq!(rig.cooler.last(), Some(true));
    }

    #[test]
    fn valid_message_recovers_from_emergency() {
        let lines = vec![None, None, byte(false)];
        let (mut c, rig) = controller(lines, Box::new(ByteLineCodec), 2, false);
        c.tick();
        assert_eq!(c.tick(), LinkMode::Emergency);
        assert_eq!(rig.cooler.last(), Some(true));

        assert_eq!(c.tick(), LinkMode::Normal);
        assert_eq!(rig.cooler.last(), Some(false));
        assert_eq!(rig.fault.last(), Some(false));
        assert_eq!(*rig.fault.writes.borrow(), vec![false, true, false]);
    }

    #[test]
    fn emergency_overrides_last_off_decision() {
        let lines = vec![byte(false), None];
        let (mut c, rig) = controller(lines, Box::new(ByteLineCodec), 1, false);
        c.tick();
        assert_eq!(rig.cooler.last(), Some(false));
        c.tick();
        assert_eq!(rig.cooler.last(), Some(true));
    }

    #[test]
    fn telemetry_renders_and_drives_backlight() {
        // 22:00 UTC: noturno
        let night = br#"{"cooler_state":true,"cpu_temp":61.0,"timestamp":79200}"#;
        // 12:00 UTC
        let day = br#"{"cooler_state":false,"timestamp":43200}"#;
        let lines = vec![json_line(night), json_line(day)];
        let (mut c, rig) = controller(lines, Box::new(JsonLineCodec), 10, true);

        c.tick();
        assert_eq!(rig.cooler.last(), Some(true));
        assert_eq!(rig.backlight.last(), Some(false));
        assert!(rig.surface.0.borrow().texts().contains(&"22:00:00"));

        c.tick();
        assert_eq!(rig.cooler.last(), Some(false));
        assert_eq!(rig.backlight.last(), Some(true));
        assert!(rig.surface.0.borrow().texts().contains(&"12:00:00"));
    }

    #[test]
    fn banner_drawn_once_on_link_loss() {
        let (mut c, rig) = controller(vec![None, None, None], Box::new(JsonLineCodec), 1, true);
        c.tick();
        c.tick();
        c.tick();
        let banners = rig
            .surface
            .0
            .borrow()
            .texts()
            .into_iter()
            .filter(|t| *t == "NO LINK")
            .count();
        assert_eq!(banners, 1);
    }
}
