//! # RPCooler Client
//!
//! Lê as decisões do host pela serial, aciona o relé do cooler e mantém o
//! fail-safe: sem mensagens válidas por tempo demais, cooler e LED de falha
//! ficam ligados até o enlace voltar.
//!
//! No modo telemetria também desenha o display de status (no terminal, via
//! ANSI) e apaga o backlight à noite.
//!
//! ## Uso
//! ```bash
//! rpcooler-client                          # lê de stdin
//! INPUT_PATH=/dev/ttyGS0 rpcooler-client   # lê do gadget serial
//! ```
//!
//! Depois de iniciado o cliente nunca sai por erro de enlace: falhas de
//! leitura viram silêncio e o watchdog cuida do resto.

mod controller;
mod link;
mod pins;
mod screen;
mod surface;

use controller::{Controller, Display, Pins};
use link::{ChannelLineSource, Input};
use pins::open_pin;
use rpcooler_core::config::{AppConfig, ConfigError};
use rpcooler_core::protocol::{ProtocolMode, codec_for};
use rpcooler_core::watchdog::{Watchdog, ticks_for};
use screen::Screen;
use std::io;
use std::process::ExitCode;
use surface::AnsiSurface;
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Configuração inválida: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    #[error("Falha ao iniciar a leitura da serial: {0}")]
    Reader(#[source] io::Error),
}

fn main() -> ExitCode {
    // ── Logging (stderr: stdout fica com o display) ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), ClientError> {
    // ── Carregar config ──
    let config = AppConfig::load_from_system()?;
    let errors = config.receiver.validate();
    if !errors.is_empty() {
        return Err(ClientError::InvalidConfig(errors));
    }
    let cfg = &config.receiver;
    let utc_offset = cfg
        .utc_offset()
        .ok_or_else(|| ClientError::InvalidConfig(vec!["UTC_OFFSET_HOURS fora da faixa".into()]))?;

    // ── Watchdog ──
    let tick = cfg.tick();
    let threshold = ticks_for(cfg.emergency_after(), tick);

    // ── Pinos ──
    let pins = Pins {
        cooler: open_pin("cooler", cfg.cooler_pin),
        fault: open_pin("fault", cfg.fault_led_pin),
        backlight: open_pin("backlight", cfg.backlight_pin),
    };

    // ── Display ──
    let display = (cfg.display && cfg.protocol == ProtocolMode::Telemetry).then(|| Display {
        screen: Screen::default(),
        surface: Box::new(AnsiSurface::new(io::stdout())),
        utc_offset,
        palette: cfg.palette,
    });

    // ── Thread de leitura ──
    let input = Input::from_config(&cfg.input_path, cfg.serial_baud);
    let source = ChannelLineSource::spawn(input.clone()).map_err(ClientError::Reader)?;

    // ── Banner ──
    info!("══════════════════════════════════════════════");
    info!("   ❄ RPCOOLER CLIENT – ATIVO");
    info!("══════════════════════════════════════════════");
    match &input {
        Input::Stdin => info!("  Entrada:    stdin"),
        Input::Device { path, baud } => info!("  Entrada:    {} @ {baud} baud", path.display()),
    }
    info!("  Protocolo:  {:?}", cfg.protocol);
    info!("  Tick:       {} ms", cfg.read_timeout_ms);
    info!(
        "  Emergência: {} s sem mensagens ({threshold} ticks)",
        cfg.emergency_after_secs
    );
    info!("══════════════════════════════════════════════");

    let mut controller = Controller::new(
        source,
        tick,
        codec_for(cfg.protocol),
        Watchdog::new(threshold),
        pins,
        display,
    );

    // ── Loop principal ──
    loop {
        controller.tick();
    }
}
