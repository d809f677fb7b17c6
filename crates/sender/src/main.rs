//! # RPCooler Host
//!
//! Coleta métricas do host, decide se o cooler deve ligar e envia a decisão
//! (com ou sem telemetria) pela serial para o cliente que segura o relé.
//!
//! ## Uso
//! ```bash
//! rpcooler-host                                  # /etc/rpcooler.conf + /etc/rpcooler.toml
//! SERIAL_DEVICE_PATH=/dev/ttyUSB0 rpcooler-host  # override pontual
//! ```
//!
//! Qualquer falha na serial encerra o processo com código != 0; o restart
//! fica a cargo do supervisor (systemd, etc).

mod cycle;
mod link;
mod monitor;

use cycle::{Cycle, SenderError};
use link::SerialLink;
use monitor::HostMonitor;
use rpcooler_core::config::AppConfig;
use rpcooler_core::decision::DecisionEngine;
use rpcooler_core::protocol::codec_for;
use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info};

fn main() -> ExitCode {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), SenderError> {
    // ── Carregar config ──
    let config = AppConfig::load_from_system()?;
    let errors = config.sender.validate();
    if !errors.is_empty() {
        return Err(SenderError::InvalidConfig(errors));
    }

    let sender_cfg = &config.sender;
    let interval = sender_cfg.interval();
    let on_temp = sender_cfg
        .effective_on_temp()
        .ok_or_else(|| SenderError::InvalidConfig(vec!["COOLER_ON_TEMP ausente".into()]))?;

    // ── Serial ──
    let device_path = Path::new(&sender_cfg.serial_device_path);
    let link = SerialLink::open(device_path, sender_cfg.serial_baud).map_err(|source| SenderError::Open {
        path: device_path.to_path_buf(),
        source,
    })?;

    // ── Decisão ──
    let engine = DecisionEngine::new(on_temp as f64, sender_cfg.cooler_on_frames);

    // ── Host Monitor ──
    let monitor = HostMonitor::new(sender_cfg);
    info!("Host monitor inicializado");

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   ❄ RPCOOLER HOST – ATIVO");
    println!("══════════════════════════════════════════════");
    println!(
        "  Serial:    {} @ {} baud",
        sender_cfg.serial_device_path, sender_cfg.serial_baud
    );
    println!("  Intervalo: {} ms", sender_cfg.interval_ms);
    println!(
        "  Liga em:   > {}°C (+{} ciclos)",
        engine.on_threshold(),
        engine.hold_frames()
    );
    println!("  Protocolo: {:?}", sender_cfg.protocol);
    println!("══════════════════════════════════════════════");
    println!();

    let mut cycle = Cycle::new(
        monitor,
        engine,
        codec_for(sender_cfg.protocol),
        link,
        sender_cfg.live_status,
    );

    // ── Loop principal ──
    loop {
        let cycle_start = Instant::now();

        cycle.run_once()?;

        // Dormir pelo tempo restante do intervalo
        let elapsed = cycle_start.elapsed();
        if elapsed < interval {
            std::thread::sleep(interval - elapsed);
        }
    }
}
