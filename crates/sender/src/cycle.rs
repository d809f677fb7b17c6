//! Um ciclo de controle do host: coleta → decisão → linha → serial → status.

use crate::link::SerialLink;
use crate::monitor::MetricsSource;
use rpcooler_core::decision::DecisionEngine;
use rpcooler_core::protocol::{JsonLineCodec, LineCodec, ProtocolError, WireMessage};
use rpcooler_core::types::{ActuationDecision, MetricsSnapshot};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{debug, warn};

const ANSI_GREEN: &str = "\x1b[92m";
const ANSI_RED: &str = "\x1b[91m";
const ANSI_RESET: &str = "\x1b[0m";

/// Erros fatais do host.
#[derive(Debug, thiserror::Error)]
pub enum SenderError {
    #[error("Falha ao abrir a serial {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: serialport::Error,
    },

    #[error("Falha ao escrever na serial {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Falha ao codificar mensagem: {0}")]
    Encode(#[from] ProtocolError),

    #[error("Configuração inválida: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    #[error(transparent)]
    Config(#[from] rpcooler_core::config::ConfigError),
}

/// Resultado de um ciclo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Sent(ActuationDecision),
    /// Sem leitura de temperatura: nada foi enviado.
    Skipped,
}

/// Dono exclusivo do estado do host durante o loop.
pub struct Cycle<S: MetricsSource, W: Write> {
    source: S,
    engine: DecisionEngine,
    codec: Box<dyn LineCodec>,
    link: SerialLink<W>,
    live_status: bool,
}

impl<S: MetricsSource, W: Write> Cycle<S, W> {
    pub fn new(
        source: S,
        engine: DecisionEngine,
        codec: Box<dyn LineCodec>,
        link: SerialLink<W>,
        live_status: bool,
    ) -> Self {
        Self {
            source,
            engine,
            codec,
            link,
            live_status,
        }
    }

    pub fn run_once(&mut self) -> Result<CycleOutcome, SenderError> {
        let snapshot = self.source.collect();

        let Some(decision) = self.engine.evaluate_reading(snapshot.cpu_temp) else {
            warn!("Temperatura da CPU indisponível, ciclo sem envio");
            return Ok(CycleOutcome::Skipped);
        };

        let message = WireMessage::with_telemetry(decision, snapshot);
        let frame = self.codec.encode(&message)?;
        self.link.send(&frame).map_err(|source| SenderError::Write {
            path: self.link.path().to_path_buf(),
            source,
        })?;
        debug!("→ {} bytes, cooler {}", frame.len(), decision.label());

        if self.live_status {
            print_status(decision, message.telemetry.as_ref());
        }
        Ok(CycleOutcome::Sent(decision))
    }

    #[cfg(test)]
    pub fn into_link(self) -> SerialLink<W> {
        self.link
    }
}

/// `Cooler is ON | Metrics: {...}` com a cor do estado.
pub fn status_line(decision: ActuationDecision, snapshot: Option<&MetricsSnapshot>) -> String {
    let color = if decision.is_on() { ANSI_GREEN } else { ANSI_RED };
    let message = WireMessage {
        cooler_state: decision,
        telemetry: snapshot.cloned(),
    };
    let metrics = JsonLineCodec
        .encode(&message)
        .map(|frame| String::from_utf8_lossy(&frame).trim_end().to_string())
        .unwrap_or_default();
    format!(
        "Cooler is {color}{}{ANSI_RESET} | Metrics: {metrics}",
        decision.label()
    )
}

/// Sobrescreve a mesma linha do terminal.
fn print_status(decision: ActuationDecision, snapshot: Option<&MetricsSnapshot>) {
    let mut out = io::stdout().lock();
    let _ = write!(out, "\r{}", status_line(decision, snapshot));
    let _ = out.flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpcooler_core::protocol::{ByteLineCodec, codec_for};
    use std::collections::VecDeque;

    /// Fonte com temperaturas roteirizadas (None = sensor falhou).
    struct Scripted(VecDeque<Option<f64>>);

    impl MetricsSource for Scripted {
        fn collect(&mut self) -> MetricsSnapshot {
            MetricsSnapshot {
                cpu_temp: self.0.pop_front().flatten(),
                cpu_load: Some(5.0),
                ..Default::default()
            }
        }
    }

    /// Destino que sempre falha, como uma serial desconectada.
    struct Unplugged;

    impl Write for Unplugged {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn cycle(temps: &[Option<f64>], codec: Box<dyn LineCodec>) -> Cycle<Scripted, Vec<u8>> {
        Cycle::new(
            Scripted(temps.iter().copied().collect()),
            DecisionEngine::new(60.0, 2),
            codec,
            SerialLink::from_writer("mem", Vec::new()),
            false,
        )
    }

    #[test]
    fn hysteresis_sequence_reaches_the_wire() {
        let temps = [Some(55.0), Some(61.0), Some(55.0), Some(55.0), Some(55.0)];
        let mut c = cycle(&temps, Box::new(ByteLineCodec));
        let outcomes: Vec<_> = (0..5).map(|_| c.run_once().unwrap()).collect();

        use ActuationDecision::{Off, On};
        assert_eq!(
            outcomes,
            [Off, On, On, On, Off].map(CycleOutcome::Sent).to_vec()
        );
        assert_eq!(
            c.into_link().into_inner(),
            vec![0, b'\n', 1, b'\n', 1, b'\n', 1, b'\n', 0, b'\n']
        );
    }

    #[test]
    fn missing_temperature_skips_transmission() {
        let temps = [Some(61.0), None, Some(50.0)];
        let mut c = cycle(&temps, Box::new(ByteLineCodec));
        assert_eq!(c.run_once().unwrap(), CycleOutcome::Sent(ActuationDecision::On));
        assert_eq!(c.run_once().unwrap(), CycleOutcome::Skipped);
        // O hold continua de onde parou
        assert_eq!(c.run_once().unwrap(), CycleOutcome::Sent(ActuationDecision::On));
        assert_eq!(c.into_link().into_inner(), vec![1, b'\n', 1, b'\n']);
    }

    #[test]
    fn telemetry_frame_carries_metrics() {
        let mut c = cycle(&[Some(70.0)], codec_for(rpcooler_core::ProtocolMode::Telemetry));
        c.run_once().unwrap();
        let wire = String::from_utf8(c.into_link().into_inner()).unwrap();
        assert!(wire.ends_with('\n'));
        assert!(wire.contains(r#""cpu_temp":70.0"#), "{wire}");
        assert!(wire.contains(r#""cooler_state":true"#), "{wire}");
    }

    #[test]
    fn write_failure_is_fatal() {
        let mut c = Cycle::new(
            Scripted(VecDeque::from([Some(70.0)])),
            DecisionEngine::new(60.0, 0),
            Box::new(ByteLineCodec),
            SerialLink::from_writer("/dev/ttyACM0", Unplugged),
            false,
        );
        assert!(matches!(c.run_once(), Err(SenderError::Write { .. })));
    }

    #[test]
    fn status_line_format() {
        let line = status_line(ActuationDecision::Off, None);
        assert_eq!(
            line,
            "Cooler is \x1b[91mOFF\x1b[0m | Metrics: {\"cooler_state\":false}"
        );
    }
}
