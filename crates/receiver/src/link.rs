//! Thread de leitura da serial que entrega linhas completas ao loop de
//! controle via channel.
//!
//! O loop nunca lê o dispositivo diretamente: ele só espera no channel com
//! timeout de um tick, então o watchdog avança mesmo com silêncio total.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use rpcooler_core::protocol::{LINE_TERMINATOR, MAX_LINE_LEN};
use std::io::{self, BufRead, BufReader, Read};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Espera antes de tentar reabrir o dispositivo.
const REOPEN_DELAY: Duration = Duration::from_secs(2);

/// Timeout de cada leitura da porta; a linha parcial é mantida entre leituras.
const PORT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Maior leitura aceita por linha (conteúdo + `\r\n`).
const READ_LIMIT: u64 = MAX_LINE_LEN as u64 + 2;

/// Fonte de linhas consumida pelo controlador.
pub trait LineSource {
    /// Retorna a próxima linha ou `None` se nada chegou em `timeout`.
    /// Nunca bloqueia além de `timeout`.
    fn poll_line(&mut self, timeout: Duration) -> Option<Vec<u8>>;
}

/// De onde vêm os bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Stdin,
    Device { path: PathBuf, baud: u32 },
}

impl Input {
    /// Caminho vazio = stdin.
    pub fn from_config(path: &str, baud: u32) -> Self {
        if path.trim().is_empty() {
            Input::Stdin
        } else {
            Input::Device {
                path: PathBuf::from(path),
                baud,
            }
        }
    }
}

/// Como terminou uma sessão de leitura.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pump {
    /// Fim dos dados; o dispositivo pode ser reaberto.
    Eof,
    /// O controlador descartou o channel; não há para quem ler.
    Disconnected,
}

/// Lado do loop de controle: linhas recebidas pela thread de leitura.
pub struct ChannelLineSource {
    rx: Receiver<Vec<u8>>,
    disconnected: bool,
}

impl ChannelLineSource {
    pub fn new(rx: Receiver<Vec<u8>>) -> Self {
        Self {
            rx,
            disconnected: false,
        }
    }

    /// Inicia a thread de leitura e retorna a fonte ligada a ela.
    pub fn spawn(input: Input) -> io::Result<Self> {
        let (tx, rx) = bounded::<Vec<u8>>(64);

        std::thread::Builder::new()
            .name("serial-reader".into())
            .spawn(move || reader_loop(&tx, &input))?;

        Ok(Self::new(rx))
    }
}

impl LineSource for ChannelLineSource {
    fn poll_line(&mut self, timeout: Duration) -> Option<Vec<u8>> {
        if self.disconnected {
            return None;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(line) => Some(line),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                error!("Leitor da serial encerrado; seguindo só com o watchdog");
                self.disconnected = true;
                None
            }
        }
    }
}

fn reader_loop(tx: &Sender<Vec<u8>>, input: &Input) {
    match input {
        Input::Stdin => {
            info!("Lendo mensagens de stdin");
            let stdin = io::stdin();
            match pump_lines(stdin.lock(), tx) {
                Ok(Pump::Eof) => warn!("stdin encerrado"),
                Ok(Pump::Disconnected) => debug!("Controlador encerrado, leitura de stdin parada"),
                Err(e) => error!("Erro ao ler stdin: {e}"),
            }
        }
        Input::Device { path, baud } => loop {
            let port = serialport::new(path.to_string_lossy(), *baud)
                .timeout(PORT_READ_TIMEOUT)
                .open();
            match port {
                Ok(port) => {
                    info!("Lendo mensagens de {} ({baud} baud)", path.display());
                    match pump_lines(BufReader::new(port), tx) {
                        Ok(Pump::Eof) => warn!("Fim de dados em {}", path.display()),
                        Ok(Pump::Disconnected) => {
                            debug!("Controlador encerrado, fechando {}", path.display());
                            return;
                        }
                        Err(e) => warn!("Erro ao ler {}: {e}", path.display()),
                    }
                }
                Err(e) => {
                    error!(
                        "Falha ao abrir {}: {e}. Tentando novamente em {}s...",
                        path.display(),
                        REOPEN_DELAY.as_secs()
                    );
                }
            }
            std::thread::sleep(REOPEN_DELAY);
        },
    }
}

/// Timeout da porta: nada chegou ainda, a leitura continua.
fn is_quiet(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Descarta o resto de uma linha longa demais.
fn skip_line<R: BufRead>(reader: &mut R) -> io::Result<()> {
    loop {
        match reader.skip_until(LINE_TERMINATOR) {
            Ok(_) => return Ok(()),
            Err(e) if is_quiet(&e) => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Lê linhas até EOF e as envia pelo channel.
///
/// Timeouts da porta não interrompem a linha em andamento. Linhas maiores
/// que o limite são truncadas e o resto descartado; o decodificador as
/// rejeita como longas demais.
pub fn pump_lines<R: BufRead>(mut reader: R, tx: &Sender<Vec<u8>>) -> io::Result<Pump> {
    let mut line = Vec::new();
    loop {
        let room = READ_LIMIT - line.len() as u64;
        let n = match reader.by_ref().take(room).read_until(LINE_TERMINATOR, &mut line) {
            Ok(n) => n,
            Err(e) if is_quiet(&e) => continue,
            Err(e) => return Err(e),
        };
        if n == 0 && line.is_empty() {
            return Ok(Pump::Eof);
        }

        if line.last() != Some(&LINE_TERMINATOR) && line.len() as u64 == READ_LIMIT {
            skip_line(&mut reader)?;
            debug!("Linha longa demais, resto descartado");
        }

        if tx.send(std::mem::take(&mut line)).is_err() {
            return Ok(Pump::Disconnected);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::Cursor;
    use std::time::Instant;

    fn pump(bytes: &[u8]) -> Vec<Vec<u8>> {
        let (tx, rx) = bounded(64);
        assert_eq!(pump_lines(Cursor::new(bytes.to_vec()), &tx).unwrap(), Pump::Eof);
        drop(tx);
        rx.iter().collect()
    }

    /// Porta que entrega pedaços intercalados com timeouts.
    struct Choppy(VecDeque<Option<&'static [u8]>>);

    impl Read for Choppy {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                None => Ok(0),
                Some(None) => Err(io::ErrorKind::TimedOut.into()),
                Some(Some(chunk)) => {
                    buf[..chunk.len()].copy_from_slice(chunk);
                    Ok(chunk.len())
                }
            }
        }
    }

    #[test]
    fn splits_on_newline() {
        let lines = pump(b"{\"cooler_state\":true}\n\x01\n\x00\n");
        assert_eq!(
            lines,
            vec![
                b"{\"cooler_state\":true}\n".to_vec(),
                vec![0x01, b'\n'],
                vec![0x00, b'\n'],
            ]
        );
    }

    #[test]
    fn trailing_partial_line_is_delivered() {
        assert_eq!(pump(b"\x01\n\x00"), vec![vec![0x01, b'\n'], vec![0x00]]);
    }

    #[test]
    fn oversized_line_is_truncated_and_rest_skipped() {
        let mut bytes = vec![b'x'; MAX_LINE_LEN * 2];
        bytes.extend_from_slice(b"\n\x01\n");
        let lines = pump(&bytes);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len() as u64, READ_LIMIT);
        assert_eq!(lines[1], vec![0x01, b'\n']);
    }

    #[test]
    fn poll_times_out_without_data() {
        let (_tx, rx) = bounded::<Vec<u8>>(1);
        let mut source = ChannelLineSource::new(rx);
        let start = Instant::now();
        assert_eq!(source.poll_line(Duration::from_millis(20)), None);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn poll_returns_queued_line() {
        let (tx, rx) = bounded(1);
        tx.send(vec![0x01, b'\n']).unwrap();
        let mut source = ChannelLineSource::new(rx);
        assert_eq!(
            source.poll_line(Duration::from_millis(20)),
            Some(vec![0x01, b'\n'])
        );
    }

    #[test]
    fn port_timeouts_keep_the_partial_line() {
        let reader = Choppy(VecDeque::from([
            Some(&b"{\"cooler"[..]),
            None,
            None,
            Some(&b"_state\":true}\n\x01"[..]),
            None,
            Some(&b"\n"[..]),
        ]));
        let (tx, rx) = bounded(64);
        assert_eq!(pump_lines(BufReader::new(reader), &tx).unwrap(), Pump::Eof);
        drop(tx);
        assert_eq!(
            rx.iter().collect::<Vec<_>>(),
            vec![b"{\"cooler_state\":true}\n".to_vec(), vec![0x01, b'\n']]
        );
    }

    #[test]
    fn dropped_controller_stops_the_reader() {
        let (tx, rx) = bounded::<Vec<u8>>(1);
        drop(rx);
        let result = pump_lines(Cursor::new(b"\x01\n\x00\n".to_vec()), &tx).unwrap();
        assert_eq!(result, Pump::Disconnected);
    }

    #[test]
    fn disconnected_reader_yields_silence() {
        let (tx, rx) = bounded::<Vec<u8>>(1);
        drop(tx);
        let mut source = ChannelLineSource::new(rx);
        for _ in 0..2 {
            assert_eq!(source.poll_line(Duration::from_millis(10)), None);
        }
        assert!(source.disconnected);
    }

    #[test]
    fn empty_path_means_stdin() {
        assert_eq!(Input::from_config("", 115_200), Input::Stdin);
        assert_eq!(
            Input::from_config("/dev/ttyGS0", 9600),
            Input::Device {
                path: PathBuf::from("/dev/ttyGS0"),
                baud: 9600
            }
        );
    }
}
