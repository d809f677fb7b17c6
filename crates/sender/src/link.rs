//! Lado de escrita do enlace serial.
//!
//! A porta (ex: `/dev/ttyACM0`) é aberta em modo raw com o baud rate da
//! configuração. Cada linha é escrita inteira e seguida de `flush`, então o
//! cliente nunca recebe meia mensagem de um ciclo.

use serialport::SerialPort;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Tempo máximo de uma escrita antes de considerar a porta travada.
const WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// Enlace serial para o cliente.
pub struct SerialLink<W: Write = Box<dyn SerialPort>> {
    path: PathBuf,
    device: W,
}

impl SerialLink {
    pub fn open(path: &Path, baud: u32) -> Result<Self, serialport::Error> {
        let device = serialport::new(path.to_string_lossy(), baud)
            .timeout(WRITE_TIMEOUT)
            .open()?;
        info!("Serial aberta em {} ({baud} baud)", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            device,
        })
    }
}

impl<W: Write> SerialLink<W> {
    /// Envolve qualquer destino (usado nos testes).
    #[cfg(test)]
    pub fn from_writer(path: impl Into<PathBuf>, device: W) -> Self {
        Self {
            path: path.into(),
            device,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        self.device.write_all(frame)?;
        self.device.flush()
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.device
    }
}
