//! Saídas digitais do cliente: relé do cooler, LED de falha e backlight.
//!
//! Os pinos são recursos do processo, criados no `main` e entregues ao
//! controlador, que é o único a escrever neles.

use tracing::{info, warn};

/// Erros de GPIO.
#[derive(Debug, thiserror::Error)]
pub enum PinError {
    #[cfg(target_os = "linux")]
    #[error("GPIO {pin}: {source}")]
    Gpio {
        pin: u64,
        #[source]
        source: sysfs_gpio::Error,
    },

    #[cfg_attr(target_os = "linux", allow(dead_code))]
    #[error("GPIO {0} não suportado nesta plataforma")]
    Unsupported(u64),
}

/// Uma saída digital.
pub trait OutputPin {
    fn set(&mut self, on: bool) -> Result<(), PinError>;
}

impl<P: OutputPin + ?Sized> OutputPin for Box<P> {
    fn set(&mut self, on: bool) -> Result<(), PinError> {
        (**self).set(on)
    }
}

// ──────────────────────────────────────────
// Pino sem hardware
// ──────────────────────────────────────────

/// Pino que só registra as transições no log (sem GPIO configurado).
pub struct LogPin {
    name: &'static str,
}

impl LogPin {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl OutputPin for LogPin {
    fn set(&mut self, on: bool) -> Result<(), PinError> {
        info!("[{}] {}", self.name, if on { "ON" } else { "OFF" });
        Ok(())
    }
}

// ──────────────────────────────────────────
// GPIO via sysfs
// ──────────────────────────────────────────

#[cfg(target_os = "linux")]
pub struct SysfsPin {
    name: &'static str,
    pin: sysfs_gpio::Pin,
}

#[cfg(target_os = "linux")]
impl SysfsPin {
    /// Exporta o pino e o configura como saída em nível baixo.
    pub fn new(name: &'static str, number: u64) -> Result<Self, PinError> {
        let gpio = |source| PinError::Gpio {
            pin: number,
            source,
        };
        let pin = sysfs_gpio::Pin::new(number);
        pin.export().map_err(gpio)?;
        pin.set_direction(sysfs_gpio::Direction::Low).map_err(gpio)?;
        info!("[{name}] GPIO {number} exportado");
        Ok(Self { name, pin })
    }
}

#[cfg(target_os = "linux")]
impl OutputPin for SysfsPin {
    fn set(&mut self, on: bool) -> Result<(), PinError> {
        self.pin
            .set_value(u8::from(on))
            .map_err(|source| PinError::Gpio {
                pin: self.pin.get_pin(),
                source,
            })
    }
}

#[cfg(target_os = "linux")]
impl Drop for SysfsPin {
    fn drop(&mut self) {
        if let Err(e) = self.pin.unexport() {
            warn!("[{}] Falha ao liberar GPIO {}: {}", self.name, self.pin.get_pin(), e);
        }
    }
}

/// Abre o GPIO configurado ou cai num [`LogPin`].
///
/// Falha de GPIO não impede o cliente de subir: o watchdog e o display
/// seguem funcionando, e o erro fica no log.
pub fn open_pin(name: &'static str, number: Option<u64>) -> Box<dyn OutputPin> {
    let Some(number) = number else {
        info!("[{name}] sem GPIO configurado, apenas log");
        return Box::new(LogPin::new(name));
    };

    #[cfg(target_os = "linux")]
    let result = SysfsPin::new(name, number).map(|p| Box::new(p) as Box<dyn OutputPin>);
    #[cfg(not(target_os = "linux"))]
    let result: Result<Box<dyn OutputPin>, PinError> = Err(PinError::Unsupported(number));

    result.unwrap_or_else(|e| {
        warn!("[{name}] {e}; usando pino de log");
        Box::new(LogPin::new(name))
    })
}

/// Guarda o último valor aplicado e só escreve no pino quando ele muda.
pub struct Latched<P: OutputPin> {
    name: &'static str,
    pin: P,
    applied: Option<bool>,
}

impl<P: OutputPin> Latched<P> {
    pub fn new(name: &'static str, pin: P) -> Self {
        Self {
            name,
            pin,
            applied: None,
        }
    }

    #[cfg(test)]
    pub fn applied(&self) -> Option<bool> {
        self.applied
    }

    /// Aplica `on`. Em caso de erro o valor fica "desconhecido" e a
    /// escrita é repetida no próximo tick.
    pub fn apply(&mut self, on: bool) {
        if self.applied == Some(on) {
            return;
        }
        match self.pin.set(on) {
            Ok(()) => self.applied = Some(on),
            Err(e) => {
                warn!("[{}] Falha ao escrever: {e}", self.name);
                self.applied = None;
            }
        }
    }
}
