//! Watchdog do cliente: fail-safe por falta de comunicação.
//!
//! ```text
//!            msg válida                      idle_ticks >= limiar
//!   ┌────────┐ ──────► ┌────────┐   sem msg   ┌───────────┐
//!   │ Normal │         │ Normal │ ──────────► │ Emergency │ ◄─┐ sem msg
//!   └────────┘ ◄────── └────────┘             └───────────┘ ──┘
//!                            ▲    msg válida        │
//!                            └──────────────────────┘
//! ```
//!
//! Em Emergency o cooler e o LED de falha ficam forçados em ON, não importa a
//! última decisão recebida. Só uma nova mensagem válida volta para Normal.

use crate::types::ActuationDecision;
use std::time::Duration;

/// Estado do enlace visto pelo cliente.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    Normal,
    Emergency,
}

/// Valores a aplicar nas saídas após um tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outputs {
    pub cooler: bool,
    pub fault: bool,
}

/// Converte "tempo sem mensagens" em número de ticks (mínimo 1).
pub fn ticks_for(after: Duration, tick: Duration) -> u32 {
    let tick_ms = tick.as_millis().max(1);
    let ticks = after.as_millis() / tick_ms;
    u32::try_from(ticks).unwrap_or(u32::MAX).max(1)
}

#[derive(Debug, Clone)]
pub struct Watchdog {
    emergency_threshold: u32,
    idle_ticks: u32,
    last_decision: ActuationDecision,
}

impl Watchdog {
    pub fn new(emergency_threshold: u32) -> Self {
        Self {
            emergency_threshold: emergency_threshold.max(1),
            idle_ticks: 0,
            last_decision: ActuationDecision::Off,
        }
    }

    pub fn idle_ticks(&self) -> u32 {
        self.idle_ticks
    }

    pub fn emergency_threshold(&self) -> u32 {
        self.emergency_threshold
    }

    pub fn last_decision(&self) -> ActuationDecision {
        self.last_decision
    }

    pub fn mode(&self) -> LinkMode {
        if self.idle_ticks >= self.emergency_threshold {
            LinkMode::Emergency
        } else {
            LinkMode::Normal
        }
    }

    /// Mensagem válida recebida neste tick.
    pub fn on_message(&mut self, decision: ActuationDecision) -> Outputs {
        self.idle_ticks = 0;
        self.last_decision = decision;
        self.outputs()
    }

    /// Tick sem mensagem válida (silêncio ou linha malformada).
    pub fn on_idle(&mut self) -> Outputs {
        self.idle_ticks = self.idle_ticks.saturating_add(1);
        self.outputs()
    }

    pub fn outputs(&self) -> Outputs {
        match self.mode() {
            LinkMode::Normal => Outputs {
                cooler: self.last_decision.is_on(),
                fault: false,
            },
            LinkMode::Emergency => Outputs {
                cooler: true,
                fault: true,
            },
        }
    }
}
