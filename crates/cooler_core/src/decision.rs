//! Motor de decisão – histerese com "hold" de N ciclos.
//!
//! Acima do limiar o cooler liga imediatamente. Quando a temperatura volta
//! para o limiar ou abaixo, ele continua ligado por `hold_frames` ciclos antes
//! de desligar, evitando liga/desliga contínuo na fronteira.

use crate::types::ActuationDecision;

/// Estado mutável do debounce, pertencente exclusivamente ao [`DecisionEngine`].
///
/// `hold` é `None` quando não há contagem em andamento, ou seja, quando a
/// última leitura estava no limiar ou abaixo e a janela de hold já expirou.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebounceState {
    hold: Option<u32>,
}

impl DebounceState {
    /// Ciclos já consumidos da janela de hold, se houver contagem ativa.
    pub fn hold_counter(&self) -> Option<u32> {
        self.hold
    }

    pub fn is_counting(&self) -> bool {
        self.hold.is_some()
    }
}

/// Converte temperatura em decisão ON/OFF, um ciclo por chamada.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    on_threshold: f64,
    hold_frames: u32,
    state: DebounceState,
}

impl DecisionEngine {
    pub fn new(on_threshold: f64, hold_frames: u32) -> Self {
        Self {
            on_threshold,
            hold_frames,
            state: DebounceState::default(),
        }
    }

    pub fn on_threshold(&self) -> f64 {
        self.on_threshold
    }

    pub fn hold_frames(&self) -> u32 {
        self.hold_frames
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    /// Avalia uma leitura. Comparação estrita: `temperature == on_threshold`
    /// não conta como acima do limiar.
    pub fn evaluate(&mut self, temperature: f64) -> ActuationDecision {
        if temperature > self.on_threshold {
            self.state.hold = Some(0);
            return ActuationDecision::On;
        }

        if let Some(frame) = self.state.hold {
            if frame < self.hold_frames {
                self.state.hold = Some(frame + 1);
                return ActuationDecision::On;
            }
        }

        self.state.hold = None;
        ActuationDecision::Off
    }

    /// Variante para leituras que podem faltar.
    ///
    /// Sem leitura não há avaliação: retorna `None` e o estado fica intacto,
    /// cabendo ao chamador pular a transmissão do ciclo.
    pub fn evaluate_reading(&mut self, temperature: Option<f64>) -> Option<ActuationDecision> {
        temperature.map(|t| self.evaluate(t))
    }
}
