//! Definição de tipos/structs trafegados entre host e cliente.
//!
//! Todo campo de [`MetricsSnapshot`] é opcional: se a fonte de uma métrica
//! falhar no host, o campo simplesmente não é enviado, e o cliente renderiza
//! um valor padrão no lugar.

use serde::{Deserialize, Serialize};

// ──────────────────────────────────────────────
// Decisão de acionamento
// ──────────────────────────────────────────────

/// Estado desejado do cooler para o ciclo atual.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ActuationDecision {
    On,
    #[default]
    Off,
}

impl ActuationDecision {
    pub fn is_on(self) -> bool {
        matches!(self, ActuationDecision::On)
    }

    /// Texto curto usado no display e na linha de status.
    pub fn label(self) -> &'static str {
        if self.is_on() { "ON" } else { "OFF" }
    }
}

impl From<bool> for ActuationDecision {
    fn from(on: bool) -> Self {
        if on {
            ActuationDecision::On
        } else {
            ActuationDecision::Off
        }
    }
}

impl From<ActuationDecision> for bool {
    fn from(decision: ActuationDecision) -> Self {
        decision.is_on()
    }
}

// ──────────────────────────────────────────────
// RAID
// ──────────────────────────────────────────────

/// Estado do array RAID (md) visto pelo host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaidState {
    #[default]
    Inactive,
    Healthy,
    Degraded,
}

impl RaidState {
    pub fn as_str(self) -> &'static str {
        match self {
            RaidState::Inactive => "inactive",
            RaidState::Healthy => "healthy",
            RaidState::Degraded => "degraded",
        }
    }
}

// ──────────────────────────────────────────────
// Armazenamento externo
// ──────────────────────────────────────────────

/// Um volume externo (USB, cartão…) montado no host.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExternalStorage {
    /// Ponto de montagem ou rótulo
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Espaço livre (bytes)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::to_u64"
    )]
    pub free_space: Option<u64>,
    /// Tamanho total (bytes)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::to_u64"
    )]
    pub total_disk_size: Option<u64>,
}

// ──────────────────────────────────────────────
// Snapshot completo
// ──────────────────────────────────────────────

/// Fotografia das métricas do host em um ciclo de controle.
///
/// Os nomes dos campos são exatamente os nomes usados no fio.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsSnapshot {
    /// Temperatura da CPU (°C)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_temp: Option<f64>,
    /// Uso total da CPU (0–100%)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_load: Option<f64>,
    /// Frequência atual (MHz)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freq_current: Option<f64>,
    /// Frequência mínima (MHz)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freq_min: Option<f64>,
    /// Frequência máxima (MHz)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freq_max: Option<f64>,
    /// Memória usada (bytes)
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::to_u64")]
    pub used_memory: Option<u64>,
    /// Memória total (bytes)
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::to_u64")]
    pub total_memory: Option<u64>,
    /// Swap usada (bytes)
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::to_u64")]
    pub swap: Option<u64>,
    /// Swap total (bytes)
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::to_u64")]
    pub total_swap: Option<u64>,
    /// Espaço livre no disco raiz (bytes)
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::to_u64")]
    pub free_space: Option<u64>,
    /// Tamanho do disco raiz (bytes)
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::to_u64")]
    pub total_disk_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_storages: Option<Vec<ExternalStorage>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raid_state: Option<RaidState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_raid_disks: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raid_disks: Option<Vec<String>>,
    /// Tempo desde o boot (s)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime: Option<f64>,
    /// Horário do host (epoch, s)
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::to_i64")]
    pub timestamp: Option<i64>,
}

// ──────────────────────────────────────────────
// Números tolerantes
// ──────────────────────────────────────────────

/// Campos inteiros aceitam qualquer número JSON (`time.time()` chega como
/// float, contadores às vezes como `4e9`). A parte fracionária é truncada.
mod lenient {
    use serde::{Deserialize, Deserializer};

    pub fn to_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        Ok(Option::<f64>::deserialize(d)?
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v as u64))
    }

    pub fn to_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        Ok(Option::<f64>::deserialize(d)?
            .filter(|v| v.is_finite())
            .map(|v| v as i64))
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
