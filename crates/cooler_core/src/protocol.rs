//! Protocolo de linha entre host e cliente.
//!
//! Cada ciclo de controle vira exatamente uma linha terminada em `\n`.
//! Há dois formatos, escolhidos por configuração ([`ProtocolMode`]):
//!
//! ```text
//! telemetry:  {"cpu_temp":61.0,"cpu_load":12.5,...,"cooler_state":true}\n
//! minimal:    ┌──────────┬──────┐
//!             │ 0x00/01  │ 0x0A │
//!             └──────────┴──────┘
//! ```
//!
//! O único campo obrigatório da telemetria é `cooler_state` (bool ou 0/1);
//! se ausente, vale OFF. Métrica com tipo errado é descartada sem afetar a
//! decisão. Linhas malformadas nunca derrubam o cliente: o chamador trata o
//! erro como "nenhuma mensagem neste tick".

use crate::types::{ActuationDecision, MetricsSnapshot};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Delimitador de mensagens.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Tamanho máximo aceito para uma linha (sem o terminador).
pub const MAX_LINE_LEN: usize = 4096;

/// Nome do campo de decisão dentro do objeto JSON.
pub const COOLER_STATE_FIELD: &str = "cooler_state";

/// Formato usado no fio. Um único modo por instalação.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolMode {
    #[default]
    Telemetry,
    Minimal,
}

impl std::str::FromStr for ProtocolMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "telemetry" | "json" => Ok(ProtocolMode::Telemetry),
            "minimal" | "byte" => Ok(ProtocolMode::Minimal),
            other => Err(format!("modo de protocolo desconhecido: {other:?}")),
        }
    }
}

/// Erros do protocolo.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Linha vazia")]
    Empty,

    #[error("Linha muito longa ({0} bytes, máximo {MAX_LINE_LEN})")]
    TooLong(usize),

    #[error("Byte de estado inválido: 0x{0:02X}")]
    InvalidByte(u8),

    #[error("Mensagem de telemetria não é um objeto JSON")]
    NotAnObject,

    #[error("Valor inválido para cooler_state: {0}")]
    InvalidCoolerState(Value),

    #[error("Erro de JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Mensagem lógica transportada por uma linha.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WireMessage {
    pub cooler_state: ActuationDecision,
    /// Métricas que acompanham a decisão (só no modo telemetria).
    pub telemetry: Option<MetricsSnapshot>,
}

impl WireMessage {
    pub fn decision(cooler_state: ActuationDecision) -> Self {
        Self {
            cooler_state,
            telemetry: None,
        }
    }

    pub fn with_telemetry(cooler_state: ActuationDecision, snapshot: MetricsSnapshot) -> Self {
        Self {
            cooler_state,
            telemetry: Some(snapshot),
        }
    }
}

/// Interface comum aos dois formatos de linha.
pub trait LineCodec: Send {
    fn mode(&self) -> ProtocolMode;

    /// Gera a linha completa, já com o `\n` final.
    fn encode(&self, message: &WireMessage) -> Result<Vec<u8>, ProtocolError>;

    /// Interpreta uma linha, com ou sem o terminador.
    fn decode(&self, line: &[u8]) -> Result<WireMessage, ProtocolError>;
}

/// Retorna o codec do modo configurado.
pub fn codec_for(mode: ProtocolMode) -> Box<dyn LineCodec> {
    match mode {
        ProtocolMode::Telemetry => Box::new(JsonLineCodec),
        ProtocolMode::Minimal => Box::new(ByteLineCodec),
    }
}

/// Remove `\n` e `\r` finais e valida o tamanho.
fn strip_terminator(line: &[u8]) -> Result<&[u8], ProtocolError> {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    if end == 0 {
        return Err(ProtocolError::Empty);
    }
    if end > MAX_LINE_LEN {
        return Err(ProtocolError::TooLong(end));
    }
    Ok(&line[..end])
}

// ──────────────────────────────────────────────
// Telemetria (JSON por linha)
// ──────────────────────────────────────────────

/// Objeto JSON com o snapshot completo + `cooler_state`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLineCodec;

impl LineCodec for JsonLineCodec {
    fn mode(&self) -> ProtocolMode {
        ProtocolMode::Telemetry
    }

    fn encode(&self, message: &WireMessage) -> Result<Vec<u8>, ProtocolError> {
        let mut object = match &message.telemetry {
            Some(snapshot) => match serde_json::to_value(snapshot)? {
                Value::Object(map) => map,
                _ => return Err(ProtocolError::NotAnObject),
            },
            None => Map::new(),
        };
        object.insert(
            COOLER_STATE_FIELD.into(),
            Value::Bool(message.cooler_state.is_on()),
        );

        let mut frame = serde_json::to_vec(&object)?;
        frame.push(LINE_TERMINATOR);
        Ok(frame)
    }

    fn decode(&self, line: &[u8]) -> Result<WireMessage, ProtocolError> {
        let body = strip_terminator(line)?;
        let mut object = match serde_json::from_slice::<Value>(body)? {
            Value::Object(map) => map,
            _ => return Err(ProtocolError::NotAnObject),
        };

        let cooler_state = match object.remove(COOLER_STATE_FIELD) {
            None => ActuationDecision::Off,
            Some(value) => cooler_state_from_value(value)?,
        };
        Ok(WireMessage::with_telemetry(cooler_state, snapshot_from(object)))
    }
}

/// Monta o snapshot com os campos restantes. Um campo com tipo inesperado é
/// descartado sozinho: a decisão e as demais métricas continuam valendo.
fn snapshot_from(object: Map<String, Value>) -> MetricsSnapshot {
    let object = Value::Object(object);
    if let Ok(snapshot) = MetricsSnapshot::deserialize(&object) {
        return snapshot;
    }

    let Value::Object(fields) = object else {
        return MetricsSnapshot::default();
    };
    let valid: Map<String, Value> = fields
        .into_iter()
        .filter(|(key, value)| {
            let single = Value::Object(Map::from_iter([(key.clone(), value.clone())]));
            match MetricsSnapshot::deserialize(&single) {
                Ok(_) => true,
                Err(e) => {
                    debug!("Campo {key} descartado: {e}");
                    false
                }
            }
        })
        .collect();
    MetricsSnapshot::deserialize(&Value::Object(valid)).unwrap_or_default()
}

/// Aceita bool, número (≠ 0 liga) ou null (desliga).
fn cooler_state_from_value(value: Value) -> Result<ActuationDecision, ProtocolError> {
    match value {
        Value::Null => Ok(ActuationDecision::Off),
        Value::Bool(on) => Ok(on.into()),
        Value::Number(n) => Ok((n.as_f64().unwrap_or(0.0) != 0.0).into()),
        other => Err(ProtocolError::InvalidCoolerState(other)),
    }
}

// ──────────────────────────────────────────────
// Mínimo (1 byte por linha)
// ──────────────────────────────────────────────

/// Um único byte `0x00`/`0x01` seguido de `\n`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteLineCodec;

impl LineCodec for ByteLineCodec {
    fn mode(&self) -> ProtocolMode {
        ProtocolMode::Minimal
    }

    fn encode(&self, message: &WireMessage) -> Result<Vec<u8>, ProtocolError> {
        Ok(vec![u8::from(message.cooler_state.is_on()), LINE_TERMINATOR])
    }

    fn decode(&self, line: &[u8]) -> Result<WireMessage, ProtocolError> {
        let body = strip_terminator(line)?;
        let on = match body[0] {
            0x00 | b'0' => false,
            0x01 | b'1' => true,
            other => return Err(ProtocolError::InvalidByte(other)),
        };
        Ok(WireMessage::decision(on.into()))
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
