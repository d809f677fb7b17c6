//! # RPCooler Core
//!
//! Crate compartilhada entre o host (quem mede e decide) e o cliente (quem
//! segura o relé do cooler e o display).
//!
//! ## Módulos
//! - [`types`] – Snapshot de métricas e decisão ON/OFF
//! - [`decision`] – Histerese com hold de N ciclos
//! - [`protocol`] – Linha JSON ou byte único, terminada em `\n`
//! - [`watchdog`] – Fail-safe do cliente por silêncio no enlace
//! - [`color`] – Gradiente de cores e paleta do display
//! - [`display`] – Textos/cores derivados do snapshot, modo noturno
//! - [`config`] – Configuração TOML + variáveis de ambiente

pub mod types;
pub mod decision;
pub mod protocol;
pub mod watchdog;
pub mod color;
pub mod display;
pub mod config;

// Re-exports convenientes
pub use types::{ActuationDecision, MetricsSnapshot};
pub use decision::DecisionEngine;
pub use protocol::{LineCodec, ProtocolMode, WireMessage, codec_for};
pub use watchdog::{LinkMode, Watchdog};
pub use config::{AppConfig, ReceiverConfig, SenderConfig};
