//! Configuração unificada: `config.toml` + variáveis de ambiente.
//!
//! Ordem de precedência (a última vence):
//! 1. valores padrão;
//! 2. arquivo TOML (`RPCOOLER_CONFIG`, padrão `/etc/rpcooler.toml`);
//! 3. variáveis de ambiente (`SERIAL_DEVICE_PATH`, `COOLER_ON_TEMP`…), que
//!    podem vir de um arquivo `KEY=valor` carregado pelo binário.

use crate::color::Palette;
use crate::protocol::ProtocolMode;
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Limiar padrão no modo telemetria (°C).
pub const DEFAULT_COOLER_ON_TEMP: i64 = 60;

/// Baud rate padrão dos dois lados do enlace.
pub const DEFAULT_SERIAL_BAUD: u32 = 115_200;

/// Caminho padrão do arquivo de ambiente.
pub const DEFAULT_ENV_FILE: &str = "/etc/rpcooler.conf";

/// Erros de configuração.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Valor inválido em {var}={value:?}: {reason}")]
    InvalidEnv {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Erro de E/S em {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Erro ao gerar TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Configuração do host (quem decide e envia).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Dispositivo serial de saída
    pub serial_device_path: String,
    /// Baud rate da serial
    pub serial_baud: u32,
    /// Arquivo sysfs com a temperatura em milésimos de °C
    pub cpu_temp_path: String,
    /// Limiar de acionamento (°C); obrigatório no modo mínimo
    pub cooler_on_temp: Option<i64>,
    /// Ciclos extras com cooler ligado após cair abaixo do limiar
    pub cooler_on_frames: u32,
    /// Período do loop de controle (ms)
    pub interval_ms: u64,
    /// Membros esperados do array RAID (ex: "sdb", "sdc")
    pub raid_disks: Vec<String>,
    /// Fonte do estado do RAID
    pub mdstat_path: String,
    /// Formato da linha enviada
    pub protocol: ProtocolMode,
    /// Linha de status sobrescrita no terminal a cada ciclo
    pub live_status: bool,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            serial_device_path: "/dev/ttyACM0".into(),
            serial_baud: DEFAULT_SERIAL_BAUD,
            cpu_temp_path: "/sys/class/thermal/thermal_zone0/temp".into(),
            cooler_on_temp: None,
            cooler_on_frames: 1,
            interval_ms: 1000,
            raid_disks: vec!["sdb".into(), "sdc".into()],
            mdstat_path: "/proc/mdstat".into(),
            protocol: ProtocolMode::Telemetry,
            live_status: true,
        }
    }
}

impl SenderConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Limiar efetivo: o configurado, ou 60 °C no modo telemetria.
    pub fn effective_on_temp(&self) -> Option<i64> {
        match (self.cooler_on_temp, self.protocol) {
            (Some(t), _) => Some(t),
            (None, ProtocolMode::Telemetry) => Some(DEFAULT_COOLER_ON_TEMP),
            (None, ProtocolMode::Minimal) => None,
        }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.serial_device_path.trim().is_empty() {
            errors.push("SERIAL_DEVICE_PATH não pode ser vazio".into());
        }
        if self.effective_on_temp().is_none() {
            errors.push("COOLER_ON_TEMP é obrigatório no modo mínimo".into());
        }
        if self.interval_ms == 0 {
            errors.push("INTERVAL_MS deve ser maior que 0".into());
        }
        if self.serial_baud == 0 {
            errors.push("SERIAL_BAUD deve ser maior que 0".into());
        }
        errors
    }
}

/// Configuração do cliente (microcontrolador / placa com o relé).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Entrada da serial (vazio = stdin)
    pub input_path: String,
    /// Baud rate da serial de entrada
    pub serial_baud: u32,
    /// Formato esperado da linha
    pub protocol: ProtocolMode,
    /// Duração de um tick / timeout de leitura (ms)
    pub read_timeout_ms: u64,
    /// Silêncio tolerado antes do fail-safe (s)
    pub emergency_after_secs: u64,
    /// Fuso fixo para relógio e modo noturno (horas)
    pub utc_offset_hours: i32,
    /// GPIO do relé do cooler (ausente = apenas log)
    pub cooler_pin: Option<u64>,
    /// GPIO do LED de falha
    pub fault_led_pin: Option<u64>,
    /// GPIO do backlight do display
    pub backlight_pin: Option<u64>,
    /// Desenhar o display (só no modo telemetria)
    pub display: bool,
    /// Cores fixas do display
    pub palette: Palette,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            input_path: String::new(),
            serial_baud: DEFAULT_SERIAL_BAUD,
            protocol: ProtocolMode::Telemetry,
            read_timeout_ms: 50,
            emergency_after_secs: 50,
            utc_offset_hours: 3,
            cooler_pin: None,
            fault_led_pin: None,
            backlight_pin: None,
            display: true,
            palette: Palette::default(),
        }
    }
}

impl ReceiverConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn emergency_after(&self) -> Duration {
        Duration::from_secs(self.emergency_after_secs)
    }

    pub fn utc_offset(&self) -> Option<FixedOffset> {
        self.utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.serial_baud == 0 {
            errors.push("SERIAL_BAUD deve ser maior que 0".into());
        }
        if self.read_timeout_ms == 0 {
            errors.push("READ_TIMEOUT_MS deve ser maior que 0".into());
        }
        if self.emergency_after_secs == 0 {
            errors.push("EMERGENCY_AFTER_SEC deve ser maior que 0".into());
        }
        if self.utc_offset().is_none() {
            errors.push(format!(
                "UTC_OFFSET_HOURS inválido: {} (-23–23)",
                self.utc_offset_hours
            ));
        }
        errors
    }
}

/// Configuração raiz (host e cliente no mesmo arquivo).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sender: SenderConfig,
    pub receiver: ReceiverConfig,
}

impl AppConfig {
    /// Carrega configuração de um arquivo TOML, caindo no padrão em caso de erro.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => {
                        info!("Configuração carregada de {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        warn!("Erro ao parsear {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Erro ao ler {}: {}", path.display(), e);
                }
            }
        }

        info!("Usando configuração padrão");
        AppConfig::default()
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Como [`AppConfig::load`], mas grava o arquivo com os valores
    /// carregados quando ele ainda não existe.
    pub fn load_or_create(path: &Path) -> Self {
        let config = Self::load(path);
        if !path.exists() {
            if let Err(e) = config.save(path) {
                debug!("Não foi possível criar {}: {e}", path.display());
            }
        }
        config
    }

    /// Caminho do config.toml (`RPCOOLER_CONFIG` ou `/etc/rpcooler.toml`).
    pub fn default_path() -> PathBuf {
        std::env::var_os("RPCOOLER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/etc/rpcooler.toml"))
    }

    /// Fluxo completo usado pelos binários: arquivo de ambiente
    /// (`RPCOOLER_ENV_FILE` ou `/etc/rpcooler.conf`), `config.toml` e por fim
    /// as variáveis do processo.
    pub fn load_from_system() -> Result<Self, ConfigError> {
        let env_file = std::env::var_os("RPCOOLER_ENV_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_FILE));
        load_env_file(&env_file);

        let mut config = Self::load_or_create(&Self::default_path());
        config.apply_process_env()?;
        Ok(config)
    }

    /// Aplica as variáveis do processo por cima do arquivo.
    pub fn apply_process_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env(|key| std::env::var(key).ok())
    }

    /// Aplica overrides a partir de uma função de lookup (testável sem
    /// mexer no ambiente do processo).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &'static str| lookup(var).filter(|v| !v.trim().is_empty());

        // ── Host ──
        let s = &mut self.sender;
        if let Some(v) = get("SERIAL_DEVICE_PATH") {
            s.serial_device_path = v;
        }
        if let Some(v) = get("CPU_TEMP_PATH") {
            s.cpu_temp_path = v;
        }
        if let Some(v) = get("COOLER_ON_TEMP") {
            s.cooler_on_temp = Some(parse_env("COOLER_ON_TEMP", &v)?);
        }
        if let Some(v) = get("COOLER_ON_FRAMES") {
            s.cooler_on_frames = parse_env("COOLER_ON_FRAMES", &v)?;
        }
        if let Some(v) = get("INTERVAL_MS") {
            s.interval_ms = parse_env("INTERVAL_MS", &v)?;
        }
        if let Some(v) = get("RAID_DISKS") {
            s.raid_disks = v
                .split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = get("MDSTAT_PATH") {
            s.mdstat_path = v;
        }

        // ── Enlace (compartilhado) ──
        if let Some(v) = get("SERIAL_BAUD") {
            let baud: u32 = parse_env("SERIAL_BAUD", &v)?;
            self.sender.serial_baud = baud;
            self.receiver.serial_baud = baud;
        }
        if let Some(v) = get("PROTOCOL_MODE") {
            let mode: ProtocolMode = parse_env("PROTOCOL_MODE", &v)?;
            self.sender.protocol = mode;
            self.receiver.protocol = mode;
        }

        // ── Cliente ──
        let r = &mut self.receiver;
        if let Some(v) = get("INPUT_PATH") {
            r.input_path = v;
        }
        if let Some(v) = get("READ_TIMEOUT_MS") {
            r.read_timeout_ms = parse_env("READ_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("EMERGENCY_AFTER_SEC") {
            r.emergency_after_secs = parse_env("EMERGENCY_AFTER_SEC", &v)?;
        }
        if let Some(v) = get("UTC_OFFSET_HOURS") {
            r.utc_offset_hours = parse_env("UTC_OFFSET_HOURS", &v)?;
        }
        if let Some(v) = get("COOLER_PIN") {
            r.cooler_pin = Some(parse_env("COOLER_PIN", &v)?);
        }
        if let Some(v) = get("FAULT_LED_PIN") {
            r.fault_led_pin = Some(parse_env("FAULT_LED_PIN", &v)?);
        }
        if let Some(v) = get("BACKLIGHT_PIN") {
            r.backlight_pin = Some(parse_env("BACKLIGHT_PIN", &v)?);
        }

        Ok(())
    }

    /// Valida os dois lados e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = self.sender.validate();
        errors.extend(self.receiver.validate());
        errors
    }
}

/// Carrega `KEY=valor` no ambiente do processo. Variáveis já definidas
/// não são sobrescritas.
fn load_env_file(path: &Path) {
    match dotenvy::from_path(path) {
        Ok(()) => info!("Variáveis carregadas de {}", path.display()),
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Sem arquivo de ambiente em {}", path.display());
        }
        Err(e) => warn!("Erro ao ler {}: {}", path.display(), e),
    }
}

fn parse_env<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidEnv {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        let errors = config.validate();
        assert!(errors.is_empty(), "Erros: {:?}", errors);
        assert_eq!(config.sender.effective_on_temp(), Some(60));
        assert_eq!(config.sender.raid_disks, vec!["sdb", "sdc"]);
    }

    #[test]
    fn roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.sender.interval_ms, parsed.sender.interval_ms);
        assert_eq!(config.receiver.palette, parsed.receiver.palette);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let partial = r#"
[sender]
interval_ms = 250
protocol = "minimal"
cooler_on_temp = 55
"#;
        let config: AppConfig = toml::from_str(partial).unwrap();
        assert_eq!(config.sender.interval_ms, 250);
        assert_eq!(config.sender.protocol, ProtocolMode::Minimal);
        assert_eq!(config.sender.cooler_on_frames, 1);
        assert_eq!(config.receiver.read_timeout_ms, 50);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("SERIAL_DEVICE_PATH", "/dev/ttyUSB1"),
                ("COOLER_ON_TEMP", "65"),
                ("COOLER_ON_FRAMES", "0"),
                ("INTERVAL_MS", "500"),
                ("RAID_DISKS", "sda, sdd,"),
                ("PROTOCOL_MODE", "minimal"),
                ("EMERGENCY_AFTER_SEC", "10"),
                ("COOLER_PIN", "0"),
                ("SERIAL_BAUD", "9600"),
            ]))
            .unwrap();

        assert_eq!(config.sender.serial_device_path, "/dev/ttyUSB1");
        assert_eq!(config.sender.cooler_on_temp, Some(65));
        assert_eq!(config.sender.cooler_on_frames, 0);
        assert_eq!(config.sender.interval(), Duration::from_millis(500));
        assert_eq!(config.sender.raid_disks, vec!["sda", "sdd"]);
        assert_eq!(config.sender.protocol, ProtocolMode::Minimal);
        assert_eq!(config.receiver.protocol, ProtocolMode::Minimal);
        assert_eq!(config.receiver.emergency_after(), Duration::from_secs(10));
        assert_eq!(config.receiver.cooler_pin, Some(0));
        assert_eq!(config.sender.serial_baud, 9600);
        assert_eq!(config.receiver.serial_baud, 9600);
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = std::env::temp_dir().join(format!("rpcooler-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("rpcooler.toml");
        let _ = std::fs::remove_file(&path);

        let config = AppConfig::load_or_create(&path);
        assert!(path.exists());
        assert_eq!(config.sender.serial_baud, DEFAULT_SERIAL_BAUD);

        let reloaded = AppConfig::load(&path);
        assert_eq!(reloaded.sender.serial_device_path, config.sender.serial_device_path);
        assert_eq!(reloaded.receiver.read_timeout_ms, 50);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn zero_baud_is_reported() {
        let mut config = AppConfig::default();
        config.sender.serial_baud = 0;
        config.receiver.serial_baud = 0;
        assert_eq!(config.sender.validate().len(), 1);
        assert_eq!(config.receiver.validate().len(), 1);
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[("INTERVAL_MS", "  ")])).unwrap();
        assert_eq!(config.sender.interval_ms, 1000);
    }

    #[test]
    fn bad_env_value_is_an_error() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(env(&[("COOLER_ON_TEMP", "hot")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                var: "COOLER_ON_TEMP",
                ..
            }
        ));
    }

    #[test]
    fn minimal_mode_requires_threshold() {
        let mut config = AppConfig::default();
        config.sender.protocol = ProtocolMode::Minimal;
        assert_eq!(config.sender.effective_on_temp(), None);
        assert!(config.validate().iter().any(|e| e.contains("COOLER_ON_TEMP")));

        // O cliente não depende do limiar
        assert!(config.receiver.validate().is_empty());

        config.sender.cooler_on_temp = Some(58);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn invalid_offset_and_zero_periods_are_reported() {
        let mut config = AppConfig::default();
        config.receiver.utc_offset_hours = 30;
        config.receiver.read_timeout_ms = 0;
        config.sender.interval_ms = 0;
        assert_eq!(config.validate().len(), 3);
    }
}
