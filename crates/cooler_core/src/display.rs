//! Mapeamento do snapshot para textos e cores do display.
//!
//! Tudo aqui é função pura de um [`MetricsSnapshot`]: o [`DisplayModel`] é
//! recalculado a cada mensagem e nunca guardado. Campo ausente vira zero
//! (ou o texto padrão), nunca erro, para que uma métrica faltando não
//! apague o resto da tela.

use crate::color::{Palette, Rgb, interpolate_color};
use crate::types::{ActuationDecision, ExternalStorage, MetricsSnapshot, RaidState};
use chrono::{DateTime, FixedOffset, Timelike};

pub const GIGABYTE: f64 = 1024.0 * 1024.0 * 1024.0;

/// Faixa de cores da temperatura da CPU (°C).
pub const CPU_TEMP_RANGE: (f64, f64) = (30.0, 100.0);

/// Horas em que o backlight fica apagado: `>= 21` ou `<= 6`.
pub const NIGHT_STARTS_AT: u32 = 21;
pub const NIGHT_ENDS_AT: u32 = 6;

/// Texto + cor de um valor no display.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub text: String,
    pub color: Rgb,
}

impl Field {
    fn new(text: impl Into<String>, color: Rgb) -> Self {
        Self {
            text: text.into(),
            color,
        }
    }
}

/// Visão derivada de um snapshot, pronta para desenhar.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayModel {
    pub time: Field,
    pub uptime: Field,
    pub cpu_load: Field,
    pub cpu_freq: Field,
    pub cpu_temp: Field,
    pub cooler: Field,
    pub ram: Field,
    pub swap: Field,
    pub raid: Field,
    pub disk: Field,
    pub external_storages: Vec<Field>,
    pub night_mode: bool,
}

impl DisplayModel {
    pub fn build(
        snapshot: &MetricsSnapshot,
        cooler_state: ActuationDecision,
        utc_offset: FixedOffset,
        palette: &Palette,
    ) -> Self {
        let timestamp = snapshot.timestamp.unwrap_or(0);

        Self {
            time: Field::new(format_clock(timestamp, utc_offset), palette.muted),
            uptime: Field::new(format_uptime(snapshot.uptime.unwrap_or(0.0)), palette.muted),
            cpu_load: cpu_load_field(snapshot),
            cpu_freq: cpu_freq_field(snapshot),
            cpu_temp: cpu_temp_field(snapshot),
            cooler: cooler_field(cooler_state, palette),
            ram: usage_field(snapshot.used_memory, snapshot.total_memory),
            swap: usage_field(snapshot.swap, snapshot.total_swap),
            raid: raid_field(snapshot.raid_state, palette),
            disk: disk_field(snapshot.free_space, snapshot.total_disk_size),
            external_storages: snapshot
                .external_storages
                .iter()
                .flatten()
                .map(external_storage_field)
                .collect(),
            night_mode: is_night_mode(timestamp, utc_offset),
        }
    }
}

// ──────────────────────────────────────────────
// Helpers numéricos
// ──────────────────────────────────────────────

pub fn bytes_to_gib(bytes: u64) -> f64 {
    bytes as f64 / GIGABYTE
}

/// Percentual de `used` em `total`; 0 quando `total` é 0.
pub fn usage_percent(used: f64, total: f64) -> f64 {
    if total > 0.0 { used / total * 100.0 } else { 0.0 }
}

// ──────────────────────────────────────────────
// Campos derivados
// ──────────────────────────────────────────────

fn cpu_load_field(snapshot: &MetricsSnapshot) -> Field {
    let load = snapshot.cpu_load.unwrap_or(0.0);
    Field::new(format!("{load:.1}%"), interpolate_color(load, 0.0, 100.0))
}

fn cpu_freq_field(snapshot: &MetricsSnapshot) -> Field {
    let current = snapshot.freq_current.unwrap_or(0.0);
    let min = snapshot.freq_min.unwrap_or(0.0);
    let max = snapshot.freq_max.unwrap_or(0.0);
    Field::new(
        format!("{:.1}GHz", current / 1000.0),
        interpolate_color(current, min, max),
    )
}

fn cpu_temp_field(snapshot: &MetricsSnapshot) -> Field {
    let temp = snapshot.cpu_temp.unwrap_or(0.0);
    let (min, max) = CPU_TEMP_RANGE;
    Field::new(format!("{temp}"), interpolate_color(temp, min, max))
}

fn cooler_field(state: ActuationDecision, palette: &Palette) -> Field {
    let color = if state.is_on() { palette.good } else { palette.bad };
    Field::new(state.label(), color)
}

/// RAM e swap: `"{usado:.1}/{total:.1} GB"`.
fn usage_field(used: Option<u64>, total: Option<u64>) -> Field {
    let used = bytes_to_gib(used.unwrap_or(0));
    let total = bytes_to_gib(total.unwrap_or(0));
    Field::new(
        format!("{used:.1}/{total:.1} GB"),
        interpolate_color(usage_percent(used, total), 0.0, 100.0),
    )
}

/// Disco: `"{usado:.0}/{total:.0} GB"`, com usado = total − livre.
pub fn disk_field(free_space: Option<u64>, total_disk_size: Option<u64>) -> Field {
    let free = bytes_to_gib(free_space.unwrap_or(0));
    let total = bytes_to_gib(total_disk_size.unwrap_or(0));
    let used = total - free;
    Field::new(
        format!("{used:.0}/{total:.0} GB"),
        interpolate_color(usage_percent(used, total), 0.0, 100.0),
    )
}

fn external_storage_field(storage: &ExternalStorage) -> Field {
    let location = storage.location.as_deref().unwrap_or("Unknown");
    let usage = disk_field(storage.free_space, storage.total_disk_size);
    Field::new(format!("{location} {}", usage.text), usage.color)
}

fn raid_field(state: Option<RaidState>, palette: &Palette) -> Field {
    let state = state.unwrap_or_default();
    let color = if state == RaidState::Healthy {
        palette.good
    } else {
        palette.bad
    };
    Field::new(state.as_str(), color)
}

// ──────────────────────────────────────────────
// Tempo
// ──────────────────────────────────────────────

/// `"{dias}d {horas}h {minutos}m"`.
pub fn format_uptime(uptime_secs: f64) -> String {
    let secs = if uptime_secs.is_finite() && uptime_secs > 0.0 {
        uptime_secs as u64
    } else {
        0
    };
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let minutes = (secs % 3600) / 60;
    format!("{days}d {hours}h {minutes}m")
}

fn local_time(timestamp: i64, utc_offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    DateTime::from_timestamp(timestamp, 0).map(|utc| utc.with_timezone(&utc_offset))
}

/// Relógio `HH:MM:SS` no fuso fixo configurado.
pub fn format_clock(timestamp: i64, utc_offset: FixedOffset) -> String {
    match local_time(timestamp, utc_offset) {
        Some(t) => format!("{:02}:{:02}:{:02}", t.hour(), t.minute(), t.second()),
        None => "--:--:--".into(),
    }
}

pub fn local_hour(timestamp: i64, utc_offset: FixedOffset) -> Option<u32> {
    local_time(timestamp, utc_offset).map(|t| t.hour())
}

pub fn is_night_mode(timestamp: i64, utc_offset: FixedOffset) -> bool {
    local_hour(timestamp, utc_offset)
        .map(|hour| hour >= NIGHT_STARTS_AT || hour <= NIGHT_ENDS_AT)
        .unwrap_or(false)
}
