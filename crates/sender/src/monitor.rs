//! Host Monitor – coleta de métricas com falha isolada por fonte.
//!
//! - `sysinfo`: CPU (uso, frequência), RAM, swap, discos, uptime
//! - sysfs: temperatura (`thermal_zone*/temp`) e limites de `cpufreq`
//! - procfs: estado do RAID (`/proc/mdstat`)
//!
//! Cada fonte roda isolada: se uma falhar, o erro vai para o log e os campos
//! dela ficam fora do snapshot. As demais seguem normalmente.

use rpcooler_core::config::SenderConfig;
use rpcooler_core::types::{ExternalStorage, MetricsSnapshot, RaidState};
use std::path::{Path, PathBuf};
use sysinfo::{CpuRefreshKind, Disks, MemoryRefreshKind, RefreshKind, System};
use tracing::{debug, warn};

const CPUFREQ_MIN_PATH: &str = "/sys/devices/system/cpu/cpu0/cpufreq/cpuinfo_min_freq";
const CPUFREQ_MAX_PATH: &str = "/sys/devices/system/cpu/cpu0/cpufreq/cpuinfo_max_freq";

/// Fonte de métricas consumida pelo ciclo de controle.
pub trait MetricsSource {
    fn collect(&mut self) -> MetricsSnapshot;
}

/// Falha de uma fonte individual.
#[derive(Debug, thiserror::Error)]
pub enum MetricError {
    #[error("Erro ao ler {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Conteúdo inesperado em {}: {content:?}", path.display())]
    Parse { path: PathBuf, content: String },

    #[error("{0} indisponível")]
    Unavailable(&'static str),
}

type Getter = fn(&mut HostMonitor, &mut MetricsSnapshot) -> Result<(), MetricError>;

/// Monitor do host (Linux).
pub struct HostMonitor {
    sys: System,
    disks: Disks,
    cpu_temp_path: PathBuf,
    mdstat_path: PathBuf,
    raid_disks: Vec<String>,
}

impl HostMonitor {
    pub fn new(config: &SenderConfig) -> Self {
        let mut sys = System::new_with_specifics(
            RefreshKind::nothing()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything()),
        );
        // Primeira leitura para inicializar o contador de uso da CPU
        sys.refresh_cpu_all();

        Self {
            sys,
            disks: Disks::new_with_refreshed_list(),
            cpu_temp_path: PathBuf::from(&config.cpu_temp_path),
            mdstat_path: PathBuf::from(&config.mdstat_path),
            raid_disks: config.raid_disks.clone(),
        }
    }

    fn getters() -> [(&'static str, Getter); 9] {
        [
            ("cpu_temp", Self::read_cpu_temp as Getter),
            ("memory", Self::read_memory as Getter),
            ("swap", Self::read_swap as Getter),
            ("cpu_load", Self::read_cpu_load as Getter),
            ("disk", Self::read_disks as Getter),
            ("raid", Self::read_raid as Getter),
            ("uptime", Self::read_uptime as Getter),
            ("cpu_freq", Self::read_cpu_frequency as Getter),
            ("timestamp", Self::read_timestamp as Getter),
        ]
    }

    // ──────────────────────────────────────────
    // Fontes
    // ──────────────────────────────────────────

    fn read_cpu_temp(&mut self, snap: &mut MetricsSnapshot) -> Result<(), MetricError> {
        let raw = read_file(&self.cpu_temp_path)?;
        snap.cpu_temp = Some(parse_millidegrees(&raw).ok_or_else(|| MetricError::Parse {
            path: self.cpu_temp_path.clone(),
            content: raw.trim().to_string(),
        })?);
        Ok(())
    }

    fn read_memory(&mut self, snap: &mut MetricsSnapshot) -> Result<(), MetricError> {
        self.sys.refresh_memory();
        let total = self.sys.total_memory();
        if total == 0 {
            return Err(MetricError::Unavailable("memória"));
        }
        snap.used_memory = Some(self.sys.used_memory());
        snap.total_memory = Some(total);
        Ok(())
    }

    fn read_swap(&mut self, snap: &mut MetricsSnapshot) -> Result<(), MetricError> {
        // Memória já atualizada em read_memory (swap vem junto)
        snap.swap = Some(self.sys.used_swap());
        snap.total_swap = Some(self.sys.total_swap());
        Ok(())
    }

    /// Uso desde a coleta anterior (o intervalo do loop faz a janela).
    fn read_cpu_load(&mut self, snap: &mut MetricsSnapshot) -> Result<(), MetricError> {
        self.sys.refresh_cpu_usage();
        if self.sys.cpus().is_empty() {
            return Err(MetricError::Unavailable("CPU"));
        }
        let usage = f64::from(self.sys.global_cpu_usage());
        snap.cpu_load = Some((usage * 10.0).round() / 10.0);
        Ok(())
    }

    fn read_disks(&mut self, snap: &mut MetricsSnapshot) -> Result<(), MetricError> {
        self.disks.refresh(true);

        let root = self
            .disks
            .iter()
            .find(|d| d.mount_point() == Path::new("/"))
            .ok_or(MetricError::Unavailable("disco raiz"))?;
        let free_space = root.available_space();
        let total_disk_size = root.total_space();

        let external: Vec<ExternalStorage> = self
            .disks
            .iter()
            .filter(|d| d.is_removable() && d.mount_point() != Path::new("/"))
            .map(|d| ExternalStorage {
                location: Some(d.mount_point().to_string_lossy().to_string()),
                free_space: Some(d.available_space()),
                total_disk_size: Some(d.total_space()),
            })
            .collect();

        snap.free_space = Some(free_space);
        snap.total_disk_size = Some(total_disk_size);
        if !external.is_empty() {
            snap.external_storages = Some(external);
        }
        Ok(())
    }

    fn read_raid(&mut self, snap: &mut MetricsSnapshot) -> Result<(), MetricError> {
        let mdstat = read_file(&self.mdstat_path)?;
        let status = raid_status(&mdstat, &self.raid_disks);

        snap.raid_state = Some(status.state);
        if status.state != RaidState::Inactive {
            snap.missing_raid_disks = Some(status.missing);
            snap.raid_disks = Some(self.raid_disks.clone());
        }
        Ok(())
    }

    fn read_uptime(&mut self, snap: &mut MetricsSnapshot) -> Result<(), MetricError> {
        snap.uptime = Some(System::uptime() as f64);
        Ok(())
    }

    /// Frequência atual (média dos cores) e limites do cpufreq, em MHz.
    fn read_cpu_frequency(&mut self, snap: &mut MetricsSnapshot) -> Result<(), MetricError> {
        self.sys.refresh_cpu_frequency();
        let cpus = self.sys.cpus();
        if cpus.is_empty() {
            return Err(MetricError::Unavailable("frequência da CPU"));
        }
        let sum: u64 = cpus.iter().map(|c| c.frequency()).sum();
        snap.freq_current = Some(sum as f64 / cpus.len() as f64);

        // Limites são opcionais (nem toda plataforma expõe cpufreq)
        snap.freq_min = read_khz_as_mhz(Path::new(CPUFREQ_MIN_PATH));
        snap.freq_max = read_khz_as_mhz(Path::new(CPUFREQ_MAX_PATH));
        Ok(())
    }

    fn read_timestamp(&mut self, snap: &mut MetricsSnapshot) -> Result<(), MetricError> {
        snap.timestamp = Some(chrono::Utc::now().timestamp());
        Ok(())
    }
}

impl MetricsSource for HostMonitor {
    fn collect(&mut self) -> MetricsSnapshot {
        let mut snap = MetricsSnapshot::default();
        for (name, getter) in Self::getters() {
            if let Err(e) = getter(self, &mut snap) {
                warn!("Falha na métrica {name}: {e}");
            }
        }
        debug!("Snapshot coletado: {:?}", snap);
        snap
    }
}

// ──────────────────────────────────────────
// Helpers puros
// ──────────────────────────────────────────

fn read_file(path: &Path) -> Result<String, MetricError> {
    std::fs::read_to_string(path).map_err(|source| MetricError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// `"45123\n"` → 45.0 (graus inteiros, truncado como o sysfs sugere).
pub fn parse_millidegrees(raw: &str) -> Option<f64> {
    let first = raw.lines().next()?.trim();
    let millis: i64 = first.parse().ok()?;
    Some((millis / 1000) as f64)
}

fn read_khz_as_mhz(path: &Path) -> Option<f64> {
    let raw = std::fs::read_to_string(path).ok()?;
    let khz: u64 = raw.trim().parse().ok()?;
    Some(khz as f64 / 1000.0)
}

/// Resultado da análise do `/proc/mdstat`.
#[derive(Debug, Clone, PartialEq)]
pub struct RaidStatus {
    pub state: RaidState,
    pub missing: Vec<String>,
}

/// Saudável só se todos os membros esperados aparecem em um array ativo.
pub fn raid_status(mdstat: &str, expected: &[String]) -> RaidStatus {
    let active = mdstat
        .lines()
        .any(|line| line.split_whitespace().any(|word| word == "active"));
    if !active {
        return RaidStatus {
            state: RaidState::Inactive,
            missing: Vec::new(),
        };
    }

    let missing: Vec<String> = expected
        .iter()
        .filter(|disk| !mdstat.contains(disk.as_str()))
        .cloned()
        .collect();
    let state = if missing.is_empty() {
        RaidState::Healthy
    } else {
        RaidState::Degraded
    };
    RaidStatus { state, missing }
}
