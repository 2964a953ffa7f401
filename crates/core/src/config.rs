//! 설정 관리 -- logwarden.toml 파싱 및 런타임 설정
//!
//! [`LogwardenConfig`]는 데몬과 모니터링 세션의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGWARDEN_MONITOR_BATCH_SIZE=200` 형식)
//! 3. 설정 파일 (`logwarden.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logwarden_core::error::LogwardenError> {
//! use logwarden_core::config::LogwardenConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LogwardenConfig::load("logwarden.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LogwardenConfig::parse("[monitor]\nbatch_size = 50")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LogwardenError};

/// 지원하는 소스 형식 이름
pub const SOURCE_FORMATS: [&str; 3] = ["auth", "syslog", "firewall"];

/// logwarden 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogwardenConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 로그 모니터링 설정
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// 내보내기 설정
    #[serde(default)]
    pub export: ExportConfig,
    /// 메트릭 엔드포인트 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl LogwardenConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogwardenError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogwardenError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogwardenError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogwardenError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LogwardenError> {
        toml::from_str(toml_str).map_err(|e| {
            LogwardenError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGWARDEN_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGWARDEN_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGWARDEN_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.pid_file, "LOGWARDEN_GENERAL_PID_FILE");

        // Monitor
        override_bool(&mut self.monitor.enabled, "LOGWARDEN_MONITOR_ENABLED");
        override_csv(
            &mut self.monitor.watch_paths,
            "LOGWARDEN_MONITOR_WATCH_PATHS",
        );
        override_string(&mut self.monitor.rules_path, "LOGWARDEN_MONITOR_RULES_PATH");
        override_usize(&mut self.monitor.batch_size, "LOGWARDEN_MONITOR_BATCH_SIZE");
        override_u64(
            &mut self.monitor.flush_interval_ms,
            "LOGWARDEN_MONITOR_FLUSH_INTERVAL_MS",
        );
        override_u64(
            &mut self.monitor.poll_interval_ms,
            "LOGWARDEN_MONITOR_POLL_INTERVAL_MS",
        );
        override_string(&mut self.monitor.start_at, "LOGWARDEN_MONITOR_START_AT");
        override_bool(
            &mut self.monitor.flush_on_shutdown,
            "LOGWARDEN_MONITOR_FLUSH_ON_SHUTDOWN",
        );
        override_usize(
            &mut self.monitor.max_line_length,
            "LOGWARDEN_MONITOR_MAX_LINE_LENGTH",
        );
        override_u64(
            &mut self.monitor.create_wait_timeout_secs,
            "LOGWARDEN_MONITOR_CREATE_WAIT_TIMEOUT_SECS",
        );

        // Export
        override_string(&mut self.export.csv_path, "LOGWARDEN_EXPORT_CSV_PATH");
        override_string(&mut self.export.jsonl_path, "LOGWARDEN_EXPORT_JSONL_PATH");

        // Metrics
        override_bool(&mut self.metrics.enabled, "LOGWARDEN_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "LOGWARDEN_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "LOGWARDEN_METRICS_PORT");
        override_string(&mut self.metrics.endpoint, "LOGWARDEN_METRICS_ENDPOINT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogwardenError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.monitor.enabled {
            self.monitor.validate()?;
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid("metrics.port", "must be greater than 0".to_owned()));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> LogwardenError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// PID 파일 경로 (빈 문자열이면 생성하지 않음)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            pid_file: String::new(),
        }
    }
}

/// 로그 모니터링 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 감시할 로그 파일 경로
    pub watch_paths: Vec<String>,
    /// 심각도 룰 파일 경로
    pub rules_path: String,
    /// 배치 크기
    pub batch_size: usize,
    /// 배치 플러시 간격 (밀리초)
    pub flush_interval_ms: u64,
    /// 파일 폴링 간격 (밀리초)
    pub poll_interval_ms: u64,
    /// 시작 위치 (beginning, end)
    pub start_at: String,
    /// 종료 시 남은 버퍼 플러시 여부
    pub flush_on_shutdown: bool,
    /// 최대 라인 길이 (바이트)
    pub max_line_length: usize,
    /// 파일 생성 대기 제한 (초, 0이면 무제한)
    pub create_wait_timeout_secs: u64,
    /// 기본 테이블 외에 추가할 경로별 형식 매핑
    pub sources: Vec<SourceConfig>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            watch_paths: vec![
                "/var/log/host/auth.log".to_owned(),
                "/var/log/host/syslog".to_owned(),
                "/var/log/host/ufw.log".to_owned(),
            ],
            rules_path: "rules/rules.yaml".to_owned(),
            batch_size: 100,
            flush_interval_ms: 100,
            poll_interval_ms: 250,
            start_at: "beginning".to_owned(),
            flush_on_shutdown: true,
            max_line_length: 64 * 1024,
            create_wait_timeout_secs: 0,
            sources: Vec::new(),
        }
    }
}

impl MonitorConfig {
    fn validate(&self) -> Result<(), LogwardenError> {
        if self.batch_size == 0 {
            return Err(invalid(
                "monitor.batch_size",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.flush_interval_ms == 0 {
            return Err(invalid(
                "monitor.flush_interval_ms",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.poll_interval_ms == 0 {
            return Err(invalid(
                "monitor.poll_interval_ms",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.max_line_length == 0 {
            return Err(invalid(
                "monitor.max_line_length",
                "must be greater than 0".to_owned(),
            ));
        }

        let valid_positions = ["beginning", "end"];
        if !valid_positions.contains(&self.start_at.as_str()) {
            return Err(invalid(
                "monitor.start_at",
                format!("must be one of: {}", valid_positions.join(", ")),
            ));
        }

        if self.watch_paths.iter().any(|p| p.trim().is_empty()) {
            return Err(invalid(
                "monitor.watch_paths",
                "paths must not be empty".to_owned(),
            ));
        }

        for (idx, source) in self.sources.iter().enumerate() {
            if source.path.trim().is_empty() {
                return Err(invalid(
                    &format!("monitor.sources[{idx}].path"),
                    "path must not be empty".to_owned(),
                ));
            }
            if !SOURCE_FORMATS.contains(&source.format.as_str()) {
                return Err(invalid(
                    &format!("monitor.sources[{idx}].format"),
                    format!("must be one of: {}", SOURCE_FORMATS.join(", ")),
                ));
            }
        }

        Ok(())
    }
}

/// 경로별 형식 매핑
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// 로그 파일 경로
    pub path: String,
    /// 형식 (auth, syslog, firewall)
    pub format: String,
}

/// 내보내기 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// CSV 출력 경로 (빈 문자열이면 비활성화)
    pub csv_path: String,
    /// JSON Lines 출력 경로 (빈 문자열이면 비활성화)
    pub jsonl_path: String,
}

/// Prometheus 메트릭 엔드포인트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
    /// 엔드포인트 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
