//! 모니터링 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`MonitorConfig`](logwarden_core::config::MonitorConfig)를
//! 기반으로 세션 내부에서 쓰는 타입화된 설정을 제공합니다.
//! 문자열 필드는 이 단계에서 [`FormatKind`], [`StartPosition`], [`Duration`]으로 변환됩니다.
//!
//! # 사용 예시
//! ```ignore
//! use logwarden_core::config::LogwardenConfig;
//! use logwarden_log_pipeline::config::PipelineConfig;
//!
//! let core_config = LogwardenConfig::default();
//! let config = PipelineConfig::from_core(&core_config.monitor)?;
//! ```

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use logwarden_core::config::MonitorConfig;

use crate::collector::{FileTailerConfig, StartPosition};
use crate::error::LogPipelineError;
use crate::parser::FormatKind;

const MAX_BATCH_SIZE: usize = 100_000;
const MAX_FLUSH_INTERVAL: Duration = Duration::from_secs(3600);
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(60);
const MAX_LINE_LENGTH: usize = 16 * 1024 * 1024;
const MAX_CHANNEL_CAPACITY: usize = 1_000_000;

/// 모니터링 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 감시할 로그 파일 경로
    pub watch_paths: Vec<PathBuf>,
    /// 기본 테이블에 추가할 경로별 형식 매핑
    pub sources: Vec<(PathBuf, FormatKind)>,
    /// 심각도 룰 파일 경로 (`None`이면 룰 없이 실행)
    pub rules_path: Option<PathBuf>,
    /// 배치 크기
    pub batch_size: usize,
    /// 배치 플러시 간격
    pub flush_interval: Duration,
    /// 파일 폴링 간격
    pub poll_interval: Duration,
    /// 테일러 시작 위치
    pub start_at: StartPosition,
    /// 종료 시 남은 버퍼 플러시 여부
    pub flush_on_shutdown: bool,
    /// 최대 라인 길이 (바이트)
    pub max_line_length: usize,
    /// 파일 생성 대기 제한
    pub create_wait_timeout: Option<Duration>,
    /// 배치 채널 용량
    pub batch_channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            watch_paths: vec![
                PathBuf::from("/var/log/host/auth.log"),
                PathBuf::from("/var/log/host/syslog"),
                PathBuf::from("/var/log/host/ufw.log"),
            ],
            sources: Vec::new(),
            rules_path: Some(PathBuf::from("rules/rules.yaml")),
            batch_size: 100,
            flush_interval: Duration::from_millis(100),
            poll_interval: Duration::from_millis(250),
            start_at: StartPosition::Beginning,
            flush_on_shutdown: true,
            max_line_length: 64 * 1024,
            create_wait_timeout: None,
            batch_channel_capacity: 1024,
        }
    }
}

impl PipelineConfig {
    /// core의 `MonitorConfig`에서 파이프라인 설정을 생성합니다.
    ///
    /// 빈 `rules_path`는 룰 없음, `create_wait_timeout_secs = 0`은 무제한 대기로 변환됩니다.
    /// core 설정에 없는 필드는 기본값이 적용됩니다.
    pub fn from_core(core: &MonitorConfig) -> Result<Self, LogPipelineError> {
        let sources = core
            .sources
            .iter()
            .map(|source| Ok((PathBuf::from(&source.path), source.format.parse()?)))
            .collect::<Result<Vec<_>, LogPipelineError>>()?;

        let rules_path = if core.rules_path.trim().is_empty() {
            None
        } else {
            Some(PathBuf::from(&core.rules_path))
        };

        let create_wait_timeout = match core.create_wait_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(Self {
            watch_paths: core.watch_paths.iter().map(PathBuf::from).collect(),
            sources,
            rules_path,
            batch_size: core.batch_size,
            flush_interval: Duration::from_millis(core.flush_interval_ms),
            poll_interval: Duration::from_millis(core.poll_interval_ms),
            start_at: core.start_at.parse()?,
            flush_on_shutdown: core.flush_on_shutdown,
            max_line_length: core.max_line_length,
            create_wait_timeout,
            ..Self::default()
        })
    }

    /// 테일러 설정을 생성합니다.
    pub fn tailer_config(&self) -> FileTailerConfig {
        FileTailerConfig {
            poll_interval: self.poll_interval,
            start_at: self.start_at,
            max_line_length: self.max_line_length,
            create_wait_timeout: self.create_wait_timeout,
            ..FileTailerConfig::default()
        }
    }

    /// 파일 경로가 안전한지 검증합니다 (path traversal 방지).
    fn validate_path(field: &str, path: &Path) -> Result<(), LogPipelineError> {
        if path.as_os_str().is_empty() {
            return Err(LogPipelineError::Config {
                field: field.to_owned(),
                reason: "path must not be empty".to_owned(),
            });
        }

        if path.components().any(|c| c == Component::ParentDir) {
            return Err(LogPipelineError::Config {
                field: field.to_owned(),
                reason: format!(
                    "path '{}' contains path traversal pattern '..'",
                    path.display()
                ),
            });
        }

        Ok(())
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(LogPipelineError::Config {
                field: "batch_size".to_owned(),
                reason: format!("must be 1-{MAX_BATCH_SIZE}"),
            });
        }

        if self.flush_interval.is_zero() || self.flush_interval > MAX_FLUSH_INTERVAL {
            return Err(LogPipelineError::Config {
                field: "flush_interval".to_owned(),
                reason: format!("must be greater than 0 and at most {MAX_FLUSH_INTERVAL:?}"),
            });
        }

        if self.poll_interval.is_zero() || self.poll_interval > MAX_POLL_INTERVAL {
            return Err(LogPipelineError::Config {
                field: "poll_interval".to_owned(),
                reason: format!("must be greater than 0 and at most {MAX_POLL_INTERVAL:?}"),
            });
        }

        if self.max_line_length == 0 || self.max_line_length > MAX_LINE_LENGTH {
            return Err(LogPipelineError::Config {
                field: "max_line_length".to_owned(),
                reason: format!("must be 1-{MAX_LINE_LENGTH}"),
            });
        }

        if self.batch_channel_capacity == 0 || self.batch_channel_capacity > MAX_CHANNEL_CAPACITY
        {
            return Err(LogPipelineError::Config {
                field: "batch_channel_capacity".to_owned(),
                reason: format!("must be 1-{MAX_CHANNEL_CAPACITY}"),
            });
        }

        if self.watch_paths.is_empty() {
            return Err(LogPipelineError::Config {
                field: "watch_paths".to_owned(),
                reason: "at least one path must be watched".to_owned(),
            });
        }

        for path in &self.watch_paths {
            Self::validate_path("watch_paths", path)?;
        }
        for (path, _) in &self.sources {
            Self::validate_path("sources", path)?;
        }
        if let Some(rules_path) = &self.rules_path {
            Self::validate_path("rules_path", rules_path)?;
        }

        Ok(())
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 감시 경로를 설정합니다.
    pub fn watch_paths<P: Into<PathBuf>>(mut self, paths: impl IntoIterator<Item = P>) -> Self {
        self.config.watch_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// 경로별 형식 매핑을 추가합니다.
    pub fn source(mut self, path: impl Into<PathBuf>, kind: FormatKind) -> Self {
        self.config.sources.push((path.into(), kind));
        self
    }

    /// 룰 파일 경로를 설정합니다.
    pub fn rules_path(mut self, path: Option<PathBuf>) -> Self {
        self.config.rules_path = path;
        self
    }

    /// 배치 크기를 설정합니다.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// 플러시 간격을 설정합니다.
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.flush_interval = interval;
        self
    }

    /// 폴링 간격을 설정합니다.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// 시작 위치를 설정합니다.
    pub fn start_at(mut self, start_at: StartPosition) -> Self {
        self.config.start_at = start_at;
        self
    }

    /// 종료 시 플러시 여부를 설정합니다.
    pub fn flush_on_shutdown(mut self, flush: bool) -> Self {
        self.config.flush_on_shutdown = flush;
        self
    }

    /// 최대 라인 길이를 설정합니다.
    pub fn max_line_length(mut self, length: usize) -> Self {
        self.config.max_line_length = length;
        self
    }

    /// 파일 생성 대기 제한을 설정합니다.
    pub fn create_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.create_wait_timeout = timeout;
        self
    }

    /// 배치 채널 용량을 설정합니다.
    pub fn batch_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.batch_channel_capacity = capacity;
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, LogPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
