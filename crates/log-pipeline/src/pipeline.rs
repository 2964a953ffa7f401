//! 모니터링 세션 -- 소스별 유닛의 생명주기를 관리합니다.
//!
//! [`MonitorSession`]은 core의 [`Pipeline`](logwarden_core::pipeline::Pipeline) trait을 구현하여
//! `logwarden-daemon`에서 start/stop/health_check 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//!              +-- unit(auth.log)  --+
//! RuleSet -----+-- unit(syslog)    --+--> mpsc::Sender<Batch> --> SinkDispatcher
//!   (Arc)      +-- unit(ufw.log)   --+
//! ```
//!
//! 각 유닛은 독립된 tokio 태스크이며 자식 [`CancellationToken`]으로 정지됩니다.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use logwarden_core::error::{LogwardenError, PipelineError};
use logwarden_core::metrics as m;
use logwarden_core::pipeline::{HealthStatus, Pipeline};
use logwarden_core::types::Batch;

use crate::config::PipelineConfig;
use crate::error::LogPipelineError;
use crate::parser::ParserSelector;
use crate::rule::{RuleLoader, RuleSet};
use crate::unit::{MonitorUnit, UnitStats};

/// 세션 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 실행 중인 유닛 핸들
struct UnitHandle {
    path: PathBuf,
    handle: JoinHandle<Result<(), LogPipelineError>>,
}

/// 모니터링 세션
///
/// 감시 경로마다 테일러/파서/배처 유닛 하나를 동시에 실행합니다.
/// 룰 집합은 세션 동안 한 번만 로드되어 모든 유닛이 공유합니다.
///
/// # 사용 예시
/// ```ignore
/// use logwarden_log_pipeline::MonitorSessionBuilder;
///
/// let (mut session, batch_rx) = MonitorSessionBuilder::new()
///     .config(config)
///     .build()?;
///
/// session.start().await?;
/// ```
pub struct MonitorSession {
    config: PipelineConfig,
    state: SessionState,
    selector: ParserSelector,
    /// 미리 주입된 룰 (없으면 `rules_path`에서 로드)
    preset_rules: Option<Arc<RuleSet>>,
    /// start 시 유닛에 나눠준 뒤 버림
    batch_tx: Option<mpsc::Sender<Batch>>,
    cancel: CancellationToken,
    units: Vec<UnitHandle>,
    stats: Vec<Arc<UnitStats>>,
    rule_count: usize,
}

impl MonitorSession {
    /// 현재 상태 이름
    pub fn state_name(&self) -> &str {
        match self.state {
            SessionState::Initialized => "initialized",
            SessionState::Running => "running",
            SessionState::Stopped => "stopped",
        }
    }

    /// 실행된 유닛 수
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// 로드된 룰 수
    pub fn rule_count(&self) -> usize {
        self.rule_count
    }

    /// 읽은 라인 수 (모든 유닛 합계)
    pub fn lines_read(&self) -> u64 {
        self.sum(|s| &s.lines_read)
    }

    /// 파싱에 성공한 레코드 수
    pub fn processed_count(&self) -> u64 {
        self.sum(|s| &s.records_parsed)
    }

    /// 파싱 에러 수
    pub fn parse_error_count(&self) -> u64 {
        self.sum(|s| &s.parse_errors)
    }

    /// 내보낸 배치 수
    pub fn batch_count(&self) -> u64 {
        self.sum(|s| &s.batches_emitted)
    }

    fn sum(&self, field: impl Fn(&UnitStats) -> &std::sync::atomic::AtomicU64) -> u64 {
        self.stats.iter().map(|s| UnitStats::get(field(s.as_ref()))).sum()
    }

    async fn resolve_rules(&self) -> Result<Arc<RuleSet>, LogPipelineError> {
        if let Some(rules) = &self.preset_rules {
            return Ok(Arc::clone(rules));
        }
        match &self.config.rules_path {
            Some(path) => Ok(Arc::new(RuleLoader::load_file(path).await?)),
            None => {
                tracing::info!("no rules file configured, records keep their structural level");
                Ok(Arc::new(RuleSet::empty()))
            }
        }
    }

    /// 감시 경로별 유닛을 구성합니다. 지원하지 않는 경로는 경고 후 건너뜁니다.
    fn plan_units(
        &self,
        rules: &Arc<RuleSet>,
        batch_tx: &mpsc::Sender<Batch>,
    ) -> Result<Vec<(MonitorUnit, Arc<UnitStats>)>, LogPipelineError> {
        let mut seen = HashSet::new();
        let mut planned = Vec::new();

        for path in &self.config.watch_paths {
            if !seen.insert(path.clone()) {
                tracing::warn!(path = %path.display(), "duplicate watch path ignored");
                continue;
            }

            let parser = match self.selector.select(path, rules) {
                Ok(parser) => parser,
                Err(LogPipelineError::UnsupportedSource(_)) => {
                    tracing::warn!(path = %path.display(), "no parser registered for path, skipping source");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let stats = Arc::new(UnitStats::default());
            planned.push((
                MonitorUnit {
                    path: path.clone(),
                    parser,
                    tailer_config: self.config.tailer_config(),
                    batch_size: self.config.batch_size,
                    flush_interval: self.config.flush_interval,
                    flush_on_shutdown: self.config.flush_on_shutdown,
                    batch_tx: batch_tx.clone(),
                    stats: Arc::clone(&stats),
                },
                stats,
            ));
        }

        Ok(planned)
    }
}

impl Pipeline for MonitorSession {
    async fn start(&mut self) -> Result<(), LogwardenError> {
        match self.state {
            SessionState::Running => return Err(PipelineError::AlreadyRunning.into()),
            SessionState::Stopped => {
                return Err(PipelineError::InitFailed(
                    "monitoring session cannot be restarted".to_owned(),
                )
                .into());
            }
            SessionState::Initialized => {}
        }

        tracing::info!(paths = self.config.watch_paths.len(), "starting monitoring session");

        // 1. 룰 로드 (컴파일 실패 시 세션 시작 실패)
        let rules = self.resolve_rules().await?;
        self.rule_count = rules.len();
        metrics::gauge!(m::MONITOR_RULES_LOADED).set(rules.len() as f64);

        // 2. 유닛 구성
        let Some(batch_tx) = self.batch_tx.as_ref() else {
            return Err(PipelineError::InitFailed("batch channel already consumed".to_owned()).into());
        };
        let planned = self.plan_units(&rules, batch_tx)?;
        if planned.is_empty() {
            return Err(PipelineError::InitFailed(
                "no supported log source among watch paths".to_owned(),
            )
            .into());
        }

        // 3. 유닛 태스크 스폰
        for (unit, stats) in planned {
            let path = unit.path.clone();
            let handle = tokio::spawn(unit.run(self.cancel.child_token()));
            self.units.push(UnitHandle { path, handle });
            self.stats.push(stats);
        }

        // 유닛이 모두 끝나면 채널이 닫히도록 원본 송신측을 버림
        self.batch_tx = None;

        self.state = SessionState::Running;
        tracing::info!(
            units = self.units.len(),
            rules = self.rule_count,
            "monitoring session started"
        );
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LogwardenError> {
        if self.state != SessionState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        tracing::info!("stopping monitoring session");
        self.cancel.cancel();

        for unit in &mut self.units {
            match (&mut unit.handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::debug!(path = %unit.path.display(), error = %e, "unit had ended with an error");
                }
                Err(e) => {
                    tracing::warn!(path = %unit.path.display(), error = %e, "unit task failed");
                }
            }
        }

        self.state = SessionState::Stopped;
        tracing::info!(
            lines = self.lines_read(),
            records = self.processed_count(),
            parse_errors = self.parse_error_count(),
            batches = self.batch_count(),
            "monitoring session stopped"
        );
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            SessionState::Running => {
                let total = self.units.len();
                let ended = self.units.iter().filter(|u| u.handle.is_finished()).count();
                if ended == 0 {
                    HealthStatus::Healthy
                } else if ended < total {
                    HealthStatus::Degraded(format!("{ended} of {total} units ended"))
                } else {
                    HealthStatus::Unhealthy("all monitoring units ended".to_owned())
                }
            }
            SessionState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            SessionState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 모니터링 세션 빌더
///
/// 세션을 구성하고 배치 채널을 생성합니다.
pub struct MonitorSessionBuilder {
    config: PipelineConfig,
    rules: Option<Arc<RuleSet>>,
    batch_tx: Option<mpsc::Sender<Batch>>,
    selector: Option<ParserSelector>,
}

impl MonitorSessionBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            rules: None,
            batch_tx: None,
            selector: None,
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 룰 집합을 직접 주입합니다. 지정하면 `rules_path`를 읽지 않습니다.
    pub fn rules(mut self, rules: RuleSet) -> Self {
        self.rules = Some(Arc::new(rules));
        self
    }

    /// 외부 배치 전송 채널을 설정합니다.
    ///
    /// 설정하지 않으면 빌더가 새 채널을 생성합니다.
    pub fn batch_sender(mut self, tx: mpsc::Sender<Batch>) -> Self {
        self.batch_tx = Some(tx);
        self
    }

    /// 파서 선택기를 지정합니다. 기본값은 기본 경로 테이블입니다.
    pub fn parser_selector(mut self, selector: ParserSelector) -> Self {
        self.selector = Some(selector);
        self
    }

    /// 세션을 빌드합니다.
    ///
    /// # Returns
    /// - `MonitorSession`: 세션 인스턴스
    /// - `Option<mpsc::Receiver<Batch>>`: 배치 수신 채널
    ///   (외부 batch_sender를 설정한 경우 None)
    pub fn build(
        self,
    ) -> Result<(MonitorSession, Option<mpsc::Receiver<Batch>>), LogPipelineError> {
        self.config.validate()?;

        let (batch_tx, batch_rx) = match self.batch_tx {
            Some(tx) => (tx, None),
            None => {
                let (tx, rx) = mpsc::channel(self.config.batch_channel_capacity);
                (tx, Some(rx))
            }
        };

        let selector = self
            .config
            .sources
            .iter()
            .fold(
                self.selector.unwrap_or_else(ParserSelector::with_defaults),
                |selector, (path, kind)| selector.register(path, *kind),
            );

        let session = MonitorSession {
            config: self.config,
            state: SessionState::Initialized,
            selector,
            preset_rules: self.rules,
            batch_tx: Some(batch_tx),
            cancel: CancellationToken::new(),
            units: Vec::new(),
            stats: Vec::new(),
            rule_count: 0,
        };

        Ok((session, batch_rx))
    }
}

impl Default for MonitorSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfigBuilder;
    use crate::parser::FormatKind;
    use std::time::Duration;

    fn config_for(paths: &[PathBuf]) -> PipelineConfig {
        PipelineConfigBuilder::new()
            .watch_paths(paths.to_vec())
            .rules_path(None)
            .poll_interval(Duration::from_millis(10))
            .flush_interval(Duration::from_millis(20))
            .build()
            .unwrap()
    }

    #[test]
    fn builder_creates_session() {
        let (session, batch_rx) = MonitorSessionBuilder::new().build().unwrap();
        assert_eq!(session.state_name(), "initialized");
        assert!(batch_rx.is_some());
        assert_eq!(session.unit_count(), 0);
    }

    #[test]
    fn builder_with_external_sender() {
        let (tx, _rx) = mpsc::channel(10);
        let (_session, rx) = MonitorSessionBuilder::new().batch_sender(tx).build().unwrap();
        assert!(rx.is_none());
    }

    #[test]
    fn builder_with_invalid_config_fails() {
        let config = PipelineConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(MonitorSessionBuilder::new().config(config).build().is_err());
    }

    #[test]
    fn builder_registers_configured_sources() {
        let config = PipelineConfigBuilder::new()
            .source("/srv/app/fw.log", FormatKind::Firewall)
            .build()
            .unwrap();
        let (session, _) = MonitorSessionBuilder::new().config(config).build().unwrap();
        assert_eq!(
            session.selector.kind_for(std::path::Path::new("/srv/app/fw.log")),
            Some(FormatKind::Firewall)
        );
    }

    #[tokio::test]
    async fn lifecycle_before_start() {
        let (mut session, _rx) = MonitorSessionBuilder::new().build().unwrap();
        assert!(session.health_check().await.is_unhealthy());
        assert!(session.stop().await.is_err());
    }

    #[tokio::test]
    async fn start_fails_without_supported_sources() {
        let config = config_for(&[PathBuf::from("/var/log/kern.log")]);
        let (mut session, _rx) = MonitorSessionBuilder::new()
            .config(config)
            .parser_selector(ParserSelector::new())
            .build()
            .unwrap();
        let err = session.start().await.unwrap_err();
        assert!(err.to_string().contains("no supported log source"));
        assert_eq!(session.state_name(), "initialized");
    }

    #[tokio::test]
    async fn start_fails_on_missing_rules_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            rules_path: Some(dir.path().join("missing.yaml")),
            ..config_for(&[dir.path().join("auth.log")])
        };
        let selector = ParserSelector::new().register(dir.path().join("auth.log"), FormatKind::Auth);
        let (mut session, _rx) = MonitorSessionBuilder::new()
            .config(config)
            .parser_selector(selector)
            .build()
            .unwrap();
        assert!(session.start().await.is_err());
    }

    #[tokio::test]
    async fn start_stop_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("syslog");
        std::fs::write(&path, "").unwrap();

        let selector = ParserSelector::new().register(&path, FormatKind::Syslog);
        let (mut session, rx) = MonitorSessionBuilder::new()
            .config(config_for(&[path.clone(), path.clone()]))
            .parser_selector(selector)
            .build()
            .unwrap();
        let mut rx = rx.unwrap();

        session.start().await.unwrap();
        assert_eq!(session.state_name(), "running");
        // 중복 경로는 한 번만 실행
        assert_eq!(session.unit_count(), 1);
        assert!(session.health_check().await.is_healthy());
        assert!(session.start().await.is_err());

        session.stop().await.unwrap();
        assert_eq!(session.state_name(), "stopped");
        assert!(session.health_check().await.is_unhealthy());
        // 모든 유닛이 끝나면 채널이 닫힘
        assert!(rx.recv().await.is_none());
        assert!(session.start().await.is_err());
    }

    #[tokio::test]
    async fn unit_open_failure_degrades_health() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("syslog");
        std::fs::write(&good, "").unwrap();
        // 디렉터리는 열기에 실패함
        let bad = dir.path().join("dir.log");
        std::fs::create_dir(&bad).unwrap();

        let selector = ParserSelector::new()
            .register(&good, FormatKind::Syslog)
            .register(&bad, FormatKind::Syslog);
        let (mut session, _rx) = MonitorSessionBuilder::new()
            .config(config_for(&[good, bad]))
            .parser_selector(selector)
            .build()
            .unwrap();

        session.start().await.unwrap();
        let mut status = session.health_check().await;
        for _ in 0..100 {
            if !status.is_healthy() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            status = session.health_check().await;
        }
        assert!(matches!(status, HealthStatus::Degraded(_)));
        session.stop().await.unwrap();
    }
}
