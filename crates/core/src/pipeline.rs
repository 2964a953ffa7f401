//! 파이프라인 trait -- 모듈 확장 포인트 정의

use std::fmt;
use std::future::Future;

use serde::Serialize;

use crate::error::LogwardenError;
use crate::types::LogRecord;

/// 로그 파서 trait
///
/// 새로운 로그 형식을 지원하려면 이 trait을 구현합니다.
/// 파서는 소스별로 한 번 선택되어 해당 소스의 모든 라인을 처리합니다.
pub trait LogParser: Send + Sync {
    /// 지원하는 로그 형식 이름
    fn format_name(&self) -> &str;

    /// 한 라인을 정규화된 레코드로 파싱
    ///
    /// 어느 문법에도 맞지 않으면 형식 이름과 원문을 담은 에러를 반환합니다.
    fn parse(&self, line: &str, log_file: &str) -> Result<LogRecord, LogwardenError>;
}

/// 시작/정지/상태 확인 생명주기를 갖는 구성 요소
pub trait Pipeline: Send {
    /// 시작합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), LogwardenError>> + Send;

    /// 정지합니다. 진행 중인 작업을 정리한 뒤 반환합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), LogwardenError>> + Send;

    /// 현재 상태를 확인합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// 구성 요소 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 일부 기능 저하
    Degraded(String),
    /// 비정상
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 여부
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 비정상 여부
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}
