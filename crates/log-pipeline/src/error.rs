//! 로그 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 로그 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<LogPipelineError> for LogwardenError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use logwarden_core::error::{
    ConfigError, LogwardenError, ParseError, PipelineError, RuleError, SinkError,
};

/// 로그 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// 어떤 문법에도 맞지 않는 라인
    #[error("{format} parser could not match line: {line}")]
    Parse {
        /// 파서 형식 (auth, syslog, firewall)
        format: String,
        /// 원문 라인
        line: String,
    },

    /// 구조는 맞지만 타임스탬프를 해석할 수 없음
    #[error("{format} parser rejected timestamp '{value}': {reason}")]
    Timestamp {
        /// 파서 형식
        format: String,
        /// 타임스탬프 토큰
        value: String,
        /// 실패 사유
        reason: String,
    },

    /// 파서 테이블에 없는 경로
    #[error("unsupported log source: {0}")]
    UnsupportedSource(String),

    /// 룰 파일 로딩 실패
    #[error("rule load error: {path}: {reason}")]
    RuleLoad {
        /// 룰 파일 경로
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// 룰 유효성 검증 실패
    #[error("rule validation error: rule '{rule}': {reason}")]
    RuleValidation {
        /// 문제가 된 룰 이름
        rule: String,
        /// 검증 실패 사유
        reason: String,
    },

    /// 룰 패턴 컴파일 실패
    #[error("failed to compile regex for rule '{rule}': {reason}")]
    RuleCompile {
        /// 문제가 된 룰 이름
        rule: String,
        /// 컴파일 실패 사유
        reason: String,
    },

    /// 테일러 에러 (파일 열기 실패 등)
    #[error("collector error: {path}: {reason}")]
    Collector {
        /// 로그 파일 경로
        path: String,
        /// 에러 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// 내보낼 레코드가 없음
    #[error("{0}")]
    NothingToExport(String),

    /// 싱크 쓰기 실패
    #[error("export error: {target}: {reason}")]
    Export {
        /// 출력 대상 (파일 경로 등)
        target: String,
        /// 실패 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl LogPipelineError {
    /// 라인 단위로 복구 가능한 에러인지 여부
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::Timestamp { .. })
    }
}

impl From<LogPipelineError> for LogwardenError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::Parse { format, line } => {
                ParseError::Mismatch { format, line }.into()
            }
            LogPipelineError::Timestamp {
                format,
                value,
                reason,
            } => ParseError::Timestamp {
                format,
                value,
                reason,
            }
            .into(),
            LogPipelineError::UnsupportedSource(path) => ParseError::UnsupportedSource(path).into(),
            LogPipelineError::RuleLoad { path, reason } => RuleError::Load { path, reason }.into(),
            LogPipelineError::RuleValidation { rule, reason }
            | LogPipelineError::RuleCompile { rule, reason } => {
                RuleError::Compile { rule, reason }.into()
            }
            LogPipelineError::Config { field, reason } => {
                ConfigError::InvalidValue { field, reason }.into()
            }
            LogPipelineError::NothingToExport(reason) => SinkError::Empty(reason).into(),
            LogPipelineError::Export { target, reason } => {
                SinkError::Write { target, reason }.into()
            }
            LogPipelineError::Io(e) => LogwardenError::Io(e),
            other @ (LogPipelineError::Collector { .. }
            | LogPipelineError::Channel(_)
            | LogPipelineError::Regex(_)) => {
                PipelineError::InitFailed(other.to_string()).into()
            }
        }
    }
}
