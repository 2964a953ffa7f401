//! 에러 타입 -- 도메인별 에러 정의

/// logwarden 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LogwardenError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 파싱 에러
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// 룰 로딩/컴파일 에러
    #[error("rule error: {0}")]
    Rule(#[from] RuleError),

    /// 싱크(내보내기) 에러
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인(모니터링 세션) 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 이미 실행 중
    #[error("pipeline is already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline is not running")]
    NotRunning,
}

/// 파싱 에러
///
/// 라인 단위 파싱 실패는 복구 가능한 에러입니다.
/// 해당 라인만 버리고 소스 처리는 계속됩니다.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// 지원하지 않는 로그 소스
    #[error("unsupported log source: {0}")]
    UnsupportedSource(String),

    /// 어떤 문법에도 맞지 않는 라인
    #[error("{format} parser could not match line: {line}")]
    Mismatch { format: String, line: String },

    /// 타임스탬프 해석 실패
    #[error("{format} parser rejected timestamp '{value}': {reason}")]
    Timestamp {
        format: String,
        value: String,
        reason: String,
    },
}

/// 룰 에러
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// 룰 파일 로드 실패
    #[error("failed to load rules from '{path}': {reason}")]
    Load { path: String, reason: String },

    /// 룰 패턴 컴파일 실패
    #[error("failed to compile regex for rule '{rule}': {reason}")]
    Compile { rule: String, reason: String },
}

/// 싱크 에러
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// 내보낼 레코드가 없음
    #[error("{0}")]
    Empty(String),

    /// 쓰기 실패
    #[error("failed to write '{target}': {reason}")]
    Write { target: String, reason: String },
}
