//! logwarden-core -- 공통 타입, trait, 에러, 설정
//!
//! 모든 logwarden 크레이트가 공유하는 기반 정의를 담습니다.
//!
//! - [`types`]: 정규화된 로그 레코드와 배치
//! - [`pipeline`]: 파서/파이프라인 trait과 상태 타입
//! - [`error`]: 도메인별 에러
//! - [`config`]: `logwarden.toml` 설정
//! - [`metrics`]: 메트릭 이름 상수

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{
    ConfigError, LogwardenError, ParseError, PipelineError, RuleError, SinkError,
};

// 설정
pub use config::LogwardenConfig;

// 파이프라인 trait
pub use pipeline::{HealthStatus, LogParser, Pipeline};

// 도메인 타입
pub use types::{Batch, LogRecord};
