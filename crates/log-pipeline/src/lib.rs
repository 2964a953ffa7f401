//! logwarden 로그 파이프라인
//!
//! 추가 전용 로그 파일을 따라 읽고, 형식별로 정규화하고, 심각도 룰로 분류한 뒤
//! 크기/시간 기준 배치로 묶어 싱크에 전달합니다.
//!
//! # 모듈 구성
//!
//! - [`collector`]: 파일 테일러 (잘림/로테이션 대응, 폴링 기반)
//! - [`parser`]: 인증/시스템/방화벽 로그 파서와 경로 기반 선택기
//! - [`rule`]: YAML 심각도 룰 로딩과 분류
//! - [`buffer`]: 레코드 배처
//! - [`sink`]: 배치 싱크 (CSV, JSON Lines, tracing)와 디스패처
//! - [`pipeline`]: 모니터링 세션 (Pipeline trait 구현)
//! - [`config`]: 파이프라인 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! FileTailer -> LogParser (+ RuleSet) -> Batcher -> mpsc<Batch> -> SinkDispatcher
//!     |              |                      |                          |
//!  소스별 1개     auth/syslog/firewall   크기 또는 간격           CSV/JSONL/tracing
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod sink;

pub mod collector;
pub mod parser;
pub mod rule;

mod unit;

// --- 주요 타입 re-export ---

// 세션
pub use pipeline::{MonitorSession, MonitorSessionBuilder};

// 설정
pub use config::{PipelineConfig, PipelineConfigBuilder};

// 에러
pub use error::LogPipelineError;

// 파서
pub use parser::{AuthParser, FirewallParser, FormatKind, ParserSelector, SyslogParser};

// 룰
pub use rule::{RuleDefinition, RuleLoader, RuleSet};

// 수집기
pub use collector::{FileTailer, FileTailerConfig, StartPosition};

// 배처
pub use buffer::Batcher;

// 싱크
pub use sink::{
    BatchSink, CsvExportSink, DispatchSummary, JsonLinesSink, SinkDispatcher, TracingSink,
    export_csv, export_csv_for_log_file,
};
