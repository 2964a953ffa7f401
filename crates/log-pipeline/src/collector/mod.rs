//! 로그 수집 모듈 -- 파일을 따라 읽어 원시 라인을 생성합니다.
//!
//! # 수집 소스
//! - [`FileTailer`]: 파일 감시 (`tail -F` 방식, 폴링 기반)
//!
//! # 아키텍처
//! 각 테일러는 모니터링 유닛 하나가 단독으로 소유하며,
//! 유닛 태스크의 `tokio::select!` 루프 안에서 [`FileTailer::next_line`]으로 구동됩니다.

pub mod file;

pub use file::{FileTailer, FileTailerConfig, StartPosition};
