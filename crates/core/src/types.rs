//! 도메인 타입 -- 시스템 전역에서 사용되는 공통 타입
//!
//! 파서가 만들어 내는 [`LogRecord`]와 배처가 싱크로 넘기는 [`Batch`]를 정의합니다.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// 분류 전 기본 레벨
pub const LEVEL_INFO: &str = "INFO";

/// 차단 액션 방화벽 라인에 부여되는 구조적 레벨
pub const LEVEL_HIGH: &str = "HIGH";

/// 정규화된 로그 레코드
///
/// 소스 형식과 무관하게 하나의 라인을 표현합니다.
/// `raw`는 항상 입력 라인 그대로이며, 나머지 필드는 형식별 파서가 채웁니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// 라인에서 해석한 시각 (도착 시각이 아님)
    pub timestamp: DateTime<FixedOffset>,
    /// 심각도 레이블 (`INFO`, `HIGH`, `CRITICAL` 등 열린 집합)
    pub level: String,
    /// 형식별 출처 (auth: `host/program[pid]`, syslog: 프로그램 태그, firewall: 호스트)
    pub source: String,
    /// 메시지 본문 (firewall은 합성 메시지)
    pub message: String,
    /// 원본 로그 파일 경로
    pub log_file: String,
    /// 입력 라인 원문
    pub raw: String,
}

impl LogRecord {
    /// 기본 레벨(`INFO`)로 레코드를 생성합니다.
    pub fn new(
        timestamp: DateTime<FixedOffset>,
        source: impl Into<String>,
        message: impl Into<String>,
        log_file: impl Into<String>,
        raw: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            level: LEVEL_INFO.to_owned(),
            source: source.into(),
            message: message.into(),
            log_file: log_file.into(),
            raw: raw.into(),
        }
    }

    /// 레벨을 지정합니다.
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}: {}",
            self.timestamp.to_rfc3339(),
            self.level,
            self.source,
            self.message,
        )
    }
}

/// 하나의 소스에서 나온 레코드 묶음
///
/// 비어 있지 않으며 모든 레코드의 `log_file`이 같습니다.
/// 생성은 [`Batch::new`]로만 가능하므로 두 불변식이 항상 유지됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Batch {
    log_file: String,
    records: Vec<LogRecord>,
}

impl Batch {
    /// 레코드 목록으로 배치를 만듭니다.
    ///
    /// 목록이 비어 있거나 `log_file`이 서로 다른 레코드가 섞여 있으면 `None`을 반환합니다.
    pub fn new(records: Vec<LogRecord>) -> Option<Self> {
        let log_file = records.first()?.log_file.clone();
        if records.iter().any(|r| r.log_file != log_file) {
            return None;
        }
        Some(Self { log_file, records })
    }

    /// 원본 로그 파일 경로
    pub fn log_file(&self) -> &str {
        &self.log_file
    }

    /// 레코드 슬라이스 (추가 순서 유지)
    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    /// 레코드 수
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// 항상 `false` (빈 배치는 만들어지지 않음)
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 레코드 소유권을 넘겨받습니다.
    pub fn into_records(self) -> Vec<LogRecord> {
        self.records
    }
}

impl fmt::Display for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch of {} from {}", self.records.len(), self.log_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(log_file: &str, message: &str) -> LogRecord {
        let ts = DateTime::parse_from_rfc3339("2024-01-15T12:00:00+09:00").unwrap();
        LogRecord::new(ts, "web-01/sshd", message, log_file, message)
    }

    #[test]
    fn new_record_defaults_to_info() {
        let r = record("/var/log/auth.log", "hello");
        assert_eq!(r.level, LEVEL_INFO);
    }

    #[test]
    fn with_level_overrides() {
        let r = record("/var/log/auth.log", "hello").with_level(LEVEL_HIGH);
        assert_eq!(r.level, "HIGH");
    }

    #[test]
    fn record_display() {
        let r = record("/var/log/auth.log", "Accepted password");
        let display = r.to_string();
        assert!(display.contains("[INFO]"));
        assert!(display.contains("web-01/sshd: Accepted password"));
        assert!(display.starts_with("2024-01-15T12:00:00+09:00"));
    }

    #[test]
    fn record_serialize_roundtrip_keeps_offset() {
        let r = record("/var/log/auth.log", "hello");
        let json = serde_json::to_string(&r).unwrap();
        let back: LogRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(r, back);
        assert_eq!(back.timestamp.offset().local_minus_utc(), 9 * 3600);
    }

    #[test]
    fn batch_rejects_empty() {
        assert!(Batch::new(Vec::new()).is_none());
    }

    #[test]
    fn batch_rejects_mixed_log_files() {
        let records = vec![record("/a.log", "1"), record("/b.log", "2")];
        assert!(Batch::new(records).is_none());
    }

    #[test]
    fn batch_keeps_order() {
        let records = vec![record("/a.log", "1"), record("/a.log", "2")];
        let batch = Batch::new(records).unwrap();
        assert_eq!(batch.len(), 2);
        assert!(!batch.is_empty());
        assert_eq!(batch.log_file(), "/a.log");
        assert_eq!(batch.records()[0].message, "1");
        assert_eq!(batch.records()[1].message, "2");
        assert_eq!(batch.to_string(), "batch of 2 from /a.log");
    }
}
