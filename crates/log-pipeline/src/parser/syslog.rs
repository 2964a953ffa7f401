//! 시스템 로그 파서 (`syslog`)
//!
//! 형식: `TIMESTAMP HOST PROGRAM: MESSAGE`
//!
//! 두 문법을 순서대로 시도합니다.
//! 1. RFC 3339 타임스탬프 (소수 초/오프셋 선택, 오프셋 없으면 UTC)
//! 2. 레거시 BSD 타임스탬프 `Mon  D HH:MM:SS` (연도 없음, 현재 연도 가정)
//!
//! 구조는 맞지만 타임스탬프를 해석할 수 없으면 다음 문법으로 넘어갑니다.

use std::sync::Arc;

use regex::Regex;

use logwarden_core::error::LogwardenError;
use logwarden_core::pipeline::LogParser;
use logwarden_core::types::LogRecord;

use super::timestamp;
use crate::error::LogPipelineError;
use crate::rule::RuleSet;

const FORMAT: &str = "syslog";

/// 시스템 로그 파서
pub struct SyslogParser {
    rfc3339: Regex,
    legacy: Regex,
    rules: Arc<RuleSet>,
}

impl SyslogParser {
    /// 문법을 컴파일하여 파서를 생성합니다.
    pub fn new(rules: Arc<RuleSet>) -> Result<Self, LogPipelineError> {
        Ok(Self {
            rfc3339: Regex::new(r"^(\S+)\s+([\w.-]+)\s+([^:]+):\s+(.*)$")?,
            legacy: Regex::new(
                r"^([A-Z][a-z]{2}\s+\d{1,2}\s\d{2}:\d{2}:\d{2})\s+(\S+)\s+([^:]+):\s+(.*)$",
            )?,
            rules,
        })
    }

    fn parse_line(&self, line: &str, log_file: &str) -> Result<LogRecord, LogPipelineError> {
        let mut timestamp_error = None;

        if let Some(caps) = self.rfc3339.captures(line) {
            match timestamp::parse_iso8601(&caps[1]) {
                Ok(ts) => return Ok(self.build(ts, &caps[3], &caps[4], log_file, line)),
                Err(reason) => {
                    timestamp_error = Some((caps[1].to_owned(), reason));
                }
            }
        }

        if let Some(caps) = self.legacy.captures(line) {
            match timestamp::parse_legacy(&caps[1], timestamp::current_year()) {
                Ok(ts) => return Ok(self.build(ts, &caps[3], &caps[4], log_file, line)),
                Err(reason) => {
                    timestamp_error = Some((caps[1].to_owned(), reason));
                }
            }
        }

        tracing::trace!(
            line,
            timestamp_error = ?timestamp_error,
            "no syslog grammar produced a record"
        );

        Err(LogPipelineError::Parse {
            format: FORMAT.to_owned(),
            line: line.to_owned(),
        })
    }

    fn build(
        &self,
        timestamp: chrono::DateTime<chrono::FixedOffset>,
        program: &str,
        message: &str,
        log_file: &str,
        line: &str,
    ) -> LogRecord {
        let mut record = LogRecord::new(
            timestamp,
            program.trim(),
            message.trim(),
            log_file,
            line,
        );
        self.rules.apply(&mut record);
        record
    }
}

impl LogParser for SyslogParser {
    fn format_name(&self) -> &str {
        FORMAT
    }

    fn parse(&self, line: &str, log_file: &str) -> Result<LogRecord, LogwardenError> {
        self.parse_line(line, log_file).map_err(LogwardenError::from)
    }
}
