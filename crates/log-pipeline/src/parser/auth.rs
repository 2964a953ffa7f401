//! 인증 로그 파서 (`auth.log`)
//!
//! 형식: `TIMESTAMP HOST PROGRAM[PID]: MESSAGE`
//!
//! TIMESTAMP는 소수 초가 있는 ISO 8601입니다. 오프셋이 있는 문법을 먼저 시도하고,
//! 오프셋이 없는 문법(UTC로 해석)을 다음으로 시도합니다.
//!
//! # 예시
//! ```text
//! 2024-01-15T12:00:00.123456+09:00 web-01 sshd[1234]: Failed password for root from 10.0.0.5
//! 2024-01-15T12:00:00.123456 web-01 sudo: alice : TTY=pts/0 ; USER=root
//! ```

use std::sync::Arc;

use regex::Regex;

use logwarden_core::error::LogwardenError;
use logwarden_core::pipeline::LogParser;
use logwarden_core::types::LogRecord;

use super::timestamp;
use crate::error::LogPipelineError;
use crate::rule::RuleSet;

const FORMAT: &str = "auth";

/// 인증 로그 파서
pub struct AuthParser {
    /// 오프셋 포함 문법 (우선)
    with_offset: Regex,
    /// 오프셋 없는 문법
    without_offset: Regex,
    rules: Arc<RuleSet>,
}

impl AuthParser {
    /// 문법을 컴파일하여 파서를 생성합니다.
    pub fn new(rules: Arc<RuleSet>) -> Result<Self, LogPipelineError> {
        Ok(Self {
            with_offset: Regex::new(
                r"^(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d+(?:Z|[+-]\d{2}:\d{2}))\s+(\S+)\s+(\S+?)(?:\[(\d+)\])?:\s+(.+)$",
            )?,
            without_offset: Regex::new(
                r"^(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d+)\s+(\S+)\s+(\S+?)(?:\[(\d+)\])?:\s+(.+)$",
            )?,
            rules,
        })
    }

    fn parse_line(&self, line: &str, log_file: &str) -> Result<LogRecord, LogPipelineError> {
        let mut timestamp_error = None;

        for grammar in [&self.with_offset, &self.without_offset] {
            let Some(caps) = grammar.captures(line) else {
                continue;
            };

            let ts_token = &caps[1];
            let timestamp = match timestamp::parse_iso8601(ts_token) {
                Ok(ts) => ts,
                Err(reason) => {
                    timestamp_error = Some(LogPipelineError::Timestamp {
                        format: FORMAT.to_owned(),
                        value: ts_token.to_owned(),
                        reason,
                    });
                    continue;
                }
            };

            let host = &caps[2];
            let program = &caps[3];
            let source = match caps.get(4) {
                Some(pid) => format!("{host}/{program}[{}]", pid.as_str()),
                None => format!("{host}/{program}"),
            };

            let mut record = LogRecord::new(timestamp, source, &caps[5], log_file, line);
            self.rules.apply(&mut record);
            return Ok(record);
        }

        Err(timestamp_error.unwrap_or_else(|| LogPipelineError::Parse {
            format: FORMAT.to_owned(),
            line: line.to_owned(),
        }))
    }
}

impl LogParser for AuthParser {
    fn format_name(&self) -> &str {
        FORMAT
    }

    fn parse(&self, line: &str, log_file: &str) -> Result<LogRecord, LogwardenError> {
        self.parse_line(line, log_file).map_err(LogwardenError::from)
    }
}
