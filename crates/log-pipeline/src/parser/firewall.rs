//! 방화벽 로그 파서 (`ufw.log`)
//!
//! 형식: `TIMESTAMP HOST kernel: [TAG ACTION] BODY`
//!
//! BODY의 `KEY=value` 쌍에서 `SRC DST PROTO SPT DPT`를 추출하여
//! 요약 메시지를 합성합니다. 없는 키는 `N/A`로 채웁니다.
//! 차단 액션(`BLOCK`)은 구조적으로 `HIGH` 레벨을 받으며, 이후 룰 분류가 덮어쓸 수 있습니다.
//!
//! # 예시
//! ```text
//! 2024-01-15T12:00:00.123456+00:00 fw-01 kernel: [UFW BLOCK] IN=eth0 OUT= SRC=203.0.113.9 DST=10.0.0.2 PROTO=TCP SPT=51234 DPT=22
//! Jan 15 12:00:00 fw-01 kernel: [12345.678901] [UFW ALLOW] IN=eth0 SRC=10.0.0.3 DST=10.0.0.2 PROTO=UDP SPT=53 DPT=40000
//! ```

use std::sync::Arc;

use regex::Regex;

use logwarden_core::error::LogwardenError;
use logwarden_core::pipeline::LogParser;
use logwarden_core::types::{LEVEL_HIGH, LogRecord};

use super::timestamp;
use crate::error::LogPipelineError;
use crate::rule::RuleSet;

const FORMAT: &str = "firewall";

/// 구조적으로 `HIGH` 레벨을 받는 차단 액션
pub const BLOCK_ACTION: &str = "BLOCK";

/// 추출 대상 키가 없을 때 채우는 값
pub const NOT_AVAILABLE: &str = "N/A";

/// 메시지 합성에 쓰는 본문 키 (출력 순서)
const BODY_KEYS: [&str; 5] = ["SRC", "DST", "PROTO", "SPT", "DPT"];

/// 방화벽 로그 파서
pub struct FirewallParser {
    rfc3339_header: Regex,
    legacy_header: Regex,
    /// `BODY_KEYS` 순서와 같은 키별 추출 정규식
    body_keys: Vec<Regex>,
    rules: Arc<RuleSet>,
}

/// 헤더에서 분리한 구성 요소
struct Header<'a> {
    host: &'a str,
    action: &'a str,
    body: &'a str,
}

impl FirewallParser {
    /// 문법을 컴파일하여 파서를 생성합니다.
    pub fn new(rules: Arc<RuleSet>) -> Result<Self, LogPipelineError> {
        // 커널 uptime 스탬프 `[12345.678901]`는 선택
        const TAIL: &str = r"\s+(\S+)\s+kernel:\s+(?:\[\s*\d+\.\d+\]\s+)?\[(\S+)\s+([^\]]+)\]\s*(.*)$";

        let body_keys = BODY_KEYS
            .iter()
            .map(|key| Regex::new(&format!(r"(?:^|\s){key}=(\S+)")))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            rfc3339_header: Regex::new(&format!(r"^(\d{{4}}-\d{{2}}-\d{{2}}T\S+){TAIL}"))?,
            legacy_header: Regex::new(&format!(
                r"^([A-Z][a-z]{{2}}\s+\d{{1,2}}\s\d{{2}}:\d{{2}}:\d{{2}}){TAIL}"
            ))?,
            body_keys,
            rules,
        })
    }

    fn parse_line(&self, line: &str, log_file: &str) -> Result<LogRecord, LogPipelineError> {
        let (timestamp, header) = if let Some(caps) = self.rfc3339_header.captures(line) {
            let ts = timestamp::parse_iso8601(&caps[1])
                .map_err(|reason| self.timestamp_error(&caps[1], reason))?;
            (ts, Self::header(&caps))
        } else if let Some(caps) = self.legacy_header.captures(line) {
            let ts = timestamp::parse_legacy(&caps[1], timestamp::current_year())
                .map_err(|reason| self.timestamp_error(&caps[1], reason))?;
            (ts, Self::header(&caps))
        } else {
            return Err(LogPipelineError::Parse {
                format: FORMAT.to_owned(),
                line: line.to_owned(),
            });
        };

        let [src, dst, proto, spt, dpt] = self.extract_keys(header.body);
        let message =
            format!("Action: {} --- {src} -> {dst} [{proto}] SPT:{spt} DPT:{dpt}", header.action);

        let mut record = LogRecord::new(timestamp, header.host, message, log_file, line);
        if header.action == BLOCK_ACTION {
            record.level = LEVEL_HIGH.to_owned();
        }
        self.rules.apply(&mut record);
        Ok(record)
    }

    fn header<'a>(caps: &regex::Captures<'a>) -> Header<'a> {
        let text = |idx: usize| caps.get(idx).map_or("", |m| m.as_str());
        Header {
            host: text(2),
            action: text(4).trim(),
            body: text(5),
        }
    }

    fn extract_keys<'a>(&self, body: &'a str) -> [&'a str; 5] {
        let mut values = [NOT_AVAILABLE; 5];
        for (slot, pattern) in values.iter_mut().zip(&self.body_keys) {
            if let Some(value) = pattern.captures(body).and_then(|c| c.get(1)) {
                *slot = value.as_str();
            }
        }
        values
    }

    fn timestamp_error(&self, value: &str, reason: String) -> LogPipelineError {
        LogPipelineError::Timestamp {
            format: FORMAT.to_owned(),
            value: value.to_owned(),
            reason,
        }
    }
}

impl LogParser for FirewallParser {
    fn format_name(&self) -> &str {
        FORMAT
    }

    fn parse(&self, line: &str, log_file: &str) -> Result<LogRecord, LogwardenError> {
        self.parse_line(line, log_file).map_err(LogwardenError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::RuleDefinition;
    use chrono::Datelike;
    use logwarden_core::error::ParseError;
    use logwarden_core::types::LEVEL_INFO;

    const LOG_FILE: &str = "/var/log/host/ufw.log";

    fn parser() -> FirewallParser {
        FirewallParser::new(Arc::new(RuleSet::empty())).unwrap()
    }

    #[test]
    fn parse_block_line() {
        let line = "2024-01-15T12:00:00.123456+00:00 fw-01 kernel: [UFW BLOCK] IN=eth0 OUT= MAC=aa:bb SRC=203.0.113.9 DST=10.0.0.2 LEN=60 PROTO=TCP SPT=51234 DPT=22 WINDOW=64240 SYN";
        let record = parser().parse(line, LOG_FILE).unwrap();
        assert_eq!(
            record.message,
            "Action: BLOCK --- 203.0.113.9 -> 10.0.0.2 [TCP] SPT:51234 DPT:22"
        );
        assert_eq!(record.source, "fw-01");
        assert_eq!(record.level, LEVEL_HIGH);
        assert_eq!(record.raw, line);
        assert_eq!(record.log_file, LOG_FILE);
    }

    #[test]
    fn repeated_parse_is_identical() {
        let p = parser();
        let line = "2024-01-15T12:00:00.5+09:00 fw-01 kernel: [UFW BLOCK] IN=eth0 SRC=198.51.100.7 DST=10.0.0.2 PROTO=UDP SPT=5353 DPT=53  ";
        let a = p.parse(line, LOG_FILE).unwrap();
        let b = p.parse(line, LOG_FILE).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.raw, line);
        assert_eq!(
            a.message,
            "Action: BLOCK --- 198.51.100.7 -> 10.0.0.2 [UDP] SPT:5353 DPT:53"
        );
    }

    #[test]
    fn parse_allow_line_is_info() {
        let line = "2024-01-15T12:00:00+09:00 fw-01 kernel: [UFW ALLOW] SRC=10.0.0.3 DST=10.0.0.2 PROTO=UDP SPT=53 DPT=40000";
        let record = parser().parse(line, LOG_FILE).unwrap();
        assert_eq!(record.level, LEVEL_INFO);
        assert!(record.message.starts_with("Action: ALLOW --- "));
        assert_eq!(record.timestamp.offset().local_minus_utc(), 9 * 3600);
    }

    #[test]
    fn missing_keys_become_not_available() {
        let line = "2024-01-15T12:00:00Z fw-01 kernel: [UFW AUDIT] IN=lo OUT= SRC=127.0.0.1 PROTO=2";
        let record = parser().parse(line, LOG_FILE).unwrap();
        assert_eq!(
            record.message,
            "Action: AUDIT --- 127.0.0.1 -> N/A [2] SPT:N/A DPT:N/A"
        );
    }

    #[test]
    fn empty_body_yields_all_placeholders() {
        let line = "2024-01-15T12:00:00Z fw-01 kernel: [UFW BLOCK]";
        let record = parser().parse(line, LOG_FILE).unwrap();
        assert_eq!(
            record.message,
            "Action: BLOCK --- N/A -> N/A [N/A] SPT:N/A DPT:N/A"
        );
    }

    #[test]
    fn key_prefix_of_other_key_is_not_confused() {
        // MACSRC= 같은 키가 SRC=로 잘못 잡히면 안 됨
        let line = "2024-01-15T12:00:00Z fw kernel: [UFW BLOCK] MACSRC=aa:bb DST=10.0.0.2";
        let record = parser().parse(line, LOG_FILE).unwrap();
        assert!(record.message.contains("--- N/A -> 10.0.0.2"));
    }

    #[test]
    fn parse_legacy_header_with_uptime_stamp() {
        let line = "Jan 15 12:00:00 fw-01 kernel: [12345.678901] [UFW BLOCK] IN=eth0 SRC=1.2.3.4 DST=5.6.7.8 PROTO=TCP SPT=1 DPT=2";
        let record = parser().parse(line, LOG_FILE).unwrap();
        assert_eq!(record.timestamp.year(), timestamp::current_year());
        assert_eq!(
            record.message,
            "Action: BLOCK --- 1.2.3.4 -> 5.6.7.8 [TCP] SPT:1 DPT:2"
        );
    }

    #[test]
    fn multi_word_action_is_kept() {
        let line = "2024-01-15T12:00:00Z fw kernel: [UFW LIMIT BLOCK] SRC=1.1.1.1";
        let record = parser().parse(line, LOG_FILE).unwrap();
        assert!(record.message.starts_with("Action: LIMIT BLOCK --- "));
        assert_eq!(record.level, LEVEL_INFO);
    }

    #[test]
    fn unparseable_timestamp_is_error() {
        let line = "2024-99-99T99:99:99Z fw-01 kernel: [UFW BLOCK] SRC=1.1.1.1";
        let err = parser().parse(line, LOG_FILE).unwrap_err();
        assert!(matches!(
            err,
            LogwardenError::Parse(ParseError::Timestamp { .. })
        ));
    }

    #[test]
    fn non_kernel_line_is_mismatch() {
        let line = "2024-01-15T12:00:00Z fw-01 sshd[1]: [UFW BLOCK] SRC=1.1.1.1";
        let err = parser().parse(line, LOG_FILE).unwrap_err();
        assert!(matches!(
            err,
            LogwardenError::Parse(ParseError::Mismatch { .. })
        ));
    }

    #[test]
    fn rule_can_override_block_level() {
        let rules = RuleSet::from_definitions(&[RuleDefinition::new(
            "internal-scan",
            r"--- 10\.",
            "LOW",
        )])
        .unwrap();
        let parser = FirewallParser::new(Arc::new(rules)).unwrap();
        let line = "2024-01-15T12:00:00Z fw kernel: [UFW BLOCK] SRC=10.0.0.9 DST=10.0.0.2";
        assert_eq!(parser.parse(line, LOG_FILE).unwrap().level, "LOW");
    }

    #[test]
    fn rule_can_raise_block_level() {
        let rules = RuleSet::from_definitions(&[RuleDefinition::new(
            "ssh-block",
            r"Action: BLOCK .* DPT:22$",
            "CRITICAL",
        )])
        .unwrap();
        let parser = FirewallParser::new(Arc::new(rules)).unwrap();
        let line = "2024-01-15T12:00:00Z fw kernel: [UFW BLOCK] SRC=1.1.1.1 DST=2.2.2.2 PROTO=TCP SPT=4 DPT=22";
        assert_eq!(parser.parse(line, LOG_FILE).unwrap().level, "CRITICAL");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn parse_arbitrary_input_does_not_panic(line in ".{0,500}") {
                let _ = parser().parse(&line, LOG_FILE);
            }

            #[test]
            fn placeholders_fill_every_missing_key(
                src in proptest::option::of("[0-9.]{7,15}"),
                dpt in proptest::option::of(1u16..),
            ) {
                let mut body = String::new();
                if let Some(src) = &src {
                    body.push_str(&format!("SRC={src} "));
                }
                if let Some(dpt) = dpt {
                    body.push_str(&format!("DPT={dpt}"));
                }
                let line = format!("2024-01-15T12:00:00Z fw kernel: [UFW BLOCK] {body}");
                let record = parser().parse(&line, LOG_FILE).unwrap();
                let expected = format!(
                    "Action: BLOCK --- {} -> N/A [N/A] SPT:N/A DPT:{}",
                    src.as_deref().unwrap_or("N/A"),
                    dpt.map(|d| d.to_string()).unwrap_or_else(|| "N/A".to_owned()),
                );
                prop_assert_eq!(record.message, expected);
                prop_assert_eq!(record.level, LEVEL_HIGH);
            }
        }
    }
}
