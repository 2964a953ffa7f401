//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logwarden_`
//! - 모듈명: `monitor_`, `sink_`, `daemon_`
//! - 접미어: `_total` (counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(logwarden_core::metrics::MONITOR_LINES_READ_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 파서 형식 레이블 키 (auth, syslog, firewall)
pub const LABEL_PARSER_FORMAT: &str = "format";

/// 심각도 레이블 키
pub const LABEL_LEVEL: &str = "level";

/// 싱크 이름 레이블 키 (csv, jsonl, tracing)
pub const LABEL_SINK: &str = "sink";

/// 배치 플러시 사유 레이블 키 (size, interval, shutdown)
pub const LABEL_FLUSH_REASON: &str = "reason";

// ─── Monitor 메트릭 ────────────────────────────────────────────────

/// Monitor: 소스에서 읽은 라인 수 (counter)
pub const MONITOR_LINES_READ_TOTAL: &str = "logwarden_monitor_lines_read_total";

/// Monitor: 파싱에 성공한 레코드 수 (counter, label: format)
pub const MONITOR_RECORDS_PARSED_TOTAL: &str = "logwarden_monitor_records_parsed_total";

/// Monitor: 파싱 실패로 버린 라인 수 (counter, label: format)
pub const MONITOR_PARSE_ERRORS_TOTAL: &str = "logwarden_monitor_parse_errors_total";

/// Monitor: 룰에 의해 레벨이 지정된 레코드 수 (counter, label: level)
pub const MONITOR_RULE_MATCHES_TOTAL: &str = "logwarden_monitor_rule_matches_total";

/// Monitor: 플러시된 배치 수 (counter, label: reason)
pub const MONITOR_BATCHES_FLUSHED_TOTAL: &str = "logwarden_monitor_batches_flushed_total";

/// Monitor: 파일 잘림/교체 감지 횟수 (counter)
pub const MONITOR_FILE_RESETS_TOTAL: &str = "logwarden_monitor_file_resets_total";

/// Monitor: 실행 중인 소스 수 (gauge)
pub const MONITOR_ACTIVE_SOURCES: &str = "logwarden_monitor_active_sources";

/// Monitor: 로드된 룰 수 (gauge)
pub const MONITOR_RULES_LOADED: &str = "logwarden_monitor_rules_loaded";

// ─── Sink 메트릭 ───────────────────────────────────────────────────

/// Sink: 전달된 레코드 수 (counter, label: sink)
pub const SINK_RECORDS_WRITTEN_TOTAL: &str = "logwarden_sink_records_written_total";

/// Sink: 전달 실패 수 (counter, label: sink)
pub const SINK_FAILURES_TOTAL: &str = "logwarden_sink_failures_total";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "logwarden_daemon_uptime_seconds";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "logwarden_daemon_build_info";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 이 함수는 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    // Monitor
    describe_counter!(
        MONITOR_LINES_READ_TOTAL,
        "Total number of non-blank lines read from all monitored files"
    );
    describe_counter!(
        MONITOR_RECORDS_PARSED_TOTAL,
        "Total number of lines successfully parsed into records"
    );
    describe_counter!(
        MONITOR_PARSE_ERRORS_TOTAL,
        "Total number of lines dropped because no grammar matched"
    );
    describe_counter!(
        MONITOR_RULE_MATCHES_TOTAL,
        "Total number of records whose level was set by a severity rule"
    );
    describe_counter!(
        MONITOR_BATCHES_FLUSHED_TOTAL,
        "Total number of batches handed to sinks"
    );
    describe_counter!(
        MONITOR_FILE_RESETS_TOTAL,
        "Total number of truncations or rotations detected"
    );
    describe_gauge!(
        MONITOR_ACTIVE_SOURCES,
        "Number of log sources currently being tailed"
    );
    describe_gauge!(MONITOR_RULES_LOADED, "Number of severity rules loaded");

    // Sink
    describe_counter!(
        SINK_RECORDS_WRITTEN_TOTAL,
        "Total number of records written by each sink"
    );
    describe_counter!(
        SINK_FAILURES_TOTAL,
        "Total number of batch deliveries that failed per sink"
    );

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "logwarden daemon uptime in seconds");
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}
