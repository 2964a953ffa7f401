//! 배치 싱크 -- 세션이 내보낸 배치를 소비합니다.
//!
//! # 구성
//! - [`BatchSink`]: 배치 하나를 받아 처리하는 trait
//! - [`CsvExportSink`]: CSV 파일에 추가 기록
//! - [`JsonLinesSink`]: 레코드당 JSON 한 줄 기록
//! - [`TracingSink`]: 배치 요약을 로그로 출력
//! - [`SinkDispatcher`]: 배치 채널을 끝까지 읽어 모든 싱크에 순서대로 전달
//!
//! 배치는 각 싱크에 한 번만 전달되며, 실패한 싱크는 재시도하지 않습니다.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::sync::mpsc;

use logwarden_core::metrics as m;
use logwarden_core::types::{Batch, LogRecord};

use crate::error::LogPipelineError;

/// CSV 헤더
pub const CSV_HEADER: [&str; 5] = ["Timestamp", "Level", "Source", "Message", "LogFile"];

/// 배치 싱크 trait
pub trait BatchSink: Send {
    /// 싱크 이름 (로그/메트릭 라벨)
    fn name(&self) -> &str;

    /// 배치 하나를 처리합니다.
    fn deliver(&mut self, batch: &Batch) -> Result<(), LogPipelineError>;
}

fn export_error(target: &Path, e: impl std::fmt::Display) -> LogPipelineError {
    LogPipelineError::Export {
        target: target.display().to_string(),
        reason: e.to_string(),
    }
}

fn write_csv_rows<W: Write>(
    writer: &mut csv::Writer<W>,
    records: &[LogRecord],
) -> Result<(), csv::Error> {
    for record in records {
        writer.write_record([
            record.timestamp.to_rfc3339().as_str(),
            record.level.as_str(),
            record.source.as_str(),
            record.message.as_str(),
            record.log_file.as_str(),
        ])?;
    }
    Ok(())
}

/// 레코드 목록을 CSV로 내보냅니다.
///
/// 헤더 한 줄과 레코드당 한 줄을 기록하고 기록한 레코드 수를 반환합니다.
/// 레코드가 없으면 에러입니다.
pub fn export_csv<W: Write>(records: &[LogRecord], writer: W) -> Result<usize, LogPipelineError> {
    if records.is_empty() {
        return Err(LogPipelineError::NothingToExport(
            "no logs to export".to_owned(),
        ));
    }

    let target = Path::new("<writer>");
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer
        .write_record(CSV_HEADER)
        .map_err(|e| export_error(target, e))?;
    write_csv_rows(&mut csv_writer, records).map_err(|e| export_error(target, e))?;
    csv_writer.flush().map_err(|e| export_error(target, e))?;

    Ok(records.len())
}

/// 특정 로그 파일에서 온 레코드만 CSV로 내보냅니다.
pub fn export_csv_for_log_file<W: Write>(
    records: &[LogRecord],
    log_file: &str,
    writer: W,
) -> Result<usize, LogPipelineError> {
    let filtered: Vec<LogRecord> = records
        .iter()
        .filter(|r| r.log_file == log_file)
        .cloned()
        .collect();

    if filtered.is_empty() {
        return Err(LogPipelineError::NothingToExport(format!(
            "no logs found for file: {log_file}"
        )));
    }

    export_csv(&filtered, writer)
}

/// CSV 파일 싱크
///
/// 파일이 비어 있을 때만 헤더를 쓰고 이후 배치는 뒤에 추가합니다.
/// 파일은 첫 배치에서 열립니다.
pub struct CsvExportSink {
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
}

impl CsvExportSink {
    /// 새 CSV 싱크를 생성합니다.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
        }
    }

    /// 출력 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<csv::Writer<File>, LogPipelineError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| export_error(&self.path, e))?;
        let is_empty = file
            .metadata()
            .map_err(|e| export_error(&self.path, e))?
            .len()
            == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if is_empty {
            writer
                .write_record(CSV_HEADER)
                .map_err(|e| export_error(&self.path, e))?;
        }
        Ok(writer)
    }
}

impl BatchSink for CsvExportSink {
    fn name(&self) -> &str {
        "csv"
    }

    fn deliver(&mut self, batch: &Batch) -> Result<(), LogPipelineError> {
        if self.writer.is_none() {
            self.writer = Some(self.open()?);
        }
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };

        write_csv_rows(writer, batch.records()).map_err(|e| export_error(&self.path, e))?;
        writer.flush().map_err(|e| export_error(&self.path, e))?;
        Ok(())
    }
}

/// JSON Lines 파일 싱크
pub struct JsonLinesSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl JsonLinesSink {
    /// 새 JSON Lines 싱크를 생성합니다.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
        }
    }

    /// 출력 경로
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BatchSink for JsonLinesSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    fn deliver(&mut self, batch: &Batch) -> Result<(), LogPipelineError> {
        if self.writer.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(|e| export_error(&self.path, e))?;
            self.writer = Some(BufWriter::new(file));
        }
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };

        for record in batch.records() {
            serde_json::to_writer(&mut *writer, record).map_err(|e| export_error(&self.path, e))?;
            writer
                .write_all(b"\n")
                .map_err(|e| export_error(&self.path, e))?;
        }
        writer.flush().map_err(|e| export_error(&self.path, e))?;
        Ok(())
    }
}

/// 배치 요약을 `tracing`으로 출력하는 싱크
#[derive(Debug, Default)]
pub struct TracingSink;

impl BatchSink for TracingSink {
    fn name(&self) -> &str {
        "tracing"
    }

    fn deliver(&mut self, batch: &Batch) -> Result<(), LogPipelineError> {
        let records = batch.records();
        let elevated = records
            .iter()
            .filter(|r| r.level != logwarden_core::types::LEVEL_INFO)
            .count();
        tracing::info!(
            log_file = batch.log_file(),
            records = records.len(),
            elevated,
            first = %records.first().map(|r| r.timestamp.to_rfc3339()).unwrap_or_default(),
            last = %records.last().map(|r| r.timestamp.to_rfc3339()).unwrap_or_default(),
            "batch received"
        );
        for record in records.iter().filter(|r| r.level != logwarden_core::types::LEVEL_INFO) {
            tracing::debug!(
                level = %record.level,
                source = %record.source,
                message = %record.message,
                "elevated record"
            );
        }
        Ok(())
    }
}

/// 디스패처 처리 요약
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    /// 받은 배치 수
    pub batches: u64,
    /// 받은 레코드 수
    pub records: u64,
    /// 싱크 실패 횟수 (싱크 x 배치 단위)
    pub failures: u64,
}

/// 싱크 디스패처
///
/// 배치 채널이 닫힐 때까지 읽으며 각 배치를 등록 순서대로 모든 싱크에 전달합니다.
/// 한 싱크의 실패는 다른 싱크에 영향을 주지 않습니다.
#[derive(Default)]
pub struct SinkDispatcher {
    sinks: Vec<Box<dyn BatchSink>>,
}

impl SinkDispatcher {
    /// 빈 디스패처를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 싱크를 추가합니다.
    pub fn with_sink(mut self, sink: Box<dyn BatchSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// 등록된 싱크 수
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// 싱크가 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// 등록된 싱크 이름
    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// 배치 하나를 모든 싱크에 전달하고 실패 수를 반환합니다.
    pub fn dispatch(&mut self, batch: &Batch) -> u64 {
        let mut failures = 0;
        for sink in &mut self.sinks {
            match sink.deliver(batch) {
                Ok(()) => {
                    metrics::counter!(m::SINK_RECORDS_WRITTEN_TOTAL, m::LABEL_SINK => sink.name().to_owned())
                        .increment(batch.len() as u64);
                }
                Err(e) => {
                    failures += 1;
                    metrics::counter!(m::SINK_FAILURES_TOTAL, m::LABEL_SINK => sink.name().to_owned())
                        .increment(1);
                    tracing::warn!(
                        sink = sink.name(),
                        log_file = batch.log_file(),
                        records = batch.len(),
                        error = %e,
                        "sink failed to accept batch"
                    );
                }
            }
        }
        failures
    }

    /// 채널이 닫힐 때까지 배치를 전달합니다.
    ///
    /// 싱크의 동기 파일 I/O는 `spawn_blocking`에서 실행되어 런타임 워커를 막지 않습니다.
    pub async fn run(self, mut rx: mpsc::Receiver<Batch>) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        tracing::info!(sinks = ?self.sink_names(), "sink dispatcher started");

        let mut dispatcher = self;
        while let Some(batch) = rx.recv().await {
            summary.batches += 1;
            summary.records += batch.len() as u64;

            let delivered = tokio::task::spawn_blocking(move || {
                let failures = dispatcher.dispatch(&batch);
                (dispatcher, failures)
            })
            .await;

            match delivered {
                Ok((returned, failures)) => {
                    dispatcher = returned;
                    summary.failures += failures;
                }
                Err(e) => {
                    tracing::error!(error = %e, "sink dispatch task failed, dispatcher stopped");
                    summary.failures += 1;
                    return summary;
                }
            }
        }

        tracing::info!(
            batches = summary.batches,
            records = summary.records,
            failures = summary.failures,
            "sink dispatcher drained"
        );
        summary
    }
}
