//! 모니터링 유닛 -- 소스 하나에 대한 테일러/파서/배처 묶음
//!
//! 유닛은 자체 tokio 태스크에서 실행되며 다른 유닛과 상태를 공유하지 않습니다.
//! 라인 도착, 플러시 타이머, 취소는 하나의 `tokio::select!` 루프에서 순서대로 처리됩니다.
//!
//! ```text
//! FileTailer --line--> LogParser --record--> Batcher --batch--> mpsc::Sender<Batch>
//!                                              ^
//!                                     interval tick (flush)
//! ```

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use logwarden_core::metrics as m;
use logwarden_core::pipeline::LogParser;
use logwarden_core::types::Batch;

use crate::buffer::Batcher;
use crate::collector::{FileTailer, FileTailerConfig};
use crate::error::LogPipelineError;

/// 라인 공급원
///
/// `next_line`은 취소 안전해야 합니다.
pub(crate) trait LineSource: Send {
    fn next_line(&mut self) -> impl Future<Output = String> + Send;
}

impl LineSource for FileTailer {
    async fn next_line(&mut self) -> String {
        FileTailer::next_line(self).await
    }
}

/// 유닛 처리 통계
///
/// 유닛 태스크가 갱신하고 세션이 합산하여 읽습니다.
#[derive(Debug, Default)]
pub(crate) struct UnitStats {
    pub(crate) lines_read: AtomicU64,
    pub(crate) records_parsed: AtomicU64,
    pub(crate) parse_errors: AtomicU64,
    pub(crate) batches_emitted: AtomicU64,
}

impl UnitStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// 모니터링 유닛
pub(crate) struct MonitorUnit {
    pub(crate) path: PathBuf,
    pub(crate) parser: Box<dyn LogParser>,
    pub(crate) tailer_config: FileTailerConfig,
    pub(crate) batch_size: usize,
    pub(crate) flush_interval: Duration,
    pub(crate) flush_on_shutdown: bool,
    pub(crate) batch_tx: mpsc::Sender<Batch>,
    pub(crate) stats: Arc<UnitStats>,
}

impl MonitorUnit {
    /// 파일을 열고 취소될 때까지 처리합니다.
    ///
    /// 파일 생성 대기 중에도 취소에 응답합니다.
    /// 열기에 실패하면 한 번 보고하고 에러를 반환합니다.
    pub(crate) async fn run(self, cancel: CancellationToken) -> Result<(), LogPipelineError> {
        let open = FileTailer::open(self.path.clone(), self.tailer_config.clone());
        let tailer = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(path = %self.path.display(), "monitoring unit cancelled before file was opened");
                return Ok(());
            }
            result = open => match result {
                Ok(tailer) => tailer,
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "failed to open log source, unit will not start");
                    return Err(e);
                }
            },
        };

        metrics::gauge!(m::MONITOR_ACTIVE_SOURCES).increment(1.0);
        self.drive(tailer, cancel).await;
        metrics::gauge!(m::MONITOR_ACTIVE_SOURCES).decrement(1.0);
        Ok(())
    }

    /// 라인 공급원에서 읽어 배치를 만들어 내보냅니다.
    pub(crate) async fn drive<S: LineSource>(self, mut source: S, cancel: CancellationToken) {
        let log_file = self.path.display().to_string();
        let format = self.parser.format_name().to_owned();
        let mut batcher = Batcher::new(self.batch_size);
        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.flush_interval, self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(path = %log_file, format = %format, "monitoring unit started");

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                line = source.next_line() => {
                    UnitStats::bump(&self.stats.lines_read);
                    metrics::counter!(m::MONITOR_LINES_READ_TOTAL).increment(1);

                    let record = match self.parser.parse(&line, &log_file) {
                        Ok(record) => record,
                        Err(e) => {
                            UnitStats::bump(&self.stats.parse_errors);
                            metrics::counter!(m::MONITOR_PARSE_ERRORS_TOTAL, m::LABEL_PARSER_FORMAT => format.clone())
                                .increment(1);
                            debug!(path = %log_file, error = %e, "dropping unparseable line");
                            continue;
                        }
                    };

                    UnitStats::bump(&self.stats.records_parsed);
                    metrics::counter!(m::MONITOR_RECORDS_PARSED_TOTAL, m::LABEL_PARSER_FORMAT => format.clone())
                        .increment(1);

                    if let Some(batch) = batcher.push(record) {
                        ticker.reset();
                        if !self.emit(batch, "size").await {
                            break;
                        }
                    }
                }
                _ = ticker.tick() => {
                    if let Some(batch) = batcher.flush() {
                        if !self.emit(batch, "interval").await {
                            break;
                        }
                    }
                }
            }
        }

        if self.flush_on_shutdown {
            if let Some(batch) = batcher.flush() {
                self.emit(batch, "shutdown").await;
            }
        } else if !batcher.is_empty() {
            debug!(path = %log_file, discarded = batcher.len(), "discarding buffered records on shutdown");
        }

        info!(
            path = %log_file,
            batches = batcher.batches_emitted(),
            records = batcher.records_emitted(),
            "monitoring unit stopped"
        );
    }

    /// 배치를 싱크 채널로 보냅니다. 수신측이 닫혀 있으면 `false`를 반환합니다.
    async fn emit(&self, batch: Batch, reason: &'static str) -> bool {
        let size = batch.len();
        if self.batch_tx.send(batch).await.is_err() {
            warn!(path = %self.path.display(), size, "batch receiver closed, stopping unit");
            return false;
        }
        UnitStats::bump(&self.stats.batches_emitted);
        metrics::counter!(m::MONITOR_BATCHES_FLUSHED_TOTAL, m::LABEL_FLUSH_REASON => reason)
            .increment(1);
        debug!(path = %self.path.display(), size, reason, "batch flushed");
        true
    }
}
