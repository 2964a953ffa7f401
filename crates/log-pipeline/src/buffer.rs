//! 레코드 배칭 -- 크기/시간 기준 배치 플러시
//!
//! [`Batcher`]는 한 모니터링 유닛의 파싱된 레코드를 모았다가
//! 배치 크기에 도달하면 즉시 [`Batch`]로 내보냅니다.
//! 시간 기준 플러시는 유닛 루프의 interval 타이머가 [`Batcher::flush`]를 호출하여 수행합니다.
//!
//! 배치는 한 번만 전달되며 재시도하지 않습니다.

use logwarden_core::types::{Batch, LogRecord};

/// 레코드 배처
///
/// 유닛 하나가 단독으로 소유하므로 동기화가 필요 없습니다.
/// 버퍼 안의 레코드는 파일 추가 순서를 유지합니다.
#[derive(Debug)]
pub struct Batcher {
    /// 버퍼링 중인 레코드
    records: Vec<LogRecord>,
    /// 배치 크기 (이 개수만큼 모이면 플러시)
    batch_size: usize,
    /// 지금까지 내보낸 배치 수
    batches_emitted: u64,
    /// 지금까지 내보낸 레코드 수
    records_emitted: u64,
}

impl Batcher {
    /// 새 배처를 생성합니다. `batch_size`가 0이면 1로 취급합니다.
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            records: Vec::with_capacity(batch_size.min(10_000)),
            batch_size,
            batches_emitted: 0,
            records_emitted: 0,
        }
    }

    /// 레코드를 추가합니다.
    ///
    /// 버퍼가 배치 크기에 도달하면 배치를 반환하고 버퍼를 비웁니다.
    pub fn push(&mut self, record: LogRecord) -> Option<Batch> {
        // 다른 파일의 레코드가 섞이지 않도록 기존 버퍼를 먼저 내보냄
        if let Some(first) = self.records.first() {
            if first.log_file != record.log_file {
                tracing::warn!(
                    buffered = %first.log_file,
                    incoming = %record.log_file,
                    "record from a different log file, flushing early"
                );
                let batch = self.flush();
                self.records.push(record);
                return batch;
            }
        }

        self.records.push(record);
        if self.records.len() >= self.batch_size {
            return self.flush();
        }
        None
    }

    /// 버퍼가 비어있지 않으면 전체를 배치로 내보냅니다.
    pub fn flush(&mut self) -> Option<Batch> {
        if self.records.is_empty() {
            return None;
        }
        let records = std::mem::replace(
            &mut self.records,
            Vec::with_capacity(self.batch_size.min(10_000)),
        );
        let batch = Batch::new(records)?;
        self.batches_emitted += 1;
        self.records_emitted += batch.len() as u64;
        Some(batch)
    }

    /// 현재 버퍼링 중인 레코드 수
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// 버퍼가 비어있는지 여부
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 배치 크기
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// 지금까지 내보낸 배치 수
    pub fn batches_emitted(&self) -> u64 {
        self.batches_emitted
    }

    /// 지금까지 내보낸 레코드 수
    pub fn records_emitted(&self) -> u64 {
        self.records_emitted
    }
}
