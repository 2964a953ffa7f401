//! 파일 테일러 -- 하나의 로그 파일을 끝없이 따라 읽습니다.
//!
//! `tail -F`와 유사한 동작을 폴링 방식으로 구현합니다.
//! OS 파일 알림 없이 메타데이터와 오프셋만으로 변화를 감지합니다.
//!
//! # 동작
//! - 파일이 아직 없으면 생성될 때까지 대기 (선택적 제한 시간)
//! - 크기 축소(truncation) 또는 inode 변경(로테이션) 시 새 파일의 처음부터 다시 읽음
//! - 개행이 오지 않은 마지막 조각은 완성될 때까지 보관
//! - 빈 줄/공백 줄은 건너뛰고, 끝의 `\r`은 제거하며, 잘못된 UTF-8은 손실 변환
//!
//! # 취소 안전성
//! [`FileTailer::next_line`]은 `tokio::select!`에서 취소되어도 안전합니다.
//! 오프셋과 버퍼는 I/O가 끝난 뒤 await 없이 한 번에 갱신됩니다.

use std::collections::VecDeque;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info, warn};

use logwarden_core::metrics as m;

use crate::error::LogPipelineError;

/// 테일러 시작 위치
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartPosition {
    /// 기존 내용부터 읽음
    #[default]
    Beginning,
    /// 열린 이후 추가된 내용만 읽음
    End,
}

impl std::str::FromStr for StartPosition {
    type Err = LogPipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beginning" => Ok(Self::Beginning),
            "end" => Ok(Self::End),
            other => Err(LogPipelineError::Config {
                field: "start_at".to_owned(),
                reason: format!("unknown start position '{other}'"),
            }),
        }
    }
}

/// 파일 테일러 설정
#[derive(Debug, Clone)]
pub struct FileTailerConfig {
    /// 파일 상태 체크 주기
    pub poll_interval: Duration,
    /// 시작 위치
    pub start_at: StartPosition,
    /// 최대 라인 길이 (바이트, 초과분은 잘림)
    pub max_line_length: usize,
    /// 한 번의 폴링에서 읽을 최대 바이트
    pub max_read_bytes: usize,
    /// 파일 생성 대기 제한 (`None`이면 무제한)
    pub create_wait_timeout: Option<Duration>,
}

impl Default for FileTailerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
            start_at: StartPosition::Beginning,
            max_line_length: 64 * 1024, // 64KB
            max_read_bytes: 1024 * 1024, // 1MB
            create_wait_timeout: None,
        }
    }
}

/// 파일 동일성 식별자 (device, inode)
type FileIdentity = (u64, u64);

#[cfg(unix)]
fn file_identity(metadata: &std::fs::Metadata) -> Option<FileIdentity> {
    use std::os::unix::fs::MetadataExt;
    Some((metadata.dev(), metadata.ino()))
}

#[cfg(not(unix))]
fn file_identity(_metadata: &std::fs::Metadata) -> Option<FileIdentity> {
    None
}

/// 파일 테일러
///
/// 한 소스 파일에 대한 지연·무한·재시작 불가능한 라인 시퀀스입니다.
/// 오프셋은 내부 상태이며 저장되지 않습니다.
pub struct FileTailer {
    path: PathBuf,
    config: FileTailerConfig,
    /// 다음에 읽을 바이트 오프셋
    offset: u64,
    /// 마지막으로 본 파일 식별자
    identity: Option<FileIdentity>,
    /// 개행 전까지의 미완성 조각
    partial: Vec<u8>,
    /// 최대 길이를 넘은 라인의 나머지를 버리는 중
    discarding: bool,
    /// 반환 대기 중인 완성 라인
    pending: VecDeque<String>,
    /// 파일이 사라진 상태를 이미 기록했는지
    missing: bool,
    /// 마지막으로 보고한 에러 (같은 에러 반복 보고 방지)
    last_error: Option<String>,
    lines_read: u64,
    resets: u64,
}

impl FileTailer {
    /// 파일을 엽니다.
    ///
    /// 파일이 없으면 생성될 때까지 폴링하며 기다립니다.
    /// 기다린 끝에 생긴 파일은 `start_at`과 관계없이 처음부터 읽습니다.
    /// "없음" 이외의 실패(권한 거부, 디렉터리 등)는 즉시 에러로 반환합니다.
    pub async fn open(
        path: impl Into<PathBuf>,
        config: FileTailerConfig,
    ) -> Result<Self, LogPipelineError> {
        let path = path.into();
        let started = tokio::time::Instant::now();
        let mut announced = false;

        let metadata = loop {
            match tokio::fs::metadata(&path).await {
                Ok(metadata) => break metadata,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    if !announced {
                        info!(
                            path = %path.display(),
                            "log file does not exist yet, waiting for it to be created"
                        );
                        announced = true;
                    }
                    if let Some(limit) = config.create_wait_timeout {
                        if started.elapsed() >= limit {
                            return Err(LogPipelineError::Collector {
                                path: path.display().to_string(),
                                reason: format!("file was not created within {limit:?}"),
                            });
                        }
                    }
                    tokio::time::sleep(config.poll_interval).await;
                }
                Err(e) => {
                    return Err(LogPipelineError::Collector {
                        path: path.display().to_string(),
                        reason: format!("failed to stat file: {e}"),
                    });
                }
            }
        };

        if metadata.is_dir() {
            return Err(LogPipelineError::Collector {
                path: path.display().to_string(),
                reason: "path is a directory".to_owned(),
            });
        }

        // 읽기 권한 확인
        tokio::fs::File::open(&path)
            .await
            .map_err(|e| LogPipelineError::Collector {
                path: path.display().to_string(),
                reason: format!("failed to open file: {e}"),
            })?;

        // 기다리는 동안 생긴 파일은 내용 전체가 open 이후에 추가된 것
        let offset = match config.start_at {
            StartPosition::End if !announced => metadata.len(),
            _ => 0,
        };

        debug!(path = %path.display(), offset, "log file opened");

        Ok(Self {
            path,
            config,
            offset,
            identity: file_identity(&metadata),
            partial: Vec::new(),
            discarding: false,
            pending: VecDeque::new(),
            missing: false,
            last_error: None,
            lines_read: 0,
            resets: 0,
        })
    }

    /// 다음 라인을 반환합니다. 라인이 생길 때까지 기다립니다.
    ///
    /// 취소 안전: 취소되어도 라인이 유실되거나 중복되지 않습니다.
    pub async fn next_line(&mut self) -> String {
        loop {
            if let Some(line) = self.pending.pop_front() {
                return line;
            }
            if !self.poll().await {
                tokio::time::sleep(self.config.poll_interval).await;
            }
        }
    }

    /// 감시 중인 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 현재 읽기 오프셋
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// 지금까지 완성된 라인 수 (빈 줄 제외)
    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    /// 잘림/교체로 처음부터 다시 읽은 횟수
    pub fn resets(&self) -> u64 {
        self.resets
    }

    /// 파일을 한 번 확인하여 새 바이트를 읽습니다.
    ///
    /// 새 바이트를 소비했으면 `true`를 반환합니다.
    /// 모든 상태 변경은 마지막 await 이후에만 일어납니다.
    async fn poll(&mut self) -> bool {
        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if !self.missing {
                    debug!(path = %self.path.display(), "log file disappeared, waiting for it to return");
                    self.missing = true;
                }
                return false;
            }
            Err(e) => {
                self.report_error(format!("failed to stat file: {e}"));
                return false;
            }
        };

        let identity = file_identity(&metadata);
        let len = metadata.len();
        let replaced = matches!((self.identity, identity), (Some(old), Some(new)) if old != new);
        let truncated = len < self.offset;
        let reset = replaced || truncated;
        let start = if reset { 0 } else { self.offset };

        if len == start {
            if reset {
                self.commit_reset(replaced, len);
            }
            self.identity = identity;
            self.missing = false;
            return false;
        }

        let limit = usize::try_from(len - start)
            .unwrap_or(usize::MAX)
            .min(self.config.max_read_bytes);

        let (read_identity, bytes) = match read_bytes_at(&self.path, start, limit).await {
            Ok(read) => read,
            Err(e) => {
                self.report_error(format!("failed to read file: {e}"));
                return false;
            }
        };

        // stat과 open 사이에 파일이 교체됨: 다음 폴링에서 다시 판단
        if read_identity.is_some() && read_identity != identity {
            return false;
        }

        if reset {
            self.commit_reset(replaced, len);
        }
        self.identity = identity;
        self.missing = false;
        self.last_error = None;
        self.offset = start + bytes.len() as u64;
        self.consume(&bytes);

        !bytes.is_empty()
    }

    fn commit_reset(&mut self, replaced: bool, new_len: u64) {
        info!(
            path = %self.path.display(),
            old_offset = self.offset,
            new_len,
            replaced,
            "log file truncated or rotated, reading from the beginning"
        );
        self.offset = 0;
        self.partial.clear();
        self.discarding = false;
        self.resets += 1;
        metrics::counter!(m::MONITOR_FILE_RESETS_TOTAL).increment(1);
    }

    fn report_error(&mut self, reason: String) {
        if self.last_error.as_deref() != Some(reason.as_str()) {
            warn!(path = %self.path.display(), error = %reason, "log file poll failed, will retry");
            self.last_error = Some(reason);
        }
    }

    /// 읽은 바이트를 라인 단위로 나눕니다.
    fn consume(&mut self, bytes: &[u8]) {
        let mut rest = bytes;
        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            self.append_partial(&rest[..pos]);
            self.finish_line();
            rest = &rest[pos + 1..];
        }
        self.append_partial(rest);
    }

    fn append_partial(&mut self, chunk: &[u8]) {
        if self.discarding || chunk.is_empty() {
            return;
        }
        let room = self.config.max_line_length.saturating_sub(self.partial.len());
        if chunk.len() > room {
            self.partial.extend_from_slice(&chunk[..room]);
            self.discarding = true;
            warn!(
                path = %self.path.display(),
                max_line_length = self.config.max_line_length,
                "line exceeds maximum length, truncating"
            );
        } else {
            self.partial.extend_from_slice(chunk);
        }
    }

    fn finish_line(&mut self) {
        let mut bytes = std::mem::take(&mut self.partial);
        self.discarding = false;

        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }

        let line = match String::from_utf8(bytes) {
            Ok(line) => line,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };

        if line.trim().is_empty() {
            return;
        }

        self.lines_read += 1;
        self.pending.push_back(line);
    }
}

/// 오프셋부터 최대 `limit` 바이트를 읽고, 실제로 연 파일의 식별자를 함께 반환합니다.
async fn read_bytes_at(
    path: &Path,
    offset: u64,
    limit: usize,
) -> std::io::Result<(Option<FileIdentity>, Vec<u8>)> {
    let mut file = tokio::fs::File::open(path).await?;
    let identity = file_identity(&file.metadata().await?);
    file.seek(SeekFrom::Start(offset)).await?;

    let mut buf = Vec::with_capacity(limit);
    (&mut file).take(limit as u64).read_to_end(&mut buf).await?;
    Ok((identity, buf))
}
