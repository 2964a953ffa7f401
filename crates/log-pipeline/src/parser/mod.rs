//! 로그 파싱 모듈 -- 소스 형식별 파서와 경로 기반 선택
//!
//! 각 파서는 core의 [`LogParser`](logwarden_core::pipeline::LogParser) trait을 구현하며,
//! 추출이 끝난 레코드에 심각도 룰을 적용한 뒤 반환합니다.
//!
//! # 지원 형식
//! - 인증 로그 ([`AuthParser`])
//! - 시스템 로그 ([`SyslogParser`])
//! - 방화벽 로그 ([`FirewallParser`])
//!
//! # 사용 예시
//! ```ignore
//! use std::sync::Arc;
//! use logwarden_log_pipeline::parser::ParserSelector;
//! use logwarden_log_pipeline::rule::RuleSet;
//!
//! let selector = ParserSelector::with_defaults();
//! let parser = selector.select("/var/log/host/auth.log".as_ref(), &Arc::new(RuleSet::empty()))?;
//! let record = parser.parse(line, "/var/log/host/auth.log")?;
//! ```

pub mod auth;
pub mod firewall;
pub mod syslog;
pub mod timestamp;

pub use auth::AuthParser;
pub use firewall::FirewallParser;
pub use syslog::SyslogParser;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use logwarden_core::pipeline::LogParser;

use crate::error::LogPipelineError;
use crate::rule::RuleSet;

/// 로그 소스 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    /// 인증 로그
    Auth,
    /// 시스템 로그
    Syslog,
    /// 방화벽 로그
    Firewall,
}

impl FormatKind {
    /// 형식 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Syslog => "syslog",
            Self::Firewall => "firewall",
        }
    }

    /// 이 형식의 파서를 생성합니다.
    pub fn build_parser(
        self,
        rules: Arc<RuleSet>,
    ) -> Result<Box<dyn LogParser>, LogPipelineError> {
        Ok(match self {
            Self::Auth => Box::new(AuthParser::new(rules)?),
            Self::Syslog => Box::new(SyslogParser::new(rules)?),
            Self::Firewall => Box::new(FirewallParser::new(rules)?),
        })
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatKind {
    type Err = LogPipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auth" => Ok(Self::Auth),
            "syslog" => Ok(Self::Syslog),
            "firewall" => Ok(Self::Firewall),
            other => Err(LogPipelineError::Config {
                field: "format".to_owned(),
                reason: format!("unknown log format '{other}'"),
            }),
        }
    }
}

/// 기본 경로 테이블
///
/// 호스트 로그를 `/var/log/host`에 마운트한 컨테이너 배치와
/// 호스트에서 직접 실행하는 배치를 모두 지원합니다.
pub const DEFAULT_SOURCES: [(&str, FormatKind); 6] = [
    ("/var/log/host/auth.log", FormatKind::Auth),
    ("/var/log/host/syslog", FormatKind::Syslog),
    ("/var/log/host/ufw.log", FormatKind::Firewall),
    ("/var/log/auth.log", FormatKind::Auth),
    ("/var/log/syslog", FormatKind::Syslog),
    ("/var/log/ufw.log", FormatKind::Firewall),
];

/// 파서 선택기 -- 로그 파일 경로를 담당 파서에 대응시킵니다.
///
/// 테이블은 세션 시작 전에 구성되며 이후 변경되지 않습니다.
/// 테이블에 없는 경로는 `UnsupportedSource` 에러가 됩니다.
#[derive(Debug, Clone, Default)]
pub struct ParserSelector {
    table: HashMap<PathBuf, FormatKind>,
}

impl ParserSelector {
    /// 빈 선택기를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 기본 경로 테이블로 선택기를 생성합니다.
    pub fn with_defaults() -> Self {
        DEFAULT_SOURCES
            .iter()
            .fold(Self::new(), |selector, (path, kind)| {
                selector.register(path, *kind)
            })
    }

    /// 경로-형식 매핑을 추가합니다. 같은 경로가 있으면 덮어씁니다.
    pub fn register(mut self, path: impl AsRef<Path>, kind: FormatKind) -> Self {
        self.table.insert(path.as_ref().to_path_buf(), kind);
        self
    }

    /// 경로에 대응하는 형식
    pub fn kind_for(&self, path: &Path) -> Option<FormatKind> {
        self.table.get(path).copied()
    }

    /// 등록된 매핑 수
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// 매핑이 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// 경로에 맞는 파서를 생성합니다.
    pub fn select(
        &self,
        path: &Path,
        rules: &Arc<RuleSet>,
    ) -> Result<Box<dyn LogParser>, LogPipelineError> {
        let kind = self
            .kind_for(path)
            .ok_or_else(|| LogPipelineError::UnsupportedSource(path.display().to_string()))?;
        kind.build_parser(Arc::clone(rules))
    }
}
