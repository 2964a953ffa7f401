//! 심각도 룰 -- 메시지 패턴 기반 레벨 분류
//!
//! 순서가 있는 `(이름, 정규식, 심각도)` 룰 목록을 로드하여
//! 레코드 메시지에 대해 첫 번째로 매칭된 룰의 심각도를 부여합니다.
//!
//! # 룰 형식
//! ```yaml
//! - name: ssh-login-failure
//!   pattern: 'Failed password'
//!   severity: HIGH
//! - name: session-opened
//!   pattern: 'session opened for user'
//!   severity: LOW
//! ```
//!
//! # 구성
//! - [`RuleSet`]: 컴파일된 룰 목록과 분류 로직
//! - [`loader`]: YAML 파일 로딩 및 유효성 검증
//! - [`matcher`]: 룰 단위 정규식 컴파일
//! - [`types`]: 룰 정의 데이터 구조

pub mod loader;
pub mod matcher;
pub mod types;

pub use loader::RuleLoader;
pub use matcher::CompiledRule;
pub use types::RuleDefinition;

use logwarden_core::metrics as m;
use logwarden_core::types::LogRecord;

use crate::error::LogPipelineError;

/// 순서가 있는 심각도 룰 집합
///
/// 세션 동안 변경되지 않으며 `Arc`로 모든 소스가 공유합니다.
/// 분류는 순수 함수이므로 같은 메시지에 몇 번 적용해도 결과가 같습니다.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// 룰이 없는 집합을 만듭니다. 모든 레코드가 구조적 레벨을 유지합니다.
    pub fn empty() -> Self {
        Self::default()
    }

    /// 룰 정의 목록을 순서대로 컴파일합니다.
    ///
    /// 하나라도 컴파일에 실패하면 해당 룰 이름을 담은 에러를 반환합니다.
    pub fn from_definitions(definitions: &[RuleDefinition]) -> Result<Self, LogPipelineError> {
        let rules = definitions
            .iter()
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// 이미 컴파일된 룰로 집합을 만듭니다.
    pub fn from_compiled(rules: Vec<CompiledRule>) -> Self {
        Self { rules }
    }

    /// 룰 수
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// 룰이 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 룰 목록 (평가 순서)
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// 메시지에 처음 매칭되는 룰을 찾습니다.
    pub fn first_match(&self, message: &str) -> Option<&CompiledRule> {
        self.rules.iter().find(|rule| rule.is_match(message))
    }

    /// 메시지의 심각도를 결정합니다. 매칭되는 룰이 없으면 `None`입니다.
    pub fn classify(&self, message: &str) -> Option<&str> {
        self.first_match(message).map(CompiledRule::severity)
    }

    /// 레코드의 레벨을 분류 결과로 덮어씁니다.
    ///
    /// 매칭된 룰이 있으면 `true`를 반환하고, 없으면 레벨을 그대로 둡니다.
    pub fn apply(&self, record: &mut LogRecord) -> bool {
        match self.classify(&record.message) {
            Some(severity) => {
                metrics::counter!(m::MONITOR_RULE_MATCHES_TOTAL, m::LABEL_LEVEL => severity.to_owned())
                    .increment(1);
                if record.level != severity {
                    record.level = severity.to_owned();
                }
                true
            }
            None => false,
        }
    }
}
