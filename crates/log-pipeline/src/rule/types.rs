//! 심각도 룰 데이터 타입
//!
//! YAML 룰 파일에서 역직렬화되는 구조체를 정의합니다.

use serde::{Deserialize, Serialize};

use crate::error::LogPipelineError;

/// 룰 이름 최대 길이
const MAX_RULE_NAME_LEN: usize = 256;

/// 심각도 룰 정의 -- 룰 파일의 한 항목에 대응합니다.
///
/// # YAML 스키마
/// ```yaml
/// - name: ssh-login-failure
///   pattern: 'Failed password'
///   severity: HIGH
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDefinition {
    /// 진단용 룰 이름
    pub name: String,
    /// 메시지에 대해 평가할 정규식
    pub pattern: String,
    /// 매칭 시 부여할 심각도 레이블
    pub severity: String,
}

impl RuleDefinition {
    /// 새 룰 정의를 생성합니다.
    pub fn new(
        name: impl Into<String>,
        pattern: impl Into<String>,
        severity: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            severity: severity.into(),
        }
    }

    /// 룰의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        if self.name.trim().is_empty() {
            return Err(LogPipelineError::RuleValidation {
                rule: "(empty)".to_owned(),
                reason: "rule name must not be empty".to_owned(),
            });
        }

        if self.name.len() > MAX_RULE_NAME_LEN {
            return Err(LogPipelineError::RuleValidation {
                rule: self.name.clone(),
                reason: format!("rule name must not exceed {MAX_RULE_NAME_LEN} characters"),
            });
        }

        if self.pattern.is_empty() {
            return Err(LogPipelineError::RuleValidation {
                rule: self.name.clone(),
                reason: "rule pattern must not be empty".to_owned(),
            });
        }

        if self.severity.trim().is_empty() {
            return Err(LogPipelineError::RuleValidation {
                rule: self.name.clone(),
                reason: "rule severity must not be empty".to_owned(),
            });
        }

        Ok(())
    }
}
