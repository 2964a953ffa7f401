//! 룰 컴파일 -- 정규식을 한 번만 컴파일하여 보관합니다.
//!
//! `regex` 크레이트는 선형 시간 매칭을 보장하므로 병적인 패턴도
//! 백트래킹 폭발을 일으키지 않습니다. 컴파일 크기에는 상한을 둡니다.

use regex::{Regex, RegexBuilder};

use super::types::RuleDefinition;
use crate::error::LogPipelineError;

/// 룰 하나당 컴파일된 정규식 크기 상한 (바이트)
pub const MAX_COMPILED_PATTERN_SIZE: usize = 1024 * 1024;

/// 컴파일된 심각도 룰
#[derive(Debug, Clone)]
pub struct CompiledRule {
    name: String,
    severity: String,
    pattern: Regex,
}

impl CompiledRule {
    /// 룰 정의를 검증하고 정규식을 컴파일합니다.
    ///
    /// 패턴이 잘못되었으면 룰 이름을 담은 에러를 반환합니다.
    pub fn compile(definition: &RuleDefinition) -> Result<Self, LogPipelineError> {
        definition.validate()?;

        let pattern = RegexBuilder::new(&definition.pattern)
            .size_limit(MAX_COMPILED_PATTERN_SIZE)
            .build()
            .map_err(|e| LogPipelineError::RuleCompile {
                rule: definition.name.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            name: definition.name.clone(),
            severity: definition.severity.clone(),
            pattern,
        })
    }

    /// 룰 이름
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 매칭 시 부여할 심각도
    pub fn severity(&self) -> &str {
        &self.severity
    }

    /// 원본 패턴 문자열
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// 메시지 어디에서든 패턴이 매칭되는지 검사합니다.
    pub fn is_match(&self, message: &str) -> bool {
        self.pattern.is_match(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_valid_pattern() {
        let rule =
            CompiledRule::compile(&RuleDefinition::new("r", r"Failed \w+ for", "HIGH")).unwrap();
        assert_eq!(rule.name(), "r");
        assert_eq!(rule.severity(), "HIGH");
        assert_eq!(rule.pattern(), r"Failed \w+ for");
        assert!(rule.is_match("sshd: Failed password for root"));
        assert!(!rule.is_match("Accepted password for root"));
    }

    #[test]
    fn invalid_pattern_names_rule() {
        let err = CompiledRule::compile(&RuleDefinition::new("broken-rule", "(unclosed", "HIGH"))
            .unwrap_err();
        match err {
            LogPipelineError::RuleCompile { rule, .. } => assert_eq!(rule, "broken-rule"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn oversized_pattern_is_rejected() {
        // 반복 횟수가 큰 유니코드 클래스는 크기 상한을 넘는다
        let err = CompiledRule::compile(&RuleDefinition::new("huge", r"\w{5000}\w{5000}", "HIGH"))
            .unwrap_err();
        assert!(matches!(err, LogPipelineError::RuleCompile { .. }));
    }

    #[test]
    fn validation_runs_before_compile() {
        let err = CompiledRule::compile(&RuleDefinition::new("", "x", "HIGH")).unwrap_err();
        assert!(matches!(err, LogPipelineError::RuleValidation { .. }));
    }
}
