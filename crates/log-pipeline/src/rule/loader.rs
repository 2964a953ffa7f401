//! 룰 파일 로더 -- YAML 룰 파일을 디스크에서 로드합니다.
//!
//! 파일은 `{name, pattern, severity}` 항목의 YAML 리스트이며,
//! 리스트 순서가 곧 평가 순서입니다.

use std::collections::HashSet;
use std::path::Path;

use crate::error::LogPipelineError;

use super::RuleSet;
use super::types::RuleDefinition;

/// 룰 파일 로더 설정
const MAX_RULE_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10MB
const MAX_RULES_COUNT: usize = 10_000;

/// 룰 파일 로더
pub struct RuleLoader;

impl RuleLoader {
    /// YAML 파일에서 룰을 로드하고 컴파일합니다.
    ///
    /// # Errors
    /// - 파일을 읽을 수 없거나 너무 큰 경우
    /// - YAML 형식이 잘못된 경우
    /// - 룰 검증 또는 정규식 컴파일에 실패한 경우 (룰 이름 포함)
    pub async fn load_file(path: impl AsRef<Path>) -> Result<RuleSet, LogPipelineError> {
        let path = path.as_ref();

        // 파일 크기 검증
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| LogPipelineError::RuleLoad {
                path: path.display().to_string(),
                reason: format!("failed to read file metadata: {e}"),
            })?;

        if metadata.len() > MAX_RULE_FILE_SIZE {
            return Err(LogPipelineError::RuleLoad {
                path: path.display().to_string(),
                reason: format!(
                    "file too large: {} bytes (max: {MAX_RULE_FILE_SIZE})",
                    metadata.len()
                ),
            });
        }

        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| LogPipelineError::RuleLoad {
                    path: path.display().to_string(),
                    reason: format!("failed to read file: {e}"),
                })?;

        let rules = Self::parse_yaml(&content, &path.display().to_string())?;

        tracing::info!(
            path = %path.display(),
            count = rules.len(),
            "loaded severity rules"
        );

        Ok(rules)
    }

    /// YAML 문자열을 파싱하여 룰 집합을 생성합니다.
    pub fn parse_yaml(yaml_str: &str, source: &str) -> Result<RuleSet, LogPipelineError> {
        let definitions = Self::parse_definitions(yaml_str, source)?;
        RuleSet::from_definitions(&definitions)
    }

    /// YAML 문자열을 룰 정의 목록으로 파싱합니다 (컴파일 없음).
    pub fn parse_definitions(
        yaml_str: &str,
        source: &str,
    ) -> Result<Vec<RuleDefinition>, LogPipelineError> {
        if is_blank_document(yaml_str) {
            tracing::warn!(source, "rule file is empty, no severity rules loaded");
            return Ok(Vec::new());
        }

        let definitions: Vec<RuleDefinition> =
            serde_yaml::from_str(yaml_str).map_err(|e| LogPipelineError::RuleLoad {
                path: source.to_owned(),
                reason: format!("YAML parse error: {e}"),
            })?;

        if definitions.len() > MAX_RULES_COUNT {
            return Err(LogPipelineError::RuleLoad {
                path: source.to_owned(),
                reason: format!("too many rules: max {MAX_RULES_COUNT}"),
            });
        }

        let mut seen = HashSet::new();
        for definition in &definitions {
            definition.validate()?;
            // 같은 이름이 있어도 순서대로 평가되므로 경고만 남김
            if !seen.insert(definition.name.as_str()) {
                tracing::warn!(
                    rule = %definition.name,
                    source,
                    "duplicate rule name"
                );
            }
        }

        Ok(definitions)
    }
}

fn is_blank_document(yaml_str: &str) -> bool {
    yaml_str
        .lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with('#') || line == "---")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const RULES_YAML: &str = r#"
- name: ssh-root
  pattern: 'Failed password for root'
  severity: CRITICAL
- name: ssh-any
  pattern: 'Failed password'
  severity: HIGH
"#;

    #[test]
    fn parse_valid_yaml_keeps_order() {
        let set = RuleLoader::parse_yaml(RULES_YAML, "rules.yaml").unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.rules()[0].name(), "ssh-root");
        assert_eq!(set.rules()[1].name(), "ssh-any");
        assert_eq!(set.classify("Failed password for root"), Some("CRITICAL"));
        assert_eq!(set.classify("Failed password for alice"), Some("HIGH"));
    }

    #[test]
    fn parse_invalid_yaml_returns_error() {
        let err = RuleLoader::parse_yaml("not: [valid: yaml: {{{", "bad.yaml").unwrap_err();
        assert!(matches!(err, LogPipelineError::RuleLoad { .. }));
    }

    #[test]
    fn parse_yaml_with_missing_field_is_error() {
        let yaml = "- name: r1\n  pattern: x\n";
        let err = RuleLoader::parse_yaml(yaml, "missing.yaml").unwrap_err();
        assert!(err.to_string().contains("missing.yaml"));
    }

    #[test]
    fn invalid_pattern_error_names_rule() {
        let yaml = "- name: broken\n  pattern: '(unclosed'\n  severity: HIGH\n";
        let err = RuleLoader::parse_yaml(yaml, "rules.yaml").unwrap_err();
        assert!(err.to_string().contains("'broken'"));
    }

    #[test]
    fn blank_document_yields_empty_set() {
        let set = RuleLoader::parse_yaml("# no rules yet\n\n", "rules.yaml").unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn duplicate_names_are_kept_in_order() {
        let yaml = "- name: r\n  pattern: a\n  severity: LOW\n- name: r\n  pattern: b\n  severity: HIGH\n";
        let defs = RuleLoader::parse_definitions(yaml, "dup.yaml").unwrap();
        assert_eq!(defs.len(), 2);
    }

    #[tokio::test]
    async fn load_file_reads_rules() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(RULES_YAML.as_bytes()).unwrap();
        let set = RuleLoader::load_file(file.path()).await.unwrap();
        assert_eq!(set.len(), 2);
    }

    #[tokio::test]
    async fn load_nonexistent_file_returns_error() {
        let err = RuleLoader::load_file("/nonexistent/path/rules.yaml")
            .await
            .unwrap_err();
        assert!(matches!(err, LogPipelineError::RuleLoad { .. }));
    }
}
