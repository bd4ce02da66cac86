//! Exercise test specification: a YAML mapping of test-id to test case,
//! plus `_`-prefixed metadata keys.
//!
//! Scalar-or-list ambiguity (a bare string where a list of lines is
//! meant) is resolved once at load time; all downstream code sees
//! `Vec<String>` only. Declaration order of the test cases is preserved
//! so reports are reproducible.

use std::{path::Path, time::Duration};

use serde_yaml::Value;

use crate::error::{Error, Result};

pub const METADATA_PREFIX: char = '_';

const KEY_MAIN_CLASS: &str = "_mainclass";
const KEY_TIMEOUT: &str = "_timeout";
const KEY_IGNORE_BLANK_LINES: &str = "_ignore_blank_lines";
const KEY_TRANSLATION: &str = "_tr";

const KEY_STDIN: &str = "stdin";
const KEY_ARGS: &str = "argsin";
const KEY_STDOUT: &str = "stdout";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub id: String,
    pub stdin: Option<Vec<String>>,
    pub args: Option<Vec<String>>,
    pub expected_stdout: Option<Vec<String>>,
}

impl TestCase {
    /// The text fed to the child's standard input: declared lines joined
    /// with '\n' and newline-terminated; no declared stdin means empty input.
    pub fn stdin_text(&self) -> String {
        match &self.stdin {
            Some(lines) => {
                let mut s = lines.join("\n");
                s.push('\n');
                s
            }
            None => String::new(),
        }
    }

    pub fn args(&self) -> &[String] {
        self.args.as_deref().unwrap_or(&[])
    }

    fn from_yaml(id: &str, value: &Value) -> Result<Self> {
        let empty = serde_yaml::Mapping::new();
        let map = match value {
            Value::Null => &empty,
            Value::Mapping(m) => m,
            _ => {
                return Err(Error::user(format!(
                    "Test '{}' in the spec file must be a mapping",
                    id
                )))
            }
        };
        let entry = |key: &str| -> Result<Option<Vec<String>>> {
            map.get(key)
                .map(|v| normalize_entry(v).map_err(|e| e.for_test_entry(id, key)))
                .transpose()
        };
        Ok(Self {
            id: id.to_owned(),
            stdin: entry(KEY_STDIN)?,
            args: entry(KEY_ARGS)?,
            expected_stdout: entry(KEY_STDOUT)?,
        })
    }
}

/// Character substitution applied to the program's output before
/// comparison, to normalize cosmetic differences. Maps the k-th
/// character of `from` to the k-th character of `to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationTable {
    from: Vec<char>,
    to: Vec<char>,
}

impl TranslationTable {
    pub fn new(from: &str, to: &str) -> Result<Self> {
        let from: Vec<char> = from.chars().collect();
        let to: Vec<char> = to.chars().collect();
        if from.is_empty() {
            return Err(Error::user(format!(
                "Ill-defined '{}' in the spec file: source characters must not be empty",
                KEY_TRANSLATION
            )));
        }
        if from.len() != to.len() {
            return Err(Error::user(format!(
                "Ill-defined '{}' in the spec file: both character sequences must have the same length",
                KEY_TRANSLATION
            )));
        }
        Ok(Self { from, to })
    }

    pub fn apply_line(&self, line: &str) -> String {
        line.chars()
            .map(|c| match self.from.iter().position(|&f| f == c) {
                Some(k) => self.to[k],
                None => c,
            })
            .collect()
    }

    pub fn apply(&self, lines: &[String]) -> Vec<String> {
        lines.iter().map(|line| self.apply_line(line)).collect()
    }

    fn from_yaml(value: &Value) -> Result<Self> {
        let illdefined =
            || Error::user(format!("Ill-defined '{}' in the spec file", KEY_TRANSLATION));
        let seq = value.as_sequence().ok_or_else(illdefined)?;
        let [from, to] = seq.as_slice() else {
            return Err(illdefined());
        };
        match (scalar_to_string(from), scalar_to_string(to)) {
            (Some(from), Some(to)) => Self::new(&from, &to),
            _ => Err(illdefined()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExerciseSpec {
    pub main_class: Option<String>,
    pub timeout: Duration,
    pub ignore_blank_lines: bool,
    pub translation: Option<TranslationTable>,
    pub tests: Vec<TestCase>,
}

impl Default for ExerciseSpec {
    fn default() -> Self {
        Self {
            main_class: None,
            timeout: Self::DEFAULT_TIMEOUT,
            ignore_blank_lines: true,
            translation: None,
            tests: Vec::new(),
        }
    }
}

impl ExerciseSpec {
    /// Max wall-clock time allowed for a single test.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let doc: Value = serde_yaml::from_str(s)
            .map_err(|e| Error::user(format!("The spec file is not valid YAML: {}", e)))?;

        let map = match &doc {
            Value::Null => return Ok(Self::default()),
            Value::Mapping(m) => m,
            _ => return Err(Error::user("The spec file must be a YAML mapping")),
        };

        let mut spec = Self::default();
        for (key, value) in map {
            let Some(key) = key.as_str() else {
                return Err(Error::user("Spec file keys must be strings"));
            };
            if !key.starts_with(METADATA_PREFIX) {
                spec.tests.push(TestCase::from_yaml(key, value)?);
                continue;
            }
            match key {
                KEY_MAIN_CLASS => {
                    spec.main_class = Some(scalar_to_string(value).ok_or_else(|| {
                        Error::user(format!("'{}' must be a string", KEY_MAIN_CLASS))
                    })?);
                }
                KEY_TIMEOUT => {
                    let secs = value.as_u64().ok_or_else(|| {
                        Error::user(format!("'{}' must be a positive integer", KEY_TIMEOUT))
                    })?;
                    spec.timeout = Duration::from_secs(secs);
                }
                KEY_IGNORE_BLANK_LINES => {
                    spec.ignore_blank_lines = value.as_bool().ok_or_else(|| {
                        Error::user(format!("'{}' must be a boolean", KEY_IGNORE_BLANK_LINES))
                    })?;
                }
                KEY_TRANSLATION => {
                    spec.translation = Some(TranslationTable::from_yaml(value)?);
                }
                other => {
                    log::debug!("Ignoring unknown metadata key '{}' in spec file", other);
                }
            }
        }
        Ok(spec)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = fsutil::read_to_string(path)
            .map_err(|_| Error::user(format!("Cannot read spec file {}", path.display())))?;
        Self::from_yaml_str(&s)
    }

    /// True when the exercise declares nothing to check automatically.
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty() && self.main_class.is_none()
    }

    pub fn main_class(&self) -> Result<&str> {
        self.main_class.as_deref().ok_or_else(|| {
            Error::user_with_tip(
                "The exercise spec file is incomplete",
                "Restore the original spec file if you modified it, or ask your teacher",
            )
        })
    }

    /// Name of the source file holding main().
    pub fn main_program(&self) -> Result<String> {
        Ok(format!("{}.java", self.main_class()?))
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

/// Normalizes a scalar-or-list spec entry into a list of strings.
fn normalize_entry(value: &Value) -> std::result::Result<Vec<String>, NormalizeError> {
    match value {
        Value::Sequence(items) => items
            .iter()
            .map(|v| scalar_to_string(v).ok_or(NormalizeError))
            .collect(),
        v => scalar_to_string(v).map(|s| vec![s]).ok_or(NormalizeError),
    }
}

struct NormalizeError;

impl NormalizeError {
    fn for_test_entry(self, id: &str, key: &str) -> Error {
        Error::user(format!(
            "Entry '{}' of test '{}' must be a scalar or a list of scalars",
            key, id
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SAMPLE: &str = r#"
_mainclass: Sum
_timeout: 3
case1:
  stdin: ["3", "4"]
  stdout: "7"
case2:
  stdin: 10
  argsin: [--verbose, x]
  stdout:
    - "20"
    - ""
"#;

    #[test]
    fn parses_metadata_and_tests_in_declaration_order() {
        let spec = ExerciseSpec::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(spec.main_class().unwrap(), "Sum");
        assert_eq!(spec.main_program().unwrap(), "Sum.java");
        assert_eq!(spec.timeout, Duration::from_secs(3));
        assert!(spec.ignore_blank_lines);

        let ids: Vec<_> = spec.tests.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["case1", "case2"]);
    }

    #[test]
    fn scalars_are_normalized_to_singleton_lists() {
        let spec = ExerciseSpec::from_yaml_str(SAMPLE).unwrap();
        let case1 = &spec.tests[0];
        assert_eq!(case1.stdin, Some(vec!["3".into(), "4".into()]));
        assert_eq!(case1.expected_stdout, Some(vec!["7".into()]));

        let case2 = &spec.tests[1];
        assert_eq!(case2.stdin, Some(vec!["10".into()]));
        assert_eq!(case2.args(), ["--verbose".to_owned(), "x".to_owned()]);
        assert_eq!(case2.expected_stdout, Some(vec!["20".into(), "".into()]));
    }

    #[test]
    fn stdin_text_is_newline_joined_and_terminated() {
        let spec = ExerciseSpec::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(spec.tests[0].stdin_text(), "3\n4\n");

        let no_stdin = TestCase {
            id: "x".into(),
            stdin: None,
            args: None,
            expected_stdout: None,
        };
        assert_eq!(no_stdin.stdin_text(), "");
    }

    #[test]
    fn empty_document_is_an_empty_spec() {
        let spec = ExerciseSpec::from_yaml_str("").unwrap();
        assert!(spec.is_empty());
        assert_eq!(spec.timeout, ExerciseSpec::DEFAULT_TIMEOUT);
        assert!(spec.main_class().is_err());
    }

    #[test]
    fn test_without_stdout_skips_output_checking() {
        let spec = ExerciseSpec::from_yaml_str("_mainclass: M\njust-runs:\n").unwrap();
        assert_eq!(spec.tests[0].expected_stdout, None);
    }

    #[test]
    fn ignore_blank_lines_can_be_disabled() {
        let spec =
            ExerciseSpec::from_yaml_str("_mainclass: M\n_ignore_blank_lines: false\n").unwrap();
        assert!(!spec.ignore_blank_lines);
    }

    #[test]
    fn translation_table_maps_positionally() {
        let spec = ExerciseSpec::from_yaml_str("_tr: [\"àé\", \"ae\"]\n_mainclass: M\n").unwrap();
        let tr = spec.translation.unwrap();
        assert_eq!(tr.apply_line("cafè"), "cafè");
        assert_eq!(tr.apply_line("àé"), "ae");
        assert_eq!(
            tr.apply(&["màl".to_owned(), "ok".to_owned()]),
            vec!["mal".to_owned(), "ok".to_owned()]
        );
    }

    #[test]
    fn translation_table_is_idempotent_when_targets_are_not_sources() {
        let tr = TranslationTable::new("àé", "ae").unwrap();
        let once = tr.apply_line("càfé");
        assert_eq!(tr.apply_line(&once), once);
    }

    #[test]
    fn malformed_translation_table_is_a_config_error() {
        assert!(matches!(
            TranslationTable::new("", ""),
            Err(Error::User { .. })
        ));
        assert!(matches!(
            TranslationTable::new("ab", "x"),
            Err(Error::User { .. })
        ));
        assert!(ExerciseSpec::from_yaml_str("_tr: [\"ab\"]").is_err());
        assert!(ExerciseSpec::from_yaml_str("_tr: \"ab\"").is_err());
    }
}
