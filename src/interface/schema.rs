//! Typed pipeline definitions and their parsing from the loose YAML tree.
//!
//! The interface file is read as a `serde_yaml::Value` so that mapping order
//! (which defines argument order) survives, then converted here into
//! [`PipelineSpec`] values. Anything that does not fit the expected shape is
//! rejected immediately.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::error::InterfaceError;
use crate::resources::{ResourcePackage, ResourcePolicy, DEFAULT_PACKAGE_NAME};

/// Fields a pipeline body may declare.
const PIPELINE_FIELDS: [&str; 9] = [
    "name",
    "path",
    "looper_args",
    "arguments",
    "optional_arguments",
    "required_input_files",
    "all_input_files",
    "ngs_input_files",
    "resources",
];

/// One declared command-line flag and the sample attribute that feeds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentSpec {
    /// Literal flag token, e.g. `--genome`.
    pub flag: String,
    /// Sample attribute name; `None` declares a value-less flag.
    pub attribute: Option<String>,
}

impl ArgumentSpec {
    pub fn new(flag: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            flag: flag.into(),
            attribute: Some(attribute.into()),
        }
    }

    pub fn switch(flag: impl Into<String>) -> Self {
        Self {
            flag: flag.into(),
            attribute: None,
        }
    }
}

/// A single pipeline's invocation contract and resource policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub key: String,
    pub name: String,
    /// Unexpanded path; may contain `$VAR` and a leading `~`.
    pub path: String,
    pub looper_args: bool,
    pub arguments: Vec<ArgumentSpec>,
    pub optional_arguments: Vec<ArgumentSpec>,
    pub required_input_files: Vec<String>,
    pub all_input_files: Vec<String>,
    pub ngs_input_files: Vec<String>,
    /// `None` marks a local-only pipeline.
    pub resources: Option<ResourcePolicy>,
}

impl PipelineSpec {
    /// Creates a minimal spec with the name inferred from the key.
    pub fn new(key: impl Into<String>, path: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            name: infer_name(&key),
            key,
            path: path.into(),
            looper_args: false,
            arguments: Vec::new(),
            optional_arguments: Vec::new(),
            required_input_files: Vec::new(),
            all_input_files: Vec::new(),
            ngs_input_files: Vec::new(),
            resources: None,
        }
    }

    /// True when no resource section was declared.
    pub fn is_local_only(&self) -> bool {
        self.resources.is_none()
    }

    /// Parses one pipeline body.
    pub fn from_value(key: &str, body: &Value) -> Result<Self, InterfaceError> {
        let empty = Mapping::new();
        let body = match body {
            Value::Null => &empty,
            Value::Mapping(map) => map,
            other => {
                return Err(InterfaceError::InvalidShape {
                    pipeline: key.to_string(),
                    field: "<pipeline>".to_string(),
                    expected: format!("a mapping, got {}", describe(other)),
                })
            }
        };

        for field in body.keys() {
            let Some(field) = field.as_str() else {
                return Err(InterfaceError::InvalidShape {
                    pipeline: key.to_string(),
                    field: "<pipeline>".to_string(),
                    expected: format!("keyed by field names, got key {:?}", field),
                });
            };
            if !PIPELINE_FIELDS.contains(&field) {
                return Err(InterfaceError::UnknownField {
                    pipeline: key.to_string(),
                    field: field.to_string(),
                });
            }
        }

        let path = match body.get("path") {
            Some(Value::String(path)) if !path.trim().is_empty() => path.clone(),
            Some(Value::Null) | None => {
                return Err(InterfaceError::MissingPath {
                    pipeline: key.to_string(),
                })
            }
            Some(_) => return Err(shape(key, "path", "a non-empty string")),
        };

        let name = match body.get("name") {
            None | Some(Value::Null) => infer_name(key),
            Some(Value::String(name)) => name.clone(),
            Some(_) => return Err(shape(key, "name", "a string")),
        };

        let looper_args = match body.get("looper_args") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(flag)) => *flag,
            Some(_) => return Err(shape(key, "looper_args", "a boolean")),
        };

        let arguments = parse_arguments(key, "arguments", body.get("arguments"))?;
        let optional_arguments =
            parse_arguments(key, "optional_arguments", body.get("optional_arguments"))?;

        let mut seen = Vec::new();
        for arg in arguments.iter().chain(optional_arguments.iter()) {
            if seen.contains(&arg.flag.as_str()) {
                return Err(InterfaceError::DuplicateFlag {
                    pipeline: key.to_string(),
                    flag: arg.flag.clone(),
                });
            }
            seen.push(arg.flag.as_str());
        }

        let resources = match body.get("resources") {
            None | Some(Value::Null) => None,
            Some(Value::Mapping(packages)) => Some(parse_resources(key, packages)?),
            Some(_) => return Err(shape(key, "resources", "a mapping of packages")),
        };

        Ok(Self {
            key: key.to_string(),
            name,
            path,
            looper_args,
            arguments,
            optional_arguments,
            required_input_files: parse_attribute_list(
                key,
                "required_input_files",
                body.get("required_input_files"),
            )?,
            all_input_files: parse_attribute_list(key, "all_input_files", body.get("all_input_files"))?,
            ngs_input_files: parse_attribute_list(key, "ngs_input_files", body.get("ngs_input_files"))?,
            resources,
        })
    }
}

/// Derives a display name from a pipeline key by dropping its extension.
pub fn infer_name(key: &str) -> String {
    Path::new(key)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or(key)
        .to_string()
}

fn parse_arguments(
    pipeline: &str,
    field: &str,
    value: Option<&Value>,
) -> Result<Vec<ArgumentSpec>, InterfaceError> {
    let map = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Mapping(map)) => map,
        Some(_) => return Err(shape(pipeline, field, "a mapping of flag to attribute")),
    };

    map.iter()
        .map(|(flag, attribute)| {
            let flag = scalar_to_string(flag)
                .filter(|flag| !flag.is_empty())
                .ok_or_else(|| shape(pipeline, field, "keyed by non-empty flag tokens"))?;
            let attribute = match attribute {
                Value::Null => None,
                other => Some(
                    scalar_to_string(other)
                        .ok_or_else(|| shape(pipeline, field, "attribute names or null"))?,
                ),
            };
            Ok(ArgumentSpec { flag, attribute })
        })
        .collect()
}

fn parse_attribute_list(
    pipeline: &str,
    field: &str,
    value: Option<&Value>,
) -> Result<Vec<String>, InterfaceError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(single)) => Ok(vec![single.clone()]),
        Some(Value::Sequence(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| shape(pipeline, field, "a list of attribute names"))
            })
            .collect(),
        Some(_) => Err(shape(pipeline, field, "a list of attribute names")),
    }
}

fn parse_resources(pipeline: &str, packages: &Mapping) -> Result<ResourcePolicy, InterfaceError> {
    let mut parsed = Vec::with_capacity(packages.len());
    for (name, body) in packages {
        let name = name
            .as_str()
            .ok_or_else(|| shape(pipeline, "resources", "keyed by package names"))?;
        parsed.push(parse_package(pipeline, name, body)?);
    }

    if !parsed.iter().any(ResourcePackage::is_default) {
        return Err(InterfaceError::MissingDefaultPackage {
            pipeline: pipeline.to_string(),
        });
    }

    let policy = ResourcePolicy::new(parsed);
    for pair in policy.packages().windows(2) {
        if pair[0].file_size == pair[1].file_size {
            return Err(InterfaceError::DuplicateThreshold {
                pipeline: pipeline.to_string(),
                first: pair[0].name.clone(),
                second: pair[1].name.clone(),
                file_size: pair[0].file_size,
            });
        }
    }
    Ok(policy)
}

fn parse_package(pipeline: &str, name: &str, body: &Value) -> Result<ResourcePackage, InterfaceError> {
    let empty = Mapping::new();
    let body = match body {
        Value::Null => &empty,
        Value::Mapping(map) => map,
        _ => return Err(shape(pipeline, &format!("resources.{}", name), "a mapping")),
    };

    if body.contains_key("file_size") && body.contains_key("min_file_size") {
        return Err(InterfaceError::ConflictingFileSize {
            pipeline: pipeline.to_string(),
            package: name.to_string(),
        });
    }

    let mut file_size = None;
    let mut values = Vec::new();
    for (key, value) in body {
        let key = key
            .as_str()
            .ok_or_else(|| shape(pipeline, &format!("resources.{}", name), "keyed by strings"))?;
        if key == "file_size" || key == "min_file_size" {
            file_size = Some(parse_threshold(pipeline, name, value)?);
            continue;
        }
        let value = match value {
            Value::Null => String::new(),
            other => scalar_to_string(other).ok_or_else(|| {
                shape(pipeline, &format!("resources.{}.{}", name, key), "a scalar value")
            })?,
        };
        values.push((key.to_string(), value));
    }

    let file_size = match (file_size, name == DEFAULT_PACKAGE_NAME) {
        (None, true) => 0.0,
        (Some(size), true) if size != 0.0 => {
            return Err(InterfaceError::NonZeroDefaultThreshold {
                pipeline: pipeline.to_string(),
                file_size: size,
            })
        }
        (Some(size), _) => size,
        (None, false) => {
            return Err(InterfaceError::MissingFileSize {
                pipeline: pipeline.to_string(),
                package: name.to_string(),
            })
        }
    };

    Ok(ResourcePackage {
        name: name.to_string(),
        file_size,
        values,
    })
}

fn parse_threshold(pipeline: &str, package: &str, value: &Value) -> Result<f64, InterfaceError> {
    let invalid = || InterfaceError::InvalidFileSize {
        pipeline: pipeline.to_string(),
        package: package.to_string(),
        value: scalar_to_string(value).unwrap_or_else(|| describe(value)),
    };
    let size = match value {
        Value::Number(n) => n.as_f64().ok_or_else(invalid)?,
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };
    if !size.is_finite() || size < 0.0 {
        return Err(invalid());
    }
    // Normalizes -0.0 so it compares and prints as zero.
    Ok(size + 0.0)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
    .to_string()
}

fn shape(pipeline: &str, field: &str, expected: &str) -> InterfaceError {
    InterfaceError::InvalidShape {
        pipeline: pipeline.to_string(),
        field: field.to_string(),
        expected: expected.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(key: &str, yaml: &str) -> Result<PipelineSpec, InterfaceError> {
        let value: Value = serde_yaml::from_str(yaml).expect("valid yaml");
        PipelineSpec::from_value(key, &value)
    }

    #[test]
    fn test_infer_name() {
        assert_eq!(infer_name("wgbs.py"), "wgbs");
        assert_eq!(infer_name("ATACseq.sh"), "ATACseq");
        assert_eq!(infer_name("plain"), "plain");
    }

    #[test]
    fn test_arguments_keep_declaration_order() {
        let spec = parse(
            "atac.py",
            r#"
path: pipelines/atac.py
arguments:
  "--sample-name": sample_name
  "--genome": genome
  "--input": read1
  "--keep": null
optional_arguments:
  "--prealignments": prealignments
  "--frip-ref-peaks": FRIP_ref
"#,
        )
        .expect("valid spec");

        let flags: Vec<&str> = spec.arguments.iter().map(|a| a.flag.as_str()).collect();
        assert_eq!(flags, vec!["--sample-name", "--genome", "--input", "--keep"]);
        assert_eq!(spec.arguments[3], ArgumentSpec::switch("--keep"));
        assert_eq!(spec.optional_arguments[0].flag, "--prealignments");
        assert_eq!(spec.name, "atac");
        assert!(spec.is_local_only());
    }

    #[test]
    fn test_missing_path_rejected() {
        let err = parse("x.py", "name: X").unwrap_err();
        assert!(matches!(err, InterfaceError::MissingPath { .. }));

        let err = PipelineSpec::from_value("x.py", &Value::Null).unwrap_err();
        assert!(matches!(err, InterfaceError::MissingPath { .. }));
    }

    #[test]
    fn test_duplicate_flag_across_groups_rejected() {
        let err = parse(
            "x.py",
            r#"
path: x.py
arguments:
  "--genome": genome
optional_arguments:
  "--genome": genome_alt
"#,
        )
        .unwrap_err();
        assert!(matches!(err, InterfaceError::DuplicateFlag { flag, .. } if flag == "--genome"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = parse("x.py", "path: x.py\nprotocols: [ATAC]").unwrap_err();
        assert!(matches!(err, InterfaceError::UnknownField { field, .. } if field == "protocols"));
    }

    #[test]
    fn test_non_string_field_name_rejected() {
        let err = parse("x.py", "path: x.py\n1: one").unwrap_err();
        match err {
            InterfaceError::InvalidShape {
                pipeline,
                field,
                expected,
            } => {
                assert_eq!(pipeline, "x.py");
                assert_eq!(field, "<pipeline>");
                assert!(expected.contains("Number(1)"), "got {expected}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_input_file_lists_accept_single_string() {
        let spec = parse(
            "x.py",
            "path: x.py\nrequired_input_files: read1\nall_input_files: [read1, read2]",
        )
        .expect("valid spec");
        assert_eq!(spec.required_input_files, vec!["read1"]);
        assert_eq!(spec.all_input_files, vec!["read1", "read2"]);
    }

    #[test]
    fn test_resources_require_default() {
        let err = parse(
            "x.py",
            "path: x.py\nresources:\n  huge:\n    file_size: 30\n    cores: 24",
        )
        .unwrap_err();
        assert!(matches!(err, InterfaceError::MissingDefaultPackage { .. }));
    }

    #[test]
    fn test_default_threshold_implied_zero() {
        let spec = parse(
            "x.py",
            "path: x.py\nresources:\n  default:\n    cores: 1\n  huge:\n    min_file_size: '30'\n    cores: 24",
        )
        .expect("valid spec");
        let policy = spec.resources.expect("resources");
        assert_eq!(policy.packages()[0].name, "default");
        assert_eq!(policy.packages()[0].file_size, 0.0);
        assert_eq!(policy.packages()[1].file_size, 30.0);
        assert_eq!(policy.packages()[1].get("cores"), Some("24"));
    }

    #[test]
    fn test_non_zero_default_rejected() {
        let err = parse("x.py", "path: x.py\nresources:\n  default:\n    file_size: 1").unwrap_err();
        assert!(matches!(err, InterfaceError::NonZeroDefaultThreshold { .. }));
    }

    #[test]
    fn test_non_default_requires_file_size() {
        let err = parse(
            "x.py",
            "path: x.py\nresources:\n  default:\n    file_size: 0\n  huge:\n    cores: 24",
        )
        .unwrap_err();
        assert!(matches!(err, InterfaceError::MissingFileSize { package, .. } if package == "huge"));
    }

    #[test]
    fn test_negative_or_garbage_file_size_rejected() {
        for bad in ["-5", "'-0.5'", "'lots'", "[1]"] {
            let yaml = format!(
                "path: x.py\nresources:\n  default:\n    file_size: 0\n  big:\n    file_size: {}",
                bad
            );
            let err = parse("x.py", &yaml).unwrap_err();
            assert!(
                matches!(err, InterfaceError::InvalidFileSize { .. }),
                "{} gave {:?}",
                bad,
                err
            );
        }
    }

    #[test]
    fn test_duplicate_threshold_rejected() {
        let err = parse(
            "x.py",
            "path: x.py\nresources:\n  default:\n    file_size: 0\n  a:\n    file_size: 4\n  b:\n    file_size: '4.0'",
        )
        .unwrap_err();
        assert!(matches!(err, InterfaceError::DuplicateThreshold { .. }));
        assert_eq!(err.kind(), crate::error::FailureKind::InvalidResourceSpec);
    }

    #[test]
    fn test_conflicting_threshold_names_rejected() {
        let err = parse(
            "x.py",
            "path: x.py\nresources:\n  default:\n    file_size: 0\n    min_file_size: 0",
        )
        .unwrap_err();
        assert!(matches!(err, InterfaceError::ConflictingFileSize { .. }));
    }
}
