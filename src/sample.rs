//! Samples as consumed by the resolver: a name plus string attributes.
//!
//! Reading annotation sheets is someone else's job. [`load_samples`] only
//! understands a YAML (or JSON) list of flat mappings, which is what the CLI
//! accepts.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde_yaml::Value;
use thiserror::Error;

/// Attribute holding a sample's identity.
pub const SAMPLE_NAME_ATTRIBUTE: &str = "sample_name";

/// Errors that can occur while loading samples.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("IO error reading samples: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Samples must be a list of mappings")]
    NotAList,

    #[error("Sample #{index} is missing '{}'", SAMPLE_NAME_ATTRIBUTE)]
    MissingName { index: usize },

    #[error("Sample #{index}: attribute '{attribute}' must be a scalar")]
    NonScalarAttribute { index: usize, attribute: String },

    #[error("Duplicate sample name '{0}'")]
    DuplicateName(String),
}

/// One sample. Attributes are read-only once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    name: String,
    attributes: BTreeMap<String, String>,
}

impl Sample {
    /// Creates a sample whose `sample_name` attribute is `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut attributes = BTreeMap::new();
        attributes.insert(SAMPLE_NAME_ATTRIBUTE.to_string(), name.clone());
        Self { name, attributes }
    }

    /// Builds a sample from an attribute mapping containing `sample_name`.
    pub fn from_attributes(attributes: BTreeMap<String, String>) -> Option<Self> {
        let name = attributes.get(SAMPLE_NAME_ATTRIBUTE)?.clone();
        Some(Self { name, attributes })
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.attributes.get(attribute).map(String::as_str)
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }
}

/// Loads samples from a YAML or JSON file holding a list of mappings.
pub fn load_samples<P: AsRef<Path>>(path: P) -> Result<Vec<Sample>, SampleError> {
    let content = fs::read_to_string(path)?;
    parse_samples(&content)
}

/// Parses samples from YAML or JSON text.
///
/// Scalar values are stringified; `null` attributes are dropped.
pub fn parse_samples(content: &str) -> Result<Vec<Sample>, SampleError> {
    let value: Value = serde_yaml::from_str(content)?;
    let Value::Sequence(rows) = value else {
        return Err(SampleError::NotAList);
    };

    let mut samples: Vec<Sample> = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let Value::Mapping(row) = row else {
            return Err(SampleError::NotAList);
        };

        let mut attributes = BTreeMap::new();
        for (key, value) in row {
            let Some(key) = key.as_str() else {
                return Err(SampleError::NotAList);
            };
            let value = match value {
                Value::Null => continue,
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => {
                    return Err(SampleError::NonScalarAttribute {
                        index,
                        attribute: key.to_string(),
                    })
                }
            };
            attributes.insert(key.to_string(), value);
        }

        let sample = Sample::from_attributes(attributes).ok_or(SampleError::MissingName { index })?;
        if samples.iter().any(|s| s.name == sample.name) {
            return Err(SampleError::DuplicateName(sample.name));
        }
        samples.push(sample);
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yaml_samples() {
        let samples = parse_samples(
            r#"
- sample_name: frog_1
  protocol: ATAC
  read1: data/frog_1_R1.fq.gz
  read_length: 50
  FRIP_ref: ~
- sample_name: frog_2
  protocol: ATAC
"#,
        )
        .expect("parses");

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].name(), "frog_1");
        assert_eq!(samples[0].get("read_length"), Some("50"));
        assert_eq!(samples[0].get("FRIP_ref"), None);
        assert_eq!(samples[1].get("sample_name"), Some("frog_2"));
    }

    #[test]
    fn test_parse_json_samples() {
        let samples =
            parse_samples(r#"[{"sample_name": "a", "genome": "hg38"}]"#).expect("parses");
        assert_eq!(samples[0].get("genome"), Some("hg38"));
    }

    #[test]
    fn test_rejects_bad_shapes() {
        assert!(matches!(
            parse_samples("sample_name: a"),
            Err(SampleError::NotAList)
        ));
        assert!(matches!(
            parse_samples("- genome: hg38"),
            Err(SampleError::MissingName { index: 0 })
        ));
        assert!(matches!(
            parse_samples("- sample_name: a\n  reads: [x, y]"),
            Err(SampleError::NonScalarAttribute { .. })
        ));
        assert!(matches!(
            parse_samples("- sample_name: a\n- sample_name: a"),
            Err(SampleError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_sample_builder() {
        let sample = Sample::new("s1").with_attribute("genome", "mm10");
        assert_eq!(sample.name(), "s1");
        assert_eq!(sample.get("sample_name"), Some("s1"));
        assert_eq!(sample.attributes().len(), 2);
    }
}
