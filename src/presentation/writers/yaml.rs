use anyhow::{Context, Result};

use crate::domain::{
    diff_result::DiffResult,
    ports::{OutputWriter, RenderOptions},
};
use crate::presentation::writers::limited_canonical;

/// YAML in the same shape `assert` expects, so output can be saved as an
/// expected-changes file.
pub struct YamlWriter;

impl OutputWriter for YamlWriter {
    fn format(&self, result: &DiffResult, opts: &RenderOptions) -> Result<String> {
        serde_yaml::to_string(&limited_canonical(result, opts.limit))
            .context("Failed to serialise diff as YAML")
    }

    fn name(&self) -> &'static str {
        "yaml"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::assert::{assert_matches, parse_expected, ExpectedFormat};
    use crate::presentation::writers::fixtures::sample_result;

    #[test]
    fn output_asserts_clean_against_the_same_diff() {
        let result = sample_result();
        let out = YamlWriter.format(&result, &RenderOptions::default()).unwrap();
        let expected = parse_expected(&out, ExpectedFormat::Yaml).unwrap();
        assert!(assert_matches(&expected, &result).is_match(), "{out}");
    }

    #[test]
    fn unchanged_tables_are_omitted() {
        let out = YamlWriter
            .format(&sample_result(), &RenderOptions::default())
            .unwrap();
        assert!(!out.contains("audit"), "{out}");
        assert!(out.contains("primary_key:"), "{out}");
    }
}
