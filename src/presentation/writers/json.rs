use anyhow::Result;

use crate::domain::{
    diff_result::DiffResult,
    ports::{OutputWriter, RenderOptions},
};
use crate::presentation::writers::limited_canonical;

/// Pretty JSON in the canonical `assert` shape.
pub struct JsonWriter;

impl OutputWriter for JsonWriter {
    fn format(&self, result: &DiffResult, opts: &RenderOptions) -> Result<String> {
        let mut out = serde_json::to_string_pretty(&limited_canonical(result, opts.limit))?;
        out.push('\n');
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::assert::{assert_matches, parse_expected, ExpectedFormat};
    use crate::presentation::writers::fixtures::sample_result;
    use serde_json::{json, Value};

    #[test]
    fn output_is_the_canonical_shape() {
        let out = JsonWriter
            .format(&sample_result(), &RenderOptions::default())
            .unwrap();
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(
            parsed["users"]["updated"][0],
            json!({
                "primary_key": {"id": 1},
                "before": {"id": 1, "name": "a"},
                "after": {"id": 1, "name": "a2"},
            })
        );
        assert_eq!(parsed["orders"]["inserted"].as_array().map(Vec::len), Some(3));

        let expected = parse_expected(&out, ExpectedFormat::Json).unwrap();
        assert!(assert_matches(&expected, &sample_result()).is_match());
    }

    #[test]
    fn limit_truncates_buckets() {
        let out = JsonWriter
            .format(&sample_result(), &RenderOptions { limit: 1 })
            .unwrap();
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["orders"]["inserted"].as_array().map(Vec::len), Some(1));
    }
}
