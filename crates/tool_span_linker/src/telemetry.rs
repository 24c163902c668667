//! Telemetry settings for instrumented LLM calls.
//!
//! Builds the function id and metadata an application hands to the LLM
//! runtime when it makes a call. The runtime stamps them on every span of
//! that call as `ai.telemetry.functionId` and `ai.telemetry.metadata.*`,
//! which is what [`map_attributes`](crate::attributes::map_attributes) reads
//! back on the export side.

use crate::attributes::{FUNCTION_ID, METADATA_PREFIX};
use crate::span::{AttributeValue, Span};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Metadata key of the prompt template version.
pub const PROMPT_TEMPLATE_VERSION_ID: &str = "freeplay.prompt_template.version.id";
/// Metadata key of the prompt template.
pub const PROMPT_TEMPLATE_ID: &str = "freeplay.prompt_template.id";
/// Metadata key of the JSON-encoded input variables.
pub const INPUT_VARIABLES: &str = "freeplay.input_variables";

/// Identifies the prompt template a call was formatted from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptInfo {
    pub prompt_template_id: String,
    pub prompt_template_version_id: String,
}

/// Caller-supplied settings for one instrumented call.
#[derive(Debug, Clone, Default)]
pub struct TelemetryOptions {
    /// Becomes the span name.
    pub function_id: String,
    /// Groups related calls.
    pub session_id: String,
    /// Variables the prompt was formatted with.
    pub input_variables: Option<Map<String, Value>>,
    /// Extra metadata, merged last.
    pub additional_metadata: Map<String, Value>,
}

/// Settings in the shape the LLM runtime accepts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySettings {
    pub is_enabled: bool,
    pub function_id: String,
    pub metadata: BTreeMap<String, Value>,
}

impl TelemetrySettings {
    /// Builds settings for a call formatted from `prompt`.
    ///
    /// Additional metadata is merged after the standard keys and overrides
    /// them on collision.
    pub fn for_prompt(prompt: &PromptInfo, options: TelemetryOptions) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert("sessionId".to_string(), Value::String(options.session_id));
        metadata.insert(
            PROMPT_TEMPLATE_VERSION_ID.to_string(),
            Value::String(prompt.prompt_template_version_id.clone()),
        );
        metadata.insert(
            PROMPT_TEMPLATE_ID.to_string(),
            Value::String(prompt.prompt_template_id.clone()),
        );

        if let Some(variables) = options.input_variables {
            metadata.insert(
                INPUT_VARIABLES.to_string(),
                Value::String(Value::Object(variables).to_string()),
            );
        }

        metadata.extend(options.additional_metadata);

        Self {
            is_enabled: true,
            function_id: options.function_id,
            metadata,
        }
    }

    /// Renders the settings as the span attributes the runtime would emit.
    ///
    /// Strings, integers, floats and booleans keep their type; `null` maps to
    /// [`AttributeValue::Null`]; string arrays stay arrays; any other value is
    /// carried as its JSON text.
    pub fn to_span_attributes(&self) -> Vec<(String, AttributeValue)> {
        let mut attributes = vec![(
            FUNCTION_ID.to_string(),
            AttributeValue::String(self.function_id.clone()),
        )];

        attributes.extend(
            self.metadata
                .iter()
                .map(|(key, value)| (format!("{METADATA_PREFIX}{key}"), json_to_attribute(value))),
        );

        attributes
    }

    /// Stamps the settings onto `span`.
    pub fn apply_to(&self, span: &mut Span) {
        for (key, value) in self.to_span_attributes() {
            span.set_attribute(key, value);
        }
    }
}

fn json_to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null,
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::String(s) => AttributeValue::String(s.clone()),
        Value::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Int(i),
            None => n.as_f64().map_or_else(|| AttributeValue::String(n.to_string()), AttributeValue::Float),
        },
        Value::Array(items) => {
            let strings: Option<Vec<String>> =
                items.iter().map(|v| v.as_str().map(str::to_string)).collect();
            strings.map_or_else(|| AttributeValue::String(value.to_string()), AttributeValue::Array)
        }
        Value::Object(_) => AttributeValue::String(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{map_attributes, MetadataConvention, SESSION_ID};
    use crate::span::SpanKind;
    use serde_json::json;

    fn prompt() -> PromptInfo {
        PromptInfo {
            prompt_template_id: "tmpl-1".into(),
            prompt_template_version_id: "ver-3".into(),
        }
    }

    fn options() -> TelemetryOptions {
        TelemetryOptions {
            function_id: "chat-endpoint".into(),
            session_id: "conv-42".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_for_prompt_standard_metadata() {
        let settings = TelemetrySettings::for_prompt(&prompt(), options());

        assert!(settings.is_enabled);
        assert_eq!(settings.function_id, "chat-endpoint");
        assert_eq!(settings.metadata["sessionId"], json!("conv-42"));
        assert_eq!(settings.metadata[PROMPT_TEMPLATE_ID], json!("tmpl-1"));
        assert_eq!(settings.metadata[PROMPT_TEMPLATE_VERSION_ID], json!("ver-3"));
        assert!(!settings.metadata.contains_key(INPUT_VARIABLES));
    }

    #[test]
    fn test_input_variables_are_json_encoded() {
        let mut opts = options();
        opts.input_variables = json!({ "accent": "cowboy" }).as_object().cloned();

        let settings = TelemetrySettings::for_prompt(&prompt(), opts);
        assert_eq!(
            settings.metadata[INPUT_VARIABLES],
            json!(r#"{"accent":"cowboy"}"#)
        );
    }

    #[test]
    fn test_additional_metadata_overrides() {
        let mut opts = options();
        opts.additional_metadata = json!({ "sessionId": "override", "tier": "gold" })
            .as_object()
            .cloned()
            .unwrap();

        let settings = TelemetrySettings::for_prompt(&prompt(), opts);
        assert_eq!(settings.metadata["sessionId"], json!("override"));
        assert_eq!(settings.metadata["tier"], json!("gold"));
    }

    #[test]
    fn test_serializes_in_runtime_shape() {
        let settings = TelemetrySettings::for_prompt(&prompt(), options());
        let value = serde_json::to_value(&settings).unwrap();
        assert_eq!(value["isEnabled"], json!(true));
        assert_eq!(value["functionId"], json!("chat-endpoint"));
        assert_eq!(value["metadata"]["sessionId"], json!("conv-42"));
    }

    #[test]
    fn test_json_to_attribute() {
        assert_eq!(json_to_attribute(&json!(3)), AttributeValue::Int(3));
        assert_eq!(json_to_attribute(&json!(1.5)), AttributeValue::Float(1.5));
        assert_eq!(json_to_attribute(&json!(null)), AttributeValue::Null);
        assert_eq!(
            json_to_attribute(&json!(["a", "b"])),
            AttributeValue::Array(vec!["a".into(), "b".into()])
        );
        assert_eq!(
            json_to_attribute(&json!([1, 2])),
            AttributeValue::String("[1,2]".into())
        );
    }

    #[test]
    fn test_round_trip_through_attribute_mapping() {
        let settings = TelemetrySettings::for_prompt(&prompt(), options());
        let mut span = Span::new(1, 1, 0, "ai.streamText".into(), SpanKind::Internal);
        settings.apply_to(&mut span);

        map_attributes(&mut span, MetadataConvention::SessionId);

        assert_eq!(span.name, "chat-endpoint");
        assert_eq!(span.string_attribute(SESSION_ID), Some("conv-42"));
        assert_eq!(
            span.string_attribute("ai.telemetry.metadata.freeplay.prompt_template.id"),
            Some("tmpl-1")
        );
    }
}
