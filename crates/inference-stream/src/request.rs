/// Parameters for one streaming inference call.
///
/// Immutable for the lifetime of a request. The WebSocket transport sends the
/// whole struct as the `start` envelope payload (camelCase); the SSE transport
/// renders it as URL query pairs via [`StreamRequest::query_pairs`].
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRequest {
    /// Per-request correlation id for logs; never serialized onto the wire.
    #[serde(skip)]
    pub request_id: uuid::Uuid,
    /// Prompt text (required, non-blank).
    pub prompt: String,
    /// Optional conversation identifier for multi-turn context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation: Option<String>,
    /// Whether the backend may use web search.
    pub web_search: bool,
    /// Whether the backend may use its planning tool.
    pub planning: bool,
    /// Whether an audio rendition of the response is requested.
    ///
    /// Gates closure: when false, the stream closes on text completion alone.
    #[serde(rename = "audio")]
    pub wants_audio: bool,
    /// Whether the multi-agent pipeline is requested.
    pub multi_agent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_rate: Option<f32>,
    /// Opaque reference to an input image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl StreamRequest {
    /// Creates a request with the given prompt and default flags.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4(),
            prompt: prompt.into(),
            conversation: None,
            web_search: false,
            planning: false,
            wants_audio: false,
            multi_agent: false,
            temperature: None,
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
            speech_rate: None,
            image: None,
        }
    }

    /// Renders the request as URL query pairs for the SSE transport.
    ///
    /// Booleans are rendered as literal `"true"`/`"false"`, numbers as their
    /// decimal form; unset options are omitted.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("prompt", self.prompt.clone())];
        if let Some(conversation) = &self.conversation {
            pairs.push(("conversation", conversation.clone()));
        }
        pairs.push(("webSearch", self.web_search.to_string()));
        pairs.push(("planning", self.planning.to_string()));
        pairs.push(("audio", self.wants_audio.to_string()));
        pairs.push(("multiAgent", self.multi_agent.to_string()));
        if let Some(temperature) = self.temperature {
            pairs.push(("temperature", temperature.to_string()));
        }
        if let Some(top_p) = self.top_p {
            pairs.push(("topP", top_p.to_string()));
        }
        if let Some(frequency_penalty) = self.frequency_penalty {
            pairs.push(("frequencyPenalty", frequency_penalty.to_string()));
        }
        if let Some(presence_penalty) = self.presence_penalty {
            pairs.push(("presencePenalty", presence_penalty.to_string()));
        }
        if let Some(speech_rate) = self.speech_rate {
            pairs.push(("speechRate", speech_rate.to_string()));
        }
        if let Some(image) = &self.image {
            pairs.push(("image", image.clone()));
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_pairs_render_booleans_and_numbers_as_strings() {
        let mut request = StreamRequest::new("hello");
        request.wants_audio = true;
        request.temperature = Some(0.7);
        let pairs = request.query_pairs();
        assert!(pairs.contains(&("prompt", "hello".to_string())));
        assert!(pairs.contains(&("audio", "true".to_string())));
        assert!(pairs.contains(&("webSearch", "false".to_string())));
        assert!(pairs.contains(&("temperature", "0.7".to_string())));
    }

    #[test]
    fn query_pairs_omit_unset_options() {
        let request = StreamRequest::new("hello");
        let keys: Vec<&str> = request.query_pairs().iter().map(|(k, _)| *k).collect();
        assert!(!keys.contains(&"conversation"));
        assert!(!keys.contains(&"topP"));
        assert!(!keys.contains(&"image"));
    }

    #[test]
    fn wire_serialization_is_camel_case_and_skips_request_id() {
        let mut request = StreamRequest::new("hi");
        request.web_search = true;
        request.top_p = Some(0.9);
        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(value.get("prompt").and_then(|v| v.as_str()), Some("hi"));
        assert_eq!(value.get("webSearch").and_then(|v| v.as_bool()), Some(true));
        let top_p = value.get("topP").and_then(|v| v.as_f64()).expect("topP");
        assert!((top_p - 0.9).abs() < 1e-6);
        assert!(value.get("requestId").is_none());
        assert!(value.get("conversation").is_none());
    }
}
