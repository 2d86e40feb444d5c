use super::LlmBackend;
use crate::error::EnrichError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

pub const DEFAULT_MAX_RETRIES: u32 = 2;

static FENCED_JSON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```(?:json)?\s*(\{[\s\S]*?\}|\[[\s\S]*?\])\s*```").expect("valid fenced JSON regex")
});

/// Parse JSON out of free-form model output: the whole text, a fenced block,
/// or the span between the first `{` and the last `}`.
pub fn extract_json(raw: &str) -> Result<Value, EnrichError> {
    let text = raw.trim();
    if let Ok(value) = serde_json::from_str(text) {
        return Ok(value);
    }

    if let Some(block) = FENCED_JSON.captures(text).and_then(|c| c.get(1)) {
        return serde_json::from_str(block.as_str())
            .map_err(|e| EnrichError::InvalidResponse(format!("fenced JSON: {e}")));
    }

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => serde_json::from_str(&text[start..=end])
            .map_err(|e| EnrichError::InvalidResponse(format!("embedded JSON: {e}"))),
        _ => Err(EnrichError::InvalidResponse(
            "could not extract JSON from LLM output".to_string(),
        )),
    }
}

/// Call the backend until it yields a JSON object, at most `max_retries + 1` times
pub async fn call_llm_json(
    backend: &dyn LlmBackend,
    prompt: &str,
    max_retries: u32,
) -> Result<Map<String, Value>, EnrichError> {
    let attempts = max_retries + 1;
    let mut last = String::new();
    for attempt in 1..=attempts {
        let result = backend.complete(prompt).await.and_then(|raw| match extract_json(&raw)? {
            Value::Object(map) => Ok(map),
            _ => Err(EnrichError::InvalidResponse(
                "LLM response root must be a JSON object".to_string(),
            )),
        });
        match result {
            Ok(map) => return Ok(map),
            Err(e) => {
                log::debug!("{} attempt {attempt}/{attempts} failed: {e}", backend.name());
                last = e.to_string();
            }
        }
    }
    Err(EnrichError::RetriesExhausted { attempts, last })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays canned responses, then repeats the last one
    pub(crate) struct MockBackend {
        responses: Mutex<Vec<Result<String, EnrichError>>>,
        pub calls: AtomicUsize,
    }

    impl MockBackend {
        pub(crate) fn new(responses: Vec<Result<String, EnrichError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn always(response: Result<String, EnrichError>) -> Self {
            Self::new(vec![response])
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmBackend for MockBackend {
        async fn complete(&self, _prompt: &str) -> Result<String, EnrichError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.len() > 1 {
                responses.remove(0)
            } else {
                responses[0].clone()
            }
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    #[test]
    fn extracts_plain_fenced_and_embedded_json() {
        assert_eq!(extract_json(" {\"a\": 1} ").unwrap(), json!({"a": 1}));
        assert_eq!(
            extract_json("Here you go:\n```json\n{\"a\": 2}\n```\nthanks").unwrap(),
            json!({"a": 2})
        );
        assert_eq!(
            extract_json("prefix {\"a\": {\"b\": 3}} suffix").unwrap(),
            json!({"a": {"b": 3}})
        );
        assert!(extract_json("no json here").is_err());
    }

    #[tokio::test]
    async fn retries_until_valid_object() {
        let backend = MockBackend::new(vec![
            Err(EnrichError::Request("flaky".into())),
            Ok("[1, 2]".into()),
            Ok("{\"findings\": []}".into()),
        ]);
        let map = call_llm_json(&backend, "p", DEFAULT_MAX_RETRIES).await.unwrap();
        assert!(map.contains_key("findings"));
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_budget() {
        let backend = MockBackend::always(Ok("not json".into()));
        let err = call_llm_json(&backend, "p", 2).await.unwrap_err();
        assert!(matches!(err, EnrichError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(backend.call_count(), 3);
    }
}
