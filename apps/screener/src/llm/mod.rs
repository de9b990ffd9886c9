//! Generation capability: the single seam through which all stages obtain
//! model output.
//!
//! Stages never call a model API directly: they hold a `&dyn Generator` and
//! go through `generate_json_with_retry`, which layers schema validation,
//! corrective reprompting and exponential backoff on top of the raw call.
//! The production backend is `AnthropicGenerator`; tests swap in scripted
//! stubs behind the same trait.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::config::PipelineConfig;
use crate::errors::GenerateError;

pub mod anthropic;

/// Text generation against a prompt + system instruction. Implementations
/// must be safe for concurrent invocation; structured output is requested by
/// embedding the JSON schema in the prompt and parsed by the caller.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str, system: &str) -> Result<String, GenerateError>;
}

/// Retry policy for transient generation failures (timeouts and schema
/// violations). `budget` counts total attempts, first try included.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub budget: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            budget: config.retry_budget.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
        }
    }

    /// Delay before retry `attempt` (1-based): base, 2×base, 4×base, ...
    /// Attempt 0 (the first try) gets the base delay rather than underflowing.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.backoff_base * (1 << attempt.saturating_sub(1).min(8))
    }
}

/// Calls the generator once and parses the reply as JSON after stripping any
/// markdown code fences. Parse failures surface as `GenerateError::Schema`.
pub async fn generate_json<T: DeserializeOwned>(
    generator: &dyn Generator,
    prompt: &str,
    system: &str,
) -> Result<T, GenerateError> {
    let raw = generator.generate(prompt, system).await?;
    let stripped = strip_json_fences(&raw);
    serde_json::from_str(stripped)
        .map_err(|e| GenerateError::Schema(format!("invalid JSON from generator: {e}")))
}

/// Schema-validated generation with retry. Transient failures are retried
/// with exponential backoff up to the policy's budget; on schema failures the
/// retry carries a corrective reprompt naming what was rejected. Permanent
/// failures (`Refused`) return immediately.
pub async fn generate_json_with_retry<T: DeserializeOwned>(
    generator: &dyn Generator,
    prompt: &str,
    system: &str,
    retry: &RetryPolicy,
) -> Result<T, GenerateError> {
    generate_validated_with_retry(generator, prompt, system, retry, |_| Ok(())).await
}

/// Like `generate_json_with_retry`, with an extra semantic check applied to
/// the parsed value. A rejection counts as a schema violation, so replies
/// that parse but break a declared constraint (a score out of range, say) go
/// through the same corrective-reprompt retry path.
pub async fn generate_validated_with_retry<T, F>(
    generator: &dyn Generator,
    prompt: &str,
    system: &str,
    retry: &RetryPolicy,
    validate: F,
) -> Result<T, GenerateError>
where
    T: DeserializeOwned,
    F: Fn(&T) -> Result<(), String>,
{
    let mut effective_prompt = prompt.to_string();
    let mut last_error: Option<GenerateError> = None;

    for attempt in 0..retry.budget {
        if attempt > 0 {
            let delay = retry.backoff_delay(attempt);
            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "generator call failed, backing off before retry"
            );
            tokio::time::sleep(delay).await;
        }

        let error = match generate_json::<T>(generator, &effective_prompt, system).await {
            Ok(value) => match validate(&value) {
                Ok(()) => return Ok(value),
                Err(reason) => GenerateError::Schema(reason),
            },
            Err(e) => e,
        };

        if !error.is_transient() {
            return Err(error);
        }
        if let GenerateError::Schema(ref reason) = error {
            effective_prompt = format!(
                "{prompt}\n\nYour previous reply was rejected ({reason}). \
                Respond again with ONLY the requested JSON: no prose, \
                no code fences, no extra fields."
            );
        }
        last_error = Some(error);
    }

    Err(last_error.unwrap_or_else(|| {
        GenerateError::Timeout(format!("retry budget of {} exhausted", retry.budget))
    }))
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Scripted generator stub shared by stage and orchestrator tests.

    use std::sync::Mutex;

    use super::*;

    /// Replays a fixed sequence of replies, then repeats the last one.
    pub struct ScriptedGenerator {
        replies: Mutex<Vec<Result<String, GenerateError>>>,
        pub calls: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        pub fn new(replies: Vec<Result<String, GenerateError>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Stub that answers every call with the same JSON body.
        pub fn always(reply: &str) -> Self {
            Self::new(vec![Ok(reply.to_string())])
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        async fn generate(&self, prompt: &str, _system: &str) -> Result<String, GenerateError> {
            self.calls.lock().unwrap().push(prompt.to_string());
            let mut replies = self.replies.lock().unwrap();
            let reply = if replies.len() > 1 {
                replies.remove(0)
            } else {
                match replies.first() {
                    Some(Ok(s)) => Ok(s.clone()),
                    Some(Err(e)) => Err(clone_error(e)),
                    None => Err(GenerateError::Timeout("script exhausted".into())),
                }
            };
            reply
        }
    }

    fn clone_error(e: &GenerateError) -> GenerateError {
        match e {
            GenerateError::Timeout(m) => GenerateError::Timeout(m.clone()),
            GenerateError::Refused(m) => GenerateError::Refused(m.clone()),
            GenerateError::Schema(m) => GenerateError::Schema(m.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::test_support::ScriptedGenerator;
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Probe {
        value: u32,
    }

    fn policy(budget: u32) -> RetryPolicy {
        RetryPolicy {
            budget,
            backoff_base: Duration::from_millis(500),
        }
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"value\": 1}\n```";
        assert_eq!(strip_json_fences(input), "{\"value\": 1}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        assert_eq!(strip_json_fences("{\"value\": 1}"), "{\"value\": 1}");
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let p = policy(4);
        assert_eq!(p.backoff_delay(1), Duration::from_millis(500));
        assert_eq!(p.backoff_delay(2), Duration::from_millis(1000));
        assert_eq!(p.backoff_delay(3), Duration::from_millis(2000));
    }

    #[test]
    fn test_backoff_handles_attempt_zero_and_caps_the_shift() {
        let p = policy(4);
        assert_eq!(p.backoff_delay(0), Duration::from_millis(500));
        assert_eq!(p.backoff_delay(9), p.backoff_delay(40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_twice_then_valid_succeeds_within_budget_of_three() {
        let stub = ScriptedGenerator::new(vec![
            Ok("not json at all".to_string()),
            Ok("still { broken".to_string()),
            Ok(r#"{"value": 42}"#.to_string()),
        ]);
        let probe: Probe = generate_json_with_retry(&stub, "p", "s", &policy(3))
            .await
            .unwrap();
        assert_eq!(probe, Probe { value: 42 });
        assert_eq!(stub.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_twice_exhausts_budget_of_two() {
        let stub = ScriptedGenerator::new(vec![
            Ok("not json".to_string()),
            Ok("also not json".to_string()),
            Ok(r#"{"value": 42}"#.to_string()),
        ]);
        let err = generate_json_with_retry::<Probe>(&stub, "p", "s", &policy(2))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerateError::Schema(_)));
        assert_eq!(stub.call_count(), 2);
    }

    #[tokio::test]
    async fn test_refused_is_not_retried() {
        let stub = ScriptedGenerator::new(vec![
            Err(GenerateError::Refused("policy".into())),
            Ok(r#"{"value": 1}"#.to_string()),
        ]);
        let err = generate_json_with_retry::<Probe>(&stub, "p", "s", &policy(3))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerateError::Refused(_)));
        assert_eq!(stub.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schema_retry_carries_corrective_reprompt() {
        let stub = ScriptedGenerator::new(vec![
            Ok("garbage".to_string()),
            Ok(r#"{"value": 7}"#.to_string()),
        ]);
        let _: Probe = generate_json_with_retry(&stub, "original prompt", "s", &policy(3))
            .await
            .unwrap();
        let calls = stub.calls.lock().unwrap();
        assert_eq!(calls[0], "original prompt");
        assert!(calls[1].starts_with("original prompt"));
        assert!(calls[1].contains("rejected"));
    }
}
