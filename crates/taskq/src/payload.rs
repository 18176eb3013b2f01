//! Wire form of a queued task

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::QueueError;
use crate::retry::RetryPolicy;
use crate::task::{Task, TaskParams};

/// Whether a payload came from the normal list or the delayable set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Normal,
    Delayable,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => f.write_str("normal"),
            Self::Delayable => f.write_str("delayable"),
        }
    }
}

/// A serialized task as stored in the list or sorted set.
///
/// ```json
/// {"taskName":"sendEmail","taskParams":{"to":"a@b.c"},"runAt":"2024-05-01 08:30:00",
///  "failTimes":1,"retryAttempts":2,"retryInterval":1000}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuePayload {
    #[serde(default)]
    pub task_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_params: Option<TaskParams>,
    /// Present only on delayable payloads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_at: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_int",
        skip_serializing_if = "Option::is_none"
    )]
    pub fail_times: Option<i64>,
    #[serde(
        default,
        deserialize_with = "lenient_int",
        skip_serializing_if = "Option::is_none"
    )]
    pub retry_attempts: Option<i64>,
    /// Milliseconds
    #[serde(
        default,
        deserialize_with = "lenient_int",
        skip_serializing_if = "Option::is_none"
    )]
    pub retry_interval: Option<i64>,
}

impl QueuePayload {
    /// Payload for `task`; empty parameter maps are left out.
    pub fn for_task(task: &dyn Task, policy: Option<&RetryPolicy>) -> Self {
        let mut payload = Self {
            task_name: task.name().to_string(),
            task_params: task.params().filter(|p| !p.is_empty()).cloned(),
            ..Default::default()
        };
        if let Some(policy) = policy {
            payload.fail_times = Some(i64::from(policy.fail_times()));
            payload.retry_attempts = Some(i64::from(policy.retry_attempts()));
            payload.retry_interval =
                Some(i64::try_from(policy.retry_interval().as_millis()).unwrap_or(i64::MAX));
        }
        payload
    }

    pub fn with_run_at(mut self, run_at: String) -> Self {
        self.run_at = Some(run_at);
        self
    }

    pub fn kind(&self) -> TaskKind {
        match self.run_at.as_deref() {
            Some(run_at) if !run_at.is_empty() => TaskKind::Delayable,
            _ => TaskKind::Normal,
        }
    }

    /// Retry state carried by the payload. Missing or negative fields read as
    /// zero, which yields a policy that never retries.
    pub fn retry_policy(&self) -> RetryPolicy {
        let clamp = |v: Option<i64>| u32::try_from(v.unwrap_or(0).max(0)).unwrap_or(u32::MAX);
        let interval_ms = u64::try_from(self.retry_interval.unwrap_or(0).max(0)).unwrap_or(0);
        RetryPolicy::new(
            clamp(self.retry_attempts),
            Duration::from_millis(interval_ms),
        )
        .with_fail_times(clamp(self.fail_times))
    }

    pub fn to_json(&self) -> Result<String, QueueError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self, QueueError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Read a retry counter from whatever JSON a producer wrote: integers,
/// floats (truncated), numeric strings and booleans. Anything else is absent.
fn lenient_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(int_from_value))
}

fn int_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.trunc().clamp(i64::MIN as f64, i64::MAX as f64) as i64)
        }),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| int_from_value(&Value::from(s.parse::<f64>().ok()?)))
        }
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    #[derive(Debug)]
    struct Sample {
        params: TaskParams,
    }

    #[async_trait]
    impl Task for Sample {
        fn name(&self) -> &str {
            "sample"
        }

        fn params(&self) -> Option<&TaskParams> {
            Some(&self.params)
        }

        async fn run(&mut self) -> bool {
            true
        }
    }

    #[test]
    fn test_normal_payload_omits_optional_fields() {
        let task = Sample {
            params: TaskParams::new(),
        };
        let raw = QueuePayload::for_task(&task, None).to_json().unwrap();
        assert_eq!(raw, r#"{"taskName":"sample"}"#);
    }

    #[test]
    fn test_payload_wire_shape_with_retry_state() {
        let mut params = TaskParams::new();
        params.insert("to".into(), json!("ops@example.com"));
        let task = Sample { params };
        let policy = RetryPolicy::new(2, Duration::from_millis(1500)).with_fail_times(1);

        let payload = QueuePayload::for_task(&task, Some(&policy))
            .with_run_at("2024-05-01 08:30:00".into());
        let value: serde_json::Value = serde_json::from_str(&payload.to_json().unwrap()).unwrap();

        assert_eq!(
            value,
            json!({
                "taskName": "sample",
                "taskParams": {"to": "ops@example.com"},
                "runAt": "2024-05-01 08:30:00",
                "failTimes": 1,
                "retryAttempts": 2,
                "retryInterval": 1500
            })
        );
        assert_eq!(payload.kind(), TaskKind::Delayable);
        assert_eq!(payload.retry_policy(), policy);
    }

    #[test]
    fn test_missing_retry_fields_disable_retry() {
        let payload = QueuePayload::from_json(r#"{"taskName":"sample"}"#).unwrap();
        assert_eq!(payload.kind(), TaskKind::Normal);
        assert!(payload.retry_policy().next_attempt().is_none());

        let negative =
            QueuePayload::from_json(r#"{"taskName":"sample","retryAttempts":-1,"retryInterval":-5}"#)
                .unwrap();
        assert!(!negative.retry_policy().is_enabled());
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(matches!(
            QueuePayload::from_json("not json"),
            Err(QueueError::Serialization(_))
        ));
    }

    #[test]
    fn test_retry_fields_are_read_leniently() {
        let payload = QueuePayload::from_json(
            r#"{"taskName":"sample","failTimes":"1","retryAttempts":2.0,"retryInterval":1000.7}"#,
        )
        .unwrap();
        assert_eq!(payload.fail_times, Some(1));
        assert_eq!(payload.retry_attempts, Some(2));
        assert_eq!(payload.retry_interval, Some(1000));
        assert_eq!(
            payload.retry_policy(),
            RetryPolicy::new(2, Duration::from_millis(1000)).with_fail_times(1)
        );

        let odd = QueuePayload::from_json(
            r#"{"taskName":"sample","failTimes":null,"retryAttempts":"lots","retryInterval":{"ms":1}}"#,
        )
        .unwrap();
        assert_eq!(odd.fail_times, None);
        assert_eq!(odd.retry_attempts, None);
        assert_eq!(odd.retry_interval, None);
        assert!(!odd.retry_policy().is_enabled());
    }
}
