//! Builtin tools

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::tools::Tool;
use crate::{Error, Result};

/// Current date/time query
pub struct ClockTool;

#[async_trait]
impl Tool for ClockTool {
    fn name(&self) -> &str {
        "get_time"
    }

    fn description(&self) -> &str {
        "Get the current date and time in UTC"
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
        })
    }

    async fn invoke(&self, _args: Value) -> Result<String> {
        let now = chrono::Utc::now();
        Ok(serde_json::json!({
            "utc": now.to_rfc3339(),
            "readable": now.format("%A, %B %e %Y, %H:%M UTC").to_string(),
        })
        .to_string())
    }
}

/// Current-weather query against wttr.in
pub struct WeatherTool {
    client: reqwest::Client,
}

impl WeatherTool {
    /// Build with a bounded request timeout
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        }
    }
}

impl Default for WeatherTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Get current weather conditions for a location"
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "City name, e.g. \"Berlin\""
                }
            },
            "required": ["location"]
        })
    }

    async fn invoke(&self, args: Value) -> Result<String> {
        let location = args
            .get("location")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Tool("missing required argument: location".to_string()))?;

        let url = format!("https://wttr.in/{}?format=j1", urlencoding::encode(location));
        let body: Value = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Tool(format!("weather request failed: {e}")))?
            .error_for_status()
            .map_err(|e| Error::Tool(format!("weather request failed: {e}")))?
            .json()
            .await
            .map_err(|e| Error::Tool(format!("weather response malformed: {e}")))?;

        let current = body
            .get("current_condition")
            .and_then(Value::as_array)
            .and_then(|a| a.first())
            .cloned()
            .unwrap_or(Value::Null);

        Ok(serde_json::json!({
            "location": location,
            "temperature_c": current.get("temp_C").cloned().unwrap_or(Value::Null),
            "condition": current
                .get("weatherDesc")
                .and_then(Value::as_array)
                .and_then(|a| a.first())
                .and_then(|d| d.get("value"))
                .cloned()
                .unwrap_or(Value::Null),
            "humidity": current.get("humidity").cloned().unwrap_or(Value::Null),
        })
        .to_string())
    }
}
