use serde_json::Value;
use stratus_types::api::TemperatureAlert;
use tracing::warn;

use crate::client::{ChatClient, ChatMessage, ChatOptions, strip_code_fences};

const ALERT_SYSTEM_PROMPT: &str = "\
You are a weather safety expert providing temperature-specific health and safety \
recommendations. Always respond with valid JSON only.";

/// Temperature band. Everything except `Comfortable` produces an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempBucket {
    VeryHot,
    Hot,
    Cold,
    VeryCold,
    Freezing,
    Comfortable,
}

impl TempBucket {
    pub fn classify(temperature: f64) -> Self {
        if temperature >= 35.0 {
            TempBucket::VeryHot
        } else if temperature >= 30.0 {
            TempBucket::Hot
        } else if temperature < 0.0 {
            TempBucket::Freezing
        } else if temperature < 10.0 {
            TempBucket::VeryCold
        } else if temperature < 15.0 {
            TempBucket::Cold
        } else {
            TempBucket::Comfortable
        }
    }

    pub fn level(&self) -> &'static str {
        match self {
            TempBucket::VeryHot => "Very Hot",
            TempBucket::Hot => "Hot",
            TempBucket::Cold => "Cold",
            TempBucket::VeryCold => "Very Cold",
            TempBucket::Freezing => "Freezing",
            TempBucket::Comfortable => "Comfortable",
        }
    }

    pub fn severity(&self) -> &'static str {
        match self {
            TempBucket::VeryHot => "extreme_heat",
            TempBucket::Hot => "high_heat",
            TempBucket::Cold => "cold",
            TempBucket::VeryCold => "very_cold",
            TempBucket::Freezing => "freezing",
            TempBucket::Comfortable => "comfortable",
        }
    }

    pub fn is_extreme(&self) -> bool {
        !matches!(self, TempBucket::Comfortable)
    }
}

/// Build a temperature alert for the given reading, or `None` when the
/// temperature is comfortable. The alert message and recommendations come
/// from the model when possible; otherwise the canned set for the band.
pub async fn build_alert(
    chat: &ChatClient,
    temperature: f64,
    location: &str,
    condition: Option<&str>,
) -> Option<TemperatureAlert> {
    let bucket = TempBucket::classify(temperature);
    if !bucket.is_extreme() {
        return None;
    }
    if !chat.is_configured() {
        return Some(fallback_alert(bucket, temperature, location));
    }

    let messages = [
        ChatMessage::system(ALERT_SYSTEM_PROMPT),
        ChatMessage::user(build_prompt(bucket, temperature, location, condition)),
    ];

    let alert = match chat.complete(&messages, &ChatOptions::default()).await {
        Ok(completion) => parse_alert(bucket, &completion.content, temperature, location),
        Err(e) => {
            warn!("temperature alert generation failed: {e}");
            None
        }
    };
    Some(alert.unwrap_or_else(|| fallback_alert(bucket, temperature, location)))
}

fn build_prompt(
    bucket: TempBucket,
    temperature: f64,
    location: &str,
    condition: Option<&str>,
) -> String {
    format!(
        "You are a weather safety expert. Generate a temperature alert for the \
         following conditions:\n\n\
         Location: {location}\n\
         Temperature: {temperature}°C\n\
         Temperature Category: {}\n\
         Weather Condition: {}\n\n\
         Please provide:\n\
         1. A brief alert message (1-2 sentences) explaining the temperature risk\n\
         2. 5-7 specific, actionable safety recommendations for this temperature\n\n\
         Format your response as JSON:\n\
         {{\n\
             \"alert_message\": \"Brief description of the temperature risk\",\n\
             \"recommendations\": [\n\
                 \"Recommendation 1\",\n\
                 \"Recommendation 2\"\n\
             ]\n\
         }}\n\n\
         Be specific and practical. Focus on health and safety.",
        bucket.level(),
        condition.unwrap_or("Not specified"),
    )
}

/// `None` only when the payload is not JSON at all; missing fields get
/// their defaults, as long as the shape parses.
fn parse_alert(
    bucket: TempBucket,
    raw: &str,
    temperature: f64,
    location: &str,
) -> Option<TemperatureAlert> {
    let value: Value = serde_json::from_str(strip_code_fences(raw)).ok()?;
    let message = value
        .get("alert_message")
        .and_then(Value::as_str)
        .unwrap_or("Temperature alert for your safety.")
        .to_string();
    let recommendations = value
        .get("recommendations")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(TemperatureAlert {
        level: bucket.level().to_string(),
        severity: bucket.severity().to_string(),
        message,
        recommendations,
        temperature,
        location: location.to_string(),
    })
}

fn fallback_alert(bucket: TempBucket, temperature: f64, location: &str) -> TemperatureAlert {
    let message = match bucket {
        TempBucket::VeryHot => "Extreme heat detected! This temperature can be dangerous to your health.",
        TempBucket::Hot => "Hot weather conditions present. Stay cool and hydrated.",
        TempBucket::Freezing => "Freezing temperatures! Extreme cold can be life-threatening.",
        TempBucket::VeryCold => "Very cold temperatures! Take precautions to stay warm.",
        TempBucket::Cold => "Cold weather conditions present. Dress warmly.",
        TempBucket::Comfortable => "Temperature alert for your area.",
    };

    let recommendations: [&str; 5] = match bucket {
        TempBucket::VeryHot => [
            "Stay indoors during peak heat hours",
            "Drink plenty of water throughout the day",
            "Avoid strenuous outdoor activities",
            "Check on elderly neighbors and family",
            "Never leave children or pets in vehicles",
        ],
        TempBucket::Hot => [
            "Stay hydrated",
            "Seek shade when outdoors",
            "Wear light, loose-fitting clothing",
            "Apply sunscreen regularly",
            "Take frequent breaks if working outside",
        ],
        TempBucket::Freezing => [
            "Stay indoors as much as possible",
            "Dress in multiple warm layers",
            "Protect extremities from frostbite",
            "Keep emergency supplies ready",
            "Ensure pets have warm shelter",
        ],
        TempBucket::VeryCold => [
            "Minimize outdoor exposure",
            "Wear warm layers and cover exposed skin",
            "Watch for signs of hypothermia",
            "Keep heating systems functioning",
            "Check on vulnerable individuals",
        ],
        TempBucket::Cold | TempBucket::Comfortable => [
            "Dress in warm layers",
            "Wear a coat, hat, and gloves",
            "Limit time spent outdoors",
            "Keep your home heated",
            "Stay dry to avoid losing body heat",
        ],
    };

    TemperatureAlert {
        level: bucket.level().to_string(),
        severity: bucket.severity().to_string(),
        message: message.to_string(),
        recommendations: recommendations.iter().map(|r| r.to_string()).collect(),
        temperature,
        location: location.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn bucket_edges_match_the_bands() {
        assert_eq!(TempBucket::classify(35.0), TempBucket::VeryHot);
        assert_eq!(TempBucket::classify(34.9), TempBucket::Hot);
        assert_eq!(TempBucket::classify(30.0), TempBucket::Hot);
        assert_eq!(TempBucket::classify(29.9), TempBucket::Comfortable);
        assert_eq!(TempBucket::classify(15.0), TempBucket::Comfortable);
        assert_eq!(TempBucket::classify(14.9), TempBucket::Cold);
        assert_eq!(TempBucket::classify(10.0), TempBucket::Cold);
        assert_eq!(TempBucket::classify(9.9), TempBucket::VeryCold);
        assert_eq!(TempBucket::classify(0.0), TempBucket::VeryCold);
        assert_eq!(TempBucket::classify(-0.1), TempBucket::Freezing);
    }

    #[tokio::test]
    async fn comfortable_temperatures_produce_no_alert() {
        let chat = ChatClient::new("", "http://127.0.0.1:9", "m");
        assert!(build_alert(&chat, 22.0, "Manila", None).await.is_none());
    }

    #[tokio::test]
    async fn model_message_and_recommendations_are_used_when_valid() {
        let server = MockServer::start().await;
        let content = "```json\n{\"alert_message\": \"Dangerous heat today.\", \
                       \"recommendations\": [\"Stay inside\", \"Drink water\"]}\n```";
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "m",
                "choices": [{"message": {"role": "assistant", "content": content}}]
            })))
            .mount(&server)
            .await;

        let chat = ChatClient::new("sk-test", &server.uri(), "m");
        let alert = build_alert(&chat, 36.0, "Manila", Some("Clear"))
            .await
            .unwrap();
        assert_eq!(alert.level, "Very Hot");
        assert_eq!(alert.severity, "extreme_heat");
        assert_eq!(alert.message, "Dangerous heat today.");
        assert_eq!(alert.recommendations, ["Stay inside", "Drink water"]);
        assert_eq!(alert.location, "Manila");
    }

    #[tokio::test]
    async fn unparseable_model_output_falls_back_to_the_canned_set() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "m",
                "choices": [{"message": {"role": "assistant", "content": "stay cool out there"}}]
            })))
            .mount(&server)
            .await;

        let chat = ChatClient::new("sk-test", &server.uri(), "m");
        let alert = build_alert(&chat, -5.0, "Sapporo", None).await.unwrap();
        assert_eq!(alert.severity, "freezing");
        assert!(alert.message.starts_with("Freezing temperatures!"));
        assert_eq!(alert.recommendations.len(), 5);
    }

    #[tokio::test]
    async fn provider_errors_fall_back_to_the_canned_set() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let chat = ChatClient::new("sk-test", &server.uri(), "m");
        let alert = build_alert(&chat, 31.0, "Cebu", None).await.unwrap();
        assert_eq!(alert.level, "Hot");
        assert_eq!(alert.recommendations[0], "Stay hydrated");
    }

    #[test]
    fn missing_recommendations_still_parse() {
        let alert = parse_alert(
            TempBucket::Hot,
            "{\"alert_message\": \"Hot out.\"}",
            31.0,
            "Cebu",
        )
        .unwrap();
        assert_eq!(alert.message, "Hot out.");
        assert!(alert.recommendations.is_empty());
    }
}
