use std::time::Duration;

use serde_json::Value;
use stratus_types::api::{HealthTip, TipsRequest};
use stratus_types::models::TipCategory;
use tracing::{debug, warn};

use crate::client::{ChatClient, ChatMessage, ChatOptions, strip_code_fences};

const MAX_TIPS: usize = 4;
const TIPS_TIMEOUT: Duration = Duration::from_secs(15);

const TIPS_SYSTEM_PROMPT: &str = "\
You are a health and safety expert. Generate concise health tips based on weather. \
Respond with ONLY valid JSON format: {\"tips\": [{\"title\": \"string\", \
\"description\": \"string (max 100 chars)\", \"category\": \
\"temperature|humidity|air|uv|general\"}]}. No markdown, no extra text.";

/// Health and safety tips for the given conditions. Asks the model in JSON
/// mode first; any failure (unconfigured key, transport, bad JSON) lands on
/// the rule-based tips so the endpoint always has something to show.
pub async fn generate_tips(chat: &ChatClient, request: &TipsRequest) -> Vec<HealthTip> {
    if !chat.is_configured() {
        return fallback_tips(request);
    }

    let messages = [
        ChatMessage::system(TIPS_SYSTEM_PROMPT),
        ChatMessage::user(build_prompt(request)),
    ];
    let options = ChatOptions {
        max_tokens: 600,
        json_mode: true,
        timeout: TIPS_TIMEOUT,
        ..ChatOptions::default()
    };

    match chat.complete(&messages, &options).await {
        Ok(completion) => {
            let tips = parse_tips(&completion.content);
            if tips.is_empty() {
                warn!("model returned no usable tips, using rule-based tips");
                fallback_tips(request)
            } else {
                debug!(count = tips.len(), "generated health tips");
                tips
            }
        }
        Err(e) => {
            warn!("health tips generation failed: {e}");
            fallback_tips(request)
        }
    }
}

fn build_prompt(request: &TipsRequest) -> String {
    let feels_like = opt_num(request.feels_like);
    let humidity = opt_num(request.humidity);
    let wind_speed = opt_num(request.wind_speed);
    let condition = request.condition.as_deref().unwrap_or("N/A");
    let aqi = request
        .aqi
        .map(|a| a.to_string())
        .unwrap_or_else(|| "N/A".into());

    format!(
        "Create 3-4 personalized health and safety tips based on current weather:\n\n\
         Weather Conditions:\n\
         - Temperature: {}°C (feels like {}°C)\n\
         - Condition: {}\n\
         - Humidity: {}%\n\
         - Wind Speed: {} km/h\n\
         - Air Quality Index: {} (1=Good, 5=Very Poor)\n\n\
         Requirements:\n\
         - Each tip must be specific to these conditions\n\
         - Title: Short, actionable (e.g., \"Stay Hydrated\", \"Sun Protection\")\n\
         - Description: Complete sentence, 60-100 characters, explain WHY or HOW\n\
         - Category: temperature, humidity, air, uv, or general\n\n\
         Return format: {{\"tips\": [{{\"title\": \"Stay Hydrated\", \"description\": \
         \"High temperatures increase water needs. Drink fluids regularly.\", \
         \"category\": \"temperature\"}}]}}",
        request.temperature, feels_like, condition, humidity, wind_speed, aqi,
    )
}

fn opt_num(value: Option<f64>) -> String {
    value
        .map(|n| n.to_string())
        .unwrap_or_else(|| "N/A".into())
}

/// Accepts `{"tips": [...]}` or a bare array, with or without markdown
/// fences. Entries missing a title or description are dropped; titles cap
/// at 100 chars and descriptions at 150.
fn parse_tips(raw: &str) -> Vec<HealthTip> {
    let Ok(value) = serde_json::from_str::<Value>(strip_code_fences(raw)) else {
        return Vec::new();
    };
    let items = match value {
        Value::Object(ref map) => map
            .get("tips")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        Value::Array(items) => items,
        _ => Vec::new(),
    };
    items
        .iter()
        .filter_map(tip_from_value)
        .take(MAX_TIPS)
        .collect()
}

fn tip_from_value(value: &Value) -> Option<HealthTip> {
    let title = value.get("title")?.as_str()?;
    let description = value.get("description")?.as_str()?;
    let category = value
        .get("category")
        .and_then(Value::as_str)
        .and_then(TipCategory::parse)
        .unwrap_or(TipCategory::General);
    Some(HealthTip {
        title: title.chars().take(100).collect(),
        description: description.chars().take(150).collect(),
        category,
    })
}

/// Rule-based tips derived from thresholds when the model is unreachable.
fn fallback_tips(request: &TipsRequest) -> Vec<HealthTip> {
    let mut tips = Vec::new();

    if request.temperature > 30.0 {
        tips.push(HealthTip {
            title: "Stay Hydrated".into(),
            description: "High temperatures require increased water intake. Drink fluids regularly."
                .into(),
            category: TipCategory::Temperature,
        });
    } else if request.temperature < 10.0 {
        tips.push(HealthTip {
            title: "Dress Warmly".into(),
            description: "Layer clothing to protect against cold temperatures.".into(),
            category: TipCategory::Temperature,
        });
    }

    if let Some(humidity) = request.humidity {
        if humidity > 70.0 {
            tips.push(HealthTip {
                title: "High Humidity Alert".into(),
                description: "Humid conditions may affect breathing. Take breaks if needed.".into(),
                category: TipCategory::Humidity,
            });
        }
    }

    if let Some(aqi) = request.aqi {
        if aqi >= 3 {
            tips.push(HealthTip {
                title: "Air Quality Notice".into(),
                description: "Consider limiting outdoor activities if you have respiratory issues."
                    .into(),
                category: TipCategory::Air,
            });
        } else {
            tips.push(HealthTip {
                title: "Good Air Quality".into(),
                description: "Great conditions for outdoor activities and exercise.".into(),
                category: TipCategory::Air,
            });
        }
    }

    if tips.is_empty() {
        tips.push(HealthTip {
            title: "General Wellness".into(),
            description: "Check weather conditions before planning outdoor activities.".into(),
            category: TipCategory::General,
        });
    }

    tips.truncate(MAX_TIPS);
    tips
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(temperature: f64) -> TipsRequest {
        TipsRequest {
            temperature,
            feels_like: None,
            humidity: None,
            condition: None,
            wind_speed: None,
            aqi: None,
        }
    }

    #[test]
    fn rule_tips_cover_heat_humidity_and_air() {
        let tips = fallback_tips(&TipsRequest {
            humidity: Some(80.0),
            aqi: Some(4),
            ..request(33.0)
        });
        let titles: Vec<&str> = tips.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(
            titles,
            ["Stay Hydrated", "High Humidity Alert", "Air Quality Notice"]
        );
    }

    #[test]
    fn mild_weather_gets_the_generic_tip() {
        let tips = fallback_tips(&request(22.0));
        assert_eq!(tips.len(), 1);
        assert_eq!(tips[0].title, "General Wellness");
        assert_eq!(tips[0].category, TipCategory::General);
    }

    #[test]
    fn low_aqi_reads_as_good_air() {
        let tips = fallback_tips(&TipsRequest { aqi: Some(1), ..request(20.0) });
        assert_eq!(tips[0].title, "Good Air Quality");
    }

    #[test]
    fn parses_fenced_and_bare_payloads() {
        let fenced = "```json\n{\"tips\": [{\"title\": \"Sun Protection\", \
                      \"description\": \"UV is strong at midday.\", \"category\": \"uv\"}]}\n```";
        let tips = parse_tips(fenced);
        assert_eq!(tips.len(), 1);
        assert_eq!(tips[0].category, TipCategory::Uv);

        let bare = "[{\"title\": \"T\", \"description\": \"D\", \"category\": \"nonsense\"}]";
        let tips = parse_tips(bare);
        assert_eq!(tips.len(), 1);
        assert_eq!(tips[0].category, TipCategory::General);
    }

    #[test]
    fn long_descriptions_are_capped() {
        let long = "x".repeat(400);
        let raw = format!(
            "{{\"tips\": [{{\"title\": \"T\", \"description\": \"{long}\", \"category\": \"general\"}}]}}"
        );
        let tips = parse_tips(&raw);
        assert_eq!(tips[0].description.chars().count(), 150);
    }

    #[test]
    fn entries_without_required_fields_are_dropped() {
        let raw = "{\"tips\": [{\"title\": \"only a title\"}, \
                   {\"description\": \"only a description\"}]}";
        assert!(parse_tips(raw).is_empty());
    }

    #[tokio::test]
    async fn model_tips_win_when_the_provider_answers() {
        let server = MockServer::start().await;
        let content = json!({
            "tips": [
                {"title": "Carry an Umbrella", "description": "Showers are likely this afternoon.", "category": "general"}
            ]
        })
        .to_string();
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "m",
                "choices": [{"message": {"role": "assistant", "content": content}}]
            })))
            .mount(&server)
            .await;

        let chat = ChatClient::new("sk-test", &server.uri(), "m");
        let tips = generate_tips(&chat, &request(22.0)).await;
        assert_eq!(tips.len(), 1);
        assert_eq!(tips[0].title, "Carry an Umbrella");
    }

    #[tokio::test]
    async fn provider_failure_falls_back_to_rules() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let chat = ChatClient::new("sk-test", &server.uri(), "m");
        let tips = generate_tips(&chat, &request(33.0)).await;
        assert_eq!(tips[0].title, "Stay Hydrated");
    }

    #[tokio::test]
    async fn unconfigured_key_skips_the_provider_entirely() {
        let chat = ChatClient::new("", "http://127.0.0.1:9", "m");
        let tips = generate_tips(&chat, &request(5.0)).await;
        assert_eq!(tips[0].title, "Dress Warmly");
    }
}
