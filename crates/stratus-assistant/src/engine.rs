use stratus_types::api::TokenUsage;
use stratus_weather::{CurrentConditions, WeatherClient};
use tracing::{debug, warn};

use crate::client::{ChatClient, ChatMessage, ChatOptions};
use crate::fallback::canned_reply;
use crate::location;
use crate::prompt::{build_messages, format_weather_line};

/// What the chat endpoint returns to the caller. `fallback` is set when the
/// text did not come from the model.
#[derive(Debug)]
pub struct EngineReply {
    pub text: String,
    pub fallback: bool,
    pub weather: Option<CurrentConditions>,
    pub location: Option<String>,
    pub model: Option<String>,
    pub usage: Option<TokenUsage>,
}

/// Conversational assistant: guesses the place a message asks about, pulls
/// live conditions for it, and hands both to the model. Degrades stepwise
/// when pieces are missing so the user always gets an answer.
pub struct ChatEngine {
    chat: ChatClient,
    weather: WeatherClient,
}

impl ChatEngine {
    pub fn new(chat: ChatClient, weather: WeatherClient) -> Self {
        Self { chat, weather }
    }

    /// Answer one user message given the prior turns of its session.
    /// `last_known` is the user's saved or most recently reported location,
    /// used when the message asks about weather without naming a place.
    pub async fn respond(
        &self,
        message: &str,
        history: &[ChatMessage],
        last_known: Option<&str>,
    ) -> EngineReply {
        let context = self.weather_context(message, last_known).await;
        let weather_line = context.as_ref().map(|(c, _)| format_weather_line(c));
        let messages = build_messages(history, message, weather_line.as_deref());

        if self.chat.is_configured() {
            match self.chat.complete(&messages, &ChatOptions::default()).await {
                Ok(completion) => {
                    let (weather, location) = context.unzip();
                    return EngineReply {
                        text: completion.content,
                        fallback: false,
                        weather,
                        location,
                        model: Some(completion.model),
                        usage: completion.usage,
                    };
                }
                Err(e) => warn!("chat completion failed: {e}"),
            }
        }

        // The model is unreachable. Weather data fetched for the message is
        // still a real answer; otherwise fall back to the canned replies.
        match (context, weather_line) {
            (Some((conditions, resolved)), Some(line)) => EngineReply {
                text: line,
                fallback: true,
                weather: Some(conditions),
                location: Some(resolved),
                model: None,
                usage: None,
            },
            _ => EngineReply {
                text: canned_reply(message).to_string(),
                fallback: true,
                weather: None,
                location: None,
                model: None,
                usage: None,
            },
        }
    }

    /// Fetch conditions for the place the message seems to ask about.
    /// Lookup failures are logged and swallowed; the model can still answer
    /// from general knowledge.
    async fn weather_context(
        &self,
        message: &str,
        last_known: Option<&str>,
    ) -> Option<(CurrentConditions, String)> {
        if !location::mentions_weather(message) {
            return None;
        }
        let guess =
            location::extract_location(message).or_else(|| last_known.map(str::to_string))?;
        match self.weather.current_with_fallback(&guess).await {
            Ok(hit) => Some(hit),
            Err(e) => {
                debug!("weather lookup for '{guess}' failed: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tokyo_payload() -> serde_json::Value {
        json!({
            "name": "Tokyo",
            "coord": {"lat": 35.6895, "lon": 139.6917},
            "weather": [{"id": 800, "main": "Clear", "description": "clear sky", "icon": "01d"}],
            "main": {"temp": 27.3, "feels_like": 29.0, "temp_min": 25.0, "temp_max": 28.6,
                     "pressure": 1013, "humidity": 58},
            "visibility": 10000,
            "wind": {"speed": 3.0, "deg": 180},
            "clouds": {"all": 0},
            "dt": 1748811600,
            "timezone": 32400,
            "sys": {"country": "JP", "sunrise": 1748812020, "sunset": 1748857620}
        })
    }

    fn chat_body(content: &str) -> serde_json::Value {
        json!({
            "model": "m",
            "choices": [{"message": {"role": "assistant", "content": content}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5}
        })
    }

    fn engine(chat_server: &MockServer, weather_server: &MockServer) -> ChatEngine {
        ChatEngine::new(
            ChatClient::new("sk-test", &chat_server.uri(), "m"),
            WeatherClient::new("wk", &weather_server.uri(), &weather_server.uri()),
        )
    }

    #[tokio::test]
    async fn weather_question_injects_live_data_into_the_model_turn() {
        let chat_server = MockServer::start().await;
        let weather_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("q", "Tokyo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tokyo_payload()))
            .mount(&weather_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("[REAL WEATHER DATA: Location: Tokyo, JP"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(chat_body("It's 27°C and clear in Tokyo.")),
            )
            .expect(1)
            .mount(&chat_server)
            .await;

        let reply = engine(&chat_server, &weather_server)
            .respond("weather in Tokyo", &[], None)
            .await;

        assert!(!reply.fallback);
        assert_eq!(reply.text, "It's 27°C and clear in Tokyo.");
        assert_eq!(reply.location.as_deref(), Some("Tokyo"));
        assert_eq!(reply.weather.unwrap().location.country, "JP");
        assert_eq!(reply.model.as_deref(), Some("m"));
    }

    #[tokio::test]
    async fn provider_outage_with_weather_data_answers_with_the_data_line() {
        let chat_server = MockServer::start().await;
        let weather_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tokyo_payload()))
            .mount(&weather_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&chat_server)
            .await;

        let reply = engine(&chat_server, &weather_server)
            .respond("weather in Tokyo", &[], None)
            .await;

        assert!(reply.fallback);
        assert!(reply.text.starts_with("Location: Tokyo, JP"));
        assert!(reply.weather.is_some());
        assert!(reply.model.is_none());
    }

    #[tokio::test]
    async fn provider_outage_without_weather_data_uses_the_canned_reply() {
        let chat_server = MockServer::start().await;
        let weather_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&weather_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&chat_server)
            .await;

        let reply = engine(&chat_server, &weather_server)
            .respond("hello!", &[], None)
            .await;

        assert!(reply.fallback);
        assert!(reply.text.starts_with("Hello! I'm Stratus"));
        assert!(reply.weather.is_none());
    }

    #[tokio::test]
    async fn unknown_city_still_lets_the_model_answer() {
        let chat_server = MockServer::start().await;
        let weather_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "cod": "404", "message": "city not found"
            })))
            .mount(&weather_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(
                "I couldn't find live data for that place, but ask me anything else!",
            )))
            .mount(&chat_server)
            .await;

        let reply = engine(&chat_server, &weather_server)
            .respond("weather in Atlantis", &[], None)
            .await;

        assert!(!reply.fallback);
        assert!(reply.weather.is_none());
        assert!(reply.location.is_none());
    }

    #[tokio::test]
    async fn last_known_location_fills_in_when_the_message_names_none() {
        let chat_server = MockServer::start().await;
        let weather_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("q", "Makati"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tokyo_payload()))
            .expect(1)
            .mount(&weather_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("[REAL WEATHER DATA:"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("Sunny where you are.")))
            .mount(&chat_server)
            .await;

        let reply = engine(&chat_server, &weather_server)
            .respond("what's the weather like today?", &[], Some("Makati"))
            .await;

        assert_eq!(reply.location.as_deref(), Some("Makati"));
        assert!(reply.weather.is_some());
    }
}
