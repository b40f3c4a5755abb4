use stratus_weather::CurrentConditions;

use crate::client::ChatMessage;

/// Persona and ground rules for the conversational assistant. Weather data
/// fetched for a message is injected as a labeled context block, and the
/// prompt tells the model how to treat it.
pub const SYSTEM_PROMPT: &str = "\
You are Stratus, a helpful weather assistant with access to real-time weather data. \
Your primary role is to help users with weather-related queries.

Key guidelines:
- Always be friendly, helpful, and professional
- Focus on weather-related topics (current weather, forecasts, weather alerts, etc.)
- You have access to live weather data from a real weather provider
- When real weather data is provided in the context, use it to give accurate, current information
- If asked about non-weather topics, politely redirect to weather assistance
- Provide clear, concise responses with actual data when available
- If you need location information, ask for it clearly
- Present weather information in a conversational, easy-to-understand format

When you receive real weather data in the format [REAL WEATHER DATA: ...], use that \
information to provide accurate, current weather conditions.

Keep responses conversational but informative.";

/// One-line rendering of current conditions. Doubles as the model-facing
/// context block and as the reply of last resort when the model is down.
pub fn format_weather_line(conditions: &CurrentConditions) -> String {
    format!(
        "Location: {}, {}, Temperature: {}°C (feels like {}°C), Condition: {}, \
         Humidity: {}%, Wind: {} km/h, Pressure: {} hPa, Visibility: {} km, \
         Sunrise: {}, Sunset: {}",
        conditions.location.name,
        conditions.location.country,
        conditions.temperature,
        conditions.feels_like,
        conditions.condition,
        conditions.humidity,
        conditions.wind_speed_kmh,
        conditions.pressure,
        conditions.visibility_km,
        conditions.sunrise,
        conditions.sunset,
    )
}

/// Assemble the completion request: system prompt, prior turns, then the
/// user's message. When weather data was fetched it rides along in the same
/// user turn so the model cannot miss it.
pub fn build_messages(
    history: &[ChatMessage],
    user_message: &str,
    weather_line: Option<&str>,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(SYSTEM_PROMPT));
    messages.extend_from_slice(history);
    match weather_line {
        Some(line) => messages.push(ChatMessage::user(format!(
            "[REAL WEATHER DATA: {line}]\n\nUser asks: {user_message}\n\n\
             Please use the real weather data provided above to answer accurately and conversationally."
        ))),
        None => messages.push(ChatMessage::user(user_message)),
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_weather::LocationInfo;

    fn sample_conditions() -> CurrentConditions {
        CurrentConditions {
            location: LocationInfo {
                name: "Manila".into(),
                country: "PH".into(),
                lat: 14.6042,
                lon: 120.9822,
            },
            temperature: 31,
            feels_like: 36,
            humidity: 71,
            pressure: 1009,
            visibility_km: 10.0,
            wind_speed_kmh: 14.8,
            wind_direction: 250,
            cloud_cover: 75,
            condition: "Broken Clouds".into(),
            condition_main: "Clouds".into(),
            icon: "04d".into(),
            precipitation_mm: 0.0,
            sunrise: "05:43".into(),
            sunset: "18:11".into(),
            observed_at: "2026-08-22T03:00:00Z".parse().unwrap(),
        }
    }

    #[test]
    fn weather_line_carries_every_field_the_model_needs() {
        let line = format_weather_line(&sample_conditions());
        assert_eq!(
            line,
            "Location: Manila, PH, Temperature: 31°C (feels like 36°C), \
             Condition: Broken Clouds, Humidity: 71%, Wind: 14.8 km/h, \
             Pressure: 1009 hPa, Visibility: 10 km, Sunrise: 05:43, Sunset: 18:11"
        );
    }

    #[test]
    fn messages_start_with_the_system_prompt_and_end_with_the_user_turn() {
        let history = [
            ChatMessage::user("hi"),
            ChatMessage::assistant("Hello! How can I help with the weather?"),
        ];
        let messages = build_messages(&history, "weather in Manila", None);

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].content, "hi");
        assert_eq!(messages[3].role, "user");
        assert_eq!(messages[3].content, "weather in Manila");
    }

    #[test]
    fn fetched_weather_rides_in_the_user_turn() {
        let line = format_weather_line(&sample_conditions());
        let messages = build_messages(&[], "weather in Manila", Some(&line));

        assert_eq!(messages.len(), 2);
        let turn = &messages[1];
        assert_eq!(turn.role, "user");
        assert!(turn.content.starts_with("[REAL WEATHER DATA: Location: Manila"));
        assert!(turn.content.contains("User asks: weather in Manila"));
    }
}
