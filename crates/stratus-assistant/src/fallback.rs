const GREETINGS: [&str; 5] = ["hello", "hi", "hey", "good morning", "good afternoon"];
const WEATHER_WORDS: [&str; 5] = ["weather", "temperature", "rain", "snow", "forecast"];

/// Canned reply for when the model cannot be reached and no weather data was
/// fetched for the message. Keyword buckets checked in order: greeting,
/// weather talk, help, then a generic apology.
pub fn canned_reply(message: &str) -> &'static str {
    let lower = message.to_lowercase();
    if GREETINGS.iter().any(|g| lower.contains(g)) {
        "Hello! I'm Stratus, your weather assistant. I'm currently experiencing some \
         technical issues, but I'm here to help with weather information. How can I \
         assist you today?"
    } else if WEATHER_WORDS.iter().any(|w| lower.contains(w)) {
        "I'd love to help you with weather information! I'm currently having some \
         connectivity issues, but please try again in a moment. In the meantime, you \
         can ask me about current weather, forecasts, or weather alerts for any location."
    } else if lower.contains("help") {
        "I'm Stratus, your weather assistant! I can help with weather forecasts, current \
         conditions, and weather alerts. Just ask me something like 'What's the weather \
         in [city]?' or 'Weather forecast for [location]'. I'm currently experiencing \
         some technical issues, so please be patient."
    } else {
        "I'm Stratus, your weather assistant! I'm currently experiencing some technical \
         difficulties, but I'm here to help with weather-related questions. Please try \
         again in a moment."
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_are_checked_in_order() {
        assert!(canned_reply("hello there").starts_with("Hello!"));
        assert!(canned_reply("what's the forecast").starts_with("I'd love to help"));
        assert!(canned_reply("can you help me").contains("I can help with weather forecasts"));
        assert!(canned_reply("ok then").contains("technical difficulties"));
        // A greeting wins even when weather words are present.
        assert!(canned_reply("hi, what's the weather?").starts_with("Hello!"));
    }
}
