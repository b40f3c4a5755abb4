use std::sync::LazyLock;

use regex::Regex;

const WEATHER_KEYWORDS: [&str; 12] = [
    "weather",
    "temperature",
    "temp",
    "forecast",
    "rain",
    "sunny",
    "cloudy",
    "wind",
    "humidity",
    "today",
    "now",
    "tomorrow",
];

const FOLLOW_UP_PHRASES: [&str; 4] = ["how about", "what about", "and", "also"];

const TIME_WORDS: [&str; 7] = [
    "today",
    "now",
    "tomorrow",
    "tonight",
    "morning",
    "afternoon",
    "evening",
];

/// Capitalized words that start a sentence or belong to the weather domain
/// itself. The fallback scan skips these as place-name starts.
const SCAN_STOPWORDS: &[&str] = &[
    "the",
    "and",
    "also",
    "about",
    "this",
    "that",
    "there",
    "here",
    "what",
    "what's",
    "whats",
    "when",
    "when's",
    "where",
    "where's",
    "which",
    "how",
    "how's",
    "who",
    "why",
    "will",
    "would",
    "can",
    "could",
    "should",
    "shall",
    "does",
    "did",
    "are",
    "was",
    "were",
    "it's",
    "its",
    "please",
    "tell",
    "give",
    "show",
    "hello",
    "hey",
    "good",
    "morning",
    "afternoon",
    "evening",
    "tonight",
    "today",
    "tomorrow",
    "now",
    "weather",
    "temperature",
    "temp",
    "forecast",
    "rain",
    "raining",
    "sunny",
    "cloudy",
    "wind",
    "humidity",
    "thanks",
    "thank",
];

/// Ordered phrasing templates, most specific first. The first pattern whose
/// capture survives cleaning wins. Matching is case-insensitive over the
/// original message so captures keep the user's casing.
static LOCATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?:weather|temperature|temp|humidity|wind|forecast)\s+(?:in|at|for|of)\s+([A-Za-z\s]+?)(?:\?|$|,|\.|!)",
        r"(?:in|at|for|of)\s+([A-Za-z\s]+?)\s+(?:weather|temperature|temp|humidity|wind|forecast)",
        r"(?:what.*?|how.*?)\s+(?:weather|temperature|temp|humidity|wind|forecast).*?(?:in|at|for|of)\s+([A-Za-z\s]+?)(?:\?|$|,|\.|!)",
        r"([A-Za-z\s]+?)\s+(?:weather|temperature|temp|humidity|wind|forecast)(?:\?|$|,|\.|!)",
        r"weather\s+(?:in|at|for|of)\s+([A-Za-z\s]+?)(?:\?|$|,|\.|!)",
        r"(?:current|today.*?)\s+(?:weather|temperature|temp|humidity|wind|forecast).*?(?:in|at|for|of)\s+([A-Za-z\s]+?)(?:\?|$|,|\.|!)",
        r"(?:the\s+)?([A-Za-z\s]+?)\s+(?:weather|temperature|temp|humidity|wind|forecast)(?:\s+today|\s+now|$|\?|!|,|\.)",
        r"(?:the\s+)?(?:weather|temperature|temp|humidity|wind|forecast)\s+(?:of|in|at|for)\s+([A-Za-z\s]+?)(?:\s+(?:today|now|tomorrow)|$|\?|!|,|\.)",
        r"(?:how about|what about)\s+(?:the\s+)?(?:weather\s+(?:in|of|for)\s+)?([A-Za-z\s]+?)(?:\s+weather|$|\?|!|,|\.)",
        r"(?:and|also)\s+(?:the\s+)?(?:weather\s+(?:in|of|for)\s+)?([A-Za-z\s]+?)(?:\s+weather|$|\?|!|,|\.)",
    ]
    .into_iter()
    .map(|pattern| Regex::new(&format!("(?i){pattern}")).unwrap())
    .collect()
});

/// Whether the message looks like a weather question or a follow-up to one.
/// Location extraction is only worth attempting when this holds.
pub fn mentions_weather(message: &str) -> bool {
    let lower = message.to_lowercase();
    WEATHER_KEYWORDS.iter().any(|k| lower.contains(k))
        || FOLLOW_UP_PHRASES.iter().any(|p| lower.contains(p))
}

/// Best-effort guess at the place a message asks about. Tries the phrasing
/// templates in order, then falls back to scanning for capitalized words
/// that could be a place name. Returns `None` when nothing usable remains;
/// the caller may then substitute the user's last known location.
pub fn extract_location(message: &str) -> Option<String> {
    for pattern in LOCATION_PATTERNS.iter() {
        if let Some(candidate) = pattern
            .captures(message)
            .and_then(|caps| caps.get(1))
            .and_then(|m| clean_candidate(m.as_str()))
        {
            return Some(candidate);
        }
    }
    scan_capitalized(message)
}

/// Drop trailing time words from a capture and normalize whitespace.
/// Candidates of two characters or fewer are too ambiguous to look up.
fn clean_candidate(raw: &str) -> Option<String> {
    let mut words: Vec<&str> = raw.split_whitespace().collect();
    while let Some(last) = words.last() {
        if TIME_WORDS.iter().any(|w| last.eq_ignore_ascii_case(w)) {
            words.pop();
        } else {
            break;
        }
    }
    let cleaned = words.join(" ");
    (cleaned.len() > 2).then_some(cleaned)
}

/// No template matched: take the first capitalized word longer than two
/// characters that is not a stopword, extended through any directly
/// following capitalized words ("Quezon City", "San Juan").
fn scan_capitalized(message: &str) -> Option<String> {
    let words: Vec<&str> = message.split_whitespace().collect();
    for (i, word) in words.iter().enumerate() {
        let token = word.trim_end_matches(['?', '!', ',', '.']);
        if !is_place_start(token) {
            continue;
        }
        let mut parts = vec![token];
        for next in &words[i + 1..] {
            let next = next.trim_end_matches(['?', '!', ',', '.']);
            if next.chars().next().is_some_and(|c| c.is_uppercase()) {
                parts.push(next);
            } else {
                break;
            }
        }
        return clean_candidate(&parts.join(" "));
    }
    None
}

fn is_place_start(token: &str) -> bool {
    token.chars().next().is_some_and(|c| c.is_uppercase())
        && token.chars().count() > 2
        && !SCAN_STOPWORDS.iter().any(|s| token.eq_ignore_ascii_case(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_and_follow_up_gate() {
        assert!(mentions_weather("what's the weather like?"));
        assert!(mentions_weather("is it raining"));
        assert!(mentions_weather("how about Cebu"));
        assert!(!mentions_weather("thanks, that was helpful"));
    }

    #[test]
    fn preposition_template_wins_and_keeps_casing() {
        assert_eq!(extract_location("weather in Tokyo"), Some("Tokyo".into()));
        assert_eq!(
            extract_location("what's the weather like in Paris?"),
            Some("Paris".into())
        );
    }

    #[test]
    fn leading_place_template_matches() {
        assert_eq!(
            extract_location("Manila weather today"),
            Some("Manila".into())
        );
    }

    #[test]
    fn follow_up_phrasing_matches() {
        assert_eq!(extract_location("how about Cebu"), Some("Cebu".into()));
    }

    #[test]
    fn trailing_time_words_are_stripped_from_the_capture() {
        assert_eq!(
            extract_location("weather in tokyo tomorrow"),
            Some("tokyo".into())
        );
    }

    #[test]
    fn template_capture_beats_the_capitalized_scan() {
        // "paris" matches a template first even though "France" is the only
        // capitalized token.
        assert_eq!(
            extract_location("weather in paris, France"),
            Some("paris".into())
        );
    }

    #[test]
    fn short_captures_are_discarded() {
        assert_eq!(extract_location("weather in NY"), None);
    }

    #[test]
    fn capitalized_scan_extends_through_multi_word_names() {
        assert_eq!(
            extract_location("Is Quezon City flooded now"),
            Some("Quezon City".into())
        );
    }

    #[test]
    fn scan_skips_sentence_leading_stopwords() {
        assert_eq!(
            extract_location("Will it flood in Baguio"),
            Some("Baguio".into())
        );
    }

    #[test]
    fn no_location_means_none() {
        assert_eq!(extract_location("is it raining"), None);
        assert_eq!(extract_location("hello there"), None);
    }
}
