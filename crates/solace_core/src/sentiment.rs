//! Simple keyword-based English sentiment analysis.
//!
//! Shared across crates so the extractor and the crisis detector agree on the
//! score when the caller does not supply one.

const POSITIVE: &[&str] = &[
    "happy", "glad", "great", "good", "love", "loved", "grateful", "thankful", "thanks",
    "excited", "proud", "calm", "hopeful", "wonderful", "amazing", "better", "relieved",
    "joy", "peaceful", "fun",
];

const NEGATIVE: &[&str] = &[
    "sad", "angry", "hate", "awful", "terrible", "bad", "worse", "worst", "miserable",
    "hopeless", "worthless", "lonely", "scared", "afraid", "anxious", "depressed", "upset",
    "hurt", "tired", "exhausted", "empty", "crying", "die", "alone",
];

const INTENSE: &[&str] = &[
    "very", "really", "so", "extremely", "incredibly", "totally", "completely", "absolutely",
];

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

/// Analyze text for emotional valence and intensity.
///
/// Returns `(valence, intensity)` where:
/// - `valence` is in `[-1.0, 1.0]` (negative to positive)
/// - `intensity` is in `[0.1, 1.0]`
pub fn analyze_sentiment(text: &str) -> (f32, f32) {
    let mut pos = 0.0f32;
    let mut neg = 0.0f32;
    let mut int = 0.0f32;
    for token in tokens(text) {
        let t = token.as_str();
        if POSITIVE.contains(&t) {
            pos += 1.0;
        } else if NEGATIVE.contains(&t) {
            neg += 1.0;
        } else if INTENSE.contains(&t) {
            int += 1.0;
        }
    }
    int += text.matches('!').count().min(3) as f32;

    let valence = (pos - neg) / (pos + neg + 1.0);
    let intensity = ((pos + neg + int) / 5.0).clamp(0.1, 1.0);

    (valence, intensity)
}

/// Valence only.
pub fn sentiment_score(text: &str) -> f32 {
    analyze_sentiment(text).0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_text() {
        let (v, i) = analyze_sentiment("the meeting is on tuesday");
        assert!((v - 0.0).abs() < 0.01);
        assert!((i - 0.1).abs() < 0.01);
    }

    #[test]
    fn test_positive_text() {
        let (v, _) = analyze_sentiment("I'm so happy, thanks for listening");
        assert!(v > 0.0);
    }

    #[test]
    fn test_negative_text() {
        let (v, _) = analyze_sentiment("I feel sad and lonely");
        assert!(v < -0.6);
    }

    #[test]
    fn test_whole_words_only() {
        // "badminton" must not count as "bad", "sadly" is not "sad"
        let (v, _) = analyze_sentiment("badminton practice");
        assert!((v - 0.0).abs() < 0.01);
    }

    #[test]
    fn test_intense_text() {
        let (_, i1) = analyze_sentiment("good");
        let (_, i2) = analyze_sentiment("really really good!");
        assert!(i2 > i1);
    }

    #[test]
    fn test_empty_text() {
        let (v, i) = analyze_sentiment("");
        assert!((v - 0.0).abs() < 0.01);
        assert!((i - 0.1).abs() < 0.01);
    }
}
