// src/intent.rs
//! Keyword routing of chat queries into coarse intents.
//!
//! The intent is logged with every chat request and forwarded to the agent
//! as a hint. Rules are checked in order and the first match wins.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Quiz,
    PosterFollowUp,
    Comparison,
    Recommendation,
    MovieInfo,
    SmallTalk,
    General,
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Intent::Quiz => "QUIZ",
            Intent::PosterFollowUp => "POSTER_FOLLOW_UP",
            Intent::Comparison => "COMPARISON",
            Intent::Recommendation => "RECOMMENDATION",
            Intent::MovieInfo => "MOVIE_INFO",
            Intent::SmallTalk => "SMALL_TALK",
            Intent::General => "GENERAL",
        }
    }
}

static RULES: Lazy<Vec<(Intent, Regex)>> = Lazy::new(|| {
    [
        (
            Intent::Quiz,
            r"(?i)\b(quiz|trivia|test me|ask me a question|next question|my answer is)\b|^\s*[abcd][).]?\s*$",
        ),
        (
            Intent::PosterFollowUp,
            r"(?i)\b(posters?|(this|that|uploaded|last) (image|picture))\b",
        ),
        (
            Intent::Comparison,
            r"(?i)\b(compare|comparison|versus|vs\.?|better than|difference between)\b",
        ),
        (
            Intent::Recommendation,
            r"(?i)\b(recommend\w*|suggest\w*|similar to|something like|what should i watch|movies? like|films? like)\b",
        ),
        (
            Intent::MovieInfo,
            r"(?i)\b(who (directed|starred|stars|plays)|director of|cast of|plot of|when was|what year|release date|rating of|tell me about|what is .+ about)\b",
        ),
        (
            Intent::SmallTalk,
            r"(?i)^\s*(hi|hello|hey|thanks|thank you|good (morning|evening|afternoon)|bye)\b[\s!.?]*$",
        ),
    ]
    .into_iter()
    .map(|(intent, pattern)| {
        (intent, Regex::new(pattern).expect("intent pattern"))
    })
    .collect()
});

#[derive(Debug, Default, Clone)]
pub struct IntentRouter;

impl IntentRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn route(&self, query: &str) -> Intent {
        RULES
            .iter()
            .find(|(_, re)| re.is_match(query))
            .map(|(intent, _)| *intent)
            .unwrap_or(Intent::General)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_common_queries() {
        let router = IntentRouter::new();
        let cases = [
            ("Give me a movie quiz", Intent::Quiz),
            ("My answer is B", Intent::Quiz),
            ("c)", Intent::Quiz),
            ("What movie is this poster from?", Intent::PosterFollowUp),
            ("Compare Alien and Aliens", Intent::Comparison),
            ("Recommend something like Heat", Intent::Recommendation),
            ("Who directed Blade Runner?", Intent::MovieInfo),
            ("hello!", Intent::SmallTalk),
            ("Space operas from the 80s", Intent::General),
        ];
        for (query, expected) in cases {
            assert_eq!(router.route(query), expected, "{query}");
        }
    }

    #[test]
    fn earlier_rules_win() {
        // Both a quiz and a poster reference; quiz is checked first.
        assert_eq!(
            IntentRouter::new().route("quiz me on this poster"),
            Intent::Quiz
        );
    }

    #[test]
    fn greeting_inside_a_question_is_not_small_talk() {
        assert_ne!(
            IntentRouter::new().route("hi, recommend a thriller"),
            Intent::SmallTalk
        );
    }

    #[test]
    fn names_match_serialized_form() {
        for intent in [Intent::PosterFollowUp, Intent::MovieInfo, Intent::General] {
            assert_eq!(
                serde_json::to_value(intent).unwrap(),
                serde_json::json!(intent.name())
            );
        }
    }
}
