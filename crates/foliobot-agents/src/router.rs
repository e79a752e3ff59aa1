use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Messages shorter than this (in chars) without a `?` are treated as small talk.
const SHORT_MESSAGE_CHARS: usize = 15;

static GREETING_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // greetings
        r"(?i)^(hi|hello|hey|greetings|salam|assalam)",
        r"(?i)^(good morning|good afternoon|good evening)",
        r"(?i)^(how are you|what's up|whats up|sup)",
        r"(?i)^(thanks|thank you|thx)",
        r"(?i)^(bye|goodbye|see you|later)",
        // small talk
        r"(?i)^(who are you|what is your name|your name)",
        r"(?i)^(how do you work|what can you do)",
        r"(?i)^(tell me a joke|make me laugh)",
        r"(?i)^(how's the weather|what time is it)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid greeting pattern"))
    .collect()
});

/// Profile sections a structured question can ask about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    Skills,
    Projects,
    Education,
    About,
    Contact,
    Interests,
}

impl Topic {
    /// Checked in this order; the first topic with a matching keyword wins.
    pub const PRIORITY: [Topic; 6] = [
        Topic::Skills,
        Topic::Projects,
        Topic::Education,
        Topic::About,
        Topic::Contact,
        Topic::Interests,
    ];

    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Topic::Skills => &["skill", "technology", "tech stack"],
            Topic::Projects => &["project", "built", "work"],
            Topic::Education => &["education", "study", "degree"],
            Topic::About => &["about", "who is", "tell me about"],
            Topic::Contact => &["contact", "email", "reach"],
            Topic::Interests => &["hobby", "hobbies", "interest", "like to do"],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Skills => "skills",
            Topic::Projects => "projects",
            Topic::Education => "education",
            Topic::About => "about",
            Topic::Contact => "contact",
            Topic::Interests => "interests",
        }
    }

    /// First topic whose keywords appear in `message`, case-insensitively.
    pub fn detect(message: &str) -> Option<Topic> {
        let lower = message.to_lowercase();
        Self::PRIORITY
            .into_iter()
            .find(|topic| topic.keywords().iter().any(|kw| lower.contains(kw)))
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which answer path a message takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Greeting,
    Data(Topic),
    Rag,
}

/// Stateless message classifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct SmartRouter;

impl SmartRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, message: &str) -> Route {
        if is_greeting_or_small_talk(message) {
            return Route::Greeting;
        }
        match Topic::detect(message) {
            Some(topic) => Route::Data(topic),
            None => Route::Rag,
        }
    }
}

pub fn is_greeting_or_small_talk(message: &str) -> bool {
    let trimmed = message.trim();

    if GREETING_PATTERNS.iter().any(|re| re.is_match(trimmed)) {
        return true;
    }

    trimmed.chars().count() < SHORT_MESSAGE_CHARS && !trimmed.contains('?')
}
