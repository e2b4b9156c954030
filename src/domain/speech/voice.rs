use lingua::{Language, LanguageDetector, LanguageDetectorBuilder};
use serde::{Deserialize, Serialize};

/// Voice name clients send to let the service pick a voice from the text's language
pub const AUTO_VOICE: &str = "auto";

/// ISO 639-1 language codes we have default voices for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LanguageCode {
    #[serde(rename = "en")]
    English,
    #[serde(rename = "es")]
    Spanish,
    #[serde(rename = "fr")]
    French,
    #[serde(rename = "de")]
    German,
    #[serde(rename = "it")]
    Italian,
    #[serde(rename = "pt")]
    Portuguese,
}

impl LanguageCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageCode::English => "en",
            LanguageCode::Spanish => "es",
            LanguageCode::French => "fr",
            LanguageCode::German => "de",
            LanguageCode::Italian => "it",
            LanguageCode::Portuguese => "pt",
        }
    }

    pub fn from_lingua(language: Language) -> Self {
        match language {
            Language::English => LanguageCode::English,
            Language::Spanish => LanguageCode::Spanish,
            Language::French => LanguageCode::French,
            Language::German => LanguageCode::German,
            Language::Italian => LanguageCode::Italian,
            Language::Portuguese => LanguageCode::Portuguese,
        }
    }
}

impl std::fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Turns the requested voice into the concrete provider voice used as part of cache keys.
///
/// Resolution happens before hashing so that `"auto"` and the voice it resolves to share
/// cached audio.
pub struct VoiceResolver {
    detector: LanguageDetector,
    fallback_voice: String,
}

impl VoiceResolver {
    pub fn new(fallback_voice: String) -> Self {
        Self {
            detector: LanguageDetectorBuilder::from_all_languages().build(),
            fallback_voice,
        }
    }

    /// A missing voice falls back to the configured default, which may itself be `auto`.
    /// `voice_for_language` maps a detected language to the provider's default voice.
    pub fn resolve(
        &self,
        requested: Option<&str>,
        text: &str,
        voice_for_language: impl Fn(LanguageCode) -> &'static str,
    ) -> String {
        let voice = requested
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(self.fallback_voice.as_str());

        if voice.eq_ignore_ascii_case(AUTO_VOICE) {
            voice_for_language(self.detect_language(text)).to_string()
        } else {
            voice.to_string()
        }
    }

    pub fn detect_language(&self, text: &str) -> LanguageCode {
        match self.detector.detect_language_of(text) {
            Some(language) => LanguageCode::from_lingua(language),
            None => {
                tracing::warn!("Could not detect language, falling back to English");
                LanguageCode::English
            }
        }
    }
}
