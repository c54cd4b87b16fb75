//! Text clean-up before handing a phrase to speech synthesis.

use once_cell::sync::Lazy;
use regex::Regex;

/// Emoji, pictographs and the joiners/selectors that glue them together
static PICTOGRAPHS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\p{Emoji_Presentation}\p{Extended_Pictographic}\u{200D}\u{FE0F}]").unwrap()
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Strip characters TTS voices read out literally (or choke on) and collapse
/// whitespace. May return an empty string.
pub fn sanitize_for_speech(text: &str) -> String {
    let stripped = PICTOGRAPHS.replace_all(text, "");
    WHITESPACE.replace_all(stripped.trim(), " ").into_owned()
}
