//! crates/reading_rewards_core/src/fallback.rs
//!
//! Stand-in artifacts used when content generation fails, so a reading or
//! creator flow never gets stuck.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::domain::{ComprehensionQuestion, Story};

/// A generic question the reader can always answer.
pub fn fallback_question(story: &Story) -> ComprehensionQuestion {
    ComprehensionQuestion {
        question: format!("What was the main topic of the story \"{}\"?", story.title),
        options: vec![
            "The story was about adventure and friendship".to_string(),
            "The story was about cooking recipes".to_string(),
            "The story was about building houses".to_string(),
            "The story was about space travel".to_string(),
        ],
        correct_option_index: 0,
        explanation: Some("Based on the story content, this was the main theme.".to_string()),
    }
}

const PLACEHOLDER_COLORS: [&str; 10] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FFEAA7", "#DDA0DD", "#98D8C8", "#F7DC6F",
    "#BB8FCE", "#85C1E9",
];

/// 31-based rolling hash over UTF-16 code units, wrapping at 32 bits.
fn prompt_hash(prompt: &str) -> i32 {
    prompt
        .encode_utf16()
        .fold(0i32, |acc, unit| acc.wrapping_shl(5).wrapping_sub(acc).wrapping_add(i32::from(unit)))
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// A smiling coloured tile labelled with the first words of the prompt,
/// returned as a `data:` URI. The same prompt always yields the same image.
pub fn placeholder_image(prompt: &str) -> String {
    let color = PLACEHOLDER_COLORS[prompt_hash(prompt).unsigned_abs() as usize % PLACEHOLDER_COLORS.len()];
    let label = escape_xml(&prompt.split_whitespace().take(2).collect::<Vec<_>>().join(" "));

    let svg = format!(
        r#"<svg width="200" height="200" xmlns="http://www.w3.org/2000/svg"><rect width="200" height="200" fill="{color}"/><circle cx="100" cy="80" r="30" fill="white" opacity="0.8"/><circle cx="85" cy="75" r="5" fill="black"/><circle cx="115" cy="75" r="5" fill="black"/><path d="M 80 100 Q 100 120 120 100" stroke="black" stroke-width="3" fill="none"/><text x="100" y="160" text-anchor="middle" fill="white" font-family="Arial" font-size="12" font-weight="bold">{label}</text></svg>"#
    );

    format!("data:image/svg+xml;base64,{}", STANDARD.encode(svg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ReadingLevel, StoryLength};

    #[test]
    fn test_fallback_question_is_well_formed() {
        let story = Story {
            title: "The Brave Owl".to_string(),
            content: "Once upon a time...".to_string(),
            reading_level: ReadingLevel::Grade2,
            length: StoryLength::Short,
        };
        let question = fallback_question(&story);
        assert!(question.is_well_formed());
        assert!(question.question.contains("The Brave Owl"));
    }

    #[test]
    fn test_placeholder_is_deterministic() {
        let a = placeholder_image("Lava knight with a shield");
        let b = placeholder_image("Lava knight with a shield");
        assert_eq!(a, b);
        assert!(a.starts_with("data:image/svg+xml;base64,"));
    }

    #[test]
    fn test_placeholder_label_and_color() {
        let uri = placeholder_image("Ice <Queen> rules");
        let encoded = uri.trim_start_matches("data:image/svg+xml;base64,");
        let svg = String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap();
        assert!(svg.contains("Ice &lt;Queen&gt;"));
        assert!(PLACEHOLDER_COLORS.iter().any(|c| svg.contains(c)));
    }

    #[test]
    fn test_hash_matches_known_values() {
        assert_eq!(prompt_hash(""), 0);
        assert_eq!(prompt_hash("a"), 97);
        assert_eq!(prompt_hash("ab"), 97 * 31 + 98);
    }
}
