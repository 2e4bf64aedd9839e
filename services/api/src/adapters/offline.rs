//! services/api/src/adapters/offline.rs
//!
//! A `ContentGenerator` for running without a model API key. Stories are
//! assembled from a template; questions and images always fail so the
//! controller's canned question and placeholder image are used.

use async_trait::async_trait;
use reading_rewards_core::domain::{ComprehensionQuestion, ReadingLevel, Story, StoryLength};
use reading_rewards_core::ports::{
    ContentGenerator, GeneratedImage, GeneratedStory, PortError, PortResult,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineContentGenerator;

fn title_case(topic: &str) -> String {
    topic
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl ContentGenerator for OfflineContentGenerator {
    async fn generate_story(
        &self,
        level: ReadingLevel,
        length: StoryLength,
        topic: &str,
    ) -> PortResult<GeneratedStory> {
        let scenes = match length {
            StoryLength::Short => 2,
            StoryLength::Medium => 3,
            StoryLength::Long => 5,
        };
        let mut paragraphs = vec![format!(
            "Once upon a time, a curious young reader set out to learn everything about {}.",
            topic
        )];
        for scene in 1..=scenes {
            paragraphs.push(format!(
                "On day {}, the reader discovered something new about {} and told a friend all about it.",
                scene, topic
            ));
        }
        paragraphs.push(format!(
            "By the end of the adventure, {} had become a favourite subject, and the reader could not wait to read more.",
            topic
        ));

        Ok(GeneratedStory {
            title: format!("The {} Adventure", title_case(topic)),
            body: format!("{}\n\n({})", paragraphs.join("\n\n"), level.label()),
        })
    }

    async fn generate_comprehension_check(&self, _story: &Story) -> PortResult<ComprehensionQuestion> {
        Err(PortError::Unexpected("Question generation is not configured".to_string()))
    }

    async fn generate_cosmetic_image(&self, _prompt: &str) -> PortResult<GeneratedImage> {
        Err(PortError::Unexpected("Image generation is not configured".to_string()))
    }
}
