//! services/api/src/adapters/content_llm.rs
//!
//! This module contains the adapter for an OpenAI-compatible content model.
//! It implements the `ContentGenerator` port: stories and comprehension
//! questions come from the chat completion endpoint as JSON, skin images
//! from the image endpoint.

use async_openai::{
    config::OpenAIConfig,
    types::{
        chat::{
            ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
            ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
        },
        images::{CreateImageRequestArgs, Image, ImageModel, ImageResponseFormat, ImageSize},
    },
    Client,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use reading_rewards_core::domain::{ComprehensionQuestion, ReadingLevel, Story, StoryLength};
use reading_rewards_core::ports::{
    ContentGenerator, GeneratedImage, GeneratedStory, PortError, PortResult,
};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use tracing::{debug, info};

const STORY_SYSTEM_PROMPT: &str = "You write engaging, age-appropriate children's stories. \
Respond with a single JSON object and nothing else.";

const QUESTION_SYSTEM_PROMPT: &str = "You write simple reading comprehension checks for children. \
Respond with a single JSON object and nothing else.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct OpenAiContentAdapter {
    client: Client<OpenAIConfig>,
    story_model: String,
    image_model: String,
}

impl OpenAiContentAdapter {
    pub fn new(client: Client<OpenAIConfig>, story_model: String, image_model: String) -> Self {
        Self {
            client,
            story_model,
            image_model,
        }
    }

    /// Sends one system + user exchange and returns the raw reply text.
    async fn complete(&self, system: &str, user: String, max_tokens: u32) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system)
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?,
            ),
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user)
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?,
            ),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.story_model)
            .messages(messages)
            .max_tokens(max_tokens)
            .temperature(0.8)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| PortError::InvalidContent("The model returned no content".to_string()))
    }
}

//=========================================================================================
// Prompts
//=========================================================================================

/// Scales a `"min-max"` word range by the length multiplier.
fn scaled_word_count(range: &str, multiplier: f64) -> String {
    let scale = |n: &str| {
        n.trim()
            .parse::<f64>()
            .map(|v| (v * multiplier).round() as u64)
    };
    match range.split_once('-') {
        Some((low, high)) => match (scale(low), scale(high)) {
            (Ok(low), Ok(high)) => format!("{}-{}", low, high),
            _ => range.to_string(),
        },
        None => range.to_string(),
    }
}

fn story_prompt(level: ReadingLevel, length: StoryLength, topic: &str) -> String {
    let level_settings = level.settings();
    let length_settings = length.settings();
    format!(
        "Generate a children's story about \"{topic}\".\n\
         The story should be between {words} words.\n\
         {level_hint}\n\
         {length_hint}\n\
         The story must be engaging and exciting for a child.\n\
         Return JSON with the keys \"title\" (an exciting, short title) and \"content\" \
         (the full story, paragraphs separated by newlines).",
        topic = topic,
        words = scaled_word_count(level_settings.word_count, length_settings.word_count_multiplier),
        level_hint = level_settings.prompt_addition,
        length_hint = length_settings.prompt_addition,
    )
}

fn question_prompt(story: &Story) -> String {
    let level = story.reading_level.label();
    format!(
        "Based on this story titled \"{title}\", create a simple comprehension question to validate \
         that a child at {level} level has read and understood the story.\n\n\
         Story content:\n{content}\n\n\
         Requirements:\n\
         - Create a multiple choice question with 4 options\n\
         - The question should be fairly easy, just enough to show they read the story\n\
         - Make it appropriate for {level} reading level\n\
         - Focus on characters, main events, or simple plot points\n\
         - Make sure one answer is clearly correct and the others are plausible but wrong\n\
         - Keep the question and answers concise and age-appropriate\n\n\
         Return JSON with the keys \"question\", \"options\" (an array of 4 strings), \
         \"correctAnswerIndex\" (0-3) and \"explanation\".",
        title = story.title,
        level = level,
        content = strip_markup(&story.content),
    )
}

//=========================================================================================
// Response Parsing
//=========================================================================================

fn markup_regex() -> &'static Regex {
    static MARKUP: OnceLock<Regex> = OnceLock::new();
    MARKUP.get_or_init(|| Regex::new(r"<[^>]*>").expect("markup pattern is valid"))
}

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"(?s)^```[a-zA-Z]*\s*(.*?)\s*```$").expect("fence pattern is valid"))
}

/// Removes HTML tags, turning line breaks into newlines.
fn strip_markup(text: &str) -> String {
    let with_breaks = text.replace("<br />", "\n").replace("<br/>", "\n").replace("<br>", "\n");
    markup_regex().replace_all(&with_breaks, "").trim().to_string()
}

/// Models sometimes wrap JSON in a markdown code fence.
fn unwrap_json(raw: &str) -> &str {
    let trimmed = raw.trim();
    match fence_regex().captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => trimmed,
    }
}

#[derive(Deserialize)]
struct StoryPayload {
    title: String,
    content: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuestionPayload {
    question: String,
    options: Vec<String>,
    correct_answer_index: i64,
    #[serde(default)]
    explanation: Option<String>,
}

fn parse_story(raw: &str) -> PortResult<GeneratedStory> {
    let payload: StoryPayload = serde_json::from_str(unwrap_json(raw))
        .map_err(|e| PortError::InvalidContent(format!("Story was not valid JSON: {}", e)))?;
    let title = strip_markup(&payload.title);
    let body = strip_markup(&payload.content);
    if title.is_empty() || body.is_empty() {
        return Err(PortError::InvalidContent("Story is missing a title or content".to_string()));
    }
    Ok(GeneratedStory { title, body })
}

fn parse_question(raw: &str) -> PortResult<ComprehensionQuestion> {
    let payload: QuestionPayload = serde_json::from_str(unwrap_json(raw))
        .map_err(|e| PortError::InvalidContent(format!("Question was not valid JSON: {}", e)))?;
    let correct_option_index = usize::try_from(payload.correct_answer_index).map_err(|_| {
        PortError::InvalidContent(format!("Answer index {} is negative", payload.correct_answer_index))
    })?;

    let question = ComprehensionQuestion {
        question: payload.question.trim().to_string(),
        options: payload.options.iter().map(|o| o.trim().to_string()).collect(),
        correct_option_index,
        explanation: payload.explanation.filter(|e| !e.trim().is_empty()),
    };
    if !question.is_well_formed() {
        return Err(PortError::InvalidContent(
            "Question needs exactly 4 options and an answer index between 0 and 3".to_string(),
        ));
    }
    Ok(question)
}

//=========================================================================================
// `ContentGenerator` Trait Implementation
//=========================================================================================

#[async_trait]
impl ContentGenerator for OpenAiContentAdapter {
    async fn generate_story(
        &self,
        level: ReadingLevel,
        length: StoryLength,
        topic: &str,
    ) -> PortResult<GeneratedStory> {
        debug!(topic, level = level.label(), "Requesting story.");
        let raw = self
            .complete(STORY_SYSTEM_PROMPT, story_prompt(level, length, topic), 3000)
            .await?;
        let story = parse_story(&raw)?;
        info!(title = %story.title, "Story generated.");
        Ok(story)
    }

    async fn generate_comprehension_check(&self, story: &Story) -> PortResult<ComprehensionQuestion> {
        let raw = self
            .complete(QUESTION_SYSTEM_PROMPT, question_prompt(story), 500)
            .await?;
        parse_question(&raw)
    }

    async fn generate_cosmetic_image(&self, prompt: &str) -> PortResult<GeneratedImage> {
        let request = CreateImageRequestArgs::default()
            .prompt(prompt)
            .model(ImageModel::Other(self.image_model.clone()))
            .n(1)
            .size(ImageSize::S1024x1024)
            .response_format(ImageResponseFormat::B64Json)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .images()
            .generate(request)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let image = response
            .data
            .first()
            .ok_or_else(|| PortError::InvalidContent("No image was generated".to_string()))?;

        match image.as_ref() {
            Image::B64Json { b64_json, .. } => {
                let decoded = STANDARD
                    .decode(b64_json.as_bytes())
                    .map_err(|e| PortError::InvalidContent(format!("Image was not valid base64: {}", e)))?;
                Ok(GeneratedImage::Png(Bytes::from(decoded)))
            }
            Image::Url { url, .. } => Ok(GeneratedImage::Hosted(url.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_word_count() {
        assert_eq!(scaled_word_count("500-750", 0.6), "300-450");
        assert_eq!(scaled_word_count("100-200", 1.4), "140-280");
        assert_eq!(scaled_word_count("lots", 1.4), "lots");
    }

    #[test]
    fn test_story_prompt_mentions_level_and_length() {
        let prompt = story_prompt(ReadingLevel::Grade4, StoryLength::Short, "volcanoes");
        assert!(prompt.contains("\"volcanoes\""));
        assert!(prompt.contains("300-450 words"));
        assert!(prompt.contains("4th grader"));
        assert!(prompt.contains("single, clear conflict"));
    }

    #[test]
    fn test_parse_story_strips_fences_and_markup() {
        let raw = "```json\n{\"title\": \"The <b>Brave</b> Owl\", \"content\": \"Once upon a time.<br />The end.\"}\n```";
        let story = parse_story(raw).unwrap();
        assert_eq!(story.title, "The Brave Owl");
        assert_eq!(story.body, "Once upon a time.\nThe end.");
    }

    #[test]
    fn test_parse_story_rejects_empty_content() {
        let err = parse_story(r#"{"title": "Nothing", "content": "  "}"#).unwrap_err();
        assert!(matches!(err, PortError::InvalidContent(_)));
        assert!(parse_story("not json").is_err());
    }

    #[test]
    fn test_parse_question_valid() {
        let raw = r#"{
            "question": "Who found the map?",
            "options": ["Fox", "Owl", "Bear", "Frog"],
            "correctAnswerIndex": 2,
            "explanation": "The bear dug it up."
        }"#;
        let question = parse_question(raw).unwrap();
        assert_eq!(question.correct_option_index, 2);
        assert_eq!(question.options.len(), 4);
        assert_eq!(question.explanation.as_deref(), Some("The bear dug it up."));
    }

    #[test]
    fn test_parse_question_rejects_malformed() {
        let three_options = r#"{"question": "Q?", "options": ["a", "b", "c"], "correctAnswerIndex": 0}"#;
        assert!(matches!(parse_question(three_options), Err(PortError::InvalidContent(_))));

        let out_of_range = r#"{"question": "Q?", "options": ["a", "b", "c", "d"], "correctAnswerIndex": 4}"#;
        assert!(parse_question(out_of_range).is_err());

        let negative = r#"{"question": "Q?", "options": ["a", "b", "c", "d"], "correctAnswerIndex": -1}"#;
        assert!(parse_question(negative).is_err());
    }
}
