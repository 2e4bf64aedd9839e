//! In-memory stand-ins for the external services.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, TimeZone, Utc};
use reading_rewards_core::domain::{AdminSkin, ComprehensionQuestion, Identity, ProgressRecord, ReadingLevel, Story, StoryLength};
use reading_rewards_core::ports::{
    BlobStorage, Clock, ContentGenerator, GeneratedImage, GeneratedStory, PortError, PortResult,
    ProgressStore, SkinCatalogStore, StoredProgress,
};
use reading_rewards_core::{Controller, RulesConfig, Services};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use uuid::Uuid;

#[allow(dead_code)]
pub enum QuestionMode {
    Good,
    Malformed,
    Failing,
}

#[allow(dead_code)]
pub enum ImageMode {
    Hosted,
    Png,
    Failing,
}

pub struct FakeContent {
    pub question: Mutex<QuestionMode>,
    pub image: Mutex<ImageMode>,
    pub fail_story: Mutex<bool>,
}

impl Default for FakeContent {
    fn default() -> Self {
        Self {
            question: Mutex::new(QuestionMode::Good),
            image: Mutex::new(ImageMode::Hosted),
            fail_story: Mutex::new(false),
        }
    }
}

pub fn good_question() -> ComprehensionQuestion {
    ComprehensionQuestion {
        question: "Who found the map?".to_string(),
        options: vec![
            "The fox".to_string(),
            "The owl".to_string(),
            "The bear".to_string(),
            "The frog".to_string(),
        ],
        correct_option_index: 2,
        explanation: Some("The bear dug it up.".to_string()),
    }
}

#[async_trait]
impl ContentGenerator for FakeContent {
    async fn generate_story(
        &self,
        level: ReadingLevel,
        _length: StoryLength,
        topic: &str,
    ) -> PortResult<GeneratedStory> {
        if *self.fail_story.lock().unwrap() {
            return Err(PortError::Unexpected("model offline".to_string()));
        }
        Ok(GeneratedStory {
            title: format!("A {} tale", topic),
            body: format!("A story about {} for {}.", topic, level.label()),
        })
    }

    async fn generate_comprehension_check(&self, _story: &Story) -> PortResult<ComprehensionQuestion> {
        match *self.question.lock().unwrap() {
            QuestionMode::Good => Ok(good_question()),
            QuestionMode::Malformed => Ok(ComprehensionQuestion {
                options: vec!["only one".to_string()],
                ..good_question()
            }),
            QuestionMode::Failing => Err(PortError::Unexpected("quota exceeded".to_string())),
        }
    }

    async fn generate_cosmetic_image(&self, _prompt: &str) -> PortResult<GeneratedImage> {
        match *self.image.lock().unwrap() {
            ImageMode::Hosted => Ok(GeneratedImage::Hosted("https://img.test/skin.png".to_string())),
            ImageMode::Png => Ok(GeneratedImage::Png(Bytes::from_static(b"\x89PNG"))),
            ImageMode::Failing => Err(PortError::Unexpected("billing required".to_string())),
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    pub records: Mutex<HashMap<Uuid, ProgressRecord>>,
    pub fail_saves: Mutex<bool>,
    pub saves: Mutex<usize>,
    /// Loads for this user wait until the notify fires.
    pub held_load: Mutex<Option<(Uuid, Arc<Notify>)>>,
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn load_progress(&self, user_id: Uuid) -> PortResult<Option<ProgressRecord>> {
        let gate = self
            .held_load
            .lock()
            .unwrap()
            .clone()
            .filter(|(held, _)| *held == user_id);
        if let Some((_, release)) = gate {
            release.notified().await;
        }
        Ok(self.records.lock().unwrap().get(&user_id).cloned())
    }

    async fn list_progress(&self) -> PortResult<Vec<StoredProgress>> {
        let mut stored: Vec<StoredProgress> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .map(|(user_id, record)| StoredProgress {
                user_id: *user_id,
                record: record.clone(),
            })
            .collect();
        stored.sort_by(|a, b| a.record.username.cmp(&b.record.username));
        Ok(stored)
    }

    async fn save_progress(&self, user_id: Uuid, record: &ProgressRecord) -> PortResult<()> {
        if *self.fail_saves.lock().unwrap() {
            return Err(PortError::Unexpected("connection reset".to_string()));
        }
        *self.saves.lock().unwrap() += 1;
        self.records.lock().unwrap().insert(user_id, record.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCatalog {
    pub skins: Mutex<Vec<AdminSkin>>,
}

#[async_trait]
impl SkinCatalogStore for MemoryCatalog {
    async fn list_admin_skins(&self) -> PortResult<Vec<AdminSkin>> {
        let mut skins = self.skins.lock().unwrap().clone();
        skins.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(skins)
    }

    async fn list_active_admin_skins(&self) -> PortResult<Vec<AdminSkin>> {
        Ok(self
            .list_admin_skins()
            .await?
            .into_iter()
            .filter(|s| s.is_active)
            .collect())
    }

    async fn save_admin_skin(&self, skin: &AdminSkin) -> PortResult<()> {
        let mut skins = self.skins.lock().unwrap();
        skins.retain(|s| s.id != skin.id);
        skins.push(skin.clone());
        Ok(())
    }

    async fn delete_admin_skin(&self, skin_id: &str) -> PortResult<()> {
        self.skins.lock().unwrap().retain(|s| s.id != skin_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryBlobs {
    pub uploads: Mutex<Vec<String>>,
    pub fail: Mutex<bool>,
}

#[async_trait]
impl BlobStorage for MemoryBlobs {
    async fn upload(&self, _bytes: Bytes, path: &str, _content_type: &str) -> PortResult<String> {
        if *self.fail.lock().unwrap() {
            return Err(PortError::Unexpected("bucket missing".to_string()));
        }
        self.uploads.lock().unwrap().push(path.to_string());
        Ok(format!("https://blobs.test/{}", path))
    }
}

pub struct FixedClock {
    pub now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    #[allow(dead_code)]
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

pub struct Harness {
    pub controller: Controller,
    pub content: Arc<FakeContent>,
    pub store: Arc<MemoryStore>,
    pub catalog: Arc<MemoryCatalog>,
    pub blobs: Arc<MemoryBlobs>,
    pub clock: Arc<FixedClock>,
}

pub fn harness() -> Harness {
    let content = Arc::new(FakeContent::default());
    let store = Arc::new(MemoryStore::default());
    let catalog = Arc::new(MemoryCatalog::default());
    let blobs = Arc::new(MemoryBlobs::default());
    let clock = Arc::new(FixedClock {
        now: Mutex::new(Utc.with_ymd_and_hms(2024, 9, 2, 16, 0, 0).unwrap()),
    });

    let controller = Controller::new(
        Services {
            content: content.clone(),
            progress: store.clone(),
            catalog: catalog.clone(),
            blobs: blobs.clone(),
            clock: clock.clone(),
        },
        RulesConfig::default(),
    );

    Harness {
        controller,
        content,
        store,
        catalog,
        blobs,
        clock,
    }
}

pub fn identity() -> Identity {
    Identity {
        user_id: Uuid::new_v4(),
        email: "reader@example.com".to_string(),
    }
}
