pub mod controller;
pub mod daily;
pub mod domain;
pub mod eligibility;
pub mod fallback;
pub mod ports;
pub mod registry;
pub mod rewards;
pub mod settings;

pub use controller::{
    Controller, ControllerError, ProgressUpdate, ReaderSession, Services, UserSummary, View,
};
pub use domain::{
    AdminSkin, ComprehensionQuestion, DailyStats, DaySession, GenerationState, Identity,
    ProgressRecord, Rarity, ReadingLevel, Skin, SkinPreview, Story, StoryLength,
};
pub use ports::{
    BlobStorage, Clock, ContentGenerator, IdentityService, PortError, PortResult, ProgressStore,
    SkinCatalogStore, SystemClock,
};
pub use registry::SessionRegistry;
pub use settings::RulesConfig;
