pub mod blob;
pub mod content_llm;
pub mod db;
pub mod identity;
pub mod offline;

pub use blob::LocalBlobStorage;
pub use content_llm::OpenAiContentAdapter;
pub use db::DbAdapter;
pub use identity::PasswordIdentityService;
pub use offline::OfflineContentGenerator;
