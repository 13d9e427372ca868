pub mod backend;
pub mod orchestrator;
pub mod request;
pub mod response;
pub mod session;
pub mod types;

pub use backend::{AiBackend, BackendError, GeminiBackend};
pub use orchestrator::{ConversationOrchestrator, PreparedTurn, TurnResult};
pub use request::{RequestEnvelope, TurnConfig, CORE_DIRECTIVE, SCREEN_FALLBACK_QUESTION};
pub use response::{ResponseShape, APOLOGY_TEXT};
pub use session::{ConversationSession, Delivery, SendRejected, SendTicket};
pub use types::{ConversationHistory, ConversationTurn, ImagePayload, Part, Role, ThinkingLevel};
