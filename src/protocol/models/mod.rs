pub mod audio;
pub mod common;
pub mod items;
pub mod response;
pub mod session;
pub mod tools;

pub use audio::{InputAudioTranscription, TurnDetection};
pub use common::{
    ArbitraryJson, DEFAULT_MODEL, DEFAULT_VOICE, Infinite, ItemStatus, JsonSchema,
    MAX_RESPONSE_TOKENS, MaxTokens, Modality, Role,
};
pub use items::{ContentPart, Item};
pub use response::{Response, ResponseConfig, ResponseStatus};
pub use session::{Session, SessionUpdateConfig};
pub use tools::{Tool, ToolChoice};
