//! Session layer: negotiation, the control-channel gate, event routing and tools.
//!
//! A [`RealtimeClient`] owns the configuration and at most one live session.
//! The media stack itself is supplied through the traits in
//! [`crate::transport::peer`].

mod builder;
mod channel;
mod dispatcher;
pub mod events;
mod negotiator;
mod session;
mod tools;
mod transport;
mod weather;

#[cfg(test)]
pub(crate) mod testing;

pub use builder::{DEFAULT_GREETING, Realtime, RealtimeBuilder, SessionSettings};
pub use channel::{ChannelState, ControlChannel};
pub use dispatcher::{EventDispatcher, Speaker, Transcript, TranscriptEntry};
pub use events::{EventStream, SessionEvent, Turn};
pub use negotiator::{Collaborators, Connection, Negotiator, SessionPhase, SessionState};
pub use session::{RealtimeClient, SessionHandle};
pub use tools::{
    BoxFuture as ToolFuture, RegistryInvoker, ToolCall, ToolDefinition, ToolInvoker, ToolRegistry, ToolResult,
};
pub use transport::{CredentialProvider, OfferExchange};
pub use weather::{WEATHER_TOOL_NAME, WeatherArgs, WeatherReport, WeatherTool};
