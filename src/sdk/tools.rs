use super::channel::ControlChannel;
use super::events::{EventSink, SessionEvent, emit};
use crate::protocol::client_events::ClientEvent;
use crate::protocol::models::{Item, Tool};
use crate::{Error, Result};
use schemars::JsonSchema;
use schemars::schema::RootSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

type ToolHandler = Arc<dyn Fn(Value) -> BoxFuture<Result<Value>> + Send + Sync>;

#[derive(Clone, Debug)]
pub struct ToolDefinition {
    pub name: String,
    pub description: Option<String>,
    pub schema: RootSchema,
}

/// A function call requested by the model, arguments already decoded.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub call_id: String,
    pub arguments: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ToolResult {
    pub call_id: String,
    pub output: Value,
}

#[derive(Default)]
pub struct ToolRegistry {
    defs: Vec<ToolDefinition>,
    handlers: HashMap<String, ToolHandler>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").field("defs", &self.defs).finish_non_exhaustive()
    }
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.defs
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn tool<TArgs, TResp, F, Fut>(&mut self, name: &str, handler: F)
    where
        TArgs: DeserializeOwned + JsonSchema + Send + 'static,
        TResp: Serialize + Send + 'static,
        F: Fn(TArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TResp>> + Send + 'static,
    {
        self.register(name, None, handler);
    }

    pub fn tool_with_description<TArgs, TResp, F, Fut>(
        &mut self,
        name: &str,
        description: impl Into<String>,
        handler: F,
    ) where
        TArgs: DeserializeOwned + JsonSchema + Send + 'static,
        TResp: Serialize + Send + 'static,
        F: Fn(TArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TResp>> + Send + 'static,
    {
        self.register(name, Some(description.into()), handler);
    }

    fn register<TArgs, TResp, F, Fut>(&mut self, name: &str, description: Option<String>, handler: F)
    where
        TArgs: DeserializeOwned + JsonSchema + Send + 'static,
        TResp: Serialize + Send + 'static,
        F: Fn(TArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TResp>> + Send + 'static,
    {
        let schema = schemars::schema_for!(TArgs);
        let name = name.to_string();
        self.defs.retain(|def| def.name != name);
        self.defs.push(ToolDefinition {
            name: name.clone(),
            description,
            schema,
        });

        let user_handler = Arc::new(handler);
        let tool_name = name.clone();
        let handler = move |value: Value| -> BoxFuture<Result<Value>> {
            let user_handler = Arc::clone(&user_handler);
            let tool_name = tool_name.clone();
            Box::pin(async move {
                let args: TArgs = serde_json::from_value(value)
                    .map_err(|e| Error::Tool(format!("{tool_name}: invalid arguments: {e}")))?;
                let resp = user_handler(args).await?;
                serde_json::to_value(resp).map_err(|e| Error::Tool(format!("{tool_name}: {e}")))
            })
        };

        self.handlers.insert(name, Arc::new(handler));
    }

    /// Convert all registered tools into protocol-level tool definitions.
    ///
    /// # Errors
    /// Returns an error if schema serialization fails.
    // Keep a single public error type for the SDK surface.
    #[allow(clippy::result_large_err)]
    pub fn try_as_tools(&self) -> Result<Vec<Tool>> {
        let mut tools = Vec::with_capacity(self.defs.len());
        for def in &self.defs {
            let parameters = serde_json::to_value(&def.schema)?;
            tools.push(Tool::Function {
                name: def.name.clone(),
                description: def.description.clone(),
                parameters,
            });
        }
        Ok(tools)
    }

    /// Dispatch a tool call to the registered handler.
    ///
    /// # Errors
    /// Returns `Error::Tool` if the tool is unknown, the arguments do not fit
    /// its schema, or the handler fails.
    pub async fn dispatch(&self, call: ToolCall) -> Result<ToolResult> {
        let handler = self
            .handlers
            .get(&call.name)
            .cloned()
            .ok_or_else(|| Error::Tool(format!("unknown tool: {}", call.name)))?;
        let output = handler(call.arguments).await.map_err(|e| match e {
            Error::Tool(_) => e,
            other => Error::Tool(format!("{}: {other}", call.name)),
        })?;
        Ok(ToolResult {
            call_id: call.call_id,
            output,
        })
    }
}

/// Fire-and-forget executor for model-issued function calls.
///
/// The channel is passed per call so a result always goes back over the
/// session that asked for it.
pub trait ToolInvoker: Send + Sync {
    fn invoke(&self, call: ToolCall, channel: ControlChannel);
}

/// Runs calls against a [`ToolRegistry`] on the tokio runtime.
pub struct RegistryInvoker {
    registry: Arc<ToolRegistry>,
    events: EventSink,
}

impl RegistryInvoker {
    #[must_use]
    pub(crate) const fn new(registry: Arc<ToolRegistry>, events: EventSink) -> Self {
        Self { registry, events }
    }
}

impl ToolInvoker for RegistryInvoker {
    fn invoke(&self, call: ToolCall, channel: ControlChannel) {
        if !self.registry.contains(&call.name) {
            tracing::warn!(tool = %call.name, "Ignoring call to unknown tool");
            return;
        }
        let registry = Arc::clone(&self.registry);
        let events = self.events.clone();
        tokio::spawn(async move {
            let name = call.name.clone();
            let result = match registry.dispatch(call).await {
                Ok(result) => result,
                Err(err) => {
                    tracing::warn!(tool = %name, error = %err, "Tool call failed");
                    emit(&events, SessionEvent::error(&err));
                    return;
                }
            };
            if let Err(err) = deliver(&channel, &result) {
                tracing::warn!(tool = %name, error = %err, "Failed to deliver tool result");
                emit(&events, SessionEvent::error(&err));
            }
        });
    }
}

/// Feed a result back as a user turn and ask for a fresh response.
#[allow(clippy::result_large_err)]
fn deliver(channel: &ControlChannel, result: &ToolResult) -> Result<()> {
    let text = serde_json::to_string(&result.output)?;
    if !channel.send_if_open(&ClientEvent::item_create(Item::user_text(text)))? {
        tracing::warn!(call_id = %result.call_id, "Channel closed before tool result arrived, dropping it");
        return Ok(());
    }
    channel.send_if_open(&ClientEvent::respond())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::testing::open_channel;
    use serde::Deserialize;
    use crate::sdk::events::event_channel;
    use serde_json::json;

    #[derive(Deserialize, JsonSchema)]
    struct EchoArgs {
        text: String,
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.tool_with_description("echo", "Echo text back", |args: EchoArgs| async move {
            Ok(json!({ "echo": args.text }))
        });
        registry.tool("fail", |_: EchoArgs| async move {
            Err::<Value, _>(Error::Tool("lookup failed".to_string()))
        });
        registry
    }

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            name: name.to_string(),
            call_id: "call_1".to_string(),
            arguments,
        }
    }

    #[test]
    fn tools_carry_schema_and_description() {
        let tools = registry().try_as_tools().unwrap();
        assert_eq!(tools.len(), 2);
        let Tool::Function { name, description, parameters } = &tools[0];
        assert_eq!(name, "echo");
        assert_eq!(description.as_deref(), Some("Echo text back"));
        assert_eq!(parameters["properties"]["text"]["type"], "string");
    }

    #[test]
    fn reregistering_replaces_definition() {
        let mut registry = registry();
        registry.tool("echo", |args: EchoArgs| async move { Ok(args.text) });
        assert_eq!(registry.definitions().len(), 2);
        assert!(registry.definitions().iter().any(|d| d.name == "echo" && d.description.is_none()));
    }

    #[tokio::test]
    async fn dispatch_decodes_arguments() {
        let result = registry().dispatch(call("echo", json!({ "text": "hi" }))).await.unwrap();
        assert_eq!(result.call_id, "call_1");
        assert_eq!(result.output, json!({ "echo": "hi" }));
    }

    #[tokio::test]
    async fn dispatch_rejects_bad_arguments() {
        let err = registry().dispatch(call("echo", json!({ "txt": 1 }))).await.unwrap_err();
        assert!(matches!(err, Error::Tool(msg) if msg.starts_with("echo: invalid arguments")));
    }

    #[tokio::test]
    async fn invoker_sends_result_then_response_request() {
        let (events, _rx) = event_channel();
        let invoker = RegistryInvoker::new(Arc::new(registry()), events);
        let (channel, fake) = open_channel();

        invoker.invoke(call("echo", json!({ "text": "hi" })), channel);
        while fake.sent.lock().len() < 2 {
            tokio::task::yield_now().await;
        }

        let sent = fake.sent_json();
        assert_eq!(sent[0]["type"], "conversation.item.create");
        assert_eq!(sent[0]["item"]["role"], "user");
        assert_eq!(sent[0]["item"]["content"][0]["text"], r#"{"echo":"hi"}"#);
        assert_eq!(sent[1]["type"], "response.create");
    }

    #[tokio::test]
    async fn unknown_tool_is_ignored() {
        let (events, mut rx) = event_channel();
        let invoker = RegistryInvoker::new(Arc::new(registry()), events);
        let (channel, fake) = open_channel();

        invoker.invoke(call("teleport", json!({})), channel);
        tokio::task::yield_now().await;

        assert!(fake.sent.lock().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn late_result_after_close_is_dropped() {
        let (events, mut rx) = event_channel();
        let invoker = RegistryInvoker::new(Arc::new(registry()), events);
        let (channel, fake) = open_channel();

        invoker.invoke(call("echo", json!({ "text": "hi" })), channel.clone());
        channel.close();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert!(fake.sent.lock().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn handler_failure_surfaces_tool_error() {
        let (events, mut rx) = event_channel();
        let invoker = RegistryInvoker::new(Arc::new(registry()), events);
        let (channel, fake) = open_channel();

        invoker.invoke(call("fail", json!({ "text": "x" })), channel);
        let event = rx.recv().await.unwrap();

        assert_eq!(
            event,
            SessionEvent::Error {
                kind: "tool",
                message: "Tool call failed: lookup failed".to_string(),
            }
        );
        assert!(fake.sent.lock().is_empty());
    }
}
