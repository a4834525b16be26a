//! Turn orchestration: load, run the agent/action state machine, save.

use std::sync::Arc;

use parley_ai::{Content, Message};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::broadcast;

use crate::{
    codec,
    conversation::Conversation,
    error::{Error, Result},
    events::TurnEvent,
    model::ModelGateway,
    reply::Reply,
    store::SessionStore,
    tool::{ToolGateway, ToolInvocation, validate_with_validator},
    window::MessageWindow,
};

/// Phrase that routes a user message straight to the tool.
pub const DEFAULT_TRIGGER_PHRASE: &str = "hello code";

/// System prompt seeded into every new conversation.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You sit between a user and a task bot and keep their conversation moving. \
Never mention the bot to the user.
- If the bot asked the user something and the user answers with a clarifying \
question of their own, answer that question directly.
- Do not answer questions that have nothing to do with the conversation; \
politely say you don't know.";

/// States of the per-turn state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Produce the next assistant message
    Agent,
    /// Execute the requested tool call
    Action,
    /// Terminal
    End,
}

/// Conditional edge out of the agent step.
pub fn route(last: &Message) -> Step {
    if last.has_tool_call() {
        Step::Action
    } else {
        Step::End
    }
}

/// Case-insensitive trigger phrase. An empty phrase never matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerPhrase {
    phrase: String,
    folded: String,
}

impl TriggerPhrase {
    pub fn new(phrase: impl Into<String>) -> Self {
        let phrase = phrase.into();
        let folded = phrase.to_lowercase();
        Self { phrase, folded }
    }

    /// A trigger that never fires
    pub fn disabled() -> Self {
        Self::new("")
    }

    pub fn as_str(&self) -> &str {
        &self.phrase
    }

    /// Whether `text` contains the phrase, ignoring case
    pub fn matches(&self, text: &str) -> bool {
        !self.folded.is_empty() && text.to_lowercase().contains(&self.folded)
    }
}

impl Default for TriggerPhrase {
    fn default() -> Self {
        Self::new(DEFAULT_TRIGGER_PHRASE)
    }
}

/// Orchestrator configuration, fixed for the orchestrator's lifetime
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// System prompt for new conversations
    pub system_prompt: String,
    /// Shortcut phrase that bypasses the model
    pub trigger: TriggerPhrase,
    /// Bound on the history handed to the model
    pub window: MessageWindow,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            trigger: TriggerPhrase::default(),
            window: MessageWindow::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_trigger(mut self, trigger: TriggerPhrase) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn with_window(mut self, window: MessageWindow) -> Self {
        self.window = window;
        self
    }
}

/// Tool call pulled off an assistant message, awaiting execution.
#[derive(Debug, Clone)]
struct PendingCall {
    id: String,
    name: String,
    arguments: Value,
}

enum State {
    Agent,
    Action(PendingCall),
    End(Message),
}

impl State {
    fn step(&self) -> Step {
        match self {
            State::Agent => Step::Agent,
            State::Action(_) => Step::Action,
            State::End(_) => Step::End,
        }
    }
}

/// Runs conversation turns for any number of sessions.
///
/// Holds no per-session state: every turn loads its conversation from the
/// store and saves it back once the state machine reaches `end`. Turns of
/// the same session must not overlap.
pub struct Orchestrator {
    config: OrchestratorConfig,
    model: Arc<dyn ModelGateway>,
    tool: Arc<dyn ToolGateway>,
    store: Arc<dyn SessionStore>,
    validator: Option<Arc<jsonschema::Validator>>,
    event_tx: broadcast::Sender<TurnEvent>,
}

impl Orchestrator {
    /// Create an orchestrator around its three gateways
    pub fn new(
        config: OrchestratorConfig,
        model: Arc<dyn ModelGateway>,
        tool: Arc<dyn ToolGateway>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let schema = tool.parameters_schema();
        let validator = match jsonschema::validator_for(&schema) {
            Ok(validator) => Some(Arc::new(validator)),
            Err(e) => {
                tracing::warn!(
                    "Invalid tool parameter schema for '{}', skipping validation: {}",
                    tool.name(),
                    e
                );
                None
            }
        };
        Self {
            config,
            model,
            tool,
            store,
            validator,
            event_tx,
        }
    }

    /// Subscribe to turn events
    pub fn subscribe(&self) -> broadcast::Receiver<TurnEvent> {
        self.event_tx.subscribe()
    }

    /// Run one turn and return its final message.
    ///
    /// The session is saved only if the turn reaches its terminal state.
    pub async fn process(&self, user_text: &str, session_id: &str) -> Result<Message> {
        let result = self.run_turn(user_text, session_id).await;
        if let Err(ref e) = result {
            tracing::warn!(session_id, error = %e, "turn failed");
            self.emit(TurnEvent::Error {
                message: e.to_string(),
            });
        }
        result
    }

    /// Run one turn and unwrap its final message for the caller
    pub async fn respond(&self, user_text: &str, session_id: &str) -> Result<Reply> {
        let message = self.process(user_text, session_id).await?;
        Ok(Reply::from_message(&message))
    }

    /// Load and decode a session's stored conversation.
    ///
    /// Missing, empty and undecodable state all read as `None`.
    pub async fn load_conversation(&self, session_id: &str) -> Result<Option<Conversation>> {
        let Some(blob) = self.store.load(session_id).await? else {
            return Ok(None);
        };
        if blob.trim().is_empty() {
            return Ok(None);
        }
        match codec::decode(&blob) {
            Ok(conversation) if conversation.is_empty() => Ok(None),
            Ok(conversation) => Ok(Some(conversation)),
            Err(e) => {
                tracing::warn!(session_id, error = %e, "discarding stored conversation");
                Ok(None)
            }
        }
    }

    async fn run_turn(&self, user_text: &str, session_id: &str) -> Result<Message> {
        if is_blank(session_id) {
            return Err(Error::MissingSessionId);
        }

        let prior = self.load_conversation(session_id).await?;
        let resumed = prior.is_some();
        let user_message = Message::user(user_text);
        let mut conversation = match prior {
            Some(mut conversation) => {
                conversation.push(user_message);
                conversation
            }
            None => Conversation::seeded(&self.config.system_prompt, user_message),
        };

        self.emit(TurnEvent::TurnStart {
            session_id: session_id.to_string(),
            resumed,
        });

        let mut state = State::Agent;
        let final_message = loop {
            let step = state.step();
            tracing::debug!(session_id, ?step, "entering step");
            self.emit(TurnEvent::StepEnter { step });

            state = match state {
                State::Agent => {
                    let message = self.agent_step(&conversation).await?;
                    let next = route(&message);
                    let pending = message.tool_call().map(|call| PendingCall {
                        id: call.id.to_string(),
                        name: call.name.to_string(),
                        arguments: call.arguments.clone(),
                    });
                    self.append(&mut conversation, message.clone());
                    match (next, pending) {
                        (Step::Action, Some(call)) => State::Action(call),
                        _ => State::End(message),
                    }
                }
                State::Action(call) => {
                    let message = self.action_step(call, session_id).await?;
                    self.append(&mut conversation, message.clone());
                    State::End(message)
                }
                State::End(message) => break message,
            };
        };

        tracing::debug!(session_id, state = ?conversation.messages, "turn state");
        let blob = codec::encode(&conversation).map_err(Error::store)?;
        self.store.save(session_id, blob).await?;

        tracing::info!(
            session_id,
            messages = conversation.len(),
            role = final_message.role(),
            "turn complete"
        );
        self.emit(TurnEvent::TurnEnd {
            session_id: session_id.to_string(),
            message_count: conversation.len(),
        });

        Ok(final_message)
    }

    /// Produce the next assistant message from the bounded history.
    async fn agent_step(&self, conversation: &Conversation) -> Result<Message> {
        if let Some(text) = conversation.latest_user_text() {
            if self.config.trigger.matches(&text) {
                tracing::debug!(
                    trigger = self.config.trigger.as_str(),
                    "trigger phrase matched, bypassing model"
                );
                return Ok(self.shortcut_call(text));
            }
        }

        let bounded = self.config.window.apply(&conversation.messages);
        let message = self.model.invoke(&bounded).await?;
        if !matches!(message, Message::Assistant { .. }) {
            return Err(Error::Model(parley_ai::Error::UnexpectedResponse(format!(
                "model returned a {} message",
                message.role()
            ))));
        }
        Ok(message)
    }

    /// Assistant message requesting the registered tool with the raw user text.
    fn shortcut_call(&self, text: String) -> Message {
        let id = format!("call_{}", uuid::Uuid::new_v4().simple());
        Message::assistant_with_content(vec![Content::tool_call(
            id,
            self.tool.name(),
            json!({ "text": text }),
        )])
    }

    /// Execute a pending tool call and wrap its output in a tool-result message.
    async fn action_step(&self, call: PendingCall, session_id: &str) -> Result<Message> {
        if is_blank(session_id) {
            return Err(Error::MissingSessionId);
        }
        if call.name != self.tool.name() {
            return Err(Error::UnknownTool(call.name));
        }

        let invocation =
            ToolInvocation::from_request(call.id, call.name, &call.arguments, session_id)?;
        let arguments = invocation.arguments_value();

        if let Some(validator) = &self.validator {
            if let Some(reason) = validate_with_validator(&arguments, validator) {
                return Err(Error::InvalidToolArguments {
                    tool: invocation.tool_name,
                    reason,
                });
            }
        }

        tracing::info!(tool = %invocation.tool_name, %arguments, "calling tool");
        self.emit(TurnEvent::ToolInvocationStart {
            tool_call_id: invocation.call_id.clone(),
            tool_name: invocation.tool_name.clone(),
            arguments,
        });

        let output = self.tool.invoke(&invocation).await?;
        tracing::debug!(tool = %invocation.tool_name, %output, "tool result");

        self.emit(TurnEvent::ToolInvocationEnd {
            tool_call_id: invocation.call_id.clone(),
            tool_name: invocation.tool_name.clone(),
        });

        let content = serde_json::to_string(&output)
            .map_err(|e| Error::tool(invocation.tool_name.as_str(), e.to_string()))?;
        Ok(Message::tool_result(
            invocation.call_id,
            invocation.tool_name,
            vec![Content::text(content)],
            false,
        ))
    }

    fn append(&self, conversation: &mut Conversation, message: Message) {
        self.emit(TurnEvent::MessageAppended {
            message: message.clone(),
        });
        conversation.push(message);
    }

    fn emit(&self, event: TurnEvent) {
        let _ = self.event_tx.send(event);
    }
}

fn is_blank(session_id: &str) -> bool {
    session_id.trim().is_empty()
}
