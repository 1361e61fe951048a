//! Run Conversation use case
//!
//! Owns the whole lifecycle of one conversation: attach renderers and the
//! supervisor, spawn one agent per identity, announce the participants, wait
//! for cancellation and then shut everything down in order.

use super::agent::{Agent, AgentDeps, AgentHandle};
use crate::config::ConversationParams;
use crate::coordination::bus::Bus;
use crate::coordination::supervisor::{ShutdownReason, Supervisor};
use crate::coordination::turn::{TurnArbiter, TurnProvider};
use crate::ports::generation::GenerationBackend;
use crate::ports::relationship_store::{NoRelationshipStore, RelationshipStore};
use crate::ports::renderer::Renderer;
use parlor_domain::{Identity, Message, Topic};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors that can occur while running a conversation
#[derive(Error, Debug)]
pub enum RunConversationError {
    #[error("No participants selected")]
    NoParticipants,

    #[error("Persona '{0}' is seated more than once")]
    DuplicateParticipant(String),
}

/// Input for the RunConversation use case
#[derive(Debug, Clone)]
pub struct RunConversationInput {
    pub identities: Vec<Identity>,
    pub topics: Vec<Topic>,
    pub params: ConversationParams,
}

impl RunConversationInput {
    pub fn new(identities: Vec<Identity>, topics: Vec<Topic>) -> Self {
        Self {
            identities,
            topics,
            params: ConversationParams::default(),
        }
    }

    pub fn with_params(mut self, params: ConversationParams) -> Self {
        self.params = params;
        self
    }
}

/// Result of a finished conversation
#[derive(Debug)]
pub struct RunConversationOutput {
    /// Final participant state, relationships included
    pub identities: Vec<Identity>,
    /// Turns counted by the supervisor
    pub turns: u32,
    /// Deliveries discarded on full subscriber queues
    pub dropped: u64,
    /// None when the run was cancelled from outside
    pub reason: Option<ShutdownReason>,
}

/// Use case for running one multi-agent conversation
pub struct RunConversationUseCase<G: GenerationBackend + ?Sized + 'static> {
    backend: Arc<G>,
    renderers: Vec<Arc<dyn Renderer>>,
    store: Arc<dyn RelationshipStore>,
}

impl<G: GenerationBackend + ?Sized + 'static> RunConversationUseCase<G> {
    pub fn new(backend: Arc<G>) -> Self {
        Self {
            backend,
            renderers: Vec::new(),
            store: Arc::new(NoRelationshipStore),
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderers.push(renderer);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn RelationshipStore>) -> Self {
        self.store = store;
        self
    }

    /// Run until `shutdown` is cancelled, either by the supervisor or by the
    /// caller.
    pub async fn execute(
        &self,
        input: RunConversationInput,
        shutdown: CancellationToken,
    ) -> Result<RunConversationOutput, RunConversationError> {
        if input.identities.is_empty() {
            return Err(RunConversationError::NoParticipants);
        }
        let mut seated = HashSet::new();
        if let Some(twice) = input
            .identities
            .iter()
            .find(|identity| !seated.insert(identity.persona_id()))
        {
            return Err(RunConversationError::DuplicateParticipant(
                twice.persona_id().to_string(),
            ));
        }

        let RunConversationInput {
            identities,
            topics,
            params,
        } = input;

        info!(
            "Starting conversation with {} participants, up to {} turns",
            identities.len(),
            params.max_turns
        );

        let bus = Arc::new(Bus::with_capacity(params.bus_capacity));
        let reason: Arc<Mutex<Option<ShutdownReason>>> = Arc::new(Mutex::new(None));

        let supervisor = {
            let reason = Arc::clone(&reason);
            let token = shutdown.clone();
            Arc::new(Supervisor::new(params.max_turns, move |why| {
                info!("Shutdown requested: {}", why);
                *reason.lock().unwrap_or_else(|p| p.into_inner()) = Some(why);
                token.cancel();
            }))
        };

        // Consumers subscribe before anything is published.
        let mut consumers: Vec<(&'static str, JoinHandle<()>)> = self
            .renderers
            .iter()
            .map(|renderer| (renderer.name(), Arc::clone(renderer).attach(&bus)))
            .collect();
        consumers.push(("supervisor", supervisor.start(&bus)));

        let announcement = announcement(&identities, &topics);

        let deps = AgentDeps {
            backend: Arc::clone(&self.backend),
            bus: Arc::clone(&bus),
            arbiter: Arc::new(TurnArbiter::new()),
            turns: Arc::clone(&supervisor) as Arc<dyn TurnProvider>,
            topics: Arc::new(topics),
            cancel: shutdown.clone(),
        };

        let (handles, agents): (Vec<AgentHandle>, Vec<JoinHandle<Identity>>) = identities
            .into_iter()
            .map(|identity| Agent::new(identity, deps.clone(), &params).spawn())
            .unzip();

        if let Err(e) = bus.broadcast(announcement) {
            warn!("Announcement not published: {}", e);
        }

        shutdown.cancelled().await;
        info!("Shutting down conversation");

        // (a) no new turns
        for handle in &handles {
            handle.stop();
        }

        // (b) unblock every subscriber
        bus.close();

        // (c) drain consumers, then collect agent state
        for (name, task) in consumers {
            if let Err(e) = task.await {
                warn!("Consumer {} ended abnormally: {}", name, e);
            }
        }

        let mut finished = Vec::with_capacity(agents.len());
        for (handle, task) in handles.iter().zip(agents) {
            match task.await {
                Ok(identity) => finished.push(identity),
                Err(e) => warn!("Agent {} ended abnormally: {}", handle.agent_id(), e),
            }
        }

        // (d) persist and finalize
        for identity in &finished {
            if identity.relationships().is_empty() {
                continue;
            }
            match self.store.save(identity.persona_id(), identity.relationships()) {
                Ok(()) => debug!("Saved relationships for {}", identity.persona_id()),
                Err(e) => warn!("Failed to save relationships: {}", e),
            }
        }

        for renderer in &self.renderers {
            if let Err(e) = renderer.finalize(&finished) {
                warn!("Renderer {} failed to finalize: {}", renderer.name(), e);
            }
        }

        let reason = reason.lock().unwrap_or_else(|p| p.into_inner()).take();
        let output = RunConversationOutput {
            identities: finished,
            turns: supervisor.current_turn(),
            dropped: bus.dropped(),
            reason,
        };

        info!(
            "Conversation finished after {} turns ({} dropped deliveries)",
            output.turns, output.dropped
        );
        Ok(output)
    }
}

/// System message introducing the participants and the lead topic
fn announcement(identities: &[Identity], topics: &[Topic]) -> Message {
    let names: Vec<&str> = identities.iter().map(|i| i.display_name()).collect();
    let message = Message::system(format!(
        "Participants: {} ({} in total)",
        names.join(", "),
        names.len()
    ));

    match topics.first() {
        Some(topic) => message
            .with_meta("topic", topic.title.clone())
            .with_meta("topic_url", topic.source_url.clone()),
        None => message,
    }
}
