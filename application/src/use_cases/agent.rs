//! Conversation agent
//!
//! One agent represents one participant. It runs a single task that selects
//! over three events: a message arriving on its bus subscription, its decision
//! timer firing, and the process-wide cancellation. All of its state (rolling
//! window, last-spoke time, relationship map) is owned by that task, so no
//! other component can read or write it; the outside world only sees what the
//! agent publishes on the bus.

use crate::config::ConversationParams;
use crate::coordination::bus::{Bus, Subscription};
use crate::coordination::turn::{TurnArbiter, TurnError, TurnProvider};
use crate::ports::generation::{GenerateInput, GenerationBackend, UpdateRelationshipInput};
use futures::future::join_all;
use parlor_domain::{Identity, Message, MessageKind, PersonaProfile, RollingWindow, Topic};
use rand::Rng;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Shared collaborators every agent needs
pub struct AgentDeps<G: GenerationBackend + ?Sized> {
    pub backend: Arc<G>,
    pub bus: Arc<Bus>,
    pub arbiter: Arc<TurnArbiter>,
    pub turns: Arc<dyn TurnProvider>,
    pub topics: Arc<Vec<Topic>>,
    /// Process-wide shutdown signal
    pub cancel: CancellationToken,
}

impl<G: GenerationBackend + ?Sized> Clone for AgentDeps<G> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            bus: Arc::clone(&self.bus),
            arbiter: Arc::clone(&self.arbiter),
            turns: Arc::clone(&self.turns),
            topics: Arc::clone(&self.topics),
            cancel: self.cancel.clone(),
        }
    }
}

/// Result of one decision step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TalkOutcome {
    /// The agent was told to stop speaking
    Stopped,
    /// Minimum gap since the last utterance has not elapsed
    TooSoon,
    /// Shutdown won the race for the floor or interrupted generation
    Cancelled,
    /// An utterance was published
    Spoke,
    /// Generation failed and an error message was published
    Failed,
}

/// External control over a running agent
#[derive(Debug, Clone)]
pub struct AgentHandle {
    agent_id: String,
    stopped: Arc<AtomicBool>,
}

impl AgentHandle {
    /// Stop taking new turns. The loop itself ends on cancellation or bus close.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }
}

/// A message as the agent heard it
struct Heard {
    /// Arrival order within this agent
    seq: u64,
    message: Arc<Message>,
}

/// One simulated participant
pub struct Agent<G: GenerationBackend + ?Sized> {
    agent_id: String,
    identity: Identity,
    deps: AgentDeps<G>,
    stopped: Arc<AtomicBool>,
    window: RollingWindow<Heard>,
    /// Number of messages received so far
    received: u64,
    /// Last arrival already run through a relationship refresh when the agent
    /// last spoke
    spoke_through: u64,
    last_spoke: Instant,
    tick_interval: Duration,
}

impl<G: GenerationBackend + ?Sized + 'static> Agent<G> {
    pub fn new(identity: Identity, deps: AgentDeps<G>, params: &ConversationParams) -> Self {
        let agent_id = format!("agent-{}", identity.persona_id());

        // Start as if the minimum gap (plus some jitter) has already passed,
        // so agents are eligible immediately but do not all fire together.
        let now = Instant::now();
        let offset = identity.profile().min_gap() + random_jitter(params.startup_jitter);
        let last_spoke = now.checked_sub(offset).unwrap_or(now);

        Self {
            agent_id,
            identity,
            deps,
            stopped: Arc::new(AtomicBool::new(false)),
            window: RollingWindow::new(params.window_capacity),
            received: 0,
            spoke_through: 0,
            last_spoke,
            tick_interval: params.tick_interval,
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn handle(&self) -> AgentHandle {
        AgentHandle {
            agent_id: self.agent_id.clone(),
            stopped: Arc::clone(&self.stopped),
        }
    }

    /// Subscribe to the bus and run the agent loop on its own task.
    ///
    /// The task yields the identity back, with its final relationships, when
    /// the loop ends.
    pub fn spawn(self) -> (AgentHandle, JoinHandle<Identity>) {
        let subscription = self.deps.bus.subscribe();
        let handle = self.handle();
        info!(agent = %self.agent_id, name = %self.identity.display_name(), "Agent started");
        (handle, tokio::spawn(self.run(subscription)))
    }

    /// Agent loop. Returns when cancelled or when the subscription ends.
    pub async fn run(mut self, mut inbox: Subscription) -> Identity {
        let period = self.tick_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let cancel = self.deps.cancel.clone();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                incoming = inbox.recv() => match incoming {
                    Some(message) => self.receive(message),
                    None => break,
                },
                _ = ticker.tick() => {
                    self.take_turn(Some(&mut inbox)).await;
                }
            }
        }

        debug!(agent = %self.agent_id, "Agent loop finished");
        self.identity
    }

    fn receive(&mut self, message: Arc<Message>) {
        self.received += 1;
        self.window.push(Heard {
            seq: self.received,
            message,
        });
    }

    /// Decision step, run on every timer tick.
    pub async fn try_to_talk(&mut self) -> TalkOutcome {
        self.take_turn(None).await
    }

    /// Decision step. With an inbox, whatever arrived while waiting for the
    /// floor is added to the window before generating, so the reply sees the
    /// line it answers.
    async fn take_turn(&mut self, inbox: Option<&mut Subscription>) -> TalkOutcome {
        if self.stopped.load(Ordering::Acquire) {
            return TalkOutcome::Stopped;
        }

        if self.last_spoke.elapsed() < self.identity.profile().min_gap() {
            return TalkOutcome::TooSoon;
        }

        self.refresh_relationships().await;
        let evaluated_through = self.received;

        let arbiter = Arc::clone(&self.deps.arbiter);
        let floor = match arbiter.acquire(&self.deps.cancel).await {
            Ok(floor) => floor,
            Err(TurnError::Cancelled) => {
                debug!(agent = %self.agent_id, "Turn acquisition cancelled");
                return TalkOutcome::Cancelled;
            }
        };

        if let Some(inbox) = inbox {
            while let Ok(message) = inbox.try_recv() {
                self.receive(message);
            }
        }

        let outcome = self.speak(evaluated_through).await;
        drop(floor);
        outcome
    }

    /// Generate and publish while holding the floor.
    ///
    /// Messages after `evaluated_through` have not been through a relationship
    /// refresh yet and stay eligible for the next one.
    async fn speak(&mut self, evaluated_through: u64) -> TalkOutcome {
        let profile = Arc::clone(self.identity.profile());
        let input = GenerateInput {
            agent_id: self.agent_id.clone(),
            persona: Arc::clone(&profile),
            recent_messages: self.window_snapshot(),
            current_turn: self.deps.turns.current_turn(),
            max_turns: self.deps.turns.max_turns(),
            topics: Arc::clone(&self.deps.topics),
            relationships: self.identity.relationships().clone(),
        };

        let backend = Arc::clone(&self.deps.backend);
        let result = tokio::select! {
            biased;
            _ = self.deps.cancel.cancelled() => {
                debug!(agent = %self.agent_id, "Generation abandoned on shutdown");
                return TalkOutcome::Cancelled;
            }
            result = backend.generate(&input) => result,
        };

        match result {
            Ok(text) => {
                self.last_spoke = Instant::now();
                self.spoke_through = evaluated_through;
                if let Err(e) = self.deps.bus.broadcast(Message::utterance(profile, text)) {
                    debug!(agent = %self.agent_id, "Utterance not published: {}", e);
                }
                TalkOutcome::Spoke
            }
            Err(e) => {
                error!(agent = %self.agent_id, "Generation failed: {}", e);
                let report = Message::error(profile, format!("generation failed: {}", e));
                if let Err(be) = self.deps.bus.broadcast(report) {
                    warn!(agent = %self.agent_id, "Error report not published: {}", be);
                }
                TalkOutcome::Failed
            }
        }
    }

    /// Re-evaluate relationships toward every peer heard since the last
    /// utterance. Peers are evaluated concurrently; results are folded in by
    /// this agent only. Failures are logged and ignored.
    async fn refresh_relationships(&mut self) {
        let since = self.spoke_through;
        let me = self.identity.persona_id().to_string();

        // Latest window position of each peer who spoke since `since`.
        let mut latest: Vec<(Arc<PersonaProfile>, usize)> = Vec::new();
        for (idx, heard) in self.window.iter().enumerate() {
            if heard.seq <= since || heard.message.kind() != MessageKind::Utterance {
                continue;
            }
            let Some(from) = heard.message.from() else {
                continue;
            };
            if from.persona_id == me {
                continue;
            }
            match latest.iter_mut().find(|(p, _)| p.persona_id == from.persona_id) {
                Some(entry) => entry.1 = idx,
                None => latest.push((Arc::clone(from), idx)),
            }
        }

        if latest.is_empty() {
            return;
        }

        let snapshot = self.window_snapshot();
        let inputs: Vec<UpdateRelationshipInput> = latest
            .into_iter()
            .map(|(target, idx)| UpdateRelationshipInput {
                persona: Arc::clone(self.identity.profile()),
                current: self.identity.relationship_with(&target.persona_id),
                target,
                recent_messages: snapshot[..=idx].to_vec(),
            })
            .collect();

        let backend = Arc::clone(&self.deps.backend);
        let updates = join_all(inputs.iter().map(|input| backend.update_relationship(input)));
        let results = tokio::select! {
            biased;
            _ = self.deps.cancel.cancelled() => return,
            results = updates => results,
        };

        for (input, result) in inputs.iter().zip(results) {
            let peer = &input.target.persona_id;
            match result {
                Ok(update) => {
                    debug!(
                        agent = %self.agent_id,
                        peer = %peer,
                        affinity = update.affinity,
                        "Relationship updated"
                    );
                    self.identity.apply_update(peer, update);
                }
                Err(e) => {
                    warn!(agent = %self.agent_id, peer = %peer, "Relationship update failed: {}", e);
                }
            }
        }
    }

    fn window_snapshot(&self) -> Vec<Arc<Message>> {
        self.window.iter().map(|h| Arc::clone(&h.message)).collect()
    }
}

fn random_jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::generation::GenerationError;
    use async_trait::async_trait;
    use parlor_domain::RelationshipUpdate;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    // === Mock implementations ===

    struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<String, GenerationError>>>,
        fail_updates: bool,
        generate_calls: AtomicUsize,
        update_calls: AtomicUsize,
        /// Window texts seen by each `generate` call
        windows: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<Result<String, GenerationError>>) -> Self {
            Self {
                replies: Mutex::new(VecDeque::from(replies)),
                fail_updates: false,
                generate_calls: AtomicUsize::new(0),
                update_calls: AtomicUsize::new(0),
                windows: Mutex::new(Vec::new()),
            }
        }

        fn failing_updates(mut self) -> Self {
            self.fail_updates = true;
            self
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        async fn generate(&self, input: &GenerateInput) -> Result<String, GenerationError> {
            self.generate_calls.fetch_add(1, Ordering::SeqCst);
            self.windows.lock().unwrap().push(
                input
                    .recent_messages
                    .iter()
                    .map(|m| m.text().to_string())
                    .collect(),
            );
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("...".to_string()))
        }

        async fn update_relationship(
            &self,
            input: &UpdateRelationshipInput,
        ) -> Result<RelationshipUpdate, GenerationError> {
            self.update_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_updates {
                return Err(GenerationError::EmptyResponse);
            }
            Ok(RelationshipUpdate {
                affinity: input.current.affinity + 10,
                impression: format!("heard {}", input.target.display_name),
            })
        }
    }

    struct FixedTurns;

    impl TurnProvider for FixedTurns {
        fn current_turn(&self) -> u32 {
            2
        }

        fn max_turns(&self) -> u32 {
            10
        }
    }

    // === Helpers ===

    fn sage(min_gap: u64) -> Identity {
        Identity::new(Arc::new(
            PersonaProfile::new("sage", "Sage").with_min_gap_seconds(min_gap),
        ))
    }

    fn bard() -> Arc<PersonaProfile> {
        Arc::new(PersonaProfile::new("bard", "Bard"))
    }

    fn deps(backend: Arc<ScriptedBackend>) -> AgentDeps<ScriptedBackend> {
        AgentDeps {
            backend,
            bus: Arc::new(Bus::new()),
            arbiter: Arc::new(TurnArbiter::new()),
            turns: Arc::new(FixedTurns),
            topics: Arc::new(vec![]),
            cancel: CancellationToken::new(),
        }
    }

    fn params() -> ConversationParams {
        ConversationParams::default().with_startup_jitter(Duration::ZERO)
    }

    // === Tests ===

    #[tokio::test(start_paused = true)]
    async fn test_min_gap_rate_limits() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok("hello".to_string())]));
        let deps = deps(Arc::clone(&backend));
        let mut observer = deps.bus.subscribe();
        let mut agent = Agent::new(sage(30), deps, &params());

        agent.last_spoke = Instant::now();
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(agent.try_to_talk().await, TalkOutcome::TooSoon);
        assert_eq!(backend.generate_calls.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_secs(21)).await;
        assert_eq!(agent.try_to_talk().await, TalkOutcome::Spoke);
        assert_eq!(backend.generate_calls.load(Ordering::SeqCst), 1);

        let published = observer.recv().await.unwrap();
        assert_eq!(published.kind(), MessageKind::Utterance);
        assert_eq!(published.text(), "hello");
        assert_eq!(published.speaker_id(), Some("sage"));

        // Speaking resets the gap.
        assert_eq!(agent.try_to_talk().await, TalkOutcome::TooSoon);
    }

    #[tokio::test]
    async fn test_new_agent_is_eligible_immediately() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let mut agent = Agent::new(sage(1), deps(backend), &params());
        assert_eq!(agent.try_to_talk().await, TalkOutcome::Spoke);
    }

    #[tokio::test]
    async fn test_window_evicts_oldest() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let mut agent = Agent::new(sage(30), deps(backend), &params());

        for i in 0..11 {
            agent.receive(Arc::new(Message::system(format!("m{}", i))));
        }

        let texts: Vec<String> = agent
            .window_snapshot()
            .iter()
            .map(|m| m.text().to_string())
            .collect();
        let expected: Vec<String> = (1..11).map(|i| format!("m{}", i)).collect();
        assert_eq!(texts, expected);
    }

    #[tokio::test]
    async fn test_generation_failure_publishes_error() {
        let backend = Arc::new(ScriptedBackend::new(vec![Err(GenerationError::Timeout)]));
        let deps = deps(Arc::clone(&backend));
        let mut observer = deps.bus.subscribe();
        let arbiter = Arc::clone(&deps.arbiter);
        let mut agent = Agent::new(sage(30), deps, &params());
        let before = agent.last_spoke;

        assert_eq!(agent.try_to_talk().await, TalkOutcome::Failed);

        let published = observer.recv().await.unwrap();
        assert_eq!(published.kind(), MessageKind::Error);
        assert!(published.text().contains("Timeout"));
        assert_eq!(agent.last_spoke, before);
        assert!(!arbiter.is_held(), "floor released after failure");
    }

    #[tokio::test]
    async fn test_stopped_agent_does_nothing() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let mut agent = Agent::new(sage(0), deps(Arc::clone(&backend)), &params());
        agent.handle().stop();

        assert_eq!(agent.try_to_talk().await, TalkOutcome::Stopped);
        assert_eq!(backend.generate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_agent_abandons_attempt() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let deps = deps(Arc::clone(&backend));
        deps.cancel.cancel();
        let mut agent = Agent::new(sage(0), deps, &params());

        assert_eq!(agent.try_to_talk().await, TalkOutcome::Cancelled);
        assert_eq!(backend.generate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_peer_utterances_update_relationships() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let mut agent = Agent::new(sage(5), deps(Arc::clone(&backend)), &params());
        agent.last_spoke = Instant::now();

        tokio::time::advance(Duration::from_secs(1)).await;
        let me = Arc::clone(agent.identity.profile());
        agent.receive(Arc::new(Message::system("welcome")));
        agent.receive(Arc::new(Message::utterance(bard(), "first")));
        agent.receive(Arc::new(Message::utterance(me, "my own line")));
        agent.receive(Arc::new(Message::utterance(bard(), "second")));

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(agent.try_to_talk().await, TalkOutcome::Spoke);

        // One evaluation per peer, none for self or system messages.
        assert_eq!(backend.update_calls.load(Ordering::SeqCst), 1);
        let rel = &agent.identity().relationships()["bard"];
        assert_eq!(rel.affinity, 10);
        assert_eq!(rel.impression, "heard Bard");
    }

    #[tokio::test(start_paused = true)]
    async fn test_relationship_failure_does_not_abort_turn() {
        let backend = Arc::new(ScriptedBackend::new(vec![]).failing_updates());
        let mut agent = Agent::new(sage(5), deps(Arc::clone(&backend)), &params());
        agent.last_spoke = Instant::now();

        tokio::time::advance(Duration::from_secs(1)).await;
        agent.receive(Arc::new(Message::utterance(bard(), "hi")));
        tokio::time::advance(Duration::from_secs(5)).await;

        assert_eq!(agent.try_to_talk().await, TalkOutcome::Spoke);
        assert_eq!(backend.update_calls.load(Ordering::SeqCst), 1);
        assert!(agent.identity().relationships().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_messages_before_last_utterance_are_not_reevaluated() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let mut agent = Agent::new(sage(5), deps(Arc::clone(&backend)), &params());

        agent.receive(Arc::new(Message::utterance(bard(), "old news")));
        assert_eq!(agent.try_to_talk().await, TalkOutcome::Spoke);
        assert_eq!(backend.update_calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(agent.try_to_talk().await, TalkOutcome::Spoke);
        assert_eq!(backend.update_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_sees_line_queued_while_waiting_for_floor() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let deps = deps(Arc::clone(&backend));
        let mut inbox = deps.bus.subscribe();
        let mut agent = Agent::new(sage(5), deps.clone(), &params());

        deps.bus
            .broadcast(Message::utterance(bard(), "did you hear that?"))
            .unwrap();
        assert_eq!(agent.take_turn(Some(&mut inbox)).await, TalkOutcome::Spoke);

        assert_eq!(
            backend.windows.lock().unwrap()[0],
            vec!["did you hear that?".to_string()]
        );
        // Arrived after the refresh, so it is evaluated on the next turn.
        assert_eq!(backend.update_calls.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(agent.take_turn(Some(&mut inbox)).await, TalkOutcome::Spoke);
        assert_eq!(backend.update_calls.load(Ordering::SeqCst), 1);
        assert_eq!(agent.identity().relationship_with("bard").affinity, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_speaks_and_returns_identity_on_cancel() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok("tick talk".to_string())]));
        let deps = deps(Arc::clone(&backend));
        let bus = Arc::clone(&deps.bus);
        let cancel = deps.cancel.clone();
        let mut observer = bus.subscribe();

        let (handle, task) = Agent::new(sage(60), deps, &params()).spawn();
        assert_eq!(handle.agent_id(), "agent-sage");

        let spoken = observer.recv().await.unwrap();
        assert_eq!(spoken.text(), "tick talk");

        cancel.cancel();
        let identity = task.await.unwrap();
        assert_eq!(identity.persona_id(), "sage");
        assert_eq!(backend.generate_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_loop_ends_when_bus_closes() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let deps = deps(backend);
        let bus = Arc::clone(&deps.bus);
        let (handle, task) = Agent::new(sage(60), deps, &params()).spawn();

        handle.stop();
        bus.close();
        let identity = task.await.unwrap();
        assert_eq!(identity.display_name(), "Sage");
        assert!(handle.is_stopped());
    }
}
