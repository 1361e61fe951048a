//! Conversation supervisor
//!
//! Watches the bus, counts turns and ends the conversation when the ceiling
//! is reached or a participant reports a fatal error.

use super::bus::Bus;
use super::turn::TurnProvider;
use parlor_domain::{Message, MessageKind};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Supervisor lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Running,
    /// Terminal: shutdown has been requested
    ShuttingDown,
}

/// Why the supervisor asked for shutdown
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    TurnCeilingReached { turns: u32 },
    FatalError { speaker: Option<String>, text: String },
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownReason::TurnCeilingReached { turns } => {
                write!(f, "reached max turns ({})", turns)
            }
            ShutdownReason::FatalError { speaker, text } => match speaker {
                Some(s) => write!(f, "fatal error from {}: {}", s, text),
                None => write!(f, "fatal error: {}", text),
            },
        }
    }
}

type ShutdownCallback = Box<dyn Fn(ShutdownReason) + Send + Sync>;

struct Counters {
    turn: u32,
    state: SupervisorState,
}

/// Counts turns and triggers the process-wide shutdown exactly once.
pub struct Supervisor {
    max_turns: u32,
    counters: Mutex<Counters>,
    on_shutdown: ShutdownCallback,
}

impl Supervisor {
    /// Create a supervisor that invokes `on_shutdown` when it decides to stop.
    pub fn new(max_turns: u32, on_shutdown: impl Fn(ShutdownReason) + Send + Sync + 'static) -> Self {
        Self {
            max_turns,
            counters: Mutex::new(Counters {
                turn: 0,
                state: SupervisorState::Running,
            }),
            on_shutdown: Box::new(on_shutdown),
        }
    }

    /// Create a supervisor that cancels `token` on shutdown.
    pub fn with_token(max_turns: u32, token: CancellationToken) -> Self {
        Self::new(max_turns, move |_| token.cancel())
    }

    /// Subscribe to `bus` and consume it on a separate task.
    ///
    /// The task ends when the bus closes or once shutdown has been triggered.
    pub fn start(self: &Arc<Self>, bus: &Bus) -> JoinHandle<()> {
        let mut subscription = bus.subscribe();
        let supervisor = Arc::clone(self);

        tokio::spawn(async move {
            while let Some(message) = subscription.recv().await {
                if supervisor.observe(&message) == SupervisorState::ShuttingDown {
                    break;
                }
            }
        })
    }

    /// Account for one observed message and return the resulting state.
    pub fn observe(&self, message: &Message) -> SupervisorState {
        let reason = {
            let mut counters = self
                .counters
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            if counters.state == SupervisorState::ShuttingDown {
                return SupervisorState::ShuttingDown;
            }
            if message.is_system() {
                return SupervisorState::Running;
            }

            counters.turn += 1;
            info!("[Supervisor] Turn {}/{}", counters.turn, self.max_turns);

            let reason = if message.kind() == MessageKind::Error {
                warn!("[Supervisor] Error reported: {}. Shutting down...", message.text());
                ShutdownReason::FatalError {
                    speaker: message.speaker_name().map(str::to_string),
                    text: message.text().to_string(),
                }
            } else if counters.turn >= self.max_turns {
                info!("[Supervisor] Reached max turns. Shutting down...");
                ShutdownReason::TurnCeilingReached {
                    turns: counters.turn,
                }
            } else {
                return SupervisorState::Running;
            };

            counters.state = SupervisorState::ShuttingDown;
            reason
        };

        (self.on_shutdown)(reason);
        SupervisorState::ShuttingDown
    }

    pub fn state(&self) -> SupervisorState {
        self.counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .state
    }
}

impl TurnProvider for Supervisor {
    fn current_turn(&self) -> u32 {
        self.counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .turn
    }

    fn max_turns(&self) -> u32 {
        self.max_turns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlor_domain::PersonaProfile;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn speaker() -> Arc<PersonaProfile> {
        Arc::new(PersonaProfile::new("sage", "Sage"))
    }

    fn counting_supervisor(max_turns: u32) -> (Supervisor, Arc<AtomicUsize>, Arc<Mutex<Vec<ShutdownReason>>>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let reasons = Arc::new(Mutex::new(Vec::new()));
        let sup = {
            let fired = Arc::clone(&fired);
            let reasons = Arc::clone(&reasons);
            Supervisor::new(max_turns, move |reason| {
                fired.fetch_add(1, Ordering::SeqCst);
                reasons.lock().unwrap().push(reason);
            })
        };
        (sup, fired, reasons)
    }

    #[test]
    fn test_ceiling_fires_exactly_once() {
        let (sup, fired, reasons) = counting_supervisor(3);

        for i in 1..=5 {
            let state = sup.observe(&Message::utterance(speaker(), format!("line {}", i)));
            if i < 3 {
                assert_eq!(state, SupervisorState::Running);
                assert_eq!(fired.load(Ordering::SeqCst), 0);
            } else {
                assert_eq!(state, SupervisorState::ShuttingDown);
                assert_eq!(fired.load(Ordering::SeqCst), 1);
            }
        }

        assert_eq!(sup.current_turn(), 3);
        assert_eq!(
            reasons.lock().unwrap().as_slice(),
            &[ShutdownReason::TurnCeilingReached { turns: 3 }]
        );
    }

    #[test]
    fn test_system_messages_never_count() {
        let (sup, fired, _) = counting_supervisor(1);
        for _ in 0..5 {
            assert_eq!(sup.observe(&Message::system("announce")), SupervisorState::Running);
        }
        assert_eq!(sup.current_turn(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_error_escalates_regardless_of_count() {
        let (sup, fired, reasons) = counting_supervisor(20);
        sup.observe(&Message::utterance(speaker(), "hello"));
        let state = sup.observe(&Message::error(speaker(), "backend down"));

        assert_eq!(state, SupervisorState::ShuttingDown);
        assert_eq!(sup.state(), SupervisorState::ShuttingDown);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(
            reasons.lock().unwrap()[0],
            ShutdownReason::FatalError {
                speaker: Some("Sage".to_string()),
                text: "backend down".to_string()
            }
        );
    }

    #[test]
    fn test_max_turns_is_fixed() {
        let (sup, _, _) = counting_supervisor(7);
        sup.observe(&Message::utterance(speaker(), "a"));
        assert_eq!(sup.max_turns(), 7);
        assert_eq!(sup.current_turn(), 1);
    }

    #[tokio::test]
    async fn test_start_cancels_token_at_ceiling() {
        let bus = Bus::new();
        let token = CancellationToken::new();
        let sup = Arc::new(Supervisor::with_token(3, token.clone()));
        let handle = sup.start(&bus);

        bus.broadcast(Message::system("welcome")).unwrap();
        for i in 0..5 {
            bus.broadcast(Message::utterance(speaker(), format!("{}", i))).unwrap();
        }

        token.cancelled().await;
        handle.await.unwrap();
        assert_eq!(sup.current_turn(), 3);
        assert_eq!(sup.state(), SupervisorState::ShuttingDown);
    }

    #[tokio::test]
    async fn test_start_ends_when_bus_closes() {
        let bus = Bus::new();
        let token = CancellationToken::new();
        let sup = Arc::new(Supervisor::with_token(10, token.clone()));
        let handle = sup.start(&bus);

        bus.broadcast(Message::utterance(speaker(), "only one")).unwrap();
        bus.close();
        handle.await.unwrap();

        assert!(!token.is_cancelled());
        assert_eq!(sup.current_turn(), 1);
    }
}
