use std::sync::Arc;

use futures::future::join;
use shared::{
    domain::{Coordinate, GodCard, Phase, PlayerId},
    protocol::{
        SelectGodCardRequest, SelectWorkerQuery, SkipSecondBuildRequest, SnapshotPayload,
        WorkerTargetQuery,
    },
};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

pub mod board;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod turn;

pub use board::{Board, MissingBoardData, ParsedBoard};
pub use dispatch::{handle_click, Dispatch, Intent};
pub use engine::{GameEngine, HttpEngine, Operation};
pub use error::{ClientError, EngineError};
pub use turn::{
    EngineSnapshot, GameView, GodCardSelection, TurnMachine, TurnState, PLAYER_A, PLAYER_B,
    WELCOME_NOTICE,
};

use crate::error::RESTART_NOTICE;

#[derive(Debug, Clone)]
pub enum ClientEvent {
    StateChanged(GameView),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// The click means nothing in the current phase.
    Ignored,
    /// The engine accepted the operation and its snapshot is applied.
    Applied(Operation),
}

/// Engine request prepared while the state lock is held.
enum EngineCall {
    PlaceWorker(WorkerTargetQuery),
    SelectWorker(SelectWorkerQuery),
    Move(WorkerTargetQuery),
    Build(WorkerTargetQuery),
    SkipSecondBuild(SkipSecondBuildRequest),
}

impl EngineCall {
    fn operation(&self) -> Operation {
        match self {
            EngineCall::PlaceWorker(_) => Operation::PlaceWorker,
            EngineCall::SelectWorker(_) => Operation::SelectWorker,
            EngineCall::Move(_) => Operation::Move,
            EngineCall::Build(_) => Operation::Build,
            EngineCall::SkipSecondBuild(_) => Operation::SkipSecondBuild,
        }
    }
}

struct ClientState {
    machine: TurnMachine,
    /// Operation awaiting an engine answer. Input arriving meanwhile is dropped.
    pending: Option<Operation>,
}

impl ClientState {
    fn reserve(&mut self, operation: Operation) -> Result<(), ClientError> {
        if let Some(pending) = self.pending {
            let error = ClientError::RequestPending { operation: pending };
            self.machine.advise(error.to_string());
            return Err(error);
        }
        self.pending = Some(operation);
        Ok(())
    }
}

/// Remote sync adapter: turns player input into engine requests and folds the
/// answers back into the turn machine.
pub struct GameClient {
    engine: Arc<dyn GameEngine>,
    inner: Mutex<ClientState>,
    events: broadcast::Sender<ClientEvent>,
}

impl GameClient {
    pub fn new(engine: Arc<dyn GameEngine>) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            engine,
            inner: Mutex::new(ClientState {
                machine: TurnMachine::new(),
                pending: None,
            }),
            events,
        })
    }

    pub fn connect(engine_url: &str) -> Result<Arc<Self>, EngineError> {
        Ok(Self::new(Arc::new(HttpEngine::new(engine_url)?)))
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub async fn view(&self) -> GameView {
        self.inner.lock().await.machine.view()
    }

    pub async fn reset(&self) {
        let mut guard = self.inner.lock().await;
        guard.machine.reset();
        self.publish(&guard.machine, None);
    }

    /// Clears the previous session, then asks the engine for a fresh game.
    pub async fn start_new_game(&self) -> Result<(), ClientError> {
        {
            let mut guard = self.inner.lock().await;
            self.reserve_or_report(&mut guard, Operation::NewGame)?;
            guard.machine.reset();
        }
        let result = self.engine.new_game().await;
        self.settle(Operation::NewGame, result, |machine, snapshot| {
            machine.begin_new_game(snapshot)
        })
        .await?;
        info!("new game started");
        Ok(())
    }

    pub async fn choose_god_card(&self, player: &PlayerId, card: GodCard) -> Result<(), ClientError> {
        let mut guard = self.inner.lock().await;
        let result = guard.machine.choose_god_card(player, card);
        match &result {
            Ok(()) => self.publish(&guard.machine, None),
            Err(error) => {
                guard.machine.record_failure(error);
                self.publish(&guard.machine, Some(error));
            }
        }
        result
    }

    /// Submits both players' god cards concurrently. The phase only moves on
    /// when both submissions succeed; player B's answer is the snapshot used
    /// unless the engine handled it first and A's answer is the later one.
    pub async fn confirm_god_cards(&self) -> Result<(), ClientError> {
        let selection = {
            let mut guard = self.inner.lock().await;
            if let Err(error) = guard.machine.ensure_god_card_phase() {
                guard.machine.record_failure(&error);
                self.publish(&guard.machine, Some(&error));
                return Err(error);
            }
            self.reserve_or_report(&mut guard, Operation::SelectGodCard)?;
            guard.machine.god_cards()
        };
        info!(a = %selection.a, b = %selection.b, "submitting god cards");

        let (first, second) = join(
            self.engine.select_god_card(SelectGodCardRequest {
                player_id: PlayerId::new(PLAYER_A),
                god_card: selection.a,
            }),
            self.engine.select_god_card(SelectGodCardRequest {
                player_id: PlayerId::new(PLAYER_B),
                god_card: selection.b,
            }),
        )
        .await;

        let combined = match (first, second) {
            (Ok(a), Ok(b)) => Ok(settled_god_card_snapshot(a, b)),
            (first, second) => {
                let messages: Vec<String> = [first.err(), second.err()]
                    .into_iter()
                    .flatten()
                    .map(|error| {
                        ClientError::from_engine(Operation::SelectGodCard, error).to_string()
                    })
                    .collect();
                Err(ClientError::GodCardSelection(format!(
                    "Error during god card selection: {}",
                    messages.join(" ")
                )))
            }
        };

        match combined {
            Ok(snapshot) => {
                self.settle(Operation::SelectGodCard, Ok(snapshot), |machine, snapshot| {
                    machine.complete_god_cards(snapshot)
                })
                .await
            }
            Err(error) => {
                let mut guard = self.inner.lock().await;
                guard.pending = None;
                warn!(%error, "god card selection failed");
                guard.machine.record_failure(&error);
                self.publish(&guard.machine, Some(&error));
                Err(error)
            }
        }
    }

    /// Interprets a click on `at` and, when it maps to an operation, runs it
    /// against the engine.
    pub async fn click(&self, at: Coordinate) -> Result<ClickOutcome, ClientError> {
        let call = {
            let mut guard = self.inner.lock().await;
            let dispatch = handle_click(guard.machine.turn(), guard.machine.board(), at);
            let intent = match dispatch {
                Dispatch::Intent(intent) => intent,
                Dispatch::NoOp { advisory: None } => return Ok(ClickOutcome::Ignored),
                Dispatch::NoOp {
                    advisory: Some(advisory),
                } => {
                    let error = ClientError::IllegalSelection(advisory);
                    guard.machine.record_failure(&error);
                    self.publish(&guard.machine, Some(&error));
                    return Err(error);
                }
            };
            let call = match self.prepare_call(&guard.machine, intent) {
                Ok(call) => call,
                Err(error) => {
                    guard.machine.record_failure(&error);
                    self.publish(&guard.machine, Some(&error));
                    return Err(error);
                }
            };
            self.reserve_or_report(&mut guard, call.operation())?;
            call
        };

        let operation = call.operation();
        match call {
            EngineCall::PlaceWorker(query) => {
                let result = self.engine.place_worker(query).await;
                self.settle(operation, result, |machine, snapshot| {
                    machine.apply_engine_snapshot(snapshot, Operation::PlaceWorker)
                })
                .await?
            }
            EngineCall::SelectWorker(query) => {
                let worker = query.worker_id.clone();
                let result = self.engine.select_worker(query).await;
                self.settle(operation, result, |machine, snapshot| {
                    machine.confirm_worker_selection(&worker, snapshot)
                })
                .await?
            }
            EngineCall::Move(query) => {
                let result = self.engine.move_worker(query).await;
                self.settle(operation, result, |machine, snapshot| {
                    machine.apply_engine_snapshot(snapshot, Operation::Move)
                })
                .await?
            }
            EngineCall::Build(query) => {
                let result = self.engine.build(query).await;
                self.settle(operation, result, |machine, snapshot| {
                    machine.apply_engine_snapshot(snapshot, Operation::Build)
                })
                .await?
            }
            EngineCall::SkipSecondBuild(request) => {
                let result = self.engine.skip_second_build(request).await;
                self.settle(operation, result, |machine, snapshot| {
                    machine.apply_engine_snapshot(snapshot, Operation::SkipSecondBuild)?;
                    if snapshot.winner.is_none() {
                        machine.advise("Second build skipped. It is now the next player's turn.");
                    }
                    Ok(())
                })
                .await?
            }
        }
        Ok(ClickOutcome::Applied(operation))
    }

    /// Local undo of a worker selection; the engine is not consulted.
    pub async fn deselect_worker(&self) -> Result<(), ClientError> {
        let mut guard = self.inner.lock().await;
        if let Some(pending) = guard.pending {
            let error = ClientError::RequestPending { operation: pending };
            guard.machine.advise(error.to_string());
            self.publish(&guard.machine, Some(&error));
            return Err(error);
        }
        let result = guard.machine.deselect_worker();
        match &result {
            Ok(()) => self.publish(&guard.machine, None),
            Err(error) => {
                guard.machine.record_failure(error);
                self.publish(&guard.machine, Some(error));
            }
        }
        result
    }

    fn prepare_call(&self, machine: &TurnMachine, intent: Intent) -> Result<EngineCall, ClientError> {
        Ok(match intent {
            Intent::PlaceWorker { worker, at } => {
                EngineCall::PlaceWorker(WorkerTargetQuery::new(worker, at))
            }
            Intent::SelectWorker { worker } => {
                let player_id = machine.check_worker_selectable(&worker)?;
                EngineCall::SelectWorker(SelectWorkerQuery {
                    worker_id: worker,
                    player_id,
                })
            }
            Intent::Move { worker, to } => EngineCall::Move(WorkerTargetQuery::new(worker, to)),
            Intent::Build { worker, at } => EngineCall::Build(WorkerTargetQuery::new(worker, at)),
            Intent::SkipSecondBuild { worker } => {
                EngineCall::SkipSecondBuild(SkipSecondBuildRequest { worker_id: worker })
            }
        })
    }

    fn reserve_or_report(
        &self,
        state: &mut ClientState,
        operation: Operation,
    ) -> Result<(), ClientError> {
        state.reserve(operation).inspect_err(|error| {
            info!(%operation, "dropping input while a request is in flight");
            self.publish(&state.machine, Some(error));
        })
    }

    /// Clears the in-flight marker and folds the engine's answer into the
    /// machine. Failures leave the turn state where it was.
    async fn settle<F>(
        &self,
        operation: Operation,
        result: Result<SnapshotPayload, EngineError>,
        fold: F,
    ) -> Result<(), ClientError>
    where
        F: FnOnce(&mut TurnMachine, &EngineSnapshot) -> Result<(), ClientError>,
    {
        let mut guard = self.inner.lock().await;
        guard.pending = None;

        let outcome = result
            .map_err(|error| ClientError::from_engine(operation, error))
            .and_then(|payload| {
                EngineSnapshot::try_from(payload).map_err(|error| {
                    warn!(%operation, %error, "snapshot with unknown phase");
                    ClientError::Protocol {
                        operation,
                        message: RESTART_NOTICE.to_string(),
                    }
                })
            })
            .and_then(|snapshot| fold(&mut guard.machine, &snapshot));

        match &outcome {
            Ok(()) => self.publish(&guard.machine, None),
            Err(error) => {
                warn!(%operation, %error, "engine operation failed");
                guard.machine.record_failure(error);
                self.publish(&guard.machine, Some(error));
            }
        }
        outcome
    }

    fn publish(&self, machine: &TurnMachine, error: Option<&ClientError>) {
        if let Some(error) = error {
            let _ = self.events.send(ClientEvent::Error(error.to_string()));
        }
        let _ = self.events.send(ClientEvent::StateChanged(machine.view()));
    }
}

/// Picks the snapshot describing the engine after both cards were taken.
fn settled_god_card_snapshot(a: SnapshotPayload, b: SnapshotPayload) -> SnapshotPayload {
    let initializing = |payload: &SnapshotPayload| {
        payload
            .game_phase
            .as_deref()
            .map_or(true, |phase| phase == Phase::Initialize.as_str())
    };
    if initializing(&b) && !initializing(&a) {
        a
    } else {
        b
    }
}

#[cfg(test)]
#[path = "tests/fixtures.rs"]
mod fixtures;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
