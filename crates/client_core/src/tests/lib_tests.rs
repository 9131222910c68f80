use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use shared::domain::{Phase, WorkerId};
use tokio::sync::Notify;

use super::*;
use crate::fixtures::{board_json_with, coords, snapshot, worker_cell};

#[derive(Debug, Clone, PartialEq)]
enum RecordedCall {
    NewGame,
    SelectGodCard(PlayerId, GodCard),
    PlaceWorker(WorkerId, Coordinate),
    SelectWorker(WorkerId, PlayerId),
    Move(WorkerId, Coordinate),
    Build(WorkerId, Coordinate),
    SkipSecondBuild(WorkerId),
}

impl RecordedCall {
    fn key(&self) -> String {
        match self {
            RecordedCall::SelectGodCard(player, _) => format!("select_god_card:{player}"),
            RecordedCall::NewGame => "new_game".to_string(),
            RecordedCall::PlaceWorker(..) => "place_worker".to_string(),
            RecordedCall::SelectWorker(..) => "select_worker".to_string(),
            RecordedCall::Move(..) => "move".to_string(),
            RecordedCall::Build(..) => "build".to_string(),
            RecordedCall::SkipSecondBuild(..) => "skip_second_build".to_string(),
        }
    }
}

/// Engine double answering from a per-call script.
#[derive(Default)]
struct ScriptedEngine {
    script: Mutex<HashMap<String, VecDeque<Result<SnapshotPayload, EngineError>>>>,
    calls: Mutex<Vec<RecordedCall>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedEngine {
    fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    async fn answer(&self, key: &str, response: Result<SnapshotPayload, EngineError>) {
        self.script
            .lock()
            .await
            .entry(key.to_string())
            .or_default()
            .push_back(response);
    }

    async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    async fn respond(&self, call: RecordedCall) -> Result<SnapshotPayload, EngineError> {
        let key = call.key();
        self.calls.lock().await.push(call);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.script
            .lock()
            .await
            .get_mut(&key)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(EngineError::Transport(format!("no scripted answer for {key}"))))
    }
}

#[async_trait]
impl GameEngine for ScriptedEngine {
    async fn new_game(&self) -> Result<SnapshotPayload, EngineError> {
        self.respond(RecordedCall::NewGame).await
    }

    async fn select_god_card(
        &self,
        request: SelectGodCardRequest,
    ) -> Result<SnapshotPayload, EngineError> {
        self.respond(RecordedCall::SelectGodCard(request.player_id, request.god_card))
            .await
    }

    async fn place_worker(&self, query: WorkerTargetQuery) -> Result<SnapshotPayload, EngineError> {
        let at = query.target();
        self.respond(RecordedCall::PlaceWorker(query.worker_id, at)).await
    }

    async fn select_worker(&self, query: SelectWorkerQuery) -> Result<SnapshotPayload, EngineError> {
        self.respond(RecordedCall::SelectWorker(query.worker_id, query.player_id))
            .await
    }

    async fn move_worker(&self, query: WorkerTargetQuery) -> Result<SnapshotPayload, EngineError> {
        let at = query.target();
        self.respond(RecordedCall::Move(query.worker_id, at)).await
    }

    async fn build(&self, query: WorkerTargetQuery) -> Result<SnapshotPayload, EngineError> {
        let at = query.target();
        self.respond(RecordedCall::Build(query.worker_id, at)).await
    }

    async fn skip_second_build(
        &self,
        request: SkipSecondBuildRequest,
    ) -> Result<SnapshotPayload, EngineError> {
        self.respond(RecordedCall::SkipSecondBuild(request.worker_id))
            .await
    }
}

fn client_with(engine: Arc<ScriptedEngine>) -> Arc<GameClient> {
    GameClient::new(engine)
}

async fn install(client: &GameClient, payload: SnapshotPayload) {
    let snapshot = EngineSnapshot::try_from(payload).expect("snapshot");
    client
        .inner
        .lock()
        .await
        .machine
        .apply_engine_snapshot(&snapshot, Operation::Move)
        .expect("install");
}

#[tokio::test]
async fn new_game_resets_and_enters_initialize() {
    let engine = Arc::new(ScriptedEngine::default());
    engine
        .answer(
            "new_game",
            Ok(snapshot("INITIALIZE", "A", None, board_json_with(&[]))),
        )
        .await;
    let client = client_with(engine.clone());
    install(
        &client,
        snapshot(
            "BUILD",
            "B",
            Some("B1"),
            board_json_with(&[(0, 0, worker_cell("B1", "B", 2))]),
        ),
    )
    .await;

    client.start_new_game().await.expect("new game");

    let view = client.view().await;
    assert_eq!(view.turn.phase, Some(Phase::Initialize));
    assert!(view.turn.current_worker.is_none());
    assert!(view.board.position_of(&WorkerId::new("B1")).is_none());
    assert_eq!(view.god_cards, GodCardSelection::default());
    assert_eq!(engine.calls().await, vec![RecordedCall::NewGame]);
}

#[tokio::test]
async fn failed_new_game_reports_transport_error() {
    let engine = Arc::new(ScriptedEngine::default());
    engine
        .answer(
            "new_game",
            Err(EngineError::Transport("connection refused".into())),
        )
        .await;
    let client = client_with(engine);
    let mut events = client.subscribe_events();

    let error = client.start_new_game().await.expect_err("must fail");

    assert!(error.is_transport());
    let view = client.view().await;
    assert!(view.turn.phase.is_none());
    assert_eq!(view.notice, "Failed to start a new game. Please try again.");
    match events.recv().await.expect("event") {
        ClientEvent::Error(message) => assert_eq!(message, view.notice),
        other => panic!("unexpected event: {other:?}"),
    }
}

async fn client_in_initialize(engine: Arc<ScriptedEngine>) -> Arc<GameClient> {
    engine
        .answer(
            "new_game",
            Ok(snapshot("INITIALIZE", "A", None, board_json_with(&[]))),
        )
        .await;
    let client = client_with(engine);
    client.start_new_game().await.expect("new game");
    client
}

#[tokio::test]
async fn god_cards_are_submitted_for_both_players() {
    let engine = Arc::new(ScriptedEngine::default());
    let client = client_in_initialize(engine.clone()).await;
    engine
        .answer(
            "select_god_card:A",
            Ok(snapshot("INITIALIZE", "A", None, board_json_with(&[]))),
        )
        .await;
    engine
        .answer(
            "select_god_card:B",
            Ok(snapshot("PLACE_WORKER", "A", Some("A1"), board_json_with(&[]))),
        )
        .await;

    client
        .choose_god_card(&PlayerId::new(PLAYER_A), GodCard::Demeter)
        .await
        .expect("A");
    client
        .choose_god_card(&PlayerId::new(PLAYER_B), GodCard::Pan)
        .await
        .expect("B");
    client.confirm_god_cards().await.expect("confirm");

    let view = client.view().await;
    assert_eq!(view.turn.phase, Some(Phase::PlaceWorker));
    assert_eq!(view.turn.current_worker, Some(WorkerId::new("A1")));
    assert_eq!(view.notice, "God cards selected. Please place your workers.");

    let calls = engine.calls().await;
    assert!(calls.contains(&RecordedCall::SelectGodCard(
        PlayerId::new("A"),
        GodCard::Demeter
    )));
    assert!(calls.contains(&RecordedCall::SelectGodCard(
        PlayerId::new("B"),
        GodCard::Pan
    )));

    let frozen = client
        .choose_god_card(&PlayerId::new(PLAYER_A), GodCard::Apollo)
        .await;
    assert!(frozen.is_err());
    assert_eq!(client.view().await.god_cards.a, GodCard::Demeter);
}

#[tokio::test]
async fn god_cards_advance_when_engine_answers_b_before_a() {
    let engine = Arc::new(ScriptedEngine::default());
    let client = client_in_initialize(engine.clone()).await;
    engine
        .answer(
            "select_god_card:A",
            Ok(snapshot("PLACE_WORKER", "A", Some("A1"), board_json_with(&[]))),
        )
        .await;
    engine
        .answer(
            "select_god_card:B",
            Ok(snapshot("INITIALIZE", "A", None, board_json_with(&[]))),
        )
        .await;

    client.confirm_god_cards().await.expect("confirm");

    let view = client.view().await;
    assert_eq!(view.turn.phase, Some(Phase::PlaceWorker));
    assert_eq!(view.turn.current_worker, Some(WorkerId::new("A1")));

    engine
        .answer(
            "place_worker",
            Ok(snapshot(
                "PLACE_WORKER",
                "A",
                Some("A2"),
                board_json_with(&[(0, 0, worker_cell("A1", "A", 0))]),
            )),
        )
        .await;
    let outcome = client.click(Coordinate::new(0, 0)).await.expect("place");
    assert_eq!(outcome, ClickOutcome::Applied(Operation::PlaceWorker));
}

#[tokio::test]
async fn god_cards_leave_initialize_even_if_both_answers_lag() {
    let engine = Arc::new(ScriptedEngine::default());
    let client = client_in_initialize(engine.clone()).await;
    for key in ["select_god_card:A", "select_god_card:B"] {
        engine
            .answer(key, Ok(snapshot("INITIALIZE", "A", None, board_json_with(&[]))))
            .await;
    }

    client.confirm_god_cards().await.expect("confirm");

    let view = client.view().await;
    assert_eq!(view.turn.phase, Some(Phase::PlaceWorker));
    assert_eq!(view.notice, "God cards selected. Please place your workers.");
}

#[tokio::test]
async fn god_card_requests_are_both_in_flight_before_either_answers() {
    let gate = Arc::new(Notify::new());
    let engine = Arc::new(ScriptedEngine::gated(gate.clone()));
    engine
        .answer(
            "new_game",
            Ok(snapshot("INITIALIZE", "A", None, board_json_with(&[]))),
        )
        .await;
    engine
        .answer(
            "select_god_card:A",
            Ok(snapshot("INITIALIZE", "A", None, board_json_with(&[]))),
        )
        .await;
    engine
        .answer(
            "select_god_card:B",
            Ok(snapshot("PLACE_WORKER", "A", Some("A1"), board_json_with(&[]))),
        )
        .await;
    let client = client_with(engine.clone());

    let new_game = {
        let client = client.clone();
        tokio::spawn(async move { client.start_new_game().await })
    };
    for _ in 0..100 {
        if !engine.calls().await.is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    gate.notify_one();
    new_game.await.expect("join").expect("new game");

    let confirm = {
        let client = client.clone();
        tokio::spawn(async move { client.confirm_god_cards().await })
    };
    let mut in_flight = Vec::new();
    for _ in 0..100 {
        in_flight = engine.calls().await;
        if in_flight.len() == 3 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    assert!(!confirm.is_finished());
    assert_eq!(
        &in_flight[1..],
        &[
            RecordedCall::SelectGodCard(PlayerId::new("A"), GodCard::Unassigned),
            RecordedCall::SelectGodCard(PlayerId::new("B"), GodCard::Unassigned),
        ]
    );

    gate.notify_waiters();
    confirm.await.expect("join").expect("confirm");
    assert_eq!(client.view().await.turn.phase, Some(Phase::PlaceWorker));
}

#[tokio::test]
async fn god_card_failures_are_combined_and_keep_initialize() {
    let engine = Arc::new(ScriptedEngine::default());
    let client = client_in_initialize(engine.clone()).await;
    engine
        .answer(
            "select_god_card:A",
            Err(EngineError::Rejected("Player not found".into())),
        )
        .await;
    engine
        .answer(
            "select_god_card:B",
            Err(EngineError::Status {
                status: 500,
                message: "Internal Server Error".into(),
            }),
        )
        .await;

    let error = client.confirm_god_cards().await.expect_err("must fail");

    let ClientError::GodCardSelection(message) = &error else {
        panic!("unexpected error: {error:?}");
    };
    assert!(message.contains("Player not found"), "{message}");
    assert!(message.contains("Internal Server Error"), "{message}");
    assert_eq!(client.view().await.turn.phase, Some(Phase::Initialize));

    engine
        .answer(
            "select_god_card:A",
            Ok(snapshot("INITIALIZE", "A", None, board_json_with(&[]))),
        )
        .await;
    engine
        .answer(
            "select_god_card:B",
            Err(EngineError::Rejected("Error selecting god card: boom".into())),
        )
        .await;
    assert!(client.confirm_god_cards().await.is_err());
    assert_eq!(client.view().await.turn.phase, Some(Phase::Initialize));
}

#[tokio::test]
async fn placement_click_sends_worker_and_keeps_phase_from_snapshot() {
    let engine = Arc::new(ScriptedEngine::default());
    let client = client_with(engine.clone());
    install(
        &client,
        snapshot("PLACE_WORKER", "A", Some("A1"), board_json_with(&[])),
    )
    .await;
    engine
        .answer(
            "place_worker",
            Ok(snapshot(
                "PLACE_WORKER",
                "A",
                Some("A2"),
                board_json_with(&[(0, 0, worker_cell("A1", "A", 0))]),
            )),
        )
        .await;

    let outcome = client.click(Coordinate::new(0, 0)).await.expect("click");

    assert_eq!(outcome, ClickOutcome::Applied(Operation::PlaceWorker));
    assert_eq!(
        engine.calls().await,
        vec![RecordedCall::PlaceWorker(
            WorkerId::new("A1"),
            Coordinate::new(0, 0)
        )]
    );
    let view = client.view().await;
    assert_eq!(view.turn.phase, Some(Phase::PlaceWorker));
    assert_eq!(
        view.board.worker_at(Coordinate::new(0, 0)),
        Some(&WorkerId::new("A1"))
    );
}

#[tokio::test]
async fn move_turn_selects_moves_and_builds() {
    let engine = Arc::new(ScriptedEngine::default());
    let client = client_with(engine.clone());
    let start = board_json_with(&[(3, 3, worker_cell("A1", "A", 0))]);
    install(&client, snapshot("MOVE", "A", None, start.clone())).await;

    let mut selected = snapshot("MOVE", "A", Some("A1"), start);
    selected.possible_moves = Some(coords(&[(3, 4), (2, 3)]));
    engine.answer("select_worker", Ok(selected)).await;

    let mut moved = snapshot(
        "BUILD",
        "A",
        Some("A1"),
        board_json_with(&[(3, 4, worker_cell("A1", "A", 0))]),
    );
    moved.possible_moves = Some(coords(&[(3, 3)]));
    moved.possible_builds = Some(coords(&[(3, 3), (4, 4)]));
    engine.answer("move", Ok(moved)).await;

    engine
        .answer(
            "build",
            Ok(snapshot(
                "MOVE",
                "B",
                None,
                board_json_with(&[(3, 4, worker_cell("A1", "A", 0))]),
            )),
        )
        .await;

    client.click(Coordinate::new(3, 3)).await.expect("select");
    let view = client.view().await;
    assert_eq!(view.turn.current_worker, Some(WorkerId::new("A1")));
    assert_eq!(view.turn.possible_moves.len(), 2);

    client.click(Coordinate::new(3, 4)).await.expect("move");
    assert_eq!(client.view().await.turn.phase, Some(Phase::Build));

    assert_eq!(
        client.click(Coordinate::new(0, 0)).await.expect("noop"),
        ClickOutcome::Ignored
    );
    client.click(Coordinate::new(4, 4)).await.expect("build");

    let view = client.view().await;
    assert_eq!(view.turn.phase, Some(Phase::Move));
    assert_eq!(view.turn.current_player, Some(PlayerId::new("B")));
    assert_eq!(
        engine.calls().await,
        vec![
            RecordedCall::SelectWorker(WorkerId::new("A1"), PlayerId::new("A")),
            RecordedCall::Move(WorkerId::new("A1"), Coordinate::new(3, 4)),
            RecordedCall::Build(WorkerId::new("A1"), Coordinate::new(4, 4)),
        ]
    );
}

#[tokio::test]
async fn selecting_an_opponent_worker_never_reaches_the_engine() {
    let engine = Arc::new(ScriptedEngine::default());
    let client = client_with(engine.clone());
    install(
        &client,
        snapshot(
            "MOVE",
            "B",
            None,
            board_json_with(&[(3, 3, worker_cell("A1", "A", 0))]),
        ),
    )
    .await;

    let error = client
        .click(Coordinate::new(3, 3))
        .await
        .expect_err("not B's worker");

    assert!(matches!(error, ClientError::IllegalSelection(_)));
    assert!(engine.calls().await.is_empty());
    let view = client.view().await;
    assert!(view.notice.contains("Current Player: B"));
    assert_eq!(view.turn.phase, Some(Phase::Move));
}

#[tokio::test]
async fn engine_rejection_leaves_turn_state_untouched() {
    let engine = Arc::new(ScriptedEngine::default());
    let client = client_with(engine.clone());
    let mut building = snapshot(
        "BUILD",
        "A",
        Some("A1"),
        board_json_with(&[(2, 2, worker_cell("A1", "A", 1))]),
    );
    building.possible_moves = Some(coords(&[(1, 1)]));
    building.possible_builds = Some(coords(&[(2, 3)]));
    install(&client, building).await;
    let before = client.view().await;
    engine
        .answer("build", Err(EngineError::Rejected("Invalid build.".into())))
        .await;

    let error = client.click(Coordinate::new(2, 3)).await.expect_err("rejected");

    assert_eq!(error.to_string(), "Invalid build.");
    let after = client.view().await;
    assert_eq!(after.turn, before.turn);
    assert_eq!(after.board, before.board);
    assert_eq!(after.notice, "Invalid build.");
}

#[tokio::test]
async fn skipping_second_build_uses_own_cell() {
    let engine = Arc::new(ScriptedEngine::default());
    let client = client_with(engine.clone());
    let mut second_build = snapshot(
        "SECOND_BUILD",
        "A",
        Some("A1"),
        board_json_with(&[(2, 2, worker_cell("A1", "A", 0))]),
    );
    second_build.possible_moves = Some(coords(&[(1, 1)]));
    second_build.possible_builds = Some(coords(&[(1, 2)]));
    install(&client, second_build).await;
    engine
        .answer(
            "skip_second_build",
            Ok(snapshot(
                "MOVE",
                "B",
                None,
                board_json_with(&[(2, 2, worker_cell("A1", "A", 0))]),
            )),
        )
        .await;

    let outcome = client.click(Coordinate::new(2, 2)).await.expect("skip");

    assert_eq!(outcome, ClickOutcome::Applied(Operation::SkipSecondBuild));
    assert_eq!(
        engine.calls().await,
        vec![RecordedCall::SkipSecondBuild(WorkerId::new("A1"))]
    );
    assert_eq!(
        client.view().await.notice,
        "Second build skipped. It is now the next player's turn."
    );
}

#[tokio::test]
async fn winning_move_ends_the_game() {
    let engine = Arc::new(ScriptedEngine::default());
    let client = client_with(engine.clone());
    install(
        &client,
        snapshot(
            "MOVE",
            "A",
            Some("A1"),
            board_json_with(&[(2, 2, worker_cell("A1", "A", 2))]),
        ),
    )
    .await;
    let mut won = snapshot(
        "BUILD",
        "A",
        Some("A1"),
        board_json_with(&[(2, 3, worker_cell("A1", "A", 3))]),
    );
    won.winner = Some("A".into());
    engine.answer("move", Ok(won)).await;

    client.click(Coordinate::new(2, 3)).await.expect("move");

    let view = client.view().await;
    assert_eq!(view.turn.phase, Some(Phase::End));
    assert!(view.notice.starts_with("Game over. Winner is Player A."));
    assert_eq!(
        client.click(Coordinate::new(2, 2)).await.expect("noop"),
        ClickOutcome::Ignored
    );
}

#[tokio::test]
async fn unknown_phase_is_a_protocol_violation() {
    let engine = Arc::new(ScriptedEngine::default());
    let client = client_with(engine.clone());
    install(
        &client,
        snapshot("PLACE_WORKER", "A", Some("A1"), board_json_with(&[])),
    )
    .await;
    let before = client.view().await;
    engine
        .answer(
            "place_worker",
            Ok(snapshot("TEA_TIME", "A", None, board_json_with(&[]))),
        )
        .await;

    let error = client.click(Coordinate::new(1, 1)).await.expect_err("protocol");

    assert!(error.is_protocol());
    assert_eq!(client.view().await.turn, before.turn);
}

#[tokio::test]
async fn deselect_is_local_and_only_valid_with_a_selection() {
    let engine = Arc::new(ScriptedEngine::default());
    let client = client_with(engine.clone());
    install(
        &client,
        snapshot(
            "MOVE",
            "A",
            None,
            board_json_with(&[(3, 3, worker_cell("A1", "A", 0))]),
        ),
    )
    .await;
    assert!(client.deselect_worker().await.is_err());

    let mut stuck = snapshot(
        "MOVE",
        "A",
        Some("A1"),
        board_json_with(&[(3, 3, worker_cell("A1", "A", 0))]),
    );
    stuck.possible_moves = Some(Vec::new());
    engine.answer("select_worker", Ok(stuck)).await;
    client.click(Coordinate::new(3, 3)).await.expect("select");
    assert!(!client.view().await.turn.worker_available);

    client.deselect_worker().await.expect("deselect");

    let view = client.view().await;
    assert!(view.turn.current_worker.is_none());
    assert!(view.turn.worker_available);
    assert_eq!(engine.calls().await.len(), 1);
}

#[tokio::test]
async fn input_is_dropped_while_a_request_is_in_flight() {
    let gate = Arc::new(Notify::new());
    let engine = Arc::new(ScriptedEngine::gated(gate.clone()));
    let client = client_with(engine.clone());
    install(
        &client,
        snapshot("PLACE_WORKER", "A", Some("A1"), board_json_with(&[])),
    )
    .await;
    engine
        .answer(
            "place_worker",
            Ok(snapshot(
                "PLACE_WORKER",
                "A",
                Some("A2"),
                board_json_with(&[(0, 0, worker_cell("A1", "A", 0))]),
            )),
        )
        .await;

    let first = {
        let client = client.clone();
        tokio::spawn(async move { client.click(Coordinate::new(0, 0)).await })
    };
    for _ in 0..100 {
        if client.inner.lock().await.pending.is_some() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let second = client.click(Coordinate::new(1, 1)).await;
    assert_eq!(
        second,
        Err(ClientError::RequestPending {
            operation: Operation::PlaceWorker
        })
    );
    assert!(client.start_new_game().await.is_err());

    gate.notify_one();
    let outcome = first.await.expect("join").expect("first click");
    assert_eq!(outcome, ClickOutcome::Applied(Operation::PlaceWorker));
    assert_eq!(engine.calls().await.len(), 1);
    assert_eq!(
        client.view().await.turn.current_worker,
        Some(WorkerId::new("A2"))
    );
}
