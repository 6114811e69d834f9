//! Client session: the single task owning the [`GameStateStore`].
//!
//! User requests, push messages, network results and the auto-save deadline are all
//! consumed by one `select!` loop, so the store is only ever touched one message at a time.

use std::{collections::VecDeque, path::PathBuf, sync::Arc, time::Duration};

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot, watch},
    time::{Instant, sleep_until},
};
use tracing::{debug, info, warn};

use crate::{
    dao::gateway::{
        GatewayError, ParseError, PersistenceError, SaveGateway, download_game,
        load_game_from_file,
    },
    dto::{game_state::GameState, save::SaveRecord},
    services::push_client::PushMessage,
    state::{
        autosave::{AutoSaveMachine, AutoSavePhase},
        board::Board,
        store::{GameStateStore, Outcome, StoreFlags, ValidationError},
    },
};

const REQUEST_QUEUE: usize = 32;
/// Number of uploaded snapshots remembered to recognise their echo on the push channel.
const SENT_MEMORY: usize = 4;

/// Failures returned to the caller of a session request.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The store rejected the edit.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The save API or a game file could not be reached.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    /// A save or a game file is malformed.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The session task is gone.
    #[error("game session stopped")]
    Closed,
}

impl From<GatewayError> for SessionError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Persistence(err) => SessionError::Persistence(err),
            GatewayError::Parse(err) => SessionError::Parse(err),
        }
    }
}

/// Local edits a user can make to the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Draw fresh grids for the given player count, or the current one.
    GenerateNewGrids(Option<usize>),
    /// Append a player.
    AddPlayer,
    /// Remove the player at this position.
    RemovePlayer(usize),
    /// Rename a player.
    RenamePlayer {
        /// Player position.
        index: usize,
        /// New display name.
        name: String,
    },
    /// Mark a cell as happened.
    ValidateItem {
        /// Player position.
        player: usize,
        /// Cell index in the player's grid.
        item: usize,
        /// What happened.
        description: String,
    },
    /// Clear a cell.
    RemoveValidation {
        /// Player position.
        player: usize,
        /// Cell index in the player's grid.
        item: usize,
    },
    /// Add a proposition with this text.
    AddProposition(String),
    /// Remove the proposition with this id.
    RemoveProposition(String),
}

/// State of the push connection as last reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelStatus {
    /// First connection attempt pending.
    #[default]
    Connecting,
    /// Socket open.
    Online,
    /// Socket lost, backing off before the next attempt.
    Reconnecting,
    /// No push channel, or retries exhausted.
    Offline,
}

/// Read-only picture of the session published after every processed message.
#[derive(Debug, Clone)]
pub struct SessionView {
    /// Current board snapshot.
    pub board: Arc<Board>,
    /// Reconciliation flags of the store.
    pub flags: StoreFlags,
    /// Latest count announced by the push channel.
    pub connected_users: Option<u32>,
    /// Push connection state.
    pub channel: ChannelStatus,
    /// Auto-save scheduler phase.
    pub autosave: AutoSavePhase,
}

/// Tunables of the session loop.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Quiet period before an auto-save fires.
    pub autosave_delay: Duration,
    /// Directory receiving exported game files.
    pub export_dir: PathBuf,
}

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

enum Request {
    Edit(Intent, Reply<Outcome>),
    Save(Reply<()>),
    Download(Reply<PathBuf>),
    LoadFile(PathBuf, Reply<Outcome>),
    LoadSave(GameState, Reply<Outcome>),
    ListSaves(Reply<Vec<SaveRecord>>),
    CancelChanges(Reply<Outcome>),
    Bootstrap(Reply<Outcome>),
}

/// Results of spawned network or file work, fed back into the loop.
enum Completion {
    AutoSaved {
        snapshot: Arc<Board>,
        result: Result<(), PersistenceError>,
    },
    ManualSaved {
        snapshot: Arc<Board>,
        result: Result<(), PersistenceError>,
        reply: Reply<()>,
    },
    Loaded {
        result: Result<GameState, GatewayError>,
        reply: Reply<Outcome>,
    },
    LastGame {
        result: Result<Option<GameState>, GatewayError>,
        reply: Reply<Outcome>,
    },
}

/// Cloneable front door of a running [`GameSession`].
#[derive(Clone)]
pub struct SessionHandle {
    requests: mpsc::Sender<Request>,
    view: watch::Receiver<SessionView>,
}

impl SessionHandle {
    async fn call<T>(&self, build: impl FnOnce(Reply<T>) -> Request) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(build(reply))
            .await
            .map_err(|_| SessionError::Closed)?;
        response.await.map_err(|_| SessionError::Closed)?
    }

    /// Apply a local edit.
    pub async fn edit(&self, intent: Intent) -> Result<Outcome, SessionError> {
        self.call(|reply| Request::Edit(intent, reply)).await
    }

    /// Upload the current board and lift the loaded-game guards on success.
    pub async fn save(&self) -> Result<(), SessionError> {
        self.call(Request::Save).await
    }

    /// Export the current board into the configured directory.
    pub async fn download(&self) -> Result<PathBuf, SessionError> {
        self.call(Request::Download).await
    }

    /// Import a game file, after confirmation when local changes are unsaved.
    pub async fn load_file(&self, path: impl Into<PathBuf>) -> Result<Outcome, SessionError> {
        let path = path.into();
        self.call(|reply| Request::LoadFile(path, reply)).await
    }

    /// Load a save picked from the history.
    pub async fn load_save(&self, state: GameState) -> Result<Outcome, SessionError> {
        self.call(|reply| Request::LoadSave(state, reply)).await
    }

    /// Fetch the save history from the server.
    pub async fn list_saves(&self) -> Result<Vec<SaveRecord>, SessionError> {
        self.call(Request::ListSaves).await
    }

    /// Throw local edits away (after confirmation) and reload the last save.
    pub async fn cancel_changes(&self) -> Result<Outcome, SessionError> {
        self.call(Request::CancelChanges).await
    }

    /// Load the last save, or start fresh grids when there is none.
    pub async fn bootstrap(&self) -> Result<Outcome, SessionError> {
        self.call(Request::Bootstrap).await
    }

    /// Latest published view.
    pub fn current(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Subscribe to view updates.
    pub fn watch(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }
}

/// Session loop owning the store, the auto-save scheduler and the channel receivers.
pub struct GameSession {
    store: GameStateStore,
    autosave: AutoSaveMachine,
    gateway: Arc<dyn SaveGateway>,
    settings: SessionSettings,
    requests: mpsc::Receiver<Request>,
    push: Option<mpsc::Receiver<PushMessage>>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
    view: watch::Sender<SessionView>,
    connected_users: Option<u32>,
    channel: ChannelStatus,
    /// Snapshots this session uploaded, newest last.
    sent: VecDeque<GameState>,
}

impl GameSession {
    /// Build a session and the handle used to drive it. Call [`GameSession::run`] to start it.
    pub fn new(
        store: GameStateStore,
        gateway: Arc<dyn SaveGateway>,
        settings: SessionSettings,
        push: Option<mpsc::Receiver<PushMessage>>,
    ) -> (Self, SessionHandle) {
        let (requests_tx, requests) = mpsc::channel(REQUEST_QUEUE);
        let (completions_tx, completions) = mpsc::unbounded_channel();
        let autosave = AutoSaveMachine::new(settings.autosave_delay);
        let channel = if push.is_some() {
            ChannelStatus::Connecting
        } else {
            ChannelStatus::Offline
        };
        let (view, view_rx) = watch::channel(SessionView {
            board: store.snapshot(),
            flags: store.flags(),
            connected_users: None,
            channel,
            autosave: autosave.phase(),
        });

        let session = Self {
            store,
            autosave,
            gateway,
            settings,
            requests,
            push,
            completions_tx,
            completions,
            view,
            connected_users: None,
            channel,
            sent: VecDeque::with_capacity(SENT_MEMORY),
        };
        let handle = SessionHandle {
            requests: requests_tx,
            view: view_rx,
        };
        (session, handle)
    }

    /// Process messages until every [`SessionHandle`] is dropped.
    pub async fn run(mut self) {
        loop {
            let deadline = self.autosave.deadline();

            tokio::select! {
                request = self.requests.recv() => match request {
                    Some(request) => self.handle_request(request),
                    None => break,
                },
                message = next_push(&mut self.push) => match message {
                    Some(message) => self.handle_push(message),
                    None => self.push = None,
                },
                Some(completion) = self.completions.recv() => self.handle_completion(completion),
                _ = wait_for(deadline) => self.fire_autosave(),
            }

            self.publish();
        }
        debug!("game session stopped");
    }

    fn handle_request(&mut self, request: Request) {
        match request {
            Request::Edit(intent, reply) => {
                let result = self.apply_intent(intent);
                if let Ok(outcome) = result {
                    self.after_change(outcome);
                }
                let _ = reply.send(result.map_err(SessionError::from));
            }
            Request::Save(reply) => {
                let snapshot = self.store.snapshot();
                let save = self.upload(&snapshot);
                let completions = self.completions_tx.clone();
                tokio::spawn(async move {
                    let result = save.await;
                    let _ = completions.send(Completion::ManualSaved {
                        snapshot,
                        result,
                        reply,
                    });
                });
            }
            Request::Download(reply) => {
                let state = self.store.game_state();
                let dir = self.settings.export_dir.clone();
                tokio::spawn(async move {
                    let result = download_game(&state, &dir).await;
                    let _ = reply.send(result.map_err(SessionError::from));
                });
            }
            Request::LoadFile(path, reply) => {
                let completions = self.completions_tx.clone();
                tokio::spawn(async move {
                    let result = load_game_from_file(&path).await;
                    let _ = completions.send(Completion::Loaded { result, reply });
                });
            }
            Request::LoadSave(state, reply) => {
                let outcome = self.store.load_game_state(state, true);
                self.after_change(outcome);
                let _ = reply.send(Ok(outcome));
            }
            Request::ListSaves(reply) => {
                let list = self.gateway.list_saves();
                tokio::spawn(async move {
                    let _ = reply.send(list.await.map_err(SessionError::from));
                });
            }
            Request::CancelChanges(reply) => {
                if !self.store.confirm_unsaved_changes() {
                    let _ = reply.send(Ok(Outcome::Declined));
                    return;
                }
                self.store.discard_unsaved_changes();
                self.fetch_last_game(reply);
            }
            Request::Bootstrap(reply) => self.fetch_last_game(reply),
        }
    }

    fn apply_intent(&mut self, intent: Intent) -> Result<Outcome, ValidationError> {
        let store = &mut self.store;
        match intent {
            Intent::GenerateNewGrids(count) => Ok(store.generate_new_grids(count)),
            Intent::AddPlayer => Ok(store.add_player()),
            Intent::RemovePlayer(index) => store.remove_player(index),
            Intent::RenamePlayer { index, name } => store.update_player_name(index, name),
            Intent::ValidateItem {
                player,
                item,
                description,
            } => store.validate_item(player, item, &description),
            Intent::RemoveValidation { player, item } => store.remove_validation(player, item),
            Intent::AddProposition(text) => store.add_proposition(&text),
            Intent::RemoveProposition(id) => Ok(store.remove_proposition(&id)),
        }
    }

    fn fetch_last_game(&self, reply: Reply<Outcome>) {
        let fetch = self.gateway.load_last_game();
        let completions = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = fetch.await;
            let _ = completions.send(Completion::LastGame { result, reply });
        });
    }

    fn handle_push(&mut self, message: PushMessage) {
        match message {
            PushMessage::Connected => self.channel = ChannelStatus::Online,
            PushMessage::ConnectedUsers(count) => self.connected_users = Some(count),
            PushMessage::NewChanges(state) if self.sent.contains(&state) => {
                debug!("ignoring the echo of a snapshot uploaded by this session");
            }
            PushMessage::NewChanges(state) => {
                let outcome = self.store.apply_remote(state);
                if outcome.is_applied() {
                    info!("applied game state pushed by the server");
                }
                self.after_change(outcome);
            }
            PushMessage::Disconnected => self.channel = ChannelStatus::Reconnecting,
            PushMessage::Offline => {
                self.channel = ChannelStatus::Offline;
                self.connected_users = None;
            }
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::AutoSaved { snapshot, result } => {
                if let Err(err) = &result {
                    warn!(error = %err, "auto-save failed");
                }
                match self.autosave.on_save_complete(result.is_ok()) {
                    Ok(done) => {
                        if done.clear_dirty && Arc::ptr_eq(&snapshot, &self.store.snapshot()) {
                            self.store.mark_autosaved();
                        }
                    }
                    Err(err) => warn!(error = %err, "unexpected auto-save completion"),
                }
                self.after_change(Outcome::Unchanged);
            }
            Completion::ManualSaved {
                snapshot,
                result,
                reply,
            } => {
                if result.is_ok() {
                    self.store.mark_saved(&snapshot);
                    info!("game saved");
                    // Edits made while the save was in flight are now auto-save material.
                    let outcome = if self.store.flags().is_dirty {
                        Outcome::Applied
                    } else {
                        Outcome::Unchanged
                    };
                    self.after_change(outcome);
                }
                let _ = reply.send(result.map_err(SessionError::from));
            }
            Completion::Loaded { result, reply } => {
                let result = result
                    .map(|state| self.store.load_game_state(state, true))
                    .map_err(SessionError::from);
                if let Ok(outcome) = result {
                    self.after_change(outcome);
                }
                let _ = reply.send(result);
            }
            Completion::LastGame { result, reply } => {
                let outcome = match result {
                    Ok(Some(state)) => self.store.load_game_state(state, false),
                    Ok(None) => {
                        info!("no previous save, generating fresh grids");
                        self.store.generate_new_grids(None)
                    }
                    Err(err) => {
                        warn!(error = %err, "failed to fetch last save, generating fresh grids");
                        self.store.generate_new_grids(None)
                    }
                };
                self.after_change(outcome);
                let _ = reply.send(Ok(outcome));
            }
        }
    }

    /// Keep the auto-save schedule in line with the store, then publish the view so
    /// callers see their change as soon as they get a reply.
    fn after_change(&mut self, outcome: Outcome) {
        if !self.store.autosave_eligible() {
            self.autosave.cancel();
        } else if outcome.is_applied() {
            self.autosave.on_mutation(Instant::now());
        }
        self.publish();
    }

    fn fire_autosave(&mut self) {
        if !self.autosave.on_timer(Instant::now()) {
            return;
        }

        let snapshot = self.store.snapshot();
        let save = self.upload(&snapshot);
        let completions = self.completions_tx.clone();
        debug!(players = snapshot.players.len(), "auto-saving");
        tokio::spawn(async move {
            let result = save.await;
            let _ = completions.send(Completion::AutoSaved { snapshot, result });
        });
    }

    /// Start uploading `snapshot`, remembering it so its echo is not taken for a remote edit.
    fn upload(&mut self, snapshot: &Board) -> BoxFuture<'static, Result<(), PersistenceError>> {
        let state = snapshot.to_game_state();
        if self.sent.len() == SENT_MEMORY {
            self.sent.pop_front();
        }
        self.sent.push_back(state.clone());
        self.gateway.save_game(state)
    }

    fn publish(&self) {
        self.view.send_replace(SessionView {
            board: self.store.snapshot(),
            flags: self.store.flags(),
            connected_users: self.connected_users,
            channel: self.channel,
            autosave: self.autosave.phase(),
        });
    }
}

async fn next_push(push: &mut Option<mpsc::Receiver<PushMessage>>) -> Option<PushMessage> {
    match push {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{
        dto::game_state::{Proposition, SavedPlayer},
        state::store::{AlwaysDiscard, ConfirmDiscard, NeverDiscard, StoreLimits},
    };

    const DELAY: Duration = Duration::from_millis(1_000);

    #[derive(Default)]
    struct FakeGateway {
        saved: Mutex<Vec<(Instant, GameState)>>,
        last: Mutex<Option<GameState>>,
        /// Holds the next upload until the sender fires.
        gate: Mutex<Option<oneshot::Receiver<()>>>,
    }

    impl FakeGateway {
        fn saves(&self) -> Vec<(Instant, GameState)> {
            self.saved.lock().unwrap().clone()
        }

        fn hold_next_save(&self) -> oneshot::Sender<()> {
            let (release, gate) = oneshot::channel();
            *self.gate.lock().unwrap() = Some(gate);
            release
        }
    }

    impl SaveGateway for Arc<FakeGateway> {
        fn save_game(&self, state: GameState) -> BoxFuture<'static, Result<(), PersistenceError>> {
            let gateway = Arc::clone(self);
            let gate = self.gate.lock().unwrap().take();
            Box::pin(async move {
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                gateway.saved.lock().unwrap().push((Instant::now(), state));
                Ok(())
            })
        }

        fn list_saves(&self) -> BoxFuture<'static, Result<Vec<SaveRecord>, GatewayError>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn load_last_game(&self) -> BoxFuture<'static, Result<Option<GameState>, GatewayError>> {
            let last = self.last.lock().unwrap().clone();
            Box::pin(async move { Ok(last) })
        }
    }

    fn propositions() -> Vec<Proposition> {
        (1..=20)
            .map(|i| Proposition {
                id: format!("p{i}"),
                text: format!("statement {i}"),
            })
            .collect()
    }

    fn remote_state(name: &str) -> GameState {
        GameState {
            players: vec![SavedPlayer {
                id: "remote".into(),
                name: name.into(),
                grid: (1..=6).map(|i| format!("p{i}")).collect(),
                validated_items: Vec::new(),
            }],
            propositions: propositions(),
        }
    }

    struct Harness {
        handle: SessionHandle,
        gateway: Arc<FakeGateway>,
        push: mpsc::Sender<PushMessage>,
        export_dir: tempfile::TempDir,
    }

    fn start(confirm: Arc<dyn ConfirmDiscard>) -> Harness {
        let gateway = Arc::new(FakeGateway::default());
        let export_dir = tempfile::tempdir().unwrap();
        let store = GameStateStore::new(propositions(), StoreLimits::default(), confirm);
        let (push, push_rx) = mpsc::channel(8);
        let (session, handle) = GameSession::new(
            store,
            Arc::new(Arc::clone(&gateway)),
            SessionSettings {
                autosave_delay: DELAY,
                export_dir: export_dir.path().to_path_buf(),
            },
            Some(push_rx),
        );
        tokio::spawn(session.run());
        Harness {
            handle,
            gateway,
            push,
            export_dir,
        }
    }

    // Lets the session drain its queues; with a paused clock this only returns once it is idle.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_produce_a_single_debounced_save() {
        let h = start(Arc::new(NeverDiscard));

        h.handle
            .edit(Intent::GenerateNewGrids(Some(3)))
            .await
            .unwrap();
        let mut last_edit = Instant::now();
        for name in ["Ana", "Ben", "Chloé", "Dan"] {
            tokio::time::sleep(Duration::from_millis(100)).await;
            h.handle
                .edit(Intent::RenamePlayer {
                    index: 0,
                    name: name.into(),
                })
                .await
                .unwrap();
            last_edit = Instant::now();
        }

        tokio::time::sleep_until(last_edit + DELAY - Duration::from_millis(5)).await;
        assert!(h.gateway.saves().is_empty());

        tokio::time::sleep_until(last_edit + DELAY + Duration::from_millis(5)).await;
        let saves = h.gateway.saves();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].0, last_edit + DELAY);
        assert_eq!(saves[0].1.players.len(), 3);
        assert_eq!(saves[0].1.players[0].name, "Dan");

        settle().await;
        let view = h.handle.current();
        assert!(!view.flags.is_dirty);
        assert_eq!(view.autosave, AutoSavePhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn pushes_are_dropped_while_local_changes_are_unsaved() {
        let h = start(Arc::new(NeverDiscard));
        h.handle.load_save(remote_state("Ana")).await.unwrap();
        h.handle.edit(Intent::AddPlayer).await.unwrap();
        let before = h.handle.current();
        assert!(before.flags.has_unsaved_changes);

        h.push
            .send(PushMessage::NewChanges(remote_state("Zoé")))
            .await
            .unwrap();
        settle().await;

        let after = h.handle.current();
        assert!(Arc::ptr_eq(&before.board, &after.board));
        assert_eq!(after.board.players.len(), 2);

        tokio::time::sleep(DELAY * 3).await;
        assert!(h.gateway.saves().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn pushes_replace_a_clean_board_without_saving() {
        let h = start(Arc::new(NeverDiscard));
        h.push.send(PushMessage::Connected).await.unwrap();
        h.push.send(PushMessage::ConnectedUsers(3)).await.unwrap();
        h.push
            .send(PushMessage::NewChanges(remote_state("Zoé")))
            .await
            .unwrap();
        settle().await;

        let view = h.handle.current();
        assert_eq!(view.channel, ChannelStatus::Online);
        assert_eq!(view.connected_users, Some(3));
        assert_eq!(view.board.players[0].name, "Zoé");
        assert!(view.flags.is_loaded_game);
        assert!(!view.flags.is_dirty);

        h.push.send(PushMessage::Offline).await.unwrap();
        tokio::time::sleep(DELAY * 2).await;
        assert!(h.gateway.saves().is_empty());
        assert_eq!(h.handle.current().channel, ChannelStatus::Offline);
        assert_eq!(h.handle.current().connected_users, None);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_save_lifts_the_loaded_guards() {
        let h = start(Arc::new(NeverDiscard));
        h.handle.load_save(remote_state("Ana")).await.unwrap();
        h.handle
            .edit(Intent::RenamePlayer {
                index: 0,
                name: "Anna".into(),
            })
            .await
            .unwrap();

        h.handle.save().await.unwrap();
        settle().await;

        assert_eq!(h.handle.current().flags, StoreFlags::default());
        let saves = h.gateway.saves();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].1.players[0].name, "Anna");
    }

    #[tokio::test(start_paused = true)]
    async fn bootstrap_loads_the_last_save_or_generates() {
        let h = start(Arc::new(NeverDiscard));
        assert_eq!(h.handle.bootstrap().await.unwrap(), Outcome::Applied);
        let view = h.handle.current();
        assert_eq!(view.board.players.len(), 6);
        assert!(view.flags.is_dirty);

        let h = start(Arc::new(NeverDiscard));
        *h.gateway.last.lock().unwrap() = Some(remote_state("Ana"));
        h.handle.bootstrap().await.unwrap();
        let view = h.handle.current();
        assert_eq!(view.board.players[0].name, "Ana");
        assert!(view.flags.is_loaded_game);
        assert!(!view.flags.is_dirty);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_changes_asks_before_reloading() {
        let refusing = start(Arc::new(NeverDiscard));
        refusing.handle.load_save(remote_state("Ana")).await.unwrap();
        refusing.handle.edit(Intent::AddPlayer).await.unwrap();
        assert_eq!(
            refusing.handle.cancel_changes().await.unwrap(),
            Outcome::Declined
        );
        assert_eq!(refusing.handle.current().board.players.len(), 2);

        let accepting = start(Arc::new(AlwaysDiscard));
        *accepting.gateway.last.lock().unwrap() = Some(remote_state("Ana"));
        accepting.handle.load_save(remote_state("Ana")).await.unwrap();
        accepting.handle.edit(Intent::AddPlayer).await.unwrap();
        assert_eq!(
            accepting.handle.cancel_changes().await.unwrap(),
            Outcome::Applied
        );
        let view = accepting.handle.current();
        assert_eq!(view.board.players.len(), 1);
        assert!(!view.flags.has_unsaved_changes);
    }

    #[tokio::test(start_paused = true)]
    async fn exported_file_loads_back_as_dirty_loaded_game() {
        let h = start(Arc::new(NeverDiscard));
        h.handle
            .edit(Intent::GenerateNewGrids(Some(2)))
            .await
            .unwrap();
        let exported = h.handle.download().await.unwrap();
        assert!(exported.starts_with(h.export_dir.path()));

        h.handle.edit(Intent::AddPlayer).await.unwrap();
        assert_eq!(
            h.handle.load_file(&exported).await.unwrap(),
            Outcome::Applied
        );
        let view = h.handle.current();
        assert_eq!(view.board.players.len(), 2);
        assert!(view.flags.is_loaded_game);
        assert!(view.flags.is_dirty);

        // The imported game is only uploaded by an explicit save.
        let before = h.gateway.saves().len();
        tokio::time::sleep(DELAY * 3).await;
        assert_eq!(h.gateway.saves().len(), before);

        h.handle.save().await.unwrap();
        let saves = h.gateway.saves();
        assert_eq!(saves.len(), before + 1);
        assert_eq!(saves[before].1.players.len(), 2);
        assert_eq!(h.handle.current().flags, StoreFlags::default());
    }

    #[tokio::test(start_paused = true)]
    async fn history_loads_are_dirty_but_wait_for_a_manual_save() {
        let h = start(Arc::new(NeverDiscard));
        assert_eq!(
            h.handle.load_save(remote_state("Ana")).await.unwrap(),
            Outcome::Applied
        );
        let flags = h.handle.current().flags;
        assert!(flags.is_dirty);
        assert!(flags.is_loaded_game);
        assert!(!flags.has_unsaved_changes);

        tokio::time::sleep(DELAY * 3).await;
        assert!(h.gateway.saves().is_empty());

        h.handle.save().await.unwrap();
        assert_eq!(h.gateway.saves()[0].1, remote_state("Ana"));
        assert_eq!(h.handle.current().flags, StoreFlags::default());
    }

    #[tokio::test(start_paused = true)]
    async fn own_save_echo_does_not_undo_newer_edits() {
        let h = start(Arc::new(NeverDiscard));
        h.handle
            .edit(Intent::GenerateNewGrids(Some(2)))
            .await
            .unwrap();
        tokio::time::sleep(DELAY + Duration::from_millis(5)).await;
        settle().await;
        let first = h.gateway.saves();
        assert_eq!(first.len(), 1);

        h.handle.edit(Intent::AddPlayer).await.unwrap();
        h.push
            .send(PushMessage::NewChanges(first[0].1.clone()))
            .await
            .unwrap();
        settle().await;

        let view = h.handle.current();
        assert_eq!(view.board.players.len(), 3);
        assert!(view.flags.is_dirty);
        assert!(!view.flags.is_loaded_game);

        tokio::time::sleep(DELAY + Duration::from_millis(5)).await;
        settle().await;
        let saves = h.gateway.saves();
        assert_eq!(saves.len(), 2);
        assert_eq!(saves[1].1.players.len(), 3);

        h.push
            .send(PushMessage::NewChanges(saves[1].1.clone()))
            .await
            .unwrap();
        settle().await;
        let view = h.handle.current();
        assert!(!view.flags.is_loaded_game);
        assert!(!view.flags.is_dirty);
    }

    #[tokio::test(start_paused = true)]
    async fn edits_during_an_autosave_get_one_follow_up_save() {
        let h = start(Arc::new(NeverDiscard));
        h.handle
            .edit(Intent::GenerateNewGrids(Some(2)))
            .await
            .unwrap();
        let release = h.gateway.hold_next_save();

        tokio::time::sleep(DELAY + Duration::from_millis(5)).await;
        settle().await;
        assert!(matches!(
            h.handle.current().autosave,
            AutoSavePhase::Saving { follow_up: None }
        ));

        h.handle.edit(Intent::AddPlayer).await.unwrap();
        let edited_at = Instant::now();
        assert_eq!(
            h.handle.current().autosave,
            AutoSavePhase::Saving {
                follow_up: Some(edited_at + DELAY)
            }
        );

        release.send(()).unwrap();
        settle().await;
        let saves = h.gateway.saves();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].1.players.len(), 2);
        let view = h.handle.current();
        assert!(view.flags.is_dirty);
        assert_eq!(
            view.autosave,
            AutoSavePhase::Scheduled {
                deadline: edited_at + DELAY
            }
        );

        tokio::time::sleep_until(edited_at + DELAY + Duration::from_millis(5)).await;
        settle().await;
        let saves = h.gateway.saves();
        assert_eq!(saves.len(), 2);
        assert_eq!(saves[1].0, edited_at + DELAY);
        assert_eq!(saves[1].1.players.len(), 3);
        let view = h.handle.current();
        assert!(!view.flags.is_dirty);
        assert_eq!(view.autosave, AutoSavePhase::Idle);

        tokio::time::sleep(DELAY * 3).await;
        assert_eq!(h.gateway.saves().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_edits_are_reported() {
        let h = start(Arc::new(NeverDiscard));
        h.handle
            .edit(Intent::GenerateNewGrids(Some(2)))
            .await
            .unwrap();
        let err = h.handle.edit(Intent::RemovePlayer(4)).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Validation(ValidationError::PlayerOutOfRange { index: 4, len: 2 })
        ));
        let err = h
            .handle
            .edit(Intent::AddProposition("   ".into()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Validation(ValidationError::EmptyProposition)
        ));
    }
}
