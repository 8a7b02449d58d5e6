//! Action orchestration against the shared authoritative state.
//!
//! One mutex guards everything: registry, game store, rematch book, timer
//! maps, and the outbound connection senders. Every inbound action locks,
//! mutates to completion, and releases — there is no mid-mutation
//! interleaving. Timer callbacks re-acquire the same lock and re-validate
//! (ticket currency, room existence) before acting, because the world may
//! have moved on between scheduling and firing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use mathduel_game::{GameStore, RematchBook, RematchOutcome, SubmitOutcome};
use mathduel_protocol::{
    AckBody, ClientAction, ConnId, Difficulty, GameStateView, PlayerNumber, PlayerStatus, RoomId,
    RoomSummary, ServerFrame,
};
use mathduel_registry::{LeaveOutcome, RegistryError, RoomRegistry};
use mathduel_timers::TimerMap;
use tokio::sync::{Mutex, mpsc};

use crate::{ServerConfig, ServerError};

/// Outbound channel for one connection's frames. Unbounded: a slow client
/// buffers in memory rather than stalling the whole room.
pub(crate) type FrameSender = mpsc::UnboundedSender<ServerFrame>;

/// All mutable server state, guarded by the single lock in [`App`].
pub(crate) struct AppState {
    pub(crate) registry: RoomRegistry,
    pub(crate) games: GameStore,
    pub(crate) rematch: RematchBook,
    /// Pending automatic round advances, one per room at most.
    pub(crate) advance_timers: TimerMap<RoomId>,
    /// Pending presence-broadcast debounces.
    pub(crate) presence_timers: TimerMap<RoomId>,
    pub(crate) connections: HashMap<ConnId, FrameSender>,
}

/// The shared application: state behind one lock plus read-only config.
pub struct App {
    pub(crate) state: Mutex<AppState>,
    pub(crate) config: ServerConfig,
}

impl App {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(AppState {
                registry: RoomRegistry::new(),
                games: GameStore::new(),
                rematch: RematchBook::new(),
                advance_timers: TimerMap::new(),
                presence_timers: TimerMap::new(),
                connections: HashMap::new(),
            }),
            config,
        })
    }

    /// Registers a connection's outbound channel.
    pub(crate) async fn register_connection(&self, conn: ConnId, tx: FrameSender) {
        self.state.lock().await.connections.insert(conn, tx);
        tracing::debug!(%conn, "connection registered");
    }

    /// Socket gone: run leave semantics and drop the outbound channel.
    pub(crate) async fn handle_disconnect(self: &Arc<Self>, conn: ConnId) {
        let mut state = self.state.lock().await;
        self.leave_internal(&mut state, conn);
        state.connections.remove(&conn);
        tracing::info!(%conn, "connection closed");
    }

    /// Applies one action and returns the ack for the initiating caller.
    ///
    /// Rejections never escape as errors: they become `{error: ...}` ack
    /// bodies, and the other player's view is untouched.
    pub(crate) async fn handle_action(self: &Arc<Self>, conn: ConnId, action: ClientAction) -> AckBody {
        let mut state = self.state.lock().await;
        let result = match action {
            ClientAction::CreateRoom => self.create_room(&mut state, conn),
            ClientAction::JoinRoom { room_id } => self.join_room(&mut state, conn, room_id),
            ClientAction::StartGame {
                room_id,
                difficulty,
                initial_hand_size,
            } => self.start_game(&mut state, conn, room_id, difficulty, initial_hand_size),
            ClientAction::SelectCard {
                room_id,
                player_number,
                card_id,
            } => self.select_card(&mut state, room_id, player_number, card_id),
            ClientAction::SubmitAnswer {
                room_id,
                player_number,
                answer,
            } => self.submit_answer(&mut state, room_id, player_number, answer),
            ClientAction::NextRound { room_id } => self.next_round(&mut state, room_id),
            ClientAction::ResetGame { room_id } => self.reset_game(&mut state, room_id),
            ClientAction::RequestRematch {
                room_id,
                player_number,
            } => self.request_rematch(&mut state, room_id, player_number),
            ClientAction::SetPresence { room_id, status } => {
                self.set_presence(&mut state, conn, room_id, status)
            }
            ClientAction::SetRoomOptions {
                room_id,
                difficulty,
                initial_hand_size,
            } => self.set_room_options(&mut state, room_id, difficulty, initial_hand_size),
            ClientAction::LeaveRoom { room_id: _ } => self.leave_room(&mut state, conn),
        };

        match result {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(%conn, error = %e, "action rejected");
                AckBody::error(e)
            }
        }
    }

    // -----------------------------------------------------------------
    // Room membership
    // -----------------------------------------------------------------

    fn create_room(self: &Arc<Self>, state: &mut AppState, conn: ConnId) -> Result<AckBody, ServerError> {
        // A connection switching rooms leaves the old one first, with the
        // full teardown (timers, game, notifications).
        self.leave_internal(state, conn);

        let joined = state.registry.create_room(conn);
        Ok(AckBody::RoomJoined {
            room_id: joined.room_id,
            room_name: joined.room_name,
            player_id: joined.player_id,
            player_number: joined.player_number,
            other_player_connected: joined.other_player_connected,
        })
    }

    fn join_room(
        self: &Arc<Self>,
        state: &mut AppState,
        conn: ConnId,
        room_id: RoomId,
    ) -> Result<AckBody, ServerError> {
        self.leave_internal(state, conn);

        let joined = state.registry.join_room(&room_id, conn)?;

        // Tell the creator a second player arrived, and refresh presence.
        if let Some(room) = state.registry.get(&room_id) {
            for other in room.conns().into_iter().filter(|c| *c != conn) {
                send_frame(
                    state,
                    other,
                    ServerFrame::OtherPlayerConnected {
                        room_id: room_id.clone(),
                    },
                );
            }
        }
        self.schedule_presence(state, &room_id);

        Ok(AckBody::RoomJoined {
            room_id: joined.room_id,
            room_name: joined.room_name,
            player_id: joined.player_id,
            player_number: joined.player_number,
            other_player_connected: joined.other_player_connected,
        })
    }

    fn leave_room(self: &Arc<Self>, state: &mut AppState, conn: ConnId) -> Result<AckBody, ServerError> {
        let outcome = self
            .leave_internal(state, conn)
            .ok_or(RegistryError::NotInRoom(conn))?;
        Ok(AckBody::RoomLeft {
            ok: true,
            room_id: outcome.room_id,
            deleted: outcome.deleted,
            remaining: outcome.remaining,
        })
    }

    /// Shared leave semantics for the explicit action, `setPresence` with
    /// status `left`, room switching, and socket disconnect.
    fn leave_internal(
        self: &Arc<Self>,
        state: &mut AppState,
        conn: ConnId,
    ) -> Option<LeaveOutcome> {
        let outcome = state.registry.leave_room(conn)?;

        if outcome.deleted {
            // The room is gone: destroy its game and every per-room
            // resource so no stale timer fires against a deleted room.
            state.games.remove(&outcome.room_id);
            state.rematch.clear(&outcome.room_id);
            state.advance_timers.cancel(&outcome.room_id);
            state.presence_timers.cancel(&outcome.room_id);
        } else {
            for c in &outcome.remaining_conns {
                send_frame(
                    state,
                    *c,
                    ServerFrame::OtherPlayerDisconnected {
                        room_id: outcome.room_id.clone(),
                        player_number: outcome.player_number,
                    },
                );
            }
            self.schedule_presence(state, &outcome.room_id);
        }
        Some(outcome)
    }

    // -----------------------------------------------------------------
    // Game lifecycle
    // -----------------------------------------------------------------

    fn start_game(
        self: &Arc<Self>,
        state: &mut AppState,
        conn: ConnId,
        room_id: RoomId,
        difficulty: Option<Difficulty>,
        initial_hand_size: Option<u8>,
    ) -> Result<AckBody, ServerError> {
        {
            let room = state
                .registry
                .get(&room_id)
                .ok_or_else(|| RegistryError::RoomNotFound(room_id.clone()))?;
            let member = room
                .member_by_conn(conn)
                .ok_or(RegistryError::NotInRoom(conn))?;
            if member.number != PlayerNumber::One {
                return Err(ServerError::NotAuthorized);
            }
            if room.player_count() < 2 {
                return Err(ServerError::InsufficientPlayers);
            }
        }

        let options = {
            let room = state.registry.get_mut(&room_id).expect("room checked above");
            room.options.apply(difficulty, initial_hand_size);
            room.options
        };

        state.games.init_game(&room_id, options, &mut rand::rng());
        state.registry.set_all_statuses(&room_id, PlayerStatus::InGame);
        state.rematch.clear(&room_id);
        state.registry.touch(&room_id);

        broadcast_state(state, &room_id, None);
        self.schedule_presence(state, &room_id);
        Ok(AckBody::ok())
    }

    fn reset_game(self: &Arc<Self>, state: &mut AppState, room_id: RoomId) -> Result<AckBody, ServerError> {
        let options = state
            .registry
            .get(&room_id)
            .ok_or_else(|| RegistryError::RoomNotFound(room_id.clone()))?
            .options;

        // A stale auto-advance must never run against the fresh state.
        self.cancel_auto_advance(state, &room_id);
        state.rematch.clear(&room_id);

        state.games.init_game(&room_id, options, &mut rand::rng());
        state.registry.set_all_statuses(&room_id, PlayerStatus::InGame);
        state.registry.touch(&room_id);

        broadcast_state(state, &room_id, None);
        self.schedule_presence(state, &room_id);
        Ok(AckBody::ok())
    }

    fn request_rematch(
        self: &Arc<Self>,
        state: &mut AppState,
        room_id: RoomId,
        player_number: PlayerNumber,
    ) -> Result<AckBody, ServerError> {
        let (options, other_conn) = {
            let room = state
                .registry
                .get(&room_id)
                .ok_or_else(|| RegistryError::RoomNotFound(room_id.clone()))?;
            (
                room.options,
                room.member_by_number(player_number.other()).map(|p| p.conn),
            )
        };

        match state.rematch.request(&room_id, player_number) {
            RematchOutcome::Waiting => {
                if let Some(other) = other_conn {
                    send_frame(
                        state,
                        other,
                        ServerFrame::RematchRequested {
                            room_id,
                            player_number,
                        },
                    );
                }
                Ok(AckBody::RematchWaiting {
                    ok: true,
                    waiting: true,
                })
            }
            RematchOutcome::BothConfirmed => {
                self.cancel_auto_advance(state, &room_id);
                state.games.init_game(&room_id, options, &mut rand::rng());
                state.registry.set_all_statuses(&room_id, PlayerStatus::InGame);
                state.registry.touch(&room_id);

                broadcast_state(state, &room_id, None);
                self.schedule_presence(state, &room_id);
                Ok(AckBody::RematchConfirmed {
                    ok: true,
                    both_confirmed: true,
                })
            }
        }
    }

    // -----------------------------------------------------------------
    // Round sync
    // -----------------------------------------------------------------

    fn select_card(
        self: &Arc<Self>,
        state: &mut AppState,
        room_id: RoomId,
        player_number: PlayerNumber,
        card_id: mathduel_protocol::CardId,
    ) -> Result<AckBody, ServerError> {
        if state.registry.get(&room_id).is_none() {
            return Err(RegistryError::RoomNotFound(room_id).into());
        }
        let Some(game) = state.games.get_mut(&room_id) else {
            tracing::debug!(%room_id, "selection before game start; ignoring");
            return Ok(AckBody::ok());
        };

        game.select_card(player_number, card_id, &mut rand::rng());
        state.registry.touch(&room_id);
        broadcast_state(state, &room_id, None);
        Ok(AckBody::ok())
    }

    fn submit_answer(
        self: &Arc<Self>,
        state: &mut AppState,
        room_id: RoomId,
        player_number: PlayerNumber,
        answer: i64,
    ) -> Result<AckBody, ServerError> {
        if state.registry.get(&room_id).is_none() {
            return Err(RegistryError::RoomNotFound(room_id).into());
        }
        let Some(game) = state.games.get_mut(&room_id) else {
            tracing::debug!(%room_id, "answer before game start; ignoring");
            return Ok(AckBody::ok());
        };

        let outcome = game.submit_answer(player_number, answer);
        state.registry.touch(&room_id);

        let timing = if matches!(outcome, SubmitOutcome::Resolved(_)) {
            // Arm the grace-period advance before broadcasting, so the
            // snapshot clients see already rejects new selections.
            self.schedule_auto_advance(state, &room_id);
            let delay_ms = self.config.advance_delay.as_millis() as u64;
            Some((delay_ms, epoch_ms() + delay_ms))
        } else {
            None
        };

        broadcast_state(state, &room_id, timing);
        Ok(AckBody::ok())
    }

    fn next_round(self: &Arc<Self>, state: &mut AppState, room_id: RoomId) -> Result<AckBody, ServerError> {
        if state.registry.get(&room_id).is_none() {
            return Err(RegistryError::RoomNotFound(room_id).into());
        }

        // The manual request wins the race: retire the timer first, then
        // advance. The retired ticket makes a late fire a no-op.
        self.cancel_auto_advance(state, &room_id);
        if let Some(game) = state.games.get_mut(&room_id) {
            game.advance_round();
        }
        state.registry.touch(&room_id);
        broadcast_state(state, &room_id, None);
        Ok(AckBody::ok())
    }

    // -----------------------------------------------------------------
    // Presence and options
    // -----------------------------------------------------------------

    fn set_presence(
        self: &Arc<Self>,
        state: &mut AppState,
        conn: ConnId,
        room_id: RoomId,
        status: PlayerStatus,
    ) -> Result<AckBody, ServerError> {
        if status == PlayerStatus::Left {
            self.leave_internal(state, conn);
            return Ok(AckBody::ok());
        }

        // Best-effort bookkeeping: an unknown room or member must not
        // fail the action.
        if !state.registry.set_player_status(&room_id, conn, status) {
            tracing::debug!(%room_id, %conn, "presence update for unknown room/member ignored");
            return Ok(AckBody::ok());
        }
        self.schedule_presence(state, &room_id);
        Ok(AckBody::ok())
    }

    fn set_room_options(
        self: &Arc<Self>,
        state: &mut AppState,
        room_id: RoomId,
        difficulty: Option<Difficulty>,
        initial_hand_size: Option<u8>,
    ) -> Result<AckBody, ServerError> {
        let room = state
            .registry
            .get_mut(&room_id)
            .ok_or_else(|| RegistryError::RoomNotFound(room_id.clone()))?;
        room.options.apply(difficulty, initial_hand_size);
        state.registry.touch(&room_id);
        Ok(AckBody::ok())
    }

    // -----------------------------------------------------------------
    // Deferred transitions
    // -----------------------------------------------------------------

    /// Arms the automatic round advance for a room, if none is pending.
    ///
    /// The game's phase moves to `PendingAdvance` immediately so new
    /// selections are rejected for the duration. The callback re-locks,
    /// redeems its ticket, and re-validates room and game existence —
    /// state read at scheduling time is not trusted at fire time.
    fn schedule_auto_advance(self: &Arc<Self>, state: &mut AppState, room_id: &RoomId) {
        if state.advance_timers.is_pending(room_id) {
            return;
        }
        if let Some(game) = state.games.get_mut(room_id) {
            game.mark_pending_advance();
        }

        let app = Arc::clone(self);
        let rid = room_id.clone();
        state
            .advance_timers
            .schedule(room_id.clone(), self.config.advance_delay, move |ticket| async move {
                let mut state = app.state.lock().await;
                if !state.advance_timers.complete(&ticket) {
                    return; // cancelled or superseded — the manual path won
                }
                if state.registry.get(&rid).is_none() {
                    return; // room deleted while the timer slept
                }
                let Some(game) = state.games.get_mut(&rid) else {
                    return;
                };
                game.advance_round();
                tracing::debug!(room_id = %rid, "automatic round advance fired");
                broadcast_state(&state, &rid, None);
            });
    }

    /// Cancels a pending automatic advance and unlocks selections.
    fn cancel_auto_advance(self: &Arc<Self>, state: &mut AppState, room_id: &RoomId) {
        if state.advance_timers.cancel(room_id) {
            if let Some(game) = state.games.get_mut(room_id) {
                game.clear_pending_advance();
            }
        }
    }

    /// (Re)starts the presence debounce for a room: back-to-back
    /// membership changes coalesce into one snapshot built from current
    /// state at fire time. Rooms gone by then are silently skipped.
    fn schedule_presence(self: &Arc<Self>, state: &mut AppState, room_id: &RoomId) {
        let app = Arc::clone(self);
        let rid = room_id.clone();
        state
            .presence_timers
            .reschedule(room_id.clone(), self.config.presence_debounce, move |ticket| async move {
                let mut state = app.state.lock().await;
                if !state.presence_timers.complete(&ticket) {
                    return;
                }
                let Some(room) = state.registry.get(&rid) else {
                    return;
                };
                let (players, conns) = (room.presence(), room.conns());
                let frame = ServerFrame::PresenceUpdate {
                    room_id: rid.clone(),
                    players,
                };
                for conn in conns {
                    send_frame(&state, conn, frame.clone());
                }
            });
    }

    // -----------------------------------------------------------------
    // Read-only surfaces (debug/admin collaborators)
    // -----------------------------------------------------------------

    /// Membership/status/options summaries of all rooms.
    pub async fn list_rooms(&self) -> Vec<RoomSummary> {
        self.state.lock().await.registry.list()
    }

    /// Current game snapshot for one room.
    pub async fn game_view(&self, room_id: &RoomId) -> Option<GameStateView> {
        self.state.lock().await.games.get(room_id).map(|g| g.view())
    }

    /// Deletes rooms empty beyond the configured retention window.
    /// A no-op under the immediate-deletion leave policy.
    pub async fn sweep_idle_rooms(&self) -> Vec<RoomId> {
        let mut state = self.state.lock().await;
        state.registry.sweep_idle_rooms(self.config.idle_room_ttl)
    }
}

// ---------------------------------------------------------------------------
// Broadcast plumbing
// ---------------------------------------------------------------------------

/// Sends one frame to one connection. Best-effort: a missing or closed
/// channel is logged and ignored — an authoritative state change already
/// applied is never rolled back because a socket went away.
pub(crate) fn send_frame(state: &AppState, conn: ConnId, frame: ServerFrame) {
    let Some(tx) = state.connections.get(&conn) else {
        tracing::debug!(%conn, "no channel for connection; frame dropped");
        return;
    };
    if tx.send(frame).is_err() {
        tracing::debug!(%conn, "connection channel closed; frame dropped");
    }
}

/// Broadcasts the room's current game snapshot to every member, optionally
/// with the (delay, absolute deadline) of a just-armed automatic advance.
pub(crate) fn broadcast_state(state: &AppState, room_id: &RoomId, timing: Option<(u64, u64)>) {
    let Some(room) = state.registry.get(room_id) else {
        return;
    };
    let Some(game) = state.games.get(room_id) else {
        return;
    };
    let frame = ServerFrame::StateUpdate {
        room_id: room_id.clone(),
        state: game.view(),
        advance_after_ms: timing.map(|(delay, _)| delay),
        advance_deadline_ms: timing.map(|(_, deadline)| deadline),
    };
    for conn in room.conns() {
        send_frame(state, conn, frame.clone());
    }
}

/// Unix epoch milliseconds.
fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

// =========================================================================
// Tests
// =========================================================================
