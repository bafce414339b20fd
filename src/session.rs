//! Client-side game session controller.
//!
//! Drives the top-level phase machine (IDLE → LOBBY → WAITING → PLAYING →
//! GAMEOVER), owns the countdown timer, and reconciles optimistic local
//! state against authoritative server broadcasts. In solo mode the same
//! controller runs the round machine and scoring rules locally against the
//! oracle, with no network peer.

use crate::oracle::CategoryOracle;
use crate::protocol::{CategoryInfo, PlayerInfo, ServerMessage, WordErrorKind};
use crate::scoring::ScoreSheet;
use crate::state::{generate_room_code, RoundState};
use crate::types::*;
use crate::validate::{fast_verdict, normalize, FastVerdict};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Recurring tick task with a cancellation handle.
///
/// One is started on entry to PLAYING and cancelled on every phase exit,
/// so duplicate timers can never coexist.
pub struct Countdown {
    handle: Option<JoinHandle<()>>,
}

impl Countdown {
    pub fn start(period: Duration, tx: mpsc::UnboundedSender<()>) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first interval tick completes immediately; skip it so
            // ticks arrive one period after start.
            interval.tick().await;
            loop {
                interval.tick().await;
                if tx.send(()).is_err() {
                    break;
                }
            }
        });
        Self {
            handle: Some(handle),
        }
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Outcome of a countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Running,
    /// This tick performed the one PLAYING → GAMEOVER transition.
    GameOver,
    /// Tick outside PLAYING (late timer fire); no effect.
    Ignored,
}

/// Outcome of a local submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitResult {
    Accepted { points: u64 },
    Duplicate,
    Wrong,
    Locked,
    /// Fast path inconclusive; the oracle must judge the word.
    NeedsJudgement(PendingJudgement),
    /// Judgement resolved after its round rotated away; nothing applied.
    Discarded,
}

/// A slow-path validation in flight, keyed by the round generation that
/// issued it. Resolving against a later generation is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingJudgement {
    pub word: String,
    pub category: String,
    pub generation: u64,
}

pub struct Session {
    pub phase: SessionPhase,
    pub sheet: ScoreSheet,
    /// Score-doubling modifier; independent of the streak tier.
    pub overclock: bool,
    /// Round projection: authoritative (networked) or local (solo).
    pub round: RoundState,
    /// Authoritative roster projection, replaced wholesale on broadcast.
    pub players: Vec<PlayerInfo>,
    pub username: String,
    /// Registry-assigned id, learned from the join ack. Keys roster
    /// reconciliation so colliding display names cannot cross wires.
    pub player_id: Option<PlayerId>,
    /// Code of the hosted or joined room.
    pub room_code: Option<RoomCode>,
    /// Next solo category, keyed by the generation it was fetched for.
    prefetched: Option<(u64, Category)>,
    tick_tx: Option<mpsc::UnboundedSender<()>>,
    countdown: Option<Countdown>,
}

impl Session {
    pub fn new(username: &str, high_score: u64) -> Self {
        Self {
            phase: SessionPhase::Idle,
            sheet: ScoreSheet::new(high_score),
            overclock: false,
            round: RoundState::new(),
            players: Vec::new(),
            username: username.to_string(),
            player_id: None,
            room_code: None,
            prefetched: None,
            tick_tx: None,
            countdown: None,
        }
    }

    /// Install the channel the countdown delivers ticks on. Without one
    /// the session still transitions phases; ticks are driven manually.
    pub fn with_ticker(mut self, tx: mpsc::UnboundedSender<()>) -> Self {
        self.tick_tx = Some(tx);
        self
    }

    fn enter_phase(&mut self, next: SessionPhase) {
        if self.phase == next {
            return;
        }
        // Every phase exit clears the timer.
        if let Some(mut countdown) = self.countdown.take() {
            countdown.cancel();
        }
        tracing::debug!(from = ?self.phase, to = ?next, "session phase change");
        self.phase = next;
        if next == SessionPhase::Playing {
            if let Some(tx) = &self.tick_tx {
                self.countdown = Some(Countdown::start(Duration::from_secs(1), tx.clone()));
            }
        }
    }

    pub fn enter_lobby(&mut self) {
        if self.phase == SessionPhase::Idle {
            self.enter_phase(SessionPhase::Lobby);
        }
    }

    /// Host path: enter the lobby with a freshly generated room code to
    /// share with the other players.
    pub fn host_lobby(&mut self) -> RoomCode {
        self.enter_lobby();
        let code = generate_room_code();
        self.room_code = Some(code.clone());
        code
    }

    pub fn enter_waiting(&mut self) {
        if self.phase == SessionPhase::Lobby {
            self.enter_phase(SessionPhase::Waiting);
        }
    }

    pub fn start_playing(&mut self) {
        if matches!(self.phase, SessionPhase::Lobby | SessionPhase::Waiting) {
            self.sheet.time_remaining = MAX_TIME;
            self.enter_phase(SessionPhase::Playing);
        }
    }

    /// Reset to IDLE defaults, keeping the high-score watermark.
    pub fn play_again(&mut self) {
        let high_score = self.sheet.high_score;
        self.sheet = ScoreSheet::new(high_score);
        self.round = RoundState::new();
        self.players.clear();
        self.prefetched = None;
        self.player_id = None;
        self.room_code = None;
        self.enter_phase(SessionPhase::Idle);
    }

    /// One countdown second. Reaching zero performs the terminal
    /// transition exactly once; late ticks are ignored because the phase
    /// has already left PLAYING.
    pub fn tick(&mut self) -> TickOutcome {
        if self.phase != SessionPhase::Playing {
            return TickOutcome::Ignored;
        }
        if self.sheet.time_remaining > 0 {
            self.sheet.time_remaining -= 1;
        }
        if self.sheet.time_remaining == 0 {
            self.enter_phase(SessionPhase::GameOver);
            return TickOutcome::GameOver;
        }
        TickOutcome::Running
    }

    /// Apply an authoritative broadcast. Server state wins: contradicted
    /// local fields are replaced, never merged.
    pub fn apply_server(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::Joined {
                player_id,
                room_code,
                ..
            } => {
                self.player_id = Some(player_id);
                self.room_code = Some(room_code);
            }
            ServerMessage::PlayerUpdate { players } => {
                self.players = players;
                self.reconcile();
            }
            ServerMessage::SyncQuestion { category } => {
                self.round.install(category_from_info(&category));
            }
            ServerMessage::SyncStatus { locked } => {
                self.round.locked = locked;
            }
            ServerMessage::NewWord { word, username } => {
                // Our own oracle-accepted words arrive here first; words
                // the fast path already applied are not fresh and must
                // not count twice.
                let fresh = self.round.accepted.insert(word);
                if fresh && username == self.username {
                    self.sheet.apply_match(self.overclock);
                }
            }
            ServerMessage::WordError { kind, .. } => {
                // Only a genuine wrong guess is penalized; duplicates,
                // locked rounds, and stale judgements cost nothing.
                if kind == WordErrorKind::Wrong {
                    self.sheet.apply_miss();
                }
            }
            ServerMessage::StartGameSignal => {
                self.start_playing();
            }
            _ => {}
        }
    }

    /// Replace optimistic score/streak with the authoritative roster
    /// entry, matched by registry id.
    fn reconcile(&mut self) {
        let Some(my_id) = &self.player_id else {
            return;
        };
        if let Some(me) = self.players.iter().find(|p| &p.id == my_id) {
            self.sheet.score = me.score;
            self.sheet.streak = me.streak;
            if me.score > self.sheet.high_score {
                self.sheet.high_score = me.score;
            }
        }
    }

    /// Deterministic part of a submission. `NeedsJudgement` hands back a
    /// generation-stamped token for the slow path.
    pub fn try_fast_submit(&mut self, raw_word: &str) -> SubmitResult {
        if self.phase != SessionPhase::Playing || self.round.locked {
            return SubmitResult::Locked;
        }
        let word = normalize(raw_word);
        let Some(category) = self.round.category.as_ref() else {
            return SubmitResult::Locked;
        };
        if word.is_empty() {
            return SubmitResult::Discarded;
        }

        match fast_verdict(category, &self.round.accepted, &word) {
            FastVerdict::Duplicate => SubmitResult::Duplicate,
            FastVerdict::Known => self.accept_local(word),
            FastVerdict::Unknown => SubmitResult::NeedsJudgement(PendingJudgement {
                word,
                category: category.name.clone(),
                generation: self.round.generation,
            }),
        }
    }

    /// Apply a slow-path judgement. The result lands only if the round
    /// that issued it is still active; anything later is discarded without
    /// touching state.
    pub fn resolve_judgement(&mut self, pending: PendingJudgement, valid: bool) -> SubmitResult {
        if pending.generation != self.round.generation || self.phase != SessionPhase::Playing {
            return SubmitResult::Discarded;
        }
        if !valid {
            self.sheet.apply_miss();
            return SubmitResult::Wrong;
        }
        if self.round.locked {
            return SubmitResult::Locked;
        }
        if self.round.accepted.contains(&pending.word) {
            return SubmitResult::Duplicate;
        }
        self.accept_local(pending.word)
    }

    fn accept_local(&mut self, word: String) -> SubmitResult {
        let points = self.sheet.apply_match(self.overclock);
        self.round.accepted.insert(word);
        if self.round.at_threshold() {
            self.round.locked = true;
        }
        SubmitResult::Accepted { points }
    }

    /// Start a solo game: no peer, identical round and scoring rules.
    pub async fn start_solo(&mut self, oracle: &CategoryOracle) {
        self.sheet = ScoreSheet::new(self.sheet.high_score);
        self.round = RoundState::new();
        self.enter_phase(SessionPhase::Playing);
        self.rotate_solo(oracle).await;
    }

    /// Full solo submission: fast path, oracle fallback, and rotation at
    /// the threshold.
    pub async fn submit_solo(&mut self, oracle: &CategoryOracle, raw_word: &str) -> SubmitResult {
        let result = match self.try_fast_submit(raw_word) {
            SubmitResult::NeedsJudgement(pending) => {
                let valid = oracle
                    .validate_word(&pending.category, &pending.word)
                    .await;
                self.resolve_judgement(pending, valid)
            }
            other => other,
        };

        if self.round.locked && self.phase == SessionPhase::Playing {
            self.rotate_solo(oracle).await;
        }
        result
    }

    /// Install the next solo category, preferring a still-valid prefetch.
    /// Never fails: the oracle absorbs its own errors, so the lock always
    /// clears.
    pub async fn rotate_solo(&mut self, oracle: &CategoryOracle) {
        let generation = self.round.generation;
        let category = match self.prefetched.take().filter(|(g, _)| *g == generation) {
            Some((_, category)) => category,
            None => {
                oracle
                    .request_category(crate::scoring::level_for_score(self.sheet.score))
                    .await
            }
        };
        self.round.install(category);
    }

    /// Best-effort background fetch for the next rotation; stored only if
    /// the round has not moved on by the time it resolves.
    pub async fn prefetch_solo(&mut self, oracle: &CategoryOracle) {
        let generation = self.round.generation;
        let category = oracle
            .request_category(crate::scoring::level_for_score(self.sheet.score))
            .await;
        if self.round.generation == generation {
            self.prefetched = Some((generation, category));
        }
    }
}

fn category_from_info(info: &CategoryInfo) -> Category {
    Category::new(&info.text, info.examples.iter(), &info.color)
}
