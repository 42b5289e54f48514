//! Core game logic and state management
//!
//! This module contains the main game struct and the state machine
//! driving a full trivia session: lobby, two board rounds with buzzer
//! arbitration and Daily Double wagers, the final wagering round, and
//! the completed summary. All participant communication goes through
//! injected tunnels and all timing through scheduled alarm messages,
//! so the engine itself stays transport- and clock-agnostic.

use std::{collections::HashMap, fmt::Debug};

use garde::Validate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use thiserror::Error;
use web_time::Duration;

use crate::{
    TruncatedVec, answer,
    answer::MatchOptions,
    board::{Board, BoardSnapshot, Clue, QuestionSource, Round},
    buzzer::{BuzzOutcome, Buzzer},
    constants,
    names::{self, Names},
    participant::{self, Id, Participants, Profile, Role},
    scoreboard::Scoreboard,
    session::Tunnel,
    wager::{self, WagerContext},
};

type ValidationResult = garde::Result;

/// Validates that a timing window falls within the accepted bounds
fn validate_window(val: &Duration) -> ValidationResult {
    if (constants::timing::MIN_WINDOW..=constants::timing::MAX_WINDOW).contains(&val.as_secs()) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "window is outside of the bounds [{},{}]",
            constants::timing::MIN_WINDOW,
            constants::timing::MAX_WINDOW,
        )))
    }
}

/// Tunable policy knobs for a session
///
/// Every window and threshold has a sensible default; operators only
/// override what they need. Validation rejects configurations outside
/// the accepted bounds instead of adjusting them.
#[serde_with::serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Options {
    /// Time to read a clue before the buzzers open
    #[garde(custom(|v, _| validate_window(v)))]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub read_window: Duration,
    /// Time the buzzers stay open before the clue expires
    #[garde(custom(|v, _| validate_window(v)))]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub buzz_window: Duration,
    /// Time the floor holder has to submit an answer
    #[garde(custom(|v, _| validate_window(v)))]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub answer_time: Duration,
    /// Time the Daily Double selector has to place a wager
    #[garde(custom(|v, _| validate_window(v)))]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub wager_time: Duration,
    /// Time every player has to place their final-round wager
    #[garde(custom(|v, _| validate_window(v)))]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub final_wager_time: Duration,
    /// Time every player has to submit their final-round answer
    #[garde(custom(|v, _| validate_window(v)))]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub final_answer_time: Duration,
    /// Smallest wager the Daily Double selector may place
    #[garde(range(min = 0))]
    pub wager_floor: i64,
    /// Answer similarity thresholds
    #[garde(dive)]
    pub matching: MatchOptions,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            read_window: Duration::from_secs(constants::timing::DEFAULT_READ_WINDOW),
            buzz_window: Duration::from_secs(constants::timing::DEFAULT_BUZZ_WINDOW),
            answer_time: Duration::from_secs(constants::timing::DEFAULT_ANSWER_TIME),
            wager_time: Duration::from_secs(constants::timing::DEFAULT_WAGER_TIME),
            final_wager_time: Duration::from_secs(constants::timing::DEFAULT_FINAL_WAGER_TIME),
            final_answer_time: Duration::from_secs(constants::timing::DEFAULT_FINAL_ANSWER_TIME),
            wager_floor: constants::wager::DEFAULT_FLOOR,
            matching: MatchOptions::default(),
        }
    }
}

/// The lifecycle stage of the clue currently in play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClueStage {
    /// Daily Double: waiting for the selector's wager
    AwaitingWager,
    /// The clue is being read; buzzing now locks the player out
    Reading,
    /// The buzzers are open
    Open,
    /// A player holds the floor and must answer
    Answering(Id),
}

/// A selected clue together with its arbitration state
#[derive(Debug, Serialize, Deserialize)]
pub struct ActiveClue {
    /// The clue in play
    pub clue: Clue,
    /// Whether this cell hid a Daily Double
    pub daily_double: bool,
    /// The Daily Double wager once placed
    pub wager: Option<i64>,
    /// Current lifecycle stage
    pub stage: ClueStage,
    /// Buzz arbitration for this clue
    pub buzzer: Buzzer,
}

/// A regular round in progress
#[derive(Debug, Serialize, Deserialize)]
pub struct RoundState {
    /// Which round this is
    pub round: Round,
    /// The round's board
    pub board: Board,
    /// The player who selects the next clue
    pub controller: Id,
    /// The clue currently in play, if any
    pub active: Option<ActiveClue>,
}

/// The stage of the final round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalStage {
    /// Collecting wagers; the clue prompt is still hidden
    Wagering,
    /// The clue is revealed and answers are being collected
    Answering,
}

/// The final round in progress
#[derive(Debug, Serialize, Deserialize)]
pub struct FinalState {
    /// The final clue
    pub clue: Clue,
    /// Current stage
    pub stage: FinalStage,
    /// Every player's score at entry, fixing their wager bounds and
    /// the reveal order
    pub entry_scores: HashMap<Id, i64>,
    /// Wagers received so far
    pub wagers: HashMap<Id, i64>,
    /// Answers received so far
    pub answers: HashMap<Id, String>,
}

/// The overall phase of the session
#[derive(Debug, Serialize, Deserialize)]
pub enum Phase {
    /// Waiting for players to join before the host starts the game
    Lobby,
    /// One of the two board rounds
    Round(Box<RoundState>),
    /// The final wagering round
    Final(Box<FinalState>),
    /// The game has finished; standings are frozen
    Complete,
}

/// Messages received from different types of participants
///
/// Incoming messages are categorized by the sender's role so that only
/// appropriate messages are processed from each participant type.
#[derive(Debug, Deserialize, Clone)]
pub enum IncomingMessage {
    /// Messages from the session host
    Host(IncomingHostMessage),
    /// Messages from connections that have not joined yet
    Unassigned(IncomingUnassignedMessage),
    /// Messages from seated players
    Player(IncomingPlayerMessage),
}

impl IncomingMessage {
    /// Validates that a message matches the sender's role
    fn follows(&self, sender_role: Role) -> bool {
        matches!(
            (self, sender_role),
            (IncomingMessage::Host(_), Role::Host)
                | (IncomingMessage::Player(_), Role::Player)
                | (IncomingMessage::Unassigned(_), Role::Unassigned)
        )
    }
}

/// Messages that can be sent by the session host
#[derive(Debug, Deserialize, Clone, Copy)]
pub enum IncomingHostMessage {
    /// Start the game from the lobby
    Start,
    /// Lock or unlock the session to new participants
    Lock(bool),
}

/// Messages that can be sent by unassigned connections
#[derive(Debug, Deserialize, Clone)]
pub enum IncomingUnassignedMessage {
    /// Request to set a specific name and become a player
    NameRequest(String),
}

/// Messages that can be sent by seated players
#[derive(Debug, Deserialize, Clone)]
pub enum IncomingPlayerMessage {
    /// Select a board cell (board controller only)
    SelectClue {
        /// Category name of the cell
        category: String,
        /// Dollar value of the cell
        value: u32,
    },
    /// Attempt to claim the floor for the active clue
    Buzz,
    /// Submit an answer for the active or final clue
    Answer(String),
    /// Place a Daily Double or final-round wager
    Wager(i64),
    /// Leave the session (lobby only)
    Leave,
}

/// Rejection of a player or host action
///
/// Every rejection is reported back to the acting participant; the
/// engine never drops an invalid action silently.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// The action does not fit the current phase or stage
    #[error("action is not allowed right now")]
    InvalidAction,
    /// The host tried to start without enough players
    #[error("at least {0} players are needed to start")]
    NotEnoughPlayers(usize),
    /// A non-controller tried to select a clue
    #[error("only the board controller may select a clue")]
    NotController,
    /// The player buzzed before the window opened
    #[error("buzzed before the window opened; locked out for this clue")]
    LockedOut,
    /// The player already has a buzz recorded for this clue
    #[error("already buzzed on this clue")]
    AlreadyBuzzed,
    /// The player already answered this clue wrong
    #[error("not eligible to buzz on this clue")]
    Ineligible,
    /// A board-level rejection
    #[error(transparent)]
    Board(#[from] crate::board::Error),
    /// An out-of-range wager
    #[error(transparent)]
    Wager(#[from] crate::wager::InvalidWager),
    /// The question source failed
    #[error(transparent)]
    Source(#[from] crate::board::SourceError),
}

/// End-of-game summary sent to every participant
#[derive(Debug, Serialize, Clone)]
pub struct SummaryMessage {
    /// Final standings, highest total first, as (name, score)
    pub standings: Vec<(String, i64)>,
}

/// Update messages sent to participants about game state changes
#[skip_serializing_none]
#[derive(Debug, Serialize, Clone)]
pub enum UpdateMessage {
    /// Prompt the participant to choose a name
    NameChoose,
    /// Confirm a name assignment
    NameAssign(String),
    /// Report an error with name validation
    NameError(names::Error),
    /// Update the lobby roster
    Lobby(TruncatedVec<String>),
    /// A new round has started
    RoundStarted {
        /// Which round
        round: Round,
        /// The fresh board
        board: BoardSnapshot,
        /// Name of the board controller
        controller: String,
    },
    /// The controller selected a cell
    ClueSelected {
        /// Category of the selected cell
        category: String,
        /// Dollar value of the selected cell
        value: u32,
        /// Name of the selecting player
        selector: String,
        /// Whether the cell hid a Daily Double
        daily_double: bool,
    },
    /// Personal prompt to place a wager within the given range
    WagerPrompt {
        /// Smallest allowed wager
        min: i64,
        /// Largest allowed wager
        max: i64,
    },
    /// The clue prompt is revealed and being read
    ClueRevealed {
        /// Category of the clue
        category: String,
        /// Dollar value of the clue
        value: u32,
        /// The prompt text
        prompt: String,
    },
    /// The buzzers are now open
    BuzzersOpen,
    /// A player won the floor
    Floor {
        /// Name of the floor holder
        player: String,
    },
    /// An answer was judged
    Judged {
        /// Name of the answering player
        player: String,
        /// Whether the answer was accepted
        correct: bool,
        /// Signed score change applied
        delta: i64,
        /// The player's new total
        total: i64,
    },
    /// A cell is closed; the canonical answer is revealed
    CellClosed {
        /// Category of the closed cell
        category: String,
        /// Dollar value of the closed cell
        value: u32,
        /// The canonical answer
        answer: String,
    },
    /// A round's board is exhausted
    RoundComplete(Round),
    /// The final round's category, announced before wagering
    FinalCategory(String),
    /// A final-round wager arrived (host only; amount withheld)
    FinalWagerReceived {
        /// Name of the wagering player
        player: String,
    },
    /// The final clue is revealed to all players
    FinalClue {
        /// The prompt text
        prompt: String,
    },
    /// A final-round answer arrived (host only; text withheld)
    FinalAnswerReceived {
        /// Name of the answering player
        player: String,
    },
    /// One player's final-round reveal
    FinalResult {
        /// Name of the player
        player: String,
        /// The submitted answer, if any
        answer: Option<String>,
        /// The wager at stake
        wager: i64,
        /// Whether the answer was accepted
        correct: bool,
        /// The player's new total
        total: i64,
    },
    /// End-of-game summary
    Summary(SummaryMessage),
    /// Personal rejection of the participant's last action
    ActionRejected(String),
}

impl UpdateMessage {
    /// Converts the update message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// Panics if serialization fails, which should never happen with
    /// the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// Public view of the active clue's stage
#[derive(Debug, Serialize, Clone)]
pub enum ClueStageView {
    /// Waiting for the Daily Double wager
    AwaitingWager {
        /// Name of the wagering player
        player: String,
    },
    /// The clue is being read
    Reading,
    /// The buzzers are open
    Open,
    /// A player holds the floor
    Answering {
        /// Name of the floor holder
        player: String,
    },
}

/// Public view of the clue currently in play
#[skip_serializing_none]
#[derive(Debug, Serialize, Clone)]
pub struct ActiveClueView {
    /// Category of the clue
    pub category: String,
    /// Dollar value of the clue
    pub value: u32,
    /// The prompt, absent while a Daily Double wager is pending
    pub prompt: Option<String>,
    /// Whether the cell hid a Daily Double
    pub daily_double: bool,
    /// Current stage
    pub stage: ClueStageView,
}

/// Public view of the final round's stage
#[derive(Debug, Serialize, Clone)]
pub enum FinalStageView {
    /// Wagers are being collected; the prompt is hidden
    Wagering {
        /// Names of players whose wager arrived
        submitted: Vec<String>,
    },
    /// Answers are being collected
    Answering {
        /// The prompt text
        prompt: String,
        /// Names of players whose answer arrived
        submitted: Vec<String>,
    },
}

/// Metadata about the session for a reconnecting participant
#[derive(Debug, Serialize, Clone)]
pub enum MetainfoMessage {
    /// Information for the session host
    Host {
        /// Whether the session is locked to new participants
        locked: bool,
    },
    /// Information for players
    Player {
        /// The player's current total
        score: i64,
    },
}

/// Sync messages carrying the full state a client needs to render its
/// view, sent on connect or reconnect
#[skip_serializing_none]
#[derive(Debug, Serialize, Clone)]
pub enum SyncMessage {
    /// The session is in the lobby
    Lobby(TruncatedVec<String>),
    /// A regular round is in progress
    Round {
        /// Which round
        round: Round,
        /// Board snapshot with answered flags
        board: BoardSnapshot,
        /// Name of the board controller
        controller: String,
        /// The clue in play, if any
        active: Option<ActiveClueView>,
        /// Current standings as (name, score), highest first
        standings: Vec<(String, i64)>,
    },
    /// The final round is in progress
    Final {
        /// The final category
        category: String,
        /// Stage-specific view
        stage: FinalStageView,
        /// Current standings as (name, score), highest first
        standings: Vec<(String, i64)>,
    },
    /// The game has finished
    Summary(SummaryMessage),
    /// Session metadata
    Metainfo(MetainfoMessage),
    /// Participant is not allowed to join
    NotAllowed,
}

impl SyncMessage {
    /// Converts the sync message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// Panics if serialization fails, which should never happen with
    /// the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// Scheduled wake-ups for timed transitions
///
/// Every alarm carries the generation it was scheduled under; an alarm
/// whose generation no longer matches the game's is stale and ignored,
/// so a timeout can never fire against a state it was not armed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// The reading window elapsed; open the buzzers
    FinishReading {
        /// Scheduling generation
        generation: u64,
    },
    /// The buzz window elapsed with no taker; expire the clue
    CloseBuzzers {
        /// Scheduling generation
        generation: u64,
    },
    /// The floor holder failed to answer in time
    AnswerTimeout {
        /// Scheduling generation
        generation: u64,
    },
    /// The Daily Double selector failed to wager in time
    WagerTimeout {
        /// Scheduling generation
        generation: u64,
    },
    /// The final-round wagering window elapsed
    FinalWagerTimeout {
        /// Scheduling generation
        generation: u64,
    },
    /// The final-round answering window elapsed
    FinalAnswerTimeout {
        /// Scheduling generation
        generation: u64,
    },
}

impl AlarmMessage {
    fn generation(self) -> u64 {
        match self {
            AlarmMessage::FinishReading { generation }
            | AlarmMessage::CloseBuzzers { generation }
            | AlarmMessage::AnswerTimeout { generation }
            | AlarmMessage::WagerTimeout { generation }
            | AlarmMessage::FinalWagerTimeout { generation }
            | AlarmMessage::FinalAnswerTimeout { generation } => generation,
        }
    }
}

/// The authoritative state of one session
///
/// Owns the participants, names, scores, and phase machine. Clients
/// never mutate state directly; every change flows through
/// [`Game::receive_message`] or [`Game::receive_alarm`] and is
/// broadcast back out through the injected tunnels.
#[derive(Serialize, Deserialize)]
pub struct Game {
    /// Session policy knobs
    options: Options,
    /// All connected participants and their roles
    pub participants: Participants,
    /// Name assignments and validation
    names: Names,
    /// Authoritative score totals
    pub scoreboard: Scoreboard,
    /// Current phase of the session
    pub phase: Phase,
    /// Whether the session is locked to new participants
    locked: bool,
    /// The host's participant id
    host_id: Id,
    /// Seated players in join order
    player_order: Vec<Id>,
    /// Bumped on every timed transition to invalidate stale alarms
    alarm_generation: u64,
}

impl Debug for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

// Convenience methods
impl Game {
    /// Creates a new session in the lobby phase
    pub fn new(options: Options, host_id: Id) -> Self {
        Self {
            options,
            participants: Participants::with_host_id(host_id),
            names: Names::default(),
            scoreboard: Scoreboard::default(),
            phase: Phase::Lobby,
            locked: false,
            host_id,
            player_order: Vec::new(),
            alarm_generation: 0,
        }
    }

    /// Whether the game has reached its terminal phase
    pub fn is_complete(&self) -> bool {
        matches!(self.phase, Phase::Complete)
    }

    /// The host's participant id
    pub fn host_id(&self) -> Id {
        self.host_id
    }

    /// Current standings as (name, score), highest total first
    fn standings_named(&self) -> Vec<(String, i64)> {
        self.scoreboard
            .standings_descending()
            .into_iter()
            .map(|standing| {
                (
                    self.names.get_name(&standing.player).unwrap_or_default(),
                    standing.score,
                )
            })
            .collect_vec()
    }

    /// The frozen end-of-game summary
    fn summary_message(&self) -> SummaryMessage {
        SummaryMessage {
            standings: self
                .scoreboard
                .freeze()
                .iter()
                .map(|standing| {
                    (
                        self.names.get_name(&standing.player).unwrap_or_default(),
                        standing.score,
                    )
                })
                .collect_vec(),
        }
    }

    /// The lobby roster of seated player names
    fn lobby_names<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        tunnel_finder: F,
    ) -> TruncatedVec<String> {
        const LIMIT: usize = 50;

        let player_names = self
            .participants
            .specific_vec(Role::Player, tunnel_finder)
            .into_iter()
            .filter_map(|(_, _, profile)| match profile {
                Profile::Player { name } => Some(name),
                _ => None,
            })
            .unique();

        TruncatedVec::new(
            player_names,
            LIMIT,
            self.participants.specific_count(Role::Player),
        )
    }
}

// Network
impl Game {
    /// Adds a new unassigned participant to the session
    ///
    /// # Errors
    ///
    /// Returns [`participant::Error::MaximumParticipants`] if the
    /// session is full.
    pub fn add_unassigned<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        id: Id,
        tunnel_finder: F,
    ) -> Result<(), participant::Error> {
        self.participants.add(id, Profile::Unassigned)?;

        if !self.locked {
            self.participants
                .send_message(&UpdateMessage::NameChoose, id, tunnel_finder);
        }

        Ok(())
    }

    /// Assigns a name to a participant and seats them as a player
    fn assign_player_name<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        id: Id,
        requested: &str,
        tunnel_finder: F,
    ) -> Result<(), names::Error> {
        let name = self.names.set_name(id, requested)?;
        tracing::debug!(%id, name, "player joined");

        self.participants
            .update_profile(id, Profile::Player { name: name.clone() });
        self.scoreboard.ensure(id);
        self.player_order.push(id);

        self.participants
            .send_message(&UpdateMessage::NameAssign(name), id, &tunnel_finder);

        let lobby = self.lobby_names(&tunnel_finder);
        self.participants
            .announce(&UpdateMessage::Lobby(lobby), &tunnel_finder);

        let state = self.state_message(Role::Player, &tunnel_finder);
        self.participants.send_state(&state, id, tunnel_finder);

        Ok(())
    }

    /// Handles an incoming message from a participant
    ///
    /// Validates that the message fits the sender's role, routes it to
    /// the phase-appropriate handler, and reports any rejection back
    /// to the sender as an [`UpdateMessage::ActionRejected`].
    pub fn receive_message<
        T: Tunnel,
        F: Fn(Id) -> Option<T>,
        S: FnMut(AlarmMessage, Duration),
        Q: QuestionSource,
    >(
        &mut self,
        participant_id: Id,
        message: IncomingMessage,
        source: &Q,
        mut schedule_message: S,
        tunnel_finder: F,
    ) {
        let Some(profile) = self.participants.get(participant_id) else {
            return;
        };

        if !message.follows(profile.role()) {
            return;
        }

        let result = match message {
            IncomingMessage::Unassigned(_) if self.locked => Ok(()),
            IncomingMessage::Host(IncomingHostMessage::Lock(lock_state)) => {
                self.locked = lock_state;
                Ok(())
            }
            IncomingMessage::Unassigned(IncomingUnassignedMessage::NameRequest(requested)) => {
                if matches!(self.phase, Phase::Lobby) {
                    if let Err(error) =
                        self.assign_player_name(participant_id, &requested, &tunnel_finder)
                    {
                        self.participants.send_message(
                            &UpdateMessage::NameError(error),
                            participant_id,
                            &tunnel_finder,
                        );
                    }
                    Ok(())
                } else {
                    Err(ActionError::InvalidAction)
                }
            }
            IncomingMessage::Host(IncomingHostMessage::Start) => {
                self.handle_start(source, &tunnel_finder)
            }
            IncomingMessage::Player(player_message) => match player_message {
                IncomingPlayerMessage::SelectClue { category, value } => self.handle_select(
                    participant_id,
                    &category,
                    value,
                    source,
                    &mut schedule_message,
                    &tunnel_finder,
                ),
                IncomingPlayerMessage::Buzz => {
                    self.handle_buzz(participant_id, &mut schedule_message, &tunnel_finder)
                }
                IncomingPlayerMessage::Answer(text) => self.handle_answer(
                    participant_id,
                    &text,
                    source,
                    &mut schedule_message,
                    &tunnel_finder,
                ),
                IncomingPlayerMessage::Wager(amount) => self.handle_wager(
                    participant_id,
                    amount,
                    &mut schedule_message,
                    &tunnel_finder,
                ),
                IncomingPlayerMessage::Leave => self.handle_leave(participant_id, &tunnel_finder),
            },
        };

        if let Err(error) = result {
            self.participants.send_message(
                &UpdateMessage::ActionRejected(error.to_string()),
                participant_id,
                &tunnel_finder,
            );
        }
    }

    /// Starts the game from the lobby
    fn handle_start<T: Tunnel, F: Fn(Id) -> Option<T>, Q: QuestionSource>(
        &mut self,
        source: &Q,
        tunnel_finder: &F,
    ) -> Result<(), ActionError> {
        if !matches!(self.phase, Phase::Lobby) {
            return Err(ActionError::InvalidAction);
        }
        let seated = self.player_order.len();
        if seated < constants::session::MIN_PLAYERS_TO_START {
            return Err(ActionError::NotEnoughPlayers(
                constants::session::MIN_PLAYERS_TO_START,
            ));
        }

        self.locked = true;
        tracing::info!(players = seated, "game started");
        self.start_round(Round::One, source, tunnel_finder)
    }

    /// Generates a round's board and announces it
    ///
    /// The first round's controller is the first player who joined;
    /// the second round's is the player with the lowest score.
    fn start_round<T: Tunnel, F: Fn(Id) -> Option<T>, Q: QuestionSource>(
        &mut self,
        round: Round,
        source: &Q,
        tunnel_finder: &F,
    ) -> Result<(), ActionError> {
        let board = Board::generate(source, round)?;
        let controller = match round {
            Round::One => *self
                .player_order
                .first()
                .ok_or(ActionError::InvalidAction)?,
            Round::Two => self
                .scoreboard
                .standings_ascending()
                .first()
                .map(|standing| standing.player)
                .ok_or(ActionError::InvalidAction)?,
        };

        tracing::info!(?round, %controller, "round started");
        let snapshot = board.snapshot();
        self.phase = Phase::Round(Box::new(RoundState {
            round,
            board,
            controller,
            active: None,
        }));
        self.participants.announce(
            &UpdateMessage::RoundStarted {
                round,
                board: snapshot,
                controller: self.names.get_name(&controller).unwrap_or_default(),
            },
            tunnel_finder,
        );
        Ok(())
    }

    /// Handles the controller selecting a board cell
    fn handle_select<
        T: Tunnel,
        F: Fn(Id) -> Option<T>,
        S: FnMut(AlarmMessage, Duration),
        Q: QuestionSource,
    >(
        &mut self,
        player: Id,
        category: &str,
        value: u32,
        source: &Q,
        schedule_message: &mut S,
        tunnel_finder: &F,
    ) -> Result<(), ActionError> {
        let Phase::Round(round_state) = &mut self.phase else {
            return Err(ActionError::InvalidAction);
        };
        if round_state.active.is_some() {
            return Err(ActionError::InvalidAction);
        }
        if round_state.controller != player {
            return Err(ActionError::NotController);
        }

        let (clue, daily_double) = round_state.board.select(category, value, source)?;
        tracing::debug!(category, value, daily_double, "clue selected");

        self.participants.announce(
            &UpdateMessage::ClueSelected {
                category: clue.category.clone(),
                value: clue.value,
                selector: self.names.get_name(&player).unwrap_or_default(),
                daily_double,
            },
            tunnel_finder,
        );

        self.alarm_generation += 1;
        let generation = self.alarm_generation;

        let stage = if daily_double {
            let context = WagerContext::DailyDouble {
                floor: self.options.wager_floor,
                score: self.scoreboard.score(player),
                top_board_value: round_state.board.top_value(),
            };
            let (min, max) = context.bounds();
            self.participants.send_message(
                &UpdateMessage::WagerPrompt { min, max },
                player,
                tunnel_finder,
            );
            schedule_message(
                AlarmMessage::WagerTimeout { generation },
                self.options.wager_time,
            );
            ClueStage::AwaitingWager
        } else {
            self.participants.announce(
                &UpdateMessage::ClueRevealed {
                    category: clue.category.clone(),
                    value: clue.value,
                    prompt: clue.prompt.clone(),
                },
                tunnel_finder,
            );
            schedule_message(
                AlarmMessage::FinishReading { generation },
                self.options.read_window,
            );
            ClueStage::Reading
        };

        round_state.active = Some(ActiveClue {
            clue,
            daily_double,
            wager: None,
            stage,
            buzzer: Buzzer::default(),
        });
        Ok(())
    }

    /// Handles a buzz attempt on the active clue
    fn handle_buzz<T: Tunnel, F: Fn(Id) -> Option<T>, S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        player: Id,
        schedule_message: &mut S,
        tunnel_finder: &F,
    ) -> Result<(), ActionError> {
        let Phase::Round(round_state) = &mut self.phase else {
            return Err(ActionError::InvalidAction);
        };
        let Some(active) = round_state.active.as_mut() else {
            return Err(ActionError::InvalidAction);
        };

        match active.stage {
            ClueStage::Reading => {
                active.buzzer.submit(player);
                Err(ActionError::LockedOut)
            }
            ClueStage::Open => match active.buzzer.submit(player) {
                BuzzOutcome::Floor => {
                    active.stage = ClueStage::Answering(player);
                    self.alarm_generation += 1;
                    let generation = self.alarm_generation;
                    self.participants.announce(
                        &UpdateMessage::Floor {
                            player: self.names.get_name(&player).unwrap_or_default(),
                        },
                        tunnel_finder,
                    );
                    schedule_message(
                        AlarmMessage::AnswerTimeout { generation },
                        self.options.answer_time,
                    );
                    Ok(())
                }
                BuzzOutcome::Queued => Ok(()),
                BuzzOutcome::LockedOut => Err(ActionError::LockedOut),
                BuzzOutcome::AlreadyBuzzed => Err(ActionError::AlreadyBuzzed),
                BuzzOutcome::Ineligible => Err(ActionError::Ineligible),
            },
            // the floor is taken but the attempt still counts: if the
            // holder answers wrong the floor passes by arrival order
            ClueStage::Answering(_) => match active.buzzer.submit(player) {
                BuzzOutcome::Floor | BuzzOutcome::Queued => Ok(()),
                BuzzOutcome::LockedOut => Err(ActionError::LockedOut),
                BuzzOutcome::AlreadyBuzzed => Err(ActionError::AlreadyBuzzed),
                BuzzOutcome::Ineligible => Err(ActionError::Ineligible),
            },
            ClueStage::AwaitingWager => Err(ActionError::InvalidAction),
        }
    }

    /// Routes an answer to the active clue or the final round
    fn handle_answer<
        T: Tunnel,
        F: Fn(Id) -> Option<T>,
        S: FnMut(AlarmMessage, Duration),
        Q: QuestionSource,
    >(
        &mut self,
        player: Id,
        text: &str,
        source: &Q,
        schedule_message: &mut S,
        tunnel_finder: &F,
    ) -> Result<(), ActionError> {
        let in_round = match &self.phase {
            Phase::Round(round_state) => {
                match round_state.active.as_ref().map(|active| active.stage) {
                    Some(ClueStage::Answering(current)) if current == player => true,
                    _ => return Err(ActionError::InvalidAction),
                }
            }
            Phase::Final(final_state) if matches!(final_state.stage, FinalStage::Answering) => {
                false
            }
            _ => return Err(ActionError::InvalidAction),
        };

        if in_round {
            self.resolve_answer(player, Some(text), source, schedule_message, tunnel_finder)
        } else {
            self.record_final_answer(player, text, tunnel_finder)
        }
    }

    /// Judges the floor holder's answer (or its absence, on timeout)
    /// and applies the consequences.
    ///
    /// A correct answer banks the stake, closes the cell, and hands
    /// board control to the answerer. A wrong answer deducts the
    /// stake; the floor then passes to the earliest queued buzz, the
    /// window reopens if eligible players remain, or the cell expires
    /// with its answer revealed.
    fn resolve_answer<
        T: Tunnel,
        F: Fn(Id) -> Option<T>,
        S: FnMut(AlarmMessage, Duration),
        Q: QuestionSource,
    >(
        &mut self,
        player: Id,
        text: Option<&str>,
        source: &Q,
        schedule_message: &mut S,
        tunnel_finder: &F,
    ) -> Result<(), ActionError> {
        self.alarm_generation += 1;
        let generation = self.alarm_generation;

        let mut round_done = None;

        {
            let Phase::Round(round_state) = &mut self.phase else {
                return Err(ActionError::InvalidAction);
            };
            let Some(active) = round_state.active.as_mut() else {
                return Err(ActionError::InvalidAction);
            };

            let stake = active.wager.unwrap_or(i64::from(active.clue.value));
            let correct = text
                .is_some_and(|t| answer::matches(t, &active.clue.answer, &self.options.matching));
            let delta = if correct { stake } else { -stake };
            let total = self.scoreboard.apply(player, delta);
            tracing::debug!(%player, correct, delta, total, "answer judged");

            self.participants.announce(
                &UpdateMessage::Judged {
                    player: self.names.get_name(&player).unwrap_or_default(),
                    correct,
                    delta,
                    total,
                },
                tunnel_finder,
            );

            if correct {
                round_state
                    .board
                    .mark_answered(&active.clue.category, active.clue.value)?;
                self.participants.announce(
                    &UpdateMessage::CellClosed {
                        category: active.clue.category.clone(),
                        value: active.clue.value,
                        answer: active.clue.answer.clone(),
                    },
                    tunnel_finder,
                );
                round_state.controller = player;
                round_state.active = None;
                if round_state.board.is_complete() {
                    round_done = Some(round_state.round);
                }
            } else {
                active.buzzer.mark_wrong(player);
                if let Some(next) = active.buzzer.next_floor() {
                    // floor passes directly; no new buzz window
                    active.stage = ClueStage::Answering(next);
                    self.participants.announce(
                        &UpdateMessage::Floor {
                            player: self.names.get_name(&next).unwrap_or_default(),
                        },
                        tunnel_finder,
                    );
                    schedule_message(
                        AlarmMessage::AnswerTimeout { generation },
                        self.options.answer_time,
                    );
                } else if active.daily_double
                    || active
                        .buzzer
                        .eligible_remaining(self.player_order.iter())
                        .is_empty()
                {
                    round_state
                        .board
                        .mark_answered(&active.clue.category, active.clue.value)?;
                    self.participants.announce(
                        &UpdateMessage::CellClosed {
                            category: active.clue.category.clone(),
                            value: active.clue.value,
                            answer: active.clue.answer.clone(),
                        },
                        tunnel_finder,
                    );
                    round_state.active = None;
                    if round_state.board.is_complete() {
                        round_done = Some(round_state.round);
                    }
                } else {
                    active.stage = ClueStage::Open;
                    active.buzzer.open_window();
                    self.participants
                        .announce(&UpdateMessage::BuzzersOpen, tunnel_finder);
                    schedule_message(
                        AlarmMessage::CloseBuzzers { generation },
                        self.options.buzz_window,
                    );
                }
            }
        }

        if let Some(round) = round_done {
            self.finish_round(round, source, schedule_message, tunnel_finder);
        }
        Ok(())
    }

    /// Handles a Daily Double or final-round wager
    fn handle_wager<T: Tunnel, F: Fn(Id) -> Option<T>, S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        player: Id,
        amount: i64,
        schedule_message: &mut S,
        tunnel_finder: &F,
    ) -> Result<(), ActionError> {
        match &mut self.phase {
            Phase::Round(round_state) => {
                if round_state.controller != player {
                    return Err(ActionError::InvalidAction);
                }
                let top_board_value = round_state.board.top_value();
                let Some(active) = round_state.active.as_mut() else {
                    return Err(ActionError::InvalidAction);
                };
                if !matches!(active.stage, ClueStage::AwaitingWager) {
                    return Err(ActionError::InvalidAction);
                }

                let context = WagerContext::DailyDouble {
                    floor: self.options.wager_floor,
                    score: self.scoreboard.score(player),
                    top_board_value,
                };
                wager::validate(amount, &context)?;

                tracing::debug!(%player, amount, "daily double wager placed");
                active.wager = Some(amount);
                active.stage = ClueStage::Answering(player);
                self.alarm_generation += 1;
                let generation = self.alarm_generation;
                self.participants.announce(
                    &UpdateMessage::ClueRevealed {
                        category: active.clue.category.clone(),
                        value: active.clue.value,
                        prompt: active.clue.prompt.clone(),
                    },
                    tunnel_finder,
                );
                schedule_message(
                    AlarmMessage::AnswerTimeout { generation },
                    self.options.answer_time,
                );
                Ok(())
            }
            Phase::Final(final_state) => {
                if !matches!(final_state.stage, FinalStage::Wagering) {
                    return Err(ActionError::InvalidAction);
                }
                let Some(score) = final_state.entry_scores.get(&player).copied() else {
                    return Err(ActionError::InvalidAction);
                };
                if final_state.wagers.contains_key(&player) {
                    return Err(ActionError::InvalidAction);
                }

                wager::validate(amount, &WagerContext::FinalJeopardy { score })?;
                final_state.wagers.insert(player, amount);

                self.participants.announce_specific(
                    Role::Host,
                    &UpdateMessage::FinalWagerReceived {
                        player: self.names.get_name(&player).unwrap_or_default(),
                    },
                    tunnel_finder,
                );

                if final_state.wagers.len() == final_state.entry_scores.len() {
                    final_state.stage = FinalStage::Answering;
                    self.alarm_generation += 1;
                    let generation = self.alarm_generation;
                    self.participants.announce(
                        &UpdateMessage::FinalClue {
                            prompt: final_state.clue.prompt.clone(),
                        },
                        tunnel_finder,
                    );
                    schedule_message(
                        AlarmMessage::FinalAnswerTimeout { generation },
                        self.options.final_answer_time,
                    );
                }
                Ok(())
            }
            _ => Err(ActionError::InvalidAction),
        }
    }

    /// Records a final-round answer, resolving the round once every
    /// player has answered
    fn record_final_answer<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        player: Id,
        text: &str,
        tunnel_finder: &F,
    ) -> Result<(), ActionError> {
        let all_in = {
            let Phase::Final(final_state) = &mut self.phase else {
                return Err(ActionError::InvalidAction);
            };
            if !matches!(final_state.stage, FinalStage::Answering)
                || !final_state.entry_scores.contains_key(&player)
                || final_state.answers.contains_key(&player)
            {
                return Err(ActionError::InvalidAction);
            }
            final_state.answers.insert(player, text.to_owned());
            self.participants.announce_specific(
                Role::Host,
                &UpdateMessage::FinalAnswerReceived {
                    player: self.names.get_name(&player).unwrap_or_default(),
                },
                tunnel_finder,
            );
            final_state.answers.len() == final_state.entry_scores.len()
        };

        if all_in {
            self.resolve_final(tunnel_finder);
        }
        Ok(())
    }

    /// Handles a player leaving the lobby
    fn handle_leave<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        player: Id,
        tunnel_finder: &F,
    ) -> Result<(), ActionError> {
        if !matches!(self.phase, Phase::Lobby) {
            return Err(ActionError::InvalidAction);
        }

        tracing::debug!(%player, "player left lobby");
        self.names.remove(player);
        self.scoreboard.remove(player);
        self.player_order.retain(|id| *id != player);
        self.participants.close_tunnel(player, tunnel_finder);
        self.participants.remove(player);

        let lobby = self.lobby_names(tunnel_finder);
        self.participants
            .announce(&UpdateMessage::Lobby(lobby), tunnel_finder);
        Ok(())
    }

    /// Announces a finished round and advances to the next phase
    ///
    /// A question-source failure here cannot be retried by any player
    /// action, so the game ends with the standings as they are rather
    /// than staying on an exhausted board.
    fn finish_round<
        T: Tunnel,
        F: Fn(Id) -> Option<T>,
        S: FnMut(AlarmMessage, Duration),
        Q: QuestionSource,
    >(
        &mut self,
        round: Round,
        source: &Q,
        schedule_message: &mut S,
        tunnel_finder: &F,
    ) {
        self.participants
            .announce(&UpdateMessage::RoundComplete(round), tunnel_finder);

        let advanced = match round {
            Round::One => self.start_round(Round::Two, source, tunnel_finder),
            Round::Two => self.start_final(source, schedule_message, tunnel_finder),
        };
        if let Err(error) = advanced {
            tracing::warn!(%error, "failed to advance past a finished round; ending the game");
            self.alarm_generation += 1;
            self.phase = Phase::Complete;
            self.participants.announce(
                &UpdateMessage::Summary(self.summary_message()),
                tunnel_finder,
            );
        }
    }

    /// Starts the final round: announces its category and prompts
    /// every player for a wager within their personal bounds.
    ///
    /// Every seated player takes part; players at or below zero may
    /// only wager exactly zero.
    fn start_final<
        T: Tunnel,
        F: Fn(Id) -> Option<T>,
        S: FnMut(AlarmMessage, Duration),
        Q: QuestionSource,
    >(
        &mut self,
        source: &Q,
        schedule_message: &mut S,
        tunnel_finder: &F,
    ) -> Result<(), ActionError> {
        let clue = source.final_clue()?;
        let entry_scores: HashMap<Id, i64> = self
            .player_order
            .iter()
            .map(|id| (*id, self.scoreboard.score(*id)))
            .collect();

        tracing::info!(category = clue.category, "final round started");
        self.participants.announce(
            &UpdateMessage::FinalCategory(clue.category.clone()),
            tunnel_finder,
        );
        self.participants.announce_with(
            |id, role| {
                if !matches!(role, Role::Player) {
                    return None;
                }
                let (min, max) = WagerContext::FinalJeopardy {
                    score: entry_scores.get(&id).copied().unwrap_or_default(),
                }
                .bounds();
                Some(UpdateMessage::WagerPrompt { min, max })
            },
            tunnel_finder,
        );

        self.alarm_generation += 1;
        let generation = self.alarm_generation;
        schedule_message(
            AlarmMessage::FinalWagerTimeout { generation },
            self.options.final_wager_time,
        );

        self.phase = Phase::Final(Box::new(FinalState {
            clue,
            stage: FinalStage::Wagering,
            entry_scores,
            wagers: HashMap::new(),
            answers: HashMap::new(),
        }));
        Ok(())
    }

    /// Resolves the final round and completes the game
    ///
    /// Reveals players lowest pre-final score first. A player without
    /// a wager stakes zero; a player without an answer is wrong.
    fn resolve_final<T: Tunnel, F: Fn(Id) -> Option<T>>(&mut self, tunnel_finder: &F) {
        self.alarm_generation += 1;

        let Phase::Final(final_state) = std::mem::replace(&mut self.phase, Phase::Complete) else {
            return;
        };
        let FinalState {
            clue,
            entry_scores,
            wagers,
            answers,
            ..
        } = *final_state;

        let reveal_order = entry_scores
            .iter()
            .map(|(id, score)| (*id, *score))
            .sorted_by_key(|(id, score)| (*score, *id))
            .collect_vec();

        for (player, _) in reveal_order {
            let staked = wagers.get(&player).copied().unwrap_or_default();
            let answer_text = answers.get(&player).cloned();
            let correct = answer_text
                .as_deref()
                .is_some_and(|t| answer::matches(t, &clue.answer, &self.options.matching));
            let delta = if correct { staked } else { -staked };
            let total = self.scoreboard.apply(player, delta);

            self.participants.announce(
                &UpdateMessage::FinalResult {
                    player: self.names.get_name(&player).unwrap_or_default(),
                    answer: answer_text,
                    wager: staked,
                    correct,
                    total,
                },
                tunnel_finder,
            );
        }

        tracing::info!("game complete");
        self.participants
            .announce(&UpdateMessage::Summary(self.summary_message()), tunnel_finder);
    }

    /// Handles a scheduled alarm for a timed transition
    ///
    /// Alarms whose generation no longer matches the game's are stale
    /// and ignored.
    pub fn receive_alarm<
        T: Tunnel,
        F: Fn(Id) -> Option<T>,
        S: FnMut(AlarmMessage, Duration),
        Q: QuestionSource,
    >(
        &mut self,
        message: AlarmMessage,
        source: &Q,
        mut schedule_message: S,
        tunnel_finder: F,
    ) {
        if message.generation() != self.alarm_generation {
            return;
        }

        match message {
            AlarmMessage::FinishReading { .. } => {
                self.alarm_generation += 1;
                let generation = self.alarm_generation;
                if let Phase::Round(round_state) = &mut self.phase {
                    if let Some(active) = round_state.active.as_mut() {
                        if matches!(active.stage, ClueStage::Reading) {
                            active.stage = ClueStage::Open;
                            active.buzzer.open_window();
                            self.participants
                                .announce(&UpdateMessage::BuzzersOpen, &tunnel_finder);
                            schedule_message(
                                AlarmMessage::CloseBuzzers { generation },
                                self.options.buzz_window,
                            );
                        }
                    }
                }
            }
            AlarmMessage::CloseBuzzers { .. } => {
                self.alarm_generation += 1;
                let mut round_done = None;
                if let Phase::Round(round_state) = &mut self.phase {
                    if let Some(active) = round_state.active.as_ref() {
                        if matches!(active.stage, ClueStage::Open) {
                            tracing::debug!("clue expired with no taker");
                            let _ = round_state
                                .board
                                .mark_answered(&active.clue.category, active.clue.value);
                            self.participants.announce(
                                &UpdateMessage::CellClosed {
                                    category: active.clue.category.clone(),
                                    value: active.clue.value,
                                    answer: active.clue.answer.clone(),
                                },
                                &tunnel_finder,
                            );
                            round_state.active = None;
                            if round_state.board.is_complete() {
                                round_done = Some(round_state.round);
                            }
                        }
                    }
                }
                if let Some(round) = round_done {
                    self.finish_round(round, source, &mut schedule_message, &tunnel_finder);
                }
            }
            AlarmMessage::AnswerTimeout { .. } => {
                let answering = match &self.phase {
                    Phase::Round(round_state) => {
                        match round_state.active.as_ref().map(|active| active.stage) {
                            Some(ClueStage::Answering(player)) => Some(player),
                            _ => None,
                        }
                    }
                    _ => None,
                };
                if let Some(player) = answering {
                    tracing::debug!(%player, "answer window elapsed");
                    let _ = self.resolve_answer(
                        player,
                        None,
                        source,
                        &mut schedule_message,
                        &tunnel_finder,
                    );
                }
            }
            AlarmMessage::WagerTimeout { .. } => {
                // wager defaults to the smallest allowed amount
                let pending = match &self.phase {
                    Phase::Round(round_state) => match round_state.active.as_ref() {
                        Some(active) if matches!(active.stage, ClueStage::AwaitingWager) => {
                            let context = WagerContext::DailyDouble {
                                floor: self.options.wager_floor,
                                score: self.scoreboard.score(round_state.controller),
                                top_board_value: round_state.board.top_value(),
                            };
                            Some((round_state.controller, context.bounds().0))
                        }
                        _ => None,
                    },
                    _ => None,
                };
                if let Some((player, minimum)) = pending {
                    tracing::debug!(%player, minimum, "wager window elapsed");
                    let _ =
                        self.handle_wager(player, minimum, &mut schedule_message, &tunnel_finder);
                }
            }
            AlarmMessage::FinalWagerTimeout { .. } => {
                self.alarm_generation += 1;
                let generation = self.alarm_generation;
                if let Phase::Final(final_state) = &mut self.phase {
                    if matches!(final_state.stage, FinalStage::Wagering) {
                        tracing::debug!("final wager window elapsed");
                        for player in final_state.entry_scores.keys() {
                            final_state.wagers.entry(*player).or_insert(0);
                        }
                        final_state.stage = FinalStage::Answering;
                        self.participants.announce(
                            &UpdateMessage::FinalClue {
                                prompt: final_state.clue.prompt.clone(),
                            },
                            &tunnel_finder,
                        );
                        schedule_message(
                            AlarmMessage::FinalAnswerTimeout { generation },
                            self.options.final_answer_time,
                        );
                    }
                }
            }
            AlarmMessage::FinalAnswerTimeout { .. } => {
                if matches!(
                    &self.phase,
                    Phase::Final(final_state) if matches!(final_state.stage, FinalStage::Answering)
                ) {
                    tracing::debug!("final answer window elapsed");
                    self.resolve_final(&tunnel_finder);
                }
            }
        }
    }

    /// Returns the message necessary to synchronize a participant's
    /// view with the current game state
    pub fn state_message<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        role: Role,
        tunnel_finder: F,
    ) -> SyncMessage {
        match &self.phase {
            Phase::Lobby => SyncMessage::Lobby(self.lobby_names(tunnel_finder)),
            Phase::Round(round_state) => SyncMessage::Round {
                round: round_state.round,
                board: round_state.board.snapshot(),
                controller: self
                    .names
                    .get_name(&round_state.controller)
                    .unwrap_or_default(),
                active: round_state.active.as_ref().map(|active| ActiveClueView {
                    category: active.clue.category.clone(),
                    value: active.clue.value,
                    prompt: match active.stage {
                        ClueStage::AwaitingWager => None,
                        _ => Some(active.clue.prompt.clone()),
                    },
                    daily_double: active.daily_double,
                    stage: match active.stage {
                        ClueStage::AwaitingWager => ClueStageView::AwaitingWager {
                            player: self
                                .names
                                .get_name(&round_state.controller)
                                .unwrap_or_default(),
                        },
                        ClueStage::Reading => ClueStageView::Reading,
                        ClueStage::Open => ClueStageView::Open,
                        ClueStage::Answering(player) => ClueStageView::Answering {
                            player: self.names.get_name(&player).unwrap_or_default(),
                        },
                    },
                }),
                standings: self.standings_named(),
            },
            Phase::Final(final_state) => SyncMessage::Final {
                category: final_state.clue.category.clone(),
                stage: match final_state.stage {
                    FinalStage::Wagering => FinalStageView::Wagering {
                        submitted: final_state
                            .wagers
                            .keys()
                            .filter_map(|id| self.names.get_name(id))
                            .sorted()
                            .collect_vec(),
                    },
                    FinalStage::Answering => FinalStageView::Answering {
                        prompt: final_state.clue.prompt.clone(),
                        submitted: final_state
                            .answers
                            .keys()
                            .filter_map(|id| self.names.get_name(id))
                            .sorted()
                            .collect_vec(),
                    },
                },
                standings: self.standings_named(),
            },
            Phase::Complete => match role {
                Role::Unassigned => SyncMessage::NotAllowed,
                _ => SyncMessage::Summary(self.summary_message()),
            },
        }
    }

    /// Re-synchronizes a participant after a connect or reconnect
    pub fn update_session<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        participant_id: Id,
        tunnel_finder: F,
    ) {
        let Some(profile) = self.participants.get(participant_id) else {
            return;
        };

        match profile {
            Profile::Host => {
                let state = self.state_message(Role::Host, &tunnel_finder);
                self.participants
                    .send_state(&state, participant_id, &tunnel_finder);
                self.participants.send_state(
                    &SyncMessage::Metainfo(MetainfoMessage::Host {
                        locked: self.locked,
                    }),
                    participant_id,
                    tunnel_finder,
                );
            }
            Profile::Player { name } => {
                self.participants.send_message(
                    &UpdateMessage::NameAssign(name),
                    participant_id,
                    &tunnel_finder,
                );
                self.participants.send_state(
                    &SyncMessage::Metainfo(MetainfoMessage::Player {
                        score: self.scoreboard.score(participant_id),
                    }),
                    participant_id,
                    &tunnel_finder,
                );
                let state = self.state_message(Role::Player, &tunnel_finder);
                self.participants
                    .send_state(&state, participant_id, &tunnel_finder);
            }
            Profile::Unassigned if self.locked => {}
            Profile::Unassigned => {
                self.participants.send_message(
                    &UpdateMessage::NameChoose,
                    participant_id,
                    tunnel_finder,
                );
            }
        }
    }

    /// Ends the session and closes every live tunnel
    pub fn shut_down<T: Tunnel, F: Fn(Id) -> Option<T>>(&mut self, tunnel_finder: F) {
        self.phase = Phase::Complete;
        for (_, tunnel, _) in self.participants.vec(&tunnel_finder) {
            tunnel.close();
        }
    }
}
