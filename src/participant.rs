//! Participant tracking and message fan-out
//!
//! Tracks every connection attached to a session together with its
//! role (host, player, or a connection that has not joined yet) and
//! provides the helpers the state machine uses to address them: send
//! to one participant, announce to everyone, or announce to a single
//! role. Connection status is not stored — a participant counts as
//! connected exactly when the tunnel finder produces a tunnel for it.

use std::{
    collections::{HashMap, HashSet},
    fmt::Display,
    str::FromStr,
};

use enum_map::{Enum, EnumMap};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    game::{SyncMessage, UpdateMessage},
    session::Tunnel,
};

/// A unique identifier for a participant, stable across reconnects
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random participant ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Id {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// A participant's role together with its role-specific data
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Profile {
    /// A connection that has not requested a name yet
    Unassigned,
    /// The host controlling the session lifecycle
    Host,
    /// A seated player
    Player {
        /// The player's validated display name
        name: String,
    },
}

/// Just the role discriminant, used for filtering and role checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
pub enum Role {
    /// An unassigned connection
    Unassigned,
    /// The session host
    Host,
    /// A seated player
    Player,
}

impl Profile {
    /// The role of this profile without its data
    pub fn role(&self) -> Role {
        match self {
            Profile::Unassigned => Role::Unassigned,
            Profile::Host => Role::Host,
            Profile::Player { .. } => Role::Player,
        }
    }
}

/// Serialization helper; the reverse mapping is rebuilt on load
#[derive(Deserialize)]
struct ParticipantsSerde {
    mapping: HashMap<Id, Profile>,
}

/// All participants of a session, indexed by id and by role
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(from = "ParticipantsSerde")]
pub struct Participants {
    /// Primary mapping from participant id to profile
    mapping: HashMap<Id, Profile>,

    /// Role-indexed reverse mapping for efficient filtering
    #[serde(skip_serializing)]
    by_role: EnumMap<Role, HashSet<Id>>,
}

impl From<ParticipantsSerde> for Participants {
    fn from(serde: ParticipantsSerde) -> Self {
        let ParticipantsSerde { mapping } = serde;
        let mut by_role: EnumMap<Role, HashSet<Id>> = EnumMap::default();
        for (id, profile) in &mapping {
            by_role[profile.role()].insert(*id);
        }
        Self { mapping, by_role }
    }
}

/// Errors that can occur when admitting participants
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The session has reached the maximum number of participants
    #[error("maximum number of participants reached")]
    MaximumParticipants,
}

impl Participants {
    /// Creates a participant table with the host already seated
    pub fn with_host_id(host_id: Id) -> Self {
        let mut participants = Self::default();
        participants.mapping.insert(host_id, Profile::Host);
        participants.by_role[Role::Host].insert(host_id);
        participants
    }

    /// All participants with a live tunnel, as (id, tunnel, profile)
    pub fn vec<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        tunnel_finder: F,
    ) -> Vec<(Id, T, Profile)> {
        self.by_role
            .values()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| match (tunnel_finder(*id), self.mapping.get(id)) {
                (Some(tunnel), Some(profile)) => Some((*id, tunnel, profile.clone())),
                _ => None,
            })
            .collect_vec()
    }

    /// Connected participants of one role, as (id, tunnel, profile)
    pub fn specific_vec<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        filter: Role,
        tunnel_finder: F,
    ) -> Vec<(Id, T, Profile)> {
        self.by_role[filter]
            .iter()
            .filter_map(|id| match (tunnel_finder(*id), self.mapping.get(id)) {
                (Some(tunnel), Some(profile)) => Some((*id, tunnel, profile.clone())),
                _ => None,
            })
            .collect_vec()
    }

    /// Number of participants of one role, connected or not
    pub fn specific_count(&self, filter: Role) -> usize {
        self.by_role[filter].len()
    }

    /// Admits a new participant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MaximumParticipants`] if the session is full.
    pub fn add(&mut self, id: Id, profile: Profile) -> Result<(), Error> {
        if self.mapping.len() >= crate::constants::session::MAX_PARTICIPANT_COUNT {
            return Err(Error::MaximumParticipants);
        }

        let role = profile.role();
        self.mapping.insert(id, profile);
        self.by_role[role].insert(id);

        Ok(())
    }

    /// Updates a participant's profile, reindexing if the role changed
    pub fn update_profile(&mut self, id: Id, profile: Profile) {
        let Some(old_role) = self.mapping.get(&id).map(Profile::role) else {
            return;
        };
        let new_role = profile.role();
        if old_role != new_role {
            self.by_role[old_role].remove(&id);
            self.by_role[new_role].insert(id);
        }
        self.mapping.insert(id, profile);
    }

    /// Removes a participant entirely (lobby departures only)
    pub fn remove(&mut self, id: Id) {
        if let Some(profile) = self.mapping.remove(&id) {
            self.by_role[profile.role()].remove(&id);
        }
    }

    /// The profile of a participant, if present
    pub fn get(&self, id: Id) -> Option<Profile> {
        self.mapping.get(&id).cloned()
    }

    /// Whether the participant is known to this session
    pub fn contains(&self, id: Id) -> bool {
        self.mapping.contains_key(&id)
    }

    /// The display name of a seated player
    pub fn get_name(&self, id: Id) -> Option<String> {
        match self.mapping.get(&id) {
            Some(Profile::Player { name }) => Some(name.clone()),
            _ => None,
        }
    }

    /// Closes a participant's tunnel if one is live
    pub fn close_tunnel<T: Tunnel, F: Fn(Id) -> Option<T>>(&self, id: Id, tunnel_finder: F) {
        if let Some(tunnel) = tunnel_finder(id) {
            tunnel.close();
        }
    }

    /// Sends an update message to one participant
    pub fn send_message<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        message: &UpdateMessage,
        id: Id,
        tunnel_finder: F,
    ) {
        let Some(tunnel) = tunnel_finder(id) else {
            return;
        };
        tunnel.send_message(message);
    }

    /// Sends a full-state sync message to one participant
    pub fn send_state<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        message: &SyncMessage,
        id: Id,
        tunnel_finder: F,
    ) {
        let Some(tunnel) = tunnel_finder(id) else {
            return;
        };
        tunnel.send_state(message);
    }

    /// Sends a per-participant message computed by `sender`; returning
    /// `None` skips that participant
    pub fn announce_with<S, T: Tunnel, F: Fn(Id) -> Option<T>>(&self, sender: S, tunnel_finder: F)
    where
        S: Fn(Id, Role) -> Option<UpdateMessage>,
    {
        for (id, tunnel, profile) in self.vec(tunnel_finder) {
            let Some(message) = sender(id, profile.role()) else {
                continue;
            };
            tunnel.send_message(&message);
        }
    }

    /// Broadcasts an update to every host and player
    pub fn announce<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        message: &UpdateMessage,
        tunnel_finder: F,
    ) {
        self.announce_with(
            |_, role| {
                if matches!(role, Role::Unassigned) {
                    None
                } else {
                    Some(message.clone())
                }
            },
            tunnel_finder,
        );
    }

    /// Broadcasts an update to every connected participant of one role
    pub fn announce_specific<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        filter: Role,
        message: &UpdateMessage,
        tunnel_finder: F,
    ) {
        for (_, tunnel, _) in self.specific_vec(filter, tunnel_finder) {
            tunnel.send_message(message);
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_with_host_id_seats_host() {
        let host = Id::new();
        let participants = Participants::with_host_id(host);

        assert_eq!(participants.get(host), Some(Profile::Host));
        assert_eq!(participants.specific_count(Role::Host), 1);
        assert_eq!(participants.specific_count(Role::Player), 0);
    }

    #[test]
    fn test_add_and_promote() {
        let mut participants = Participants::with_host_id(Id::new());
        let id = Id::new();

        participants.add(id, Profile::Unassigned).unwrap();
        assert_eq!(participants.specific_count(Role::Unassigned), 1);

        participants.update_profile(
            id,
            Profile::Player {
                name: "Ada".to_owned(),
            },
        );
        assert_eq!(participants.specific_count(Role::Unassigned), 0);
        assert_eq!(participants.specific_count(Role::Player), 1);
        assert_eq!(participants.get_name(id), Some("Ada".to_owned()));
    }

    #[test]
    fn test_remove_clears_both_mappings() {
        let mut participants = Participants::with_host_id(Id::new());
        let id = Id::new();
        participants
            .add(
                id,
                Profile::Player {
                    name: "Ada".to_owned(),
                },
            )
            .unwrap();

        participants.remove(id);
        assert!(!participants.contains(id));
        assert_eq!(participants.specific_count(Role::Player), 0);
    }

    #[test]
    fn test_maximum_participants() {
        let mut participants = Participants::with_host_id(Id::new());
        for _ in 1..crate::constants::session::MAX_PARTICIPANT_COUNT {
            participants.add(Id::new(), Profile::Unassigned).unwrap();
        }
        assert_eq!(
            participants.add(Id::new(), Profile::Unassigned),
            Err(Error::MaximumParticipants)
        );
    }

    #[test]
    fn test_serde_rebuilds_role_index() {
        let mut participants = Participants::with_host_id(Id::new());
        let id = Id::new();
        participants
            .add(
                id,
                Profile::Player {
                    name: "Ada".to_owned(),
                },
            )
            .unwrap();

        let serialized = serde_json::to_string(&participants).unwrap();
        let restored: Participants = serde_json::from_str(&serialized).unwrap();

        assert_eq!(restored.specific_count(Role::Player), 1);
        assert_eq!(restored.specific_count(Role::Host), 1);
        assert_eq!(restored.get_name(id), Some("Ada".to_owned()));
    }
}
