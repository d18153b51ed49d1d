use std::fmt;

use crate::db::models::UserId;

/// Canonical key of a one-to-one room: the two participant ids, lower first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomKey {
    low: UserId,
    high: UserId,
}

impl RoomKey {
    pub fn new(a: UserId, b: UserId) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn low(&self) -> UserId {
        self.low
    }

    pub fn high(&self) -> UserId {
        self.high
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.low == user_id || self.high == user_id
    }

    /// The participant that is not `user_id`.
    pub fn other(&self, user_id: UserId) -> UserId {
        if self.low == user_id { self.high } else { self.low }
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chat_{}_{}", self.low, self.high)
    }
}
