//! Authenticated caller identity
//!
//! The engine never authenticates. Every entry point receives an [`Actor`]
//! already resolved by the identity service and only compares its user id
//! against the parties of the record being touched, or checks the operator
//! role for administrative operations.

use crate::types::UserId;
use serde::{Deserialize, Serialize};

/// Role resolved by the identity service for the current request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A marketplace user acting as the renting side
    Renter,
    /// A marketplace user acting as the item-owning side
    Owner,
    /// Back-office staff; may review withdrawals and resolve disputes
    Operator,
}

/// An authenticated caller: user id plus resolved role
///
/// Party checks on orders compare `user` against the order's renter/owner
/// ids; the role is only consulted for operator-gated operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    /// The authenticated user id
    pub user: UserId,
    /// The role resolved for this request
    pub role: Role,
}

impl Actor {
    /// Create an actor with an explicit role
    pub fn new(user: UserId, role: Role) -> Self {
        Actor { user, role }
    }

    /// Convenience constructor for a renter-side caller
    pub fn renter(user: UserId) -> Self {
        Actor::new(user, Role::Renter)
    }

    /// Convenience constructor for an owner-side caller
    pub fn owner(user: UserId) -> Self {
        Actor::new(user, Role::Owner)
    }

    /// Convenience constructor for back-office staff
    pub fn operator(user: UserId) -> Self {
        Actor::new(user, Role::Operator)
    }

    /// Whether this caller carries the operator role
    pub fn is_operator(&self) -> bool {
        self.role == Role::Operator
    }
}
