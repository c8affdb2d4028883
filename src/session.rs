//! Explicit session context replacing any ambient "current role".
//!
//! Credential checks happen outside this crate; a session only records the
//! outcome. Logging in or out never mutates a session, it produces a new one.

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::SystemTime,
};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("User"),
            Role::Admin => f.write_str("Admin"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    id: u64,
    role: Role,
    started_at: SystemTime,
}

impl Session {
    pub fn start(role: Role) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            role,
            started_at: SystemTime::now(),
        }
    }

    /// Session for an administrator whose credentials were already verified.
    pub fn login_admin(&self) -> Self {
        Self::start(Role::Admin)
    }

    pub fn logout(&self) -> Self {
        Self::start(Role::User)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::start(Role::User)
    }
}
