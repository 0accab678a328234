use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Passenger,
    Driver,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Role::Passenger => "Passenger",
            Role::Driver => "Driver",
            Role::Admin => "Admin",
        };
        f.write_str(name)
    }
}

/// JWT payload issued by the auth service.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: usize,
}

/// Authenticated caller, trusted as-is. Only role guards are enforced here.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: ObjectId,
    pub role: Role,
}

impl AuthContext {
    pub fn new(user_id: ObjectId, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn require(&self, roles: &[Role]) -> Result<()> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::unauthorized(format!(
                "{} may not perform this action",
                self.role
            )))
        }
    }

    /// Admins bypass ownership checks on shared resources.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl TryFrom<Claims> for AuthContext {
    type Error = AppError;

    fn try_from(claims: Claims) -> Result<Self> {
        let user_id = ObjectId::parse_str(&claims.sub).map_err(|_| AppError::AuthError)?;
        Ok(AuthContext::new(user_id, claims.role))
    }
}
