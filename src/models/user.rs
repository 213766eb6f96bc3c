use sqlx::FromRow;

pub type UserId = String;

/// User record as resolved by the identity subsystem.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct User {
    pub id: UserId,
    pub username: String,
}
