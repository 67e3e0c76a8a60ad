//! Identity service — cosmetic per-connection user identities.
//!
//! Names and colors are decoration only; uniqueness comes from the
//! connection id, never from the generated name.

use rand::Rng;
use uuid::Uuid;

use crate::frame::now_ms;
use crate::services::room::UserInfo;

pub const USER_COLORS: [&str; 10] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#FFA07A", "#98D8C8", "#F7DC6F", "#BB8FCE", "#85C1E2", "#F8B88B", "#96CEB4",
];

const ADJECTIVES: [&str; 10] = ["Happy", "Clever", "Brave", "Swift", "Gentle", "Bright", "Bold", "Calm", "Eager", "Fancy"];

const NOUNS: [&str; 10] = ["Panda", "Tiger", "Eagle", "Dolphin", "Fox", "Wolf", "Bear", "Hawk", "Lion", "Owl"];

/// Pick a presence color from the palette.
#[must_use]
pub fn generate_user_color() -> String {
    let mut rng = rand::rng();
    USER_COLORS[rng.random_range(0..USER_COLORS.len())].to_owned()
}

/// Adjective + noun + 0..99, e.g. `SwiftOwl42`.
#[must_use]
pub fn generate_username() -> String {
    let mut rng = rand::rng();
    let adjective = ADJECTIVES[rng.random_range(0..ADJECTIVES.len())];
    let noun = NOUNS[rng.random_range(0..NOUNS.len())];
    let number: u8 = rng.random_range(0..100);
    format!("{adjective}{noun}{number}")
}

/// Fresh roster entry for a connection joining now.
#[must_use]
pub fn generate_user(client_id: Uuid) -> UserInfo {
    UserInfo { id: client_id.to_string(), color: generate_user_color(), name: generate_username(), joined_at: now_ms() }
}
