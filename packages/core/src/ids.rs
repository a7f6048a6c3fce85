// ABOUTME: Identifier generation helpers
// ABOUTME: uuid v4 for entity ids, nanoid for unguessable share tokens

use uuid::Uuid;

/// Length of public share tokens. 21 url-safe characters gives ~126 bits.
const SHARE_TOKEN_LENGTH: usize = 21;

/// Generate a new entity id.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate an unguessable, url-safe share token.
pub fn generate_share_token() -> String {
    nanoid::nanoid!(SHARE_TOKEN_LENGTH)
}
