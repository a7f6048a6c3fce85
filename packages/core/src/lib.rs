// ABOUTME: Shared vocabulary for the Leadflow workspace
// ABOUTME: Roles, the authenticated principal, and id/token generation

pub mod auth;
pub mod ids;
pub mod roles;

pub use auth::AuthUser;
pub use roles::UserRole;
