pub mod credential;
pub mod directory;
pub mod issuer;
pub mod lockout;
pub mod resolver;
pub mod schema_gate;
pub mod token;
pub mod trust;
