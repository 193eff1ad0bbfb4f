pub mod ip;
pub mod password;
pub mod uri;
