mod api_types;
mod auth;
mod client;
mod helpers;

pub use auth::{load_credential, save_credential, Authenticator, ClientIdentity, Credential};
pub use client::DriveClient;
