// web-server/src/auth/mod.rs
pub mod protocol;
pub mod roles;
pub mod verifier;

pub use protocol::{AuthProtocol, Challenge, LandingPages, LoginMode, LoginOutcome, LoginStage};
pub use roles::AdminList;
pub use verifier::{PersonalSignVerifier, SignatureVerifier};
