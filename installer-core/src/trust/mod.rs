//! Trust establishment for the downloaded bootstrap script
//!
//! Resolution picks one trust anchor per run, verification compares the
//! script digest against it. The hashing capability is injected through
//! [`Digester`].

pub mod hasher;
pub mod resolver;
pub mod verifier;

pub use hasher::{Digester, PlatformDigester, Sha256Digester};
pub use resolver::{resolve, TrustSource, TrustSourceKind};
pub use verifier::{MatchStatus, SkipReason, VerificationOutcome, Verifier};
