//! Mint orchestration: signing and dispatch, confirmation, asset resolution
//! and the session that drives them

pub mod confirmation;
pub mod resolver;
pub mod session;
pub mod submission;

pub use confirmation::ConfirmationVerifier;
pub use resolver::{PostMintResolver, ResolvedAssets};
pub use session::{MintSession, PresentedGroup, ProgramState, SessionConfig};
pub use submission::{SignedBatch, SubmissionCoordinator};
