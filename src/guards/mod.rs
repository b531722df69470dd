//! Guard evaluation: eligibility pre-check, allowlist proofs, wallet state,
//! time-window countdowns and the session guard store

pub mod allowlist;
pub mod eligibility;
pub mod store;
pub mod time_window;
pub mod wallet_state;

pub use allowlist::MerkleTree;
pub use eligibility::{evaluate, normalize, MINT_FEE_RESERVE_LAMPORTS};
pub use store::{GuardEntry, GuardStore};
pub use time_window::{
    window_display, Countdown, RecheckRequest, TimeWindowTracker, WindowDisplay, WindowEdge,
};
pub use wallet_state::{AllowlistStatus, OwnedNft, WalletState};
