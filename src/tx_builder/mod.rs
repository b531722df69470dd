//! Mint transaction construction
//!
//! The builder is split into focused modules:
//! - **errors**: construction error taxonomy
//! - **instructions**: compute-budget planning and ordering validation
//! - **accounts**: per-guard remaining accounts
//! - **mint_v2**: the candy guard `mint_v2` instruction
//! - **route**: the allowlist proof `route` instruction
//! - **draft**: one unsigned transaction plus its asset signer
//! - **batch**: N drafts sharing one blockhash and lookup table
//!
//! ## Instruction order
//!
//! Each draft carries `compute_unit_limit → compute_unit_price → mint_v2`.
//! Debug builds assert this order before the message is compiled.

pub mod accounts;
pub mod batch;
pub mod draft;
pub mod errors;
pub mod instructions;
pub mod mint_v2;
pub mod route;

pub use accounts::{guard_remaining_accounts, GuardAccountContext};
pub use batch::{BatchContext, TransactionBatchBuilder};
pub use draft::TransactionDraft;
pub use errors::TransactionBuilderError;
pub use instructions::{plan_mint_instructions, sanity_check_ix_order, InstructionPlan};
pub use mint_v2::{mint_v2_instruction, MintV2Params};
pub use route::allowlist_route_instruction;
