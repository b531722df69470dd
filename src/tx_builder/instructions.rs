//! Instruction planning and ordering validation
//!
//! Every mint transaction has the same shape:
//! 1. Compute unit limit
//! 2. Compute unit price (priority fee)
//! 3. The candy guard instruction

use crate::tx_builder::errors::TransactionBuilderError;
use solana_sdk::{compute_budget::ComputeBudgetInstruction, instruction::Instruction};

#[derive(Debug, Clone)]
pub struct InstructionPlan {
    /// The ordered list of instructions for the transaction
    pub instructions: Vec<Instruction>,
}

/// Prepend compute-budget instructions to `program_ix`
///
/// # Errors
///
/// Returns `TransactionBuilderError::Configuration` if the program
/// instruction has no accounts or either budget value is zero.
pub fn plan_mint_instructions(
    cu_limit: u32,
    cu_price: u64,
    program_ix: Instruction,
) -> Result<InstructionPlan, TransactionBuilderError> {
    if program_ix.accounts.is_empty() {
        return Err(TransactionBuilderError::Configuration(
            "Program instruction has no accounts".to_string(),
        ));
    }

    check_compute_budget(cu_limit, cu_price)?;

    let instructions = vec![
        ComputeBudgetInstruction::set_compute_unit_limit(cu_limit),
        ComputeBudgetInstruction::set_compute_unit_price(cu_price),
        program_ix,
    ];
    Ok(InstructionPlan { instructions })
}

/// Both compute-budget values must be positive
pub fn check_compute_budget(cu_limit: u32, cu_price: u64) -> Result<(), TransactionBuilderError> {
    if cu_limit == 0 || cu_price == 0 {
        return Err(TransactionBuilderError::Configuration(format!(
            "compute budget must be positive (limit={cu_limit}, price={cu_price})"
        )));
    }
    Ok(())
}

/// Check that compute-budget instructions lead, limit before price
/// (debug/test builds only)
#[cfg(debug_assertions)]
pub fn sanity_check_ix_order(instructions: &[Instruction]) -> Result<(), TransactionBuilderError> {
    // ComputeBudgetInstruction tags: 2 = SetComputeUnitLimit, 3 = SetComputeUnitPrice
    let budget_tag = |ix: &Instruction| -> Option<u8> {
        (ix.program_id == solana_sdk::compute_budget::id())
            .then(|| ix.data.first().copied())
            .flatten()
    };

    if instructions.is_empty() {
        return Err(TransactionBuilderError::invalid_order(
            "Instruction list is empty",
        ));
    }

    let mut seen_program = false;
    let mut seen_price = false;
    for (idx, ix) in instructions.iter().enumerate() {
        match budget_tag(ix) {
            Some(tag) if seen_program => {
                return Err(TransactionBuilderError::invalid_order(format!(
                    "Compute budget instruction (tag {tag}) at position {idx} follows a program instruction"
                )));
            }
            Some(2) if seen_price => {
                return Err(TransactionBuilderError::invalid_order(format!(
                    "Compute unit limit at position {idx} follows the compute unit price"
                )));
            }
            Some(3) => seen_price = true,
            Some(_) => {}
            None => seen_program = true,
        }
    }

    if !seen_program {
        return Err(TransactionBuilderError::invalid_order(
            "No program instruction after compute budget",
        ));
    }
    Ok(())
}

#[cfg(not(debug_assertions))]
#[inline]
pub fn sanity_check_ix_order(_instructions: &[Instruction]) -> Result<(), TransactionBuilderError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::{instruction::AccountMeta, pubkey::Pubkey};

    fn program_ix() -> Instruction {
        Instruction::new_with_bytes(
            Pubkey::new_unique(),
            &[1, 2, 3, 4],
            vec![AccountMeta::new(Pubkey::new_unique(), false)],
        )
    }

    #[test]
    fn test_plan_orders_budget_first() {
        let ix = program_ix();
        let program_id = ix.program_id;
        let plan = plan_mint_instructions(800_000, 10_000, ix).unwrap();

        assert_eq!(plan.instructions.len(), 3);
        assert_eq!(plan.instructions[0], ComputeBudgetInstruction::set_compute_unit_limit(800_000));
        assert_eq!(plan.instructions[1], ComputeBudgetInstruction::set_compute_unit_price(10_000));
        assert_eq!(plan.instructions[2].program_id, program_id);
        assert!(sanity_check_ix_order(&plan.instructions).is_ok());
    }

    #[test]
    fn test_plan_rejects_zero_budget() {
        for (limit, price) in [(0, 10_000), (800_000, 0)] {
            assert!(matches!(
                plan_mint_instructions(limit, price, program_ix()),
                Err(TransactionBuilderError::Configuration(msg)) if msg.contains("compute budget")
            ));
        }
    }

    #[test]
    fn test_plan_rejects_accountless_instruction() {
        let ix = Instruction::new_with_bytes(Pubkey::new_unique(), &[1], vec![]);
        let result = plan_mint_instructions(800_000, 10_000, ix);
        assert!(matches!(
            result,
            Err(TransactionBuilderError::Configuration(msg)) if msg.contains("no accounts")
        ));
    }

    #[cfg(debug_assertions)]
    #[test]
    fn test_sanity_check_budget_after_program() {
        let instructions = vec![
            program_ix(),
            ComputeBudgetInstruction::set_compute_unit_limit(800_000),
        ];
        let result = sanity_check_ix_order(&instructions);
        assert!(matches!(
            result,
            Err(TransactionBuilderError::InvalidInstructionOrder(msg)) if msg.contains("follows a program")
        ));
    }

    #[cfg(debug_assertions)]
    #[test]
    fn test_sanity_check_price_before_limit() {
        let instructions = vec![
            ComputeBudgetInstruction::set_compute_unit_price(10_000),
            ComputeBudgetInstruction::set_compute_unit_limit(800_000),
            program_ix(),
        ];
        assert!(sanity_check_ix_order(&instructions).is_err());
    }

    #[cfg(debug_assertions)]
    #[test]
    fn test_sanity_check_empty_and_budget_only() {
        assert!(sanity_check_ix_order(&[]).is_err());
        let budget_only = vec![ComputeBudgetInstruction::set_compute_unit_limit(1)];
        assert!(sanity_check_ix_order(&budget_only).is_err());
    }
}
