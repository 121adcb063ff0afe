use crate::signals::BranchCondition;

/// The branch comparator, evaluates a conditional branch's predicate over its two (possibly forwarded) operands.
#[must_use]
pub fn branch_comparator(condition: BranchCondition, a: u32, b: u32) -> bool {
    match condition {
        BranchCondition::Eq => a == b,
        BranchCondition::Ne => a != b,
        BranchCondition::Lt => (a as i32) < (b as i32),
        BranchCondition::Ge => (a as i32) >= (b as i32),
        BranchCondition::Ltu => a < b,
        BranchCondition::Geu => a >= b,
    }
}
