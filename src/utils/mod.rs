//! Some utility functions

use crate::provider::plan::{SyncAction, SyncPlan};

/// A debug utility that pretty-prints what a sync run would do
pub fn print_plan(plan: &SyncPlan) {
    if plan.is_noop() {
        println!("Nothing to change.");
    }
    for action in plan.actions() {
        if let SyncAction::Unchanged { .. } = action {
            continue;
        }
        println!("    {}", action);
    }
    if plan.kept_orphans() > 0 {
        println!("{} events whose record is gone are kept", plan.kept_orphans());
    }
    if plan.duplicate_records() > 0 {
        println!("{} duplicate records are ignored", plan.duplicate_records());
    }
}

