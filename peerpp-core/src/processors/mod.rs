//! The Peer++ processors.
//!
//! - `DecisionEngine`: decides whether a new evaluation needs a placeholder
//! - `Coordinator`: books, swaps, re-books and sweeps placeholders
//! - `Notifier`: chat fan-out used by the coordinator
//! - `Scheduler`: periodic sweep and delivery-id GC
//! - `CommandDesk`: chat slash commands on top of the coordinator

pub mod commands;
pub mod coordinator;
pub mod decision;
pub mod notifier;
pub mod scheduler;

pub use commands::{ChatCommand, Command, CommandDesk};
pub use coordinator::{
    CancelOutcome, Coordinator, CoordinatorError, CreateOutcome, ProjectQueue, SwapReceipt,
    SwapStage, SweepReport, UpdateOutcome,
};
pub use decision::{BookingGate, DecisionEngine, DecisionError, Verdict, VerdictReason};
pub use notifier::{NotificationReport, Notifier};
pub use scheduler::Scheduler;
