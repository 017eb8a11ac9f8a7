pub mod diff;
pub mod orchestrator;
pub mod recovery;
pub mod redraw;
pub mod scheduler;
pub mod threshold;
pub mod timers;

pub use orchestrator::{BlinkOrchestrator, DataUpdate, RulePhase};
pub use recovery::{open_recovery_store, FileRecoveryStore, MemoryRecoveryStore, RecoveryStore};
pub use redraw::{LocalRedrawBus, RedrawBus, Subscription};
pub use scheduler::{ManualHandle, ManualScheduler, Scheduler, SmolScheduler};
pub use timers::{HighlightListener, HighlightMap, HighlightTimers};
