pub mod debounce;
pub mod observer;
pub mod reconciler;
pub mod state;

pub use observer::{ChangeOrigin, NoticeLevel, Subscription, SyncEvent};
pub use reconciler::{Reconciler, SaveOutcome};
pub use state::SyncPhase;
