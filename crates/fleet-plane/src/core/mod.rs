//! Core logic for the control plane

mod dispatch;
mod error;
mod lifecycle;
mod teardown;

pub use dispatch::{DispatchReceipt, FirmwareLocation, OtaDispatcher};
pub use error::OperationError;
pub use lifecycle::{LifecycleManager, ProvisionOutcome};
pub use teardown::{StepOutcome, Teardown, TeardownReport, TeardownStep};
