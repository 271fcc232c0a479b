pub mod controller;
pub mod state;

pub use controller::{ClearConfirmation, ControllerEvent, ScanController, ScanSnapshot};
pub use state::{PendingValidation, ScanState};
