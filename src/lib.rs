//! Scan-session controller for camera-driven QR intake: decode events flow
//! in from a host-supplied backend, duplicates are suppressed, each fresh
//! payload waits for the operator to validate or deny it, and confirmed
//! scans land in a newest-first history log.

pub mod decoder;
pub mod history;
pub mod models;
pub mod scan;
pub mod settings;
pub mod utils;

pub use decoder::{
    pick_default_device, DecodeBackend, DecoderConfig, DecoderError, DecoderEvent, DecoderSession,
    DeviceInfo, FrameSource, ScanBox,
};
pub use history::History;
pub use models::{DecodeEvent, ScanRecord};
pub use scan::{
    ClearConfirmation, ControllerEvent, PendingValidation, ScanController, ScanSnapshot, ScanState,
};
pub use settings::{ScannerSettings, SettingsStore};
