use std::sync::Arc;

use log::{debug, error, info};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::decoder::{
    DecodeBackend, DecoderConfig, DecoderError, DecoderEvent, DecoderSession, DeviceInfo,
};
use crate::models::{DecodeEvent, ScanRecord};

use super::state::{ControllerState, ScanState};

/// Host-facing view of the controller at a point in time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSnapshot {
    pub state: ScanState,
    pub last_payload: Option<String>,
    pub device_id: Option<String>,
    pub history_len: usize,
}

/// Notifications broadcast to subscribed hosts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ControllerEvent {
    StateChanged(ScanSnapshot),
    RecordConfirmed(ScanRecord),
    HistoryCleared,
    DecoderFault(DecoderError),
}

/// Clearing history is destructive and unrecoverable; callers must pass an
/// explicit confirmation collected from the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearConfirmation {
    Confirmed,
    Cancelled,
}

/// The scan-session state machine: consumes decode events, applies
/// duplicate suppression, suspends the decoder while a value awaits the
/// operator's validate/deny decision, and feeds confirmed records into the
/// history log. All transitions serialize through one mutex.
#[derive(Clone)]
pub struct ScanController {
    state: Arc<Mutex<ControllerState>>,
    decoder: Arc<Mutex<DecoderSession>>,
    events: broadcast::Sender<ControllerEvent>,
    pump: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ScanController {
    pub fn new(backend: Arc<dyn DecodeBackend>, config: DecoderConfig) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            state: Arc::new(Mutex::new(ControllerState::default())),
            decoder: Arc::new(Mutex::new(DecoderSession::new(backend, config))),
            events,
            pump: Arc::new(Mutex::new(None)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub async fn list_devices(&self) -> Result<Vec<DeviceInfo>, DecoderError> {
        self.decoder.lock().await.list_devices()
    }

    /// Begin decoding on the selected device. Fails without leaving `Idle`
    /// when the device cannot be acquired; refused with `DeviceBusy` while
    /// a session is already active (use [`Self::change_device`] to swap).
    pub async fn start(&self, device_id: &str) -> Result<(), DecoderError> {
        {
            let state = self.state.lock().await;
            if !matches!(state.scan, ScanState::Idle) {
                return Err(DecoderError::DeviceBusy);
            }
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        self.decoder.lock().await.start(device_id, events_tx).await?;

        {
            let mut state = self.state.lock().await;
            state.begin(device_id);
        }

        self.spawn_pump(events_rx).await;
        info!("scan session started on device {device_id}");
        self.emit_state_changed().await;
        Ok(())
    }

    /// End the session from any state. A pending validation is discarded
    /// unrecorded and the device is released; safe to call repeatedly.
    pub async fn stop(&self) {
        let was_active = {
            let mut state = self.state.lock().await;
            let was_active = !matches!(state.scan, ScanState::Idle);
            state.halt();
            was_active
        };

        self.decoder.lock().await.stop().await;
        self.cancel_pump().await;

        if was_active {
            info!("scan session stopped");
            self.emit_state_changed().await;
        }
    }

    /// Switching the input device is always a full stop/restart cycle; the
    /// underlying device binding is not hot-swappable.
    pub async fn change_device(&self, device_id: &str) -> Result<(), DecoderError> {
        self.stop().await;
        self.start(device_id).await
    }

    /// Feed one decode event through the state machine. Returns true when
    /// it passed duplicate suppression and the session is now suspended
    /// awaiting the operator.
    pub async fn on_decode(&self, event: DecodeEvent) -> bool {
        let suspended = {
            let mut state = self.state.lock().await;
            state.try_suspend(&event.payload)
        };

        if suspended {
            // Optimistic: the state machine is already suspended, the
            // device pause may land a frame later without harm.
            self.decoder.lock().await.pause();
            info!("decode suspended for validation");
            self.emit_state_changed().await;
        } else {
            debug!("decode event dropped (duplicate or not scanning)");
        }

        suspended
    }

    /// Operator accepted the pending value: record it and resume decoding.
    /// Returns `None` (no effect) when nothing is pending.
    pub async fn validate(&self) -> Option<ScanRecord> {
        let record = {
            let mut state = self.state.lock().await;
            let payload = state.accept_pending()?;
            let record = ScanRecord::new(payload);
            state.history.append(record.clone());
            record
        };

        self.decoder.lock().await.resume();
        info!("scan confirmed, record {}", record.id);
        let _ = self
            .events
            .send(ControllerEvent::RecordConfirmed(record.clone()));
        self.emit_state_changed().await;
        Some(record)
    }

    /// Operator rejected the pending value: discard it, re-enable detection
    /// of the same payload, and resume decoding. Returns the discarded
    /// payload, or `None` (no effect) when nothing is pending.
    pub async fn deny(&self) -> Option<String> {
        let payload = {
            let mut state = self.state.lock().await;
            state.reject_pending()?
        };

        self.decoder.lock().await.resume();
        info!("scan denied, suppression reset");
        self.emit_state_changed().await;
        Some(payload)
    }

    /// Empty the history and reset duplicate suppression. Independent of
    /// the scan state; does nothing unless the operator confirmed.
    pub async fn clear_history(&self, confirmation: ClearConfirmation) -> bool {
        if confirmation != ClearConfirmation::Confirmed {
            return false;
        }

        {
            let mut state = self.state.lock().await;
            state.history.clear();
            state.last_payload = None;
        }

        info!("scan history cleared");
        let _ = self.events.send(ControllerEvent::HistoryCleared);
        self.emit_state_changed().await;
        true
    }

    pub async fn snapshot(&self) -> ScanSnapshot {
        let state = self.state.lock().await;
        ScanSnapshot {
            state: state.scan.clone(),
            last_payload: state.last_payload.clone(),
            device_id: state.device_id.clone(),
            history_len: state.history.len(),
        }
    }

    pub async fn current_state(&self) -> ScanState {
        self.state.lock().await.scan.clone()
    }

    pub async fn pending_payload(&self) -> Option<String> {
        self.state
            .lock()
            .await
            .pending_payload()
            .map(str::to_string)
    }

    pub async fn history(&self) -> Vec<ScanRecord> {
        self.state.lock().await.history.all().cloned().collect()
    }

    /// Unrecoverable device failure mid-session: land in `Idle`, discard
    /// any pending value, release the device. Retry is an explicit
    /// operator-initiated `start`.
    async fn handle_fault(&self, err: DecoderError) {
        error!("decoder fault, ending session: {err}");
        {
            let mut state = self.state.lock().await;
            state.halt();
        }
        self.decoder.lock().await.stop().await;
        let _ = self.events.send(ControllerEvent::DecoderFault(err));
        self.emit_state_changed().await;
    }

    /// Single consumer of the decoder's event stream; everything it sees is
    /// serialized through the state mutex along with the operator calls.
    async fn spawn_pump(&self, mut events_rx: mpsc::UnboundedReceiver<DecoderEvent>) {
        let mut pump_guard = self.pump.lock().await;
        if let Some(handle) = pump_guard.take() {
            handle.abort();
        }

        let controller = self.clone();
        let handle = tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                match event {
                    DecoderEvent::Decoded(decode) => {
                        controller.on_decode(decode).await;
                    }
                    DecoderEvent::Fault(err) => {
                        controller.handle_fault(err).await;
                    }
                }
            }
        });

        *pump_guard = Some(handle);
    }

    async fn cancel_pump(&self) {
        if let Some(handle) = self.pump.lock().await.take() {
            handle.abort();
        }
    }

    async fn emit_state_changed(&self) {
        let snapshot = self.snapshot().await;
        let _ = self.events.send(ControllerEvent::StateChanged(snapshot));
    }
}
