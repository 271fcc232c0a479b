use std::sync::Arc;

use log::error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::loop_worker::decode_loop;
use super::{DecodeBackend, DecoderConfig, DecoderError, DecoderEvent, DeviceInfo};

/// Owns the camera-driven decode loop: a single tokio task between `start`
/// and `stop`, holding the device exclusively for that window. Carries no
/// business logic; duplicate suppression and validation live in the scan
/// controller.
pub struct DecoderSession {
    backend: Arc<dyn DecodeBackend>,
    config: DecoderConfig,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    pause_tx: Option<watch::Sender<bool>>,
}

impl DecoderSession {
    pub fn new(backend: Arc<dyn DecodeBackend>, config: DecoderConfig) -> Self {
        Self {
            backend,
            config,
            handle: None,
            cancel_token: None,
            pause_tx: None,
        }
    }

    pub fn list_devices(&self) -> Result<Vec<DeviceInfo>, DecoderError> {
        self.backend.list_devices()
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Acquire the device and begin continuous decode attempts, delivering
    /// [`DecoderEvent`]s to `events` until stopped.
    pub async fn start(
        &mut self,
        device_id: &str,
        events: mpsc::UnboundedSender<DecoderEvent>,
    ) -> Result<(), DecoderError> {
        if self.is_running() {
            return Err(DecoderError::DeviceBusy);
        }

        let source = self.backend.open(device_id, &self.config)?;

        let cancel_token = CancellationToken::new();
        let (pause_tx, pause_rx) = watch::channel(false);
        let handle = tokio::spawn(decode_loop(
            source,
            events,
            cancel_token.clone(),
            pause_rx,
            self.config.frame_interval(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        self.pause_tx = Some(pause_tx);
        Ok(())
    }

    /// Terminate the decode loop and release the device. Safe to call when
    /// not running.
    pub async fn stop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        self.pause_tx = None;

        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                error!("decode loop task failed to join: {err}");
            }
        }
    }

    /// Suspend decode attempts without releasing the device. No-op when not
    /// running.
    pub fn pause(&self) {
        if let Some(tx) = &self.pause_tx {
            let _ = tx.send(true);
        }
    }

    /// Resume decode attempts after a pause. No-op when not running.
    pub fn resume(&self) {
        if let Some(tx) = &self.pause_tx {
            let _ = tx.send(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::decoder::FrameSource;

    type Frame = Result<Option<String>, DecoderError>;
    type FrameQueue = Arc<Mutex<VecDeque<Frame>>>;

    struct ScriptedBackend {
        frames: FrameQueue,
    }

    struct ScriptedSource {
        frames: FrameQueue,
    }

    impl FrameSource for ScriptedSource {
        fn next_frame(&mut self) -> Frame {
            self.frames.lock().unwrap().pop_front().unwrap_or(Ok(None))
        }
    }

    impl DecodeBackend for ScriptedBackend {
        fn list_devices(&self) -> Result<Vec<DeviceInfo>, DecoderError> {
            Ok(vec![DeviceInfo {
                id: "cam0".into(),
                label: "Test Camera".into(),
            }])
        }

        fn open(
            &self,
            _device_id: &str,
            _config: &DecoderConfig,
        ) -> Result<Box<dyn FrameSource>, DecoderError> {
            Ok(Box::new(ScriptedSource {
                frames: Arc::clone(&self.frames),
            }))
        }
    }

    struct DeniedBackend;

    impl DecodeBackend for DeniedBackend {
        fn list_devices(&self) -> Result<Vec<DeviceInfo>, DecoderError> {
            Ok(vec![])
        }

        fn open(
            &self,
            _device_id: &str,
            _config: &DecoderConfig,
        ) -> Result<Box<dyn FrameSource>, DecoderError> {
            Err(DecoderError::PermissionDenied)
        }
    }

    fn fast_config() -> DecoderConfig {
        DecoderConfig {
            fps: 100,
            ..Default::default()
        }
    }

    fn scripted_session(frames: Vec<Frame>) -> (DecoderSession, FrameQueue) {
        let frames: FrameQueue = Arc::new(Mutex::new(frames.into_iter().collect()));
        let backend = ScriptedBackend {
            frames: Arc::clone(&frames),
        };
        (DecoderSession::new(Arc::new(backend), fast_config()), frames)
    }

    async fn recv_decoded(rx: &mut mpsc::UnboundedReceiver<DecoderEvent>) -> String {
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for decode event")
            .expect("event channel closed");
        match event {
            DecoderEvent::Decoded(decode) => decode.payload,
            DecoderEvent::Fault(err) => panic!("unexpected fault: {err}"),
        }
    }

    #[tokio::test]
    async fn delivers_decoded_frames_in_order() {
        let (mut session, _frames) = scripted_session(vec![
            Ok(None),
            Ok(Some("first".into())),
            Ok(None),
            Ok(Some("second".into())),
        ]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        session.start("cam0", tx).await.unwrap();

        assert_eq!(recv_decoded(&mut rx).await, "first");
        assert_eq!(recv_decoded(&mut rx).await, "second");

        session.stop().await;
        assert!(!session.is_running());
    }

    #[tokio::test]
    async fn start_while_running_is_refused() {
        let (mut session, _frames) = scripted_session(vec![]);
        let (tx, _rx) = mpsc::unbounded_channel();
        session.start("cam0", tx).await.unwrap();

        let (tx2, _rx2) = mpsc::unbounded_channel();
        assert_eq!(
            session.start("cam0", tx2).await,
            Err(DecoderError::DeviceBusy)
        );

        session.stop().await;
    }

    #[tokio::test]
    async fn open_failure_propagates_and_nothing_runs() {
        let mut session = DecoderSession::new(Arc::new(DeniedBackend), fast_config());
        let (tx, _rx) = mpsc::unbounded_channel();
        assert_eq!(
            session.start("cam0", tx).await,
            Err(DecoderError::PermissionDenied)
        );
        assert!(!session.is_running());
    }

    #[tokio::test]
    async fn pause_halts_frame_consumption_until_resume() {
        let frames: Vec<Frame> = std::iter::repeat_with(|| Ok(Some("x".into())))
            .take(200)
            .collect();
        let (mut session, queue) = scripted_session(frames);
        let (tx, mut rx) = mpsc::unbounded_channel();
        session.start("cam0", tx).await.unwrap();

        // Loop is alive once the first frame arrives.
        recv_decoded(&mut rx).await;
        session.pause();

        // Let any in-flight tick settle, then confirm the queue stops
        // draining while paused.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let settled = queue.lock().unwrap().len();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(queue.lock().unwrap().len(), settled);

        session.resume();
        recv_decoded(&mut rx).await;

        session.stop().await;
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_allows_restart() {
        let (mut session, _frames) = scripted_session(vec![Ok(Some("once".into()))]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        session.start("cam0", tx).await.unwrap();
        assert_eq!(recv_decoded(&mut rx).await, "once");

        session.stop().await;
        session.stop().await;
        assert!(!session.is_running());

        let (tx, _rx) = mpsc::unbounded_channel();
        session.start("cam0", tx).await.unwrap();
        assert!(session.is_running());
        session.stop().await;
    }

    #[tokio::test]
    async fn device_failure_emits_fault_and_ends_loop() {
        let (mut session, _frames) = scripted_session(vec![
            Ok(Some("ok".into())),
            Err(DecoderError::Unreadable("sensor detached".into())),
        ]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        session.start("cam0", tx).await.unwrap();

        assert_eq!(recv_decoded(&mut rx).await, "ok");
        let fault = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for fault")
            .expect("event channel closed");
        assert!(matches!(
            fault,
            DecoderEvent::Fault(DecoderError::Unreadable(_))
        ));

        // Sender side is dropped once the loop exits.
        assert!(tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for channel close")
            .is_none());

        session.stop().await;
    }

    #[tokio::test]
    async fn pause_and_resume_are_noops_when_not_running() {
        let (session, _frames) = scripted_session(vec![]);
        session.pause();
        session.resume();
        assert!(!session.is_running());
    }
}
