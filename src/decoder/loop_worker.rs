use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::models::DecodeEvent;

use super::{DecoderEvent, FrameSource};

// Set to false to silence this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Continuous decode loop: one frame attempt per tick until cancelled.
/// While paused the ticker keeps running but no frames are read, so the
/// device stays held without producing events.
pub(crate) async fn decode_loop(
    mut source: Box<dyn FrameSource>,
    events: mpsc::UnboundedSender<DecoderEvent>,
    cancel_token: CancellationToken,
    pause_rx: watch::Receiver<bool>,
    frame_interval: Duration,
) {
    let mut ticker = tokio::time::interval(frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if *pause_rx.borrow() {
                    continue;
                }

                match source.next_frame() {
                    Ok(Some(payload)) => {
                        if events.send(DecoderEvent::Decoded(DecodeEvent::new(payload))).is_err() {
                            log_warn!("decode event receiver dropped, shutting down");
                            break;
                        }
                    }
                    // No code in this frame: steady-state noise at full
                    // frame rate, never escalated.
                    Ok(None) => {}
                    Err(err) => {
                        log_error!("decode attempt failed: {err}");
                        let _ = events.send(DecoderEvent::Fault(err));
                        break;
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("decode loop shutting down");
                break;
            }
        }
    }
    // Dropping `source` here releases the device.
}
