use std::sync::mpsc;
use std::thread;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    error::{CutterError, Result, VideoError},
    video::{Frame, FrameStream},
};

/// Decode on a helper thread and hand frames to `consume` on this one
///
/// At most `capacity` frames are in flight. Decoding stops early once a frame
/// index reaches `limit`, when `consume` fails, or when `cancel` trips; in
/// every case the decoder process is killed before this returns. Returns the
/// number of frames delivered to `consume`.
pub(crate) fn pump_frames<F>(
    stream: FrameStream,
    capacity: usize,
    limit: Option<u64>,
    cancel: &CancellationToken,
    mut consume: F,
) -> Result<u64>
where
    F: FnMut(Frame) -> Result<()>,
{
    let (tx, rx) = mpsc::sync_channel::<Frame>(capacity.max(1));

    thread::scope(|scope| {
        let decoder = scope.spawn(move || -> Result<()> {
            let mut stream = stream;
            for item in stream.by_ref() {
                if cancel.is_cancelled() {
                    return Err(VideoError::Cancelled.into());
                }
                let frame = item?;
                if limit.is_some_and(|limit| frame.index() >= limit) {
                    debug!("Frame limit reached at {}; stopping decoder", frame.index());
                    break;
                }
                if tx.send(frame).is_err() {
                    // Consumer bailed out; its error wins
                    break;
                }
            }
            Ok(())
        });

        let mut delivered = 0u64;
        let mut consumed = Ok(());
        for frame in rx.iter() {
            if cancel.is_cancelled() {
                consumed = Err(VideoError::Cancelled.into());
                break;
            }
            if let Err(e) = consume(frame) {
                consumed = Err(e);
                break;
            }
            delivered += 1;
        }
        // Unblock a decoder waiting on a full channel
        drop(rx);

        let decoded = decoder
            .join()
            .map_err(|_| CutterError::generic("decoder thread panicked"))?;
        consumed?;
        decoded?;
        Ok(delivered)
    })
}
