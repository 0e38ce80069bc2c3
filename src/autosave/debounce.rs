use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Quiet interval before a burst of edits is considered settled
pub const DEFAULT_QUIET_MS: u64 = 1000;

/// Spawn a debouncer on the current runtime.
///
/// Values pushed into the returned sender come out of the receiver only after
/// `quiet` has passed without a newer value; each new value restarts the
/// timer and replaces the pending one. Closing the sender drops whatever is
/// still pending.
pub fn debounce<T: Send + 'static>(
    quiet: Duration,
) -> (mpsc::UnboundedSender<T>, mpsc::UnboundedReceiver<T>) {
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<T>();
    let (output_tx, output_rx) = mpsc::unbounded_channel::<T>();

    tokio::spawn(async move {
        let mut pending: Option<T> = None;
        let timer = tokio::time::sleep(quiet);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                value = input_rx.recv() => match value {
                    Some(value) => {
                        pending = Some(value);
                        timer.as_mut().reset(Instant::now() + quiet);
                    }
                    None => break,
                },
                () = &mut timer, if pending.is_some() => {
                    if let Some(value) = pending.take() {
                        if output_tx.send(value).is_err() {
                            break;
                        }
                    }
                }
            }
        }
    });

    (input_tx, output_rx)
}
