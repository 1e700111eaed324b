//! Fan-in of many bounded channels into one.

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamMap;
use tokio_util::sync::CancellationToken;

/// Why [`select_into`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectExit {
    /// The stop token fired.
    Stopped,
    /// Every input closed.
    InputsClosed,
    /// The output receiver was dropped.
    OutputClosed,
}

/// Forward every message from `inputs` to `output` until `stop` fires.
///
/// Closed inputs drop out of the selection and the call returns once all of
/// them have closed. With no inputs at all it idles until stopped. A blocked
/// send never delays shutdown.
pub async fn select_into<T>(
    stop: CancellationToken,
    inputs: Vec<mpsc::Receiver<T>>,
    output: mpsc::Sender<T>,
) -> SelectExit
where
    T: Send + 'static,
{
    if inputs.is_empty() {
        stop.cancelled().await;
        return SelectExit::Stopped;
    }

    let mut streams = StreamMap::with_capacity(inputs.len());
    for (index, rx) in inputs.into_iter().enumerate() {
        streams.insert(index, ReceiverStream::new(rx));
    }

    loop {
        let next = tokio::select! {
            biased;
            _ = stop.cancelled() => return SelectExit::Stopped,
            next = streams.next() => next,
        };
        let Some((_, item)) = next else {
            return SelectExit::InputsClosed;
        };
        tokio::select! {
            biased;
            _ = stop.cancelled() => return SelectExit::Stopped,
            sent = output.send(item) => {
                if sent.is_err() {
                    return SelectExit::OutputClosed;
                }
            }
        }
    }
}
