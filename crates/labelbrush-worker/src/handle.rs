//! Host side of the worker: spawning, submitting and tearing down.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use labelbrush_core::{MaskError, StrokeBuffer};
use tracing::{debug, warn};

use crate::protocol::{Message, Operation};
use crate::worker::StrokeWorker;

/// The eventual answer to one worker request.
///
/// Resolves to [`MaskError::WorkerDisconnected`] if the worker exits
/// before answering.
#[derive(Debug)]
#[must_use = "a pending result does nothing unless waited on or dropped deliberately"]
pub struct Pending<T> {
    rx: Receiver<Result<T, MaskError>>,
}

impl<T> Pending<T> {
    fn channel() -> (Sender<Result<T, MaskError>>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self { rx })
    }

    /// Block until the worker answers.
    ///
    /// # Errors
    ///
    /// Returns the worker's error for this request, or
    /// [`MaskError::WorkerDisconnected`] if it will never answer.
    pub fn wait(self) -> Result<T, MaskError> {
        self.rx.recv().unwrap_or(Err(MaskError::WorkerDisconnected))
    }

    /// The answer if it has already arrived, without blocking.
    ///
    /// Consumes the answer: once this has returned `Some`, later calls
    /// report [`MaskError::WorkerDisconnected`].
    pub fn try_wait(&self) -> Option<Result<T, MaskError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(MaskError::WorkerDisconnected)),
        }
    }
}

/// A running stroke worker thread.
///
/// Messages are processed strictly in submission order. Dropping the
/// handle closes the queue; the thread finishes whatever was already
/// submitted and exits without being joined.
#[derive(Debug)]
pub struct WorkerHandle {
    sender: Option<Sender<Message>>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Spawn an idle worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::WorkerSpawn`] if the OS refuses the thread.
    pub fn spawn() -> Result<Self, MaskError> {
        let (sender, inbox) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("stroke-worker".into())
            .spawn(move || StrokeWorker::new().run(&inbox))
            .map_err(MaskError::WorkerSpawn)?;
        debug!("stroke worker spawned");
        Ok(Self {
            sender: Some(sender),
            thread: Some(thread),
        })
    }

    /// Queue an operation.
    pub fn submit(&self, op: Operation) -> Pending<()> {
        let (reply, pending) = Pending::channel();
        self.send(Message::Run { op, reply });
        pending
    }

    /// Queue the request for the finished scratch buffer.
    pub fn end(&self) -> Pending<StrokeBuffer> {
        let (reply, pending) = Pending::channel();
        self.send(Message::End { reply });
        pending
    }

    /// Whether the worker thread has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Close the queue and wait for the thread to exit.
    pub fn terminate(mut self) {
        self.sender = None;
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("stroke worker panicked");
            } else {
                debug!("stroke worker terminated");
            }
        }
    }

    fn send(&self, message: Message) {
        // A failed send drops the reply sender with the message, so the
        // pending handle resolves to `WorkerDisconnected`.
        if let Some(sender) = &self.sender {
            let _ = sender.send(message);
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        // Closing the queue is enough; joining here could block the caller.
        self.sender = None;
    }
}
