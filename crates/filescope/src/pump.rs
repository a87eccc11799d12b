//! Single-task signal pump for multi-threaded hosts.
//!
//! The session and its dispatcher move into one tokio task. Signals and
//! orchestration calls from any thread are queued on a channel and applied
//! there one at a time, so a signal's handler chain never interleaves with
//! another signal or with an analyzer call.

use filescope_core::{FilesError, Result, Signal};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::dispatch::Dispatcher;
use crate::engine::Engine;
use crate::session::Session;

/// Queue depth used by [`spawn`].
pub const DEFAULT_CAPACITY: usize = 1024;

type Call<E> = Box<dyn FnOnce(&mut Session<E>) + Send>;

enum Command<E> {
    Signal(Signal),
    Call(Call<E>),
}

/// Sending side of a running pump.
pub struct PumpHandle<E> {
    tx: mpsc::Sender<Command<E>>,
    task: JoinHandle<Session<E>>,
}

/// Start a pump with the default queue depth.
pub fn spawn<E>(dispatcher: Dispatcher<E>, session: Session<E>) -> PumpHandle<E>
where
    E: Engine + Send + 'static,
{
    spawn_with_capacity(dispatcher, session, DEFAULT_CAPACITY)
}

pub fn spawn_with_capacity<E>(
    dispatcher: Dispatcher<E>,
    mut session: Session<E>,
    capacity: usize,
) -> PumpHandle<E>
where
    E: Engine + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<Command<E>>(capacity.max(1));
    let task = tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Signal(signal) => dispatcher.dispatch(&mut session, &signal),
                Command::Call(call) => call(&mut session),
            }
        }
        debug!(logged = session.logged(), "signal pump drained");
        session
    });
    PumpHandle { tx, task }
}

impl<E: Engine + Send + 'static> PumpHandle<E> {
    /// Queue a lifecycle signal.
    pub async fn send(&self, signal: Signal) -> Result<()> {
        self.tx
            .send(Command::Signal(signal))
            .await
            .map_err(|_| FilesError::PumpClosed)
    }

    /// Run `f` against the session on the pump task, after everything
    /// queued before it.
    pub async fn call<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Session<E>) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let call: Call<E> = Box::new(move |session| {
            let _ = reply_tx.send(f(session));
        });
        self.tx
            .send(Command::Call(call))
            .await
            .map_err(|_| FilesError::PumpClosed)?;
        reply_rx.await.map_err(|_| FilesError::PumpClosed)
    }

    /// Stop accepting input, drain the queue and return the session.
    pub async fn shutdown(self) -> Result<Session<E>> {
        drop(self.tx);
        self.task.await.map_err(|_| FilesError::PumpClosed)
    }
}
