//! Async front of a [`DebugSession`].
//!
//! Client requests, runtime events and finished script-load jobs all go
//! through one ordered queue consumed by a single task, so every state
//! change happens in arrival order. Map loading runs on the blocking pool
//! and re-enters the queue when done. Runtime events that arrive while a
//! load is in flight are held back until every load started before them
//! has been applied, so a pause or `loadingComplete` never overtakes the
//! script it follows.

use std::collections::VecDeque;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult};
use crate::protocol::{ClientEvent, ClientRequest, ClientResponse, RuntimeEvent};
use crate::runtime::Runtime;
use crate::scheduler::{ScriptLoadJob, ScriptLoadOutcome};
use crate::session::DebugSession;

/// One entry of the session queue.
#[derive(Debug)]
pub enum SessionMessage {
    Request {
        request: ClientRequest,
        reply: oneshot::Sender<EngineResult<ClientResponse>>,
    },
    Runtime(RuntimeEvent),
    ScriptLoadFinished(ScriptLoadOutcome),
}

/// Cloneable sender side of a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionMessage>,
}

impl SessionHandle {
    /// Send a client request and wait for its response.
    pub async fn request(&self, request: ClientRequest) -> EngineResult<ClientResponse> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(SessionMessage::Request { request, reply })
            .map_err(|_| EngineError::SessionClosed)?;
        response.await.map_err(|_| EngineError::SessionClosed)?
    }

    /// Post a runtime notification.
    pub fn runtime_event(&self, event: RuntimeEvent) -> EngineResult<()> {
        self.tx
            .send(SessionMessage::Runtime(event))
            .map_err(|_| EngineError::SessionClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawns the task that owns a session.
pub struct SessionDriver;

impl SessionDriver {
    /// Move `session` into a tokio task.
    ///
    /// Returns the request handle, the stream of client events, and the
    /// task, which returns the session once it terminates or every handle
    /// is dropped.
    pub fn spawn<R>(
        session: DebugSession<R>,
    ) -> (
        SessionHandle,
        mpsc::UnboundedReceiver<ClientEvent>,
        JoinHandle<DebugSession<R>>,
    )
    where
        R: Runtime + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let loopback = tx.downgrade();
        let task = tokio::spawn(run(session, rx, loopback, events_tx));
        (SessionHandle { tx }, events_rx, task)
    }
}

/// Start `job` on the blocking pool; its outcome comes back through `tx`.
fn spawn_job(job: ScriptLoadJob, tx: mpsc::UnboundedSender<SessionMessage>) {
    let generated = job.generated().clone();
    tokio::spawn(async move {
        let outcome = match tokio::task::spawn_blocking(move || job.run()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(script = %generated, error = %e, "script load job failed");
                ScriptLoadOutcome {
                    generated,
                    mapper: None,
                    translations: Vec::new(),
                }
            }
        };
        if tx.send(SessionMessage::ScriptLoadFinished(outcome)).is_err() {
            debug!("session ended before the script load finished");
        }
    });
}

async fn run<R: Runtime + 'static>(
    mut session: DebugSession<R>,
    mut rx: mpsc::UnboundedReceiver<SessionMessage>,
    loopback: mpsc::WeakUnboundedSender<SessionMessage>,
    events: mpsc::UnboundedSender<ClientEvent>,
) -> DebugSession<R> {
    let mut in_flight: usize = 0;
    let mut held: VecDeque<RuntimeEvent> = VecDeque::new();

    while let Some(message) = rx.recv().await {
        match message {
            SessionMessage::Request { request, reply } => {
                let result = session.handle_request(request);
                if reply.send(result).is_err() {
                    debug!("requester went away before the response");
                }
            }
            SessionMessage::Runtime(RuntimeEvent::ScriptLoaded { path }) => {
                if let Some(job) = session.prepare_script_load(&path) {
                    let Some(tx) = loopback.upgrade() else { break };
                    in_flight += 1;
                    spawn_job(job, tx);
                }
            }
            SessionMessage::Runtime(event) if in_flight > 0 => {
                debug!(?event, in_flight, "holding runtime event behind script loads");
                held.push_back(event);
            }
            SessionMessage::Runtime(event) => handle_runtime_event(&mut session, event),
            SessionMessage::ScriptLoadFinished(outcome) => {
                in_flight = in_flight.saturating_sub(1);
                if let Err(e) = session.apply_script_load(outcome) {
                    warn!(error = %e, "applying script load failed");
                }
                if in_flight == 0 {
                    while let Some(event) = held.pop_front() {
                        handle_runtime_event(&mut session, event);
                    }
                }
            }
        }

        for event in session.drain_events() {
            if events.send(event).is_err() {
                debug!("event receiver dropped");
            }
        }

        if session.is_terminated() {
            break;
        }
    }
    debug!("session task finished");
    session
}

fn handle_runtime_event<R: Runtime>(session: &mut DebugSession<R>, event: RuntimeEvent) {
    if let Err(e) = session.handle_runtime_event(event) {
        warn!(error = %e, "runtime event failed");
    }
}
