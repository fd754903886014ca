//! Actor wrapper that serializes requests onto one coordinator task.

use super::Coordinator;
use crate::protocol::{Request, Response};
use crate::repo::note_repo::NoteRepository;
use log::{info, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

const COORDINATOR_STOPPED: &str = "Coordinator is not running";

struct Envelope {
    request: Request,
    reply: oneshot::Sender<Response>,
}

/// Cloneable sender side of the coordinator queue.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    sender: mpsc::Sender<Envelope>,
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("action", &self.request.action())
            .finish()
    }
}

impl CoordinatorHandle {
    /// Queues `request` and waits for its response.
    ///
    /// A stopped coordinator yields a failure response instead of an error.
    pub async fn send(&self, request: Request) -> Response {
        let (reply, receiver) = oneshot::channel();
        if self.sender.send(Envelope { request, reply }).await.is_err() {
            warn!("event=request_enqueue module=coordinator status=error error_code=stopped");
            return Response::failure(COORDINATOR_STOPPED);
        }
        receiver
            .await
            .unwrap_or_else(|_| Response::failure(COORDINATOR_STOPPED))
    }

    /// Decodes one JSON line and sends it.
    pub async fn send_json(&self, raw: &str) -> Response {
        match Request::from_json(raw) {
            Ok(request) => self.send(request).await,
            Err(failure) => failure,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Moves `coordinator` onto a tokio task and returns its handle.
///
/// The task exits once every handle is dropped.
pub fn spawn<R>(coordinator: Coordinator<R>, capacity: usize) -> (CoordinatorHandle, JoinHandle<()>)
where
    R: NoteRepository + 'static,
{
    let (sender, mut receiver) = mpsc::channel::<Envelope>(capacity.max(1));
    let task = tokio::spawn(async move {
        let mut coordinator = coordinator;
        info!("event=coordinator_start module=coordinator status=ok");
        while let Some(Envelope { request, reply }) = receiver.recv().await {
            let response = coordinator.dispatch(request).await;
            // Caller may have given up waiting.
            let _ = reply.send(response);
        }
        info!("event=coordinator_stop module=coordinator status=ok");
    });
    (CoordinatorHandle { sender }, task)
}
