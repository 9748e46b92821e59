//! Background controller service
//!
//! The wire protocol is strictly request/reply with one outstanding
//! command, so exactly one background worker executes controller I/O
//! sequentially. The UI submits work items through a cloneable
//! [`ControllerHandle`] and awaits results without blocking its own
//! thread; connect, poll, bulk transfer, and disconnect all serialize
//! through the worker.

use crate::session::{DmcSession, Observer};
use async_trait::async_trait;
use dmckit_core::{DmcError, Result, StatusSnapshot};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

enum Job {
    Connect {
        address: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    IsConnected {
        reply: oneshot::Sender<bool>,
    },
    Execute {
        command: String,
        reply: oneshot::Sender<Result<String>>,
    },
    ReadStatus {
        silent: bool,
        reply: oneshot::Sender<Result<StatusSnapshot>>,
    },
    Upload {
        name: String,
        first: usize,
        last: usize,
        reply: oneshot::Sender<Result<Vec<f64>>>,
    },
    Download {
        name: String,
        first: usize,
        values: Vec<f64>,
        reply: oneshot::Sender<Result<usize>>,
    },
    DiscoverLength {
        name: String,
        probe_max: usize,
        zero_run: usize,
        reply: oneshot::Sender<Result<usize>>,
    },
    WaitForReady {
        timeout: Duration,
        poll: Duration,
        reply: oneshot::Sender<Result<()>>,
    },
    SetObserver {
        observer: Option<Observer>,
        reply: oneshot::Sender<()>,
    },
    SetMaxEdges {
        max_edges: usize,
        reply: oneshot::Sender<()>,
    },
}

/// Spawns the worker that owns a [`DmcSession`]
pub struct ControllerService;

impl ControllerService {
    /// Move the session onto a blocking worker and return its handle
    ///
    /// The worker runs until every handle is dropped, then closes the
    /// connection.
    pub fn spawn(session: DmcSession) -> ControllerHandle {
        let (tx, mut rx) = mpsc::channel::<Job>(32);

        tokio::task::spawn_blocking(move || {
            let mut session = session;
            while let Some(job) = rx.blocking_recv() {
                Self::serve(&mut session, job);
            }
            session.disconnect();
        });

        ControllerHandle { tx }
    }

    fn serve(session: &mut DmcSession, job: Job) {
        match job {
            Job::Connect { address, reply } => {
                let _ = reply.send(session.connect(&address));
            }
            Job::Disconnect { reply } => {
                session.disconnect();
                let _ = reply.send(());
            }
            Job::IsConnected { reply } => {
                let _ = reply.send(session.is_connected());
            }
            Job::Execute { command, reply } => {
                let _ = reply.send(session.execute(&command));
            }
            Job::ReadStatus { silent, reply } => {
                let result = if silent {
                    session.read_status_silent()
                } else {
                    session.read_status()
                };
                let _ = reply.send(result);
            }
            Job::Upload {
                name,
                first,
                last,
                reply,
            } => {
                let _ = reply.send(session.upload(&name, first, last));
            }
            Job::Download {
                name,
                first,
                values,
                reply,
            } => {
                let _ = reply.send(session.download(&name, first, &values));
            }
            Job::DiscoverLength {
                name,
                probe_max,
                zero_run,
                reply,
            } => {
                let _ = reply.send(session.discover_length(&name, probe_max, zero_run));
            }
            Job::WaitForReady {
                timeout,
                poll,
                reply,
            } => {
                let _ = reply.send(session.wait_for_ready(timeout, poll));
            }
            Job::SetObserver { observer, reply } => {
                session.set_observer(observer);
                let _ = reply.send(());
            }
            Job::SetMaxEdges { max_edges, reply } => {
                session.set_max_edges(max_edges);
                let _ = reply.send(());
            }
        }
    }
}

fn worker_stopped() -> DmcError {
    DmcError::comm("controller worker stopped")
}

/// Asynchronous operations a controller offers its collaborators
///
/// The UI depends only on this trait; the production implementation is
/// [`ControllerHandle`], test doubles implement it directly.
#[async_trait]
pub trait Controller: Send + Sync {
    /// Open a connection to a controller address
    async fn connect(&self, address: &str) -> Result<()>;
    /// Close the connection
    async fn disconnect(&self) -> Result<()>;
    /// Whether a verified connection is open
    async fn is_connected(&self) -> bool;
    /// Execute one command and return the raw reply
    async fn execute(&self, command: &str) -> Result<String>;
    /// Read a fresh status snapshot
    async fn read_status(&self) -> Result<StatusSnapshot>;
    /// Read a status snapshot through the silent path
    async fn read_status_silent(&self) -> Result<StatusSnapshot>;
    /// Read the inclusive element range `[first, last]` of an array
    async fn upload(&self, name: &str, first: usize, last: usize) -> Result<Vec<f64>>;
    /// Write consecutive elements starting at `first`
    async fn download(&self, name: &str, first: usize, values: Vec<f64>) -> Result<usize>;
    /// Probe an array's logical length
    async fn discover_length(&self, name: &str, probe_max: usize, zero_run: usize)
        -> Result<usize>;
    /// Block until the controller reports ready
    async fn wait_for_ready(&self, timeout: Duration, poll: Duration) -> Result<()>;
    /// Attach or clear the observer callback
    async fn set_observer(&self, observer: Option<Observer>) -> Result<()>;
    /// Set the array index cap
    async fn set_max_edges(&self, max_edges: usize) -> Result<()>;
}

/// Cloneable front to the controller worker
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<Job>,
}

impl ControllerHandle {
    async fn submit<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Job) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| worker_stopped())?;
        rx.await.map_err(|_| worker_stopped())
    }

    /// Whether the worker is still running
    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }
}

#[async_trait]
impl Controller for ControllerHandle {
    async fn connect(&self, address: &str) -> Result<()> {
        let address = address.to_string();
        self.submit(|reply| Job::Connect { address, reply }).await?
    }

    async fn disconnect(&self) -> Result<()> {
        self.submit(|reply| Job::Disconnect { reply }).await
    }

    async fn is_connected(&self) -> bool {
        self.submit(|reply| Job::IsConnected { reply })
            .await
            .unwrap_or(false)
    }

    async fn execute(&self, command: &str) -> Result<String> {
        let command = command.to_string();
        self.submit(|reply| Job::Execute { command, reply }).await?
    }

    async fn read_status(&self) -> Result<StatusSnapshot> {
        self.submit(|reply| Job::ReadStatus {
            silent: false,
            reply,
        })
        .await?
    }

    async fn read_status_silent(&self) -> Result<StatusSnapshot> {
        self.submit(|reply| Job::ReadStatus {
            silent: true,
            reply,
        })
        .await?
    }

    async fn upload(&self, name: &str, first: usize, last: usize) -> Result<Vec<f64>> {
        let name = name.to_string();
        self.submit(|reply| Job::Upload {
            name,
            first,
            last,
            reply,
        })
        .await?
    }

    async fn download(&self, name: &str, first: usize, values: Vec<f64>) -> Result<usize> {
        let name = name.to_string();
        self.submit(|reply| Job::Download {
            name,
            first,
            values,
            reply,
        })
        .await?
    }

    async fn discover_length(
        &self,
        name: &str,
        probe_max: usize,
        zero_run: usize,
    ) -> Result<usize> {
        let name = name.to_string();
        self.submit(|reply| Job::DiscoverLength {
            name,
            probe_max,
            zero_run,
            reply,
        })
        .await?
    }

    async fn wait_for_ready(&self, timeout: Duration, poll: Duration) -> Result<()> {
        self.submit(|reply| Job::WaitForReady {
            timeout,
            poll,
            reply,
        })
        .await?
    }

    async fn set_observer(&self, observer: Option<Observer>) -> Result<()> {
        self.submit(|reply| Job::SetObserver { observer, reply })
            .await
    }

    async fn set_max_edges(&self, max_edges: usize) -> Result<()> {
        self.submit(|reply| Job::SetMaxEdges { max_edges, reply })
            .await
    }
}

/// Latest status snapshot shared between the poller and its readers
#[derive(Clone, Default)]
pub struct StatusFeed {
    latest: Arc<RwLock<Option<StatusSnapshot>>>,
}

impl StatusFeed {
    /// The most recent snapshot, if any poll has succeeded yet
    pub fn latest(&self) -> Option<StatusSnapshot> {
        *self.latest.read()
    }

    fn store(&self, snapshot: StatusSnapshot) {
        *self.latest.write() = Some(snapshot);
    }
}

/// Poll status at a fixed cadence through the silent path
///
/// A failed poll is logged and the next one is scheduled anyway; nothing
/// here can crash the loop. The poller holds only a weak reference to
/// the worker's channel, so it does not keep the worker alive: once
/// every [`ControllerHandle`] is dropped the worker exits, the upgrade
/// fails, and the task ends.
pub fn spawn_status_poller(
    handle: ControllerHandle,
    period: Duration,
) -> (StatusFeed, tokio::task::JoinHandle<()>) {
    let feed = StatusFeed::default();
    let writer = feed.clone();
    let weak = handle.tx.downgrade();
    drop(handle);
    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            // The strong sender lives only for the duration of one poll.
            let Some(tx) = weak.upgrade() else { break };
            let handle = ControllerHandle { tx };
            match handle.read_status_silent().await {
                Ok(snapshot) => writer.store(snapshot),
                Err(e) => tracing::debug!("status poll failed: {}", e),
            }
        }
    });
    (feed, task)
}
