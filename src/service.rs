//! Serialized async front end for the raffle state machine.
//!
//! A single spawned task owns the [`Raffle`]; callers talk to it through
//! a cloneable [`RaffleHandle`]. Commands are applied one at a time in
//! arrival order, which makes concurrent entries linearizable and makes
//! the Open→Closing transition atomic with respect to in-flight entries:
//! an entry either lands before the close is applied or is rejected with
//! `RoundNotOpen`, never silently dropped.

use crate::engine::{Raffle, RaffleError, RaffleStatus};
use crate::types::{self, Address, Amount, RequestId};
use crate::upkeep::UpkeepCheck;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// The raffle task is gone; no further commands can be applied.
    #[error("raffle service is closed")]
    Closed,
    #[error(transparent)]
    Raffle(#[from] RaffleError),
}

enum Command {
    Enter {
        from: Address,
        value: Amount,
        reply: oneshot::Sender<Result<(), RaffleError>>,
    },
    CheckUpkeep {
        reply: oneshot::Sender<UpkeepCheck>,
    },
    PerformUpkeep {
        reply: oneshot::Sender<Result<RequestId, RaffleError>>,
    },
    Fulfill {
        request_id: RequestId,
        random_value: u64,
        reply: oneshot::Sender<Result<Address, RaffleError>>,
    },
    Status {
        reply: oneshot::Sender<RaffleStatus>,
    },
}

/// Cheap-clone handle to the raffle task.
#[derive(Clone)]
pub struct RaffleHandle {
    tx: mpsc::Sender<Command>,
}

/// Spawn the task that owns `raffle` and serialize all access to it.
pub fn spawn(mut raffle: Raffle) -> RaffleHandle {
    let (tx, mut rx) = mpsc::channel(64);
    tokio::spawn(async move {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                Command::Enter { from, value, reply } => {
                    let _ = reply.send(raffle.enter(from, value));
                }
                Command::CheckUpkeep { reply } => {
                    let _ = reply.send(raffle.check_upkeep(types::now()));
                }
                Command::PerformUpkeep { reply } => {
                    let _ = reply.send(raffle.perform_upkeep(types::now()));
                }
                Command::Fulfill {
                    request_id,
                    random_value,
                    reply,
                } => {
                    let result = raffle.fulfill_randomness(request_id, random_value, types::now());
                    if let Err(e) = &result {
                        warn!("fulfillment {} rejected: {}", request_id, e);
                    }
                    let _ = reply.send(result);
                }
                Command::Status { reply } => {
                    let _ = reply.send(raffle.status());
                }
            }
        }
    });
    RaffleHandle { tx }
}

impl RaffleHandle {
    async fn dispatch<T>(
        &self,
        cmd: Command,
        rx: oneshot::Receiver<T>,
    ) -> Result<T, ServiceError> {
        self.tx.send(cmd).await.map_err(|_| ServiceError::Closed)?;
        rx.await.map_err(|_| ServiceError::Closed)
    }

    pub async fn enter(&self, from: Address, value: Amount) -> Result<(), ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(Command::Enter { from, value, reply }, rx)
            .await?
            .map_err(ServiceError::from)
    }

    pub async fn check_upkeep(&self) -> Result<UpkeepCheck, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(Command::CheckUpkeep { reply }, rx).await
    }

    pub async fn perform_upkeep(&self) -> Result<RequestId, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(Command::PerformUpkeep { reply }, rx)
            .await?
            .map_err(ServiceError::from)
    }

    pub async fn fulfill_randomness(
        &self,
        request_id: RequestId,
        random_value: u64,
    ) -> Result<Address, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(
            Command::Fulfill {
                request_id,
                random_value,
                reply,
            },
            rx,
        )
        .await?
        .map_err(ServiceError::from)
    }

    pub async fn status(&self) -> Result<RaffleStatus, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(Command::Status { reply }, rx).await
    }
}
