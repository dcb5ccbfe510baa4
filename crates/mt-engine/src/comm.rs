//! Collective communication between the coordinator and its workers.
//!
//! Rank 0 is the coordinator. A run uses exactly one broadcast (or an
//! abort in its place) followed by one gather.

use crossbeam_channel::{unbounded, Receiver, Sender};
use mt_types::{internal_error, CommError, MtResult, Phase};
use std::any::Any;
use tracing::{debug, warn};

/// Rank of the process that performs I/O and reduction
pub const COORDINATOR: usize = 0;

/// Broadcast/gather primitives over a fixed-size group of workers
pub trait Communicator: Send {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    fn is_coordinator(&self) -> bool {
        self.rank() == COORDINATOR
    }

    /// Replicate the coordinator's value to every rank.
    ///
    /// The coordinator passes `Some(value)`, every other rank passes `None`
    /// and blocks until the value (or an abort) arrives.
    fn broadcast<T: Clone + Send + 'static>(&self, value: Option<T>) -> MtResult<T>;

    /// Collect one value per rank at the coordinator, ordered by rank.
    ///
    /// Returns `Some` on the coordinator and `None` elsewhere.
    fn gather<T: Send + 'static>(&self, value: T) -> MtResult<Option<Vec<T>>>;

    /// Tell every other rank that no broadcast will follow.
    fn abort(&self, reason: &str);
}

/// Single-worker communicator; collectives are no-ops
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        COORDINATOR
    }

    fn size(&self) -> usize {
        1
    }

    fn broadcast<T: Clone + Send + 'static>(&self, value: Option<T>) -> MtResult<T> {
        value.ok_or_else(|| internal_error!("coordinator broadcast without a value"))
    }

    fn gather<T: Send + 'static>(&self, value: T) -> MtResult<Option<Vec<T>>> {
        Ok(Some(vec![value]))
    }

    fn abort(&self, reason: &str) {
        debug!("Serial run aborted: {}", reason);
    }
}

enum Message {
    Payload { from: usize, body: Box<dyn Any + Send> },
    Abort { reason: String },
}

/// Endpoint of one rank in an in-process [`ThreadWorld`]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    inbox: Receiver<Message>,
    /// Coordinator: senders to ranks `1..size`. Workers: sender to the coordinator.
    peers: Vec<Sender<Message>>,
}

/// Builds the endpoints of a group of `size` threads
pub struct ThreadWorld;

impl ThreadWorld {
    /// One endpoint per rank, in rank order. `size` must be at least one.
    pub fn new(size: usize) -> Vec<ThreadComm> {
        let size = size.max(1);
        let (to_coordinator, coordinator_inbox) = unbounded();

        let mut worker_senders = Vec::with_capacity(size - 1);
        let mut worker_inboxes = Vec::with_capacity(size - 1);
        for _ in 1..size {
            let (tx, rx) = unbounded();
            worker_senders.push(tx);
            worker_inboxes.push(rx);
        }

        let mut comms = Vec::with_capacity(size);
        comms.push(ThreadComm {
            rank: COORDINATOR,
            size,
            inbox: coordinator_inbox,
            peers: worker_senders,
        });
        for (i, inbox) in worker_inboxes.into_iter().enumerate() {
            comms.push(ThreadComm {
                rank: i + 1,
                size,
                inbox,
                peers: vec![to_coordinator.clone()],
            });
        }
        comms
    }
}

impl ThreadComm {
    fn recv(&self, during: Phase) -> MtResult<Message> {
        self.inbox.recv().map_err(|_| {
            CommError::Disconnected {
                during,
                rank: self.rank,
            }
            .into()
        })
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn broadcast<T: Clone + Send + 'static>(&self, value: Option<T>) -> MtResult<T> {
        if self.is_coordinator() {
            let value = value.ok_or_else(|| internal_error!("coordinator broadcast without a value"))?;
            for (i, peer) in self.peers.iter().enumerate() {
                let message = Message::Payload {
                    from: COORDINATOR,
                    body: Box::new(value.clone()),
                };
                peer.send(message).map_err(|_| CommError::Disconnected {
                    during: Phase::Broadcast,
                    rank: i + 1,
                })?;
            }
            debug!("Broadcast sent to {} workers", self.peers.len());
            return Ok(value);
        }

        match self.recv(Phase::Broadcast)? {
            Message::Payload { from, body } => body.downcast::<T>().map(|v| *v).map_err(|_| {
                CommError::TypeMismatch {
                    during: Phase::Broadcast,
                    rank: from,
                }
                .into()
            }),
            Message::Abort { reason } => Err(CommError::Aborted { reason }.into()),
        }
    }

    fn gather<T: Send + 'static>(&self, value: T) -> MtResult<Option<Vec<T>>> {
        if !self.is_coordinator() {
            let message = Message::Payload {
                from: self.rank,
                body: Box::new(value),
            };
            let disconnected = || CommError::Disconnected {
                during: Phase::Gather,
                rank: COORDINATOR,
            };
            let coordinator = self.peers.first().ok_or_else(disconnected)?;
            coordinator.send(message).map_err(|_| disconnected())?;
            return Ok(None);
        }

        let mut slots: Vec<Option<T>> = (0..self.size).map(|_| None).collect();
        slots[COORDINATOR] = Some(value);

        for _ in 1..self.size {
            match self.recv(Phase::Gather)? {
                Message::Payload { from, body } => {
                    let value = body.downcast::<T>().map_err(|_| CommError::TypeMismatch {
                        during: Phase::Gather,
                        rank: from,
                    })?;
                    match slots.get_mut(from) {
                        Some(slot) if slot.is_none() => *slot = Some(*value),
                        _ => {
                            return Err(internal_error!("unexpected gather message from rank {}", from))
                        }
                    }
                }
                Message::Abort { reason } => {
                    return Err(CommError::Peer {
                        rank: COORDINATOR,
                        message: reason,
                    }
                    .into())
                }
            }
        }

        Ok(Some(slots.into_iter().flatten().collect()))
    }

    fn abort(&self, reason: &str) {
        for (i, peer) in self.peers.iter().enumerate() {
            if peer
                .send(Message::Abort {
                    reason: reason.to_string(),
                })
                .is_err()
            {
                warn!("Rank {} already gone while aborting", i + 1);
            }
        }
    }
}
