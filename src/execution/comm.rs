//! Collective communication between workers.
//!
//! Workers own disjoint memory and exchange data only through three
//! collectives rooted at the coordinating worker (rank 0): a broadcast, a
//! scatter and a gather. Links form a star: the coordinator holds a sender
//! to every worker and each worker holds a sender to the coordinator, so
//! when the coordinator drops its [`Communicator`] every blocked worker
//! wakes up with an error instead of hanging.

use crate::core::error::{SobelError, SobelResult};
use crossbeam::channel::{unbounded, Receiver, Sender};
use log::debug;

/// Rank of the coordinating worker.
pub const ROOT: usize = 0;

enum Links<M> {
    /// Coordinator: one sender per rank (`None` for itself).
    Root(Vec<Option<Sender<M>>>),
    /// Worker: a single sender to the coordinator.
    Worker(Sender<M>),
}

/// One worker's endpoint into a [`Topology`].
pub struct Communicator<M> {
    rank: usize,
    size: usize,
    inbox: Receiver<M>,
    links: Links<M>,
}

impl<M> std::fmt::Debug for Communicator<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Communicator")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .field("pending", &self.inbox.len())
            .finish()
    }
}

/// Builder for the endpoints of a fixed-size worker group.
#[derive(Debug, Clone, Copy)]
pub struct Topology {
    size: usize,
}

impl Topology {
    /// A topology of `size` workers.
    pub fn new(size: usize) -> SobelResult<Self> {
        if size == 0 {
            return Err(SobelError::Config("a topology needs at least one worker".to_string()));
        }
        Ok(Self { size })
    }

    /// Number of workers.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Create one communicator per rank, indexed by rank.
    pub fn communicators<M: Send>(&self) -> Vec<Communicator<M>> {
        let (senders, receivers): (Vec<Sender<M>>, Vec<Receiver<M>>) =
            (0..self.size).map(|_| unbounded()).unzip();

        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| {
                let links = if rank == ROOT {
                    Links::Root(
                        senders
                            .iter()
                            .enumerate()
                            .map(|(peer, tx)| (peer != ROOT).then(|| tx.clone()))
                            .collect(),
                    )
                } else {
                    Links::Worker(senders[ROOT].clone())
                };
                Communicator {
                    rank,
                    size: self.size,
                    inbox,
                    links,
                }
            })
            .collect()
    }
}

impl<M: Send> Communicator<M> {
    /// This worker's rank.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of workers in the topology.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether this is the coordinating worker.
    pub fn is_root(&self) -> bool {
        self.rank == ROOT
    }

    fn closed(&self, reason: impl Into<String>) -> SobelError {
        SobelError::Communication {
            rank: self.rank,
            reason: reason.into(),
        }
    }

    fn recv(&self) -> SobelResult<M> {
        self.inbox
            .recv()
            .map_err(|_| self.closed("all peers disconnected"))
    }

    fn send_to(&self, peer: usize, message: M) -> SobelResult<()> {
        let sender = match &self.links {
            Links::Root(senders) => senders.get(peer).and_then(Option::as_ref),
            Links::Worker(root) if peer == ROOT => Some(root),
            Links::Worker(_) => None,
        }
        .ok_or_else(|| self.closed(format!("no link to rank {}", peer)))?;

        sender
            .send(message)
            .map_err(|_| self.closed(format!("rank {} hung up", peer)))
    }

    /// Send `value` from the coordinator to every worker.
    ///
    /// The coordinator passes `Some(value)`; every other rank passes `None`
    /// and blocks until the value arrives.
    pub fn broadcast(&self, value: Option<M>) -> SobelResult<M>
    where
        M: Clone,
    {
        if !self.is_root() {
            return self.recv();
        }
        let value = value.ok_or_else(|| self.closed("coordinator has nothing to broadcast"))?;
        for peer in (0..self.size).filter(|&peer| peer != ROOT) {
            self.send_to(peer, value.clone())?;
        }
        debug!("rank {} broadcast to {} peer(s)", self.rank, self.size - 1);
        Ok(value)
    }

    /// Hand element `i` of `values` to rank `i`.
    ///
    /// The coordinator passes exactly `size` values and keeps its own;
    /// every other rank passes `None` and blocks until its value arrives.
    pub fn scatter(&self, values: Option<Vec<M>>) -> SobelResult<M> {
        if !self.is_root() {
            return self.recv();
        }
        let values = values.ok_or_else(|| self.closed("coordinator has nothing to scatter"))?;
        if values.len() != self.size {
            return Err(SobelError::topology(
                self.size,
                0,
                format!("cannot scatter {} values across {} workers", values.len(), self.size),
            ));
        }

        let mut own = None;
        for (peer, value) in values.into_iter().enumerate() {
            if peer == ROOT {
                own = Some(value);
            } else {
                self.send_to(peer, value)?;
            }
        }
        debug!("rank {} scattered to {} peer(s)", self.rank, self.size - 1);
        own.ok_or_else(|| self.closed("coordinator share missing from scatter"))
    }

    /// Collect one value from every rank at the coordinator.
    ///
    /// Returns `Some` with all `size` values (the coordinator's first, the
    /// rest in arrival order) on the coordinator and `None` elsewhere. Fails
    /// on the coordinator if every remaining worker hangs up before sending.
    pub fn gather(&self, value: M) -> SobelResult<Option<Vec<M>>> {
        if !self.is_root() {
            self.send_to(ROOT, value)?;
            return Ok(None);
        }
        let mut values = Vec::with_capacity(self.size);
        values.push(value);
        while values.len() < self.size {
            match self.inbox.recv() {
                Ok(value) => values.push(value),
                Err(_) => {
                    return Err(SobelError::incomplete(
                        self.size,
                        values.len(),
                        "workers disconnected before sending their results",
                    ))
                }
            }
        }
        debug!("rank {} gathered {} value(s)", self.rank, values.len());
        Ok(Some(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_rank_collectives() {
        let mut comms = Topology::new(1).unwrap().communicators::<u32>();
        let comm = comms.pop().unwrap();
        assert!(comm.is_root());
        assert_eq!(comm.broadcast(Some(7)).unwrap(), 7);
        assert_eq!(comm.scatter(Some(vec![3])).unwrap(), 3);
        assert_eq!(comm.gather(9).unwrap(), Some(vec![9]));
    }

    #[test]
    fn test_zero_size_topology() {
        assert!(Topology::new(0).is_err());
    }

    #[test]
    fn test_collectives_across_threads() {
        let comms = Topology::new(4).unwrap().communicators::<u32>();
        let gathered = crossbeam::scope(|scope| {
            let mut comms = comms.into_iter();
            let root = comms.next().unwrap();
            for comm in comms {
                scope.spawn(move |_| {
                    let base = comm.broadcast(None).unwrap();
                    let share = comm.scatter(None).unwrap();
                    assert_eq!(comm.gather(base + share).unwrap(), None);
                });
            }

            let base = root.broadcast(Some(100)).unwrap();
            let share = root.scatter(Some(vec![0, 1, 2, 3])).unwrap();
            root.gather(base + share).unwrap().unwrap()
        })
        .unwrap();

        let mut gathered = gathered;
        assert_eq!(gathered[0], 100);
        gathered.sort_unstable();
        assert_eq!(gathered, vec![100, 101, 102, 103]);
    }

    #[test]
    fn test_worker_unblocks_when_root_drops() {
        let comms = Topology::new(2).unwrap().communicators::<u32>();
        let result = crossbeam::scope(|scope| {
            let mut comms = comms.into_iter();
            let root = comms.next().unwrap();
            let worker = comms.next().unwrap();
            let handle = scope.spawn(move |_| worker.broadcast(None));
            drop(root);
            handle.join().unwrap()
        })
        .unwrap();
        assert!(matches!(result, Err(SobelError::Communication { rank: 1, .. })));
    }

    #[test]
    fn test_gather_reports_missing_workers() {
        let comms = Topology::new(3).unwrap().communicators::<u32>();
        let mut comms = comms.into_iter();
        let root = comms.next().unwrap();
        let worker = comms.next().unwrap();
        worker.gather(5).unwrap();
        drop(worker);
        drop(comms);

        let result = root.gather(1);
        assert!(matches!(
            result,
            Err(SobelError::IncompletePartitionSet { expected: 3, received: 2, .. })
        ));
    }

    #[test]
    fn test_scatter_length_mismatch() {
        let comms = Topology::new(2).unwrap().communicators::<u32>();
        let root = comms.into_iter().next().unwrap();
        assert!(matches!(
            root.scatter(Some(vec![1, 2, 3])),
            Err(SobelError::InvalidTopology { .. })
        ));
    }
}
