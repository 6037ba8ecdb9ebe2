//! In-process multi-rank substrate.
//!
//! [`LocalCluster`] wires `n` [`ThreadComm`] endpoints together with
//! crossbeam channels, one inbox per rank. Collectives are gathered on the
//! first member of a communicator and broadcast back. Messages carry a
//! context id (one per communicator) and a per-communicator sequence
//! number, so traffic of a sub-group never matches a world collective.
//! Messages that arrive early are parked in the endpoint's pending list.

use std::panic;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::communicator::{validate_members, Communicator};
use crate::error::CommError;

const WORLD_CONTEXT: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

#[derive(Clone, Copy, Debug)]
struct Envelope {
    context: u64,
    seq: u64,
    from: usize,
    value: u64,
}

struct Endpoint {
    world_rank: usize,
    inbox: Receiver<Envelope>,
    outboxes: Vec<Sender<Envelope>>,
    pending: Vec<Envelope>,
    timeout: Duration,
}

impl Endpoint {
    fn send(&self, to: usize, envelope: Envelope) -> Result<(), CommError> {
        self.outboxes[to]
            .send(envelope)
            .map_err(|_| CommError::Disconnected)
    }

    fn recv(&mut self, context: u64, seq: u64, from: usize, rank: usize) -> Result<u64, CommError> {
        let matches = |e: &Envelope| e.context == context && e.seq == seq && e.from == from;
        if let Some(pos) = self.pending.iter().position(matches) {
            return Ok(self.pending.swap_remove(pos).value);
        }
        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.inbox.recv_timeout(remaining) {
                Ok(e) if matches(&e) => return Ok(e.value),
                Ok(e) => self.pending.push(e),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(CommError::Timeout { rank, context })
                }
                Err(RecvTimeoutError::Disconnected) => return Err(CommError::Disconnected),
            }
        }
    }
}

/// One rank's view of a communicator in a [`LocalCluster`].
pub struct ThreadComm {
    endpoint: Arc<Mutex<Endpoint>>,
    context: u64,
    /// World ranks of the members, in communicator rank order.
    members: Vec<usize>,
    rank: usize,
    seq: u64,
}

impl ThreadComm {
    fn next_seq(&mut self) -> u64 {
        let s = self.seq;
        self.seq += 1;
        s
    }

    fn child_context(&self, seq: u64, members: &[usize]) -> u64 {
        let mut h = self.context;
        for word in std::iter::once(seq).chain(members.iter().map(|&m| m as u64)) {
            for byte in word.to_le_bytes() {
                h ^= u64::from(byte);
                h = h.wrapping_mul(FNV_PRIME);
            }
        }
        h
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.members.len()
    }

    fn barrier(&mut self) -> Result<(), CommError> {
        self.all_reduce_max(0).map(|_| ())
    }

    fn all_reduce_max(&mut self, value: u64) -> Result<u64, CommError> {
        let seq = self.next_seq();
        let context = self.context;
        let root = self.members[0];
        let mut ep = self.endpoint.lock().unwrap_or_else(PoisonError::into_inner);
        if self.rank == 0 {
            let mut acc = value;
            for &peer in &self.members[1..] {
                acc = acc.max(ep.recv(context, seq, peer, self.rank)?);
            }
            for &peer in &self.members[1..] {
                ep.send(peer, Envelope { context, seq, from: root, value: acc })?;
            }
            Ok(acc)
        } else {
            let from = ep.world_rank;
            ep.send(root, Envelope { context, seq, from, value })?;
            ep.recv(context, seq, root, self.rank)
        }
    }

    fn create_subgroup(
        &mut self,
        members: &[usize],
    ) -> Result<Option<Box<dyn Communicator>>, CommError> {
        validate_members(members, self.size())?;
        let seq = self.seq;
        self.barrier()?;
        let Some(rank) = members.iter().position(|&m| m == self.rank) else {
            return Ok(None);
        };
        let world_members: Vec<usize> = members.iter().map(|&m| self.members[m]).collect();
        Ok(Some(Box::new(ThreadComm {
            endpoint: Arc::clone(&self.endpoint),
            context: self.child_context(seq, &world_members),
            members: world_members,
            rank,
            seq: 0,
        })))
    }
}

/// A set of ranks running as threads of the current process.
#[derive(Clone, Debug)]
pub struct LocalCluster {
    size: usize,
    timeout: Duration,
}

impl LocalCluster {
    /// Default deadline for a single collective.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// A cluster of `size` ranks.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Override the per-collective deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Number of ranks.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Build one world communicator per rank, indexed by rank.
    pub fn comms(&self) -> Vec<ThreadComm> {
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..self.size).map(|_| crossbeam_channel::unbounded()).unzip();
        let members: Vec<usize> = (0..self.size).collect();
        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| ThreadComm {
                endpoint: Arc::new(Mutex::new(Endpoint {
                    world_rank: rank,
                    inbox,
                    outboxes: senders.clone(),
                    pending: Vec::new(),
                    timeout: self.timeout,
                })),
                context: WORLD_CONTEXT,
                members: members.clone(),
                rank,
                seq: 0,
            })
            .collect()
    }

    /// Run `f` once per rank, each on its own thread, and collect the
    /// results in rank order.
    ///
    /// A panic on any rank is re-raised on the caller.
    pub fn run<T, F>(&self, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(ThreadComm) -> T + Sync,
    {
        let comms = self.comms();
        let f = &f;
        thread::scope(|s| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|comm| s.spawn(move || f(comm)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|p| panic::resume_unwind(p)))
                .collect()
        })
    }
}
