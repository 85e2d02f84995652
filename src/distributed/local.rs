//! In-process transport: one thread per rank.
//!
//! Every collective is a rendezvous. A rank posts its contribution under
//! its own sequence number; when the last rank of the group posts the
//! same number, the round is sealed and every rank picks out the part it
//! needs. Posting never blocks, which is what makes the non-blocking
//! collectives real: a rank can post a scatter, do other work, and only
//! wait when it needs the data.
//!
//! Aborting poisons the group. Ranks blocked in a collective wake up with
//! [`CommError::Aborted`], abort in turn, and [`LocalGroup::run`] reports
//! [`Error::Aborted`] instead of a result.

use std::cell::Cell;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::distributed::{Collective, CommError, CommResult, Communicator, Request};
use crate::error::{Error, Result};

/// Launches a group of ranks on scoped threads.
pub struct LocalGroup;

impl LocalGroup {
    /// Run `f` once per rank, each on its own thread, and collect the
    /// results in rank order.
    ///
    /// Returns [`Error::Aborted`] if any rank aborted the group. A rank
    /// that panics for any other reason poisons the group first, so the
    /// others don't hang, and the panic is re-raised here.
    pub fn run<T, F>(size: usize, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(&LocalComm) -> T + Sync,
    {
        if size == 0 {
            return Err(Error::EmptyGroup);
        }
        let shared = Shared::new(size);
        let outcomes: Vec<std::thread::Result<T>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..size)
                .map(|rank| {
                    let shared = &shared;
                    let f = &f;
                    s.spawn(move || {
                        let comm = LocalComm {
                            rank,
                            shared,
                            seq: Cell::new(0),
                        };
                        let out = panic::catch_unwind(AssertUnwindSafe(|| f(&comm)));
                        if out.is_err() {
                            shared.poison(rank, ABORT_PANIC);
                        }
                        out
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().and_then(|r| r))
                .collect()
        });

        let mut results = Vec::with_capacity(size);
        let mut foreign_panic = None;
        for outcome in outcomes {
            match outcome {
                Ok(v) => results.push(v),
                Err(payload) if payload.is::<AbortSignal>() => {}
                Err(payload) => {
                    foreign_panic.get_or_insert(payload);
                }
            }
        }
        if let Some(payload) = foreign_panic {
            panic::resume_unwind(payload);
        }
        if let Some((rank, code)) = shared.aborted() {
            return Err(Error::Aborted { rank, code });
        }
        Ok(results)
    }
}

const ABORT_PANIC: i32 = 101;

/// Unwind payload of an aborting rank.
struct AbortSignal;

/// One rank's handle on its group.
pub struct LocalComm<'g> {
    rank: usize,
    shared: &'g Shared,
    seq: Cell<u64>,
}

struct Shared {
    size: usize,
    state: Mutex<State>,
    sealed: Condvar,
}

#[derive(Default)]
struct State {
    rounds: HashMap<u64, Round>,
    aborted: Option<(usize, i32)>,
}

struct Round {
    posted: Vec<Option<Contribution>>,
    arrived: usize,
    sealed: Option<Arc<Vec<Contribution>>>,
    unread: usize,
}

struct Contribution {
    op: Collective,
    root: usize,
    data: Vec<f32>,
}

impl Shared {
    fn new(size: usize) -> Self {
        Self {
            size,
            state: Mutex::new(State::default()),
            sealed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn aborted(&self) -> Option<(usize, i32)> {
        self.lock().aborted
    }

    fn poison(&self, rank: usize, code: i32) {
        let mut state = self.lock();
        state.aborted.get_or_insert((rank, code));
        self.sealed.notify_all();
    }

    fn post(&self, seq: u64, rank: usize, contribution: Contribution) -> CommResult<()> {
        let mut state = self.lock();
        if let Some((rank, code)) = state.aborted {
            return Err(CommError::Aborted { rank, code });
        }
        let size = self.size;
        let round = state.rounds.entry(seq).or_insert_with(|| Round {
            posted: (0..size).map(|_| None).collect(),
            arrived: 0,
            sealed: None,
            unread: size,
        });
        round.posted[rank] = Some(contribution);
        round.arrived += 1;
        if round.arrived == size {
            let all = round.posted.iter_mut().filter_map(Option::take).collect();
            round.sealed = Some(Arc::new(all));
            self.sealed.notify_all();
        }
        Ok(())
    }

    fn complete(&self, seq: u64) -> CommResult<Arc<Vec<Contribution>>> {
        let mut state = self.lock();
        loop {
            if let Some((rank, code)) = state.aborted {
                return Err(CommError::Aborted { rank, code });
            }
            if let Some(round) = state.rounds.get_mut(&seq) {
                if let Some(sealed) = round.sealed.clone() {
                    round.unread -= 1;
                    if round.unread == 0 {
                        state.rounds.remove(&seq);
                    }
                    return Ok(sealed);
                }
            }
            state = self
                .sealed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// A posted, not yet completed collective on this rank.
struct Ticket {
    seq: u64,
    op: Collective,
    root: usize,
}

impl LocalComm<'_> {
    fn check_root(&self, root: usize) -> CommResult<()> {
        if root >= self.shared.size {
            return Err(CommError::InvalidRoot {
                root,
                size: self.shared.size,
            });
        }
        Ok(())
    }

    fn post(&self, op: Collective, root: usize, data: Vec<f32>) -> CommResult<Ticket> {
        let seq = self.seq.get();
        self.seq.set(seq + 1);
        self.shared
            .post(seq, self.rank, Contribution { op, root, data })?;
        Ok(Ticket { seq, op, root })
    }

    /// Wait for the round and check every rank entered the same collective.
    fn complete(&self, ticket: Ticket) -> CommResult<Arc<Vec<Contribution>>> {
        let all = self.shared.complete(ticket.seq)?;
        for c in all.iter() {
            if c.op != ticket.op || c.root != ticket.root {
                return Err(CommError::Mismatch {
                    first: ticket.op,
                    other: c.op,
                });
            }
        }
        Ok(all)
    }

    fn exchange(
        &self,
        op: Collective,
        root: usize,
        data: Vec<f32>,
    ) -> CommResult<Arc<Vec<Contribution>>> {
        let ticket = self.post(op, root, data)?;
        self.complete(ticket)
    }

    fn post_scatter(
        &self,
        root: usize,
        send: Option<&[f32]>,
        recv_len: usize,
    ) -> CommResult<Ticket> {
        self.check_root(root)?;
        let data = if self.rank == root {
            let send = send.ok_or(CommError::MissingBuffer {
                rank: self.rank,
                op: Collective::Scatter,
            })?;
            check_len(send.len(), recv_len * self.shared.size)?;
            send.to_vec()
        } else {
            Vec::new()
        };
        self.post(Collective::Scatter, root, data)
    }

    fn finish_scatter(&self, ticket: Ticket, recv: &mut [f32]) -> CommResult<()> {
        let root = ticket.root;
        let all = self.complete(ticket)?;
        let len = recv.len();
        let src = &all[root].data;
        check_len(src.len(), len * self.shared.size)?;
        recv.copy_from_slice(&src[self.rank * len..(self.rank + 1) * len]);
        Ok(())
    }

    fn finish_all_gather(&self, ticket: Ticket, recv: &mut [f32]) -> CommResult<()> {
        let all = self.complete(ticket)?;
        concat_into(&all, recv)
    }
}

fn check_len(actual: usize, expected: usize) -> CommResult<()> {
    if actual != expected {
        return Err(CommError::BufferLength { expected, actual });
    }
    Ok(())
}

/// Rank-ordered concatenation; every contribution must be the same length.
fn concat_into(all: &[Contribution], recv: &mut [f32]) -> CommResult<()> {
    let chunk = all.first().map_or(0, |c| c.data.len());
    check_len(recv.len(), chunk * all.len())?;
    for (c, out) in all.iter().zip(recv.chunks_mut(chunk.max(1))) {
        check_len(c.data.len(), chunk)?;
        out.copy_from_slice(&c.data);
    }
    Ok(())
}

impl Communicator for LocalComm<'_> {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn barrier(&self) -> CommResult<()> {
        self.exchange(Collective::Barrier, 0, Vec::new()).map(|_| ())
    }

    fn broadcast(&self, root: usize, buf: &mut [f32]) -> CommResult<()> {
        self.check_root(root)?;
        let data = if self.rank == root { buf.to_vec() } else { Vec::new() };
        let all = self.exchange(Collective::Broadcast, root, data)?;
        if self.rank != root {
            let src = &all[root].data;
            check_len(buf.len(), src.len())?;
            buf.copy_from_slice(src);
        }
        Ok(())
    }

    fn scatter(&self, root: usize, send: Option<&[f32]>, recv: &mut [f32]) -> CommResult<()> {
        let ticket = self.post_scatter(root, send, recv.len())?;
        self.finish_scatter(ticket, recv)
    }

    fn gather(&self, root: usize, send: &[f32], recv: Option<&mut [f32]>) -> CommResult<()> {
        self.check_root(root)?;
        if self.rank == root && recv.is_none() {
            return Err(CommError::MissingBuffer {
                rank: self.rank,
                op: Collective::Gather,
            });
        }
        let all = self.exchange(Collective::Gather, root, send.to_vec())?;
        match recv {
            Some(recv) if self.rank == root => concat_into(&all, recv),
            _ => Ok(()),
        }
    }

    fn all_gather(&self, send: &[f32], recv: &mut [f32]) -> CommResult<()> {
        let ticket = self.post(Collective::AllGather, 0, send.to_vec())?;
        self.finish_all_gather(ticket, recv)
    }

    fn all_to_all(&self, send: &[f32], recv: &mut [f32]) -> CommResult<()> {
        let size = self.shared.size;
        check_len(recv.len(), send.len())?;
        if send.len() % size != 0 {
            return Err(CommError::BufferLength {
                expected: send.len().next_multiple_of(size),
                actual: send.len(),
            });
        }
        let chunk = send.len() / size;
        let all = self.exchange(Collective::AllToAll, 0, send.to_vec())?;
        for (p, out) in recv.chunks_mut(chunk.max(1)).enumerate().take(size) {
            let src = &all[p].data;
            check_len(src.len(), chunk * size)?;
            out.copy_from_slice(&src[self.rank * chunk..(self.rank + 1) * chunk]);
        }
        Ok(())
    }

    fn iscatter<'a>(
        &'a self,
        root: usize,
        send: Option<&'a [f32]>,
        recv: &'a mut [f32],
    ) -> CommResult<Request<'a>> {
        let ticket = self.post_scatter(root, send, recv.len())?;
        Ok(Request::new(move || self.finish_scatter(ticket, recv)))
    }

    fn iall_gather<'a>(&'a self, send: &'a [f32], recv: &'a mut [f32]) -> CommResult<Request<'a>> {
        let ticket = self.post(Collective::AllGather, 0, send.to_vec())?;
        Ok(Request::new(move || self.finish_all_gather(ticket, recv)))
    }

    fn abort(&self, code: i32) -> ! {
        warn!(rank = self.rank, code, "aborting group");
        self.shared.poison(self.rank, code);
        debug!(rank = self.rank, "unwinding rank thread");
        panic::resume_unwind(Box::new(AbortSignal))
    }
}
