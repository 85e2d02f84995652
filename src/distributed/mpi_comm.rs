//! [`Communicator`] over a real MPI communicator (`mpi` feature).
//!
//! Ranks are separate processes started by `mpirun`; every collective
//! maps onto the matching MPI call. MPI's default error handler is fatal,
//! so the only errors reported here are the argument checks run before
//! entering a collective.
//!
//! The non-blocking collectives complete before they return. rsmpi ties
//! an immediate collective to a lexical scope that a [`Request`] can't
//! carry out of the call, so the returned request is already done.

use mpi::topology::SimpleCommunicator;
use mpi::traits::{Communicator as MpiCommunicator, CommunicatorCollectives, Root};
use tracing::warn;

use crate::distributed::{Collective, CommError, CommResult, Communicator, Request};

fn check_len(actual: usize, expected: usize) -> CommResult<()> {
    if actual != expected {
        return Err(CommError::BufferLength { expected, actual });
    }
    Ok(())
}

/// Argument checks shared by the rooted collectives.
fn check_root(comm: &SimpleCommunicator, root: usize) -> CommResult<i32> {
    let size = Communicator::size(comm);
    if root >= size {
        return Err(CommError::InvalidRoot { root, size });
    }
    i32::try_from(root).map_err(|_| CommError::InvalidRoot { root, size })
}

fn root_buffer<T>(rank: usize, op: Collective, buf: Option<T>) -> CommResult<T> {
    buf.ok_or(CommError::MissingBuffer { rank, op })
}

impl Communicator for SimpleCommunicator {
    fn rank(&self) -> usize {
        MpiCommunicator::rank(self) as usize
    }

    fn size(&self) -> usize {
        MpiCommunicator::size(self) as usize
    }

    fn barrier(&self) -> CommResult<()> {
        CommunicatorCollectives::barrier(self);
        Ok(())
    }

    fn broadcast(&self, root: usize, buf: &mut [f32]) -> CommResult<()> {
        let root = check_root(self, root)?;
        self.process_at_rank(root).broadcast_into(buf);
        Ok(())
    }

    fn scatter(&self, root: usize, send: Option<&[f32]>, recv: &mut [f32]) -> CommResult<()> {
        let root_rank = check_root(self, root)?;
        let process = self.process_at_rank(root_rank);
        if Communicator::rank(self) == root {
            let send = root_buffer(root, Collective::Scatter, send)?;
            check_len(send.len(), recv.len() * Communicator::size(self))?;
            process.scatter_into_root(send, recv);
        } else {
            process.scatter_into(recv);
        }
        Ok(())
    }

    fn gather(&self, root: usize, send: &[f32], recv: Option<&mut [f32]>) -> CommResult<()> {
        let root_rank = check_root(self, root)?;
        let process = self.process_at_rank(root_rank);
        if Communicator::rank(self) == root {
            let recv = root_buffer(root, Collective::Gather, recv)?;
            check_len(recv.len(), send.len() * Communicator::size(self))?;
            process.gather_into_root(send, recv);
        } else {
            process.gather_into(send);
        }
        Ok(())
    }

    fn all_gather(&self, send: &[f32], recv: &mut [f32]) -> CommResult<()> {
        check_len(recv.len(), send.len() * Communicator::size(self))?;
        self.all_gather_into(send, recv);
        Ok(())
    }

    fn all_to_all(&self, send: &[f32], recv: &mut [f32]) -> CommResult<()> {
        check_len(recv.len(), send.len())?;
        check_len(send.len() % Communicator::size(self), 0)?;
        self.all_to_all_into(send, recv);
        Ok(())
    }

    fn iscatter<'a>(
        &'a self,
        root: usize,
        send: Option<&'a [f32]>,
        recv: &'a mut [f32],
    ) -> CommResult<Request<'a>> {
        self.scatter(root, send, recv)?;
        Ok(Request::new(|| Ok(())))
    }

    fn iall_gather<'a>(&'a self, send: &'a [f32], recv: &'a mut [f32]) -> CommResult<Request<'a>> {
        self.all_gather(send, recv)?;
        Ok(Request::new(|| Ok(())))
    }

    fn abort(&self, code: i32) -> ! {
        warn!(rank = Communicator::rank(self), code, "aborting MPI job");
        MpiCommunicator::abort(self, code)
    }
}
