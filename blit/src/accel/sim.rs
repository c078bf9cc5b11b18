use std::{ptr, slice};

use super::dma2d::{Dma2dPort, Mode, Transfer, TransferState, BYTES_PER_PIXEL};
use crate::pen::blend;

/// A simulated DMA2D engine.
///
/// Transfers are executed on the CPU when they complete, i.e., on the poll
/// after `latency` busy polls. Stalls and faults can be injected into
/// specific transfers (counted from zero in the order they're started) to
/// exercise the recovery paths. A stalled or faulted transfer writes the
/// first half of its first line before stopping.
#[derive(Debug, Clone)]
pub struct SimPort {
    latency: usize,
    stall_at: Option<usize>,
    fault_at: Option<usize>,
    reachable: bool,
    mode: Option<Mode>,
    pending: Option<Pending>,
    configures: usize,
    transfers: usize,
    aborts: usize,
}

#[derive(Debug, Clone)]
struct Pending {
    transfer: Transfer,
    polls: usize,
    fate: Fate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fate {
    Complete,
    Stall,
    Fault,
    /// The transfer doesn't match the programmed mode. Nothing is written.
    Misconfigured,
}

impl Default for SimPort {
    fn default() -> Self {
        Self::new()
    }
}

impl SimPort {
    pub fn new() -> Self {
        Self {
            latency: 0,
            stall_at: None,
            fault_at: None,
            reachable: true,
            mode: None,
            pending: None,
            configures: 0,
            transfers: 0,
            aborts: 0,
        }
    }

    /// Report [`TransferState::Busy`] this many times before completing
    /// each transfer.
    pub fn with_latency(self, latency: usize) -> Self {
        Self { latency, ..self }
    }

    /// Make the `i`-th transfer never complete.
    pub fn stall_at(self, i: usize) -> Self {
        Self {
            stall_at: Some(i),
            ..self
        }
    }

    /// Make the `i`-th transfer stop with [`TransferState::Fault`].
    pub fn fault_at(self, i: usize) -> Self {
        Self {
            fault_at: Some(i),
            ..self
        }
    }

    /// Make every memory region unreachable.
    pub fn unreachable(self) -> Self {
        Self {
            reachable: false,
            ..self
        }
    }

    pub fn set_reachable(&mut self, reachable: bool) {
        self.reachable = reachable;
    }

    /// Get the number of times the registers were programmed.
    pub fn configures(&self) -> usize {
        self.configures
    }

    /// Get the number of transfers started.
    pub fn transfers(&self) -> usize {
        self.transfers
    }

    pub fn aborts(&self) -> usize {
        self.aborts
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }
}

impl Dma2dPort for SimPort {
    fn configure(&mut self, mode: Mode) {
        assert!(self.pending.is_none(), "configured while busy");
        self.mode = Some(mode);
        self.configures += 1;
    }

    unsafe fn start(&mut self, transfer: &Transfer) {
        assert!(self.pending.is_none(), "started while busy");

        let i = self.transfers;
        self.transfers += 1;

        let fate = if self.mode != Some(transfer.mode) {
            Fate::Misconfigured
        } else if self.fault_at == Some(i) {
            Fate::Fault
        } else if self.stall_at == Some(i) {
            Fate::Stall
        } else {
            Fate::Complete
        };

        self.pending = Some(Pending {
            transfer: *transfer,
            polls: 0,
            fate,
        });
    }

    fn poll(&mut self) -> TransferState {
        let pending = match &mut self.pending {
            Some(pending) => pending,
            None => return TransferState::Done,
        };

        if pending.polls == 0 && (pending.fate == Fate::Stall || pending.fate == Fate::Fault) {
            // Safety: The caller of `start` keeps the memory valid until
            // the transfer is over
            unsafe { execute(&pending.transfer, pending.transfer.width / 2) };
        }
        pending.polls += 1;

        match pending.fate {
            Fate::Stall => TransferState::Busy,
            Fate::Fault | Fate::Misconfigured => {
                self.pending = None;
                TransferState::Fault
            }
            Fate::Complete if pending.polls <= self.latency => TransferState::Busy,
            Fate::Complete => {
                let transfer = pending.transfer;
                self.pending = None;
                // Safety: See above
                unsafe { execute(&transfer, transfer.num_pixels()) };
                TransferState::Done
            }
        }
    }

    fn abort(&mut self) {
        self.pending = None;
        self.aborts += 1;
    }

    fn reaches(&self, _addr: usize, _len: usize) -> bool {
        self.reachable
    }
}

/// Process the first `limit` pixels of `t`.
unsafe fn execute(t: &Transfer, limit: usize) {
    let mut left = limit;
    let c = t.color;

    for y in 0..t.height {
        if left == 0 {
            break;
        }
        let n = t.width.min(left);
        left -= n;

        let dst = (t.dst as *mut u8).add(y * (t.width + t.dst_skip) * BYTES_PER_PIXEL);

        match t.mode {
            Mode::Fill => {
                let line = slice::from_raw_parts_mut(dst, n * BYTES_PER_PIXEL);
                for px in line.chunks_exact_mut(BYTES_PER_PIXEL) {
                    px.copy_from_slice(&[c.r, c.g, c.b]);
                }
            }
            Mode::Blend { alpha } => {
                let line = slice::from_raw_parts_mut(dst, n * BYTES_PER_PIXEL);
                for px in line.chunks_exact_mut(BYTES_PER_PIXEL) {
                    px[0] = blend(c.r, px[0], alpha);
                    px[1] = blend(c.g, px[1], alpha);
                    px[2] = blend(c.b, px[2], alpha);
                }
            }
            Mode::Copy => {
                let src =
                    (t.src as *const u8).add(y * (t.width + t.src_skip) * BYTES_PER_PIXEL);
                // Lines may overlap when copying within a surface
                ptr::copy(src, dst, n * BYTES_PER_PIXEL);
            }
        }
    }
}
