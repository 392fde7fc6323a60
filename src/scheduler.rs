// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::BTreeMap;
use std::ops::Range;

use crossbeam_channel::{Receiver, Sender};

use crate::error::{ModelingError, Result};

/// Contiguous block partition of `ns` shots over `np` ranks.
///
/// Every rank nominally owns `k = ceil(ns / np)` shots; rank `r` owns
/// `[r*k, r*k + ntask)` with `ntask = min(k, ns - r*k)`, and trailing ranks
/// may own nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShotPartition {
    ns: usize,
    np: usize,
    k: usize,
}

impl ShotPartition {
    /// Partition `ns` shots across `np` ranks.
    ///
    /// # Errors
    /// Returns an error if `np` is zero.
    pub fn new(ns: usize, np: usize) -> Result<Self> {
        if np == 0 {
            return Err(ModelingError::InvalidParameter {
                name: "np",
                reason: "at least one rank is required".to_string(),
            });
        }
        Ok(ShotPartition {
            ns,
            np,
            k: ns.div_ceil(np),
        })
    }

    /// Total number of shots.
    pub fn num_shots(&self) -> usize {
        self.ns
    }

    /// Number of ranks.
    pub fn num_ranks(&self) -> usize {
        self.np
    }

    /// Nominal block size `ceil(ns / np)`.
    pub fn block_size(&self) -> usize {
        self.k
    }

    /// Global shot indices owned by `rank`.
    pub fn range(&self, rank: usize) -> Range<usize> {
        let begin = (rank * self.k).min(self.ns);
        let ntask = self.k.min(self.ns - begin);
        begin..begin + ntask
    }

    /// The rank that owns shot `is`.
    pub fn owner(&self, is: usize) -> usize {
        is / self.k.max(1)
    }
}

/// A finished shot travelling from a worker rank to the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct ShotMessage {
    /// Global shot index.
    pub index: usize,
    /// Rank that simulated the shot.
    pub source_rank: usize,
    /// Gather in `(receiver, time)` layout.
    pub data: Vec<f32>,
}

/// Channel endpoints of one rank.
///
/// Workers hold only an outbox to rank 0; the coordinator holds only the
/// inbox, so the inbox disconnects once every worker is gone.
#[derive(Debug)]
pub struct Communicator {
    outbox: Option<Sender<ShotMessage>>,
    inbox: Option<Receiver<ShotMessage>>,
}

/// Rank, size and communicator of one participant in a run.
#[derive(Debug)]
pub struct ClusterContext {
    rank: usize,
    size: usize,
    comm: Communicator,
}

impl ClusterContext {
    /// This participant's rank.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of participants.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether this is rank 0, the only rank that writes output.
    pub fn is_coordinator(&self) -> bool {
        self.rank == 0
    }
}

/// Destination of gathered shots, fed in increasing shot order.
pub trait ShotSink {
    /// Append the gather of shot `index`.
    fn write_shot(&mut self, index: usize, data: &[f32]) -> Result<()>;
}

impl ShotSink for Vec<Vec<f32>> {
    fn write_shot(&mut self, _index: usize, data: &[f32]) -> Result<()> {
        self.push(data.to_vec());
        Ok(())
    }
}

/// Runs the shots owned by one rank and delivers them in shot order.
pub struct ShotScheduler {
    ctx: ClusterContext,
    partition: ShotPartition,
}

impl ShotScheduler {
    /// Schedule `ns` shots for the rank described by `ctx`.
    ///
    /// # Errors
    /// Returns an error if the context has no ranks.
    pub fn new(ctx: ClusterContext, ns: usize) -> Result<Self> {
        let partition = ShotPartition::new(ns, ctx.size)?;
        Ok(ShotScheduler { ctx, partition })
    }

    /// The partition in use.
    pub fn partition(&self) -> &ShotPartition {
        &self.partition
    }

    /// This scheduler's context.
    pub fn context(&self) -> &ClusterContext {
        &self.ctx
    }

    /// Simulate this rank's shots and, as rank 0, write every shot of the
    /// run to `sink` in increasing index order.
    ///
    /// Own shots go to the sink as soon as they complete. Shots from other
    /// ranks are buffered until every lower index has been written; after
    /// its own shots the coordinator blocks until all `ns` are written.
    /// Returns the number of shots written.
    ///
    /// # Errors
    /// Propagates simulation and sink errors, and reports a protocol error
    /// for a shot from the wrong rank, an unknown or repeated index, or a
    /// closed channel with shots outstanding.
    pub fn run_coordinator<F>(&self, sink: &mut dyn ShotSink, simulate: F) -> Result<usize>
    where
        F: Fn(usize) -> Result<Vec<f32>>,
    {
        if !self.ctx.is_coordinator() {
            return Err(ModelingError::Protocol(format!(
                "rank {} cannot coordinate",
                self.ctx.rank
            )));
        }
        let ns = self.partition.num_shots();
        let mut gather = OrderedGather::new(ns);
        log::debug!(
            "coordinator owns shots {:?} of {} (block size {})",
            self.partition.range(0),
            ns,
            self.partition.block_size()
        );

        for is in self.partition.range(0) {
            let data = simulate(is)?;
            gather.accept(is, data, sink)?;
            self.drain_ready(&mut gather, sink)?;
        }

        while !gather.is_complete() {
            let inbox = self.ctx.comm.inbox.as_ref().ok_or_else(|| {
                ModelingError::Protocol("coordinator has no inbox".to_string())
            })?;
            let msg = inbox.recv().map_err(|_| {
                ModelingError::Protocol(format!(
                    "all workers disconnected with shot {} of {} outstanding",
                    gather.next(),
                    ns
                ))
            })?;
            self.check_sender(&msg)?;
            gather.accept(msg.index, msg.data, sink)?;
        }
        Ok(gather.next())
    }

    /// Simulate this rank's shots and send each to rank 0 without waiting.
    /// Returns the number of shots sent.
    ///
    /// # Errors
    /// Propagates simulation errors; reports a protocol error if rank 0 is
    /// gone.
    pub fn run_worker<F>(&self, simulate: F) -> Result<usize>
    where
        F: Fn(usize) -> Result<Vec<f32>>,
    {
        let outbox = self.ctx.comm.outbox.as_ref().ok_or_else(|| {
            ModelingError::Protocol(format!("rank {} has no outbox", self.ctx.rank))
        })?;
        let range = self.partition.range(self.ctx.rank);
        log::debug!("rank {} owns shots {:?}", self.ctx.rank, range);
        let mut sent = 0;
        for is in range {
            let data = simulate(is)?;
            outbox
                .send(ShotMessage {
                    index: is,
                    source_rank: self.ctx.rank,
                    data,
                })
                .map_err(|_| {
                    ModelingError::Protocol(format!(
                        "rank {} could not deliver shot {}: coordinator gone",
                        self.ctx.rank, is
                    ))
                })?;
            sent += 1;
        }
        Ok(sent)
    }

    fn drain_ready(&self, gather: &mut OrderedGather, sink: &mut dyn ShotSink) -> Result<()> {
        if let Some(inbox) = self.ctx.comm.inbox.as_ref() {
            while let Ok(msg) = inbox.try_recv() {
                self.check_sender(&msg)?;
                gather.accept(msg.index, msg.data, sink)?;
            }
        }
        Ok(())
    }

    fn check_sender(&self, msg: &ShotMessage) -> Result<()> {
        if msg.index >= self.partition.num_shots() {
            return Err(ModelingError::Protocol(format!(
                "rank {} sent unknown shot {}",
                msg.source_rank, msg.index
            )));
        }
        let owner = self.partition.owner(msg.index);
        if owner != msg.source_rank {
            return Err(ModelingError::Protocol(format!(
                "shot {} came from rank {} but belongs to rank {}",
                msg.index, msg.source_rank, owner
            )));
        }
        Ok(())
    }
}

/// Reorders shots arriving in any order into strictly increasing index order.
struct OrderedGather {
    ns: usize,
    next: usize,
    pending: BTreeMap<usize, Vec<f32>>,
}

impl OrderedGather {
    fn new(ns: usize) -> Self {
        OrderedGather {
            ns,
            next: 0,
            pending: BTreeMap::new(),
        }
    }

    fn next(&self) -> usize {
        self.next
    }

    fn is_complete(&self) -> bool {
        self.next == self.ns
    }

    fn accept(&mut self, index: usize, data: Vec<f32>, sink: &mut dyn ShotSink) -> Result<()> {
        if index < self.next || self.pending.contains_key(&index) {
            return Err(ModelingError::Protocol(format!(
                "shot {} delivered twice",
                index
            )));
        }
        self.pending.insert(index, data);
        while let Some(data) = self.pending.remove(&self.next) {
            sink.write_shot(self.next, &data)?;
            self.next += 1;
        }
        if !self.pending.is_empty() {
            log::debug!(
                "{} shot(s) buffered waiting for shot {}",
                self.pending.len(),
                self.next
            );
        }
        Ok(())
    }
}

/// In-process stand-in for a cluster: `np` ranks on scoped threads,
/// connected by an unbounded channel to rank 0.
pub struct LocalCluster {
    contexts: Vec<ClusterContext>,
}

impl LocalCluster {
    /// Create the contexts of `np` ranks.
    ///
    /// # Errors
    /// Returns an error if `np` is zero.
    pub fn new(np: usize) -> Result<Self> {
        if np == 0 {
            return Err(ModelingError::InvalidParameter {
                name: "np",
                reason: "at least one rank is required".to_string(),
            });
        }
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut contexts = Vec::with_capacity(np);
        contexts.push(ClusterContext {
            rank: 0,
            size: np,
            comm: Communicator {
                outbox: None,
                inbox: Some(rx),
            },
        });
        for rank in 1..np {
            contexts.push(ClusterContext {
                rank,
                size: np,
                comm: Communicator {
                    outbox: Some(tx.clone()),
                    inbox: None,
                },
            });
        }
        Ok(LocalCluster { contexts })
    }

    /// Split into per-rank contexts.
    pub fn into_contexts(self) -> Vec<ClusterContext> {
        self.contexts
    }

    /// Run `ns` shots on every rank and write them to `sink` in order.
    /// Returns the number of shots written.
    ///
    /// # Errors
    /// Returns the first failing rank's error, preferring worker errors over
    /// the coordinator's resulting protocol error.
    pub fn run<F>(self, ns: usize, sink: &mut dyn ShotSink, simulate: F) -> Result<usize>
    where
        F: Fn(usize) -> Result<Vec<f32>> + Sync,
    {
        let mut schedulers = self
            .contexts
            .into_iter()
            .map(|ctx| ShotScheduler::new(ctx, ns))
            .collect::<Result<Vec<_>>>()?;
        let workers = schedulers.split_off(1);
        let coordinator = schedulers.remove(0);
        let simulate = &simulate;

        std::thread::scope(|s| {
            let handles: Vec<_> = workers
                .into_iter()
                .map(|scheduler| {
                    s.spawn(move || {
                        let result = scheduler.run_worker(simulate);
                        // Dropping the scheduler releases this rank's outbox.
                        drop(scheduler);
                        result
                    })
                })
                .collect();

            let written = coordinator.run_coordinator(sink, simulate);
            drop(coordinator);

            let mut worker_error = None;
            for handle in handles {
                let result = handle.join().unwrap_or_else(|_| {
                    Err(ModelingError::Protocol("worker rank panicked".to_string()))
                });
                if let Err(e) = result {
                    worker_error.get_or_insert(e);
                }
            }
            // A coordinator protocol error is usually the echo of a failed
            // worker, so the worker's error is the cause worth reporting.
            match (written, worker_error) {
                (Err(ModelingError::Protocol(_)), Some(e)) => Err(e),
                (Err(e), _) => Err(e),
                (Ok(_), Some(e)) => Err(e),
                (Ok(written), None) => Ok(written),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fake_shot(is: usize) -> Vec<f32> {
        vec![is as f32; 4]
    }

    #[test]
    fn partition_matches_block_rule() {
        let p = ShotPartition::new(5, 2).unwrap();
        assert_eq!(p.block_size(), 3);
        assert_eq!(p.range(0), 0..3);
        assert_eq!(p.range(1), 3..5);
        assert_eq!(p.owner(4), 1);
    }

    #[test]
    fn trailing_ranks_may_own_nothing() {
        // k = ceil(5/4) = 2: ranks own 2, 2, 1, 0 shots.
        let p = ShotPartition::new(5, 4).unwrap();
        assert_eq!(p.range(2), 4..5);
        assert!(p.range(3).is_empty());
        let p = ShotPartition::new(2, 5).unwrap();
        assert!(p.range(4).is_empty());
    }

    #[test]
    fn zero_ranks_rejected() {
        assert!(ShotPartition::new(3, 0).is_err());
        assert!(LocalCluster::new(0).is_err());
    }

    #[test]
    fn single_rank_writes_in_order() {
        let cluster = LocalCluster::new(1).unwrap();
        let mut out: Vec<Vec<f32>> = Vec::new();
        let written = cluster.run(4, &mut out, |is| Ok(fake_shot(is))).unwrap();
        assert_eq!(written, 4);
        assert_eq!(out, (0..4).map(fake_shot).collect::<Vec<_>>());
    }

    #[test]
    fn coordinator_orders_out_of_order_arrivals() {
        let contexts = LocalCluster::new(2).unwrap().into_contexts();
        let mut contexts = contexts.into_iter();
        let coord = ShotScheduler::new(contexts.next().unwrap(), 5).unwrap();
        let worker_ctx = contexts.next().unwrap();

        // The worker's shots arrive before the coordinator starts, newest
        // first.
        let outbox = worker_ctx.comm.outbox.clone().unwrap();
        for is in [4, 3] {
            outbox
                .send(ShotMessage {
                    index: is,
                    source_rank: 1,
                    data: fake_shot(is),
                })
                .unwrap();
        }
        drop(outbox);
        drop(worker_ctx);

        let mut out: Vec<Vec<f32>> = Vec::new();
        let written = coord
            .run_coordinator(&mut out, |is| Ok(fake_shot(is)))
            .unwrap();
        assert_eq!(written, 5);
        assert_eq!(out, (0..5).map(fake_shot).collect::<Vec<_>>());
    }

    #[test]
    fn gather_order_independent_of_completion_order() {
        // The coordinator's shots are slow, so rank 1 finishes first.
        let cluster = LocalCluster::new(2).unwrap();
        let mut out: Vec<Vec<f32>> = Vec::new();
        let written = cluster
            .run(5, &mut out, |is| {
                if is < 3 {
                    std::thread::sleep(Duration::from_millis(20));
                }
                Ok(fake_shot(is))
            })
            .unwrap();
        assert_eq!(written, 5);
        assert_eq!(out, (0..5).map(fake_shot).collect::<Vec<_>>());
    }

    #[test]
    fn wrong_rank_is_a_protocol_error() {
        let mut contexts = LocalCluster::new(2).unwrap().into_contexts().into_iter();
        let coord = ShotScheduler::new(contexts.next().unwrap(), 4).unwrap();
        let worker_ctx = contexts.next().unwrap();
        worker_ctx
            .comm
            .outbox
            .as_ref()
            .unwrap()
            .send(ShotMessage {
                index: 1,
                source_rank: 1,
                data: fake_shot(1),
            })
            .unwrap();
        let mut out: Vec<Vec<f32>> = Vec::new();
        let result = coord.run_coordinator(&mut out, |is| Ok(fake_shot(is)));
        assert!(matches!(result, Err(ModelingError::Protocol(_))));
    }

    #[test]
    fn lost_worker_does_not_hang() {
        let mut contexts = LocalCluster::new(2).unwrap().into_contexts().into_iter();
        let coord = ShotScheduler::new(contexts.next().unwrap(), 4).unwrap();
        drop(contexts);
        let mut out: Vec<Vec<f32>> = Vec::new();
        let result = coord.run_coordinator(&mut out, |is| Ok(fake_shot(is)));
        assert!(matches!(result, Err(ModelingError::Protocol(_))));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn worker_failure_is_reported() {
        let cluster = LocalCluster::new(3).unwrap();
        let mut out: Vec<Vec<f32>> = Vec::new();
        let result = cluster.run(6, &mut out, |is| {
            if is == 3 {
                Err(ModelingError::Other("boom".to_string()))
            } else {
                Ok(fake_shot(is))
            }
        });
        match result {
            Err(ModelingError::Other(msg)) => assert_eq!(msg, "boom"),
            other => panic!("expected worker error, got {:?}", other),
        }
        // Everything before the failed shot still went out in order.
        assert_eq!(out, (0..3).map(fake_shot).collect::<Vec<_>>());
    }

    #[test]
    fn coordinator_failure_wins_over_orphaned_worker() {
        let cluster = LocalCluster::new(2).unwrap();
        let mut out: Vec<Vec<f32>> = Vec::new();
        let result = cluster.run(4, &mut out, |is| {
            if is == 0 {
                return Err(ModelingError::Other("boom".to_string()));
            }
            std::thread::sleep(Duration::from_millis(100));
            Ok(fake_shot(is))
        });
        match result {
            Err(ModelingError::Other(msg)) => assert_eq!(msg, "boom"),
            other => panic!("expected coordinator error, got {:?}", other),
        }
        assert!(out.is_empty());
    }

    #[test]
    fn worker_cannot_coordinate() {
        let mut contexts = LocalCluster::new(2).unwrap().into_contexts().into_iter();
        let _coord_ctx = contexts.next().unwrap();
        let worker = ShotScheduler::new(contexts.next().unwrap(), 2).unwrap();
        let mut out: Vec<Vec<f32>> = Vec::new();
        assert!(worker
            .run_coordinator(&mut out, |is| Ok(fake_shot(is)))
            .is_err());
    }
}
