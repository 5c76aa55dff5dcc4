use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;

use super::cancel::CancellationToken;
use super::error::{chunk_failed, panic_message, PipelineResult};
use super::workers::WorkerPool;
use crate::chunk::{ChunkKey, ChunkPhase};
use crate::config::PoolConfig;
use crate::error::TerrainError;
use crate::field::FieldSnapshot;
use crate::mesh::{MeshBuffer, MeshCapacity, ShapeBuilder, SurfaceExtractor};
use crate::pool::ObjectPool;
use crate::sample::{SampleBlock, SampleLayout};

/// Identifies one scheduled computation; a newer ticket supersedes older ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(pub(crate) u64);

impl Ticket {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// How a block gets its samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    /// Evaluate the field at every sample
    Direct,
    /// Evaluate the eight chunk corners and interpolate
    Interpolated,
}

/// Everything a worker needs to compute one chunk's shape
#[derive(Debug, Clone)]
pub struct ChunkRequest {
    pub key: ChunkKey,
    pub layout: SampleLayout,
    pub field: FieldSnapshot,
    pub fill: FillMode,
    pub extractor: SurfaceExtractor,
}

/// Result of one unit of work
#[derive(Debug)]
pub enum WorkOutcome {
    /// Finished; `None` means the chunk has no surface
    Done(Option<MeshBuffer>),
    Cancelled,
    Failed(TerrainError),
}

/// A finished unit as seen by the main thread
#[derive(Debug)]
pub struct Completion {
    pub key: ChunkKey,
    pub ticket: Ticket,
    /// Field version the unit was computed against
    pub version: u64,
    pub outcome: WorkOutcome,
}

/// Counters kept on the main thread
///
/// Every scheduled unit ends in exactly one of `completed`, `cancelled` or
/// `failed`; once nothing is in flight their sum equals `scheduled`.
/// `discarded` is not an outcome: it counts the results of already cancelled
/// units that still reached `poll`, so it never exceeds `cancelled`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub scheduled: u64,
    pub completed: u64,
    /// Units cancelled explicitly or superseded by a newer schedule
    pub cancelled: u64,
    pub failed: u64,
    /// Results recycled by `poll` because their unit had been cancelled
    pub discarded: u64,
}

impl PipelineStats {
    /// Units that reached a final outcome
    pub fn finished(&self) -> u64 {
        self.completed + self.cancelled + self.failed
    }
}

/// Pools shared between the main thread and the workers
#[derive(Debug)]
pub struct PipelinePools {
    pub blocks: ObjectPool<SampleBlock>,
    pub builders: ObjectPool<ShapeBuilder>,
    pub meshes: ObjectPool<MeshBuffer>,
}

impl PipelinePools {
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            blocks: ObjectPool::new("sample block", config.max_sample_blocks),
            builders: ObjectPool::new("shape builder", config.max_shape_builders),
            meshes: ObjectPool::new("mesh buffer", config.max_mesh_buffers),
        }
    }
}

/// Count of units running on workers, with a wakeup when it reaches zero
#[derive(Debug, Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn begin(&self) {
        *self.count.lock() += 1;
    }

    fn finish(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    fn wait(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.idle.wait(&mut count);
        }
    }

    fn current(&self) -> usize {
        *self.count.lock()
    }
}

/// Marks a unit finished even if the worker unwinds
struct FinishGuard<'a>(&'a InFlight);

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.0.finish();
    }
}

struct Shared {
    pools: PipelinePools,
    in_flight: InFlight,
}

struct Unit {
    ticket: Ticket,
    token: CancellationToken,
    running: Arc<AtomicBool>,
}

/// Runs chunk shape computations on background workers.
///
/// Each key has at most one current unit. Scheduling again cancels the previous one,
/// and results are only handed out by `poll` when their ticket is still current;
/// everything else is discarded and its pooled buffers returned.
pub struct AsyncChunkPipeline {
    workers: WorkerPool,
    shared: Arc<Shared>,
    units: FxHashMap<ChunkKey, Unit>,
    next_ticket: u64,
    sender: Sender<Completion>,
    receiver: Receiver<Completion>,
    stats: PipelineStats,
}

impl AsyncChunkPipeline {
    pub fn new(worker_threads: Option<usize>, pools: &PoolConfig) -> PipelineResult<Self> {
        let (sender, receiver) = unbounded();
        Ok(Self {
            workers: WorkerPool::new(worker_threads)?,
            shared: Arc::new(Shared {
                pools: PipelinePools::new(pools),
                in_flight: InFlight::default(),
            }),
            units: FxHashMap::default(),
            next_ticket: 1,
            sender,
            receiver,
            stats: PipelineStats::default(),
        })
    }

    /// Queue a computation for `request.key`, superseding any unit already in flight
    pub fn schedule(&mut self, request: ChunkRequest) -> Ticket {
        let key = request.key;
        if self.cancel(key) {
            log::trace!("Rescheduling {} supersedes its running unit", key);
        }

        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        let token = CancellationToken::new();
        let running = Arc::new(AtomicBool::new(false));
        self.units.insert(
            key,
            Unit {
                ticket,
                token: token.clone(),
                running: Arc::clone(&running),
            },
        );
        self.stats.scheduled += 1;

        let shared = Arc::clone(&self.shared);
        let sender = self.sender.clone();
        shared.in_flight.begin();
        self.workers.spawn(move || {
            let _finish = FinishGuard(&shared.in_flight);
            running.store(true, Ordering::Release);

            let version = request.field.version;
            let outcome = if token.is_cancelled() {
                WorkOutcome::Cancelled
            } else {
                match catch_unwind(AssertUnwindSafe(|| run_unit(&shared.pools, &request, &token))) {
                    Ok(outcome) => outcome,
                    Err(payload) => WorkOutcome::Failed(chunk_failed(
                        "worker",
                        panic_message(payload.as_ref()),
                    )),
                }
            };

            // The receiver only goes away with the pipeline, which drains workers first
            let _ = sender.send(Completion {
                key,
                ticket,
                version,
                outcome,
            });
        });

        ticket
    }

    /// Drain finished work without blocking; only current results are returned
    pub fn poll(&mut self) -> Vec<Completion> {
        let mut ready = Vec::new();
        while let Ok(completion) = self.receiver.try_recv() {
            let current = self
                .units
                .get(&completion.key)
                .is_some_and(|unit| unit.ticket == completion.ticket);

            if !current {
                self.stats.discarded += 1;
                self.recycle(completion.outcome);
                continue;
            }

            self.units.remove(&completion.key);
            match &completion.outcome {
                WorkOutcome::Done(_) => self.stats.completed += 1,
                WorkOutcome::Cancelled => self.stats.cancelled += 1,
                WorkOutcome::Failed(err) => {
                    self.stats.failed += 1;
                    log::warn!("Chunk {} failed: {}", completion.key, err);
                }
            }
            ready.push(completion);
        }
        ready
    }

    /// Cancel the unit for `key`, if any; its result will be discarded
    pub fn cancel(&mut self, key: ChunkKey) -> bool {
        match self.units.remove(&key) {
            Some(unit) => {
                unit.token.cancel();
                self.stats.cancelled += 1;
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        let count = self.units.len();
        for (_, unit) in self.units.drain() {
            unit.token.cancel();
        }
        self.stats.cancelled += count as u64;
        if count > 0 {
            log::debug!("Cancelled {} chunk units", count);
        }
    }

    /// Block until no unit is running on a worker.
    ///
    /// Only used for reconfiguration and teardown; results of cancelled units stay
    /// queued and are discarded by the next `poll`.
    pub fn wait_idle(&self) {
        self.shared.in_flight.wait();
    }

    /// Cancel everything, wait for the workers and drop pooled blocks of other extents
    pub fn set_sample_extent(&mut self, extent: usize) {
        self.cancel_all();
        self.wait_idle();
        let disposed = self.shared.pools.blocks.retain_keys(|k| *k == extent);
        log::debug!(
            "Sample extent now {}; disposed {} pooled blocks",
            extent,
            disposed
        );
    }

    pub fn phase(&self, key: ChunkKey) -> ChunkPhase {
        match self.units.get(&key) {
            Some(unit) if unit.running.load(Ordering::Acquire) => ChunkPhase::Running,
            Some(_) => ChunkPhase::Scheduled,
            None => ChunkPhase::Idle,
        }
    }

    pub fn current_ticket(&self, key: ChunkKey) -> Option<Ticket> {
        self.units.get(&key).map(|unit| unit.ticket)
    }

    /// Units still running on workers, including cancelled ones that have not stopped
    pub fn in_flight_count(&self) -> usize {
        self.shared.in_flight.current()
    }

    /// Units whose results are still wanted
    pub fn pending_count(&self) -> usize {
        self.units.len()
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn pools(&self) -> &PipelinePools {
        &self.shared.pools
    }

    pub fn worker_threads(&self) -> usize {
        self.workers.threads()
    }

    pub fn obtain_mesh(&self, capacity: MeshCapacity) -> MeshBuffer {
        self.shared.pools.meshes.obtain(capacity, MeshBuffer::new)
    }

    pub fn release_mesh(&self, mesh: MeshBuffer) {
        self.shared.pools.meshes.release(mesh);
    }

    fn recycle(&self, outcome: WorkOutcome) {
        if let WorkOutcome::Done(Some(mesh)) = outcome {
            self.release_mesh(mesh);
        }
    }
}

impl Drop for AsyncChunkPipeline {
    fn drop(&mut self) {
        self.cancel_all();
        self.shared.in_flight.wait();
        while let Ok(completion) = self.receiver.try_recv() {
            self.recycle(completion.outcome);
        }
    }
}

impl std::fmt::Debug for AsyncChunkPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncChunkPipeline")
            .field("workers", &self.workers)
            .field("pending", &self.units.len())
            .field("stats", &self.stats)
            .finish()
    }
}

/// Fill, extract and materialize one chunk.
///
/// Pooled scratch objects are held through guards so they return to their pools on
/// every exit, a panic included.
fn run_unit(
    pools: &PipelinePools,
    request: &ChunkRequest,
    token: &CancellationToken,
) -> WorkOutcome {
    let layout = request.layout;
    let field = request.field.field.as_ref();

    let mut block = pools
        .blocks
        .obtain_guarded(layout.corners_per_axis(), SampleBlock::new);
    if let Err(err) = block.set_layout(layout) {
        return WorkOutcome::Failed(err);
    }

    let filled = match request.fill {
        FillMode::Direct => block.fill_direct(field, token),
        FillMode::Interpolated => {
            let corners = SampleBlock::corner_values(field, &layout);
            block.fill_interpolated(&corners, token)
        }
    };
    if filled.is_err() {
        return WorkOutcome::Cancelled;
    }
    if !block.has_surface() {
        return WorkOutcome::Done(None);
    }

    // Interpolated blocks take their normals from the samples, like their positions
    let normals_from = match request.fill {
        FillMode::Direct => Some(field),
        FillMode::Interpolated => None,
    };
    let mut builder = pools.builders.obtain_guarded((), |_| ShapeBuilder::new());
    let extracted = request
        .extractor
        .extract(&block, normals_from, &mut builder, token);
    drop(block);

    match extracted {
        Err(_) => WorkOutcome::Cancelled,
        Ok(()) if builder.is_empty() => WorkOutcome::Done(None),
        Ok(()) => match builder.materialize(&pools.meshes) {
            Ok(mesh) => WorkOutcome::Done(Some(mesh)),
            Err(err) => WorkOutcome::Failed(err),
        },
    }
}
