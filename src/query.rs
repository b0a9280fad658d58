//! Batched point queries against a published snapshot.
//!
//! The displacement buffers store where the surface point at rest position
//! `p` moves to. Callers want the surface above a world position, so
//! displacement queries invert the map with a few fixed-point iterations.
//!
//! Work runs on the rayon pool; a [`QueryTicket`] resolves once the batch
//! is done. The owning system completes every outstanding ticket at the
//! start of the next tick, so results never lag by more than one tick.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::task::{Context, Poll, Waker};

use glam::{Vec2, Vec3};
use log::debug;
use rayon::prelude::*;

use crate::cascade::texture::EdgePolicy;
use crate::cascade::CascadeStack;
use crate::error::{OceanError, Result};
use crate::ocean::snapshot::FrameSnapshot;
use crate::params::QuerySettings;
use crate::sim::field::{default_floor_altitude, signed_depth};

/// What a batch asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Displacement,
    Flow,
    Depth,
}

/// One point of a batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryRequest {
    /// World XZ position (meters)
    pub position: Vec2,
    /// Smallest wave detail the caller cares about (meters)
    pub min_grid_size: f32,
}

impl QueryRequest {
    pub fn new(position: Vec2, min_grid_size: f32) -> Self {
        Self {
            position,
            min_grid_size,
        }
    }
}

/// Surface state above a query position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSample {
    /// Displacement of the surface point that lands on the query position
    pub displacement: Vec3,
    /// World-space altitude of the surface (meters)
    pub height_m: f32,
    pub normal: Vec3,
    /// Horizontal miss of the inverted point (meters)
    pub residual_m: f32,
    pub converged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QueryResult {
    Displacement(SurfaceSample),
    /// Horizontal current (m/s)
    Flow(Vec2),
    /// Signed water depth (meters), negative above water
    Depth(f32),
    /// Outside every cascade, or the data is not simulated
    Unavailable,
}

/// Slice a request reads from.
///
/// The coarsest slice that still resolves `min_grid_size`, moving coarser
/// until the point is covered. The transition slice is never used since
/// its content is blending toward the next scale.
pub fn select_slice(stack: &CascadeStack, position: Vec2, min_grid_size: f32) -> Option<usize> {
    let count = stack.slice_count();
    let usable = if count > 1 { count - 1 } else { count };
    let start = (0..usable)
        .rev()
        .find(|slice| stack.cascade(*slice).min_wavelength() <= min_grid_size)
        .unwrap_or(0);
    (start..usable).find(|slice| stack.cascade(*slice).contains(position))
}

/// Result of inverting a displacement map at one target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inversion {
    /// Rest position whose displaced image lands on the target
    pub rest_position: Vec2,
    pub displacement: Vec3,
    pub residual_m: f32,
    pub iterations: u32,
}

/// Fixed-point inversion `p -= (S(p).xz + p) - target`.
///
/// The step halves whenever the miss grows, which damps the oscillation
/// steep waves cause. Returns the best point visited.
pub fn invert_displacement<F>(sample: F, target: Vec2, max_iterations: u32) -> Inversion
where
    F: Fn(Vec2) -> Vec3,
{
    let miss = |p: Vec2, d: Vec3| p + Vec2::new(d.x, d.z) - target;

    let mut p = target;
    let mut d = sample(p);
    let mut error = miss(p, d);
    let mut best = Inversion {
        rest_position: p,
        displacement: d,
        residual_m: error.length(),
        iterations: 0,
    };
    let mut step = 1.0;
    let mut last_residual = best.residual_m;

    for iteration in 1..=max_iterations {
        p -= error * step;
        d = sample(p);
        error = miss(p, d);
        let residual = error.length();
        if !residual.is_finite() {
            break;
        }
        if residual > last_residual {
            step *= 0.5;
        }
        last_residual = residual;
        if residual < best.residual_m {
            best = Inversion {
                rest_position: p,
                displacement: d,
                residual_m: residual,
                iterations: iteration,
            };
        }
    }
    best
}

/// Answer one request synchronously
pub fn run_query(snapshot: &FrameSnapshot, kind: QueryKind, request: &QueryRequest, settings: &QuerySettings) -> QueryResult {
    let stack = &snapshot.stack;
    let Some(slice) = select_slice(stack, request.position, request.min_grid_size) else {
        return QueryResult::Unavailable;
    };
    let level = |p: Vec2| {
        snapshot
            .level()
            .map(|l| l.sample_world(slice, p, EdgePolicy::Clamp))
            .unwrap_or(0.0)
    };

    match kind {
        QueryKind::Displacement => {
            let Some(displacement) = snapshot.displacement() else {
                return QueryResult::Unavailable;
            };
            let sample = |p: Vec2| displacement.sample_world(slice, p, EdgePolicy::Clamp);
            let surface = |target: Vec2| {
                let inv = invert_displacement(sample, target, settings.max_iterations);
                (inv, snapshot.sea_level_m + level(inv.rest_position) + inv.displacement.y)
            };

            let (centre, height) = surface(request.position);
            let delta = stack.cascade(slice).texel_size;
            let (_, height_x) = surface(request.position + Vec2::new(delta, 0.0));
            let (_, height_z) = surface(request.position + Vec2::new(0.0, delta));
            let along_x = Vec3::new(delta, height_x - height, 0.0);
            let along_z = Vec3::new(0.0, height_z - height, delta);
            let normal = along_z.cross(along_x).try_normalize().unwrap_or(Vec3::Y);

            QueryResult::Displacement(SurfaceSample {
                displacement: centre.displacement,
                height_m: height,
                normal,
                residual_m: centre.residual_m,
                converged: centre.residual_m <= settings.tolerance_m,
            })
        }
        QueryKind::Flow => match snapshot.flow() {
            Some(flow) => QueryResult::Flow(flow.sample_world(slice, request.position, EdgePolicy::Clamp)),
            None => QueryResult::Unavailable,
        },
        QueryKind::Depth => {
            let floor = snapshot
                .floor()
                .map(|f| f.sample_world(slice, request.position, EdgePolicy::Clamp))
                .unwrap_or_else(|| default_floor_altitude(snapshot.sea_level_m));
            QueryResult::Depth(signed_depth(snapshot.sea_level_m, level(request.position), floor))
        }
    }
}

#[derive(Default)]
struct Slot {
    results: Option<Result<Vec<QueryResult>>>,
    waker: Option<Waker>,
    finished: bool,
    cancelled: bool,
}

#[derive(Default)]
struct Shared {
    slot: Mutex<Slot>,
    done: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        // A panicked worker leaves the slot usable; the results are just absent
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn finish(&self, results: Option<Result<Vec<QueryResult>>>) {
        let waker = {
            let mut slot = self.lock();
            slot.results = results;
            slot.finished = true;
            slot.waker.take()
        };
        self.done.notify_all();
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    fn wait_finished(&self) {
        let mut slot = self.lock();
        while !slot.finished {
            slot = self
                .done
                .wait(slot)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    fn is_finished(&self) -> bool {
        self.lock().finished
    }
}

/// Pending results of one batch. Dropping the ticket cancels delivery.
pub struct QueryTicket {
    kind: QueryKind,
    len: usize,
    shared: Arc<Shared>,
}

impl QueryTicket {
    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    /// Number of requests in the batch
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_ready(&self) -> bool {
        self.shared.is_finished()
    }

    /// Results if the batch finished, without blocking
    pub fn try_results(&mut self) -> Option<Result<Vec<QueryResult>>> {
        let mut slot = self.shared.lock();
        if !slot.finished {
            return None;
        }
        Some(slot.results.take().unwrap_or(Err(OceanError::QueryCancelled)))
    }

    /// Block until the batch finishes
    pub fn wait(self) -> Result<Vec<QueryResult>> {
        pollster::block_on(self)
    }
}

impl Future for QueryTicket {
    type Output = Result<Vec<QueryResult>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.shared.lock();
        if slot.finished {
            return Poll::Ready(slot.results.take().unwrap_or(Err(OceanError::QueryCancelled)));
        }
        slot.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl Drop for QueryTicket {
    fn drop(&mut self) {
        self.shared.lock().cancelled = true;
    }
}

/// Dispatches batches and tracks the ones still running
#[derive(Default)]
pub struct QueryEngine {
    settings: QuerySettings,
    in_flight: Vec<Arc<Shared>>,
    forced_waits: u64,
}

impl QueryEngine {
    pub fn new(settings: QuerySettings) -> Self {
        Self {
            settings,
            in_flight: Vec::new(),
            forced_waits: 0,
        }
    }

    pub fn settings(&self) -> &QuerySettings {
        &self.settings
    }

    /// Queue a batch against `snapshot` on the rayon pool
    pub fn submit(
        &mut self,
        snapshot: Option<&Arc<FrameSnapshot>>,
        kind: QueryKind,
        requests: Vec<QueryRequest>,
    ) -> Result<QueryTicket> {
        let snapshot = Arc::clone(snapshot.ok_or(OceanError::QueryNotReady)?);
        let shared = Arc::new(Shared::default());
        let ticket = QueryTicket {
            kind,
            len: requests.len(),
            shared: Arc::clone(&shared),
        };

        let settings = self.settings.clone();
        let worker = Arc::clone(&shared);
        rayon::spawn(move || {
            if worker.lock().cancelled {
                worker.finish(None);
                return;
            }
            let results = requests
                .par_iter()
                .map(|request| run_query(&snapshot, kind, request, &settings))
                .collect();
            worker.finish(Some(Ok(results)));
        });

        self.in_flight.push(shared);
        Ok(ticket)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Batches that had to be waited on at a tick boundary so far
    pub fn forced_waits(&self) -> u64 {
        self.forced_waits
    }

    /// Block until every outstanding batch has finished
    pub fn complete_in_flight(&mut self) {
        let pending = self.in_flight.iter().filter(|s| !s.is_finished()).count();
        if pending > 0 {
            self.forced_waits += pending as u64;
            debug!("Waiting on {} query batches at tick start", pending);
        }
        for shared in self.in_flight.drain(..) {
            shared.wait_finished();
        }
    }
}
