// ── Sync coordinator ──
//
// Owns the view snapshot. A single actor task receives reload requests
// and catalog edits over an mpsc channel, runs at most one sync cycle at
// a time, and publishes every state change on a watch channel and on the
// bus (`Topic::ViewUpdated`).

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::{StreamExt, stream};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use sprig_api::{TelemetryClient, TransportConfig};

use crate::bindings::{DeviceBindingRegistry, DevicePicker};
use crate::bus::{CatalogChange, ChangeKind, EventBus, Payload, Subscription, Topic};
use crate::catalog::{Binding, CatalogStore, SqliteCatalog};
use crate::config::{StorageLocation, SyncConfig, SyncOptions};
use crate::error::CoreError;
use crate::model::{
    Entity, EntityId, EntityWrite, LiveReadings, NewEntity, PlantView, Sample, ViewSnapshot,
    ViewState,
};
use crate::stream::ViewStream;
use crate::telemetry::{Telemetry, TelemetryDiagnostic};

const REQUEST_CHANNEL_SIZE: usize = 64;
const CYCLE_CHANNEL_SIZE: usize = 4;
/// Stale cycles rerun at most this many times in a row before the latest
/// result is published anyway.
const MAX_STALE_RESTARTS: u32 = 3;

// ── Parts ────────────────────────────────────────────────────────

/// The collaborators a coordinator orchestrates.
pub struct SyncParts {
    pub catalog: Arc<dyn CatalogStore>,
    pub telemetry: Telemetry,
    pub bindings: Arc<DeviceBindingRegistry>,
    pub bus: EventBus,
}

// ── Requests ─────────────────────────────────────────────────────

type Reply<T> = oneshot::Sender<Result<T, CoreError>>;

enum Request {
    Reload {
        reply: Option<oneshot::Sender<ViewState>>,
    },
    Save {
        entity: NewEntity,
        reply: Reply<Entity>,
    },
    Rename {
        id: EntityId,
        nickname: String,
        reply: Reply<Entity>,
    },
    Relocate {
        id: EntityId,
        location: String,
        reply: Reply<Entity>,
    },
    Delete {
        id: EntityId,
        reply: Reply<Entity>,
    },
    Assign {
        id: EntityId,
        device_id: Option<String>,
        reply: Reply<Binding>,
    },
}

// ── SyncCoordinator ──────────────────────────────────────────────

/// Keeps a live view of the catalog merged with device readings.
///
/// Cheaply cloneable. Call [`start()`](Self::start) to spawn the actor;
/// until then every request fails with [`CoreError::CoordinatorStopped`].
#[derive(Clone)]
pub struct SyncCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    shared: Arc<Shared>,
    request_tx: mpsc::Sender<Request>,
    request_rx: Mutex<Option<mpsc::Receiver<Request>>>,
    cancel: CancellationToken,
    subscription: Mutex<Option<Subscription>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

/// What the actor needs. Holds no request sender, so the actor cannot
/// keep the coordinator alive.
struct Shared {
    catalog: Arc<dyn CatalogStore>,
    telemetry: Telemetry,
    bindings: Arc<DeviceBindingRegistry>,
    bus: EventBus,
    options: SyncOptions,
    state: watch::Sender<ViewState>,
}

// Last handle gone without `shutdown()`: stop the actor and refresh task.
impl Drop for CoordinatorInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl SyncCoordinator {
    /// Assemble a coordinator. Does NOT start it.
    pub fn new(parts: SyncParts, options: SyncOptions) -> Self {
        let (state, _) = watch::channel(ViewState::Idle);
        let (request_tx, request_rx) = mpsc::channel(REQUEST_CHANNEL_SIZE);

        Self {
            inner: Arc::new(CoordinatorInner {
                shared: Arc::new(Shared {
                    catalog: parts.catalog,
                    telemetry: parts.telemetry,
                    bindings: parts.bindings,
                    bus: parts.bus,
                    options,
                    state,
                }),
                request_tx,
                request_rx: Mutex::new(Some(request_rx)),
                cancel: CancellationToken::new(),
                subscription: Mutex::new(None),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Open storage and build the telemetry client described by `config`.
    pub async fn open(config: &SyncConfig) -> Result<Self, CoreError> {
        let catalog: Arc<dyn CatalogStore> = match &config.database {
            StorageLocation::InMemory => Arc::new(SqliteCatalog::in_memory().await?),
            StorageLocation::File(path) => Arc::new(SqliteCatalog::open(path).await?),
        };
        let bindings = match &config.preferences {
            StorageLocation::InMemory => DeviceBindingRegistry::in_memory(catalog.clone()),
            StorageLocation::File(path) => DeviceBindingRegistry::open(catalog.clone(), path)?,
        };

        let transport = TransportConfig {
            timeout: config.timeout,
            ca_cert: config.ca_cert.clone(),
        };
        let client =
            TelemetryClient::new(config.telemetry_url.clone(), config.owner.clone(), &transport)?;

        Ok(Self::new(
            SyncParts {
                catalog,
                telemetry: Telemetry::from_client(client),
                bindings: Arc::new(bindings),
                bus: EventBus::new(),
            },
            config.sync.clone(),
        ))
    }

    /// One-shot: open, start, run closure, shut down.
    ///
    /// Periodic refresh is disabled since only one exchange is needed.
    pub async fn oneshot<F, Fut, T>(config: &SyncConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(SyncCoordinator) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config.clone();
        cfg.sync.refresh_interval = Duration::ZERO;

        let coordinator = Self::open(&cfg).await?;
        coordinator.start()?;
        let result = f(coordinator.clone()).await;
        coordinator.shutdown().await;
        result
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Subscribe to `CatalogChanged` and spawn the actor (plus the
    /// periodic refresh task when an interval is configured).
    pub fn start(&self) -> Result<(), CoreError> {
        let Some(requests) = self.inner.request_rx.lock().take() else {
            return Err(CoreError::Internal("sync coordinator already started".into()));
        };

        let tx = self.inner.request_tx.clone();
        let subscription = self.inner.shared.bus.subscribe(Topic::CatalogChanged, move |_| {
            // A full queue already guarantees a later cycle.
            if tx.try_send(Request::Reload { reply: None }).is_err() {
                debug!("reload request not queued");
            }
        });
        *self.inner.subscription.lock() = Some(subscription);

        let (done_tx, done_rx) = mpsc::channel(CYCLE_CHANNEL_SIZE);
        let actor = Actor {
            shared: self.inner.shared.clone(),
            revision: 0,
            generation: 0,
            applied: 0,
            in_flight: None,
            stale_restarts: 0,
            waiters: Vec::new(),
            last_good: None,
            done_tx,
        };

        let cancel = self.inner.cancel.clone();
        let mut handles = self.inner.task_handles.lock();
        handles.push(tokio::spawn(actor.run(requests, done_rx, cancel.clone())));

        let period = self.inner.shared.options.refresh_interval;
        if !period.is_zero() {
            handles.push(tokio::spawn(refresh_task(
                self.inner.request_tx.clone(),
                period,
                cancel,
            )));
        }

        info!(
            max_concurrent_fetches = self.inner.shared.options.max_concurrent_fetches,
            refresh_secs = period.as_secs(),
            "sync coordinator started"
        );
        Ok(())
    }

    /// Unsubscribe from the bus, stop background tasks and wait for them.
    ///
    /// An in-flight cycle is not interrupted; its result is discarded.
    pub async fn shutdown(&self) {
        drop(self.inner.subscription.lock().take());
        self.inner.cancel.cancel();

        let handles = std::mem::take(&mut *self.inner.task_handles.lock());
        for handle in handles {
            let _ = handle.await;
        }
        debug!("sync coordinator stopped");
    }

    // ── Reload ───────────────────────────────────────────────────

    /// Request a reload and wait for the cycle that answers it.
    ///
    /// Concurrent requests share one cycle. Storage failures come back
    /// as [`ViewState::Error`], not as `Err`.
    pub async fn reload(&self) -> Result<ViewState, CoreError> {
        self.ensure_started()?;
        let (tx, rx) = oneshot::channel();
        self.inner
            .request_tx
            .send(Request::Reload { reply: Some(tx) })
            .await
            .map_err(|_| CoreError::CoordinatorStopped)?;
        rx.await.map_err(|_| CoreError::CoordinatorStopped)
    }

    /// Fire-and-forget reload. Returns `false` if it could not be queued.
    pub fn request_reload(&self) -> bool {
        self.ensure_started().is_ok()
            && self
                .inner
                .request_tx
                .try_send(Request::Reload { reply: None })
                .is_ok()
    }

    // ── Edits ────────────────────────────────────────────────────

    /// Insert a new plant.
    pub async fn save_entity(&self, entity: NewEntity) -> Result<Entity, CoreError> {
        self.request(|reply| Request::Save { entity, reply }).await
    }

    /// Set the nickname. An empty nickname clears it.
    pub async fn rename(&self, id: EntityId, nickname: &str) -> Result<Entity, CoreError> {
        let nickname = nickname.to_owned();
        self.request(|reply| Request::Rename {
            id,
            nickname,
            reply,
        })
        .await
    }

    pub async fn update_location(&self, id: EntityId, location: &str) -> Result<Entity, CoreError> {
        let location = location.to_owned();
        self.request(|reply| Request::Relocate {
            id,
            location,
            reply,
        })
        .await
    }

    /// Remove a plant, returning the removed record (its image path
    /// included, for the caller to clean up).
    pub async fn delete(&self, id: EntityId) -> Result<Entity, CoreError> {
        self.request(|reply| Request::Delete { id, reply }).await
    }

    /// Bind a device, clearing it from whichever plant held it before.
    pub async fn bind(&self, id: EntityId, device_id: &str) -> Result<Binding, CoreError> {
        let device_id = Some(device_id.to_owned());
        self.request(|reply| Request::Assign {
            id,
            device_id,
            reply,
        })
        .await
    }

    pub async fn unbind(&self, id: EntityId) -> Result<Entity, CoreError> {
        let binding = self
            .request(|reply| Request::Assign {
                id,
                device_id: None,
                reply,
            })
            .await?;
        Ok(binding.entity)
    }

    // ── Queries ──────────────────────────────────────────────────

    /// Current state (the consumer-visible view plus its status).
    pub fn snapshot(&self) -> ViewState {
        self.inner.shared.state.borrow().clone()
    }

    /// Subscribe to state changes.
    pub fn state(&self) -> watch::Receiver<ViewState> {
        self.inner.shared.state.subscribe()
    }

    pub fn view_stream(&self) -> ViewStream {
        ViewStream::new(self.inner.shared.state.subscribe())
    }

    /// The `n` most recently created plants in the visible view.
    pub fn recent(&self, n: usize) -> Vec<PlantView> {
        self.inner
            .shared
            .state
            .borrow()
            .view()
            .map(|snap| snap.recent(n))
            .unwrap_or_default()
    }

    /// Devices registered to the owner, labelled with their aliases.
    ///
    /// An unreachable service yields an empty picker.
    pub async fn device_picker(&self) -> Result<DevicePicker, CoreError> {
        let devices = self.inner.shared.telemetry.list_devices().await;
        self.inner.shared.bindings.build_picker(&devices)
    }

    /// Recent readings for a device, newest first. Empty when unreadable.
    pub async fn device_history(&self, device_id: &str, limit: usize) -> Vec<Sample> {
        self.inner.shared.telemetry.recent_samples(device_id, limit).await
    }

    /// Telemetry failures that were degraded to "no reading".
    pub fn telemetry_diagnostics(&self) -> broadcast::Receiver<TelemetryDiagnostic> {
        self.inner.shared.telemetry.diagnostics()
    }

    // ── Collaborators ────────────────────────────────────────────

    pub fn bindings(&self) -> &DeviceBindingRegistry {
        &self.inner.shared.bindings
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.shared.bus
    }

    pub fn catalog(&self) -> &Arc<dyn CatalogStore> {
        &self.inner.shared.catalog
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.inner.shared.telemetry
    }

    pub fn options(&self) -> &SyncOptions {
        &self.inner.shared.options
    }

    // ── Helpers ──────────────────────────────────────────────────

    fn ensure_started(&self) -> Result<(), CoreError> {
        if self.inner.request_rx.lock().is_some() || self.inner.cancel.is_cancelled() {
            return Err(CoreError::CoordinatorStopped);
        }
        Ok(())
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> Request,
    ) -> Result<T, CoreError> {
        self.ensure_started()?;
        let (tx, rx) = oneshot::channel();
        self.inner
            .request_tx
            .send(make(tx))
            .await
            .map_err(|_| CoreError::CoordinatorStopped)?;
        rx.await.map_err(|_| CoreError::CoordinatorStopped)?
    }
}

// ── Actor ────────────────────────────────────────────────────────

struct CycleOutcome {
    generation: u64,
    revision: u64,
    result: Result<Vec<PlantView>, CoreError>,
}

/// Sole owner of the snapshot and the revision counter.
struct Actor {
    shared: Arc<Shared>,
    /// Bumped after every committed edit.
    revision: u64,
    /// Last generation handed to a cycle.
    generation: u64,
    /// Generation of the snapshot currently applied.
    applied: u64,
    in_flight: Option<u64>,
    /// Consecutive cycles discarded because the catalog moved on.
    stale_restarts: u32,
    waiters: Vec<oneshot::Sender<ViewState>>,
    last_good: Option<Arc<ViewSnapshot>>,
    done_tx: mpsc::Sender<CycleOutcome>,
}

impl Actor {
    async fn run(
        mut self,
        mut requests: mpsc::Receiver<Request>,
        mut done: mpsc::Receiver<CycleOutcome>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                Some(outcome) = done.recv() => self.finish_cycle(outcome),
                request = requests.recv() => {
                    let Some(request) = request else { break };
                    self.handle(request).await;
                }
            }
        }
        debug!("sync actor exited");
    }

    async fn handle(&mut self, request: Request) {
        match request {
            Request::Reload { reply } => self.reload(reply),

            Request::Save { entity, reply } => {
                let result = self.shared.catalog.upsert(EntityWrite::New(entity)).await;
                let id = result.as_ref().ok().map(|e| e.id);
                let _ = reply.send(self.committed(result, ChangeKind::Saved, id));
            }

            Request::Rename {
                id,
                nickname,
                reply,
            } => {
                let result = self
                    .modify(id, |e| {
                        let nickname = nickname.trim();
                        e.nickname = (!nickname.is_empty()).then(|| nickname.to_owned());
                    })
                    .await;
                let _ = reply.send(self.committed(result, ChangeKind::Renamed, Some(id)));
            }

            Request::Relocate {
                id,
                location,
                reply,
            } => {
                let result = self
                    .modify(id, |e| location.trim().clone_into(&mut e.location))
                    .await;
                let _ = reply.send(self.committed(result, ChangeKind::Relocated, Some(id)));
            }

            Request::Delete { id, reply } => {
                let result = self.shared.catalog.delete(id).await;
                let _ = reply.send(self.committed(result, ChangeKind::Deleted, Some(id)));
            }

            Request::Assign {
                id,
                device_id,
                reply,
            } => {
                let (result, kind) = match device_id {
                    Some(device) => (self.shared.bindings.bind(id, &device).await, ChangeKind::Bound),
                    None => (
                        self.shared.bindings.unbind(id).await.map(|entity| Binding {
                            entity,
                            displaced: Vec::new(),
                        }),
                        ChangeKind::Unbound,
                    ),
                };
                let _ = reply.send(self.committed(result, kind, Some(id)));
            }
        }
    }

    /// Read-modify-write of one record.
    async fn modify(
        &self,
        id: EntityId,
        change: impl FnOnce(&mut Entity),
    ) -> Result<Entity, CoreError> {
        let mut entity = self.shared.catalog.get(id).await?;
        change(&mut entity);
        self.shared.catalog.upsert(EntityWrite::Existing(entity)).await
    }

    /// After a successful commit: bump the revision and announce it.
    fn committed<T>(
        &mut self,
        result: Result<T, CoreError>,
        kind: ChangeKind,
        entity_id: Option<EntityId>,
    ) -> Result<T, CoreError> {
        if result.is_ok() {
            self.revision += 1;
            debug!(%kind, ?entity_id, revision = self.revision, "catalog edit committed");
            let change = CatalogChange {
                kind,
                entity_id,
                revision: Some(self.revision),
            };
            self.shared
                .bus
                .publish(Topic::CatalogChanged, &Payload::Catalog(change));
        }
        result
    }

    fn reload(&mut self, reply: Option<oneshot::Sender<ViewState>>) {
        self.waiters.extend(reply);
        if self.in_flight.is_some() {
            debug!("reload coalesced into in-flight cycle");
        } else {
            self.start_cycle();
        }
    }

    fn start_cycle(&mut self) {
        self.generation += 1;
        let generation = self.generation;
        let revision = self.revision;
        self.in_flight = Some(generation);
        self.set_state(ViewState::Loading {
            last_good: self.last_good.clone(),
        });
        debug!(generation, revision, "sync cycle started");

        let catalog = self.shared.catalog.clone();
        let telemetry = self.shared.telemetry.clone();
        let previous = self.last_good.clone();
        let limit = self.shared.options.max_concurrent_fetches;
        let done = self.done_tx.clone();

        tokio::spawn(async move {
            let result = run_cycle(catalog.as_ref(), &telemetry, previous.as_deref(), limit).await;
            // After shutdown nobody is listening.
            let _ = done
                .send(CycleOutcome {
                    generation,
                    revision,
                    result,
                })
                .await;
        });
    }

    fn finish_cycle(&mut self, outcome: CycleOutcome) {
        if self.in_flight != Some(outcome.generation) {
            debug!(generation = outcome.generation, "ignoring result of unknown cycle");
            return;
        }
        self.in_flight = None;

        let stale = outcome.revision != self.revision;
        if stale && self.stale_restarts < MAX_STALE_RESTARTS {
            self.stale_restarts += 1;
            debug!(
                generation = outcome.generation,
                read = outcome.revision,
                current = self.revision,
                "catalog changed during cycle, discarding result"
            );
            self.start_cycle();
            return;
        }
        if stale {
            // Still newer than the applied snapshot. A follow-up cycle
            // picks up the edits it missed.
            warn!(
                generation = outcome.generation,
                restarts = self.stale_restarts,
                "catalog keeps changing, publishing last completed cycle"
            );
        }
        self.stale_restarts = 0;

        match outcome.result {
            Ok(plants) if outcome.generation > self.applied => {
                let snapshot = Arc::new(ViewSnapshot {
                    generation: outcome.generation,
                    revision: outcome.revision,
                    loaded_at: Utc::now(),
                    plants,
                });
                self.applied = outcome.generation;
                self.last_good = Some(snapshot.clone());
                debug!(
                    generation = snapshot.generation,
                    plants = snapshot.plants.len(),
                    "sync cycle complete"
                );
                self.set_state(ViewState::Ready(snapshot));
            }
            Ok(_) => {
                debug!(generation = outcome.generation, "stale generation dropped");
            }
            Err(e) => {
                warn!(error = %e, generation = outcome.generation, "sync cycle failed");
                self.set_state(ViewState::Error {
                    last_good: self.last_good.clone(),
                    message: e.to_string(),
                });
            }
        }

        let state = self.shared.state.borrow().clone();
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(state.clone());
        }

        if stale {
            self.start_cycle();
        }
    }

    fn set_state(&self, state: ViewState) {
        self.shared.state.send_replace(state.clone());
        self.shared
            .bus
            .publish(Topic::ViewUpdated, &Payload::View(state));
    }
}

// ── Sync cycle ───────────────────────────────────────────────────

/// List the catalog and merge in the latest reading of every bound device.
///
/// Fetches run concurrently, at most `max_concurrent` at once, and fail
/// independently. A missing reading keeps the previous one for the same
/// device; a plant seen for the first time starts out unknown.
async fn run_cycle(
    catalog: &dyn CatalogStore,
    telemetry: &Telemetry,
    previous: Option<&ViewSnapshot>,
    max_concurrent: usize,
) -> Result<Vec<PlantView>, CoreError> {
    let entities = catalog.list().await?;

    let bound: Vec<(EntityId, String)> = entities
        .iter()
        .filter_map(|e| e.device_id.clone().map(|device| (e.id, device)))
        .collect();

    let fetched: Vec<(EntityId, Option<Sample>)> = stream::iter(bound)
        .map(|(id, device)| async move { (id, telemetry.latest_sample(&device).await) })
        .buffer_unordered(max_concurrent.max(1))
        .collect()
        .await;

    let samples: HashMap<EntityId, Sample> = fetched
        .into_iter()
        .filter_map(|(id, sample)| sample.map(|s| (id, s)))
        .collect();

    Ok(entities
        .into_iter()
        .map(|entity| {
            let readings = match samples.get(&entity.id) {
                Some(sample) => LiveReadings::from(sample),
                None => carried_readings(previous, &entity),
            };
            PlantView { entity, readings }
        })
        .collect())
}

fn carried_readings(previous: Option<&ViewSnapshot>, entity: &Entity) -> LiveReadings {
    if entity.device_id.is_none() {
        return LiveReadings::UNKNOWN;
    }
    previous
        .and_then(|snap| snap.get(entity.id))
        .filter(|prior| prior.entity.device_id == entity.device_id)
        .map_or(LiveReadings::UNKNOWN, |prior| prior.readings)
}

// ── Background tasks ─────────────────────────────────────────────

/// Periodically request a reload through the normal coalescing path.
async fn refresh_task(
    requests: mpsc::Sender<Request>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if requests.try_send(Request::Reload { reply: None }).is_err() {
                    debug!("periodic reload not queued");
                }
            }
        }
    }
}
