/// Viewport lifecycle manager
///
/// One actor task owns the rendering surface. Geometry changes, skin
/// selections and camera moves arrive as commands and are handled strictly in
/// order, so there is never more than one live surface and a surface is always
/// disposed before its replacement is created.
///
/// Decoding a skin runs off the actor. Every load is tagged with the surface
/// generation and selection ticket it was issued for; a result that comes back
/// for an older surface or an older selection is dropped.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::config::ViewerSettings;
use crate::error::ViewportError;
use crate::store::payload::SkinPayload;

use super::camera::Camera;
use super::geometry::{GeometryObserver, SurfaceSize};
use super::surface::{DisplayRegion, RenderSurface, SkinTexture, SurfaceFactory, SurfaceTarget};

type Reply<T> = oneshot::Sender<T>;

enum Command {
    Resize {
        size: SurfaceSize,
        done: Option<Reply<()>>,
    },
    SetAsset {
        payload: Option<SkinPayload>,
        done: Reply<Result<(), ViewportError>>,
    },
    Orbit {
        yaw: f32,
        pitch: f32,
    },
    Zoom(f32),
    Status(Reply<ViewportStatus>),
    Detach(Reply<()>),
}

/// Where the manager is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportPhase {
    /// No surface: no usable geometry yet, or the last creation failed
    Uninitialized,
    /// A surface is live
    Active,
    /// Detached; terminal
    Disposed,
}

/// Snapshot of the manager state, for the host and for tests
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportStatus {
    pub phase: ViewportPhase,
    pub size: SurfaceSize,
    /// Generation of the live surface
    pub generation: Option<u64>,
    /// Skin currently shown
    pub active: Option<SkinPayload>,
    /// A selection is still being decoded/applied
    pub loading: bool,
}

impl ViewportStatus {
    fn disposed() -> Self {
        Self {
            phase: ViewportPhase::Disposed,
            size: SurfaceSize::ZERO,
            generation: None,
            active: None,
            loading: false,
        }
    }
}

/// Cloneable handle to the viewport actor.
#[derive(Clone)]
pub struct ViewportManager {
    commands: mpsc::UnboundedSender<Command>,
    geometry: Arc<JoinHandle<()>>,
}

impl std::fmt::Debug for ViewportManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewportManager")
            .field("closed", &self.commands.is_closed())
            .finish_non_exhaustive()
    }
}

impl ViewportManager {
    /// Start the actor and subscribe it to `observer`.
    ///
    /// Must be called from inside a tokio runtime. The actor lives until
    /// `detach`, or until every handle and the observer subscription are gone.
    pub fn attach<F: SurfaceFactory>(
        factory: F,
        region: DisplayRegion,
        observer: &GeometryObserver,
        settings: ViewerSettings,
    ) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        tokio::spawn(ViewportActor::new(factory, region, settings).run(receiver));
        let geometry = tokio::spawn(forward_geometry(observer.subscribe(), commands.clone()));

        log::debug!("viewport attached");
        Self {
            commands,
            geometry: Arc::new(geometry),
        }
    }

    /// Feed one size measurement and wait until it has been handled
    pub async fn resize(&self, size: SurfaceSize) -> Result<(), ViewportError> {
        let (done, handled) = oneshot::channel();
        self.send(Command::Resize {
            size,
            done: Some(done),
        })?;
        handled.await.map_err(|_| ViewportError::Disposed)
    }

    /// Show `payload` (or nothing).
    ///
    /// Resolves once the skin is on screen, or with the reason it is not:
    /// `AssetLoadFailed` (previous skin kept), `Superseded` by a newer
    /// selection, or `Disposed`. Before the first usable geometry arrives the
    /// selection waits for a surface.
    pub async fn set_asset(&self, payload: Option<SkinPayload>) -> Result<(), ViewportError> {
        let (done, outcome) = oneshot::channel();
        self.send(Command::SetAsset { payload, done })?;
        outcome.await.map_err(|_| ViewportError::Disposed)?
    }

    /// Rotate the camera (radians). Ignored when rotation is disabled.
    pub fn orbit(&self, yaw: f32, pitch: f32) -> Result<(), ViewportError> {
        self.send(Command::Orbit { yaw, pitch })
    }

    /// Move the camera closer (positive) or further. Ignored when zoom is disabled.
    pub fn zoom(&self, delta: f32) -> Result<(), ViewportError> {
        self.send(Command::Zoom(delta))
    }

    pub async fn status(&self) -> ViewportStatus {
        let (reply, status) = oneshot::channel();
        if self.send(Command::Status(reply)).is_err() {
            return ViewportStatus::disposed();
        }
        status.await.unwrap_or_else(|_| ViewportStatus::disposed())
    }

    /// Dispose the surface and stop the actor
    pub async fn detach(&self) -> Result<(), ViewportError> {
        self.geometry.abort();
        let (done, finished) = oneshot::channel();
        self.send(Command::Detach(done))?;
        finished.await.map_err(|_| ViewportError::Disposed)
    }

    fn send(&self, command: Command) -> Result<(), ViewportError> {
        self.commands
            .send(command)
            .map_err(|_| ViewportError::Disposed)
    }
}

/// Turn observer updates into resize commands. Unlaid-out sizes never leave here.
async fn forward_geometry(
    mut sizes: watch::Receiver<SurfaceSize>,
    commands: mpsc::UnboundedSender<Command>,
) {
    loop {
        let size = *sizes.borrow_and_update();
        if size.is_laid_out() && commands.send(Command::Resize { size, done: None }).is_err() {
            break;
        }
        if sizes.changed().await.is_err() {
            break;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LoadTag {
    generation: u64,
    ticket: u64,
}

struct LoadOutcome {
    tag: LoadTag,
    result: Result<SkinTexture, ViewportError>,
}

struct Selection {
    ticket: u64,
    payload: SkinPayload,
}

struct LiveSurface<S> {
    generation: u64,
    surface: S,
}

enum Event {
    Command(Option<Command>),
    Loaded(LoadOutcome),
}

#[derive(PartialEq)]
enum Flow {
    Continue,
    Stop,
}

struct ViewportActor<F: SurfaceFactory> {
    factory: F,
    region: DisplayRegion,
    settings: ViewerSettings,
    camera: Camera,
    /// Last laid-out size handled
    size: SurfaceSize,
    live: Option<LiveSurface<F::Surface>>,
    last_generation: u64,
    /// What should be on screen
    selection: Option<Selection>,
    pending_reply: Option<Reply<Result<(), ViewportError>>>,
    /// What is on screen
    active: Option<SkinPayload>,
    /// Surface generation `active` was uploaded to
    shown_on: Option<u64>,
    last_ticket: u64,
    loaded_tx: mpsc::UnboundedSender<LoadOutcome>,
    loaded_rx: mpsc::UnboundedReceiver<LoadOutcome>,
    /// A command pulled out of the queue while coalescing resizes
    deferred: Option<Command>,
}

impl<F: SurfaceFactory> ViewportActor<F> {
    fn new(factory: F, region: DisplayRegion, settings: ViewerSettings) -> Self {
        let (loaded_tx, loaded_rx) = mpsc::unbounded_channel();
        Self {
            factory,
            region,
            settings,
            camera: Camera::default(),
            size: SurfaceSize::ZERO,
            live: None,
            last_generation: 0,
            selection: None,
            pending_reply: None,
            active: None,
            shown_on: None,
            last_ticket: 0,
            loaded_tx,
            loaded_rx,
            deferred: None,
        }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            let event = match self.deferred.take() {
                Some(command) => Event::Command(Some(command)),
                None => tokio::select! {
                    command = commands.recv() => Event::Command(command),
                    Some(outcome) = self.loaded_rx.recv() => Event::Loaded(outcome),
                },
            };

            match event {
                Event::Command(Some(command)) => {
                    if self.handle(command, &mut commands) == Flow::Stop {
                        break;
                    }
                }
                // Every handle is gone
                Event::Command(None) => {
                    self.teardown();
                    break;
                }
                Event::Loaded(outcome) => self.on_loaded(outcome),
            }
        }
    }

    fn handle(
        &mut self,
        command: Command,
        commands: &mut mpsc::UnboundedReceiver<Command>,
    ) -> Flow {
        match command {
            Command::Resize { size, done } => {
                let mut waiters: Vec<Reply<()>> = done.into_iter().collect();
                let size = self.coalesce(size, &mut waiters, commands);
                self.resize(size);
                for waiter in waiters {
                    let _ = waiter.send(());
                }
            }
            Command::SetAsset { payload, done } => self.select(payload, done),
            Command::Orbit { yaw, pitch } => {
                if self.settings.enable_rotate {
                    self.camera.orbit(yaw, pitch);
                    self.repaint();
                }
            }
            Command::Zoom(delta) => {
                if self.settings.enable_zoom {
                    self.camera.zoom(delta);
                    self.repaint();
                }
            }
            Command::Status(reply) => {
                let _ = reply.send(self.status());
            }
            Command::Detach(done) => {
                self.teardown();
                let _ = done.send(());
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    /// Fold every resize already waiting in the queue into one.
    ///
    /// Stops at the first non-resize command, which is handled next.
    fn coalesce(
        &mut self,
        mut size: SurfaceSize,
        waiters: &mut Vec<Reply<()>>,
        commands: &mut mpsc::UnboundedReceiver<Command>,
    ) -> SurfaceSize {
        while let Ok(command) = commands.try_recv() {
            match command {
                Command::Resize { size: newer, done } => {
                    if newer.is_laid_out() || !size.is_laid_out() {
                        size = newer;
                    }
                    waiters.extend(done);
                }
                other => {
                    self.deferred = Some(other);
                    break;
                }
            }
        }
        size
    }

    fn resize(&mut self, size: SurfaceSize) {
        if !size.is_laid_out() {
            log::debug!("ignoring geometry {} (not laid out)", size);
            return;
        }
        if size == self.size {
            return;
        }

        log::debug!("geometry {} -> {}", self.size, size);
        self.size = size;
        self.rebuild();
    }

    /// Dispose the current surface, then create one at `self.size`
    fn rebuild(&mut self) {
        if let Some(old) = self.live.take() {
            self.dispose(old);
        }

        self.last_generation += 1;
        let generation = self.last_generation;
        if let Err(e) = self.region.claim(generation) {
            log::error!("❌ Cannot attach surface #{}: {}", generation, e);
            return;
        }

        let target = SurfaceTarget::new(self.region.clone(), generation);
        match self.factory.create(self.size, target) {
            Ok(surface) => {
                log::info!("🖼️  Surface #{} created at {}", generation, self.size);
                self.live = Some(LiveSurface {
                    generation,
                    surface,
                });
                self.repaint();
                self.issue_load();
            }
            Err(e) => {
                log::error!("❌ {}", e);
                self.region.release(generation);
            }
        }
    }

    fn dispose(&self, old: LiveSurface<F::Surface>) {
        let generation = old.generation;
        old.surface.dispose();
        self.region.release(generation);
        log::debug!("surface #{} disposed", generation);
    }

    fn select(&mut self, payload: Option<SkinPayload>, done: Reply<Result<(), ViewportError>>) {
        if let Some(previous) = self.pending_reply.take() {
            let _ = previous.send(Err(ViewportError::Superseded));
        }

        let Some(payload) = payload else {
            self.selection = None;
            self.active = None;
            self.shown_on = None;
            if let Some(live) = self.live.as_mut() {
                if let Err(e) = live.surface.load_skin(None) {
                    log::warn!("⚠️  Could not clear skin: {}", e);
                }
            }
            self.repaint();
            let _ = done.send(Ok(()));
            return;
        };

        self.last_ticket += 1;
        self.selection = Some(Selection {
            ticket: self.last_ticket,
            payload,
        });
        self.pending_reply = Some(done);
        self.issue_load();
    }

    /// Decode the selection for the live surface on the blocking pool
    fn issue_load(&self) {
        let (Some(live), Some(selection)) = (self.live.as_ref(), self.selection.as_ref()) else {
            return;
        };

        let tag = LoadTag {
            generation: live.generation,
            ticket: selection.ticket,
        };
        let payload = selection.payload.clone();
        let loaded = self.loaded_tx.clone();
        log::debug!(
            "loading skin for surface #{} (ticket {})",
            tag.generation,
            tag.ticket
        );

        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || SkinTexture::decode(&payload))
                .await
                .unwrap_or_else(|e| {
                    Err(ViewportError::AssetLoadFailed(format!(
                        "Task join error: {}",
                        e
                    )))
                });
            let _ = loaded.send(LoadOutcome { tag, result });
        });
    }

    fn on_loaded(&mut self, outcome: LoadOutcome) {
        let live_generation = self.live.as_ref().map(|l| l.generation);
        let selected_ticket = self.selection.as_ref().map(|s| s.ticket);
        if live_generation != Some(outcome.tag.generation)
            || selected_ticket != Some(outcome.tag.ticket)
        {
            log::debug!("discarding stale skin load {:?}", outcome.tag);
            return;
        }

        let applied = match outcome.result {
            Ok(texture) => self.apply(&texture),
            Err(e) => Err(e),
        };

        match applied {
            Ok(()) => {
                self.active = self.selection.as_ref().map(|s| s.payload.clone());
                self.shown_on = Some(outcome.tag.generation);
                log::info!("🎨 Skin shown on surface #{}", outcome.tag.generation);
                if let Some(reply) = self.pending_reply.take() {
                    let _ = reply.send(Ok(()));
                }
            }
            Err(e) => {
                log::warn!("⚠️  Keeping previous skin: {}", e);
                // Fall back to what is on screen so a rebuild reloads that
                self.last_ticket += 1;
                let ticket = self.last_ticket;
                self.selection = self
                    .active
                    .clone()
                    .map(|payload| Selection { ticket, payload });
                if let Some(reply) = self.pending_reply.take() {
                    let _ = reply.send(Err(e));
                }
                // A rebuild while the failed load was in flight left this surface blank
                if self.shown_on != live_generation {
                    self.issue_load();
                }
            }
        }
    }

    fn apply(&mut self, texture: &SkinTexture) -> Result<(), ViewportError> {
        let camera = self.camera;
        let Some(live) = self.live.as_mut() else {
            return Err(ViewportError::Disposed);
        };
        live.surface.load_skin(Some(texture))?;
        if let Err(e) = live.surface.render(&camera) {
            log::error!("❌ Repaint failed on surface #{}: {}", live.generation, e);
        }
        Ok(())
    }

    fn repaint(&mut self) {
        let camera = self.camera;
        if let Some(live) = self.live.as_mut() {
            if let Err(e) = live.surface.render(&camera) {
                log::error!("❌ Repaint failed on surface #{}: {}", live.generation, e);
            }
        }
    }

    fn status(&self) -> ViewportStatus {
        ViewportStatus {
            phase: if self.live.is_some() {
                ViewportPhase::Active
            } else {
                ViewportPhase::Uninitialized
            },
            size: self.size,
            generation: self.live.as_ref().map(|l| l.generation),
            active: self.active.clone(),
            loading: self.pending_reply.is_some(),
        }
    }

    fn teardown(&mut self) {
        if let Some(live) = self.live.take() {
            self.dispose(live);
        }
        if let Some(reply) = self.pending_reply.take() {
            let _ = reply.send(Err(ViewportError::Disposed));
        }
        self.selection = None;
        self.active = None;
        self.shown_on = None;
        log::info!("viewport detached");
    }
}
