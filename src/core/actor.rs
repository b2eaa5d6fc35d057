//! Serialized event loop around the [`PlacementEngine`].
//!
//! Tracker updates, user requests, and finished model loads all reach the
//! engine through one task, one event at a time, in arrival order.
//! Observers read a `watch` snapshot and never touch the engine.
//!
//! Model decoding happens off the loop. Every load request bumps a
//! generation counter; a decode that finishes after a newer request was
//! made is dropped, so a late result never replaces the model the user
//! asked for last.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::placement::PlacementEngine;
use crate::adapters::{ModelHandle, ModelLoader};
use crate::domain::{MarkerSample, PlacementSnapshot};

/// Events accepted by the placement loop
#[derive(Debug)]
pub enum PlacementCommand {
    /// Decode and activate the model at this local path
    LoadModel(PathBuf),

    /// Latest full marker sample from the tracker
    MarkersUpdated(MarkerSample),

    /// Hide the model and wait for a new pose
    RequestReposition,

    /// The tracker could not start
    TrackingFailed(String),

    /// Reply once every earlier command has been handled
    Flush(oneshot::Sender<()>),
}

/// A finished decode, tagged with the load request it answers
struct LoadResult {
    generation: u64,
    path: PathBuf,
    result: Result<Box<dyn ModelHandle>>,
}

/// Cloneable handle used by the tracker feed, the UI, and the renderer
#[derive(Clone)]
pub struct PlacementHandle {
    commands: mpsc::Sender<PlacementCommand>,
    snapshot: watch::Receiver<PlacementSnapshot>,
}

impl PlacementHandle {
    async fn send(&self, command: PlacementCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow::anyhow!("Placement loop has stopped"))
    }

    pub async fn load_model(&self, path: impl Into<PathBuf>) -> Result<()> {
        self.send(PlacementCommand::LoadModel(path.into())).await
    }

    pub async fn markers_updated(&self, sample: MarkerSample) -> Result<()> {
        self.send(PlacementCommand::MarkersUpdated(sample)).await
    }

    pub async fn request_reposition(&self) -> Result<()> {
        self.send(PlacementCommand::RequestReposition).await
    }

    pub async fn tracking_failed(&self, message: impl Into<String>) -> Result<()> {
        self.send(PlacementCommand::TrackingFailed(message.into())).await
    }

    /// Wait until every command sent before this call has been handled
    pub async fn flush(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(PlacementCommand::Flush(tx)).await?;
        rx.await
            .map_err(|_| anyhow::anyhow!("Placement loop has stopped"))
    }

    /// Current placement as seen by the renderer
    pub fn snapshot(&self) -> PlacementSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Change notifications for the placement snapshot
    pub fn subscribe(&self) -> watch::Receiver<PlacementSnapshot> {
        self.snapshot.clone()
    }
}

/// Runs a [`PlacementEngine`] on its own task
pub struct PlacementActor {
    engine: PlacementEngine,
    loader: Arc<dyn ModelLoader>,
    generation: u64,
    snapshot_tx: watch::Sender<PlacementSnapshot>,
    loaded_tx: mpsc::UnboundedSender<LoadResult>,
}

impl PlacementActor {
    /// Spawn the loop. It stops once every [`PlacementHandle`] is dropped.
    pub fn spawn(
        engine: PlacementEngine,
        loader: Arc<dyn ModelLoader>,
    ) -> (PlacementHandle, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::channel(256);
        let (loaded_tx, loaded_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(engine.snapshot());

        let actor = Self {
            engine,
            loader,
            generation: 0,
            snapshot_tx,
            loaded_tx,
        };
        let task = tokio::spawn(actor.run(commands_rx, loaded_rx));

        (
            PlacementHandle {
                commands: commands_tx,
                snapshot: snapshot_rx,
            },
            task,
        )
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<PlacementCommand>,
        mut loaded: mpsc::UnboundedReceiver<LoadResult>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(done) = loaded.recv() => self.handle_loaded(done),
            }
            self.publish();
        }
        info!("Placement loop stopped");
    }

    fn handle_command(&mut self, command: PlacementCommand) {
        match command {
            PlacementCommand::LoadModel(path) => self.start_load(path),
            PlacementCommand::MarkersUpdated(sample) => {
                let outcome = self.engine.on_markers_updated(&sample);
                debug!(?outcome, "Markers updated");
            }
            PlacementCommand::RequestReposition => {
                self.engine.request_reposition();
            }
            PlacementCommand::TrackingFailed(message) => {
                self.engine.report_tracking_failure(&message);
            }
            PlacementCommand::Flush(reply) => {
                let _ = reply.send(());
            }
        }
    }

    fn start_load(&mut self, path: PathBuf) {
        self.generation += 1;
        let generation = self.generation;
        let loader = Arc::clone(&self.loader);
        let loaded_tx = self.loaded_tx.clone();

        info!(generation, path = %path.display(), "Loading model");
        tokio::spawn(async move {
            let result = loader.load(&path).await;
            let _ = loaded_tx.send(LoadResult {
                generation,
                path,
                result,
            });
        });
    }

    fn handle_loaded(&mut self, done: LoadResult) {
        if done.generation != self.generation {
            debug!(
                generation = done.generation,
                current = self.generation,
                path = %done.path.display(),
                "Discarding superseded model load"
            );
            return;
        }

        match done.result {
            Ok(model) => self.engine.load_model(model),
            Err(e) => self.engine.report_load_failure(&e),
        }
    }

    fn publish(&self) {
        let next = self.engine.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
