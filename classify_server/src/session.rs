//! Page session: the start control and everything the initializer sets up.
//!
//! A session starts with an enabled start control. Starting disables the control, loads the
//! model, sets up the webcam, builds one label row per class and spawns the frame loop. If any of
//! that fails, nothing is left running and the control is enabled again so the user can retry.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use common::protocol::Status;

use crate::{
    config::Args,
    frame_loop::{FrameLoop, LoopSettings},
    nn::{Classifier, ImageModel},
    pubsub::Publisher,
    sensors::{FrameSource, Webcam},
};

const ERROR_OVERLAY: &str = "Error loading model.";
const ERROR_HINT: &str =
    "Make sure the model folder exists with model.onnx and metadata.json, and that the webcam is connected.";

/// Provides the model and the webcam on start.
pub trait Loader: Send + Sync {
    fn load_model(&self) -> Result<Box<dyn Classifier>>;
    fn setup_webcam(&self) -> Result<Box<dyn FrameSource>>;
}

/// Loads the ONNX model from disk and opens the video device.
pub struct DeviceLoader {
    args: Args,
}

impl DeviceLoader {
    pub fn new(args: Args) -> Self {
        Self { args }
    }
}

impl Loader for DeviceLoader {
    fn load_model(&self) -> Result<Box<dyn Classifier>> {
        Ok(Box::new(ImageModel::load(&self.args)?))
    }

    fn setup_webcam(&self) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(Webcam::setup(&self.args)?))
    }
}

/// Result of pressing the start control.
#[derive(Debug, Eq, PartialEq)]
pub enum StartOutcome {
    /// The frame loop is running.
    Running { total_classes: usize },
    /// The control was disabled, nothing happened.
    Busy,
}

pub struct Session {
    loader: Arc<dyn Loader>,
    settings: LoopSettings,
    status: Mutex<Status>,
    publisher: Arc<Publisher>,
}

impl Session {
    pub fn new(loader: Arc<dyn Loader>, settings: LoopSettings) -> Self {
        Self {
            loader,
            settings,
            status: Mutex::new(Status::default()),
            publisher: Arc::new(Publisher::new()),
        }
    }

    pub fn status(&self) -> Status {
        self.lock_status().clone()
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Run the initializer.
    ///
    /// The initializer runs as its own task, so it completes and settles the start control even
    /// if the caller stops waiting. Errors are reported to the caller and also recorded in the
    /// status for the page.
    pub async fn start(self: &Arc<Self>) -> Result<StartOutcome> {
        if !self.disable_control() {
            log::warn!("Start requested while the start control is disabled");
            return Ok(StartOutcome::Busy);
        }

        let session = Arc::clone(self);
        match tokio::spawn(async move { session.initialize().await }).await {
            Ok(outcome) => outcome,
            Err(err) => {
                let err = anyhow::Error::from(err).context("initializer aborted");
                log::error!("Initialization failed: {err:#}");
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Load everything and spawn the frame loop. The start control must already be disabled.
    async fn initialize(self: Arc<Self>) -> Result<StartOutcome> {
        let (model, source) = match self.load().await {
            Ok(loaded) => loaded,
            Err(err) => {
                log::error!("Initialization failed: {err:#}");
                self.fail(&err);
                return Err(err);
            }
        };

        let frame_loop = FrameLoop::new(source, model, &self.settings);
        let total_classes = frame_loop.rows().len();
        self.publisher.publish_rows(frame_loop.rows());

        {
            let mut status = self.lock_status();
            status.loading = false;
            status.total_classes = total_classes;
        }

        let session = Arc::clone(&self);
        tokio::spawn(async move {
            if let Err(err) = frame_loop.run(Arc::clone(&session.publisher)).await {
                log::error!("Frame loop stopped: {err:#}");
                session.lock_status().error = Some(format!("Frame loop stopped: {err:#}"));
            }
        });

        log::info!("Classifying frames into {} classes", total_classes);

        Ok(StartOutcome::Running { total_classes })
    }

    /// Load the model, then the webcam, on the blocking pool.
    async fn load(&self) -> Result<(Box<dyn Classifier>, Box<dyn FrameSource>)> {
        let loader = Arc::clone(&self.loader);
        tokio::task::spawn_blocking(move || {
            let model = loader.load_model().context("failed to load model")?;
            let source = loader.setup_webcam().context("failed to set up webcam")?;
            Ok::<_, anyhow::Error>((model, source))
        })
        .await?
    }

    /// Disable the start control, show the loader and hide the overlay.
    ///
    /// Returns `false` if the control was already disabled.
    fn disable_control(&self) -> bool {
        let mut status = self.lock_status();
        if !status.start_enabled {
            return false;
        }

        status.start_enabled = false;
        status.loading = true;
        status.overlay = None;
        status.error = None;

        true
    }

    fn fail(&self, err: &anyhow::Error) {
        let mut status = self.lock_status();
        status.start_enabled = true;
        status.loading = false;
        status.overlay = Some(ERROR_OVERLAY.into());
        status.error = Some(format!("Error details: {err:#}\n\n{ERROR_HINT}"));
    }

    fn lock_status(&self) -> MutexGuard<'_, Status> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
