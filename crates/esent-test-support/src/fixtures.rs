//! Test fixtures and environment helpers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use esent_interop::{Engine, Instance, InstanceOptions, JetInstance, Session, StubEngine};
use tempfile::{Builder, TempDir};
use uuid::Uuid;

/// Create a uniquely named scratch directory, removed when dropped.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn create_random_directory() -> Result<TempDir> {
    Builder::new()
        .prefix("esent-test-")
        .tempdir()
        .context("failed to create test directory")
}

/// Options for throwaway instances: every file under `directory`, no recovery.
#[must_use]
pub fn test_instance_options(directory: &Path) -> InstanceOptions {
    InstanceOptions {
        recovery: false,
        no_information_event: true,
        ..InstanceOptions::in_directory(directory)
    }
}

/// Initialised stub-engine instance living in its own scratch directory.
#[derive(Debug)]
pub struct TestInstance {
    stub: Arc<StubEngine>,
    engine: Engine,
    instance: Instance,
    directory: TempDir,
}

impl TestInstance {
    /// Start a fresh instance on a fresh [`StubEngine`].
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or the instance cannot be set up.
    pub fn new() -> Result<Self> {
        let stub = Arc::new(StubEngine::new());
        let engine = Engine::new(stub.clone());
        Self::start(stub, engine)
    }

    /// Start a fresh instance on a fresh [`StubEngine`] whose calls are
    /// reported through `engine_with`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or the instance cannot be set up.
    pub fn with_engine(engine_with: impl FnOnce(Engine) -> Engine) -> Result<Self> {
        let stub = Arc::new(StubEngine::new());
        let engine = engine_with(Engine::new(stub.clone()));
        Self::start(stub, engine)
    }

    fn start(stub: Arc<StubEngine>, engine: Engine) -> Result<Self> {
        let directory = create_random_directory()?;
        let name = format!("test-{}", Uuid::new_v4().simple());
        let instance = Instance::new(&engine, &name, &test_instance_options(directory.path()))
            .context("failed to start test instance")?;
        Ok(Self {
            stub,
            engine,
            instance,
            directory,
        })
    }

    /// Backend, for inspecting engine-side state.
    #[must_use]
    pub fn stub(&self) -> &StubEngine {
        &self.stub
    }

    /// Engine handle passed to wrappers.
    #[must_use]
    pub const fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Instance wrapper.
    #[must_use]
    pub const fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Raw instance handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the instance was disposed.
    pub fn jet_instance(&self) -> Result<JetInstance> {
        Ok(self.instance.jet_instance()?)
    }

    /// Begin a session on the instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine refuses the session.
    pub fn begin_session(&self) -> Result<Session> {
        Ok(self.instance.begin_session()?)
    }

    /// Scratch directory owned by the instance.
    #[must_use]
    pub const fn directory(&self) -> &TempDir {
        &self.directory
    }

    /// Register a database file in the scratch directory and return its path.
    #[must_use]
    pub fn attach_database(&self, name: &str) -> PathBuf {
        let path = self.directory.path().join(name);
        self.stub.attach_database_file(path.clone());
        path
    }
}
