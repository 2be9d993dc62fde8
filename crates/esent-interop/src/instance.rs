//! Owning wrapper around a native instance.

use std::mem;

use tracing::{debug, info, warn};

use crate::engine::Engine;
use crate::error::{EsentError, EsentResult};
use crate::options::{InstanceOptions, ParameterPlan};
use crate::session::Session;
use crate::types::{JetInstance, JetSesid, TermGrbit};

const OBJECT: &str = "Instance";

/// Created, configured and initialised engine instance.
///
/// Follows the same lifecycle as [`Session`]: `term` shuts the instance down
/// mid-scope, `dispose` (or drop) shuts it down if still running and retires
/// the wrapper.
#[derive(Debug)]
pub struct Instance {
    engine: Engine,
    name: String,
    instance: JetInstance,
    disposed: bool,
}

impl Instance {
    /// Create `name`, apply `options` and initialise it.
    ///
    /// A partially set-up instance is terminated before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns the engine's error from create, parameter or init calls.
    pub fn new(engine: &Engine, name: &str, options: &InstanceOptions) -> EsentResult<Self> {
        let plan = ParameterPlan::from_options(options);
        for warning in &plan.warnings {
            warn!(instance = name, %warning, "instance option adjusted");
        }

        let instance = engine.call("JetCreateInstance", |api| api.create_instance(name))?;
        let wrapper = Self {
            engine: engine.clone(),
            name: name.to_string(),
            instance,
            disposed: false,
        };

        for parameter in &plan.parameters {
            engine.call("JetSetSystemParameter", |api| {
                api.set_system_parameter(
                    instance,
                    JetSesid::NIL,
                    parameter.param,
                    parameter.int_value,
                    parameter.string_value.as_deref(),
                )
            })?;
        }
        engine.call("JetInit", |api| api.init(instance))?;
        info!(instance = name, handle = %instance, "instance initialised");
        Ok(wrapper)
    }

    /// Instance name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The held handle; [`JetInstance::NIL`] once terminated.
    ///
    /// # Errors
    ///
    /// Returns [`EsentError::ObjectDisposed`] after [`Instance::dispose`].
    pub fn jet_instance(&self) -> EsentResult<JetInstance> {
        if self.disposed {
            return Err(EsentError::ObjectDisposed { object: OBJECT });
        }
        Ok(self.instance)
    }

    /// Engine the instance runs on.
    #[must_use]
    pub const fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Begin a session on this instance.
    ///
    /// # Errors
    ///
    /// Returns [`EsentError::ObjectDisposed`], [`EsentError::NoActiveHandle`]
    /// or the engine's error.
    pub fn begin_session(&self) -> EsentResult<Session> {
        let instance = self.jet_instance()?;
        if instance.is_nil() {
            return Err(EsentError::NoActiveHandle { object: OBJECT });
        }
        Session::new(&self.engine, instance)
    }

    /// Shut the instance down with default options.
    ///
    /// # Errors
    ///
    /// See [`Instance::term_with`].
    pub fn term(&mut self) -> EsentResult<()> {
        self.term_with(TermGrbit::DEFAULT)
    }

    /// Shut the instance down. The handle is cleared even if the engine fails.
    ///
    /// # Errors
    ///
    /// Returns [`EsentError::ObjectDisposed`] after [`Instance::dispose`],
    /// [`EsentError::NoActiveHandle`] when already terminated, or the engine's
    /// error.
    pub fn term_with(&mut self, grbit: TermGrbit) -> EsentResult<()> {
        if self.disposed {
            return Err(EsentError::ObjectDisposed { object: OBJECT });
        }
        if self.instance.is_nil() {
            return Err(EsentError::NoActiveHandle { object: OBJECT });
        }
        self.release(grbit)
    }

    /// Shut the instance down if still running and retire the wrapper.
    ///
    /// # Errors
    ///
    /// Returns the engine's error from `JetTerm`; the wrapper is disposed regardless.
    pub fn dispose(&mut self) -> EsentResult<()> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;
        if self.instance.is_nil() {
            return Ok(());
        }
        self.release(TermGrbit::DEFAULT)
    }

    fn release(&mut self, grbit: TermGrbit) -> EsentResult<()> {
        let instance = mem::replace(&mut self.instance, JetInstance::NIL);
        let result = self
            .engine
            .call("JetTerm", |api| api.term(instance, grbit));
        debug!(instance = %self.name, ok = result.is_ok(), "instance terminated");
        result
    }
}

impl TryFrom<&Instance> for JetInstance {
    type Error = EsentError;

    fn try_from(instance: &Instance) -> EsentResult<Self> {
        instance.jet_instance()
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        if let Err(err) = self.dispose() {
            warn!(instance = %self.name, error = %err, "failed to terminate instance during drop");
        }
    }
}
