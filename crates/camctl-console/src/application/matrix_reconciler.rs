//! MatrixReconciler: drives the video matrix towards a desired mapping.
//!
//! Every operation (single switch, macro, reset) is expressed as a desired
//! [`MatrixMapping`] and goes through [`MatrixReconciler::apply`]:
//!
//! 1. Read the device's current mapping.
//! 2. Plan only the switches whose outputs are not already in place.  When
//!    the read failed, plan every desired pair.
//! 3. Send the planned switches, one request each.  A failed switch is
//!    reported and the rest still go out.
//! 4. Publish the resulting mapping.  When every planned switch went through,
//!    fire the configured rules against it.
//!
//! # Architecture
//!
//! The reconciler depends only on the [`MatrixClient`] trait.  The HTTP
//! implementation lives in [`crate::infrastructure::network::matrix_http`];
//! tests use a mock.  It runs in its own task fed by an intent channel so
//! the mapping-read round trip never stalls camera control.

use std::sync::Arc;

use async_trait::async_trait;
use camctl_core::matrix::{fire_rules, plan_switches, MatrixRule, RuleAction};
use camctl_core::{MatrixError, MatrixMapping, Port, SwitchCommand};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::application::intent::MatrixIntent;
use crate::application::status::StatusReporter;

/// Request/response access to the matrix device.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MatrixClient: Send + Sync {
    /// Reads the full cross-point mapping.
    async fn read_mapping(&self) -> Result<MatrixMapping, MatrixError>;

    /// Sends one switch command.
    async fn switch(&self, command: &SwitchCommand) -> Result<(), MatrixError>;
}

/// A named matrix port from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedPort {
    pub name: String,
    pub port: Port,
}

/// A named set of routes applied together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixMacro {
    pub name: String,
    pub routes: MatrixMapping,
}

/// Validated matrix configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatrixSettings {
    pub inputs: Vec<NamedPort>,
    pub outputs: Vec<NamedPort>,
    pub macros: Vec<MatrixMacro>,
    /// Macro applied by [`MatrixReconciler::reset`].
    pub reset_macro: Option<String>,
    pub rules: Vec<MatrixRule>,
}

impl MatrixSettings {
    pub fn find_macro(&self, name: &str) -> Option<&MatrixMacro> {
        self.macros.iter().find(|m| m.name == name)
    }
}

/// Published to the rest of the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatrixEvent {
    /// The best known mapping after a read or a change.
    MappingUpdated(MatrixMapping),
    /// Rule actions to apply to the scene-name overrides, in order.
    RulesFired(Vec<RuleAction>),
    /// The device could not be read.  Published once per run.
    ConnectionFailed,
}

/// Outcome of one [`MatrixReconciler::apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Switches that the device accepted.
    pub issued: Vec<SwitchCommand>,
    /// Resulting mapping: the current one (or empty, if unreadable) with the
    /// accepted switches applied.
    pub mapping: MatrixMapping,
    /// Rule actions fired against `mapping`.
    pub actions: Vec<RuleAction>,
}

/// Matrix use case owning the client and the configured macros and rules.
pub struct MatrixReconciler {
    client: Arc<dyn MatrixClient>,
    settings: MatrixSettings,
    status: StatusReporter,
    events: mpsc::UnboundedSender<MatrixEvent>,
    connection_failed_reported: bool,
}

impl MatrixReconciler {
    pub fn new(
        client: Arc<dyn MatrixClient>,
        settings: MatrixSettings,
        status: StatusReporter,
        events: mpsc::UnboundedSender<MatrixEvent>,
    ) -> Self {
        Self {
            client,
            settings,
            status,
            events,
            connection_failed_reported: false,
        }
    }

    pub fn settings(&self) -> &MatrixSettings {
        &self.settings
    }

    /// Processes intents until the sender side closes.
    pub async fn run(mut self, mut intents: mpsc::Receiver<MatrixIntent>) {
        info!("matrix reconciler started");
        while let Some(intent) = intents.recv().await {
            self.handle(intent).await;
        }
        info!("matrix reconciler stopped");
    }

    /// Handles one intent.  Failures are reported through the status channel.
    pub async fn handle(&mut self, intent: MatrixIntent) {
        debug!(?intent, "matrix intent");
        // Errors have already been reported as status messages.
        let _ = match intent {
            MatrixIntent::Switch {
                input_index,
                output_index,
            } => self.switch_channel(input_index, output_index).await,
            MatrixIntent::Macro(name) => self.exec_macro(&name).await,
            MatrixIntent::Reset => self.reset().await,
            MatrixIntent::Refresh => self.refresh().await,
        };
    }

    /// Routes configured input `input_index` to configured output `output_index`.
    ///
    /// # Errors
    ///
    /// [`MatrixError::ChannelOutOfRange`] if either index is not configured.
    /// Nothing is sent in that case.
    pub async fn switch_channel(
        &mut self,
        input_index: usize,
        output_index: usize,
    ) -> Result<ReconcileReport, MatrixError> {
        let ports = self
            .settings
            .inputs
            .get(input_index)
            .zip(self.settings.outputs.get(output_index))
            .map(|(input, output)| (input.port, output.port));
        let Some((input, output)) = ports else {
            return Err(self.report(MatrixError::ChannelOutOfRange));
        };
        let desired = MatrixMapping::from_routes([(input, [output])]);
        Ok(self.apply(&desired).await)
    }

    /// Applies the macro called `name`.
    ///
    /// # Errors
    ///
    /// [`MatrixError::UnknownMacro`] if no macro has that name.
    pub async fn exec_macro(&mut self, name: &str) -> Result<ReconcileReport, MatrixError> {
        let Some(routes) = self.settings.find_macro(name).map(|m| m.routes.clone()) else {
            return Err(self.report(MatrixError::UnknownMacro(name.to_string())));
        };
        info!(name, "executing matrix macro");
        Ok(self.apply(&routes).await)
    }

    /// Applies the configured reset macro.  Without one, nothing happens.
    pub async fn reset(&mut self) -> Result<ReconcileReport, MatrixError> {
        match self.settings.reset_macro.clone() {
            Some(name) => self.exec_macro(&name).await,
            None => {
                debug!("no reset macro configured");
                Ok(ReconcileReport::default())
            }
        }
    }

    /// Reads the mapping and publishes it.  Nothing changes on the device, so
    /// no rule fires.
    ///
    /// # Errors
    ///
    /// Propagates the read failure after reporting it.
    pub async fn refresh(&mut self) -> Result<ReconcileReport, MatrixError> {
        let mapping = self.read_current().await?;
        self.publish(MatrixEvent::MappingUpdated(mapping.clone()));
        Ok(ReconcileReport {
            issued: Vec::new(),
            mapping,
            actions: Vec::new(),
        })
    }

    /// Moves the device towards `desired`, sending only the switches needed.
    ///
    /// Rules fire only when the change completed: every planned switch went
    /// through and the resulting mapping is known, either from the read or
    /// from the switches themselves.
    pub async fn apply(&mut self, desired: &MatrixMapping) -> ReconcileReport {
        let current = self.read_current().await.ok();

        let plan = plan_switches(current.as_ref(), desired);
        debug!(switches = plan.len(), "matrix plan");

        let planned = plan.len();
        let mut issued = Vec::with_capacity(planned);
        for command in plan {
            match self.client.switch(&command).await {
                Ok(()) => {
                    self.status.info("Matrix request successful");
                    issued.push(command);
                }
                Err(e) => {
                    warn!(command = %command.command_string(), "matrix switch failed: {e}");
                    self.status.error(e.to_string());
                }
            }
        }

        let read_ok = current.is_some();
        let mut mapping = current.unwrap_or_else(MatrixMapping::new);
        mapping.apply(&issued);
        if read_ok || !issued.is_empty() {
            self.publish(MatrixEvent::MappingUpdated(mapping.clone()));
        }

        let completed = issued.len() == planned && (read_ok || !issued.is_empty());
        let actions = if completed {
            self.fire(&mapping)
        } else {
            debug!(planned, issued = issued.len(), "matrix change incomplete; rules not fired");
            Vec::new()
        };
        ReconcileReport {
            issued,
            mapping,
            actions,
        }
    }

    /// Reads the device mapping.  A success re-arms the connection failure
    /// event for the next outage.
    async fn read_current(&mut self) -> Result<MatrixMapping, MatrixError> {
        match self.client.read_mapping().await {
            Ok(mapping) => {
                self.connection_failed_reported = false;
                Ok(mapping)
            }
            Err(e) => {
                self.on_read_failed(&e);
                Err(e)
            }
        }
    }

    fn fire(&self, mapping: &MatrixMapping) -> Vec<RuleAction> {
        let actions = fire_rules(&self.settings.rules, mapping);
        if !actions.is_empty() {
            debug!(count = actions.len(), "matrix rules fired");
            self.publish(MatrixEvent::RulesFired(actions.clone()));
        }
        actions
    }

    fn on_read_failed(&mut self, error: &MatrixError) {
        warn!("matrix read failed: {error}");
        self.status.error(error.to_string());
        if !self.connection_failed_reported {
            self.connection_failed_reported = true;
            self.publish(MatrixEvent::ConnectionFailed);
        }
    }

    fn report(&self, error: MatrixError) -> MatrixError {
        self.status.error(error.to_string());
        error
    }

    fn publish(&self, event: MatrixEvent) {
        // The receiver only goes away during shutdown.
        let _ = self.events.send(event);
    }
}
