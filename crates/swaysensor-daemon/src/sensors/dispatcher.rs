//! Routing of property-changed batches to translators

use swaysensor_config::SensorSelection;
use tracing::{debug, error, trace, warn};

use super::translate::{self, TranslateError};
use super::{AccelerometerProperty, Category, LightProperty, SensorProperty, SensorValue, Session};
use crate::ipc::{Command, Connector, IpcClient, UnixConnector};

/// What happened to one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Commands the compositor accepted
    pub sent: usize,
    /// Events whose translation or delivery failed
    pub failed: usize,
    /// Events that needed no command
    pub skipped: usize,
}

/// Classifies sensor events and forwards the resulting commands
pub struct SensorDispatcher<C: Connector = UnixConnector> {
    session: Session,
    client: IpcClient<C>,
    enabled: SensorSelection,
}

impl<C: Connector> SensorDispatcher<C> {
    pub fn new(session: Session, client: IpcClient<C>, enabled: SensorSelection) -> Self {
        Self {
            session,
            client,
            enabled,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Give back the client, e.g. to close it on shutdown
    pub fn into_client(self) -> IpcClient<C> {
        self.client
    }

    /// Handle one property-changed batch
    ///
    /// Entries are handled in order and independently: a failing entry is
    /// logged and never stops the rest of the batch.
    pub async fn dispatch<I, K>(&self, events: I) -> DispatchReport
    where
        I: IntoIterator<Item = (K, SensorValue)>,
        K: AsRef<str>,
    {
        let mut report = DispatchReport::default();

        for (key, value) in events {
            let key = key.as_ref();

            let Some(property) = SensorProperty::classify(key) else {
                warn!(property = key, "Unmatched sensor property");
                report.skipped += 1;
                continue;
            };

            let category = property.category();
            if !self.is_enabled(category) {
                trace!(property = key, %category, "Sensor not enabled, ignoring");
                report.skipped += 1;
                continue;
            }

            match self.translate(property, key, &value) {
                Ok(Some(command)) => {
                    if self.send(category, &command).await {
                        report.sent += 1;
                    } else {
                        report.failed += 1;
                    }
                }
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    warn!(
                        property = key,
                        %category,
                        operation = "translate",
                        error = %e,
                        "Could not build command"
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }

    fn is_enabled(&self, category: Category) -> bool {
        match category {
            Category::Accelerometer => self.enabled.accelerometer,
            Category::Light => self.enabled.light,
            Category::Proximity => self.enabled.proximity,
            Category::Compass | Category::Availability => true,
        }
    }

    fn translate(
        &self,
        property: SensorProperty,
        key: &str,
        value: &SensorValue,
    ) -> Result<Option<Command>, TranslateError> {
        let session = &self.session;

        match (property, value) {
            (
                SensorProperty::Accelerometer(AccelerometerProperty::Orientation),
                SensorValue::Str(s),
            ) => translate::orientation(session, s),
            (SensorProperty::Accelerometer(AccelerometerProperty::Tilt), SensorValue::Str(s)) => {
                translate::tilt(session, s)
            }
            (SensorProperty::Light(LightProperty::Unit), SensorValue::Str(s)) => {
                translate::light_unit(session, s)
            }
            (SensorProperty::Light(LightProperty::Level), SensorValue::Double(level)) => {
                translate::light_level(session, *level)
            }
            (SensorProperty::Proximity, SensorValue::Bool(near)) => {
                translate::proximity(session, *near)
            }
            (SensorProperty::Compass, _) => {
                debug!(property = key, "No compass handler");
                Ok(None)
            }
            // The proxy stops sending updates for missing sensors on its own
            (SensorProperty::Availability, _) => Ok(None),
            (property, value) => Err(TranslateError::UnexpectedValue {
                key: key.to_string(),
                expected: expected_type(property),
                actual: value.type_name(),
            }),
        }
    }

    async fn send(&self, category: Category, command: &Command) -> bool {
        match self.client.run_command(command).await {
            Ok(()) => {
                debug!(%category, %command, "Command accepted");
                true
            }
            Err(e) => {
                error!(
                    %category,
                    %command,
                    operation = "run_command",
                    error = %e,
                    "Command failed"
                );
                false
            }
        }
    }
}

fn expected_type(property: SensorProperty) -> &'static str {
    match property {
        SensorProperty::Accelerometer(_) | SensorProperty::Light(LightProperty::Unit) => "string",
        SensorProperty::Light(LightProperty::Level) => "double",
        SensorProperty::Proximity => "boolean",
        SensorProperty::Compass | SensorProperty::Availability => "any value",
    }
}
