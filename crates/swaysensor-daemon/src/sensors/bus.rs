//! iio-sensor-proxy adapter
//!
//! Claims sensors on `net.hadess.SensorProxy` over the system bus and turns
//! its `org.freedesktop.DBus.Properties.PropertiesChanged` signals into
//! [`PropertyBatch`]es for the dispatcher.

use std::collections::HashMap;
use std::fmt;

use futures::stream::{BoxStream, StreamExt};
use swaysensor_config::SensorSelection;
use thiserror::Error;
use tracing::{debug, info, warn};
use zbus::fdo::{PropertiesChanged, PropertiesProxy};
use zbus::zvariant::Value;
use zbus::Connection;

use super::{PropertyBatch, SensorValue};

const SENSOR_PROXY_SERVICE: &str = "net.hadess.SensorProxy";
const SENSOR_PROXY_PATH: &str = "/net/hadess/SensorProxy";

#[zbus::proxy(
    interface = "net.hadess.SensorProxy",
    default_service = "net.hadess.SensorProxy",
    default_path = "/net/hadess/SensorProxy",
    gen_blocking = false
)]
trait IioSensors {
    fn claim_accelerometer(&self) -> zbus::Result<()>;
    fn release_accelerometer(&self) -> zbus::Result<()>;
    fn claim_light(&self) -> zbus::Result<()>;
    fn release_light(&self) -> zbus::Result<()>;
    fn claim_proximity(&self) -> zbus::Result<()>;
    fn release_proximity(&self) -> zbus::Result<()>;

    #[zbus(property)]
    fn accelerometer_orientation(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn light_level_unit(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn light_level(&self) -> zbus::Result<f64>;

    #[zbus(property)]
    fn proximity_near(&self) -> zbus::Result<bool>;
}

/// Errors from the sensor bus
#[derive(Debug, Error)]
pub enum BusError {
    #[error("Failed to connect to the system bus: {0}")]
    Connect(#[source] zbus::Error),

    #[error("Failed to reach net.hadess.SensorProxy: {0}")]
    Proxy(#[source] zbus::Error),

    #[error("No sensor could be claimed from net.hadess.SensorProxy")]
    NothingClaimed,

    #[error("Failed to subscribe to sensor changes: {0}")]
    Subscribe(#[source] zbus::Error),
}

/// A sensor that can be claimed from the proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensor {
    Accelerometer,
    Light,
    Proximity,
}

impl Sensor {
    /// Sensors enabled in `selection`, in claim order
    pub fn selected(selection: SensorSelection) -> Vec<Sensor> {
        [
            (selection.accelerometer, Self::Accelerometer),
            (selection.light, Self::Light),
            (selection.proximity, Self::Proximity),
        ]
        .into_iter()
        .filter_map(|(enabled, sensor)| enabled.then_some(sensor))
        .collect()
    }

    async fn claim(self, proxy: &IioSensorsProxy<'_>) -> zbus::Result<()> {
        match self {
            Self::Accelerometer => proxy.claim_accelerometer().await,
            Self::Light => proxy.claim_light().await,
            Self::Proximity => proxy.claim_proximity().await,
        }
    }

    async fn release(self, proxy: &IioSensorsProxy<'_>) -> zbus::Result<()> {
        match self {
            Self::Accelerometer => proxy.release_accelerometer().await,
            Self::Light => proxy.release_light().await,
            Self::Proximity => proxy.release_proximity().await,
        }
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Accelerometer => "accelerometer",
            Self::Light => "light",
            Self::Proximity => "proximity",
        })
    }
}

/// Claimed sensors on the system bus
pub struct SensorBus {
    connection: Connection,
    proxy: IioSensorsProxy<'static>,
    claimed: Vec<Sensor>,
}

impl SensorBus {
    /// Connect to the system bus and claim every selected sensor
    ///
    /// A sensor that cannot be claimed is logged and left out.
    ///
    /// # Errors
    ///
    /// Returns `BusError::NothingClaimed` if no sensor could be claimed.
    pub async fn connect(selection: SensorSelection) -> Result<Self, BusError> {
        let connection = Connection::system().await.map_err(BusError::Connect)?;
        let proxy = IioSensorsProxy::new(&connection)
            .await
            .map_err(BusError::Proxy)?;

        let mut claimed = Vec::new();
        for sensor in Sensor::selected(selection) {
            match sensor.claim(&proxy).await {
                Ok(()) => {
                    info!(%sensor, "Claimed sensor");
                    claimed.push(sensor);
                }
                Err(e) => warn!(%sensor, error = %e, "Could not claim sensor"),
            }
        }

        if claimed.is_empty() {
            return Err(BusError::NothingClaimed);
        }

        Ok(Self {
            connection,
            proxy,
            claimed,
        })
    }

    /// Sensors that were successfully claimed
    pub fn claimed(&self) -> SensorSelection {
        SensorSelection {
            accelerometer: self.claimed.contains(&Sensor::Accelerometer),
            light: self.claimed.contains(&Sensor::Light),
            proximity: self.claimed.contains(&Sensor::Proximity),
        }
    }

    /// Current values of the claimed sensors, light unit before light level
    ///
    /// Properties that cannot be read are logged and left out.
    pub async fn snapshot(&self) -> PropertyBatch {
        let mut batch = PropertyBatch::new();

        for sensor in &self.claimed {
            match sensor {
                Sensor::Light => {
                    push(&mut batch, "LightLevelUnit", self.proxy.light_level_unit().await);
                    push(&mut batch, "LightLevel", self.proxy.light_level().await);
                }
                Sensor::Accelerometer => push(
                    &mut batch,
                    "AccelerometerOrientation",
                    self.proxy.accelerometer_orientation().await,
                ),
                Sensor::Proximity => {
                    push(&mut batch, "ProximityNear", self.proxy.proximity_near().await)
                }
            }
        }

        batch
    }

    /// Stream of property-changed batches from the proxy
    pub async fn changes(&self) -> Result<BoxStream<'static, PropertyBatch>, BusError> {
        let properties = PropertiesProxy::builder(&self.connection)
            .destination(SENSOR_PROXY_SERVICE)
            .map_err(BusError::Subscribe)?
            .path(SENSOR_PROXY_PATH)
            .map_err(BusError::Subscribe)?
            .build()
            .await
            .map_err(BusError::Subscribe)?;

        let signals = properties
            .receive_properties_changed()
            .await
            .map_err(|e| BusError::Subscribe(e.into()))?;

        Ok(signals
            .filter_map(|signal| futures::future::ready(batch_from_signal(&signal)))
            .boxed())
    }

    /// Release every claimed sensor
    ///
    /// Failures are logged; this runs on the way out and should release as
    /// much as it can.
    pub async fn release(self) {
        for sensor in self.claimed {
            match sensor.release(&self.proxy).await {
                Ok(()) => debug!(%sensor, "Released sensor"),
                Err(e) => warn!(%sensor, error = %e, "Could not release sensor"),
            }
        }
    }
}

fn push<T: Into<SensorValue>>(batch: &mut PropertyBatch, key: &str, value: zbus::Result<T>) {
    match value {
        Ok(value) => batch.push((key.to_string(), value.into())),
        Err(e) => warn!(property = key, error = %e, "Could not read sensor property"),
    }
}

fn batch_from_signal(signal: &PropertiesChanged) -> Option<PropertyBatch> {
    let args = match signal.args() {
        Ok(args) => args,
        Err(e) => {
            warn!(error = %e, "Malformed PropertiesChanged signal");
            return None;
        }
    };

    if args.interface_name().as_str() != SENSOR_PROXY_SERVICE {
        return None;
    }

    Some(batch_from_properties(args.changed_properties()))
}

/// Convert changed properties into a batch, dropping unsupported value types
fn batch_from_properties(changed: &HashMap<&str, Value<'_>>) -> PropertyBatch {
    changed
        .iter()
        .filter_map(|(key, value)| match sensor_value(value) {
            Some(value) => Some((key.to_string(), value)),
            None => {
                debug!(property = *key, "Skipping property with unsupported value type");
                None
            }
        })
        .collect()
}

fn sensor_value(value: &Value<'_>) -> Option<SensorValue> {
    match value {
        Value::Str(s) => Some(SensorValue::Str(s.as_str().to_string())),
        Value::F64(f) => Some(SensorValue::Double(*f)),
        Value::Bool(b) => Some(SensorValue::Bool(*b)),
        Value::Value(inner) => sensor_value(inner),
        _ => None,
    }
}
