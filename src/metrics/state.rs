/// Translation of device snapshots into Prometheus series
use log::{debug, info};
use prometheus::{GaugeVec, IntCounterVec, Opts, Registry};
use std::collections::HashMap;
use time::OffsetDateTime;

use crate::models::{DeviceSnapshot, LabelSet, SensorKind};
use crate::utils::format_datetime;

const NAMESPACE: &str = "nature_remo";

#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("failed to update {series} for device {device}: {source}")]
    Series {
        series: &'static str,
        device: String,
        #[source]
        source: prometheus::Error,
    },
}

/// Published sensor series plus the memory needed to derive movement events
///
/// The scheduler owns this value and is its only writer. Scrapes read the
/// series through the registry handle returned by [`MetricState::registry`];
/// every series write is atomic on its own.
pub struct MetricState {
    registry: Registry,
    temperature: GaugeVec,
    humidity: GaugeVec,
    illumination: GaugeVec,
    movement: GaugeVec,
    movement_counter: IntCounterVec,
    // device id -> observed_at of the newest movement event already counted
    last_movements: HashMap<String, OffsetDateTime>,
}

impl MetricState {
    /// Create the device series and register them in a fresh registry
    ///
    /// On Linux the process collector (`process_*` series) is registered too.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let temperature = gauge("temperature", "current temperature")?;
        let humidity = gauge("humidity", "current humidity")?;
        let illumination = gauge("illumination", "current illumination")?;
        let movement = gauge("movement", "current movement")?;
        let movement_counter = IntCounterVec::new(
            Opts::new("movement_counter", "number of movement events observed")
                .namespace(NAMESPACE),
            &LabelSet::KEYS,
        )?;

        registry.register(Box::new(temperature.clone()))?;
        registry.register(Box::new(humidity.clone()))?;
        registry.register(Box::new(illumination.clone()))?;
        registry.register(Box::new(movement.clone()))?;
        registry.register(Box::new(movement_counter.clone()))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Self {
            registry,
            temperature,
            humidity,
            illumination,
            movement,
            movement_counter,
            last_movements: HashMap::new(),
        })
    }

    /// Handle for the serving path; clones share the underlying series.
    pub fn registry(&self) -> Registry {
        self.registry.clone()
    }

    /// Apply one device list to the published series
    ///
    /// A sensor kind missing from a snapshot leaves its gauge at the last
    /// published value. The movement counter grows by one whenever the
    /// newest movement event of a device differs from the one seen in the
    /// previous update; the first sighting only records a baseline.
    pub fn update(&mut self, devices: &[DeviceSnapshot]) -> Result<(), UpdateError> {
        for device in devices {
            let labels = device.labels();

            let gauges = [
                (&self.temperature, "temperature", SensorKind::Temperature),
                (&self.humidity, "humidity", SensorKind::Humidity),
                (&self.illumination, "illumination", SensorKind::Illumination),
                (&self.movement, "movement", SensorKind::Movement),
            ];
            for (vec, series, kind) in gauges {
                set_gauge(vec, series, device, kind, &labels)?;
            }

            let Some(movement) = device.reading(SensorKind::Movement) else {
                debug!("Device {} reported no movement event", device.id);
                continue;
            };

            let increment = self.record_movement(&device.id, movement.observed_at);
            if increment > 0 {
                info!(
                    "New movement event for {} at {}",
                    device.name,
                    format_datetime(&movement.observed_at)
                );
            }

            self.movement_counter
                .get_metric_with_label_values(&labels.values())
                .map_err(|source| UpdateError::Series {
                    series: "movement_counter",
                    device: device.id.clone(),
                    source,
                })?
                .inc_by(increment);
        }

        Ok(())
    }

    /// Returns 1 if `observed_at` is a new movement event for `device_id`
    fn record_movement(&mut self, device_id: &str, observed_at: OffsetDateTime) -> u64 {
        match self.last_movements.get_mut(device_id) {
            None => {
                self.last_movements.insert(device_id.to_string(), observed_at);
                0
            }
            Some(last) if *last == observed_at => 0,
            Some(last) => {
                *last = observed_at;
                1
            }
        }
    }
}

fn gauge(name: &str, help: &str) -> Result<GaugeVec, prometheus::Error> {
    GaugeVec::new(Opts::new(name, help).namespace(NAMESPACE), &LabelSet::KEYS)
}

fn set_gauge(
    vec: &GaugeVec,
    series: &'static str,
    device: &DeviceSnapshot,
    kind: SensorKind,
    labels: &LabelSet<'_>,
) -> Result<(), UpdateError> {
    let Some(reading) = device.reading(kind) else {
        return Ok(());
    };

    vec.get_metric_with_label_values(&labels.values())
        .map_err(|source| UpdateError::Series {
            series,
            device: device.id.clone(),
            source,
        })?
        .set(reading.value);
    Ok(())
}

/// Current value of `name` for device `id`, read back through the registry
#[cfg(test)]
pub(crate) fn sample_value(registry: &Registry, name: &str, id: &str) -> Option<f64> {
    registry
        .gather()
        .iter()
        .filter(|family| family.get_name() == name)
        .flat_map(|family| family.get_metric())
        .find(|metric| {
            metric
                .get_label()
                .iter()
                .any(|pair| pair.get_name() == "id" && pair.get_value() == id)
        })
        .map(|metric| {
            if metric.has_counter() {
                metric.get_counter().get_value()
            } else {
                metric.get_gauge().get_value()
            }
        })
}
