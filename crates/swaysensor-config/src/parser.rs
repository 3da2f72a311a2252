//! KDL configuration parser

use std::path::Path;

use crate::error::ConfigError;
use crate::model::*;

/// Location of the configuration file when none is given on the command line
pub const DEFAULT_CONFIG_PATH: &str = "~/.config/swaysensor/config.kdl";

/// Parse a configuration file from the given path
pub fn parse_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Parse configuration from a string
pub fn parse_config_str(content: &str) -> Result<Config, ConfigError> {
    let doc: kdl::KdlDocument = content.parse().map_err(|e: kdl::KdlError| {
        // kdl carries its own miette version, so rebuild the span by hand
        let offset = e.span.offset();
        let len = e.span.len();
        let span = miette::SourceSpan::from((offset, len));
        ConfigError::ParseError {
            src: content.to_string(),
            span,
            source: e,
        }
    })?;

    let mut config = Config::default();

    for node in doc.nodes() {
        match node.name().value() {
            "global" => {
                config.global = parse_global(node)?;
            }
            "sensors" => {
                config.sensors = parse_sensors(node)?;
            }
            "light" => {
                config.light = parse_light(node)?;
            }
            name => {
                tracing::warn!("Unknown top-level node: {}", name);
            }
        }
    }

    Ok(config)
}

fn parse_global(node: &kdl::KdlNode) -> Result<GlobalConfig, ConfigError> {
    let mut global = GlobalConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "log-level" => {
                    if let Some(entry) = child.entries().first() {
                        if let Some(val) = entry.value().as_string() {
                            global.log_level = val
                                .parse()
                                .map_err(|e| ConfigError::Invalid { message: e })?;
                        }
                    }
                }
                name => {
                    tracing::warn!("Unknown global config option: {}", name);
                }
            }
        }
    }

    Ok(global)
}

fn parse_sensors(node: &kdl::KdlNode) -> Result<SensorSelection, ConfigError> {
    let mut sensors = SensorSelection::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            let name = child.name().value();
            let slot = match name {
                "accelerometer" => &mut sensors.accelerometer,
                "light" => &mut sensors.light,
                "proximity" => &mut sensors.proximity,
                other => {
                    tracing::warn!("Unknown sensor: {}", other);
                    continue;
                }
            };

            // A bare `light` node means enabled
            *slot = match child.entries().first() {
                None => true,
                Some(entry) => entry.value().as_bool().ok_or_else(|| ConfigError::Invalid {
                    message: format!("sensor `{}` expects a boolean, got {}", name, entry.value()),
                })?,
            };
        }
    }

    Ok(sensors)
}

fn parse_light(node: &kdl::KdlNode) -> Result<LightCalibration, ConfigError> {
    let mut light = LightCalibration::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "vendor-max" => light.vendor_max = parse_reference_max(child)?,
                "lux-max" => light.lux_max = parse_reference_max(child)?,
                name => {
                    tracing::warn!("Unknown light config option: {}", name);
                }
            }
        }
    }

    Ok(light)
}

/// Read a strictly positive number from the first entry of a node
fn parse_reference_max(node: &kdl::KdlNode) -> Result<f64, ConfigError> {
    let name = node.name().value();
    let value = node
        .entries()
        .first()
        .map(|entry| entry.value())
        .ok_or_else(|| ConfigError::Invalid {
            message: format!("`{}` requires a value", name),
        })?;

    let number = value
        .as_i64()
        .map(|n| n as f64)
        .or_else(|| value.as_f64())
        .ok_or_else(|| ConfigError::Invalid {
            message: format!("`{}` expects a number, got {}", name, value),
        })?;

    if !number.is_finite() || number <= 0.0 {
        return Err(ConfigError::Invalid {
            message: format!("`{}` must be greater than zero, got {}", name, number),
        });
    }

    Ok(number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = r#"
            global {
                log-level "debug"
            }

            sensors {
                accelerometer true
                light true
                proximity false
            }

            light {
                vendor-max 255
                lux-max 800.5
            }
        "#;

        let result = parse_config_str(config).unwrap();
        assert_eq!(result.global.log_level, LogLevel::Debug);
        assert!(result.sensors.accelerometer);
        assert!(result.sensors.light);
        assert!(!result.sensors.proximity);
        assert_eq!(result.light.vendor_max, 255.0);
        assert_eq!(result.light.lux_max, 800.5);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let result = parse_config_str("").unwrap();
        assert_eq!(result, Config::default());
        assert!(!result.sensors.any());
        assert_eq!(result.light.vendor_max, 100.0);
        assert_eq!(result.light.lux_max, 1200.0);
    }

    #[test]
    fn test_bare_sensor_node_enables_sensor() {
        let config = r#"
            sensors {
                proximity
            }
        "#;

        let result = parse_config_str(config).unwrap();
        assert!(result.sensors.proximity);
        assert!(result.sensors.needs_display());
        assert!(!result.sensors.light);
    }

    #[test]
    fn test_non_boolean_sensor_rejected() {
        let config = r#"
            sensors {
                light "yes"
            }
        "#;

        let err = parse_config_str(config).unwrap_err();
        match err {
            ConfigError::Invalid { message } => {
                assert!(message.contains("light"), "unexpected message: {}", message);
            }
            other => panic!("Expected Invalid error, got: {:?}", other),
        }
    }

    #[test]
    fn test_zero_reference_max_rejected() {
        let config = r#"
            light {
                lux-max 0
            }
        "#;

        let err = parse_config_str(config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let config = r#"
            global {
                log-level "loud"
            }
        "#;

        let err = parse_config_str(config).unwrap_err();
        match err {
            ConfigError::Invalid { message } => assert!(message.contains("loud")),
            other => panic!("Expected Invalid error, got: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_nodes_are_ignored() {
        let config = r#"
            compass {
                enabled true
            }
            sensors {
                light true
                gyroscope true
            }
        "#;

        let result = parse_config_str(config).unwrap();
        assert!(result.sensors.light);
        assert!(!result.sensors.accelerometer);
    }

    #[test]
    fn test_invalid_kdl_reports_parse_error() {
        let err = parse_config_str("sensors {").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_parse_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.kdl");
        std::fs::write(&path, "sensors {\n    accelerometer true\n}\n").unwrap();

        let result = parse_config(&path).unwrap();
        assert!(result.sensors.accelerometer);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = parse_config(Path::new("/nonexistent/swaysensor/config.kdl")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_selection_merge() {
        let mut base = SensorSelection {
            light: true,
            ..Default::default()
        };
        base.merge(SensorSelection {
            proximity: true,
            ..Default::default()
        });
        assert!(base.light);
        assert!(base.proximity);
        assert!(!base.accelerometer);
    }
}
