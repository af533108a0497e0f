//! Resolving declared names into ids, graph and thresholds.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{Component, ComponentId, ThresholdConfig};
use crate::engine::StaticThresholdProvider;
use crate::graph::{DependencyEdge, DependencyGraph};
use crate::health::{HealthCheck, HealthCheckType};

use super::{parse_duration, Config, ConfigError};

/// The monitored system as resolved at startup.
#[derive(Debug, Clone)]
pub struct Topology {
    /// Declared components, in declaration order.
    pub components: Vec<Component>,
    /// Declared edges, in declaration order.
    pub edges: Vec<DependencyEdge>,
    pub graph: Arc<DependencyGraph>,
    pub thresholds: Arc<StaticThresholdProvider>,
}

impl Topology {
    /// Resolve names, build the graph and attach a threshold to every component.
    pub fn resolve(config: &Config) -> Result<Self, ConfigError> {
        let evaluation = config.evaluation.resolve()?;

        let mut components = Vec::with_capacity(config.components.len());
        let mut by_name: HashMap<&str, ComponentId> = HashMap::new();
        for declared in &config.components {
            let name = declared.name.trim();
            if name.is_empty() {
                return Err(ConfigError::Invalid {
                    field: "components.name",
                    message: "must not be blank".to_string(),
                });
            }
            let component = Component::named(name);
            if by_name.insert(name, component.id).is_some() {
                return Err(ConfigError::DuplicateComponent(name.to_string()));
            }
            components.push(component);
        }

        let lookup = |context: &str, name: &str| {
            by_name
                .get(name.trim())
                .copied()
                .ok_or_else(|| ConfigError::UnknownComponent {
                    context: context.to_string(),
                    name: name.to_string(),
                })
        };

        let mut edges = Vec::with_capacity(config.dependencies.len());
        for dependency in &config.dependencies {
            edges.push(DependencyEdge::new(
                lookup("dependency upstream", &dependency.upstream)?,
                lookup("dependency downstream", &dependency.downstream)?,
            ));
        }

        for name in config.thresholds.keys() {
            lookup("thresholds", name)?;
        }

        let mut thresholds = HashMap::with_capacity(components.len());
        for component in &components {
            let item = config
                .thresholds
                .get(&component.name)
                .or_else(|| {
                    config
                        .thresholds
                        .iter()
                        .find(|(key, _)| key.eq_ignore_ascii_case(&component.name))
                        .map(|(_, item)| item)
                })
                .ok_or_else(|| ConfigError::MissingThreshold(component.name.clone()))?;

            let threshold = ThresholdConfig::new(
                item.critical,
                item.degraded,
                evaluation.window,
                evaluation.recovery_window,
            )
            .map_err(|source| ConfigError::Threshold {
                name: component.name.clone(),
                source,
            })?;
            thresholds.insert(component.id, threshold);
        }

        let graph = DependencyGraph::from(
            components.iter().map(|c| c.id),
            edges.iter().copied(),
        )?;

        Ok(Self {
            components,
            edges,
            graph: Arc::new(graph),
            thresholds: Arc::new(StaticThresholdProvider::new(thresholds)),
        })
    }

    /// Component id by declared name.
    pub fn ids_by_name(&self) -> HashMap<String, ComponentId> {
        self.components
            .iter()
            .map(|c| (c.name.clone(), c.id))
            .collect()
    }

    /// Declared name by component id.
    pub fn names_by_id(&self) -> HashMap<ComponentId, String> {
        self.components
            .iter()
            .map(|c| (c.id, c.name.clone()))
            .collect()
    }

    /// Health checks with parsed durations, validated against this topology.
    pub fn health_checks(&self, config: &Config) -> Result<Vec<HealthCheck>, ConfigError> {
        let known = self.ids_by_name();

        config
            .checks
            .iter()
            .map(|check| {
                if !known.contains_key(check.component.trim()) {
                    return Err(ConfigError::UnknownComponent {
                        context: "checks".to_string(),
                        name: check.component.clone(),
                    });
                }

                let check_type = match check.check_type.trim().to_ascii_lowercase().as_str() {
                    "http" => HealthCheckType::Http,
                    _ => return Err(ConfigError::UnsupportedCheckType(check.check_type.clone())),
                };

                let interval = parse_duration(&check.interval)?;
                if interval.is_zero() {
                    return Err(ConfigError::Invalid {
                        field: "checks.interval",
                        message: format!("must be > 0 for {}", check.component),
                    });
                }

                Ok(HealthCheck {
                    component: check.component.trim().to_string(),
                    check_type,
                    url: check.url.clone(),
                    interval,
                    timeout: parse_duration(&check.timeout)?,
                    failure_threshold: check.failure_threshold.max(1),
                    expected_status: check.expected_status,
                    body_contains: check.body_contains.clone(),
                    content_type_contains: check.content_type_contains.clone(),
                })
            })
            .collect()
    }
}
