//! Run configuration: the forest itself plus the driver's criteria,
//! moving feature and cycle settings.

use std::path::Path;
use std::sync::Arc;

use amr_forest::{CriterionSet, ForestConfig, InitialCondition, RefineCriterion, Slope, TreeConfig, ValueThreshold};
use anyhow::{Context, Result};
use glam::DVec3;
use serde::Deserialize;

/// Root of the TOML file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RunConfig {
  pub forest: ForestConfig,
  /// Combined with refine-wins, coarsen-only-if-all.
  pub criteria: Vec<CriterionConfig>,
  pub feature: FeatureConfig,
  pub run: RunSettings,
  pub tree: TreeSettings,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionKind {
  /// Largest interior value.
  #[default]
  Threshold,
  /// Largest jump between adjacent cells.
  Slope,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CriterionConfig {
  #[serde(default)]
  pub kind: CriterionKind,
  #[serde(default)]
  pub field: usize,
  pub refine_above: f64,
  pub coarsen_below: f64,
}

/// Gaussian bump moving at constant velocity; drives field 0.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
  pub center: DVec3,
  pub velocity: DVec3,
  pub radius: f64,
  pub amplitude: f64,
}

impl Default for FeatureConfig {
  fn default() -> Self {
    Self {
      center: DVec3::new(0.3, 0.3, 0.0),
      velocity: DVec3::new(0.5, 0.25, 0.0),
      radius: 0.1,
      amplitude: 1.0,
    }
  }
}

impl FeatureConfig {
  pub fn value(&self, position: DVec3, time: f64) -> f64 {
    let center = self.center + self.velocity * time;
    let r2 = position.distance_squared(center) / (self.radius * self.radius);
    self.amplitude * (-r2).exp()
  }
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct RunSettings {
  pub cycles: u32,
  pub dt: f64,
  /// Run each cycle through the async pipeline.
  pub pipelined: bool,
}

impl Default for RunSettings {
  fn default() -> Self {
    Self {
      cycles: 10,
      dt: 0.05,
      pipelined: false,
    }
  }
}

/// Settings for the standalone tree demo.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct TreeSettings {
  pub config: TreeConfig,
  /// Level-field cells per axis.
  pub cells: usize,
  pub max_level: i32,
}

impl Default for TreeSettings {
  fn default() -> Self {
    Self {
      config: TreeConfig::default(),
      cells: 32,
      max_level: 4,
    }
  }
}

impl RunConfig {
  /// Load configuration from a TOML file.
  pub fn load(path: &Path) -> Result<Self> {
    let content = std::fs::read_to_string(path)
      .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: RunConfig = toml::from_str(&content).with_context(|| "Failed to parse config TOML")?;

    if config.run.dt <= 0.0 {
      anyhow::bail!("run.dt must be positive, got {}", config.run.dt);
    }
    if config.feature.radius <= 0.0 {
      anyhow::bail!("feature.radius must be positive, got {}", config.feature.radius);
    }
    let fields = config.forest.fields.len();
    if let Some(bad) = config.criteria.iter().find(|c| c.field >= fields) {
      anyhow::bail!("criterion field {} out of range ({} fields)", bad.field, fields);
    }

    Ok(config)
  }

  /// Combined refinement criterion; a 0.5 / 0.1 threshold when none are listed.
  pub fn criterion(&self) -> Arc<dyn RefineCriterion> {
    let mut set = CriterionSet::new();
    if self.criteria.is_empty() {
      set = set.with(ValueThreshold {
        field: 0,
        refine_above: 0.5,
        coarsen_below: 0.1,
      });
    }
    for c in &self.criteria {
      match c.kind {
        CriterionKind::Threshold => {
          set = set.with(ValueThreshold {
            field: c.field,
            refine_above: c.refine_above,
            coarsen_below: c.coarsen_below,
          })
        }
        CriterionKind::Slope => {
          set = set.with(Slope {
            field: c.field,
            refine_above: c.refine_above,
            coarsen_below: c.coarsen_below,
          })
        }
      }
    }
    Arc::new(set)
  }

  /// The feature at time zero on field 0, zero elsewhere.
  pub fn initial_condition(&self) -> Arc<dyn InitialCondition> {
    let feature = self.feature;
    Arc::new(move |field: usize, p: DVec3| if field == 0 { feature.value(p, 0.0) } else { 0.0 })
  }
}
