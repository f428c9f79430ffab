use super::ConfigurationError;
use serde::Deserialize;
use std::collections::BTreeMap;

const GRID_EPS: f64 = 1e-9;

/// Board-wide routing rules in millimetres.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct DesignRules {
    #[serde(default = "default_grid_resolution")]
    pub grid_resolution: f64,
    #[serde(default = "default_trace_width")]
    pub trace_width: f64,
    #[serde(default = "default_clearance")]
    pub clearance: f64,
    #[serde(default = "default_via_drill")]
    pub via_drill: f64,
    #[serde(default = "default_via_diameter")]
    pub via_diameter: f64,
    #[serde(default)]
    pub net_classes: BTreeMap<String, NetClassRules>,
}

impl Default for DesignRules {
    fn default() -> Self {
        Self {
            grid_resolution: default_grid_resolution(),
            trace_width: default_trace_width(),
            clearance: default_clearance(),
            via_drill: default_via_drill(),
            via_diameter: default_via_diameter(),
            net_classes: BTreeMap::new(),
        }
    }
}

/// Per-class overrides; unset fields fall back to the board rules.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct NetClassRules {
    #[serde(default)]
    pub trace_width: Option<f64>,
    #[serde(default)]
    pub clearance: Option<f64>,
    #[serde(default)]
    pub via_drill: Option<f64>,
    #[serde(default)]
    pub via_diameter: Option<f64>,
}

/// Rules resolved for one net.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NetRules {
    pub trace_width: f64,
    pub clearance: f64,
    pub via_drill: f64,
    pub via_diameter: f64,
}

impl DesignRules {
    pub fn new(grid_resolution: f64, trace_width: f64, clearance: f64) -> Self {
        Self {
            grid_resolution,
            trace_width,
            clearance,
            ..Self::default()
        }
    }

    pub fn with_via(mut self, drill: f64, diameter: f64) -> Self {
        self.via_drill = drill;
        self.via_diameter = diameter;
        self
    }

    pub fn with_class(mut self, name: &str, rules: NetClassRules) -> Self {
        self.net_classes.insert(name.to_string(), rules);
        self
    }

    pub fn for_class(&self, class: Option<&str>) -> NetRules {
        let o = class.and_then(|c| self.net_classes.get(c));
        NetRules {
            trace_width: o.and_then(|o| o.trace_width).unwrap_or(self.trace_width),
            clearance: o.and_then(|o| o.clearance).unwrap_or(self.clearance),
            via_drill: o.and_then(|o| o.via_drill).unwrap_or(self.via_drill),
            via_diameter: o.and_then(|o| o.via_diameter).unwrap_or(self.via_diameter),
        }
    }

    /// Smallest clearance any net class may ask for.
    pub fn min_clearance(&self) -> f64 {
        self.net_classes
            .values()
            .filter_map(|c| c.clearance)
            .fold(self.clearance, f64::min)
    }

    /// Checks value sanity and the grid/clearance relationship.
    ///
    /// A grid coarser than clearance/2 is rejected when `strict`. Otherwise it
    /// is reported with a warning: routing stays clearance-correct but cells
    /// between fine-pitch pads can disappear, so such nets may fail to route.
    pub fn validate(&self, strict: bool) -> Result<(), ConfigurationError> {
        let fields = [
            ("grid_resolution", self.grid_resolution),
            ("trace_width", self.trace_width),
            ("clearance", self.clearance),
            ("via_drill", self.via_drill),
            ("via_diameter", self.via_diameter),
        ];
        for (field, value) in fields {
            if !(value > 0.0) || !value.is_finite() {
                return Err(ConfigurationError::NonPositive {
                    field: field.to_string(),
                    value,
                });
            }
        }
        for (name, class) in &self.net_classes {
            let overrides = [
                ("trace_width", class.trace_width),
                ("clearance", class.clearance),
                ("via_drill", class.via_drill),
                ("via_diameter", class.via_diameter),
            ];
            for (field, value) in overrides {
                if let Some(v) = value
                    && !(v > 0.0)
                {
                    return Err(ConfigurationError::NonPositive {
                        field: format!("net_classes.{}.{}", name, field),
                        value: v,
                    });
                }
            }
        }
        if self.via_diameter <= self.via_drill {
            return Err(ConfigurationError::ViaRing {
                diameter: self.via_diameter,
                drill: self.via_drill,
            });
        }

        let clearance = self.min_clearance();
        let half = clearance / 2.0;
        if self.grid_resolution > half + GRID_EPS {
            if strict {
                if self.grid_resolution > clearance + GRID_EPS {
                    return Err(ConfigurationError::GridTooCoarse {
                        grid: self.grid_resolution,
                        clearance,
                    });
                }
                return Err(ConfigurationError::GridAboveHalfClearance {
                    grid: self.grid_resolution,
                    half,
                });
            }
            log::warn!(
                "Grid resolution {}mm exceeds clearance/2 ({}mm); fine-pitch nets may fail to route",
                self.grid_resolution,
                half
            );
        }
        Ok(())
    }

    /// Copy with the grid reduced to clearance/2 when it is coarser.
    pub fn corrected(&self) -> DesignRules {
        let mut out = self.clone();
        let half = self.min_clearance() / 2.0;
        if out.grid_resolution > half + GRID_EPS {
            log::info!(
                "Reducing grid resolution from {}mm to {}mm",
                out.grid_resolution,
                half
            );
            out.grid_resolution = half;
        }
        out
    }
}

fn default_grid_resolution() -> f64 {
    0.1
}

fn default_trace_width() -> f64 {
    0.2
}

fn default_clearance() -> f64 {
    0.2
}

fn default_via_drill() -> f64 {
    0.3
}

fn default_via_diameter() -> f64 {
    0.6
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults_are_valid() {
        assert!(DesignRules::default().validate(true).is_ok());
    }

    #[rstest]
    #[case(0.1, true, true)]
    #[case(0.15, false, true)]
    #[case(0.15, true, false)]
    #[case(0.25, false, true)]
    #[case(0.25, true, false)]
    fn test_grid_against_clearance(#[case] grid: f64, #[case] strict: bool, #[case] ok: bool) {
        let rules = DesignRules::new(grid, 0.2, 0.2);
        assert_eq!(rules.validate(strict).is_ok(), ok);
    }

    #[test]
    fn test_corrected_halves_clearance() {
        let rules = DesignRules::new(0.25, 0.3, 0.2).corrected();
        assert!((rules.grid_resolution - 0.1).abs() < 1e-12);
        assert!(rules.validate(true).is_ok());
    }

    #[test]
    fn test_class_overrides() {
        let rules = DesignRules::default().with_class(
            "Power",
            NetClassRules {
                trace_width: Some(0.5),
                ..Default::default()
            },
        );
        assert_eq!(rules.for_class(Some("Power")).trace_width, 0.5);
        assert_eq!(rules.for_class(Some("Power")).clearance, 0.2);
        assert_eq!(rules.for_class(None).trace_width, 0.2);
        assert_eq!(rules.for_class(Some("Unknown")).trace_width, 0.2);
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut rules = DesignRules::default();
        rules.clearance = 0.0;
        assert!(matches!(
            rules.validate(false),
            Err(ConfigurationError::NonPositive { .. })
        ));
        let rules = DesignRules::default().with_via(0.6, 0.6);
        assert!(matches!(rules.validate(false), Err(ConfigurationError::ViaRing { .. })));
    }
}
