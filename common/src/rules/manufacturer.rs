use super::{ConfigurationError, DesignRules};

/// Minimum capabilities of a fab house, in millimetres.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ManufacturerProfile {
    pub name: &'static str,
    pub min_trace_width: f64,
    pub min_clearance: f64,
    pub min_via_drill: f64,
    pub min_via_diameter: f64,
}

const PROFILES: [ManufacturerProfile; 4] = [
    ManufacturerProfile {
        name: "jlcpcb",
        min_trace_width: 0.127,
        min_clearance: 0.127,
        min_via_drill: 0.3,
        min_via_diameter: 0.5,
    },
    ManufacturerProfile {
        name: "pcbway",
        min_trace_width: 0.1,
        min_clearance: 0.1,
        min_via_drill: 0.2,
        min_via_diameter: 0.45,
    },
    ManufacturerProfile {
        name: "oshpark",
        min_trace_width: 0.152,
        min_clearance: 0.152,
        min_via_drill: 0.254,
        min_via_diameter: 0.508,
    },
    ManufacturerProfile {
        name: "seeed",
        min_trace_width: 0.1524,
        min_clearance: 0.1524,
        min_via_drill: 0.3,
        min_via_diameter: 0.6,
    },
];

impl ManufacturerProfile {
    pub fn all() -> &'static [ManufacturerProfile] {
        &PROFILES
    }

    pub fn lookup(name: &str) -> Result<ManufacturerProfile, ConfigurationError> {
        let key = name.to_ascii_lowercase();
        PROFILES
            .iter()
            .find(|p| p.name == key)
            .copied()
            .ok_or_else(|| ConfigurationError::UnknownManufacturer(name.to_string()))
    }

    /// Rules at exactly the fab minimum, on a grid of clearance/2.
    pub fn minimum_rules(&self) -> DesignRules {
        DesignRules::new(self.min_clearance / 2.0, self.min_trace_width, self.min_clearance)
            .with_via(self.min_via_drill, self.min_via_diameter)
    }
}

/// One step on the way from the requested rules to the fab minimum.
#[derive(Clone, Debug, PartialEq)]
pub struct RelaxationTier {
    pub index: usize,
    pub name: String,
    pub grid_resolution: f64,
    pub trace_width: f64,
    pub clearance: f64,
    pub via_drill: f64,
    pub via_diameter: f64,
}

impl RelaxationTier {
    /// `base` with this tier's values; net-class overrides are kept but never
    /// allowed below the tier.
    pub fn apply(&self, base: &DesignRules) -> DesignRules {
        let mut rules = base.clone();
        rules.grid_resolution = self.grid_resolution;
        rules.trace_width = self.trace_width;
        rules.clearance = self.clearance;
        rules.via_drill = self.via_drill;
        rules.via_diameter = self.via_diameter;
        for class in rules.net_classes.values_mut() {
            class.trace_width = class.trace_width.map(|w| w.max(self.trace_width));
            class.clearance = class.clearance.map(|c| c.max(self.clearance));
        }
        rules
    }
}

fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from + (to - from) * t
}

/// Ordered tiers from the requested rules (tier 0) down to the profile's
/// minimum (last tier). Values never go below the fab minimum and every
/// tier's grid is at most half its clearance.
pub fn relaxation_tiers(
    rules: &DesignRules,
    profile: &ManufacturerProfile,
    count: usize,
) -> Vec<RelaxationTier> {
    let count = count.max(1);
    (0..count)
        .map(|i| {
            let t = if count == 1 {
                0.0
            } else {
                i as f64 / (count - 1) as f64
            };
            let clearance = lerp(rules.clearance, profile.min_clearance, t).max(profile.min_clearance);
            let trace_width =
                lerp(rules.trace_width, profile.min_trace_width, t).max(profile.min_trace_width);
            let via_drill = lerp(rules.via_drill, profile.min_via_drill, t).max(profile.min_via_drill);
            let via_diameter = lerp(rules.via_diameter, profile.min_via_diameter, t)
                .max(profile.min_via_diameter)
                .max(via_drill + 0.1);
            let name = if i == 0 {
                "requested".to_string()
            } else if i + 1 == count {
                format!("{} minimum", profile.name)
            } else {
                format!("relaxed {}", i)
            };
            RelaxationTier {
                index: i,
                name,
                grid_resolution: rules.grid_resolution.min(clearance / 2.0),
                trace_width,
                clearance,
                via_drill,
                via_diameter,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("jlcpcb")]
    #[case("pcbway")]
    #[case("oshpark")]
    #[case("seeed")]
    fn test_every_tier_keeps_grid_below_half_clearance(#[case] name: &str) {
        let profile = ManufacturerProfile::lookup(name).unwrap();
        let rules = DesignRules::new(0.25, 0.3, 0.25).with_via(0.4, 0.8);
        let tiers = relaxation_tiers(&rules, &profile, 4);
        assert_eq!(tiers.len(), 4);
        for tier in &tiers {
            assert!(tier.grid_resolution <= tier.clearance / 2.0 + 1e-12);
            assert!(tier.clearance >= profile.min_clearance);
            assert!(tier.trace_width >= profile.min_trace_width);
            assert!(tier.apply(&rules).validate(true).is_ok());
        }
        let last = tiers.last().unwrap();
        assert!((last.clearance - profile.min_clearance).abs() < 1e-12);
        assert!((tiers[0].trace_width - 0.3).abs() < 1e-12);
        assert!(profile.minimum_rules().validate(true).is_ok());
    }

    #[test]
    fn test_tiers_relax_monotonically() {
        let profile = ManufacturerProfile::lookup("JLCPCB").unwrap();
        let tiers = relaxation_tiers(&DesignRules::new(0.1, 0.3, 0.3), &profile, 3);
        assert!(tiers.windows(2).all(|w| w[1].clearance <= w[0].clearance));
        assert_eq!(tiers[0].name, "requested");
        assert_eq!(tiers[2].name, "jlcpcb minimum");
    }

    #[test]
    fn test_never_below_minimum_when_request_is_finer() {
        let profile = ManufacturerProfile::lookup("oshpark").unwrap();
        let tiers = relaxation_tiers(&DesignRules::new(0.05, 0.1, 0.1), &profile, 2);
        assert!(tiers.iter().all(|t| t.clearance >= profile.min_clearance));
    }

    #[test]
    fn test_unknown_manufacturer() {
        assert_eq!(
            ManufacturerProfile::lookup("acme"),
            Err(ConfigurationError::UnknownManufacturer("acme".to_string()))
        );
    }
}
