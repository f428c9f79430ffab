use super::{DesignRules, NetRules};
use std::collections::HashMap;

pub const POWER: &str = "Power";
pub const CLOCK: &str = "Clock";
pub const HIGH_SPEED: &str = "HighSpeed";
pub const DEFAULT: &str = "Default";

/// Routing behaviour attached to a group of nets. Lower priority values are
/// routed first.
#[derive(Clone, Debug, PartialEq)]
pub struct NetClass {
    pub name: String,
    pub priority: u32,
    pub width_scale: f64,
    pub clearance_scale: f64,
}

impl NetClass {
    fn new(name: &str, priority: u32, width_scale: f64, clearance_scale: f64) -> Self {
        Self {
            name: name.to_string(),
            priority,
            width_scale,
            clearance_scale,
        }
    }
}

#[derive(Clone, Debug)]
pub struct NetClassMap {
    classes: Vec<NetClass>,
    by_net: HashMap<String, usize>,
}

impl NetClassMap {
    pub fn new() -> Self {
        Self {
            classes: vec![NetClass::new(DEFAULT, 10, 1.0, 1.0)],
            by_net: HashMap::new(),
        }
    }

    pub fn add_class(&mut self, class: NetClass) -> usize {
        if let Some(i) = self.classes.iter().position(|c| c.name == class.name) {
            self.classes[i] = class;
            return i;
        }
        self.classes.push(class);
        self.classes.len() - 1
    }

    /// Assign `net` to `class`; the first assignment wins.
    pub fn assign(&mut self, net: &str, class: &str) {
        if let Some(i) = self.classes.iter().position(|c| c.name == class) {
            self.by_net.entry(net.to_string()).or_insert(i);
        }
    }

    pub fn class_of(&self, net: &str) -> &NetClass {
        let i = self.by_net.get(net).copied().unwrap_or(0);
        &self.classes[i]
    }

    pub fn classes(&self) -> &[NetClass] {
        &self.classes
    }

    /// Rules for `net`: the named class's board-level overrides (from the
    /// `rules` table, or `board_class` from the board file) then this map's scaling.
    pub fn resolve(&self, rules: &DesignRules, net: &str, board_class: Option<&str>) -> NetRules {
        let class = self.class_of(net);
        let named = if rules.net_classes.contains_key(&class.name) {
            Some(class.name.as_str())
        } else {
            board_class
        };
        let mut r = rules.for_class(named);
        r.trace_width *= class.width_scale;
        r.clearance *= class.clearance_scale;
        r
    }
}

impl Default for NetClassMap {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the standard class map. Nets listed under several classes keep the
/// first one in power, clock, high-speed order.
pub fn create_net_class_map(power: &[String], high_speed: &[String], clock: &[String]) -> NetClassMap {
    let mut map = NetClassMap::new();
    map.add_class(NetClass::new(POWER, 1, 2.0, 1.0));
    map.add_class(NetClass::new(CLOCK, 2, 1.0, 1.5));
    map.add_class(NetClass::new(HIGH_SPEED, 3, 1.0, 1.0));
    for net in power {
        map.assign(net, POWER);
    }
    for net in clock {
        map.assign(net, CLOCK);
    }
    for net in high_speed {
        map.assign(net, HIGH_SPEED);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_standard_classes() {
        let map = create_net_class_map(&names(&["VCC"]), &names(&["USB_D+"]), &names(&["CLK", "VCC"]));
        assert_eq!(map.class_of("VCC").name, POWER);
        assert_eq!(map.class_of("CLK").priority, 2);
        assert_eq!(map.class_of("USB_D+").name, HIGH_SPEED);
        assert_eq!(map.class_of("SIG").name, DEFAULT);
        assert_eq!(map.class_of("SIG").priority, 10);
    }

    #[test]
    fn test_resolve_scales_rules() {
        let map = create_net_class_map(&names(&["VCC"]), &[], &names(&["CLK"]));
        let rules = DesignRules::default();
        assert!((map.resolve(&rules, "VCC", None).trace_width - 0.4).abs() < 1e-12);
        assert!((map.resolve(&rules, "CLK", None).clearance - 0.3).abs() < 1e-12);
        assert_eq!(map.resolve(&rules, "SIG", None), rules.for_class(None));
    }
}
