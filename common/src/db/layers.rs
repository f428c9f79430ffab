use std::fmt;

/// A copper layer. The derived ordering is the physical stack order:
/// top, inner layers by number, bottom.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Layer {
    Top,
    Inner(u8),
    Bottom,
}

impl Layer {
    pub fn kicad_name(&self) -> String {
        match self {
            Layer::Top => "F.Cu".to_string(),
            Layer::Inner(n) => format!("In{}.Cu", n),
            Layer::Bottom => "B.Cu".to_string(),
        }
    }

    pub fn from_kicad_name(name: &str) -> Option<Layer> {
        match name {
            "F.Cu" => Some(Layer::Top),
            "B.Cu" => Some(Layer::Bottom),
            _ => name
                .strip_prefix("In")
                .and_then(|rest| rest.strip_suffix(".Cu"))
                .and_then(|n| n.parse::<u8>().ok())
                .map(Layer::Inner),
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.kicad_name())
    }
}

/// Ordered copper stack. Grid layer index `z` is the position in this stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerStack {
    layers: Vec<Layer>,
}

impl LayerStack {
    pub fn new(mut layers: Vec<Layer>) -> Self {
        layers.sort();
        layers.dedup();
        if layers.is_empty() {
            layers = vec![Layer::Top, Layer::Bottom];
        }
        Self { layers }
    }

    pub fn two_layer() -> Self {
        Self::new(vec![Layer::Top, Layer::Bottom])
    }

    pub fn with_inner(inner: u8) -> Self {
        let mut layers = vec![Layer::Top];
        layers.extend((1..=inner).map(Layer::Inner));
        layers.push(Layer::Bottom);
        Self::new(layers)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn index_of(&self, layer: Layer) -> Option<u8> {
        self.layers.iter().position(|&l| l == layer).map(|i| i as u8)
    }

    pub fn layer(&self, z: u8) -> Layer {
        self.layers
            .get(z as usize)
            .copied()
            .unwrap_or(Layer::Bottom)
    }

    /// Layers a via starting at `z` can reach in one hop.
    pub fn adjacent(&self, z: u8) -> Vec<u8> {
        let mut out = Vec::with_capacity(2);
        if z > 0 {
            out.push(z - 1);
        }
        if (z as usize) + 1 < self.layers.len() {
            out.push(z + 1);
        }
        out
    }

    /// Whether `layer` lies within the span of a via between `a` and `b`.
    pub fn spans(&self, a: Layer, b: Layer, layer: Layer) -> bool {
        let lo = a.min(b);
        let hi = a.max(b);
        layer >= lo && layer <= hi
    }
}

impl Default for LayerStack {
    fn default() -> Self {
        Self::two_layer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_names_round_trip() {
        for layer in [Layer::Top, Layer::Inner(2), Layer::Bottom] {
            assert_eq!(Layer::from_kicad_name(&layer.kicad_name()), Some(layer));
        }
        assert_eq!(Layer::from_kicad_name("Edge.Cuts"), None);
    }

    #[test]
    fn test_stack_order_and_adjacency() {
        let stack = LayerStack::new(vec![Layer::Bottom, Layer::Inner(1), Layer::Top]);
        assert_eq!(stack.layers(), &[Layer::Top, Layer::Inner(1), Layer::Bottom]);
        assert_eq!(stack.adjacent(1), vec![0, 2]);
        assert_eq!(stack.adjacent(0), vec![1]);
        assert!(stack.spans(Layer::Bottom, Layer::Top, Layer::Inner(1)));
        assert!(!stack.spans(Layer::Top, Layer::Inner(1), Layer::Bottom));
    }
}
