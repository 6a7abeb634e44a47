//! YlOrRd choropleth scale and legend.

use serde::Serialize;

/// Color stops as (position, hex).
pub const COLOR_STOPS: [(f64, &str); 6] = [
    (0.0, "#ffffb2"),
    (0.2, "#fed976"),
    (0.4, "#feb24c"),
    (0.6, "#fd8d3c"),
    (0.8, "#f03b20"),
    (1.0, "#bd0026"),
];

fn rgb(hex: &str) -> [u8; 3] {
    let channel = |i: usize| {
        hex.get(i..i + 2)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
            .unwrap_or(0)
    };
    [channel(1), channel(3), channel(5)]
}

/// Map a value to a hex color by linear interpolation between stops on
/// `(value - min) / (max - min)`, clamped to [0, 1]. A flat range maps to 0.
pub fn metric_to_color(value: f64, min: f64, max: f64) -> String {
    let t = if max == min {
        0.0
    } else {
        ((value - min) / (max - min)).clamp(0.0, 1.0)
    };
    let t = if t.is_nan() { 0.0 } else { t };

    for pair in COLOR_STOPS.windows(2) {
        let (t0, c0) = pair[0];
        let (t1, c1) = pair[1];
        if t <= t1 {
            let frac = if t1 > t0 { (t - t0) / (t1 - t0) } else { 0.0 };
            let (a, b) = (rgb(c0), rgb(c1));
            let mix = |i: usize| {
                (f64::from(a[i]) + frac * (f64::from(b[i]) - f64::from(a[i]))) as u8
            };
            return format!("#{:02x}{:02x}{:02x}", mix(0), mix(1), mix(2));
        }
    }
    COLOR_STOPS[COLOR_STOPS.len() - 1].1.to_string()
}

/// `species_richness_cell` becomes `Species Richness Cell`.
pub fn metric_title(metric: &str) -> String {
    metric
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Legend shown next to the map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Legend {
    pub title: String,
    pub gradient: Vec<&'static str>,
    pub low_label: &'static str,
    pub high_label: &'static str,
}

impl Legend {
    pub fn for_metric(metric: &str) -> Self {
        Self {
            title: metric_title(metric),
            gradient: COLOR_STOPS.iter().map(|(_, c)| *c).collect(),
            low_label: "low",
            high_label: "high",
        }
    }

    /// CSS `linear-gradient` argument list.
    pub fn css_gradient(&self) -> String {
        format!("linear-gradient(to right, {})", self.gradient.join(", "))
    }
}
