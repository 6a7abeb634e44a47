//! Explorer view state machine.
//!
//! The map has three render modes. `top_n` draws the N highest cells by the
//! color metric. "Add hexagons here" arms `request_bounds`, which still
//! draws top-N but asks the map widget to report its viewport once. When
//! the bounds arrive the view switches to `viewport_snapshot`, which draws
//! every cell inside the captured viewport regardless of N.
//!
//! [`transition`] is pure: the server keeps no per-client view state, the
//! client sends its current state with each event.

use serde::{Deserialize, Serialize};

/// A captured map viewport in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "BoundsInput")]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    /// Inclusive containment test.
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lat >= self.south && lat <= self.north && lng >= self.west && lng <= self.east
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct LatLngInput {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct PlainBounds {
    south: f64,
    west: f64,
    north: f64,
    east: f64,
}

/// Bounds arrive either flat or in the map widget's corner form.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum BoundsInput {
    Plain(PlainBounds),
    Corners {
        #[serde(rename = "_southWest")]
        south_west: LatLngInput,
        #[serde(rename = "_northEast")]
        north_east: LatLngInput,
    },
}

impl From<BoundsInput> for Bounds {
    fn from(input: BoundsInput) -> Self {
        match input {
            BoundsInput::Plain(b) => Bounds {
                south: b.south,
                west: b.west,
                north: b.north,
                east: b.east,
            },
            BoundsInput::Corners {
                south_west,
                north_east,
            } => Bounds {
                south: south_west.lat,
                west: south_west.lng,
                north: north_east.lat,
                east: north_east.lng,
            },
        }
    }
}

/// Render mode, with the bounds each mode carries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    TopN,
    /// Waiting for one viewport report. Bounds from an earlier snapshot
    /// are kept until the new ones arrive.
    RequestBounds {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous: Option<Bounds>,
    },
    ViewportSnapshot { bounds: Bounds },
}

impl ViewMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TopN => "top_n",
            Self::RequestBounds { .. } => "request_bounds",
            Self::ViewportSnapshot { .. } => "viewport_snapshot",
        }
    }

    pub fn bounds(&self) -> Option<Bounds> {
        match self {
            Self::TopN => None,
            Self::RequestBounds { previous } => *previous,
            Self::ViewportSnapshot { bounds } => Some(*bounds),
        }
    }

    /// Widget outputs the client must report back.
    pub fn widget_outputs(&self) -> Vec<&'static str> {
        match self {
            Self::RequestBounds { .. } => vec!["last_clicked", "bounds"],
            _ => vec!["last_clicked"],
        }
    }
}

/// Everything the client holds between renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    #[serde(flatten)]
    pub mode: ViewMode,
    pub country: String,
    pub year: i32,
    pub h3_res: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_cell: Option<String>,
}

impl ViewState {
    pub fn new(country: impl Into<String>, year: i32, h3_res: u8) -> Self {
        Self {
            mode: ViewMode::TopN,
            country: country.into(),
            year,
            h3_res,
            selected_cell: None,
        }
    }

    /// Map widget key. Stable across resolution changes so the map keeps
    /// its position.
    pub fn map_key(&self) -> String {
        format!("main_map_{}_{}", self.country, self.year)
    }
}

/// User or widget events that drive the view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewEvent {
    AddHexagonsHere,
    BoundsReceived { bounds: Bounds },
    Reset,
    SelectionChanged { country: String, year: i32 },
    ResolutionChanged { h3_res: u8 },
    CellSelected { h3_id: String },
}

/// Apply one event. Pairs without a listed transition leave the state as is.
pub fn transition(state: ViewState, event: &ViewEvent) -> ViewState {
    match (state.mode, event) {
        (ViewMode::TopN, ViewEvent::AddHexagonsHere) => ViewState {
            mode: ViewMode::RequestBounds { previous: None },
            ..state
        },
        (ViewMode::ViewportSnapshot { bounds }, ViewEvent::AddHexagonsHere) => ViewState {
            mode: ViewMode::RequestBounds {
                previous: Some(bounds),
            },
            ..state
        },
        (ViewMode::RequestBounds { .. }, ViewEvent::BoundsReceived { bounds }) => ViewState {
            mode: ViewMode::ViewportSnapshot { bounds: *bounds },
            ..state
        },
        (ViewMode::ViewportSnapshot { .. }, ViewEvent::Reset) => ViewState {
            mode: ViewMode::TopN,
            ..state
        },
        (_, ViewEvent::SelectionChanged { country, year }) => {
            if *country == state.country && *year == state.year {
                state
            } else {
                ViewState {
                    mode: ViewMode::TopN,
                    country: country.clone(),
                    year: *year,
                    h3_res: state.h3_res,
                    selected_cell: None,
                }
            }
        }
        (_, ViewEvent::ResolutionChanged { h3_res }) => ViewState {
            h3_res: *h3_res,
            ..state
        },
        (_, ViewEvent::CellSelected { h3_id }) => ViewState {
            selected_cell: Some(h3_id.to_lowercase()),
            ..state
        },
        _ => state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SPAIN: Bounds = Bounds {
        south: 36.0,
        west: -9.5,
        north: 43.8,
        east: 3.3,
    };

    fn start() -> ViewState {
        ViewState::new("ES", 2024, 7)
    }

    #[test]
    fn test_capture_cycle() {
        let s = transition(start(), &ViewEvent::AddHexagonsHere);
        assert_eq!(s.mode, ViewMode::RequestBounds { previous: None });
        assert_eq!(s.mode.widget_outputs(), vec!["last_clicked", "bounds"]);

        let s = transition(s, &ViewEvent::BoundsReceived { bounds: SPAIN });
        assert_eq!(s.mode, ViewMode::ViewportSnapshot { bounds: SPAIN });
        assert_eq!(s.mode.widget_outputs(), vec!["last_clicked"]);

        let s = transition(s, &ViewEvent::Reset);
        assert_eq!(s.mode, ViewMode::TopN);
        assert_eq!(s.mode.bounds(), None);
    }

    #[test]
    fn test_recapture_keeps_previous_bounds() {
        let s = ViewState {
            mode: ViewMode::ViewportSnapshot { bounds: SPAIN },
            ..start()
        };
        let s = transition(s, &ViewEvent::AddHexagonsHere);
        assert_eq!(s.mode.name(), "request_bounds");
        assert_eq!(s.mode.bounds(), Some(SPAIN));
    }

    #[test]
    fn test_noop_pairs() {
        let s = start();
        assert_eq!(transition(s.clone(), &ViewEvent::Reset), s);
        assert_eq!(transition(s.clone(), &ViewEvent::BoundsReceived { bounds: SPAIN }), s);

        let armed = transition(s, &ViewEvent::AddHexagonsHere);
        assert_eq!(transition(armed.clone(), &ViewEvent::AddHexagonsHere), armed);
        assert_eq!(transition(armed.clone(), &ViewEvent::Reset), armed);
    }

    #[test]
    fn test_selection_change_resets() {
        let s = ViewState {
            mode: ViewMode::ViewportSnapshot { bounds: SPAIN },
            selected_cell: Some("872830828ffffff".into()),
            ..start()
        };

        let same = transition(
            s.clone(),
            &ViewEvent::SelectionChanged {
                country: "ES".into(),
                year: 2024,
            },
        );
        assert_eq!(same, s);

        let changed = transition(
            s,
            &ViewEvent::SelectionChanged {
                country: "ES".into(),
                year: 2023,
            },
        );
        assert_eq!(changed.mode, ViewMode::TopN);
        assert_eq!(changed.selected_cell, None);
        assert_eq!(changed.map_key(), "main_map_ES_2023");
    }

    #[test]
    fn test_resolution_change_keeps_mode_and_key() {
        let s = ViewState {
            mode: ViewMode::ViewportSnapshot { bounds: SPAIN },
            ..start()
        };
        let key = s.map_key();
        let s = transition(s, &ViewEvent::ResolutionChanged { h3_res: 6 });
        assert_eq!(s.h3_res, 6);
        assert_eq!(s.mode, ViewMode::ViewportSnapshot { bounds: SPAIN });
        assert_eq!(s.map_key(), key);
    }

    #[test]
    fn test_cell_selected_keeps_mode() {
        let armed = transition(start(), &ViewEvent::AddHexagonsHere);
        let s = transition(
            armed.clone(),
            &ViewEvent::CellSelected {
                h3_id: "872830828FFFFFF".into(),
            },
        );
        assert_eq!(s.mode, armed.mode);
        assert_eq!(s.selected_cell.as_deref(), Some("872830828ffffff"));
    }

    #[test]
    fn test_wire_format() {
        let state: ViewState = serde_json::from_value(json!({
            "mode": "viewport_snapshot",
            "bounds": {"_southWest": {"lat": 36.0, "lng": -9.5}, "_northEast": {"lat": 43.8, "lng": 3.3}},
            "country": "ES",
            "year": 2024,
            "h3_res": 7
        }))
        .unwrap();
        assert_eq!(state.mode, ViewMode::ViewportSnapshot { bounds: SPAIN });

        let event: ViewEvent = serde_json::from_value(json!({"type": "add_hexagons_here"})).unwrap();
        assert_eq!(event, ViewEvent::AddHexagonsHere);

        let encoded = serde_json::to_value(start()).unwrap();
        assert_eq!(encoded["mode"], "top_n");
        assert!(encoded.get("selected_cell").is_none());
    }
}
