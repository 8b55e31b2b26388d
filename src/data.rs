use anyhow::{Context, Result, anyhow};
use geo::{BoundingRect, MultiPolygon, Rect};
use geojson::GeoJson;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::{collections::HashMap, fs, path::Path, str::FromStr};

/// Which vote table a candidate (and the matching `v_*` columns) belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Senate,
    Partylist,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 2] = [DatasetKind::Senate, DatasetKind::Partylist];

    pub fn label(self) -> &'static str {
        match self {
            DatasetKind::Senate => "Senate",
            DatasetKind::Partylist => "Party-list",
        }
    }
}

/// One entry of candidates.json; file order is display order.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: String,
    pub name: String,
    pub color: String,
    pub dataset_type: DatasetKind,
}

/// Property record of a single barangay polygon. Vote counts are keyed by
/// candidate id, with the `v_` column prefix already stripped.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnitProps {
    pub province: String,
    pub municipality: String,
    pub barangay: String,
    pub registered_voters: u64,
    pub actual_voters: u64,
    pub votes: HashMap<String, u64>,
}

/// A renderable unit: properties plus parsed geometry. `bbox` is None when
/// the geometry has no extent, and such units never take part in bound unions.
pub struct Feature {
    pub props: UnitProps,
    pub geometry: MultiPolygon<f64>,
    pub bbox: Option<Rect<f64>>,
}

pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

pub fn load_candidates(path: &Path) -> Result<Vec<Candidate>> {
    let bytes = fs::read(path).with_context(|| format!("failed to read candidate config {}", path.display()))?;
    let list: Vec<Candidate> = serde_json::from_slice(&bytes)
        .with_context(|| format!("failed to parse candidate config {}", path.display()))?;
    tracing::info!("loaded {} candidates from {}", list.len(), path.display());
    Ok(list)
}

pub fn load_collection(path: &Path) -> Result<FeatureCollection> {
    let started = std::time::Instant::now();
    let txt = fs::read_to_string(path).with_context(|| format!("failed to read dataset {}", path.display()))?;
    let raw = GeoJson::from_str(&txt).with_context(|| format!("failed to parse GeoJSON in {}", path.display()))?;
    let fc = match raw {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(anyhow!("{} is not a GeoJSON FeatureCollection", path.display())),
    };

    let mut features = Vec::with_capacity(fc.features.len());
    let mut skipped = 0usize;
    for feature in fc.features {
        let props = feature.properties.as_ref().map(parse_props).unwrap_or_default();
        let geometry = match feature.geometry.and_then(to_multi_polygon) {
            Some(mp) => mp,
            None => {
                skipped += 1;
                continue;
            }
        };
        let bbox = geometry.bounding_rect();
        features.push(Feature { props, geometry, bbox });
    }
    if skipped > 0 {
        tracing::warn!("skipped {} features without polygonal geometry", skipped);
    }
    tracing::info!(
        "loaded {} units from {} in {:.2?}",
        features.len(),
        path.display(),
        started.elapsed()
    );
    Ok(FeatureCollection { features })
}

fn to_multi_polygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geom: geo::Geometry<f64> = geometry.value.try_into().ok()?;
    match geom {
        geo::Geometry::Polygon(p) => Some(p.into()),
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        _ => None,
    }
}

fn parse_props(props: &Map<String, Value>) -> UnitProps {
    let mut votes = HashMap::new();
    for (key, value) in props {
        if let Some(id) = key.strip_prefix("v_") {
            votes.insert(id.to_string(), value_u64(value));
        }
    }
    UnitProps {
        province: string_prop(props, "province", "p"),
        municipality: string_prop(props, "municipality", "m"),
        barangay: string_prop(props, "barangay", "b"),
        registered_voters: number_prop(props, "registeredVoters", "rv"),
        actual_voters: number_prop(props, "actualVoters", "av"),
        votes,
    }
}

// The dataset builder emits either full property names or the compact
// single-letter aliases; accept both spellings.
fn string_prop(props: &Map<String, Value>, key: &str, alias: &str) -> String {
    props
        .get(key)
        .or_else(|| props.get(alias))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn number_prop(props: &Map<String, Value>, key: &str, alias: &str) -> u64 {
    props.get(key).or_else(|| props.get(alias)).map(value_u64).unwrap_or(0)
}

fn value_u64(value: &Value) -> u64 {
    value
        .as_u64()
        .or_else(|| value.as_f64().map(|f| f.max(0.0) as u64))
        .unwrap_or(0)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use geo::polygon;

    pub(crate) fn unit_square(x: f64, y: f64) -> MultiPolygon<f64> {
        polygon![
            (x: x, y: y),
            (x: x + 1.0, y: y),
            (x: x + 1.0, y: y + 1.0),
            (x: x, y: y + 1.0),
            (x: x, y: y),
        ]
        .into()
    }

    pub(crate) fn feature(
        province: &str,
        municipality: &str,
        barangay: &str,
        registered: u64,
        actual: u64,
        votes: &[(&str, u64)],
        origin: (f64, f64),
    ) -> Feature {
        let geometry = unit_square(origin.0, origin.1);
        let bbox = geometry.bounding_rect();
        Feature {
            props: UnitProps {
                province: province.to_string(),
                municipality: municipality.to_string(),
                barangay: barangay.to_string(),
                registered_voters: registered,
                actual_voters: actual,
                votes: votes.iter().map(|(id, n)| (id.to_string(), *n)).collect(),
            },
            geometry,
            bbox,
        }
    }

    pub(crate) fn collection(features: Vec<Feature>) -> FeatureCollection {
        FeatureCollection { features }
    }
}
