use crate::color::{ColorMode, Rgb, color_for, to_color};
use crate::data::{Feature, FeatureCollection, UnitProps};
use crate::search::SearchEntry;
use crate::stats::{StatSelector, stat_for};
use geo::{Contains, MultiPolygon, Point, Rect};
use ratatui::style::Color;
use ratatui::widgets::canvas::{Context, Line};
use std::rc::Rc;

const BASE_FILL_OPACITY: f32 = 0.75;
const DIMMED_FILL_OPACITY: f32 = 0.15;
const DIMMED_STROKE_OPACITY: f32 = 0.6;
const THIN_STROKE_WEIGHT: f32 = 0.3;
const THICK_STROKE_WEIGHT: f32 = 2.0;

const NEUTRAL_STROKE: Rgb = (60, 60, 60);
const MATCHED_STROKE: Rgb = (255, 255, 255);
const HOVER_STROKE: Rgb = (255, 255, 120);

const GRID_COLS: usize = 64;
const GRID_ROWS: usize = 64;

/// Everything needed to style one pass over the layer, captured by value so
/// a restyle never reads live app state.
#[derive(Clone, Debug, PartialEq)]
pub struct StyleSnapshot {
    pub stat: StatSelector,
    pub mode: ColorMode,
    pub base_color: Rgb,
    pub max_stat: f64,
    pub selection: Option<SearchEntry>,
}

/// Resolved visual properties of one unit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderStyle {
    pub fill: Rgb,
    pub fill_opacity: f32,
    pub stroke: Rgb,
    pub stroke_opacity: f32,
    pub stroke_weight: f32,
}

/// Emitted while the pointer rests on a unit; `pointer` is the terminal
/// cell, used to anchor the tooltip.
#[derive(Clone, Debug)]
pub struct HoverEvent {
    pub props: UnitProps,
    pub pointer: (u16, u16),
}

// Flat uniform grid over unit bounding boxes. Point lookups touch one cell,
// which keeps hover tracking cheap at tens of thousands of polygons.
struct SpatialGrid {
    cells: Vec<Vec<u32>>,
    min_x: f64,
    min_y: f64,
    cell_w: f64,
    cell_h: f64,
}

impl SpatialGrid {
    fn build(features: &[Feature]) -> Self {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for bbox in features.iter().filter_map(|f| f.bbox) {
            min_x = min_x.min(bbox.min().x);
            min_y = min_y.min(bbox.min().y);
            max_x = max_x.max(bbox.max().x);
            max_y = max_y.max(bbox.max().y);
        }

        let mut grid = Self {
            cells: vec![Vec::new(); GRID_COLS * GRID_ROWS],
            min_x,
            min_y,
            cell_w: ((max_x - min_x) / GRID_COLS as f64).max(f64::EPSILON),
            cell_h: ((max_y - min_y) / GRID_ROWS as f64).max(f64::EPSILON),
        };
        if !min_x.is_finite() {
            return grid;
        }

        for (idx, feature) in features.iter().enumerate() {
            let Some(bbox) = feature.bbox else { continue };
            let (c0, r0) = grid.cell_of(bbox.min().x, bbox.min().y);
            let (c1, r1) = grid.cell_of(bbox.max().x, bbox.max().y);
            for row in r0..=r1 {
                for col in c0..=c1 {
                    grid.cells[row * GRID_COLS + col].push(idx as u32);
                }
            }
        }
        grid
    }

    fn cell_of(&self, x: f64, y: f64) -> (usize, usize) {
        let col = ((x - self.min_x) / self.cell_w) as usize;
        let row = ((y - self.min_y) / self.cell_h) as usize;
        (col.min(GRID_COLS - 1), row.min(GRID_ROWS - 1))
    }

    fn candidates_at(&self, x: f64, y: f64) -> &[u32] {
        if !self.min_x.is_finite()
            || x < self.min_x
            || y < self.min_y
            || x > self.min_x + self.cell_w * GRID_COLS as f64
            || y > self.min_y + self.cell_h * GRID_ROWS as f64
        {
            return &[];
        }
        let (col, row) = self.cell_of(x, y);
        &self.cells[row * GRID_COLS + col]
    }
}

/// The choropleth layer. Built once per collection; dataset switches build
/// a new layer instead of mutating this one. Style changes only touch the
/// per-unit style table.
pub struct MapLayer {
    collection: Rc<FeatureCollection>,
    grid: SpatialGrid,
    styles: Vec<RenderStyle>,
    matched: Vec<bool>,
    hovered: Option<usize>,
}

impl MapLayer {
    pub fn build(collection: Rc<FeatureCollection>) -> Self {
        let grid = SpatialGrid::build(&collection.features);
        tracing::debug!("map layer built with {} units", collection.len());
        Self {
            collection,
            grid,
            styles: Vec::new(),
            matched: Vec::new(),
            hovered: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn styles(&self) -> &[RenderStyle] {
        &self.styles
    }

    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    pub fn set_hover(&mut self, idx: Option<usize>) {
        self.hovered = idx;
    }

    /// Recomputes every unit's style from the snapshot. Reapplying an
    /// identical snapshot yields the identical style table.
    pub fn restyle(&mut self, snapshot: &StyleSnapshot) {
        self.styles.clear();
        self.styles.reserve(self.collection.len());
        self.matched.clear();
        self.matched.reserve(self.collection.len());

        for feature in &self.collection.features {
            let normalized = stat_for(feature, &snapshot.stat) / snapshot.max_stat;
            let fill = color_for(normalized, snapshot.mode, snapshot.base_color);
            let (style, is_match) = match &snapshot.selection {
                None => (
                    RenderStyle {
                        fill,
                        fill_opacity: BASE_FILL_OPACITY,
                        stroke: NEUTRAL_STROKE,
                        stroke_opacity: 1.0,
                        stroke_weight: THIN_STROKE_WEIGHT,
                    },
                    false,
                ),
                Some(sel) if sel.matches(&feature.props) => (
                    RenderStyle {
                        fill,
                        fill_opacity: 1.0,
                        stroke: MATCHED_STROKE,
                        stroke_opacity: 1.0,
                        stroke_weight: THICK_STROKE_WEIGHT,
                    },
                    true,
                ),
                Some(_) => (
                    RenderStyle {
                        fill,
                        fill_opacity: DIMMED_FILL_OPACITY,
                        stroke: NEUTRAL_STROKE,
                        stroke_opacity: DIMMED_STROKE_OPACITY,
                        stroke_weight: THIN_STROKE_WEIGHT,
                    },
                    false,
                ),
            };
            self.styles.push(style);
            self.matched.push(is_match);
        }
    }

    /// Exact hit test at a world coordinate. The grid narrows the search to
    /// a handful of bbox candidates before the polygon test runs.
    pub fn hit_test(&self, wx: f64, wy: f64) -> Option<usize> {
        let point = Point::new(wx, wy);
        for &idx in self.grid.candidates_at(wx, wy) {
            let feature = &self.collection.features[idx as usize];
            let inside_bbox = feature
                .bbox
                .is_some_and(|b| wx >= b.min().x && wx <= b.max().x && wy >= b.min().y && wy <= b.max().y);
            if inside_bbox && feature.geometry.contains(&point) {
                return Some(idx as usize);
            }
        }
        None
    }

    /// Paints outlines in three passes: every unit in its fill color, then
    /// matched units' bright strokes, then the hovered unit on top. Strokes
    /// heavier than one dot are doubled with a one-dot offset.
    pub fn paint(&self, ctx: &mut Context, x_bounds: [f64; 2], y_bounds: [f64; 2], canvas_cols: u16) {
        if self.styles.len() != self.collection.len() {
            return;
        }
        let dot = (x_bounds[1] - x_bounds[0]) / (canvas_cols.max(1) as f64 * 2.0);
        for (idx, feature) in self.collection.features.iter().enumerate() {
            if self.matched[idx] || !visible(feature.bbox, x_bounds, y_bounds) {
                continue;
            }
            let style = &self.styles[idx];
            draw_outline(ctx, &feature.geometry, shade(style.fill, style.fill_opacity), 0.0);
        }
        for (idx, feature) in self.collection.features.iter().enumerate() {
            if !self.matched[idx] || !visible(feature.bbox, x_bounds, y_bounds) {
                continue;
            }
            let style = &self.styles[idx];
            let color = shade(style.stroke, style.stroke_opacity);
            draw_outline(ctx, &feature.geometry, color, 0.0);
            if style.stroke_weight > 1.0 {
                draw_outline(ctx, &feature.geometry, color, dot);
            }
        }
        if let Some(idx) = self.hovered {
            if let Some(feature) = self.collection.features.get(idx) {
                if visible(feature.bbox, x_bounds, y_bounds) {
                    let color = to_color(HOVER_STROKE);
                    draw_outline(ctx, &feature.geometry, color, 0.0);
                    draw_outline(ctx, &feature.geometry, color, dot);
                }
            }
        }
    }
}

fn visible(bbox: Option<Rect<f64>>, x_bounds: [f64; 2], y_bounds: [f64; 2]) -> bool {
    match bbox {
        Some(b) => {
            b.max().x >= x_bounds[0]
                && b.min().x <= x_bounds[1]
                && b.max().y >= y_bounds[0]
                && b.min().y <= y_bounds[1]
        }
        None => false,
    }
}

fn draw_outline(ctx: &mut Context, geometry: &MultiPolygon<f64>, color: Color, offset: f64) {
    for poly in &geometry.0 {
        let ring = &poly.exterior().0;
        for window in ring.windows(2) {
            let a = window[0];
            let b = window[1];
            ctx.draw(&Line {
                x1: a.x + offset,
                y1: a.y,
                x2: b.x + offset,
                y2: b.y,
                color,
            });
        }
        if let (Some(first), Some(last)) = (ring.first(), ring.last()) {
            ctx.draw(&Line {
                x1: last.x + offset,
                y1: last.y,
                x2: first.x + offset,
                y2: first.y,
                color,
            });
        }
    }
}

// Terminal cells have no alpha channel; opacity scales the color toward the
// black background instead.
fn shade(rgb: Rgb, opacity: f32) -> Color {
    let op = opacity.clamp(0.0, 1.0);
    Color::Rgb(
        (rgb.0 as f32 * op).round() as u8,
        (rgb.1 as f32 * op).round() as u8,
        (rgb.2 as f32 * op).round() as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_support::{collection, feature};
    use crate::search::SearchIndex;
    use crate::stats::StatKind;

    fn snapshot(selection: Option<SearchEntry>) -> StyleSnapshot {
        StyleSnapshot {
            stat: StatSelector { candidate_id: "reyes".to_string(), kind: StatKind::Share },
            mode: ColorMode::SingleHue,
            base_color: (200, 120, 80),
            max_stat: 1.0,
            selection,
        }
    }

    fn three_unit_layer() -> (MapLayer, SearchIndex) {
        let c = collection(vec![
            feature("P", "ALPHA", "A", 100, 100, &[("reyes", 10)], (0.0, 0.0)),
            feature("P", "ALPHA", "B", 100, 100, &[("reyes", 50)], (2.0, 0.0)),
            feature("P", "BETA", "C", 100, 100, &[("reyes", 100)], (4.0, 0.0)),
        ]);
        let index = SearchIndex::build(&c);
        (MapLayer::build(Rc::new(c)), index)
    }

    #[test]
    fn restyle_without_selection_uses_the_base_policy() {
        let (mut layer, _) = three_unit_layer();
        layer.restyle(&snapshot(None));
        assert_eq!(layer.styles().len(), 3);
        for style in layer.styles() {
            assert_eq!(style.fill_opacity, BASE_FILL_OPACITY);
            assert_eq!(style.stroke, NEUTRAL_STROKE);
            assert_eq!(style.stroke_weight, THIN_STROKE_WEIGHT);
        }
        // Same base hue, brighter with larger shares.
        let fills: Vec<Rgb> = layer.styles().iter().map(|s| s.fill).collect();
        assert_ne!(fills[0], fills[1]);
        assert_ne!(fills[1], fills[2]);
    }

    #[test]
    fn restyle_with_selection_emphasizes_matches_and_dims_the_rest() {
        let (mut layer, index) = three_unit_layer();
        let entry = index.query("alpha, p").remove(0);
        layer.restyle(&snapshot(Some(entry)));

        let styles = layer.styles();
        for matched in &styles[0..2] {
            assert_eq!(matched.fill_opacity, 1.0);
            assert_eq!(matched.stroke, MATCHED_STROKE);
            assert_eq!(matched.stroke_weight, THICK_STROKE_WEIGHT);
        }
        let dimmed = &styles[2];
        assert_eq!(dimmed.fill_opacity, DIMMED_FILL_OPACITY);
        assert_eq!(dimmed.stroke_weight, THIN_STROKE_WEIGHT);
        // The dimmed unit still carries its data color.
        let plain = color_for(1.0, ColorMode::SingleHue, (200, 120, 80));
        assert_eq!(dimmed.fill, plain);
    }

    #[test]
    fn restyle_is_idempotent() {
        let (mut layer, index) = three_unit_layer();
        let snap = snapshot(Some(index.query("alpha, p").remove(0)));
        layer.restyle(&snap);
        let first: Vec<RenderStyle> = layer.styles().to_vec();
        layer.restyle(&snap);
        assert_eq!(layer.styles(), first.as_slice());
    }

    #[test]
    fn stale_selection_matches_nothing_and_dims_everything() {
        let (mut layer, _) = three_unit_layer();
        let ghost = SearchEntry {
            label: "gone, q".to_string(),
            kind: crate::search::EntryKind::Municipality,
            province: "Q".to_string(),
            municipality: "GONE".to_string(),
            barangay: None,
        };
        layer.restyle(&snapshot(Some(ghost)));
        for style in layer.styles() {
            assert_eq!(style.fill_opacity, DIMMED_FILL_OPACITY);
        }
    }

    #[test]
    fn hit_test_finds_the_unit_under_the_point() {
        let (layer, _) = three_unit_layer();
        assert_eq!(layer.hit_test(0.5, 0.5), Some(0));
        assert_eq!(layer.hit_test(2.5, 0.5), Some(1));
        assert_eq!(layer.hit_test(1.5, 0.5), None);
        assert_eq!(layer.hit_test(100.0, 100.0), None);
    }

    #[test]
    fn empty_layer_handles_lookups() {
        let layer = MapLayer::build(Rc::new(collection(vec![])));
        assert!(layer.is_empty());
        assert_eq!(layer.hit_test(0.0, 0.0), None);
    }

    #[test]
    fn hover_state_round_trips() {
        let (mut layer, _) = three_unit_layer();
        assert_eq!(layer.hovered(), None);
        layer.set_hover(Some(1));
        assert_eq!(layer.hovered(), Some(1));
        layer.set_hover(None);
        assert_eq!(layer.hovered(), None);
    }

    #[test]
    fn shade_scales_toward_black() {
        assert_eq!(shade((200, 100, 50), 1.0), Color::Rgb(200, 100, 50));
        assert_eq!(shade((200, 100, 50), 0.5), Color::Rgb(100, 50, 25));
        assert_eq!(shade((200, 100, 50), 0.0), Color::Rgb(0, 0, 0));
    }

    #[test]
    fn offscreen_units_are_invisible() {
        let bbox = Rect::new(geo::coord! { x: 0.0, y: 0.0 }, geo::coord! { x: 1.0, y: 1.0 });
        assert!(visible(Some(bbox), [0.0, 10.0], [0.0, 10.0]));
        assert!(!visible(Some(bbox), [5.0, 10.0], [0.0, 10.0]));
        assert!(!visible(None, [0.0, 10.0], [0.0, 10.0]));
    }
}
