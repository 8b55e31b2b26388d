use crate::data::FeatureCollection;
use crate::search::SearchEntry;
use geo::{Coord, Rect, coord};

// Scale is canvas columns per world degree.
const MIN_SCALE: f64 = 0.01;
const MAX_SCALE: f64 = 5000.0;

// Ceiling applied when fitting, so a single small polygon keeps some
// surrounding context instead of filling the screen.
const FIT_MAX_SCALE: f64 = 600.0;
const FIT_PADDING_CELLS: f64 = 2.0;

// A terminal cell is roughly twice as tall as it is wide; one row covers
// this many column-equivalents of world space.
const CELL_ASPECT: f64 = 2.0;

/// A deferred "frame these bounds" instruction. It is applied on the next
/// draw, once the canvas size is known.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitCommand {
    pub bounds: Rect<f64>,
    pub padding: f64,
    pub max_zoom: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub center_x: f64,
    pub center_y: f64,
    pub scale: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { center_x: 0.0, center_y: 0.0, scale: 1.0 }
    }
}

impl Viewport {
    /// World interval shown across `canvas_w` columns.
    pub fn x_bounds(&self, canvas_w: f64) -> [f64; 2] {
        let half = canvas_w / self.scale / 2.0;
        [self.center_x - half, self.center_x + half]
    }

    /// World interval shown across `canvas_h` rows.
    pub fn y_bounds(&self, canvas_h: f64) -> [f64; 2] {
        let half = canvas_h * CELL_ASPECT / self.scale / 2.0;
        [self.center_y - half, self.center_y + half]
    }

    pub fn zoom(&mut self, factor: f64) {
        self.scale = (self.scale * factor).clamp(MIN_SCALE, MAX_SCALE);
    }

    /// Zooms while keeping the world point under the pointer fixed on
    /// screen.
    pub fn zoom_at(&mut self, factor: f64, focus_x: f64, focus_y: f64) {
        let old_scale = self.scale;
        self.zoom(factor);
        let ratio = old_scale / self.scale;
        self.center_x = focus_x - (focus_x - self.center_x) * ratio;
        self.center_y = focus_y - (focus_y - self.center_y) * ratio;
    }

    /// Moves the view by whole cells; positive `dx` looks east, positive
    /// `dy` looks north.
    pub fn pan(&mut self, dx_cells: f64, dy_cells: f64) {
        self.center_x += dx_cells / self.scale;
        self.center_y += dy_cells * CELL_ASPECT / self.scale;
    }

    /// Centers on the commanded bounds at the largest scale that keeps them
    /// fully visible, bounded by the command's zoom ceiling. Degenerate
    /// bounds (a point) fall back to the ceiling.
    pub fn fit(&mut self, cmd: &FitCommand, canvas_w: f64, canvas_h: f64) {
        if canvas_w <= 0.0 || canvas_h <= 0.0 {
            return;
        }
        let usable_w = (canvas_w - 2.0 * cmd.padding).max(1.0);
        let usable_h = (canvas_h - 2.0 * cmd.padding).max(1.0);
        let world_w = cmd.bounds.width();
        let world_h = cmd.bounds.height();
        let scale_x = if world_w > 0.0 { usable_w / world_w } else { cmd.max_zoom };
        let scale_y = if world_h > 0.0 { usable_h * CELL_ASPECT / world_h } else { cmd.max_zoom };
        self.scale = scale_x.min(scale_y).min(cmd.max_zoom).clamp(MIN_SCALE, MAX_SCALE);
        let center = cmd.bounds.center();
        self.center_x = center.x;
        self.center_y = center.y;
    }

    /// Inverse of the bounds mapping: a cell position inside the canvas
    /// (origin top-left) to the world coordinate at the cell center.
    pub fn screen_to_world(&self, col: f64, row: f64, canvas_w: f64, canvas_h: f64) -> (f64, f64) {
        let [x0, x1] = self.x_bounds(canvas_w);
        let [y0, y1] = self.y_bounds(canvas_h);
        let fx = (col + 0.5) / canvas_w.max(1.0);
        let fy = (row + 0.5) / canvas_h.max(1.0);
        (x0 + fx * (x1 - x0), y1 - fy * (y1 - y0))
    }
}

/// Union of all valid unit bounding boxes, or None for an empty collection.
pub fn collection_bounds(collection: &FeatureCollection) -> Option<Rect<f64>> {
    union_bounds(collection.features.iter().filter_map(|f| f.bbox))
}

/// Single framing instruction for a search selection: the union of every
/// matching unit's bounding box. None when nothing matches, in which case
/// the view must stay where it is.
pub fn fit_to_selection(collection: &FeatureCollection, entry: &SearchEntry) -> Option<FitCommand> {
    let bounds = union_bounds(
        collection
            .features
            .iter()
            .filter(|f| entry.matches(&f.props))
            .filter_map(|f| f.bbox),
    )?;
    Some(FitCommand { bounds, padding: FIT_PADDING_CELLS, max_zoom: FIT_MAX_SCALE })
}

pub fn fit_whole(collection: &FeatureCollection) -> Option<FitCommand> {
    let bounds = collection_bounds(collection)?;
    Some(FitCommand { bounds, padding: FIT_PADDING_CELLS, max_zoom: FIT_MAX_SCALE })
}

fn union_bounds(boxes: impl Iterator<Item = Rect<f64>>) -> Option<Rect<f64>> {
    let mut acc: Option<Rect<f64>> = None;
    for b in boxes {
        acc = Some(match acc {
            None => b,
            Some(a) => union_rect(a, b),
        });
    }
    acc
}

fn union_rect(a: Rect<f64>, b: Rect<f64>) -> Rect<f64> {
    let min: Coord<f64> = coord! { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) };
    let max: Coord<f64> = coord! { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) };
    Rect::new(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_support::{collection, feature};
    use crate::search::SearchIndex;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn fit_centers_and_scales_to_the_bounds() {
        let cmd = FitCommand {
            bounds: Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 10.0, y: 10.0 }),
            padding: 2.0,
            max_zoom: 600.0,
        };
        let mut vp = Viewport::default();
        vp.fit(&cmd, 40.0, 20.0);
        assert_close(vp.center_x, 5.0);
        assert_close(vp.center_y, 5.0);
        // Horizontal would allow 3.6, vertical 3.2; the tighter axis wins.
        assert_close(vp.scale, 3.2);
        let [x0, x1] = vp.x_bounds(40.0);
        assert!(x0 < 0.0 && x1 > 10.0);
        let [y0, y1] = vp.y_bounds(20.0);
        assert!(y0 <= 0.0 && y1 >= 10.0);
    }

    #[test]
    fn fit_respects_the_zoom_ceiling() {
        let cmd = FitCommand {
            bounds: Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 0.001, y: 0.001 }),
            padding: 2.0,
            max_zoom: 600.0,
        };
        let mut vp = Viewport::default();
        vp.fit(&cmd, 40.0, 20.0);
        assert_close(vp.scale, 600.0);
    }

    #[test]
    fn degenerate_bounds_fall_back_to_the_ceiling() {
        let cmd = FitCommand {
            bounds: Rect::new(coord! { x: 3.0, y: 4.0 }, coord! { x: 3.0, y: 4.0 }),
            padding: 2.0,
            max_zoom: 600.0,
        };
        let mut vp = Viewport::default();
        vp.fit(&cmd, 40.0, 20.0);
        assert_close(vp.scale, 600.0);
        assert_close(vp.center_x, 3.0);
        assert_close(vp.center_y, 4.0);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut vp = Viewport::default();
        for _ in 0..200 {
            vp.zoom(10.0);
        }
        assert_close(vp.scale, MAX_SCALE);
        for _ in 0..200 {
            vp.zoom(0.1);
        }
        assert_close(vp.scale, MIN_SCALE);
    }

    #[test]
    fn pan_moves_the_center_in_world_units() {
        let mut vp = Viewport { center_x: 0.0, center_y: 0.0, scale: 4.0 };
        vp.pan(2.0, -1.0);
        assert_close(vp.center_x, 0.5);
        assert_close(vp.center_y, -0.5);
    }

    #[test]
    fn zoom_at_keeps_the_focus_point_in_place() {
        let mut vp = Viewport { center_x: 10.0, center_y: 5.0, scale: 2.0 };
        let (fx, fy) = (12.0, 6.0);
        let before = ((fx - vp.center_x) * vp.scale, (fy - vp.center_y) * vp.scale);
        vp.zoom_at(1.5, fx, fy);
        let after = ((fx - vp.center_x) * vp.scale, (fy - vp.center_y) * vp.scale);
        assert_close(before.0, after.0);
        assert_close(before.1, after.1);
        assert_close(vp.scale, 3.0);
    }

    #[test]
    fn screen_to_world_hits_the_canvas_center() {
        let vp = Viewport { center_x: 121.0, center_y: 14.0, scale: 10.0 };
        let (wx, wy) = vp.screen_to_world(19.5, 9.5, 40.0, 20.0);
        assert_close(wx, 121.0);
        assert_close(wy, 14.0);
    }

    #[test]
    fn screen_to_world_corners_match_the_bounds() {
        let vp = Viewport { center_x: 0.0, center_y: 0.0, scale: 2.0 };
        let (wx, wy) = vp.screen_to_world(0.0, 0.0, 40.0, 20.0);
        let [x0, _] = vp.x_bounds(40.0);
        let [_, y1] = vp.y_bounds(20.0);
        assert!(wx > x0 && wx < 0.0);
        assert!(wy < y1 && wy > 0.0);
    }

    #[test]
    fn selection_bounds_union_only_matching_units() {
        let c = collection(vec![
            feature("P", "ALPHA", "A", 1, 1, &[], (0.0, 0.0)),
            feature("P", "ALPHA", "B", 1, 1, &[], (4.0, 2.0)),
            feature("P", "BETA", "C", 1, 1, &[], (20.0, 20.0)),
        ]);
        let index = SearchIndex::build(&c);
        let entry = index.query("alpha, p").remove(0);
        let cmd = fit_to_selection(&c, &entry).unwrap();
        assert_close(cmd.bounds.min().x, 0.0);
        assert_close(cmd.bounds.min().y, 0.0);
        assert_close(cmd.bounds.max().x, 5.0);
        assert_close(cmd.bounds.max().y, 3.0);
    }

    #[test]
    fn selection_without_matches_yields_no_command() {
        let c = collection(vec![feature("P", "ALPHA", "A", 1, 1, &[], (0.0, 0.0))]);
        let other = collection(vec![feature("Q", "GAMMA", "Z", 1, 1, &[], (0.0, 0.0))]);
        let entry = SearchIndex::build(&other).query("gamma").remove(0);
        assert!(fit_to_selection(&c, &entry).is_none());
    }

    #[test]
    fn empty_collection_has_no_bounds() {
        let c = collection(vec![]);
        assert!(collection_bounds(&c).is_none());
        assert!(fit_whole(&c).is_none());
    }
}
