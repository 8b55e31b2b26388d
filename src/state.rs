use crate::color::{ColorMode, Rgb, base_color_or_default};
use crate::data::{self, Candidate, DatasetKind, FeatureCollection};
use crate::map_draw::{HoverEvent, MapLayer, StyleSnapshot};
use crate::search::{SearchEntry, SearchIndex};
use crate::stats::{self, CollectionTotals, StatKind, StatSelector};
use crate::viewport::{self, FitCommand, Viewport};
use anyhow::Result;
use crossterm::event::{KeyCode, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

const PAN_STEP_CELLS: f64 = 2.0;
const ZOOM_IN_FACTOR: f64 = 1.25;
const ZOOM_OUT_FACTOR: f64 = 0.8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Panel {
    Candidates,
    Map,
    Search,
}

/// Central owner of everything the panels share: the active dataset and
/// candidate, the search selection, the hover snapshot and the viewport.
/// Panels render from this state and never talk to each other.
pub struct AppState {
    data_path: PathBuf,
    cache: HashMap<PathBuf, Rc<FeatureCollection>>,

    pub candidates: Vec<Candidate>,
    pub dataset: DatasetKind,
    pub candidate_rows: Vec<usize>,
    pub selected_row: usize,
    pub stat_kind: StatKind,
    pub color_mode: ColorMode,

    pub search_text: String,
    pub search_results: Vec<SearchEntry>,
    pub search_cursor: usize,
    pub selection: Option<SearchEntry>,

    pub collection: Rc<FeatureCollection>,
    pub layer: MapLayer,
    pub index: SearchIndex,
    max_stat: f64,

    pub viewport: Viewport,
    pub pending_fit: Option<FitCommand>,
    pub map_area: Option<Rect>,
    pub hover: Option<HoverEvent>,

    pub active_panel: Panel,
}

impl AppState {
    pub const HELP_TEXT: &'static str = "\
Tab: switch panel
Up/Down: move, Enter: pick
/: search, Esc: clear
1/2: dataset, s: statistic
m: color scale
arrows: pan, +/-: zoom
q: quit";

    pub fn new(data_path: PathBuf, candidates_path: PathBuf, dataset: DatasetKind) -> Result<Self> {
        let candidates = data::load_candidates(&candidates_path)?;
        let collection = Rc::new(data::load_collection(&data_path)?);
        Ok(Self::with_collection(candidates, collection, dataset, data_path))
    }

    pub(crate) fn with_collection(
        candidates: Vec<Candidate>,
        collection: Rc<FeatureCollection>,
        dataset: DatasetKind,
        data_path: PathBuf,
    ) -> Self {
        let mut cache = HashMap::new();
        cache.insert(data_path.clone(), Rc::clone(&collection));
        let layer = MapLayer::build(Rc::clone(&collection));
        let index = SearchIndex::build(&collection);
        let mut state = Self {
            data_path,
            cache,
            candidates,
            dataset,
            candidate_rows: Vec::new(),
            selected_row: 0,
            stat_kind: StatKind::Share,
            color_mode: ColorMode::SingleHue,
            search_text: String::new(),
            search_results: Vec::new(),
            search_cursor: 0,
            selection: None,
            collection,
            layer,
            index,
            max_stat: 1.0,
            viewport: Viewport::default(),
            pending_fit: None,
            map_area: None,
            hover: None,
            active_panel: Panel::Candidates,
        };
        state.candidate_rows = state.rows_for(state.dataset);
        state.refresh_normalization();
        state.restyle();
        state.pending_fit = viewport::fit_whole(&state.collection);
        state
    }

    fn rows_for(&self, dataset: DatasetKind) -> Vec<usize> {
        self.candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.dataset_type == dataset)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn active_candidate(&self) -> Option<&Candidate> {
        self.candidate_rows
            .get(self.selected_row)
            .map(|&i| &self.candidates[i])
    }

    pub fn max_stat(&self) -> f64 {
        self.max_stat
    }

    pub fn totals(&self) -> CollectionTotals {
        let id = self.active_candidate().map(|c| c.id.as_str()).unwrap_or("");
        stats::collection_totals(&self.collection, id)
    }

    fn stat_selector(&self) -> StatSelector {
        StatSelector {
            candidate_id: self
                .active_candidate()
                .map(|c| c.id.clone())
                .unwrap_or_default(),
            kind: self.stat_kind,
        }
    }

    fn base_color(&self) -> Rgb {
        base_color_or_default(self.active_candidate().map(|c| c.color.as_str()).unwrap_or(""))
    }

    fn snapshot(&self) -> StyleSnapshot {
        StyleSnapshot {
            stat: self.stat_selector(),
            mode: self.color_mode,
            base_color: self.base_color(),
            max_stat: self.max_stat,
            selection: self.selection.clone(),
        }
    }

    fn refresh_normalization(&mut self) {
        self.max_stat = stats::max_stat(&self.collection, &self.stat_selector());
    }

    fn restyle(&mut self) {
        let snapshot = self.snapshot();
        self.layer.restyle(&snapshot);
    }

    fn load_cached(&mut self, path: &PathBuf) -> Result<Rc<FeatureCollection>> {
        if let Some(found) = self.cache.get(path) {
            return Ok(Rc::clone(found));
        }
        let loaded = Rc::new(data::load_collection(path)?);
        self.cache.insert(path.clone(), Rc::clone(&loaded));
        Ok(loaded)
    }

    /// Swaps the vote table. The collection comes from the cache after the
    /// first load; the layer and index are rebuilt, never patched, and the
    /// hover snapshot is dropped with them. An existing search selection is
    /// kept even if it no longer matches.
    pub fn set_dataset(&mut self, dataset: DatasetKind) {
        if self.dataset == dataset {
            return;
        }
        let path = self.data_path.clone();
        match self.load_cached(&path) {
            Ok(collection) => {
                self.dataset = dataset;
                self.collection = collection;
                self.layer = MapLayer::build(Rc::clone(&self.collection));
                self.index = SearchIndex::build(&self.collection);
                self.hover = None;
                self.candidate_rows = self.rows_for(dataset);
                self.selected_row = 0;
                self.search_results = self.index.query(&self.search_text);
                self.search_cursor = 0;
                self.refresh_normalization();
                self.restyle();
                self.pending_fit = viewport::fit_whole(&self.collection);
            }
            Err(err) => tracing::error!("failed to switch dataset: {err:#}"),
        }
    }

    fn select_candidate_row(&mut self, row: usize) {
        if row >= self.candidate_rows.len() || row == self.selected_row {
            return;
        }
        self.selected_row = row;
        self.refresh_normalization();
        self.restyle();
    }

    fn cycle_stat_kind(&mut self) {
        self.stat_kind = self.stat_kind.cycled();
        self.refresh_normalization();
        self.restyle();
    }

    // Color mode changes never touch the normalization divisor.
    fn toggle_color_mode(&mut self) {
        self.color_mode = self.color_mode.toggled();
        self.restyle();
    }

    fn edit_search(&mut self, edit: impl FnOnce(&mut String)) {
        edit(&mut self.search_text);
        self.search_results = self.index.query(&self.search_text);
        self.search_cursor = 0;
        if self.selection.is_some() {
            self.selection = None;
            self.restyle();
        }
    }

    fn choose_search_result(&mut self) {
        let Some(entry) = self.search_results.get(self.search_cursor).cloned() else {
            return;
        };
        if let Some(cmd) = viewport::fit_to_selection(&self.collection, &entry) {
            self.pending_fit = Some(cmd);
        }
        self.selection = Some(entry);
        self.restyle();
    }

    fn clear_selection(&mut self) {
        if self.selection.take().is_some() {
            self.restyle();
        }
    }

    /// Returns true when the app should quit.
    pub fn handle_key(&mut self, key: KeyCode) -> bool {
        use KeyCode::*;
        if key == Tab {
            self.active_panel = match self.active_panel {
                Panel::Candidates => Panel::Map,
                Panel::Map => Panel::Search,
                Panel::Search => Panel::Candidates,
            };
            return false;
        }

        if self.active_panel == Panel::Search {
            match key {
                Char(c) => self.edit_search(|text| text.push(c)),
                Backspace => self.edit_search(|text| {
                    text.pop();
                }),
                Up => self.search_cursor = self.search_cursor.saturating_sub(1),
                Down => {
                    if self.search_cursor + 1 < self.search_results.len() {
                        self.search_cursor += 1;
                    }
                }
                Enter => self.choose_search_result(),
                Esc => {
                    if self.selection.is_some() {
                        self.clear_selection();
                    } else if !self.search_text.is_empty() {
                        self.edit_search(|text| text.clear());
                    } else {
                        self.active_panel = Panel::Candidates;
                    }
                }
                _ => {}
            }
            return false;
        }

        match key {
            Char('q') => return true,
            Char('/') => self.active_panel = Panel::Search,
            Char('1') => self.set_dataset(DatasetKind::Senate),
            Char('2') => self.set_dataset(DatasetKind::Partylist),
            Char('m') => self.toggle_color_mode(),
            Char('s') => self.cycle_stat_kind(),
            Esc | Backspace => self.clear_selection(),
            _ => {}
        }

        match self.active_panel {
            Panel::Candidates => match key {
                Up => self.select_candidate_row(self.selected_row.saturating_sub(1)),
                Down => self.select_candidate_row(self.selected_row + 1),
                _ => {}
            },
            Panel::Map => match key {
                Left => self.viewport.pan(-PAN_STEP_CELLS, 0.0),
                Right => self.viewport.pan(PAN_STEP_CELLS, 0.0),
                Up => self.viewport.pan(0.0, PAN_STEP_CELLS),
                Down => self.viewport.pan(0.0, -PAN_STEP_CELLS),
                Char('+') | Char('=') => self.viewport.zoom(ZOOM_IN_FACTOR),
                Char('-') => self.viewport.zoom(ZOOM_OUT_FACTOR),
                _ => {}
            },
            Panel::Search => {}
        }
        false
    }

    pub fn handle_mouse(&mut self, event: MouseEvent) {
        match event.kind {
            MouseEventKind::Moved | MouseEventKind::Drag(_) => {
                self.pointer_moved(event.column, event.row)
            }
            MouseEventKind::ScrollUp => self.zoom_at_cell(event.column, event.row, ZOOM_IN_FACTOR),
            MouseEventKind::ScrollDown => self.zoom_at_cell(event.column, event.row, ZOOM_OUT_FACTOR),
            _ => {}
        }
    }

    // Wheel zoom keeps the unit under the pointer in place.
    fn zoom_at_cell(&mut self, col: u16, row: u16, factor: f64) {
        if !self.cell_in_map(col, row) {
            return;
        }
        let Some(area) = self.map_area else { return };
        let (wx, wy) = self.viewport.screen_to_world(
            (col - area.x) as f64,
            (row - area.y) as f64,
            area.width as f64,
            area.height as f64,
        );
        self.viewport.zoom_at(factor, wx, wy);
    }

    fn cell_in_map(&self, col: u16, row: u16) -> bool {
        self.map_area.is_some_and(|area| {
            col >= area.x && col < area.x + area.width && row >= area.y && row < area.y + area.height
        })
    }

    fn pointer_moved(&mut self, col: u16, row: u16) {
        if !self.cell_in_map(col, row) {
            if self.layer.hovered().is_some() {
                self.layer.set_hover(None);
            }
            self.hover = None;
            return;
        }
        let area = match self.map_area {
            Some(area) => area,
            None => return,
        };
        let (wx, wy) = self.viewport.screen_to_world(
            (col - area.x) as f64,
            (row - area.y) as f64,
            area.width as f64,
            area.height as f64,
        );
        let hit = self.layer.hit_test(wx, wy);
        if hit != self.layer.hovered() {
            self.layer.set_hover(hit);
        }
        // Re-emit on every move so the tooltip follows the pointer.
        self.hover = hit.map(|idx| HoverEvent {
            props: self.collection.features[idx].props.clone(),
            pointer: (col, row),
        });
    }

    /// Called by the draw path once the map's inner area is known. Applies
    /// at most one deferred fit per selection change.
    pub fn apply_pending_fit(&mut self, area: Rect) {
        self.map_area = Some(area);
        if let Some(cmd) = self.pending_fit.take() {
            self.viewport.fit(&cmd, area.width as f64, area.height as f64);
        }
    }
}
