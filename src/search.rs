use crate::data::{FeatureCollection, UnitProps};
use std::collections::HashSet;

const MAX_RESULTS: usize = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Municipality,
    Barangay,
}

/// A searchable place. Municipality entries stand for every barangay in the
/// municipality; barangay entries pin down a single unit.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchEntry {
    pub label: String,
    pub kind: EntryKind,
    pub province: String,
    pub municipality: String,
    pub barangay: Option<String>,
}

impl SearchEntry {
    /// Whether a map unit belongs to this entry. Names are compared exactly
    /// as they appear in the dataset.
    pub fn matches(&self, props: &UnitProps) -> bool {
        if props.province != self.province || props.municipality != self.municipality {
            return false;
        }
        match self.kind {
            EntryKind::Municipality => true,
            EntryKind::Barangay => self.barangay.as_deref() == Some(props.barangay.as_str()),
        }
    }
}

/// Flat query list built once per collection: deduplicated municipality
/// entries first, then one entry per barangay, each group sorted by label.
pub struct SearchIndex {
    entries: Vec<SearchEntry>,
}

impl SearchIndex {
    pub fn build(collection: &FeatureCollection) -> Self {
        let mut seen = HashSet::new();
        let mut municipalities = Vec::new();
        let mut barangays = Vec::with_capacity(collection.len());
        for feature in &collection.features {
            let props = &feature.props;
            if seen.insert((props.province.clone(), props.municipality.clone())) {
                municipalities.push(SearchEntry {
                    label: format!("{}, {}", props.municipality, props.province).to_lowercase(),
                    kind: EntryKind::Municipality,
                    province: props.province.clone(),
                    municipality: props.municipality.clone(),
                    barangay: None,
                });
            }
            barangays.push(SearchEntry {
                label: format!("{}, {}, {}", props.barangay, props.municipality, props.province).to_lowercase(),
                kind: EntryKind::Barangay,
                province: props.province.clone(),
                municipality: props.municipality.clone(),
                barangay: Some(props.barangay.clone()),
            });
        }
        municipalities.sort_by(|a, b| a.label.cmp(&b.label));
        barangays.sort_by(|a, b| a.label.cmp(&b.label));
        municipalities.append(&mut barangays);
        tracing::debug!("search index built with {} entries", municipalities.len());
        Self { entries: municipalities }
    }

    /// Case-insensitive conjunctive substring search. Every whitespace
    /// separated token must occur somewhere in the label. At most
    /// `MAX_RESULTS` entries come back, in index order.
    pub fn query(&self, text: &str) -> Vec<SearchEntry> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        let tokens: Vec<&str> = needle.split_whitespace().collect();
        let mut results = Vec::new();
        for entry in &self.entries {
            if tokens.iter().all(|token| entry.label.contains(token)) {
                results.push(entry.clone());
                if results.len() == MAX_RESULTS {
                    break;
                }
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_support::{collection, feature};
    use crate::data::{Feature, UnitProps};

    fn sample() -> crate::data::FeatureCollection {
        collection(vec![
            feature("RIZAL", "SAN MATEO", "SAN JOSE", 100, 80, &[], (0.0, 0.0)),
            feature("RIZAL", "SAN MATEO", "AMPID", 100, 80, &[], (2.0, 0.0)),
            feature("RIZAL", "BARAS", "SAN JOSE", 100, 80, &[], (4.0, 0.0)),
            feature("LAGUNA", "BAY", "BITIN", 100, 80, &[], (6.0, 0.0)),
        ])
    }

    #[test]
    fn municipalities_come_first_each_group_sorted() {
        let index = SearchIndex::build(&sample());
        assert_eq!(index.entries.len(), 3 + 4);
        let labels: Vec<&str> = index.entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "baras, rizal",
                "bay, laguna",
                "san mateo, rizal",
                "ampid, san mateo, rizal",
                "bitin, bay, laguna",
                "san jose, baras, rizal",
                "san jose, san mateo, rizal",
            ]
        );
    }

    #[test]
    fn duplicate_municipality_rows_collapse_to_one_entry() {
        let c = collection(vec![
            feature("RIZAL", "SAN MATEO", "A", 1, 1, &[], (0.0, 0.0)),
            feature("RIZAL", "SAN MATEO", "B", 1, 1, &[], (2.0, 0.0)),
            feature("RIZAL", "SAN MATEO", "C", 1, 1, &[], (4.0, 0.0)),
        ]);
        let index = SearchIndex::build(&c);
        let munis: Vec<&SearchEntry> = index
            .entries
            .iter()
            .filter(|e| e.kind == EntryKind::Municipality)
            .collect();
        assert_eq!(munis.len(), 1);
    }

    #[test]
    fn empty_and_blank_queries_return_nothing() {
        let index = SearchIndex::build(&sample());
        assert!(index.query("").is_empty());
        assert!(index.query("   ").is_empty());
    }

    #[test]
    fn empty_collection_builds_an_empty_index() {
        let index = SearchIndex::build(&collection(vec![]));
        assert!(index.entries.is_empty());
        assert!(index.query("anything").is_empty());
    }

    #[test]
    fn every_token_must_match() {
        let index = SearchIndex::build(&sample());
        let hits = index.query("san jose");
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|e| e.kind == EntryKind::Barangay));
        assert!(index.query("san bogus").is_empty());
    }

    #[test]
    fn an_extra_token_narrows_the_results() {
        let index = SearchIndex::build(&sample());
        let hits = index.query("san jose baras");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].municipality, "BARAS");
    }

    #[test]
    fn broader_entries_come_before_their_barangays() {
        let index = SearchIndex::build(&sample());
        let hits = index.query("san mateo");
        assert_eq!(hits[0].kind, EntryKind::Municipality);
        assert!(hits[1..].iter().all(|e| e.kind == EntryKind::Barangay));
    }

    #[test]
    fn tokens_match_across_label_parts() {
        let index = SearchIndex::build(&sample());
        // One token from the barangay, one from the province.
        let hits = index.query("bitin laguna");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].barangay.as_deref(), Some("BITIN"));
    }

    #[test]
    fn queries_are_case_insensitive() {
        let index = SearchIndex::build(&sample());
        assert_eq!(index.query("SaN MaTeO").len(), index.query("san mateo").len());
    }

    #[test]
    fn results_are_capped() {
        let features: Vec<Feature> = (0..80)
            .map(|i| {
                feature(
                    "PROV",
                    "MUNI",
                    &format!("SITIO {i:02}"),
                    1,
                    1,
                    &[],
                    (i as f64 * 2.0, 0.0),
                )
            })
            .collect();
        let index = SearchIndex::build(&collection(features));
        assert_eq!(index.query("sitio").len(), 50);
    }

    #[test]
    fn municipality_entry_matches_all_its_units() {
        let index = SearchIndex::build(&sample());
        let muni = index
            .entries
            .iter()
            .find(|e| e.kind == EntryKind::Municipality && e.municipality == "SAN MATEO")
            .unwrap();
        let c = sample();
        let matched: Vec<&str> = c
            .features
            .iter()
            .filter(|f| muni.matches(&f.props))
            .map(|f| f.props.barangay.as_str())
            .collect();
        assert_eq!(matched, vec!["SAN JOSE", "AMPID"]);
    }

    #[test]
    fn barangay_entry_requires_the_full_triple() {
        let index = SearchIndex::build(&sample());
        let leaf = index
            .entries
            .iter()
            .find(|e| e.label == "san jose, baras, rizal")
            .unwrap();
        let c = sample();
        let matched: Vec<&UnitProps> = c
            .features
            .iter()
            .map(|f| &f.props)
            .filter(|p| leaf.matches(p))
            .collect();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].municipality, "BARAS");
    }
}
