use crate::data::{Feature, FeatureCollection};

// Floor for the normalization divisor. Keeps all-zero layers stable and
// leaves raw shares untouched whenever the observed maximum stays below it.
const NORMALIZATION_FLOOR: f64 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatKind {
    Votes,
    Share,
    Turnout,
}

impl StatKind {
    pub fn label(self) -> &'static str {
        match self {
            StatKind::Votes => "votes",
            StatKind::Share => "share of voters",
            StatKind::Turnout => "turnout",
        }
    }

    pub fn cycled(self) -> Self {
        match self {
            StatKind::Votes => StatKind::Share,
            StatKind::Share => StatKind::Turnout,
            StatKind::Turnout => StatKind::Votes,
        }
    }
}

/// What the map is currently colored by.
#[derive(Clone, Debug, PartialEq)]
pub struct StatSelector {
    pub candidate_id: String,
    pub kind: StatKind,
}

pub fn votes_for(feature: &Feature, candidate_id: &str) -> u64 {
    feature.props.votes.get(candidate_id).copied().unwrap_or(0)
}

/// Votes for the candidate divided by ballots cast in the unit.
/// Aggregate candidate ids sum several columns upstream, so this can
/// legitimately exceed 1.
pub fn share_for(feature: &Feature, candidate_id: &str) -> f64 {
    let actual = feature.props.actual_voters;
    if actual == 0 {
        return 0.0;
    }
    votes_for(feature, candidate_id) as f64 / actual as f64
}

pub fn turnout_for(feature: &Feature) -> f64 {
    let registered = feature.props.registered_voters;
    if registered == 0 {
        return 0.0;
    }
    feature.props.actual_voters as f64 / registered as f64
}

pub fn stat_for(feature: &Feature, selector: &StatSelector) -> f64 {
    match selector.kind {
        StatKind::Votes => votes_for(feature, &selector.candidate_id) as f64,
        StatKind::Share => share_for(feature, &selector.candidate_id),
        StatKind::Turnout => turnout_for(feature),
    }
}

/// Normalization divisor for the whole collection: the observed maximum of
/// the selected statistic, floored at `NORMALIZATION_FLOOR`.
pub fn max_stat(collection: &FeatureCollection, selector: &StatSelector) -> f64 {
    let mut max = 0.0f64;
    for feature in &collection.features {
        let value = stat_for(feature, selector);
        if value > max {
            max = value;
        }
    }
    max.max(NORMALIZATION_FLOOR)
}

/// Collection-wide sums shown in the summary panel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CollectionTotals {
    pub registered_voters: u64,
    pub actual_voters: u64,
    pub votes: u64,
    pub units: usize,
}

pub fn collection_totals(collection: &FeatureCollection, candidate_id: &str) -> CollectionTotals {
    let mut totals = CollectionTotals {
        units: collection.len(),
        ..CollectionTotals::default()
    };
    for feature in &collection.features {
        totals.registered_voters += feature.props.registered_voters;
        totals.actual_voters += feature.props.actual_voters;
        totals.votes += votes_for(feature, candidate_id);
    }
    totals
}
