//! Selector: picks the most certain track as the cycle's output.

use crate::{filter_bank::FilterBank, track::Track, types::Estimate};

/// Track with the smallest `uncertainty()`; the first one in bank order wins
/// ties. `None` on an empty bank. Pruned and non-finite tracks never qualify.
pub fn most_certain(bank: &FilterBank) -> Option<&Track> {
    let mut best: Option<(&Track, f64)> = None;
    for track in bank.iter().filter(|t| !t.is_pruned()) {
        let u = track.uncertainty();
        if !u.is_finite() {
            continue;
        }
        if best.map_or(true, |(_, bu)| u < bu) {
            best = Some((track, u));
        }
    }
    best.map(|(t, _)| t)
}

/// Snapshot of `track` as a published estimate.
pub fn to_estimate(track: &Track, timestamp: f64, frame_id: &str) -> Estimate {
    Estimate::new(track.id, &track.position(), &track.position_cov(), timestamp, frame_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Measurement, PosCov, PosVec, TrackId, UNESTIMATED_VARIANCE};
    use nalgebra::Vector3;

    fn spawn(bank: &mut FilterBank, x: f64, var: f64) -> TrackId {
        let m = Measurement::new(
            PosVec::new(x, 0.0, 0.0),
            PosCov::from_diagonal(&Vector3::new(var, var, var)),
            0.0,
        );
        bank.insert_with(|id| Track::from_measurement(id, &m, 1.0))
    }

    #[test]
    fn empty_bank_selects_nothing() {
        assert!(most_certain(&FilterBank::new()).is_none());
    }

    #[test]
    fn lowest_uncertainty_wins() {
        let mut bank = FilterBank::new();
        spawn(&mut bank, 0.0, 0.5);
        let best = spawn(&mut bank, 1.0, 0.1);
        spawn(&mut bank, 2.0, 0.3);
        assert_eq!(most_certain(&bank).unwrap().id, best);
    }

    #[test]
    fn ties_go_to_first_in_bank_order() {
        let mut bank = FilterBank::new();
        let first = spawn(&mut bank, 0.0, 0.2);
        spawn(&mut bank, 1.0, 0.2);
        assert_eq!(most_certain(&bank).unwrap().id, first);
    }

    #[test]
    fn pruned_tracks_are_not_candidates() {
        let mut bank = FilterBank::new();
        let best = spawn(&mut bank, 0.0, 0.1);
        let other = spawn(&mut bank, 1.0, 0.2);
        bank.mark_pruned(best);
        assert_eq!(most_certain(&bank).unwrap().id, other);
    }

    #[test]
    fn indefinite_track_is_never_selected() {
        let mut bank = FilterBank::new();
        let broken = spawn(&mut bank, 0.0, 1.0);
        let sound = spawn(&mut bank, 1.0, 0.3);
        let track = bank.get_mut(broken).unwrap();
        for (i, j) in [(0, 1), (0, 2), (1, 2)] {
            track.cov[(i, j)] = -0.9;
            track.cov[(j, i)] = -0.9;
        }
        assert_eq!(most_certain(&bank).unwrap().id, sound);
    }

    #[test]
    fn estimate_carries_position_block() {
        let mut bank = FilterBank::new();
        let id = spawn(&mut bank, 3.0, 0.25);
        let est = to_estimate(bank.get(id).unwrap(), 42.0, "world");
        assert_eq!(est.position, [3.0, 0.0, 0.0]);
        assert_eq!(est.covariance[0], 0.25);
        assert_eq!(est.covariance[3 * 6 + 3], UNESTIMATED_VARIANCE);
        assert_eq!(est.timestamp, 42.0);
    }
}
