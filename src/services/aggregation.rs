use std::collections::{BTreeSet, HashMap};

use crate::models::{ItemId, RankedItem, ScoreMap};

/// Every ballot is rescaled so its favourite item scores this much
const MAX_SCORE: f64 = 5.0;

/// Weights below this are treated as exhausted
const WEIGHT_EPSILON: f64 = 1e-12;

/// One provider's score map, rescaled to `[0, MAX_SCORE]`, plus its remaining voting weight
#[derive(Debug, Clone)]
struct Ballot {
    scores: HashMap<ItemId, f64>,
    weight: f64,
}

impl Ballot {
    /// Returns `None` for maps with no positive, finite score
    fn from_scores(scores: &ScoreMap) -> Option<Self> {
        let max = scores
            .values()
            .copied()
            .filter(|s| s.is_finite() && *s > 0.0)
            .fold(0.0_f64, f64::max);

        if max <= 0.0 {
            return None;
        }

        let scores = scores
            .iter()
            .filter(|(_, s)| s.is_finite() && **s > 0.0)
            .map(|(id, s)| (*id, s / max * MAX_SCORE))
            .collect();

        Some(Self {
            scores,
            weight: 1.0,
        })
    }

    fn score(&self, item_id: &ItemId) -> f64 {
        self.scores.get(item_id).copied().unwrap_or(0.0)
    }
}

/// Multi-winner allocated-score election over a set of provider ballots
///
/// Seats are filled one at a time. After each seat the ballots that carried
/// the winner are spent by one quota (ballots / seats), so a provider whose
/// favourites have already won has less say over the following seats.
struct Election {
    ballots: Vec<Ballot>,
    candidates: BTreeSet<ItemId>,
    quota: f64,
}

impl Election {
    fn new(score_maps: &[ScoreMap], seats: usize) -> Self {
        let ballots: Vec<Ballot> = score_maps.iter().filter_map(Ballot::from_scores).collect();
        let candidates = ballots
            .iter()
            .flat_map(|b| b.scores.keys().copied())
            .collect();
        let quota = ballots.len() as f64 / seats.max(1) as f64;

        Self {
            ballots,
            candidates,
            quota,
        }
    }

    fn run(mut self, seats: usize) -> Vec<RankedItem> {
        let mut winners = Vec::with_capacity(seats.min(self.candidates.len()));

        while winners.len() < seats && !self.candidates.is_empty() {
            let seat = self
                .best_candidate(|ballot| ballot.weight)
                // All weight spent: fill the remaining seats by plain support
                .or_else(|| self.best_candidate(|_| 1.0));

            let Some(seat) = seat else { break };

            self.candidates.remove(&seat.item_id);
            self.allocate(&seat.item_id);
            winners.push(seat);
        }

        winners
    }

    /// Highest weighted support among remaining candidates. Candidates are
    /// visited in ascending id order and only a strictly larger total
    /// replaces the leader, so ties go to the smallest id.
    fn best_candidate(&self, weight_of: impl Fn(&Ballot) -> f64) -> Option<RankedItem> {
        let mut best: Option<RankedItem> = None;

        for item_id in &self.candidates {
            let support: f64 = self
                .ballots
                .iter()
                .map(|ballot| weight_of(ballot) * ballot.score(item_id))
                .sum();

            if support <= WEIGHT_EPSILON {
                continue;
            }

            match best {
                Some(current) if support <= current.score => {}
                _ => {
                    best = Some(RankedItem {
                        item_id: *item_id,
                        score: support,
                    })
                }
            }
        }

        best
    }

    /// Spends one quota of weight from the winner's strongest supporters
    fn allocate(&mut self, winner: &ItemId) {
        let mut supporters: Vec<usize> = self
            .ballots
            .iter()
            .enumerate()
            .filter(|(_, b)| b.weight > WEIGHT_EPSILON && b.score(winner) > 0.0)
            .map(|(i, _)| i)
            .collect();

        supporters.sort_by(|a, b| {
            let a_score = self.ballots[*a].score(winner);
            let b_score = self.ballots[*b].score(winner);
            b_score
                .partial_cmp(&a_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(b))
        });

        let mut remaining = self.quota;
        let mut start = 0;

        while start < supporters.len() && remaining > WEIGHT_EPSILON {
            let level = self.ballots[supporters[start]].score(winner);
            let end = supporters[start..]
                .iter()
                .position(|i| self.ballots[*i].score(winner) != level)
                .map_or(supporters.len(), |offset| start + offset);
            let group = &supporters[start..end];

            let group_weight: f64 = group.iter().map(|i| self.ballots[*i].weight).sum();

            if group_weight <= remaining {
                for i in group {
                    self.ballots[*i].weight = 0.0;
                }
                remaining -= group_weight;
            } else {
                // Ballots at the cut-off score share the rest of the quota
                let keep = 1.0 - remaining / group_weight;
                for i in group {
                    let ballot = &mut self.ballots[*i];
                    ballot.weight *= keep;
                    if ballot.weight < WEIGHT_EPSILON {
                        ballot.weight = 0.0;
                    }
                }
                remaining = 0.0;
            }

            start = end;
        }
    }
}

/// Merges provider score maps into at most `k` ranked items.
///
/// Items missing from a map get no support from that provider. Only items
/// with positive support somewhere are ranked, so fewer than `k` items are
/// returned when fewer are available. Each item carries the support that won
/// its seat. Deterministic for identical inputs.
pub fn aggregate(score_maps: &[ScoreMap], k: usize) -> Vec<RankedItem> {
    if k == 0 {
        return Vec::new();
    }

    let winners = Election::new(score_maps, k).run(k);

    tracing::debug!(
        ballots = score_maps.len(),
        seats = k,
        filled = winners.len(),
        "Aggregated provider scores"
    );

    winners
}
