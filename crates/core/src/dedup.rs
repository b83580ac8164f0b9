//! Collapse candidates describing the same torrent.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::magnet;
use crate::plugin::ScoredCandidate;
use crate::scoring::normalize;

/// Ranking order: score, then seeders, both descending.
pub fn rank_order(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.score.cmp(&a.score).then(b.seeders.cmp(&a.seeders))
}

fn group_key(candidate: &ScoredCandidate) -> String {
    let hash = candidate
        .magnet_uri
        .as_deref()
        .and_then(magnet::info_hash)
        .or_else(|| candidate.info_hash.clone());
    match hash {
        Some(hash) => format!("hash:{}", hash.to_ascii_lowercase()),
        None => format!("title:{}", normalize(&candidate.title)),
    }
}

/// Deduplicate scored candidates.
///
/// Candidates are grouped by info-hash when their magnet yields one, by
/// normalized title otherwise. The best-ranked member of each group is kept;
/// when the group carries several distinct magnets the kept one gets their
/// combination, so its tracker list is the union. The output is ranked and
/// deduplicating it again changes nothing.
pub fn deduplicate(candidates: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<ScoredCandidate>> = Vec::new();

    for candidate in candidates {
        let key = group_key(&candidate);
        match index.get(&key) {
            Some(&i) => groups[i].push(candidate),
            None => {
                index.insert(key, groups.len());
                groups.push(vec![candidate]);
            }
        }
    }

    let mut output: Vec<ScoredCandidate> = groups
        .into_iter()
        .filter_map(|mut group| {
            group.sort_by(rank_order);

            let mut magnets: Vec<&str> = Vec::new();
            for m in group.iter().filter_map(|c| c.magnet_uri.as_deref()) {
                if !m.is_empty() && !magnets.contains(&m) {
                    magnets.push(m);
                }
            }
            let combined = if magnets.len() > 1 {
                magnet::combine(&magnets)
            } else {
                None
            };

            let mut canonical = group.into_iter().next()?;
            if let Some(combined) = combined {
                canonical.magnet_uri = Some(combined);
            }
            if canonical.info_hash.is_none() {
                canonical.info_hash = canonical.magnet_uri.as_deref().and_then(magnet::info_hash);
            }
            Some(canonical)
        })
        .collect();

    output.sort_by(rank_order);
    output
}
