//! Bloom-aware question selection.
//!
//! Each stage has a target mix of Bloom levels. Recovery rounds use an easier
//! mix so a struggling examinee sees lower-order questions. Picking is
//! deterministic: the level furthest behind its target share goes next, and
//! within a level the pool's insertion order decides.

use std::collections::{BTreeMap, HashSet};

use crate::model::{BloomLevel, Question, Stage};
use crate::session::QuestionRequest;

/// Target share of each Bloom level, in percent.
pub type BloomMix = &'static [(BloomLevel, u32)];

/// Levels every quiz pool should cover.
pub const REQUIRED_LEVELS: [BloomLevel; 4] = [
    BloomLevel::Remember,
    BloomLevel::Understand,
    BloomLevel::Apply,
    BloomLevel::Analyze,
];

/// Minimum distinct Bloom levels within one stage's pool.
pub const MIN_LEVELS_PER_STAGE: usize = 2;

const EASY: BloomMix = &[
    (BloomLevel::Remember, 50),
    (BloomLevel::Understand, 30),
    (BloomLevel::Apply, 20),
];
const MEDIUM: BloomMix = &[
    (BloomLevel::Understand, 20),
    (BloomLevel::Apply, 40),
    (BloomLevel::Analyze, 30),
    (BloomLevel::Evaluate, 10),
];
const HARD: BloomMix = &[
    (BloomLevel::Apply, 10),
    (BloomLevel::Analyze, 30),
    (BloomLevel::Evaluate, 40),
    (BloomLevel::Create, 20),
];

const EASY_RECOVERY: BloomMix = &[(BloomLevel::Remember, 60), (BloomLevel::Understand, 40)];
const MEDIUM_RECOVERY: BloomMix = &[
    (BloomLevel::Remember, 30),
    (BloomLevel::Understand, 40),
    (BloomLevel::Apply, 30),
];
const HARD_RECOVERY: BloomMix = &[
    (BloomLevel::Understand, 30),
    (BloomLevel::Apply, 40),
    (BloomLevel::Analyze, 30),
];

/// The mix used for an initial round at `stage`.
pub fn stage_mix(stage: Stage) -> BloomMix {
    match stage {
        Stage::Easy => EASY,
        Stage::Medium => MEDIUM,
        Stage::Hard => HARD,
        Stage::Complete => &[],
    }
}

/// The mix used for a recovery round at `stage`.
pub fn recovery_mix(stage: Stage) -> BloomMix {
    match stage {
        Stage::Easy => EASY_RECOVERY,
        Stage::Medium => MEDIUM_RECOVERY,
        Stage::Hard => HARD_RECOVERY,
        Stage::Complete => &[],
    }
}

pub fn mix_for(stage: Stage, is_recovery: bool) -> BloomMix {
    if is_recovery {
        recovery_mix(stage)
    } else {
        stage_mix(stage)
    }
}

/// Count questions per stage and Bloom level.
pub fn bloom_matrix(questions: &[Question]) -> BTreeMap<Stage, BTreeMap<BloomLevel, usize>> {
    let mut matrix: BTreeMap<Stage, BTreeMap<BloomLevel, usize>> = BTreeMap::new();
    for q in questions {
        *matrix
            .entry(q.difficulty_level)
            .or_default()
            .entry(q.bloom_level)
            .or_default() += 1;
    }
    matrix
}

/// Pick the next question for `request` from `pool`.
///
/// Only questions at the requested stage are considered. Excluded questions
/// at that stage count as already asked. A level gets the next pick when
/// `share × (asked + 1) − asked_at_level` is largest, with ties going to the
/// larger share and then the lower level. When no level of the mix has an
/// unused question left, the first unused question at the stage is returned.
pub fn pick_question<'a>(pool: &'a [Question], request: &QuestionRequest) -> Option<&'a Question> {
    let excluded: HashSet<&str> = request.exclude_ids.iter().map(String::as_str).collect();
    let (asked, unused): (Vec<&Question>, Vec<&Question>) = pool
        .iter()
        .filter(|q| q.difficulty_level == request.stage)
        .partition(|q| excluded.contains(q.id.as_str()));

    let mix = mix_for(request.stage, request.is_recovery);
    let asked_at = |level: BloomLevel| asked.iter().filter(|q| q.bloom_level == level).count() as i64;
    let asked_in_mix: i64 = mix.iter().map(|&(level, _)| asked_at(level)).sum();

    let level = mix
        .iter()
        .filter(|(level, _)| unused.iter().any(|q| q.bloom_level == *level))
        .map(|&(level, share)| {
            let deficit = i64::from(share) * (asked_in_mix + 1) - 100 * asked_at(level);
            (level, share, deficit)
        })
        .max_by(|a, b| {
            a.2.cmp(&b.2)
                .then(a.1.cmp(&b.1))
                .then(b.0.cmp(&a.0))
        })
        .map(|(level, _, _)| level);

    match level {
        Some(level) => unused.into_iter().find(|q| q.bloom_level == level),
        None => unused.into_iter().next(),
    }
}
