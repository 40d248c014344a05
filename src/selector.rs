use rand::Rng;
use std::ops::RangeInclusive;
use thiserror::Error;

const FULL_TURN: f64 = 360.0;
// Keeps the pointer away from segment borders so the landing reads cleanly.
const SEGMENT_MARGIN: f64 = 0.1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectError {
    #[error("cannot pick from an empty candidate list")]
    EmptyCandidates,
}

/// Outcome of a wheel spin: which candidate won and where the wheel stops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelSpin {
    pub index: usize,
    pub rotation_degrees: f64,
}

/// Picks one candidate with probability `1 / candidates.len()`.
pub fn pick<'a, T, R>(candidates: &'a [T], rng: &mut R) -> Result<&'a T, SelectError>
where
    R: Rng + ?Sized,
{
    if candidates.is_empty() {
        return Err(SelectError::EmptyCandidates);
    }
    let index = rng.gen_range(0..candidates.len());
    candidates.get(index).ok_or(SelectError::EmptyCandidates)
}

/// Picks the winner and computes a rotation that lands the top pointer
/// inside the winner's segment after a whole number of extra turns.
pub fn spin_wheel<T, R>(
    candidates: &[T],
    previous_rotation: f64,
    turns: RangeInclusive<u32>,
    rng: &mut R,
) -> Result<WheelSpin, SelectError>
where
    R: Rng + ?Sized,
{
    let indices: Vec<usize> = (0..candidates.len()).collect();
    let index = *pick(&indices, rng)?;

    let segment = segment_degrees(candidates.len());
    let offset = rng.gen_range(SEGMENT_MARGIN..(1.0 - SEGMENT_MARGIN));
    let pointer_angle = (index as f64 + offset) * segment;
    let landing = (FULL_TURN - pointer_angle).rem_euclid(FULL_TURN);

    let extra_turns = if turns.is_empty() {
        0
    } else {
        rng.gen_range(turns)
    };
    let delta = (landing - previous_rotation.rem_euclid(FULL_TURN)).rem_euclid(FULL_TURN);

    Ok(WheelSpin {
        index,
        rotation_degrees: previous_rotation + f64::from(extra_turns) * FULL_TURN + delta,
    })
}

/// Segment under the top pointer for a wheel rotated clockwise by `rotation`.
pub fn segment_at(rotation_degrees: f64, count: usize) -> Option<usize> {
    if count == 0 {
        return None;
    }
    let pointer_angle = (FULL_TURN - rotation_degrees.rem_euclid(FULL_TURN)).rem_euclid(FULL_TURN);
    let index = (pointer_angle / segment_degrees(count)).floor() as usize;
    Some(index.min(count - 1))
}

pub fn segment_degrees(count: usize) -> f64 {
    if count == 0 {
        FULL_TURN
    } else {
        FULL_TURN / count as f64
    }
}
