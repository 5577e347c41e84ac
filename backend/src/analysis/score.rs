use shared::MessTask;

/// Maps the task count to a 0-100 cleanliness score. Each task costs 10
/// points; the penalty is capped at 80 so a single run can never push the
/// score below 20.
pub fn cleanliness_score(tasks: &[MessTask]) -> u8 {
    let penalty = (tasks.len() as u32 * 10).min(80);
    (100 - penalty).max(20) as u8
}
