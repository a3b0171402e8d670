use super::chain::TrackResult;

/// Picks the result that reached production earliest.
///
/// When no result reached production the first non-null result wins, and an
/// empty result is returned when every input is `None`. Ties keep the earlier
/// input.
pub fn select_best<I>(results: I) -> TrackResult
where
    I: IntoIterator<Item = Option<TrackResult>>,
{
    let mut best: Option<TrackResult> = None;

    for result in results.into_iter().flatten() {
        let current_best = best.as_ref().and_then(|b| b.production_merged_at);

        let replace = match (result.production_merged_at, current_best) {
            (Some(candidate), Some(current)) => candidate < current,
            (Some(_), None) => true,
            (None, _) => best.is_none(),
        };

        if replace {
            best = Some(result);
        }
    }

    best.unwrap_or_default()
}
