use serde::Serialize;

use crate::date_util::round_to;
use crate::metrics::{Adviser, BucketSeries, PipelineFunnel, SeriesPoint};
use crate::window::Bucket;

/// Parallel per-bucket arrays for one adviser's charts.
#[derive(Debug, Clone, Serialize)]
pub struct ChartSeries {
    pub adviser_id: i64,
    pub name: String,
    pub initials: String,
    pub talk_mins: Vec<f64>,
    pub quotes_cnt: Vec<i64>,
    pub apps_cnt: Vec<i64>,
    pub apps_val: Vec<f64>,
    pub inforce_val: Vec<f64>,
    pub calls_cnt: Vec<i64>,
}

/// Align every adviser's series to `buckets`, one slot per bucket. Missing
/// buckets read as zero and no adviser is dropped.
pub fn assemble(
    advisers: &[Adviser],
    buckets: &[Bucket],
    series: &BucketSeries,
) -> Vec<ChartSeries> {
    let zero_point = SeriesPoint::default();
    let zero_funnel = PipelineFunnel::default();

    advisers
        .iter()
        .map(|adviser| {
            let points = series.points.get(&adviser.id);
            let funnel = series.funnel.get(&adviser.id);
            let mut out = ChartSeries {
                adviser_id: adviser.id,
                name: adviser.name.clone(),
                initials: adviser.initials(),
                talk_mins: Vec::with_capacity(buckets.len()),
                quotes_cnt: Vec::with_capacity(buckets.len()),
                apps_cnt: Vec::with_capacity(buckets.len()),
                apps_val: Vec::with_capacity(buckets.len()),
                inforce_val: Vec::with_capacity(buckets.len()),
                calls_cnt: Vec::with_capacity(buckets.len()),
            };
            for bucket in buckets {
                let p = points.and_then(|m| m.get(bucket)).unwrap_or(&zero_point);
                let f = funnel.and_then(|m| m.get(bucket)).unwrap_or(&zero_funnel);
                out.talk_mins.push(round_to(p.talk_seconds.trunc() / 60.0, 1));
                out.quotes_cnt.push(p.quotes_count);
                out.apps_cnt.push(p.apps_count);
                out.apps_val.push(p.apps_value);
                out.inforce_val.push(p.inforce_value);
                out.calls_cnt.push(f.contacted);
            }
            out
        })
        .collect()
}
