//! End-of-run summary.

use serde::Serialize;

use xplay_lib::stats::PlaybackStats;

#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub source: &'a str,
    pub duration: Option<f64>,
    pub finished: bool,
    pub wall_seconds: f64,
    pub stats: &'a PlaybackStats,
}

impl Report<'_> {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_text(&self) -> String {
        let stats = self.stats;
        let duration = self
            .duration
            .map(|d| format!("{:.3}s", d))
            .unwrap_or_else(|| "unknown".to_string());
        let mut lines = vec![
            format!("source:           {}", self.source),
            format!("duration:         {}", duration),
            format!("finished:         {}", self.finished),
            format!("wall time:        {:.3}s", self.wall_seconds),
            format!("frames decoded:   {}", stats.frames_decoded),
            format!("frames presented: {}", stats.frames_presented),
            format!(
                "frames dropped:   {} (early {}, late {})",
                stats.total_drops(),
                stats.drops_early,
                stats.drops_late
            ),
            format!("decode errors:    {}", stats.decode_errors),
        ];
        if stats.stale_packets > 0 {
            lines.push(format!("stale packets:    {}", stats.stale_packets));
        }
        lines.join("\n")
    }
}
