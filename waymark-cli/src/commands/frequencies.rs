//! Frequencies command - prints the tracking tier table.

use waymark::tracking::TrackingFrequency;

use crate::error::CliError;

/// Print every tier with its cadence and estimated battery cost.
pub fn run(current: TrackingFrequency) -> Result<(), CliError> {
    println!("Tracking Frequencies");
    println!("====================");
    println!();
    println!(
        "  {:<17} {:>9} {:>9} {:>14} {:>12}",
        "tier", "distance", "interval", "deferred", "battery/day"
    );

    for frequency in TrackingFrequency::ALL.iter().rev() {
        println!("{}", format_row(*frequency, *frequency == current));
    }

    println!();
    println!("  * configured tier");
    Ok(())
}

fn format_row(frequency: TrackingFrequency, selected: bool) -> String {
    let config = frequency.config();
    let marker = if selected { '*' } else { ' ' };
    let deferred = format!(
        "{}m/{}min",
        config.deferred_updates_distance_m,
        config.deferred_updates_interval.as_secs() / 60
    );
    let mut row = format!(
        "{} {:<17} {:>8}m {:>6}min {:>14} {:>11.2}%",
        marker,
        frequency.as_str(),
        config.distance_interval_m,
        config.time_interval.as_secs() / 60,
        deferred,
        frequency.estimated_daily_usage_percent()
    );
    if config.significant_change_only {
        row.push_str("  (significant changes only)");
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_marks_selected_tier() {
        assert!(format_row(TrackingFrequency::High, true).starts_with("* high"));
        assert!(format_row(TrackingFrequency::High, false).starts_with("  high"));
    }

    #[test]
    fn test_row_flags_significant_change_tiers() {
        assert!(format_row(TrackingFrequency::UltraEfficient, false)
            .ends_with("(significant changes only)"));
        assert!(!format_row(TrackingFrequency::High, false).contains("significant"));
    }
}
