//! Prometheus text exposition format.
//!
//! Renders `FleetStats` for scraping by a Prometheus server or a
//! compatible agent.

use crate::aggregator::FleetStats;

/// Render fleet statistics into Prometheus text format.
///
/// Endpoint counts are one gauge with a `status` label; totals by type use
/// a `type` label.
pub fn render_prometheus(stats: &FleetStats) -> String {
    let mut out = String::new();

    out.push_str("# HELP linkwatch_endpoints Monitored endpoints by last known status.\n");
    out.push_str("# TYPE linkwatch_endpoints gauge\n");
    for (status, count) in [
        ("online", stats.online),
        ("slow", stats.slow),
        ("offline", stats.offline),
        ("error", stats.error),
        ("unverified", stats.unverified),
    ] {
        out.push_str(&format!(
            "linkwatch_endpoints{{status=\"{status}\"}} {count}\n"
        ));
    }

    out.push_str("# HELP linkwatch_endpoints_by_type Monitored endpoints by type.\n");
    out.push_str("# TYPE linkwatch_endpoints_by_type gauge\n");
    out.push_str(&format!(
        "linkwatch_endpoints_by_type{{type=\"branch\"}} {}\n",
        stats.branches
    ));
    out.push_str(&format!(
        "linkwatch_endpoints_by_type{{type=\"atm\"}} {}\n",
        stats.atms
    ));

    out.push_str("# HELP linkwatch_endpoints_alarming Endpoints with an active hardware alarm.\n");
    out.push_str("# TYPE linkwatch_endpoints_alarming gauge\n");
    out.push_str(&format!("linkwatch_endpoints_alarming {}\n", stats.alarming));

    out.push_str("# HELP linkwatch_response_time_avg_ms Mean last response time in milliseconds.\n");
    out.push_str("# TYPE linkwatch_response_time_avg_ms gauge\n");
    out.push_str(&format!(
        "linkwatch_response_time_avg_ms {:.2}\n",
        stats.avg_response_time_ms
    ));

    out.push_str("# HELP linkwatch_probe_cycles_total Completed passes over the endpoint list.\n");
    out.push_str("# TYPE linkwatch_probe_cycles_total counter\n");
    out.push_str(&format!("linkwatch_probe_cycles_total {}\n", stats.cycle_count));

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FleetStats {
        FleetStats {
            total: 10,
            online: 6,
            offline: 2,
            slow: 1,
            error: 1,
            unverified: 0,
            branches: 3,
            atms: 7,
            alarming: 2,
            avg_response_time_ms: 123.456,
            cycle_count: 42,
        }
    }

    #[test]
    fn render_contains_help_and_type() {
        let output = render_prometheus(&sample());
        assert!(output.contains("# HELP linkwatch_endpoints "));
        assert!(output.contains("# TYPE linkwatch_endpoints gauge"));
        assert!(output.contains("# TYPE linkwatch_probe_cycles_total counter"));
    }

    #[test]
    fn render_values() {
        let output = render_prometheus(&sample());
        assert!(output.contains("linkwatch_endpoints{status=\"online\"} 6"));
        assert!(output.contains("linkwatch_endpoints{status=\"offline\"} 2"));
        assert!(output.contains("linkwatch_endpoints_by_type{type=\"atm\"} 7"));
        assert!(output.contains("linkwatch_endpoints_alarming 2"));
        assert!(output.contains("linkwatch_response_time_avg_ms 123.46"));
        assert!(output.contains("linkwatch_probe_cycles_total 42"));
    }

    #[test]
    fn render_empty_fleet() {
        let output = render_prometheus(&FleetStats::default());
        assert!(output.contains("linkwatch_endpoints{status=\"unverified\"} 0"));
        assert!(output.contains("linkwatch_response_time_avg_ms 0.00"));
    }
}
