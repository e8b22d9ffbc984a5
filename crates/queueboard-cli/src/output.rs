//! Output formatting module

use queueboard_app::QueueState;
use queueboard_domain::visible_factor_scores;
use queueboard_types::{AuthData, LegendCategory, OutputFormat, Plant, Result, Settings, Vehicle};
use serde_json::json;

// Positions of the informational factors in the server's raw score list
const JOB_COUNT_INDEX: usize = 3;
const JOB_QTY_INDEX: usize = 4;
const MILEAGE_INDEX: usize = 7;
const JOB_HOURS_INDEX: usize = 8;

fn fmt_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}

fn fmt_minutes(minutes: f64) -> String {
    let minutes = minutes.max(0.0) as u64;
    format!("{}h {}m", minutes / 60, minutes % 60)
}

fn opt_number(value: Option<f64>) -> String {
    fmt_number(value.unwrap_or(0.0))
}

/// Left-aligned text table with a dashed rule under the header
fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&line(headers.to_vec()));
    out.push('\n');
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&line(rule.iter().map(String::as_str).collect()));
    out.push('\n');
    for row in rows {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
        out.push('\n');
    }
    out
}

/// Columns enabled by the display settings, with the cell for each vehicle
fn queue_columns(settings: &Settings) -> Vec<(&'static str, fn(&Vehicle) -> String)> {
    let mut columns: Vec<(&'static str, fn(&Vehicle) -> String)> = Vec::new();
    if settings.show_queue {
        columns.push(("#", |v: &Vehicle| v.rank.to_string()));
    }
    columns.push(("Vehicle", |v: &Vehicle| v.label()));
    if settings.show_available_since {
        columns.push(("Available since", |v: &Vehicle| {
            v.available_since.clone().unwrap_or_else(|| "N/A".to_string())
        }));
    }
    if settings.show_load_qty {
        columns.push(("Load", |v: &Vehicle| {
            format!("{}/{}", opt_number(v.feedback_qty), opt_number(v.load_capacity))
        }));
    }
    if settings.show_score {
        columns.push(("Score", |v: &Vehicle| fmt_number(v.score)));
    }
    if settings.show_job_count {
        columns.push(("Jobs", |v: &Vehicle| opt_number(v.raw_value_at(JOB_COUNT_INDEX))));
    }
    if settings.show_mileage {
        columns.push(("Km", |v: &Vehicle| opt_number(v.raw_value_at(MILEAGE_INDEX))));
    }
    if settings.show_job_quantity {
        columns.push(("Job qty", |v: &Vehicle| opt_number(v.raw_value_at(JOB_QTY_INDEX))));
    }
    if settings.show_job_hours {
        columns.push(("Job hours", |v: &Vehicle| {
            fmt_minutes(v.raw_value_at(JOB_HOURS_INDEX).unwrap_or(0.0))
        }));
    }
    columns
}

fn flags(vehicle: &Vehicle, settings: &Settings) -> String {
    vehicle
        .categories()
        .into_iter()
        .filter(|c| settings.legend_visible(c.label()))
        .map(|c| c.label())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Rank of the session's own vehicle when it is in the queue
fn own_vehicle_rank(state: &QueueState, own_vehicle: Option<&str>) -> Option<u32> {
    let own = own_vehicle?;
    state
        .vehicles
        .iter()
        .find(|v| v.has_vehicle_number(own))
        .map(|v| v.rank)
}

pub fn render_queue(
    state: &QueueState,
    settings: &Settings,
    plant_name: Option<&str>,
    own_vehicle: Option<&str>,
) -> String {
    let mut out = String::new();
    let plant = match (plant_name, state.plant_id.as_deref()) {
        (Some(name), Some(id)) => format!("{} ({})", name, id),
        (None, Some(id)) => id.to_string(),
        _ => "(no plant)".to_string(),
    };
    out.push_str(&format!("Vehicle Queue - {}\n", plant));

    let updated = state
        .last_update
        .map(|t| t.with_timezone(&chrono::Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string());
    out.push_str(&format!("Last update: {}\n", updated));

    let legend: Vec<&str> = LegendCategory::ALL
        .iter()
        .map(|c| c.label())
        .filter(|label| settings.legend.get(*label).copied().unwrap_or(false))
        .collect();
    if !legend.is_empty() {
        out.push_str(&format!("Legend: {}\n", legend.join(" | ")));
    }
    if let Some(ref error) = state.error {
        out.push_str(&format!("Error: {}\n", error));
    }
    out.push('\n');

    if state.vehicles.is_empty() {
        out.push_str("No vehicles in queue\n");
        return out;
    }

    let own_vehicle = own_vehicle.filter(|n| !n.is_empty());
    let columns = queue_columns(settings);
    let mut headers: Vec<&str> = Vec::new();
    if own_vehicle.is_some() {
        headers.push("");
    }
    headers.extend(columns.iter().map(|(h, _)| *h));
    headers.push("Flags");

    let rows: Vec<Vec<String>> = state
        .vehicles
        .iter()
        .map(|v| {
            let mut row: Vec<String> = Vec::new();
            if let Some(own) = own_vehicle {
                row.push(if v.has_vehicle_number(own) { "*" } else { "" }.to_string());
            }
            row.extend(columns.iter().map(|(_, cell)| cell(v)));
            row.push(flags(v, settings));
            row
        })
        .collect();
    out.push_str(&format_table(&headers, &rows));

    if let Some(own) = own_vehicle {
        match own_vehicle_rank(state, Some(own)) {
            Some(rank) => out.push_str(&format!("* your vehicle {} (rank {})\n", own, rank)),
            None => out.push_str(&format!("Your vehicle {} is not in the queue\n", own)),
        }
    }

    if settings.show_factor_scores {
        out.push_str("\nFactor scores\n");
        for vehicle in &state.vehicles {
            let scores = visible_factor_scores(vehicle, settings);
            if scores.is_empty() {
                continue;
            }
            let parts: Vec<String> = scores
                .iter()
                .map(|s| format!("{} {}", s.name, fmt_number(s.factor_score.unwrap_or(s.score))))
                .collect();
            out.push_str(&format!("  {}: {}\n", vehicle.label(), parts.join(", ")));
        }
    }
    out
}

pub fn output_queue(
    output_format: OutputFormat,
    state: &QueueState,
    settings: &Settings,
    plant_name: Option<&str>,
    own_vehicle: Option<&str>,
) -> Result<()> {
    if output_format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&queue_json(state, own_vehicle))?);
    } else {
        print!("{}", render_queue(state, settings, plant_name, own_vehicle));
    }
    Ok(())
}

fn queue_json(state: &QueueState, own_vehicle: Option<&str>) -> serde_json::Value {
    json!({
        "plant_id": state.plant_id,
        "last_update": state.last_update,
        "error": state.error,
        "own_vehicle_number": own_vehicle,
        "own_vehicle_rank": own_vehicle_rank(state, own_vehicle),
        "vehicles": state.vehicles,
    })
}

pub fn output_settings(
    output_format: OutputFormat,
    settings: &Settings,
    service_code: &str,
    restricted: bool,
) -> Result<()> {
    if output_format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(settings)?);
        return Ok(());
    }

    println!("Display Settings");
    println!("================");
    println!(
        "Service code:    {}{}",
        service_code,
        if restricted { " (restricted)" } else { "" }
    );
    println!();
    for toggle in queueboard_types::DisplayToggle::ALL {
        println!(
            "{:<20} {:<24} {}",
            toggle.key(),
            toggle.label(),
            if settings.toggle(toggle) { "on" } else { "off" }
        );
    }

    println!("\nFactor scores:");
    let rows: Vec<Vec<String>> = settings
        .factor_scores
        .iter()
        .map(|f| {
            vec![
                f.factor_id.to_string(),
                f.name.clone(),
                f.priority.to_string(),
                if f.show { "shown" } else { "hidden" }.to_string(),
            ]
        })
        .collect();
    print!("{}", format_table(&["ID", "Name", "Priority", "Visibility"], &rows));

    println!("\nLegend:");
    for label in LegendCategory::ALL.iter().map(|c| c.label()) {
        if let Some(visible) = settings.legend.get(label) {
            println!("  {:<22} {}", label, if *visible { "shown" } else { "hidden" });
        }
    }
    Ok(())
}

pub fn output_plants(output_format: OutputFormat, plants: &[Plant]) -> Result<()> {
    if output_format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(plants)?);
        return Ok(());
    }

    if plants.is_empty() {
        println!("No plants available");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = plants
        .iter()
        .map(|p| vec![p.id.clone(), p.name.clone()])
        .collect();
    print!("{}", format_table(&["ID", "Name"], &rows));
    Ok(())
}

fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{}****", visible)
    }
}

pub fn output_session(output_format: OutputFormat, auth: Option<&AuthData>) -> Result<()> {
    let Some(auth) = auth else {
        println!("No session stored");
        return Ok(());
    };

    if output_format == OutputFormat::Json {
        let mut masked = auth.clone();
        masked.api_key = masked.api_key.as_deref().map(mask);
        masked.jwt_token = masked.jwt_token.as_deref().map(mask);
        masked.refresh_token = masked.refresh_token.as_deref().map(mask);
        println!("{}", serde_json::to_string_pretty(&masked)?);
        return Ok(());
    }

    let or_none = |v: Option<&str>| v.unwrap_or("(none)").to_string();
    println!("Session");
    println!("=======");
    println!("API key:         {}", auth.api_key.as_deref().map(mask).unwrap_or_else(|| "(none)".to_string()));
    println!("Service code:    {}", or_none(auth.effective_service_code()));
    println!("Instance:        {}", or_none(auth.instance()));
    println!("User:            {}", or_none(auth.user_info.user_id_ex.as_deref()));
    println!("Role:            {}", or_none(auth.role()));
    println!("Vehicle number:  {}", or_none(auth.user_info.vehicle_number.as_deref()));
    if let Some(login) = auth.login_time {
        println!("Logged in:       {}", login.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use queueboard_domain::default_settings;
    use queueboard_types::FactorScore;

    fn sample_vehicle() -> Vehicle {
        let raw_score = (0..9)
            .map(|i| FactorScore {
                factor_id: i,
                name: format!("F{}", i),
                priority: i,
                score: 1.0,
                value: Some(i as f64 * 10.0),
                factor_score: None,
            })
            .collect();
        Vehicle {
            rank: 1,
            item: "9131".to_string(),
            score: 10.4715,
            load_capacity: Some(9.5),
            raw_score,
            ..Default::default()
        }
    }

    #[test]
    fn test_render_respects_toggles() {
        let state = QueueState {
            plant_id: Some("7".to_string()),
            vehicles: vec![sample_vehicle()],
            ..Default::default()
        };
        let mut settings = default_settings(None);
        let full = render_queue(&state, &settings, Some("SK"), None);
        assert!(full.contains("Vehicle Queue - SK (7)"));
        assert!(full.contains("Km"));
        assert!(full.contains("10.47"));
        assert!(full.contains("1h 20m"));
        assert!(full.contains("Recommendation"));

        settings.show_mileage = false;
        settings.show_factor_scores = false;
        settings.legend.insert("Recommendation".to_string(), false);
        let reduced = render_queue(&state, &settings, Some("SK"), None);
        assert!(!reduced.contains("Km"));
        assert!(!reduced.contains("Factor scores"));
        assert!(!reduced.contains("Recommendation"));
    }

    #[test]
    fn test_empty_queue_and_error() {
        let state = QueueState {
            error: Some("Request timed out".to_string()),
            ..Default::default()
        };
        let out = render_queue(&state, &default_settings(None), None, None);
        assert!(out.contains("Error: Request timed out"));
        assert!(out.contains("No vehicles in queue"));
    }

    #[test]
    fn test_legend_follows_display_order() {
        let out = render_queue(&QueueState::default(), &default_settings(None), None, None);
        assert!(out.contains("Legend: Immediate Attention | Recommendation | Priority | Compensate\n"));
    }

    #[test]
    fn test_own_vehicle_is_marked() {
        let mut other = sample_vehicle();
        other.rank = 1;
        other.item = "4410".to_string();
        other.vehicle_number = Some("4410".to_string());
        let mut own = sample_vehicle();
        own.rank = 2;
        own.vehicle_number = Some("9131".to_string());
        let state = QueueState {
            plant_id: Some("7".to_string()),
            vehicles: vec![other, own],
            ..Default::default()
        };
        let settings = default_settings(None);

        let out = render_queue(&state, &settings, Some("SK"), Some("9131"));
        let marked: Vec<&str> = out.lines().filter(|l| l.starts_with('*')).collect();
        assert_eq!(marked.len(), 2);
        assert!(marked[0].contains("9131"));
        assert_eq!(marked[1], "* your vehicle 9131 (rank 2)");

        let value = queue_json(&state, Some("9131"));
        assert_eq!(value["own_vehicle_number"], "9131");
        assert_eq!(value["own_vehicle_rank"], 2);

        let absent = render_queue(&state, &settings, Some("SK"), Some("1000"));
        assert!(absent.contains("Your vehicle 1000 is not in the queue"));
        assert!(queue_json(&state, Some("1000"))["own_vehicle_rank"].is_null());

        let plain = render_queue(&state, &settings, Some("SK"), None);
        assert!(!plain.lines().any(|l| l.starts_with('*')));
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(fmt_number(9.0), "9");
        assert_eq!(fmt_number(0.5556), "0.56");
        assert_eq!(fmt_minutes(219.0), "3h 39m");
        assert_eq!(mask("abcdef123"), "abcd****");
        assert_eq!(mask("abc"), "****");
    }
}
