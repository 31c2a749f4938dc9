//! Device binding and telemetry command handlers.

use serde::Serialize;
use tabled::Tabled;

use sprig_core::display;
use sprig_core::{EntityId, Sample, SyncCoordinator};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::{plants, util};

// ── Table rows ──────────────────────────────────────────────────────

/// A registered device and the plant it is bound to, if any.
#[derive(Serialize)]
struct DeviceEntry {
    device_id: String,
    label: String,
    plant: Option<EntityId>,
    plant_name: Option<String>,
}

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Plant")]
    plant: String,
}

impl From<&DeviceEntry> for DeviceRow {
    fn from(d: &DeviceEntry) -> Self {
        Self {
            device: d.device_id.clone(),
            label: d.label.clone(),
            plant: match (&d.plant, &d.plant_name) {
                (Some(id), Some(name)) => format!("{name} ({id})"),
                _ => "-".into(),
            },
        }
    }
}

#[derive(Tabled)]
struct SampleRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Temp")]
    temperature: String,
    #[tabled(rename = "Humidity")]
    humidity: String,
    #[tabled(rename = "Soil")]
    soil: String,
}

impl From<&Sample> for SampleRow {
    fn from(s: &Sample) -> Self {
        Self {
            time: s.captured_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            temperature: display::temperature(Some(s.temperature)),
            humidity: display::humidity(Some(s.air_moisture)),
            soil: format!("{:.0}%", s.soil_moisture),
        }
    }
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn list(coordinator: &SyncCoordinator, global: &GlobalOpts) -> Result<(), CliError> {
    let mut diagnostics = coordinator.telemetry_diagnostics();
    let state = coordinator.reload().await?;
    let picker = coordinator.device_picker().await?;
    util::report_diagnostics(&mut diagnostics, global);

    let plants = util::loaded_plants(&state, global)?;
    let entries: Vec<DeviceEntry> = picker
        .entries()
        .into_iter()
        .map(|e| {
            let bound = plants
                .iter()
                .find(|p| p.entity.device_id.as_deref() == Some(e.device_id.as_str()));
            DeviceEntry {
                plant: bound.map(sprig_core::PlantView::id),
                plant_name: bound.map(|p| p.display_name().to_owned()),
                device_id: e.device_id,
                label: e.label,
            }
        })
        .collect();

    let out = output::render_list(
        &global.output,
        &entries,
        |d| DeviceRow::from(d),
        |d| d.device_id.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn bind(
    coordinator: &SyncCoordinator,
    id: i64,
    device: Option<String>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let device_id = match device {
        // Picker labels look like "Alias (device-id)"; a miss is a raw id.
        Some(arg) if arg.ends_with(')') => {
            resolve_label(coordinator, &arg).await?.unwrap_or(arg)
        }
        Some(device_id) => device_id,
        None => choose_device(coordinator).await?,
    };

    let binding = coordinator.bind(EntityId::new(id), &device_id).await?;
    for previous in &binding.displaced {
        output::warn(global, &format!("{device_id} was unbound from plant {previous}"));
    }
    output::status(
        global,
        &format!(
            "{} bound to {}",
            binding.entity.display_name(),
            coordinator.bindings().label_for(&device_id)
        ),
    );
    plants::render_entity(&binding.entity, global)
}

pub async fn unbind(
    coordinator: &SyncCoordinator,
    id: i64,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let entity = coordinator.unbind(EntityId::new(id)).await?;
    output::status(global, &format!("{} has no device now", entity.display_name()));
    Ok(())
}

pub async fn logs(
    coordinator: &SyncCoordinator,
    device: &str,
    limit: usize,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut diagnostics = coordinator.telemetry_diagnostics();
    let samples = coordinator.device_history(device, limit).await;
    util::report_diagnostics(&mut diagnostics, global);

    if samples.is_empty() && !global.quiet {
        output::warn(global, &format!("no readings for {device}"));
    }
    let out = output::render_list(&global.output, &samples, |s| SampleRow::from(s), |s| {
        s.captured_at.to_rfc3339()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Helpers ─────────────────────────────────────────────────────────

async fn resolve_label(
    coordinator: &SyncCoordinator,
    label: &str,
) -> Result<Option<String>, CliError> {
    let picker = coordinator.device_picker().await?;
    Ok(picker.resolve(label).map(str::to_owned))
}

async fn choose_device(coordinator: &SyncCoordinator) -> Result<String, CliError> {
    let picker = coordinator.device_picker().await?;
    if picker.is_empty() {
        return Err(CliError::NotFound {
            resource_type: "device".into(),
            identifier: "(any)".into(),
            list_command: "devices".into(),
        });
    }

    let labels: Vec<&str> = picker.labels().collect();
    let index = util::pick(
        "Device",
        &labels,
        "Pass the device ID: sprig bind <plant> <device>",
    )?;
    labels
        .get(index)
        .and_then(|label| picker.resolve(label))
        .map(str::to_owned)
        .ok_or_else(|| CliError::Internal {
            message: format!("picker returned unknown index {index}"),
        })
}
