//! Plant command handlers.

use tabled::Tabled;

use sprig_core::display;
use sprig_core::{
    DeviceBindingRegistry, Entity, EntityId, NewEntity, PlantView, SyncCoordinator,
};

use crate::cli::{AddArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
pub(super) struct PlantRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Location")]
    location: String,
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Temp")]
    temperature: String,
    #[tabled(rename = "Humidity")]
    humidity: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

impl PlantRow {
    pub(super) fn new(p: &PlantView, bindings: &DeviceBindingRegistry) -> Self {
        Self {
            id: p.id().to_string(),
            name: p.display_name().to_owned(),
            location: p.entity.location.clone(),
            device: p
                .entity
                .device_id
                .as_deref()
                .map_or_else(|| "-".into(), |d| bindings.label_for(d)),
            temperature: display::temperature(p.readings.temperature),
            humidity: display::humidity(p.readings.humidity),
            updated: display::observed_at(p.readings.observed_at),
        }
    }
}

pub(super) fn render_plants(
    plants: &[PlantView],
    bindings: &DeviceBindingRegistry,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let out = output::render_list(
        &global.output,
        plants,
        |p| PlantRow::new(p, bindings),
        |p| p.id().to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub(super) fn render_entity(entity: &Entity, global: &GlobalOpts) -> Result<(), CliError> {
    let out = output::render_single(
        &global.output,
        entity,
        |e| {
            output::detail(&[
                ("ID", e.id.to_string()),
                ("Name", e.display_name().to_owned()),
                ("Canonical", e.canonical_name.clone()),
                ("Common", e.common_names.clone()),
                ("Location", e.location.clone()),
                ("Confidence", format!("{:.0}%", e.confidence * 100.0)),
                ("Device", e.device_id.clone().unwrap_or_else(|| "-".into())),
                ("Added", e.created_at.format("%Y-%m-%d %H:%M UTC").to_string()),
            ])
        },
        |e| e.id.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn list(coordinator: &SyncCoordinator, global: &GlobalOpts) -> Result<(), CliError> {
    let mut diagnostics = coordinator.telemetry_diagnostics();
    let state = coordinator.reload().await?;
    util::report_diagnostics(&mut diagnostics, global);

    let plants = util::loaded_plants(&state, global)?;
    render_plants(&plants, coordinator.bindings(), global)
}

pub async fn recent(
    coordinator: &SyncCoordinator,
    limit: usize,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut diagnostics = coordinator.telemetry_diagnostics();
    let state = coordinator.reload().await?;
    util::report_diagnostics(&mut diagnostics, global);

    util::loaded_plants(&state, global)?;
    render_plants(&coordinator.recent(limit), coordinator.bindings(), global)
}

pub async fn add(
    coordinator: &SyncCoordinator,
    args: AddArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let entity = coordinator
        .save_entity(NewEntity {
            canonical_name: args.name,
            common_names: args.common_names,
            nickname: args.nickname,
            location: args.location,
            confidence: args.confidence,
            created_at: None,
            device_id: args.device,
            image_path: args.image,
        })
        .await?;
    output::status(global, &format!("Plant {} added", entity.id));
    render_entity(&entity, global)
}

pub async fn rename(
    coordinator: &SyncCoordinator,
    id: i64,
    nickname: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let entity = coordinator.rename(EntityId::new(id), nickname).await?;
    if entity.nickname.is_some() {
        output::status(global, &format!("Plant {id} is now '{}'", entity.display_name()));
    } else {
        output::status(global, &format!("Nickname of plant {id} cleared"));
    }
    Ok(())
}

pub async fn locate(
    coordinator: &SyncCoordinator,
    id: i64,
    location: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let entity = coordinator
        .update_location(EntityId::new(id), location)
        .await?;
    output::status(
        global,
        &format!("{} moved to '{}'", entity.display_name(), entity.location),
    );
    Ok(())
}

pub async fn delete(
    coordinator: &SyncCoordinator,
    id: i64,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let id = EntityId::new(id);
    let entity = coordinator.catalog().get(id).await?;
    let prompt = format!("Delete plant '{}' ({id})?", entity.display_name());
    if !util::confirm(&prompt, global.yes)? {
        return Ok(());
    }

    let removed = coordinator.delete(id).await?;
    if let Some(image) = removed.image_path.as_deref() {
        match std::fs::remove_file(image) {
            Ok(()) => tracing::debug!(image, "removed plant image"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => output::warn(global, &format!("could not remove {image}: {e}")),
        }
    }
    output::status(global, &format!("Plant {id} deleted"));
    Ok(())
}
