//! Output renderers and formatting helpers for CLI commands.

use anyhow::anyhow;
use formwork_api_models::{FieldDefinition, FieldType, ObjectDefinition, Record, RecordPage};
use formwork_client::objects::render_value;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

const CELL_WIDTH: usize = 40;

/// Session summary printed by `formwork status`.
#[derive(Debug, Serialize)]
pub(crate) struct StatusView {
    pub(crate) authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) expires_at: Option<String>,
    pub(crate) remaining_seconds: u64,
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}

pub(crate) fn render_status(status: &StatusView, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(status)?,
        OutputFormat::Table => {
            if !status.authenticated {
                println!("not logged in");
                return Ok(());
            }
            println!("logged in");
            if let Some(subject) = &status.subject {
                println!("subject: {subject}");
            }
            if let Some(email) = &status.email {
                println!("email: {email}");
            }
            if let Some(expires_at) = &status.expires_at {
                println!("expires: {expires_at}");
            }
            println!("remaining: {}", format_duration(status.remaining_seconds));
        }
    }
    Ok(())
}

pub(crate) fn render_page(page: &RecordPage, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(page)?,
        OutputFormat::Table => {
            println!("{:<36} {:<30} DATA", "ID", "PRIMARY");
            for record in &page.records {
                println!(
                    "{:<36} {:<30} {}",
                    record.id,
                    truncate(record.primary_value.as_deref().unwrap_or("-"), 30),
                    truncate(&serde_json::Value::Object(record.data.clone()).to_string(), CELL_WIDTH)
                );
            }
            println!(
                "page {}/{} ({} records)",
                page.page,
                page.page_count().max(1),
                page.total
            );
            if page.has_next() {
                println!("next page: --page {}", page.page + 1);
            }
        }
    }
    Ok(())
}

pub(crate) fn render_record(record: &Record, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(record)?,
        OutputFormat::Table => {
            println!("id: {}", record.id);
            println!("object: {}", record.object_id);
            if let Some(primary) = &record.primary_value {
                println!("primary: {primary}");
            }
            if let Some(created_at) = &record.created_at {
                println!("created: {}", created_at.to_rfc3339());
            }
            if let Some(updated_at) = &record.updated_at {
                println!("updated: {}", updated_at.to_rfc3339());
            }
            println!("data:");
            for (key, value) in &record.data {
                println!("  {key}: {}", render_value(value).unwrap_or_default());
            }
        }
    }
    Ok(())
}

pub(crate) fn render_objects(objects: &[ObjectDefinition], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(objects)?,
        OutputFormat::Table => {
            println!("{:<36} {:<24} LABEL", "ID", "NAME");
            for object in objects {
                println!("{:<36} {:<24} {}", object.id, object.name, object.label);
            }
        }
    }
    Ok(())
}

pub(crate) fn render_fields(fields: &[FieldDefinition], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(fields)?,
        OutputFormat::Table => {
            println!("{:<36} {:<24} {:<12} FLAGS", "ID", "NAME", "TYPE");
            for field in fields {
                let mut flags = Vec::new();
                if field.is_primary {
                    flags.push("primary");
                }
                if field.required {
                    flags.push("required");
                }
                println!(
                    "{:<36} {:<24} {:<12} {}",
                    field.id,
                    field.name,
                    field_type_label(field.field_type),
                    flags.join(",")
                );
            }
        }
    }
    Ok(())
}

#[must_use]
pub(crate) const fn field_type_label(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Text => "text",
        FieldType::LongText => "long_text",
        FieldType::Number => "number",
        FieldType::Boolean => "boolean",
        FieldType::Date => "date",
        FieldType::Datetime => "datetime",
        FieldType::Email => "email",
        FieldType::Phone => "phone",
        FieldType::Url => "url",
        FieldType::Select => "select",
        FieldType::MultiSelect => "multi_select",
        FieldType::Relation => "relation",
        FieldType::Other => "other",
    }
}

#[must_use]
pub(crate) fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3_600;
    let minutes = (seconds % 3_600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else if minutes > 0 {
        format!("{minutes}m {secs:02}s")
    } else {
        format!("{secs}s")
    }
}

#[must_use]
pub(crate) fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut shortened = text.chars().take(width.saturating_sub(1)).collect::<String>();
    shortened.push('…');
    shortened
}
