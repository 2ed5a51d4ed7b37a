use crate::cli::{FieldsArgs, OutputFormat};
use crate::client::{AppContext, CliResult};
use crate::output::{render_fields, render_objects};

pub(crate) async fn handle_objects_list(ctx: &AppContext, format: OutputFormat) -> CliResult<()> {
    let objects = ctx.client.objects().list_objects().await?;
    render_objects(&objects, format)
}

pub(crate) async fn handle_fields(
    ctx: &AppContext,
    args: FieldsArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let fields = ctx.client.objects().list_fields(&args.object_id).await?;
    render_fields(&fields, format)
}
