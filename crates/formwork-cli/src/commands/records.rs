use formwork_client::ListQuery;
use formwork_client::objects::derive_primary_value;

use crate::cli::{
    OutputFormat, RecordCreateArgs, RecordGetArgs, RecordListArgs, RecordRemoveArgs,
    RecordUpdateArgs,
};
use crate::client::{AppContext, CliResult, parse_record_data};
use crate::output::{render_page, render_record};

pub(crate) async fn handle_record_list(
    ctx: &AppContext,
    args: RecordListArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let query = ListQuery {
        page: args.page,
        page_size: args.page_size,
        sort_by: args.sort_by,
        sort_order: args.sort_order,
        search: args.search,
    };
    let page = ctx.client.records().list(&args.object_id, &query).await?;
    render_page(&page, format)
}

pub(crate) async fn handle_record_get(
    ctx: &AppContext,
    args: RecordGetArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let record = ctx.client.records().get_by_id(&args.id).await?;
    render_record(&record, format)
}

pub(crate) async fn handle_record_create(
    ctx: &AppContext,
    args: RecordCreateArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let data = parse_record_data(&args.data)?;
    let primary_value = match args.primary_value {
        Some(value) => Some(value),
        None => match ctx.client.objects().list_fields(&args.object_id).await {
            Ok(fields) => derive_primary_value(&data, &fields),
            Err(err) => {
                tracing::warn!(error = %err, "could not load fields; creating without a primary value");
                None
            }
        },
    };
    let record = ctx
        .client
        .records()
        .create(&args.object_id, data, primary_value)
        .await?;
    render_record(&record, format)
}

pub(crate) async fn handle_record_update(
    ctx: &AppContext,
    args: RecordUpdateArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let patch = parse_record_data(&args.data)?;
    let record = ctx
        .client
        .records()
        .update(&args.id, patch, args.primary_value)
        .await?;
    render_record(&record, format)
}

pub(crate) async fn handle_record_remove(ctx: &AppContext, args: RecordRemoveArgs) -> CliResult<()> {
    ctx.client
        .records()
        .delete(&args.id, &args.object_id)
        .await?;
    println!("Record {} deleted.", args.id);
    Ok(())
}
