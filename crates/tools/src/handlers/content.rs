//! Content tools: workbooks, views, search and data sources.

use std::collections::HashMap;

use tm_domain::error::Result;
use tm_domain::tool::ContentBlock;

use super::archive;
use super::format::{byte_size, timestamp, CsvTable, PREVIEW_ROWS};
use super::ToolContext;

pub async fn list_workbooks(ctx: ToolContext) -> Result<Vec<ContentBlock>> {
    let workbooks = ctx.api().list_workbooks(ctx.auth()).await?;
    if workbooks.is_empty() {
        return Ok(vec![ContentBlock::text("No workbooks found on this Tableau site.")]);
    }

    let mut out = format!("## Available Tableau Workbooks ({})\n\n", workbooks.len());
    for wb in &workbooks {
        out.push_str(&format!("- **{}**", wb.name));
        if let Some(desc) = wb.description.as_deref().filter(|d| !d.is_empty()) {
            out.push_str(&format!(" - {desc}"));
        }
        out.push_str(&format!(
            " (ID: {}, Project: {}, Created: {})\n",
            wb.id,
            wb.project_name(),
            timestamp(wb.created_at)
        ));
    }
    Ok(vec![ContentBlock::text(out)])
}

pub async fn list_views(ctx: ToolContext, workbook_id: String) -> Result<Vec<ContentBlock>> {
    let workbook = ctx.api().get_workbook(ctx.auth(), &workbook_id).await?;
    let views = ctx
        .api()
        .list_workbook_views(ctx.auth(), &workbook_id, false)
        .await?;

    if views.is_empty() {
        return Ok(vec![ContentBlock::text(format!(
            "No views found in workbook '{}'.",
            workbook.name
        ))]);
    }

    let mut out = format!("## Views in Workbook '{}'\n\n", workbook.name);
    for view in &views {
        out.push_str(&format!("- **{}** (ID: {})", view.name, view.id));
        if let Some(ref url) = view.content_url {
            out.push_str(&format!(" - URL: {url}"));
        }
        out.push('\n');
    }
    Ok(vec![ContentBlock::text(out)])
}

pub async fn get_view_data(ctx: ToolContext, view_id: String) -> Result<Vec<ContentBlock>> {
    let view = ctx.api().get_view(ctx.auth(), &view_id).await?;
    let csv = ctx.api().view_csv(ctx.auth(), &view_id).await?;
    let table = CsvTable::parse(&csv)?;

    if table.is_empty() {
        return Ok(vec![ContentBlock::text(format!(
            "No data found in view '{}'.",
            view.name
        ))]);
    }

    let mut out = format!("## Data from View '{}'\n\n", view.name);
    out.push_str(&format!("**Columns:** {}\n", table.headers.join(", ")));
    out.push_str(&format!("**Rows:** {}\n\n", table.rows.len()));
    if !table.rows.is_empty() {
        out.push_str(&format!("**Preview (first {PREVIEW_ROWS} rows):**\n\n"));
        out.push_str(&table.preview(PREVIEW_ROWS));
    }

    Ok(vec![
        ContentBlock::text(out),
        ContentBlock::Csv {
            name: format!("views/{view_id}/data"),
            body: csv,
        },
    ])
}

pub async fn get_view_image(ctx: ToolContext, view_id: String) -> Result<Vec<ContentBlock>> {
    let view = ctx.api().get_view(ctx.auth(), &view_id).await?;
    let png = ctx.api().view_image(ctx.auth(), &view_id).await?;
    Ok(vec![
        ContentBlock::text(format!("Image of view '{}' (ID: {})", view.name, view.id)),
        ContentBlock::png(png),
    ])
}

/// Case-insensitive match on workbook name/description and view name.
pub async fn search_content(ctx: ToolContext, query: String) -> Result<Vec<ContentBlock>> {
    let needle = query.to_lowercase();
    let workbooks = ctx.api().list_workbooks(ctx.auth()).await?;
    let views = ctx.api().list_views(ctx.auth()).await?;

    let workbook_names: HashMap<&str, &str> = workbooks
        .iter()
        .map(|wb| (wb.id.as_str(), wb.name.as_str()))
        .collect();

    let matching_workbooks: Vec<_> = workbooks
        .iter()
        .filter(|wb| {
            wb.name.to_lowercase().contains(&needle)
                || wb
                    .description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&needle))
        })
        .collect();
    let matching_views: Vec<_> = views
        .iter()
        .filter(|v| v.name.to_lowercase().contains(&needle))
        .collect();

    let mut out = format!("## Search Results for '{query}'\n\n");
    if !matching_workbooks.is_empty() {
        out.push_str(&format!("### Matching Workbooks ({})\n", matching_workbooks.len()));
        for wb in &matching_workbooks {
            out.push_str(&format!("- **{}** (ID: {})", wb.name, wb.id));
            if let Some(desc) = wb.description.as_deref().filter(|d| !d.is_empty()) {
                out.push_str(&format!(" - {desc}"));
            }
            out.push('\n');
        }
        out.push('\n');
    }
    if !matching_views.is_empty() {
        out.push_str(&format!("### Matching Views ({})\n", matching_views.len()));
        for view in &matching_views {
            let workbook = view
                .workbook
                .as_ref()
                .and_then(|w| workbook_names.get(w.id.as_str()).copied())
                .unwrap_or("unknown workbook");
            out.push_str(&format!(
                "- **{}** (ID: {}, in workbook: {workbook})\n",
                view.name, view.id
            ));
        }
        out.push('\n');
    }
    if matching_workbooks.is_empty() && matching_views.is_empty() {
        out.push_str("No matching content found.\n");
    }

    Ok(vec![ContentBlock::text(out)])
}

pub async fn list_datasources(ctx: ToolContext) -> Result<Vec<ContentBlock>> {
    let datasources = ctx.api().list_datasources(ctx.auth()).await?;
    if datasources.is_empty() {
        return Ok(vec![ContentBlock::text("No data sources found on this Tableau site.")]);
    }

    let mut out = String::from("## Available Tableau Data Sources\n\n");
    for ds in &datasources {
        out.push_str(&format!("- **{}**", ds.name));
        if let Some(desc) = ds.description.as_deref().filter(|d| !d.is_empty()) {
            out.push_str(&format!(" - {desc}"));
        }
        out.push_str(&format!(" (ID: {}, Project: {})", ds.id, ds.project_name()));
        if let Some(ref kind) = ds.kind {
            out.push_str(&format!(" - Type: {kind}"));
        }
        if let Some(size) = ds.size {
            out.push_str(&format!(" - Size: {size} MB"));
        }
        out.push('\n');
    }
    out.push_str(&format!("\n**Total: {} data sources**\n", datasources.len()));
    out.push_str("\nUse `download_datasource` with a data source ID to fetch the full dataset.\n");
    Ok(vec![ContentBlock::text(out)])
}

/// Download the packaged data source, summarise its contents and attach
/// the file when it fits under the configured limit.
pub async fn download_datasource(
    ctx: ToolContext,
    datasource_id: String,
    include_extract: bool,
) -> Result<Vec<ContentBlock>> {
    let datasource = ctx
        .api()
        .get_datasource(ctx.auth(), &datasource_id)
        .await?;

    // Tableau reports data source size in megabytes.
    let limit = ctx.settings().max_download_bytes;
    let advertised = datasource.size.map(|mb| mb.saturating_mul(1024 * 1024));
    if let Some(advertised) = advertised.filter(|&bytes| bytes > limit) {
        tracing::info!(
            datasource = %datasource.name,
            advertised,
            limit,
            "data source over attachment limit, skipping download"
        );
        let mut out = format!("## Data Source '{}' Not Downloaded\n\n", datasource.name);
        out.push_str(&format!("**Reported Size:** {}\n", byte_size(advertised)));
        out.push_str(&format!("**Include Extract:** {include_extract}\n"));
        out.push_str(&format!(
            "\nThe file exceeds the {} attachment limit and was not downloaded.\n",
            byte_size(limit)
        ));
        return Ok(vec![ContentBlock::text(out)]);
    }

    let bytes = ctx
        .api()
        .download_datasource(ctx.auth(), &datasource_id, include_extract)
        .await?;
    let size = bytes.len() as u64;
    tracing::info!(datasource = %datasource.name, size, include_extract, "downloaded data source");

    let mut out = format!("## Downloaded Data Source '{}'\n\n", datasource.name);
    out.push_str(&format!("**File Size:** {}\n", byte_size(size)));
    out.push_str(&format!("**Include Extract:** {include_extract}\n"));

    let extension = match archive::inspect(&bytes) {
        Ok(summary) => {
            out.push_str(&summary.render());
            summary.file_extension()
        }
        Err(e) => {
            out.push_str(&format!("**Note:** could not analyse package contents: {e}\n"));
            "tdsx"
        }
    };

    if size > limit {
        out.push_str(&format!(
            "\nThe file exceeds the {} attachment limit and is not included.\n",
            byte_size(limit)
        ));
        return Ok(vec![ContentBlock::text(out)]);
    }

    let file_name = format!("{}.{extension}", safe_file_stem(&datasource.name));
    out.push_str(&format!("\nAttached as `{file_name}`.\n"));
    Ok(vec![
        ContentBlock::text(out),
        ContentBlock::Binary {
            name: format!("datasources/{datasource_id}/{file_name}"),
            mime_type: "application/octet-stream".into(),
            data: bytes,
        },
    ])
}

fn safe_file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let stem = stem.trim();
    if stem.is_empty() {
        "datasource".to_owned()
    } else {
        stem.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_stems_are_sanitised() {
        assert_eq!(safe_file_stem("Orders/2024: Q1"), "Orders_2024_ Q1");
        assert_eq!(safe_file_stem("  "), "datasource");
    }
}
