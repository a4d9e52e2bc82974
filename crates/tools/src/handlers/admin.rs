//! Administrative audit tools: users, groups, projects, site and
//! permissions.

use std::collections::{BTreeMap, HashMap};

use futures_util::stream::{self, StreamExt};
use tm_domain::error::{Error, Result};
use tm_domain::tool::ContentBlock;
use tm_tableau::{Grantee, GranteeCapabilities, Group, User, View};

use super::format::{humanize, last_login, thousands, timestamp};
use super::ToolContext;

fn capability_lines(grant: &GranteeCapabilities) -> String {
    grant
        .capabilities
        .iter()
        .map(|c| format!("  - {}: {}\n", c.name, c.mode))
        .collect()
}

fn view_count(view: &View) -> u64 {
    view.usage.as_ref().map_or(0, |u| u.total_view_count)
}

/// Per-item lookups (one per group, project or workbook) in flight at once.
const FAN_OUT: usize = 4;

/// Split a sub-lookup result into "failed the whole call" and "failed
/// locally". Session and sign-in failures must reach the session manager;
/// anything else is left for the caller to report as unavailable.
fn local<T>(result: Result<T>) -> Result<Result<T>> {
    match result {
        Err(e @ (Error::SessionExpired(_) | Error::Auth(_))) => Err(e),
        other => Ok(other),
    }
}

/// Member lists for every group, at most [`FAN_OUT`] requests at a time.
/// A group whose members cannot be read maps to `None`.
async fn group_members(ctx: &ToolContext, groups: &[Group]) -> Result<Vec<Option<Vec<User>>>> {
    let results: Vec<Result<Vec<User>>> = stream::iter(
        groups
            .iter()
            .map(|g| ctx.api().list_group_users(ctx.auth(), &g.id))
            .collect::<Vec<_>>(),
    )
        .buffered(FAN_OUT)
        .collect()
        .await;

    results
        .into_iter()
        .zip(groups)
        .map(|(result, group)| match local(result)? {
            Ok(users) => Ok(Some(users)),
            Err(e) => {
                tracing::warn!(group = %group.name, error = %e, "group members unavailable");
                Ok(None)
            }
        })
        .collect()
}

pub async fn list_workbook_permissions(
    ctx: ToolContext,
    workbook_id: String,
) -> Result<Vec<ContentBlock>> {
    let workbook = ctx.api().get_workbook(ctx.auth(), &workbook_id).await?;
    let grants = ctx
        .api()
        .workbook_permissions(ctx.auth(), &workbook_id)
        .await?;

    let mut out = format!("## Permissions for Workbook '{}'\n\n", workbook.name);
    if grants.is_empty() {
        out.push_str("No explicit permissions set (inherits from project).\n\n");
    } else {
        let (user_grants, group_grants): (Vec<_>, Vec<_>) = grants
            .iter()
            .partition(|g| matches!(g.grantee, Grantee::User(_)));

        if !user_grants.is_empty() {
            let users = ctx.api().list_users(ctx.auth()).await?;
            let names: HashMap<&str, &str> = users
                .iter()
                .map(|u| (u.id.as_str(), u.name.as_str()))
                .collect();
            out.push_str("### User Permissions\n");
            for grant in &user_grants {
                if let Grantee::User(ref id) = grant.grantee {
                    let label = names
                        .get(id.as_str())
                        .map(|n| (*n).to_owned())
                        .unwrap_or_else(|| format!("User ID: {id}"));
                    out.push_str(&format!("\n**{label}**\n"));
                    out.push_str(&capability_lines(grant));
                }
            }
            out.push('\n');
        }

        if !group_grants.is_empty() {
            let groups = ctx.api().list_groups(ctx.auth()).await?;
            let names: HashMap<&str, &str> = groups
                .iter()
                .map(|g| (g.id.as_str(), g.name.as_str()))
                .collect();
            out.push_str("### Group Permissions\n");
            for grant in &group_grants {
                if let Grantee::Group(ref id) = grant.grantee {
                    let label = names
                        .get(id.as_str())
                        .map(|n| (*n).to_owned())
                        .unwrap_or_else(|| format!("Group ID: {id}"));
                    out.push_str(&format!("\n**{label}**\n"));
                    out.push_str(&capability_lines(grant));
                }
            }
            out.push('\n');
        }
    }

    out.push_str("### Project Information\n");
    out.push_str(&format!("**Project:** {}\n", workbook.project_name()));
    out.push_str(&format!(
        "**Owner:** {}\n",
        workbook.owner_id().unwrap_or("Unknown")
    ));
    Ok(vec![ContentBlock::text(out)])
}

pub async fn list_all_users(ctx: ToolContext) -> Result<Vec<ContentBlock>> {
    let users = ctx.api().list_users(ctx.auth()).await?;
    if users.is_empty() {
        return Ok(vec![ContentBlock::text("No users found on this Tableau site.")]);
    }

    let mut by_role: BTreeMap<&str, Vec<&User>> = BTreeMap::new();
    for user in &users {
        by_role.entry(user.site_role.as_str()).or_default().push(user);
    }

    let mut out = format!("## All Tableau Users ({} total)\n\n", users.len());
    for (role, members) in &by_role {
        out.push_str(&format!("### {} ({} users)\n", humanize(role), members.len()));
        for user in members {
            out.push_str(&format!("- **{}**", user.name));
            if let Some(full) = user.full_name.as_deref().filter(|f| !f.is_empty()) {
                out.push_str(&format!(" ({full})"));
            }
            out.push_str(&format!(" - Last Login: {}\n", last_login(user.last_login)));
        }
        out.push('\n');
    }
    Ok(vec![ContentBlock::text(out)])
}

pub async fn list_all_groups(ctx: ToolContext) -> Result<Vec<ContentBlock>> {
    let groups = ctx.api().list_groups(ctx.auth()).await?;
    if groups.is_empty() {
        return Ok(vec![ContentBlock::text("No groups found on this Tableau site.")]);
    }
    let members = group_members(&ctx, &groups).await?;

    let mut out = format!("## All Tableau Groups ({} total)\n\n", groups.len());
    for (group, users) in groups.iter().zip(&members) {
        out.push_str(&format!("- **{}** (ID: {})", group.name, group.id));
        if let Some(domain) = group.domain_name() {
            out.push_str(&format!(" (Domain: {domain})"));
        }
        match users {
            Some(users) => out.push_str(&format!(" - {} members\n", users.len())),
            None => out.push_str(" - Member count unavailable\n"),
        }
    }
    Ok(vec![ContentBlock::text(out)])
}

/// Profile, owned workbooks, group memberships and the workbook grants
/// that reach the user directly or through one of their groups.
pub async fn get_user_permissions(ctx: ToolContext, user_id: String) -> Result<Vec<ContentBlock>> {
    let user = ctx.api().get_user(ctx.auth(), &user_id).await?;
    let workbooks = ctx.api().list_workbooks(ctx.auth()).await?;
    let groups = ctx.api().list_user_groups(ctx.auth(), &user_id).await?;

    let mut out = format!("## Permissions for User '{}'\n\n", user.name);
    out.push_str(&format!(
        "**Full Name:** {}\n",
        user.full_name.as_deref().unwrap_or("Not specified")
    ));
    out.push_str(&format!("**Email:** {}\n", user.email.as_deref().unwrap_or("Not specified")));
    out.push_str(&format!("**Site Role:** {}\n", humanize(&user.site_role)));
    out.push_str(&format!("**Last Login:** {}\n\n", last_login(user.last_login)));

    let owned: Vec<_> = workbooks
        .iter()
        .filter(|wb| wb.owner_id() == Some(user.id.as_str()))
        .collect();
    if !owned.is_empty() {
        out.push_str(&format!("### Owned Workbooks ({})\n", owned.len()));
        for wb in &owned {
            out.push_str(&format!("- {} (ID: {})\n", wb.name, wb.id));
        }
        out.push('\n');
    }

    if groups.is_empty() {
        out.push_str("### Group Memberships\nNot a member of any group.\n\n");
    } else {
        out.push_str(&format!("### Group Memberships ({})\n", groups.len()));
        for group in &groups {
            out.push_str(&format!("- {}\n", group.name));
        }
        out.push('\n');
    }

    let group_names: HashMap<&str, &str> = groups
        .iter()
        .map(|g| (g.id.as_str(), g.name.as_str()))
        .collect();
    let grant_sets: Vec<_> = stream::iter(
        workbooks
            .iter()
            .map(|wb| ctx.api().workbook_permissions(ctx.auth(), &wb.id))
            .collect::<Vec<_>>(),
    )
        .buffered(FAN_OUT)
        .collect()
        .await;

    let mut access = String::new();
    let mut granted = 0usize;
    for (wb, grants) in workbooks.iter().zip(grant_sets) {
        let grants = match local(grants)? {
            Ok(grants) => grants,
            Err(e) => {
                tracing::warn!(workbook = %wb.name, error = %e, "workbook permissions unavailable");
                continue;
            }
        };
        let mut lines = String::new();
        for grant in &grants {
            let via = match grant.grantee {
                Grantee::User(ref id) if *id == user.id => "direct".to_owned(),
                Grantee::Group(ref id) => match group_names.get(id.as_str()) {
                    Some(name) => format!("via group {name}"),
                    None => continue,
                },
                Grantee::User(_) => continue,
            };
            let caps: Vec<String> = grant
                .capabilities
                .iter()
                .map(|c| format!("{} {}", c.name, c.mode))
                .collect();
            lines.push_str(&format!("  - {via}: {}\n", caps.join(", ")));
        }
        if !lines.is_empty() {
            granted += 1;
            access.push_str(&format!("**{}**\n{lines}", wb.name));
        }
    }
    if granted > 0 {
        out.push_str(&format!("### Workbook Access ({granted})\n"));
        out.push_str(&access);
    } else {
        out.push_str("### Workbook Access\nNo explicit workbook permissions apply.\n");
    }

    Ok(vec![ContentBlock::text(out)])
}

pub async fn list_projects_permissions(ctx: ToolContext) -> Result<Vec<ContentBlock>> {
    let projects = ctx.api().list_projects(ctx.auth()).await?;
    if projects.is_empty() {
        return Ok(vec![ContentBlock::text("No projects found on this Tableau site.")]);
    }
    let workbooks = ctx.api().list_workbooks(ctx.auth()).await?;

    let mut per_project: HashMap<&str, usize> = HashMap::new();
    for wb in &workbooks {
        if let Some(ref project) = wb.project {
            *per_project.entry(project.id.as_str()).or_default() += 1;
        }
    }

    let rules: Vec<_> = stream::iter(
        projects
            .iter()
            .map(|p| ctx.api().project_permissions(ctx.auth(), &p.id))
            .collect::<Vec<_>>(),
    )
        .buffered(FAN_OUT)
        .collect()
        .await;

    let mut out = format!("## All Projects and Permissions ({} total)\n\n", projects.len());
    for (project, grants) in projects.iter().zip(rules) {
        out.push_str(&format!("### {}\n", project.name));
        out.push_str(&format!(
            "**Description:** {}\n",
            project
                .description
                .as_deref()
                .filter(|d| !d.is_empty())
                .unwrap_or("No description")
        ));
        out.push_str(&format!(
            "**Content Permissions:** {}\n",
            project.content_permissions.as_deref().unwrap_or("Unknown")
        ));
        out.push_str(&format!(
            "**Workbooks:** {}\n",
            per_project.get(project.id.as_str()).copied().unwrap_or(0)
        ));
        match local(grants)? {
            Ok(grants) if grants.is_empty() => {
                out.push_str("**Permissions:** Inherited from parent\n")
            }
            Ok(grants) => {
                out.push_str(&format!("**Explicit Permissions:** {} rules\n", grants.len()))
            }
            Err(e) => {
                tracing::warn!(project = %project.name, error = %e, "project permissions unavailable");
                out.push_str("**Permissions:** Could not retrieve\n");
            }
        }
        out.push('\n');
    }
    Ok(vec![ContentBlock::text(out)])
}

pub async fn get_site_info(ctx: ToolContext) -> Result<Vec<ContentBlock>> {
    let site = ctx.api().get_site(ctx.auth()).await?;
    let users = ctx.api().list_users(ctx.auth()).await?;
    let groups = ctx.api().list_groups(ctx.auth()).await?;
    let projects = ctx.api().list_projects(ctx.auth()).await?;
    let workbooks = ctx.api().list_workbooks(ctx.auth()).await?;
    let datasources = ctx.api().list_datasources(ctx.auth()).await?;

    let content_url = if site.content_url.is_empty() {
        "Default site"
    } else {
        site.content_url.as_str()
    };
    let quota = |q: Option<u64>, unit: &str| match q {
        Some(q) => format!("{}{unit}", thousands(q)),
        None => "Unlimited".to_owned(),
    };

    let mut out = String::from("## Tableau Site Information\n\n");
    out.push_str(&format!("**Site Name:** {}\n", site.name));
    out.push_str(&format!("**Site ID:** {}\n", site.id));
    out.push_str(&format!("**Content URL:** {content_url}\n"));
    out.push_str(&format!(
        "**Admin Mode:** {}\n",
        site.admin_mode.as_deref().map(humanize).unwrap_or_else(|| "Unknown".into())
    ));
    out.push_str(&format!("**State:** {}\n", site.state.as_deref().unwrap_or("Unknown")));
    out.push_str(&format!("**Storage Quota:** {}\n", quota(site.storage_quota, " MB")));
    out.push_str(&format!("**User Quota:** {}\n\n", quota(site.user_quota, "")));

    out.push_str("### Content Summary\n");
    out.push_str(&format!("- **Users:** {}\n", users.len()));
    out.push_str(&format!("- **Groups:** {}\n", groups.len()));
    out.push_str(&format!("- **Projects:** {}\n", projects.len()));
    out.push_str(&format!("- **Workbooks:** {}\n", workbooks.len()));
    out.push_str(&format!("- **Data Sources:** {}\n\n", datasources.len()));

    let mut roles: BTreeMap<&str, usize> = BTreeMap::new();
    for user in &users {
        *roles.entry(user.site_role.as_str()).or_default() += 1;
    }
    out.push_str("### User Roles\n");
    for (role, count) in &roles {
        out.push_str(&format!("- **{}:** {count}\n", humanize(role)));
    }
    Ok(vec![ContentBlock::text(out)])
}

pub async fn audit_workbook_usage(
    ctx: ToolContext,
    workbook_id: String,
) -> Result<Vec<ContentBlock>> {
    let workbook = ctx.api().get_workbook(ctx.auth(), &workbook_id).await?;
    let mut views = ctx
        .api()
        .list_workbook_views(ctx.auth(), &workbook_id, true)
        .await?;

    views.sort_by(|a, b| view_count(b).cmp(&view_count(a)).then_with(|| a.name.cmp(&b.name)));

    let mut out = format!("## Usage Audit for Workbook '{}'\n\n", workbook.name);
    out.push_str(&format!("**Created:** {}\n", timestamp(workbook.created_at)));
    out.push_str(&format!("**Updated:** {}\n", timestamp(workbook.updated_at)));
    out.push_str(&format!(
        "**Size:** {}\n",
        workbook
            .size
            .map(|s| format!("{s} MB"))
            .unwrap_or_else(|| "Unknown".into())
    ));
    out.push_str(&format!("**Project:** {}\n\n", workbook.project_name()));

    if views.is_empty() {
        out.push_str("### Views\nThis workbook has no views.\n\n");
    } else {
        let total: u64 = views.iter().map(view_count).sum();
        out.push_str(&format!("### Views ({}), by total views\n", views.len()));
        for view in &views {
            out.push_str(&format!(
                "- **{}** (ID: {}) - {} views\n",
                view.name,
                view.id,
                thousands(view_count(view))
            ));
        }
        out.push_str(&format!("\n**Total Views:** {}\n", thousands(total)));
        let unused = views.iter().filter(|v| view_count(v) == 0).count();
        if unused > 0 {
            out.push_str(&format!("**Views Never Opened:** {unused}\n"));
        }
        out.push('\n');
    }

    out.push_str("### Access Control\n");
    match local(
        ctx.api()
            .workbook_permissions(ctx.auth(), &workbook_id)
            .await,
    )? {
        Ok(grants) if grants.is_empty() => {
            out.push_str("Inherits permissions from project.\n");
        }
        Ok(grants) => {
            let users = grants
                .iter()
                .filter(|g| matches!(g.grantee, Grantee::User(_)))
                .count();
            let groups = grants.len() - users;
            out.push_str(&format!("**Explicit Permissions:** {} rules\n", grants.len()));
            out.push_str(&format!("**Direct User Access:** {users} users\n"));
            out.push_str(&format!("**Group-based Access:** {groups} groups\n"));
        }
        Err(e) => {
            tracing::warn!(workbook = %workbook.name, error = %e, "workbook permissions unavailable");
            out.push_str(&format!("Could not retrieve permissions: {e}\n"));
        }
    }

    out.push_str(
        "\n**Recommendation:** use `list_workbook_permissions` for detailed access information.\n",
    );
    Ok(vec![ContentBlock::text(out)])
}

pub async fn list_user_groups(ctx: ToolContext, user_id: String) -> Result<Vec<ContentBlock>> {
    let user = ctx.api().get_user(ctx.auth(), &user_id).await?;
    let groups = ctx.api().list_user_groups(ctx.auth(), &user_id).await?;

    let mut out = format!("## Group Memberships for '{}'\n\n", user.name);
    if groups.is_empty() {
        out.push_str(&format!("User '{}' is not a member of any groups.\n", user.name));
        return Ok(vec![ContentBlock::text(out)]);
    }

    let members = group_members(&ctx, &groups).await?;
    out.push_str(&format!("**Total Groups:** {}\n\n", groups.len()));
    for (group, users) in groups.iter().zip(&members) {
        out.push_str(&format!("- **{}**", group.name));
        if let Some(domain) = group.domain_name() {
            out.push_str(&format!(" (Domain: {domain})"));
        }
        if let Some(users) = users {
            let others = users.iter().filter(|u| u.id != user.id).count();
            out.push_str(&format!(" - {others} other members"));
        }
        out.push('\n');
    }
    Ok(vec![ContentBlock::text(out)])
}
