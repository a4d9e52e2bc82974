use std::io::Write;

use tm_domain::error::Error;
use tm_sessions::SessionManager;

/// Workbooks named in the report.
const SAMPLE: usize = 3;

/// Sign in, count workbooks, show the first few and sign out.
///
/// Returns `Ok(true)` when the round trip succeeded, `Ok(false)` when it
/// did not. `Err` is reserved for failures writing the report.
pub async fn run<W: Write>(sessions: &SessionManager, out: &mut W) -> anyhow::Result<bool> {
    let credentials = sessions.credentials();
    writeln!(out, "tableau-mcp check")?;
    writeln!(out, "=================\n")?;
    writeln!(out, "  Server: {}", credentials.server_url)?;
    writeln!(out, "  Site:   {}", credentials.site_label())?;
    writeln!(out, "  Auth:   {}\n", credentials.auth_mode())?;

    let outcome = sessions
        .with_session(|session| async move { session.api().list_workbooks(session.auth()).await })
        .await;

    let workbooks = match outcome {
        Ok(workbooks) => workbooks,
        Err(e) => {
            let stage = match e {
                Error::Auth(_) => "Sign-in",
                _ => "List workbooks",
            };
            print_check(out, stage, false, e.to_string())?;
            writeln!(out, "\nCheck failed.")?;
            return Ok(false);
        }
    };

    print_check(out, "Sign-in", true, "authenticated".into())?;
    print_check(
        out,
        "List workbooks",
        true,
        format!("{} workbook(s) visible", workbooks.len()),
    )?;
    for wb in workbooks.iter().take(SAMPLE) {
        writeln!(out, "      - {} ({})", wb.name, wb.id)?;
    }
    if workbooks.len() > SAMPLE {
        writeln!(out, "      ... and {} more", workbooks.len() - SAMPLE)?;
    }
    print_check(out, "Sign-out", true, "session released".into())?;

    writeln!(out, "\nAll checks passed.")?;
    Ok(true)
}

fn print_check<W: Write>(out: &mut W, name: &str, passed: bool, detail: String) -> std::io::Result<()> {
    let status = if passed { "PASS" } else { "FAIL" };
    writeln!(out, "  [{status}] {name}: {detail}")
}
