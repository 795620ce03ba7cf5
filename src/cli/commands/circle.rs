use circle_core::EventStore;

use crate::cli::args::ParsedArgs;
use crate::cli::format::{format_amount, format_instant, format_money};
use crate::cli::output::{self, render_table, Alignment};
use crate::cli::registry::CommandEntry;
use crate::cli::shell_context::ShellContext;
use crate::errors::{CliError, CommandResult};

use super::print_json;

const USAGE: &str = "circle <new <name> [currency]|list [--json]|backup <circle> [note]|backups <circle>|restore <circle> <backup>>";

pub(crate) fn definitions() -> Vec<CommandEntry> {
    vec![CommandEntry::new(
        "circle",
        "Create, list, back up and restore circles",
        USAGE,
        cmd_circle,
    )]
}

fn cmd_circle(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let Some((sub, rest)) = args.split_first() else {
        return Err(CliError::input(format!("usage: {USAGE}")));
    };
    match sub.to_ascii_lowercase().as_str() {
        "new" => create(context, rest),
        "list" => list(context, rest),
        "backup" => backup(context, rest),
        "backups" => backups(context, rest),
        "restore" => restore(context, rest),
        other => Err(CliError::input(format!("unknown circle subcommand `{other}`"))),
    }
}

fn create(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let parsed = ParsedArgs::parse(args)?;
    parsed.expect_only(&[])?;
    let name = parsed.positional(0, "name")?;
    let currency = parsed
        .positionals()
        .get(1)
        .map(String::as_str)
        .unwrap_or(context.config.currency.as_str())
        .to_string();
    let circle = context.ledger.create_circle(name, &currency)?;
    output::success(format!(
        "Created circle `{}` ({}) {}",
        circle.name, circle.currency, circle.id
    ));
    Ok(())
}

fn list(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let parsed = ParsedArgs::parse(args)?;
    parsed.expect_only(&["json"])?;
    let circles = context.ledger.circles()?;
    if parsed.switch("json") {
        return print_json(&circles);
    }
    if circles.is_empty() {
        output::info("No circles yet. Use `circle new <name>` to create one.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = circles
        .iter()
        .map(|circle| {
            vec![
                circle.name.clone(),
                circle.currency.clone(),
                format_amount(circle.current_balance),
                circle.id.to_string(),
            ]
        })
        .collect();
    output::info(render_table(
        &[
            ("Name", Alignment::Left),
            ("Currency", Alignment::Left),
            ("Balance", Alignment::Right),
            ("Id", Alignment::Left),
        ],
        &rows,
    ));
    Ok(())
}

fn backup(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (reference, note) = args
        .split_first()
        .ok_or_else(|| CliError::input("usage: circle backup <circle> [note]"))?;
    let circle = context.resolve_circle(reference)?;
    let note = (!note.is_empty()).then(|| note.join(" "));
    let info = context
        .ledger
        .store()
        .backup_circle(circle.id, note.as_deref())?;
    output::success(format!("Backup `{}` written for `{}`", info.id, circle.name));
    Ok(())
}

fn backups(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let reference = args
        .first()
        .ok_or_else(|| CliError::input("usage: circle backups <circle>"))?;
    let circle = context.resolve_circle(reference)?;
    let backups = context.ledger.store().list_backups(circle.id)?;
    if backups.is_empty() {
        output::info(format!("No backups for `{}`.", circle.name));
        return Ok(());
    }
    let rows: Vec<Vec<String>> = backups
        .iter()
        .map(|info| {
            vec![
                info.id.clone(),
                info.created_at
                    .map(format_instant)
                    .unwrap_or_else(|| "unknown".into()),
            ]
        })
        .collect();
    output::info(render_table(
        &[("Backup", Alignment::Left), ("Created", Alignment::Left)],
        &rows,
    ));
    Ok(())
}

fn restore(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [reference, backup_id] = args else {
        return Err(CliError::input("usage: circle restore <circle> <backup>"));
    };
    let circle = context.resolve_circle(reference)?;
    let store = context.ledger.store();
    let info = store
        .list_backups(circle.id)?
        .into_iter()
        .find(|info| info.id == *backup_id || info.id.starts_with(*backup_id))
        .ok_or_else(|| CliError::input(format!("no backup `{backup_id}` for `{}`", circle.name)))?;
    let log = store.restore_backup(&info)?;
    let restored = store.circle(circle.id)?;
    output::success(format!(
        "Restored `{}` from `{}`: {} events, balance {}",
        restored.name,
        info.id,
        log.events.len(),
        format_money(restored.current_balance, &restored.currency)
    ));
    Ok(())
}
