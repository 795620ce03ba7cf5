use circle_core::{NewCheckpoint, NewCredit, NewDebit};
use circle_domain::{Circle, CreditCategory, DebitCategory, LedgerEvent};
use uuid::Uuid;

use crate::cli::args::ParsedArgs;
use crate::cli::format::{format_money, parse_amount, parse_instant};
use crate::cli::output;
use crate::cli::registry::CommandEntry;
use crate::cli::shell_context::ShellContext;
use crate::errors::{CliError, CommandResult};

pub(crate) fn definitions() -> Vec<CommandEntry> {
    vec![
        CommandEntry::new(
            "checkpoint",
            "Declare the absolute balance of a circle",
            "checkpoint <circle> <amount> [--at <time>] [--note <text>]",
            cmd_checkpoint,
        ),
        CommandEntry::new(
            "debit",
            "Record an expense",
            "debit <circle> <amount> [--at <time>] [--category <name>] [--tag <tag>]... [--place <text>]",
            cmd_debit,
        ),
        CommandEntry::new(
            "credit",
            "Record an income",
            "credit <circle> <amount> [--at <time>] [--category <name>] [--tag <tag>]... [--source <text>]",
            cmd_credit,
        ),
        CommandEntry::new(
            "delete",
            "Delete an event and roll back its effects",
            "delete <circle> <event-id>",
            cmd_delete,
        ),
    ]
}

struct EventArgs {
    circle: Circle,
    amount: i64,
    parsed: ParsedArgs,
}

fn event_args(context: &ShellContext, args: &[&str], known: &[&str]) -> Result<EventArgs, CliError> {
    let parsed = ParsedArgs::parse(args)?;
    parsed.expect_only(known)?;
    if parsed.positionals().len() > 2 {
        return Err(CliError::input("too many arguments; quote multi-word values"));
    }
    let circle = context.resolve_circle(parsed.positional(0, "circle")?)?;
    let amount = parse_amount(parsed.positional(1, "amount")?)?;
    Ok(EventArgs {
        circle,
        amount,
        parsed,
    })
}

fn cmd_checkpoint(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let input = event_args(context, args, &["at", "note"])?;
    let event = context.ledger.record_checkpoint(NewCheckpoint {
        circle_id: input.circle.id,
        user_id: context.config.user_id,
        amount: input.amount,
        note: input.parsed.option("note").map(str::to_string),
        at: input.parsed.option("at").map(parse_instant).transpose()?,
    })?;
    report_recorded(context, &event)
}

fn cmd_debit(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let input = event_args(context, args, &["at", "category", "tag", "place"])?;
    let category = input
        .parsed
        .option("category")
        .map(|raw| raw.parse::<DebitCategory>().map_err(CliError::Input))
        .transpose()?
        .unwrap_or_default();
    let event = context.ledger.record_debit(NewDebit {
        circle_id: input.circle.id,
        user_id: context.config.user_id,
        amount: input.amount,
        category,
        tags: input.parsed.all("tag"),
        place: input.parsed.option("place").map(str::to_string),
        at: input.parsed.option("at").map(parse_instant).transpose()?,
    })?;
    report_recorded(context, &event)
}

fn cmd_credit(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let input = event_args(context, args, &["at", "category", "tag", "source"])?;
    let category = input
        .parsed
        .option("category")
        .map(|raw| raw.parse::<CreditCategory>().map_err(CliError::Input))
        .transpose()?
        .unwrap_or_default();
    let event = context.ledger.record_credit(NewCredit {
        circle_id: input.circle.id,
        user_id: context.config.user_id,
        amount: input.amount,
        category,
        tags: input.parsed.all("tag"),
        source: input.parsed.option("source").map(str::to_string),
        at: input.parsed.option("at").map(parse_instant).transpose()?,
    })?;
    report_recorded(context, &event)
}

fn cmd_delete(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [reference, event_id] = args else {
        return Err(CliError::input("usage: delete <circle> <event-id>"));
    };
    let circle = context.resolve_circle(reference)?;
    let event_id = Uuid::parse_str(event_id)
        .map_err(|_| CliError::input(format!("invalid event id `{event_id}`")))?;
    let removed = context.ledger.delete_event(circle.id, event_id)?;
    let circle = context.ledger.circle(circle.id)?;
    output::success(format!("Deleted {} {}", removed.kind(), removed.id));
    output::info(format!(
        "Balance: {}",
        format_money(circle.current_balance, &circle.currency)
    ));
    Ok(())
}

fn report_recorded(context: &ShellContext, event: &LedgerEvent) -> CommandResult {
    let circle = context.ledger.circle(event.circle_id)?;
    output::success(format!("Recorded {} {}", event.kind(), event.id));
    output::info(format!(
        "Balance: {}",
        format_money(circle.current_balance, &circle.currency)
    ));
    Ok(())
}
