use std::collections::{BTreeMap, BTreeSet};

use circle_core::{series_labels, AggregationMode, DiffSource, FeedRequest};
use circle_domain::{Circle, Cursor, Granularity, PeriodPoint, PeriodSeries, YearMonth};
use uuid::Uuid;

use crate::cli::args::ParsedArgs;
use crate::cli::format::{
    format_amount, format_instant, format_money, format_signed, parse_date, parse_instant,
};
use crate::cli::output::{self, render_table, Alignment};
use crate::cli::registry::CommandEntry;
use crate::cli::shell_context::ShellContext;
use crate::errors::{CliError, CommandResult};

use super::print_json;

pub(crate) fn definitions() -> Vec<CommandEntry> {
    vec![
        CommandEntry::new(
            "balance",
            "Reconstruct a circle balance, now or at a point in time",
            "balance <circle> [--at <time>] [--json]",
            cmd_balance,
        ),
        CommandEntry::new(
            "history",
            "List events with their running balance",
            "history <circle> [--from <time>] [--json]",
            cmd_history,
        ),
        CommandEntry::new(
            "series",
            "Balance or tag expense series over a window",
            "series <day|week|month> <start> <end> <circle>... [--tags] [--json]",
            cmd_series,
        ),
        CommandEntry::new(
            "total",
            "Summed balance series over circles (all circles when none are named)",
            "total <day|week|month> <start> <end> [circle]... [--json]",
            cmd_total,
        ),
        CommandEntry::new(
            "tags",
            "Rank tags by debit total",
            "tags <circle> [--month <YYYY-MM>] [--top <n>] [--json]",
            cmd_tags,
        ),
        CommandEntry::new(
            "month",
            "Show the cached debit totals of one month",
            "month <circle> <YYYY-MM> [--json]",
            cmd_month,
        ),
        CommandEntry::new(
            "feed",
            "Page backwards through the merged feed of circles",
            "feed <circle>... [--limit <n>] [--cursor <cursor>] [--rescan] [--json]",
            cmd_feed,
        ),
        CommandEntry::new(
            "reconcile",
            "Repair cached balances, checkpoint diffs and monthly totals",
            "reconcile [circle] [--json]",
            cmd_reconcile,
        ),
    ]
}

fn cmd_balance(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let parsed = ParsedArgs::parse(args)?;
    parsed.expect_only(&["at", "json"])?;
    let circle = context.resolve_circle(parsed.positional(0, "circle")?)?;
    let at = parsed.option("at").map(parse_instant).transpose()?;
    let balance = context.ledger.reconstruct_balance(circle.id, at)?;
    if parsed.switch("json") {
        return print_json(&serde_json::json!({
            "circleId": circle.id,
            "at": at,
            "balance": balance,
        }));
    }
    let label = match at {
        Some(instant) => format!("{} at {}", circle.name, format_instant(instant)),
        None => circle.name.clone(),
    };
    output::info(format!("{label}: {}", format_money(balance, &circle.currency)));
    Ok(())
}

fn cmd_history(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let parsed = ParsedArgs::parse(args)?;
    parsed.expect_only(&["from", "json"])?;
    let circle = context.resolve_circle(parsed.positional(0, "circle")?)?;
    let from = parsed.option("from").map(parse_instant).transpose()?;
    let rows = context.ledger.history(circle.id, from, None)?;
    if parsed.switch("json") {
        return print_json(&rows);
    }
    if rows.is_empty() {
        output::info(format!("No events in `{}`.", circle.name));
        return Ok(());
    }
    let table: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            vec![
                format_instant(row.event.timestamp),
                row.event.kind().to_string(),
                format_signed(row.event.signed_amount()),
                format_amount(row.balance_after),
                row.event.tags().join(","),
                row.event.id.to_string(),
            ]
        })
        .collect();
    output::info(render_table(
        &[
            ("Time", Alignment::Left),
            ("Kind", Alignment::Left),
            ("Amount", Alignment::Right),
            ("Balance", Alignment::Right),
            ("Tags", Alignment::Left),
            ("Id", Alignment::Left),
        ],
        &table,
    ));
    Ok(())
}

struct Window {
    granularity: Granularity,
    start: chrono::NaiveDate,
    end: chrono::NaiveDate,
}

fn window(parsed: &ParsedArgs) -> Result<Window, CliError> {
    let granularity = parsed
        .positional(0, "granularity")?
        .parse::<Granularity>()
        .map_err(|_| CliError::input("granularity must be day, week or month"))?;
    Ok(Window {
        granularity,
        start: parse_date(parsed.positional(1, "start")?)?,
        end: parse_date(parsed.positional(2, "end")?)?,
    })
}

fn circles_from(context: &ShellContext, references: &[String]) -> Result<Vec<Circle>, CliError> {
    let mut seen = BTreeSet::new();
    let mut circles = Vec::new();
    for reference in references {
        let circle = context.resolve_circle(reference)?;
        if seen.insert(circle.id) {
            circles.push(circle);
        }
    }
    Ok(circles)
}

fn cmd_series(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let parsed = ParsedArgs::parse(args)?;
    parsed.expect_only(&["tags", "json"])?;
    let window = window(&parsed)?;
    let circles = circles_from(context, parsed.positionals().get(3..).unwrap_or_default())?;
    if circles.is_empty() {
        return Err(CliError::input("name at least one circle"));
    }
    let ids: BTreeSet<Uuid> = circles.iter().map(|circle| circle.id).collect();

    if parsed.switch("tags") {
        let series = context.ledger.aggregate_period(
            &AggregationMode::TagExpenseSum(ids),
            window.granularity,
            window.start,
            window.end,
        )?;
        if parsed.switch("json") {
            return print_json(&series);
        }
        let PeriodSeries::TagExpense(points) = series else {
            return Ok(());
        };
        let rows: Vec<Vec<String>> = points
            .iter()
            .map(|point| {
                vec![
                    point.bucket_key.clone(),
                    point.tag.clone(),
                    format_amount(point.value),
                ]
            })
            .collect();
        output::info(render_table(
            &[
                ("Bucket", Alignment::Left),
                ("Tag", Alignment::Left),
                ("Spent", Alignment::Right),
            ],
            &rows,
        ));
        return Ok(());
    }

    if let [circle] = circles.as_slice() {
        let points = context
            .ledger
            .balance_series(circle.id, window.granularity, window.start, window.end)?;
        if parsed.switch("json") {
            return print_json(&points);
        }
        output::info(render_points(&points));
        return Ok(());
    }

    let points = context.ledger.balance_series_by_circle(
        &ids,
        window.granularity,
        window.start,
        window.end,
    )?;
    if parsed.switch("json") {
        return print_json(&points);
    }
    let names = series_labels(&circles);
    let mut columns = vec![("Bucket", Alignment::Left)];
    columns.extend(names.iter().map(|name| (name.as_str(), Alignment::Right)));
    let rows: Vec<Vec<String>> = points
        .iter()
        .map(|point| {
            let mut row = vec![point.bucket_key.clone()];
            row.extend(names.iter().map(|name| {
                point
                    .series
                    .get(name)
                    .map(|value| format_amount(*value))
                    .unwrap_or_default()
            }));
            row
        })
        .collect();
    output::info(render_table(&columns, &rows));
    Ok(())
}

fn cmd_total(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let parsed = ParsedArgs::parse(args)?;
    parsed.expect_only(&["json"])?;
    let window = window(&parsed)?;
    let named = parsed.positionals().get(3..).unwrap_or_default();
    let circles = if named.is_empty() {
        context.ledger.circles()?
    } else {
        circles_from(context, named)?
    };
    let ids: BTreeSet<Uuid> = circles.iter().map(|circle| circle.id).collect();
    let points =
        context
            .ledger
            .total_balance_series(&ids, window.granularity, window.start, window.end)?;
    if parsed.switch("json") {
        return print_json(&points);
    }
    output::info(render_points(&points));
    Ok(())
}

fn render_points(points: &[PeriodPoint]) -> String {
    let rows: Vec<Vec<String>> = points
        .iter()
        .map(|point| vec![point.bucket_key.clone(), format_amount(point.value)])
        .collect();
    render_table(
        &[("Bucket", Alignment::Left), ("Balance", Alignment::Right)],
        &rows,
    )
}

fn cmd_tags(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let parsed = ParsedArgs::parse(args)?;
    parsed.expect_only(&["month", "top", "json"])?;
    let circle = context.resolve_circle(parsed.positional(0, "circle")?)?;
    let month = parsed.parse_option::<YearMonth>("month")?;
    let top = parsed
        .parse_option::<usize>("top")?
        .unwrap_or(context.config.top_tags);
    let totals = context.ledger.aggregate_tags(circle.id, month, Some(top))?;
    if parsed.switch("json") {
        return print_json(&totals);
    }
    if totals.is_empty() {
        output::info(format!("No debits in `{}`.", circle.name));
        return Ok(());
    }
    let rows: Vec<Vec<String>> = totals
        .iter()
        .map(|total| {
            vec![
                total.tag.clone(),
                format_amount(total.total),
                total.count.to_string(),
            ]
        })
        .collect();
    output::info(render_table(
        &[
            ("Tag", Alignment::Left),
            ("Spent", Alignment::Right),
            ("Debits", Alignment::Right),
        ],
        &rows,
    ));
    Ok(())
}

fn cmd_month(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let parsed = ParsedArgs::parse(args)?;
    parsed.expect_only(&["json"])?;
    let circle = context.resolve_circle(parsed.positional(0, "circle")?)?;
    let raw = parsed.positional(1, "month")?;
    let month: YearMonth = raw
        .parse()
        .map_err(|_| CliError::input(format!("invalid month `{raw}`; expected YYYY-MM")))?;
    let aggregate = context.ledger.monthly_aggregate(circle.id, month)?;
    if parsed.switch("json") {
        return print_json(&aggregate);
    }
    output::info(format!(
        "{} {}: {} spent over {} debits",
        circle.name,
        month,
        format_money(aggregate.total_debits, &circle.currency),
        aggregate.debit_count
    ));
    Ok(())
}

fn cmd_feed(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let parsed = ParsedArgs::parse(args)?;
    parsed.expect_only(&["limit", "cursor", "rescan", "json"])?;
    let circles = circles_from(context, parsed.positionals())?;
    if circles.is_empty() {
        return Err(CliError::input("name at least one circle"));
    }
    let limit = context
        .config
        .page_limit(parsed.parse_option::<usize>("limit")?);
    let mut request = FeedRequest::new(circles.iter().map(|circle| circle.id), limit);
    if let Some(raw) = parsed.option("cursor") {
        let cursor: Cursor = raw
            .parse()
            .map_err(|_| CliError::input(format!("invalid cursor `{raw}`")))?;
        request = request.cursor(cursor);
    }
    if parsed.switch("rescan") {
        request = request.diff_source(DiffSource::Rescan);
    }
    let page = context.ledger.paginate_feed(&request)?;
    if parsed.switch("json") {
        return print_json(&page);
    }
    if page.is_empty() {
        output::info("No more events.");
        return Ok(());
    }

    let names: BTreeMap<Uuid, &str> = circles
        .iter()
        .map(|circle| (circle.id, circle.name.as_str()))
        .collect();
    let rows: Vec<Vec<String>> = page
        .items
        .iter()
        .map(|item| {
            vec![
                format_instant(item.timestamp),
                names.get(&item.circle_id).copied().unwrap_or("?").to_string(),
                item.kind.to_string(),
                format_signed(item.amount),
                item.balance_after.map(format_amount).unwrap_or_default(),
                item.diff_from_previous
                    .map(format_signed)
                    .unwrap_or_default(),
                item.id.to_string(),
            ]
        })
        .collect();
    output::info(render_table(
        &[
            ("Time", Alignment::Left),
            ("Circle", Alignment::Left),
            ("Kind", Alignment::Left),
            ("Amount", Alignment::Right),
            ("Balance", Alignment::Right),
            ("Diff", Alignment::Right),
            ("Id", Alignment::Left),
        ],
        &rows,
    ));
    if let (true, Some(cursor)) = (page.has_more, page.next_cursor) {
        output::info(format!("Next cursor: {cursor}"));
    }
    Ok(())
}

fn cmd_reconcile(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let parsed = ParsedArgs::parse(args)?;
    parsed.expect_only(&["json"])?;
    let outcomes = match parsed.positionals().first() {
        Some(reference) => {
            let circle = context.resolve_circle(reference)?;
            vec![context.ledger.reconcile(circle.id)?]
        }
        None => context.ledger.reconcile_all()?.outcomes,
    };
    if parsed.switch("json") {
        return print_json(&outcomes);
    }
    let mut repaired = 0;
    for outcome in &outcomes {
        if outcome.is_clean() {
            continue;
        }
        repaired += 1;
        let circle = context.ledger.circle(outcome.circle_id)?;
        output::warning(format!(
            "{}: balance {} -> {}, {} checkpoint diffs, monthly totals {}",
            circle.name,
            format_amount(outcome.cached),
            format_amount(outcome.reconstructed),
            outcome.diffs_repaired,
            if outcome.months_repaired { "rebuilt" } else { "ok" }
        ));
    }
    output::success(format!(
        "Reconciled {} circle(s), {} repaired",
        outcomes.len(),
        repaired
    ));
    Ok(())
}
