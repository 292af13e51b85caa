//! Non-interactive command line over [`TodoApp`].

use std::{env, io::Write, path::Path};

use chrono::NaiveDate;
use todo_domain::{Priority, Ranked, Task, TaskStatus};
use todo_storage_json::{Filter, LoadOutcome};
use uuid::Uuid;

use crate::{AppError, AppResult, TodoApp};

const USAGE: &str = "Usage: todo_master_cli <command>\n\
Commands:\n  \
add <title> [--priority low|medium|high|urgent] [--project NAME] [--due YYYY-MM-DD] [--tag TAG]...\n  \
list [--all] [--project NAME] [--status STATUS] [--sort FIELD|-FIELD]\n  \
done <id>\n  \
delete <id>\n  \
search <query>\n  \
projects\n  \
backup\n  \
backups\n  \
restore <backup-file>";

/// Opens the default data directory, runs one command against it and shuts down.
pub fn run_cli() -> AppResult<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        return Err(AppError::Usage(USAGE.into()));
    }
    let mut app = TodoApp::open_default()?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let result = run(args, &mut app, &mut out);
    let shutdown = app.shutdown();
    result.and(shutdown)
}

/// Runs one command. `args` excludes the program name.
pub fn run<I, W>(args: I, app: &mut TodoApp, out: &mut W) -> AppResult<()>
where
    I: IntoIterator<Item = String>,
    W: Write,
{
    let mut args = args.into_iter();
    let command = args.next().ok_or_else(|| AppError::Usage(USAGE.into()))?;
    let rest: Vec<String> = args.collect();

    match command.as_str() {
        "add" => add(&rest, app, out),
        "list" => list(&rest, app, out),
        "done" => {
            let id = resolve_id(app, single(&rest, "done <id>")?)?;
            let task = app.tasks().mark_done(id)?;
            writeln!(out, "Completed: {}", task.title)?;
            Ok(())
        }
        "delete" => {
            let id = resolve_id(app, single(&rest, "delete <id>")?)?;
            let title = app.tasks().get(id).map(|task| task.title).unwrap_or_default();
            app.tasks().delete(id);
            writeln!(out, "Deleted: {title}")?;
            Ok(())
        }
        "search" => {
            let query = rest.join(" ");
            let found = app.tasks().search(&query);
            if found.is_empty() {
                writeln!(out, "No tasks match '{query}'")?;
            }
            for task in &found {
                write_task(out, task)?;
            }
            Ok(())
        }
        "projects" => {
            for stats in app.projects().all_statistics(app.tasks())? {
                writeln!(
                    out,
                    "{:<20} {:>3} tasks {:>3} done {:>5.1}%",
                    stats.project_name, stats.total, stats.completed, stats.completion_rate
                )?;
            }
            Ok(())
        }
        "backup" => {
            let created = app.snapshot()?;
            if created.is_empty() {
                writeln!(out, "Nothing to back up yet")?;
            }
            for path in created {
                writeln!(out, "Backup created: {}", path.display())?;
            }
            Ok(())
        }
        "backups" => {
            let mut backups = app.tasks().store().lock().list_backups()?;
            backups.extend(app.projects().store().lock().list_backups()?);
            if backups.is_empty() {
                writeln!(out, "No backups")?;
            }
            for backup in backups {
                let modified = backup
                    .modified
                    .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".into());
                let kind = backup
                    .slot
                    .map(|slot| format!("#{slot}"))
                    .unwrap_or_else(|| "snapshot".into());
                writeln!(
                    out,
                    "{:<40} {:>8} {:>8} B  {modified}",
                    backup.name, kind, backup.size_bytes
                )?;
            }
            Ok(())
        }
        "restore" => {
            let path = single(&rest, "restore <backup-file>")?;
            let report = app.restore(Path::new(path))?;
            match report.outcome {
                LoadOutcome::Restored { from } => writeln!(
                    out,
                    "Restored {} records from {}",
                    report.loaded,
                    from.display()
                )?,
                _ => writeln!(out, "Restored {} records", report.loaded)?,
            }
            Ok(())
        }
        "help" | "--help" | "-h" => {
            writeln!(out, "{USAGE}")?;
            Ok(())
        }
        other => Err(AppError::Usage(format!("Unknown command '{other}'\n{USAGE}"))),
    }
}

fn add<W: Write>(args: &[String], app: &TodoApp, out: &mut W) -> AppResult<()> {
    let mut title = Vec::new();
    let mut task = Task::new("");
    let mut project = None;
    let mut args = args.iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--priority" => {
                let value = option_value(&mut args, "--priority")?;
                task.priority = Priority::parse(value)
                    .ok_or_else(|| AppError::Usage(format!("Unknown priority '{value}'")))?;
            }
            "--project" => project = Some(option_value(&mut args, "--project")?.to_string()),
            "--due" => {
                let value = option_value(&mut args, "--due")?;
                let due = NaiveDate::parse_from_str(value, "%Y-%m-%d")
                    .map_err(|_| AppError::Usage(format!("Invalid date '{value}', expected YYYY-MM-DD")))?;
                task.due_date = Some(due);
            }
            "--tag" => task.tags.push(option_value(&mut args, "--tag")?.to_string()),
            word => title.push(word),
        }
    }
    if title.is_empty() {
        return Err(AppError::Usage("add <title>".into()));
    }
    task.title = title.join(" ");
    task.project = match project {
        Some(name) => app
            .projects()
            .get_by_name(&name)
            .map(|project| project.name)
            .ok_or_else(|| AppError::Usage(format!("Unknown project '{name}'")))?,
        None => app.tasks().default_project().to_string(),
    };
    let created = app.tasks().create(task)?;
    writeln!(out, "Added: {} ({})", created.title, short_id(created.id))?;
    Ok(())
}

fn list<W: Write>(args: &[String], app: &TodoApp, out: &mut W) -> AppResult<()> {
    let mut filter = Filter::new();
    let mut show_all = false;
    let mut sort = None;
    let mut args = args.iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--all" => show_all = true,
            "--project" => filter = filter.eq("project", option_value(&mut args, "--project")?),
            "--status" => {
                let value = option_value(&mut args, "--status")?;
                let status = TaskStatus::parse(value)
                    .ok_or_else(|| AppError::Usage(format!("Unknown status '{value}'")))?;
                filter = filter.eq("status", status.as_str());
                show_all = true;
            }
            "--sort" => sort = Some(option_value(&mut args, "--sort")?.to_string()),
            other => return Err(AppError::Usage(format!("Unknown list option '{other}'"))),
        }
    }
    if !show_all {
        filter = filter.any_of("status", [TaskStatus::Todo.as_str(), TaskStatus::InProgress.as_str()]);
    }

    let tasks = app.tasks().list(Some(filter), sort.as_deref());
    if tasks.is_empty() {
        writeln!(out, "No tasks")?;
    }
    for task in &tasks {
        write_task(out, task)?;
    }
    Ok(())
}

fn write_task<W: Write>(out: &mut W, task: &Task) -> AppResult<()> {
    let due = task
        .due_date
        .map(|due| format!(" due {due}"))
        .unwrap_or_default();
    writeln!(
        out,
        "{} {} {} {} [{}]{due}",
        short_id(task.id),
        task.status.symbol(),
        task.priority.symbol(),
        task.title,
        task.project
    )?;
    Ok(())
}

fn short_id(id: Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

/// Finds the single task whose id starts with `prefix`.
fn resolve_id(app: &TodoApp, prefix: &str) -> AppResult<Uuid> {
    let needle = prefix.replace('-', "").to_ascii_lowercase();
    if needle.is_empty() {
        return Err(AppError::Usage("Task id must not be empty".into()));
    }
    let matches: Vec<Uuid> = app
        .tasks()
        .all()
        .iter()
        .map(|task| task.id)
        .filter(|id| id.simple().to_string().starts_with(&needle))
        .collect();
    match matches.as_slice() {
        [id] => Ok(*id),
        [] => Err(AppError::Usage(format!("No task with id '{prefix}'"))),
        _ => Err(AppError::Usage(format!("Task id '{prefix}' is ambiguous"))),
    }
}

fn single<'a>(args: &'a [String], usage: &str) -> AppResult<&'a str> {
    match args {
        [value] => Ok(value.as_str()),
        _ => Err(AppError::Usage(usage.into())),
    }
}

fn option_value<'a>(
    args: &mut impl Iterator<Item = &'a String>,
    flag: &str,
) -> AppResult<&'a str> {
    args.next()
        .map(String::as_str)
        .ok_or_else(|| AppError::Usage(format!("{flag} needs a value")))
}
