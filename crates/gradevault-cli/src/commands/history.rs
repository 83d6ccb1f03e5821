//! Read-side commands: `list`, `show`, `remove`.

use gradevault_core::{GradebookSnapshot, HistoryEngine, VaultError};

use crate::app::AppContext;
use crate::cli::{ListArgs, RemoveArgs, ShowArgs};
use crate::errors::CliError;
use crate::output::{entries_json, format_grade, format_timestamp, overview_summary};
use crate::ui::{blank_line, header, hint, kv, print, receipt, simple_table, Column};

pub fn handle_list(ctx: &AppContext, args: &ListArgs) -> anyhow::Result<()> {
    let ui = ctx.ui().with_json(args.json);
    let context = ctx.user_context()?;
    let store = ctx.open_verified(&context)?;
    let entries = store.list_history()?;

    if ui.mode.is_json() {
        println!("{}", serde_json::to_string_pretty(&entries_json(&entries))?);
        return Ok(());
    }

    if entries.is_empty() {
        if !ctx.quiet() {
            print(&ui, "No snapshots recorded.");
            print(&ui, &hint(&ui, "gradevault save <FILE>"));
        }
        return Ok(());
    }

    if !ctx.quiet() {
        print(&ui, &header(&ui, "list", Some(context.username())));
        blank_line(&ui);
    }
    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|entry| {
            vec![
                entry.timestamp.to_string(),
                format_timestamp(entry.timestamp),
                overview_summary(&entry.course_overview),
            ]
        })
        .collect();
    let columns = [Column::new("TIMESTAMP"), Column::new("RECORDED"), Column::new("COURSES")];
    println!("{}", simple_table(&ui, &columns, &rows));
    Ok(())
}

pub fn handle_show(ctx: &AppContext, args: &ShowArgs) -> anyhow::Result<()> {
    let ui = ctx.ui().with_json(args.json);
    let context = ctx.user_context()?;
    let store = ctx.open_verified(&context)?;

    let snapshot: GradebookSnapshot = match store.load(args.timestamp) {
        Ok(snapshot) => snapshot,
        Err(VaultError::NotFound(timestamp)) => {
            return Err(CliError::not_found(
                format!("No snapshot recorded at {}", timestamp),
                "Run `gradevault list` to see recorded timestamps",
            )
            .into())
        }
        Err(err) => return Err(err.into()),
    };

    if ui.mode.is_json() {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    print(&ui, &header(&ui, "show", Some(&args.timestamp.to_string())));
    print(&ui, &kv(&ui, "Recorded", &format_timestamp(args.timestamp)));
    print(&ui, &kv(&ui, "Last Updated", &format_timestamp(snapshot.last_updated)));
    blank_line(&ui);

    let course_rows: Vec<Vec<String>> = snapshot
        .courses
        .iter()
        .map(|course| {
            vec![
                course.name.clone(),
                format_grade(course.grade),
                course.teacher.clone(),
                course.period.to_string(),
                course.assignments.len().to_string(),
            ]
        })
        .collect();
    let columns = [
        Column::new("COURSE"),
        Column::new("GRADE"),
        Column::new("TEACHER"),
        Column::new("PERIOD"),
        Column::new("ASSIGNMENTS"),
    ];
    println!("{}", simple_table(&ui, &columns, &course_rows));

    if ui.mode.is_pretty() {
        for course in snapshot.courses.iter().filter(|c| !c.assignments.is_empty()) {
            blank_line(&ui);
            print(&ui, &kv(&ui, "Course", &course.name));
            let rows: Vec<Vec<String>> = course
                .assignments
                .iter()
                .map(|a| {
                    vec![
                        a.name.clone(),
                        a.kind.clone(),
                        a.due_date.clone(),
                        format_grade(a.grade),
                        a.points.clone(),
                    ]
                })
                .collect();
            let columns = [
                Column::new("ASSIGNMENT"),
                Column::new("TYPE"),
                Column::new("DUE"),
                Column::new("GRADE"),
                Column::new("POINTS"),
            ];
            println!("{}", simple_table(&ui, &columns, &rows));
        }
    }
    Ok(())
}

pub fn handle_remove(ctx: &AppContext, args: &RemoveArgs) -> anyhow::Result<()> {
    let context = ctx.user_context()?;
    let store = ctx.open_verified(&context)?;

    match store.remove_entry(args.timestamp) {
        Ok(()) => {}
        Err(VaultError::NotFound(timestamp)) => {
            return Err(CliError::not_found(
                format!("No snapshot recorded at {}", timestamp),
                "Run `gradevault list` to see recorded timestamps",
            )
            .into())
        }
        Err(err) => return Err(err.into()),
    }

    if !ctx.quiet() {
        let ts = args.timestamp.to_string();
        print(ctx.ui(), &receipt(ctx.ui(), "Snapshot removed", &[("Timestamp", ts.as_str())]));
    }
    Ok(())
}
