// goal.rs — Goal subcommands: create, list, status, override, delete.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use clap::Subcommand;
use sg_goal::{Goal, GoalFilter, GoalStatus, GoalStore, GoalType, JsonGoalStore, ProjectLayout};
use uuid::Uuid;

#[derive(Subcommand)]
pub enum GoalCommands {
    /// Create a goal for a student.
    Create {
        /// Student the goal belongs to.
        #[arg(long)]
        student: String,
        /// Goal type (e.g., "attendance_rate", "homework_completion", "manual").
        #[arg(long = "type")]
        goal_type: String,
        /// Target metric value.
        #[arg(long)]
        target: f64,
        /// Start of the goal window (YYYY-MM-DD or RFC 3339).
        #[arg(long)]
        start: String,
        /// Deadline (YYYY-MM-DD or RFC 3339).
        #[arg(long)]
        end: String,
        /// Goal title.
        #[arg(long)]
        title: String,
        /// Subject id for subject_understanding goals.
        #[arg(long)]
        metric: Option<String>,
        /// Teacher who receives status notifications.
        #[arg(long)]
        teacher: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
        /// Metric value when the goal was set.
        #[arg(long)]
        baseline: Option<f64>,
        /// Don't show the goal (or its notifications) to the student.
        #[arg(long)]
        hide_from_student: bool,
        /// Also notify the student's parents.
        #[arg(long)]
        parent_visible: bool,
    },
    /// List goals.
    List {
        /// Only this student's goals.
        #[arg(long)]
        student: Option<String>,
        /// Filter by status (e.g., "in_progress", "at_risk").
        #[arg(long)]
        status: Option<String>,
    },
    /// Show details for a goal.
    Status {
        /// Goal ID.
        id: String,
    },
    /// Set a goal's status by hand.
    Override {
        /// Goal ID.
        id: String,
        /// New status (in_progress, at_risk, achieved, failed).
        status: String,
    },
    /// Delete a goal.
    Delete {
        /// Goal ID.
        id: String,
    },
}

pub async fn execute(cmd: &GoalCommands, layout: &ProjectLayout) -> anyhow::Result<()> {
    let store = JsonGoalStore::new(&layout.goals_dir)?;

    match cmd {
        GoalCommands::Create {
            student,
            goal_type,
            target,
            start,
            end,
            title,
            metric,
            teacher,
            description,
            baseline,
            hide_from_student,
            parent_visible,
        } => {
            let mut goal = Goal::new(
                student.as_str(),
                goal_type.parse::<GoalType>()?,
                title.as_str(),
                *target,
                parse_date(start)?,
                parse_date(end)?,
            )?
            .with_description(description.as_str());
            if let Some(m) = metric {
                goal = goal.with_metric(m.as_str());
            }
            if let Some(t) = teacher {
                goal = goal.with_teacher(t.as_str());
            }
            if let Some(b) = baseline {
                goal = goal.with_baseline(*b);
            }
            goal.visible_to_student = !hide_from_student;
            goal.visible_to_parent = *parent_visible;
            create_goal(&store, goal).await
        }
        GoalCommands::List { student, status } => {
            list_goals(&store, student.as_deref(), status.as_deref()).await
        }
        GoalCommands::Status { id } => show_status(&store, id),
        GoalCommands::Override { id, status } => override_status(&store, id, status),
        GoalCommands::Delete { id } => delete_goal(&store, id),
    }
}

/// Accept a bare date (midnight UTC) or a full RFC 3339 timestamp.
fn parse_date(s: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| anyhow::anyhow!("invalid date '{}': {}", s, e))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow::anyhow!("invalid date '{}'", s))?;
    Ok(Utc.from_utc_datetime(&midnight))
}

async fn create_goal(store: &JsonGoalStore, goal: Goal) -> anyhow::Result<()> {
    store.create(&goal).await?;

    println!("Goal created: {}", goal.id);
    println!("  Student: {}", goal.student_id);
    println!("  Type:    {}", goal.goal_type);
    println!("  Target:  {}", goal.target_value);
    println!("  Due:     {}", goal.target_date.format("%Y-%m-%d"));

    Ok(())
}

async fn list_goals(
    store: &JsonGoalStore,
    student: Option<&str>,
    status: Option<&str>,
) -> anyhow::Result<()> {
    let filter = GoalFilter {
        student_id: student.map(str::to_string),
        statuses: status
            .map(|s| s.parse::<GoalStatus>())
            .transpose()?
            .into_iter()
            .collect(),
        goal_type: None,
    };
    let goals = store.find_many(&filter).await?;

    if goals.is_empty() {
        println!("No goals found.");
        return Ok(());
    }

    println!(
        "{:<38} {:<12} {:<24} {:<22} {:>8} {:<12}",
        "ID", "STUDENT", "TITLE", "TYPE", "PROGRESS", "STATUS"
    );
    println!("{}", "-".repeat(121));

    for g in &goals {
        println!(
            "{:<38} {:<12} {:<24} {:<22} {:>7}% {:<12}",
            g.id,
            truncate(&g.student_id, 12),
            truncate(&g.title, 24),
            g.goal_type.to_string(),
            g.progress,
            g.status.to_string(),
        );
    }
    println!("\n{} goal(s) total.", goals.len());

    Ok(())
}

fn show_status(store: &JsonGoalStore, id: &str) -> anyhow::Result<()> {
    let goal_id = Uuid::parse_str(id)?;
    let Some(g) = store.get(goal_id)? else {
        anyhow::bail!("Goal not found: {}", id);
    };

    println!("Goal:      {}", g.id);
    println!("Title:     {}", g.title);
    if !g.description.is_empty() {
        println!("About:     {}", g.description);
    }
    println!("Student:   {}", g.student_id);
    if let Some(ref teacher) = g.teacher_id {
        println!("Teacher:   {}", teacher);
    }
    println!("Type:      {}", g.goal_type);
    if let Some(ref metric) = g.metric {
        println!("Metric:    {}", metric);
    }
    println!("Status:    {}", g.status);
    println!(
        "Value:     {} / {} ({}%)",
        g.current_value, g.target_value, g.progress
    );
    if let Some(baseline) = g.baseline_value {
        println!("Baseline:  {}", baseline);
    }
    println!(
        "Window:    {} .. {}",
        g.start_date.format("%Y-%m-%d"),
        g.target_date.format("%Y-%m-%d")
    );
    if let Some(at) = g.achieved_at {
        println!("Achieved:  {}", at.to_rfc3339());
    }
    match g.last_checked {
        Some(at) => println!("Checked:   {}", at.to_rfc3339()),
        None => println!("Checked:   never"),
    }
    println!("Updated:   {}", g.updated_at.to_rfc3339());

    Ok(())
}

fn override_status(store: &JsonGoalStore, id: &str, status: &str) -> anyhow::Result<()> {
    let goal_id = Uuid::parse_str(id)?;
    let status: GoalStatus = status.parse()?;
    let Some(mut goal) = store.get(goal_id)? else {
        anyhow::bail!("Goal not found: {}", id);
    };

    let previous = goal.status;
    goal.override_status(status);
    store.save(&goal)?;
    tracing::info!(goal_id = %goal.id, "status overridden {} -> {}", previous, status);

    println!("Goal {}: {} -> {}", goal.id, previous, goal.status);
    Ok(())
}

fn delete_goal(store: &JsonGoalStore, id: &str) -> anyhow::Result<()> {
    let goal_id = Uuid::parse_str(id)?;
    if store.delete(goal_id)? {
        println!("Goal deleted: {}", goal_id);
        Ok(())
    } else {
        anyhow::bail!("Goal not found: {}", id)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        s.to_string()
    }
}
