use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared_types::{CalendarEventView, KeywordSweepResponse, MeetingDetail, MeetingResultUpdate};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "meeting-cli")]
#[command(about = "CLI for meetings and the merged calendar via the backend API")]
struct Cli {
    /// Backend server URL to connect to.
    #[arg(
        short,
        long,
        default_value = "http://localhost:3000",
        env = "MEETING_API_URL"
    )]
    base_url: String,

    /// Session token sent as `Authorization: Bearer`.
    #[arg(short, long, env = "MEETING_API_TOKEN", hide_env_values = true)]
    token: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Calendar events merged from local rows and the external provider
    Calendar {
        #[command(subcommand)]
        action: CalendarAction,
    },
    /// Inspect meetings and edit their results
    Meetings {
        #[command(subcommand)]
        action: MeetingAction,
    },
    /// Keyword maintenance
    Keywords {
        #[command(subcommand)]
        action: KeywordAction,
    },
}

#[derive(Subcommand)]
enum CalendarAction {
    /// List events between two dates, inclusive
    List {
        /// First day, YYYY-MM-DD
        #[arg(long, value_name = "DATE")]
        start: NaiveDate,

        /// Last day, YYYY-MM-DD
        #[arg(long, value_name = "DATE")]
        end: NaiveDate,
    },

    /// Delete an event by local id or provider id
    ///
    /// The local copy is removed even when the provider refuses the delete.
    Delete { id: String },
}

#[derive(Subcommand)]
enum MeetingAction {
    /// Print a meeting with participants, transcript and result
    Show { id: i64 },

    /// Submit an edited result from a JSON file
    ///
    /// Fields left out of the file keep their stored values; an empty list
    /// clears that collection.
    UpdateResult {
        id: i64,

        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum KeywordAction {
    /// Delete keywords no meeting result links to
    Sweep,
}

struct Api {
    client: Client,
    base_url: String,
    token: String,
}

impl Api {
    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/api{}", self.base_url.trim_end_matches('/'), path))
            .bearer_auth(&self.token)
    }

    async fn send(request: RequestBuilder) -> anyhow::Result<Response> {
        let response = request.send().await.context("request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("server returned {}: {}", status, body);
        }
        Ok(response)
    }

    async fn json<T: DeserializeOwned>(request: RequestBuilder) -> anyhow::Result<T> {
        Ok(Self::send(request).await?.json().await?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let api = Api {
        client: Client::new(),
        base_url: cli.base_url,
        token: cli.token,
    };

    match cli.command {
        Commands::Calendar { action } => handle_calendar(&api, action).await?,
        Commands::Meetings { action } => handle_meetings(&api, action).await?,
        Commands::Keywords { action } => handle_keywords(&api, action).await?,
    }

    Ok(())
}

fn print_event(event: &CalendarEventView) {
    let marker = if event.is_completed { "✓" } else { "○" };
    let star = if event.is_important { "*" } else { " " };
    let time = event
        .time
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string());
    let id = match (event.id, event.external_event_id.as_deref()) {
        (Some(id), _) => id.to_string(),
        (None, Some(external)) => format!("ext:{external}"),
        (None, None) => "?".to_string(),
    };
    println!(
        "{}{} {} {} [{}] {} ({})",
        marker,
        star,
        event.date,
        time,
        id,
        event.title,
        event.event_type.as_str()
    );
}

async fn handle_calendar(api: &Api, action: CalendarAction) -> anyhow::Result<()> {
    match action {
        CalendarAction::List { start, end } => {
            let events: Vec<CalendarEventView> = Api::json(
                api.request(reqwest::Method::GET, "/calendar/events")
                    .query(&[("start_date", start.to_string()), ("end_date", end.to_string())]),
            )
            .await?;
            if events.is_empty() {
                println!("No events between {} and {}.", start, end);
            }
            for event in &events {
                print_event(event);
            }
        }
        CalendarAction::Delete { id } => {
            let path = format!("/calendar/events/{}", urlencoding::encode(&id));
            Api::send(api.request(reqwest::Method::DELETE, &path)).await?;
            println!("Deleted event: {}", id);
        }
    }

    Ok(())
}

async fn handle_meetings(api: &Api, action: MeetingAction) -> anyhow::Result<()> {
    match action {
        MeetingAction::Show { id } => {
            let detail: MeetingDetail =
                Api::json(api.request(reqwest::Method::GET, &format!("/meetings/{id}"))).await?;
            let meeting = &detail.meeting;
            println!(
                "[{}] {} ({}) scheduled {}",
                meeting.id,
                meeting.title,
                meeting.status.as_str(),
                meeting.scheduled_at
            );
            for p in &detail.participants {
                println!("    {}: {}", p.speaker_id, p.name);
            }
            if let Some(result) = &detail.result {
                if let Some(summary) = &result.summary {
                    println!("Summary: {}", summary);
                }
                let keywords: Vec<_> = result.keywords.iter().map(|k| k.text.as_str()).collect();
                if !keywords.is_empty() {
                    println!("Keywords: {}", keywords.join(", "));
                }
                for item in &result.action_items {
                    let marker = if item.is_completed { "✓" } else { "○" };
                    let assignee = item.assignee.as_deref().unwrap_or("unassigned");
                    println!("    {} {} ({})", marker, item.task, assignee);
                }
            }
            for line in detail.transcripts.iter().filter(|t| !t.is_deleted) {
                println!(
                    "[{}] {}: {}",
                    line.time_label,
                    line.speaker_name.as_deref().unwrap_or(&line.speaker),
                    line.text
                );
            }
        }
        MeetingAction::UpdateResult { id, file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let update: MeetingResultUpdate =
                serde_json::from_str(&content).context("Failed to parse result JSON")?;
            Api::send(
                api.request(reqwest::Method::PATCH, &format!("/meetings/{id}/result"))
                    .json(&update),
            )
            .await?;
            println!("Updated result of meeting {}", id);
        }
    }

    Ok(())
}

async fn handle_keywords(api: &Api, action: KeywordAction) -> anyhow::Result<()> {
    match action {
        KeywordAction::Sweep => {
            let swept: KeywordSweepResponse =
                Api::json(api.request(reqwest::Method::POST, "/admin/keywords/sweep")).await?;
            println!("Deleted {} orphan keywords", swept.deleted);
        }
    }

    Ok(())
}
