mod activity;
mod chart;
mod chat;
mod client;
mod error;
mod export;
mod http_store;
mod parse;
mod query;
mod record;
mod review;
mod seed;
mod stats;
mod store;
mod util;

use crate::activity::ActivityManager;
use crate::chat::ChatSession;
use crate::client::ApiClient;
use crate::http_store::HttpStore;
use crate::parse::{ActivityAction, Args, Command, SightingAction};
use crate::query::Filter;
use crate::record::{Activity, ActivityDraft, ActivityPatch, Sighting, SightingStatus};
use crate::review::SightingReview;
use crate::store::{MemoryStore, RecordStore};
use crate::util::{activity_line, print_hms, print_outcome, print_stats, sighting_line};
use chrono::{Duration, Utc};
use clap::Parser;
use log::{info, warn};
use std::error::Error;
use std::fs;
use std::time::Instant;

/// Backend settings shared by every command.
struct Backend {
    api_url: Option<String>,
    token: Option<String>,
    delay: u64,
    retries: u32,
}

impl Backend {
    fn http_store<R: record::Record>(&self, url: &str) -> Result<HttpStore<R>, error::StoreError> {
        Ok(HttpStore::new(url)?
            .with_token(self.token.clone())
            .with_delay(self.delay)
            .with_max_retries(self.retries))
    }

    fn api_client(&self) -> Result<ApiClient, Box<dyn Error>> {
        let Some(url) = &self.api_url else {
            return Err("this command needs --api-url or NATUREIN_API_URL".into());
        };
        Ok(ApiClient::new(url)?.with_token(self.token.clone()))
    }
}

async fn run_sightings<S: RecordStore<Sighting>>(
    review: SightingReview<S>,
    action: SightingAction,
) -> Result<(), Box<dyn Error>> {
    match action {
        SightingAction::List {
            search,
            status,
            student,
            min_confidence,
            max_confidence,
            flagged,
        } => {
            let records = review.store().list().await?;
            let mut criteria = Filter::default()
                .status(status)
                .confidence(min_confidence, max_confidence)
                .flagged_only(flagged);
            if let Some(term) = &search {
                criteria = criteria.search(term);
            }
            if let Some(student) = student {
                criteria = criteria.owner(student);
            }
            let matches = query::filter(&records, &criteria);
            for sighting in &matches {
                println!("{}", sighting_line(sighting));
            }
            println!("{} of {} sightings", matches.len(), records.len());
        }
        SightingAction::Approve {
            id,
            points,
            comment,
        } => print_outcome(&review.approve(id, points, &comment).await?),
        SightingAction::Reject { id, comment } => {
            print_outcome(&review.reject(id, &comment).await?)
        }
        SightingAction::ApprovePending {
            points,
            comment,
            concurrent,
        } => {
            let ids: Vec<u64> = review
                .by_status(SightingStatus::Pending)
                .await?
                .iter()
                .map(|s| s.id)
                .collect();
            if ids.is_empty() {
                println!("No pending sightings");
                return Ok(());
            }
            for (id, outcome) in review.approve_many(&ids, points, &comment, concurrent).await {
                print!("#{} ", id);
                print_outcome(&outcome);
            }
        }
        SightingAction::RejectMany {
            ids,
            comment,
            concurrent,
        } => {
            for (id, outcome) in review.reject_many(&ids, &comment, concurrent).await {
                print!("#{} ", id);
                print_outcome(&outcome);
            }
        }
        SightingAction::Flag {
            id,
            specialty,
            notes,
        } => print_outcome(&review.flag_for_review(id, &specialty, &notes).await?),
        SightingAction::Stats => {
            let records = review.store().list().await?;
            print_stats("Sightings", &stats::stats(&records));
        }
        SightingAction::Export { output } => {
            let records = review.store().list().await?;
            export::save_sightings(&records, &output)?;
        }
    }
    Ok(())
}

async fn run_activities<S: RecordStore<Activity>>(
    manager: ActivityManager<S>,
    action: ActivityAction,
    teacher: u64,
) -> Result<(), Box<dyn Error>> {
    match action {
        ActivityAction::List { search, status } => {
            let records = manager.store().list().await?;
            let mut criteria = Filter::default().status(status);
            if let Some(term) = &search {
                criteria = criteria.search(term);
            }
            let now = Utc::now();
            let matches = query::filter(&records, &criteria);
            for activity in &matches {
                println!("{}", activity_line(activity, now));
            }
            println!("{} of {} activities", matches.len(), records.len());
        }
        ActivityAction::Create {
            title,
            description,
            kind,
            points,
            deadline_days,
        } => {
            let created = manager
                .create(ActivityDraft {
                    title,
                    description,
                    kind,
                    reward_points: points,
                    deadline: deadline_days.map(|days| Utc::now() + Duration::days(days)),
                    created_by: teacher,
                })
                .await?;
            println!("{}", activity_line(&created, Utc::now()));
        }
        ActivityAction::Update {
            id,
            title,
            description,
            kind,
            points,
            deadline_days,
            no_deadline,
        } => {
            let deadline = match (deadline_days, no_deadline) {
                (Some(days), _) => Some(Some(Utc::now() + Duration::days(days))),
                (None, true) => Some(None),
                (None, false) => None,
            };
            let updated = manager
                .update(
                    id,
                    ActivityPatch {
                        title,
                        description,
                        kind,
                        reward_points: points,
                        deadline,
                    },
                )
                .await?;
            println!("{}", activity_line(&updated, Utc::now()));
        }
        ActivityAction::Assign { id, students } => {
            print_outcome(&manager.assign(id, &students).await?)
        }
        ActivityAction::Complete { id, student } => {
            print_outcome(&manager.record_completion(id, student).await?)
        }
        ActivityAction::Delete { id } => {
            manager.delete(id).await?;
            println!("Activity {} deleted", id);
        }
        ActivityAction::Stats => {
            let records = manager.store().list().await?;
            print_stats("Activities", &stats::stats(&records));
        }
        ActivityAction::Export { output } => {
            let records = manager.store().list().await?;
            export::save_activities(&records, &output)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let Args {
        api_url,
        token,
        delay,
        retries,
        teacher,
        verbose,
        command,
    } = Args::parse();

    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let backend = Backend {
        api_url,
        token,
        delay,
        retries,
    };
    let start = Instant::now();

    match command {
        Command::Sightings { action } => match &backend.api_url {
            Some(url) => {
                let review = SightingReview::new(backend.http_store(url)?, teacher);
                run_sightings(review, action).await?;
            }
            None => {
                let store = MemoryStore::new(seed::sample_sightings()).with_delay(delay);
                info!("No API configured, using {} sample sightings", store.len());
                run_sightings(SightingReview::new(store, teacher), action).await?;
            }
        },
        Command::Activities { action } => match &backend.api_url {
            Some(url) => {
                let manager = ActivityManager::new(backend.http_store(url)?);
                run_activities(manager, action, teacher).await?;
            }
            None => {
                let store = MemoryStore::new(seed::sample_activities()).with_delay(delay);
                info!("No API configured, using {} sample activities", store.len());
                run_activities(ActivityManager::new(store), action, teacher).await?;
            }
        },
        Command::Chart { input, output } => {
            let points = chart::load_points(&input)?;
            let svg = chart::render_svg(&points);
            match output {
                Some(path) => {
                    fs::write(&path, svg)?;
                    info!("Chart with {} points saved to {}", points.len(), path);
                }
                None => print!("{}", svg),
            }
        }
        Command::Badges => {
            let client = backend.api_client()?;
            let metrics = client.metrics().await;
            println!("Total points: {}", metrics.total_points);
            println!("{}", util::render_badges(&metrics.badges));
        }
        Command::Chat { message } => {
            let client = backend.api_client()?;
            let role = client.fetch_role().await;
            let mut session = ChatSession::new(client, &role);
            if !session.open() {
                warn!("The assistant is not available for the {} role", role);
                return Ok(());
            }
            if let Some(greeting) = session.messages().first() {
                println!("assistant: {}", greeting.content);
            }
            if let Some(reply) = session.send(&message.join(" ")).await {
                println!("{}: {}", reply.role, reply.content);
            }
            session.close();
        }
    }

    print_hms(&start);
    Ok(())
}
