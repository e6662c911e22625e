use crate::query::StatusFilter;
use crate::record::{ActivityKind, ActivityStatus, SightingStatus};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "naturein")]
#[command(about = "Review nature sightings and manage classroom activities")]
#[command(version = "1.0")]
pub(crate) struct Args {
    /// Base URL of the REST API. Without it the bundled sample data is used
    #[arg(long, env = "NATUREIN_API_URL")]
    pub api_url: Option<String>,

    /// Bearer token sent to the API
    #[arg(long, env = "NATUREIN_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Simulated write latency, or base retry delay against the API, in milliseconds
    #[arg(short, long, default_value = "500")]
    pub delay: u64,

    /// Maximum number of retry attempts against the API
    #[arg(short, long, default_value = "3")]
    pub retries: u32,

    /// Id of the teacher performing the actions
    #[arg(long, default_value = "1")]
    pub teacher: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Review sightings submitted by students
    Sightings {
        #[command(subcommand)]
        action: SightingAction,
    },
    /// Manage teacher activities
    Activities {
        #[command(subcommand)]
        action: ActivityAction,
    },
    /// Render a progress chart from a `date,points` CSV file
    Chart {
        #[arg(short, long)]
        input: String,

        /// Output SVG file; prints to stdout when absent
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Show the signed-in user's points and badges
    Badges,
    /// Ask the virtual assistant a question
    Chat {
        #[arg(required = true)]
        message: Vec<String>,
    },
}

#[derive(Subcommand)]
pub(crate) enum SightingAction {
    List {
        #[arg(short, long)]
        search: Option<String>,

        /// all, pending, verified or rejected
        #[arg(long, default_value = "all")]
        status: StatusFilter<SightingStatus>,

        /// Only sightings reported by this student
        #[arg(long)]
        student: Option<u64>,

        /// Lowest reporter confidence to show, from 0.0 to 1.0
        #[arg(long, default_value = "0.0")]
        min_confidence: f64,

        /// Highest reporter confidence to show, from 0.0 to 1.0
        #[arg(long, default_value = "1.0")]
        max_confidence: f64,

        /// Only sightings flagged for expert review
        #[arg(long)]
        flagged: bool,
    },
    Approve {
        id: u64,

        #[arg(short, long, default_value = "50")]
        points: u32,

        #[arg(short, long, default_value = "")]
        comment: String,
    },
    Reject {
        id: u64,

        #[arg(short, long, default_value = "")]
        comment: String,
    },
    /// Approve every pending sighting
    ApprovePending {
        #[arg(short, long, default_value = "50")]
        points: u32,

        #[arg(short, long, default_value = "")]
        comment: String,

        /// Maximum number of concurrent approvals
        #[arg(long, default_value = "5")]
        concurrent: usize,
    },
    /// Reject several sightings with the same comment
    RejectMany {
        #[arg(required = true, value_delimiter = ',')]
        ids: Vec<u64>,

        #[arg(short, long, default_value = "")]
        comment: String,

        /// Maximum number of concurrent rejections
        #[arg(long, default_value = "5")]
        concurrent: usize,
    },
    /// Ask an expert in `specialty` to review a pending sighting
    Flag {
        id: u64,

        #[arg(short, long)]
        specialty: String,

        #[arg(short, long, default_value = "")]
        notes: String,
    },
    Stats,
    Export {
        #[arg(short, long, default_value = "sightings.csv")]
        output: String,
    },
}

#[derive(Subcommand)]
pub(crate) enum ActivityAction {
    List {
        #[arg(short, long)]
        search: Option<String>,

        /// all, active, completed or expired
        #[arg(long, default_value = "all")]
        status: StatusFilter<ActivityStatus>,
    },
    Create {
        #[arg(short, long)]
        title: String,

        #[arg(short, long, default_value = "")]
        description: String,

        /// quiz, exploration, research or reading
        #[arg(short, long, default_value = "quiz")]
        kind: ActivityKind,

        #[arg(short, long, default_value = "0")]
        points: u32,

        /// Days from now until the deadline
        #[arg(long)]
        deadline_days: Option<i64>,
    },
    /// Change the title, description, kind, reward or deadline
    Update {
        id: u64,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(short, long)]
        kind: Option<ActivityKind>,

        #[arg(short, long)]
        points: Option<u32>,

        /// Days from now until the new deadline
        #[arg(long, conflicts_with = "no_deadline")]
        deadline_days: Option<i64>,

        /// Remove the deadline
        #[arg(long)]
        no_deadline: bool,
    },
    Assign {
        id: u64,

        /// Comma separated student ids
        #[arg(short, long, value_delimiter = ',', required = true)]
        students: Vec<u64>,
    },
    Complete {
        id: u64,

        #[arg(short, long)]
        student: u64,
    },
    Delete {
        id: u64,
    },
    Stats,
    Export {
        #[arg(short, long, default_value = "activities.csv")]
        output: String,
    },
}
