use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};

use crate::error::NotesError;
use crate::generator::{GenerateOptions, NotesGenerator};
use crate::models::TranscriptRef;
use crate::poll::DocumentKind;
use crate::resolve::{Lookup, DEFAULT_MEETING_TITLE};

#[derive(Debug, Parser)]
#[command(
    name = "catnotes",
    version,
    about = "Schedule Fireflies meeting bots and turn their transcripts into PDFs"
)]
pub struct Cli {
    #[command(flatten)]
    pub budget: PollOverrides,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct PollOverrides {
    /// Seconds to wait between fetch attempts (at least 1)
    #[arg(long, global = true)]
    pub interval_secs: Option<u64>,

    /// Give up after this many fetch attempts (capped at POLL_MAX_ATTEMPTS)
    #[arg(long, global = true)]
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Ask Fireflies to send its bot to a meeting
    Schedule {
        meeting_link: String,
        #[arg(default_value = DEFAULT_MEETING_TITLE)]
        meeting_title: String,
    },
    /// Generate a PDF from the most recent transcript
    Latest,
    /// List recent transcripts
    List {
        #[arg(default_value_t = 10)]
        limit: i32,
    },
    /// Generate a PDF for the transcript whose title matches
    Find { search_title: String },
    /// Generate a PDF for an explicit transcript id
    Generate {
        transcript_id: String,
        meeting_title: Option<String>,
    },
    /// Generate condensed study notes (latest transcript unless an id is given)
    StudyNotes { transcript_id: Option<String> },
}

impl PollOverrides {
    fn options(&self, kind: DocumentKind) -> GenerateOptions {
        GenerateOptions {
            kind,
            interval_secs: self.interval_secs,
            max_attempts: self.max_attempts,
            poll_id: None,
        }
    }
}

pub async fn run(
    command: Command,
    generator: &NotesGenerator,
    overrides: &PollOverrides,
) -> Result<()> {
    match command {
        Command::Serve => Err(anyhow!("serve is handled by the binary entry point")),
        Command::Schedule {
            meeting_link,
            meeting_title,
        } => {
            generator.schedule_bot(&meeting_link, &meeting_title).await?;
            println!("Bot scheduled for \"{}\".", meeting_title);
            println!();
            println!("Once Fireflies has processed the meeting, generate the PDF with one of:");
            println!("  catnotes latest");
            println!("  catnotes find \"{}\"", meeting_title);
            println!("  catnotes list");
            println!("  catnotes generate <transcript-id> \"{}\"", meeting_title);
            Ok(())
        }
        Command::List { limit } => {
            let transcripts = generator.list_recent(limit).await?;
            if transcripts.is_empty() {
                println!("No transcripts found.");
            }
            for (i, t) in transcripts.iter().enumerate() {
                println!("{}", describe(i + 1, t));
            }
            Ok(())
        }
        Command::Latest => {
            generate(generator, &Lookup::Latest, overrides.options(DocumentKind::Notes)).await
        }
        Command::Find { search_title } => {
            let lookup = Lookup::ByTitle(search_title.clone());
            match generate(generator, &lookup, overrides.options(DocumentKind::Notes)).await {
                Err(e) => {
                    if let Some(NotesError::AmbiguousMatch { candidates, .. }) =
                        e.downcast_ref::<NotesError>()
                    {
                        println!("Multiple matching transcripts found:");
                        for (i, t) in candidates.iter().enumerate() {
                            println!("{}", describe(i + 1, t));
                        }
                        println!();
                        println!("Pick one with: catnotes generate <transcript-id> \"{}\"", search_title);
                    }
                    Err(e)
                }
                ok => ok,
            }
        }
        Command::Generate {
            transcript_id,
            meeting_title,
        } => {
            let lookup = Lookup::ById {
                id: transcript_id,
                title: meeting_title,
            };
            generate(generator, &lookup, overrides.options(DocumentKind::Notes)).await
        }
        Command::StudyNotes { transcript_id } => {
            let lookup = match transcript_id {
                Some(id) => Lookup::ById { id, title: None },
                None => Lookup::Latest,
            };
            generate(generator, &lookup, overrides.options(DocumentKind::StudyNotes)).await
        }
    }
}

async fn generate(
    generator: &NotesGenerator,
    lookup: &Lookup,
    options: GenerateOptions,
) -> Result<()> {
    let document = generator.generate(lookup, options).await?;
    println!("PDF generated successfully at: {}", document.path.display());
    Ok(())
}

fn describe(index: usize, transcript: &TranscriptRef) -> String {
    let date = transcript
        .recorded_at
        .map(|d| d.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "unknown date".to_string());
    format!(
        "{}. \"{}\"\n   ID: {}\n   Date: {}",
        index, transcript.title, transcript.id, date
    )
}
