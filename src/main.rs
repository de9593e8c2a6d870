use anyhow::Result;
use clap::{Parser, Subcommand};
use prep_rag::commands::{
    chat, clear_user, generate_notes, generate_quiz, ingest_text_file, ingest_youtube,
    list_files, show_status, upload_file,
};
use prep_rag::config::{run_interactive_config, show_config};
use prep_rag::generation::QuizDifficulty;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "prep-rag")]
#[command(about = "Per-user study material ingestion with generated quizzes, notes and chat")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Upload a document (pdf or docx by default) for a user
    Upload {
        user: String,
        file: PathBuf,
    },
    /// Ingest an already-extracted text file
    IngestText {
        user: String,
        file: PathBuf,
        /// Source name recorded on the chunks; defaults to the file name
        #[arg(long)]
        source: Option<String>,
    },
    /// Ingest a YouTube video
    Youtube {
        user: String,
        url: String,
        /// File containing the video's transcript
        #[arg(long)]
        transcript: Option<PathBuf>,
        /// JSON file with the video's title, description and keywords,
        /// used when no transcript is available
        #[arg(long)]
        video_info: Option<PathBuf>,
    },
    /// Ask a question about a user's study material
    Chat {
        user: String,
        message: String,
        /// Number of chunks to retrieve (1-20)
        #[arg(long)]
        max_results: Option<usize>,
    },
    /// Generate a multiple-choice quiz
    Quiz {
        user: String,
        /// Restrict to one ingested source, e.g. "yt_<user>_<video>"
        #[arg(long)]
        cache_id: Option<String>,
        #[arg(long)]
        num_questions: Option<usize>,
        /// mixed, easy, medium or hard
        #[arg(long)]
        difficulty: Option<QuizDifficulty>,
    },
    /// Generate structured study notes
    Notes {
        user: String,
        #[arg(long)]
        cache_id: Option<String>,
        /// Print Markdown instead of JSON
        #[arg(long)]
        markdown: bool,
    },
    /// List everything a user has ingested
    Files {
        user: String,
    },
    /// Delete all of a user's data
    Clear {
        user: String,
    },
    /// Show ledger, Ollama and vector store status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Upload { user, file } => upload_file(&user, &file).await?,
        Commands::IngestText { user, file, source } => {
            ingest_text_file(&user, &file, source).await?;
        }
        Commands::Youtube {
            user,
            url,
            transcript,
            video_info,
        } => ingest_youtube(&user, url, transcript.as_deref(), video_info.as_deref()).await?,
        Commands::Chat {
            user,
            message,
            max_results,
        } => chat(&user, message, max_results).await?,
        Commands::Quiz {
            user,
            cache_id,
            num_questions,
            difficulty,
        } => generate_quiz(&user, cache_id, num_questions, difficulty).await?,
        Commands::Notes {
            user,
            cache_id,
            markdown,
        } => generate_notes(&user, cache_id, markdown).await?,
        Commands::Files { user } => list_files(&user).await?,
        Commands::Clear { user } => clear_user(&user).await?,
        Commands::Status => show_status().await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["prep-rag", "status"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Status));
        }
    }

    #[test]
    fn upload_command() {
        let cli = Cli::try_parse_from(["prep-rag", "upload", "alice", "notes.pdf"])
            .expect("should parse");
        if let Commands::Upload { user, file } = cli.command {
            assert_eq!(user, "alice");
            assert_eq!(file, PathBuf::from("notes.pdf"));
        } else {
            panic!("expected upload command");
        }
    }

    #[test]
    fn quiz_command_with_options() {
        let cli = Cli::try_parse_from([
            "prep-rag",
            "quiz",
            "alice",
            "--cache-id",
            "yt_alice_abc",
            "--num-questions",
            "5",
            "--difficulty",
            "Hard",
        ])
        .expect("should parse");
        if let Commands::Quiz {
            user,
            cache_id,
            num_questions,
            difficulty,
        } = cli.command
        {
            assert_eq!(user, "alice");
            assert_eq!(cache_id.as_deref(), Some("yt_alice_abc"));
            assert_eq!(num_questions, Some(5));
            assert_eq!(difficulty, Some(QuizDifficulty::Hard));
        } else {
            panic!("expected quiz command");
        }
    }

    #[test]
    fn quiz_rejects_unknown_difficulty() {
        let cli = Cli::try_parse_from(["prep-rag", "quiz", "alice", "--difficulty", "brutal"]);
        assert!(cli.is_err());
    }

    #[test]
    fn youtube_command_with_transcript() {
        let cli = Cli::try_parse_from([
            "prep-rag",
            "youtube",
            "alice",
            "https://youtu.be/dQw4w9WgXcQ",
            "--transcript",
            "talk.txt",
        ])
        .expect("should parse");
        if let Commands::Youtube { transcript, .. } = cli.command {
            assert_eq!(transcript, Some(PathBuf::from("talk.txt")));
        } else {
            panic!("expected youtube command");
        }
    }

    #[test]
    fn youtube_command_with_video_info() {
        let cli = Cli::try_parse_from([
            "prep-rag",
            "youtube",
            "alice",
            "https://youtu.be/dQw4w9WgXcQ",
            "--video-info",
            "info.json",
        ])
        .expect("should parse");
        if let Commands::Youtube {
            transcript,
            video_info,
            ..
        } = cli.command
        {
            assert_eq!(transcript, None);
            assert_eq!(video_info, Some(PathBuf::from("info.json")));
        } else {
            panic!("expected youtube command");
        }
    }

    #[test]
    fn notes_markdown_flag() {
        let cli = Cli::try_parse_from(["prep-rag", "notes", "alice", "--markdown"])
            .expect("should parse");
        assert!(matches!(cli.command, Commands::Notes { markdown: true, .. }));
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["prep-rag", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Config { show } = parsed.command {
                assert!(show);
            }
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["prep-rag", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["prep-rag", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
