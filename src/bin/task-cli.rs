use clap::{Parser, Subcommand};
use reqwest::Method;
use serde_json::{json, Map, Value};

#[derive(Parser)]
#[command(name = "task-cli")]
#[command(about = "Command line client for the task service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List tasks, optionally filtered
    List {
        /// Case-insensitive title substring
        #[arg(long)]
        title: Option<String>,
        /// Completion flag to match
        #[arg(long)]
        completed: Option<bool>,
    },
    /// Show one task
    Get { id: u64 },
    /// Create a task
    Create { title: String },
    /// Change fields of a task
    Update {
        id: u64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        completed: Option<bool>,
    },
    /// Delete a task
    Delete { id: u64 },
    /// Fetch a third-party URL through the relay
    Relay {
        target: String,
        #[arg(short = 'X', long, default_value = "GET")]
        method: Method,
        /// Request body for POST/PUT
        #[arg(short, long)]
        data: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let tasks_url = format!("{}/api/tasks", cli.url.trim_end_matches('/'));

    let request = match cli.command {
        Commands::List { title, completed } => {
            let mut query = Vec::new();
            if let Some(title) = title {
                query.push(("title", title));
            }
            if let Some(completed) = completed {
                query.push(("isCompleted", completed.to_string()));
            }
            client.get(&tasks_url).query(&query)
        }
        Commands::Get { id } => client.get(format!("{}/{}", tasks_url, id)),
        Commands::Create { title } => client.post(&tasks_url).json(&json!({ "title": title })),
        Commands::Update { id, title, completed } => {
            let mut patch = Map::new();
            if let Some(title) = title {
                patch.insert("title".into(), Value::String(title));
            }
            if let Some(completed) = completed {
                patch.insert("isCompleted".into(), Value::Bool(completed));
            }
            client
                .put(format!("{}/{}", tasks_url, id))
                .json(&Value::Object(patch))
        }
        Commands::Delete { id } => client.delete(format!("{}/{}", tasks_url, id)),
        Commands::Relay { target, method, data } => {
            let request = client
                .request(method, format!("{}/bypass-cors", cli.url.trim_end_matches('/')))
                .query(&[("url", target)]);
            match data {
                Some(data) => request
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(data),
                None => request,
            }
        }
    };

    let res = request.send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let envelope: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&envelope)?);

    let status = envelope.get("status").and_then(Value::as_u64).unwrap_or(200);
    if status >= 400 {
        std::process::exit(1);
    }
    Ok(())
}
