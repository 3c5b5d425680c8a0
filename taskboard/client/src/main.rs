use std::str::FromStr;
use std::sync::Arc;

use anyhow::bail;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use taskboard_client::store::{AuthStore, TaskStore};
use taskboard_client::storage::{JsonFileStorage, Storage};
use taskboard_client::ui::{self, TaskEditForm, TaskForm, dashboard, views};
use taskboard_client::{ApiClient, ApiError, ClientConfig};
use taskboard_core::{Credentials, ParseError, Priority, Registration, SortField, SortOrder, TaskStatus};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "taskboard", about = "Manage your tasks from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account and sign in
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign in with a Google ID token
    LoginGoogle {
        #[arg(long)]
        token: String,
    },
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Change your display name
    Profile {
        #[arg(long)]
        name: String,
    },
    #[command(subcommand)]
    Tasks(TaskCommands),
    /// Show counts, due dates and recent activity
    Dashboard,
}

#[derive(Debug, Clone, Subcommand)]
enum TaskCommands {
    List {
        /// Search titles and descriptions. The term is remembered for later lists and the
        /// dashboard until changed or cleared with --clear-search
        #[arg(long)]
        search: Option<String>,
        /// Forget the remembered search term
        #[arg(long, conflicts_with = "search")]
        clear_search: bool,
        /// pending, in-progress, completed or all
        #[arg(long)]
        status: Option<StatusFilter>,
        #[arg(long)]
        sort_by: Option<SortField>,
        #[arg(long)]
        order: Option<SortOrder>,
    },
    Show {
        id: String,
    },
    Add {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Due date as YYYY-MM-DD
        #[arg(long)]
        deadline: Option<NaiveDate>,
        #[arg(long, default_value = "")]
        assigned_to: String,
        #[arg(long, default_value = "pending")]
        status: TaskStatus,
        #[arg(long, default_value = "medium")]
        priority: Priority,
    },
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        deadline: Option<NaiveDate>,
        #[arg(long)]
        assigned_to: Option<String>,
        #[arg(long)]
        status: Option<TaskStatus>,
        #[arg(long)]
        priority: Option<Priority>,
    },
    Delete {
        id: String,
    },
}

/// Status filter argument where `all` clears the filter.
#[derive(Debug, Clone, Copy)]
struct StatusFilter(Option<TaskStatus>);

impl FromStr for StatusFilter {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "all" => Ok(StatusFilter(None)),
            other => other.parse().map(|status| StatusFilter(Some(status))),
        }
    }
}

/// Turns a failed remote call into the CLI error, preferring the login hint once the
/// session is gone.
fn finish<T>(auth: &AuthStore, result: Result<T, ApiError>) -> anyhow::Result<T> {
    if auth.login_required() {
        bail!(ui::LOGIN_HINT);
    }
    Ok(result?)
}

fn require_login(auth: &AuthStore) -> anyhow::Result<()> {
    if auth.access_token().is_none() {
        bail!(ui::LOGIN_HINT);
    }
    Ok(())
}

fn check_fetch<A>(auth: &AuthStore, store: &TaskStore<A>) -> anyhow::Result<()>
where
    A: taskboard_client::api::TaskApi,
{
    if auth.login_required() {
        bail!(ui::LOGIN_HINT);
    }
    if let Some(error) = &store.state().error {
        bail!("{}", error);
    }
    Ok(())
}

async fn run_task_command(
    command: TaskCommands,
    auth: &AuthStore,
    api: ApiClient,
    storage: Arc<dyn Storage>,
) -> anyhow::Result<()> {
    let mut store = TaskStore::new(api, storage);

    match command {
        TaskCommands::List {
            search,
            clear_search,
            status,
            sort_by,
            order,
        } => {
            if clear_search {
                store.set_search_term("");
            } else if let Some(term) = search {
                store.set_search_term(term);
            }
            let mut fetched = false;
            if sort_by.is_some() || order.is_some() {
                let current = store.state().preferences();
                store
                    .set_sorting(
                        sort_by.unwrap_or(current.sort_by),
                        order.unwrap_or(current.sort_order),
                    )
                    .await;
                fetched = true;
            }
            if let Some(StatusFilter(status)) = status {
                store.set_status_filter(status).await;
                fetched = true;
            }
            if !fetched {
                store.fetch_tasks().await;
            }
            check_fetch(auth, &store)?;
            print!("{}", views::task_table(&store.filtered_tasks()));
        }
        TaskCommands::Show { id } => {
            store.fetch_task(&id).await;
            check_fetch(auth, &store)?;
            if let Some(task) = &store.state().current_task {
                print!("{}", views::task_detail(task));
            }
        }
        TaskCommands::Add {
            title,
            description,
            deadline,
            assigned_to,
            status,
            priority,
        } => {
            let form = TaskForm {
                title,
                description,
                deadline: deadline.or_else(|| Some(Utc::now().date_naive())),
                assigned_to,
                status,
                priority,
            };
            let input = form.validate()?;
            let task = finish(auth, store.create_task(input).await)?;
            println!("Task created with ID {}", task.id);
        }
        TaskCommands::Edit {
            id,
            title,
            description,
            deadline,
            assigned_to,
            status,
            priority,
        } => {
            let form = TaskEditForm {
                title,
                description,
                deadline,
                assigned_to,
                status,
                priority,
            };
            let patch = form.validate()?;
            let task = finish(auth, store.update_task(&id, patch).await)?;
            print!("{}", views::task_detail(&task));
        }
        TaskCommands::Delete { id } => {
            finish(auth, store.delete_task(&id).await)?;
            println!("Task {} deleted", id);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    let config = ClientConfig::from_env()?;
    let storage: Arc<dyn Storage> = Arc::new(JsonFileStorage::open(&config.state_file)?);
    let auth = AuthStore::new(storage.clone());
    let api = ApiClient::new(&config, auth.clone())?;

    match args.command {
        Commands::Login { email, password } => {
            let credentials = Credentials { email, password };
            let user = auth.login_with_email(&api, &credentials).await?;
            println!("Logged in as {} <{}>", user.name, user.email);
        }
        Commands::Register {
            name,
            email,
            password,
        } => {
            let registration = Registration {
                name,
                email,
                password,
            };
            let user = auth.register(&api, &registration).await?;
            println!("Account created. Logged in as {} <{}>", user.name, user.email);
        }
        Commands::LoginGoogle { token } => {
            let user = auth.login_with_google(&api, &token).await?;
            println!("Logged in as {} <{}>", user.name, user.email);
        }
        Commands::Logout => {
            auth.logout(&api).await;
            println!("Logged out");
        }
        Commands::Whoami => {
            if !auth.check_auth(&api).await {
                bail!(ui::LOGIN_HINT);
            }
            if let Some(user) = auth.user() {
                println!("{} <{}>", user.name, user.email);
            }
        }
        Commands::Profile { name } => {
            require_login(&auth)?;
            let result = auth.update_profile(&api, &name).await;
            let user = finish(&auth, result)?;
            println!("Name changed to {}", user.name);
        }
        Commands::Tasks(command) => {
            require_login(&auth)?;
            run_task_command(command, &auth, api, storage).await?;
        }
        Commands::Dashboard => {
            require_login(&auth)?;
            let mut store = TaskStore::new(api, storage);
            let outcome = dashboard::load(&mut store, Utc::now().date_naive()).await;
            if auth.login_required() {
                bail!(ui::LOGIN_HINT);
            }
            let rendered = outcome?;
            if let Some(warning) = &rendered.warning {
                eprintln!("Warning: counts may be out of date: {}", warning);
            }
            print!("{}", rendered.text);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("taskboard").chain(args.iter().copied()))
    }

    #[test]
    fn list_accepts_clear_search() {
        let cli = parse(&["tasks", "list", "--clear-search"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Tasks(TaskCommands::List {
                clear_search: true,
                search: None,
                ..
            })
        ));
    }

    #[test]
    fn clear_search_conflicts_with_search() {
        assert!(parse(&["tasks", "list", "--search", "report", "--clear-search"]).is_err());
    }

    #[test]
    fn status_filter_all_means_no_filter() {
        let cli = parse(&["tasks", "list", "--status", "all"]).unwrap();
        let Commands::Tasks(TaskCommands::List { status, .. }) = cli.command else {
            panic!("expected tasks list");
        };
        assert!(matches!(status, Some(StatusFilter(None))));
    }
}
